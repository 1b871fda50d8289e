use std::boxed::Box;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::archive::{
    GameDatFileEntry, GameDatVersion, GAMEDAT_HEADER_MAGIC, GAMEDAT_HEADER_SIZE, MAX_ENTRY_COUNT,
};
use crate::crypto::decrypt_text_data;
use crate::layout::{GameDatLayout, INDEX_ENTRY_SIZE};
use crate::name::NameCodec;
use crate::{GameDatError, Result};
use nom::number::complete::{le_i32, le_u32, le_u8};
use nom::*;

#[derive(Debug)]
pub struct GameDatArchive<R: ?Sized> {
    obj: Box<R>,
    container: GameDatContainer,
}

impl GameDatArchive<File> {
    pub fn open<P: AsRef<Path>>(archive_path: P) -> Result<GameDatArchive<File>> {
        let file = File::open(archive_path)?;
        GameDatArchive::new(file)
    }
}

impl<R: Read + Seek> GameDatArchive<R> {
    /// Create a new archive with the underlying object as the reader.
    pub fn new(obj: R) -> Result<GameDatArchive<R>> {
        Self::try_open(obj)?.ok_or(GameDatError::FormatMismatch)
    }

    /// Returns `Ok(None)` if `obj` isn't a GAMEDAT archive at all and an
    /// error if it is one but its directory cannot be trusted.
    pub fn try_open(mut obj: R) -> Result<Option<GameDatArchive<R>>> {
        let container = match parse_gamedat_container(&mut obj)? {
            Some(v) => v,
            None => return Ok(None),
        };
        Ok(Some(GameDatArchive {
            obj: Box::new(obj),
            container,
        }))
    }

    pub fn version(&self) -> GameDatVersion {
        self.container.header.version
    }

    /// Absolute offset of the data region
    pub fn data_offset(&self) -> u64 {
        self.container.layout.data_offset
    }

    pub fn file_count(&self) -> usize {
        self.container.entries.len()
    }

    pub fn get_file_entry<S: AsRef<str>>(&self, file_name: S) -> Option<&GameDatFileEntry> {
        self.container
            .entries
            .iter()
            .find(|entry| entry.name == file_name.as_ref())
    }

    pub fn contains_file<S: AsRef<str>>(&self, file_name: S) -> bool {
        self.get_file_entry(file_name).is_some()
    }

    pub fn get_entries(&self) -> impl Iterator<Item = &'_ GameDatFileEntry> {
        self.container.entries.iter()
    }

    /// Opens an entry for reading.
    ///
    /// Text data entries are buffered and deobfuscated, any other entry is
    /// streamed straight from the underlying reader.
    pub fn open_entry(&mut self, entry: &GameDatFileEntry) -> Result<Box<dyn Read + '_>> {
        if entry.is_text_data() {
            let mut content = self.read_entry_raw(entry)?;
            if decrypt_text_data(&mut content) {
                log::trace!("'{}' deobfuscated", entry.name);
            }
            return Ok(Box::new(Cursor::new(content)));
        }
        self.obj.seek(SeekFrom::Start(entry.offset))?;
        Ok(Box::new(self.obj.by_ref().take(entry.size as u64)))
    }

    pub fn read_entry(&mut self, entry: &GameDatFileEntry) -> Result<Vec<u8>> {
        let mut content = Vec::with_capacity(entry.size as usize);
        self.open_entry(entry)?.read_to_end(&mut content)?;
        check_content_size(entry, content.len())?;
        Ok(content)
    }

    /// Reads an entry's bytes as stored, without deobfuscation.
    pub fn read_entry_raw(&mut self, entry: &GameDatFileEntry) -> Result<Vec<u8>> {
        if entry.size == 0 {
            return Ok(vec![]);
        }
        self.obj.seek(SeekFrom::Start(entry.offset))?;
        let mut content: Vec<u8> = Vec::with_capacity(entry.size as usize);
        let mut file_chunk = self.obj.by_ref().take(entry.size as u64);
        file_chunk.read_to_end(&mut content)?;
        check_content_size(entry, content.len())?;
        Ok(content)
    }

    pub fn get_entry_raw_data<S: AsRef<str>>(&mut self, file_name: S) -> Result<Vec<u8>> {
        let file_entry = self
            .get_file_entry(file_name)
            .ok_or(GameDatError::EntryNotFound)?
            .clone();
        self.read_entry_raw(&file_entry)
    }

    pub fn read_file_content<S: AsRef<str>>(&mut self, file_name: S) -> Result<Vec<u8>> {
        let file_entry = self
            .get_file_entry(file_name)
            .ok_or(GameDatError::EntryNotFound)?
            .clone();
        self.read_entry(&file_entry)
    }

    pub fn extract_file<S: AsRef<str>>(
        &mut self,
        file_name: S,
        destination_path: &Path,
    ) -> Result<()> {
        let file_entry = self
            .get_file_entry(file_name)
            .ok_or(GameDatError::EntryNotFound)?
            .clone();
        let mut file = File::create(destination_path)?;
        let mut content = self.open_entry(&file_entry)?;
        io::copy(&mut content, &mut file)?;
        Ok(file.flush()?)
    }
}

fn check_content_size(entry: &GameDatFileEntry, read_size: usize) -> Result<()> {
    if read_size != entry.size as usize {
        return Err(GameDatError::corrupt_directory(format!(
            "'{}' is truncated ({} bytes read, {} expected)",
            entry.name, read_size, entry.size
        )));
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
struct GameDatContainer {
    header: GameDatHeader,
    layout: GameDatLayout,
    entries: Vec<GameDatFileEntry>,
}

#[derive(Debug, PartialEq, Eq)]
struct GameDatHeader {
    version: GameDatVersion,
}

// Header as laid out on disk, before the version selector is checked
#[derive(Debug, PartialEq, Eq)]
struct RawGameDatHeader {
    version_selector: u8,
    entry_count: i32,
}

#[derive(Debug, PartialEq, Eq)]
struct IndexEntry {
    relative_offset: u32,
    size: u32,
}

named!(parse_gamedat_header<&[u8], RawGameDatHeader>,
    do_parse!(
        tag!(GAMEDAT_HEADER_MAGIC)
            >> version_selector: le_u8
            >> entry_count: le_i32
            >> (RawGameDatHeader {
                version_selector,
                entry_count,
            }
    )
));

named!(parse_index_entry<&[u8], IndexEntry>,
    do_parse!(
        relative_offset: le_u32
            >> size: le_u32
            >> (IndexEntry {
                relative_offset,
                size,
            }
    )
));

fn parse_gamedat_container<R: Read + Seek>(reader: &mut R) -> Result<Option<GameDatContainer>> {
    let archive_size = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    let mut header_buf = Vec::with_capacity(GAMEDAT_HEADER_SIZE);
    reader
        .by_ref()
        .take(GAMEDAT_HEADER_SIZE as u64)
        .read_to_end(&mut header_buf)?;
    let raw_header = match parse_gamedat_header(&header_buf) {
        Ok((_, v)) => v,
        Err(_) => return Ok(None),
    };
    let version = match GameDatVersion::from_selector(raw_header.version_selector) {
        Some(v) => v,
        None => return Ok(None),
    };
    let entry_count = raw_header.entry_count;
    if entry_count <= 0 || entry_count > MAX_ENTRY_COUNT {
        return Err(GameDatError::corrupt_directory(format!(
            "Invalid entry count {}",
            entry_count
        )));
    }
    let header = GameDatHeader { version };

    let layout = GameDatLayout::new(version, u32::try_from(entry_count)?);
    if layout.data_offset > archive_size {
        return Err(GameDatError::corrupt_directory(format!(
            "Directory ends at {:#x}, past the end of the archive ({:#x})",
            layout.data_offset, archive_size
        )));
    }
    log::debug!(
        "GAMEDAT v{} archive with {} entries, data at {:#x}",
        version.number(),
        entry_count,
        layout.data_offset
    );

    // Name and index tables are contiguous, read them in one go
    let directory_size = layout.data_offset - layout.name_table_offset;
    reader.seek(SeekFrom::Start(layout.name_table_offset))?;
    let mut directory_buf = Vec::with_capacity(usize::try_from(directory_size)?);
    reader
        .by_ref()
        .take(directory_size)
        .read_to_end(&mut directory_buf)?;
    if directory_buf.len() as u64 != directory_size {
        return Err(GameDatError::corrupt_directory("Truncated directory"));
    }
    let (name_table, index_table) =
        directory_buf.split_at(usize::try_from(layout.name_table_size())?);

    let name_codec = NameCodec::new(layout.name_length)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    let name_fields = name_table.chunks_exact(layout.name_length);
    let index_records = index_table.chunks_exact(INDEX_ENTRY_SIZE as usize);
    for (name_field, index_record) in name_fields.zip(index_records) {
        let name = name_codec.decode(name_field)?;
        let (_, index_entry) = parse_index_entry(index_record)
            .map_err(|_| GameDatError::corrupt_directory("Failed to parse index table"))?;
        let offset = layout.data_offset + index_entry.relative_offset as u64;
        if offset + index_entry.size as u64 > archive_size {
            return Err(GameDatError::corrupt_directory(format!(
                "'{}' lies outside of the archive ({:#x}+{:#x})",
                name, offset, index_entry.size
            )));
        }
        log::trace!("'{}' at {:#x} ({} bytes)", name, offset, index_entry.size);
        entries.push(GameDatFileEntry {
            name,
            offset,
            size: index_entry.size,
        });
    }

    Ok(Some(GameDatContainer {
        header,
        layout,
        entries,
    }))
}
