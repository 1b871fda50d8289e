use std::boxed::Box;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::archive::{
    base_file_name, is_text_data_name, ArchiveOptions, GameDatFileEntry, GameDatVersion,
    GAMEDAT_HEADER_MAGIC, MAX_ENTRY_COUNT,
};
use crate::crypto::encrypt_text_data;
use crate::layout::GameDatLayout;
use crate::name::NameCodec;
use crate::{GameDatError, Result};
use serde::Serialize;

/// A named resource to be packed.
///
/// Content is opened right before being written and dropped right after.
pub trait PackSource {
    fn name(&self) -> &str;
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// Resource backed by a file on disk, named after its path
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.to_string_lossy().to_string();
        Self { path, name }
    }
}

impl PackSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

impl PackSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.data.as_slice())))
    }
}

pub struct GameDatArchiveBuilder<W: Write + Seek> {
    obj: Box<W>,
    start_offset: u64,
    version: GameDatVersion,
    sources: Vec<Box<dyn PackSource>>,
    written_entries: Option<Vec<GameDatFileEntry>>,
}

#[derive(Debug, Serialize)]
struct SerializableGameDatHeader<'a> {
    magic: &'a [u8; GAMEDAT_HEADER_MAGIC.len()],
    version_selector: u8,
    entry_count: i32,
}

#[derive(Debug, Serialize)]
struct SerializableIndexEntry {
    relative_offset: u32,
    size: u32,
}

impl<W: Write + Seek> GameDatArchiveBuilder<W> {
    pub fn new(mut obj: W, options: ArchiveOptions) -> Self {
        let start_offset = obj.seek(SeekFrom::Current(0)).unwrap_or(0);
        Self {
            obj: Box::new(obj),
            start_offset,
            version: options.version,
            sources: Vec::new(),
            written_entries: None,
        }
    }

    pub fn version(&self) -> GameDatVersion {
        self.version
    }

    pub fn file_count(&self) -> usize {
        self.sources.len()
    }

    pub fn append_file<P: AsRef<Path>>(&mut self, path: P) {
        self.append_source(FileSource::new(path));
    }

    pub fn append_bytes(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.append_source(MemorySource::new(name, data));
    }

    pub fn append_source<S: PackSource + 'static>(&mut self, source: S) {
        self.sources.push(Box::new(source));
    }

    pub fn finish(&mut self) -> Result<Vec<GameDatFileEntry>> {
        self.finish_with_progress(|_, _| Ok(()))
    }

    /// Writes the whole archive.
    ///
    /// `progress` is called with the total step count and the entry being
    /// written: once before anything is written, once per entry and once at
    /// the end. Returning an error from it aborts the operation.
    pub fn finish_with_progress<F>(&mut self, mut progress: F) -> Result<Vec<GameDatFileEntry>>
    where
        F: FnMut(usize, Option<&str>) -> Result<()>,
    {
        if let Some(entries) = &self.written_entries {
            return Ok(entries.clone());
        }
        let entries = self.write_archive(&mut progress)?;
        self.written_entries = Some(entries.clone());
        Ok(entries)
    }

    fn write_archive<F>(&mut self, progress: &mut F) -> Result<Vec<GameDatFileEntry>>
    where
        F: FnMut(usize, Option<&str>) -> Result<()>,
    {
        let file_count = self.sources.len();
        let entry_count = match i32::try_from(file_count) {
            Ok(v) if v > 0 && v <= MAX_ENTRY_COUNT => v,
            _ => {
                return Err(GameDatError::corrupt_directory(format!(
                    "Cannot pack {} entries",
                    file_count
                )))
            }
        };
        let total_steps = file_count + 2;
        progress(total_steps, None)?;

        let layout = GameDatLayout::new(self.version, entry_count as u32);
        self.obj.seek(SeekFrom::Start(self.start_offset))?;
        write_gamedat_header(self.obj.by_ref(), self.version, entry_count)?;

        // Name table
        let name_codec = NameCodec::new(layout.name_length)?;
        for source in &self.sources {
            let name_field = name_codec.encode(base_file_name(source.name()))?;
            self.obj.write_all(&name_field)?;
        }

        // Data
        self.obj
            .seek(SeekFrom::Start(self.start_offset + layout.data_offset))?;
        let mut offset = layout.data_offset;
        let mut entries = Vec::with_capacity(file_count);
        for source in &self.sources {
            progress(total_steps, Some(source.name()))?;
            let name = base_file_name(source.name()).to_string();
            let size = {
                let mut reader = source.open()?;
                if is_text_data_name(&name) {
                    let mut data = Vec::new();
                    reader.read_to_end(&mut data)?;
                    check_entry_size(&name, offset, data.len() as u64)?;
                    if encrypt_text_data(&mut data) {
                        log::trace!("'{}' obfuscated", name);
                    }
                    self.obj.write_all(&data)?;
                    data.len() as u64
                } else {
                    io::copy(&mut reader, self.obj.by_ref())?
                }
            };
            let size = check_entry_size(&name, offset, size)?;
            log::trace!("'{}' written at {:#x} ({} bytes)", name, offset, size);
            entries.push(GameDatFileEntry { name, offset, size });
            offset += size as u64;
        }

        // Index table
        self.obj
            .seek(SeekFrom::Start(self.start_offset + layout.index_table_offset))?;
        for entry in &entries {
            let index_entry = SerializableIndexEntry {
                relative_offset: u32::try_from(entry.offset - layout.data_offset)?,
                size: entry.size,
            };
            bincode::serialize_into(self.obj.by_ref(), &index_entry)?;
        }
        self.obj.seek(SeekFrom::Start(self.start_offset + offset))?;
        self.obj.flush()?;
        log::debug!(
            "GAMEDAT v{} archive written with {} entries ({} bytes)",
            self.version.number(),
            file_count,
            offset
        );

        progress(total_steps, None)?;
        Ok(entries)
    }
}

/// Offsets and sizes are stored as u32, the whole data region must stay
/// addressable.
fn check_entry_size(name: &str, offset: u64, size: u64) -> Result<u32> {
    let end = offset + size;
    match u32::try_from(size) {
        Ok(v) if end <= u32::MAX as u64 => Ok(v),
        _ => Err(GameDatError::file_size_limit(format!(
            "'{}' ({} bytes at {:#x}) doesn't fit in a GAMEDAT archive",
            name, size, offset
        ))),
    }
}

fn write_gamedat_header<W: Write>(
    writer: &mut W,
    version: GameDatVersion,
    entry_count: i32,
) -> Result<()> {
    let header = SerializableGameDatHeader {
        magic: GAMEDAT_HEADER_MAGIC,
        version_selector: version.selector(),
        entry_count,
    };
    bincode::serialize_into(writer, &header)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TEXT_DATA_SIGNATURE;
    use crate::reader::GameDatArchive;
    use hex_literal::hex;
    use tempfile::tempdir;

    fn v1_options() -> ArchiveOptions {
        ArchiveOptions {
            version: GameDatVersion::V1,
        }
    }

    #[test]
    fn test_header_layout() {
        let mut output = Cursor::new(Vec::new());
        {
            let mut builder = GameDatArchiveBuilder::new(&mut output, v1_options());
            builder.append_bytes("data1.bin", hex!("DEADBEEF").to_vec());
            builder.append_bytes("textdata.bin", b"PJADV_TF".to_vec());
            builder.finish().unwrap();
        }
        let bytes = output.into_inner();
        assert_eq!(&bytes[..0x10], b"GAMEDAT PACK\x02\x00\x00\x00");
        assert_eq!(&bytes[0x10..0x20], b"data1.bin\0\0\0\0\0\0\0");
        assert_eq!(&bytes[0x20..0x30], b"textdata.bin\0\0\0\0");
        assert_eq!(&bytes[0x30..0x40], &hex!("00000000040000000400000008000000"));
        assert_eq!(&bytes[0x40..0x44], &hex!("DEADBEEF"));
        // Plain text data gets obfuscated
        assert_eq!(&bytes[0x44..0x49], &TEXT_DATA_SIGNATURE);
        assert_eq!(&bytes[0x44..], &hex!("956B3C9D63CEB90F"));
        assert_eq!(bytes.len(), 0x4C);
    }

    #[test]
    fn test_obfuscated_source_is_kept() {
        let obfuscated = hex!("956B3C9D63CEB90F").to_vec();
        let mut output = Cursor::new(Vec::new());
        {
            let mut builder = GameDatArchiveBuilder::new(&mut output, v1_options());
            builder.append_bytes("textdata.bin", obfuscated.clone());
            builder.finish().unwrap();
        }
        let bytes = output.into_inner();
        assert_eq!(&bytes[0x28..], obfuscated.as_slice());
        let mut archive = GameDatArchive::new(Cursor::new(bytes)).unwrap();
        let content = archive.read_file_content("textdata.bin").unwrap();
        assert_eq!(content.as_slice(), b"PJADV_TF");
    }

    #[test]
    fn test_round_trip() {
        let expected_content: Vec<(&str, Vec<u8>)> = vec![
            ("data1.bin", vec![1_u8, 2, 3]),
            ("empty.bin", vec![]),
            ("scenario/TextData.bin", b"PJADV_TF0001 some text".to_vec()),
            ("bg01.png", (0..=255).collect()),
        ];
        for version in &[GameDatVersion::V1, GameDatVersion::V2] {
            let mut output = Cursor::new(Vec::new());
            let written_entries = {
                let options = ArchiveOptions { version: *version };
                let mut builder = GameDatArchiveBuilder::new(&mut output, options);
                for (name, content) in &expected_content {
                    builder.append_bytes(*name, content.clone());
                }
                builder.finish().unwrap()
            };
            let mut archive = GameDatArchive::new(Cursor::new(output.into_inner())).unwrap();
            assert_eq!(archive.version(), *version);
            assert_eq!(archive.file_count(), expected_content.len());
            let entries: Vec<GameDatFileEntry> = archive.get_entries().cloned().collect();
            assert_eq!(entries, written_entries);
            for (entry, (name, content)) in entries.iter().zip(&expected_content) {
                assert_eq!(entry.name, base_file_name(name));
                assert_eq!(entry.size as usize, content.len());
                assert_eq!(&archive.read_entry(entry).unwrap(), content);
            }
        }
    }

    #[test]
    fn test_file_sources() {
        let temp_dir = tempdir().unwrap();
        let data_dir = temp_dir.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();
        std::fs::write(data_dir.join("data1.bin"), vec![1_u8, 2, 3]).unwrap();
        std::fs::write(data_dir.join("textdata.bin"), b"PJADV_TF").unwrap();
        let output_path = temp_dir.path().join("builder.pac");
        {
            let output_file = File::create(&output_path).unwrap();
            let mut builder = GameDatArchiveBuilder::new(output_file, ArchiveOptions::default());
            builder.append_file(data_dir.join("data1.bin"));
            builder.append_file(data_dir.join("textdata.bin"));
            let entries = builder.finish().unwrap();
            assert_eq!(entries[0].name, "data1.bin");
            assert_eq!(entries[1].name, "textdata.bin");
        }
        let mut archive = GameDatArchive::open(&output_path).unwrap();
        assert_eq!(archive.version(), GameDatVersion::V2);
        assert_eq!(
            archive.read_file_content("data1.bin").unwrap(),
            vec![1_u8, 2, 3]
        );
        assert_eq!(
            archive.read_file_content("textdata.bin").unwrap().as_slice(),
            b"PJADV_TF"
        );
        let raw = archive.get_entry_raw_data("textdata.bin").unwrap();
        assert_eq!(&raw[..5], &TEXT_DATA_SIGNATURE);
    }

    #[test]
    fn test_missing_file_source() {
        let temp_dir = tempdir().unwrap();
        let mut output = Cursor::new(Vec::new());
        let mut builder = GameDatArchiveBuilder::new(&mut output, v1_options());
        builder.append_file(temp_dir.path().join("missing.bin"));
        assert!(matches!(
            builder.finish().unwrap_err(),
            GameDatError::IoError(_)
        ));
    }

    #[test]
    fn test_name_too_long() {
        let mut output = Cursor::new(Vec::new());
        let mut builder = GameDatArchiveBuilder::new(&mut output, v1_options());
        builder.append_bytes("a_rather_long_name.bin", vec![0]);
        assert!(matches!(
            builder.finish().unwrap_err(),
            GameDatError::InvalidFileName { .. }
        ));
        // Fits with version 2
        let mut output = Cursor::new(Vec::new());
        let mut builder = GameDatArchiveBuilder::new(&mut output, ArchiveOptions::default());
        builder.append_bytes("a_rather_long_name.bin", vec![0]);
        builder.finish().unwrap();
    }

    #[test]
    fn test_empty_archive() {
        let mut output = Cursor::new(Vec::new());
        let mut builder = GameDatArchiveBuilder::new(&mut output, ArchiveOptions::default());
        assert!(matches!(
            builder.finish().unwrap_err(),
            GameDatError::CorruptDirectory(_)
        ));
    }

    #[test]
    fn test_progress() {
        let mut output = Cursor::new(Vec::new());
        let mut builder = GameDatArchiveBuilder::new(&mut output, ArchiveOptions::default());
        builder.append_bytes("data1.bin", vec![1]);
        builder.append_bytes("data2.bin", vec![2]);
        let mut ticks: Vec<(usize, Option<String>)> = Vec::new();
        builder
            .finish_with_progress(|total, item| {
                ticks.push((total, item.map(String::from)));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            ticks,
            vec![
                (4, None),
                (4, Some("data1.bin".to_string())),
                (4, Some("data2.bin".to_string())),
                (4, None),
            ]
        );
        // Already written, nothing happens
        let mut calls = 0;
        let entries = builder
            .finish_with_progress(|_, _| {
                calls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_progress_abort() {
        let mut output = Cursor::new(Vec::new());
        let mut builder = GameDatArchiveBuilder::new(&mut output, ArchiveOptions::default());
        builder.append_bytes("data1.bin", vec![1]);
        builder.append_bytes("data2.bin", vec![2]);
        let result = builder.finish_with_progress(|_, item| match item {
            Some("data2.bin") => Err(GameDatError::Aborted),
            _ => Ok(()),
        });
        assert!(matches!(result.unwrap_err(), GameDatError::Aborted));
    }

    #[test]
    fn test_entry_size_limit() {
        assert_eq!(check_entry_size("a", 0x40, 10).unwrap(), 10);
        assert!(check_entry_size("a", 0, u32::MAX as u64).is_ok());
        assert!(matches!(
            check_entry_size("a", 0x40, u32::MAX as u64).unwrap_err(),
            GameDatError::FileSizeLimit(_)
        ));
        assert!(matches!(
            check_entry_size("a", 0, u32::MAX as u64 + 1).unwrap_err(),
            GameDatError::FileSizeLimit(_)
        ));
    }
}
