use crate::archive::{GameDatVersion, GAMEDAT_HEADER_SIZE};

// Relative offset (u32) + size (u32)
pub const INDEX_ENTRY_SIZE: u64 = 2 * std::mem::size_of::<u32>() as u64;

/// Region offsets of a GAMEDAT archive, derived from its version and
/// entry count only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameDatLayout {
    pub name_length: usize,
    pub name_table_offset: u64,
    pub index_table_offset: u64,
    pub data_offset: u64,
}

impl GameDatLayout {
    pub fn new(version: GameDatVersion, entry_count: u32) -> Self {
        let name_length = version.name_length();
        let name_table_offset = GAMEDAT_HEADER_SIZE as u64;
        let index_table_offset = name_table_offset + name_length as u64 * entry_count as u64;
        let data_offset = index_table_offset + INDEX_ENTRY_SIZE * entry_count as u64;
        Self {
            name_length,
            name_table_offset,
            index_table_offset,
            data_offset,
        }
    }

    pub fn name_table_size(&self) -> u64 {
        self.index_table_offset - self.name_table_offset
    }

    pub fn index_table_size(&self) -> u64 {
        self.data_offset - self.index_table_offset
    }
}
