use std::convert::TryFrom;

use serde::Deserialize;

use crate::{GameDatError, Result};

pub const GAMEDAT_HEADER_MAGIC: &[u8; 11] = b"GAMEDAT PAC";
pub const GAMEDAT_HEADER_SIZE: usize = 0x10;
pub const MAX_ENTRY_COUNT: i32 = 0x000F_FFFF;
// Entries whose payload may be obfuscated
const TEXT_DATA_SUFFIX: &[u8] = b"textdata.bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameDatVersion {
    V1,
    V2,
}

impl GameDatVersion {
    pub fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            b'K' => Some(Self::V1),
            b'2' => Some(Self::V2),
            _ => None,
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            Self::V1 => b'K',
            Self::V2 => b'2',
        }
    }

    pub fn name_length(self) -> usize {
        match self {
            Self::V1 => 16,
            Self::V2 => 32,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl TryFrom<u8> for GameDatVersion {
    type Error = GameDatError;

    fn try_from(version: u8) -> Result<Self> {
        match version {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            v => Err(GameDatError::UnsupportedVersion(v)),
        }
    }
}

impl Default for GameDatVersion {
    fn default() -> Self {
        Self::V2
    }
}

/// Creation options, read by the builder to pick the output layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ArchiveOptions {
    #[serde(default, deserialize_with = "deserialize_version")]
    pub version: GameDatVersion,
}

fn deserialize_version<'de, D>(deserializer: D) -> std::result::Result<GameDatVersion, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let number = u8::deserialize(deserializer)?;
    GameDatVersion::try_from(number).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDatFileEntry {
    pub name: String,
    pub offset: u64,
    // Note: u32 limited by the index table
    pub size: u32,
}

impl GameDatFileEntry {
    pub fn is_text_data(&self) -> bool {
        is_text_data_name(&self.name)
    }
}

/// Checks whether `name` ends with "textdata.bin", ignoring ASCII case
pub fn is_text_data_name(name: &str) -> bool {
    let name = name.as_bytes();
    name.len() >= TEXT_DATA_SUFFIX.len()
        && name[name.len() - TEXT_DATA_SUFFIX.len()..].eq_ignore_ascii_case(TEXT_DATA_SUFFIX)
}

/// Strips any directory component, accepting both separators.
pub fn base_file_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_selector() {
        assert_eq!(GameDatVersion::from_selector(b'K'), Some(GameDatVersion::V1));
        assert_eq!(GameDatVersion::from_selector(b'2'), Some(GameDatVersion::V2));
        assert_eq!(GameDatVersion::from_selector(b'1'), None);
        assert_eq!(GameDatVersion::from_selector(b'k'), None);
        assert_eq!(GameDatVersion::V1.name_length(), 16);
        assert_eq!(GameDatVersion::V2.name_length(), 32);
    }

    #[test]
    fn test_is_text_data_name() {
        assert!(is_text_data_name("textdata.bin"));
        assert!(is_text_data_name("TEXTDATA.BIN"));
        assert!(is_text_data_name("scenario_textdata.bin"));
        assert!(!is_text_data_name("textdata.bin.bak"));
        assert!(!is_text_data_name("data.bin"));
        assert!(!is_text_data_name(""));
    }

    #[test]
    fn test_base_file_name() {
        assert_eq!(base_file_name("textdata.bin"), "textdata.bin");
        assert_eq!(base_file_name("data/script/textdata.bin"), "textdata.bin");
        assert_eq!(base_file_name("data\\graphic\\bg01.png"), "bg01.png");
    }

    #[test]
    fn test_archive_options() {
        assert_eq!(ArchiveOptions::default().version, GameDatVersion::V2);
        assert_eq!(GameDatVersion::try_from(1).unwrap(), GameDatVersion::V1);
        assert!(matches!(
            GameDatVersion::try_from(3).unwrap_err(),
            GameDatError::UnsupportedVersion(3)
        ));
    }
}
