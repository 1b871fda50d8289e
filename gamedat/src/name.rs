use encoding::label::encoding_from_whatwg_label;
use encoding::types::EncodingRef;
use encoding::{DecoderTrap, EncoderTrap};

use crate::{GameDatError, Result};

// Code page 932, the only charset GAMEDAT names are stored in
const NAME_ENCODING_LABEL: &str = "shift_jis";

/// Fixed-width, NUL-padded name field codec.
///
/// Names are stored as Shift_JIS bytes padded with zeros up to the field
/// width. A name filling the whole field carries no terminator.
#[derive(Clone, Copy)]
pub struct NameCodec {
    width: usize,
    encoding: EncodingRef,
}

impl NameCodec {
    pub fn new(width: usize) -> Result<Self> {
        let encoding = encoding_from_whatwg_label(NAME_ENCODING_LABEL)
            .ok_or_else(|| GameDatError::corrupt_directory("Name encoding unavailable"))?;
        Ok(Self { width, encoding })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Serializes `name` into exactly `width` bytes.
    ///
    /// Fails if a character has no Shift_JIS mapping or if the encoded
    /// name does not fit in the field.
    pub fn encode(&self, name: &str) -> Result<Vec<u8>> {
        let mut field = self
            .encoding
            .encode(name, EncoderTrap::Strict)
            .map_err(|e| GameDatError::invalid_file_name(name, e))?;
        if field.len() > self.width {
            return Err(GameDatError::invalid_file_name(
                name,
                format!(
                    "encoded name is {} bytes long, field holds {}",
                    field.len(),
                    self.width
                ),
            ));
        }
        field.resize(self.width, 0);
        Ok(field)
    }

    /// Decodes a name field, stopping at the first NUL byte.
    ///
    /// Byte sequences without a Shift_JIS mapping are replaced with U+FFFD,
    /// a name never makes a directory unreadable.
    pub fn decode(&self, field: &[u8]) -> Result<String> {
        let field = &field[..field.len().min(self.width)];
        let name_len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        self.encoding
            .decode(&field[..name_len], DecoderTrap::Replace)
            .map_err(|e| GameDatError::corrupt_directory(format!("Invalid entry name: {}", e)))
    }
}

impl std::fmt::Debug for NameCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameCodec")
            .field("width", &self.width)
            .field("encoding", &self.encoding.name())
            .finish()
    }
}
