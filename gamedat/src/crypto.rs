/// Leading bytes of an obfuscated PJADV text data payload
pub const TEXT_DATA_SIGNATURE: [u8; 5] = [0x95, 0x6B, 0x3C, 0x9D, 0x63];

const INITIAL_KEY: u8 = 0xC5;
const KEY_STEP: u8 = 0x5C;

/// Additive single-byte XOR stream used on "textdata.bin" payloads.
///
/// The key sequence depends on the position only, so applying the cipher
/// twice from a fresh state restores the input. State is kept between calls
/// to `apply` so a payload can be processed in chunks.
#[derive(Debug, Clone)]
pub struct TextDataCipher {
    key: u8,
}

impl TextDataCipher {
    pub fn new() -> Self {
        Self { key: INITIAL_KEY }
    }

    pub fn apply(&mut self, data: &mut [u8]) {
        for b in data {
            *b ^= self.key;
            self.key = self.key.wrapping_add(KEY_STEP);
        }
    }
}

impl Default for TextDataCipher {
    fn default() -> Self {
        Self::new()
    }
}

pub fn has_text_data_signature(data: &[u8]) -> bool {
    data.starts_with(&TEXT_DATA_SIGNATURE)
}

/// Restores plain text data if `data` is in obfuscated form.
/// Returns true if the payload was transformed.
pub fn decrypt_text_data(data: &mut [u8]) -> bool {
    if !has_text_data_signature(data) {
        return false;
    }
    TextDataCipher::new().apply(data);
    true
}

/// Obfuscates `data` unless it already is.
/// Returns true if the payload was transformed.
pub fn encrypt_text_data(data: &mut [u8]) -> bool {
    if has_text_data_signature(data) {
        return false;
    }
    TextDataCipher::new().apply(data);
    true
}
