use std::convert::TryInto;

/// Static description of an archive format a host can pick a codec from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub tag: &'static str,
    pub description: &'static str,
    /// First four bytes of the file, read as a little-endian u32
    pub signature: u32,
    pub extensions: &'static [&'static str],
    pub can_write: bool,
    pub is_hierarchic: bool,
}

impl FormatDescriptor {
    pub fn matches_signature(&self, data: &[u8]) -> bool {
        read_signature(data) == Some(self.signature)
    }

    pub fn matches_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

pub fn gamedat_descriptor() -> FormatDescriptor {
    FormatDescriptor {
        tag: "GAMEDAT",
        description: "Pajamas Adventure System resource archive",
        signature: 0x454D_4147, // "GAME"
        extensions: &["dat", "pak"],
        can_write: true,
        is_hierarchic: false,
    }
}

fn read_signature(data: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Explicit list of known formats, consulted in registration order.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: Vec<FormatDescriptor>,
}

impl FormatRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every format this crate implements
    pub fn with_builtin_formats() -> Self {
        let mut registry = Self::empty();
        registry.register(gamedat_descriptor());
        registry
    }

    pub fn register(&mut self, descriptor: FormatDescriptor) {
        self.formats.push(descriptor);
    }

    pub fn formats(&self) -> impl Iterator<Item = &'_ FormatDescriptor> {
        self.formats.iter()
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| f.tag.eq_ignore_ascii_case(tag))
    }

    pub fn find_by_extension(&self, extension: &str) -> impl Iterator<Item = &'_ FormatDescriptor> {
        let extension = extension.to_string();
        self.formats
            .iter()
            .filter(move |f| f.matches_extension(&extension))
    }

    /// Candidate formats for a file starting with `data`
    pub fn detect(&self, data: &[u8]) -> impl Iterator<Item = &'_ FormatDescriptor> {
        let signature = read_signature(data);
        self.formats
            .iter()
            .filter(move |f| signature == Some(f.signature))
    }
}
