//! Reader and builder for GAMEDAT PAC archives, the resource containers of
//! the Pajamas Adventure System.

pub mod archive;
pub mod builder;
pub mod crypto;
mod error;
pub mod layout;
pub mod name;
pub mod reader;
pub mod registry;

pub use archive::{ArchiveOptions, GameDatFileEntry, GameDatVersion};
pub use builder::{FileSource, GameDatArchiveBuilder, MemorySource, PackSource};
pub use error::{GameDatError, Result};
pub use reader::GameDatArchive;
pub use registry::{FormatDescriptor, FormatRegistry};
