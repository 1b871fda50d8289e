use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use gamedat::ArchiveOptions;
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct PackDefinition {
    #[serde(flatten)]
    pub options: ArchiveOptions,
    pub entries: Vec<PackEntry>,
}

#[derive(Deserialize, Clone)]
pub struct PackEntry {
    pub path: String,
}

pub fn parse_pack_definition(file_path: impl AsRef<Path>) -> Result<PackDefinition> {
    let file = File::open(file_path)?;
    let file_reader = BufReader::new(file);
    let pack_definition = serde_yaml::from_reader(file_reader).context("Invalid configuration")?;
    Ok(pack_definition)
}
