mod pack_definition;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, Context, Result};
use gamedat::archive::base_file_name;
use gamedat::{FormatRegistry, GameDatArchive, GameDatArchiveBuilder, GameDatFileEntry};
use log::LevelFilter;
use pack_definition::{parse_pack_definition, PackDefinition};
use simple_logger::SimpleLogger;
use structopt::StructOpt;
use walkdir::WalkDir;

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const PKG_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[derive(Debug, StructOpt)]
#[structopt(name = PKG_NAME, about = PKG_DESCRIPTION, author = PKG_AUTHORS)]
struct Opt {
    #[structopt(short, long, help = "Enable verbose logging")]
    verbose: bool,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(about = "List the entries of an archive")]
    List {
        #[structopt(parse(from_os_str), help = "Path to a GAMEDAT archive")]
        archive: PathBuf,
    },
    #[structopt(about = "Extract entries from an archive")]
    Extract {
        #[structopt(parse(from_os_str), help = "Path to a GAMEDAT archive")]
        archive: PathBuf,
        #[structopt(
            parse(from_os_str),
            short,
            long,
            help = "Path to the output directory (default: current working directory)"
        )]
        output_directory: Option<PathBuf>,
        #[structopt(help = "Names of the entries to extract (default: all entries)")]
        names: Vec<String>,
    },
    #[structopt(about = "Create an archive from a pack definition")]
    Create {
        #[structopt(parse(from_os_str), help = "Path to a pack definition file")]
        pack_definition_file: PathBuf,
        #[structopt(
            parse(from_os_str),
            short = "d",
            long,
            help = "Path to the directory that contains pack data (default: current working directory)"
        )]
        pack_data_directory: Option<PathBuf>,
        #[structopt(
            parse(from_os_str),
            short,
            long,
            help = "Path to the output archive (default: <pack_definition_file_name>.pac)"
        )]
        output_file: Option<PathBuf>,
    },
}

fn run(cli_args: Opt) -> Result<()> {
    match cli_args.command {
        Command::List { archive } => list_archive(&archive),
        Command::Extract {
            archive,
            output_directory,
            names,
        } => {
            let output_directory = output_directory.unwrap_or_else(|| PathBuf::from("."));
            extract_archive(&archive, &output_directory, &names)
        }
        Command::Create {
            pack_definition_file,
            pack_data_directory,
            output_file,
        } => {
            let pack_data_directory = pack_data_directory.unwrap_or_else(|| PathBuf::from("."));
            let output_file_path = match output_file {
                Some(v) => v,
                None => PathBuf::from(
                    pack_definition_file
                        .with_extension("pac")
                        .file_name()
                        .ok_or_else(|| anyhow!("Invalid pack definition file name"))?,
                ),
            };
            create_archive(&pack_definition_file, &pack_data_directory, &output_file_path)
        }
    }
}

fn open_archive(archive_path: &Path) -> Result<GameDatArchive<File>> {
    let mut file = File::open(archive_path)?;
    let mut signature = Vec::with_capacity(4);
    file.by_ref().take(4).read_to_end(&mut signature)?;
    let registry = FormatRegistry::with_builtin_formats();
    let format = registry
        .detect(&signature)
        .next()
        .ok_or_else(|| anyhow!("Unknown archive format"))?;
    log::trace!("Detected format: {}", format.description);

    match GameDatArchive::try_open(file)? {
        Some(archive) => Ok(archive),
        None => Err(anyhow!("Not a {} archive", format.tag)),
    }
}

fn list_archive(archive_path: &Path) -> Result<()> {
    let archive = open_archive(archive_path)
        .with_context(|| format!("Failed to open '{}'", archive_path.to_string_lossy()))?;
    log::info!(
        "Version {}, {} entries",
        archive.version().number(),
        archive.file_count()
    );
    for entry in archive.get_entries() {
        log::info!("{:<32} {:#010x} {:>10}", entry.name, entry.offset, entry.size);
    }
    Ok(())
}

fn extract_archive(archive_path: &Path, output_directory: &Path, names: &[String]) -> Result<()> {
    let mut archive = open_archive(archive_path)
        .with_context(|| format!("Failed to open '{}'", archive_path.to_string_lossy()))?;
    let entries: Vec<GameDatFileEntry> = if names.is_empty() {
        archive.get_entries().cloned().collect()
    } else {
        names
            .iter()
            .map(|name| {
                archive
                    .get_file_entry(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("Entry '{}' not found", name))
            })
            .collect::<Result<_>>()?
    };

    fs::create_dir_all(output_directory)?;
    let extracted_count = entries.len();
    let mut written_paths = HashSet::new();
    for entry in entries {
        // Names come from the archive, never let them escape the output directory
        let destination_path = output_directory.join(base_file_name(&entry.name));
        log::trace!(
            "Extracting '{}' to '{}'",
            entry.name,
            destination_path.to_string_lossy()
        );
        if !written_paths.insert(destination_path.clone()) {
            log::warn!(
                "'{}' appears more than once, overwriting '{}'",
                entry.name,
                destination_path.to_string_lossy()
            );
        }
        extract_entry(&mut archive, &entry, &destination_path)
            .with_context(|| format!("Failed to extract '{}'", entry.name))?;
    }
    log::info!(
        "Extracted {} entries to '{}'",
        extracted_count,
        output_directory.to_string_lossy()
    );
    Ok(())
}

/// Streams the given entry, duplicates included, to `destination_path`
fn extract_entry(
    archive: &mut GameDatArchive<File>,
    entry: &GameDatFileEntry,
    destination_path: &Path,
) -> Result<()> {
    let mut file = File::create(destination_path)?;
    let mut content = archive.open_entry(entry)?;
    io::copy(&mut content, &mut file)?;
    Ok(())
}

fn create_archive(
    pack_definition_file: &Path,
    pack_data_directory: &Path,
    output_file_path: &Path,
) -> Result<()> {
    log::info!("Processing '{}'", pack_definition_file.to_string_lossy());
    let pack_definition = parse_pack_definition(pack_definition_file)
        .context("Failed to parse the pack definition")?;
    log::info!("Version: {}", pack_definition.options.version.number());

    generate_archive_from_definition(pack_definition, pack_data_directory, output_file_path)
        .context("Failed to generate archive from definition")?;
    log::info!(
        "Archive generated at '{}'",
        output_file_path.to_string_lossy()
    );
    Ok(())
}

fn generate_archive_from_definition<P1, P2>(
    pack_definition: PackDefinition,
    pack_data_directory: P1,
    output_path: P2,
) -> Result<Vec<GameDatFileEntry>>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    let output_file = File::create(output_path)?;
    let mut archive_builder = GameDatArchiveBuilder::new(output_file, pack_definition.options);
    for entry in pack_definition.entries {
        let native_path = pack_data_directory.as_ref().join(&entry.path);
        if native_path.is_file() {
            log::trace!("'{}' will be PACKED", &entry.path);
            archive_builder.append_file(native_path);
        } else if native_path.is_dir() {
            append_directory(&mut archive_builder, native_path)?;
        } else {
            return Err(anyhow!(
                "Path '{}' is invalid or does not exist",
                native_path.to_string_lossy()
            ));
        }
    }
    let entries = archive_builder.finish_with_progress(|total_steps, item| {
        if let Some(name) = item {
            log::trace!("[{}] Writing '{}'", total_steps, name);
        }
        Ok(())
    })?;
    Ok(entries)
}

fn append_directory<P: AsRef<Path>>(
    archive_builder: &mut GameDatArchiveBuilder<File>,
    directory_path: P,
) -> Result<()> {
    let walker = WalkDir::new(directory_path)
        .follow_links(false)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            log::trace!("'{}' will be PACKED", entry.path().to_string_lossy());
            archive_builder.append_file(entry.path());
        }
    }
    Ok(())
}

fn main() {
    const SUCCESS_EXIT_CODE: i32 = 0;
    const FAILURE_EXIT_CODE: i32 = 1;

    // Parse CLI arguments
    let cli_args = Opt::from_args();
    // Initialize the logger
    init_logger(cli_args.verbose).expect("Failed to initalize the logger");

    // Run the actual program
    let result = run(cli_args);
    match result {
        Ok(()) => {
            process::exit(SUCCESS_EXIT_CODE);
        }
        Err(err) => {
            log::error!("{:#}", err);
            process::exit(FAILURE_EXIT_CODE);
        }
    }
}

fn init_logger(verbose: bool) -> Result<()> {
    let level_filter = if verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };

    SimpleLogger::new()
        .with_level(LevelFilter::Off)
        .with_module_level(PKG_NAME, level_filter)
        .with_module_level("gamedat", level_filter)
        .init()?;
    Ok(())
}
