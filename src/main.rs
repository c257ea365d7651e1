use anyhow::{Context, Result, bail};
use bytemuck::{Pod, Zeroable};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use recipe::Recipe;
use recipe::logging;
use recipe::storage::{
    Config, ConfigStorage, PersistenceTarget, RecordReader, StdFilesystem, TomlConfigStorage,
    ensure_directories,
};

/// Demo payload; explicit padding keeps it free of uninitialized bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct TestStruct {
    long1: i64,
    long2: i64,
    int1: i32,
    int2: i32,
    int3: i32,
    float1: f32,
    float2: f32,
    bool1: u8,
    bool2: u8,
    _pad: [u8; 2],
}

#[derive(Parser)]
#[command(name = "recipe")]
#[command(about = "Persist application variables in binary recipe files", long_about = None)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/recipe/recipe.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the demo variables, print them, assign new values and save
    Demo(LocationArgs),

    /// List the records stored in a recipe file
    Inspect {
        /// Recipe file to read
        path: PathBuf,

        /// Number of data bytes to preview per record
        #[arg(short, long, default_value = "16")]
        bytes: usize,
    },

    /// Print the resolved recipe file path
    Path(LocationArgs),

    /// Store recipe location and logging defaults in the config file
    Configure {
        #[command(flatten)]
        location: LocationArgs,

        /// Log file path (empty string: log to stderr)
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Log level for the log file
        #[arg(long)]
        log_level: Option<String>,
    },
}

#[derive(Args)]
struct LocationArgs {
    /// Recipe directory
    #[arg(short, long)]
    folder: Option<String>,

    /// Recipe file extension
    #[arg(short, long)]
    extension: Option<String>,

    /// Recipe file base name
    #[arg(short, long)]
    name: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = ensure_directories()?;
    let config_storage = TomlConfigStorage::new(cli.config.unwrap_or(dirs.config_file));
    let config = config_storage.load()?;

    // Initialize logging
    match &config.logging.file {
        Some(log_file) => logging::init_logger(log_file.clone(), &config.logging.level)?,
        None => env_logger::init(),
    }

    let default_folder = dirs.recipes;

    match cli.command {
        Some(Commands::Demo(location)) => {
            cmd_demo(resolve_target(&location, &config, &default_folder))
        }
        Some(Commands::Inspect { path, bytes }) => cmd_inspect(&path, bytes),
        Some(Commands::Path(location)) => {
            let target = resolve_target(&location, &config, &default_folder);
            println!("{}", target.full_path().display());
            Ok(())
        }
        Some(Commands::Configure {
            location,
            log_file,
            log_level,
        }) => cmd_configure(&config_storage, config, location, log_file, log_level),
        None => {
            println!("No command given. Use --help for available commands.");
            Ok(())
        }
    }
}

/// Command line flags win over the config file; an empty folder falls back to the data directory
fn resolve_target(
    location: &LocationArgs,
    config: &Config,
    default_folder: &Path,
) -> PersistenceTarget {
    let general = &config.general;
    let name = location.name.as_deref().unwrap_or(&general.name);
    let extension = location.extension.as_deref().unwrap_or(&general.extension);
    let folder = match location.folder.as_deref().unwrap_or(&general.folder) {
        "" => default_folder.to_string_lossy().into_owned(),
        folder => folder.to_string(),
    };

    PersistenceTarget::new(name, &folder, extension)
}

/// Merge the given settings into the config file
fn cmd_configure(
    storage: &TomlConfigStorage,
    mut config: Config,
    location: LocationArgs,
    log_file: Option<PathBuf>,
    log_level: Option<String>,
) -> Result<()> {
    if let Some(name) = location.name {
        config.general.name = name;
    }
    if let Some(folder) = location.folder {
        config.general.folder = folder;
    }
    if let Some(extension) = location.extension {
        config.general.extension = extension;
    }
    if let Some(log_file) = log_file {
        config.logging.file = (!log_file.as_os_str().is_empty()).then_some(log_file);
    }
    if let Some(level) = log_level {
        config.logging.level = level;
    }

    storage.save(&config)?;
    println!("Saved configuration to {:?}", storage.path());
    Ok(())
}

/// Round-trip a handful of variables through a recipe file
fn cmd_demo(target: PersistenceTarget) -> Result<()> {
    let mut integer: i32 = 0;
    let mut long_thing: i64 = 0;
    let mut test = TestStruct::default();

    let mut recipe = Recipe::with_filesystem(target, StdFilesystem);
    if !recipe.add_value("integer", &mut integer) {
        bail!("Failed to register variable 'integer'");
    }
    if !recipe.add_value("long thing", &mut long_thing) {
        bail!("Failed to register variable 'long thing'");
    }
    if !recipe.add_value("test_struct", &mut test) {
        bail!("Failed to register variable 'test_struct'");
    }

    if !recipe.init() {
        bail!("Failed to initialize recipe at {:?}", recipe.path());
    }

    match recipe.try_load() {
        Ok(report) => println!(
            "Load {:?}: ok ({} applied, {} unknown, {} size mismatch)",
            recipe.path(),
            report.applied,
            report.skipped_unknown,
            report.skipped_size_mismatch
        ),
        Err(e) => println!("Load {:?}: failed ({})", recipe.path(), e),
    }
    print_values(&recipe);

    if let Some(i) = recipe.value_mut::<i32>("integer") {
        *i = 69;
    }
    if let Some(l) = recipe.value_mut::<i64>("long thing") {
        *l = 6969;
    }
    if let Some(t) = recipe.value_mut::<TestStruct>("test_struct") {
        *t = TestStruct {
            long1: 21,
            long2: 22,
            int1: 11,
            int2: 12,
            int3: 13,
            float1: 3.1,
            float2: 3.2,
            bool1: 0,
            bool2: 1,
            _pad: [0; 2],
        };
    }

    let saved = recipe.save();
    println!("Save {:?}: {}", recipe.path(), saved);
    print_values(&recipe);

    Ok(())
}

fn print_values(recipe: &Recipe<'_>) {
    if let Some(i) = recipe.value::<i32>("integer") {
        println!("integer: {}", i);
    }
    if let Some(l) = recipe.value::<i64>("long thing") {
        println!("long thing: {}", l);
    }
    if let Some(t) = recipe.value::<TestStruct>("test_struct") {
        println!("test_struct: {:?}", t);
    }
}

/// Dump the records of a recipe file
fn cmd_inspect(path: &Path, preview_bytes: usize) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;

    println!("Records in {:?}:", path);
    println!("{}", "=".repeat(60));

    let mut count = 0;
    for record in RecordReader::new(BufReader::new(file)) {
        let record = record.with_context(|| format!("Failed to decode {:?}", path))?;
        count += 1;

        let preview: Vec<String> = record
            .data
            .iter()
            .take(preview_bytes)
            .map(|b| format!("{:02x}", b))
            .collect();
        let ellipsis = if record.data.len() > preview_bytes { " ..." } else { "" };

        println!(
            "{:3}. @{:<6} {:<20} {:>6} bytes{} [{}{}]",
            count,
            record.offset,
            String::from_utf8_lossy(&record.id),
            record.data.len(),
            if record.padded { " +pad" } else { "" },
            preview.join(" "),
            ellipsis
        );
    }

    if count == 0 {
        println!("(empty - no records)");
    }

    Ok(())
}
