pub mod codec;
pub mod config;
pub mod filesystem;
pub mod target;

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub use codec::{Record, RecordReader, SIZE_WORD};
pub use config::{Config, ConfigStorage, GeneralConfig, LoggingConfig, TomlConfigStorage};
pub use filesystem::{Filesystem, StdFilesystem};
pub use target::{DEFAULT_EXTENSION, PersistenceTarget};

/// Default locations used by the recipe binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDirs {
    /// Folder for recipe files when none is configured
    pub recipes: PathBuf,
    /// Default configuration file
    pub config_file: PathBuf,
}

/// Resolve and create the default recipe and config locations
///
/// XDG Base Directory Specification:
/// - Recipes: $XDG_DATA_HOME/recipe/recipes (default: ~/.local/share/recipe/recipes)
/// - Config: $XDG_CONFIG_HOME/recipe/recipe.toml (default: ~/.config/recipe/recipe.toml)
pub fn ensure_directories() -> Result<RecipeDirs> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    let home_path = PathBuf::from(home);

    let data_root = env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_path.join(".local/share"));
    let config_root = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_path.join(".config"));

    ensure_directories_under(&data_root, &config_root)
}

/// Create `<data_root>/recipe/recipes` and `<config_root>/recipe`
/// The config file itself is left to [`ConfigStorage::load`]
pub fn ensure_directories_under(data_root: &Path, config_root: &Path) -> Result<RecipeDirs> {
    let recipes = data_root.join("recipe").join("recipes");
    let config_dir = config_root.join("recipe");

    fs::create_dir_all(&recipes)
        .with_context(|| format!("Failed to create recipe directory {:?}", recipes))?;
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

    log::debug!("Recipe directory: {:?}", recipes);
    log::debug!("Config directory: {:?}", config_dir);

    Ok(RecipeDirs {
        recipes,
        config_file: config_dir.join("recipe.toml"),
    })
}
