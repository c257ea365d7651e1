//! Recipe: a set of application variables linked to a binary file
//!
//! Register variables with [`Recipe::add_variable`] or [`Recipe::add_value`], call
//! [`Recipe::init`] to make sure the backing file exists, then [`Recipe::load`] and
//! [`Recipe::save`] as often as needed.
//!
//! # Schema drift
//!
//! Variables may be added to or removed from a recipe between runs. Records in the
//! file without a matching variable are ignored, and variables without a record keep
//! their current value. A record whose length differs from the registered variable
//! (say an `i32` that became an `i64`) is skipped and the variable is left alone.
//!
//! Records with the *same* length are always copied, even if the variable's type
//! changed underneath. Reordering the fields of a struct, or turning a `u32` into an
//! `f32`, loads the old bytes into the new layout without complaint. Rename the
//! identifier when a variable changes meaning.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytemuck::Pod;

use crate::error::{RecipeError, RecipeResult};
use crate::models::VariableRegistry;
use crate::storage::codec::{self, RecordReader};
use crate::storage::filesystem::{Filesystem, StdFilesystem};
use crate::storage::target::{DEFAULT_EXTENSION, PersistenceTarget};

/// Whether load and save are currently allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    #[default]
    Stopped,
    Ready,
}

/// Outcome of a successful load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records copied into a registered variable
    pub applied: usize,
    /// Records with no registered variable
    pub skipped_unknown: usize,
    /// Records whose length differs from the registered variable
    pub skipped_size_mismatch: usize,
}

impl LoadReport {
    pub fn records(&self) -> usize {
        self.applied + self.skipped_unknown + self.skipped_size_mismatch
    }
}

/// A set of variables bound to a recipe file
///
/// The recipe borrows every registered variable for `'a`; the variables become
/// accessible to the rest of the program again once the recipe is dropped, or through
/// [`Recipe::variable_mut`] and [`Recipe::value_mut`] in the meantime.
pub struct Recipe<'a, F: Filesystem = StdFilesystem> {
    target: PersistenceTarget,
    registry: VariableRegistry<'a>,
    readiness: Readiness,
    fs: F,
}

impl<'a> Recipe<'a, StdFilesystem> {
    /// Recipe with a blank name, no folder and the default extension
    /// A name must be set before [`Recipe::init`] succeeds
    pub fn new() -> Self {
        Recipe::with_filesystem(PersistenceTarget::default(), StdFilesystem)
    }

    pub fn with_name(name: &str) -> Self {
        Recipe::with_location(name, "", DEFAULT_EXTENSION)
    }

    pub fn with_location(name: &str, folder: &str, extension: &str) -> Self {
        Recipe::with_filesystem(PersistenceTarget::new(name, folder, extension), StdFilesystem)
    }
}

impl Default for Recipe<'_, StdFilesystem> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, F: Filesystem> Recipe<'a, F> {
    pub fn with_filesystem(target: PersistenceTarget, fs: F) -> Self {
        Recipe {
            target,
            registry: VariableRegistry::new(),
            readiness: Readiness::Stopped,
            fs,
        }
    }

    // === Lifecycle ===

    /// Make sure the recipe file exists, creating it and its directories if needed
    /// Returns true when load and save are available
    pub fn init(&mut self) -> bool {
        report("init", self.try_init())
    }

    pub fn try_init(&mut self) -> RecipeResult<()> {
        if self.target.base_name().is_empty() {
            return Err(RecipeError::NameNotSet);
        }

        let path = self.path();
        match self.ensure_file(&path) {
            Ok(()) => {
                self.readiness = Readiness::Ready;
                Ok(())
            }
            Err(e) => {
                self.readiness = Readiness::Stopped;
                Err(e)
            }
        }
    }

    fn ensure_file(&self, path: &Path) -> RecipeResult<()> {
        if self.fs.exists(path) {
            log::debug!("Using existing recipe file {:?}", path);
            return Ok(());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs
                .create_directories(parent)
                .map_err(|e| RecipeError::io(parent, e))?;
        }
        self.fs
            .create_empty_file(path)
            .map_err(|e| RecipeError::io(path, e))?;

        log::info!("Created recipe file {:?}", path);
        Ok(())
    }

    /// Block load and save until the next [`Recipe::init`]
    pub fn stop(&mut self) {
        self.readiness = Readiness::Stopped;
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    // === Location ===

    /// Full path of the recipe file
    pub fn path(&self) -> PathBuf {
        self.target.full_path()
    }

    pub fn name(&self) -> &str {
        self.target.base_name()
    }

    pub fn folder(&self) -> &str {
        self.target.folder()
    }

    pub fn extension(&self) -> &str {
        self.target.extension()
    }

    pub fn target(&self) -> &PersistenceTarget {
        &self.target
    }

    /// Set the file base name; stops the recipe
    pub fn set_name(&mut self, name: &str) {
        self.target.set_base_name(name);
        self.stop();
    }

    /// Set the recipe directory; a trailing `/` is added if missing. Stops the recipe
    pub fn set_folder(&mut self, folder: &str) {
        self.target.set_folder(folder);
        self.stop();
    }

    /// Set the file extension; a leading `.` is added if missing. Stops the recipe
    pub fn set_extension(&mut self, extension: &str) {
        self.target.set_extension(extension);
        self.stop();
    }

    // === Variables ===

    /// Register `region` under `id`
    /// Does not touch the recipe file
    pub fn add_variable(&mut self, id: &str, region: &'a mut [u8]) -> bool {
        report("add_variable", self.try_add_variable(id, region))
    }

    pub fn try_add_variable(&mut self, id: &str, region: &'a mut [u8]) -> RecipeResult<()> {
        self.registry.add(id, region)
    }

    /// Register a plain-old-data value under `id`, bound to its in-memory bytes
    pub fn add_value<T: Pod>(&mut self, id: &str, value: &'a mut T) -> bool {
        self.add_variable(id, bytemuck::bytes_of_mut(value))
    }

    /// Unregister `id`
    /// Does not touch the recipe file
    pub fn remove_variable(&mut self, id: &str) -> bool {
        report("remove_variable", self.try_remove_variable(id))
    }

    pub fn try_remove_variable(&mut self, id: &str) -> RecipeResult<()> {
        self.registry.remove(id)
    }

    pub fn registry(&self) -> &VariableRegistry<'a> {
        &self.registry
    }

    /// Current bytes of a registered variable
    pub fn variable(&self, id: &str) -> Option<&[u8]> {
        self.registry.get(id).map(|b| b.bytes())
    }

    pub fn variable_mut(&mut self, id: &str) -> Option<&mut [u8]> {
        self.registry.get_mut(id).map(|b| b.bytes_mut())
    }

    /// Registered variable viewed as `T`
    /// None when absent, or when size or alignment do not fit `T`
    pub fn value<T: Pod>(&self, id: &str) -> Option<&T> {
        self.variable(id)
            .and_then(|bytes| bytemuck::try_from_bytes(bytes).ok())
    }

    pub fn value_mut<T: Pod>(&mut self, id: &str) -> Option<&mut T> {
        self.variable_mut(id)
            .and_then(|bytes| bytemuck::try_from_bytes_mut(bytes).ok())
    }

    // === Persistence ===

    /// Copy values from the recipe file into the registered variables
    ///
    /// Unknown records and records with a mismatched length are skipped. Returns false
    /// when the recipe is not ready, the file cannot be opened, or the file ends in the
    /// middle of a record; variables loaded before the truncation keep their new values.
    pub fn load(&mut self) -> bool {
        report("load", self.try_load())
    }

    pub fn try_load(&mut self) -> RecipeResult<LoadReport> {
        if !self.is_ready() {
            return Err(RecipeError::NotReady);
        }

        let path = self.path();
        let file = self
            .fs
            .open_read(&path)
            .map_err(|e| RecipeError::io(&path, e))?;

        let mut load_report = LoadReport::default();
        for record in RecordReader::new(file) {
            let record = record.map_err(|e| at_path(e, &path))?;

            let binding = match record.id_str() {
                Some(id) => self.registry.get_mut(id),
                None => None,
            };

            match binding {
                None => {
                    log::debug!(
                        "Skipping record '{}': no such variable",
                        String::from_utf8_lossy(&record.id)
                    );
                    load_report.skipped_unknown += 1;
                }
                Some(binding) if binding.size() != record.data.len() => {
                    log::debug!(
                        "Skipping record '{}': stored {} bytes, variable has {}",
                        String::from_utf8_lossy(&record.id),
                        record.data.len(),
                        binding.size()
                    );
                    load_report.skipped_size_mismatch += 1;
                }
                Some(binding) => {
                    binding.bytes_mut().copy_from_slice(&record.data);
                    load_report.applied += 1;
                }
            }
        }

        log::debug!(
            "Loaded {:?}: {} applied, {} unknown, {} size mismatch",
            path,
            load_report.applied,
            load_report.skipped_unknown,
            load_report.skipped_size_mismatch
        );
        Ok(load_report)
    }

    /// Overwrite the recipe file with the current values of all registered variables
    /// Records for variables no longer registered are dropped from the file
    pub fn save(&mut self) -> bool {
        report("save", self.try_save())
    }

    /// Returns the number of records written
    pub fn try_save(&mut self) -> RecipeResult<usize> {
        if !self.is_ready() {
            return Err(RecipeError::NotReady);
        }

        let path = self.path();
        let io_err = |e| RecipeError::io(&path, e);

        let mut writer = self.fs.open_write(&path).map_err(io_err)?;
        for (id, binding) in self.registry.iter() {
            codec::write_record(&mut writer, id.as_bytes(), binding.bytes()).map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;

        log::debug!("Saved {} variables to {:?}", self.registry.len(), path);
        Ok(self.registry.len())
    }
}

/// Collapse a result into the boolean contract, logging the reason for a failure
fn report<T>(operation: &str, result: RecipeResult<T>) -> bool {
    match result {
        Ok(_) => true,
        Err(e @ (RecipeError::Io { .. } | RecipeError::TruncatedRecord { .. })) => {
            log::warn!("Recipe {} failed: {}", operation, e);
            false
        }
        Err(e) => {
            log::debug!("Recipe {} rejected: {}", operation, e);
            false
        }
    }
}

/// Attach the recipe path to I/O errors raised by the record stream
fn at_path(err: RecipeError, path: &Path) -> RecipeError {
    match err {
        RecipeError::Io { source, .. } => RecipeError::io(path, source),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// StdFilesystem wrapper that counts every call
    #[derive(Default)]
    struct CountingFilesystem {
        calls: AtomicUsize,
    }

    impl CountingFilesystem {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Filesystem for CountingFilesystem {
        fn exists(&self, path: &Path) -> bool {
            self.hit();
            StdFilesystem.exists(path)
        }

        fn create_directories(&self, path: &Path) -> io::Result<()> {
            self.hit();
            StdFilesystem.create_directories(path)
        }

        fn create_empty_file(&self, path: &Path) -> io::Result<()> {
            self.hit();
            StdFilesystem.create_empty_file(path)
        }

        fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>> {
            self.hit();
            StdFilesystem.open_read(path)
        }

        fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write>> {
            self.hit();
            StdFilesystem.open_write(path)
        }
    }

    fn folder_of(dir: &tempfile::TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults() {
        let recipe = Recipe::new();
        assert_eq!(recipe.name(), "");
        assert_eq!(recipe.folder(), "");
        assert_eq!(recipe.extension(), ".rcp");
        assert!(!recipe.is_ready());
        assert_eq!(recipe.readiness(), Readiness::Stopped);
    }

    #[test]
    fn test_init_requires_name() {
        let mut recipe = Recipe::new();
        assert!(!recipe.init());
        assert!(matches!(recipe.try_init(), Err(RecipeError::NameNotSet)));
        assert!(!recipe.is_ready());
    }

    #[test]
    fn test_init_creates_directories_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let folder = format!("{}/nested/recipes", folder_of(&dir));
        let mut recipe = Recipe::with_location("machine", &folder, "rcp");

        assert!(recipe.init());
        assert!(recipe.is_ready());
        assert_eq!(recipe.path(), PathBuf::from(format!("{}/machine.rcp", folder)));
        assert_eq!(std::fs::metadata(recipe.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.rcp");
        std::fs::write(&path, b"existing").unwrap();

        let mut recipe = Recipe::with_location("keep", &folder_of(&dir), ".rcp");
        assert!(recipe.init());
        assert_eq!(std::fs::read(&path).unwrap(), b"existing");
    }

    #[test]
    fn test_init_failure_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the folder should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let mut recipe = Recipe::with_location(
            "r",
            &format!("{}/sub", blocker.to_string_lossy()),
            ".rcp",
        );
        assert!(!recipe.init());
        assert!(!recipe.is_ready());
    }

    #[test]
    fn test_setters_normalize_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut recipe = Recipe::with_location("r", &folder_of(&dir), ".rcp");
        assert!(recipe.init());

        recipe.set_extension("bin");
        assert_eq!(recipe.extension(), ".bin");
        assert!(!recipe.is_ready());

        assert!(recipe.init());
        recipe.set_folder(&folder_of(&dir));
        assert!(recipe.folder().ends_with('/'));
        assert!(!recipe.is_ready());

        assert!(recipe.init());
        recipe.set_name("other");
        assert!(!recipe.is_ready());

        recipe.stop();
        recipe.stop();
        assert!(!recipe.is_ready());
    }

    #[test]
    fn test_gating_performs_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let target = PersistenceTarget::new("gated", &folder_of(&dir), ".rcp");
        let mut value = 5u16;
        let mut recipe = Recipe::with_filesystem(target, CountingFilesystem::default());
        assert!(recipe.add_value("value", &mut value));

        assert!(!recipe.save());
        assert!(!recipe.load());
        assert!(matches!(recipe.try_save(), Err(RecipeError::NotReady)));
        assert!(matches!(recipe.try_load(), Err(RecipeError::NotReady)));
        assert_eq!(recipe.fs.calls(), 0);
        assert!(!recipe.path().exists());

        assert!(recipe.init());
        recipe.stop();
        let calls_after_init = recipe.fs.calls();
        assert!(!recipe.save());
        assert!(!recipe.load());
        assert_eq!(recipe.fs.calls(), calls_after_init);
        assert_eq!(std::fs::metadata(recipe.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_add_remove_guards() {
        let mut x = 1u8;
        let mut x_again = 2u8;
        let mut recipe = Recipe::with_name("guards");

        assert!(recipe.add_value("x", &mut x));
        assert!(!recipe.add_value("x", &mut x_again));
        assert!(!recipe.remove_variable("y"));
        assert!(recipe.remove_variable("x"));
        assert!(!recipe.remove_variable("x"));
    }

    #[test]
    fn test_add_does_not_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = 1u32;
        let mut recipe = Recipe::with_location("untouched", &folder_of(&dir), ".rcp");
        assert!(recipe.init());
        assert!(recipe.add_value("a", &mut a));
        assert!(recipe.remove_variable("a"));
        assert_eq!(std::fs::metadata(recipe.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_round_trip_through_accessors() {
        let dir = tempfile::tempdir().unwrap();
        let mut counter = 99u64;
        let mut flags = [true as u8, false as u8, true as u8];
        let mut recipe = Recipe::with_location("accessors", &folder_of(&dir), ".rcp");

        assert!(recipe.add_value("counter", &mut counter));
        assert!(recipe.add_variable("flags", &mut flags));
        assert!(recipe.init());
        assert_eq!(recipe.try_save().unwrap(), 2);

        *recipe.value_mut::<u64>("counter").unwrap() = 0;
        recipe.variable_mut("flags").unwrap().fill(0);

        let load_report = recipe.try_load().unwrap();
        assert_eq!(load_report.applied, 2);
        assert_eq!(load_report.records(), 2);
        assert_eq!(recipe.value::<u64>("counter"), Some(&99));
        assert_eq!(recipe.variable("flags"), Some(&[1u8, 0, 1][..]));
        assert!(recipe.value::<u32>("counter").is_none());
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = 3i16;
        let mut recipe = Recipe::with_location("empty", &folder_of(&dir), ".rcp");
        assert!(recipe.add_value("v", &mut v));
        assert!(recipe.init());

        assert_eq!(recipe.try_load().unwrap(), LoadReport::default());
        assert_eq!(recipe.value::<i16>("v"), Some(&3));
    }

    #[test]
    fn test_load_fails_when_file_vanishes() {
        let dir = tempfile::tempdir().unwrap();
        let mut recipe: Recipe<'_> = Recipe::with_location("gone", &folder_of(&dir), ".rcp");
        assert!(recipe.init());
        std::fs::remove_file(recipe.path()).unwrap();

        assert!(!recipe.load());
        assert!(matches!(recipe.try_load(), Err(RecipeError::Io { .. })));
    }

    #[test]
    fn test_save_fails_when_file_replaced_by_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = 4u32;
        let mut recipe = Recipe::with_location("blocked", &folder_of(&dir), ".rcp");
        assert!(recipe.add_value("v", &mut v));
        assert!(recipe.init());

        std::fs::remove_file(recipe.path()).unwrap();
        std::fs::create_dir(recipe.path()).unwrap();

        assert!(!recipe.save());
        assert!(matches!(recipe.try_save(), Err(RecipeError::Io { .. })));
    }

    /// Writer that accepts a fixed number of bytes, then fails
    struct ShortWriter {
        remaining: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// StdFilesystem whose writes run out of space after a few bytes
    struct DiskFullFilesystem;

    impl Filesystem for DiskFullFilesystem {
        fn exists(&self, path: &Path) -> bool {
            StdFilesystem.exists(path)
        }

        fn create_directories(&self, path: &Path) -> io::Result<()> {
            StdFilesystem.create_directories(path)
        }

        fn create_empty_file(&self, path: &Path) -> io::Result<()> {
            StdFilesystem.create_empty_file(path)
        }

        fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>> {
            StdFilesystem.open_read(path)
        }

        fn open_write(&self, _path: &Path) -> io::Result<Box<dyn Write>> {
            Ok(Box::new(ShortWriter { remaining: 10 }))
        }
    }

    #[test]
    fn test_save_fails_on_write_error_midway() {
        let dir = tempfile::tempdir().unwrap();
        let target = PersistenceTarget::new("full", &folder_of(&dir), ".rcp");
        let mut v = 0x0102_0304u32;
        let mut recipe = Recipe::with_filesystem(target, DiskFullFilesystem);
        assert!(recipe.add_value("v", &mut v));
        assert!(recipe.init());

        assert!(!recipe.save());
        match recipe.try_save() {
            Err(RecipeError::Io { path, .. }) => assert_eq!(path, recipe.path()),
            other => panic!("expected I/O error, got {:?}", other.map(|_| ())),
        }
    }
}
