use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Trait for the filesystem operations a recipe needs
/// Handles are closed by dropping them
pub trait Filesystem: Send + Sync {
    /// Check whether a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Create a directory and all of its parents
    fn create_directories(&self, path: &Path) -> io::Result<()>;

    /// Create an empty file, truncating any existing one
    fn create_empty_file(&self, path: &Path) -> io::Result<()>;

    /// Open a file for binary reading
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    /// Open a file for binary writing, discarding previous contents
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write>>;
}

/// `std::fs` backed implementation of Filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_directories(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn create_empty_file(&self, path: &Path) -> io::Result<()> {
        File::create(path).map(drop)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
