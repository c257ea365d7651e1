use std::path::PathBuf;

/// Default recipe file extension
pub const DEFAULT_EXTENSION: &str = ".rcp";

/// Location of a recipe file, split into folder, base name and extension
///
/// `folder` is empty or ends with `/`; `extension` is empty or starts with `.`.
/// The full path is plain concatenation of the three.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceTarget {
    folder: String,
    base_name: String,
    extension: String,
}

impl PersistenceTarget {
    pub fn new(base_name: &str, folder: &str, extension: &str) -> Self {
        PersistenceTarget {
            folder: normalize_folder(folder),
            base_name: base_name.to_string(),
            extension: normalize_extension(extension),
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn set_folder(&mut self, folder: &str) {
        self.folder = normalize_folder(folder);
    }

    pub fn set_base_name(&mut self, base_name: &str) {
        self.base_name = base_name.to_string();
    }

    pub fn set_extension(&mut self, extension: &str) {
        self.extension = normalize_extension(extension);
    }

    /// `folder + base_name + extension`
    pub fn full_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}{}", self.folder, self.base_name, self.extension))
    }
}

impl Default for PersistenceTarget {
    fn default() -> Self {
        PersistenceTarget::new("", "", DEFAULT_EXTENSION)
    }
}

/// Append a trailing `/` to a non-empty folder that lacks one
pub fn normalize_folder(folder: &str) -> String {
    if folder.is_empty() || folder.ends_with('/') {
        folder.to_string()
    } else {
        format!("{}/", folder)
    }
}

/// Prepend a `.` to a non-empty extension that lacks one
pub fn normalize_extension(extension: &str) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{}", extension)
    }
}
