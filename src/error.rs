use std::path::PathBuf;

/// Errors raised by recipe operations
///
/// The boolean methods on [`crate::Recipe`] collapse these into `false`;
/// the `try_*` variants hand them back intact.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("Recipe name is empty, call set_name before init")]
    NameNotSet,

    #[error("Recipe is not initialized")]
    NotReady,

    #[error("Variable '{0}' is already registered")]
    DuplicateIdentifier(String),

    #[error("Variable '{0}' is not registered")]
    MissingIdentifier(String),

    #[error("Variable identifier must not be empty")]
    EmptyIdentifier,

    #[error("Variable '{0}' has a zero-length region")]
    EmptyRegion(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Truncated record at byte {offset}: incomplete {field}")]
    TruncatedRecord { offset: u64, field: RecordField },
}

impl RecipeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecipeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// The part of a record that was being read when the stream ran dry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    IdLength,
    Id,
    DataLength,
    Data,
    Padding,
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordField::IdLength => "identifier length",
            RecordField::Id => "identifier",
            RecordField::DataLength => "data length",
            RecordField::Data => "data",
            RecordField::Padding => "padding byte",
        };
        f.write_str(name)
    }
}

pub type RecipeResult<T> = std::result::Result<T, RecipeError>;
