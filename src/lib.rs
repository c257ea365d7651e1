//! Recipe - persistent variable bindings
//!
//! Binds named, fixed-size application variables to a binary recipe file so their
//! values survive across runs.

pub mod error;
pub mod logging;
pub mod models;
pub mod recipe;
pub mod storage;

pub use error::{RecipeError, RecipeResult, RecordField};
pub use recipe::{LoadReport, Readiness, Recipe};
