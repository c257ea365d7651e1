pub mod registry;

pub use registry::{VariableBinding, VariableRegistry};
