use std::collections::HashMap;

use crate::error::{RecipeError, RecipeResult};

/// A named view onto caller-owned memory
///
/// Only the address and length are kept; the bytes stay where the caller put them.
#[derive(Debug)]
pub struct VariableBinding<'a> {
    region: &'a mut [u8],
}

impl<'a> VariableBinding<'a> {
    fn new(region: &'a mut [u8]) -> Self {
        VariableBinding { region }
    }

    /// Size of the bound region in bytes
    pub fn size(&self) -> usize {
        self.region.len()
    }

    /// Current byte image of the bound variable
    pub fn bytes(&self) -> &[u8] {
        self.region
    }

    /// Mutable access to the bound variable
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.region
    }
}

/// Registry mapping variable identifiers to memory regions
///
/// The `'a` lifetime ties every binding to the storage it borrows, so the registry
/// cannot outlive the variables it points into. Dropping the registry drops the
/// descriptors only.
#[derive(Debug, Default)]
pub struct VariableRegistry<'a> {
    bindings: HashMap<String, VariableBinding<'a>>,
}

impl<'a> VariableRegistry<'a> {
    /// Create a new empty registry
    pub fn new() -> Self {
        VariableRegistry {
            bindings: HashMap::new(),
        }
    }

    /// Bind `id` to `region`
    /// Rejects duplicates, empty identifiers and zero-length regions without mutating anything
    pub fn add(&mut self, id: &str, region: &'a mut [u8]) -> RecipeResult<()> {
        if id.is_empty() {
            return Err(RecipeError::EmptyIdentifier);
        }
        if region.is_empty() {
            return Err(RecipeError::EmptyRegion(id.to_string()));
        }
        if self.bindings.contains_key(id) {
            return Err(RecipeError::DuplicateIdentifier(id.to_string()));
        }

        log::debug!("Registered variable '{}' ({} bytes)", id, region.len());
        self.bindings
            .insert(id.to_string(), VariableBinding::new(region));
        Ok(())
    }

    /// Drop the binding for `id`
    /// The underlying memory is left as is
    pub fn remove(&mut self, id: &str) -> RecipeResult<()> {
        match self.bindings.remove(id) {
            Some(_) => {
                log::debug!("Removed variable '{}'", id);
                Ok(())
            }
            None => Err(RecipeError::MissingIdentifier(id.to_string())),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bindings.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&VariableBinding<'a>> {
        self.bindings.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut VariableBinding<'a>> {
        self.bindings.get_mut(id)
    }

    /// Size in bytes of the binding for `id`
    pub fn size_of(&self, id: &str) -> Option<usize> {
        self.bindings.get(id).map(VariableBinding::size)
    }

    /// All registered identifiers, in no particular order
    pub fn ids(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    /// Iterate bindings in registry order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableBinding<'a>)> {
        self.bindings.iter().map(|(id, b)| (id.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
