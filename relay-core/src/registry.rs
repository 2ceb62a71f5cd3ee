//! Versioned function registry.
//!
//! Populated once at start-up, then frozen behind an `Arc` and shared
//! read-only by every in-flight request.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::{function::DurableFunction, CoreError};

/// Maps `(name, version)` to a registered function.
#[derive(Default)]
pub struct Registry {
    functions: HashMap<String, BTreeMap<u32, Arc<dyn DurableFunction>>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name` and `version`.
    ///
    /// # Errors
    /// - [`CoreError::InvalidVersion`] if `version` is `0`.
    /// - [`CoreError::DuplicateFunction`] if the pair is already taken.
    pub fn add(
        &mut self,
        func: Arc<dyn DurableFunction>,
        name: &str,
        version: u32,
    ) -> Result<(), CoreError> {
        if version == 0 {
            return Err(CoreError::InvalidVersion { name: name.to_owned(), version });
        }
        let versions = self.functions.entry(name.to_owned()).or_default();
        if versions.contains_key(&version) {
            return Err(CoreError::DuplicateFunction { name: name.to_owned(), version });
        }
        versions.insert(version, func);
        Ok(())
    }

    /// Look up a function. `version == 0` selects the latest version.
    #[must_use]
    pub fn get(&self, name: &str, version: u32) -> Option<Arc<dyn DurableFunction>> {
        let versions = self.functions.get(name)?;
        let found = if version == 0 {
            versions.values().next_back()
        } else {
            versions.get(&version)
        };
        found.cloned()
    }

    /// Number of registered `(name, version)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, versions) in &self.functions {
            map.entry(name, &versions.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}
