//! Language bindings: which scanner and compiler handle which extensions.

use crate::compiler::Compiler;
use crate::error::ConfigError;
use crate::scanner::DependencyScanner;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

pub struct LanguageBinding {
    pub name: String,
    /// Extensions without the leading dot
    pub extensions: BTreeSet<String>,
    pub scanner: Arc<dyn DependencyScanner>,
    pub compiler: Arc<dyn Compiler>,
    /// Base flags for every file of this language
    pub flags: Vec<String>,
}

impl LanguageBinding {
    /// Accepts extensions with or without a leading dot (`".c"` or `"c"`).
    pub fn new<I, S>(
        extensions: I,
        scanner: Arc<dyn DependencyScanner>,
        compiler: Arc<dyn Compiler>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions: BTreeSet<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        let name = extensions.iter().cloned().collect::<Vec<_>>().join("/");
        Self {
            name,
            extensions,
            scanner,
            compiler,
            flags: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }
}

impl std::fmt::Debug for LanguageBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageBinding")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("compiler", &self.compiler.name())
            .field("flags", &self.flags)
            .finish()
    }
}

pub type BindingId = usize;

/// Registered bindings with an extension lookup.
#[derive(Debug, Default)]
pub struct LanguageTable {
    bindings: Vec<LanguageBinding>,
    by_extension: HashMap<String, BindingId>,
}

impl LanguageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding. Extension sets must be non-empty and disjoint.
    pub fn register(&mut self, binding: LanguageBinding) -> Result<BindingId, ConfigError> {
        if binding.extensions.is_empty() {
            return Err(ConfigError::NoExtensions(binding.name));
        }
        for ext in &binding.extensions {
            if let Some(&owner) = self.by_extension.get(ext) {
                return Err(ConfigError::ExtensionTaken {
                    extension: ext.clone(),
                    owner: self.bindings[owner].name.clone(),
                });
            }
        }

        let id = self.bindings.len();
        for ext in &binding.extensions {
            self.by_extension.insert(ext.clone(), id);
        }
        self.bindings.push(binding);
        Ok(id)
    }

    pub fn lookup(&self, path: &Path) -> Option<BindingId> {
        let ext = path.extension()?.to_str()?;
        self.by_extension.get(ext).copied()
    }

    pub fn get(&self, id: BindingId) -> &LanguageBinding {
        &self.bindings[id]
    }
}
