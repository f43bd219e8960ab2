//! Function registry for discovery and argument validation

use super::error::{RegistryError, RegistryResult};
use super::schema::{FunctionDescriptor, ParamType};
use crate::engine::ToolAdapter;
use crate::protocol::{Arguments, ProtocolError, ProtocolResult};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// A registered function: its descriptor and the adapter bound to it
///
/// Entries are replaced as a whole, so a resolver sees either the previous
/// or the new descriptor/adapter pair, never a mix.
#[derive(Clone)]
pub struct RegisteredFunction {
    pub descriptor: Arc<FunctionDescriptor>,
    pub adapter: Option<Arc<dyn ToolAdapter>>,
}

/// Registry of invocable functions keyed by name
#[derive(Default)]
pub struct FunctionRegistry {
    entries: DashMap<String, Arc<RegisteredFunction>>,
}

impl FunctionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register a function from its parts; last registration wins
    pub fn register<I, S>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: BTreeMap<String, ParamType>,
        required: I,
    ) -> RegistryResult<Arc<FunctionDescriptor>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let descriptor = FunctionDescriptor::from_parts(name, description, parameters, required)?;
        self.insert(descriptor, None)
    }

    /// Register a descriptor without an adapter
    pub fn register_descriptor(
        &self,
        descriptor: FunctionDescriptor,
    ) -> RegistryResult<Arc<FunctionDescriptor>> {
        descriptor.check()?;
        self.insert(descriptor, None)
    }

    /// Register a descriptor together with the adapter that executes it
    pub fn register_tool(
        &self,
        descriptor: FunctionDescriptor,
        adapter: Arc<dyn ToolAdapter>,
    ) -> RegistryResult<Arc<FunctionDescriptor>> {
        descriptor.check()?;
        self.insert(descriptor, Some(adapter))
    }

    fn insert(
        &self,
        descriptor: FunctionDescriptor,
        adapter: Option<Arc<dyn ToolAdapter>>,
    ) -> RegistryResult<Arc<FunctionDescriptor>> {
        let name = descriptor.name.clone();
        let descriptor = Arc::new(descriptor);
        let entry = Arc::new(RegisteredFunction {
            descriptor: Arc::clone(&descriptor),
            adapter,
        });

        let replaced = self.entries.insert(name.clone(), entry).is_some();
        info!(
            function = %name,
            replaced,
            rate_limited = descriptor.rate_limited,
            "Registered function"
        );
        Ok(descriptor)
    }

    /// Remove a function
    pub fn unregister(&self, name: &str) -> RegistryResult<()> {
        match self.entries.remove(name) {
            Some(_) => {
                info!(function = %name, "Unregistered function");
                Ok(())
            }
            None => Err(RegistryError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Look up a descriptor by name
    pub fn resolve(&self, name: &str) -> ProtocolResult<Arc<FunctionDescriptor>> {
        self.resolve_entry(name).map(|entry| Arc::clone(&entry.descriptor))
    }

    /// Look up the full entry (descriptor and adapter) by name
    pub fn resolve_entry(&self, name: &str) -> ProtocolResult<Arc<RegisteredFunction>> {
        self.entries
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProtocolError::UnknownFunction {
                name: name.to_string(),
            })
    }

    /// Validate arguments against the named function's schema
    pub fn validate_arguments(&self, name: &str, arguments: &Arguments) -> ProtocolResult<()> {
        self.resolve(name)?.validate_arguments(arguments)
    }

    /// Check if a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All descriptors, sorted by name
    pub fn list(&self) -> Vec<Arc<FunctionDescriptor>> {
        let mut descriptors: Vec<_> = self
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.descriptor))
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorKind;

    #[test]
    fn test_resolve_unknown() {
        let registry = FunctionRegistry::new();
        let err = registry.resolve("nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFunction);
    }

    #[test]
    fn test_register_replaces() {
        let registry = FunctionRegistry::new();
        registry
            .register_descriptor(FunctionDescriptor::new("cleanup", "v1"))
            .unwrap();
        registry
            .register_descriptor(FunctionDescriptor::new("cleanup", "v2"))
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("cleanup").unwrap().description, "v2");
    }

    #[test]
    fn test_unregister_missing() {
        let registry = FunctionRegistry::new();
        assert!(matches!(
            registry.unregister("ghost"),
            Err(RegistryError::NotFound { .. })
        ));
    }
}
