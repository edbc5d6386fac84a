use crate::error::ResourceError;
use ahash::AHashMap;
use itertools::Itertools;
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Boxed error a provider may fail with.
pub type ProviderError = Box<dyn Error + Send + Sync>;

/// The callable behind a resource id.
pub type Provider = Arc<dyn Fn(Value) -> Result<Value, ProviderError> + Send + Sync>;

/// Resolves a resource id to the callable that implements it.
pub trait ResourceResolver {
    fn resolve(&self, id: &str) -> Result<Provider, ResourceError>;
}

/// Registry of caller-supplied providers. Fill it before a run starts.
#[derive(Clone, Default)]
pub struct ResourceManager {
    providers: AHashMap<String, Provider>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under `id`, replacing any previous one.
    pub fn register<F>(&mut self, id: impl Into<String>, provider: F) -> &mut Self
    where
        F: Fn(Value) -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        self.providers.insert(id.into(), Arc::new(provider));
        self
    }

    /// Builder-style registration.
    pub fn with_provider<F>(mut self, id: impl Into<String>, provider: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        self.register(id, provider);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).sorted().collect()
    }
}

impl ResourceResolver for ResourceManager {
    fn resolve(&self, id: &str) -> Result<Provider, ResourceError> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| ResourceError::NotRegistered(id.to_string()))
    }
}

impl<F> ResourceResolver for F
where
    F: Fn(&str) -> Option<Provider>,
{
    fn resolve(&self, id: &str) -> Result<Provider, ResourceError> {
        self(id).ok_or_else(|| ResourceError::NotRegistered(id.to_string()))
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("providers", &self.ids())
            .finish()
    }
}
