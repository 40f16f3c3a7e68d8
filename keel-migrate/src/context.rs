//! Process-scoped state shared by one engine.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dialect::Dialect;
use crate::resource::{InMemoryResourceAccessor, ResourceAccessor};
use crate::sqlgen::GeneratorRegistry;

/// Everything the engine needs besides its history store and executor.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct EngineContext {
    dialect: Dialect,
    generators: Arc<GeneratorRegistry>,
    resources: Arc<dyn ResourceAccessor>,
    config: EngineConfig,
}

impl EngineContext {
    /// Context with the standard generators, default config and no resources.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            generators: Arc::new(GeneratorRegistry::standard()),
            resources: Arc::new(InMemoryResourceAccessor::new()),
            config: EngineConfig::default(),
        }
    }

    /// Replace the generator registry.
    pub fn with_generators(mut self, generators: GeneratorRegistry) -> Self {
        self.generators = Arc::new(generators);
        self
    }

    /// Replace the resource accessor.
    pub fn with_resources(mut self, resources: impl ResourceAccessor + 'static) -> Self {
        self.resources = Arc::new(resources);
        self
    }

    /// Replace the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    pub fn resources(&self) -> &dyn ResourceAccessor {
        self.resources.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
