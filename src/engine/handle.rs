use tracing::info;

use crate::config::ResolvedConfig;

use super::{EngineFactory, EngineResult};

/// Owns the one engine instance of the process.
///
/// Construction is deferred to the first [`ensure_initialized`] call. A
/// failed construction leaves the handle empty and is retried on the next
/// call.
///
/// [`ensure_initialized`]: EngineHandle::ensure_initialized
pub struct EngineHandle<F: EngineFactory> {
    factory: F,
    config: ResolvedConfig,
    engine: Option<F::Engine>,
}

impl<F: EngineFactory> EngineHandle<F> {
    pub fn new(factory: F, config: ResolvedConfig) -> Self {
        Self {
            factory,
            config,
            engine: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Return the engine, constructing it if this is the first use.
    pub fn ensure_initialized(&mut self) -> EngineResult<&mut F::Engine> {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                let engine = self.factory.create(&self.config)?;
                info!(
                    document = %self.config.document_path.display(),
                    "document engine initialized"
                );
                engine
            }
        };
        Ok(self.engine.insert(engine))
    }
}
