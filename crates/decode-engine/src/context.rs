//! Explicit engine context handed to constructors.

use std::sync::Arc;

use splice_common::config::EngineConfig;
use tokio::runtime::Handle;

use crate::frame::FrameLedger;
use crate::media::MediaCatalog;

/// Everything a decode manager or compositor needs from its environment.
#[derive(Clone)]
pub struct EngineContext {
    /// Runtime decode workers are spawned on.
    pub runtime: Handle,
    pub media: Arc<dyn MediaCatalog>,
    pub config: EngineConfig,
    /// Shared frame lifetime counters.
    pub ledger: Arc<FrameLedger>,
}

impl EngineContext {
    pub fn new(runtime: Handle, media: Arc<dyn MediaCatalog>, config: EngineConfig) -> Self {
        Self {
            runtime,
            media,
            config,
            ledger: FrameLedger::new(),
        }
    }

    /// Build a context on the runtime the caller is running in.
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current(media: Arc<dyn MediaCatalog>, config: EngineConfig) -> Option<Self> {
        Handle::try_current()
            .ok()
            .map(|runtime| Self::new(runtime, media, config))
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .field("ledger", &self.ledger.counts())
            .finish_non_exhaustive()
    }
}
