//! Document engine seam.
//!
//! The dispatcher only talks to [`DocumentEngine`]; [`EngineFactory`] builds
//! the single instance on first use. [`saxon::SaxonEngine`] is the shipped
//! implementation.

pub mod backup;
pub mod corrections;
pub mod document;
pub mod handle;
pub mod saxon;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::ResolvedConfig;
pub use crate::protocol::Payload;
use crate::protocol::{
    ApplyTransformationParams, BatchCorrectionsParams, FindIrregularitiesParams,
    StructureSummaryParams, XPathQueryParams, XQueryParams, XsltTransformParams,
};

pub use handle::EngineHandle;

/// Errors raised by a document engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("document error: {message} (path: {path})")]
    Document { message: String, path: PathBuf },

    #[error("{processor} error: {message}")]
    Processor {
        processor: &'static str,
        message: String,
    },

    #[error("validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("{processor} timed out after {secs} seconds")]
    Timeout { processor: &'static str, secs: u64 },

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("invalid correction #{index}: {message}")]
    Correction { index: usize, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results using `EngineError`.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Operations the dispatcher can forward.
///
/// Query methods borrow the engine shared; methods that replace the
/// in-memory document take it exclusively.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    async fn xpath_query(&self, params: XPathQueryParams) -> EngineResult<Payload>;

    async fn xquery_query(&self, params: XQueryParams) -> EngineResult<Payload>;

    async fn xslt_transform(&self, params: XsltTransformParams) -> EngineResult<Payload>;

    async fn structure_summary(&self, params: StructureSummaryParams) -> EngineResult<Payload>;

    async fn find_irregularities(&self, params: FindIrregularitiesParams)
        -> EngineResult<Payload>;

    async fn apply_transformation(
        &mut self,
        params: ApplyTransformationParams,
    ) -> EngineResult<Payload>;

    async fn batch_corrections(&mut self, params: BatchCorrectionsParams)
        -> EngineResult<Payload>;

    async fn create_backup(&self) -> EngineResult<Payload>;

    /// Re-read the document from disk into this instance.
    async fn reload_document(&mut self) -> EngineResult<Payload>;
}

/// Builds the engine from resolved configuration.
pub trait EngineFactory {
    type Engine: DocumentEngine;

    fn create(&self, config: &ResolvedConfig) -> EngineResult<Self::Engine>;
}
