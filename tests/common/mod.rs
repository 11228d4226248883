//! Recording engine shared by the integration tests.
//!
//! The fake keeps the "document" as a plain string: transformations replace
//! it with the stylesheet text, reloads copy it from a shared "disk" string.
//! Magic expressions trigger failures: `boom` returns an engine error,
//! `panic` panics.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use xml_mcp_server::config::{ProcessorSettings, ResolvedConfig};
use xml_mcp_server::engine::{DocumentEngine, EngineError, EngineFactory, EngineResult, Payload};
use xml_mcp_server::protocol::{
    ApplyTransformationParams, BatchCorrectionsParams, CheckKind, FindIrregularitiesParams,
    StructureSummaryParams, XPathQueryParams, XQueryParams, XsltTransformParams,
};

pub const INITIAL_DOCUMENT: &str = "<recipe><title>Syllabub</title></recipe>";

#[derive(Clone, Default)]
pub struct FakeFactory {
    pub attempts: Arc<AtomicUsize>,
    pub constructions: Arc<AtomicUsize>,
    pub failures_left: Arc<AtomicUsize>,
    pub disk: Arc<Mutex<String>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        let factory = Self::default();
        *factory.disk.lock().unwrap() = INITIAL_DOCUMENT.to_string();
        factory
    }

    /// The first `n` constructions fail.
    pub fn failing(n: usize) -> Self {
        let factory = Self::new();
        factory.failures_left.store(n, Ordering::SeqCst);
        factory
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn write_disk(&self, text: &str) {
        *self.disk.lock().unwrap() = text.to_string();
    }
}

impl EngineFactory for FakeFactory {
    type Engine = FakeEngine;

    fn create(&self, config: &ResolvedConfig) -> EngineResult<FakeEngine> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failures = self.failures_left.load(Ordering::SeqCst);
        if failures > 0 {
            self.failures_left.store(failures - 1, Ordering::SeqCst);
            return Err(EngineError::Document {
                message: "cannot open document".into(),
                path: config.document_path.clone(),
            });
        }
        self.constructions.fetch_add(1, Ordering::SeqCst);
        Ok(FakeEngine {
            document: self.disk.lock().unwrap().clone(),
            disk: Arc::clone(&self.disk),
            reloads: 0,
        })
    }
}

pub struct FakeEngine {
    pub document: String,
    pub disk: Arc<Mutex<String>>,
    pub reloads: usize,
}

fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!("test payloads are objects"),
    }
}

fn check_expression(expression: &str) -> EngineResult<()> {
    match expression {
        "boom" => Err(EngineError::Processor {
            processor: "XQuery",
            message: "XPST0003: syntax error".into(),
        }),
        "panic" => panic!("engine exploded"),
        _ => Ok(()),
    }
}

#[async_trait]
impl DocumentEngine for FakeEngine {
    async fn xpath_query(&self, params: XPathQueryParams) -> EngineResult<Payload> {
        check_expression(&params.xpath)?;
        Ok(payload(json!({
            "xpath": params.xpath,
            "version": params.version.as_str(),
            "return_count": params.return_count,
            "document": self.document,
        })))
    }

    async fn xquery_query(&self, params: XQueryParams) -> EngineResult<Payload> {
        check_expression(&params.xquery)?;
        Ok(payload(json!({
            "results": params.external_vars,
        })))
    }

    async fn xslt_transform(&self, params: XsltTransformParams) -> EngineResult<Payload> {
        check_expression(&params.xslt)?;
        Ok(payload(json!({
            "output": self.document,
            "params": params.params,
            "saved_to": params.save_output,
        })))
    }

    async fn structure_summary(&self, params: StructureSummaryParams) -> EngineResult<Payload> {
        Ok(payload(json!({
            "structure": { "analyzed_depth": params.max_depth, "root": "recipe" },
        })))
    }

    async fn find_irregularities(&self, params: FindIrregularitiesParams) -> EngineResult<Payload> {
        let kinds: Vec<&str> = params
            .checks
            .iter()
            .map(|c| match c.kind {
                CheckKind::XPath => "xpath",
                CheckKind::XQuery => "xquery",
            })
            .collect();
        Ok(payload(json!({ "kinds": kinds, "total_issues": 0 })))
    }

    async fn apply_transformation(&mut self, params: ApplyTransformationParams) -> EngineResult<Payload> {
        check_expression(&params.xslt)?;
        self.document = params.xslt;
        Ok(payload(json!({
            "message": "Transformation applied",
            "description": params.description,
            "validated": params.validate,
        })))
    }

    async fn batch_corrections(&mut self, params: BatchCorrectionsParams) -> EngineResult<Payload> {
        Ok(payload(json!({
            "corrections_applied": params.corrections.len(),
            "validated": params.validate,
        })))
    }

    async fn create_backup(&self) -> EngineResult<Payload> {
        Ok(payload(json!({
            "success": true,
            "backup_path": "/backups/recipe_20240101T000000.000000Z.xml",
        })))
    }

    async fn reload_document(&mut self) -> EngineResult<Payload> {
        self.document = self.disk.lock().unwrap().clone();
        self.reloads += 1;
        Ok(payload(json!({
            "message": "Document reloaded",
            "reloads": self.reloads,
        })))
    }
}

pub fn test_config(root: &Path) -> ResolvedConfig {
    ResolvedConfig {
        document_path: root.join("data/doc.xml"),
        schema_path: None,
        backup_dir: root.join("backups"),
        log_dir: root.join("logs"),
        processor: ProcessorSettings {
            java: PathBuf::from("java"),
            saxon_jar: root.join("lib/saxon-he.jar"),
            jing_jar: None,
            tool_timeout: Duration::from_secs(30),
        },
    }
}
