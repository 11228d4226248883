//! Engine backed by the Saxon-HE and Jing command-line tools.
//!
//! Every query runs as a child JVM process against a scratch snapshot of the
//! in-memory document, so what Saxon sees is always what the engine holds,
//! not whatever is on disk.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{ProcessorSettings, ResolvedConfig};
use crate::protocol::{
    ApplyTransformationParams, BatchCorrectionsParams, CheckKind, FindIrregularitiesParams,
    StructureSummaryParams, XPathQueryParams, XQueryParams, XsltTransformParams,
};

use super::backup::BackupStore;
use super::corrections;
use super::document::{self, XmlDocument};
use super::{DocumentEngine, EngineError, EngineFactory, EngineResult, Payload};

/// Upper bound on items returned by `xpath_query`.
pub const MAX_QUERY_ITEMS: usize = 1000;

/// Upper bound on matches listed per irregularity check.
pub const MAX_CHECK_MATCHES: usize = 50;

const SNAPSHOT_FILE: &str = "document.xml";

/// Separates items when an XQuery check is serialized as a whole module.
const ITEM_SEPARATOR: char = '\u{1e}';

/// Launches Saxon and Jing under a per-process timeout.
#[derive(Debug, Clone)]
pub struct SaxonProcessor {
    java: PathBuf,
    saxon_jar: PathBuf,
    jing_jar: Option<PathBuf>,
    timeout: Duration,
}

struct ProcessOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

/// Outcome of validating a document against the configured grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub performed: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationReport {
    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            performed: false,
            valid: true,
            errors: Vec::new(),
            reason: Some(reason.into()),
        }
    }
}

impl SaxonProcessor {
    pub fn new(settings: &ProcessorSettings) -> Self {
        Self {
            java: settings.java.clone(),
            saxon_jar: settings.saxon_jar.clone(),
            jing_jar: settings.jing_jar.clone(),
            timeout: settings.tool_timeout,
        }
    }

    async fn run(&self, processor: &'static str, args: Vec<OsString>) -> EngineResult<ProcessOutput> {
        debug!(processor, ?args, "launching");
        let mut command = Command::new(&self.java);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(EngineError::Launch {
                    program: self.java.display().to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(EngineError::Timeout {
                    processor,
                    secs: self.timeout.as_secs(),
                })
            }
        };

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }

    fn saxon_args(&self, main_class: &str) -> Vec<OsString> {
        vec![
            "-cp".into(),
            self.saxon_jar.clone().into_os_string(),
            main_class.into(),
        ]
    }

    /// Run an XQuery file against `source` and return its serialized output.
    pub async fn query(
        &self,
        source: &Path,
        query_file: &Path,
        method: &str,
        params: &[(String, String)],
    ) -> EngineResult<String> {
        let mut args = self.saxon_args("net.sf.saxon.Query");
        args.push(prefixed("-s:", source));
        args.push(prefixed("-q:", query_file));
        args.push(format!("!method={method}").into());
        args.push("!indent=no".into());
        args.extend(params.iter().map(|(k, v)| OsString::from(format!("{k}={v}"))));

        let output = self.run("XQuery", args).await?;
        if !output.success {
            return Err(processor_error("XQuery", &output));
        }
        Ok(output.stdout)
    }

    /// Apply a stylesheet file to `source`, writing the result to `output`.
    pub async fn transform(
        &self,
        source: &Path,
        stylesheet: &Path,
        output_file: &Path,
        params: &[(String, String)],
    ) -> EngineResult<String> {
        let mut args = self.saxon_args("net.sf.saxon.Transform");
        args.push(prefixed("-s:", source));
        args.push(prefixed("-xsl:", stylesheet));
        args.push(prefixed("-o:", output_file));
        args.extend(params.iter().map(|(k, v)| OsString::from(format!("{k}={v}"))));

        let output = self.run("XSLT", args).await?;
        if !output.success {
            return Err(processor_error("XSLT", &output));
        }
        Ok(tokio::fs::read_to_string(output_file).await?)
    }

    /// Validate `document` with Jing. `.rnc` schemas use the compact syntax.
    pub async fn validate(&self, schema: Option<&Path>, document: &Path) -> EngineResult<ValidationReport> {
        let Some(schema) = schema else {
            return Ok(ValidationReport::skipped("no schema configured"));
        };
        let Some(jing) = &self.jing_jar else {
            return Ok(ValidationReport::skipped("no validator configured"));
        };

        let mut args: Vec<OsString> = vec!["-jar".into(), jing.clone().into_os_string()];
        if schema.extension().is_some_and(|ext| ext == "rnc") {
            args.push("-c".into());
        }
        args.push(schema.as_os_str().to_owned());
        args.push(document.as_os_str().to_owned());

        let output = self.run("Jing", args).await?;
        let errors: Vec<String> = if output.success {
            Vec::new()
        } else {
            output
                .stdout
                .lines()
                .chain(output.stderr.lines())
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect()
        };

        Ok(ValidationReport {
            performed: true,
            valid: output.success,
            errors,
            reason: None,
        })
    }
}

fn prefixed(flag: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(path.as_os_str());
    arg
}

fn processor_error(processor: &'static str, output: &ProcessOutput) -> EngineError {
    let message = match output.stderr.trim() {
        "" => "processor exited with an error".to_string(),
        text => text.to_string(),
    };
    EngineError::Processor { processor, message }
}

/// XQuery returning `{count, items}` as JSON for the sequence `expression`
/// evaluated against the context document.
fn sequence_query(expression: &str, limit: usize) -> String {
    format!(
        "let $items := (\n{expression}\n)\nreturn map {{\n  \"count\": count($items),\n  \"items\": array {{ for $item in subsequence($items, 1, {limit}) return serialize($item, map {{ \"method\": \"adaptive\" }}) }}\n}}\n"
    )
}

fn count_query(expression: &str) -> String {
    format!("count((\n{expression}\n))\n")
}

/// Split module output serialized with [`ITEM_SEPARATOR`] into items.
fn split_items(output: &str, limit: usize) -> SequenceResult {
    let output = output.trim_end_matches(|c| c == '\n' || c == '\r');
    if output.is_empty() {
        return SequenceResult {
            count: 0,
            items: Vec::new(),
        };
    }
    let items: Vec<&str> = output.split(ITEM_SEPARATOR).collect();
    SequenceResult {
        count: items.len() as u64,
        items: items.into_iter().take(limit).map(String::from).collect(),
    }
}

/// External variables and stylesheet parameters are passed as strings.
fn string_params(values: &Map<String, Value>) -> Vec<(String, String)> {
    values
        .iter()
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), text)
        })
        .collect()
}

#[derive(Debug, serde::Deserialize)]
struct SequenceResult {
    count: u64,
    items: Vec<String>,
}

/// The shipped engine: owns the document, its scratch snapshot and backups.
pub struct SaxonEngine {
    processor: SaxonProcessor,
    document: XmlDocument,
    schema_path: Option<PathBuf>,
    backups: BackupStore,
    scratch: TempDir,
    snapshot_stale: AtomicBool,
}

impl SaxonEngine {
    pub fn open(config: &ResolvedConfig) -> EngineResult<Self> {
        let document = XmlDocument::load(&config.document_path)?;
        let scratch = tempfile::Builder::new().prefix("xml-mcp-").tempdir()?;
        let engine = Self {
            processor: SaxonProcessor::new(&config.processor),
            document,
            schema_path: config.schema_path.clone(),
            backups: BackupStore::new(&config.backup_dir),
            scratch,
            snapshot_stale: AtomicBool::new(true),
        };
        engine.sync_snapshot()?;
        Ok(engine)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.scratch.path().join(SNAPSHOT_FILE)
    }

    /// Copy the in-memory document to the snapshot Saxon reads.
    ///
    /// The snapshot stays marked stale until a write succeeds, and
    /// [`snapshot`](Self::snapshot) retries it before the next process run.
    fn sync_snapshot(&self) -> EngineResult<()> {
        self.snapshot_stale.store(true, Ordering::SeqCst);
        std::fs::write(self.snapshot_path(), self.document.text())?;
        self.snapshot_stale.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Sync after the document changed. A failure is retried on next use.
    fn refresh_snapshot(&self) {
        if let Err(e) = self.sync_snapshot() {
            warn!(error = %e, "snapshot refresh deferred");
        }
    }

    /// Path of an up-to-date snapshot.
    fn snapshot(&self) -> EngineResult<PathBuf> {
        if self.snapshot_stale.load(Ordering::SeqCst) {
            self.sync_snapshot()?;
        }
        Ok(self.snapshot_path())
    }

    /// Write `contents` to a fresh file in the scratch directory.
    fn scratch_file(&self, suffix: &str, contents: &str) -> EngineResult<tempfile::TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix("input-")
            .suffix(suffix)
            .tempfile_in(self.scratch.path())?;
        std::io::Write::write_all(&mut file, contents.as_bytes())?;
        Ok(file.into_temp_path())
    }

    async fn evaluate_sequence(&self, expression: &str, limit: usize) -> EngineResult<SequenceResult> {
        let query = self.scratch_file(".xq", &sequence_query(expression, limit))?;
        let text = self
            .processor
            .query(&self.snapshot()?, &query, "json", &[])
            .await?;
        Ok(serde_json::from_str(text.trim())?)
    }

    async fn evaluate_count(&self, expression: &str) -> EngineResult<u64> {
        let query = self.scratch_file(".xq", &count_query(expression))?;
        let text = self
            .processor
            .query(&self.snapshot()?, &query, "text", &[])
            .await?;
        text.trim().parse().map_err(|_| EngineError::Processor {
            processor: "XQuery",
            message: format!("unexpected count result: {}", text.trim()),
        })
    }

    /// Run a complete XQuery module and split its result into items.
    async fn evaluate_module(&self, query: &str, limit: usize) -> EngineResult<SequenceResult> {
        let file = self.scratch_file(".xq", query)?;
        let separator = [("!item-separator".to_string(), ITEM_SEPARATOR.to_string())];
        let text = self
            .processor
            .query(&self.snapshot()?, &file, "adaptive", &separator)
            .await?;
        Ok(split_items(&text, limit))
    }

    async fn run_stylesheet(&self, xslt: &str, params: &[(String, String)]) -> EngineResult<String> {
        let stylesheet = self.scratch_file(".xsl", xslt)?;
        let output = tempfile::Builder::new()
            .prefix("output-")
            .suffix(".xml")
            .tempfile_in(self.scratch.path())?
            .into_temp_path();
        self.processor
            .transform(&self.snapshot()?, &stylesheet, &output, params)
            .await
    }

    /// Backup, transform, check, optionally validate, then commit.
    ///
    /// The document is only replaced once every check has passed and the
    /// new text is on disk.
    async fn commit_transformation(&mut self, xslt: &str, validate: bool) -> EngineResult<(PathBuf, ValidationReport)> {
        let backup_path = self.backups.create(&self.document)?;
        let output = self.run_stylesheet(xslt, &[]).await?;

        document::check_well_formed(&output).map_err(|message| EngineError::Document {
            message: format!("transformation output rejected: {message}"),
            path: self.document.path().to_path_buf(),
        })?;

        let validation = if validate {
            let candidate = self.scratch_file(".xml", &output)?;
            let report = self
                .processor
                .validate(self.schema_path.as_deref(), &candidate)
                .await?;
            if !report.valid {
                return Err(EngineError::Validation {
                    errors: report.errors,
                });
            }
            if let Some(reason) = &report.reason {
                warn!(reason = %reason, "validation skipped");
            }
            report
        } else {
            ValidationReport::skipped("validation not requested")
        };

        self.document.commit(output)?;
        self.refresh_snapshot();
        info!(
            document = %self.document.path().display(),
            backup = %backup_path.display(),
            "document updated"
        );
        Ok((backup_path, validation))
    }
}

fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("result".into(), other);
            map
        }
    }
}

#[async_trait]
impl DocumentEngine for SaxonEngine {
    async fn xpath_query(&self, params: XPathQueryParams) -> EngineResult<Payload> {
        if params.return_count {
            let count = self.evaluate_count(&params.xpath).await?;
            return Ok(into_payload(json!({
                "xpath": params.xpath,
                "version": params.version.as_str(),
                "count": count,
            })));
        }

        let result = self.evaluate_sequence(&params.xpath, MAX_QUERY_ITEMS).await?;
        Ok(into_payload(json!({
            "xpath": params.xpath,
            "version": params.version.as_str(),
            "count": result.count,
            "truncated": result.count > result.items.len() as u64,
            "results": result.items,
        })))
    }

    async fn xquery_query(&self, params: XQueryParams) -> EngineResult<Payload> {
        let query = self.scratch_file(".xq", &params.xquery)?;
        let text = self
            .processor
            .query(
                &self.snapshot()?,
                &query,
                "adaptive",
                &string_params(&params.external_vars),
            )
            .await?;
        let results = serde_json::from_str::<Value>(text.trim())
            .unwrap_or_else(|_| Value::String(text.trim_end().to_string()));
        Ok(into_payload(json!({ "results": results })))
    }

    async fn xslt_transform(&self, params: XsltTransformParams) -> EngineResult<Payload> {
        let output = self
            .run_stylesheet(&params.xslt, &string_params(&params.params))
            .await?;

        let mut payload = into_payload(json!({ "output": output }));
        if let Some(target) = params.save_output.as_deref().filter(|t| !t.is_empty()) {
            let target = Path::new(target);
            let target = if target.is_absolute() {
                target.to_path_buf()
            } else {
                let base = self.document.path().parent().unwrap_or(Path::new("."));
                base.join(target)
            };
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, &output).await?;
            payload.insert("saved_to".into(), json!(target.display().to_string()));
        }
        Ok(payload)
    }

    async fn structure_summary(&self, params: StructureSummaryParams) -> EngineResult<Payload> {
        let summary = self.document.summarize(params.max_depth)?;
        Ok(into_payload(json!({ "structure": summary })))
    }

    async fn find_irregularities(&self, params: FindIrregularitiesParams) -> EngineResult<Payload> {
        let mut checks = Vec::with_capacity(params.checks.len());
        let mut total = 0u64;

        for check in &params.checks {
            let result = match check.kind {
                CheckKind::XPath => self.evaluate_sequence(&check.xpath, MAX_CHECK_MATCHES).await?,
                CheckKind::XQuery => self.evaluate_module(&check.xpath, MAX_CHECK_MATCHES).await?,
            };
            total += result.count;
            checks.push(json!({
                "description": check.description,
                "type": match check.kind {
                    CheckKind::XPath => "xpath",
                    CheckKind::XQuery => "xquery",
                },
                "xpath": check.xpath,
                "count": result.count,
                "matches": result.items,
            }));
        }

        Ok(into_payload(json!({
            "checks": checks,
            "total_issues": total,
        })))
    }

    async fn apply_transformation(&mut self, params: ApplyTransformationParams) -> EngineResult<Payload> {
        let (backup_path, validation) = self.commit_transformation(&params.xslt, params.validate).await?;
        Ok(into_payload(json!({
            "message": "Transformation applied",
            "description": params.description,
            "backup_path": backup_path.display().to_string(),
            "validation": validation,
        })))
    }

    async fn batch_corrections(&mut self, params: BatchCorrectionsParams) -> EngineResult<Payload> {
        let stylesheet = corrections::compile(&params.corrections)?;
        let (backup_path, validation) = self.commit_transformation(&stylesheet, params.validate).await?;
        Ok(into_payload(json!({
            "message": "Corrections applied",
            "corrections_applied": params.corrections.len(),
            "backup_path": backup_path.display().to_string(),
            "validation": validation,
        })))
    }

    async fn create_backup(&self) -> EngineResult<Payload> {
        let backup_path = self.backups.create(&self.document)?;
        info!(backup = %backup_path.display(), "backup created");
        Ok(into_payload(json!({ "backup_path": backup_path.display().to_string() })))
    }

    async fn reload_document(&mut self) -> EngineResult<Payload> {
        self.document.reload()?;
        self.refresh_snapshot();
        Ok(into_payload(json!({
            "message": "Document reloaded",
            "path": self.document.path().display().to_string(),
        })))
    }
}

/// Builds [`SaxonEngine`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaxonFactory;

impl EngineFactory for SaxonFactory {
    type Engine = SaxonEngine;

    fn create(&self, config: &ResolvedConfig) -> EngineResult<SaxonEngine> {
        SaxonEngine::open(config)
    }
}
