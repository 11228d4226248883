use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::catalog::{ToolCatalog, ToolDescriptor, ToolId};
use crate::config::ResolvedConfig;
use crate::engine::{DocumentEngine, EngineError, EngineFactory, EngineHandle};
use crate::protocol::{Invocation, Payload, ResponseEnvelope};
use crate::schema::{self, SchemaValidationError};

/// Every way a single invocation can fail.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Arguments for {tool} must be a JSON object")]
    InvalidArguments { tool: &'static str },

    #[error("Missing required argument '{argument}' for {tool}")]
    MissingArgument {
        tool: &'static str,
        argument: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    #[error("Invalid arguments for {tool}: {source}")]
    Deserialize {
        tool: &'static str,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Internal error while running {tool}: {message}")]
    Panicked { tool: String, message: String },
}

/// Routes invocations to the engine and turns every outcome into a
/// [`ResponseEnvelope`].
///
/// `handle` takes `&mut self`, so invocations are processed strictly one
/// after another and the engine's document has a single writer.
pub struct RequestDispatcher<F: EngineFactory> {
    catalog: ToolCatalog,
    engine: EngineHandle<F>,
}

impl<F: EngineFactory> RequestDispatcher<F> {
    pub fn new(factory: F, config: ResolvedConfig) -> Self {
        Self {
            catalog: ToolCatalog::new(),
            engine: EngineHandle::new(factory, config),
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn engine(&self) -> &EngineHandle<F> {
        &self.engine
    }

    /// Run one invocation. Never fails and never panics: errors and panics
    /// raised while serving it become a failure envelope naming the tool.
    pub async fn handle(&mut self, invocation: Invocation) -> ResponseEnvelope {
        let name = invocation.name.clone();
        debug!(tool = %name, "handling invocation");

        let outcome = AssertUnwindSafe(self.try_handle(invocation))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(DispatchError::Panicked {
                    tool: name.clone(),
                    message: panic_message(panic.as_ref()),
                })
            });

        match outcome {
            Ok(payload) => ResponseEnvelope::success(payload),
            Err(err) => {
                match &err {
                    DispatchError::Panicked { .. } => error!(tool = %name, "{err}"),
                    _ => warn!(tool = %name, "{err}"),
                }
                ResponseEnvelope::failure(err.to_string(), name)
            }
        }
    }

    async fn try_handle(&mut self, invocation: Invocation) -> Result<Payload, DispatchError> {
        let engine = self.engine.ensure_initialized()?;

        let tool = ToolId::from_name(&invocation.name)
            .ok_or_else(|| DispatchError::UnknownTool(invocation.name.clone()))?;
        let arguments = resolve_arguments(self.catalog.get(tool), invocation.arguments)?;

        if tool.mutates_document() {
            info!(tool = tool.name(), "document mutation requested");
        }
        run_tool(tool, arguments, engine).await
    }
}

/// Apply catalog defaults, enforce required keys, then check the result
/// against the tool's schema.
pub fn resolve_arguments(
    descriptor: &ToolDescriptor,
    arguments: Value,
) -> Result<Value, DispatchError> {
    let mut arguments = match arguments {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(Default::default()),
        _ => {
            return Err(DispatchError::InvalidArguments {
                tool: descriptor.name,
            })
        }
    };

    schema::apply_defaults(&descriptor.input_schema, &mut arguments);

    for key in descriptor.required() {
        if arguments.get(key).is_none() {
            return Err(DispatchError::MissingArgument {
                tool: descriptor.name,
                argument: key.to_string(),
            });
        }
    }

    schema::validate_value(&descriptor.input_schema, &arguments)?;
    Ok(arguments)
}

fn parse<T: DeserializeOwned>(tool: ToolId, arguments: Value) -> Result<T, DispatchError> {
    serde_json::from_value(arguments).map_err(|source| DispatchError::Deserialize {
        tool: tool.name(),
        source,
    })
}

async fn run_tool<E: DocumentEngine>(
    tool: ToolId,
    arguments: Value,
    engine: &mut E,
) -> Result<Payload, DispatchError> {
    let payload = match tool {
        ToolId::XPathQuery => engine.xpath_query(parse(tool, arguments)?).await?,
        ToolId::XQueryQuery => engine.xquery_query(parse(tool, arguments)?).await?,
        ToolId::XsltTransform => engine.xslt_transform(parse(tool, arguments)?).await?,
        ToolId::StructureSummary => engine.structure_summary(parse(tool, arguments)?).await?,
        ToolId::FindIrregularities => engine.find_irregularities(parse(tool, arguments)?).await?,
        ToolId::ApplyTransformation => {
            engine.apply_transformation(parse(tool, arguments)?).await?
        }
        ToolId::BatchCorrections => engine.batch_corrections(parse(tool, arguments)?).await?,
        ToolId::CreateBackup => engine.create_backup().await?,
        ToolId::ReloadDocument => engine.reload_document().await?,
    };
    Ok(payload)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
