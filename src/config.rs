use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Environment variable that overrides the configuration file location.
pub const CONFIG_ENV: &str = "XML_MCP_CONFIG";

/// Configuration file looked up in the server directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

const DEFAULT_DOCUMENT_PATH: &str = "./data/syllabubRecipe.xml";
const DEFAULT_SCHEMA_PATH: &str = "./schemas/recipe.rnc";
const DEFAULT_BACKUP_DIR: &str = "./backups";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_JAVA: &str = "java";
const DEFAULT_SAXON_JAR: &str = "./lib/saxon-he.jar";
const DEFAULT_JING_JAR: &str = "./lib/jing.jar";

/// Default timeout for a single Saxon or Jing process (30 seconds).
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot determine server directory: {0}")]
    ServerDir(String),
}

/// Configuration file contents. Every key is optional.
///
/// The snake_case aliases are the key names used by older deployments.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default = "default_document_path", alias = "xml_data_path")]
    pub document_path: String,
    #[serde(default = "default_schema_path", alias = "xml_schema_path")]
    pub schema_path: Option<String>,
    #[serde(default = "default_backup_dir", alias = "backup_dir")]
    pub backup_dir: String,
    #[serde(default = "default_log_dir", alias = "log_dir")]
    pub log_dir: String,
    #[serde(default = "default_java")]
    pub java: String,
    #[serde(default = "default_saxon_jar")]
    pub saxon_jar: String,
    #[serde(default = "default_jing_jar")]
    pub jing_jar: Option<String>,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            document_path: default_document_path(),
            schema_path: default_schema_path(),
            backup_dir: default_backup_dir(),
            log_dir: default_log_dir(),
            java: default_java(),
            saxon_jar: default_saxon_jar(),
            jing_jar: default_jing_jar(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_document_path() -> String {
    DEFAULT_DOCUMENT_PATH.into()
}

fn default_schema_path() -> Option<String> {
    Some(DEFAULT_SCHEMA_PATH.into())
}

fn default_backup_dir() -> String {
    DEFAULT_BACKUP_DIR.into()
}

fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.into()
}

fn default_java() -> String {
    DEFAULT_JAVA.into()
}

fn default_saxon_jar() -> String {
    DEFAULT_SAXON_JAR.into()
}

fn default_jing_jar() -> Option<String> {
    Some(DEFAULT_JING_JAR.into())
}

fn default_tool_timeout_secs() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

/// How the document engine launches its external processors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSettings {
    pub java: PathBuf,
    pub saxon_jar: PathBuf,
    pub jing_jar: Option<PathBuf>,
    pub tool_timeout: Duration,
}

/// Fully resolved server configuration. All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub document_path: PathBuf,
    pub schema_path: Option<PathBuf>,
    pub backup_dir: PathBuf,
    pub log_dir: PathBuf,
    pub processor: ProcessorSettings,
}

/// A recoverable condition met while resolving the configuration.
///
/// Notices are collected rather than logged because resolution runs before
/// the log directory is known.
#[derive(Debug)]
pub enum ConfigNotice {
    MissingConfig(PathBuf),
    BackupFallback {
        requested: PathBuf,
        fallback: PathBuf,
        error: std::io::Error,
    },
}

impl fmt::Display for ConfigNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConfig(path) => {
                write!(f, "config file not found: {}, using defaults", path.display())
            }
            Self::BackupFallback {
                requested,
                fallback,
                error,
            } => write!(
                f,
                "cannot create backup directory {} ({error}), using {} instead",
                requested.display(),
                fallback.display()
            ),
        }
    }
}

#[derive(Debug)]
pub struct Resolution {
    pub config: ResolvedConfig,
    pub notices: Vec<ConfigNotice>,
}

/// Resolves configuration relative to the server's install directory.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    server_dir: PathBuf,
}

impl ConfigResolver {
    pub fn new(server_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_dir: server_dir.into(),
        }
    }

    /// Use the directory containing the running executable.
    pub fn from_current_exe() -> Result<Self, ConfigError> {
        let exe = std::env::current_exe().map_err(|e| ConfigError::ServerDir(e.to_string()))?;
        let exe = exe.canonicalize().unwrap_or(exe);
        let dir = exe
            .parent()
            .ok_or_else(|| ConfigError::ServerDir(format!("{} has no parent", exe.display())))?;
        Ok(Self::new(dir))
    }

    pub fn server_dir(&self) -> &Path {
        &self.server_dir
    }

    /// Load and resolve the configuration.
    ///
    /// - `config_path` absent: `config.json` in the server directory
    /// - file missing: built-in defaults plus a `MissingConfig` notice
    /// - backup directory not creatable: temp dir plus a `BackupFallback` notice
    pub fn resolve(&self, config_path: Option<&Path>) -> Result<Resolution, ConfigError> {
        let config_path = self.absolute(config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE)));
        let mut notices = Vec::new();

        let file = match std::fs::read_to_string(&config_path) {
            Ok(text) => serde_json::from_str::<ConfigFile>(&text).map_err(|source| {
                ConfigError::Parse {
                    path: config_path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                notices.push(ConfigNotice::MissingConfig(config_path));
                ConfigFile::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: config_path,
                    source,
                })
            }
        };

        let mut config = self.apply(&file);
        if let Err(error) = std::fs::create_dir_all(&config.backup_dir) {
            let fallback = std::env::temp_dir();
            notices.push(ConfigNotice::BackupFallback {
                requested: std::mem::replace(&mut config.backup_dir, fallback.clone()),
                fallback,
                error,
            });
        }

        Ok(Resolution { config, notices })
    }

    /// Resolve every path of a config file without touching the filesystem.
    pub fn apply(&self, file: &ConfigFile) -> ResolvedConfig {
        ResolvedConfig {
            document_path: self.absolute(Path::new(&file.document_path)),
            schema_path: file
                .schema_path
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(|p| self.absolute(Path::new(p))),
            backup_dir: self.absolute(Path::new(&file.backup_dir)),
            log_dir: self.absolute(Path::new(&file.log_dir)),
            processor: ProcessorSettings {
                java: self.program(&file.java),
                saxon_jar: self.absolute(Path::new(&file.saxon_jar)),
                jing_jar: file
                    .jing_jar
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .map(|p| self.absolute(Path::new(p))),
                tool_timeout: Duration::from_secs(file.tool_timeout_secs),
            },
        }
    }

    /// Join a relative path onto the server directory, dropping `.` segments.
    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let mut out = self.server_dir.clone();
        for component in path.components() {
            match component {
                std::path::Component::CurDir => {}
                other => out.push(other.as_os_str()),
            }
        }
        out
    }

    /// Bare program names are left for `PATH` lookup.
    fn program(&self, program: &str) -> PathBuf {
        if program.contains('/') || program.contains('\\') {
            self.absolute(Path::new(program))
        } else {
            PathBuf::from(program)
        }
    }
}
