//! Configuration management for autoreview
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (AUTOREVIEW_*, plus AWS_S3_ENDPOINT)
//! 3. Config file (~/.config/autoreview/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which queue protocol this deployment consumes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Broker queue with visibility timeout and delete-by-receipt
    #[default]
    Sqs,
    /// List with atomic pop
    Redis,
}

impl std::str::FromStr for QueueBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqs" => Ok(QueueBackend::Sqs),
            "redis" => Ok(QueueBackend::Redis),
            other => Err(Error::Config(format!(
                "Unknown queue backend '{}'. Expected 'sqs' or 'redis'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for QueueBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueBackend::Sqs => write!(f, "sqs"),
            QueueBackend::Redis => write!(f, "redis"),
        }
    }
}

/// Broker queue settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SqsConfig {
    /// Queue URL
    pub queue_url: Option<String>,

    /// How long a received message stays invisible to other consumers
    #[serde(with = "humantime_serde")]
    pub visibility_timeout: Duration,

    /// Long-poll wait per receive call (zero means short polling)
    #[serde(with = "humantime_serde")]
    pub wait_time: Duration,

    /// Receive count after which an unparseable message is dead-lettered
    pub max_receive_count: u32,

    /// Where poison messages are forwarded; dropped when unset
    pub dead_letter_queue_url: Option<String>,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            queue_url: None,
            visibility_timeout: Duration::from_secs(60),
            wait_time: Duration::ZERO,
            max_receive_count: 5,
            dead_letter_queue_url: None,
        }
    }
}

/// List queue settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Server address, with or without the `redis://` scheme
    pub address: Option<String>,

    /// Password for the default user
    pub password: Option<String>,

    /// Logical database index
    pub db: i64,

    /// List to pop jobs from
    pub list_key: String,

    /// List that receives unparseable payloads; dropped when unset
    pub dead_letter_key: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            address: None,
            password: None,
            db: 0,
            list_key: "review-request".to_string(),
            dead_letter_key: None,
        }
    }
}

/// Queue configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Selected backend
    pub backend: QueueBackend,

    /// Broker queue settings
    pub sqs: SqsConfig,

    /// List queue settings
    pub redis: RedisConfig,
}

/// Object storage configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Custom S3-compatible endpoint; default AWS resolution when unset
    pub endpoint: Option<String>,
}

/// GitHub App identity
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Numeric app id
    pub app_id: Option<u64>,

    /// Numeric installation id
    pub installation_id: Option<u64>,

    /// PEM private key of the app
    pub private_key_path: Option<PathBuf>,

    /// API base URL, for GitHub Enterprise
    pub api_url: Option<String>,
}

/// Inference command configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Executable to run
    pub program: String,

    /// Arguments placed before the prompt
    pub args: Vec<String>,

    /// Upper bound on a single generation
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            program: "ollama".to_string(),
            args: vec!["run".to_string(), "magicoder".to_string()],
            timeout: Duration::from_secs(600),
        }
    }
}

/// Worker loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Sleep between polls when the queue is empty or unreachable
    #[serde(with = "humantime_serde")]
    pub idle_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_secs(1),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub github: GitHubConfig,
    pub inference: InferenceConfig,
    pub worker: WorkerConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/autoreview/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("autoreview").join("config.toml"))
    }

    /// Apply environment variable overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Supported variables:
    /// - AUTOREVIEW_QUEUE_BACKEND: `sqs` or `redis`
    /// - AUTOREVIEW_SQS_QUEUE_URL, AUTOREVIEW_SQS_DLQ_URL
    /// - AUTOREVIEW_REDIS_ADDRESS, AUTOREVIEW_REDIS_PASSWORD, AUTOREVIEW_REDIS_LIST_KEY
    /// - AWS_S3_ENDPOINT: object store endpoint override
    /// - AUTOREVIEW_GITHUB_APP_ID, AUTOREVIEW_GITHUB_INSTALLATION_ID,
    ///   AUTOREVIEW_GITHUB_PRIVATE_KEY_PATH
    /// - AUTOREVIEW_INFERENCE_PROGRAM
    /// - AUTOREVIEW_INFERENCE_MODEL: replaces the last inference argument
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = var("AUTOREVIEW_QUEUE_BACKEND") {
            self.queue.backend = backend.parse()?;
        }
        if let Some(url) = var("AUTOREVIEW_SQS_QUEUE_URL") {
            self.queue.sqs.queue_url = Some(url);
        }
        if let Some(url) = var("AUTOREVIEW_SQS_DLQ_URL") {
            self.queue.sqs.dead_letter_queue_url = Some(url);
        }
        if let Some(address) = var("AUTOREVIEW_REDIS_ADDRESS") {
            self.queue.redis.address = Some(address);
        }
        if let Some(password) = var("AUTOREVIEW_REDIS_PASSWORD") {
            self.queue.redis.password = Some(password);
        }
        if let Some(key) = var("AUTOREVIEW_REDIS_LIST_KEY") {
            self.queue.redis.list_key = key;
        }
        if let Some(endpoint) = var("AWS_S3_ENDPOINT") {
            self.storage.endpoint = Some(endpoint);
        }
        if let Some(id) = var("AUTOREVIEW_GITHUB_APP_ID") {
            self.github.app_id = Some(parse_id("AUTOREVIEW_GITHUB_APP_ID", &id)?);
        }
        if let Some(id) = var("AUTOREVIEW_GITHUB_INSTALLATION_ID") {
            self.github.installation_id = Some(parse_id("AUTOREVIEW_GITHUB_INSTALLATION_ID", &id)?);
        }
        if let Some(path) = var("AUTOREVIEW_GITHUB_PRIVATE_KEY_PATH") {
            self.github.private_key_path = Some(PathBuf::from(path));
        }
        if let Some(program) = var("AUTOREVIEW_INFERENCE_PROGRAM") {
            self.inference.program = program;
        }
        if let Some(model) = var("AUTOREVIEW_INFERENCE_MODEL") {
            self.inference.set_model(model);
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        backend: Option<QueueBackend>,
        model: Option<String>,
    ) -> Self {
        if let Some(backend) = backend {
            self.queue.backend = backend;
        }

        if let Some(m) = model {
            self.inference.set_model(m);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        path: Option<&Path>,
        backend: Option<QueueBackend>,
        model: Option<String>,
    ) -> Result<Self> {
        let base = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };
        Ok(base.with_env_overrides()?.with_cli_overrides(backend, model))
    }

    /// Check that everything the worker needs is present
    pub fn validate(&self) -> Result<()> {
        match self.queue.backend {
            QueueBackend::Sqs => {
                if self.queue.sqs.queue_url.is_none() {
                    return Err(Error::Config(
                        "queue.sqs.queue_url is required for the sqs backend \
                         (or set AUTOREVIEW_SQS_QUEUE_URL)"
                            .to_string(),
                    ));
                }
                if self.queue.sqs.max_receive_count == 0 {
                    return Err(Error::Config(
                        "queue.sqs.max_receive_count must be at least 1".to_string(),
                    ));
                }
            }
            QueueBackend::Redis => {
                if self.queue.redis.address.is_none() {
                    return Err(Error::Config(
                        "queue.redis.address is required for the redis backend \
                         (or set AUTOREVIEW_REDIS_ADDRESS)"
                            .to_string(),
                    ));
                }
                if self.queue.redis.list_key.is_empty() {
                    return Err(Error::Config("queue.redis.list_key must not be empty".to_string()));
                }
            }
        }

        self.github.identity()?;

        if self.inference.program.is_empty() {
            return Err(Error::Config("inference.program must not be empty".to_string()));
        }

        Ok(())
    }
}

impl GitHubConfig {
    /// App id, installation id and key path, or a config error naming what is missing
    pub fn identity(&self) -> Result<(u64, u64, &Path)> {
        let app_id = self
            .app_id
            .ok_or_else(|| Error::Config("github.app_id is required".to_string()))?;
        let installation_id = self
            .installation_id
            .ok_or_else(|| Error::Config("github.installation_id is required".to_string()))?;
        let key = self
            .private_key_path
            .as_deref()
            .ok_or_else(|| Error::Config("github.private_key_path is required".to_string()))?;
        Ok((app_id, installation_id, key))
    }
}

impl InferenceConfig {
    /// Replace the model argument, which is the last configured argument
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        match self.args.last_mut() {
            Some(last) => *last = model,
            None => self.args.push(model),
        }
    }
}

fn parse_id(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn complete_sqs() -> Config {
        let mut config = Config::default();
        config.queue.sqs.queue_url = Some("https://sqs.example/queue".to_string());
        config.github.app_id = Some(1);
        config.github.installation_id = Some(2);
        config.github.private_key_path = Some(PathBuf::from("key.pem"));
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.queue.backend, QueueBackend::Sqs);
        assert_eq!(config.queue.sqs.visibility_timeout, Duration::from_secs(60));
        assert_eq!(config.queue.redis.list_key, "review-request");
        assert_eq!(config.inference.program, "ollama");
        assert_eq!(config.inference.args, vec!["run", "magicoder"]);
        assert_eq!(config.worker.idle_backoff, Duration::from_secs(1));
        assert!(config.storage.endpoint.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[queue]
backend = "redis"

[queue.redis]
address = "redis://localhost:6379"
list_key = "jobs"

[inference]
args = ["run", "codellama"]
timeout = "2m"

[worker]
idle_backoff = "250ms"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.queue.backend, QueueBackend::Redis);
        assert_eq!(config.queue.redis.address.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.queue.redis.list_key, "jobs");
        assert_eq!(config.inference.timeout, Duration::from_secs(120));
        assert_eq!(config.worker.idle_backoff, Duration::from_millis(250));
        // program should use default
        assert_eq!(config.inference.program, "ollama");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[github]\napp_id = 788325\ninstallation_id = 45833995\nprivate_key_path = \"app.pem\""
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        let (app, installation, key) = config.github.identity().unwrap();
        assert_eq!(app, 788325);
        assert_eq!(installation, 45833995);
        assert_eq!(key, Path::new("app.pem"));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[queue]\nbackend = \"kafka\"").unwrap();
        assert!(matches!(Config::load_from_file(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .with_overrides_from(lookup(&[
                ("AUTOREVIEW_QUEUE_BACKEND", "redis"),
                ("AUTOREVIEW_REDIS_ADDRESS", "cache:6379"),
                ("AWS_S3_ENDPOINT", "https://r2.example"),
                ("AUTOREVIEW_GITHUB_APP_ID", "12"),
                ("AUTOREVIEW_INFERENCE_MODEL", "deepseek-coder"),
            ]))
            .unwrap();

        assert_eq!(config.queue.backend, QueueBackend::Redis);
        assert_eq!(config.queue.redis.address.as_deref(), Some("cache:6379"));
        assert_eq!(config.storage.endpoint.as_deref(), Some("https://r2.example"));
        assert_eq!(config.github.app_id, Some(12));
        assert_eq!(config.inference.args, vec!["run", "deepseek-coder"]);
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let config = Config::default()
            .with_overrides_from(lookup(&[("AWS_S3_ENDPOINT", "  ")]))
            .unwrap();
        assert!(config.storage.endpoint.is_none());
    }

    #[test]
    fn test_bad_env_id_rejected() {
        let result = Config::default()
            .with_overrides_from(lookup(&[("AUTOREVIEW_GITHUB_INSTALLATION_ID", "abc")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default()
            .with_cli_overrides(Some(QueueBackend::Redis), Some("starcoder".to_string()));
        assert_eq!(config.queue.backend, QueueBackend::Redis);
        assert_eq!(config.inference.args, vec!["run", "starcoder"]);
    }

    #[test]
    fn test_validate() {
        assert!(complete_sqs().validate().is_ok());

        let mut missing_queue = complete_sqs();
        missing_queue.queue.sqs.queue_url = None;
        assert!(matches!(missing_queue.validate(), Err(Error::Config(_))));

        let mut missing_key = complete_sqs();
        missing_key.github.private_key_path = None;
        let err = missing_key.validate().unwrap_err();
        assert!(err.to_string().contains("private_key_path"));

        let mut redis = complete_sqs();
        redis.queue.backend = QueueBackend::Redis;
        assert!(redis.validate().is_err());
        redis.queue.redis.address = Some("localhost:6379".to_string());
        assert!(redis.validate().is_ok());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("SQS".parse::<QueueBackend>().unwrap(), QueueBackend::Sqs);
        assert_eq!("redis".parse::<QueueBackend>().unwrap(), QueueBackend::Redis);
        assert!("rabbit".parse::<QueueBackend>().is_err());
    }
}
