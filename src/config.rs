use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub staging: StagingConfig,
    pub local: LocalConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub agent: AgentConfig,
    /// Remote sources are optional; a subcommand using one fails with a
    /// configuration error when its section is absent.
    pub s3: Option<S3Config>,
    pub drive: Option<DriveConfig>,
    pub wiki: Option<WikiConfig>,
}

/// Scratch space for fetched bytes, namespaced per source kind.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    #[serde(default = "default_staging_root")]
    pub root: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root: default_staging_root(),
        }
    }
}

fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join("kbforge")
}

/// Local directory source
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// Root directory whose files are listed for ingestion.
    pub root: PathBuf,
}

/// Knowledge-base service (the external embedding/indexing collaborator)
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeBaseConfig {
    pub endpoint: String,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "embeddings".to_string()
}

/// Agent service (question answering over the knowledge base)
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Chat turns sent as history with each question.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_history_turns() -> usize {
    5
}

/// Object-storage source. Credential material is named by environment
/// variable, never stored in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_access_key_env() -> String {
    "AWS_ACCESS_KEY_ID".to_string()
}

fn default_secret_key_env() -> String {
    "AWS_SECRET_ACCESS_KEY".to_string()
}

/// Cloud-drive source
#[derive(Debug, Clone, Deserialize)]
pub struct DriveConfig {
    #[serde(default = "default_drive_base_url")]
    pub base_url: String,
    /// Environment variable holding the credentials JSON blob.
    #[serde(default = "default_drive_credentials_env")]
    pub credentials_env: String,
    pub folder_id: Option<String>,
}

fn default_drive_base_url() -> String {
    "https://www.googleapis.com/drive/v3/".to_string()
}

fn default_drive_credentials_env() -> String {
    "DRIVE_CREDENTIALS_JSON".to_string()
}

/// Wiki source
#[derive(Debug, Clone, Deserialize)]
pub struct WikiConfig {
    pub base_url: String,
    #[serde(default = "default_wiki_username_env")]
    pub username_env: String,
    #[serde(default = "default_wiki_token_env")]
    pub token_env: String,
}

fn default_wiki_username_env() -> String {
    "WIKI_USERNAME".to_string()
}

fn default_wiki_token_env() -> String {
    "WIKI_API_TOKEN".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in KBFORGE_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("KBFORGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.knowledge_base.endpoint.trim().is_empty() {
            anyhow::bail!("knowledge_base.endpoint must be set");
        }

        if self.knowledge_base.table.trim().is_empty() {
            anyhow::bail!("knowledge_base.table must not be empty");
        }

        if self.agent.endpoint.trim().is_empty() {
            anyhow::bail!("agent.endpoint must be set");
        }

        if self.agent.history_turns == 0 {
            anyhow::bail!("agent.history_turns must be greater than 0");
        }

        if let Some(s3) = &self.s3 {
            if s3.bucket.trim().is_empty() {
                anyhow::bail!("s3.bucket must not be empty");
            }
        }

        if let Some(wiki) = &self.wiki {
            if wiki.base_url.trim().is_empty() {
                anyhow::bail!("wiki.base_url must be set");
            }
        }

        Ok(())
    }
}
