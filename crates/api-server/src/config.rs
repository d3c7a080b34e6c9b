use anyhow::{Context, Result};
use portfolio_manager::{RepositoryConfig, RepositoryKind};
use std::time::Duration;

/// Process settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub api_port: u16,
    pub mcp_port: u16,
    pub repository: RepositoryConfig,
    pub upstream_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let api_port = match lookup("API_PORT") {
            Some(v) => v.trim().parse().with_context(|| format!("Invalid API_PORT: {}", v))?,
            None => 8001,
        };
        let mcp_port = match lookup("MCP_PORT") {
            Some(v) => v.trim().parse().with_context(|| format!("Invalid MCP_PORT: {}", v))?,
            None => 3001,
        };

        let kind: RepositoryKind = match lookup("PORTFOLIO_REPO_TYPE") {
            Some(v) => v.parse()?,
            None => RepositoryKind::Sqlite,
        };
        let db_path = lookup("PORTFOLIO_DB_PATH").unwrap_or_else(|| "portfolio.db".to_string());

        let timeout_secs: u64 = lookup("YAHOO_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(30);

        Ok(Self {
            host,
            api_port,
            mcp_port,
            repository: RepositoryConfig { kind, db_path },
            upstream_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
