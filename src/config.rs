use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::auth::tokens::TokenSettings;

#[derive(Parser, Debug, Default)]
#[command(name = "pickto", about = "Photo posting API server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long, env = "PICKTO_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Secret for signing access tokens
    #[arg(long, env = "PICKTO_ACCESS_SECRET", hide_env_values = true)]
    pub access_secret: Option<String>,

    /// Secret for signing refresh tokens
    #[arg(long, env = "PICKTO_REFRESH_SECRET", hide_env_values = true)]
    pub refresh_secret: Option<String>,

    /// Compare stored objects with post rows once, print the report and exit
    #[arg(long)]
    pub reconcile: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, which bounds image uploads
    pub max_upload_bytes: usize,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Memory,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Bucket directory for the local backend
    pub path: Option<PathBuf>,
    /// Seconds between reconciliation sweeps; 0 disables them
    pub reconcile_interval_secs: u64,
    /// Delete orphaned objects found by a sweep
    pub reconcile_repair: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub secure_cookies: bool,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            issuer: "pickto".to_string(),
            access_ttl_secs: 60,
            refresh_ttl_secs: 24 * 60 * 60,
            secure_cookies: false,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_secret: self.access_secret.clone(),
            refresh_secret: self.refresh_secret.clone(),
            issuer: self.issuer.clone(),
            access_ttl_secs: self.access_ttl_secs,
            refresh_ttl_secs: self.refresh_ttl_secs,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            anyhow::bail!(
                "both token secrets must be set (PICKTO_ACCESS_SECRET, PICKTO_REFRESH_SECRET)"
            );
        }
        if self.access_secret == self.refresh_secret {
            anyhow::bail!("access and refresh token secrets must differ");
        }
        if self.access_ttl_secs <= 0 || self.refresh_ttl_secs <= 0 {
            anyhow::bail!("token lifetimes must be positive");
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            anyhow::bail!("bcrypt_cost must be between 4 and 31");
        }
        Ok(())
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI and environment overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref secret) = cli.access_secret {
            config.auth.access_secret = secret.clone();
        }
        if let Some(ref secret) = cli.refresh_secret {
            config.auth.refresh_secret = secret.clone();
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("pickto.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("bucket"));
        }

        config.auth.validate()?;
        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".pickto")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("pickto.db"))
    }

    pub fn bucket_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("bucket"))
    }
}
