use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Server settings, read from `FUSHUB_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub storage_dir: PathBuf,
    pub public_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let jwt_secret = lookup("FUSHUB_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FUSHUB_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("FUSHUB_HOST", "0.0.0.0");
        let port: u16 = var("FUSHUB_PORT", "3000")
            .parse()
            .context("FUSHUB_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid FUSHUB_HOST '{}'", host))?;

        let public_url = var("FUSHUB_PUBLIC_URL", &format!("http://localhost:{}", port));

        Ok(Self {
            jwt_secret,
            db_path: var("FUSHUB_DB_PATH", "fushub.db").into(),
            addr,
            storage_dir: var("FUSHUB_STORAGE_DIR", "./storage").into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }
}
