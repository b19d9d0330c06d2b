use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub music_dir: PathBuf,
    pub covers_dir: PathBuf,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Media catalog API: tracks, covers and playlists")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_CATALOG_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_CATALOG_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding audio files (overrides MEDIA_CATALOG_MUSIC_DIR)
    #[arg(long)]
    pub music_dir: Option<PathBuf>,

    /// Directory holding cover images (overrides MEDIA_CATALOG_COVERS_DIR)
    #[arg(long)]
    pub covers_dir: Option<PathBuf>,

    /// Largest accepted request body in bytes (overrides MEDIA_CATALOG_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("MEDIA_CATALOG_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("MEDIA_CATALOG_PORT", 5000)?;
        let env_music = env::var("MEDIA_CATALOG_MUSIC_DIR").unwrap_or_else(|_| "./uploads/music".into());
        let env_covers =
            env::var("MEDIA_CATALOG_COVERS_DIR").unwrap_or_else(|_| "./uploads/covers".into());
        let env_limit = parse_env("MEDIA_CATALOG_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            music_dir: args.music_dir.unwrap_or_else(|| env_music.into()),
            covers_dir: args.covers_dir.unwrap_or_else(|| env_covers.into()),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_limit),
        };

        if cfg.max_upload_bytes == 0 {
            anyhow::bail!("max upload size must be greater than zero");
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
