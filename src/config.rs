use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
};

/// Single-request PUT limit of S3.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024 * 1024;
const DEFAULT_REGION: &str = "us-east-1";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub credentials_path: String,
    pub max_upload_bytes: usize,
    /// Where uploads are spooled before being sent to the store.
    pub spool_dir: Option<PathBuf>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Web file manager for S3-compatible object stores")]
pub struct Args {
    /// Host to bind to (overrides BUCKET_BROWSER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUCKET_BROWSER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Path of the JSON credentials file (overrides BUCKET_BROWSER_CREDENTIALS)
    #[arg(long)]
    pub credentials: Option<String>,

    /// Largest accepted upload body in bytes (overrides BUCKET_BROWSER_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Directory for upload spool files (overrides BUCKET_BROWSER_SPOOL_DIR)
    #[arg(long)]
    pub spool_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse())
    }

    /// Fill whatever `args` leaves unset from the environment, then defaults.
    pub fn merge(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("BUCKET_BROWSER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("BUCKET_BROWSER_PORT", 3000)?;
        let env_credentials = env::var("BUCKET_BROWSER_CREDENTIALS")
            .unwrap_or_else(|_| "./credentials.json".into());
        let env_max_upload =
            parse_env("BUCKET_BROWSER_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let env_spool_dir = env::var_os("BUCKET_BROWSER_SPOOL_DIR").map(PathBuf::from);

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            credentials_path: args.credentials.unwrap_or(env_credentials),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            spool_dir: args.spool_dir.or(env_spool_dir),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

/// Object store endpoint and keys, read once at startup.
#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    /// Store endpoint, with or without a scheme.
    pub hostname: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    DEFAULT_REGION.into()
}

impl Credentials {
    /// Read and validate the credentials file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading credentials file {}", path.display()))?;
        let credentials: Credentials = serde_json::from_str(&raw)
            .with_context(|| format!("parsing credentials file {}", path.display()))?;

        for (field, value) in [
            ("accessKey", &credentials.access_key),
            ("secretKey", &credentials.secret_key),
            ("hostname", &credentials.hostname),
        ] {
            if value.trim().is_empty() {
                bail!("credentials file {}: `{}` is empty", path.display(), field);
            }
        }

        Ok(credentials)
    }

    /// Endpoint URL; a bare hostname is served over HTTPS.
    pub fn endpoint(&self) -> String {
        let host = self.hostname.trim().trim_end_matches('/');
        if host.starts_with("https://") || host.starts_with("http://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }

    /// Access key with everything but the first and last four characters hidden.
    pub fn masked_access_key(&self) -> String {
        let chars: Vec<char> = self.access_key.chars().collect();
        if chars.len() <= 8 {
            return "***".into();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.masked_access_key())
            .field("secret_key", &"***")
            .field("hostname", &self.hostname)
            .field("region", &self.region)
            .finish()
    }
}
