use crate::models::rover::Rover;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

/// Key accepted by the public API gateway for low-volume, non-production use.
pub const DEMO_API_KEY: &str = "DEMO_KEY";
pub const DEFAULT_API_BASE_URL: &str = "https://api.nasa.gov/mars-photos/api/v1/rovers";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; built once in `main`.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Directory under which one sub-directory per earth date is created.
    pub storage_dir: PathBuf,
    pub api_key: String,
    pub api_base_url: String,
    /// Rovers queried for every request, in merge order.
    pub rovers: Vec<Rover>,
    /// Applied to every outbound request when set. Unset means no timeout.
    pub request_timeout: Option<Duration>,
    /// Respond once downloads are launched instead of awaiting them.
    pub background_downloads: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Mars rover photo downloader API")]
pub struct Args {
    /// Host to bind to (overrides ROVER_PHOTOS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where date folders are created (overrides ROVER_PHOTOS_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Upstream API key (overrides NASA_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Upstream rovers endpoint (overrides NASA_API_BASE_URL)
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Comma-separated rovers to query (overrides ROVER_PHOTOS_ROVERS)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub rovers: Option<Vec<Rover>>,

    /// Per-request timeout in seconds (overrides ROVER_PHOTOS_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Respond as soon as downloads start instead of waiting for them
    #[arg(long)]
    pub background_downloads: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Merge already-parsed CLI args over the environment.
    pub fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("ROVER_PHOTOS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("PORT")?.unwrap_or(8080);
        let env_storage = env::var("ROVER_PHOTOS_STORAGE_DIR").unwrap_or_else(|_| ".".into());
        let env_key = env::var("NASA_API_KEY").unwrap_or_else(|_| DEMO_API_KEY.into());
        let env_base =
            env::var("NASA_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());
        let env_rovers = match env::var("ROVER_PHOTOS_ROVERS") {
            Ok(value) => parse_rovers(&value)?,
            Err(_) => Rover::ALL.to_vec(),
        };
        let env_timeout = parse_env::<u64>("ROVER_PHOTOS_REQUEST_TIMEOUT_SECS")?;

        let rovers = args.rovers.unwrap_or(env_rovers);
        if rovers.is_empty() {
            anyhow::bail!("at least one rover must be configured");
        }

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or_else(|| env_storage.into()),
            api_key: args.api_key.unwrap_or(env_key),
            api_base_url: args
                .api_base_url
                .unwrap_or(env_base)
                .trim_end_matches('/')
                .to_string(),
            rovers,
            request_timeout: args
                .request_timeout_secs
                .or(env_timeout)
                .map(Duration::from_secs),
            background_downloads: args.background_downloads,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("api_key", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("rovers", &self.rovers)
            .field("request_timeout", &self.request_timeout)
            .field("background_downloads", &self.background_downloads)
            .finish()
    }
}

/// Read and parse an optional environment variable.
fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn parse_rovers(value: &str) -> Result<Vec<Rover>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            <Rover as clap::ValueEnum>::from_str(name, true)
                .map_err(|err| anyhow::anyhow!("unknown rover `{}`: {}", name, err))
        })
        .collect()
}
