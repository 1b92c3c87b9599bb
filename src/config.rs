use crate::{
    backend::DEFAULT_BACKEND_URL,
    frame::DEFAULT_FPS,
    session,
};
use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::path::{
    Path,
    PathBuf,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

pub const BACKEND_URL_ENV: &str = "CHICKEN_CRASH_BACKEND_URL";
const LOG_FILE_PREFIX: &str = "chicken-crash.log";
const MAX_FPS: u32 = 240;

#[derive(Parser, Debug)]
#[command(version, about = "Chicken Road crash game terminal client", long_about = None)]
pub struct Args {
    /// Base URL of the round backend.
    #[arg(long, env = BACKEND_URL_ENV, default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Where the player id and logs are kept (defaults to the platform data dir).
    #[arg(long)]
    pub data_dir: Option<String>,

    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend_url: String,
    pub data_dir: PathBuf,
    pub fps: u32,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let backend_url = args.backend_url.trim().trim_end_matches('/').to_string();
        if backend_url.is_empty() {
            return Err(eyre!("--backend-url must not be empty"));
        }
        if !(1..=MAX_FPS).contains(&args.fps) {
            return Err(eyre!("--fps must be between 1 and {MAX_FPS}, got {}", args.fps));
        }
        let data_dir = session::resolve_data_dir(args.data_dir.as_deref())?;
        Ok(AppConfig {
            backend_url,
            data_dir,
            fps: args.fps,
            log_filter: args.log_filter,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Routes tracing output to a daily rolling file; the terminal belongs to the UI.
/// Keep the returned guard alive for the life of the process.
pub fn init_tracing(log_dir: &Path, filter: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_new(filter)
        .wrap_err_with(|| format!("invalid log filter {filter:?}"))?;
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!(e))
        .wrap_err("failed to install tracing subscriber")?;
    Ok(guard)
}
