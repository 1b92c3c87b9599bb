use chicken_crash::{
    client,
    config::{
        self,
        AppConfig,
        Args,
    },
    session::{
        self,
        SessionStore,
    },
};
use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = AppConfig::from_args(Args::parse())?;
    // logs go to a file; the terminal is owned by the UI
    let _log_guard = config::init_tracing(&config.log_dir(), &config.log_filter)?;

    let store = SessionStore::new(&config.data_dir)?;
    let player_id = session::init(&store).wrap_err("failed to load player id")?;
    tracing::info!(
        backend = %config.backend_url,
        data_dir = %config.data_dir.display(),
        %player_id,
        "starting chicken-crash"
    );

    client::run_app(&config).await
}
