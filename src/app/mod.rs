mod config;
mod error;
mod logging;
mod retry;
mod runtime;
pub mod state;

pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let config = config::AppConfig::from_env()?;

    tracing::info!(
        scooter_index = config.scooter_index,
        sensors = config.sensors.len(),
        poll_interval_secs = config.poll_interval_secs,
        http_bind = %config.http_bind,
        "application bootstrap initialized"
    );

    runtime::run(config)
}
