use ssc_stream::logger::init_logging;
use ssc_stream::{load_settings, run};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config_name = std::env::args().nth(1).unwrap_or_else(|| "ssc".to_string());

    let settings = match load_settings(&config_name) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings.log);
    info!(
        "Signaling {:?} at {}:{}",
        settings.signaling.mode, settings.signaling.host, settings.signaling.port
    );

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Session failed: {e}");
            ExitCode::FAILURE
        }
    }
}
