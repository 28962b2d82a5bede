use push_daemon::config::{TelemetryConfig, SERVICE_DESCRIPTION, SERVICE_NAME};
use push_daemon::controller::{parse_command, Controller, USAGE};
use push_daemon::daemon::{platform_manager, ServiceSpec};
use service_core::observability::{init_metrics, init_tracing};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let command = match parse_command(std::env::args_os()) {
        Ok(Some(command)) => command,
        Ok(None) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => e.exit(),
    };

    let telemetry = TelemetryConfig::from_env();
    init_tracing(SERVICE_NAME, &telemetry.log_level, telemetry.otlp_endpoint.as_deref());
    init_metrics();

    let spec = match ServiceSpec::for_current_process(SERVICE_NAME, SERVICE_DESCRIPTION) {
        Ok(spec) => spec,
        Err(e) => {
            tracing::error!("Failed to describe service: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let controller = Controller::new(platform_manager(spec));

    match controller.manage(Some(command)).await {
        Ok(status) => {
            println!("{}", status);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
