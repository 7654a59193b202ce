mod commands;
mod config;
mod logging;

use anyhow::{bail, Context, Result};
use carlink_auth::{AuthError, AuthenticatedClient, TokenStore};
use carlink_vehicle::snapshot::snapshot_glob;
use carlink_vehicle::{ChargeReport, ChargingAction, VehicleClient, VehicleError};
use commands::{parse_args, Command, USAGE};
use config::Config;
use std::fs::{self, File};
use std::io::BufWriter;
use std::process;
use tracing::{error, info};

fn main() {
    let _ = dotenvy::dotenv();

    let invocation = match parse_args(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            process::exit(e.exit_code());
        }
    };

    let config = match Config::resolve(invocation.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = logging::init(config.settings.log_file.as_deref()) {
        eprintln!("Failed to initialise logging: {:#}", e);
        process::exit(1);
    }

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run(invocation.command, &config)) {
        error!("Error processing {:?}: {:#}", invocation.command, e);
        if let Some(hint) = hint(&e) {
            eprintln!("{}", hint);
        }
        process::exit(1);
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    if command.needs_vin() && config.car.vin.is_empty() {
        bail!("No vehicle configured: set car.vin or CARLINK_VIN");
    }

    match command {
        Command::Report => report(config),
        Command::Login => {
            let mut store = TokenStore::open(&config.auth_config())?;
            store.login().await?;
            info!("Logged in; tokens stored at {}", store.path().display());
            Ok(())
        }
        Command::Logout => {
            let mut store = TokenStore::open(&config.auth_config())?;
            store.clear()?;
            info!("Removed {}", store.path().display());
            Ok(())
        }
        Command::Status | Command::StartCharging | Command::StopCharging | Command::Vehicles => {
            let api = AuthenticatedClient::new(&config.auth_config())?;
            let mut vehicle = VehicleClient::new(api, config.vehicle_config());
            let vin = config.car.vin.as_str();

            match command {
                Command::Status => {
                    vehicle.get_status(vin).await?;
                }
                Command::StartCharging => {
                    vehicle.set_charging(vin, ChargingAction::Start).await?;
                }
                Command::StopCharging => {
                    vehicle.set_charging(vin, ChargingAction::Stop).await?;
                }
                _ => {
                    vehicle.list_vehicles().await?;
                }
            }
            Ok(())
        }
    }
}

fn report(config: &Config) -> Result<()> {
    let path = &config.settings.report_file;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;

    let pattern = snapshot_glob(&config.settings.vehicle_status_file);
    let report = ChargeReport::generate(&pattern, BufWriter::new(file))?;

    for session in &report.sessions {
        println!("{}", session);
    }
    info!(
        rows = report.rows,
        skipped = report.skipped.len(),
        sessions = report.sessions.len(),
        "Charge report stored at: {}",
        path.display()
    );
    Ok(())
}

fn hint(e: &anyhow::Error) -> Option<&'static str> {
    let auth = e.downcast_ref::<AuthError>().or_else(|| match e.downcast_ref::<VehicleError>() {
        Some(VehicleError::Auth(auth)) => Some(auth),
        _ => None,
    })?;
    Some(auth.user_message())
}
