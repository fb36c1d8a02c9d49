//! Ticket Scanner CLI
//!
//! Scan tickets from a camera (or an image file) and check them against the
//! ticketing API.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;

use ticket_scanner::api::{transport_error_message, TicketApiClient, TicketResponse};
use ticket_scanner::app::{App, SessionHandle, Settings, TicketCheck};
use ticket_scanner::media::{CameraBackend, FacingMode, StillImageBackend};
use ticket_scanner::scanner::RqrrDecoder;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Ticketing API base URL (overrides settings and API_BASE_URL)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Preferred camera: environment, user or any
    #[arg(long, global = true)]
    facing: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a ticket and verify it
    Scan {
        /// Read frames from an image file instead of a camera
        #[arg(long)]
        image: Option<PathBuf>,

        /// Mark valid tickets as used
        #[arg(long)]
        mark_used: bool,

        /// Keep scanning after each ticket
        #[arg(long = "loop")]
        continuous: bool,
    },
    /// Verify a ticket id without scanning
    Verify { ticket_id: String },
    /// Mark a ticket id as used without scanning
    MarkUsed { ticket_id: String },
    /// List capture devices
    Cameras,
    /// Print the effective settings
    Config {
        /// Write them to the settings file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Ticket Scanner v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let settings = effective_settings(&cli)?;

    match cli.command {
        Command::Scan {
            image,
            mark_used,
            continuous,
        } => {
            let mut settings = settings;
            settings.auto_mark_used |= mark_used;
            let api = TicketApiClient::with_base_url(&settings.api_base)?;

            match image {
                Some(path) => scan(settings, api, StillImageBackend::new(path), continuous).await,
                None => scan_with_camera(settings, api, continuous).await,
            }
        }
        Command::Verify { ticket_id } => {
            let api = TicketApiClient::with_base_url(&settings.api_base)?;
            let session = SessionHandle::new();
            let result = session.verify(&api, &ticket_id).await;
            report_call(&session, &ticket_id, result)
        }
        Command::MarkUsed { ticket_id } => {
            let api = TicketApiClient::with_base_url(&settings.api_base)?;
            let session = SessionHandle::new();
            let result = session.mark_used(&api, &ticket_id).await;
            report_call(&session, &ticket_id, result)
        }
        Command::Cameras => list_cameras(),
        Command::Config { save } => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            if save {
                let path = settings.save()?;
                println!("Saved to {}", path.display());
            }
            Ok(())
        }
    }
}

/// Settings file, then environment, then command line
fn effective_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load().unwrap_or_else(|e| {
        error!("Failed to load settings, using defaults: {}", e);
        let mut settings = Settings::default();
        settings.apply_env(std::env::var(ticket_scanner::app::API_BASE_ENV).ok());
        settings
    });

    if let Some(base) = &cli.api_base {
        settings.api_base = base.clone();
    }
    if let Some(facing) = &cli.facing {
        match FacingMode::parse(facing) {
            Some(mode) => settings.camera.facing = mode,
            None => bail!("Unknown facing mode '{}' (use environment, user or any)", facing),
        }
    }
    Ok(settings)
}

#[cfg(feature = "camera")]
async fn scan_with_camera(settings: Settings, api: TicketApiClient, continuous: bool) -> Result<()> {
    scan(settings, api, ticket_scanner::media::NokhwaBackend::new(), continuous).await
}

#[cfg(not(feature = "camera"))]
async fn scan_with_camera(_settings: Settings, _api: TicketApiClient, _continuous: bool) -> Result<()> {
    bail!("Built without camera support: pass --image or rebuild with --features camera")
}

async fn scan<B: CameraBackend>(
    settings: Settings,
    api: TicketApiClient,
    backend: B,
    continuous: bool,
) -> Result<()> {
    let app = App::new(settings, api, backend, RqrrDecoder::new());
    println!("Scanning... (Ctrl+C to stop)");

    loop {
        let outcome = tokio::select! {
            result = app.scan_and_check() => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                app.stop();
                break;
            }
        };

        match outcome {
            Some(check) => print_check(&check),
            None => break,
        }
        if !continuous {
            break;
        }
    }

    let session = app.session().snapshot();
    info!("Scanned {} ticket(s) this session", session.scan_history().len());
    Ok(())
}

fn print_check(check: &TicketCheck) {
    let status = match &check.verification {
        Ok(response) => response
            .ticket
            .as_ref()
            .map(|t| t.status.clone())
            .unwrap_or_default(),
        Err(_) => String::new(),
    };

    if check.is_admitted() {
        let used = if check.mark_used.is_some() { ", marked used" } else { "" };
        println!("✅ {} [{}{}]", check.payload, status, used);
    } else {
        println!(
            "❌ {}: {}",
            check.payload,
            check.message.as_deref().unwrap_or("Verification failed")
        );
    }
}

fn report_call(
    session: &SessionHandle,
    ticket_id: &str,
    result: Result<TicketResponse, ticket_scanner::ApiError>,
) -> Result<()> {
    match result {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            if let Some(message) = session.lock().error() {
                println!("❌ {}: {}", ticket_id, message);
            }
            Ok(())
        }
        Err(e) => bail!("{} ({})", transport_error_message(&e), e),
    }
}

#[cfg(feature = "camera")]
fn list_cameras() -> Result<()> {
    let backend = ticket_scanner::media::NokhwaBackend::new();
    let devices = ticket_scanner::media::camera::enumerate(&backend)?;
    for device in devices {
        let facing = device
            .facing
            .map(|f| format!("{:?}", f).to_lowercase())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}: {} ({})", device.index, device.name, facing);
    }
    Ok(())
}

#[cfg(not(feature = "camera"))]
fn list_cameras() -> Result<()> {
    bail!("Built without camera support: rebuild with --features camera")
}
