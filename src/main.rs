use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use log::{error, info};

mod config;
mod controller;
mod device_client;
mod display;
mod error;
mod output;
mod patterns;
mod session;
mod texture;
mod ui;

use crate::config::Config;
use crate::controller::{CaptureController, CaptureSettings};
use crate::device_client::HttpDeviceClient;
use crate::display::ProjectorDisplay;
use crate::error::{Phase, SessionError};
use crate::patterns::PatternSequence;
use crate::session::SessionReport;
use crate::ui::ProjectorApp;

/// Project Gray-code patterns full-screen and capture each one with a remote camera.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Capture device host [default: 127.0.0.1]
    host: Option<String>,

    /// Capture device port [default: 5016]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("📽  Starting Gray-code capture");

    let mut config = Config::load()?;
    config.apply_target(cli.host, cli.port);
    config.validate()?;

    let (host, port) = config.target_address();

    // Fail on an empty or unreadable pattern set before opening the projector
    let sequence = PatternSequence::from_dir(&config.paths.pattern_dir)
        .map_err(|e| SessionError::new(Phase::Init, None, e))?;

    let device = HttpDeviceClient::new(&host, port, config.request_timeout())
        .map_err(|e| SessionError::new(Phase::Init, None, e))?;
    info!("Capture device at {}", device.base_url());
    let settings = CaptureSettings::from_config(&config);

    let (projector_link, surface_link) = display::link();

    let session = tokio::spawn(async move {
        let display = ProjectorDisplay::connect(projector_link)
            .await
            .map_err(|e| SessionError::new(Phase::Init, None, e))?;

        let mut controller = CaptureController::new(settings, device, display);
        let outcome = controller.run(&sequence).await;
        // Dropping the display closes the projector window
        drop(controller.into_parts());
        outcome
    });

    let mut viewport = egui::ViewportBuilder::default()
        .with_decorations(false)
        .with_always_on_top();
    viewport = if config.display.fullscreen {
        viewport.with_fullscreen(true)
    } else {
        viewport.with_inner_size([config.display.width as f32, config.display.height as f32])
    };

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    let fullscreen = config.display.fullscreen;
    info!("Opening projection surface...");
    eframe::run_native(
        "Gray-code Capture",
        options,
        Box::new(move |_cc| Box::new(ProjectorApp::new(surface_link, fullscreen))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run projection window: {}", e))?;

    let report: SessionReport = session.await.context("Capture session task failed")??;
    info!("{}", report.summary());
    Ok(())
}
