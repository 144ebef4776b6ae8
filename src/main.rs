use anyhow::{Result, anyhow};
use clap::Parser;
use cluster_lens::config::{Args, Settings};
use cluster_lens::{app, export};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from(Args::parse());
    if let Some(path) = settings.export.clone() {
        return export::run(&settings, &path);
    }

    let coordinator = settings.coordinator()?;
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "cluster-lens",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::ClusterLensApp::new(
                cc,
                settings,
                coordinator,
            )))
        }),
    )
    .map_err(|error| anyhow!("failed to start the window: {error}"))
}
