//! fluidglass CLI
//!
//! Opens the interactive window, or renders a few frames headless to a PNG
//! when `--out` is given.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fluidglass_app::windowed::{self, WindowedOptions};
use fluidglass_app::Engine;
use fluidglass_core::{CardPatch, FluidConfig};

/// Simulated frame interval for headless renders
const HEADLESS_FRAME_SECS: f64 = 1.0 / 60.0;

#[derive(Parser)]
#[command(name = "fluidglass")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stable-fluids simulation behind liquid glass cards", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration overrides (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Glass card as x,y,w,h[,radius] in normalised coordinates (repeatable)
    #[arg(long = "card", value_parser = parse_card)]
    cards: Vec<CardPatch>,

    /// Window or image width in pixels
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Window or image height in pixels
    #[arg(long, default_value = "720")]
    height: u32,

    /// Render headless and write a PNG instead of opening a window
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Frames to simulate for a headless render
    #[arg(long, default_value = "60")]
    frames: u32,
}

fn parse_card(value: &str) -> std::result::Result<CardPatch, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid card `{}`: {}", value, e))?;

    match parts.as_slice() {
        [x, y, w, h] => Ok(card_patch(*x, *y, *w, *h)),
        [x, y, w, h, r] => Ok(CardPatch {
            corner_radius: Some(*r),
            ..card_patch(*x, *y, *w, *h)
        }),
        _ => Err(format!("expected x,y,w,h[,radius], got `{}`", value)),
    }
}

fn card_patch(x: f32, y: f32, width: f32, height: f32) -> CardPatch {
    CardPatch {
        x: Some(x),
        y: Some(y),
        width: Some(width),
        height: Some(height),
        corner_radius: None,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug,wgpu_core=info,wgpu_hal=info,naga=info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => FluidConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FluidConfig::default(),
    };

    match &cli.out {
        Some(out) => cmd_render(&cli, config, out),
        None => cmd_window(&cli, config),
    }
}

fn cmd_window(cli: &Cli, config: FluidConfig) -> Result<()> {
    info!("Opening {}x{} window", cli.width, cli.height);
    windowed::run(WindowedOptions {
        width: cli.width,
        height: cli.height,
        config,
        cards: cli.cards.clone(),
        ..Default::default()
    })?;
    Ok(())
}

fn cmd_render(cli: &Cli, config: FluidConfig, out: &Path) -> Result<()> {
    if cli.frames == 0 {
        bail!("--frames must be at least 1");
    }

    let mut engine = pollster::block_on(Engine::headless(cli.width, cli.height, config))
        .context("Failed to create headless engine")?;
    for card in &cli.cards {
        engine.add_card(*card);
    }

    for frame in 0..cli.frames {
        engine.frame(frame as f64 * HEADLESS_FRAME_SECS)?;
    }

    let snapshot = engine.snapshot()?;
    let image = image::RgbaImage::from_raw(snapshot.width, snapshot.height, snapshot.pixels)
        .context("Snapshot size does not match its pixel data")?;
    image
        .save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    info!("Wrote {} after {} frames", out.display(), cli.frames);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_card() {
        let card = parse_card("0.5, 0.5, 0.2, 0.1").unwrap();
        assert_eq!(card, card_patch(0.5, 0.5, 0.2, 0.1));

        let rounded = parse_card("0.1,0.2,0.3,0.4,0.05").unwrap();
        assert_eq!(rounded.corner_radius, Some(0.05));

        assert!(parse_card("0.1,0.2").is_err());
        assert!(parse_card("a,b,c,d").is_err());
    }
}
