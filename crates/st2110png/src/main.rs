mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use image::ImageFormat;
use tracing::info;

use st2110png_core::frame::Frame;
use st2110png_core::net::FlowFilter;
use st2110png_core::pipeline::{self, PipelineConfig};
use st2110png_core::st2110::Resolution;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Extract {
            input,
            output,
            resolution,
            dst_port,
            dst_addr,
        } => {
            let resolution: Resolution = resolution.into();
            info!(?input, ?output, %resolution, "starting extraction");

            let config = PipelineConfig {
                resolution,
                flow: FlowFilter {
                    destination_addr: dst_addr,
                    destination_port: dst_port,
                },
            };

            let frame = pipeline::run_pipeline(&input, &config).context("frame extraction failed")?;

            write_png(&frame, &output)?;

            info!(
                width = frame.geometry.width,
                height = frame.geometry.height,
                packets = frame.packets,
                rtp_timestamp = frame.rtp_timestamp,
                capture_seconds = frame.capture_timestamp.as_secs_f64(),
                ?output,
                "extraction complete"
            );

            Ok(())
        }
    }
}

/// Encode the frame as RGBA PNG and write it to `output`.
fn write_png(frame: &Frame, output: &Path) -> Result<()> {
    info!(?output, "writing PNG output");

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).context("failed to create output directory")?;
    }

    frame
        .image
        .save_with_format(output, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(?output, "PNG output written");
    Ok(())
}
