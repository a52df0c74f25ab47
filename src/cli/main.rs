//! bgseg CLI
//!
//! Presents an image file as one of the four representations, shows what the
//! planner decides for a backend, runs the conversion and writes the result.

use super::config::CliConfigBuilder;
use crate::{
    capability::{capability_table, BackendId},
    convert::rasterize,
    types::{EncodedBlob, ImageValue, RawPixelBuffer},
    BackendRegistry, SegmentationPipeline, TracingFormat,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// Format negotiation inspector for segmentation backends
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgseg")]
pub struct Cli {
    /// Input image file
    #[arg(value_name = "INPUT", required_unless_present = "show_capabilities")]
    pub input: Option<PathBuf>,

    /// Representation the input is presented as
    #[arg(long = "as", value_enum, default_value_t = CliRepresentation::Blob)]
    pub representation: CliRepresentation,

    /// Backend to plan for [default: from config, else bodypix]
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Encoding used when the conversion produces a blob
    #[arg(short, long, value_enum)]
    pub format: Option<CliFormat>,

    /// Lossy encoding quality (0.0-1.0)
    #[arg(short, long)]
    pub quality: Option<f32>,

    /// Pipeline configuration file (JSON)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Where to write the prepared value
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Print the decision (or capability table) as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the backend capability table and exit
    #[arg(long)]
    pub show_capabilities: bool,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliRepresentation {
    Blob,
    Decoded,
    Raw,
    DataUrl,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliFormat {
    Png,
    Jpeg,
    #[cfg(feature = "webp-support")]
    Webp,
}

impl CliFormat {
    pub(crate) fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            #[cfg(feature = "webp-support")]
            Self::Webp => "image/webp",
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    input: &'a Path,
    backend: BackendId,
    source: crate::ImageVariant,
    decision: &'a crate::ConversionDecision,
    prepared: crate::ImageVariant,
    dimensions: Option<(u32, u32)>,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        TracingFormat::Compact
    } else {
        TracingFormat::Console
    };
    crate::init_cli_tracing(cli.verbose, format).context("Failed to initialize tracing")?;

    if cli.show_capabilities {
        return show_capabilities(cli.json);
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let backend = CliConfigBuilder::backend(&cli, &config)?;

    let input = cli
        .input
        .as_deref()
        .context("An input file is required")?;

    let pipeline = SegmentationPipeline::new(BackendRegistry::new(), config);
    let span = crate::tracing_config::spans::prepare(
        input,
        backend.name(),
        &format!("{:?}", cli.representation),
    );

    async {
        let image = load_input(&pipeline, input, cli.representation).await?;
        info!("📥 Loaded {} as {}", input.display(), image.variant());

        let prepared = pipeline
            .prepare_for_backend(&image, backend)
            .await
            .with_context(|| format!("Failed to prepare {} for {}", input.display(), backend))?;

        let report = Report {
            input,
            backend,
            source: prepared.source_variant,
            decision: &prepared.decision,
            prepared: prepared.image.variant(),
            dimensions: prepared.image.known_dimensions(),
        };
        print_report(&report, cli.json)?;

        if let Some(output) = &cli.output {
            write_output(&prepared.image, output).await?;
            info!("💾 Wrote {} to {}", prepared.image.variant(), output.display());
        }
        Ok::<_, anyhow::Error>(())
    }
    .instrument(span)
    .await
}

fn show_capabilities(json: bool) -> Result<()> {
    let table = capability_table();
    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("{:<12} {:<40} preferred", "backend", "accepts");
    for entry in table {
        let accepts = entry
            .accepts
            .iter()
            .map(|variant| variant.name())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<12} {:<40} {}",
            entry.backend.name(),
            accepts,
            entry.preferred_target
        );
    }
    Ok(())
}

/// Read `path` and present it in the requested representation
async fn load_input(
    pipeline: &SegmentationPipeline,
    path: &Path,
    representation: CliRepresentation,
) -> Result<ImageValue> {
    let blob = EncodedBlob::from_file(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value = match representation {
        CliRepresentation::Blob => ImageValue::Blob(blob),
        CliRepresentation::DataUrl => ImageValue::TextReference(blob.to_data_url()),
        CliRepresentation::Decoded => ImageValue::Decoded(
            pipeline
                .converter()
                .decode_blob(&blob)
                .await
                .with_context(|| format!("Failed to decode {}", path.display()))?,
        ),
        CliRepresentation::Raw => {
            let decoded = pipeline
                .converter()
                .decode_blob(&blob)
                .await
                .with_context(|| format!("Failed to decode {}", path.display()))?;
            ImageValue::Raw(RawPixelBuffer::from_rgba_image(decoded.pixels().clone()))
        },
    };
    Ok(value)
}

fn print_report(report: &Report<'_>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("input:    {}", report.input.display());
    println!("backend:  {}", report.backend);
    println!("source:   {}", report.source);
    match report.decision.target() {
        Some(target) => println!("decision: convert to {}", target),
        None => println!("decision: keep"),
    }
    println!("reason:   {}", report.decision.reason());
    if let Some((width, height)) = report.dimensions {
        println!("size:     {}x{}", width, height);
    }
    Ok(())
}

/// Blobs are written as-is, pixel variants as PNG, text references as text
async fn write_output(image: &ImageValue, output: &Path) -> Result<()> {
    let span = crate::tracing_config::spans::write_output(output, image.variant().name());
    let bytes = match image {
        ImageValue::Blob(blob) => blob.bytes().to_vec(),
        ImageValue::TextReference(text) => text.clone().into_bytes(),
        ImageValue::Raw(_) | ImageValue::Decoded(_) => {
            let pixels = rasterize(image)?;
            crate::services::EncodingService::encode_png(&pixels)?
                .bytes()
                .to_vec()
        },
    };

    tokio::fs::write(output, bytes)
        .instrument(span)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))
}
