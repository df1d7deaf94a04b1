use std::path::PathBuf;

use anyhow::Context;
use casenote_core::{ConversionConfig, Converted, Resource, SequentialIdSource, UuidIdSource};
use casenote_fhir::{parse_message, Converter};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Case notification with the embedded patient.
    Case,
    /// Electronic initial case report document bundle.
    Document,
    /// Redacted patient only.
    Patient,
}

#[derive(Parser, Debug)]
#[command(
    name = "casenote-cli",
    about = "Convert an HL7v2 ORU_R01 case notification into FHIR JSON."
)]
struct Args {
    /// Path to the HL7v2 message.
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Mode::Case)]
    mode: Mode,

    /// JSON file overriding the default lookup tables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number resources `id-1`, `id-2`, ... instead of using random UUIDs.
    #[arg(long)]
    deterministic_ids: bool,

    /// Bundle id for `--mode document`.
    #[arg(long, default_value = "local")]
    process_id: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("casenote_fhir=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read {:?}", args.input))?;

    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("could not read config {path:?}"))?;
            serde_json::from_str::<ConversionConfig>(&raw)
                .with_context(|| format!("invalid config {path:?}"))?
        }
        None => ConversionConfig::default(),
    };

    let converter = if args.deterministic_ids {
        Converter::with_id_source(config, SequentialIdSource::new("id"))
    } else {
        Converter::with_id_source(config, UuidIdSource)
    };

    let message = parse_message(&data)?;
    tracing::debug!(
        segments = ?message.segments().iter().map(|segment| segment.name()).collect::<Vec<_>>(),
        "parsed message"
    );

    let converted = match args.mode {
        Mode::Case => converter.convert_case(&message)?.map(Resource::Case),
        Mode::Document => converter
            .convert_document(&message, &args.process_id)?
            .map(Resource::Bundle),
        Mode::Patient => converter.convert_patient(&message)?.map(Resource::Patient),
    };
    emit(converted)
}

fn emit(converted: Converted<Resource>) -> anyhow::Result<()> {
    let (resource, warnings) = converted.into_parts();
    for warning in &warnings {
        tracing::warn!(%warning, "lossy value");
    }
    println!("{}", serde_json::to_string_pretty(&resource)?);
    Ok(())
}
