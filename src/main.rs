use anyhow::Context;
use clap::{Parser, ValueEnum};
use expiry_preprocess::{Pipeline, PipelineConfig, PixelBuffer};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Write the fully processed image
    Process,
    /// Write the image after every enabled step
    Trace,
    /// Write one image per detected text line
    Lines,
    /// Write every ensemble variant
    Variants,
}

#[derive(Parser, Debug)]
#[command(name = "expiry-preprocess")]
#[command(about = "Normalize expiry-date crops for OCR")]
#[command(version)]
pub struct Args {
    /// Input images
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Pipeline configuration (JSON); all steps disabled when omitted
    #[arg(long, env = "EXPIRY_PREPROCESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Which operation to run
    #[arg(long, value_enum, default_value = "process")]
    pub mode: Mode,

    /// Directory for the output PNGs
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

fn load_pipeline(path: Option<&Path>) -> anyhow::Result<Pipeline> {
    let config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            PipelineConfig::from_json_str(&json)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    Ok(Pipeline::new(config)?)
}

fn save(image: PixelBuffer, dir: &Path, stem: &str, suffix: &str) -> anyhow::Result<()> {
    let path = dir.join(format!("{}_{}.png", stem, suffix));
    image
        .into_dynamic()
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

fn run_one(pipeline: &Pipeline, mode: Mode, input: &Path, out_dir: &Path) -> anyhow::Result<usize> {
    let image = PixelBuffer::open(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let mut written = 0;
    match mode {
        Mode::Process => {
            save(pipeline.process(image), out_dir, &stem, "processed")?;
            written += 1;
        }
        Mode::Trace => {
            for (index, (name, step_image)) in pipeline.trace(image).into_iter().enumerate() {
                save(step_image, out_dir, &stem, &format!("{:02}_{}", index, name))?;
                written += 1;
            }
        }
        Mode::Lines => {
            for (index, line) in pipeline.split_lines(&image).into_iter().enumerate() {
                save(line, out_dir, &stem, &format!("line{}", index))?;
                written += 1;
            }
        }
        Mode::Variants => {
            for variant in pipeline.generate_variants(&image) {
                save(variant.image, out_dir, &stem, variant.label)?;
                written += 1;
            }
        }
    }
    Ok(written)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let pipeline = load_pipeline(args.config.as_deref())?;
    tracing::info!(
        "expiry-preprocess v{}: {} input(s), steps {:?}",
        env!("CARGO_PKG_VERSION"),
        args.inputs.len(),
        pipeline.config().enabled_steps()
    );

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    let mut failed = 0usize;
    for input in &args.inputs {
        match run_one(&pipeline, args.mode, input, &args.output_dir) {
            Ok(written) => tracing::info!("{}: wrote {} image(s)", input.display(), written),
            Err(e) => {
                tracing::error!("{}: {:#}", input.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} input(s) failed", failed, args.inputs.len());
    }
    Ok(())
}
