// Runs the fire detection engine over a directory of frames.
//
// Frames are read in file-name order, alert transitions and throughput are logged,
// and with `--annotate-dir` every frame is saved with the alert overlay painted on.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fire_watch::parallel_pipeline::default_workers;
use fire_watch::render::{LogRenderer, OverlayRenderer};
use fire_watch::source::ImageDirectorySource;
use fire_watch::{Classifier, FirePipeline, ParallelPipeline, PipelineConfig, RunSummary, stop_channel};

#[derive(Debug, Parser)]
#[command(name = "fire_watch", version, about = "Watch a frame sequence for fire")]
struct Args {
    /// Directory of frames (png, jpg, bmp, webp), processed in name order.
    frames: PathBuf,

    /// ONNX fire classifier taking a 1x224x224x3 float input.
    #[arg(short, long, default_value = "fire_detection_model.onnx")]
    model: PathBuf,

    /// JSON engine configuration. Flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    confidence_threshold: Option<f32>,

    /// Net-positive frames needed to raise the alert.
    #[arg(long)]
    fire_frames: Option<u32>,

    /// Save annotated frames here.
    #[arg(long)]
    annotate_dir: Option<PathBuf>,

    /// Score frames on a worker pool.
    #[arg(long)]
    parallel: bool,

    /// Worker count for --parallel. Defaults to the number of CPUs.
    #[arg(long)]
    workers: Option<usize>,
}

type DynClassifier = Box<dyn Classifier + Send>;

#[cfg(feature = "onnx")]
fn load_classifiers(model: &Path, count: usize) -> anyhow::Result<Vec<DynClassifier>> {
    use fire_watch::core_modules::onnx_classifier::OnnxClassifier;

    (0..count)
        .map(|_| {
            OnnxClassifier::load(model)
                .map(|classifier| Box::new(classifier) as DynClassifier)
                .with_context(|| format!("loading classifier from {}", model.display()))
        })
        .collect()
}

#[cfg(not(feature = "onnx"))]
fn load_classifiers(model: &Path, _count: usize) -> anyhow::Result<Vec<DynClassifier>> {
    anyhow::bail!(
        "cannot load {}: fire_watch was built without a classifier backend, rebuild with `--features onnx`",
        model.display()
    )
}

fn load_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(threshold) = args.confidence_threshold {
        config.confidence_threshold = threshold;
    }
    if let Some(frames) = args.fire_frames {
        config.fire_frame_threshold = frames;
    }
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let source = ImageDirectorySource::open(&args.frames)
        .with_context(|| format!("opening frame directory {}", args.frames.display()))?;
    if source.is_empty() {
        warn!(dir = %args.frames.display(), "no frames found");
    }
    info!(frames = source.len(), "frame directory opened");

    let overlay = args
        .annotate_dir
        .as_ref()
        .map(|dir| OverlayRenderer::new(dir.clone()))
        .transpose()
        .context("preparing annotation directory")?;
    let mut renderer = (LogRenderer::default(), overlay);

    let (stop_tx, stop_rx) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current frame");
            let _ = stop_tx.send(true);
        }
    });

    let summary: RunSummary = if args.parallel {
        let workers = args.workers.unwrap_or_else(default_workers).max(1);
        let classifiers = load_classifiers(&args.model, workers)?;
        let mut pipeline = ParallelPipeline::new(config, classifiers)?;
        pipeline.run(source, &mut renderer, stop_rx).await?
    } else {
        let mut classifiers = load_classifiers(&args.model, 1)?;
        let classifier = classifiers.pop().context("no classifier loaded")?;
        let mut pipeline = FirePipeline::new(config, classifier)?;
        tokio::task::spawn_blocking(move || {
            let mut source = source;
            pipeline.run(&mut source, &mut renderer, &stop_rx)
        })
        .await
        .context("engine loop panicked")??
    };

    info!(
        processed = summary.frames_processed,
        skipped = summary.frames_skipped,
        alert_frames = summary.alert_frames,
        "done"
    );
    Ok(())
}
