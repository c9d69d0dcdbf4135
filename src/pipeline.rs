// THEORY:
// The `pipeline` module is the top-level API of the fire detection engine. It wires
// the per-frame analyzers (color heuristic, confidence scorer) into the fusion gate
// and the stateful parts (hysteresis, rate meter), and it runs the engine loop that
// pulls frames from a source and pushes results to a renderer.
//
// The work per frame splits cleanly in two:
// 1.  **Frame analysis** (`FrameScores`): color and confidence. Pure with respect to
//     the engine; frames can be analyzed in any order or in parallel.
// 2.  **State advance** (`EngineState::advance`): fusion, hysteresis and rate. This is
//     the only place cross-frame state changes, and it must see frames in arrival
//     order. Each engine instance owns its own `EngineState`, so several cameras can be
//     watched side by side.
//
// The engine loop is synchronous: one frame is fully processed before the next is
// pulled. The source is polled at the top of each iteration, cancellation at the
// bottom.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core_modules::color_heuristic::{ColorHeuristic, ColorHeuristicConfig, ColorReport};
use crate::core_modules::confidence_scorer::{Classifier, ConfidenceScorer, ScorerConfig};
use crate::core_modules::frame::Frame;
use crate::core_modules::fusion_gate::{DEFAULT_CONFIDENCE_THRESHOLD, FusionGate};
use crate::core_modules::hysteresis::{DEFAULT_FIRE_FRAME_THRESHOLD, HysteresisCounter};
use crate::core_modules::pixel::pixel::HUE_MAX;
use crate::core_modules::rate_meter::RateMeter;
use crate::error::{ClassifierError, ConfigError, EngineError};
use crate::render::{Flow, Renderer};
use crate::source::FrameSource;

/// What the engine does when the classifier fails on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierFailurePolicy {
    /// End the run with the error.
    #[default]
    Abort,
    /// Drop the frame without touching hysteresis or rate state.
    SkipFrame,
}

/// Configuration for the engine. Every policy constant lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Classifier confidence must be strictly above this to count as evidence.
    pub confidence_threshold: f32,
    /// Net-positive frames needed to raise the alert.
    pub fire_frame_threshold: u32,
    pub color: ColorHeuristicConfig,
    pub scorer: ScorerConfig,
    /// Rate meter window in milliseconds.
    pub rate_window_ms: u64,
    pub on_classifier_error: ClassifierFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            fire_frame_threshold: DEFAULT_FIRE_FRAME_THRESHOLD,
            color: ColorHeuristicConfig::default(),
            scorer: ScorerConfig::default(),
            rate_window_ms: 1_000,
            on_classifier_error: ClassifierFailurePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.fire_frame_threshold == 0 {
            return Err(ConfigError::Invalid("fire_frame_threshold must be at least 1".into()));
        }
        if self.rate_window_ms == 0 {
            return Err(ConfigError::Invalid("rate_window_ms must be positive".into()));
        }
        for (index, band) in self.color.bands.iter().enumerate() {
            if band.upper[0] > HUE_MAX {
                return Err(ConfigError::Invalid(format!(
                    "color band {index}: hue upper bound {} exceeds {HUE_MAX}",
                    band.upper[0]
                )));
            }
            if band.lower.iter().zip(band.upper.iter()).any(|(lo, hi)| lo > hi) {
                return Err(ConfigError::Invalid(format!(
                    "color band {index}: lower bound {:?} exceeds upper bound {:?}",
                    band.lower, band.upper
                )));
            }
        }
        Ok(())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }
}

/// The per-frame record handed to renderers. `alert`, `confidence` and `fps` are the
/// contract; the rest is there for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    /// Position of the frame in the source sequence, from zero.
    pub frame_index: u64,
    /// Stabilized fire decision.
    pub alert: bool,
    pub confidence: f32,
    pub color_verdict: bool,
    /// Single-frame fused evidence.
    pub evidence: bool,
    pub hysteresis_counter: u32,
    /// Present only on frames that close a rate window.
    pub fps: Option<f64>,
}

/// The independent, order-free half of the work on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScores {
    pub confidence: f32,
    pub color: ColorReport,
}

/// Runs both analyzers on a frame. The color pass is cheap and runs first.
pub fn analyze_frame<C: Classifier>(
    frame: &Frame,
    scorer: &mut ConfidenceScorer<C>,
    heuristic: &ColorHeuristic,
) -> Result<FrameScores, ClassifierError> {
    let color = heuristic.evaluate(frame);
    let confidence = scorer.score(frame)?;
    Ok(FrameScores { confidence, color })
}

/// All state the engine carries from one frame to the next.
#[derive(Debug, Clone)]
pub struct EngineState {
    gate: FusionGate,
    hysteresis: HysteresisCounter,
    rate_meter: RateMeter,
    frames_processed: u64,
}

impl EngineState {
    pub fn new(config: &PipelineConfig, start: Instant) -> Self {
        Self {
            gate: FusionGate::new(config.confidence_threshold),
            hysteresis: HysteresisCounter::new(config.fire_frame_threshold),
            rate_meter: RateMeter::with_window(start, config.rate_window()),
            frames_processed: 0,
        }
    }

    /// Folds one analyzed frame into the state. Must be called in frame order.
    pub fn advance(&mut self, frame_index: u64, scores: FrameScores, now: Instant) -> FrameResult {
        let evidence = self.gate.fuse(scores.confidence, scores.color.verdict);
        let alert = self.hysteresis.update(evidence);
        let fps = self.rate_meter.tick(now);
        self.frames_processed += 1;

        FrameResult {
            frame_index,
            alert,
            confidence: scores.confidence,
            color_verdict: scores.color.verdict,
            evidence,
            hysteresis_counter: self.hysteresis.count(),
            fps,
        }
    }

    /// Opens a fresh rate window at `start`. Hysteresis is left alone.
    pub fn restart_clock(&mut self, start: Instant) {
        self.rate_meter.restart(start);
    }

    pub fn is_alerting(&self) -> bool {
        self.hysteresis.is_alerting()
    }

    pub fn hysteresis(&self) -> &HysteresisCounter {
        &self.hysteresis
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

/// Why a run ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub alert_frames: u64,
    pub stop_reason: StopReason,
}

/// Tallies a run as it goes; shared by the sequential and parallel loops.
#[derive(Debug, Default)]
pub(crate) struct RunTally {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub alert_frames: u64,
}

impl RunTally {
    pub fn record(&mut self, result: &FrameResult) {
        self.frames_processed += 1;
        if result.alert {
            self.alert_frames += 1;
        }
    }

    pub fn finish(self, stop_reason: StopReason) -> RunSummary {
        info!(
            processed = self.frames_processed,
            skipped = self.frames_skipped,
            alert_frames = self.alert_frames,
            reason = ?stop_reason,
            "engine loop finished"
        );
        RunSummary {
            frames_processed: self.frames_processed,
            frames_skipped: self.frames_skipped,
            alert_frames: self.alert_frames,
            stop_reason,
        }
    }
}

/// Handles a classifier failure per policy. `Ok(())` means the frame is skipped.
pub(crate) fn handle_classifier_failure(
    policy: ClassifierFailurePolicy,
    frame_index: u64,
    error: ClassifierError,
    tally: &mut RunTally,
) -> Result<(), EngineError> {
    match policy {
        ClassifierFailurePolicy::Abort => Err(EngineError::Classifier {
            frame_index,
            source: error,
        }),
        ClassifierFailurePolicy::SkipFrame => {
            warn!(frame = frame_index, error = %error, "classifier failed, skipping frame");
            tally.frames_skipped += 1;
            Ok(())
        }
    }
}

/// A cancellation handle for the engine loop. Send `true` to stop.
pub fn stop_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// The main, top-level struct for the decision engine.
pub struct FirePipeline<C> {
    config: PipelineConfig,
    heuristic: ColorHeuristic,
    scorer: ConfidenceScorer<C>,
    state: EngineState,
}

impl<C: Classifier> FirePipeline<C> {
    pub fn new(config: PipelineConfig, classifier: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            heuristic: ColorHeuristic::new(config.color.clone()),
            scorer: ConfidenceScorer::new(classifier, config.scorer),
            state: EngineState::new(&config, Instant::now()),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Restarts the rate window at `start`. Hysteresis is left alone.
    pub fn restart_clock(&mut self, start: Instant) {
        self.state.restart_clock(start);
    }

    /// Analyzes one frame and advances the engine state. On a classifier error the
    /// state is left exactly as it was.
    pub fn process_frame(&mut self, frame_index: u64, frame: &Frame, now: Instant) -> Result<FrameResult, ClassifierError> {
        let scores = analyze_frame(frame, &mut self.scorer, &self.heuristic)?;
        Ok(self.state.advance(frame_index, scores, now))
    }

    /// Runs the engine loop until the source ends, a renderer or the stop signal asks
    /// to stop, or something fails.
    pub fn run<S, R>(&mut self, source: &mut S, renderer: &mut R, stop: &watch::Receiver<bool>) -> Result<RunSummary, EngineError>
    where
        S: FrameSource + ?Sized,
        R: Renderer + ?Sized,
    {
        info!(classifier = self.scorer.classifier().name(), "engine loop started");
        self.restart_clock(Instant::now());
        let mut tally = RunTally::default();
        let mut frame_index: u64 = 0;

        loop {
            let Some(frame) = source.next_frame()? else {
                return Ok(tally.finish(StopReason::EndOfStream));
            };
            let index = frame_index;
            frame_index += 1;

            match self.process_frame(index, &frame, Instant::now()) {
                Ok(result) => {
                    tally.record(&result);
                    if renderer.render(&frame, &result)? == Flow::Stop {
                        debug!(frame = index, "renderer requested stop");
                        return Ok(tally.finish(StopReason::Cancelled));
                    }
                }
                Err(error) => {
                    handle_classifier_failure(self.config.on_classifier_error, index, error, &mut tally)?;
                }
            }

            if *stop.borrow() {
                return Ok(tally.finish(StopReason::Cancelled));
            }
        }
    }
}
