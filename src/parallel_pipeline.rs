use crate::core_modules::color_heuristic::ColorHeuristic;
use crate::core_modules::confidence_scorer::{Classifier, ConfidenceScorer};
use crate::core_modules::frame::Frame;
use crate::error::{ClassifierError, ConfigError, EngineError, SourceError};
use crate::pipeline::{
    EngineState, FrameScores, PipelineConfig, RunSummary, RunTally, StopReason, analyze_frame,
    handle_classifier_failure,
};
use crate::render::{Flow, Renderer};
use crate::source::FrameSource;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Frames read ahead of the slowest in-flight frame, per worker.
const FRAMES_PER_WORKER: usize = 2;

pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Scorers checked out by workers for the duration of one frame. A classifier
/// session is not shareable, so each worker gets its own.
pub struct ScorerPool<C> {
    scorers: Arc<Mutex<VecDeque<ConfidenceScorer<C>>>>,
}

impl<C> Clone for ScorerPool<C> {
    fn clone(&self) -> Self {
        Self {
            scorers: Arc::clone(&self.scorers),
        }
    }
}

impl<C: Classifier> ScorerPool<C> {
    pub fn new(scorers: impl IntoIterator<Item = ConfidenceScorer<C>>) -> Self {
        Self {
            scorers: Arc::new(Mutex::new(scorers.into_iter().collect())),
        }
    }

    pub fn available(&self) -> usize {
        self.scorers.lock().map(|pool| pool.len()).unwrap_or(0)
    }

    fn checkout(&self) -> Result<ConfidenceScorer<C>, EngineError> {
        self.scorers
            .lock()
            .map_err(|_| EngineError::Worker("scorer pool poisoned".into()))?
            .pop_front()
            .ok_or_else(|| EngineError::Worker("no scorer available".into()))
    }

    fn checkin(&self, scorer: ConfidenceScorer<C>) -> Result<(), EngineError> {
        self.scorers
            .lock()
            .map_err(|_| EngineError::Worker("scorer pool poisoned".into()))?
            .push_back(scorer);
        Ok(())
    }
}

type Analyzed = (u64, Frame, Result<FrameScores, ClassifierError>);

/// Scores frames on a pool of blocking workers while the engine state is still
/// advanced one frame at a time, in source order. Produces the same decisions as
/// `FirePipeline::run` for the same frames and scores.
pub struct ParallelPipeline<C> {
    config: PipelineConfig,
    heuristic: Arc<ColorHeuristic>,
    pool: ScorerPool<C>,
    workers: usize,
    state: EngineState,
}

impl<C: Classifier + Send + 'static> ParallelPipeline<C> {
    /// One worker per classifier.
    pub fn new(config: PipelineConfig, classifiers: Vec<C>) -> Result<Self, ConfigError> {
        config.validate()?;
        if classifiers.is_empty() {
            return Err(ConfigError::Invalid("parallel pipeline needs at least one classifier".into()));
        }

        let workers = classifiers.len();
        let pool = ScorerPool::new(
            classifiers
                .into_iter()
                .map(|classifier| ConfidenceScorer::new(classifier, config.scorer)),
        );

        Ok(Self {
            heuristic: Arc::new(ColorHeuristic::new(config.color.clone())),
            state: EngineState::new(&config, Instant::now()),
            pool,
            workers,
            config,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub async fn run<S, R>(&mut self, source: S, renderer: &mut R, stop: watch::Receiver<bool>) -> Result<RunSummary, EngineError>
    where
        S: FrameSource + Send + 'static,
        R: Renderer + ?Sized,
    {
        info!(workers = self.workers, "parallel engine loop started");
        self.state.restart_clock(Instant::now());

        let halt = Arc::new(AtomicBool::new(false));
        let (frame_tx, mut frame_rx) = mpsc::channel(self.workers * FRAMES_PER_WORKER);
        let producer = spawn_producer(source, frame_tx, stop.clone(), Arc::clone(&halt));

        let pool = self.pool.clone();
        let heuristic = Arc::clone(&self.heuristic);
        let skip_queued = Arc::clone(&halt);
        let frames = futures::stream::poll_fn(move |cx| frame_rx.poll_recv(cx));
        let analyzed = frames
            .enumerate()
            .map(move |(index, frame)| {
                let pool = pool.clone();
                let heuristic = Arc::clone(&heuristic);
                let halted = Arc::clone(&skip_queued);
                async move {
                    if halted.load(Ordering::Acquire) {
                        return Ok(None);
                    }
                    analyze_on_worker(index as u64, frame, pool, heuristic).await.map(Some)
                }
            })
            .buffered(self.workers);
        let mut analyzed = std::pin::pin!(analyzed);

        let mut tally = RunTally::default();
        let outcome: Result<StopReason, EngineError> = loop {
            let Some(item) = analyzed.next().await else {
                break Ok(StopReason::EndOfStream);
            };
            let (index, frame, scores) = match item {
                Ok(Some(work)) => work,
                Ok(None) => continue,
                Err(error) => break Err(error),
            };
            match scores {
                Ok(scores) => {
                    let result = self.state.advance(index, scores, Instant::now());
                    tally.record(&result);
                    match renderer.render(&frame, &result) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Stop) => {
                            debug!(frame = index, "renderer requested stop");
                            break Ok(StopReason::Cancelled);
                        }
                        Err(error) => break Err(error.into()),
                    }
                }
                Err(error) => {
                    if let Err(error) =
                        handle_classifier_failure(self.config.on_classifier_error, index, error, &mut tally)
                    {
                        break Err(error);
                    }
                }
            }

            if *stop.borrow() {
                break Ok(StopReason::Cancelled);
            }
        };

        // Scoring already handed to a worker runs to completion; wait for it so every
        // scorer is back in the pool before returning. Queued frames are dropped unscored.
        halt.store(true, Ordering::Release);
        while analyzed.next().await.is_some() {}
        producer
            .await
            .map_err(|e| EngineError::Worker(format!("frame reader panicked: {e}")))?;

        let mut stop_reason = outcome?;
        // The producer also watches the stop signal and may have closed the stream early.
        if *stop.borrow() {
            stop_reason = StopReason::Cancelled;
        }
        Ok(tally.finish(stop_reason))
    }
}

/// Reads the source on a blocking thread. A read error is forwarded and ends the stream.
fn spawn_producer<S>(
    mut source: S,
    frame_tx: mpsc::Sender<Result<Frame, SourceError>>,
    stop: watch::Receiver<bool>,
    halt: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()>
where
    S: FrameSource + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        loop {
            if *stop.borrow() || halt.load(Ordering::Acquire) {
                break;
            }
            let next = match source.next_frame() {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => break,
                Err(error) => Err(error),
            };
            let failed = next.is_err();
            if frame_tx.blocking_send(next).is_err() || failed {
                break;
            }
        }
    })
}

async fn analyze_on_worker<C>(
    index: u64,
    frame: Result<Frame, SourceError>,
    pool: ScorerPool<C>,
    heuristic: Arc<ColorHeuristic>,
) -> Result<Analyzed, EngineError>
where
    C: Classifier + Send + 'static,
{
    let frame = frame?;
    tokio::task::spawn_blocking(move || {
        let mut scorer = pool.checkout()?;
        let scores = analyze_frame(&frame, &mut scorer, &heuristic);
        pool.checkin(scorer)?;
        Ok((index, frame, scores))
    })
    .await
    .map_err(|e| EngineError::Worker(format!("scoring worker panicked: {e}")))?
}
