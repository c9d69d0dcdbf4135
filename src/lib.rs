// THEORY:
// This file is the main entry point for the `fire_watch` library crate.
// It defines the public API exposed to the binaries in this workspace (the
// `fire_watch` directory runner and the `fire_tester` camera harness) and to any
// other consumer that wants a stable fire/no-fire signal from a video stream.
//
// The primary interface is `FirePipeline` with its `PipelineConfig` and the
// per-frame `FrameResult`. The analyzers and state machines live in
// `core_modules`; frames come in through a `FrameSource` and results go out
// through a `Renderer`, so cameras, models and displays stay outside the engine.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod render;
pub mod source;

pub use core_modules::confidence_scorer::{Classifier, FnClassifier};
pub use core_modules::frame::Frame;
pub use error::{ClassifierError, ConfigError, EngineError, RenderError, SourceError};
pub use parallel_pipeline::ParallelPipeline;
pub use pipeline::{FirePipeline, FrameResult, PipelineConfig, RunSummary, StopReason, stop_channel};
pub use render::{Flow, Renderer};
pub use source::FrameSource;
