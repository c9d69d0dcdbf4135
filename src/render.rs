// THEORY:
// Renderers are the consumers of the engine's single public output, the
// `FrameResult`. They may draw, log, display or store; the engine does not care, as
// long as they answer one question after every frame: keep going or stop?
//
// A renderer asking to stop is the in-band cancellation path (a user pressing a quit
// key in a display window). It is honored at the end of the loop iteration, after the
// frame has been fully processed.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::core_modules::frame::Frame;
use crate::core_modules::utils::image_helper::image_helper::{
    ALERT_RED, CLEAR_GREEN, draw_bar, draw_grid, save,
};
use crate::error::RenderError;
use crate::pipeline::FrameResult;

/// What the engine loop should do after a frame has been rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub trait Renderer {
    fn render(&mut self, frame: &Frame, result: &FrameResult) -> Result<Flow, RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, frame: &Frame, result: &FrameResult) -> Result<Flow, RenderError> {
        (**self).render(frame, result)
    }
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, frame: &Frame, result: &FrameResult) -> Result<Flow, RenderError> {
        (**self).render(frame, result)
    }
}

/// An absent renderer keeps the loop going.
impl<R: Renderer> Renderer for Option<R> {
    fn render(&mut self, frame: &Frame, result: &FrameResult) -> Result<Flow, RenderError> {
        match self {
            Some(renderer) => renderer.render(frame, result),
            None => Ok(Flow::Continue),
        }
    }
}

/// Both renderers always see the frame; either one can stop the loop.
impl<A: Renderer, B: Renderer> Renderer for (A, B) {
    fn render(&mut self, frame: &Frame, result: &FrameResult) -> Result<Flow, RenderError> {
        let first = self.0.render(frame, result)?;
        let second = self.1.render(frame, result)?;
        if first == Flow::Stop || second == Flow::Stop {
            Ok(Flow::Stop)
        } else {
            Ok(Flow::Continue)
        }
    }
}

/// Logs alert transitions at info, every frame at debug.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last_alert: bool,
}

impl Renderer for LogRenderer {
    fn render(&mut self, _frame: &Frame, result: &FrameResult) -> Result<Flow, RenderError> {
        if result.alert != self.last_alert {
            if result.alert {
                warn!(frame = result.frame_index, confidence = result.confidence, "FIRE DETECTED");
            } else {
                info!(frame = result.frame_index, confidence = result.confidence, "fire alert cleared");
            }
            self.last_alert = result.alert;
        }
        if let Some(fps) = result.fps {
            info!("throughput {fps:.1} fps");
        }
        debug!(
            frame = result.frame_index,
            confidence = result.confidence,
            color = result.color_verdict,
            evidence = result.evidence,
            counter = result.hysteresis_counter,
            alert = result.alert,
            "frame processed"
        );
        Ok(Flow::Continue)
    }
}

/// Keeps every result; handy for tests and offline analysis.
#[derive(Debug, Default)]
pub struct CollectingRenderer {
    pub results: Vec<FrameResult>,
    /// Ask the loop to stop after this many frames.
    pub stop_after: Option<usize>,
}

impl CollectingRenderer {
    pub fn stopping_after(frames: usize) -> Self {
        Self {
            results: Vec::new(),
            stop_after: Some(frames),
        }
    }

    pub fn alerts(&self) -> Vec<bool> {
        self.results.iter().map(|r| r.alert).collect()
    }
}

impl Renderer for CollectingRenderer {
    fn render(&mut self, _frame: &Frame, result: &FrameResult) -> Result<Flow, RenderError> {
        self.results.push(result.clone());
        match self.stop_after {
            Some(limit) if self.results.len() >= limit => Ok(Flow::Stop),
            _ => Ok(Flow::Continue),
        }
    }
}

const STATUS_BAR_HEIGHT: u32 = 12;

/// Paints the alert overlay onto a copy of each frame and saves it as PNG:
/// a 3x3 red grid while alerting, and a status bar (red when alerting, green
/// otherwise) whose length tracks the confidence score.
#[derive(Debug)]
pub struct OverlayRenderer {
    output_dir: PathBuf,
}

impl OverlayRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn annotate(frame: &Frame, result: &FrameResult) -> image::RgbImage {
        let mut image = frame.image().clone();
        let color = if result.alert { ALERT_RED } else { CLEAR_GREEN };

        if result.alert {
            draw_grid(&mut image, 3, 3, ALERT_RED, 1);
        }

        let bar_length = (image.width() as f32 * result.confidence.clamp(0.0, 1.0)).round() as u32;
        draw_bar(&mut image, bar_length, STATUS_BAR_HEIGHT, color);
        image
    }
}

impl Renderer for OverlayRenderer {
    fn render(&mut self, frame: &Frame, result: &FrameResult) -> Result<Flow, RenderError> {
        let image = Self::annotate(frame, result);
        let path = self.output_dir.join(format!("frame_{:06}.png", result.frame_index));
        save(&path, &image)?;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;
    use image::Rgb;

    fn result(alert: bool, confidence: f32) -> FrameResult {
        FrameResult {
            frame_index: 7,
            alert,
            confidence,
            color_verdict: alert,
            evidence: alert,
            hysteresis_counter: if alert { 5 } else { 0 },
            fps: None,
        }
    }

    #[test]
    fn collecting_renderer_stops_on_request() {
        let frame = Frame::filled(4, 4, Pixel::default());
        let mut renderer = CollectingRenderer::stopping_after(2);
        assert_eq!(renderer.render(&frame, &result(false, 0.1)).unwrap(), Flow::Continue);
        assert_eq!(renderer.render(&frame, &result(true, 0.9)).unwrap(), Flow::Stop);
        assert_eq!(renderer.alerts(), vec![false, true]);
    }

    #[test]
    fn pair_stops_when_either_side_stops() {
        let frame = Frame::filled(4, 4, Pixel::default());
        let mut pair = (LogRenderer::default(), CollectingRenderer::stopping_after(1));
        assert_eq!(pair.render(&frame, &result(true, 0.9)).unwrap(), Flow::Stop);
        assert_eq!(pair.1.results.len(), 1);
    }

    #[test]
    fn missing_renderer_continues() {
        let frame = Frame::filled(4, 4, Pixel::default());
        let mut renderer: Option<CollectingRenderer> = None;
        assert_eq!(renderer.render(&frame, &result(true, 0.9)).unwrap(), Flow::Continue);
    }

    #[test]
    fn overlay_draws_grid_only_when_alerting() {
        let frame = Frame::filled(90, 90, Pixel::default());

        let alerting = OverlayRenderer::annotate(&frame, &result(true, 1.0));
        assert_eq!(alerting.get_pixel(30, 50), &ALERT_RED);
        assert_eq!(alerting.get_pixel(89, 0), &ALERT_RED);

        let quiet = OverlayRenderer::annotate(&frame, &result(false, 0.5));
        assert_eq!(quiet.get_pixel(30, 50), &Rgb([0, 0, 0]));
        assert_eq!(quiet.get_pixel(10, 0), &CLEAR_GREEN);
        assert_eq!(quiet.get_pixel(80, 0), &Rgb([0, 0, 0]));

        // The source frame is untouched.
        assert!(frame.pixels().all(|p| p == Pixel::default()));
    }

    #[test]
    fn overlay_renderer_writes_numbered_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer = OverlayRenderer::new(dir.path().join("out")).unwrap();
        let frame = Frame::filled(16, 16, Pixel::new(10, 20, 30));

        renderer.render(&frame, &result(false, 0.2)).unwrap();
        assert!(dir.path().join("out").join("frame_000007.png").is_file());
    }
}
