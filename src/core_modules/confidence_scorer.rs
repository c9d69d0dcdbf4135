// THEORY:
// The confidence scorer is the bridge between a raw `Frame` and whatever model
// produces the fire probability. The model itself is out of our hands: it is reached
// only through the `Classifier` capability, so a local ONNX session, a different
// runtime, or a remote inference service can be swapped in without touching the
// decision logic.
//
// The scorer owns the two things the engine must get right around that call:
// 1.  **Preprocessing**: resize to 224x224, scale to [0, 1], add the batch dimension,
//     in the channel order the model was trained on.
// 2.  **Score policy**: the model is trusted to return a value in [0, 1], but a broken
//     model must never feed a made-up number into the hysteresis. Non-finite scores
//     are always rejected; finite out-of-range scores are rejected or clamped
//     according to `ScorePolicy`.
//
// A classifier failure is an error for that frame. There is no fallback score.

use crate::core_modules::frame::{ChannelOrder, Frame, NormalizedTensor};
use crate::error::ClassifierError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The external model: one normalized tensor in, one confidence out.
pub trait Classifier {
    fn infer(&mut self, tensor: &NormalizedTensor) -> Result<f32, ClassifierError>;

    /// Short label for logs.
    fn name(&self) -> &str {
        "classifier"
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn infer(&mut self, tensor: &NormalizedTensor) -> Result<f32, ClassifierError> {
        (**self).infer(tensor)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Adapts a closure into a `Classifier`.
pub struct FnClassifier<F>(F);

impl<F> FnClassifier<F>
where
    F: FnMut(&NormalizedTensor) -> Result<f32, ClassifierError>,
{
    pub fn new(infer: F) -> Self {
        Self(infer)
    }
}

impl<F> Classifier for FnClassifier<F>
where
    F: FnMut(&NormalizedTensor) -> Result<f32, ClassifierError>,
{
    fn infer(&mut self, tensor: &NormalizedTensor) -> Result<f32, ClassifierError> {
        (self.0)(tensor)
    }

    fn name(&self) -> &str {
        "fn"
    }
}

/// What to do with a finite score outside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorePolicy {
    #[default]
    Reject,
    Clamp,
}

impl ScorePolicy {
    pub fn apply(self, raw: f32) -> Result<f32, ClassifierError> {
        if !raw.is_finite() {
            return Err(ClassifierError::OutOfRange(raw));
        }
        if (0.0..=1.0).contains(&raw) {
            return Ok(raw);
        }
        match self {
            ScorePolicy::Reject => Err(ClassifierError::OutOfRange(raw)),
            ScorePolicy::Clamp => {
                warn!(raw, "classifier score out of range, clamping");
                Ok(raw.clamp(0.0, 1.0))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub channel_order: ChannelOrder,
    pub score_policy: ScorePolicy,
}

pub struct ConfidenceScorer<C> {
    classifier: C,
    config: ScorerConfig,
}

impl<C: Classifier> ConfidenceScorer<C> {
    pub fn new(classifier: C, config: ScorerConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Preprocesses the frame, runs the classifier and applies the score policy.
    pub fn score(&mut self, frame: &Frame) -> Result<f32, ClassifierError> {
        let tensor = NormalizedTensor::from_frame(frame, self.config.channel_order);
        let raw = self.classifier.infer(&tensor)?;
        self.config.score_policy.apply(raw)
    }
}
