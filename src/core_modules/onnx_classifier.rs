//! ONNX Runtime backend for the fire classifier.
//!
//! The model is loaded once at startup and must take a single
//! `(1, 224, 224, 3)` float input and produce the fire confidence as the
//! first element of its first output.

use std::path::{Path, PathBuf};

use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tracing::{debug, info};

use crate::core_modules::confidence_scorer::Classifier;
use crate::core_modules::frame::{NormalizedTensor, TENSOR_SHAPE};
use crate::error::ClassifierError;

pub struct OnnxClassifier {
    session: Session,
    model_path: PathBuf,
}

impl OnnxClassifier {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref().to_path_buf();
        info!(path = %model_path.display(), "loading ONNX model");

        let load_error = |reason: String| ClassifierError::Load {
            path: model_path.clone(),
            reason,
        };

        if !model_path.exists() {
            return Err(load_error("file not found".into()));
        }

        let session = Session::builder()
            .map_err(|e| load_error(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_error(format!("failed to set optimization level: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| load_error(format!("failed to load model: {e}")))?;

        info!(path = %model_path.display(), "ONNX model loaded");
        Ok(Self { session, model_path })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl Classifier for OnnxClassifier {
    fn infer(&mut self, tensor: &NormalizedTensor) -> Result<f32, ClassifierError> {
        if tensor.shape() != &TENSOR_SHAPE[..] {
            return Err(ClassifierError::Shape {
                expected: TENSOR_SHAPE.to_vec(),
                got: tensor.shape().to_vec(),
            });
        }

        let input = Tensor::from_array((TENSOR_SHAPE, tensor.contiguous().into_owned().into_boxed_slice()))
            .map_err(|e| ClassifierError::Runtime(format!("failed to build input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| ClassifierError::Runtime(e.to_string()))?;

        let (_, output) = outputs.iter().next().ok_or(ClassifierError::MissingOutput)?;
        let (_shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Runtime(format!("failed to read output tensor: {e}")))?;

        let score = data.first().copied().ok_or(ClassifierError::MissingOutput)?;
        debug!(score, "ONNX inference");
        Ok(score)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
