//! The shipped embedding backend: SCRFD detection + ArcFace recognition.

use crate::capture::FaceImage;
use crate::detector::{DetectorError, FaceDetector};
use crate::embedder::{EmbedError, FaceEmbedder};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;
use std::path::{Path, PathBuf};

pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

impl From<DetectorError> for EmbedError {
    fn from(e: DetectorError) -> Self {
        EmbedError::Backend(format!("detector: {e}"))
    }
}

impl From<RecognizerError> for EmbedError {
    fn from(e: RecognizerError) -> Self {
        EmbedError::Backend(format!("recognizer: {e}"))
    }
}

/// Model files expected inside a model directory.
pub fn model_paths(model_dir: &Path) -> (PathBuf, PathBuf) {
    (model_dir.join(SCRFD_MODEL_FILE), model_dir.join(ARCFACE_MODEL_FILE))
}

pub struct OnnxEmbedder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxEmbedder {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path, min_face_confidence: f32) -> Result<Self, EmbedError> {
        let (scrfd, arcface) = model_paths(model_dir);
        let detector = FaceDetector::load(&scrfd, min_face_confidence)?;
        let recognizer = FaceRecognizer::load(&arcface)?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEmbedder for OnnxEmbedder {
    fn detect_and_embed(&mut self, image: &FaceImage) -> Result<Embedding, EmbedError> {
        let faces = self.detector.detect(image)?;
        let [face] = faces.as_slice() else {
            tracing::info!(faces = faces.len(), "capture rejected: need exactly one face");
            return Err(EmbedError::NoFaceDetected { faces: faces.len() });
        };

        tracing::debug!(confidence = face.confidence, "single face detected");
        Ok(self.recognizer.extract(image, face)?)
    }
}
