//! The face embedding capability.
//!
//! Everything above this trait treats the model as a black box: give it a
//! capture, get back exactly one descriptor or a reason why not.

use crate::capture::FaceImage;
use crate::types::Embedding;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    /// Zero faces, or more than one. Multi-face captures are refused so a
    /// check-in can never be attributed to the wrong person.
    #[error("expected exactly one face, found {faces}")]
    NoFaceDetected { faces: usize },
    #[error("embedding dimension mismatch: reference has {expected}, candidate has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding backend failed: {0}")]
    Backend(String),
}

/// Detects the single face in a capture and turns it into an embedding.
///
/// Stateful backends (ONNX sessions) need `&mut self`.
pub trait FaceEmbedder {
    fn detect_and_embed(&mut self, image: &FaceImage) -> Result<Embedding, EmbedError>;
}

impl<E: FaceEmbedder + ?Sized> FaceEmbedder for &mut E {
    fn detect_and_embed(&mut self, image: &FaceImage) -> Result<Embedding, EmbedError> {
        (**self).detect_and_embed(image)
    }
}

impl<E: FaceEmbedder + ?Sized> FaceEmbedder for Box<E> {
    fn detect_and_embed(&mut self, image: &FaceImage) -> Result<Embedding, EmbedError> {
        (**self).detect_and_embed(image)
    }
}
