//! rollcall-core: face embedding capability and matching.
//!
//! The matcher only sees the [`FaceEmbedder`] trait. The default `onnx`
//! feature adds [`OnnxEmbedder`]: SCRFD for detection and ArcFace for
//! recognition, both on ONNX Runtime (CPU).

pub mod capture;
pub mod embedder;
pub mod matcher;
pub mod types;

#[cfg(feature = "onnx")]
mod alignment;
#[cfg(feature = "onnx")]
pub mod detector;
#[cfg(feature = "onnx")]
pub mod onnx;
#[cfg(feature = "onnx")]
pub mod recognizer;

pub use capture::{FaceImage, ImageLoadError};
pub use embedder::{EmbedError, FaceEmbedder};
pub use matcher::{FaceMatcher, MatchPolicy, DEFAULT_MATCH_THRESHOLD};
pub use types::{BoundingBox, DistanceMetric, Embedding, MatchResult, Rejection};

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
