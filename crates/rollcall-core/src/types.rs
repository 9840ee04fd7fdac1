use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
///
/// This is the reference face descriptor persisted for every student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]. Zero vectors compare as 0.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Copy of this embedding scaled to unit length. Zero vectors are returned unchanged.
    pub fn l2_normalized(&self) -> Embedding {
        let norm = self.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            self.values.iter().map(|v| v / norm).collect()
        } else {
            self.values.clone()
        };
        Embedding {
            values,
            model_version: self.model_version.clone(),
        }
    }

    /// Distance between two embeddings under `metric`. Smaller means more alike.
    pub fn distance(&self, other: &Embedding, metric: DistanceMetric) -> f32 {
        match metric {
            DistanceMetric::Cosine => 1.0 - self.similarity(other),
            DistanceMetric::Euclidean => self.euclidean_distance(other),
            DistanceMetric::EuclideanL2 => self
                .l2_normalized()
                .euclidean_distance(&other.l2_normalized()),
        }
    }
}

/// How two embeddings are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in [0, 2].
    #[default]
    Cosine,
    Euclidean,
    /// Euclidean distance between L2-normalized vectors, in [0, 2].
    EuclideanL2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::EuclideanL2 => "euclidean_l2",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "euclidean_l2" | "euclidean-l2" => Ok(DistanceMetric::EuclideanL2),
            other => Err(format!("unknown distance metric: {other}")),
        }
    }
}

/// Outcome of comparing one candidate against one reference descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    pub distance: f32,
    pub threshold: f32,
    pub metric: DistanceMetric,
    pub is_match: bool,
}

/// Why an attendance operation was turned down.
///
/// Every variant is a recoverable, user-facing outcome. Storage or model
/// failures are never expressed as a rejection.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("{student_id} is already registered")]
    DuplicateIdentity { student_id: String },
    #[error("no student registered as {student_id}")]
    UnknownStudent { student_id: String },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("expected exactly one face, found {faces}")]
    NoFaceDetected { faces: usize },
    #[error("face mismatch (distance={distance:.3}, threshold={threshold:.3})")]
    FaceMismatch { distance: f32, threshold: f32 },
    #[error("already checked in to {lecture}")]
    AlreadyCheckedIn { lecture: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl Rejection {
    /// Stable machine-readable code, suitable for UIs and exit reporting.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::DuplicateIdentity { .. } => "duplicate_identity",
            Rejection::UnknownStudent { .. } => "unknown_student",
            Rejection::InvalidCredentials => "invalid_credentials",
            Rejection::NoFaceDetected { .. } => "no_face_detected",
            Rejection::FaceMismatch { .. } => "face_mismatch",
            Rejection::AlreadyCheckedIn { .. } => "already_checked_in",
            Rejection::InvalidInput { .. } => "invalid_input",
        }
    }
}
