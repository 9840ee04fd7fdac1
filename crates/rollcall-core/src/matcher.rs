//! Face matcher: capture + reference descriptor → match decision.

use crate::capture::FaceImage;
use crate::embedder::{EmbedError, FaceEmbedder};
use crate::types::{DistanceMetric, Embedding, MatchResult};

/// Default maximum cosine distance for a positive match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.40;

/// Threshold and metric applied to every comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    pub threshold: f32,
    pub metric: DistanceMetric,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// `distance <= threshold`. NaN never matches.
pub fn decide(distance: f32, threshold: f32) -> bool {
    distance.is_finite() && distance <= threshold
}

/// Score a candidate embedding against a reference embedding.
pub fn score(
    candidate: &Embedding,
    reference: &Embedding,
    metric: DistanceMetric,
    threshold: f32,
) -> Result<MatchResult, EmbedError> {
    if candidate.dim() != reference.dim() {
        return Err(EmbedError::DimensionMismatch {
            expected: reference.dim(),
            actual: candidate.dim(),
        });
    }

    let distance = candidate.distance(reference, metric);
    Ok(MatchResult {
        distance,
        threshold,
        metric,
        is_match: decide(distance, threshold),
    })
}

/// Compares captures against reference descriptors using a pluggable embedder.
///
/// Holds no state besides the embedder; nothing is persisted.
pub struct FaceMatcher<E> {
    embedder: E,
    policy: MatchPolicy,
}

impl<E: FaceEmbedder> FaceMatcher<E> {
    pub fn new(embedder: E, policy: MatchPolicy) -> Self {
        Self { embedder, policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn embedder_mut(&mut self) -> &mut E {
        &mut self.embedder
    }

    /// Compare using the configured threshold.
    pub fn compare(
        &mut self,
        candidate: &FaceImage,
        reference: &Embedding,
    ) -> Result<MatchResult, EmbedError> {
        self.compare_with_threshold(candidate, reference, self.policy.threshold)
    }

    /// Compare using an explicit threshold, overriding the configured one.
    pub fn compare_with_threshold(
        &mut self,
        candidate: &FaceImage,
        reference: &Embedding,
        threshold: f32,
    ) -> Result<MatchResult, EmbedError> {
        let embedding = self.embedder.detect_and_embed(candidate)?;
        let result = score(&embedding, reference, self.policy.metric, threshold)?;
        tracing::debug!(
            distance = result.distance,
            threshold,
            metric = %result.metric,
            is_match = result.is_match,
            "face compared"
        );
        Ok(result)
    }
}
