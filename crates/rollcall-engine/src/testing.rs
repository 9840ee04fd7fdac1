//! Deterministic embedder for tests: the capture's colour picks the face.

use image::{Rgb, RgbImage};
use rollcall_core::{EmbedError, Embedding, FaceEmbedder, FaceImage};

pub const ALICE: [u8; 3] = [200, 10, 10];
/// Alice again under different lighting. Close to `ALICE`, not identical.
pub const ALICE_AGAIN: [u8; 3] = [190, 20, 10];
pub const BOB: [u8; 3] = [10, 200, 10];
/// Two people in frame.
pub const GROUP: [u8; 3] = [0, 0, 255];
/// Nobody in frame.
pub const BLANK: [u8; 3] = [0, 0, 0];

pub fn capture(rgb: [u8; 3]) -> FaceImage {
    FaceImage::from_rgb(RgbImage::from_pixel(8, 8, Rgb(rgb))).unwrap()
}

pub struct FakeEmbedder;

impl FakeEmbedder {
    pub fn embedding_of(rgb: [u8; 3]) -> Result<Embedding, EmbedError> {
        let values = match rgb {
            BLANK => return Err(EmbedError::NoFaceDetected { faces: 0 }),
            GROUP => return Err(EmbedError::NoFaceDetected { faces: 2 }),
            ALICE => vec![1.0, 0.0, 0.0],
            ALICE_AGAIN => vec![0.95, 0.1, 0.0],
            BOB => vec![0.0, 1.0, 0.0],
            other => other.iter().map(|&c| c as f32 / 255.0).collect(),
        };
        Ok(Embedding {
            values,
            model_version: Some("fake".into()),
        })
    }
}

impl FaceEmbedder for FakeEmbedder {
    fn detect_and_embed(&mut self, image: &FaceImage) -> Result<Embedding, EmbedError> {
        Self::embedding_of(image.rgb().get_pixel(0, 0).0)
    }
}

/// Always fails like a crashed inference session.
pub struct BrokenEmbedder;

impl FaceEmbedder for BrokenEmbedder {
    fn detect_and_embed(&mut self, _image: &FaceImage) -> Result<Embedding, EmbedError> {
        Err(EmbedError::Backend("session closed".into()))
    }
}
