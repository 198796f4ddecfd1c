//! CLIP image embeddings via ONNX Runtime.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::types::{FingerprintError, FingerprintResult};

/// Output dimension of CLIP ViT-B/32.
pub const EMBEDDING_DIM: usize = 512;

const MODEL_DIR: &str = ".prompt-fingerprint/models";
const MODEL_FILENAME: &str = "clip-vit-base-patch32-visual.onnx";

const CLIP_IMAGE_SIZE: u32 = 224;
#[allow(clippy::excessive_precision)]
const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
#[allow(clippy::excessive_precision)]
const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Engine for CLIP image embeddings.
///
/// Without a model file the engine runs in fallback mode and yields zero
/// vectors, so pipelines that include it still produce comparable shapes.
pub struct EmbeddingEngine {
    session: Option<Session>,
}

impl EmbeddingEngine {
    /// Load the model at `model_path`, or from `~/.prompt-fingerprint/models/`.
    pub fn new(model_path: Option<&Path>) -> FingerprintResult<Self> {
        let path = model_path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_model_path);

        if !path.exists() {
            tracing::warn!(
                "CLIP model not found at {}. Running in fallback mode (zero embeddings).",
                path.display()
            );
            return Ok(Self { session: None });
        }

        tracing::info!("Loading CLIP model from {}", path.display());

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&path))
            .map_err(|e| FingerprintError::Embedding(format!("Failed to load ONNX model: {e}")))?;

        Ok(Self {
            session: Some(session),
        })
    }

    /// An engine that never loads a model.
    pub fn fallback() -> Self {
        Self { session: None }
    }

    pub fn has_model(&self) -> bool {
        self.session.is_some()
    }

    /// Embed an image. Returns [`EMBEDDING_DIM`] zeros in fallback mode.
    pub fn embed(&mut self, img: &DynamicImage) -> FingerprintResult<Vec<f32>> {
        let Some(session) = self.session.as_mut() else {
            return Ok(vec![0.0; EMBEDDING_DIM]);
        };

        let input = Tensor::from_array(preprocess(img))
            .map_err(|e| FingerprintError::Embedding(format!("Failed to create input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| FingerprintError::Embedding(format!("ONNX inference failed: {e}")))?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| FingerprintError::Embedding(format!("Failed to extract output: {e}")))?;

        Ok(l2_normalize(data.to_vec()))
    }
}

fn default_model_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(MODEL_DIR).join(MODEL_FILENAME)
}

/// Resize to 224x224 and normalise into an NCHW tensor.
fn preprocess(img: &DynamicImage) -> Array4<f32> {
    let rgb = img
        .resize_exact(
            CLIP_IMAGE_SIZE,
            CLIP_IMAGE_SIZE,
            image::imageops::FilterType::Lanczos3,
        )
        .to_rgb8();

    let side = CLIP_IMAGE_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3usize {
            let val = pixel[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (val - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }
    tensor
}

fn l2_normalize(v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_mode() {
        let mut engine = EmbeddingEngine::new(Some(Path::new("/nonexistent/model.onnx"))).unwrap();
        assert!(!engine.has_model());

        let img = DynamicImage::new_rgb8(100, 100);
        let embedding = engine.embed(&img).unwrap();
        assert_eq!(embedding.len(), EMBEDDING_DIM);
        assert!(embedding.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_preprocess_shape() {
        let tensor = preprocess(&DynamicImage::new_rgb8(10, 30));
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
