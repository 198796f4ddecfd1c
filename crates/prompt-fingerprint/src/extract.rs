//! Sub-descriptor extractors and the pipeline that runs them.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;

use crate::descriptor::{CompositeDescriptor, SubDescriptor};
use crate::embedding::EmbeddingEngine;
use crate::types::{FingerprintError, FingerprintResult};

/// Side length of the luminance grid.
pub const LUMA_GRID_SIZE: u32 = 8;

/// Computes one sub-descriptor from an image.
pub trait Extractor: Send + Sync {
    fn extract(&self, img: &DynamicImage) -> FingerprintResult<SubDescriptor>;

    fn name(&self) -> &str;
}

/// Mean RGB colour of the whole image.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleColorExtractor;

impl Extractor for SingleColorExtractor {
    fn extract(&self, img: &DynamicImage) -> FingerprintResult<SubDescriptor> {
        let rgb = img.to_rgb8();
        let count = rgb.width() as usize * rgb.height() as usize;
        if count == 0 {
            return Ok(SubDescriptor::SingleColor { rgb: [0.0; 3] });
        }

        let mut sum = [0u64; 3];
        for pixel in rgb.pixels() {
            for c in 0..3 {
                sum[c] += pixel[c] as u64;
            }
        }

        let mean = sum.map(|s| (s as f64 / count as f64) as f32);
        Ok(SubDescriptor::SingleColor { rgb: mean })
    }

    fn name(&self) -> &str {
        "single-color"
    }
}

/// Coarse layout: mean luminance over an 8x8 grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct LumaGridExtractor;

impl Extractor for LumaGridExtractor {
    fn extract(&self, img: &DynamicImage) -> FingerprintResult<SubDescriptor> {
        let cell_count = (LUMA_GRID_SIZE * LUMA_GRID_SIZE) as usize;
        let (w, h) = (img.width(), img.height());
        if w == 0 || h == 0 {
            return Ok(SubDescriptor::LumaGrid {
                cells: vec![0.0; cell_count],
            });
        }

        let gray = img.to_luma8();
        let mut sums = vec![0u64; cell_count];
        let mut counts = vec![0u64; cell_count];

        for (x, y, pixel) in gray.enumerate_pixels() {
            let cx = (x as u64 * LUMA_GRID_SIZE as u64 / w as u64) as usize;
            let cy = (y as u64 * LUMA_GRID_SIZE as u64 / h as u64) as usize;
            let idx = cy * LUMA_GRID_SIZE as usize + cx;
            sums[idx] += pixel.0[0] as u64;
            counts[idx] += 1;
        }

        // Images smaller than the grid leave some cells empty.
        let cells = sums
            .iter()
            .zip(&counts)
            .map(|(&s, &n)| if n == 0 { 0.0 } else { (s as f64 / n as f64 / 255.0) as f32 })
            .collect();

        Ok(SubDescriptor::LumaGrid { cells })
    }

    fn name(&self) -> &str {
        "luma-grid"
    }
}

/// CLIP embedding of the image.
pub struct ClipExtractor {
    engine: Mutex<EmbeddingEngine>,
}

impl ClipExtractor {
    pub fn new(model_path: Option<&Path>) -> FingerprintResult<Self> {
        Ok(Self::with_engine(EmbeddingEngine::new(model_path)?))
    }

    pub fn with_engine(engine: EmbeddingEngine) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }
}

impl Extractor for ClipExtractor {
    fn extract(&self, img: &DynamicImage) -> FingerprintResult<SubDescriptor> {
        let mut engine = self
            .engine
            .lock()
            .map_err(|_| FingerprintError::Embedding("embedding engine lock poisoned".to_string()))?;
        let vector = engine.embed(img)?;
        Ok(SubDescriptor::ClipEmbedding { vector })
    }

    fn name(&self) -> &str {
        "clip"
    }
}

/// Ordered extractors run after an image is generated.
///
/// Each extractor appends exactly one sub-descriptor, in pipeline order.
#[derive(Default)]
pub struct ExtractionPipeline {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractionPipeline {
    /// A pipeline with no extractors; it yields an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extractor.
    pub fn with(mut self, extractor: impl Extractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn push(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Build a composite descriptor from an image.
    pub fn run(&self, img: &DynamicImage) -> FingerprintResult<CompositeDescriptor> {
        let mut composite = CompositeDescriptor::new();
        for extractor in &self.extractors {
            let item = extractor.extract(img)?;
            tracing::debug!(extractor = extractor.name(), kind = item.kind(), "extracted");
            composite.add(item);
        }
        Ok(composite)
    }
}

impl fmt::Debug for ExtractionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.extractors.iter().map(|e| e.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(rgb)))
    }

    #[test]
    fn test_single_color_solid() {
        let d = SingleColorExtractor.extract(&solid(5, 5, [10, 20, 30])).unwrap();
        assert_eq!(d, SubDescriptor::SingleColor { rgb: [10.0, 20.0, 30.0] });
    }

    #[test]
    fn test_single_color_mean() {
        let mut img = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        img.put_pixel(1, 0, Rgb([100, 50, 255]));
        let d = SingleColorExtractor
            .extract(&DynamicImage::ImageRgb8(img))
            .unwrap();
        assert_eq!(d, SubDescriptor::SingleColor { rgb: [50.0, 25.0, 127.5] });
    }

    #[test]
    fn test_single_color_empty_image() {
        let d = SingleColorExtractor.extract(&DynamicImage::new_rgb8(0, 0)).unwrap();
        assert_eq!(d, SubDescriptor::SingleColor { rgb: [0.0; 3] });
    }

    #[test]
    fn test_luma_grid_shape_and_range() {
        let d = LumaGridExtractor.extract(&solid(64, 32, [255, 255, 255])).unwrap();
        let SubDescriptor::LumaGrid { cells } = d else {
            panic!("expected luma grid");
        };
        assert_eq!(cells.len(), 64);
        assert!(cells.iter().all(|&c| (c - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_luma_grid_small_image() {
        let d = LumaGridExtractor.extract(&solid(2, 2, [255, 255, 255])).unwrap();
        let SubDescriptor::LumaGrid { cells } = d else {
            panic!("expected luma grid");
        };
        assert_eq!(cells.len(), 64);
        assert_eq!(cells.iter().filter(|&&c| c > 0.0).count(), 4);
    }

    #[test]
    fn test_clip_fallback_extracts_zero_vector() {
        let extractor = ClipExtractor::with_engine(EmbeddingEngine::fallback());
        let d = extractor.extract(&solid(8, 8, [1, 2, 3])).unwrap();
        assert_eq!(d.kind(), "clip_embedding");
    }

    #[test]
    fn test_pipeline_order() {
        let pipeline = ExtractionPipeline::new()
            .with(LumaGridExtractor)
            .with(SingleColorExtractor);
        let composite = pipeline.run(&solid(16, 16, [0, 0, 0])).unwrap();
        let kinds: Vec<&str> = composite.items().iter().map(|i| i.kind()).collect();
        assert_eq!(kinds, vec!["luma_grid", "single_color"]);
        assert_eq!(format!("{pipeline:?}"), "[\"luma-grid\", \"single-color\"]");
    }

    #[test]
    fn test_empty_pipeline() {
        let composite = ExtractionPipeline::new().run(&solid(1, 1, [0, 0, 0])).unwrap();
        assert!(composite.is_empty());
    }

    #[test]
    fn test_same_image_same_descriptors() {
        let pipeline = ExtractionPipeline::new()
            .with(SingleColorExtractor)
            .with(LumaGridExtractor);
        let img = solid(33, 17, [90, 160, 12]);
        let a = pipeline.run(&img).unwrap();
        let b = pipeline.run(&img).unwrap();
        assert_eq!(a.distance_to(&b).unwrap().value(), 0.0);
    }
}
