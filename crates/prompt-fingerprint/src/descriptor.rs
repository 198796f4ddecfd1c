//! Sub-descriptors and the composite descriptor that holds them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::similarity::{euclidean_distance, mean_abs_difference};
use crate::types::{Distance, FingerprintError, FingerprintResult};

/// A single visual feature computed over one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubDescriptor {
    /// Mean RGB colour, channels in 0..=255.
    SingleColor { rgb: [f32; 3] },
    /// Row-major grid of mean luminance values in 0..=1.
    LumaGrid { cells: Vec<f32> },
    /// L2-normalised CLIP image embedding.
    ClipEmbedding { vector: Vec<f32> },
}

impl SubDescriptor {
    /// Stable name of the descriptor kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SingleColor { .. } => "single_color",
            Self::LumaGrid { .. } => "luma_grid",
            Self::ClipEmbedding { .. } => "clip_embedding",
        }
    }

    /// Distance to a descriptor of the same kind and dimensionality.
    pub fn distance_to(&self, other: &Self) -> FingerprintResult<Distance> {
        match (self, other) {
            (Self::SingleColor { rgb: a }, Self::SingleColor { rgb: b }) => {
                Ok(Distance::new(euclidean_distance(a, b)))
            }
            (Self::LumaGrid { cells: a }, Self::LumaGrid { cells: b }) => {
                check_len(self.kind(), a.len(), b.len())?;
                Ok(Distance::new(mean_abs_difference(a, b)))
            }
            (Self::ClipEmbedding { vector: a }, Self::ClipEmbedding { vector: b }) => {
                check_len(self.kind(), a.len(), b.len())?;
                Ok(Distance::new(euclidean_distance(a, b)))
            }
            _ => Err(FingerprintError::ShapeMismatch(format!(
                "cannot compare {} with {}",
                self.kind(),
                other.kind()
            ))),
        }
    }
}

fn check_len(kind: &str, a: usize, b: usize) -> FingerprintResult<()> {
    if a != b {
        return Err(FingerprintError::ShapeMismatch(format!(
            "{kind} dimensions differ: {a} vs {b}"
        )));
    }
    Ok(())
}

impl fmt::Display for SubDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleColor { rgb } => {
                write!(f, "SingleColor({:.1}, {:.1}, {:.1})", rgb[0], rgb[1], rgb[2])
            }
            Self::LumaGrid { cells } => {
                let mean = if cells.is_empty() {
                    0.0
                } else {
                    cells.iter().sum::<f32>() / cells.len() as f32
                };
                write!(f, "LumaGrid({} cells, mean {mean:.3})", cells.len())
            }
            Self::ClipEmbedding { vector } => write!(f, "ClipEmbedding({} dims)", vector.len()),
        }
    }
}

/// Ordered sub-descriptors computed over one image.
///
/// Insertion order is computation order, and comparison is positional:
/// item `i` of one container is only ever compared with item `i` of the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeDescriptor {
    items: Vec<SubDescriptor>,
}

impl CompositeDescriptor {
    /// Create an empty container.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append a sub-descriptor.
    pub fn add(&mut self, item: SubDescriptor) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[SubDescriptor] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of per-position distances.
    ///
    /// Fails with [`FingerprintError::ShapeMismatch`] when the containers
    /// differ in length or in the kind of any corresponding item.
    pub fn distance_to(&self, other: &Self) -> FingerprintResult<Distance> {
        if self.items.len() != other.items.len() {
            return Err(FingerprintError::ShapeMismatch(format!(
                "descriptor count differs: {} vs {}",
                self.items.len(),
                other.items.len()
            )));
        }

        let mut total = Distance::ZERO;
        for (a, b) in self.items.iter().zip(&other.items) {
            total = total + a.distance_to(b)?;
        }
        Ok(total)
    }
}

impl fmt::Display for CompositeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return f.write_str("(empty)");
        }
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "  [{i}] {item}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(r: f32, g: f32, b: f32) -> SubDescriptor {
        SubDescriptor::SingleColor { rgb: [r, g, b] }
    }

    fn grid(v: f32) -> SubDescriptor {
        SubDescriptor::LumaGrid { cells: vec![v; 4] }
    }

    #[test]
    fn test_single_color_distance() {
        let d = color(0.0, 0.0, 0.0).distance_to(&color(3.0, 4.0, 0.0)).unwrap();
        assert!((d.value() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_kind_mismatch() {
        let err = color(0.0, 0.0, 0.0).distance_to(&grid(0.5)).unwrap_err();
        assert!(matches!(err, FingerprintError::ShapeMismatch(_)));
    }

    #[test]
    fn test_length_mismatch_within_kind() {
        let a = SubDescriptor::ClipEmbedding { vector: vec![0.0; 4] };
        let b = SubDescriptor::ClipEmbedding { vector: vec![0.0; 3] };
        assert!(matches!(
            a.distance_to(&b),
            Err(FingerprintError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_nan_embedding_is_incomparable() {
        let a = SubDescriptor::ClipEmbedding { vector: vec![f32::NAN, 0.0] };
        let b = SubDescriptor::ClipEmbedding { vector: vec![1.0, 0.0] };
        assert!(a.distance_to(&b).unwrap().is_max());

        let mut ca = CompositeDescriptor::new();
        ca.add(color(0.0, 0.0, 0.0));
        ca.add(a);
        let mut cb = CompositeDescriptor::new();
        cb.add(color(0.0, 0.0, 0.0));
        cb.add(b);
        assert!(ca.distance_to(&cb).unwrap().is_max());
    }

    #[test]
    fn test_composite_sums_positions() {
        let mut a = CompositeDescriptor::new();
        a.add(color(0.0, 0.0, 0.0));
        a.add(grid(0.0));
        let mut b = CompositeDescriptor::new();
        b.add(color(0.0, 0.0, 2.0));
        b.add(grid(0.5));

        let d = a.distance_to(&b).unwrap();
        assert!((d.value() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_composite_reflexive() {
        let mut a = CompositeDescriptor::new();
        a.add(color(12.0, 200.0, 7.0));
        a.add(grid(0.3));
        assert_eq!(a.distance_to(&a.clone()).unwrap(), Distance::ZERO);
    }

    #[test]
    fn test_composite_order_sensitive() {
        let mut a = CompositeDescriptor::new();
        a.add(color(0.0, 0.0, 0.0));
        a.add(grid(0.0));
        let mut b = CompositeDescriptor::new();
        b.add(grid(0.0));
        b.add(color(0.0, 0.0, 0.0));
        assert!(matches!(
            a.distance_to(&b),
            Err(FingerprintError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_composite_length_mismatch_not_truncated() {
        let mut a = CompositeDescriptor::new();
        a.add(color(0.0, 0.0, 0.0));
        let mut b = a.clone();
        b.add(grid(0.0));
        assert!(matches!(
            a.distance_to(&b),
            Err(FingerprintError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_empty_composites_are_identical() {
        let a = CompositeDescriptor::new();
        assert_eq!(a.distance_to(&CompositeDescriptor::new()).unwrap(), Distance::ZERO);
        assert_eq!(a.to_string(), "(empty)");
    }

    #[test]
    fn test_serde_tagged() {
        let mut a = CompositeDescriptor::new();
        a.add(color(1.0, 2.0, 3.0));
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["items"][0]["kind"], "single_color");
        let back: CompositeDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }
}
