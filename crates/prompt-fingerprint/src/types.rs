//! Core data types shared across the fingerprint pipeline.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::descriptor::CompositeDescriptor;

/// A non-negative dissimilarity score between two descriptors.
///
/// [`Distance::MAX`] is the "incomparable" sentinel. It is a valid value
/// that orders after every real distance, so callers that rank must test
/// for it with [`Distance::is_max`] instead of treating it as an error.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distance(f64);

impl Distance {
    /// Identical descriptors.
    pub const ZERO: Self = Self(0.0);

    /// Sentinel returned when a real comparison cannot be performed.
    pub const MAX: Self = Self(f64::MAX);

    /// Wrap a raw score.
    ///
    /// Negative inputs collapse to zero and NaN becomes [`Distance::MAX`].
    /// Real scores are capped just below the sentinel.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::MAX;
        }
        Self(value.clamp(0.0, largest_real()))
    }

    /// The raw score.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether this is the incomparable sentinel.
    pub fn is_max(self) -> bool {
        self.0 == f64::MAX
    }
}

impl Add for Distance {
    type Output = Distance;

    fn add(self, rhs: Self) -> Self::Output {
        if self.is_max() || rhs.is_max() {
            return Self::MAX;
        }
        Self((self.0 + rhs.0).min(largest_real()))
    }
}

/// Largest value a real distance may take; one ulp below the sentinel.
fn largest_real() -> f64 {
    f64::from_bits(f64::MAX.to_bits() - 1)
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_max() {
            f.write_str("incomparable")
        } else {
            write!(f, "{:.6}", self.0)
        }
    }
}

/// A ranking result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMatch {
    /// Position of the candidate in the input slice, or a record ID for store queries.
    pub id: u64,
    pub distance: Distance,
    /// False when the distance is the incomparable sentinel.
    pub comparable: bool,
}

/// A persisted fingerprint: the prompt and whatever descriptors it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub id: u64,
    pub prompt: String,
    pub backend: String,
    pub created_at: u64,
    pub descriptors: Option<CompositeDescriptor>,
}

/// In-memory container for stored fingerprints.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    pub records: Vec<FingerprintRecord>,
    pub next_id: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl FingerprintStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        let now = unix_now();
        Self {
            records: Vec::new(),
            next_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get a record by ID.
    pub fn get(&self, id: u64) -> Option<&FingerprintRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Add a record and return its assigned ID.
    pub fn add(&mut self, mut record: FingerprintRecord) -> u64 {
        let id = self.next_id;
        record.id = id;
        self.next_id += 1;
        self.updated_at = unix_now();
        self.records.push(record);
        id
    }

    /// Return the number of records.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Rank stored records against a query's descriptors, closest first.
    ///
    /// Records that failed to generate, or a query that failed, rank last
    /// with the incomparable sentinel.
    pub fn query(
        &self,
        descriptors: Option<&CompositeDescriptor>,
        top_k: usize,
    ) -> FingerprintResult<Vec<RankedMatch>> {
        let mut matches = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let distance = crate::comparator::descriptor_distance(
                descriptors,
                record.descriptors.as_ref(),
            )?;
            matches.push(RankedMatch {
                id: record.id,
                distance,
                comparable: !distance.is_max(),
            });
        }
        crate::similarity::sort_matches(&mut matches);
        matches.truncate(top_k);
        Ok(matches)
    }
}

impl Default for FingerprintStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Errors that can occur in the fingerprint library.
#[derive(thiserror::Error, Debug)]
pub enum FingerprintError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {phase}")]
    Status { phase: &'static str, status: u16 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Convenience result type.
pub type FingerprintResult<T> = Result<T, FingerprintError>;
