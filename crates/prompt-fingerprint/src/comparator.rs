//! Distance strategies between prompt descriptors.

use crate::descriptor::CompositeDescriptor;
use crate::prompt::PromptDescriptor;
use crate::types::{Distance, FingerprintResult};

/// Dissimilarity between two values of the same type.
pub trait Comparator<T: ?Sized>: Send + Sync {
    fn compare(&self, a: &T, b: &T) -> FingerprintResult<Distance>;
}

impl<T: ?Sized, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> FingerprintResult<Distance> + Send + Sync,
{
    fn compare(&self, a: &T, b: &T) -> FingerprintResult<Distance> {
        self(a, b)
    }
}

/// Compares composite descriptors; a side without descriptors is incomparable.
///
/// Note the sentinel conflates "could not rank" with "maximally
/// dissimilar". Rankers that assume a bounded metric should filter it out.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComparator;

impl<G: ?Sized> Comparator<PromptDescriptor<G, DefaultComparator>> for DefaultComparator {
    fn compare(
        &self,
        a: &PromptDescriptor<G, DefaultComparator>,
        b: &PromptDescriptor<G, DefaultComparator>,
    ) -> FingerprintResult<Distance> {
        descriptor_distance(a.descriptors(), b.descriptors())
    }
}

/// `a.distance_to(b)` when both are present, [`Distance::MAX`] otherwise.
pub fn descriptor_distance(
    a: Option<&CompositeDescriptor>,
    b: Option<&CompositeDescriptor>,
) -> FingerprintResult<Distance> {
    match (a, b) {
        (Some(a), Some(b)) => a.distance_to(b),
        _ => Ok(Distance::MAX),
    }
}
