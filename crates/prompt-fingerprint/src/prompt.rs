//! Prompt descriptors: prompt → generated image → composite descriptor.

use std::fmt;
use std::marker::PhantomData;

use image::DynamicImage;

use crate::comparator::{Comparator, DefaultComparator};
use crate::descriptor::CompositeDescriptor;
use crate::extract::ExtractionPipeline;
use crate::generation::GenerationStrategy;
use crate::types::{unix_now, Distance, FingerprintRecord, FingerprintResult};

/// Rendered by [`PromptDescriptor::describe`] when generation failed.
pub const NO_DESCRIPTORS: &str = "No descriptors generated.";

/// A successful generation: the image and what was extracted from it.
#[derive(Debug, Clone)]
struct Generated {
    image: DynamicImage,
    descriptors: CompositeDescriptor,
}

/// Visual fingerprint of a text prompt.
///
/// Built once by [`PromptDescriptor::initialize`] and immutable afterwards.
/// Either both the image and its descriptors are present (ready) or
/// neither is (failed); a half-built state cannot be represented.
///
/// `G` is the generation backend the descriptor came from. Descriptors
/// from different backends are different types and cannot be compared.
pub struct PromptDescriptor<G: ?Sized, C = DefaultComparator> {
    prompt: String,
    backend: String,
    generated: Option<Generated>,
    comparator: C,
    _strategy: PhantomData<fn() -> Box<G>>,
}

impl<G, C> PromptDescriptor<G, C>
where
    G: GenerationStrategy + ?Sized,
    C: Comparator<Self>,
{
    /// Generate an image for `prompt` and extract descriptors from it.
    ///
    /// Never fails: a backend or extraction failure leaves the descriptor
    /// without an image and without descriptors.
    pub async fn initialize(
        prompt: impl Into<String>,
        strategy: &G,
        pipeline: &ExtractionPipeline,
        comparator: C,
    ) -> Self {
        let prompt = prompt.into();
        let backend = strategy.name().to_string();

        let generated = match strategy.generate_image(&prompt).await {
            Some(image) => match pipeline.run(&image) {
                Ok(descriptors) => Some(Generated { image, descriptors }),
                Err(e) => {
                    tracing::warn!(backend = %backend, error = %e, "descriptor extraction failed");
                    None
                }
            },
            None => None,
        };

        tracing::debug!(
            backend = %backend,
            ready = generated.is_some(),
            "prompt descriptor initialized"
        );

        Self {
            prompt,
            backend,
            generated,
            comparator,
            _strategy: PhantomData,
        }
    }

    /// Distance to another descriptor of the same type, via the comparator.
    pub fn compare_to(&self, other: &Self) -> FingerprintResult<Distance> {
        self.comparator.compare(self, other)
    }
}

impl<G: ?Sized, C> PromptDescriptor<G, C> {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Name of the backend that produced (or failed to produce) the image.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn generated_image(&self) -> Option<&DynamicImage> {
        self.generated.as_ref().map(|g| &g.image)
    }

    pub fn descriptors(&self) -> Option<&CompositeDescriptor> {
        self.generated.as_ref().map(|g| &g.descriptors)
    }

    /// Whether generation and extraction both succeeded.
    pub fn is_ready(&self) -> bool {
        self.generated.is_some()
    }

    /// Prompt plus descriptor contents, or a fixed placeholder.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Snapshot for persistence in a fingerprint store.
    pub fn to_record(&self) -> FingerprintRecord {
        FingerprintRecord {
            id: 0,
            prompt: self.prompt.clone(),
            backend: self.backend.clone(),
            created_at: unix_now(),
            descriptors: self.descriptors().cloned(),
        }
    }
}

impl<G: ?Sized, C> fmt::Display for PromptDescriptor<G, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PromptDescriptor<{}>: [{}]", self.backend, self.prompt)?;
        match self.descriptors() {
            Some(d) => write!(f, "{d}"),
            None => f.write_str(NO_DESCRIPTORS),
        }
    }
}

impl<G: ?Sized, C> fmt::Debug for PromptDescriptor<G, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptDescriptor")
            .field("prompt", &self.prompt)
            .field("backend", &self.backend)
            .field("descriptors", &self.descriptors())
            .finish_non_exhaustive()
    }
}
