//! Prompt fingerprints: generate an image from a text prompt, describe it, and compare descriptors.

pub mod comparator;
pub mod decode;
pub mod descriptor;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod prompt;
pub mod similarity;
pub mod storage;
pub mod types;

pub use comparator::{descriptor_distance, Comparator, DefaultComparator};
pub use decode::{decode_image, is_supported_format};
pub use descriptor::{CompositeDescriptor, SubDescriptor};
pub use embedding::{EmbeddingEngine, EMBEDDING_DIM};
pub use extract::{
    ClipExtractor, ExtractionPipeline, Extractor, LumaGridExtractor, SingleColorExtractor,
};
pub use generation::{
    GenerationStrategy, LocalApiStrategy, LocalConfig, RemoteApiStrategy, RemoteConfig,
    DEFAULT_CONNECT_TIMEOUT,
};
pub use prompt::{PromptDescriptor, NO_DESCRIPTORS};
pub use similarity::rank;
pub use storage::{open_or_create, PfpReader, PfpWriter};
pub use types::*;
