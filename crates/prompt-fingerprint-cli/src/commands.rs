//! Subcommand implementations. Output goes to the supplied writer.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use prompt_fingerprint::{
    is_supported_format, open_or_create, DefaultComparator, Distance, ExtractionPipeline,
    GenerationStrategy, PfpReader, PfpWriter, PromptDescriptor,
};

use crate::config::Settings;
use crate::setup::{build_pipeline, build_strategy};

/// Descriptors built by the CLI; the backend is chosen at runtime.
pub type CliDescriptor = PromptDescriptor<dyn GenerationStrategy>;

async fn describe_prompt(
    prompt: &str,
    strategy: &(dyn GenerationStrategy + 'static),
    pipeline: &ExtractionPipeline,
) -> CliDescriptor {
    PromptDescriptor::initialize(prompt, strategy, pipeline, DefaultComparator).await
}

fn distance_value(d: Distance) -> Option<f64> {
    (!d.is_max()).then(|| d.value())
}

/// Generate one fingerprint, print it, and optionally save the image and store the record.
pub async fn generate(
    settings: &Settings,
    prompt: &str,
    save_image: Option<&str>,
    store_path: Option<&Path>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if let Some(path) = save_image {
        if !is_supported_format(path) {
            anyhow::bail!("Unsupported image format for {path}");
        }
    }

    let strategy = build_strategy(settings)?;
    let pipeline = build_pipeline(settings)?;
    let descriptor = describe_prompt(prompt, strategy.as_ref(), &pipeline).await;

    writeln!(out, "{}", descriptor.describe())?;

    let Some(image) = descriptor.generated_image() else {
        anyhow::bail!("No image generated for prompt {prompt:?}");
    };

    if let Some(path) = save_image {
        image
            .save(path)
            .with_context(|| format!("Failed to save image to {path}"))?;
        writeln!(out, "Saved image to {path}")?;
    }

    if let Some(path) = store_path {
        let mut store = open_or_create(path)?;
        let id = store.add(descriptor.to_record());
        PfpWriter::write_to_file(&store, path)?;
        writeln!(out, "Stored fingerprint #{id} in {}", path.display())?;
    }

    Ok(())
}

#[derive(Serialize)]
struct CompareOutput<'a> {
    prompt_a: &'a str,
    prompt_b: &'a str,
    /// `null` when either side produced no descriptors.
    distance: Option<f64>,
}

/// Fingerprint two prompts concurrently and print their distance.
pub async fn compare(
    settings: &Settings,
    prompt_a: &str,
    prompt_b: &str,
    json: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let strategy = build_strategy(settings)?;
    let pipeline = build_pipeline(settings)?;

    let (a, b) = tokio::join!(
        describe_prompt(prompt_a, strategy.as_ref(), &pipeline),
        describe_prompt(prompt_b, strategy.as_ref(), &pipeline),
    );
    let distance = a.compare_to(&b)?;

    if json {
        let output = CompareOutput {
            prompt_a,
            prompt_b,
            distance: distance_value(distance),
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    } else {
        writeln!(out, "{distance}")?;
    }
    Ok(())
}

#[derive(Serialize)]
struct QueryHit<'a> {
    id: u64,
    prompt: &'a str,
    distance: Option<f64>,
}

/// Rank stored fingerprints against a prompt.
pub async fn query(
    settings: &Settings,
    prompt: &str,
    store_path: &Path,
    top_k: usize,
    json: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if !store_path.exists() {
        anyhow::bail!("No fingerprint store at {}", store_path.display());
    }
    let store = PfpReader::read_from_file(store_path)?;

    let strategy = build_strategy(settings)?;
    let pipeline = build_pipeline(settings)?;
    let descriptor = describe_prompt(prompt, strategy.as_ref(), &pipeline).await;
    if !descriptor.is_ready() {
        tracing::warn!("Query prompt produced no image; every record is incomparable");
    }

    let matches = store
        .query(descriptor.descriptors(), top_k)
        .context("Store was built with a different extractor set")?;

    let hits: Vec<QueryHit> = matches
        .iter()
        .filter_map(|m| {
            store.get(m.id).map(|record| QueryHit {
                id: m.id,
                prompt: &record.prompt,
                distance: distance_value(m.distance),
            })
        })
        .collect();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&hits)?)?;
    } else if hits.is_empty() {
        writeln!(out, "Store is empty")?;
    } else {
        for hit in &hits {
            let distance = hit
                .distance
                .map_or_else(|| "incomparable".to_string(), |d| format!("{d:.6}"));
            writeln!(out, "#{:<5} {:>14}  {}", hit.id, distance, hit.prompt)?;
        }
    }
    Ok(())
}
