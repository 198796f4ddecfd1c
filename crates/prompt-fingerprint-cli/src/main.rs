//! prompt-fingerprint CLI entry point.

use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use prompt_fingerprint_cli::commands;
use prompt_fingerprint_cli::config::{
    resolve_backend, resolve_endpoint, resolve_generate_store_path, resolve_local_url,
    resolve_model_path, resolve_store_path, resolve_token, Backend, ExtractorKind, Settings,
};

#[derive(Parser)]
#[command(
    name = "prompt-fingerprint",
    about = "Generate images from prompts and compare their visual fingerprints",
    version
)]
struct Cli {
    /// Generation backend. Also reads PROMPT_FP_BACKEND.
    #[arg(long, value_enum, global = true)]
    backend: Option<Backend>,

    /// Remote inference endpoint. Also reads PROMPT_FP_ENDPOINT.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Local generation server base URL. Also reads PROMPT_FP_LOCAL_URL.
    #[arg(long, global = true)]
    local_url: Option<String>,

    /// Bearer token for the remote backend. Also reads HF_API_TOKEN.
    #[arg(long, global = true)]
    token: Option<String>,

    /// Descriptor to extract; repeat to compose, order matters.
    #[arg(long = "extractor", value_enum, global = true)]
    extractors: Vec<ExtractorKind>,

    /// Path to CLIP ONNX model. Also reads PROMPT_FP_MODEL.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Overall per-request deadline in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fingerprint one prompt and print its descriptors.
    Generate {
        prompt: String,

        /// Save the generated image (format from extension).
        #[arg(long)]
        save_image: Option<String>,

        /// Append the fingerprint to this .pfp store. Also reads PROMPT_FP_STORE.
        #[arg(long)]
        store: Option<String>,
    },

    /// Fingerprint two prompts and print their distance.
    Compare {
        prompt_a: String,
        prompt_b: String,

        #[arg(long)]
        json: bool,
    },

    /// Rank stored fingerprints against a prompt.
    Query {
        prompt: String,

        /// Path to .pfp store. Also reads PROMPT_FP_STORE.
        #[arg(long)]
        store: Option<String>,

        #[arg(long, default_value_t = 10)]
        top_k: usize,

        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "prompt-fingerprint", &mut std::io::stdout());
        return Ok(());
    }

    let settings = Settings {
        backend: resolve_backend(cli.backend)?,
        endpoint: resolve_endpoint(cli.endpoint),
        local_url: resolve_local_url(cli.local_url),
        token: resolve_token(cli.token),
        extractors: cli.extractors,
        model: resolve_model_path(cli.model),
        timeout: cli.timeout_secs.map(Duration::from_secs),
    };

    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Generate {
            prompt,
            save_image,
            store,
        } => {
            let store_path = resolve_generate_store_path(store.as_deref());
            commands::generate(
                &settings,
                &prompt,
                save_image.as_deref(),
                store_path.as_deref(),
                &mut stdout,
            )
            .await?;
        }

        Commands::Compare {
            prompt_a,
            prompt_b,
            json,
        } => {
            commands::compare(&settings, &prompt_a, &prompt_b, json, &mut stdout).await?;
        }

        Commands::Query {
            prompt,
            store,
            top_k,
            json,
        } => {
            let store_path = resolve_store_path(store.as_deref());
            commands::query(&settings, &prompt, &store_path, top_k, json, &mut stdout).await?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}
