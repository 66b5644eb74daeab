//! CLI for fluxgen - Flux image generation.

use clap::{Parser, ValueEnum};
use fluxgen::image::DEFAULT_PROMPT;
use fluxgen::{
    Backoff, FluxProvider, ImageRequest, ImageVariant, JobOutcome, DEFAULT_BASE_URL,
};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode, Stdio};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fluxgen")]
#[command(about = "Generate an image with Flux (Black Forest Labs) and open it in a browser")]
#[command(version)]
struct Cli {
    /// Black Forest Labs API key (falls back to BFL_API_KEY)
    #[arg(long, alias = "api_key")]
    api_key: Option<String>,

    /// The text prompt describing the image
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,

    /// Width of the image (256-1440, multiple of 32)
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Height of the image (256-1440, multiple of 32)
    #[arg(long, default_value_t = 1024)]
    height: u32,

    /// Model variant
    #[arg(long, value_enum, default_value = "flux-pro")]
    variant: VariantArg,

    /// Number of steps for image generation
    #[arg(long)]
    steps: Option<u32>,

    /// Enable prompt upsampling
    #[arg(long, alias = "prompt_upsampling")]
    prompt_upsampling: bool,

    /// Seed for deterministic generation
    #[arg(long)]
    seed: Option<u64>,

    /// Guidance value (1.5-5.0)
    #[arg(long)]
    guidance: Option<f64>,

    /// Safety tolerance level (0-6)
    #[arg(long, alias = "safety_tolerance", default_value_t = 2)]
    safety_tolerance: u32,

    /// Interval value (1-4)
    #[arg(long)]
    interval: Option<u32>,

    /// API root
    #[arg(long, alias = "base_url", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Double the wait between polls instead of polling at a constant rate
    #[arg(long)]
    exponential_backoff: bool,

    /// Give up waiting for the job after this many seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Also download the image to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not open the image in a browser
    #[arg(long)]
    no_open: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    #[value(name = "flux-pro-1.1")]
    FluxPro11,
    #[value(name = "flux-pro", alias = "flux.1-pro")]
    FluxPro,
    #[value(name = "flux-dev", alias = "flux.1-dev")]
    FluxDev,
}

impl From<VariantArg> for ImageVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::FluxPro11 => ImageVariant::FluxPro11,
            VariantArg::FluxPro => ImageVariant::FluxPro,
            VariantArg::FluxDev => ImageVariant::FluxDev,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fluxgen=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Validate before anything touches the network
    let request = build_request(&cli)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut builder = FluxProvider::builder()
        .base_url(&cli.base_url)
        .timeout(Duration::from_secs(cli.timeout_secs))
        .cancellation(cancel);
    if cli.exponential_backoff {
        builder = builder.backoff(Backoff::exponential(Backoff::default().base));
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    let provider = builder.build()?;

    let outcome = provider.generate(&request).await?;

    // A failed download must not hide the URL, so it only warns
    let saved = match (outcome.sample_url(), cli.output.as_deref()) {
        (Some(url), Some(path)) => match save_sample(&provider, url, path).await {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(url = %url, path = %path.display(), "failed to save image: {e}");
                eprintln!("Could not save image to {}: {e}", path.display());
                None
            }
        },
        _ => None,
    };

    report(&outcome, saved, cli.json)?;

    if let Some(url) = outcome.sample_url() {
        if !cli.no_open {
            if let Err(e) = open_in_browser(url) {
                tracing::warn!(url = %url, "failed to open browser: {e}");
                eprintln!("Could not open a browser: {e}");
            }
        }
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_request(cli: &Cli) -> fluxgen::Result<ImageRequest> {
    let mut builder = ImageRequest::builder()
        .prompt(&cli.prompt)
        .size(cli.width, cli.height)
        .variant(cli.variant.into())
        .prompt_upsampling(cli.prompt_upsampling)
        .safety_tolerance(cli.safety_tolerance);

    if let Some(steps) = cli.steps {
        builder = builder.steps(steps);
    }
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    if let Some(guidance) = cli.guidance {
        builder = builder.guidance(guidance);
    }
    if let Some(interval) = cli.interval {
        builder = builder.interval(interval);
    }

    builder.build()
}

async fn save_sample(provider: &FluxProvider, url: &str, path: &Path) -> fluxgen::Result<()> {
    let data = provider.download(url).await?;
    std::fs::write(path, &data)?;
    Ok(())
}

fn report(outcome: &JobOutcome, output: Option<&Path>, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let details = match outcome {
            JobOutcome::Failed { details, .. } => serde_json::to_value(details)?,
            _ => serde_json::Value::Null,
        };
        let result = serde_json::json!({
            "type": "image",
            "success": outcome.is_success(),
            "id": outcome.id(),
            "status": outcome.status().as_str(),
            "url": outcome.sample_url(),
            "seed": outcome.seed(),
            "output": output.map(|p| p.display().to_string()),
            "details": details,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match outcome {
        JobOutcome::Ready { sample, .. } => {
            println!("Image ready: {sample}");
            if let Some(path) = output {
                println!("Saved to: {}", path.display());
            }
        }
        JobOutcome::Failed { id, details } => {
            let details = match details {
                Some(map) => serde_json::to_string(map)?,
                None => "no details".to_string(),
            };
            eprintln!("Generation failed for task {id}: {details}");
        }
        JobOutcome::RequestModerated { id } => {
            eprintln!("Request for task {id} was rejected by moderation");
        }
        JobOutcome::ContentModerated { id } => {
            eprintln!("Generated content for task {id} was rejected by moderation");
        }
        JobOutcome::TaskNotFound { id } => {
            eprintln!("Task {id} not found");
        }
    }
    Ok(())
}

fn open_in_browser(url: &str) -> std::io::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        // The empty argument is the window title `start` expects first
        cmd.args(["/C", "start", ""]);
        cmd
    } else {
        Command::new("xdg-open")
    };

    command
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}
