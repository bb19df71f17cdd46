//! Artifact Sandbox CLI
//!
//! Developer tooling around the artifact pipeline: classify, sanitize and
//! render content read from a file or stdin.

use anyhow::{Context, Result};
use artifact_sandbox::{
    classifier::Classifier,
    library::NoopFetcher,
    manager::resolve_type_name,
    sanitizer::ContentSanitizer,
    ArtifactConfig, ArtifactManager, ArtifactType, Container, MetadataHints,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "artifact-sandbox")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Classify, sanitize and render LLM-generated artifacts")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ARTIFACT_SANDBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether content should become an artifact
    Classify {
        /// Input file (stdin when omitted or "-")
        input: Option<PathBuf>,

        /// The user's request that produced the content
        #[arg(short, long, default_value = "")]
        intent: String,
    },

    /// Sanitize content for an artifact type
    Sanitize {
        /// Input file (stdin when omitted or "-")
        input: Option<PathBuf>,

        /// Artifact type, alias or language name
        #[arg(short = 't', long = "type")]
        type_name: String,
    },

    /// Sanitize and render content, printing the container markup
    Render {
        /// Input file (stdin when omitted or "-")
        input: Option<PathBuf>,

        /// Artifact type, alias or language name (detected when omitted)
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,

        /// Artifact title
        #[arg(long)]
        title: Option<String>,

        /// Extra runtime library from the catalog (repeatable)
        #[arg(short, long = "library")]
        libraries: Vec<String>,

        /// Print the renderer handle as JSON instead of markup
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,

        /// Print the default configuration file location
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging on stderr so command output stays clean
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("artifact_sandbox={}", log_level).into());
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Classify { input, intent } => {
            let content = read_input(input.as_deref()).await?;
            run_classify(config, &content, &intent)?;
        }
        Commands::Sanitize { input, type_name } => {
            let content = read_input(input.as_deref()).await?;
            run_sanitize(config, &content, &type_name)?;
        }
        Commands::Render {
            input,
            type_name,
            title,
            libraries,
            json,
        } => {
            let content = read_input(input.as_deref()).await?;
            run_render(config, &content, type_name.as_deref(), title, libraries, json).await?;
        }
        Commands::Config { default, path } => {
            if path {
                match default_config_path() {
                    Some(p) => println!("{}", p.display()),
                    None => println!("No configuration directory on this platform"),
                }
            } else {
                show_config(if default { None } else { Some(&config) })?;
            }
        }
    }

    Ok(())
}

/// Explicit path, then the per-user default location, then built-in defaults.
fn load_config(path: Option<&Path>) -> Result<ArtifactConfig> {
    if let Some(path) = path {
        return ArtifactConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    match default_config_path().filter(|p| p.exists()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Using default configuration file");
            ArtifactConfig::from_file(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => Ok(ArtifactConfig::default()),
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join("artifact-sandbox").join("config.toml"))
}

async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("failed to read {}", p.display())),
        _ => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .context("failed to read stdin")?;
            Ok(content)
        }
    }
}

fn parse_type(type_name: &str) -> Result<(ArtifactType, Option<String>)> {
    resolve_type_name(type_name)
        .with_context(|| format!("unknown artifact type '{}'", type_name))
}

fn run_classify(config: ArtifactConfig, content: &str, intent: &str) -> Result<()> {
    let classifier = Classifier::new(config.classifier)?;
    let result = classifier.classify(content, intent);

    println!("create:    {}", result.create);
    println!("score:     {}", result.score);
    println!(
        "signals:   {}",
        serde_json::to_string(&result.signals).unwrap_or_default()
    );
    println!("type:      {}", result.artifact_type);
    if let Some(language) = &result.language {
        println!("language:  {}", language);
    }
    if result.ambiguous {
        println!("ambiguous: true");
    }
    Ok(())
}

fn run_sanitize(config: ArtifactConfig, content: &str, type_name: &str) -> Result<()> {
    let (artifact_type, _) = parse_type(type_name)?;
    let sanitizer = ContentSanitizer::new(&config.sanitizer)?;

    if artifact_type == ArtifactType::InteractiveComponent {
        for violation in sanitizer.scan_component(content) {
            eprintln!(
                "{} [{}] at byte {}: {}",
                violation.rule, violation.category, violation.position, violation.matched
            );
        }
    }

    let sanitized = sanitizer.sanitize(content, artifact_type)?;
    print!("{}", sanitized);
    Ok(())
}

async fn run_render(
    config: ArtifactConfig,
    content: &str,
    type_name: Option<&str>,
    title: Option<String>,
    libraries: Vec<String>,
    json: bool,
) -> Result<()> {
    let manager = ArtifactManager::with_fetcher(config, Arc::new(NoopFetcher))?;

    let (artifact_type, language) = match type_name {
        Some(name) => parse_type(name)?,
        None => {
            let detected = manager.classify(content, "");
            (detected.artifact_type, detected.language)
        }
    };

    let mut hints = MetadataHints::new();
    hints.title = title;
    hints.language = language;
    hints.libraries = libraries;

    let artifact = manager
        .create_artifact("", artifact_type, content, hints)
        .await?;
    let container = Arc::new(Container::new("cli"));
    let handle = manager.render_artifact(&artifact.id, &container).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&handle)?);
    } else {
        println!("{}", container.to_html().await);
    }
    Ok(())
}

fn show_config(config: Option<&ArtifactConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
