use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ferroview_build::CompilationResult;
use ferroview_core::config::EditorConfig;
use ferroview_core::document::{DocumentStore, FsDocumentStore};
use ferroview_core::Editor;
use std::path::{Path, PathBuf};

mod watch;

#[derive(Parser)]
#[command(name = "ferroview")]
#[command(about = "FerroView compile engine", long_about = None)]
struct Cli {
    /// Config file (defaults to ferroview.json next to the document)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a document once
    Compile {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompile a document whenever it changes on disk
    Watch {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Override the debounce interval in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Read a rendered artifact
    Artifact {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Print the artifact base64-encoded
        #[arg(long)]
        base64: bool,
    },
    /// Summarise a TeX log file
    Log {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Emit the digest as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(explicit: Option<&Path>, document: &Path) -> Result<EditorConfig> {
    let config = match explicit {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::load_or_default(&EditorConfig::path_for_document(document))?,
    };
    Ok(config)
}

fn print_failure(result: &CompilationResult) {
    let digest = ferroview_log::digest(&result.log);
    if digest.entries.is_empty() {
        eprintln!("{}", result.raw_output);
        return;
    }
    for entry in digest.errors() {
        match entry.line {
            Some(line) => eprintln!("error (line {}): {}", line, entry.message),
            None => eprintln!("error: {}", entry.message),
        }
    }
    eprintln!(
        "{} error(s), {} warning(s)",
        digest.error_count(),
        digest.warning_count()
    );
}

async fn compile_once(config: EditorConfig, path: &Path, json: bool) -> Result<bool> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    let content = FsDocumentStore.load(&path).await?;

    let editor = Editor::start(&EditorConfig {
        auto_compile: false,
        ..config
    });
    editor.session().replace_document(path, content);

    let result = editor
        .compile_now()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.success {
        if let Some(artifact) = &result.artifact_path {
            println!("Output written on {}", artifact.display());
        }
    } else {
        print_failure(&result);
    }
    Ok(result.success)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { path, json } => {
            let config = load_config(cli.config.as_deref(), &path)?;
            if !compile_once(config, &path, json).await? {
                std::process::exit(1);
            }
        }
        Commands::Watch { path, delay_ms } => {
            let mut config = load_config(cli.config.as_deref(), &path)?;
            if let Some(delay_ms) = delay_ms {
                config.delay_ms = delay_ms;
            }
            watch::run(config, &path).await?;
        }
        Commands::Artifact { path, base64 } => {
            if base64 {
                println!("{}", ferroview_build::read_artifact_base64(&path).await?);
            } else {
                let bytes = ferroview_build::read_artifact(&path).await?;
                println!("{}: {} bytes", path.display(), bytes.len());
            }
        }
        Commands::Log { path, json } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let digest = ferroview_log::digest(&String::from_utf8_lossy(&bytes));
            if json {
                println!("{}", serde_json::to_string_pretty(&digest)?);
            } else {
                for entry in &digest.entries {
                    let line = entry.line.map(|l| format!(":{}", l)).unwrap_or_default();
                    println!("{:?}{} {}", entry.severity, line, entry.message);
                }
            }
        }
    }
    Ok(())
}
