use civic_chat::build::integrity::sri;
use civic_chat::build::{self, docs};
use civic_chat::config::BuildConfig;
use civic_chat::preview;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "civic-chat", version, about = "Build and preview the Civic Chat widget")]
struct Cli {
    /// Directory holding widget.js and widget.css.
    #[arg(long, global = true)]
    src_dir: Option<PathBuf>,
    /// Output directory for minified and versioned assets.
    #[arg(long, global = true)]
    dist_dir: Option<PathBuf>,
    /// Output directory for generated integration examples.
    #[arg(long, global = true)]
    examples_dir: Option<PathBuf>,
    /// Path of the generated README.
    #[arg(long, global = true)]
    readme: Option<PathBuf>,
    /// Public base URL of the dist directory.
    #[arg(long, global = true)]
    cdn_base: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Minify, hash and version the assets, then regenerate docs (default).
    Build,
    /// Print SRI values for the current dist/ and write an HTML snippet.
    Sri {
        #[arg(long, default_value = "sri-snippet.html")]
        out: PathBuf,
    },
    /// Serve dist/ and the examples locally.
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

impl Cli {
    fn apply(&self, config: &mut BuildConfig) {
        if let Some(dir) = &self.src_dir {
            config.src_dir = dir.clone();
        }
        if let Some(dir) = &self.dist_dir {
            config.dist_dir = dir.clone();
        }
        if let Some(dir) = &self.examples_dir {
            config.examples_dir = dir.clone();
        }
        if let Some(path) = &self.readme {
            config.readme_path = path.clone();
        }
        if let Some(base) = &self.cdn_base {
            config.cdn_base = base.trim_end_matches('/').to_string();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = BuildConfig::from_env()?;
    cli.apply(&mut config);

    match cli.command.unwrap_or(Command::Build) {
        Command::Build => {
            let result = build::run(&config).await?;
            for (kind, written) in &result.0 {
                println!(
                    "{kind:?}: {} integrity=\"{}\"",
                    written.versioned_filename,
                    sri(&written.digest)
                );
            }
        }
        Command::Sri { out } => {
            let site = docs::Site::from_config(&config);
            let report = docs::sri_report(&site, &config.dist_dir, &out).await?;
            println!("CSS integrity=\"{}\"", sri(&report.css_digest));
            println!("JS  integrity=\"{}\"", sri(&report.js_digest));
            println!("\n{}\n", report.snippet);
            println!("saved to {}", out.display());
        }
        Command::Serve { bind } => {
            if let Some(addr) = bind {
                config.bind_addr = addr;
            }
            tracing::info!(addr = %config.bind_addr, "starting preview server");
            preview::run(config).await?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
