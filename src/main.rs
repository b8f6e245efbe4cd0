mod config;
mod dom;
mod error;
mod favicon;
mod images;
mod logo;
mod template;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use config::Settings;
use template::source::GitCli;

#[derive(Parser)]
#[command(name = "sitekit", about = "Maintenance jobs for the static marketing site")]
struct Cli {
    /// Settings file (default: ./sitekit.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate pages into the shared template
    ApplyTemplate {
        /// Pages to migrate, relative to the site root (default: template.pages)
        files: Vec<String>,
        /// Extract and substitute but do not write
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the record extracted from one page as JSON
    Inspect {
        file: String,
    },
    /// Replace favicon links in every HTML file under the site root
    Favicons {
        /// Directory to walk (default: site_root)
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply the configured logo size edits
    ResizeLogo {
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate stock images for the configured prompts
    GenImages {
        /// Only generate the image with this slug
        #[arg(long)]
        only: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::ApplyTemplate { files, dry_run } => {
            let files = if files.is_empty() {
                settings.template.pages.clone()
            } else {
                files
            };
            if files.is_empty() {
                println!("No pages configured. Set template.pages or pass file names.");
                return Ok(());
            }
            let stats = template::apply_batch(&settings, &files, &GitCli, dry_run)?;
            println!(
                "Applied template to {} of {} pages ({} skipped, {} without history).",
                stats.applied, stats.total, stats.skipped, stats.fallbacks
            );
            Ok(())
        }
        Commands::Inspect { file } => {
            let record = template::inspect(&settings, &file, &GitCli)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Favicons { root, dry_run } => {
            let root = root.unwrap_or_else(|| settings.site_root.clone());
            let stats = favicon::rewrite_tree(&root, &settings.favicon, dry_run);
            println!(
                "Scanned {} HTML files: {} updated, {} already current, {} skipped.",
                stats.scanned, stats.updated, stats.current, stats.skipped
            );
            Ok(())
        }
        Commands::ResizeLogo { dry_run } => {
            let stats = logo::apply_edits(&settings, dry_run);
            println!(
                "Logo edits: {} of {} files updated ({} replacements, {} missing).",
                stats.updated, stats.files, stats.replacements, stats.missing
            );
            Ok(())
        }
        Commands::GenImages { only } => {
            let stats = images::run_jobs(&settings, only.as_deref())?;
            println!(
                "Done: {} images ({} saved, {} empty, {} errors).",
                stats.total, stats.saved, stats.empty, stats.errors
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
