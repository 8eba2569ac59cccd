mod app;
mod config;
mod error;
mod events;
mod fetch;
mod html;
mod logging;
mod manifest;
mod outline;
mod page;
mod selection;
mod serve;
mod shell;
mod theme;
mod viewer;
mod web_assets;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use config::{DocumentSource, PrefsLocation, ServeConfig, DEFAULT_BIND, DEFAULT_PORT};

/// Explicit subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Serve a site's markdown bookshelf over HTTP
    Serve {
        /// Site root containing src/manifest.json
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Interface address to bind to
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: String,
        /// Starting port number for the HTTP server
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Preferences file (defaults to the user config directory)
        #[arg(long, conflicts_with = "ephemeral")]
        prefs: Option<PathBuf>,
        /// Keep the theme preference in memory only
        #[arg(long)]
        ephemeral: bool,
        /// Read documents from a static host instead of ROOT
        #[arg(long, value_name = "URL")]
        remote: Option<String>,
        /// Debug-level logging
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print the heading outline of a markdown file with its anchor ids
    Outline {
        /// Path to the markdown file
        file: PathBuf,
    },
}

/// Full CLI with explicit subcommands.
#[derive(Parser)]
#[command(
    name = "mdshelf",
    version,
    about = "A browser-based markdown bookshelf",
    after_help = "INVOCATION FORMS:\n  mdshelf <root>                    Serve root with defaults (legacy)\n  mdshelf serve [OPTIONS] [root]    Serve root over HTTP\n  mdshelf outline <file>            Print a file's outline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Legacy positional form: mdshelf <root>
#[derive(Parser)]
#[command(name = "mdshelf", version, about = "A browser-based markdown bookshelf")]
struct LegacyCli {
    /// Site root containing src/manifest.json
    root: PathBuf,
}

/// Resolved dispatch mode after CLI argument parsing.
enum DispatchMode {
    Serve { config: ServeConfig, verbose: bool },
    Outline { file: PathBuf },
}

fn resolve_dispatch_mode() -> DispatchMode {
    match Cli::try_parse() {
        Ok(cli) => match cli.command {
            Commands::Serve {
                root,
                bind,
                port,
                prefs,
                ephemeral,
                remote,
                verbose,
            } => {
                let source = match remote {
                    Some(url) => DocumentSource::Remote(url),
                    None => DocumentSource::Local(root),
                };
                let prefs = if ephemeral {
                    PrefsLocation::Ephemeral
                } else {
                    PrefsLocation::File(prefs.unwrap_or_else(config::default_prefs_path))
                };
                DispatchMode::Serve {
                    config: ServeConfig {
                        bind,
                        port,
                        source,
                        prefs,
                    },
                    verbose,
                }
            }
            Commands::Outline { file } => DispatchMode::Outline { file },
        },
        Err(clap_err) => {
            // Pass --help and --version through to the full Cli handler.
            use clap::error::ErrorKind;
            if matches!(
                clap_err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                clap_err.exit();
            }
            // Fall back to legacy positional parse: mdshelf <root>
            match LegacyCli::try_parse() {
                Ok(legacy) => DispatchMode::Serve {
                    config: ServeConfig::local(legacy.root),
                    verbose: false,
                },
                Err(legacy_err) => legacy_err.exit(),
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    match resolve_dispatch_mode() {
        DispatchMode::Serve { config, verbose } => {
            logging::init(verbose);
            if let DocumentSource::Local(root) = &config.source {
                if !root.is_dir() {
                    bail!("site root is not a directory: {}", root.display());
                }
            }
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start the async runtime")?;
            rt.block_on(serve::run_serve(config))
        }
        DispatchMode::Outline { file } => {
            logging::init(false);
            print_outline(&file)
        }
    }
}

fn print_outline(path: &Path) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document = html::render(&source);
    if document.outline.is_empty() {
        println!("{}", page::NO_HEADINGS_TEXT);
        return Ok(());
    }
    for entry in document.outline.entries() {
        let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
        println!("{indent}{}  #{}", entry.text, entry.anchor_id);
    }
    Ok(())
}
