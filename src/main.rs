//! `pecha` command-line entrypoint.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pecha::lock::acquire_writer_lock;
use pecha::{Config, Session, ViewKind};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pecha", about = "Layered text annotation tool", version)]
struct Cli {
    /// Project root holding plaintext/, admin/layers/ and user/ (can also be set via PECHA_ROOT)
    #[arg(short, long, env = "PECHA_ROOT", global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap a document from an annotated .txt file in the input directory
    New { input: String },
    /// Store the difference between a modified copy and the base text as a layer
    Layer {
        document: String,
        name: String,
        modified: PathBuf,
        /// Layers this one was drawn on top of
        #[arg(short, long, value_delimiter = ',')]
        deps: Vec<String>,
        /// Keep every edit instead of reducing to `{…}` markup
        #[arg(long)]
        raw: bool,
    },
    /// Render layers over the base text into the output directory
    View {
        document: String,
        #[arg(required = true)]
        layers: Vec<String>,
        #[arg(short, long, default_value = "export")]
        kind: ViewKind,
    },
    /// List the layers stored for a document
    Layers { document: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pecha=info,pecha_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match cli.root.as_deref() {
        Some(root) => config_with_root(root),
        None => Config::from_env(),
    };
    let session = Session::new(config).context("failed to prepare project directories")?;

    match cli.command {
        Commands::New { input } => {
            let stem = Path::new(&input)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .with_context(|| format!("invalid input file name '{}'", input))?;
            let _lock = acquire_writer_lock(&session.store().document_dir(stem))?;
            let document = session.create_document(&input)?;
            println!(
                "Created '{}' with layers: {}",
                document.name,
                document.layer_names().collect::<Vec<_>>().join(", ")
            );
        }
        Commands::Layer {
            document,
            name,
            modified,
            deps,
            raw,
        } => {
            let text = std::fs::read_to_string(&modified)
                .with_context(|| format!("failed to read {}", modified.display()))?;
            let text = text.trim_start_matches('\u{feff}');

            let _lock = acquire_writer_lock(&session.store().document_dir(&document))?;
            let mut doc = session.open(&document)?;
            let report = session.create_layer(&mut doc, text, &name, &deps, !raw)?;
            println!(
                "Wrote layer '{}' for '{}' ({} edits)",
                name, document, report.edits
            );
            for loss in &report.losses {
                eprintln!(
                    "dropped annotation in edit #{} (diff #{}): {:?}",
                    loss.edit, loss.operation, loss.text
                );
            }
        }
        Commands::View {
            document,
            layers,
            kind,
        } => {
            let doc = session.open(&document)?;
            let files = session.write_view(&doc, &layers, kind)?;
            println!("{}", files.view.display());
            if let Some(mistakes) = files.mistakes {
                eprintln!(
                    "{} edits could not be applied; see {}",
                    files.failures,
                    mistakes.display()
                );
            }
        }
        Commands::Layers { document } => {
            for name in session.store().list(&document)? {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

/// Environment configuration with `PECHA_ROOT` taken from the command line.
fn config_with_root(root: &Path) -> Config {
    let root = root.to_string_lossy().to_string();
    Config::from_lookup(|key| {
        if key == "PECHA_ROOT" {
            Some(root.clone())
        } else {
            std::env::var(key).ok()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn layer_command_splits_deps_and_defaults_to_clean() {
        let cli = Cli::try_parse_from([
            "pecha",
            "layer",
            "doc",
            "correction",
            "edited.txt",
            "--deps",
            "title1,tsawa",
        ])
        .expect("parse");
        match cli.command {
            Commands::Layer { deps, raw, .. } => {
                assert_eq!(deps, vec!["title1", "tsawa"]);
                assert!(!raw);
            }
            _ => panic!("expected layer command"),
        }
    }

    #[test]
    fn view_command_parses_kind() {
        let cli = Cli::try_parse_from(["pecha", "view", "doc", "a", "b", "--kind", "edit"])
            .expect("parse");
        match cli.command {
            Commands::View { layers, kind, .. } => {
                assert_eq!(layers, vec!["a", "b"]);
                assert_eq!(kind, ViewKind::Edit);
            }
            _ => panic!("expected view command"),
        }
        assert!(Cli::try_parse_from(["pecha", "view", "doc"]).is_err());
    }
}
