use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hls_relink::{
    config::Config,
    package::{FsPackage, PackageContainer},
    playlist::{Classifier, ReferenceMap, extract_references, rewrite_in_place},
    reconcile::{Reconciler, RewriteMode},
};

#[derive(Parser)]
#[command(name = "hls-relink")]
#[command(version)]
#[command(about = "Inspect and relink the file references of HLS adaptive playlists")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "hls-relink.toml")]
    config: PathBuf,

    /// Log level (overrides config file)
    #[arg(short = 'v', long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a directory as a package and print roles and ownership
    Inspect { dir: PathBuf },

    /// Print the references found in a playlist
    Refs {
        playlist: PathBuf,
        /// Follow nested playlists
        #[arg(short, long)]
        recursive: bool,
        /// Leave playlist references out (recursive mode only)
        #[arg(short, long)]
        segments_only: bool,
    },

    /// Run a reconciliation pass over a directory and print the report as JSON
    Reconcile {
        dir: PathBuf,
        #[arg(short, long, value_enum, default_value_t = ModeArg::InPlace)]
        mode: ModeArg,
    },

    /// Rewrite a playlist in place with an explicit reference map
    Rewrite {
        playlist: PathBuf,
        /// OLD=NEW pair, repeatable
        #[arg(short, long = "map", value_name = "OLD=NEW", required = true)]
        mappings: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    InPlace,
    Replace,
}

impl From<ModeArg> for RewriteMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::InPlace => RewriteMode::InPlace,
            ModeArg::Replace => RewriteMode::Replace,
        }
    }
}

#[derive(Serialize)]
struct InspectEntry {
    uri: String,
    role: Option<hls_relink::PlaylistRole>,
    logical_name: Option<String>,
    owner: Option<String>,
}

fn init_logging(config: &Config) {
    let log_filter = format!("hls_relink={}", config.logging.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn parse_mappings(mappings: &[String]) -> Result<ReferenceMap> {
    mappings
        .iter()
        .map(|pair| {
            let (old, new) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("mapping '{pair}' is not OLD=NEW"))?;
            if old.is_empty() || new.is_empty() {
                bail!("mapping '{pair}' has an empty side");
            }
            Ok((old.to_string(), new.to_string()))
        })
        .collect()
}

fn load_package(dir: PathBuf) -> Result<FsPackage> {
    FsPackage::builder()
        .base_directory(&dir)
        .scan(true)
        .build()
        .with_context(|| format!("cannot load package from {}", dir.display()))
}

fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Inspect { dir } => {
            let package = load_package(dir)?;
            let set = Reconciler::new(&config.engine)
                .resolver()
                .resolve(package.tracks(), &package)?;
            let entries: Vec<InspectEntry> = set
                .tracks
                .iter()
                .enumerate()
                .map(|(i, track)| InspectEntry {
                    uri: track.uri.clone(),
                    role: track.role,
                    logical_name: track.logical_name.clone(),
                    owner: set.owner_of(i).map(|o| set.tracks[o].uri.clone()),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Refs {
            playlist,
            recursive,
            segments_only,
        } => {
            let references = if recursive {
                Classifier::new(&config.engine)
                    .extract_referenced_files_recursive(&playlist, segments_only)?
            } else {
                extract_references(&playlist)?
            };
            for reference in references {
                println!("{reference}");
            }
        }
        Command::Reconcile { dir, mode } => {
            let mut package = load_package(dir)?;
            let report =
                Reconciler::new(&config.engine).reconcile(&mut package, mode.into())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Rewrite { playlist, mappings } => {
            let map = parse_mappings(&mappings)?;
            let outcome = rewrite_in_place(&playlist, &map, &config.engine.temp_suffix)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config);

    info!("Starting hls-relink v{}", env!("CARGO_PKG_VERSION"));

    // the engine does blocking file I/O
    tokio::task::spawn_blocking(move || run(cli.command, config)).await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mappings() {
        let map = parse_mappings(&["a.ts=b.ts".to_string(), "x=y=z".to_string()]).unwrap();
        assert_eq!(map.get("a.ts"), Some("b.ts"));
        assert_eq!(map.get("x"), Some("y=z"));
        assert!(parse_mappings(&["nope".to_string()]).is_err());
        assert!(parse_mappings(&["=b".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_reconcile() {
        let cli = Cli::try_parse_from(["hls-relink", "reconcile", "pkg", "--mode", "replace"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Reconcile {
                mode: ModeArg::Replace,
                ..
            }
        ));
    }
}
