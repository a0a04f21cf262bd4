//! Family Tree CLI
//!
//! Runs the kinship engine over a JSON snapshot of person and declaration
//! records.
//!
//! Usage:
//!   family-tree --snapshot family.json tree --root p1 --mode ancestors --depth 4
//!   family-tree --snapshot family.json classify --root p1
//!   family-tree relate parent sibling --gender female
//!   family-tree label cousin --degree 2 --removed 1 --locale ru
//!   family-tree --snapshot family.json scan --scan-type deceased_only
//!   family-tree --snapshot family.json dot --root p1 --output tree.dot

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use kinship_engine::config::OutputFormat;
use kinship_engine::{
    CancelFlag, EngineConfig, Gender, InMemoryQueue, KinshipEngine, Locale, Qualifiers, ScanType, Snapshot,
    TreeMode,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "family-tree")]
#[command(about = "Build family trees, label relatives and find duplicate profiles")]
struct Cli {
    /// JSON snapshot with `persons` and `declarations`
    #[arg(short, long, global = true)]
    snapshot: Option<PathBuf>,

    /// Config file layered over kinship.toml and KINSHIP__* variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (pretty, compact); overrides the config file
    #[arg(short, long, global = true)]
    format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ancestor / descendant / hourglass subgraph
    Tree {
        #[arg(short, long)]
        root: String,
        #[arg(short, long)]
        mode: Option<TreeMode>,
        /// Clamped to [1, 10]
        #[arg(short, long, allow_negative_numbers = true)]
        depth: Option<i64>,
    },

    /// Parents, grandparents, children, grandchildren, siblings and spouses
    Classify {
        #[arg(short, long)]
        root: String,
    },

    /// Compose two relation codes
    Relate {
        intermediate: String,
        next: String,
        #[arg(short, long)]
        gender: Option<Gender>,
    },

    /// Render a relation code as a noun phrase
    Label {
        code: String,
        #[arg(short, long, default_value = "unknown")]
        gender: Gender,
        #[arg(short, long)]
        locale: Option<Locale>,
        /// full, half, adoptive, foster
        #[arg(long)]
        halfness: Option<String>,
        /// maternal, paternal, both, unknown
        #[arg(long)]
        lineage: Option<String>,
        #[arg(long)]
        degree: Option<u32>,
        #[arg(long, default_value_t = 0)]
        removed: u32,
        #[arg(long, default_value_t = 0)]
        level: u32,
    },

    /// Score the snapshot population for likely duplicates
    Scan {
        #[arg(long, default_value = "full")]
        scan_type: ScanType,
        #[arg(long)]
        min_confidence: Option<u32>,
        /// Skip the shared-relatives signal
        #[arg(long)]
        no_relationships: bool,
        /// RFC 3339 timestamp for incremental scans
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        #[arg(long)]
        deadline_ms: Option<u64>,
    },

    /// Export a tree to GraphViz DOT
    Dot {
        #[arg(short, long)]
        root: String,
        #[arg(short, long)]
        mode: Option<TreeMode>,
        #[arg(short, long, allow_negative_numbers = true)]
        depth: Option<i64>,
        /// Defaults to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fuzzy name search within a person's family
    Search {
        #[arg(short, long)]
        root: String,
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = EngineConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(format) = &cli.format {
        config.output.format = parse_enum(format)?;
    }
    let format = config.output.format;

    let snapshot = match &cli.snapshot {
        Some(path) => Snapshot::from_path(path).with_context(|| format!("reading snapshot {:?}", path))?,
        None => Snapshot::default(),
    };
    let needs_snapshot = !matches!(cli.command, Command::Relate { .. } | Command::Label { .. });
    if needs_snapshot && cli.snapshot.is_none() {
        return Err(anyhow!("this command needs --snapshot"));
    }

    let engine = KinshipEngine::new(snapshot, config);

    match cli.command {
        Command::Tree { root, mode, depth } => {
            let view = engine.tree(&root, mode, depth)?;
            for warning in view.warnings.iter() {
                eprintln!("⚠️  {}", warning);
            }
            print_json(&view, format)?;
        }
        Command::Classify { root } => {
            print_json(&engine.classify(&root)?, format)?;
        }
        Command::Relate { intermediate, next, gender } => {
            println!("{}", engine.relationship(&intermediate, &next, gender));
        }
        Command::Label {
            code,
            gender,
            locale,
            halfness,
            lineage,
            degree,
            removed,
            level,
        } => {
            let mut qualifiers = Qualifiers {
                cousin_degree: degree,
                cousin_removed: removed,
                level,
                ..Qualifiers::default()
            };
            if let Some(h) = halfness {
                qualifiers.halfness = parse_enum(&h)?;
            }
            if let Some(l) = lineage {
                qualifiers.lineage = parse_enum(&l)?;
            }
            println!("{}", engine.label(&code, gender, &qualifiers, locale));
        }
        Command::Scan {
            scan_type,
            min_confidence,
            no_relationships,
            since,
            deadline_ms,
        } => {
            let mut request = engine.default_scan_request(scan_type);
            if let Some(min) = min_confidence {
                request.min_confidence = min;
            }
            if no_relationships {
                request.include_relationship_matching = false;
            }
            request.since = since;
            request.deadline_ms = deadline_ms;

            let queue = InMemoryQueue::new();
            let response = engine.scan_duplicates(&request, &queue, &CancelFlag::new())?;
            eprintln!(
                "🔍 {} profiles, {} candidates, {} skipped in {} ms",
                response.profiles_scanned,
                response.duplicates_found,
                response.duplicates_skipped,
                response.duration_ms
            );
            if response.insert_failures > 0 {
                eprintln!("⚠️  {} candidates could not be queued", response.insert_failures);
            }
            print_json(&response, format)?;
        }
        Command::Dot {
            root,
            mode,
            depth,
            output,
        } => {
            let dot = engine.tree(&root, mode, depth)?.to_dot();
            match output {
                Some(path) => {
                    std::fs::write(&path, dot)?;
                    eprintln!("✅ Exported DOT to: {:?}", path);
                }
                None => print!("{}", dot),
            }
        }
        Command::Search { root, query, limit } => {
            print_json(&engine.search(&root, &query, limit)?, format)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let json = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Compact => serde_json::to_string(value)?,
    };
    println!("{}", json);
    Ok(())
}

/// Parse a lowercase serde enum name
fn parse_enum<T: DeserializeOwned>(value: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_lowercase()))
        .map_err(|_| anyhow!("unrecognised value '{}'", value))
}
