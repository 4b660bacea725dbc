//! segtool
//!
//! Inspects a persisted segment table.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use heatrange::persist::{self, SEGTABLE_FILENAME};
use heatrange::{BytewiseComparator, HeatTable, KeyComparator, PureKeyComparator};
use tracing_subscriber::{fmt, EnvFilter};

/// Segment table inspector
#[derive(Parser, Debug)]
#[command(name = "segtool")]
#[command(about = "Inspect a persisted heatrange segment table")]
#[command(version)]
struct Args {
    /// Data directory holding segtable.data
    #[arg(short, long, default_value = "./heatrange_data")]
    data_dir: PathBuf,

    /// Strip this many trailing version bytes before comparing keys
    #[arg(long, default_value = "0")]
    suffix_len: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every record in array order
    Dump,

    /// Print the ranges whose tier disagrees with their heat
    Pending {
        /// Promotion threshold
        #[arg(short, long, default_value = "10")]
        boiling: i32,

        /// Demotion threshold
        #[arg(short, long, default_value = "3")]
        freezing: i32,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,heatrange=info"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        tracing::error!("segtool failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> heatrange::Result<()> {
    let path = args.data_dir.join(SEGTABLE_FILENAME);
    let comparator: Arc<dyn KeyComparator> = if args.suffix_len == 0 {
        Arc::new(BytewiseComparator)
    } else {
        Arc::new(PureKeyComparator::new(args.suffix_len))
    };

    match args.command {
        Command::Dump => {
            let segments = persist::read_segments(&path, comparator.as_ref())?;
            for (i, seg) in segments.iter().enumerate() {
                println!(
                    "{:>5}  heat={:>3}  fast={}  start={:?}  end={:?}",
                    i, seg.heat, seg.in_fast_tier, seg.start, seg.end
                );
            }
            println!("{} segments", segments.len());
        }
        Command::Pending { boiling, freezing } => {
            let table = HeatTable::new(1, boiling, freezing, comparator)?;
            table.load_table(&path)?;
            let pending = table.pending_migrations();
            for range in &pending.promote {
                println!("promote  start={:?}  end={:?}", range.start, range.end);
            }
            for range in &pending.demote {
                println!("demote   start={:?}  end={:?}", range.start, range.end);
            }
        }
    }
    Ok(())
}
