//! Offline preview: run a saved research reply through extraction, formatting and chunking.
//!
//! Usage: `preview [--batch] [--now 2025-06-02T10:00:00] [--limit 4000] [FILE]` (stdin when FILE is absent).

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use newsmaker::notify::DeliveryLimits;
use newsmaker::parse::{parse_batch, FreshnessPolicy};
use newsmaker::pipeline::prepare;
use newsmaker::render::{chunk_message, format_message};

fn parse_now(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map_err(|e| format!("expected YYYY-MM-DDTHH:MM:SS: {e}"))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Preview a saved research reply as channel posts", long_about = None)]
struct Args {
    /// Treat the input as a ranked daily batch.
    #[arg(long)]
    batch: bool,
    /// Local wall clock for the freshness check; defaults to now.
    #[arg(long, value_parser = parse_now)]
    now: Option<NaiveDateTime>,
    /// Maximum chars per text part.
    #[arg(long, default_value_t = DeliveryLimits::default().message_limit)]
    limit: usize,
    /// Reply file; stdin when absent.
    path: Option<PathBuf>,
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())),
        None => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s).context("reading stdin")?;
            Ok(s)
        }
    }
}

fn print_chunks(formatted: &str, limit: usize) {
    let chunks = chunk_message(formatted, limit);
    let total = chunks.len();
    for (i, c) in chunks.iter().enumerate() {
        println!("----- part {}/{total} ({} chars) -----", i + 1, c.chars().count());
        println!("{c}");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).with_writer(std::io::stderr).init();

    let args = Args::parse();
    let raw = read_input(args.path.as_deref())?;
    let now = args.now.unwrap_or_else(|| Local::now().naive_local());
    let policy = FreshnessPolicy::default();

    if args.batch {
        let items = parse_batch(&raw);
        println!("{} item(s)", items.len());
        for item in items {
            println!("===== priority {}: {} =====", item.priority, item.title);
            let content = item.to_content();
            let p = prepare(&content.body, &policy, now);
            println!("freshness: {}", p.freshness.reason);
            print_chunks(&format_message(&content), args.limit);
        }
        return Ok(());
    }

    let p = prepare(&raw, &policy, now);
    println!("sources ({:?}):", p.origin);
    for (i, s) in p.content.sources.iter().enumerate() {
        println!("  [{}] {s}", i + 1);
    }
    println!("freshness: {}", p.freshness.reason);
    print_chunks(&format_message(&p.content), args.limit);
    Ok(())
}
