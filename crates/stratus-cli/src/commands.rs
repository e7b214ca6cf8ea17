use anyhow::Context;
use colored::Colorize;

use stratus_store::{CacheStore, DelOptions, GetOptions, PutOptions, Store};
use stratus_types::{History, HistoryRecord};

use crate::cli::{CacheAction, CacheArgs, Cli, Command, HistoryArgs};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Cache(args) => cmd_cache(args),
        Command::History(args) => cmd_history(args),
    }
}

fn cmd_cache(args: CacheArgs) -> anyhow::Result<()> {
    let cache = CacheStore::new(&args.rootdir, &args.kind, &args.headdir);

    match &args.action {
        CacheAction::Insert { item, source } => {
            let stow = cache.insert(item, source, &PutOptions::default())?;
            if stow.succeeded() {
                println!("{} {} -> {}", "stored".green(), source.display(), cache.full_path(item));
            } else {
                println!("{} insert of {}", "failed".red().bold(), item);
                std::process::exit(1);
            }
        }
        CacheAction::Retrieve { item, dest } => {
            let fetch = cache.retrieve(item, dest, &GetOptions::default())?;
            if fetch.succeeded() {
                println!("{} {} -> {}", "fetched".green(), item, dest.display());
            } else {
                println!("{} {}", "not found".red().bold(), item);
                std::process::exit(1);
            }
        }
        CacheAction::Check { item } => match cache.check(item) {
            Some(stat) => {
                println!("{} {} ({} bytes)", "present".green(), item, stat.size.to_string().bold());
            }
            None => println!("{} {}", "absent".yellow(), item),
        },
        CacheAction::Delete { item } => {
            if cache.delete(item, &DelOptions::default())? {
                println!("{} {}", "deleted".green(), item);
            } else {
                println!("{} {} (was not there)", "untouched".yellow(), item);
            }
        }
        CacheAction::Catalog => {
            let items = cache.catalog();
            if items.is_empty() {
                println!("cache at {} is empty", cache.entry().display());
            } else {
                for item in items {
                    println!("{item}");
                }
            }
        }
    }

    if let Some(audit) = &args.audit {
        History::for_tag(cache.tag())
            .flush(audit)
            .with_context(|| format!("flushing history to {}", audit.display()))?;
    }
    Ok(())
}

fn cmd_history(args: HistoryArgs) -> anyhow::Result<()> {
    let body = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let records: Vec<HistoryRecord> =
        serde_json::from_str(&body).context("history dump is not valid JSON")?;
    if records.is_empty() {
        println!("history is empty");
        return Ok(());
    }
    for r in records {
        let status = if r.status {
            "ok".green()
        } else {
            "failed".red()
        };
        println!(
            "{:>4}  {}  {:<8}  {:<9}  {}  {}",
            r.seq.to_string().dimmed(),
            r.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            r.backend.cyan(),
            r.action.to_string().bold(),
            status,
            r.item
        );
    }
    Ok(())
}
