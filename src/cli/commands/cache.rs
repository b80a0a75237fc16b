//! Cache command - inspect and invalidate the local cache

use crate::cache::ExpiringStore;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::context::AppContext;
use crate::error::TriplogResult;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct CacheReport {
    enabled: bool,
    versions: BTreeMap<String, u64>,
    keys: Vec<String>,
}

/// Execute the cache command
pub async fn execute(args: CacheArgs, app: &AppContext) -> TriplogResult<()> {
    let ctx = UiContext::detect();
    let cache = app.cache();

    match args.action {
        CacheAction::Show { format } => show(cache, app.config().cache.enabled, format)?,
        CacheAction::Bump { key } => {
            let version = cache.bump(&key);
            ui::step_ok(&ctx, &format!("{} is now v{}", key, version));
        }
        CacheAction::Reset { keys } => {
            if keys.is_empty() {
                cache.registry().reset_many(None);
                ui::step_ok(&ctx, "Reset every domain to v1");
            } else {
                cache.registry().reset_many(Some(&keys));
                ui::step_ok(&ctx, &format!("Reset {} domain(s) to v1", keys.len()));
            }
        }
        CacheAction::Remove { key } => {
            cache.remove(&key);
            ui::step_ok(&ctx, &format!("Removed {}", key));
        }
        CacheAction::RemovePrefix { prefix } => {
            let removed = cache.remove_by_prefix(&prefix);
            ui::step_ok(&ctx, &format!("Removed {} entr(ies) under {}", removed, prefix));
        }
        CacheAction::Clear { yes } => clear(&ctx.with_auto_yes(yes), cache).await?,
    }

    Ok(())
}

fn show(cache: &ExpiringStore, enabled: bool, format: OutputFormat) -> TriplogResult<()> {
    let report = CacheReport {
        enabled,
        versions: cache.registry().snapshot(),
        keys: {
            let mut keys = cache.keys();
            keys.sort();
            keys
        },
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => {
            for (domain, version) in &report.versions {
                println!("{}\t{}", domain, version);
            }
        }
        OutputFormat::Table => {
            if !report.enabled {
                println!("{}", style("Cache is disabled (cache.enabled = false)").yellow());
            }
            if report.versions.is_empty() {
                println!("No cache domains recorded.");
            } else {
                println!("{:<48} {:>8}", "DOMAIN", "VERSION");
                println!("{}", "-".repeat(57));
                for (domain, version) in &report.versions {
                    println!("{:<48} {:>8}", domain, version);
                }
            }
            println!();
            println!("Stored entries: {}", report.keys.len());
            for key in &report.keys {
                println!("  {}", style(key).dim());
            }
        }
    }
    Ok(())
}

async fn clear(ctx: &UiContext, cache: &ExpiringStore) -> TriplogResult<()> {
    let entries = cache.keys().len();
    let prompt = format!("Remove {} cached entr(ies) and all versions?", entries);
    if !ui::confirm(ctx, &prompt, false).await? {
        ui::step_warn_hint(ctx, "Cache left untouched", "Pass --yes to skip the prompt");
        return Ok(());
    }

    cache.clear_all();
    ui::step_ok(ctx, &format!("Cleared {} entr(ies)", entries));
    Ok(())
}
