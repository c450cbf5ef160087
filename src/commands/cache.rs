//! Cache maintenance command

use crate::cache::stats::{cache_stats, clear_cache, list_entries, remove_entry};
use crate::cache::WheelCache;
use crate::cli::{CacheArgs, CacheSubcommand};
use crate::error::Result;

/// Run the cache command
pub fn run(args: CacheArgs) -> Result<()> {
    let cache = match args.cache_dir {
        Some(dir) => WheelCache::at(dir),
        None => WheelCache::open_default()?,
    };

    match args.command {
        Some(CacheSubcommand::List) => list_cached_entries(&cache),
        Some(CacheSubcommand::Clear(clear_args)) => match clear_args.only {
            Some(key) => {
                remove_entry(&cache, &key)?;
                println!("Removed cached entry: {key}");
                Ok(())
            }
            None => {
                clear_cache(&cache)?;
                println!("Cache cleared successfully.");
                Ok(())
            }
        },
        None => show_cache_stats(&cache),
    }
}

fn show_cache_stats(cache: &WheelCache) -> Result<()> {
    let stats = cache_stats(cache)?;

    println!("Cache Statistics:");
    println!("  Location: {}", cache.root().display());
    println!("  Wheel sets: {}", stats.entries);
    println!("  Bootstrappers: {}", stats.bootstrappers);
    println!("  Size: {}", stats.formatted_size());

    if stats.entries == 0 {
        println!("\nCache is empty.");
    } else {
        println!("\nRun 'skillet cache list' to list cached wheel sets.");
        println!("Run 'skillet cache clear' to remove everything from the cache.");
        println!("Run 'skillet cache clear --only <key>' to remove a single entry.");
    }

    Ok(())
}

fn list_cached_entries(cache: &WheelCache) -> Result<()> {
    let entries = list_entries(cache)?;

    if entries.is_empty() {
        println!("No cached wheel sets.");
        return Ok(());
    }

    println!("Cached wheel sets ({}):", entries.len());
    for entry in &entries {
        println!(
            "  {} ({} wheel{}, {})",
            entry.key,
            entry.wheels,
            if entry.wheels == 1 { "" } else { "s" },
            entry.formatted_size()
        );
        println!("    Identity: {}", entry.ident);
    }

    Ok(())
}
