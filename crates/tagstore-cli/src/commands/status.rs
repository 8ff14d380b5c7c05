//! Status command handler

use anyhow::Result;

use tagstore_core::{Config, TagComponent};

use crate::output::{Output, OutputFormat};

/// Show storage location and tag counts
pub fn show(config: &Config, tags: &TagComponent, output: &Output) -> Result<()> {
    let collection = tags.collection();
    let all = tags.list()?;
    let scanned = all.iter().filter(|t| t.last_scanned.is_some()).count();
    let last = all.iter().filter_map(|t| t.last_scanned).max();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "backend": config.backend.to_string(),
                    "location": collection.location(),
                    "data_dir": config.data_dir,
                    "counts": {
                        "tags": all.len(),
                        "scanned": scanned
                    },
                    "last_scan": last.map(|ts| tagstore_core::timestamp::normalize(&ts))
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", all.len());
        }
        OutputFormat::Human => {
            println!("tagstore Status");
            println!("===============");
            println!();
            println!("Storage:");
            println!("  Backend:  {}", config.backend);
            println!("  Location: {}", collection.location());
            println!();
            println!("Tags:");
            println!("  Total:    {}", all.len());
            println!("  Scanned:  {}", scanned);
            if let Some(ts) = last {
                println!("  Last:     {}", ts.format("%Y-%m-%d %H:%M %:z"));
            }
        }
    }

    Ok(())
}
