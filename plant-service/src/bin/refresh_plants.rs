use anyhow::{bail, Result};
use plant_service::{config::AppConfig, observability, sources, store, transform, PlantAggregationService};
use std::{env, path::PathBuf};

const USAGE: &str = "usage: refresh_plants <excel_path> [sheet_name] [--dry-run]";

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let mut dry_run = false;
    let mut positional: Vec<String> = Vec::new();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ => positional.push(arg),
        }
    }
    if positional.is_empty() || positional.len() > 2 {
        bail!(USAGE);
    }

    // Load configuration (PLANT_SERVICE_CONFIG can point at a batch-specific file).
    let cfg = AppConfig::load()?;

    let path = PathBuf::from(&positional[0]);
    let sheet = positional
        .get(1)
        .cloned()
        .unwrap_or_else(|| cfg.refresh.default_sheet.clone());

    if dry_run {
        // Normalize and print, no store access.
        let rows = tokio::task::spawn_blocking(move || sources::read_rows(&path, &sheet)).await??;
        let records: Vec<_> = rows.iter().filter_map(transform::normalize_row).collect();
        let (mut records, _) = transform::dedupe_by_facility(records);
        transform::sort_by_generation_desc(&mut records);
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
        tracing::info!(rows = rows.len(), plants = records.len(), "dry run complete");
        return Ok(());
    }

    let store = store::from_config(&cfg).await?;
    let service = PlantAggregationService::new(store).with_batch_size(cfg.refresh.batch_size);

    let summary = service.refresh(&path, &sheet).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
