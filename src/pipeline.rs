use crate::charts::{self, ChartOutcome};
use crate::config::Config;
use crate::fetcher::{FetchError, StatsSource};
use crate::history::{self, store};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated {
        date: NaiveDate,
        rows: usize,
        charts: Vec<ChartOutcome>,
    },
    Skipped {
        reason: FetchError,
    },
}

/// Fetches today's statistics, merges them into the stored table, derives
/// deltas, rewrites the table and refreshes charts once there is a trend.
///
/// A failed fetch is `Ok(Skipped)` and leaves the stored table untouched.
/// `Err` means the table itself could not be read or written.
pub fn run_update(config: &Config, source: &dyn StatsSource) -> Result<UpdateOutcome> {
    let record = match source.fetch() {
        Ok(record) => record,
        Err(reason) => {
            warn!(error = %reason, wiki = %config.wiki, "stats fetch failed. skipping update");
            return Ok(UpdateOutcome::Skipped { reason });
        }
    };
    let date = record.date;

    let existing = store::load(&config.csv_path).with_context(|| {
        format!(
            "Failed to load stats history: {}",
            config.csv_path.display()
        )
    })?;

    let mut merged = history::merge(existing, record);
    let derived = merged.apply_deltas(&config.delta_columns);

    store::save(&config.csv_path, &merged)?;
    info!(
        rows = merged.len(),
        date = %date,
        deltas = derived.len(),
        path = %config.csv_path.display(),
        "stats history updated"
    );

    let charts = if merged.len() > 1 {
        charts::render_all(config, &merged)
    } else {
        info!("not enough history for charts yet");
        Vec::new()
    };

    Ok(UpdateOutcome::Updated {
        date,
        rows: merged.len(),
        charts,
    })
}

/// Re-renders charts from the stored table without fetching.
pub fn render_charts(config: &Config) -> Result<Vec<ChartOutcome>> {
    match store::load(&config.csv_path)? {
        Some(history) if !history.is_empty() => Ok(charts::render_all(config, &history)),
        _ => {
            info!(path = %config.csv_path.display(), "no stats history yet");
            Ok(Vec::new())
        }
    }
}
