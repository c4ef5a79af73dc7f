use crate::history::{DATE_COLUMN, History, StatsRecord};
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads the stored table. `None` when no file exists yet.
pub fn load(path: &Path) -> Result<Option<History>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open stats file: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read stats header: {}", path.display()))?
        .clone();

    let date_index = headers
        .iter()
        .position(|header| header.trim() == DATE_COLUMN)
        .with_context(|| format!("Stats file has no `date` column: {}", path.display()))?;

    let columns = headers
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != date_index)
        .map(|(index, header)| (index, header.trim().to_string()))
        .collect::<Vec<_>>();

    let rows = reader
        .records()
        .enumerate()
        .map(|(line, row)| {
            let row = row.with_context(|| format!("Failed to read stats row {}", line + 1))?;
            let raw_date = row.get(date_index).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
                .with_context(|| format!("Invalid date in row {}: {raw_date:?}", line + 1))?;

            columns.iter().try_fold(
                StatsRecord::new(date),
                |record, (index, column)| -> Result<StatsRecord> {
                    let value = parse_cell(row.get(*index).unwrap_or_default()).with_context(
                        || format!("Invalid `{column}` value in row {}", line + 1),
                    )?;

                    Ok(match value {
                        Some(value) => record.with_value(column, value),
                        None => record,
                    })
                },
            )
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Failed to parse stats file: {}", path.display()))?;

    let names = columns.into_iter().map(|(_, column)| column).collect();
    Ok(Some(History::from_rows(names, rows)))
}

/// Rewrites the whole table. The target is replaced by rename so a failed
/// write leaves the previous file in place.
pub fn save(path: &Path, history: &History) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create stats directory: {}", parent.display()))?;

    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to stage stats file in {}", parent.display()))?;

    {
        let mut writer = csv::Writer::from_writer(staged.as_file_mut());

        let header = std::iter::once(DATE_COLUMN)
            .chain(history.columns().iter().map(String::as_str))
            .collect::<Vec<_>>();
        writer
            .write_record(&header)
            .context("Failed to write stats header")?;

        history.records().iter().try_for_each(|record| {
            let row = std::iter::once(record.date.format(DATE_FORMAT).to_string())
                .chain(history.columns().iter().map(|column| {
                    record
                        .get(column)
                        .map(|value| value.to_string())
                        .unwrap_or_default()
                }))
                .collect::<Vec<_>>();

            writer
                .write_record(&row)
                .with_context(|| format!("Failed to write stats row for {}", record.date))
        })?;

        writer.flush().context("Failed to flush stats file")?;
    }

    staged
        .persist(path)
        .map_err(|error| error.error)
        .with_context(|| format!("Failed to replace stats file: {}", path.display()))?;

    Ok(())
}

fn parse_cell(cell: &str) -> Result<Option<i64>> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(Some(value));
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value.trunc() as i64)),
        _ => bail!("not a number: {trimmed:?}"),
    }
}
