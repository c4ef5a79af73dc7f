pub mod store;

use chrono::NaiveDate;
use std::collections::BTreeMap;

pub const DATE_COLUMN: &str = "date";
pub const CHANGE_SUFFIX: &str = "_change";

/// Column order used when a fetched record introduces new columns.
const CANONICAL_COLUMNS: [&str; 9] = [
    "pages",
    "articles",
    "edits",
    "images",
    "users",
    "activeusers",
    "admins",
    "jobs",
    "word_count",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRecord {
    pub date: NaiveDate,
    pub values: BTreeMap<String, i64>,
}

impl StatsRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, column: &str, value: i64) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }

    pub fn get(&self, column: &str) -> Option<i64> {
        self.values.get(column).copied()
    }

    /// Column names in canonical order, then the rest alphabetically.
    pub fn ordered_columns(&self) -> Vec<&str> {
        let mut columns = self.values.keys().map(String::as_str).collect::<Vec<_>>();
        columns.sort_by(|left, right| column_rank(left).cmp(&column_rank(right)));
        columns
    }
}

/// Date-ordered stats table with at most one record per date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    columns: Vec<String>,
    records: Vec<StatsRecord>,
}

impl History {
    /// Builds a table from rows in file order. Later rows win on duplicate dates.
    pub fn from_rows(columns: Vec<String>, rows: Vec<StatsRecord>) -> Self {
        let mut history = Self {
            columns,
            records: Vec::with_capacity(rows.len()),
        };

        rows.into_iter().for_each(|row| history.upsert(row));
        history
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[StatsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&StatsRecord> {
        self.records.last()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|existing| existing == column)
    }

    /// (date, value) pairs for a column, skipping rows where the value is absent.
    pub fn series(&self, column: &str) -> Vec<(NaiveDate, i64)> {
        if !self.has_column(column) {
            return Vec::new();
        }

        self.records
            .iter()
            .filter_map(|record| record.get(column).map(|value| (record.date, value)))
            .collect()
    }

    /// Computes `<column>_change` for every listed column the table has.
    /// The first row, and any step with an absent value, is 0.
    pub fn apply_deltas<S: AsRef<str>>(&mut self, columns: &[S]) -> Vec<String> {
        let present = columns
            .iter()
            .map(|column| column.as_ref())
            .filter(|column| self.has_column(column))
            .map(ToOwned::to_owned)
            .collect::<Vec<_>>();

        present
            .into_iter()
            .map(|column| {
                let change_column = format!("{column}{CHANGE_SUFFIX}");
                let mut previous: Option<i64> = None;

                for (index, record) in self.records.iter_mut().enumerate() {
                    let current = record.get(&column);
                    let change = match (index, previous, current) {
                        (0, _, _) => 0,
                        (_, Some(before), Some(now)) => now - before,
                        _ => 0,
                    };
                    record.values.insert(change_column.clone(), change);
                    previous = current;
                }

                self.push_column(&change_column);
                change_column
            })
            .collect()
    }

    fn upsert(&mut self, record: StatsRecord) {
        record
            .ordered_columns()
            .into_iter()
            .for_each(|column| self.push_column(column));

        match self
            .records
            .binary_search_by(|existing| existing.date.cmp(&record.date))
        {
            Ok(index) => self.records[index] = record,
            Err(index) => self.records.insert(index, record),
        }
    }

    fn push_column(&mut self, column: &str) {
        if column != DATE_COLUMN && !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }
}

/// Merges a freshly fetched record into the stored table. The fresh record
/// replaces a stored record with the same date.
pub fn merge(existing: Option<History>, fresh: StatsRecord) -> History {
    let mut history = existing.unwrap_or_default();
    history.upsert(fresh);
    history
}

fn column_rank(column: &str) -> (usize, &str) {
    let rank = CANONICAL_COLUMNS
        .iter()
        .position(|known| *known == column)
        .unwrap_or(CANONICAL_COLUMNS.len());

    (rank, column)
}

#[cfg(test)]
mod tests {
    use super::{History, StatsRecord, merge};
    use chrono::NaiveDate;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("date")
    }

    fn record(date: &str, pages: i64, edits: i64, activeusers: i64) -> StatsRecord {
        StatsRecord::new(day(date))
            .with_value("pages", pages)
            .with_value("edits", edits)
            .with_value("activeusers", activeusers)
    }

    #[test]
    fn merge_into_empty_history_creates_single_row() {
        let history = merge(None, record("2024-01-01", 100, 500, 10));

        assert_eq!(history.len(), 1);
        assert_eq!(history.columns(), ["pages", "edits", "activeusers"]);
    }

    #[test]
    fn merge_same_date_keeps_latest_fetch() {
        let first = merge(None, record("2024-01-01", 100, 500, 10));
        let second = merge(Some(first), record("2024-01-01", 101, 505, 11));

        assert_eq!(second.len(), 1);
        assert_eq!(second.records()[0].get("pages"), Some(101));
    }

    #[test]
    fn merge_keeps_dates_ascending() {
        let history = [
            record("2024-01-03", 3, 3, 3),
            record("2024-01-01", 1, 1, 1),
            record("2024-01-02", 2, 2, 2),
        ]
        .into_iter()
        .fold(None, |acc, row| Some(merge(acc, row)))
        .expect("history");

        let dates = history
            .records()
            .iter()
            .map(|row| row.date)
            .collect::<Vec<_>>();

        assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(dates.len(), 3);
    }

    #[test]
    fn from_rows_collapses_duplicate_dates_keeping_later_row() {
        let history = History::from_rows(
            vec!["pages".to_string()],
            vec![
                StatsRecord::new(day("2024-01-01")).with_value("pages", 1),
                StatsRecord::new(day("2024-01-01")).with_value("pages", 2),
            ],
        );

        assert_eq!(history.len(), 1);
        assert_eq!(history.records()[0].get("pages"), Some(2));
    }

    #[test]
    fn new_columns_follow_canonical_order() {
        let existing = History::from_rows(
            vec!["edits".to_string()],
            vec![StatsRecord::new(day("2024-01-01")).with_value("edits", 1)],
        );
        let fresh = StatsRecord::new(day("2024-01-02"))
            .with_value("zeta", 1)
            .with_value("word_count", 9)
            .with_value("edits", 2)
            .with_value("pages", 3);

        let history = merge(Some(existing), fresh);

        assert_eq!(history.columns(), ["edits", "pages", "word_count", "zeta"]);
    }

    #[test]
    fn deltas_follow_row_to_row_difference() {
        let history = merge(None, record("2024-01-01", 100, 500, 10));
        let mut history = merge(Some(history), record("2024-01-02", 105, 520, 12));
        let derived = history.apply_deltas(&["pages", "edits", "activeusers"]);

        assert_eq!(
            derived,
            vec!["pages_change", "edits_change", "activeusers_change"]
        );

        let first = &history.records()[0];
        assert_eq!(first.get("pages_change"), Some(0));
        assert_eq!(first.get("edits_change"), Some(0));
        assert_eq!(first.get("activeusers_change"), Some(0));

        let second = &history.records()[1];
        assert_eq!(second.get("pages_change"), Some(5));
        assert_eq!(second.get("edits_change"), Some(20));
        assert_eq!(second.get("activeusers_change"), Some(2));
    }

    #[test]
    fn deltas_skip_missing_columns_and_zero_absent_values() {
        let mut history = History::from_rows(
            vec!["pages".to_string(), "word_count".to_string()],
            vec![
                StatsRecord::new(day("2024-01-01")).with_value("pages", 10),
                StatsRecord::new(day("2024-01-02"))
                    .with_value("pages", 12)
                    .with_value("word_count", 400),
                StatsRecord::new(day("2024-01-03"))
                    .with_value("pages", 11)
                    .with_value("word_count", 450),
            ],
        );
        let derived = history.apply_deltas(&["pages", "word_count", "jobs"]);

        assert_eq!(derived, vec!["pages_change", "word_count_change"]);
        assert!(!history.has_column("jobs_change"));

        let word_changes = history.series("word_count_change");
        assert_eq!(
            word_changes.iter().map(|(_, value)| *value).collect::<Vec<_>>(),
            vec![0, 0, 50]
        );
        assert_eq!(history.records()[2].get("pages_change"), Some(-1));
    }

    #[test]
    fn deltas_are_recomputed_not_accumulated() {
        let mut history = merge(None, record("2024-01-01", 100, 500, 10));
        history.apply_deltas(&["pages"]);
        let mut history = merge(Some(history), record("2024-01-02", 110, 500, 10));
        history.apply_deltas(&["pages"]);
        history.apply_deltas(&["pages"]);

        assert_eq!(history.records()[1].get("pages_change"), Some(10));
        assert_eq!(
            history
                .columns()
                .iter()
                .filter(|column| *column == "pages_change")
                .count(),
            1
        );
    }

    #[test]
    fn series_skips_absent_values() {
        let history = History::from_rows(
            vec!["word_count".to_string()],
            vec![
                StatsRecord::new(day("2024-01-01")),
                StatsRecord::new(day("2024-01-02")).with_value("word_count", 7),
            ],
        );

        assert_eq!(history.series("word_count"), vec![(day("2024-01-02"), 7)]);
        assert!(history.series("pages").is_empty());
    }
}
