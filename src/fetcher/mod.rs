use crate::config::Config;
use crate::history::StatsRecord;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Search-index word total reported by wikis running CirrusSearch.
const SEARCH_WORDS_FIELD: &str = "cirrussearch-article-words";
pub const WORD_COUNT_COLUMN: &str = "word_count";

const STATISTICS_QUERY: [(&str, &str); 4] = [
    ("action", "query"),
    ("meta", "siteinfo"),
    ("siprop", "statistics"),
    ("format", "json"),
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("wiki API returned HTTP {0}")]
    Status(u16),
    #[error("wiki API error {code}: {info}")]
    Api { code: String, info: String },
    #[error("response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("response has no query.statistics object")]
    MissingStatistics,
    #[error("statistics field `{0}` is missing or not an integer")]
    MissingField(String),
}

pub trait StatsSource {
    fn fetch(&self) -> Result<StatsRecord, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub track_word_count: bool,
    pub required_metrics: Vec<String>,
}

impl ParseOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            track_word_count: config.track_word_count,
            required_metrics: config.required_metrics.clone(),
        }
    }
}

pub struct WikiApiClient {
    client: Client,
    endpoint: Url,
    options: ParseOptions,
}

impl WikiApiClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create wiki HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint()?,
            options: ParseOptions::from_config(config),
        })
    }
}

impl StatsSource for WikiApiClient {
    fn fetch(&self) -> Result<StatsRecord, FetchError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&STATISTICS_QUERY)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text()?;
        parse_statistics(&body, Local::now().date_naive(), &self.options)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

/// Turns a siteinfo response body into a dated record.
pub fn parse_statistics(
    body: &str,
    date: NaiveDate,
    options: &ParseOptions,
) -> Result<StatsRecord, FetchError> {
    let payload: Value = serde_json::from_str(body)?;

    if let Some(error) = payload.get("error") {
        let error = ApiErrorBody::deserialize(error)?;
        return Err(FetchError::Api {
            code: error.code,
            info: error.info,
        });
    }

    let statistics = payload
        .pointer("/query/statistics")
        .and_then(Value::as_object)
        .ok_or(FetchError::MissingStatistics)?;

    let mut record = integer_fields(statistics)
        .fold(StatsRecord::new(date), |record, (key, value)| {
            record.with_value(key, value)
        });

    if options.track_word_count {
        let words = statistics
            .get(SEARCH_WORDS_FIELD)
            .and_then(Value::as_i64)
            .unwrap_or(0);
        record = record.with_value(WORD_COUNT_COLUMN, words);
    }

    match options
        .required_metrics
        .iter()
        .find(|metric| record.get(metric).is_none())
    {
        Some(missing) => Err(FetchError::MissingField(missing.clone())),
        None => Ok(record),
    }
}

fn integer_fields(statistics: &Map<String, Value>) -> impl Iterator<Item = (&str, i64)> {
    statistics
        .iter()
        .filter(|(key, _)| key.as_str() != SEARCH_WORDS_FIELD)
        .filter_map(|(key, value)| value.as_i64().map(|number| (key.as_str(), number)))
}
