use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "wikistats.json";
const DEFAULT_WIKI: &str = "nexusstation";
const DEFAULT_USER_AGENT: &str = "StatsTrackerBot/1.0 (Contact: via GitHub)";
const DEFAULT_CSV_FILE: &str = "wiki_stats.csv";
const MIN_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub column: String,
    pub title: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ChartSpec {
    pub fn new(column: &str, title: &str, file: &str, color: Option<&str>) -> Self {
        Self {
            column: column.to_string(),
            title: title.to_string(),
            file: file.to_string(),
            color: color.map(ToOwned::to_owned),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wiki: String,
    pub api_url: Option<String>,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub csv_path: PathBuf,
    pub chart_dir: PathBuf,
    pub track_word_count: bool,
    pub required_metrics: Vec<String>,
    pub delta_columns: Vec<String>,
    pub charts: Vec<ChartSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wiki: DEFAULT_WIKI.to_string(),
            api_url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: 30,
            csv_path: PathBuf::from(DEFAULT_CSV_FILE),
            chart_dir: PathBuf::from("."),
            track_word_count: true,
            required_metrics: to_strings(&["pages", "edits", "activeusers"]),
            delta_columns: to_strings(&["pages", "edits", "activeusers", "word_count"]),
            charts: default_charts(),
        }
    }
}

impl Config {
    /// Reads the config file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.timeout_seconds = config.timeout_seconds.max(MIN_TIMEOUT_SECONDS);
        validate_wiki_name(&config.wiki)?;

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn endpoint(&self) -> Result<Url> {
        let raw = self
            .api_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.wiki.gg/api.php", self.wiki));

        Url::parse(&raw).with_context(|| format!("Invalid API endpoint: {raw}"))
    }

    pub fn chart_path(&self, chart: &ChartSpec) -> PathBuf {
        self.chart_dir.join(&chart.file)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "wiki" => {
                let wiki = value.trim().to_lowercase();
                validate_wiki_name(&wiki)?;
                self.wiki = wiki;
            }
            "api_url" => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    self.api_url = None;
                } else {
                    Url::parse(trimmed)
                        .map_err(|error| anyhow!("api_url must be an absolute URL: {error}"))?;
                    self.api_url = Some(trimmed.to_string());
                }
            }
            "user_agent" => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    bail!("user_agent cannot be empty");
                }
                self.user_agent = trimmed.to_string();
            }
            "timeout_seconds" => {
                self.timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("timeout_seconds must be a number"))?
                    .max(MIN_TIMEOUT_SECONDS);
            }
            "csv_path" => {
                self.csv_path = expand_home(value.trim());
            }
            "chart_dir" => {
                self.chart_dir = expand_home(value.trim());
            }
            "track_word_count" => {
                self.track_word_count = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("track_word_count must be true/false"))?;
            }
            "required_metrics" => {
                self.required_metrics = split_list(value);
            }
            "delta_columns" => {
                self.delta_columns = split_list(value);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: wiki, api_url|api.url, user_agent|http.user_agent, timeout_seconds|http.timeout_seconds, csv_path|csv.path, chart_dir|chart.dir, track_word_count|stats.word_count, required_metrics|stats.required, delta_columns|stats.deltas"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "wiki" => Some(self.wiki.clone()),
            "api_url" => Some(
                self.endpoint()
                    .map(|url| url.to_string())
                    .unwrap_or_else(|_| self.api_url.clone().unwrap_or_default()),
            ),
            "user_agent" => Some(self.user_agent.clone()),
            "timeout_seconds" => Some(self.timeout_seconds.to_string()),
            "csv_path" => Some(self.csv_path.display().to_string()),
            "chart_dir" => Some(self.chart_dir.display().to_string()),
            "track_word_count" => Some(self.track_word_count.to_string()),
            "required_metrics" => Some(self.required_metrics.join(",")),
            "delta_columns" => Some(self.delta_columns.join(",")),
            "charts" => Some(
                self.charts
                    .iter()
                    .map(|chart| format!("{}:{}", chart.column, chart.file))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "wiki" | "wiki.name" => "wiki",
        "api_url" | "api.url" => "api_url",
        "user_agent" | "http.user_agent" => "user_agent",
        "timeout_seconds" | "http.timeout_seconds" => "timeout_seconds",
        "csv_path" | "csv.path" => "csv_path",
        "chart_dir" | "chart.dir" => "chart_dir",
        "track_word_count" | "stats.word_count" => "track_word_count",
        "required_metrics" | "stats.required" => "required_metrics",
        "delta_columns" | "stats.deltas" => "delta_columns",
        _ => key,
    }
}

fn validate_wiki_name(wiki: &str) -> Result<()> {
    let valid = !wiki.is_empty()
        && wiki.len() <= 63
        && !wiki.starts_with('-')
        && !wiki.ends_with('-')
        && wiki
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-');

    if !valid {
        bail!("Invalid wiki name: {wiki:?}. Expected a wiki.gg subdomain such as nexusstation");
    }

    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn default_charts() -> Vec<ChartSpec> {
    vec![
        ChartSpec::new("pages", "Total Pages", "wiki_pages.svg", Some("tab:blue")),
        ChartSpec::new("edits", "Total Edits", "wiki_edits.svg", Some("tab:orange")),
        ChartSpec::new(
            "activeusers",
            "Active Users",
            "wiki_activeusers.svg",
            Some("tab:green"),
        ),
        ChartSpec::new("word_count", "Total Words", "wiki_words.svg", Some("tab:purple")),
        ChartSpec::new(
            "pages_change",
            "New Pages per Day",
            "wiki_pages_change.svg",
            Some("tab:red"),
        ),
    ]
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

#[cfg(test)]
mod tests {
    use super::{Config, DEFAULT_CONFIG_FILE};
    use tempfile::tempdir;

    #[test]
    fn default_endpoint_targets_wiki_gg() {
        let config = Config::default();
        let endpoint = config.endpoint().expect("endpoint");

        assert_eq!(endpoint.as_str(), "https://nexusstation.wiki.gg/api.php");
    }

    #[test]
    fn api_url_overrides_wiki_subdomain() {
        let mut config = Config::default();
        config
            .set_value("api.url", "http://127.0.0.1:8080/api.php")
            .expect("set api url");

        assert_eq!(
            config.endpoint().expect("endpoint").as_str(),
            "http://127.0.0.1:8080/api.php"
        );

        config.set_value("api_url", "").expect("clear api url");
        assert!(config.api_url.is_none());
    }

    #[test]
    fn rejects_invalid_wiki_name() {
        let mut config = Config::default();

        assert!(config.set_value("wiki", "not a subdomain").is_err());
        assert!(config.set_value("wiki", "-leading").is_err());
        assert_eq!(config.wiki, "nexusstation");

        config.set_value("wiki", "Terraria").expect("valid wiki");
        assert_eq!(config.wiki, "terraria");
    }

    #[test]
    fn timeout_is_clamped_to_minimum() {
        let mut config = Config::default();
        config.set_value("http.timeout_seconds", "1").expect("set");

        assert_eq!(config.get_value("timeout_seconds").as_deref(), Some("5"));
    }

    #[test]
    fn list_values_are_comma_separated() {
        let mut config = Config::default();
        config
            .set_value("stats.deltas", "pages, edits ,,users")
            .expect("set deltas");

        assert_eq!(config.delta_columns, vec!["pages", "edits", "users"]);
        assert_eq!(
            config.get_value("delta_columns").as_deref(),
            Some("pages,edits,users")
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut config = Config::default();

        assert!(config.set_value("retention_days", "3").is_err());
        assert!(config.get_value("retention_days").is_none());
    }

    #[test]
    fn missing_file_yields_defaults_and_saved_file_round_trips() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        let config = Config::load_or_default(&path).expect("defaults");
        assert_eq!(config.wiki, "nexusstation");
        assert_eq!(config.charts.len(), 5);

        let mut edited = config.clone();
        edited.set_value("wiki", "terraria").expect("set wiki");
        edited.set_value("track_word_count", "false").expect("set flag");
        edited.save(&path).expect("save");

        let reloaded = Config::load_or_default(&path).expect("reload");
        assert_eq!(reloaded.wiki, "terraria");
        assert!(!reloaded.track_word_count);
        assert_eq!(reloaded.charts, edited.charts);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"wiki":"calamitymod","csv_path":"data/stats.csv"}"#)
            .expect("write");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.wiki, "calamitymod");
        assert_eq!(config.csv_path.to_str(), Some("data/stats.csv"));
        assert_eq!(config.required_metrics, vec!["pages", "edits", "activeusers"]);
    }
}
