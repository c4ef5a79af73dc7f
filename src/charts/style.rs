use chrono::{Duration, NaiveDate};
use plotters::style::RGBColor;

pub const DEFAULT_COLOR: RGBColor = RGBColor(31, 119, 180);

/// Resolves `#rrggbb`, matplotlib `tab:` names and a few basic names.
pub fn parse_color(raw: Option<&str>) -> RGBColor {
    raw.map(|value| value.trim().to_lowercase())
        .and_then(|value| match value.strip_prefix('#') {
            Some(hex) => parse_hex(hex),
            None => named_color(value.trim_start_matches("tab:")),
        })
        .unwrap_or(DEFAULT_COLOR)
}

fn parse_hex(hex: &str) -> Option<RGBColor> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(RGBColor(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn named_color(name: &str) -> Option<RGBColor> {
    let rgb = match name {
        "blue" => (31, 119, 180),
        "orange" => (255, 127, 14),
        "green" => (44, 160, 44),
        "red" => (214, 39, 40),
        "purple" => (148, 103, 189),
        "brown" => (140, 86, 75),
        "pink" => (227, 119, 194),
        "gray" | "grey" => (127, 127, 127),
        "olive" => (188, 189, 34),
        "cyan" => (23, 190, 207),
        "black" => (0, 0, 0),
        _ => return None,
    };

    Some(RGBColor(rgb.0, rgb.1, rgb.2))
}

/// Day offsets from the first date, so the x axis is scaled by calendar time.
pub fn day_offsets(series: &[(NaiveDate, i64)]) -> Option<(NaiveDate, Vec<(i64, i64)>)> {
    let first = series.first()?.0;
    let points = series
        .iter()
        .map(|(date, value)| ((*date - first).num_days(), *value))
        .collect();

    Some((first, points))
}

pub fn date_label(first: NaiveDate, offset: i64) -> String {
    (first + Duration::days(offset))
        .format("%Y-%m-%d")
        .to_string()
}

/// Axis bounds with headroom; a flat or single-point series still gets a
/// non-empty range.
pub fn padded_range(values: impl Iterator<Item = i64>) -> std::ops::Range<i64> {
    let (min, max) = values.fold((i64::MAX, i64::MIN), |(min, max), value| {
        (min.min(value), max.max(value))
    });

    if min > max {
        return 0..1;
    }

    let pad = ((max - min) / 10).max(1);
    min.saturating_sub(pad)..max.saturating_add(pad)
}
