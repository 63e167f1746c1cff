//! Analytics snapshot and derived metrics.
//!
//! `GET /api/analytics` returns pandas-shaped dictionaries keyed first by
//! vehicle class. Hour keys arrive as strings and direction keys arrive in
//! the controller's own order, so both are normalised here:
//! - hours go into a `BTreeMap<u8, u64>`, giving ascending iteration
//! - directions go into a `Vec<(String, u64)>` that keeps insertion order
//!
//! Tie-breaks in the derived metrics depend on those orders.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Vehicle class the headline metrics are computed over.
pub const PRIMARY_CLASS: &str = "car";

/// Direction totals in the order the controller reported them.
pub type DirectionCounts = Vec<(String, u64)>;

/// Calendar period the controller's counters belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Weekday,
    Weekend,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekday => f.write_str("weekday"),
            Self::Weekend => f.write_str("weekend"),
        }
    }
}

/// One `hourly_data` row: per-hour, per-direction counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyRecord {
    pub hour: u8,
    pub direction: String,
    #[serde(default)]
    pub car: u64,
    #[serde(default)]
    pub bike: u64,
    #[serde(default)]
    pub truck: u64,
}

#[derive(Debug, Deserialize)]
struct RawAnalytics {
    #[serde(default)]
    hourly_data: Vec<HourlyRecord>,
    #[serde(default)]
    total_by_direction: Map<String, Value>,
    #[serde(default)]
    peak_hours: Map<String, Value>,
    current_period: Period,
}

/// Analytics counters as of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsSnapshot {
    /// Vehicle class -> hour of day -> count.
    pub hourly_by_class: BTreeMap<String, BTreeMap<u8, u64>>,
    /// Vehicle class -> direction -> count, in reported order.
    pub total_by_direction: BTreeMap<String, DirectionCounts>,
    /// Period the counters were collected in.
    pub current_period: Period,
    /// Raw per-hour, per-direction rows.
    pub hourly_data: Vec<HourlyRecord>,
}

/// Headline figures for the analytics view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DerivedMetrics {
    pub peak_hour: Option<u8>,
    pub busiest_direction: Option<String>,
    pub total_vehicles: u64,
}

impl DerivedMetrics {
    /// False when there was nothing to derive from.
    pub fn is_available(&self) -> bool {
        self.peak_hour.is_some() || self.busiest_direction.is_some()
    }
}

fn count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    // pandas emits float sums once a column has held a NaN
    value
        .as_f64()
        .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
        .map(|f| f as u64)
}

fn class_object<'a>(field: &str, class: &str, value: &'a Value) -> CoreResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        CoreError::InvalidAnalytics(format!("{field}.{class} is not an object"))
    })
}

fn parse_hourly(raw: Map<String, Value>) -> CoreResult<BTreeMap<String, BTreeMap<u8, u64>>> {
    let mut out = BTreeMap::new();
    for (class, value) in &raw {
        let mut hours = BTreeMap::new();
        for (key, n) in class_object("peak_hours", class, value)? {
            let hour: u8 = key
                .trim()
                .parse()
                .ok()
                .filter(|h| *h < 24)
                .ok_or_else(|| CoreError::InvalidAnalytics(format!("invalid hour key {key:?}")))?;
            let n = count(n).ok_or_else(|| {
                CoreError::InvalidAnalytics(format!("peak_hours.{class}.{key} is not a count"))
            })?;
            hours.insert(hour, n);
        }
        out.insert(class.clone(), hours);
    }
    Ok(out)
}

fn parse_directions(raw: Map<String, Value>) -> CoreResult<BTreeMap<String, DirectionCounts>> {
    let mut out = BTreeMap::new();
    for (class, value) in &raw {
        let obj = class_object("total_by_direction", class, value)?;
        let mut totals = Vec::with_capacity(obj.len());
        for (direction, n) in obj {
            let n = count(n).ok_or_else(|| {
                CoreError::InvalidAnalytics(format!(
                    "total_by_direction.{class}.{direction} is not a count"
                ))
            })?;
            totals.push((direction.clone(), n));
        }
        out.insert(class.clone(), totals);
    }
    Ok(out)
}

/// First key holding the strict maximum; earlier entries win ties.
fn first_max<K, I>(entries: I) -> Option<K>
where
    I: IntoIterator<Item = (K, u64)>,
{
    let mut best: Option<(K, u64)> = None;
    for (key, n) in entries {
        if best.as_ref().map_or(true, |(_, max)| n > *max) {
            best = Some((key, n));
        }
    }
    best.map(|(key, _)| key)
}

impl AnalyticsSnapshot {
    /// Parse and validate an analytics body.
    pub fn from_json(body: &str) -> CoreResult<Self> {
        let raw: RawAnalytics =
            serde_json::from_str(body).map_err(|e| CoreError::InvalidAnalytics(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Parse from an already decoded JSON value.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let raw: RawAnalytics =
            serde_json::from_value(value).map_err(|e| CoreError::InvalidAnalytics(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawAnalytics) -> CoreResult<Self> {
        Ok(Self {
            hourly_by_class: parse_hourly(raw.peak_hours)?,
            total_by_direction: parse_directions(raw.total_by_direction)?,
            current_period: raw.current_period,
            hourly_data: raw.hourly_data,
        })
    }

    /// Hour with the highest car count. Lowest hour wins a tie.
    pub fn peak_hour(&self) -> Option<u8> {
        let hours = self.hourly_by_class.get(PRIMARY_CLASS)?;
        first_max(hours.iter().map(|(h, n)| (*h, *n)))
    }

    /// Direction with the highest car total. First reported wins a tie.
    pub fn busiest_direction(&self) -> Option<&str> {
        let totals = self.total_by_direction.get(PRIMARY_CLASS)?;
        first_max(totals.iter().map(|(d, n)| (d.as_str(), *n)))
    }

    /// Sum of car totals over all directions; zero when absent.
    ///
    /// Saturates at `u64::MAX` rather than wrapping.
    pub fn total_vehicles(&self) -> u64 {
        self.total_by_direction
            .get(PRIMARY_CLASS)
            .map(|totals| totals.iter().map(|(_, n)| *n).fold(0u64, u64::saturating_add))
            .unwrap_or(0)
    }

    /// `(hour, count)` points for the car class, ascending by hour.
    pub fn hourly_chart(&self) -> Vec<(u8, u64)> {
        self.hourly_by_class
            .get(PRIMARY_CLASS)
            .map(|hours| hours.iter().map(|(h, n)| (*h, *n)).collect())
            .unwrap_or_default()
    }

    /// All headline figures at once.
    pub fn derived(&self) -> DerivedMetrics {
        DerivedMetrics {
            peak_hour: self.peak_hour(),
            busiest_direction: self.busiest_direction().map(str::to_string),
            total_vehicles: self.total_vehicles(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(peak: Value, totals: Value) -> AnalyticsSnapshot {
        AnalyticsSnapshot::from_value(json!({
            "hourly_data": [],
            "peak_hours": peak,
            "total_by_direction": totals,
            "current_period": "weekday",
        }))
        .unwrap()
    }

    #[test]
    fn test_peak_hour_tie_picks_lowest_hour() {
        let snap = snapshot(json!({"car": {"17": 9, "9": 12, "8": 12}}), json!({}));
        assert_eq!(snap.peak_hour(), Some(8));
    }

    #[test]
    fn test_busiest_direction_tie_picks_first_reported() {
        let snap = snapshot(json!({}), json!({"car": {"North": 5, "South": 9, "East": 9}}));
        assert_eq!(snap.busiest_direction(), Some("South"));
    }

    #[test]
    fn test_total_vehicles() {
        let snap = snapshot(json!({}), json!({"car": {"North": 5, "South": 9}}));
        assert_eq!(snap.total_vehicles(), 14);
    }

    #[test]
    fn test_total_vehicles_saturates() {
        let snap = snapshot(json!({}), json!({"car": {"North": u64::MAX, "South": 1}}));
        assert_eq!(snap.total_vehicles(), u64::MAX);
        assert_eq!(snap.derived().busiest_direction.as_deref(), Some("North"));
    }

    #[test]
    fn test_empty_maps_are_unavailable() {
        let snap = snapshot(json!({"car": {}}), json!({"car": {}}));
        let derived = snap.derived();
        assert_eq!(derived.total_vehicles, 0);
        assert_eq!(derived.peak_hour, None);
        assert_eq!(derived.busiest_direction, None);
        assert!(!derived.is_available());
    }

    #[test]
    fn test_missing_car_class_degrades() {
        let snap = snapshot(json!({"bike": {"8": 3}}), json!({"truck": {"North": 2}}));
        assert_eq!(snap.derived(), DerivedMetrics::default());
        assert!(snap.hourly_chart().is_empty());
    }

    #[test]
    fn test_float_counts_accepted() {
        let snap = snapshot(json!({"car": {"8": 4.0}}), json!({"car": {"West": 2.0}}));
        assert_eq!(snap.hourly_chart(), vec![(8, 4)]);
        assert_eq!(snap.total_vehicles(), 2);
    }

    #[test]
    fn test_rejects_bad_hour_key() {
        let err = AnalyticsSnapshot::from_value(json!({
            "peak_hours": {"car": {"25": 1}},
            "current_period": "weekend",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("invalid hour key"));
    }

    #[test]
    fn test_rejects_negative_count() {
        let result = AnalyticsSnapshot::from_value(json!({
            "total_by_direction": {"car": {"North": -1}},
            "current_period": "weekday",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_parses_hourly_records() {
        let snap = AnalyticsSnapshot::from_json(
            r#"{
                "hourly_data": [{"hour": 8, "direction": "North", "car": 4, "bike": 0, "truck": 1}],
                "peak_hours": {"car": {"8": 4}},
                "total_by_direction": {"car": {"North": 4}},
                "current_period": "weekend"
            }"#,
        )
        .unwrap();
        assert_eq!(snap.current_period, Period::Weekend);
        assert_eq!(snap.hourly_data.len(), 1);
        assert_eq!(snap.hourly_data[0].truck, 1);
    }
}
