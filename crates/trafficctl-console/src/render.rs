//! Plain-text rendering of snapshots for the terminal.

use chrono::{DateTime, Utc};
use trafficctl_core::{AnalyticsSnapshot, CameraFeed, SystemStatus};
use trafficctl_sync::Freshness;

const CHART_WIDTH: u64 = 40;

/// `8` -> `"08:00"`.
pub fn format_hour(hour: u8) -> String {
    format!("{hour:02}:00")
}

/// One-line status summary for logs.
pub fn status_summary(status: &SystemStatus) -> String {
    let directions: Vec<String> = status
        .direction_names
        .iter()
        .zip(status.current_states.iter())
        .zip(status.vehicle_counts.iter())
        .map(|((name, state), count)| format!("{name}:{state}({count})"))
        .collect();

    format!(
        "{} {} active={} remaining={}s vehicles={} extra={} [{}]",
        if status.running { "RUNNING" } else { "STOPPED" },
        status.mode_label(),
        status.active_direction_name().unwrap_or("-"),
        status.remaining_time,
        status.total_vehicles(),
        status.extra_vehicles(),
        directions.join(" ")
    )
}

/// Multi-line status report.
pub fn status_report(status: &SystemStatus) -> Vec<String> {
    let mut lines = vec![
        format!(
            "System: {}",
            if status.running { "Running" } else { "Stopped" }
        ),
        format!("Mode: {}", status.mode_label()),
        format!(
            "Active direction: {}",
            status.active_direction_name().unwrap_or("none")
        ),
        format!("Remaining: {}s", status.remaining_time),
    ];
    for (i, name) in status.direction_names.iter().enumerate() {
        let marker = if status.current_direction == Some(i) { "*" } else { " " };
        lines.push(format!(
            "{marker} {name:<8} {:<6} {:>4} vehicles",
            status.current_states[i].as_str(),
            status.vehicle_counts[i]
        ));
    }
    lines.push(format!(
        "Total vehicles: {} (+{} at secondary intersections)",
        status.total_vehicles(),
        status.extra_vehicles()
    ));
    lines
}

/// One camera tile as text.
pub fn feed_line(feed: &CameraFeed) -> String {
    format!(
        "camera {} {} {} vehicles={} image={}",
        feed.id,
        feed.direction,
        feed.signal_label(),
        feed.count,
        feed.image.media_type().unwrap_or("unknown")
    )
}

/// Headline analytics plus a bar chart of cars per hour.
pub fn analytics_report(snapshot: &AnalyticsSnapshot) -> Vec<String> {
    let derived = snapshot.derived();
    let mut lines = vec![
        format!("Period: {}", snapshot.current_period),
        format!(
            "Peak hour: {}",
            derived
                .peak_hour
                .map(format_hour)
                .unwrap_or_else(|| "n/a".to_string())
        ),
        format!(
            "Busiest direction: {}",
            derived.busiest_direction.as_deref().unwrap_or("n/a")
        ),
        format!("Total vehicles: {}", derived.total_vehicles),
    ];

    let chart = snapshot.hourly_chart();
    let max = chart.iter().map(|(_, n)| *n).max().unwrap_or(0);
    for (hour, count) in chart {
        lines.push(format!(
            "{} {:>5} {}",
            format_hour(hour),
            count,
            "#".repeat(bar_width(count, max))
        ));
    }
    lines
}

/// Bar length for `count` scaled against `max`, widened so large counts
/// cannot overflow.
fn bar_width(count: u64, max: u64) -> usize {
    if max == 0 {
        return 0;
    }
    (u128::from(count) * u128::from(CHART_WIDTH) / u128::from(max)) as usize
}

/// `"updated 3s ago"`, `"offline (4 failures)"`, or `"no data"`.
pub fn freshness_label(freshness: &Freshness, offline: bool, now: DateTime<Utc>) -> String {
    match (freshness.age(now), offline) {
        (None, _) => "no data".to_string(),
        (Some(_), true) => format!("offline ({} failures)", freshness.consecutive_failures),
        (Some(age), false) => format!("updated {}s ago", age.num_seconds().max(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trafficctl_core::{CameraImage, SignalState};

    fn status() -> SystemStatus {
        SystemStatus {
            running: true,
            manual_override: false,
            current_states: [
                SignalState::Green,
                SignalState::Red,
                SignalState::Red,
                SignalState::Red,
            ],
            vehicle_counts: [5, 1, 7, 2],
            extra_counts: vec![3, 0],
            current_direction: Some(0),
            remaining_time: 12,
            direction_names: ["North", "East", "South", "West"].map(String::from),
        }
    }

    #[test]
    fn test_status_summary() {
        assert_eq!(
            status_summary(&status()),
            "RUNNING Automatic active=North remaining=12s vehicles=15 extra=3 \
             [North:GREEN(5) East:RED(1) South:RED(7) West:RED(2)]"
        );
    }

    #[test]
    fn test_status_report_marks_active_direction() {
        let lines = status_report(&status());
        assert!(lines.iter().any(|l| l.starts_with("* North")));
        assert!(lines.iter().any(|l| l.starts_with("  East")));
    }

    #[test]
    fn test_feed_line() {
        let image = CameraImage::from_payload(Some("data:image/jpeg;base64,AAAA".into())).unwrap();
        let feed = CameraFeed::join(0, image, &status()).unwrap();
        assert_eq!(
            feed_line(&feed),
            "camera 0 North GREEN (12s) vehicles=5 image=image/jpeg"
        );
    }

    #[test]
    fn test_analytics_report() {
        let snapshot = AnalyticsSnapshot::from_json(
            r#"{
                "hourly_data": [],
                "total_by_direction": {"car": {"North": 5, "South": 9}},
                "peak_hours": {"car": {"8": 12, "17": 6}},
                "current_period": "weekday"
            }"#,
        )
        .unwrap();

        let lines = analytics_report(&snapshot);
        assert_eq!(lines[0], "Period: weekday");
        assert_eq!(lines[1], "Peak hour: 08:00");
        assert_eq!(lines[2], "Busiest direction: South");
        assert_eq!(lines[3], "Total vehicles: 14");
        assert_eq!(lines[4], format!("08:00    12 {}", "#".repeat(40)));
        assert_eq!(lines[5], format!("17:00     6 {}", "#".repeat(20)));
    }

    #[test]
    fn test_analytics_report_with_huge_counts() {
        let max = u64::MAX;
        let half = u64::MAX / 2;
        let snapshot = AnalyticsSnapshot::from_json(&format!(
            r#"{{
                "hourly_data": [],
                "total_by_direction": {{"car": {{"North": {max}, "South": {max}}}}},
                "peak_hours": {{"car": {{"8": {max}, "9": {half}}}}},
                "current_period": "weekday"
            }}"#
        ))
        .unwrap();

        let lines = analytics_report(&snapshot);
        assert_eq!(lines[3], format!("Total vehicles: {}", u64::MAX));
        assert!(lines[4].ends_with(&"#".repeat(40)));
        assert!(lines[5].ends_with(&format!(" {}", "#".repeat(19))));
    }

    #[test]
    fn test_freshness_label() {
        let now = Utc::now();
        let fresh = Freshness {
            last_updated: Some(now - chrono::Duration::seconds(3)),
            ..Default::default()
        };
        assert_eq!(freshness_label(&fresh, false, now), "updated 3s ago");
        assert_eq!(freshness_label(&Freshness::default(), true, now), "no data");

        let failing = Freshness {
            consecutive_failures: 4,
            ..fresh
        };
        assert_eq!(freshness_label(&failing, true, now), "offline (4 failures)");
    }
}
