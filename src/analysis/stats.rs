/// Descriptive statistics over a time-ordered measurement series.
///
/// The trend is the slope of an ordinary least-squares fit of value against
/// sample index (not elapsed time):
///
///   slope = (nΣxy − ΣxΣy) / (nΣxx − (Σx)²),   x = 0, 1, …, n−1
///
/// With daily samples this reads as units per day.

use chrono::{DateTime, Utc};

use crate::model::{Analysis, Measurement};

/// Format of the min/max timestamps in an `Analysis`.
pub const ANALYSIS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format(ANALYSIS_TIME_FORMAT).to_string()
}

/// Least-squares slope of `values` against their index.
///
/// Precondition: `values.len() >= 2`. With a single value the denominator
/// is zero and the result is not a number; callers must check the length.
pub fn linear_trend(values: &[f64]) -> f64 {
    debug_assert!(values.len() >= 2, "linear_trend needs at least two points");

    let n = values.len() as f64;
    let (mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
    }
    (n * sxy - sx * sy) / (n * sxx - sx * sx)
}

/// Summarises `series`. An empty series yields an all-zero `Analysis`.
///
/// Min and max resolve ties to the first occurrence. The trend is only
/// computed for two or more points and stays `0.0` otherwise.
pub fn analyze(series: &[Measurement]) -> Analysis {
    let Some(first) = series.first() else {
        return Analysis::default();
    };

    let mut min = first;
    let mut max = first;
    let mut sum = 0.0;
    for point in series {
        if point.value < min.value {
            min = point;
        }
        if point.value > max.value {
            max = point;
        }
        sum += point.value;
    }

    let trend = if series.len() >= 2 {
        let values: Vec<f64> = series.iter().map(|m| m.value).collect();
        linear_trend(&values)
    } else {
        0.0
    };

    Analysis {
        min: min.value,
        max: max.value,
        min_time: format_time(min.timestamp),
        max_time: format_time(max.timestamp),
        avg: sum / series.len() as f64,
        trend,
    }
}

/// Number of most-recent points to show for a series of `len` points when
/// `requested` are asked for: at least two (when available), at most `len`.
pub fn display_window(len: usize, requested: usize) -> usize {
    if len < 2 {
        return len;
    }
    requested.clamp(2, len)
}

/// Analyses only the most recent `window` points of `series`.
pub fn analyze_recent(series: &[Measurement], window: usize) -> Analysis {
    let shown = display_window(series.len(), window);
    analyze(&series[series.len() - shown..])
}
