use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since Unix epoch.
pub type Timestamp = i64;

/// Sentinel for "not yet computed" values during indicator warm-up.
pub const NA: f64 = f64::NAN;

/// One OHLCV sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub time: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A single point of a plotted curve, time-aligned with the bar series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlotPoint {
    pub time: Timestamp,
    pub value: f64,
}

impl PlotPoint {
    /// True when the value is still in its warm-up period.
    pub fn is_na(&self) -> bool {
        self.value.is_nan()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    /// Per-field arrays must all have the same length.
    LengthMismatch { field: &'static str, expected: usize, got: usize },
}

impl fmt::Display for SeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesError::LengthMismatch {
                field,
                expected,
                got,
            } => write!(
                f,
                "column `{field}` has length {got}, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for SeriesError {}

/// Columnar bar store: five equal-length value arrays plus a matching
/// `time` array. Index i is bar i across all fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarSeries {
    time: Vec<Timestamp>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            time: Vec::with_capacity(n),
            open: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            close: Vec::with_capacity(n),
            volume: Vec::with_capacity(n),
        }
    }

    /// Build from row-shaped bars; alignment holds by construction.
    pub fn from_bars<I: IntoIterator<Item = Bar>>(bars: I) -> Self {
        let mut series = Self::new();
        for bar in bars {
            series.push(bar);
        }
        series
    }

    /// Build from pre-split columns, validating the alignment invariant.
    pub fn from_columns(
        time: Vec<Timestamp>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        let n = time.len();
        let check = |field: &'static str, len: usize| {
            if len == n {
                Ok(())
            } else {
                Err(SeriesError::LengthMismatch {
                    field,
                    expected: n,
                    got: len,
                })
            }
        };
        check("open", open.len())?;
        check("high", high.len())?;
        check("low", low.len())?;
        check("close", close.len())?;
        check("volume", volume.len())?;
        Ok(Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Append one bar. Timestamps must be non-decreasing.
    pub fn push(&mut self, bar: Bar) {
        if let Some(last) = self.time.last() {
            assert!(
                bar.time >= *last,
                "push expects non-decreasing timestamps"
            );
        }
        self.time.push(bar.time);
        self.open.push(bar.open);
        self.high.push(bar.high);
        self.low.push(bar.low);
        self.close.push(bar.close);
        self.volume.push(bar.volume);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<Bar> {
        if i >= self.len() {
            return None;
        }
        Some(Bar {
            time: self.time[i],
            open: self.open[i],
            high: self.high[i],
            low: self.low[i],
            close: self.close[i],
            volume: self.volume[i],
        })
    }

    pub fn time(&self) -> &[Timestamp] {
        &self.time
    }

    pub fn open(&self) -> &[f64] {
        &self.open
    }

    pub fn high(&self) -> &[f64] {
        &self.high
    }

    pub fn low(&self) -> &[f64] {
        &self.low
    }

    pub fn close(&self) -> &[f64] {
        &self.close
    }

    pub fn volume(&self) -> &[f64] {
        &self.volume
    }

    /// Pair an index-aligned value array with this series' timestamps.
    pub fn align(&self, values: &[f64]) -> Vec<PlotPoint> {
        debug_assert_eq!(values.len(), self.len());
        self.time
            .iter()
            .zip(values.iter())
            .map(|(&time, &value)| PlotPoint { time, value })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_bar(time: i64, close: f64) -> Bar {
        Bar {
            time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn columns_stay_aligned_under_push() {
        let series = BarSeries::from_bars((0..5).map(|i| mk_bar(i * 60_000, 100.0 + i as f64)));
        assert_eq!(series.len(), 5);
        assert_eq!(series.open().len(), 5);
        assert_eq!(series.volume().len(), 5);
        assert_eq!(series.close()[3], 103.0);
        assert_eq!(series.time()[3], 180_000);
    }

    #[test]
    fn from_columns_rejects_mismatched_lengths() {
        let err = BarSeries::from_columns(
            vec![0, 1, 2],
            vec![1.0, 2.0, 3.0],
            vec![1.0, 2.0],
            vec![1.0, 2.0, 3.0],
            vec![1.0, 2.0, 3.0],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SeriesError::LengthMismatch {
                field: "high",
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    #[should_panic(expected = "non-decreasing")]
    fn push_rejects_time_regression() {
        let mut series = BarSeries::new();
        series.push(mk_bar(60_000, 1.0));
        series.push(mk_bar(0, 2.0));
    }

    #[test]
    fn align_pairs_values_with_times() {
        let series = BarSeries::from_bars((0..3).map(|i| mk_bar(i * 1_000, 1.0)));
        let points = series.align(&[NA, 2.0, 3.0]);
        assert_eq!(points.len(), 3);
        assert!(points[0].is_na());
        assert_eq!(points[1].time, 1_000);
        assert_eq!(points[1].value, 2.0);
    }

    #[test]
    fn get_reassembles_rows() {
        let series = BarSeries::from_bars([mk_bar(0, 10.0)]);
        let bar = series.get(0).unwrap();
        assert_eq!(bar.high, 11.0);
        assert_eq!(bar.low, 9.0);
        assert!(series.get(1).is_none());
    }
}
