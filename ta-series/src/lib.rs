//! Array-to-array technical-analysis functions.
//!
//! Every function maps equal-length input arrays to an output array of the
//! same length, index-aligned with the bar series; `NA` (`f64::NAN`) marks
//! values still inside their warm-up window. Window computations re-scan the
//! trailing slice rather than carrying running sums so a `NA` anywhere in the
//! window surfaces as `NA` in the output instead of poisoning later bars.

pub use bar_core::NA;

// ---------- smoothing ---------------------------------------------------------

/// Exponential moving average seeded at index 0 (no warm-up sentinel):
/// `ema[0] = src[0]`, `ema[i] = alpha*src[i] + (1-alpha)*ema[i-1]` with
/// `alpha = 2/(length+1)`.
pub fn ema(source: &[f64], length: usize) -> Vec<f64> {
    let alpha = 2.0 / (length as f64 + 1.0);
    let mut out = Vec::with_capacity(source.len());
    let mut prev = 0.0;
    for (i, &v) in source.iter().enumerate() {
        let next = if i == 0 {
            v
        } else {
            alpha * v + (1.0 - alpha) * prev
        };
        out.push(next);
        prev = next;
    }
    out
}

/// Simple moving average; `NA` until a full window is available.
pub fn sma(source: &[f64], length: usize) -> Vec<f64> {
    window_map(source, length, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Wilder smoothing: seeded with the SMA of the first full window, then
/// `rma[i] = (rma[i-1]*(length-1) + src[i]) / length`.
pub fn rma(source: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![NA; source.len()];
    if length == 0 || source.len() < length {
        return out;
    }
    let mut prev = source[..length].iter().sum::<f64>() / length as f64;
    out[length - 1] = prev;
    for i in length..source.len() {
        prev = (prev * (length as f64 - 1.0) + source[i]) / length as f64;
        out[i] = prev;
    }
    out
}

/// Linearly weighted moving average (most recent bar weighted highest).
pub fn wma(source: &[f64], length: usize) -> Vec<f64> {
    let denom = (length * (length + 1)) as f64 / 2.0;
    window_map(source, length, |w| {
        let weighted: f64 = w
            .iter()
            .enumerate()
            .map(|(k, &v)| v * (k as f64 + 1.0))
            .sum();
        weighted / denom
    })
}

/// Volume-weighted moving average over the trailing window.
pub fn vwma(source: &[f64], volume: &[f64], length: usize) -> Vec<f64> {
    debug_assert_eq!(source.len(), volume.len());
    let mut out = vec![NA; source.len()];
    if length == 0 {
        return out;
    }
    for i in 0..source.len() {
        if i + 1 < length {
            continue;
        }
        let lo = i + 1 - length;
        let mut pv = 0.0;
        let mut v_sum = 0.0;
        for j in lo..=i {
            pv += source[j] * volume[j];
            v_sum += volume[j];
        }
        out[i] = pv / v_sum.max(1e-12);
    }
    out
}

/// Hull moving average: `wma(2*wma(n/2) - wma(n), floor(sqrt(n)))`.
pub fn hma(source: &[f64], length: usize) -> Vec<f64> {
    let half = wma(source, (length / 2).max(1));
    let full = wma(source, length);
    let diff: Vec<f64> = half
        .iter()
        .zip(full.iter())
        .map(|(&h, &f)| 2.0 * h - f)
        .collect();
    wma(&diff, (length as f64).sqrt().floor().max(1.0) as usize)
}

// ---------- oscillators -------------------------------------------------------

/// RSI over simple (non-Wilder) means of the trailing `length` signed
/// changes. `NA` for `i < length`. A zero average loss divides by 1 instead.
pub fn rsi(source: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![NA; source.len()];
    if length == 0 {
        return out;
    }
    for i in 0..source.len() {
        if i < length {
            continue;
        }
        let mut gain = 0.0;
        let mut loss = 0.0;
        for j in i + 1 - length..=i {
            let change = source[j] - source[j - 1];
            if change > 0.0 {
                gain += change;
            } else {
                loss -= change;
            }
        }
        let avg_gain = gain / length as f64;
        let avg_loss = loss / length as f64;
        let rs = avg_gain / if avg_loss == 0.0 { 1.0 } else { avg_loss };
        out[i] = 100.0 - 100.0 / (1.0 + rs);
    }
    out
}

/// Money-flow index using `source` as the typical price.
pub fn mfi(source: &[f64], volume: &[f64], length: usize) -> Vec<f64> {
    debug_assert_eq!(source.len(), volume.len());
    let mut out = vec![NA; source.len()];
    if length == 0 {
        return out;
    }
    for i in 0..source.len() {
        if i < length {
            continue;
        }
        let mut positive = 0.0;
        let mut negative = 0.0;
        for j in i + 1 - length..=i {
            let flow = source[j] * volume[j];
            if source[j] > source[j - 1] {
                positive += flow;
            } else if source[j] < source[j - 1] {
                negative += flow;
            }
        }
        out[i] = if negative == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + positive / negative)
        };
    }
    out
}

/// Commodity channel index with the conventional 0.015 scaling constant.
pub fn cci(source: &[f64], length: usize) -> Vec<f64> {
    window_map(source, length, |w| {
        let n = w.len() as f64;
        let mean = w.iter().sum::<f64>() / n;
        let dev = w.iter().map(|v| (v - mean).abs()).sum::<f64>() / n;
        if dev.abs() < 1e-12 {
            0.0
        } else {
            (w[w.len() - 1] - mean) / (0.015 * dev)
        }
    })
}

// ---------- range & volatility -------------------------------------------------

/// Per-bar true range approximated as `high - low`. The gap against the
/// previous close is intentionally not considered; `atr` inherits this.
pub fn true_range(high: &[f64], low: &[f64]) -> Vec<f64> {
    debug_assert_eq!(high.len(), low.len());
    high.iter().zip(low.iter()).map(|(&h, &l)| h - l).collect()
}

/// Average true range: SMA of the gap-free true range over `length`.
pub fn atr(high: &[f64], low: &[f64], length: usize) -> Vec<f64> {
    sma(&true_range(high, low), length)
}

/// Population variance over the trailing window; `NA` during warm-up.
pub fn variance(source: &[f64], length: usize) -> Vec<f64> {
    window_map(source, length, |w| {
        let n = w.len() as f64;
        let mean = w.iter().sum::<f64>() / n;
        w.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
    })
}

/// Population standard deviation (divide by `length`, not `length-1`).
pub fn stdev(source: &[f64], length: usize) -> Vec<f64> {
    variance(source, length).iter().map(|v| v.sqrt()).collect()
}

/// Rolling population covariance of two series.
pub fn covariance(a: &[f64], b: &[f64], length: usize) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    let mut out = vec![NA; a.len()];
    if length == 0 {
        return out;
    }
    for i in 0..a.len() {
        if i + 1 < length {
            continue;
        }
        let lo = i + 1 - length;
        let n = length as f64;
        let mean_a = a[lo..=i].iter().sum::<f64>() / n;
        let mean_b = b[lo..=i].iter().sum::<f64>() / n;
        out[i] = (lo..=i)
            .map(|j| (a[j] - mean_a) * (b[j] - mean_b))
            .sum::<f64>()
            / n;
    }
    out
}

/// Rolling Pearson correlation; `NA` when either window is flat.
pub fn correlation(a: &[f64], b: &[f64], length: usize) -> Vec<f64> {
    let cov = covariance(a, b, length);
    let sd_a = stdev(a, length);
    let sd_b = stdev(b, length);
    cov.iter()
        .zip(sd_a.iter().zip(sd_b.iter()))
        .map(|(&c, (&x, &y))| {
            let denom = x * y;
            if denom.abs() < 1e-12 {
                NA
            } else {
                c / denom
            }
        })
        .collect()
}

// ---------- extrema & momentum --------------------------------------------------

/// Rolling maximum of the trailing window.
pub fn highest(source: &[f64], length: usize) -> Vec<f64> {
    window_map(source, length, |w| {
        w.iter().cloned().fold(f64::MIN, f64::max)
    })
}

/// Rolling minimum of the trailing window.
pub fn lowest(source: &[f64], length: usize) -> Vec<f64> {
    window_map(source, length, |w| {
        w.iter().cloned().fold(f64::MAX, f64::min)
    })
}

/// `src[i] - src[i-length]`; `NA` while the lookback is out of range.
pub fn change(source: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![NA; source.len()];
    for i in length..source.len() {
        out[i] = source[i] - source[i - length];
    }
    out
}

/// Momentum is the n-bar difference.
pub fn mom(source: &[f64], length: usize) -> Vec<f64> {
    change(source, length)
}

/// Percent rate of change over `length` bars.
pub fn roc(source: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![NA; source.len()];
    for i in length..source.len() {
        out[i] = 100.0 * (source[i] - source[i - length]) / source[i - length];
    }
    out
}

/// On-balance volume: signed cumulative volume, starting at 0.
pub fn obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    debug_assert_eq!(close.len(), volume.len());
    let mut out = Vec::with_capacity(close.len());
    let mut acc = 0.0;
    for i in 0..close.len() {
        if i > 0 {
            if close[i] > close[i - 1] {
                acc += volume[i];
            } else if close[i] < close[i - 1] {
                acc -= volume[i];
            }
        }
        out.push(acc);
    }
    out
}

// ---------- crossings -----------------------------------------------------------

/// 1.0 on bars where `a` crosses above `b`, else 0.0 (0.0 at index 0).
pub fn crossover(a: &[f64], b: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    (0..a.len())
        .map(|i| {
            if i > 0 && (a[i - 1] - b[i - 1]) <= 0.0 && (a[i] - b[i]) > 0.0 {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// 1.0 on bars where `a` crosses below `b`, else 0.0 (0.0 at index 0).
pub fn crossunder(a: &[f64], b: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    (0..a.len())
        .map(|i| {
            if i > 0 && (a[i - 1] - b[i - 1]) >= 0.0 && (a[i] - b[i]) < 0.0 {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// 1.0 on any crossing in either direction.
pub fn cross(a: &[f64], b: &[f64]) -> Vec<f64> {
    let over = crossover(a, b);
    let under = crossunder(a, b);
    over.iter()
        .zip(under.iter())
        .map(|(&o, &u)| if o != 0.0 || u != 0.0 { 1.0 } else { 0.0 })
        .collect()
}

// ---------- shared window helper --------------------------------------------------

fn window_map<F: Fn(&[f64]) -> f64>(source: &[f64], length: usize, f: F) -> Vec<f64> {
    let mut out = vec![NA; source.len()];
    if length == 0 {
        return out;
    }
    for i in 0..source.len() {
        if i + 1 >= length {
            out[i] = f(&source[i + 1 - length..=i]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn ema_seeds_at_first_bar_and_follows_recurrence() {
        let src = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = ema(&src, 9);
        assert_eq!(out[0], 1.0);
        let alpha = 2.0 / 10.0;
        let mut expected = 1.0;
        for i in 1..src.len() {
            expected = alpha * src[i] + (1.0 - alpha) * expected;
            assert_approx_eq!(out[i], expected, 1e-12);
        }
    }

    #[test]
    fn ema_rerun_reproduces_same_sequence() {
        let src: Vec<f64> = (0..64).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        assert_eq!(ema(&src, 12), ema(&src, 12));
    }

    #[test]
    fn sma_of_length_one_is_identity() {
        let src = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(sma(&src, 1), src.to_vec());
    }

    #[test]
    fn sma_warms_up_then_averages() {
        let src = [1.0, 2.0, 3.0, 4.0];
        let out = sma(&src, 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_approx_eq!(out[2], 2.0, 1e-12);
        assert_approx_eq!(out[3], 3.0, 1e-12);
    }

    #[test]
    fn rsi_is_100_on_monotonic_rise_and_na_in_warmup() {
        let src = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let out = rsi(&src, 3);
        for v in &out[..3] {
            assert!(v.is_nan());
        }
        for v in &out[3..] {
            assert_approx_eq!(*v, 100.0, 1e-9);
        }
    }

    #[test]
    fn rsi_zero_loss_divides_by_one_not_zero() {
        // Flat series: zero gain and zero loss, rs = 0/1, rsi = 0.
        let src = [5.0; 6];
        let out = rsi(&src, 3);
        assert_approx_eq!(out[5], 0.0, 1e-12);
    }

    #[test]
    fn stdev_of_constant_series_is_zero_after_warmup() {
        let src = [7.0; 8];
        let out = stdev(&src, 4);
        for v in &out[3..] {
            assert_approx_eq!(*v, 0.0, 1e-12);
        }
        assert!(out[2].is_nan());
    }

    #[test]
    fn stdev_is_population_not_sample() {
        let src = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let out = stdev(&src, 8);
        // Classic population-stdev example: exactly 2.
        assert_approx_eq!(out[7], 2.0, 1e-12);
    }

    #[test]
    fn atr_ignores_gap_versus_previous_close() {
        // Second bar gaps far above the first close. The standard true-range
        // definition would take |high - prev_close| = 9.0; this builtin
        // deliberately uses high - low = 1.0 only.
        let high = [2.0, 11.0];
        let low = [1.0, 10.0];
        let out = atr(&high, &low, 1);
        assert_approx_eq!(out[1], 1.0, 1e-12);
        let gap_aware = (high[1] - 2.0_f64).abs(); // prev close assumed 2.0
        assert!(out[1] < gap_aware);
    }

    #[test]
    fn rma_seeds_with_sma_then_smooths() {
        let src = [1.0, 2.0, 3.0, 4.0];
        let out = rma(&src, 2);
        assert!(out[0].is_nan());
        assert_approx_eq!(out[1], 1.5, 1e-12);
        assert_approx_eq!(out[2], (1.5 + 3.0) / 2.0, 1e-12);
    }

    #[test]
    fn wma_weights_recent_bars_higher() {
        let src = [1.0, 2.0, 3.0];
        let out = wma(&src, 3);
        assert_approx_eq!(out[2], (1.0 + 4.0 + 9.0) / 6.0, 1e-12);
    }

    #[test]
    fn vwma_tracks_volume_weighted_mean() {
        let src = [10.0, 20.0];
        let vol = [1.0, 3.0];
        let out = vwma(&src, &vol, 2);
        assert_approx_eq!(out[1], (10.0 + 60.0) / 4.0, 1e-12);
    }

    #[test]
    fn hma_is_finite_after_warmup() {
        let src: Vec<f64> = (0..32).map(|i| 100.0 + i as f64).collect();
        let out = hma(&src, 9);
        assert!(out.last().unwrap().is_finite());
        assert_eq!(out.len(), src.len());
    }

    #[test]
    fn highest_and_lowest_track_window_extremes() {
        let src = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(highest(&src, 3)[4], 5.0);
        assert_eq!(lowest(&src, 3)[4], 1.0);
        assert!(highest(&src, 3)[1].is_nan());
    }

    #[test]
    fn change_and_roc_use_lookback() {
        let src = [10.0, 11.0, 13.0];
        assert_approx_eq!(change(&src, 2)[2], 3.0, 1e-12);
        assert!(change(&src, 2)[1].is_nan());
        assert_approx_eq!(roc(&src, 2)[2], 30.0, 1e-12);
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let close = [1.0, 2.0, 1.5, 1.5];
        let vol = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(obv(&close, &vol), vec![0.0, 20.0, -10.0, -10.0]);
    }

    #[test]
    fn mfi_stays_in_bounds() {
        let src = [10.0, 11.0, 10.5, 12.0, 11.0, 13.0];
        let vol = [1.0; 6];
        let out = mfi(&src, &vol, 3);
        for v in &out[3..] {
            assert!(*v >= 0.0 && *v <= 100.0);
        }
    }

    #[test]
    fn correlation_of_identical_series_is_one() {
        let src = [1.0, 3.0, 2.0, 5.0, 4.0];
        let out = correlation(&src, &src, 3);
        assert_approx_eq!(out[4], 1.0, 1e-9);
    }

    #[test]
    fn crossover_fires_only_on_the_crossing_bar() {
        let a = [1.0, 1.0, 3.0, 3.0];
        let b = [2.0, 2.0, 2.0, 2.0];
        assert_eq!(crossover(&a, &b), vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(crossunder(&b, &a), vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(cross(&a, &b), vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn na_inside_window_surfaces_as_na() {
        let src = [NA, 2.0, 3.0, 4.0];
        let out = sma(&src, 2);
        assert!(out[1].is_nan());
        assert_approx_eq!(out[2], 2.5, 1e-12);
    }
}
