use std::collections::HashMap;
use std::hash::Hash;

/// Trailing mean over the last `window` observations.
///
/// The window shrinks at the head of the series instead of emitting undefined
/// values: position `i` averages `[max(0, i-window+1), i]`. Strictly causal;
/// output length always equals input length.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    assert!(window > 0, "window must be positive");
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        let n = (i + 1).min(window);
        out.push(sum / n as f64);
    }
    out
}

/// Trailing sample standard deviation over the last `window` observations,
/// with the same shrink-at-start semantics. Fewer than two observations in
/// the window yields 0.0.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    assert!(window > 0, "window must be positive");
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        if slice.len() < 2 {
            out.push(0.0);
            continue;
        }
        let n = slice.len() as f64;
        let mean = slice.iter().sum::<f64>() / n;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        out.push(var.sqrt());
    }
    out
}

/// Apply a windowed kernel per spatial key over each key's own subsequence;
/// observations never cross keys, even when rows of different keys interleave.
fn grouped_apply<K>(
    keys: &[K],
    values: &[f64],
    window: usize,
    kernel: fn(&[f64], usize) -> Vec<f64>,
) -> Vec<f64>
where
    K: Eq + Hash + Clone,
{
    assert_eq!(keys.len(), values.len(), "keys/values length mismatch");
    assert!(window > 0, "window must be positive");

    let mut groups: HashMap<K, Vec<usize>> = HashMap::new();
    for (i, key) in keys.iter().enumerate() {
        groups.entry(key.clone()).or_default().push(i);
    }

    let mut out = vec![0.0; values.len()];
    for indices in groups.values() {
        let series: Vec<f64> = indices.iter().map(|&i| values[i]).collect();
        for (&i, v) in indices.iter().zip(kernel(&series, window)) {
            out[i] = v;
        }
    }
    out
}

/// Trailing mean grouped by a spatial key.
pub fn grouped_rolling_mean<K>(keys: &[K], values: &[f64], window: usize) -> Vec<f64>
where
    K: Eq + Hash + Clone,
{
    grouped_apply(keys, values, window, rolling_mean)
}

/// Trailing sample standard deviation grouped by a spatial key.
pub fn grouped_rolling_std<K>(keys: &[K], values: &[f64], window: usize) -> Vec<f64>
where
    K: Eq + Hash + Clone,
{
    grouped_apply(keys, values, window, rolling_std)
}

/// Stable hashable key for an (f64, f64) coordinate, for grouping weather
/// rows by grid point.
pub fn location_key(lat: f64, lon: f64) -> (u64, u64) {
    (lat.to_bits(), lon.to_bits())
}
