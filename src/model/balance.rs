use anyhow::{bail, ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthetic minority oversampling: interpolate new minority rows between a
/// real minority row and one of its k nearest minority neighbors until the
/// classes balance.
///
/// Deterministic given `seed`. Distances are Euclidean in feature space, so
/// callers should oversample before scaling only if all features share a
/// comparable magnitude; the trainer runs it on imputed, unscaled features to
/// match how the exported table is distributed.
pub fn smote_oversample(
    features: &[Vec<f64>],
    labels: &[f64],
    k_neighbors: usize,
    seed: u64,
) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
    ensure!(features.len() == labels.len(), "features/labels length mismatch");

    let positives: Vec<usize> =
        (0..labels.len()).filter(|&i| labels[i] >= 0.5).collect();
    let negatives: Vec<usize> =
        (0..labels.len()).filter(|&i| labels[i] < 0.5).collect();

    let (minority, majority) = if positives.len() <= negatives.len() {
        (positives, negatives)
    } else {
        (negatives, positives)
    };
    let minority_label = if minority.is_empty() || labels[minority[0]] >= 0.5 { 1.0 } else { 0.0 };

    let mut out_features = features.to_vec();
    let mut out_labels = labels.to_vec();

    let deficit = majority.len().saturating_sub(minority.len());
    if deficit == 0 {
        return Ok((out_features, out_labels));
    }
    if minority.len() < 2 {
        bail!(
            "Minority class has {} sample(s); oversampling needs at least 2 to interpolate between",
            minority.len()
        );
    }

    // Shrink k when the minority class is smaller than requested.
    let k = k_neighbors.min(minority.len() - 1).max(1);
    if k < k_neighbors {
        log::warn!(
            "Minority class has only {} samples; shrinking k_neighbors from {k_neighbors} to {k}",
            minority.len()
        );
    }

    // Precompute each minority row's k nearest minority neighbors.
    let neighbors: Vec<Vec<usize>> = minority
        .iter()
        .map(|&i| {
            let mut dists: Vec<(f64, usize)> = minority
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (euclidean_2(&features[i], &features[j]), j))
                .collect();
            dists.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            dists.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    for n in 0..deficit {
        let pick = n % minority.len(); // cycle so every minority row seeds synthetics
        let base = &features[minority[pick]];
        let nn = &features[neighbors[pick][rng.random_range(0..neighbors[pick].len())]];
        let gap: f64 = rng.random();
        let synthetic: Vec<f64> =
            base.iter().zip(nn).map(|(a, b)| a + gap * (b - a)).collect();
        out_features.push(synthetic);
        out_labels.push(minority_label);
    }

    Ok((out_features, out_labels))
}

fn euclidean_2(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
