use super::metrics::precision_recall_curve;

/// The band candidate thresholds must fall inside. Extremes are excluded so a
/// degenerate score distribution cannot pin the threshold at 0 or 1.
const THRESHOLD_BAND: (f64, f64) = (0.05, 0.95);

/// Pick the decision threshold maximizing F1 over the precision/recall curve,
/// restricted to candidates inside the band.
///
/// Returns `(threshold, f1)`. When no candidate falls inside the band the
/// fallback is `(0.5, 0.0)`, reported honestly rather than inflated from an
/// out-of-band point.
pub fn select_threshold(probs: &[f64], labels: &[f64]) -> (f64, f64) {
    let (precisions, recalls, thresholds) = precision_recall_curve(probs, labels);

    let mut best: Option<(f64, f64)> = None;
    for ((&p, &r), &t) in precisions.iter().zip(&recalls).zip(&thresholds) {
        if t < THRESHOLD_BAND.0 || t > THRESHOLD_BAND.1 {
            continue;
        }
        let f1 = 2.0 * p * r / (p + r + 1e-9);
        if best.is_none_or(|(_, best_f1)| f1 > best_f1) {
            best = Some((t, f1));
        }
    }
    best.unwrap_or((0.5, 0.0))
}
