//! Binary-classification metrics over probability scores and {0, 1} labels.

/// Fraction of correct hard calls at `threshold`.
pub fn accuracy(probs: &[f64], labels: &[f64], threshold: f64) -> f64 {
    assert_eq!(probs.len(), labels.len());
    if probs.is_empty() {
        return 0.0;
    }
    let correct = probs
        .iter()
        .zip(labels)
        .filter(|&(&p, &y)| (p >= threshold) == (y >= 0.5))
        .count();
    correct as f64 / probs.len() as f64
}

/// Precision, recall, and F1 at `threshold`. Degenerate denominators yield 0.
pub fn precision_recall_f1(probs: &[f64], labels: &[f64], threshold: f64) -> (f64, f64, f64) {
    assert_eq!(probs.len(), labels.len());
    let (mut tp, mut fp, mut fneg) = (0usize, 0usize, 0usize);
    for (&p, &y) in probs.iter().zip(labels) {
        let pred = p >= threshold;
        let pos = y >= 0.5;
        match (pred, pos) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fneg += 1,
            (false, false) => {}
        }
    }
    let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
    let recall = if tp + fneg > 0 { tp as f64 / (tp + fneg) as f64 } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

/// Area under the ROC curve via the rank-sum formulation, with tied scores
/// assigned their average rank. Single-class inputs yield 0.5.
pub fn roc_auc(probs: &[f64], labels: &[f64]) -> f64 {
    assert_eq!(probs.len(), labels.len());
    let n_pos = labels.iter().filter(|&&y| y >= 0.5).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[a].partial_cmp(&probs[b]).unwrap_or(std::cmp::Ordering::Equal));

    // Average ranks across runs of equal scores.
    let mut ranks = vec![0.0; probs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|&(&y, _)| y >= 0.5)
        .map(|(_, &r)| r)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    (pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

/// Precision/recall pairs at every distinct score treated as a threshold,
/// sorted by descending threshold. Returns `(precisions, recalls, thresholds)`.
pub fn precision_recall_curve(probs: &[f64], labels: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    assert_eq!(probs.len(), labels.len());
    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].partial_cmp(&probs[a]).unwrap_or(std::cmp::Ordering::Equal));

    let total_pos = labels.iter().filter(|&&y| y >= 0.5).count() as f64;
    let mut precisions = Vec::new();
    let mut recalls = Vec::new();
    let mut thresholds = Vec::new();

    let (mut tp, mut fp) = (0.0, 0.0);
    let mut i = 0;
    while i < order.len() {
        let score = probs[order[i]];
        // Consume the whole run of ties before emitting a point.
        while i < order.len() && probs[order[i]] == score {
            if labels[order[i]] >= 0.5 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        precisions.push(if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 });
        recalls.push(if total_pos > 0.0 { tp / total_pos } else { 0.0 });
        thresholds.push(score);
    }
    (precisions, recalls, thresholds)
}

/// Average precision: the PR curve summarized as sum over recall increments.
pub fn average_precision(probs: &[f64], labels: &[f64]) -> f64 {
    let (precisions, recalls, _) = precision_recall_curve(probs, labels);
    let mut ap = 0.0;
    let mut prev_recall = 0.0;
    for (p, r) in precisions.iter().zip(&recalls) {
        ap += p * (r - prev_recall);
        prev_recall = *r;
    }
    ap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_and_f1_on_perfect_scores() {
        let probs = [0.9, 0.8, 0.1, 0.2];
        let labels = [1.0, 1.0, 0.0, 0.0];
        assert_eq!(accuracy(&probs, &labels, 0.5), 1.0);
        let (p, r, f1) = precision_recall_f1(&probs, &labels, 0.5);
        assert_eq!((p, r, f1), (1.0, 1.0, 1.0));
    }

    #[test]
    fn auc_perfect_and_inverted() {
        let labels = [1.0, 1.0, 0.0, 0.0];
        assert_eq!(roc_auc(&[0.9, 0.8, 0.1, 0.2], &labels), 1.0);
        assert_eq!(roc_auc(&[0.1, 0.2, 0.9, 0.8], &labels), 0.0);
    }

    #[test]
    fn auc_handles_ties_and_single_class() {
        // All scores equal: no ranking information, AUC 0.5.
        assert!((roc_auc(&[0.5, 0.5, 0.5, 0.5], &[1.0, 1.0, 0.0, 0.0]) - 0.5).abs() < 1e-12);
        assert_eq!(roc_auc(&[0.3, 0.7], &[1.0, 1.0]), 0.5);
    }

    #[test]
    fn average_precision_perfect_ranking_is_one() {
        let probs = [0.9, 0.8, 0.3, 0.1];
        let labels = [1.0, 1.0, 0.0, 0.0];
        assert!((average_precision(&probs, &labels) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn average_precision_random_baseline_near_prevalence() {
        // Alternating labels at descending scores: AP lands near prevalence.
        let probs: Vec<f64> = (0..100).map(|i| 1.0 - i as f64 / 100.0).collect();
        let labels: Vec<f64> = (0..100).map(|i| (i % 2) as f64).collect();
        let ap = average_precision(&probs, &labels);
        assert!(ap > 0.3 && ap < 0.7, "ap = {ap}");
    }

    #[test]
    fn pr_curve_monotone_recall() {
        let probs = [0.9, 0.7, 0.7, 0.4, 0.2];
        let labels = [1.0, 0.0, 1.0, 1.0, 0.0];
        let (_, recalls, thresholds) = precision_recall_curve(&probs, &labels);
        assert!(recalls.windows(2).all(|w| w[0] <= w[1]));
        assert!(thresholds.windows(2).all(|w| w[0] > w[1]));
    }
}
