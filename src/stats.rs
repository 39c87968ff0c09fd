//! Correlation helpers: the one statistics collaborator this crate
//! carries (k-means clustering and the rest of that surface are out of
//! scope here).

/// Pearson correlation coefficient of two equal-length samples.
///
/// Returns `0.0` for a degenerate input (fewer than two points, or
/// either sample having zero variance) rather than `NaN`.
pub fn correlation(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "correlation requires equal-length samples");
    let n = a.len();
    if n < 2 {
        return 0.0;
    }

    let mean_a = a.iter().sum::<f32>() / n as f32;
    let mean_b = b.iter().sum::<f32>() / n as f32;

    let mut cov = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for i in 0..n {
        let da = (a[i] - mean_a) as f64;
        let db = (b[i] - mean_b) as f64;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }

    (cov / (var_a.sqrt() * var_b.sqrt())) as f32
}

/// Spearman rank correlation: ranks `values` (ties broken by stable
/// ascending sort order) and correlates the rank sequence against
/// `0..values.len()`.
pub fn rank_correlation(values: &[f32]) -> f32 {
    let n = values.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&i, &j| values[i].partial_cmp(&values[j]).unwrap());

    let mut ranks = vec![0f32; n];
    for (rank, &original_index) in indices.iter().enumerate() {
        ranks[original_index] = rank as f32;
    }

    let natural_order: Vec<f32> = (0..n).map(|i| i as f32).collect();
    correlation(&ranks, &natural_order)
}
