//! Local outlier factor.

use super::euclidean;

/// LOF score for every row. Inliers score close to 1.
pub(super) fn scores(rows: &[Vec<f64>], n_neighbors: usize) -> Vec<f64> {
    let n = rows.len();
    let k = n_neighbors.min((n - 1) / 2).max(1);

    // Nearest neighbors of each row, ties broken by row index.
    let neighbors: Vec<Vec<(usize, f64)>> = (0..n)
        .map(|i| {
            let mut others: Vec<(usize, f64)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, euclidean(&rows[i], &rows[j])))
                .collect();
            others.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            others.truncate(k);
            others
        })
        .collect();

    let k_distance: Vec<f64> = neighbors
        .iter()
        .map(|nn| nn.last().map_or(0.0, |(_, d)| *d))
        .collect();

    let local_reachability: Vec<f64> = neighbors
        .iter()
        .map(|nn| {
            let total: f64 = nn.iter().map(|&(j, d)| d.max(k_distance[j])).sum();
            1.0 / (total / nn.len() as f64 + 1e-10)
        })
        .collect();

    neighbors
        .iter()
        .enumerate()
        .map(|(i, nn)| {
            let ratio: f64 = nn.iter().map(|&(j, _)| local_reachability[j]).sum::<f64>()
                / nn.len() as f64;
            ratio / local_reachability[i]
        })
        .collect()
}
