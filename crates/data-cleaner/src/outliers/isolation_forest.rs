//! Isolation forest anomaly scores.

use rand::prelude::*;
use rand::rngs::StdRng;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Average path length of an unsuccessful search in a binary search tree of `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn build(
    rows: &[Vec<f64>],
    indices: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= max_depth || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let columns = rows[indices[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..columns)
        .filter_map(|feature| {
            let (min, max) = indices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &i| {
                (lo.min(rows[i][feature]), hi.max(rows[i][feature]))
            });
            (max > min).then_some((feature, min, max))
        })
        .collect();

    let Some(&(feature, min, max)) = splittable.choose(rng) else {
        return Node::Leaf {
            size: indices.len(),
        };
    };
    let value = rng.gen_range(min..max);
    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| rows[i][feature] < value);

    Node::Split {
        feature,
        value,
        left: Box::new(build(rows, &left, depth + 1, max_depth, rng)),
        right: Box::new(build(rows, &right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            value,
            left,
            right,
        } => {
            if row[*feature] < *value {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Anomaly score in `(0, 1]` for every row. Scores near 1 are anomalies.
pub(super) fn scores(rows: &[Vec<f64>], trees: usize, sample_size: usize, seed: u64) -> Vec<f64> {
    let n = rows.len();
    let psi = sample_size.min(n).max(2);
    let max_depth = (psi as f64).log2().ceil() as usize;
    let mut rng = StdRng::seed_from_u64(seed);

    let forest: Vec<Node> = (0..trees.max(1))
        .map(|_| {
            let sample = rand::seq::index::sample(&mut rng, n, psi).into_vec();
            build(rows, &sample, 0, max_depth, &mut rng)
        })
        .collect();

    let normalizer = average_path_length(psi);
    rows.iter()
        .map(|row| {
            let mean_path = forest
                .iter()
                .map(|tree| path_length(tree, row, 0))
                .sum::<f64>()
                / forest.len() as f64;
            2f64.powf(-mean_path / normalizer)
        })
        .collect()
}
