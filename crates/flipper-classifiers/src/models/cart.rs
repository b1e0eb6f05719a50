//! Binary Gini CART tree that draws a fresh random feature subset at every split.

use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::Rng;

/// Growth limits for one tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TreeParams {
    /// Candidate features drawn at each split.
    pub max_features: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        label: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Arena of nodes; the root is at index 0.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

/// Gini impurity of `n` rows of which `positives` carry label 1.
fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

impl Tree {
    /// Grow a tree on `rows` of `x`. Labels must be 0 or 1; `rows` may repeat.
    pub(crate) fn fit(
        x: &Array2<f64>,
        y: &Array1<usize>,
        rows: &[usize],
        params: &TreeParams,
        rng: &mut impl Rng,
    ) -> Self {
        let mut nodes = Vec::new();
        grow(x, y, rows, params, 0, rng, &mut nodes);
        Tree { nodes }
    }

    pub(crate) fn predict_row(&self, row: ArrayView1<f64>) -> usize {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { label } => return *label,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub(crate) fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    /// Features used by split nodes, in node order.
    pub(crate) fn split_features(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .collect()
    }
}

/// Push the node for `rows` and its subtree; returns the node index.
fn grow(
    x: &Array2<f64>,
    y: &Array1<usize>,
    rows: &[usize],
    params: &TreeParams,
    depth: usize,
    rng: &mut impl Rng,
    nodes: &mut Vec<Node>,
) -> usize {
    let n = rows.len();
    let positives = rows.iter().filter(|&&r| y[r] == 1).count();
    let index = nodes.len();
    // Ties go to label 0.
    nodes.push(Node::Leaf {
        label: usize::from(2 * positives > n),
    });

    let pure = positives == 0 || positives == n;
    let too_deep = params.max_depth.is_some_and(|d| depth >= d);
    if pure || too_deep || n < 2 * params.min_samples_leaf.max(1) {
        return index;
    }
    let Some(split) = best_split(x, y, rows, positives, params, rng) else {
        return index;
    };

    let left = grow(x, y, &split.left, params, depth + 1, rng, nodes);
    let right = grow(x, y, &split.right, params, depth + 1, rng, nodes);
    nodes[index] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
    };
    index
}

/// Best Gini split over `max_features` features drawn for this node alone.
///
/// Features are visited in a fresh random order and constant ones do not
/// count towards `max_features`. `None` when every feature is constant on
/// `rows` or no boundary leaves `min_samples_leaf` rows on both sides.
fn best_split(
    x: &Array2<f64>,
    y: &Array1<usize>,
    rows: &[usize],
    positives: usize,
    params: &TreeParams,
    rng: &mut impl Rng,
) -> Option<SplitChoice> {
    let n = rows.len();
    let n_features = x.ncols();
    let min_leaf = params.min_samples_leaf.max(1);
    let parent = n as f64 * gini(positives, n);

    let max_features = params.max_features.clamp(1, n_features);
    let order = sample(rng, n_features, n_features);
    let mut examined = 0;
    let mut best: Option<(f64, usize, f64)> = None;
    for feature in order.iter() {
        if examined == max_features {
            break;
        }
        let mut sorted: Vec<(f64, usize)> =
            rows.iter().map(|&r| (x[[r, feature]], y[r])).collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        if sorted[0].0 == sorted[n - 1].0 {
            continue;
        }
        examined += 1;

        let mut left_positives = 0;
        for i in 0..n - 1 {
            left_positives += sorted[i].1;
            let (value, next) = (sorted[i].0, sorted[i + 1].0);
            if value == next {
                continue;
            }
            let (n_left, n_right) = (i + 1, n - i - 1);
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let decrease = parent
                - n_left as f64 * gini(left_positives, n_left)
                - n_right as f64 * gini(positives - left_positives, n_right);
            if best.map_or(true, |(d, _, _)| decrease > d) {
                let mid = (value + next) / 2.0;
                // Adjacent floats can round the midpoint up to `next`.
                let threshold = if mid < next { mid } else { value };
                best = Some((decrease, feature, threshold));
            }
        }
    }

    let (_, feature, threshold) = best?;
    let (left, right): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&r| x[[r, feature]] <= threshold);
    Some(SplitChoice {
        feature,
        threshold,
        left,
        right,
    })
}
