//! CART decision tree for binary classification (Gini impurity)

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Non-constant features examined per split
    pub max_features: usize,
}

/// Tree node. Children are always stored after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        /// Fraction of class-1 samples that reached this leaf
        probability: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        /// Samples with `x[feature] <= threshold` go left
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted decision tree, stored as a flat node arena rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Weighted Gini impurity of a node with `positives` class-1 samples out of `n`
fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    /// Parent impurity minus weighted child impurity
    decrease: f64,
}

struct TreeBuilder<'x, 'y, 'r, R: Rng> {
    x: ArrayView2<'x, f64>,
    y: &'y [u8],
    params: TreeParams,
    rng: &'r mut R,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl<R: Rng> TreeBuilder<'_, '_, '_, R> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let n = indices.len();
        let positives = indices.iter().filter(|&&i| self.y[i] == 1).count();
        let probability = positives as f64 / n as f64;

        let is_pure = positives == 0 || positives == n;
        if depth >= self.params.max_depth || n < self.params.min_samples_split || is_pure {
            return self.push_leaf(probability, n);
        }

        let Some(split) = self.best_split(&indices, positives) else {
            return self.push_leaf(probability, n);
        };

        self.importances[split.feature] += n as f64 * split.decrease;

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        // Reserve the parent slot so children land after it
        let node = self.push_leaf(probability, n);
        let left = self.build(left_indices, depth + 1);
        let right = self.build(right_indices, depth + 1);
        self.nodes[node] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }

    fn push_leaf(&mut self, probability: f64, samples: usize) -> usize {
        self.nodes.push(Node::Leaf {
            probability,
            samples,
        });
        self.nodes.len() - 1
    }

    fn best_split(&mut self, indices: &[usize], positives: usize) -> Option<Split> {
        let n = indices.len();
        let parent_impurity = gini(positives, n);

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut *self.rng);

        let mut best: Option<Split> = None;
        let mut examined = 0;
        let mut column: Vec<(f64, u8)> = Vec::with_capacity(n);

        for feature in features {
            if examined >= self.params.max_features {
                break;
            }

            column.clear();
            column.extend(indices.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Constant features do not count towards max_features
            if column[0].0 >= column[n - 1].0 {
                continue;
            }
            examined += 1;

            let mut left_positives = 0;
            for k in 1..n {
                left_positives += usize::from(column[k - 1].1);
                let (low, high) = (column[k - 1].0, column[k].0);
                if high <= low {
                    continue;
                }

                let right_positives = positives - left_positives;
                let weighted = (k as f64 * gini(left_positives, k)
                    + (n - k) as f64 * gini(right_positives, n - k))
                    / n as f64;
                let decrease = parent_impurity - weighted;

                if best.map_or(true, |b| decrease > b.decrease) {
                    let mut threshold = low + (high - low) / 2.0;
                    if threshold >= high {
                        threshold = low;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }

        best
    }
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` listed in `sample_indices`.
    ///
    /// Indices may repeat (bootstrap samples). Returns the tree and its raw,
    /// unnormalized impurity-decrease importance per feature.
    pub fn fit<R: Rng>(
        x: ArrayView2<'_, f64>,
        y: &[u8],
        sample_indices: Vec<usize>,
        params: TreeParams,
        rng: &mut R,
    ) -> (Self, Vec<f64>) {
        let mut builder = TreeBuilder {
            x,
            y,
            params,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; x.ncols()],
        };

        if sample_indices.is_empty() {
            builder.push_leaf(0.0, 0);
        } else {
            builder.build(sample_indices, 0);
        }

        let importances = builder.importances;
        (
            Self {
                nodes: builder.nodes,
            },
            importances,
        )
    }

    /// Class-1 probability for one feature row
    pub fn predict_proba(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { probability, .. } => return *probability,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    /// Check structural soundness of a deserialized tree
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { probability, .. } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(format!(
                            "leaf {} has probability {} outside [0, 1]",
                            index, probability
                        ));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            index, feature, n_features
                        ));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {} has a NaN threshold", index));
                    }
                    for child in [left, right] {
                        if *child <= index || *child >= self.nodes.len() {
                            return Err(format!(
                                "node {} points to invalid child {}",
                                index, child
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
