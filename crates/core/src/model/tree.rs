//! Regression tree used as the weak learner of the boosted ensembles
//!
//! Trees are grown depth-first on a target vector (the pseudo-residuals of the
//! current ensemble) with a squared-error criterion. Split search scans every
//! feature in parallel; each scan sorts the node's samples once and sweeps
//! running sums, so a node costs `O(features · n log n)`.
//!
//! Nodes live in a flat vector with child indices, the same layout sklearn
//! exports, which keeps the JSON model file compact and traversal cache-friendly.
//! Samples go left when `x[feature] <= threshold`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Smallest impurity decrease that still counts as a useful split
const MIN_GAIN: f64 = 1e-12;

/// One tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Internal decision node
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node with the additive contribution
    Leaf { value: f64 },
}

/// Growth limits shared by every tree of an ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLimits {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

/// Best split found for a node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Binary regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

/// Everything the recursive builder needs, bundled to keep signatures short
struct Grower<'a, R, F> {
    x: &'a [R],
    target: &'a [f64],
    limits: TreeLimits,
    n_features: usize,
    total_samples: f64,
    leaf_value: F,
    importances: &'a mut [f64],
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree over `indices`
    ///
    /// `leaf_value` maps the samples that reach a leaf to its output, letting
    /// the loss choose between a plain mean and a Newton step. Weighted
    /// impurity decreases are added to `importances` (one slot per feature).
    pub fn fit<R, F>(
        x: &[R],
        target: &[f64],
        indices: &[usize],
        limits: TreeLimits,
        leaf_value: F,
        importances: &mut [f64],
    ) -> Self
    where
        R: AsRef<[f64]> + Sync,
        F: Fn(&[usize]) -> f64,
    {
        let mut grower = Grower {
            x,
            target,
            limits,
            n_features: importances.len(),
            total_samples: indices.len().max(1) as f64,
            leaf_value,
            importances,
            nodes: Vec::new(),
        };
        let mut root: Vec<usize> = indices.to_vec();
        grower.grow(&mut root, 0);
        Self {
            nodes: grower.nodes,
        }
    }

    /// Tree from explicit nodes (root at index 0)
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Evaluate one row
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Some(Node::Leaf { value }) => return *value,
                None => return 0.0,
            }
        }
    }

    /// Node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    /// Every split points strictly forward to existing nodes
    ///
    /// Guarantees that [`RegressionTree::predict`] terminates and never falls
    /// off the node vector. Grown trees always satisfy it; loaded ones may not.
    pub fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(idx, node)| match node {
                Node::Split { left, right, .. } => {
                    let forward = |child: usize| idx < child && child < self.nodes.len();
                    forward(*left) && forward(*right)
                }
                Node::Leaf { .. } => true,
            })
    }

    /// Largest feature index referenced by a split
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

impl<R, F> Grower<'_, R, F>
where
    R: AsRef<[f64]> + Sync,
    F: Fn(&[usize]) -> f64,
{
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });

        let split = if depth < self.limits.max_depth
            && indices.len() >= self.limits.min_samples_split
            && indices.len() >= 2 * self.limits.min_samples_leaf.max(1)
        {
            self.best_split(indices)
        } else {
            None
        };

        let Some(split) = split else {
            self.nodes[slot] = Node::Leaf {
                value: (self.leaf_value)(indices),
            };
            return slot;
        };

        self.importances[split.feature] += split.gain / self.total_samples;

        let x = self.x;
        let (left_count, _) = partition(indices, |&i| {
            x[i].as_ref()[split.feature] <= split.threshold
        });
        let (left_indices, right_indices) = indices.split_at_mut(left_count);
        let left = self.grow(left_indices, depth + 1);
        let right = self.grow(right_indices, depth + 1);

        self.nodes[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        slot
    }

    fn best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let total: f64 = indices.iter().map(|&i| self.target[i]).sum();
        let parent_score = total * total / n as f64;
        let min_leaf = self.limits.min_samples_leaf.max(1);
        let (x, target) = (self.x, self.target);

        (0..self.n_features)
            .into_par_iter()
            .filter_map(|feature| {
                let mut column: Vec<(f64, f64)> = indices
                    .iter()
                    .map(|&i| (x[i].as_ref()[feature], target[i]))
                    .collect();
                column.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut best: Option<SplitCandidate> = None;
                let mut left_sum = 0.0;
                for k in 0..n - 1 {
                    left_sum += column[k].1;
                    let left_n = k + 1;
                    let right_n = n - left_n;
                    if left_n < min_leaf || right_n < min_leaf {
                        continue;
                    }
                    let (value, next) = (column[k].0, column[k + 1].0);
                    if value >= next {
                        continue;
                    }
                    let right_sum = total - left_sum;
                    let gain = left_sum * left_sum / left_n as f64
                        + right_sum * right_sum / right_n as f64
                        - parent_score;
                    if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain) {
                        let mid = value + (next - value) / 2.0;
                        let threshold = if mid < next { mid } else { value };
                        best = Some(SplitCandidate {
                            feature,
                            threshold,
                            gain,
                        });
                    }
                }
                best
            })
            .reduce_with(|a, b| {
                if b.gain > a.gain || (b.gain == a.gain && b.feature < a.feature) {
                    b
                } else {
                    a
                }
            })
    }
}

/// Stable in-place partition; returns the size of the `true` block
fn partition<P: Fn(&usize) -> bool>(indices: &mut [usize], pred: P) -> (usize, usize) {
    let (mut yes, no): (Vec<usize>, Vec<usize>) = indices.iter().partition(|&i| pred(i));
    let left = yes.len();
    yes.extend_from_slice(&no);
    indices.copy_from_slice(&yes);
    (left, no.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_of(target: &[f64]) -> impl Fn(&[usize]) -> f64 + '_ {
        move |idx: &[usize]| idx.iter().map(|&i| target[i]).sum::<f64>() / idx.len() as f64
    }

    const LIMITS: TreeLimits = TreeLimits {
        max_depth: 3,
        min_samples_split: 2,
        min_samples_leaf: 1,
    };

    #[test]
    fn test_learns_step_function() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i), 0.0]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { -1.0 } else { 1.0 }).collect();
        let indices: Vec<usize> = (0..20).collect();
        let mut importances = vec![0.0; 2];

        let tree = RegressionTree::fit(&x, &y, &indices, LIMITS, mean_of(&y), &mut importances);

        assert_eq!(tree.predict(&[3.0, 0.0]), -1.0);
        assert_eq!(tree.predict(&[15.0, 0.0]), 1.0);
        assert!(importances[0] > 0.0);
        assert_eq!(importances[1], 0.0);
        // Perfect split at the root, both children pure
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 3);
        if let Node::Split { threshold, .. } = tree.nodes[0] {
            assert_eq!(threshold, 9.5);
        } else {
            panic!("root should split");
        }
    }

    #[test]
    fn test_respects_depth_and_leaf_limits() {
        let x: Vec<Vec<f64>> = (0..64).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..64).map(f64::from).collect();
        let indices: Vec<usize> = (0..64).collect();
        let mut importances = vec![0.0];
        let limits = TreeLimits {
            max_depth: 2,
            min_samples_split: 5,
            min_samples_leaf: 20,
        };

        let tree = RegressionTree::fit(&x, &y, &indices, limits, mean_of(&y), &mut importances);
        assert!(tree.depth() <= 2);
        // 64 samples with 20 per leaf allows at most 3 leaves
        let leaves = tree
            .nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count();
        assert!(leaves <= 3, "got {leaves} leaves");
    }

    #[test]
    fn test_constant_feature_gives_single_leaf() {
        let x: Vec<Vec<f64>> = vec![vec![1.0]; 10];
        let y: Vec<f64> = (0..10).map(f64::from).collect();
        let indices: Vec<usize> = (0..10).collect();
        let mut importances = vec![0.0];

        let tree = RegressionTree::fit(&x, &y, &indices, LIMITS, mean_of(&y), &mut importances);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[1.0]), 4.5);
    }

    #[test]
    fn test_serde_shape() {
        let tree = RegressionTree::from_nodes(vec![
            Node::Split {
                feature: 0,
                threshold: 0.5,
                left: 1,
                right: 2,
            },
            Node::Leaf { value: -1.0 },
            Node::Leaf { value: 1.0 },
        ]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["nodes"][0]["kind"], "split");
        assert_eq!(json["nodes"][2]["value"], 1.0);
        assert_eq!(tree.max_feature(), Some(0));
        assert!(tree.is_well_formed());
    }

    #[test]
    fn test_malformed_links_detected() {
        let split = |left, right| Node::Split {
            feature: 0,
            threshold: 0.5,
            left,
            right,
        };
        let leaf = Node::Leaf { value: 1.0 };

        // Self-loop, back edge to the root, child past the end
        assert!(!RegressionTree::from_nodes(vec![split(0, 1), leaf.clone()]).is_well_formed());
        let back_edge = vec![split(1, 2), split(0, 2), leaf.clone()];
        assert!(!RegressionTree::from_nodes(back_edge).is_well_formed());
        assert!(!RegressionTree::from_nodes(vec![split(1, 7), leaf.clone()]).is_well_formed());
        assert!(!RegressionTree::from_nodes(Vec::new()).is_well_formed());
        assert!(RegressionTree::from_nodes(vec![leaf]).is_well_formed());
    }
}
