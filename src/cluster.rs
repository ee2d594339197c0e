//! Agglomerative clustering with Ward linkage over a precomputed distance
//! matrix.
//!
//! Cluster distances are updated with the Lance-Williams recurrence
//!
//! ```text
//! d(k, i∪j) = sqrt(((n_i + n_k) d(k,i)² + (n_j + n_k) d(k,j)² - n_k d(i,j)²) / (n_i + n_j + n_k))
//! ```
//!
//! and candidate pairs live in a min-heap with lazy invalidation. Ties between
//! equal distances break on the lower slot pair, so the merge order is fully
//! determined by the input matrix.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;

use crate::dissimilarity::DissimilarityMatrix;
use crate::error::{Error, Result};

/// One agglomeration step, numbered like a SciPy linkage matrix: leaves are
/// `0..n`, the cluster created by merge `m` is `n + m`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    /// Number of leaves in the merged cluster.
    pub size: usize,
}

/// Partition of the instrument universe into labelled clusters.
///
/// Labels run `0..k` ordered by each cluster's lowest member index.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterAssignment {
    tickers: Vec<String>,
    labels: Vec<usize>,
    clusters: Vec<Vec<usize>>,
}

impl ClusterAssignment {
    /// Build from per-instrument labels in `0..k`.
    pub fn from_labels(tickers: Vec<String>, labels: Vec<usize>, k: usize) -> Self {
        let mut clusters = vec![Vec::new(); k];
        for (i, &label) in labels.iter().enumerate() {
            if let Some(members) = clusters.get_mut(label) {
                members.push(i);
            }
        }
        Self {
            tickers,
            labels,
            clusters,
        }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Cluster label of instrument `i`.
    pub fn label_of(&self, i: usize) -> usize {
        self.labels[i]
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Member indices of cluster `label`, ascending.
    pub fn members(&self, label: usize) -> &[usize] {
        &self.clusters[label]
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Member tickers of cluster `label`.
    pub fn member_tickers(&self, label: usize) -> Vec<&str> {
        self.clusters[label]
            .iter()
            .map(|&i| self.tickers[i].as_str())
            .collect()
    }

    /// Iterate `(label, members)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.clusters.iter().enumerate().map(|(l, m)| (l, m.as_slice()))
    }
}

#[derive(Debug)]
struct Candidate {
    distance: f64,
    lo: usize,
    hi: usize,
    lo_version: u32,
    hi_version: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so the max-heap pops the closest pair first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.lo.cmp(&self.lo))
            .then_with(|| other.hi.cmp(&self.hi))
    }
}

/// Ward-linkage clustering into a fixed number of clusters.
#[derive(Clone, Copy, Debug)]
pub struct ClusterEngine {
    pub cluster_count: usize,
}

impl ClusterEngine {
    pub fn new(cluster_count: usize) -> Self {
        Self { cluster_count }
    }

    /// Full merge history, `n - 1` steps, in merge order.
    pub fn linkage(&self, matrix: &DissimilarityMatrix) -> Vec<Merge> {
        let n = matrix.len();
        let mut dist: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| matrix.distance(i, j)).collect())
            .collect();
        let mut active = vec![true; n];
        let mut size = vec![1_usize; n];
        let mut version = vec![0_u32; n];
        let mut id: Vec<usize> = (0..n).collect();

        let mut heap = BinaryHeap::with_capacity(n * n / 2);
        for lo in 0..n {
            for hi in (lo + 1)..n {
                heap.push(Candidate {
                    distance: dist[lo][hi],
                    lo,
                    hi,
                    lo_version: 0,
                    hi_version: 0,
                });
            }
        }

        let mut merges = Vec::with_capacity(n.saturating_sub(1));
        while let Some(c) = heap.pop() {
            if !active[c.lo]
                || !active[c.hi]
                || version[c.lo] != c.lo_version
                || version[c.hi] != c.hi_version
            {
                continue;
            }

            let (a, b) = (c.lo, c.hi);
            let (na, nb) = (size[a] as f64, size[b] as f64);
            let dab2 = c.distance * c.distance;

            for k in (0..n).filter(|&k| active[k] && k != a && k != b) {
                let nk = size[k] as f64;
                let d2 = ((na + nk) * dist[a][k].powi(2) + (nb + nk) * dist[b][k].powi(2)
                    - nk * dab2)
                    / (na + nb + nk);
                let d = d2.max(0.0).sqrt();
                dist[a][k] = d;
                dist[k][a] = d;
            }

            merges.push(Merge {
                left: id[a].min(id[b]),
                right: id[a].max(id[b]),
                distance: c.distance,
                size: size[a] + size[b],
            });

            active[b] = false;
            size[a] += size[b];
            version[a] += 1;
            id[a] = n + merges.len() - 1;

            for k in (0..n).filter(|&k| active[k] && k != a) {
                let (lo, hi) = if a < k { (a, k) } else { (k, a) };
                heap.push(Candidate {
                    distance: dist[a][k],
                    lo,
                    hi,
                    lo_version: version[lo],
                    hi_version: version[hi],
                });
            }
        }

        merges
    }

    /// Cut the Ward dendrogram into exactly `cluster_count` clusters.
    pub fn fit(&self, matrix: &DissimilarityMatrix) -> Result<ClusterAssignment> {
        let n = matrix.len();
        let k = self.cluster_count;
        if k == 0 || k > n {
            return Err(Error::InvalidClusterCount {
                requested: k,
                instruments: n,
            });
        }

        let merges = self.linkage(matrix);

        // Replay the first n - k merges with union-find over cluster ids.
        let mut parent: Vec<usize> = (0..(2 * n).saturating_sub(1)).collect();
        for (m, merge) in merges.iter().take(n - k).enumerate() {
            parent[merge.left] = n + m;
            parent[merge.right] = n + m;
        }
        let root = |mut x: usize| {
            while parent[x] != x {
                x = parent[x];
            }
            x
        };

        // Label roots in order of their lowest leaf.
        let mut root_label: Vec<Option<usize>> = vec![None; parent.len()];
        let mut next = 0;
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let r = root(i);
            let label = *root_label[r].get_or_insert_with(|| {
                next += 1;
                next - 1
            });
            labels.push(label);
        }

        let assignment = ClusterAssignment::from_labels(matrix.tickers().to_vec(), labels, k);
        debug!(
            "ward clustering: {} instruments into {} clusters, sizes {:?}",
            n,
            k,
            assignment.iter().map(|(_, m)| m.len()).collect::<Vec<_>>()
        );
        Ok(assignment)
    }
}
