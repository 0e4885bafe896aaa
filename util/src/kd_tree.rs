//! # KD-Tree Implementation
//!
//! A static 3D kd-tree over a point cloud, as described in [the wikipedia
//! article](https://en.wikipedia.org/wiki/K-d_tree). The tree is built once from a batch of
//! points and then queried, points cannot be inserted after construction.
//!
//! Points with any non-finite coordinate are dropped during the build, since depth sensors
//! report missing returns as NaN.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use nalgebra::Point3;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Default maximum number of points stored in a leaf
pub const DEFAULT_MAX_LEAF_SIZE: usize = 100;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// A kd-tree over 3D points.
#[derive(Clone, Debug)]
pub struct KdTree {
    /// All finite points the tree was built from
    points: Vec<Point3<f64>>,

    /// Root node, `None` if there are no points
    root: Option<Box<KdNode>>,
}

/// A point returned by a query along with its distance to the query point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbour {
    pub point: Point3<f64>,

    /// Units: meters
    pub dist_m: f64,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum KdNode {
    /// Indices into the tree's point list
    Leaf(Vec<usize>),

    Split {
        axis: usize,
        value: f64,

        /// Points with `p[axis] <= value`
        left: Box<KdNode>,

        /// Points with `p[axis] >= value`
        right: Box<KdNode>,
    },
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl KdTree {
    /// Build a tree from the given points using the default leaf size.
    pub fn build(points: &[Point3<f64>]) -> Self {
        Self::build_with_leaf_size(points, DEFAULT_MAX_LEAF_SIZE)
    }

    /// Build a tree from the given points, splitting nodes until they hold at most
    /// `max_leaf_size` points.
    pub fn build_with_leaf_size(points: &[Point3<f64>], max_leaf_size: usize) -> Self {
        let points: Vec<Point3<f64>> = points
            .iter()
            .filter(|p| p.iter().all(|c| c.is_finite()))
            .cloned()
            .collect();

        let root = if points.is_empty() {
            None
        } else {
            let indices = (0..points.len()).collect();
            Some(Box::new(build_node(&points, indices, max_leaf_size.max(1))))
        };

        Self { points, root }
    }

    /// Number of (finite) points in the tree
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Find the closest point to `query`.
    pub fn nearest(&self, query: &Point3<f64>) -> Option<Neighbour> {
        self.knn(query, 1).into_iter().next()
    }

    /// Find the `k` closest points to `query`, sorted by increasing distance.
    pub fn knn(&self, query: &Point3<f64>, k: usize) -> Vec<Neighbour> {
        let root = match (&self.root, k) {
            (Some(r), k) if k > 0 => r,
            _ => return Vec::new(),
        };

        // Max-heap on squared distance so the worst of the current best k is on top
        let mut heap: BinaryHeap<(OrderedFloat<f64>, usize)> = BinaryHeap::with_capacity(k + 1);
        self.knn_search(root, query, k, &mut heap);

        let mut found: Vec<Neighbour> = heap
            .into_iter()
            .map(|(d2, i)| Neighbour {
                point: self.points[i],
                dist_m: d2.0.sqrt(),
            })
            .collect();
        sort_by_dist(&mut found);
        found
    }

    /// Find all points within `radius_m` of `query`, sorted by increasing distance.
    pub fn within_radius(&self, query: &Point3<f64>, radius_m: f64) -> Vec<Neighbour> {
        let mut found = Vec::new();

        if let Some(ref root) = self.root {
            if radius_m >= 0.0 {
                self.radius_search(root, query, radius_m * radius_m, &mut found);
            }
        }

        sort_by_dist(&mut found);
        found
    }

    fn knn_search(
        &self,
        node: &KdNode,
        query: &Point3<f64>,
        k: usize,
        heap: &mut BinaryHeap<(OrderedFloat<f64>, usize)>,
    ) {
        match node {
            KdNode::Leaf(indices) => {
                for &i in indices {
                    let d2 = OrderedFloat((self.points[i] - query).norm_squared());
                    if heap.len() < k {
                        heap.push((d2, i));
                    } else if let Some(&(worst, _)) = heap.peek() {
                        if d2 < worst {
                            heap.pop();
                            heap.push((d2, i));
                        }
                    }
                }
            }
            KdNode::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[*axis] - value;
                let (near, far) = if diff < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };

                self.knn_search(near, query, k, heap);

                let visit_far = match heap.peek() {
                    Some(&(worst, _)) => heap.len() < k || diff * diff < worst.0,
                    None => true,
                };
                if visit_far {
                    self.knn_search(far, query, k, heap);
                }
            }
        }
    }

    fn radius_search(
        &self,
        node: &KdNode,
        query: &Point3<f64>,
        radius2: f64,
        found: &mut Vec<Neighbour>,
    ) {
        match node {
            KdNode::Leaf(indices) => {
                for &i in indices {
                    let d2 = (self.points[i] - query).norm_squared();
                    if d2 <= radius2 {
                        found.push(Neighbour {
                            point: self.points[i],
                            dist_m: d2.sqrt(),
                        });
                    }
                }
            }
            KdNode::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[*axis] - value;

                if diff <= 0.0 || diff * diff <= radius2 {
                    self.radius_search(left, query, radius2, found);
                }
                if diff >= 0.0 || diff * diff <= radius2 {
                    self.radius_search(right, query, radius2, found);
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn build_node(points: &[Point3<f64>], mut indices: Vec<usize>, max_leaf_size: usize) -> KdNode {
    if indices.len() <= max_leaf_size {
        return KdNode::Leaf(indices);
    }

    // Split along the axis with the largest spread
    let mut min = points[indices[0]];
    let mut max = min;
    for &i in indices.iter() {
        for a in 0..3 {
            min[a] = min[a].min(points[i][a]);
            max[a] = max[a].max(points[i][a]);
        }
    }
    let spread = max - min;
    let axis = spread.imax();

    // All points coincide, no split can separate them
    if spread[axis] <= 0.0 {
        return KdNode::Leaf(indices);
    }

    indices.sort_by_key(|&i| OrderedFloat(points[i][axis]));

    let mid = indices.len() / 2;
    let value = points[indices[mid]][axis];
    let right = indices.split_off(mid);

    KdNode::Split {
        axis,
        value,
        left: Box::new(build_node(points, indices, max_leaf_size)),
        right: Box::new(build_node(points, right, max_leaf_size)),
    }
}

fn sort_by_dist(found: &mut Vec<Neighbour>) {
    found.sort_by_key(|n| OrderedFloat(n.dist_m));
}
