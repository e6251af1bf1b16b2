//! A generic, level-parameterized k-d tree: complete-binary-array layout
//! (node `i`'s children live at `2i+1` and `2i+2`), built by recursively
//! partitioning on the median element at each level. Unlike a typical
//! fixed-metric k-d tree, the splitting dimension and the distance
//! function are both supplied by the caller as closures, since this tree
//! is reused for plain RGB nearest-neighbor as well as for the output
//! mapper's signed plane-distance pruning.

struct Node<V> {
    value: V,
    level: u32,
}

pub struct KdTree<V> {
    nodes: Vec<Option<Node<V>>>,
}

impl<V> KdTree<V> {
    pub fn is_empty(&self) -> bool {
        self.nodes.first().map(|n| n.is_none()).unwrap_or(true)
    }

    pub fn value(&self, index: usize) -> &V {
        &self.nodes[index].as_ref().expect("node index must be occupied").value
    }
}

fn ensure_len<V>(nodes: &mut Vec<Option<Node<V>>>, len: usize) {
    if nodes.len() < len {
        nodes.resize_with(len, || None);
    }
}

fn fill_node<T, V, C, A>(
    nodes: &mut Vec<Option<Node<V>>>,
    index: usize,
    values: &mut [T],
    level: u32,
    compare: &C,
    assign: &A,
) where
    C: Fn(&T, &T, u32) -> bool,
    A: Fn(&T) -> V,
{
    debug_assert!(!values.is_empty());

    values.sort_by(|a, b| {
        if compare(a, b, level) {
            std::cmp::Ordering::Less
        } else if compare(b, a, level) {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    });

    ensure_len(nodes, index + 1);

    let median = values.len() / 2;
    nodes[index] = Some(Node {
        value: assign(&values[median]),
        level,
    });

    let (left, rest) = values.split_at_mut(median);
    let right = &mut rest[1..];

    if !left.is_empty() {
        fill_node(nodes, 2 * index + 1, left, level + 1, compare, assign);
    }
    if !right.is_empty() {
        fill_node(nodes, 2 * index + 2, right, level + 1, compare, assign);
    }
}

/// Builds a tree over `values`, reordering the slice in place. `compare`
/// picks the splitting dimension from `level` (for RGB: `level % 3`).
/// `assign` converts a source element into the value stored at its node
/// (e.g. identity for `Color`, or "its index" for a palette k-d tree).
pub fn build<T, V, C, A>(values: &mut [T], compare: C, assign: A) -> KdTree<V>
where
    C: Fn(&T, &T, u32) -> bool,
    A: Fn(&T) -> V,
{
    let mut nodes = Vec::new();
    if !values.is_empty() {
        fill_node(&mut nodes, 0, values, 0, &compare, &assign);
    }
    KdTree { nodes }
}

fn find_nearest_node<V, Q, D, P>(
    tree: &KdTree<V>,
    query: &Q,
    index: usize,
    best_index: &mut usize,
    best_dist: &mut i64,
    dist_fn: &D,
    plane_dist_fn: &P,
) where
    D: Fn(&V, &Q) -> i64,
    P: Fn(&V, &Q, u32) -> i64,
{
    let node = match tree.nodes.get(index).and_then(|n| n.as_ref()) {
        Some(node) => node,
        None => return,
    };

    if index != 0 {
        let dist = dist_fn(&node.value, query);
        if dist < *best_dist {
            *best_dist = dist;
            *best_index = index;
        }
    }

    let plane_dist = plane_dist_fn(&node.value, query, node.level);

    let child0 = 2 * index + 1;
    let child1 = 2 * index + 2;
    let has_child0 = tree.nodes.get(child0).is_some_and(|n| n.is_some());
    let has_child1 = tree.nodes.get(child1).is_some_and(|n| n.is_some());

    if plane_dist >= 0 {
        if has_child1 {
            find_nearest_node(tree, query, child1, best_index, best_dist, dist_fn, plane_dist_fn);
        }
        if has_child0 && (plane_dist < *best_dist) {
            find_nearest_node(tree, query, child0, best_index, best_dist, dist_fn, plane_dist_fn);
        }
    } else {
        if has_child0 {
            find_nearest_node(tree, query, child0, best_index, best_dist, dist_fn, plane_dist_fn);
        }
        if has_child1 && ((-plane_dist) < *best_dist) {
            find_nearest_node(tree, query, child1, best_index, best_dist, dist_fn, plane_dist_fn);
        }
    }
}

/// Branch-and-bound nearest-neighbor descent. Returns the node index of
/// the nearest value, or `None` if the tree is empty.
pub fn find_nearest<V, Q, D, P>(
    tree: &KdTree<V>,
    query: &Q,
    dist_fn: D,
    plane_dist_fn: P,
) -> Option<usize>
where
    D: Fn(&V, &Q) -> i64,
    P: Fn(&V, &Q, u32) -> i64,
{
    if tree.is_empty() {
        return None;
    }

    let root = tree.nodes[0].as_ref().unwrap();
    let mut best_index = 0;
    let mut best_dist = dist_fn(&root.value, query);

    find_nearest_node(tree, query, 0, &mut best_index, &mut best_dist, &dist_fn, &plane_dist_fn);

    Some(best_index)
}
