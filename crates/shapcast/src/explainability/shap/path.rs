//! Unique-feature path bookkeeping for TreeSHAP.
//!
//! Each element records one feature split on along the current root-to-node
//! path together with the fraction of "zero" paths (feature absent, cover
//! weighted) and "one" paths (feature present, follows the sample) that flow
//! through it. `pweight` holds the permutation weights for every coalition
//! size, updated incrementally as the path is extended and unwound.
//!
//! Segments for successive recursion depths are laid out back to back in one
//! buffer so that a child can copy its parent's path without allocating.

/// One element of the unique path.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathElement {
    /// Feature index, `None` for the root sentinel.
    pub feature: Option<u32>,
    pub zero_fraction: f64,
    pub one_fraction: f64,
    pub pweight: f64,
}

/// Scratch buffer holding the path segments of one tree traversal.
#[derive(Debug, Clone)]
pub struct PathState {
    elements: Vec<PathElement>,
}

impl PathState {
    /// Allocate room for trees up to `max_depth` nodes deep.
    pub fn new(max_depth: usize) -> Self {
        let d = max_depth + 2;
        Self {
            elements: vec![PathElement::default(); d * (d + 1) / 2 + 1],
        }
    }

    /// Start offset of the segment for a node at `unique_depth` whose parent
    /// segment starts at `parent_start`.
    #[inline]
    pub fn child_start(parent_start: usize, unique_depth: usize) -> usize {
        parent_start + unique_depth + 1
    }

    /// Copy the parent's segment (`unique_depth + 1` elements) to `start`.
    #[inline]
    pub fn copy_segment(&mut self, parent_start: usize, start: usize, unique_depth: usize) {
        self.elements
            .copy_within(parent_start..parent_start + unique_depth + 1, start);
    }

    /// Segment view starting at `start`.
    #[inline]
    pub fn segment(&self, start: usize) -> &[PathElement] {
        &self.elements[start..]
    }

    #[inline]
    pub fn segment_mut(&mut self, start: usize) -> &mut [PathElement] {
        &mut self.elements[start..]
    }
}

/// Append a feature to the path and update permutation weights.
pub fn extend_path(
    path: &mut [PathElement],
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<u32>,
) {
    path[unique_depth] = PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if unique_depth == 0 { 1.0 } else { 0.0 },
    };
    let denom = (unique_depth + 1) as f64;
    for i in (0..unique_depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (unique_depth - i) as f64 / denom;
    }
}

/// Remove the element at `path_index`, undoing its effect on the weights.
pub fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (unique_depth + 1) as f64;
    let mut next_one_portion = path[unique_depth].pweight;

    for i in (0..unique_depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                tmp - path[i].pweight * zero_fraction * (unique_depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (unique_depth - i) as f64);
        }
    }

    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

/// Total permutation weight of the path with `path_index` unwound, without
/// modifying the path.
pub fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (unique_depth + 1) as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion =
                path[i].pweight - tmp * zero_fraction * (unique_depth - i) as f64 / denom;
        } else if zero_fraction != 0.0 {
            total += path[i].pweight / zero_fraction / ((unique_depth - i) as f64 / denom);
        }
    }

    total
}
