// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: placement, removal, updates, traversal.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;
use core::ops::ControlFlow;

use crate::node::{Node, NodeId, NodeKind};
use crate::region;
use crate::slots::{CompactSlots, FullSlots, Slots};
use crate::types::{Axis, Locate, TreeError};

/// Maximum number of axes a tree can span.
///
/// Orthant indices are `u32` bit masks, one bit per axis.
pub const MAX_DIMENSIONS: usize = 31;

/// Starting load, and the floor the load decays back to.
const DEFAULT_LOAD: usize = 2;

#[allow(
    clippy::cast_possible_truncation,
    reason = "the exponent is an axis count, at most MAX_DIMENSIONS"
)]
fn powered(base: usize, exponent: usize) -> usize {
    base.saturating_pow(exponent as u32)
}

/// An adaptive orthant tree over point-located items, generic over the
/// child-slot storage strategy.
///
/// The tree spans a fixed box given at construction and partitions it
/// recursively into `2^axes` orthants around the per-axis midpoints.
/// Leaves split into branches when their population reaches the adaptive
/// load (`count^(1/axes)`, tracked through cached integer powers), and
/// branches merge back into leaves when removal drains them below it.
///
/// Items are owned by the tree and positioned through the locator given
/// at construction. When item positions change behind the tree's back,
/// call [`update`](TreeGeneric::update) (or the region-scoped
/// [`update_region`](TreeGeneric::update_region)) to re-home them.
pub struct TreeGeneric<T: Axis, I, L: Locate<T, I>, S: Slots> {
    nodes: Vec<Option<Node<T, I, S>>>, // slots
    free_list: Vec<usize>,
    root: NodeId,
    count: usize,
    dimensions: usize,
    locator: L,
    load: usize,
    load_powered: usize,          // load ^ axes
    load_plus_one_powered: usize, // (load + 1) ^ axes
    last_insert: NodeId,          // leaf of the previous placement
    last_depth: usize,            // its depth, for the sequential fast path
    out_of_bounds: Option<Box<dyn FnMut(I)>>,
}

/// Adaptive orthant tree with compact child storage. Safe at any axis
/// count; the default choice.
pub type Tree<T, I, L> = TreeGeneric<T, I, L, CompactSlots>;

/// Adaptive orthant tree with fully allocated child arrays. Faster child
/// addressing, but every branch carries `2^axes` slots; prefer it up to
/// roughly eight axes.
pub type FullTree<T, I, L> = TreeGeneric<T, I, L, FullSlots>;

impl<T: Axis, I, L: Locate<T, I>, S: Slots> Debug for TreeGeneric<T, I, L, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("TreeGeneric")
            .field("count", &self.count)
            .field("dimensions", &self.dimensions)
            .field("load", &self.load)
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

impl<T: Axis, I, L: Locate<T, I>, S: Slots> TreeGeneric<T, I, L, S> {
    /// Create an empty tree spanning `[min, max]`.
    ///
    /// `min` and `max` carry one value per axis and fix the dimension
    /// count. Fails with [`TreeError::InvalidBounds`] when the axis count
    /// is zero or above [`MAX_DIMENSIONS`], the slices disagree in
    /// length, any `min[i]` is not below `max[i]`, or the axis midpoint
    /// does not fall strictly between them.
    pub fn new(min: &[T], max: &[T], locator: L) -> Result<Self, TreeError> {
        let dimensions = min.len();
        if dimensions == 0 || dimensions > MAX_DIMENSIONS || max.len() != dimensions {
            return Err(TreeError::InvalidBounds);
        }
        for i in 0..dimensions {
            if T::order(min[i], max[i]) != Ordering::Less {
                return Err(TreeError::InvalidBounds);
            }
            let mid = T::midpoint(min[i], max[i]);
            if T::order(min[i], mid) != Ordering::Less || T::order(mid, max[i]) != Ordering::Less {
                return Err(TreeError::InvalidBounds);
            }
        }
        let mut tree = Self {
            nodes: alloc::vec![Some(Node::leaf(min.into(), max.into(), None, 0))],
            free_list: Vec::new(),
            root: NodeId::new(0),
            count: 0,
            dimensions,
            locator,
            load: DEFAULT_LOAD,
            load_powered: 0,
            load_plus_one_powered: 0,
            last_insert: NodeId::new(0),
            last_depth: 0,
            out_of_bounds: None,
        };
        tree.refresh_load_powers();
        Ok(tree)
    }

    /// Number of items currently in the tree.
    pub fn count(&self) -> usize {
        self.count
    }

    /// True when the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of axes the tree spans.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Current adaptive load: the leaf split threshold and recursion
    /// depth cap.
    pub fn load(&self) -> usize {
        self.load
    }

    /// Per-axis lower bound of the tree.
    pub fn min(&self) -> &[T] {
        &self.node(self.root).min
    }

    /// Per-axis upper bound of the tree.
    pub fn max(&self) -> &[T] {
        &self.node(self.root).max
    }

    /// Per-axis midpoint of the tree bounds.
    pub fn origin(&self) -> Vec<T> {
        let root = self.node(self.root);
        root.min
            .iter()
            .zip(root.max.iter())
            .map(|(&lo, &hi)| T::midpoint(lo, hi))
            .collect()
    }

    /// Register a handler that receives items whose location falls
    /// outside the tree bounds during [`add`](Self::add),
    /// [`update`](Self::update), or internal redistribution.
    ///
    /// Without a handler those operations report
    /// [`TreeError::OutOfBounds`] instead, and any item the tree already
    /// owned on that path is dropped.
    pub fn on_out_of_bounds(&mut self, handler: impl FnMut(I) + 'static) {
        self.out_of_bounds = Some(Box::new(handler));
    }

    // --- insertion ---

    /// Add an item to the tree.
    ///
    /// The item's location must fall inside the tree bounds; otherwise it
    /// is passed to the out-of-bounds handler (and the call succeeds with
    /// the count unchanged), or the call fails with
    /// [`TreeError::OutOfBounds`] when no handler is registered.
    ///
    /// A returned error does not always mean nothing changed: when a leaf
    /// split has to redistribute stored items and one of them can no
    /// longer be placed (its backing location moved without an
    /// [`update`](Self::update)), the new item is still added and the
    /// failure of the evicted item is reported here.
    pub fn add(&mut self, item: I) -> Result<(), TreeError> {
        if self.count == usize::MAX {
            return Err(TreeError::CapacityExceeded);
        }
        if self.load_plus_one_powered < self.count {
            self.load += 1;
            self.refresh_load_powers();
        }
        let point = self.locate_point(&item)?;
        let inside = {
            let root = self.node(self.root);
            region::encloses_point(&root.min, &root.max, &point)
        };
        if !inside {
            return self.stray(item);
        }
        let (start, depth) = self.insertion_start(&point);
        let outcome = self.place(item, start, &point, depth);
        self.bump_ancestors(start);
        self.count += 1;
        outcome
    }

    /// Pick where placement starts: the leaf of the previous placement
    /// when it still encloses the point, the root otherwise. The cache is
    /// only ever a hint; a miss costs a walk from the root.
    fn insertion_start(&self, point: &[T]) -> (NodeId, usize) {
        if let Some(Some(node)) = self.nodes.get(self.last_insert.idx())
            && node.is_leaf()
            && region::encloses_point(&node.min, &node.max, point)
        {
            (self.last_insert, self.last_depth)
        } else {
            (self.root, 0)
        }
    }

    /// Recursive placement of one item at `at`, which must enclose
    /// `point`.
    ///
    /// Increments the count of `at` and of every node below it on the
    /// placement path; ancestors above `at` are the caller's
    /// responsibility. The item always ends up stored (or handed to the
    /// out-of-bounds policy); an `Err` only reports failures of items
    /// displaced along the way.
    fn place(&mut self, item: I, at: NodeId, point: &[T], depth: usize) -> Result<(), TreeError> {
        enum Step {
            Append,
            Split,
            Descend(u32),
        }
        let step = {
            let node = self.node(at);
            match &node.kind {
                // The depth cap trumps the load cap: a leaf at maximum
                // depth absorbs items past the load rather than recursing
                // further.
                NodeKind::Leaf(items) => {
                    if depth >= self.load || items.len() < self.load {
                        Step::Append
                    } else {
                        Step::Split
                    }
                }
                NodeKind::Branch(_) => {
                    Step::Descend(region::orthant_of_point(&node.min, &node.max, point))
                }
            }
        };
        match step {
            Step::Append => {
                let node = self.node_mut(at);
                if let NodeKind::Leaf(items) = &mut node.kind {
                    items.push(item);
                }
                node.count += 1;
                self.last_insert = at;
                self.last_depth = depth;
                Ok(())
            }
            Step::Split => {
                // The branch takes over the leaf's box and slot, so the
                // depth does not change for the retry.
                let deferred = self.promote(at, depth);
                let placed = self.place(item, at, point, depth);
                deferred.and(placed)
            }
            Step::Descend(orthant) => {
                let child = match &self.node(at).kind {
                    NodeKind::Branch(slots) => slots.get(orthant),
                    NodeKind::Leaf(_) => None,
                };
                let outcome = match child {
                    Some(child) => self.place(item, child, point, depth + 1),
                    None => {
                        // vacant orthants are just leaves not grown yet
                        let leaf = self.grow_leaf(at, orthant);
                        let node = self.node_mut(leaf);
                        if let NodeKind::Leaf(items) = &mut node.kind {
                            items.push(item);
                        }
                        node.count += 1;
                        self.last_insert = leaf;
                        self.last_depth = depth + 1;
                        Ok(())
                    }
                };
                self.node_mut(at).count += 1;
                outcome
            }
        }
    }

    /// Convert a full leaf into a branch in place and redistribute its
    /// items one level down.
    ///
    /// Redistribution never aborts: an item whose location escaped the
    /// leaf's box is re-homed through the enclosing ancestor, and an item
    /// that cannot be located or re-homed at all goes through the
    /// out-of-bounds policy. The first such failure is reported after the
    /// whole redistribution has run.
    fn promote(&mut self, at: NodeId, depth: usize) -> Result<(), TreeError> {
        let items = {
            let node = self.node_mut(at);
            match &mut node.kind {
                NodeKind::Leaf(items) => core::mem::take(items),
                NodeKind::Branch(_) => return Ok(()),
            }
        };
        let total = 1usize << self.dimensions;
        {
            let node = self.node_mut(at);
            node.kind = NodeKind::Branch(S::with_capacity(total));
            node.count = 0;
        }
        let mut deferred = Ok(());
        for item in items {
            let outcome = match self.locate_point(&item) {
                Ok(point) => {
                    let fits = {
                        let node = self.node(at);
                        region::encloses_point(&node.min, &node.max, &point)
                    };
                    if fits {
                        self.place(item, at, &point, depth)
                    } else {
                        self.rehome_upward(item, at, &point, depth)
                    }
                }
                Err(err) => self.drop_from(item, at).and(Err(err)),
            };
            if deferred.is_ok()
                && let Err(err) = outcome
            {
                deferred = Err(err);
            }
        }
        deferred
    }

    /// Grow a fresh leaf in the vacant `orthant` of `branch`.
    fn grow_leaf(&mut self, branch: NodeId, orthant: u32) -> NodeId {
        let (min, max) = {
            let node = self.node(branch);
            region::orthant_bounds(&node.min, &node.max, orthant)
        };
        let leaf = self.alloc(Node::leaf(min, max, Some(branch), orthant));
        if let NodeKind::Branch(slots) = &mut self.node_mut(branch).kind {
            slots.set(orthant, leaf);
        }
        leaf
    }

    /// Walk up from `from` to the lowest ancestor enclosing `point`,
    /// decrementing each visited count, and place the item from there.
    /// The enclosing ancestor is decremented too; placement restores it.
    /// With no enclosing ancestor the item leaves the tree through the
    /// out-of-bounds policy.
    fn rehome_upward(
        &mut self,
        item: I,
        from: NodeId,
        point: &[T],
        depth: usize,
    ) -> Result<(), TreeError> {
        let mut cursor = self.node(from).parent;
        let mut level = depth;
        while let Some(ancestor) = cursor {
            level -= 1;
            self.node_mut(ancestor).count -= 1;
            let node = self.node(ancestor);
            if region::encloses_point(&node.min, &node.max, point) {
                return self.place(item, ancestor, point, level);
            }
            cursor = node.parent;
        }
        self.count -= 1;
        self.stray(item)
    }

    /// Remove an item's presence from every count above `from` and hand
    /// it to the out-of-bounds policy. Used when an item cannot be
    /// located at all.
    fn drop_from(&mut self, item: I, from: NodeId) -> Result<(), TreeError> {
        let mut cursor = self.node(from).parent;
        while let Some(ancestor) = cursor {
            self.node_mut(ancestor).count -= 1;
            cursor = self.node(ancestor).parent;
        }
        self.count -= 1;
        self.stray(item)
    }

    /// Hand an item to the out-of-bounds handler, or fail (dropping the
    /// item) when none is registered.
    fn stray(&mut self, item: I) -> Result<(), TreeError> {
        match &mut self.out_of_bounds {
            Some(handler) => {
                handler(item);
                Ok(())
            }
            None => Err(TreeError::OutOfBounds),
        }
    }

    fn bump_ancestors(&mut self, from: NodeId) {
        let mut cursor = self.node(from).parent;
        while let Some(ancestor) = cursor {
            self.node_mut(ancestor).count += 1;
            cursor = self.node(ancestor).parent;
        }
    }

    // --- removal ---

    /// Remove every item matching `pred`. Returns the number removed;
    /// zero matches is a normal outcome.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&I) -> bool) -> Result<usize, TreeError> {
        let swept = self.sweep(self.root, None, Some(&mut pred));
        self.settle_after_removal();
        swept
    }

    /// Remove every item located inside `[min, max]` (boundary
    /// inclusive). Returns the number removed.
    pub fn remove_region(&mut self, min: &[T], max: &[T]) -> Result<usize, TreeError> {
        self.check_region(min, max)?;
        let swept = self.sweep(self.root, Some((min, max)), None);
        self.settle_after_removal();
        swept
    }

    /// Remove every item located inside `[min, max]` that also matches
    /// `pred`. Returns the number removed.
    pub fn remove_region_where(
        &mut self,
        min: &[T],
        max: &[T],
        mut pred: impl FnMut(&I) -> bool,
    ) -> Result<usize, TreeError> {
        self.check_region(min, max)?;
        let swept = self.sweep(self.root, Some((min, max)), Some(&mut pred));
        self.settle_after_removal();
        swept
    }

    /// Remove one occurrence equal to `item`, located through the
    /// tree's locator. Fails with [`TreeError::ItemNotFound`] when
    /// nothing at that point compares equal.
    pub fn remove_item(&mut self, item: &I) -> Result<(), TreeError>
    where
        I: PartialEq,
    {
        self.remove_item_by(item, |stored, target| stored == target)
    }

    /// Remove one occurrence matching `item` under a caller-supplied
    /// equality. Exactly one item is removed even when several at the
    /// same location match.
    pub fn remove_item_by(
        &mut self,
        item: &I,
        mut eq: impl FnMut(&I, &I) -> bool,
    ) -> Result<(), TreeError> {
        let point = self.locate_point(item)?;
        let mut done = false;
        let mut pred = |stored: &I| {
            if !done && eq(stored, item) {
                done = true;
                true
            } else {
                false
            }
        };
        let swept = self.sweep(self.root, Some((&point, &point)), Some(&mut pred));
        self.settle_after_removal();
        if swept? == 0 {
            return Err(TreeError::ItemNotFound);
        }
        Ok(())
    }

    /// Recursive removal sweep. `region` restricts matches to a box,
    /// `pred` to a predicate; with both, items must satisfy both.
    /// Returns how many items were removed below (and at) `at`.
    fn sweep(
        &mut self,
        at: NodeId,
        region: Option<(&[T], &[T])>,
        mut pred: Option<&mut dyn FnMut(&I) -> bool>,
    ) -> Result<usize, TreeError> {
        if self.node(at).is_leaf() {
            return self.sweep_leaf(at, region, pred);
        }
        let children: Vec<NodeId> = match &self.node(at).kind {
            NodeKind::Branch(slots) => slots.iter().collect(),
            NodeKind::Leaf(_) => Vec::new(),
        };
        let mut removed = 0;
        let mut failure = None;
        for child in children {
            if let Some((rmin, rmax)) = region {
                let (overlap, swallowed) = {
                    let node = self.node(child);
                    (
                        region::overlaps(&node.min, &node.max, rmin, rmax),
                        region::encloses_region(rmin, rmax, &node.min, &node.max),
                    )
                };
                if !overlap {
                    continue;
                }
                if swallowed && pred.is_none() {
                    // the region swallows the whole child: account for
                    // its subtree without descending
                    let subtree = self.node(child).count;
                    removed += subtree;
                    self.count -= subtree;
                    self.chop_child(at, child);
                    continue;
                }
            }
            let reborrowed: Option<&mut dyn FnMut(&I) -> bool> = match &mut pred {
                Some(p) => Some(&mut **p),
                None => None,
            };
            match self.sweep(child, region, reborrowed) {
                Ok(n) => removed += n,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
            if self.node(child).count == 0 {
                self.chop_child(at, child);
            }
        }
        self.node_mut(at).count -= removed;
        if let Some(err) = failure {
            return Err(err);
        }
        let population = self.node(at).count;
        if population > 0 && population < self.load {
            self.shrink(at);
        }
        Ok(removed)
    }

    /// Splice matching items out of a leaf. Locations are resolved for
    /// the whole leaf before anything is moved, so a locator failure
    /// leaves the leaf untouched.
    fn sweep_leaf(
        &mut self,
        at: NodeId,
        region: Option<(&[T], &[T])>,
        mut pred: Option<&mut dyn FnMut(&I) -> bool>,
    ) -> Result<usize, TreeError> {
        let doomed: Vec<usize> = {
            let node = self.node(at);
            let NodeKind::Leaf(items) = &node.kind else {
                return Ok(0);
            };
            let mut doomed = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let in_region = match region {
                    Some((rmin, rmax)) => {
                        let point = self.locate_point(item)?;
                        region::encloses_point(rmin, rmax, &point)
                    }
                    None => true,
                };
                let matched = match &mut pred {
                    Some(p) => in_region && p(item),
                    None => in_region,
                };
                if matched {
                    doomed.push(i);
                }
            }
            doomed
        };
        if doomed.is_empty() {
            return Ok(0);
        }
        let removed = doomed.len();
        {
            let node = self.node_mut(at);
            let NodeKind::Leaf(items) = &mut node.kind else {
                return Ok(0);
            };
            let old = core::mem::take(items);
            let mut doomed_iter = doomed.into_iter().peekable();
            for (i, item) in old.into_iter().enumerate() {
                if doomed_iter.peek() == Some(&i) {
                    doomed_iter.next();
                    continue;
                }
                items.push(item);
            }
            node.count -= removed;
        }
        self.count -= removed;
        Ok(removed)
    }

    /// Unlink `child` from `branch` and free its whole subtree.
    fn chop_child(&mut self, branch: NodeId, child: NodeId) {
        let slot = self.node(child).slot;
        if let NodeKind::Branch(slots) = &mut self.node_mut(branch).kind {
            slots.chop(slot);
        }
        self.free_subtree(child);
    }

    /// Demote an under-populated branch back into a leaf holding every
    /// surviving descendant item.
    ///
    /// The survivors number fewer than the load, so placement from this
    /// node would append each of them right here; they are stored
    /// directly. Counts above this node never change: the items never
    /// left its subtree.
    fn shrink(&mut self, at: NodeId) {
        let mut survivors = Vec::new();
        self.drain_subtree(at, &mut survivors);
        let node = self.node_mut(at);
        node.count = survivors.len();
        node.kind = NodeKind::Leaf(survivors);
    }

    /// Downward load recomputation and cache reset shared by every
    /// public removal entry point.
    fn settle_after_removal(&mut self) {
        while self.load_powered > self.count && self.load > DEFAULT_LOAD {
            self.load -= 1;
            self.refresh_load_powers();
        }
        self.last_insert = self.root;
        self.last_depth = 0;
    }

    // --- update ---

    /// Re-home every item whose backing location no longer matches its
    /// leaf.
    ///
    /// Items that moved within the tree bounds are re-placed from the
    /// lowest enclosing ancestor; items that left the bounds go through
    /// the out-of-bounds policy and the count drops accordingly. Emptied
    /// branches are chopped and under-populated branches shrink, as in
    /// removal.
    pub fn update(&mut self) -> Result<(), TreeError> {
        let outcome = self.revalidate(self.root, 0, None);
        self.last_insert = self.root;
        self.last_depth = 0;
        outcome
    }

    /// [`update`](Self::update) restricted to subtrees overlapping
    /// `[min, max]`.
    pub fn update_region(&mut self, min: &[T], max: &[T]) -> Result<(), TreeError> {
        self.check_region(min, max)?;
        let outcome = self.revalidate(self.root, 0, Some((min, max)));
        self.last_insert = self.root;
        self.last_depth = 0;
        outcome
    }

    fn revalidate(
        &mut self,
        at: NodeId,
        depth: usize,
        region: Option<(&[T], &[T])>,
    ) -> Result<(), TreeError> {
        if self.node(at).is_leaf() {
            return self.revalidate_leaf(at, depth);
        }
        let children: Vec<NodeId> = match &self.node(at).kind {
            NodeKind::Branch(slots) => slots.iter().collect(),
            NodeKind::Leaf(_) => Vec::new(),
        };
        let mut failure = Ok(());
        for child in children {
            if let Some((rmin, rmax)) = region {
                let node = self.node(child);
                if !region::overlaps(&node.min, &node.max, rmin, rmax) {
                    continue;
                }
            }
            let outcome = self.revalidate(child, depth + 1, region);
            if failure.is_ok()
                && let Err(err) = outcome
            {
                failure = Err(err);
            }
            if self.node(child).count == 0 {
                self.chop_child(at, child);
            }
        }
        failure?;
        let population = self.node(at).count;
        if population > 0 && population < self.load {
            self.shrink(at);
        }
        Ok(())
    }

    /// Check each item of a leaf against the leaf's own box, pulling out
    /// the ones that moved. Eviction swaps from the back, so the swapped
    /// item is examined next before the index advances.
    fn revalidate_leaf(&mut self, at: NodeId, depth: usize) -> Result<(), TreeError> {
        let mut failure = Ok(());
        let mut i = 0;
        loop {
            let escaped = {
                let node = self.node(at);
                let NodeKind::Leaf(items) = &node.kind else {
                    break;
                };
                if i >= items.len() {
                    break;
                }
                match self.locate_point(&items[i]) {
                    Ok(point) => {
                        if region::encloses_point(&node.min, &node.max, &point) {
                            None
                        } else {
                            Some(point)
                        }
                    }
                    Err(err) => return failure.and(Err(err)),
                }
            };
            let Some(point) = escaped else {
                i += 1;
                continue;
            };
            let item = {
                let node = self.node_mut(at);
                let NodeKind::Leaf(items) = &mut node.kind else {
                    break;
                };
                let item = items.swap_remove(i);
                node.count -= 1;
                item
            };
            let outcome = self.rehome_upward(item, at, &point, depth);
            if failure.is_ok()
                && let Err(err) = outcome
            {
                failure = Err(err);
            }
        }
        failure
    }

    // --- traversal ---

    /// Visit every item.
    pub fn for_each(&self, mut f: impl FnMut(&I)) {
        self.visit(self.root, &mut f);
    }

    /// Visit every item mutably. Callers changing coordinates this way
    /// must follow up with [`update`](Self::update).
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut I)) {
        self.visit_mut(self.root, &mut f);
    }

    /// Visit items until the visitor breaks.
    pub fn try_for_each(&self, mut f: impl FnMut(&I) -> ControlFlow<()>) -> ControlFlow<()> {
        self.try_visit(self.root, &mut f)
    }

    /// Visit items mutably until the visitor breaks.
    pub fn try_for_each_mut(
        &mut self,
        mut f: impl FnMut(&mut I) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        self.try_visit_mut(self.root, &mut f)
    }

    /// Visit every item located inside `[min, max]`.
    pub fn for_each_in(
        &self,
        min: &[T],
        max: &[T],
        mut f: impl FnMut(&I),
    ) -> Result<(), TreeError> {
        self.check_region(min, max)?;
        self.visit_in(self.root, min, max, &mut f)
    }

    /// Visit every item located inside `[min, max]` mutably.
    pub fn for_each_in_mut(
        &mut self,
        min: &[T],
        max: &[T],
        mut f: impl FnMut(&mut I),
    ) -> Result<(), TreeError> {
        self.check_region(min, max)?;
        self.visit_in_mut(self.root, min, max, &mut f)
    }

    /// Visit items located inside `[min, max]` until the visitor breaks.
    pub fn try_for_each_in(
        &self,
        min: &[T],
        max: &[T],
        mut f: impl FnMut(&I) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>, TreeError> {
        self.check_region(min, max)?;
        self.try_visit_in(self.root, min, max, &mut f)
    }

    /// Visit items located inside `[min, max]` mutably until the visitor
    /// breaks.
    pub fn try_for_each_in_mut(
        &mut self,
        min: &[T],
        max: &[T],
        mut f: impl FnMut(&mut I) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>, TreeError> {
        self.check_region(min, max)?;
        self.try_visit_in_mut(self.root, min, max, &mut f)
    }

    /// Collect every item into a vector, in traversal order.
    pub fn to_vec(&self) -> Vec<I>
    where
        I: Clone,
    {
        let mut out = Vec::with_capacity(self.count);
        self.for_each(|item| out.push(item.clone()));
        out
    }

    /// Drop every item and reset to a single empty leaf spanning the
    /// original bounds, with the load back at its floor.
    pub fn clear(&mut self) {
        let (min, max) = {
            let root = self.node(self.root);
            (root.min.clone(), root.max.clone())
        };
        self.nodes.clear();
        self.free_list.clear();
        self.nodes.push(Some(Node::leaf(min, max, None, 0)));
        self.root = NodeId::new(0);
        self.count = 0;
        self.load = DEFAULT_LOAD;
        self.refresh_load_powers();
        self.last_insert = self.root;
        self.last_depth = 0;
    }

    fn visit(&self, at: NodeId, f: &mut dyn FnMut(&I)) {
        match &self.node(at).kind {
            NodeKind::Leaf(items) => {
                for item in items {
                    f(item);
                }
            }
            NodeKind::Branch(slots) => {
                for child in slots.iter() {
                    self.visit(child, f);
                }
            }
        }
    }

    fn visit_mut(&mut self, at: NodeId, f: &mut dyn FnMut(&mut I)) {
        let children: Vec<NodeId> = match &mut self.node_mut(at).kind {
            NodeKind::Leaf(items) => {
                for item in items {
                    f(item);
                }
                return;
            }
            NodeKind::Branch(slots) => slots.iter().collect(),
        };
        for child in children {
            self.visit_mut(child, f);
        }
    }

    fn try_visit(&self, at: NodeId, f: &mut dyn FnMut(&I) -> ControlFlow<()>) -> ControlFlow<()> {
        match &self.node(at).kind {
            NodeKind::Leaf(items) => {
                for item in items {
                    if f(item).is_break() {
                        return ControlFlow::Break(());
                    }
                }
            }
            NodeKind::Branch(slots) => {
                for child in slots.iter() {
                    if self.try_visit(child, f).is_break() {
                        return ControlFlow::Break(());
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn try_visit_mut(
        &mut self,
        at: NodeId,
        f: &mut dyn FnMut(&mut I) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let children: Vec<NodeId> = match &mut self.node_mut(at).kind {
            NodeKind::Leaf(items) => {
                for item in items {
                    if f(item).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                return ControlFlow::Continue(());
            }
            NodeKind::Branch(slots) => slots.iter().collect(),
        };
        for child in children {
            if self.try_visit_mut(child, f).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn visit_in(
        &self,
        at: NodeId,
        rmin: &[T],
        rmax: &[T],
        f: &mut dyn FnMut(&I),
    ) -> Result<(), TreeError> {
        match &self.node(at).kind {
            NodeKind::Leaf(items) => {
                for item in items {
                    let point = self.locate_point(item)?;
                    if region::encloses_point(rmin, rmax, &point) {
                        f(item);
                    }
                }
            }
            NodeKind::Branch(slots) => {
                for child in slots.iter() {
                    let node = self.node(child);
                    if region::overlaps(&node.min, &node.max, rmin, rmax) {
                        self.visit_in(child, rmin, rmax, f)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn visit_in_mut(
        &mut self,
        at: NodeId,
        rmin: &[T],
        rmax: &[T],
        f: &mut dyn FnMut(&mut I),
    ) -> Result<(), TreeError> {
        let dimensions = self.dimensions;
        let children: Vec<NodeId> = {
            let node = self.nodes[at.idx()].as_mut().expect("dangling NodeId");
            match &mut node.kind {
                NodeKind::Leaf(items) => {
                    let locator = &self.locator;
                    let mut point = alloc::vec![T::zero(); dimensions];
                    for item in items.iter_mut() {
                        locator.locate(item, &mut point);
                        if point.iter().any(|&c| !T::finite(c)) {
                            return Err(TreeError::InvalidLocation);
                        }
                        if region::encloses_point(rmin, rmax, &point) {
                            f(item);
                        }
                    }
                    return Ok(());
                }
                NodeKind::Branch(slots) => slots.iter().collect(),
            }
        };
        for child in children {
            let overlap = {
                let node = self.node(child);
                region::overlaps(&node.min, &node.max, rmin, rmax)
            };
            if overlap {
                self.visit_in_mut(child, rmin, rmax, f)?;
            }
        }
        Ok(())
    }

    fn try_visit_in(
        &self,
        at: NodeId,
        rmin: &[T],
        rmax: &[T],
        f: &mut dyn FnMut(&I) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>, TreeError> {
        match &self.node(at).kind {
            NodeKind::Leaf(items) => {
                for item in items {
                    let point = self.locate_point(item)?;
                    if region::encloses_point(rmin, rmax, &point) && f(item).is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
            NodeKind::Branch(slots) => {
                for child in slots.iter() {
                    let node = self.node(child);
                    if region::overlaps(&node.min, &node.max, rmin, rmax)
                        && self.try_visit_in(child, rmin, rmax, f)?.is_break()
                    {
                        return Ok(ControlFlow::Break(()));
                    }
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn try_visit_in_mut(
        &mut self,
        at: NodeId,
        rmin: &[T],
        rmax: &[T],
        f: &mut dyn FnMut(&mut I) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>, TreeError> {
        let dimensions = self.dimensions;
        let children: Vec<NodeId> = {
            let node = self.nodes[at.idx()].as_mut().expect("dangling NodeId");
            match &mut node.kind {
                NodeKind::Leaf(items) => {
                    let locator = &self.locator;
                    let mut point = alloc::vec![T::zero(); dimensions];
                    for item in items.iter_mut() {
                        locator.locate(item, &mut point);
                        if point.iter().any(|&c| !T::finite(c)) {
                            return Err(TreeError::InvalidLocation);
                        }
                        if region::encloses_point(rmin, rmax, &point) && f(item).is_break() {
                            return Ok(ControlFlow::Break(()));
                        }
                    }
                    return Ok(ControlFlow::Continue(()));
                }
                NodeKind::Branch(slots) => slots.iter().collect(),
            }
        };
        for child in children {
            let overlap = {
                let node = self.node(child);
                region::overlaps(&node.min, &node.max, rmin, rmax)
            };
            if overlap && self.try_visit_in_mut(child, rmin, rmax, f)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    // --- internals ---

    fn node(&self, id: NodeId) -> &Node<T, I, S> {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T, I, S> {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    fn alloc(&mut self, node: Node<T, I, S>) -> NodeId {
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx] = Some(node);
            NodeId::new(idx)
        } else {
            self.nodes.push(Some(node));
            NodeId::new(self.nodes.len() - 1)
        }
    }

    fn free(&mut self, id: NodeId) {
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Free `at` and everything below it, dropping stored items.
    fn free_subtree(&mut self, at: NodeId) {
        if let NodeKind::Branch(slots) = &self.node(at).kind {
            let children: Vec<NodeId> = slots.iter().collect();
            for child in children {
                self.free_subtree(child);
            }
        }
        self.free(at);
    }

    /// Move every item below `at` into `out`, freeing the descendants.
    /// `at` itself stays allocated, left as an empty leaf.
    fn drain_subtree(&mut self, at: NodeId, out: &mut Vec<I>) {
        let kind = core::mem::replace(&mut self.node_mut(at).kind, NodeKind::Leaf(Vec::new()));
        match kind {
            NodeKind::Leaf(mut items) => out.append(&mut items),
            NodeKind::Branch(slots) => {
                let children: Vec<NodeId> = slots.iter().collect();
                for child in children {
                    self.drain_subtree(child, out);
                    self.free(child);
                }
            }
        }
    }

    fn locate_point(&self, item: &I) -> Result<Vec<T>, TreeError> {
        let mut point = alloc::vec![T::zero(); self.dimensions];
        self.locator.locate(item, &mut point);
        if point.iter().any(|&c| !T::finite(c)) {
            return Err(TreeError::InvalidLocation);
        }
        Ok(point)
    }

    fn check_region(&self, min: &[T], max: &[T]) -> Result<(), TreeError> {
        if min.len() != self.dimensions || max.len() != self.dimensions {
            return Err(TreeError::InvalidBounds);
        }
        Ok(())
    }

    fn refresh_load_powers(&mut self) {
        self.load_powered = powered(self.load, self.dimensions);
        self.load_plus_one_powered = powered(self.load + 1, self.dimensions);
    }
}

impl<T: Axis, I: Clone, L: Locate<T, I> + Clone, S: Slots> Clone for TreeGeneric<T, I, L, S> {
    /// Build an empty tree with the same configuration and replay every
    /// item through the normal placement path. The clone starts with no
    /// out-of-bounds handler.
    fn clone(&self) -> Self {
        let mut clone = {
            let root = self.node(self.root);
            Self::new(&root.min, &root.max, self.locator.clone())
                .expect("bounds were validated at construction")
        };
        self.for_each(|item| {
            let _ = clone.add(item.clone());
        });
        clone
    }
}
