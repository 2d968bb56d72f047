// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=canopy_quad --heading-base-level=0

//! Canopy Quad: a Kurbo-native adaptive quadtree.
//!
//! Canopy Quad is the 2D face of the [`canopy_tree`] engine: items carry
//! a [`kurbo::Point`] location, queries and removals take a
//! [`kurbo::Rect`], and everything else (adaptive splitting and merging,
//! bulk re-homing of moved items, out-of-bounds routing) comes from the
//! generic tree underneath.
//!
//! - [`Quadtree::add`], [`Quadtree::remove_rect`],
//!   [`Quadtree::remove_item`] for membership.
//! - [`Quadtree::for_each_in`] and [`Quadtree::try_for_each_in`] for
//!   range queries over a viewport or pick rectangle.
//! - [`Quadtree::update`] / [`Quadtree::update_rect`] after item
//!   positions changed behind the tree's back.
//!
//! # Example
//!
//! ```rust
//! use canopy_quad::Quadtree;
//! use kurbo::{Point, Rect};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Marker {
//!     name: &'static str,
//!     at: Point,
//! }
//!
//! let mut tree = Quadtree::new(
//!     Rect::new(0.0, 0.0, 100.0, 100.0),
//!     |m: &Marker| m.at,
//! )
//! .unwrap();
//!
//! tree.add(Marker { name: "a", at: Point::new(1.0, 1.0) }).unwrap();
//! tree.add(Marker { name: "b", at: Point::new(99.0, 99.0) }).unwrap();
//! tree.add(Marker { name: "c", at: Point::new(50.0, 50.0) }).unwrap();
//!
//! let mut seen = Vec::new();
//! tree.for_each_in(Rect::new(40.0, 40.0, 100.0, 100.0), |m| seen.push(m.name))
//!     .unwrap();
//! seen.sort_unstable();
//! assert_eq!(seen, vec!["b", "c"]);
//!
//! let removed = tree.remove_rect(Rect::new(0.0, 0.0, 60.0, 60.0)).unwrap();
//! assert_eq!(removed, 2);
//! assert_eq!(tree.count(), 1);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use core::fmt::Debug;
use core::ops::ControlFlow;

use canopy_tree::{FullTree, Locate, TreeError};
use kurbo::{Point, Rect};

/// Adapts a `Fn(&I) -> Point` to the slice-filling locator the engine
/// expects.
#[derive(Clone)]
struct PointLocator<L>(L);

impl<I, L: Fn(&I) -> Point> Locate<f64, I> for PointLocator<L> {
    #[inline]
    fn locate(&self, item: &I, out: &mut [f64]) {
        let p = (self.0)(item);
        out[0] = p.x;
        out[1] = p.y;
    }
}

fn corners(rect: Rect) -> ([f64; 2], [f64; 2]) {
    ([rect.x0, rect.y0], [rect.x1, rect.y1])
}

/// Adaptive quadtree over items located by a [`Point`]-returning closure.
///
/// A quadtree has four child slots per branch, so the fully allocated
/// storage strategy is used throughout.
pub struct Quadtree<I, L: Fn(&I) -> Point> {
    tree: FullTree<f64, I, PointLocator<L>>,
}

impl<I, L: Fn(&I) -> Point> Debug for Quadtree<I, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Quadtree").field("tree", &self.tree).finish()
    }
}

impl<I, L: Fn(&I) -> Point> Quadtree<I, L> {
    /// Create an empty quadtree spanning `bounds`.
    ///
    /// Fails with [`TreeError::InvalidBounds`] when the rectangle is
    /// empty or inverted.
    pub fn new(bounds: Rect, locate: L) -> Result<Self, TreeError> {
        let (min, max) = corners(bounds);
        Ok(Self {
            tree: FullTree::new(&min, &max, PointLocator(locate))?,
        })
    }

    /// Number of items currently stored.
    pub fn count(&self) -> usize {
        self.tree.count()
    }

    /// True when no items are stored.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The rectangle the tree spans.
    pub fn bounds(&self) -> Rect {
        let min = self.tree.min();
        let max = self.tree.max();
        Rect::new(min[0], min[1], max[0], max[1])
    }

    /// Register a handler receiving items that fall outside
    /// [`bounds`](Self::bounds) during [`add`](Self::add) or
    /// [`update`](Self::update). Without one, those operations report
    /// [`TreeError::OutOfBounds`].
    pub fn on_out_of_bounds(&mut self, handler: impl FnMut(I) + 'static) {
        self.tree.on_out_of_bounds(handler);
    }

    /// Add an item at its located point.
    pub fn add(&mut self, item: I) -> Result<(), TreeError> {
        self.tree.add(item)
    }

    /// Remove every item located inside `rect` (boundary inclusive).
    /// Returns the number removed.
    pub fn remove_rect(&mut self, rect: Rect) -> Result<usize, TreeError> {
        let (min, max) = corners(rect);
        self.tree.remove_region(&min, &max)
    }

    /// Remove every item matching `pred`. Returns the number removed.
    pub fn remove_where(&mut self, pred: impl FnMut(&I) -> bool) -> Result<usize, TreeError> {
        self.tree.remove_where(pred)
    }

    /// Remove every item inside `rect` that also matches `pred`.
    pub fn remove_rect_where(
        &mut self,
        rect: Rect,
        pred: impl FnMut(&I) -> bool,
    ) -> Result<usize, TreeError> {
        let (min, max) = corners(rect);
        self.tree.remove_region_where(&min, &max, pred)
    }

    /// Remove one occurrence equal to `item`. Fails with
    /// [`TreeError::ItemNotFound`] when nothing at its point compares
    /// equal.
    pub fn remove_item(&mut self, item: &I) -> Result<(), TreeError>
    where
        I: PartialEq,
    {
        self.tree.remove_item(item)
    }

    /// Remove one occurrence matching `item` under a caller-supplied
    /// equality.
    pub fn remove_item_by(
        &mut self,
        item: &I,
        eq: impl FnMut(&I, &I) -> bool,
    ) -> Result<(), TreeError> {
        self.tree.remove_item_by(item, eq)
    }

    /// Re-home every item whose point no longer matches its leaf.
    pub fn update(&mut self) -> Result<(), TreeError> {
        self.tree.update()
    }

    /// [`update`](Self::update) restricted to subtrees overlapping
    /// `rect`.
    pub fn update_rect(&mut self, rect: Rect) -> Result<(), TreeError> {
        let (min, max) = corners(rect);
        self.tree.update_region(&min, &max)
    }

    /// Visit every item.
    pub fn for_each(&self, f: impl FnMut(&I)) {
        self.tree.for_each(f);
    }

    /// Visit every item mutably. Callers moving points this way must
    /// follow up with [`update`](Self::update).
    pub fn for_each_mut(&mut self, f: impl FnMut(&mut I)) {
        self.tree.for_each_mut(f);
    }

    /// Visit every item located inside `rect`.
    pub fn for_each_in(&self, rect: Rect, f: impl FnMut(&I)) -> Result<(), TreeError> {
        let (min, max) = corners(rect);
        self.tree.for_each_in(&min, &max, f)
    }

    /// Visit items until the visitor breaks.
    pub fn try_for_each(&self, f: impl FnMut(&I) -> ControlFlow<()>) -> ControlFlow<()> {
        self.tree.try_for_each(f)
    }

    /// Visit items located inside `rect` until the visitor breaks.
    pub fn try_for_each_in(
        &self,
        rect: Rect,
        f: impl FnMut(&I) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>, TreeError> {
        let (min, max) = corners(rect);
        self.tree.try_for_each_in(&min, &max, f)
    }

    /// Collect every item into a vector.
    pub fn to_vec(&self) -> Vec<I>
    where
        I: Clone,
    {
        self.tree.to_vec()
    }

    /// Drop every item, keeping the bounds.
    pub fn clear(&mut self) {
        self.tree.clear();
    }
}

impl<I: Clone, L: Fn(&I) -> Point + Clone> Clone for Quadtree<I, L> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    #[derive(Clone, Debug, PartialEq)]
    struct Marker {
        id: u32,
        at: Point,
    }

    fn marker(id: u32, x: f64, y: f64) -> Marker {
        Marker {
            id,
            at: Point::new(x, y),
        }
    }

    fn quad() -> Quadtree<Marker, fn(&Marker) -> Point> {
        fn locate(m: &Marker) -> Point {
            m.at
        }
        Quadtree::new(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            locate as fn(&Marker) -> Point,
        )
        .unwrap()
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let result = Quadtree::new(Rect::new(10.0, 0.0, 0.0, 10.0), |m: &Marker| m.at);
        assert_eq!(result.err(), Some(TreeError::InvalidBounds));
    }

    #[test]
    fn rect_removal_and_corner_query() {
        let mut tree = quad();
        for (id, x, y) in [(1, 1.0, 1.0), (2, 99.0, 99.0), (3, 50.0, 50.0), (4, 10.0, 90.0)] {
            tree.add(marker(id, x, y)).unwrap();
        }
        assert_eq!(tree.count(), 4);

        let removed = tree.remove_rect(Rect::new(0.0, 0.0, 60.0, 60.0)).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(tree.count(), 2);

        let mut ids = Vec::new();
        tree.for_each_in(Rect::new(90.0, 90.0, 100.0, 100.0), |m| ids.push(m.id))
            .unwrap();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn update_follows_moved_markers() {
        let mut tree = quad();
        for (id, x, y) in [(1, 10.0, 10.0), (2, 20.0, 15.0), (3, 80.0, 80.0)] {
            tree.add(marker(id, x, y)).unwrap();
        }
        tree.for_each_mut(|m| {
            if m.id == 1 {
                m.at = Point::new(90.0, 90.0);
            }
        });
        tree.update().unwrap();

        let mut ids = Vec::new();
        tree.for_each_in(Rect::new(75.0, 75.0, 100.0, 100.0), |m| ids.push(m.id))
            .unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn out_of_bounds_markers_reach_the_handler() {
        let caught = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&caught);
        let mut tree = quad();
        tree.on_out_of_bounds(move |m: Marker| sink.borrow_mut().push(m.id));

        tree.add(marker(7, 500.0, 5.0)).unwrap();
        assert!(tree.is_empty());
        assert_eq!(*caught.borrow(), vec![7]);
    }

    #[test]
    fn remove_item_uses_equality_at_the_point() {
        let mut tree = quad();
        tree.add(marker(1, 5.0, 5.0)).unwrap();
        tree.add(marker(2, 5.0, 5.0)).unwrap();

        tree.remove_item(&marker(2, 5.0, 5.0)).unwrap();
        assert_eq!(tree.count(), 1);
        assert_eq!(tree.to_vec()[0].id, 1);
        assert_eq!(
            tree.remove_item(&marker(9, 5.0, 5.0)).unwrap_err(),
            TreeError::ItemNotFound
        );
    }

    #[test]
    fn early_exit_hit_test() {
        let mut tree = quad();
        for i in 0..50 {
            tree.add(marker(i, (i % 10) as f64 * 10.0 + 1.0, (i / 10) as f64 * 20.0 + 1.0))
                .unwrap();
        }
        let mut first = None;
        let flow = tree
            .try_for_each_in(Rect::new(0.0, 0.0, 50.0, 50.0), |m| {
                first = Some(m.id);
                ControlFlow::Break(())
            })
            .unwrap();
        assert_eq!(flow, ControlFlow::Break(()));
        assert!(first.is_some());
    }

    #[test]
    fn clone_and_clear_are_independent() {
        let mut tree = quad();
        for (id, x, y) in [(1, 10.0, 10.0), (2, 60.0, 60.0)] {
            tree.add(marker(id, x, y)).unwrap();
        }
        let copy = tree.clone();
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(copy.count(), 2);
        assert_eq!(copy.bounds(), Rect::new(0.0, 0.0, 100.0, 100.0));
    }
}
