// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=canopy_tree --heading-base-level=0

//! Canopy Tree: an adaptive, dimension-generic orthant tree.
//!
//! Canopy Tree indexes movable point-located items for fast range
//! queries, range removal, and membership updates. One generic engine
//! covers the quadtree (2 axes), the octree (3 axes), and any axis count
//! up to [`MAX_DIMENSIONS`], with the dimension count fixed at runtime by
//! the bounds given to [`TreeGeneric::new`].
//!
//! - Items are owned by the tree and positioned through a caller-supplied
//!   locator (any `Fn(&I, &mut [T])` closure).
//! - Leaves split into branches when their population reaches the
//!   adaptive load (`count^(1/axes)`), and branches merge back into
//!   leaves as removal drains them; the tree reshapes itself to the data.
//! - Items whose backing location changed are re-homed in bulk with
//!   [`TreeGeneric::update`], without remove/re-insert churn at the call
//!   site.
//!
//! Child slots are pluggable via the [`Slots`] trait so the branch
//! storage strategy can be swapped without API churn. The default
//! [`Tree`] alias uses a compact child list.
//!
//! # Example
//!
//! ```rust
//! use canopy_tree::Tree;
//!
//! // A quadtree over [0,100] x [0,100] storing plain points.
//! let mut tree: Tree<f64, [f64; 2], _> = Tree::new(
//!     &[0.0, 0.0],
//!     &[100.0, 100.0],
//!     |p: &[f64; 2], out: &mut [f64]| out.copy_from_slice(p),
//! )
//! .unwrap();
//!
//! for p in [[1.0, 1.0], [99.0, 99.0], [50.0, 50.0], [10.0, 90.0]] {
//!     tree.add(p).unwrap();
//! }
//! assert_eq!(tree.count(), 4);
//!
//! // Range query against the upper-right corner.
//! let mut hits = Vec::new();
//! tree.for_each_in(&[90.0, 90.0], &[100.0, 100.0], |p| hits.push(*p))
//!     .unwrap();
//! assert_eq!(hits, vec![[99.0, 99.0]]);
//!
//! // Range removal.
//! let removed = tree.remove_region(&[0.0, 0.0], &[60.0, 60.0]).unwrap();
//! assert_eq!(removed, 2);
//! assert_eq!(tree.count(), 2);
//! ```
//!
//! ## Moving items
//!
//! The tree never watches item state; when locations change behind its
//! back, one [`update`](TreeGeneric::update) call re-homes everything
//! that moved:
//!
//! ```rust
//! use canopy_tree::Tree;
//!
//! #[derive(Clone)]
//! struct Ship {
//!     x: f64,
//!     y: f64,
//! }
//!
//! let mut tree: Tree<f64, Ship, _> = Tree::new(
//!     &[0.0, 0.0],
//!     &[100.0, 100.0],
//!     |s: &Ship, out: &mut [f64]| {
//!         out[0] = s.x;
//!         out[1] = s.y;
//!     },
//! )
//! .unwrap();
//!
//! tree.add(Ship { x: 10.0, y: 10.0 }).unwrap();
//! tree.for_each_mut(|s| s.x = 95.0);
//! tree.update().unwrap();
//!
//! let mut found = 0;
//! tree.for_each_in(&[90.0, 0.0], &[100.0, 20.0], |_| found += 1)
//!     .unwrap();
//! assert_eq!(found, 1);
//! ```
//!
//! ## Choosing a slot storage
//!
//! - [`Tree`] (compact child lists): allocation proportional to the live
//!   children, any axis count. The default.
//! - [`FullTree`] (full child arrays): constant-time child addressing at
//!   `2^axes` slots per branch; a good fit up to roughly eight axes.
//!
//! ## Out-of-bounds items
//!
//! The tree spans a fixed box. Items located outside it during `add` or
//! `update` go to the handler registered with
//! [`TreeGeneric::on_out_of_bounds`]; without one, those operations
//! report [`TreeError::OutOfBounds`].
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod node;
pub mod region;
pub mod slots;
pub mod tree;
pub mod types;

pub use node::NodeId;
pub use slots::{CompactSlots, FullSlots, Slots};
pub use tree::{FullTree, MAX_DIMENSIONS, Tree, TreeGeneric};
pub use types::{Axis, Locate, TreeError};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn one_engine_covers_many_axis_counts() {
        fn populate(dimensions: usize) -> usize {
            let min = alloc::vec![0.0f64; dimensions];
            let max = alloc::vec![16.0f64; dimensions];
            let mut tree: Tree<f64, Vec<f64>, _> =
                Tree::new(&min, &max, |p: &Vec<f64>, out: &mut [f64]| {
                    out.copy_from_slice(p)
                })
                .unwrap();
            for i in 0..24 {
                let coordinate = (i % 16) as f64 + 0.25;
                let point = alloc::vec![coordinate; dimensions];
                tree.add(point).unwrap();
            }
            tree.count()
        }
        assert_eq!(populate(2), 24);
        assert_eq!(populate(3), 24);
        assert_eq!(populate(16), 24);
    }

    #[test]
    fn errors_format_for_display() {
        use alloc::string::ToString;
        let rendered = TreeError::OutOfBounds.to_string();
        assert!(!rendered.is_empty());
    }
}
