// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Quadtree basics.
//!
//! Build a small quadtree, query a viewport, move an item, and re-home it.
//!
//! Run:
//! - `cargo run -p canopy_demos --example quad_basics`

use canopy_quad::Quadtree;
use kurbo::{Point, Rect};

#[derive(Clone, Debug, PartialEq)]
struct Marker {
    name: &'static str,
    at: Point,
}

fn main() {
    let mut tree = Quadtree::new(Rect::new(0.0, 0.0, 200.0, 200.0), |m: &Marker| m.at)
        .expect("bounds are well formed");

    for (name, x, y) in [
        ("dock", 20.0, 30.0),
        ("crane", 25.0, 34.0),
        ("buoy", 180.0, 40.0),
        ("pier", 60.0, 170.0),
    ] {
        tree.add(Marker {
            name,
            at: Point::new(x, y),
        })
        .expect("markers start inside the bounds");
    }
    println!("markers stored: {}", tree.count());

    // Query the harbor viewport
    let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
    let mut visible = Vec::new();
    tree.for_each_in(viewport, |m| visible.push(m.name))
        .expect("viewport matches the axis count");
    println!("visible in {viewport:?}: {visible:?}");
    assert_eq!(visible.len(), 2, "dock and crane sit inside the viewport");

    // The buoy drifts across the water; the tree re-homes it on update
    tree.for_each_mut(|m| {
        if m.name == "buoy" {
            m.at = Point::new(30.0, 35.0);
        }
    });
    tree.update().expect("all markers stay inside the bounds");

    let mut after = Vec::new();
    tree.for_each_in(viewport, |m| after.push(m.name))
        .expect("viewport matches the axis count");
    println!("visible after the drift: {after:?}");
    assert_eq!(after.len(), 3, "the buoy drifted into the viewport");

    // Sweep the harbor corner
    let removed = tree
        .remove_rect(Rect::new(0.0, 0.0, 50.0, 50.0))
        .expect("rect matches the axis count");
    println!("removed from the corner: {removed}");
    assert_eq!(tree.count(), 1, "only the pier remains");
}
