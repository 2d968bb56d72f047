// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Region sweeps in higher dimensions.
//!
//! Drive the dimension-generic engine directly: a 3D tree of sensor
//! readings, range-removed and range-queried with an octant region.
//!
//! Run:
//! - `cargo run -p canopy_demos --example region_sweep`

use canopy_tree::Tree;

#[derive(Clone, Debug)]
struct Reading {
    id: u32,
    position: [f64; 3],
}

fn main() {
    let mut tree: Tree<f64, Reading, _> = Tree::new(
        &[0.0, 0.0, 0.0],
        &[64.0, 64.0, 64.0],
        |r: &Reading, out: &mut [f64]| out.copy_from_slice(&r.position),
    )
    .expect("bounds are well formed");

    let mut id = 0;
    for x in 0..8 {
        for y in 0..8 {
            for z in 0..8 {
                id += 1;
                tree.add(Reading {
                    id,
                    position: [
                        x as f64 * 8.0 + 1.0,
                        y as f64 * 8.0 + 1.0,
                        z as f64 * 8.0 + 1.0,
                    ],
                })
                .expect("grid points are inside the bounds");
            }
        }
    }
    println!("readings stored: {}", tree.count());
    println!("tree state: {tree:?}");

    // Count the lower octant before sweeping it
    let mut in_octant = 0;
    tree.for_each_in(&[0.0, 0.0, 0.0], &[32.0, 32.0, 32.0], |_| in_octant += 1)
        .expect("region matches the axis count");
    println!("readings in the lower octant: {in_octant}");

    let removed = tree
        .remove_region(&[0.0, 0.0, 0.0], &[32.0, 32.0, 32.0])
        .expect("region matches the axis count");
    println!("removed: {removed}");
    assert_eq!(removed, in_octant, "the sweep takes exactly the queried set");

    // The rest of the space is untouched
    let mut survivors = 0;
    tree.for_each(|_| survivors += 1);
    println!("survivors: {survivors}");
    assert_eq!(survivors + removed, 512, "no reading may vanish or double");
}
