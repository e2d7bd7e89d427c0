use std::fmt::Write;

use crate::map::{Capacity, LocationId, Map};

/// Renders a map as a standalone TikZ document in the track style: one node
/// per location, one path per connection on the `tracks` layer. The y axis
/// is flipped so map coordinates read like screen coordinates.
pub fn tikz_map(map: &Map) -> String {
    let mut out = String::new();
    out.push_str("\\documentclass[tikz]{standalone}\n\n");
    out.push_str("\\usetikzlibrary{calc}\n");
    out.push_str("\\input{trackstyle}\n\n");
    out.push_str("\\begin{document}\n\n");
    out.push_str("\\begin{tikzpicture}\n");

    for (index, location) in map.locations().iter().enumerate() {
        let style = match location.capacity {
            Capacity::Infinite => format!("station={{{}}}", location.name.replace('_', " ")),
            Capacity::Bounded(0) => "crossing".to_string(),
            Capacity::Bounded(k) => {
                format!("siding={{{}}}{{{}}}", k, label_angle(map, LocationId(index)))
            }
        };
        writeln!(
            out,
            "    \\node [{}] at ({}, {}) (l{}) {{}};",
            style, location.x, -location.y, index
        )
        .unwrap();
    }

    out.push_str("    \\begin{pgfonlayer}{tracks}\n");
    for connection in map.connections() {
        writeln!(
            out,
            "        \\path [tracks] (l{}) to (l{});",
            connection.first.0, connection.second.0
        )
        .unwrap();
    }
    out.push_str("    \\end{pgfonlayer}{tracks}\n");

    out.push_str("\\end{tikzpicture}\n\n");
    out.push_str("\\end{document}\n");
    out
}

/// Picks a compass angle for a siding's capacity label that no connection
/// leaves in: east, north, west, then south as the fallback.
fn label_angle(map: &Map, location: LocationId) -> u32 {
    // east, north, west, south
    let mut free = [true; 4];
    let here = map.location(location);
    for &(_, other) in map.neighbours(location) {
        let there = map.location(other);
        let dx = there.x - here.x;
        let dy = there.y - here.y;
        if dx == 0 && dy == 0 {
            continue;
        }
        if dx.abs() >= dy.abs() {
            free[if dx > 0 { 0 } else { 2 }] = false;
        } else {
            free[if dy > 0 { 3 } else { 1 }] = false;
        }
    }

    let mut angle = 270;
    if free[2] {
        angle = 180;
    }
    if free[0] {
        angle = 0;
    }
    if free[1] {
        angle = 90;
    }
    if free[3] {
        angle = 270;
    }
    angle
}
