//! Component boundary tracing.
//!
//! Every cell side between a component cell and a non-component cell becomes a
//! directed unit edge with the component on its left. Chaining those edges
//! gives counter-clockwise exterior rings and clockwise hole rings in grid
//! vertex coordinates.

use std::collections::HashMap;

use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};

use super::components::Labelling;

type Vertex = (i64, i64);
type Edge = (Vertex, Vertex);

/// Polygons of component `id`, with grid vertices mapped through `to_coord`.
pub(crate) fn trace_component<F>(labelling: &Labelling, id: usize, to_coord: F) -> MultiPolygon<f64>
where
    F: Fn(i64, i64) -> Coord<f64>,
{
    assemble(boundary_rings(labelling, id), to_coord)
}

fn boundary_edges(labelling: &Labelling, id: usize) -> Vec<Edge> {
    let inside = |c: i64, r: i64| labelling.label_at(c, r) == Some(id);
    let mut edges = Vec::new();
    for &idx in &labelling.components[id].cells {
        let (c, r) = ((idx % labelling.cols) as i64, (idx / labelling.cols) as i64);
        if !inside(c, r - 1) {
            edges.push(((c, r), (c + 1, r)));
        }
        if !inside(c + 1, r) {
            edges.push(((c + 1, r), (c + 1, r + 1)));
        }
        if !inside(c, r + 1) {
            edges.push(((c + 1, r + 1), (c, r + 1)));
        }
        if !inside(c - 1, r) {
            edges.push(((c, r + 1), (c, r)));
        }
    }
    edges
}

fn direction((from, to): Edge) -> Vertex {
    (to.0 - from.0, to.1 - from.1)
}

/// Preference of `next` after travelling along `heading`: right turn first,
/// then straight, left, back. Corner-touching cells stay in one ring.
fn turn_rank(heading: Vertex, next: Vertex) -> u8 {
    let (hx, hy) = heading;
    if next == (hy, -hx) {
        0
    } else if next == heading {
        1
    } else if next == (-hy, hx) {
        2
    } else {
        3
    }
}

fn boundary_rings(labelling: &Labelling, id: usize) -> Vec<Vec<Vertex>> {
    let edges = boundary_edges(labelling, id);
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, (from, _)) in edges.iter().enumerate() {
        outgoing.entry(*from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut ring = Vec::new();
        let mut e = start;
        loop {
            used[e] = true;
            ring.push(edges[e].0);
            let heading = direction(edges[e]);
            let next = outgoing.get(&edges[e].1).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .filter(|&n| n == start || !used[n])
                    .min_by_key(|&n| turn_rank(heading, direction(edges[n])))
            });
            match next {
                Some(n) if n != start => e = n,
                _ => break,
            }
        }
        rings.push(drop_collinear(ring));
    }
    rings
}

/// Remove vertices whose incoming and outgoing edges point the same way.
fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    let dir = |a: Vertex, b: Vertex| ((b.0 - a.0).signum(), (b.1 - a.1).signum());
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            dir(prev, ring[i]) != dir(ring[i], next)
        })
        .map(|i| ring[i])
        .collect()
}

/// Twice the signed area; positive for counter-clockwise rings.
fn signed_area2(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.0 * b.1 - b.0 * a.1
        })
        .sum()
}

fn assemble<F>(rings: Vec<Vec<Vertex>>, to_coord: F) -> MultiPolygon<f64>
where
    F: Fn(i64, i64) -> Coord<f64>,
{
    let line = |ring: &[Vertex]| LineString::from(ring.iter().map(|&(x, y)| to_coord(x, y)).collect::<Vec<_>>());

    let (exteriors, holes): (Vec<_>, Vec<_>) = rings.into_iter().partition(|r| signed_area2(r) > 0);
    let mut shells: Vec<(Polygon<f64>, Vec<LineString<f64>>)> =
        exteriors.iter().map(|r| (Polygon::new(line(r), vec![]), Vec::new())).collect();

    for hole in &holes {
        let target = if shells.len() == 1 {
            Some(0)
        } else {
            let (a, b) = (to_coord(hole[0].0, hole[0].1), to_coord(hole[1].0, hole[1].1));
            let probe = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
            shells.iter().position(|(shell, _)| shell.contains(&probe))
        };
        if let Some(i) = target {
            shells[i].1.push(line(hole));
        }
    }

    MultiPolygon::new(
        shells
            .into_iter()
            .map(|(shell, interiors)| Polygon::new(shell.exterior().clone(), interiors))
            .collect(),
    )
}
