// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygonization of a line network
//!
//! Turns a loose set of polylines into the bounded faces of their planar
//! arrangement:
//!
//! 1. Endpoints closer than the snap tolerance collapse into one node
//! 2. Crossings and T-junctions split the segments they touch
//! 3. Dangling edges and bridges are pruned, since they bound no face
//! 4. Faces are traced over half-edges, keeping the face on the left
//! 5. Disconnected inner networks become holes of the face enclosing them

use crate::bool2d::MIN_AREA_THRESHOLD;
use crate::polygon::{
    ensure_cw, point_in_ring, project_onto_segment, segment_intersection, signed_area,
    simplify_ring, EPSILON_2D,
};
use crate::profile::Profile2D;
use nalgebra::Point2;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::f64::consts::PI;

/// Result of polygonizing a line network
#[derive(Debug, Clone, Default)]
pub struct Polygonized {
    /// Bounded faces; outers counter-clockwise, holes clockwise
    pub faces: Vec<Profile2D>,
    /// Distinct nodes after snapping and noding
    pub node_count: usize,
    /// Distinct edges after noding, before pruning
    pub edge_count: usize,
    /// Edges removed because an endpoint had no other connection
    pub dangles_removed: usize,
    /// Edges removed because both of their sides face the same region
    pub bridges_removed: usize,
}

/// Polygonize a set of polylines.
///
/// `snap_tolerance` is the distance under which two points are treated as
/// the same node and under which an endpoint is considered to lie on another
/// segment. Non-finite coordinates and zero-length segments are ignored.
pub fn polygonize(lines: &[Vec<Point2<f64>>], snap_tolerance: f64) -> Polygonized {
    let tolerance = if snap_tolerance.is_finite() {
        snap_tolerance.max(EPSILON_2D)
    } else {
        EPSILON_2D
    };

    let segments = collect_segments(lines, tolerance);
    let mut nodes = NodeIndex::new(tolerance);
    let edges = node_segments(&segments, &mut nodes, tolerance);

    let mut graph = Graph::new(nodes.points, edges);
    let edge_count = graph.edges.len();

    let mut dangles_removed = 0;
    let mut bridges_removed = 0;
    loop {
        dangles_removed += graph.prune_dangles();
        let bridges = graph.find_bridges();
        if bridges.is_empty() {
            break;
        }
        bridges_removed += bridges.len();
        for e in bridges {
            graph.alive[e] = false;
        }
    }

    let faces = graph.trace_faces();

    Polygonized {
        faces,
        node_count: graph.points.len(),
        edge_count,
        dangles_removed,
        bridges_removed,
    }
}

type Segment = (Point2<f64>, Point2<f64>);

fn collect_segments(lines: &[Vec<Point2<f64>>], tolerance: f64) -> Vec<Segment> {
    lines
        .iter()
        .flat_map(|line| line.windows(2).map(|w| (w[0], w[1])))
        .filter(|(a, b)| {
            a.x.is_finite()
                && a.y.is_finite()
                && b.x.is_finite()
                && b.y.is_finite()
                && (b - a).norm() > tolerance
        })
        .collect()
}

/// Grid-hashed node registry; points within `tolerance` share one node
struct NodeIndex {
    tolerance: f64,
    cells: FxHashMap<(i64, i64), SmallVec<[usize; 4]>>,
    points: Vec<Point2<f64>>,
}

impl NodeIndex {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            cells: FxHashMap::default(),
            points: Vec::new(),
        }
    }

    #[inline]
    fn cell(&self, p: &Point2<f64>) -> (i64, i64) {
        (
            (p.x / self.tolerance).floor() as i64,
            (p.y / self.tolerance).floor() as i64,
        )
    }

    fn insert(&mut self, p: Point2<f64>) -> usize {
        let (cx, cy) = self.cell(&p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.cells.get(&(cx + dx, cy + dy)) {
                    for &id in ids {
                        if (self.points[id] - p).norm() <= self.tolerance {
                            return id;
                        }
                    }
                }
            }
        }
        let id = self.points.len();
        self.points.push(p);
        self.cells.entry((cx, cy)).or_default().push(id);
        id
    }
}

/// Split every segment at crossings and at endpoints lying on it, then
/// register the pieces as deduplicated node-to-node edges.
fn node_segments(
    segments: &[Segment],
    nodes: &mut NodeIndex,
    tolerance: f64,
) -> Vec<(usize, usize)> {
    let bounds: Vec<_> = segments
        .iter()
        .map(|(a, b)| {
            (
                Point2::new(a.x.min(b.x) - tolerance, a.y.min(b.y) - tolerance),
                Point2::new(a.x.max(b.x) + tolerance, a.y.max(b.y) + tolerance),
            )
        })
        .collect();

    let mut splits: Vec<Vec<f64>> = vec![vec![0.0, 1.0]; segments.len()];

    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            let (bi, bj) = (&bounds[i], &bounds[j]);
            if bi.0.x > bj.1.x || bj.0.x > bi.1.x || bi.0.y > bj.1.y || bj.0.y > bi.1.y {
                continue;
            }
            let (a0, a1) = segments[i];
            let (b0, b1) = segments[j];

            if let Some((t, u)) = segment_intersection(&a0, &a1, &b0, &b1) {
                splits[i].push(t);
                splits[j].push(u);
            }

            // T-junctions and collinear overlaps: endpoints resting on the other segment
            for p in [b0, b1] {
                let (t, proj) = project_onto_segment(&p, &a0, &a1);
                if (p - proj).norm() <= tolerance {
                    splits[i].push(t);
                }
            }
            for p in [a0, a1] {
                let (u, proj) = project_onto_segment(&p, &b0, &b1);
                if (p - proj).norm() <= tolerance {
                    splits[j].push(u);
                }
            }
        }
    }

    let mut seen: FxHashSet<(usize, usize)> = FxHashSet::default();
    let mut edges = Vec::new();

    for ((a, b), params) in segments.iter().zip(splits.iter_mut()) {
        params.sort_by(|x, y| x.total_cmp(y));
        params.dedup_by(|x, y| (*x - *y).abs() <= EPSILON_2D);

        let ids: Vec<usize> = params
            .iter()
            .map(|&t| nodes.insert(a + (b - a) * t))
            .collect();

        for w in ids.windows(2) {
            let (u, v) = (w[0], w[1]);
            if u == v {
                continue;
            }
            let key = (u.min(v), u.max(v));
            if seen.insert(key) {
                edges.push(key);
            }
        }
    }

    edges
}

struct Graph {
    points: Vec<Point2<f64>>,
    edges: Vec<(usize, usize)>,
    alive: Vec<bool>,
    adjacency: Vec<Vec<usize>>,
}

impl Graph {
    fn new(points: Vec<Point2<f64>>, edges: Vec<(usize, usize)>) -> Self {
        let mut adjacency = vec![Vec::new(); points.len()];
        for (e, &(u, v)) in edges.iter().enumerate() {
            adjacency[u].push(e);
            adjacency[v].push(e);
        }
        Self {
            alive: vec![true; edges.len()],
            points,
            edges,
            adjacency,
        }
    }

    #[inline]
    fn other(&self, e: usize, v: usize) -> usize {
        let (a, b) = self.edges[e];
        if a == v {
            b
        } else {
            a
        }
    }

    fn degree(&self, v: usize) -> usize {
        self.adjacency[v].iter().filter(|&&e| self.alive[e]).count()
    }

    /// Repeatedly remove edges hanging off degree-one nodes
    fn prune_dangles(&mut self) -> usize {
        let mut removed = 0;
        let mut queue: Vec<usize> = (0..self.points.len())
            .filter(|&v| self.degree(v) == 1)
            .collect();

        while let Some(v) = queue.pop() {
            let Some(&e) = self.adjacency[v].iter().find(|&&e| self.alive[e]) else {
                continue;
            };
            if self.degree(v) != 1 {
                continue;
            }
            self.alive[e] = false;
            removed += 1;
            let w = self.other(e, v);
            if self.degree(w) == 1 {
                queue.push(w);
            }
        }

        removed
    }

    /// Tarjan's bridge search, iterative to keep deep networks off the call stack
    fn find_bridges(&self) -> Vec<usize> {
        let n = self.points.len();
        let mut disc = vec![usize::MAX; n];
        let mut low = vec![0usize; n];
        let mut timer = 0;
        let mut bridges = Vec::new();

        for root in 0..n {
            if disc[root] != usize::MAX || self.degree(root) == 0 {
                continue;
            }
            disc[root] = timer;
            low[root] = timer;
            timer += 1;

            // (node, edge used to reach it, next adjacency slot)
            let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];
            while let Some(frame) = stack.last_mut() {
                let (v, parent_edge) = (frame.0, frame.1);
                if frame.2 < self.adjacency[v].len() {
                    let e = self.adjacency[v][frame.2];
                    frame.2 += 1;
                    if !self.alive[e] || Some(e) == parent_edge {
                        continue;
                    }
                    let w = self.other(e, v);
                    if disc[w] == usize::MAX {
                        disc[w] = timer;
                        low[w] = timer;
                        timer += 1;
                        stack.push((w, Some(e), 0));
                    } else {
                        low[v] = low[v].min(disc[w]);
                    }
                } else {
                    stack.pop();
                    if let (Some(e), Some(parent)) = (parent_edge, stack.last()) {
                        let u = parent.0;
                        low[u] = low[u].min(low[v]);
                        if low[v] > disc[u] {
                            bridges.push(e);
                        }
                    }
                }
            }
        }

        bridges
    }

    fn component_ids(&self) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..self.points.len()).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for (e, &(u, v)) in self.edges.iter().enumerate() {
            if self.alive[e] {
                let (ru, rv) = (find(&mut parent, u), find(&mut parent, v));
                if ru != rv {
                    parent[ru] = rv;
                }
            }
        }
        (0..self.points.len())
            .map(|v| find(&mut parent, v))
            .collect()
    }

    fn trace_faces(&self) -> Vec<Profile2D> {
        // Half-edge h: 2e runs edges[e].0 -> edges[e].1, 2e + 1 runs back
        let origin = |h: usize| {
            let (a, b) = self.edges[h / 2];
            if h % 2 == 0 {
                a
            } else {
                b
            }
        };
        let angle = |h: usize| {
            let (a, b) = (self.points[origin(h)], self.points[origin(h ^ 1)]);
            let d = b - a;
            let theta = d.y.atan2(d.x);
            if theta < 0.0 {
                theta + 2.0 * PI
            } else {
                theta
            }
        };

        let half_count = self.edges.len() * 2;
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); self.points.len()];
        for h in 0..half_count {
            if self.alive[h / 2] {
                outgoing[origin(h)].push(h);
            }
        }
        let mut slot = vec![0usize; half_count];
        for list in outgoing.iter_mut() {
            list.sort_by(|&x, &y| angle(x).total_cmp(&angle(y)));
            for (i, &h) in list.iter().enumerate() {
                slot[h] = i;
            }
        }

        // Next half-edge around the face on the left: the outgoing edge
        // just clockwise of the twin at the destination node
        let next = |h: usize| {
            let twin = h ^ 1;
            let list = &outgoing[origin(twin)];
            list[(slot[twin] + list.len() - 1) % list.len()]
        };

        let components = self.component_ids();
        let mut shells: Vec<(Vec<Point2<f64>>, usize, f64)> = Vec::new();
        let mut outlines: Vec<(Vec<Point2<f64>>, usize)> = Vec::new();
        let mut visited = vec![false; half_count];

        for start in 0..half_count {
            if visited[start] || !self.alive[start / 2] {
                continue;
            }
            let mut ring = Vec::new();
            let mut h = start;
            let mut closed = false;
            for _ in 0..half_count {
                visited[h] = true;
                ring.push(self.points[origin(h)]);
                h = next(h);
                if h == start {
                    closed = true;
                    break;
                }
            }
            if !closed {
                continue;
            }

            let component = components[origin(start)];
            let area = signed_area(&ring);
            if area > MIN_AREA_THRESHOLD {
                shells.push((simplify_ring(&ring, EPSILON_2D), component, area));
            } else if area < -MIN_AREA_THRESHOLD {
                outlines.push((ring, component));
            }
        }

        let mut faces: Vec<Profile2D> = shells
            .iter()
            .map(|(ring, _, _)| Profile2D::new(ring.clone()))
            .collect();

        // Outline of a separate network nested inside a face becomes its hole
        for (outline, component) in outlines {
            let Some(probe) = outline.first() else {
                continue;
            };
            let host = shells
                .iter()
                .enumerate()
                .filter(|(_, (ring, c, _))| *c != component && point_in_ring(probe, ring))
                .min_by(|a, b| a.1 .2.total_cmp(&b.1 .2))
                .map(|(i, _)| i);
            if let Some(i) = host {
                faces[i].add_hole(ensure_cw(&simplify_ring(&outline, EPSILON_2D)));
            }
        }

        faces.retain(|f| f.area() > MIN_AREA_THRESHOLD);
        faces
    }
}
