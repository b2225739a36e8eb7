//! 4-connected neighbor graph over detected X-junctions.

use crate::params::GridGraphParams;
use crate::pattern::Corner;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::VecDeque;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    East,
    West,
    North,
    South,
}

impl Step {
    fn slot(self) -> usize {
        match self {
            Step::East => 0,
            Step::West => 1,
            Step::North => 2,
            Step::South => 3,
        }
    }

    /// Grid offset with `j` growing downwards.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Step::East => (1, 0),
            Step::West => (-1, 0),
            Step::North => (0, -1),
            Step::South => (0, 1),
        }
    }

    fn of(v: &Vector2<f32>) -> Self {
        if v.x.abs() > v.y.abs() {
            if v.x >= 0.0 {
                Step::East
            } else {
                Step::West
            }
        } else if v.y >= 0.0 {
            Step::South
        } else {
            Step::North
        }
    }
}

#[derive(Clone, Debug)]
pub struct Edge {
    pub step: Step,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// Absolute difference of two angles, in `[0, π]`.
fn angle_gap(a: f32, b: f32) -> f32 {
    let mut d = (b - a).rem_euclid(2.0 * PI);
    if d >= PI {
        d -= 2.0 * PI;
    }
    d.abs()
}

/// Gap between an undirected axis and a directed angle, in `[0, π/2]`.
fn axis_gap(axis: f32, angle: f32) -> f32 {
    let d = angle_gap(axis, angle);
    d.min(PI - d)
}

/// Two adjacent junctions have orthogonal diagonals, and the edge joining them
/// runs at 45 degrees to both.
fn link(a: &Corner, b: &Corner, b_index: usize, params: &GridGraphParams) -> Option<Edge> {
    let tol = params.orientation_tolerance_deg.to_radians();
    let score_ortho = (FRAC_PI_2 - angle_gap(a.orientation, b.orientation)).abs();
    if score_ortho > tol {
        return None;
    }

    let v = b.position - a.position;
    let distance = v.norm();
    if distance < params.min_spacing_pix || distance > params.max_spacing_pix {
        return None;
    }

    let edge_angle = v.y.atan2(v.x);
    let score_a = (axis_gap(a.orientation, edge_angle) - FRAC_PI_4).abs();
    let score_b = (axis_gap(b.orientation, edge_angle) - FRAC_PI_4).abs();
    if score_a > tol || score_b > tol {
        return None;
    }

    Some(Edge {
        step: Step::of(&v),
        index: b_index,
        distance,
        score: score_a + score_b + score_ortho,
    })
}

/// Best candidate per step; ties go to the closer junction.
fn best_per_step(candidates: Vec<Edge>) -> Vec<Edge> {
    let mut best: [Option<Edge>; 4] = [None, None, None, None];
    for e in candidates {
        let slot = &mut best[e.step.slot()];
        let better = match slot {
            None => true,
            Some(cur) => {
                e.score < cur.score || (e.score == cur.score && e.distance < cur.distance)
            }
        };
        if better {
            *slot = Some(e);
        }
    }
    best.into_iter().flatten().collect()
}

pub struct GridGraph {
    pub edges: Vec<Vec<Edge>>,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams) -> Self {
        let coords: Vec<[f32; 2]> = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect();
        let tree: KdTree<f32, 2> = (&coords).into();

        let edges = corners
            .iter()
            .enumerate()
            .map(|(i, corner)| {
                let candidates = tree
                    .nearest_n::<SquaredEuclidean>(&coords[i], params.k_neighbors)
                    .into_iter()
                    .map(|nn| nn.item as usize)
                    .filter(|&j| j != i)
                    .filter_map(|j| link(corner, &corners[j], j, params))
                    .collect();
                best_per_step(candidates)
            })
            .collect();

        Self { edges }
    }

    /// Node sets of the connected components, largest first.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.edges.len()];
        let mut out = Vec::new();
        for start in 0..self.edges.len() {
            if seen[start] {
                continue;
            }
            let mut comp = Vec::new();
            let mut stack = vec![start];
            while let Some(n) = stack.pop() {
                if std::mem::replace(&mut seen[n], true) {
                    continue;
                }
                comp.push(n);
                stack.extend(self.edges[n].iter().map(|e| e.index).filter(|&k| !seen[k]));
            }
            out.push(comp);
        }
        out.sort_by(|a, b| b.len().cmp(&a.len()));
        out
    }

    /// Breadth-first integer coordinates for one component, rooted at its first node.
    pub fn coordinates(&self, component: &[usize]) -> Vec<(usize, i32, i32)> {
        let Some(&root) = component.first() else {
            return Vec::new();
        };
        let mut seen = vec![false; self.edges.len()];
        let mut coords = Vec::with_capacity(component.len());
        let mut queue = VecDeque::from([(root, 0, 0)]);
        while let Some((n, i, j)) = queue.pop_front() {
            if std::mem::replace(&mut seen[n], true) {
                continue;
            }
            coords.push((n, i, j));
            for e in &self.edges[n] {
                let (di, dj) = e.step.offset();
                queue.push_back((e.index, i + di, j + dj));
            }
        }
        coords
    }
}
