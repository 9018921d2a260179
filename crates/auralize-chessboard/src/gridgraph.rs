use crate::geom::{angle_diff_abs, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;
use auralize_core::{Corner, GridCoords};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    /// Grid step `(di, dj)`; `i` grows to the right, `j` grows downwards.
    pub fn step(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::Left => (-1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Right => 0,
            Self::Left => 1,
            Self::Up => 2,
            Self::Down => 3,
        }
    }
}

/// Accepted edge from one corner to an axis-adjacent corner.
#[derive(Clone, Debug)]
pub struct GridLink {
    pub direction: NeighborDirection,
    pub index: usize,
    /// Pixel distance between the two corners.
    pub distance: f32,
    /// Accumulated orientation error in radians; lower is better.
    pub score: f32,
}

impl NeighborDirection {
    /// Dominant axis of the image-space offset `d` (y grows downwards).
    fn of_offset(d: &Vector2<f32>) -> Self {
        match (d.x.abs() > d.y.abs(), d.x >= 0.0, d.y >= 0.0) {
            (true, true, _) => Self::Right,
            (true, false, _) => Self::Left,
            (false, _, true) => Self::Down,
            (false, _, false) => Self::Up,
        }
    }
}

/// Test whether `to` can be the axis neighbor of `from` and score the link.
///
/// Neighboring X-junctions have orthogonal bright diagonals, and the segment
/// between them makes roughly 45 degrees with both.
fn link_between(
    from: &Corner,
    to: &Corner,
    to_index: usize,
    params: &GridGraphParams,
) -> Option<GridLink> {
    let tol = params.orientation_tolerance_deg.to_radians();
    if !is_orthogonal(from.orientation, to.orientation, tol) {
        return None;
    }

    let offset = to.position - from.position;
    let distance = offset.norm();
    if !(params.min_spacing_pix..=params.max_spacing_pix).contains(&distance) {
        return None;
    }

    let heading = offset.y.atan2(offset.x);
    let off_diagonal = |c: &Corner| (axis_vec_diff(c.orientation, heading) - FRAC_PI_4).abs();
    let (e_from, e_to) = (off_diagonal(from), off_diagonal(to));
    if e_from.max(e_to) > tol {
        return None;
    }
    let e_ortho = (FRAC_PI_2 - angle_diff_abs(from.orientation, to.orientation)).abs();

    Some(GridLink {
        direction: NeighborDirection::of_offset(&offset),
        index: to_index,
        distance,
        score: e_from + e_to + e_ortho,
    })
}

/// One link per direction, nearest first and then lowest score.
///
/// Corners several squares away along the same axis also pass
/// [`link_between`], so distance decides.
fn nearest_per_direction(candidates: impl Iterator<Item = GridLink>) -> Vec<GridLink> {
    let mut slots: [Option<GridLink>; 4] = Default::default();
    for link in candidates {
        let slot = &mut slots[link.direction.slot()];
        let better = slot.as_ref().map_or(true, |kept| {
            (link.distance, link.score) < (kept.distance, kept.score)
        });
        if better {
            *slot = Some(link);
        }
    }
    slots.into_iter().flatten().collect()
}

/// 4-connected neighborhood graph over corner candidates.
pub struct GridGraph {
    /// Accepted links of each corner. Every link has a matching reverse link.
    pub neighbors: Vec<Vec<GridLink>>,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams) -> Self {
        let coords: Vec<[f32; 2]> = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect();
        let tree: KdTree<f32, 2> = (&coords).into();

        // The query point itself comes back as its own nearest neighbor.
        let one_sided: Vec<Vec<GridLink>> = coords
            .iter()
            .enumerate()
            .map(|(i, query)| {
                let candidates = tree
                    .nearest_n::<SquaredEuclidean>(query, params.k_neighbors + 1)
                    .into_iter()
                    .map(|nn| nn.item as usize)
                    .filter(|&j| j != i)
                    .filter_map(|j| link_between(&corners[i], &corners[j], j, params));
                nearest_per_direction(candidates)
            })
            .collect();

        let agrees = |from: usize, link: &GridLink| {
            one_sided[link.index]
                .iter()
                .any(|back| back.index == from && back.direction == link.direction.opposite())
        };
        let neighbors = one_sided
            .iter()
            .enumerate()
            .map(|(i, links)| links.iter().filter(|l| agrees(i, l)).cloned().collect())
            .collect();

        Self { neighbors }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

/// Node sets of the graph's connected components, each in BFS order.
pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let mut component_of: Vec<Option<usize>> = vec![None; graph.len()];
    let mut components: Vec<Vec<usize>> = Vec::new();

    for seed in 0..graph.len() {
        if component_of[seed].is_some() {
            continue;
        }
        let id = components.len();
        component_of[seed] = Some(id);
        let mut members = vec![seed];
        let mut cursor = 0;
        while let Some(&node) = members.get(cursor) {
            cursor += 1;
            for link in &graph.neighbors[node] {
                if component_of[link.index].is_none() {
                    component_of[link.index] = Some(id);
                    members.push(link.index);
                }
            }
        }
        components.push(members);
    }
    components
}

/// BFS a component and give each node integer grid coordinates.
///
/// Coordinates are shifted so the minimum is `(0, 0)`. Returns `None` when
/// the graph is inconsistent: a node reached with two different coordinates,
/// or two nodes sharing one cell.
pub fn assign_grid_coordinates(
    graph: &GridGraph,
    component: &[usize],
) -> Option<Vec<(usize, GridCoords)>> {
    let start = *component.first()?;
    let mut assigned: HashMap<usize, GridCoords> = HashMap::new();
    let mut occupied: HashMap<GridCoords, usize> = HashMap::new();
    let mut queue = VecDeque::new();

    let origin = GridCoords { i: 0, j: 0 };
    assigned.insert(start, origin);
    occupied.insert(origin, start);
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        let here = assigned[&node];
        for neighbor in &graph.neighbors[node] {
            let (di, dj) = neighbor.direction.step();
            let there = GridCoords {
                i: here.i + di,
                j: here.j + dj,
            };
            match assigned.get(&neighbor.index) {
                Some(existing) if *existing != there => return None,
                Some(_) => {}
                None => {
                    if occupied.insert(there, neighbor.index).is_some() {
                        return None;
                    }
                    assigned.insert(neighbor.index, there);
                    queue.push_back(neighbor.index);
                }
            }
        }
    }

    let min_i = assigned.values().map(|c| c.i).min()?;
    let min_j = assigned.values().map(|c| c.j).min()?;
    let mut coords: Vec<(usize, GridCoords)> = assigned
        .into_iter()
        .map(|(idx, c)| {
            (
                idx,
                GridCoords {
                    i: c.i - min_i,
                    j: c.j - min_j,
                },
            )
        })
        .collect();
    coords.sort_by_key(|(_, c)| (c.j, c.i));
    Some(coords)
}
