use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;

#[derive(Clone, Copy)]
pub(super) struct RepulsionParams {
    pub(super) strength: f32,
    pub(super) softening: f32,
    pub(super) theta: f32,
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) padding: f32,
    pub(super) relaxation: f32,
}

/// Direction for two bubbles sitting on the same spot, spread by golden-angle
/// steps so stacked pairs separate in different directions.
fn fallback_direction(from: usize, to: usize) -> Vec2 {
    let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

fn repulsion_between(point: Vec2, other: Vec2, mass: f32, params: RepulsionParams) -> Vec2 {
    let delta = point - other;
    let distance_sq = delta.length_sq();
    let distance = distance_sq.sqrt();
    let direction = if distance > 0.0001 {
        delta / distance
    } else {
        vec2(1.0, 0.0)
    };
    direction * (params.strength * mass / (distance_sq + params.softening).sqrt())
}

pub(super) fn accumulate_repulsion_for_node(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    params: RepulsionParams,
    force: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other_index in &node.indices {
            if other_index == index {
                continue;
            }
            *force += repulsion_between(point, positions[other_index], 1.0, params);
        }
        return;
    }

    let distance = (point - node.center_of_mass).length().max(0.01);
    let can_approximate = !node.bounds.contains(point)
        && (node.bounds.side_length() / distance) < params.theta
        && node.mass > 1.0;

    if can_approximate {
        *force += repulsion_between(point, node.center_of_mass, node.mass, params);
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_repulsion_for_node(child, index, positions, params, force);
    }
}

fn resolve_pair(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    pinned: &[bool],
    params: CollisionParams,
    corrections: &mut [Vec2],
) {
    if pinned[from] && pinned[to] {
        return;
    }

    let min_distance = radii[from] + radii[to] + params.padding;
    let delta = positions[from] - positions[to];
    let distance_sq = delta.length_sq();
    if distance_sq >= min_distance * min_distance {
        return;
    }

    let distance = distance_sq.sqrt();
    let direction = if distance > 0.0001 {
        delta / distance
    } else {
        fallback_direction(from, to)
    };

    // The smaller bubble yields more; a pinned bubble does not yield at all.
    let area_from = radii[from] * radii[from];
    let area_to = radii[to] * radii[to];
    let (share_from, share_to) = if pinned[from] {
        (0.0, 1.0)
    } else if pinned[to] {
        (1.0, 0.0)
    } else {
        let total = (area_from + area_to).max(f32::EPSILON);
        (area_to / total, area_from / total)
    };

    let push = direction * (min_distance - distance) * params.relaxation;
    corrections[from] += push * share_from;
    corrections[to] -= push * share_to;
}

/// Collects positional corrections for every overlapping pair, skipping cell
/// pairs whose bounds are farther apart than their largest bubbles can reach.
#[allow(clippy::too_many_arguments)]
pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    pinned: &[bool],
    params: CollisionParams,
    corrections: &mut [Vec2],
) {
    let reach = node_a.max_radius + node_b.max_radius + params.padding;
    if node_a.bounds.distance_sq_to(node_b.bounds) > reach * reach {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    resolve_pair(from, to, positions, radii, pinned, params, corrections);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    resolve_pair(from, to, positions, radii, pinned, params, corrections);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_collision_pairs(
                child_a,
                child_a,
                true,
                positions,
                radii,
                pinned,
                params,
                corrections,
            );

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_collision_pairs(
                    child_a,
                    child_b,
                    false,
                    positions,
                    radii,
                    pinned,
                    params,
                    corrections,
                );
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_collision_pairs(
                child,
                node_b,
                false,
                positions,
                radii,
                pinned,
                params,
                corrections,
            );
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_collision_pairs(
                node_a,
                child,
                false,
                positions,
                radii,
                pinned,
                params,
                corrections,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPULSION: RepulsionParams = RepulsionParams {
        strength: 50.0,
        softening: 100.0,
        theta: 0.72,
    };

    #[test]
    fn repulsion_is_bounded_for_coincident_points() {
        let force = repulsion_between(Vec2::ZERO, Vec2::ZERO, 1.0, REPULSION);
        assert!(force.is_finite());
        assert!((force.length() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn approximated_repulsion_matches_exact_sum_roughly() {
        let mut positions = (0..40)
            .map(|index| vec2(400.0 + (index % 8) as f32 * 3.0, 400.0 + (index / 8) as f32 * 3.0))
            .collect::<Vec<_>>();
        positions.push(vec2(0.0, 0.0));
        let probe = positions.len() - 1;
        let radii = vec![1.0; positions.len()];
        let tree = QuadNode::build(&positions, &radii).expect("tree");

        let mut approximated = Vec2::ZERO;
        accumulate_repulsion_for_node(&tree, probe, &positions, REPULSION, &mut approximated);

        let exact = positions[..probe]
            .iter()
            .map(|other| repulsion_between(positions[probe], *other, 1.0, REPULSION))
            .fold(Vec2::ZERO, |sum, force| sum + force);

        assert!((approximated - exact).length() / exact.length() < 0.05);
    }

    #[test]
    fn pinned_bubble_does_not_yield() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let radii = vec![10.0, 10.0];
        let pinned = vec![true, false];
        let mut corrections = vec![Vec2::ZERO; 2];
        let params = CollisionParams {
            padding: 2.0,
            relaxation: 1.0,
        };

        resolve_pair(0, 1, &positions, &radii, &pinned, params, &mut corrections);

        assert_eq!(corrections[0], Vec2::ZERO);
        assert!((corrections[1] - vec2(12.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn smaller_bubble_moves_further() {
        let positions = vec![vec2(0.0, 0.0), vec2(20.0, 0.0)];
        let radii = vec![20.0, 10.0];
        let mut corrections = vec![Vec2::ZERO; 2];
        let params = CollisionParams {
            padding: 0.0,
            relaxation: 1.0,
        };

        resolve_pair(0, 1, &positions, &radii, &[false, false], params, &mut corrections);

        assert!(corrections[1].length() > corrections[0].length());
        assert!(((corrections[1] - corrections[0]).length() - 10.0).abs() < 1e-4);
    }
}
