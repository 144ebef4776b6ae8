mod forces;
mod quadtree;

use eframe::egui::{Vec2, vec2};
use tracing::debug;

use super::Viewport;
use crate::insights::Cluster;
use forces::{
    CollisionParams, RepulsionParams, accumulate_collision_pairs, accumulate_repulsion_for_node,
};
use quadtree::QuadNode;

const BARNES_HUT_THETA: f32 = 0.72;
const GOLDEN_ANGLE: f32 = 2.399_963;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceConfig {
    /// Radius of the largest bubble before the viewport cap applies.
    pub radius_scale: f32,
    pub min_radius: f32,
    /// Extra gap kept between touching bubbles.
    pub padding: f32,
    pub center_strength: f32,
    pub repulsion_strength: f32,
    pub softening: f32,
    pub velocity_decay: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    pub drag_alpha_target: f32,
    pub collision_iterations: usize,
    pub collision_relaxation: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            radius_scale: 5000.0_f32.sqrt(),
            min_radius: 4.0,
            padding: 2.0,
            center_strength: 0.06,
            repulsion_strength: 50.0,
            softening: 100.0,
            velocity_decay: 0.4,
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
            alpha_min: 0.001,
            drag_alpha_target: 0.3,
            collision_iterations: 3,
            collision_relaxation: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutNode {
    pub cluster_id: String,
    pub cluster_index: usize,
    pub size: u64,
    pub radius: f32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub pinned: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationState {
    Running,
    Settled,
    Stopped,
}

#[derive(Default)]
struct PhysicsScratch {
    forces: Vec<Vec2>,
    positions: Vec<Vec2>,
    radii: Vec<f32>,
    pinned: Vec<bool>,
    corrections: Vec<Vec2>,
}

impl PhysicsScratch {
    fn load(&mut self, nodes: &[LayoutNode]) {
        self.positions.clear();
        self.radii.clear();
        self.pinned.clear();
        for node in nodes {
            self.positions.push(node.position);
            self.radii.push(node.radius);
            self.pinned.push(node.pinned);
        }
    }
}

/// Bubble layout for one cluster collection.
///
/// The host drives it cooperatively: call [`ForceSimulation::tick`] once per
/// frame and keep repainting while it returns `true`. Settled and stopped
/// simulations leave every node untouched on `tick`.
pub struct ForceSimulation {
    nodes: Vec<LayoutNode>,
    viewport: Viewport,
    config: ForceConfig,
    alpha: f32,
    alpha_target: f32,
    state: SimulationState,
    ticks: u64,
    scratch: PhysicsScratch,
}

pub fn radius_for_size(size: u64, max_size: u64, viewport: Viewport, config: &ForceConfig) -> f32 {
    if max_size == 0 {
        return config.min_radius;
    }
    let scale = config.radius_scale.min(viewport.min_side() * 0.5);
    let ratio = (size.min(max_size) as f32 / max_size as f32).sqrt();
    (ratio * scale).max(config.min_radius)
}

impl ForceSimulation {
    pub fn new(clusters: &[Cluster], viewport: Viewport, config: ForceConfig) -> Self {
        let max_size = clusters.iter().map(|cluster| cluster.size).max().unwrap_or(0);
        let center = viewport.center();

        let mut nodes = clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| LayoutNode {
                cluster_id: cluster.id.clone(),
                cluster_index: index,
                size: cluster.size,
                radius: radius_for_size(cluster.size, max_size, viewport, &config),
                position: center,
                velocity: Vec2::ZERO,
                pinned: false,
            })
            .collect::<Vec<_>>();

        let spacing = if nodes.is_empty() {
            0.0
        } else {
            nodes.iter().map(|node| node.radius).sum::<f32>() / nodes.len() as f32
        };
        for (index, node) in nodes.iter_mut().enumerate() {
            let distance = spacing * (index as f32 + 0.5).sqrt();
            let angle = index as f32 * GOLDEN_ANGLE;
            let spiral = center + vec2(angle.cos(), angle.sin()) * distance;
            node.position = viewport.clamp_circle(spiral, node.radius);
        }

        let state = if nodes.is_empty() {
            SimulationState::Stopped
        } else {
            SimulationState::Running
        };
        debug!(nodes = nodes.len(), ?state, "force simulation created");

        Self {
            nodes,
            viewport,
            config,
            alpha: 1.0,
            alpha_target: 0.0,
            state,
            ticks: 0,
            scratch: PhysicsScratch::default(),
        }
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SimulationState::Running
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advances one step. Returns whether the layout is still in motion.
    pub fn tick(&mut self) -> bool {
        if self.state != SimulationState::Running {
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        self.apply_forces();
        self.integrate();
        for _ in 0..self.config.collision_iterations.max(1) {
            self.relax_collisions();
        }
        self.ticks += 1;

        if self.alpha < self.config.alpha_min {
            for node in &mut self.nodes {
                node.velocity = Vec2::ZERO;
            }
            self.state = SimulationState::Settled;
            debug!(ticks = self.ticks, "force simulation settled");
            return false;
        }
        true
    }

    /// Runs headless until settled or `max_ticks` elapse. Returns the ticks run.
    pub fn run_until_settled(&mut self, max_ticks: usize) -> usize {
        let mut ran = 0;
        while ran < max_ticks && self.is_running() {
            self.tick();
            ran += 1;
        }
        ran
    }

    pub fn stop(&mut self) {
        if self.state != SimulationState::Stopped {
            debug!(ticks = self.ticks, "force simulation stopped");
        }
        self.state = SimulationState::Stopped;
    }

    pub fn pin(&mut self, index: usize, pointer: Vec2) -> bool {
        if self.state == SimulationState::Stopped {
            return false;
        }
        let viewport = self.viewport;
        let Some(node) = self.nodes.get_mut(index) else {
            return false;
        };

        node.position = viewport.clamp_circle(pointer, node.radius);
        node.velocity = Vec2::ZERO;
        node.pinned = true;
        self.alpha_target = self.config.drag_alpha_target;
        self.reheat();
        true
    }

    pub fn drag_to(&mut self, index: usize, pointer: Vec2) -> bool {
        if self.state == SimulationState::Stopped {
            return false;
        }
        let viewport = self.viewport;
        let Some(node) = self.nodes.get_mut(index).filter(|node| node.pinned) else {
            return false;
        };

        node.position = viewport.clamp_circle(pointer, node.radius);
        node.velocity = Vec2::ZERO;
        self.reheat();
        true
    }

    pub fn release(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.pinned = false;
        }
        if !self.nodes.iter().any(|node| node.pinned) {
            self.alpha_target = 0.0;
        }
    }

    /// Rescales radii to the new surface, pulls every bubble back inside and
    /// lets the layout adapt.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;

        let max_size = self.nodes.iter().map(|node| node.size).max().unwrap_or(0);
        for node in &mut self.nodes {
            node.radius = radius_for_size(node.size, max_size, viewport, &self.config);
            node.position = viewport.clamp_circle(node.position, node.radius);
        }

        if self.state != SimulationState::Stopped {
            self.alpha = self.alpha.max(self.config.drag_alpha_target);
            self.state = SimulationState::Running;
        }
    }

    pub fn node_at(&self, point: Vec2) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                let distance = (node.position - point).length() - node.radius;
                (distance <= 0.0).then_some((index, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    fn reheat(&mut self) {
        if self.state == SimulationState::Settled {
            self.alpha = self.alpha.max(self.config.drag_alpha_target);
            self.state = SimulationState::Running;
        }
    }

    fn apply_forces(&mut self) {
        let node_count = self.nodes.len();
        let scratch = &mut self.scratch;
        scratch.load(&self.nodes);
        scratch.forces.clear();
        scratch.forces.resize(node_count, Vec2::ZERO);

        let center = self.viewport.center();
        for (index, force) in scratch.forces.iter_mut().enumerate() {
            *force = (center - scratch.positions[index]) * self.config.center_strength;
        }

        if node_count >= 2
            && let Some(quadtree) = QuadNode::build(&scratch.positions, &scratch.radii)
        {
            let params = RepulsionParams {
                strength: self.config.repulsion_strength,
                softening: self.config.softening.max(f32::EPSILON),
                theta: BARNES_HUT_THETA,
            };
            for (index, force) in scratch.forces.iter_mut().enumerate() {
                if scratch.pinned[index] {
                    continue;
                }
                accumulate_repulsion_for_node(&quadtree, index, &scratch.positions, params, force);
            }
        }

        for (node, force) in self.nodes.iter_mut().zip(&scratch.forces) {
            if node.pinned {
                node.velocity = Vec2::ZERO;
                continue;
            }
            node.velocity += *force * self.alpha;
        }
    }

    fn integrate(&mut self) {
        let retained = 1.0 - self.config.velocity_decay.clamp(0.0, 1.0);
        for node in &mut self.nodes {
            if node.pinned {
                continue;
            }
            node.velocity *= retained;
            node.position += node.velocity;
        }
    }

    fn relax_collisions(&mut self) {
        let node_count = self.nodes.len();
        let scratch = &mut self.scratch;
        scratch.load(&self.nodes);
        scratch.corrections.clear();
        scratch.corrections.resize(node_count, Vec2::ZERO);

        if node_count >= 2
            && let Some(quadtree) = QuadNode::build(&scratch.positions, &scratch.radii)
        {
            accumulate_collision_pairs(
                &quadtree,
                &quadtree,
                true,
                &scratch.positions,
                &scratch.radii,
                &scratch.pinned,
                CollisionParams {
                    padding: self.config.padding,
                    relaxation: self.config.collision_relaxation.clamp(0.05, 1.0),
                },
                &mut scratch.corrections,
            );
        }

        let viewport = self.viewport;
        for (node, correction) in self.nodes.iter_mut().zip(&scratch.corrections) {
            if !node.pinned {
                node.position += *correction;
            }
            node.position = viewport.clamp_circle(node.position, node.radius);
        }
    }
}

impl Drop for ForceSimulation {
    fn drop(&mut self) {
        if self.state == SimulationState::Running {
            debug!(ticks = self.ticks, "force simulation dropped while running");
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::insights::ClusterMetadata;

    fn cluster(id: &str, size: u64) -> Cluster {
        Cluster {
            id: id.to_owned(),
            theme: format!("Theme {id}"),
            size,
            centroid: None,
            metadata: ClusterMetadata::default(),
            features: Vec::new(),
            summary: None,
        }
    }

    fn clusters(sizes: &[u64]) -> Vec<Cluster> {
        sizes
            .iter()
            .enumerate()
            .map(|(index, size)| cluster(&index.to_string(), *size))
            .collect()
    }

    fn max_overlap(simulation: &ForceSimulation) -> f32 {
        let nodes = simulation.nodes();
        let padding = simulation.config().padding;
        let mut worst = 0.0_f32;
        for (offset, a) in nodes.iter().enumerate() {
            for b in &nodes[offset + 1..] {
                let gap = (a.position - b.position).length() - (a.radius + b.radius + padding);
                worst = worst.max(-gap);
            }
        }
        worst
    }

    #[test]
    fn radius_follows_square_root_of_size() {
        let simulation = ForceSimulation::new(
            &clusters(&[10, 100]),
            Viewport::new(800.0, 400.0),
            ForceConfig::default(),
        );
        let ratio = simulation.nodes()[1].radius / simulation.nodes()[0].radius;
        assert!((ratio - 10.0_f32.sqrt()).abs() < 1e-4);
        assert!((simulation.nodes()[1].radius - 5000.0_f32.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn radius_is_capped_by_small_viewports() {
        let viewport = Viewport::new(100.0, 60.0);
        let radius = radius_for_size(5, 5, viewport, &ForceConfig::default());
        assert_eq!(radius, 30.0);
    }

    #[test]
    fn empty_clusters_still_get_a_visible_radius() {
        let simulation = ForceSimulation::new(
            &clusters(&[0, 0, 25]),
            Viewport::default(),
            ForceConfig::default(),
        );
        assert_eq!(simulation.nodes()[0].radius, 4.0);

        let all_empty =
            ForceSimulation::new(&clusters(&[0, 0]), Viewport::default(), ForceConfig::default());
        assert!(all_empty.nodes().iter().all(|node| node.radius == 4.0));
    }

    #[test]
    fn no_clusters_never_starts() {
        let mut simulation =
            ForceSimulation::new(&[], Viewport::default(), ForceConfig::default());
        assert!(simulation.nodes().is_empty());
        assert_eq!(simulation.state(), SimulationState::Stopped);
        assert!(!simulation.tick());
        assert_eq!(simulation.run_until_settled(100), 0);
    }

    #[test]
    fn settles_without_overlap() {
        let mut simulation = ForceSimulation::new(
            &clusters(&[40, 3, 18, 7, 25, 1, 12]),
            Viewport::new(800.0, 400.0),
            ForceConfig::default(),
        );
        let ticks = simulation.run_until_settled(5_000);

        assert_eq!(simulation.state(), SimulationState::Settled);
        assert!(ticks < 5_000);
        assert!(max_overlap(&simulation) < 0.5, "overlap {}", max_overlap(&simulation));
    }

    #[test]
    fn settled_simulation_does_not_move() {
        let mut simulation = ForceSimulation::new(
            &clusters(&[5, 9, 2]),
            Viewport::default(),
            ForceConfig::default(),
        );
        simulation.run_until_settled(5_000);
        let before = simulation.nodes().to_vec();

        assert!(!simulation.tick());
        assert_eq!(simulation.nodes(), before.as_slice());
    }

    #[test]
    fn stop_cancels_a_running_simulation() {
        let mut simulation = ForceSimulation::new(
            &clusters(&[5, 9, 2]),
            Viewport::default(),
            ForceConfig::default(),
        );
        simulation.tick();
        simulation.stop();
        let before = simulation.nodes().to_vec();

        assert!(!simulation.tick());
        assert!(!simulation.pin(0, vec2(10.0, 10.0)));
        assert_eq!(simulation.nodes(), before.as_slice());
    }

    #[test]
    fn pinned_node_holds_the_pointer_until_released() {
        let viewport = Viewport::new(800.0, 400.0);
        let mut simulation =
            ForceSimulation::new(&clusters(&[30, 10, 20]), viewport, ForceConfig::default());
        simulation.run_until_settled(5_000);

        assert!(simulation.pin(1, vec2(120.0, 90.0)));
        assert!(simulation.is_running());
        for _ in 0..30 {
            simulation.tick();
            assert_eq!(simulation.nodes()[1].position, vec2(120.0, 90.0));
        }

        assert!(simulation.drag_to(1, vec2(-500.0, 90.0)));
        let radius = simulation.nodes()[1].radius;
        assert_eq!(simulation.nodes()[1].position, vec2(radius, 90.0));

        simulation.release(1);
        assert!(!simulation.nodes()[1].pinned);
        simulation.run_until_settled(5_000);
        assert_eq!(simulation.state(), SimulationState::Settled);
    }

    #[test]
    fn drag_requires_a_pin() {
        let mut simulation = ForceSimulation::new(
            &clusters(&[3, 4]),
            Viewport::default(),
            ForceConfig::default(),
        );
        assert!(!simulation.drag_to(0, vec2(50.0, 50.0)));
        assert!(!simulation.pin(7, vec2(50.0, 50.0)));
    }

    #[test]
    fn resize_reclamps_and_reheats() {
        let mut simulation = ForceSimulation::new(
            &clusters(&[50, 20, 5]),
            Viewport::new(800.0, 400.0),
            ForceConfig::default(),
        );
        simulation.run_until_settled(5_000);

        let smaller = Viewport::new(300.0, 200.0);
        simulation.resize(smaller);
        assert!(simulation.is_running());
        assert!(
            simulation
                .nodes()
                .iter()
                .all(|node| smaller.contains_circle(node.position, node.radius, 1e-3))
        );
        assert!(simulation.nodes()[0].radius <= 100.0);
    }

    #[test]
    fn node_at_picks_the_bubble_under_the_pointer() {
        let simulation = ForceSimulation::new(
            &clusters(&[10]),
            Viewport::default(),
            ForceConfig::default(),
        );
        let node = &simulation.nodes()[0];
        assert_eq!(simulation.node_at(node.position), Some(0));
        assert_eq!(
            simulation.node_at(node.position + vec2(node.radius + 1.0, 0.0)),
            None
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn bubbles_stay_inside_the_viewport_every_tick(
            sizes in prop::collection::vec(0u64..500, 1..10),
            width in 120.0f32..900.0,
            height in 120.0f32..700.0,
        ) {
            let viewport = Viewport::new(width, height);
            let mut simulation =
                ForceSimulation::new(&clusters(&sizes), viewport, ForceConfig::default());

            for _ in 0..200 {
                simulation.tick();
                for node in simulation.nodes() {
                    prop_assert!(viewport.contains_circle(node.position, node.radius, 1e-3));
                }
            }
        }

        #[test]
        fn roomy_layouts_converge_without_overlap(
            sizes in prop::collection::vec(1u64..200, 1..8),
        ) {
            let mut simulation = ForceSimulation::new(
                &clusters(&sizes),
                Viewport::new(900.0, 700.0),
                ForceConfig::default(),
            );
            simulation.run_until_settled(5_000);

            prop_assert_eq!(simulation.state(), SimulationState::Settled);
            prop_assert!(max_overlap(&simulation) < 0.5);
        }
    }
}
