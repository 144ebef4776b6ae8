use std::ops::Range;

use eframe::egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};

use super::{Margin, Viewport};
use crate::insights::Cluster;
use crate::util::truncate_label;

/// Root name used when the tree is built from a cluster collection.
pub const ROOT_LABEL: &str = "Feature Requests";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HierarchyInput {
    pub name: String,
    #[serde(default)]
    pub children: Vec<HierarchyInput>,
}

impl HierarchyInput {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn branch(name: impl Into<String>, children: Vec<HierarchyInput>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    /// Root, one branch per cluster theme, one leaf per feature title.
    pub fn from_clusters(root_name: impl Into<String>, clusters: &[Cluster]) -> Self {
        let children = clusters
            .iter()
            .map(|cluster| {
                let features = cluster
                    .features
                    .iter()
                    .map(|reference| Self::leaf(reference.feature.display_title()))
                    .collect();
                Self::branch(cluster.theme.clone(), features)
            })
            .collect();
        Self::branch(root_name, children)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HierarchyConfig {
    pub viewport: Viewport,
    pub margin: Margin,
    pub root_label_chars: usize,
    pub label_chars: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(800.0, 400.0),
            margin: Margin {
                top: 20.0,
                right: 160.0,
                bottom: 30.0,
                left: 160.0,
            },
            root_label_chars: 40,
            label_chars: 35,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyNode {
    pub name: String,
    pub label: String,
    pub depth: usize,
    /// Leaf slot for leaves, mean of the children's orders otherwise.
    pub order: f32,
    pub leaf_span: Range<usize>,
    pub position: Vec2,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl HierarchyNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Dendrogram placement: depth runs left to right, leaves are spread evenly
/// top to bottom in input order. Index 0 is the root.
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyLayout {
    nodes: Vec<HierarchyNode>,
    leaf_count: usize,
    max_depth: usize,
    config: HierarchyConfig,
}

impl HierarchyLayout {
    pub fn compute(input: &HierarchyInput, config: &HierarchyConfig) -> Self {
        let mut layout = Self {
            nodes: Vec::new(),
            leaf_count: 0,
            max_depth: 0,
            config: *config,
        };
        layout.insert(input);
        layout.place();
        layout
    }

    /// Flattens the tree in pre-order with an explicit stack, so parents
    /// always precede their children and leaves get slots in input order.
    fn insert(&mut self, root: &HierarchyInput) {
        let mut pending = vec![(root, None, 0)];
        while let Some((input, parent, depth)) = pending.pop() {
            let index = self.nodes.len();
            let budget = if depth == 0 {
                self.config.root_label_chars
            } else {
                self.config.label_chars
            };
            let mut node = HierarchyNode {
                name: input.name.clone(),
                label: truncate_label(&input.name, budget),
                depth,
                order: 0.0,
                leaf_span: 0..0,
                position: Vec2::ZERO,
                parent,
                children: Vec::with_capacity(input.children.len()),
            };
            self.max_depth = self.max_depth.max(depth);

            if input.children.is_empty() {
                let slot = self.leaf_count;
                self.leaf_count += 1;
                node.order = slot as f32;
                node.leaf_span = slot..slot + 1;
            }
            self.nodes.push(node);
            if let Some(parent) = parent {
                self.nodes[parent].children.push(index);
            }

            for child in input.children.iter().rev() {
                pending.push((child, Some(index), depth + 1));
            }
        }

        // Children sit after their parent, so a reverse sweep sees them first.
        for index in (0..self.nodes.len()).rev() {
            let node = &self.nodes[index];
            if node.is_leaf() {
                continue;
            }

            let mut order_sum = 0.0;
            let mut span_start = usize::MAX;
            let mut span_end = 0;
            for &child in &node.children {
                let child = &self.nodes[child];
                order_sum += child.order;
                span_start = span_start.min(child.leaf_span.start);
                span_end = span_end.max(child.leaf_span.end);
            }

            let child_count = node.children.len() as f32;
            let node = &mut self.nodes[index];
            node.order = order_sum / child_count;
            node.leaf_span = span_start..span_end;
        }
    }

    fn place(&mut self) {
        let margin = self.config.margin;
        let inner = margin.inner(self.config.viewport);
        let leaves = self.leaf_count.max(1) as f32;
        let max_depth = self.max_depth;

        for node in &mut self.nodes {
            let x = if max_depth == 0 {
                margin.left
            } else {
                margin.left + node.depth as f32 / max_depth as f32 * inner.x
            };
            let y = margin.top + (node.order + 0.5) / leaves * inner.y;
            node.position = vec2(x, y);
        }
    }

    pub fn nodes(&self) -> &[HierarchyNode] {
        &self.nodes
    }

    pub fn root(&self) -> Option<&HierarchyNode> {
        self.nodes.first()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    pub fn leaves(&self) -> impl Iterator<Item = (usize, &HierarchyNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_leaf())
    }

    /// Vertical extent owned by a node's subtree.
    pub fn band(&self, index: usize) -> Option<Range<f32>> {
        let node = self.nodes.get(index)?;
        let top = self.config.margin.top;
        let height = self.config.margin.inner(self.config.viewport).y;
        let leaves = self.leaf_count.max(1) as f32;
        Some(
            top + node.leaf_span.start as f32 / leaves * height
                ..top + node.leaf_span.end as f32 / leaves * height,
        )
    }

    /// `index` first, root last. Empty for an unknown index.
    pub fn path_to_root(&self, index: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut cursor = self.nodes.get(index).map(|_| index);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.nodes[current].parent;
        }
        path
    }

    /// Position of the node's depth-1 ancestor among the root's children.
    pub fn branch_ordinal(&self, index: usize) -> Option<usize> {
        let path = self.path_to_root(index);
        let top_branch = *path.iter().rev().nth(1)?;
        self.nodes
            .first()?
            .children
            .iter()
            .position(|child| *child == top_branch)
    }

    pub fn node_at(&self, point: Vec2, hit_radius: f32) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (index, (node.position - point).length()))
            .filter(|(_, distance)| *distance <= hit_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::insights::{ClusterMetadata, Feature, FeatureRef};

    fn config() -> HierarchyConfig {
        HierarchyConfig {
            viewport: Viewport::new(600.0, 450.0),
            margin: Margin {
                top: 25.0,
                right: 100.0,
                bottom: 25.0,
                left: 100.0,
            },
            ..HierarchyConfig::default()
        }
    }

    fn three_and_one() -> HierarchyInput {
        HierarchyInput::branch(
            "root",
            vec![
                HierarchyInput::branch(
                    "A",
                    vec![
                        HierarchyInput::leaf("a1"),
                        HierarchyInput::leaf("a2"),
                        HierarchyInput::leaf("a3"),
                    ],
                ),
                HierarchyInput::branch("B", vec![HierarchyInput::leaf("b1")]),
            ],
        )
    }

    #[test]
    fn very_deep_chains_do_not_exhaust_the_stack() {
        const DEPTH: usize = 100_000;
        let mut chain = HierarchyInput::leaf("bottom");
        for level in (0..DEPTH).rev() {
            chain = HierarchyInput::branch(format!("n{level}"), vec![chain]);
        }

        let layout = HierarchyLayout::compute(&chain, &config());
        assert_eq!(layout.nodes().len(), DEPTH + 1);
        assert_eq!(layout.max_depth(), DEPTH);
        assert_eq!(layout.leaf_count(), 1);
        assert_eq!(layout.nodes()[DEPTH].name, "bottom");
        assert_eq!(layout.nodes()[0].leaf_span, 0..1);

        // Unwind by hand; the derived drop would recurse once per level.
        while let Some(child) = chain.children.pop() {
            chain = child;
        }
    }

    #[test]
    fn branches_share_vertical_span_by_leaf_count() {
        let layout = HierarchyLayout::compute(&three_and_one(), &config());
        let branch_a = layout.nodes()[0].children[0];
        let branch_b = layout.nodes()[0].children[1];

        let band_a = layout.band(branch_a).expect("A exists");
        let band_b = layout.band(branch_b).expect("B exists");
        let span = 400.0;
        assert!(((band_a.end - band_a.start) - span * 0.75).abs() < 1e-3);
        assert!(((band_b.end - band_b.start) - span * 0.25).abs() < 1e-3);
        assert_eq!(band_a.end, band_b.start);
    }

    #[test]
    fn depth_maps_to_columns_and_parents_center_on_children() {
        let layout = HierarchyLayout::compute(&three_and_one(), &config());
        let nodes = layout.nodes();

        assert_eq!(layout.max_depth(), 2);
        assert_eq!(layout.leaf_count(), 4);
        assert_eq!(nodes[0].position.x, 100.0);
        assert_eq!(nodes[1].position.x, 300.0);
        assert_eq!(nodes[2].position.x, 500.0);

        let branch_a = &nodes[1];
        assert_eq!(branch_a.order, 1.0);
        assert_eq!(branch_a.leaf_span, 0..3);
        assert_eq!(nodes[0].order, 2.0);
        assert_eq!(nodes[2].position.y, 25.0 + 0.5 / 4.0 * 400.0);
    }

    #[test]
    fn single_root_sits_in_the_middle_of_the_left_margin() {
        let layout = HierarchyLayout::compute(&HierarchyInput::leaf("only"), &config());
        let root = layout.root().expect("root");
        assert_eq!(root.position, vec2(100.0, 225.0));
        assert_eq!(layout.path_to_root(0), vec![0]);
        assert_eq!(layout.branch_ordinal(0), None);
    }

    #[test]
    fn labels_are_truncated_but_names_kept() {
        let long = "x".repeat(60);
        let input = HierarchyInput::branch(&long, vec![HierarchyInput::leaf(&long)]);
        let layout = HierarchyLayout::compute(&input, &HierarchyConfig::default());

        assert_eq!(layout.nodes()[0].label.chars().count(), 43);
        assert_eq!(layout.nodes()[1].label.chars().count(), 38);
        assert_eq!(layout.nodes()[1].name, long);
    }

    #[test]
    fn path_to_root_walks_parents() {
        let layout = HierarchyLayout::compute(&three_and_one(), &config());
        let b1 = layout
            .nodes()
            .iter()
            .position(|node| node.name == "b1")
            .expect("b1");
        let path = layout.path_to_root(b1);
        let names = path
            .iter()
            .map(|index| layout.nodes()[*index].name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["b1", "B", "root"]);
        assert_eq!(layout.branch_ordinal(b1), Some(1));
        assert!(layout.path_to_root(99).is_empty());
    }

    #[test]
    fn clusters_become_theme_branches() {
        let feature = |title: &str| FeatureRef {
            feature: Feature {
                title: title.to_owned(),
                ..Feature::default()
            },
            coordinates: None,
        };
        let clusters = vec![
            Cluster {
                id: "1".to_owned(),
                theme: "Exports".to_owned(),
                size: 2,
                centroid: None,
                metadata: ClusterMetadata::default(),
                features: vec![feature("CSV"), feature("")],
                summary: None,
            },
            Cluster {
                id: "2".to_owned(),
                theme: "Empty".to_owned(),
                size: 0,
                centroid: None,
                metadata: ClusterMetadata::default(),
                features: Vec::new(),
                summary: None,
            },
        ];

        let input = HierarchyInput::from_clusters("Feature requests", &clusters);
        assert_eq!(input.children.len(), 2);
        assert_eq!(input.children[0].children[1].name, "Untitled request");

        let layout = HierarchyLayout::compute(&input, &HierarchyConfig::default());
        assert_eq!(layout.leaf_count(), 3);
    }

    #[test]
    fn layout_is_deterministic() {
        let first = HierarchyLayout::compute(&three_and_one(), &config());
        let second = HierarchyLayout::compute(&three_and_one(), &config());
        assert_eq!(first, second);
    }

    fn tree_strategy() -> impl Strategy<Value = HierarchyInput> {
        let leaf = "[a-z]{1,6}".prop_map(HierarchyInput::leaf);
        leaf.prop_recursive(4, 48, 5, |inner| {
            ("[A-Z]{1,6}", prop::collection::vec(inner, 1..5))
                .prop_map(|(name, children)| HierarchyInput::branch(name, children))
        })
    }

    proptest! {
        #[test]
        fn leaf_orders_increase_in_input_order(input in tree_strategy()) {
            let layout = HierarchyLayout::compute(&input, &HierarchyConfig::default());
            let leaves = layout.leaves().map(|(_, node)| node).collect::<Vec<_>>();

            prop_assert_eq!(leaves.len(), layout.leaf_count());
            for pair in leaves.windows(2) {
                prop_assert!(pair[0].order < pair[1].order);
                prop_assert!(pair[0].position.y < pair[1].position.y);
            }
            for node in layout.nodes() {
                if let Some(parent) = node.parent {
                    prop_assert_eq!(layout.nodes()[parent].depth + 1, node.depth);
                    prop_assert!(layout.nodes()[parent].position.x < node.position.x);
                }
            }
        }
    }
}
