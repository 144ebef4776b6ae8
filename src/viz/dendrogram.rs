use std::collections::HashSet;

use eframe::egui::{Color32, Vec2, vec2};

use super::{
    CirclePrimitive, LabelPrimitive, LinkPrimitive, MUTED_TEXT, NEUTRAL, PALETTE, StrokeStyle,
    TextAnchor, Tooltip, cluster_color, with_opacity,
};
use crate::layout::HierarchyLayout;

const LINK_SAMPLES: usize = 24;
const LINK_WIDTH: f32 = 1.5;
const LINK_OPACITY: f32 = 0.7;
const HIGHLIGHT_WIDTH: f32 = 2.5;
const LABEL_OFFSET: f32 = 8.0;

/// Horizontal cubic from `start` to `end` with both control points on the
/// vertical midline, sampled into a polyline.
pub fn link_curve(start: Vec2, end: Vec2, samples: usize) -> Vec<Vec2> {
    let samples = samples.max(2);
    let mid_x = (start.x + end.x) * 0.5;
    let control_a = vec2(mid_x, start.y);
    let control_b = vec2(mid_x, end.y);

    (0..samples)
        .map(|step| {
            let t = step as f32 / (samples - 1) as f32;
            let u = 1.0 - t;
            start * (u * u * u)
                + control_a * (3.0 * u * u * t)
                + control_b * (3.0 * u * t * t)
                + end * (t * t * t)
        })
        .collect()
}

fn branch_color(layout: &HierarchyLayout, index: usize) -> Option<Color32> {
    let node = layout.nodes().get(index)?;
    if node.depth != 1 {
        return None;
    }
    layout.branch_ordinal(index).map(cluster_color)
}

fn highlighted_path(layout: &HierarchyLayout, hovered: Option<usize>) -> HashSet<usize> {
    hovered
        .map(|index| layout.path_to_root(index).into_iter().collect())
        .unwrap_or_default()
}

/// One link per non-root node, drawn from parent to child. Links into the
/// first level take their branch color, deeper ones stay neutral.
pub fn dendrogram_links(layout: &HierarchyLayout, hovered: Option<usize>) -> Vec<LinkPrimitive> {
    let path = highlighted_path(layout, hovered);
    let nodes = layout.nodes();

    nodes
        .iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let parent = node.parent?;
            let color = branch_color(layout, index).unwrap_or(NEUTRAL);
            let on_path = path.contains(&index);
            let stroke = if on_path {
                StrokeStyle {
                    width: HIGHLIGHT_WIDTH,
                    color,
                }
            } else {
                StrokeStyle {
                    width: LINK_WIDTH,
                    color: with_opacity(color, LINK_OPACITY),
                }
            };

            Some(LinkPrimitive {
                source: parent,
                target: index,
                points: link_curve(nodes[parent].position, node.position, LINK_SAMPLES),
                stroke,
            })
        })
        .collect()
}

pub fn dendrogram_nodes(layout: &HierarchyLayout, hovered: Option<usize>) -> Vec<CirclePrimitive> {
    layout
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let is_root = node.parent.is_none();
            let is_hovered = hovered == Some(index);
            let (fill, stroke_color) = if is_root {
                (Color32::WHITE, PALETTE[0])
            } else {
                let color = branch_color(layout, index).unwrap_or(NEUTRAL);
                (color, color)
            };

            let base_radius = if is_root { 6.0 } else { 5.0 };
            let base_width = if is_root { 2.0 } else { 1.5 };
            CirclePrimitive {
                key: index,
                center: node.position,
                radius: if is_hovered { base_radius + 2.0 } else { base_radius },
                fill,
                stroke: StrokeStyle {
                    width: if is_hovered { HIGHLIGHT_WIDTH } else { base_width },
                    color: stroke_color,
                },
            }
        })
        .collect()
}

/// Labels that should be on screen. The root is always labelled, other nodes
/// only while hovered unless `show_all` is set.
pub fn dendrogram_labels(
    layout: &HierarchyLayout,
    hovered: Option<usize>,
    show_all: bool,
) -> Vec<LabelPrimitive> {
    layout
        .nodes()
        .iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let is_root = node.parent.is_none();
            let is_hovered = hovered == Some(index);
            if !(is_root || is_hovered || show_all) {
                return None;
            }

            let (offset, anchor) = if node.is_leaf() {
                (LABEL_OFFSET, TextAnchor::Start)
            } else {
                (-LABEL_OFFSET, TextAnchor::End)
            };
            let base_size = if is_root { 16.0 } else { 14.0 };

            Some(LabelPrimitive {
                key: index,
                position: node.position + vec2(offset, 0.0),
                text: node.label.clone(),
                anchor,
                size: if is_hovered { base_size + 1.0 } else { base_size },
                strong: is_root || is_hovered,
                color: branch_color(layout, index).unwrap_or(MUTED_TEXT),
            })
        })
        .collect()
}

pub fn dendrogram_tooltip(layout: &HierarchyLayout, index: usize) -> Option<Tooltip> {
    let node = layout.nodes().get(index)?;
    let leaves = node.leaf_span.len();
    let lines = if node.is_leaf() {
        Vec::new()
    } else {
        vec![format!(
            "{leaves} {}",
            if leaves == 1 { "request" } else { "requests" }
        )]
    };
    Some(Tooltip {
        title: node.name.clone(),
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{HierarchyConfig, HierarchyInput};

    fn layout() -> HierarchyLayout {
        let input = HierarchyInput::branch(
            "Requests",
            vec![
                HierarchyInput::branch(
                    "Exports",
                    vec![HierarchyInput::leaf("CSV"), HierarchyInput::leaf("PDF")],
                ),
                HierarchyInput::branch("Auth", vec![HierarchyInput::leaf("SSO")]),
            ],
        );
        HierarchyLayout::compute(&input, &HierarchyConfig::default())
    }

    fn index_of(layout: &HierarchyLayout, name: &str) -> usize {
        layout
            .nodes()
            .iter()
            .position(|node| node.name == name)
            .expect("node exists")
    }

    #[test]
    fn curve_starts_and_ends_on_the_nodes() {
        let points = link_curve(vec2(0.0, 0.0), vec2(100.0, 50.0), 11);
        assert_eq!(points.len(), 11);
        assert_eq!(points[0], vec2(0.0, 0.0));
        assert!((points[10] - vec2(100.0, 50.0)).length() < 1e-3);
        assert!((points[5] - vec2(50.0, 25.0)).length() < 1e-3);
    }

    #[test]
    fn first_level_links_carry_branch_colors() {
        let layout = layout();
        let links = dendrogram_links(&layout, None);
        assert_eq!(links.len(), layout.nodes().len() - 1);

        let auth = index_of(&layout, "Auth");
        let sso = index_of(&layout, "SSO");
        let auth_link = links.iter().find(|link| link.target == auth).expect("auth link");
        let sso_link = links.iter().find(|link| link.target == sso).expect("sso link");

        assert_eq!(auth_link.stroke.color, with_opacity(cluster_color(1), LINK_OPACITY));
        assert_eq!(sso_link.stroke.color, with_opacity(NEUTRAL, LINK_OPACITY));
    }

    #[test]
    fn hover_highlights_the_path_to_root() {
        let layout = layout();
        let pdf = index_of(&layout, "PDF");
        let exports = index_of(&layout, "Exports");
        let links = dendrogram_links(&layout, Some(pdf));

        let widened = links
            .iter()
            .filter(|link| link.stroke.width == HIGHLIGHT_WIDTH)
            .map(|link| link.target)
            .collect::<HashSet<_>>();
        assert_eq!(widened, HashSet::from([pdf, exports]));

        let nodes = dendrogram_nodes(&layout, Some(pdf));
        assert_eq!(nodes[pdf].radius, 7.0);
        assert_eq!(nodes[0].radius, 6.0);
    }

    #[test]
    fn only_root_and_hovered_labels_show() {
        let layout = layout();
        let csv = index_of(&layout, "CSV");

        let labels = dendrogram_labels(&layout, Some(csv), false);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].anchor, TextAnchor::End);
        assert_eq!(labels[1].text, "CSV");
        assert_eq!(labels[1].anchor, TextAnchor::Start);
        assert_eq!(labels[1].size, 15.0);

        assert_eq!(dendrogram_labels(&layout, None, true).len(), layout.nodes().len());
    }

    #[test]
    fn branch_tooltip_counts_requests() {
        let layout = layout();
        let tooltip = dendrogram_tooltip(&layout, index_of(&layout, "Exports")).expect("node");
        assert_eq!(tooltip.title, "Exports");
        assert_eq!(tooltip.lines, vec!["2 requests"]);
        assert!(dendrogram_tooltip(&layout, 99).is_none());
    }
}
