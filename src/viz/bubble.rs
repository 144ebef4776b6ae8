use std::collections::HashSet;

use eframe::egui::{Color32, Vec2, vec2};

use super::{
    CirclePrimitive, HOVER_STROKE, StrokeStyle, Tooltip, cluster_color, darker, with_opacity,
};
use crate::insights::Cluster;
use crate::layout::LayoutNode;
use crate::util::{format_percent, format_requests, truncate_label};

pub const LEGEND_WIDTH: f32 = 250.0;
pub const LEGEND_INSET: Vec2 = vec2(20.0, 20.0);
pub const LEGEND_LABEL_CHARS: usize = 30;
const LEGEND_MAX_SPACING: f32 = 60.0;

#[derive(Clone, Copy, Debug, Default)]
pub struct BubbleHighlight<'a> {
    pub hovered: Option<usize>,
    /// Search hits; `None` when no search is active.
    pub matches: Option<&'a HashSet<usize>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub cluster_index: usize,
    pub color: Color32,
    pub label: String,
    pub detail: String,
    /// Swatch center relative to the legend's top-left corner.
    pub offset: Vec2,
}

pub fn priority_summary(cluster: &Cluster) -> String {
    format!(
        "{} • {} High Priority",
        format_requests(cluster.size),
        format_percent(cluster.high_priority_percentage())
    )
}

pub fn bubble_circles(nodes: &[LayoutNode], highlight: BubbleHighlight<'_>) -> Vec<CirclePrimitive> {
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let base = cluster_color(node.cluster_index);
            let dimmed = highlight
                .matches
                .is_some_and(|matches| !matches.contains(&index));
            let fill = if dimmed { with_opacity(base, 0.25) } else { base };

            let stroke = if highlight.hovered == Some(index) {
                StrokeStyle {
                    width: 2.0,
                    color: HOVER_STROKE,
                }
            } else {
                StrokeStyle {
                    width: 1.5,
                    color: darker(base, 0.2),
                }
            };

            CirclePrimitive {
                key: index,
                center: node.position,
                radius: node.radius,
                fill,
                stroke,
            }
        })
        .collect()
}

/// Left edge of the legend column, or `None` when the surface is too narrow
/// to give the legend its own column.
pub fn legend_origin_x(width: f32) -> Option<f32> {
    (width > LEGEND_WIDTH * 2.0).then(|| width - LEGEND_WIDTH)
}

pub fn legend_spacing(height: f32, cluster_count: usize) -> f32 {
    LEGEND_MAX_SPACING.min((height / (cluster_count + 1) as f32).floor())
}

pub fn legend_entries(clusters: &[Cluster], height: f32) -> Vec<LegendEntry> {
    let spacing = legend_spacing(height, clusters.len());
    clusters
        .iter()
        .enumerate()
        .map(|(index, cluster)| LegendEntry {
            cluster_index: index,
            color: cluster_color(index),
            label: truncate_label(&cluster.theme, LEGEND_LABEL_CHARS),
            detail: priority_summary(cluster),
            offset: LEGEND_INSET + vec2(0.0, index as f32 * spacing),
        })
        .collect()
}

pub fn bubble_tooltip(cluster: &Cluster) -> Tooltip {
    Tooltip {
        title: cluster.theme.clone(),
        lines: vec![
            format_requests(cluster.size),
            format!("{} High Priority", format_percent(cluster.high_priority_percentage())),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::ClusterMetadata;

    fn cluster(theme: &str, size: u64, high_priority: f32) -> Cluster {
        Cluster {
            id: theme.to_owned(),
            theme: theme.to_owned(),
            size,
            centroid: None,
            metadata: ClusterMetadata {
                high_priority_percentage: high_priority,
                ..ClusterMetadata::default()
            },
            features: Vec::new(),
            summary: None,
        }
    }

    fn node(cluster_index: usize) -> LayoutNode {
        LayoutNode {
            cluster_id: cluster_index.to_string(),
            cluster_index,
            size: 1,
            radius: 10.0,
            position: vec2(50.0, 50.0),
            velocity: Vec2::ZERO,
            pinned: false,
        }
    }

    #[test]
    fn legend_truncates_and_summarizes() {
        let clusters = vec![
            cluster("A theme that is far too long for the legend", 12, 41.6),
            cluster("Auth", 1, 0.0),
        ];
        let entries = legend_entries(&clusters, 400.0);

        assert_eq!(entries[0].label, "A theme that is far too long f...");
        assert_eq!(entries[0].detail, "12 requests • 42% High Priority");
        assert_eq!(entries[1].detail, "1 request • 0% High Priority");
        assert_eq!(entries[1].offset.y - entries[0].offset.y, 60.0);
    }

    #[test]
    fn legend_spacing_shrinks_for_many_clusters() {
        assert_eq!(legend_spacing(400.0, 3), 60.0);
        assert_eq!(legend_spacing(400.0, 19), 20.0);
        assert_eq!(legend_spacing(400.0, 20), 19.0);
    }

    #[test]
    fn hovered_bubble_gets_the_dark_outline() {
        let nodes = vec![node(0), node(1)];
        let circles = bubble_circles(
            &nodes,
            BubbleHighlight {
                hovered: Some(1),
                matches: None,
            },
        );

        assert_eq!(circles[0].stroke.width, 1.5);
        assert_eq!(circles[0].stroke.color, darker(cluster_color(0), 0.2));
        assert_eq!(circles[1].stroke.color, HOVER_STROKE);
        assert_eq!(circles[1].fill, cluster_color(1));
    }

    #[test]
    fn search_dims_non_matching_bubbles() {
        let nodes = vec![node(0), node(1)];
        let matches = HashSet::from([0]);
        let circles = bubble_circles(
            &nodes,
            BubbleHighlight {
                hovered: None,
                matches: Some(&matches),
            },
        );

        assert_eq!(circles[0].fill, cluster_color(0));
        assert_ne!(circles[1].fill, cluster_color(1));
    }

    #[test]
    fn legend_takes_a_column_only_on_wide_surfaces() {
        assert_eq!(legend_origin_x(800.0), Some(550.0));
        assert_eq!(legend_origin_x(500.0), None);
        assert_eq!(legend_origin_x(320.0), None);
    }

    #[test]
    fn tooltip_rounds_priority() {
        let tooltip = bubble_tooltip(&cluster("Exports", 7, 85.5));
        assert_eq!(tooltip.title, "Exports");
        assert_eq!(tooltip.lines, vec!["7 requests", "86% High Priority"]);
    }
}
