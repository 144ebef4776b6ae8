use eframe::egui::Color32;

use super::{CirclePrimitive, StrokeStyle, Tooltip, cluster_color, darker};
use crate::insights::Cluster;
use crate::layout::ScatterLayout;
use crate::util::{format_percent, truncate_label};

pub const EMPTY_MESSAGE: &str = "No valid coordinate data available";
const DESCRIPTION_CHARS: usize = 100;
const POINT_RADIUS: f32 = 6.0;
const CENTROID_RADIUS: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScatterHover {
    Point(usize),
    Centroid(usize),
}

pub fn scatter_points(layout: &ScatterLayout, hovered: Option<ScatterHover>) -> Vec<CirclePrimitive> {
    layout
        .points
        .iter()
        .enumerate()
        .map(|(index, point)| {
            let color = cluster_color(point.cluster_index);
            let is_hovered = hovered == Some(ScatterHover::Point(index));
            CirclePrimitive {
                key: index,
                center: point.position,
                radius: if is_hovered { POINT_RADIUS + 2.0 } else { POINT_RADIUS },
                fill: color,
                stroke: StrokeStyle {
                    width: if is_hovered { 2.5 } else { 1.5 },
                    color: darker(color, 0.5),
                },
            }
        })
        .collect()
}

pub fn scatter_centroids(
    layout: &ScatterLayout,
    hovered: Option<ScatterHover>,
) -> Vec<CirclePrimitive> {
    layout
        .centroids
        .iter()
        .enumerate()
        .map(|(index, centroid)| {
            let is_hovered = hovered == Some(ScatterHover::Centroid(index));
            CirclePrimitive {
                key: index,
                center: centroid.position,
                radius: if is_hovered { CENTROID_RADIUS + 2.0 } else { CENTROID_RADIUS },
                fill: cluster_color(centroid.cluster_index),
                stroke: StrokeStyle {
                    width: if is_hovered { 4.0 } else { 3.0 },
                    color: Color32::WHITE,
                },
            }
        })
        .collect()
}

pub fn scatter_tooltip(
    layout: &ScatterLayout,
    clusters: &[Cluster],
    hovered: ScatterHover,
) -> Option<Tooltip> {
    match hovered {
        ScatterHover::Point(index) => {
            let point = layout.points.get(index)?;
            let cluster = clusters.get(point.cluster_index)?;
            let feature = &cluster.features.get(point.feature_index)?.feature;
            let mut lines = vec![truncate_label(&feature.description, DESCRIPTION_CHARS)];
            lines.push(format!("Cluster: {}", cluster.theme));
            lines.push(format!("Priority: {}", feature.priority));
            if !feature.customer_type.is_empty() {
                lines.push(format!("Customer: {}", feature.customer_type));
            }
            Some(Tooltip {
                title: feature.display_title().to_owned(),
                lines,
            })
        }
        ScatterHover::Centroid(index) => {
            let centroid = layout.centroids.get(index)?;
            let cluster = clusters.get(centroid.cluster_index)?;
            Some(Tooltip {
                title: cluster.theme.clone(),
                lines: vec![
                    "Cluster Center".to_owned(),
                    format!("{} features", cluster.size),
                    format!(
                        "{} High Priority",
                        format_percent(cluster.high_priority_percentage())
                    ),
                ],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{ClusterMetadata, Feature, FeatureRef};
    use crate::layout::Viewport;

    fn clusters() -> Vec<Cluster> {
        vec![Cluster {
            id: "7".to_owned(),
            theme: "Reporting".to_owned(),
            size: 2,
            centroid: Some([0.5, 0.5]),
            metadata: ClusterMetadata {
                high_priority_percentage: 50.0,
                ..ClusterMetadata::default()
            },
            features: vec![
                FeatureRef {
                    feature: Feature {
                        title: "CSV export".to_owned(),
                        description: "d".repeat(120),
                        priority: "High".to_owned(),
                        customer_type: "Enterprise".to_owned(),
                        ..Feature::default()
                    },
                    coordinates: Some([0.0, 0.0]),
                },
                FeatureRef {
                    feature: Feature::default(),
                    coordinates: Some([1.0, 1.0]),
                },
            ],
            summary: None,
        }]
    }

    #[test]
    fn hovered_point_grows() {
        let layout = ScatterLayout::compute(&clusters(), Viewport::default());
        let points = scatter_points(&layout, Some(ScatterHover::Point(1)));
        assert_eq!(points[0].radius, 6.0);
        assert_eq!(points[1].radius, 8.0);

        let centroids = scatter_centroids(&layout, None);
        assert_eq!(centroids[0].radius, 10.0);
        assert_eq!(centroids[0].stroke.color, Color32::WHITE);
    }

    #[test]
    fn point_tooltip_truncates_description() {
        let clusters = clusters();
        let layout = ScatterLayout::compute(&clusters, Viewport::default());

        let tooltip =
            scatter_tooltip(&layout, &clusters, ScatterHover::Point(0)).expect("point exists");
        assert_eq!(tooltip.title, "CSV export");
        assert_eq!(tooltip.lines[0].chars().count(), 103);
        assert_eq!(tooltip.lines[1], "Cluster: Reporting");
        assert_eq!(tooltip.lines[3], "Customer: Enterprise");

        let untitled =
            scatter_tooltip(&layout, &clusters, ScatterHover::Point(1)).expect("point exists");
        assert_eq!(untitled.title, "Untitled request");
        assert_eq!(untitled.lines.len(), 3);
    }

    #[test]
    fn centroid_tooltip_summarizes_cluster() {
        let clusters = clusters();
        let layout = ScatterLayout::compute(&clusters, Viewport::default());
        let tooltip =
            scatter_tooltip(&layout, &clusters, ScatterHover::Centroid(0)).expect("centroid");
        assert_eq!(
            tooltip.lines,
            vec!["Cluster Center", "2 features", "50% High Priority"]
        );
        assert!(scatter_tooltip(&layout, &clusters, ScatterHover::Centroid(3)).is_none());
    }
}
