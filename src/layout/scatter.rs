use eframe::egui::{Vec2, vec2};

use super::Viewport;
use crate::insights::Cluster;

pub const SCATTER_MARGIN: f32 = 50.0;
const EXTENT_PADDING: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearScale {
    pub domain: (f32, f32),
    pub range: (f32, f32),
}

impl LinearScale {
    /// Domain covering `values` with 10% head room on both ends. A single
    /// repeated value gets one unit either side.
    fn padded(values: impl Iterator<Item = f32>, range: (f32, f32)) -> Option<Self> {
        let (min, max) = values.fold(None, |extent: Option<(f32, f32)>, value| {
            Some(match extent {
                Some((min, max)) => (min.min(value), max.max(value)),
                None => (value, value),
            })
        })?;

        let span = max - min;
        let padding = if span > f32::EPSILON {
            span * EXTENT_PADDING
        } else {
            1.0
        };
        Some(Self {
            domain: (min - padding, max + padding),
            range,
        })
    }

    pub fn map(&self, value: f32) -> f32 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span.abs() <= f32::EPSILON {
            return (r0 + r1) * 0.5;
        }
        r0 + (value - d0) / span * (r1 - r0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScatterPoint {
    pub cluster_index: usize,
    pub feature_index: usize,
    pub data: [f32; 2],
    pub position: Vec2,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScatterCentroid {
    pub cluster_index: usize,
    pub data: [f32; 2],
    pub position: Vec2,
}

/// Features placed by the coordinates the analysis service computed. Nothing
/// is projected here; y grows upward like a chart.
#[derive(Clone, Debug, PartialEq)]
pub struct ScatterLayout {
    pub points: Vec<ScatterPoint>,
    pub centroids: Vec<ScatterCentroid>,
    pub x_scale: Option<LinearScale>,
    pub y_scale: Option<LinearScale>,
}

impl ScatterLayout {
    pub fn compute(clusters: &[Cluster], viewport: Viewport) -> Self {
        let data = clusters
            .iter()
            .flat_map(|cluster| {
                cluster
                    .features
                    .iter()
                    .filter_map(|reference| reference.coordinates)
                    .chain(cluster.centroid)
            })
            .collect::<Vec<_>>();

        let margin = SCATTER_MARGIN.min(viewport.min_side() * 0.25);
        let x_scale = LinearScale::padded(
            data.iter().map(|pair| pair[0]),
            (margin, viewport.width - margin),
        );
        let y_scale = LinearScale::padded(
            data.iter().map(|pair| pair[1]),
            (viewport.height - margin, margin),
        );
        let (Some(x_scale), Some(y_scale)) = (x_scale, y_scale) else {
            return Self {
                points: Vec::new(),
                centroids: Vec::new(),
                x_scale: None,
                y_scale: None,
            };
        };

        let place = |pair: [f32; 2]| vec2(x_scale.map(pair[0]), y_scale.map(pair[1]));

        let mut points = Vec::new();
        let mut centroids = Vec::new();
        for (cluster_index, cluster) in clusters.iter().enumerate() {
            for (feature_index, reference) in cluster.features.iter().enumerate() {
                let Some(pair) = reference.coordinates else {
                    continue;
                };
                points.push(ScatterPoint {
                    cluster_index,
                    feature_index,
                    data: pair,
                    position: place(pair),
                });
            }
            if let Some(pair) = cluster.centroid {
                centroids.push(ScatterCentroid {
                    cluster_index,
                    data: pair,
                    position: place(pair),
                });
            }
        }

        Self {
            points,
            centroids,
            x_scale: Some(x_scale),
            y_scale: Some(y_scale),
        }
    }

    /// True when no feature carries usable coordinates.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point_at(&self, pointer: Vec2, hit_radius: f32) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .map(|(index, point)| (index, (point.position - pointer).length()))
            .filter(|(_, distance)| *distance <= hit_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{ClusterMetadata, Feature, FeatureRef};

    fn cluster(coordinates: &[Option<[f32; 2]>], centroid: Option<[f32; 2]>) -> Cluster {
        Cluster {
            id: "c".to_owned(),
            theme: "Theme".to_owned(),
            size: coordinates.len() as u64,
            centroid,
            metadata: ClusterMetadata::default(),
            features: coordinates
                .iter()
                .map(|coordinates| FeatureRef {
                    feature: Feature::default(),
                    coordinates: *coordinates,
                })
                .collect(),
            summary: None,
        }
    }

    #[test]
    fn extent_is_padded_and_y_is_inverted() {
        let clusters = vec![cluster(&[Some([0.0, 0.0]), Some([10.0, 10.0])], None)];
        let layout = ScatterLayout::compute(&clusters, Viewport::new(400.0, 300.0));

        let x_scale = layout.x_scale.expect("x scale");
        assert_eq!(x_scale.domain, (-1.0, 11.0));
        let low = layout.points[0].position;
        let high = layout.points[1].position;
        assert!(high.x > low.x);
        assert!(high.y < low.y);
        assert!(low.x > 50.0 && high.x < 350.0);
    }

    #[test]
    fn features_without_coordinates_are_skipped() {
        let clusters = vec![
            cluster(&[None, Some([1.0, 2.0])], Some([1.0, 2.0])),
            cluster(&[None], None),
        ];
        let layout = ScatterLayout::compute(&clusters, Viewport::default());

        assert_eq!(layout.points.len(), 1);
        assert_eq!(layout.points[0].feature_index, 1);
        assert_eq!(layout.centroids.len(), 1);
        assert_eq!(layout.points[0].position, layout.centroids[0].position);
        assert_eq!(layout.points[0].position, Viewport::default().center());
    }

    #[test]
    fn no_coordinates_means_empty_layout() {
        let layout = ScatterLayout::compute(&[cluster(&[None, None], None)], Viewport::default());
        assert!(layout.is_empty());
        assert!(layout.x_scale.is_none());
    }

    #[test]
    fn point_at_finds_nearest_hit() {
        let clusters = vec![cluster(&[Some([0.0, 0.0]), Some([10.0, 10.0])], None)];
        let layout = ScatterLayout::compute(&clusters, Viewport::default());
        let target = layout.points[1].position;
        assert_eq!(layout.point_at(target + vec2(2.0, 0.0), 6.0), Some(1));
        assert_eq!(layout.point_at(vec2(-100.0, -100.0), 6.0), None);
    }
}
