//! Headless rendering: settles every layout for a fixed surface and writes the
//! drawable result as JSON.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use eframe::egui::{Color32, Vec2};
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::insights::{AnalysisContext, AnalysisResult, Cluster, FetchOptions};
use crate::layout::{
    ForceConfig, ForceSimulation, HierarchyConfig, HierarchyInput, HierarchyLayout, ROOT_LABEL,
    ScatterLayout, Viewport,
};
use crate::viz::bubble::{BubbleHighlight, bubble_circles, legend_entries, legend_origin_x};
use crate::viz::dendrogram::{dendrogram_labels, dendrogram_links, dendrogram_nodes};
use crate::viz::scatter::{EMPTY_MESSAGE, scatter_centroids, scatter_points};
use crate::viz::{CirclePrimitive, hex};

pub const MAX_SETTLE_TICKS: usize = 2_000;
const FETCH_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Paint {
    pub color: String,
    pub opacity: f32,
}

impl From<Color32> for Paint {
    fn from(color: Color32) -> Self {
        Self {
            color: hex(color),
            opacity: f32::from(color.a()) / 255.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CircleExport {
    pub position: [f32; 2],
    pub radius: f32,
    pub fill: Paint,
    pub stroke: Paint,
    pub stroke_width: f32,
}

impl From<&CirclePrimitive> for CircleExport {
    fn from(circle: &CirclePrimitive) -> Self {
        Self {
            position: point(circle.center),
            radius: circle.radius,
            fill: circle.fill.into(),
            stroke: circle.stroke.color.into(),
            stroke_width: circle.stroke.width,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BubbleExport {
    pub cluster_id: String,
    pub theme: String,
    pub size: u64,
    #[serde(flatten)]
    pub circle: CircleExport,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendExport {
    pub label: String,
    pub detail: String,
    pub color: String,
    pub offset: [f32; 2],
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BubbleChartExport {
    /// Width of the area the bubbles were laid out in.
    pub chart_width: f32,
    /// Top-left of the legend column; absent when the surface is too narrow
    /// for one and the legend is omitted.
    pub legend_origin: Option<[f32; 2]>,
    pub ticks: usize,
    pub settled: bool,
    pub bubbles: Vec<BubbleExport>,
    pub legend: Vec<LegendExport>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DendrogramNodeExport {
    pub name: String,
    pub depth: usize,
    pub parent: Option<usize>,
    pub label: Option<String>,
    #[serde(flatten)]
    pub circle: CircleExport,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkExport {
    pub source: usize,
    pub target: usize,
    pub points: Vec<[f32; 2]>,
    pub stroke: Paint,
    pub stroke_width: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DendrogramExport {
    pub leaf_count: usize,
    pub max_depth: usize,
    pub nodes: Vec<DendrogramNodeExport>,
    pub links: Vec<LinkExport>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatterPointExport {
    pub cluster_id: String,
    pub title: String,
    pub data: [f32; 2],
    #[serde(flatten)]
    pub circle: CircleExport,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatterExport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub points: Vec<ScatterPointExport>,
    pub centroids: Vec<ScatterPointExport>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayoutExport {
    pub context: String,
    pub viewport: Viewport,
    pub total_features: u64,
    pub bubble_chart: BubbleChartExport,
    pub dendrogram: DendrogramExport,
    pub scatter: ScatterExport,
    pub clusters: Vec<Cluster>,
}

fn point(vector: Vec2) -> [f32; 2] {
    [vector.x, vector.y]
}

fn bubble_chart(clusters: &[Cluster], viewport: Viewport, force: ForceConfig) -> BubbleChartExport {
    let legend_x = legend_origin_x(viewport.width);
    let chart = Viewport::new(legend_x.unwrap_or(viewport.width), viewport.height);
    let mut simulation = ForceSimulation::new(clusters, chart, force);
    let ticks = simulation.run_until_settled(MAX_SETTLE_TICKS);
    let settled = !simulation.is_running();
    simulation.stop();

    let circles = bubble_circles(simulation.nodes(), BubbleHighlight::default());
    let bubbles = simulation
        .nodes()
        .iter()
        .zip(&circles)
        .map(|(node, circle)| BubbleExport {
            cluster_id: node.cluster_id.clone(),
            theme: clusters
                .get(node.cluster_index)
                .map(|cluster| cluster.theme.clone())
                .unwrap_or_default(),
            size: node.size,
            circle: circle.into(),
        })
        .collect();

    let legend = legend_x
        .map(|_| legend_entries(clusters, viewport.height))
        .unwrap_or_default()
        .into_iter()
        .map(|entry| LegendExport {
            label: entry.label,
            detail: entry.detail,
            color: hex(entry.color),
            offset: point(entry.offset),
        })
        .collect();

    BubbleChartExport {
        chart_width: chart.width,
        legend_origin: legend_x.map(|x| [x, 0.0]),
        ticks,
        settled,
        bubbles,
        legend,
    }
}

fn dendrogram(clusters: &[Cluster], viewport: Viewport) -> DendrogramExport {
    let input = HierarchyInput::from_clusters(ROOT_LABEL, clusters);
    let config = HierarchyConfig {
        viewport,
        ..HierarchyConfig::default()
    };
    let layout = HierarchyLayout::compute(&input, &config);

    let mut labels = dendrogram_labels(&layout, None, false)
        .into_iter()
        .map(|label| (label.key, label.text))
        .collect::<HashMap<_, _>>();

    let nodes = layout
        .nodes()
        .iter()
        .zip(dendrogram_nodes(&layout, None))
        .enumerate()
        .map(|(index, (node, circle))| DendrogramNodeExport {
            name: node.name.clone(),
            depth: node.depth,
            parent: node.parent,
            label: labels.remove(&index),
            circle: (&circle).into(),
        })
        .collect();

    let links = dendrogram_links(&layout, None)
        .into_iter()
        .map(|link| LinkExport {
            source: link.source,
            target: link.target,
            points: link.points.iter().copied().map(point).collect(),
            stroke: link.stroke.color.into(),
            stroke_width: link.stroke.width,
        })
        .collect();

    DendrogramExport {
        leaf_count: layout.leaf_count(),
        max_depth: layout.max_depth(),
        nodes,
        links,
    }
}

fn scatter(clusters: &[Cluster], viewport: Viewport) -> ScatterExport {
    let layout = ScatterLayout::compute(clusters, viewport);
    let cluster_id = |index: usize| {
        clusters
            .get(index)
            .map(|cluster| cluster.id.clone())
            .unwrap_or_default()
    };

    let points = layout
        .points
        .iter()
        .zip(scatter_points(&layout, None))
        .map(|(point, circle)| ScatterPointExport {
            cluster_id: cluster_id(point.cluster_index),
            title: clusters
                .get(point.cluster_index)
                .and_then(|cluster| cluster.features.get(point.feature_index))
                .map(|reference| reference.feature.display_title().to_owned())
                .unwrap_or_default(),
            data: point.data,
            circle: (&circle).into(),
        })
        .collect();

    let centroids = layout
        .centroids
        .iter()
        .zip(scatter_centroids(&layout, None))
        .map(|(centroid, circle)| ScatterPointExport {
            cluster_id: cluster_id(centroid.cluster_index),
            title: clusters
                .get(centroid.cluster_index)
                .map(|cluster| cluster.theme.clone())
                .unwrap_or_default(),
            data: centroid.data,
            circle: (&circle).into(),
        })
        .collect();

    ScatterExport {
        message: layout.is_empty().then(|| EMPTY_MESSAGE.to_owned()),
        points,
        centroids,
    }
}

pub fn build_export(
    context: &AnalysisContext,
    result: &AnalysisResult,
    viewport: Viewport,
    force: ForceConfig,
) -> LayoutExport {
    LayoutExport {
        context: context.to_string(),
        viewport,
        total_features: result.total_features,
        bubble_chart: bubble_chart(&result.clusters, viewport, force),
        dendrogram: dendrogram(&result.clusters, viewport),
        scatter: scatter(&result.clusters, viewport),
        clusters: result.clusters.clone(),
    }
}

pub fn write_export(path: &Path, export: &LayoutExport) -> Result<()> {
    let json = serde_json::to_string_pretty(export).context("failed to encode layout export")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Fetches the configured analysis, lays it out and writes the JSON file.
pub fn run(settings: &Settings, path: &Path) -> Result<()> {
    let Some(context) = settings.context.clone() else {
        bail!("--export needs --context-id to know which analysis to render");
    };

    let mut coordinator = settings.coordinator()?;
    let handle = coordinator.fetch_clusters(&context, FetchOptions::default());
    let result = coordinator
        .wait_for(&handle, settings.request_timeout + FETCH_GRACE)
        .with_context(|| format!("failed to load clusters for {context}"))?;

    let export = build_export(&context, &result, settings.viewport, settings.force);
    write_export(path, &export)?;
    info!(
        context = %context,
        path = %path.display(),
        clusters = result.clusters.len(),
        settled = export.bubble_chart.settled,
        "layout export written"
    );
    Ok(())
}
