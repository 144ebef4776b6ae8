use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisContext(String);

impl AnalysisContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub customer_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl Feature {
    pub fn is_high_priority(&self) -> bool {
        matches!(
            self.priority.trim().to_ascii_lowercase().as_str(),
            "high" | "critical"
        )
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled request"
        } else {
            &self.title
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRef {
    pub feature: Feature,
    pub coordinates: Option<[f32; 2]>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    pub high_priority_percentage: f32,
    pub coherence_score: Option<f32>,
    pub avg_distance: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub theme: String,
    pub size: u64,
    pub centroid: Option<[f32; 2]>,
    pub metadata: ClusterMetadata,
    pub features: Vec<FeatureRef>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl Cluster {
    pub fn high_priority_percentage(&self) -> f32 {
        self.metadata.high_priority_percentage.clamp(0.0, 100.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonRequest {
    pub name: String,
    pub count: u64,
    pub summary: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PainPoint {
    pub name: String,
    pub percentage: f32,
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendPoint {
    pub month: String,
    pub requests: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityScore {
    pub score: Value,
    pub description: String,
}

impl PriorityScore {
    pub fn score_text(&self) -> String {
        match &self.score {
            Value::String(text) => text.clone(),
            Value::Number(number) => number
                .as_f64()
                .map(|value| format!("{value:.1}"))
                .unwrap_or_else(|| number.to_string()),
            Value::Null => "n/a".to_owned(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insights {
    pub most_common_requests: Vec<CommonRequest>,
    pub top_pain_points: Vec<PainPoint>,
    pub trends_over_time: Vec<TrendPoint>,
    pub average_priority_score: Option<PriorityScore>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub clusters: Vec<Cluster>,
    pub insights: Option<Insights>,
    pub total_features: u64,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn max_cluster_size(&self) -> u64 {
        self.clusters
            .iter()
            .map(|cluster| cluster.size)
            .max()
            .unwrap_or(0)
    }

    pub fn clusters_by_size(&self) -> Vec<usize> {
        let mut order = (0..self.clusters.len()).collect::<Vec<_>>();
        order.sort_by(|a, b| self.clusters[*b].size.cmp(&self.clusters[*a].size));
        order
    }
}
