use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::error::FetchError;
use super::model::{AnalysisResult, Cluster, ClusterMetadata, Feature, FeatureRef, Insights};

const INSIGHT_KEYS: [&str; 8] = [
    "most_common_requests",
    "top_pain_points",
    "most_engaged_customers",
    "requests_by_category",
    "trends_over_time",
    "requests_by_customer_type",
    "average_priority_score",
    "cluster_insights",
];

const TITLE_KEYS: [&str; 3] = ["Feature Title", "title", "feature_title"];
const DESCRIPTION_KEYS: [&str; 2] = ["Description", "description"];
const PRIORITY_KEYS: [&str; 2] = ["Priority", "priority"];
const CUSTOMER_TYPE_KEYS: [&str; 3] = ["Customer Type", "customer_type", "customerType"];

pub fn parse_analysis_response(raw: &str) -> Result<AnalysisResult, FetchError> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|error| FetchError::Decode(format!("invalid JSON: {error}")))?;

    let (cluster_values, object) = match &parsed {
        Value::Array(items) => (items.as_slice(), None),
        Value::Object(object) => {
            let clusters = object
                .get("clusters")
                .and_then(Value::as_array)
                .ok_or_else(|| FetchError::Decode("response has no clusters array".to_owned()))?;
            (clusters.as_slice(), Some(object))
        }
        _ => {
            return Err(FetchError::Decode(
                "expected a JSON object or array".to_owned(),
            ));
        }
    };

    let clusters = cluster_values
        .iter()
        .enumerate()
        .map(|(index, value)| normalize_cluster(index, value))
        .collect::<Vec<_>>();

    let insights = object.and_then(parse_insights);
    let total_features = object
        .and_then(|object| object.get("total_features"))
        .and_then(non_negative_count)
        .unwrap_or_else(|| clusters.iter().map(|cluster| cluster.size).sum());

    Ok(AnalysisResult {
        clusters,
        insights,
        total_features,
    })
}

fn parse_insights(object: &Map<String, Value>) -> Option<Insights> {
    if !object
        .keys()
        .any(|key| INSIGHT_KEYS.contains(&key.as_str()))
    {
        return None;
    }

    let mut insight_fields = object.clone();
    insight_fields.remove("clusters");
    insight_fields.remove("total_features");

    match Insights::deserialize(Value::Object(insight_fields)) {
        Ok(insights) => Some(insights),
        Err(error) => {
            warn!(%error, "ignoring insights block that does not match the expected shape");
            None
        }
    }
}

fn normalize_cluster(index: usize, value: &Value) -> Cluster {
    let empty = Map::new();
    let object = value.as_object().unwrap_or_else(|| {
        warn!(index, "cluster record is not an object; using defaults");
        &empty
    });

    let id = match object.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => index.to_string(),
    };

    let theme = object
        .get("theme")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|theme| !theme.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Cluster {}", index + 1));

    let features = object
        .get("features")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(normalize_feature_ref).collect::<Vec<_>>())
        .unwrap_or_default();

    let declared_size = object.get("size").and_then(non_negative_count);
    let size = if features.is_empty() {
        declared_size.unwrap_or(0)
    } else {
        let actual = features.len() as u64;
        if declared_size.is_some_and(|declared| declared != actual) {
            debug!(
                cluster = %id,
                declared = declared_size.unwrap_or(0),
                actual,
                "cluster size disagrees with its feature list; using the list length"
            );
        }
        actual
    };

    let metadata = object.get("metadata").and_then(Value::as_object);
    let high_priority_percentage = metadata
        .and_then(|metadata| metadata.get("high_priority_percentage"))
        .and_then(finite_number)
        .unwrap_or(0.0)
        .clamp(0.0, 100.0);
    let coherence_score = metadata
        .and_then(|metadata| metadata.get("coherence_score"))
        .and_then(finite_number);
    let avg_distance = metadata
        .and_then(|metadata| metadata.get("avg_distance"))
        .and_then(finite_number);

    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .map(str::to_owned);

    Cluster {
        id,
        theme,
        size,
        centroid: coordinate_pair(object.get("centroid")),
        metadata: ClusterMetadata {
            high_priority_percentage,
            coherence_score,
            avg_distance,
        },
        features,
        summary,
    }
}

fn normalize_feature_ref(value: &Value) -> FeatureRef {
    match value.get("feature").and_then(Value::as_object) {
        Some(feature) => FeatureRef {
            feature: normalize_feature(feature),
            coordinates: coordinate_pair(value.get("coordinates")),
        },
        None => FeatureRef {
            feature: value.as_object().map(normalize_feature).unwrap_or_default(),
            coordinates: coordinate_pair(value.get("coordinates")),
        },
    }
}

fn normalize_feature(object: &Map<String, Value>) -> Feature {
    let known = TITLE_KEYS
        .iter()
        .chain(DESCRIPTION_KEYS.iter())
        .chain(PRIORITY_KEYS.iter())
        .chain(CUSTOMER_TYPE_KEYS.iter())
        .copied()
        .chain(["coordinates"])
        .collect::<Vec<_>>();

    let extra = object
        .iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect::<BTreeMap<_, _>>();

    Feature {
        title: pick_text(object, &TITLE_KEYS),
        description: pick_text(object, &DESCRIPTION_KEYS),
        priority: pick_text(object, &PRIORITY_KEYS),
        customer_type: pick_text(object, &CUSTOMER_TYPE_KEYS),
        extra,
    }
}

fn pick_text(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match object.get(*key) {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn non_negative_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.is_finite())
            .map(|number| number.max(0.0).round() as u64)
    })
}

fn finite_number(value: &Value) -> Option<f32> {
    value
        .as_f64()
        .filter(|number| number.is_finite())
        .map(|number| number as f32)
}

fn coordinate_pair(value: Option<&Value>) -> Option<[f32; 2]> {
    let items = value?.as_array()?;
    if items.len() != 2 {
        return None;
    }
    let x = finite_number(&items[0])?;
    let y = finite_number(&items[1])?;
    Some([x, y])
}
