mod client;
mod error;
mod fetch;
mod model;
mod parse;

pub use client::{
    ClusterSource, DEFAULT_API_URL, DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT, HttpClusterSource,
};
pub use error::FetchError;
pub use fetch::{FetchCoordinator, FetchHandle, FetchOptions, FetchOutcome};
pub use model::{
    AnalysisContext, AnalysisResult, Cluster, ClusterMetadata, CommonRequest, Feature, FeatureRef,
    Insights, PainPoint, PriorityScore, TrendPoint,
};
pub use parse::parse_analysis_response;
