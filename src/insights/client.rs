use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use tracing::{debug, info};

use super::error::FetchError;
use super::model::{AnalysisContext, AnalysisResult};
use super::parse::parse_analysis_response;
use crate::util::encode_component;

pub const DEFAULT_API_URL: &str = "http://localhost:3002";
pub const DEFAULT_ENDPOINT: &str = "/clusters/{context_id}";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where cluster results come from. Implementations are called from fetch
/// worker threads.
pub trait ClusterSource: Send + Sync + 'static {
    fn fetch(&self, context: &AnalysisContext) -> Result<AnalysisResult, FetchError>;
}

pub struct HttpClusterSource {
    client: Client,
    api_url: String,
    endpoint: String,
    timeout: Duration,
}

impl HttpClusterSource {
    pub fn new(
        api_url: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| FetchError::Network {
                context: String::new(),
                message: format!("client build failed: {error}"),
            })?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_owned(),
            endpoint: endpoint.into(),
            timeout,
        })
    }

    /// `{context_id}` in the endpoint is replaced by the escaped id; an
    /// endpoint without the placeholder gets the id appended as a query.
    pub fn url_for(&self, context: &AnalysisContext) -> String {
        let encoded = encode_component(context.as_str());
        let endpoint = if self.endpoint.starts_with('/') {
            self.endpoint.clone()
        } else {
            format!("/{}", self.endpoint)
        };

        if endpoint.contains("{context_id}") {
            format!("{}{}", self.api_url, endpoint.replace("{context_id}", &encoded))
        } else {
            let separator = if endpoint.contains('?') { '&' } else { '?' };
            format!("{}{endpoint}{separator}context_id={encoded}", self.api_url)
        }
    }

    fn classify(&self, context: &AnalysisContext, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                context: context.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Network {
                context: context.to_string(),
                message: error.to_string(),
            }
        }
    }
}

impl ClusterSource for HttpClusterSource {
    fn fetch(&self, context: &AnalysisContext) -> Result<AnalysisResult, FetchError> {
        let url = self.url_for(context);
        let start = Instant::now();
        debug!(%context, %url, "requesting clusters");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|error| self.classify(context, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                context: context.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .map_err(|error| self.classify(context, error))?;
        let result = parse_analysis_response(&body)?;

        info!(
            %context,
            clusters = result.clusters.len(),
            features = result.total_features,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "cluster fetch completed"
        );
        Ok(result)
    }
}
