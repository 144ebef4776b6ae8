use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};

use crate::cache::{ANALYSIS_KEY_PREFIX, FileStore, MemoryStore, SessionStore, TtlCache};
use crate::insights::{
    AnalysisContext, DEFAULT_API_URL, DEFAULT_ENDPOINT, FetchCoordinator, HttpClusterSource,
};
use crate::layout::{ForceConfig, Viewport};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Analysis to open on startup.
    #[arg(long, env = "CLUSTER_LENS_CONTEXT_ID")]
    pub context_id: Option<String>,

    #[arg(long, env = "CLUSTER_LENS_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Path appended to the API URL. `{context_id}` is replaced by the id.
    #[arg(long, env = "CLUSTER_LENS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, env = "CLUSTER_LENS_CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = "CLUSTER_LENS_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Directory for the session cache. Defaults to a per-process temp dir.
    #[arg(long, env = "CLUSTER_LENS_CACHE_DIR", conflicts_with = "memory_cache")]
    pub cache_dir: Option<PathBuf>,

    /// Keep cached results in memory only.
    #[arg(long, env = "CLUSTER_LENS_MEMORY_CACHE")]
    pub memory_cache: bool,

    /// Upper bound for the largest bubble radius, in pixels.
    #[arg(long, env = "CLUSTER_LENS_RADIUS_SCALE")]
    pub radius_scale: Option<f32>,

    /// Gap kept between bubbles, in pixels.
    #[arg(long, env = "CLUSTER_LENS_PADDING")]
    pub padding: Option<f32>,

    /// Write settled layouts as JSON to this path instead of opening a window.
    #[arg(long, env = "CLUSTER_LENS_EXPORT")]
    pub export: Option<PathBuf>,

    #[arg(long, env = "CLUSTER_LENS_WIDTH", default_value_t = 800.0)]
    pub width: f32,

    #[arg(long, env = "CLUSTER_LENS_HEIGHT", default_value_t = 400.0)]
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Session(Option<PathBuf>),
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub context: Option<AnalysisContext>,
    pub api_url: String,
    pub endpoint: String,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub cache_backend: CacheBackend,
    pub force: ForceConfig,
    pub export: Option<PathBuf>,
    pub viewport: Viewport,
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        let mut force = ForceConfig::default();
        if let Some(radius_scale) = args
            .radius_scale
            .filter(|value| value.is_finite() && *value > 0.0)
        {
            force.radius_scale = radius_scale;
        }
        if let Some(padding) = args.padding.filter(|value| value.is_finite() && *value >= 0.0) {
            force.padding = padding;
        }

        let cache_backend = if args.memory_cache {
            CacheBackend::Memory
        } else {
            CacheBackend::Session(args.cache_dir)
        };

        Self {
            context: args
                .context_id
                .map(|id| id.trim().to_owned())
                .filter(|id| !id.is_empty())
                .map(AnalysisContext::new),
            api_url: args.api_url,
            endpoint: args.endpoint,
            cache_ttl: Duration::from_secs(args.cache_ttl_secs),
            request_timeout: Duration::from_secs(args.request_timeout_secs.max(1)),
            cache_backend,
            force,
            export: args.export,
            viewport: Viewport::new(args.width, args.height),
        }
    }
}

impl Settings {
    /// Opens the configured store. A session directory that cannot be
    /// created falls back to memory.
    pub fn open_store(&self) -> Box<dyn SessionStore> {
        let opened = match &self.cache_backend {
            CacheBackend::Memory => return Box::new(MemoryStore::new()),
            CacheBackend::Session(Some(dir)) => FileStore::open(dir),
            CacheBackend::Session(None) => FileStore::for_current_session(),
        };

        match opened {
            Ok(store) => {
                debug!(
                    dir = %store.dir().display(),
                    removed_on_exit = store.is_session_scoped(),
                    "session cache opened"
                );
                Box::new(store)
            }
            Err(error) => {
                warn!(%error, "session cache unavailable; keeping results in memory");
                Box::new(MemoryStore::new())
            }
        }
    }

    pub fn coordinator(&self) -> Result<FetchCoordinator<Box<dyn SessionStore>>> {
        let source = HttpClusterSource::new(
            self.api_url.clone(),
            self.endpoint.clone(),
            self.request_timeout,
        )
        .with_context(|| format!("failed to create HTTP client for {}", self.api_url))?;
        let cache = TtlCache::new(ANALYSIS_KEY_PREFIX, self.cache_ttl, self.open_store());
        Ok(FetchCoordinator::new(Arc::new(source), cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["cluster-lens"];
        argv.extend_from_slice(args);
        Settings::from(Args::try_parse_from(argv).expect("arguments parse"))
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = parse(&[]);
        assert_eq!(settings.context, None);
        assert_eq!(settings.api_url, "http://localhost:3002");
        assert_eq!(settings.endpoint, "/clusters/{context_id}");
        assert_eq!(settings.cache_ttl, Duration::from_secs(300));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.cache_backend, CacheBackend::Session(None));
        assert_eq!(settings.viewport, Viewport::new(800.0, 400.0));
        assert_eq!(settings.force, ForceConfig::default());
    }

    #[test]
    fn flags_override_layout_and_cache() {
        let settings = parse(&[
            "--context-id",
            "  abc  ",
            "--memory-cache",
            "--padding",
            "6",
            "--radius-scale",
            "0",
            "--cache-ttl-secs",
            "10",
        ]);
        assert_eq!(settings.context, Some(AnalysisContext::new("abc")));
        assert_eq!(settings.cache_backend, CacheBackend::Memory);
        assert_eq!(settings.force.padding, 6.0);
        assert_eq!(settings.force.radius_scale, ForceConfig::default().radius_scale);
        assert_eq!(settings.cache_ttl, Duration::from_secs(10));
    }

    #[test]
    fn cache_dir_conflicts_with_memory_cache() {
        let parsed =
            Args::try_parse_from(["cluster-lens", "--memory-cache", "--cache-dir", "/tmp/x"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn session_store_opens_in_given_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = parse(&["--cache-dir", dir.path().to_str().expect("utf-8 path")]);
        let mut store = settings.open_store();
        store.set("k", "v").expect("write");
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 1);
    }
}
