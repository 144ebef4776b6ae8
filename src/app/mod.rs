use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Context};
use tracing::{info, warn};

use crate::cache::SessionStore;
use crate::config::Settings;
use crate::insights::{
    AnalysisContext, AnalysisResult, FetchCoordinator, FetchError, FetchHandle, FetchOptions,
    FetchOutcome,
};
use crate::layout::{ForceConfig, ForceSimulation, HierarchyLayout, ScatterLayout, Viewport};

mod graph;
mod render_utils;
mod ui;

const LOADING_REPAINT: Duration = Duration::from_millis(100);

pub struct ClusterLensApp {
    settings: Settings,
    coordinator: FetchCoordinator<Box<dyn SessionStore>>,
    context_input: String,
    state: AppState,
    refresh: Option<FetchHandle>,
    last_sweep: Instant,
}

enum AppState {
    Idle,
    Loading { handle: FetchHandle },
    Ready(Box<ViewModel>),
    Empty { context: AnalysisContext },
    Error {
        context: AnalysisContext,
        error: FetchError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChartView {
    Bubbles,
    Dendrogram,
    Scatter,
}

impl ChartView {
    const ALL: [ChartView; 3] = [ChartView::Bubbles, ChartView::Dendrogram, ChartView::Scatter];

    fn label(self) -> &'static str {
        match self {
            ChartView::Bubbles => "Bubbles",
            ChartView::Dendrogram => "Dendrogram",
            ChartView::Scatter => "Embedding",
        }
    }
}

/// What the top bar asked the app to do this frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct ShellRequests {
    refresh: bool,
    open: Option<AnalysisContext>,
}

struct ViewModel {
    context: AnalysisContext,
    result: Arc<AnalysisResult>,
    view: ChartView,
    search: String,
    selected: Option<usize>,
    show_all_labels: bool,
    force_config: ForceConfig,
    simulation: Option<ForceSimulation>,
    dragging: Option<usize>,
    hierarchy: Option<CachedLayout<HierarchyLayout>>,
    scatter: Option<CachedLayout<ScatterLayout>>,
    search_match_cache: Option<SearchMatchCache>,
    feature_rows_visible: usize,
}

/// A layout computed for one surface size.
struct CachedLayout<T> {
    viewport: Viewport,
    layout: T,
}

struct SearchMatchCache {
    query: String,
    matches: Arc<HashSet<usize>>,
}

impl ClusterLensApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        settings: Settings,
        coordinator: FetchCoordinator<Box<dyn SessionStore>>,
    ) -> Self {
        let context_input = settings
            .context
            .as_ref()
            .map(|context| context.as_str().to_owned())
            .unwrap_or_default();

        let mut app = Self {
            settings,
            coordinator,
            context_input,
            state: AppState::Idle,
            refresh: None,
            last_sweep: Instant::now(),
        };
        if let Some(context) = app.settings.context.clone() {
            app.state = app.start_load(&context, FetchOptions::default());
        }
        app
    }

    fn start_load(&mut self, context: &AnalysisContext, options: FetchOptions) -> AppState {
        info!(context = %context, force = options.force, "loading analysis");
        let handle = self.coordinator.fetch_clusters(context, options);
        match handle.try_result() {
            Some(outcome) => self.state_for(context, outcome, None),
            None => AppState::Loading { handle },
        }
    }

    /// Maps a finished fetch onto the next state. A refreshed result keeps the
    /// previous view settings.
    fn state_for(
        &self,
        context: &AnalysisContext,
        outcome: FetchOutcome,
        previous: Option<&ViewModel>,
    ) -> AppState {
        match outcome {
            Ok(result) if result.is_empty() => AppState::Empty {
                context: context.clone(),
            },
            Ok(result) => {
                let mut model = ViewModel::new(context.clone(), result, self.settings.force);
                if let Some(previous) = previous {
                    model.carry_over(previous);
                }
                AppState::Ready(Box::new(model))
            }
            Err(error) => AppState::Error {
                context: context.clone(),
                error,
            },
        }
    }

    fn sweep_cache(&mut self) {
        if self.last_sweep.elapsed() < self.coordinator.cache_ttl() {
            return;
        }
        self.last_sweep = Instant::now();
        let removed = self.coordinator.sweep_expired();
        if removed > 0 {
            info!(removed, "expired cache entries swept");
        }
    }

    fn draw_top_bar(&mut self, ctx: &Context, loading: bool, requests: &mut ShellRequests) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("cluster-lens");
                    ui.separator();
                    ui.label("analysis:");
                    let field = ui.add(
                        egui::TextEdit::singleline(&mut self.context_input)
                            .hint_text("analysis id")
                            .desired_width(220.0),
                    );
                    let submitted =
                        field.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
                    let open_clicked = ui
                        .add_enabled(!loading, egui::Button::new("Open"))
                        .on_hover_text("Load this analysis, reusing a cached result when fresh.")
                        .clicked();
                    if (submitted || open_clicked) && !self.context_input.trim().is_empty() {
                        requests.open = Some(AnalysisContext::new(self.context_input.trim()));
                    }

                    let has_context = matches!(self.state, AppState::Ready(_));
                    let refreshing = self.refresh.is_some();
                    if ui
                        .add_enabled(has_context && !refreshing, egui::Button::new("Refresh"))
                        .on_hover_text("Fetch again and replace the cached result.")
                        .clicked()
                    {
                        requests.refresh = true;
                    }
                    if refreshing {
                        ui.spinner();
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(format!("requests sent: {}", self.coordinator.requests_issued()));
                        if let AppState::Ready(model) = &self.state {
                            ui.label(format!(
                                "{} clusters, {} features",
                                model.result.clusters.len(),
                                model.result.total_features
                            ));
                        }
                    });
                });
            });
    }

    fn poll_refresh(&mut self) -> Option<AppState> {
        let handle = self.refresh.take()?;
        let Some(outcome) = handle.try_result() else {
            self.refresh = Some(handle);
            return None;
        };

        let previous = match &self.state {
            AppState::Ready(model) => Some(model.as_ref()),
            _ => None,
        };
        if let Err(error) = &outcome {
            warn!(context = %handle.context(), %error, "refresh failed");
        }
        Some(self.state_for(handle.context(), outcome, previous))
    }
}

impl eframe::App for ClusterLensApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.coordinator.poll();
        self.sweep_cache();

        let loading = matches!(self.state, AppState::Loading { .. });
        let mut requests = ShellRequests::default();
        self.draw_top_bar(ctx, loading, &mut requests);

        let mut transition = self.poll_refresh();
        let mut retry = None;
        let mut finished = None;

        match &mut self.state {
            AppState::Idle => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Enter an analysis id to load its clusters");
                    });
                });
            }
            AppState::Loading { handle } => {
                match handle.try_result() {
                    Some(outcome) => finished = Some((handle.context().clone(), outcome)),
                    None => ctx.request_repaint_after(LOADING_REPAINT),
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading(format!("Loading clusters for {}...", handle.context()));
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Empty { context } => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("No clusters found");
                        ui.add_space(6.0);
                        ui.label(format!("Analysis {context} has no clustered requests yet."));
                        ui.add_space(10.0);
                        if ui.button("Check again").clicked() {
                            requests.open = Some(context.clone());
                            requests.refresh = true;
                        }
                    });
                });
            }
            AppState::Error { context, error } => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load clusters");
                    ui.add_space(6.0);
                    ui.label(error.to_string());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        retry = Some(context.clone());
                    }
                });
            }
            AppState::Ready(model) => {
                model.show(ctx);
                if self.refresh.is_some() {
                    ctx.request_repaint_after(LOADING_REPAINT);
                }
            }
        }

        if let Some((context, outcome)) = finished {
            transition = Some(self.state_for(&context, outcome, None));
        }
        if let Some(context) = retry {
            transition = Some(self.start_load(&context, FetchOptions::default()));
        }

        if let Some(context) = requests.open.take() {
            let options = if requests.refresh {
                FetchOptions::forced()
            } else {
                FetchOptions::default()
            };
            self.refresh = None;
            transition = Some(self.start_load(&context, options));
        } else if requests.refresh
            && let AppState::Ready(model) = &self.state
        {
            let context = model.context.clone();
            self.refresh = Some(self.coordinator.fetch_clusters(&context, FetchOptions::forced()));
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}
