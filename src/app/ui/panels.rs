use std::sync::Arc;

use eframe::egui::{self, Context};
use tracing::debug;

use crate::insights::{AnalysisContext, AnalysisResult};
use crate::layout::ForceConfig;

use super::super::{ChartView, ViewModel};

impl ViewModel {
    pub(in crate::app) const INITIAL_FEATURE_ROWS: usize = 24;
    pub(in crate::app) const FEATURE_PAGE_ROWS: usize = 24;
    pub(in crate::app) const FEATURE_PREFETCH_MARGIN: usize = 4;

    pub(in crate::app) fn new(
        context: AnalysisContext,
        result: Arc<AnalysisResult>,
        force_config: ForceConfig,
    ) -> Self {
        Self {
            context,
            result,
            view: ChartView::Bubbles,
            search: String::new(),
            selected: None,
            show_all_labels: false,
            force_config,
            simulation: None,
            dragging: None,
            hierarchy: None,
            scatter: None,
            search_match_cache: None,
            feature_rows_visible: Self::INITIAL_FEATURE_ROWS,
        }
    }

    /// Keeps the user's view settings across a refresh of the same analysis.
    /// The selection survives only if its cluster id is still present.
    pub(in crate::app) fn carry_over(&mut self, previous: &ViewModel) {
        self.view = previous.view;
        self.search = previous.search.clone();
        self.show_all_labels = previous.show_all_labels;
        self.force_config = previous.force_config;

        let selected_id = previous
            .selected
            .and_then(|index| previous.result.clusters.get(index))
            .map(|cluster| cluster.id.as_str());
        self.selected = selected_id.and_then(|id| {
            self.result
                .clusters
                .iter()
                .position(|cluster| cluster.id == id)
        });
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context) {
        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(350.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| match self.view {
            ChartView::Bubbles => self.draw_bubbles(ui),
            ChartView::Dendrogram => self.draw_dendrogram(ui),
            ChartView::Scatter => self.draw_scatter(ui),
        });
    }

    /// Leaving the bubble view tears the simulation down; coming back starts
    /// a fresh one.
    pub(in crate::app) fn set_view(&mut self, view: ChartView) {
        if self.view == view {
            return;
        }
        if self.view == ChartView::Bubbles {
            self.stop_simulation();
        }
        self.view = view;
    }

    pub(in crate::app) fn set_selected(&mut self, selected: Option<usize>) {
        if self.selected == selected {
            return;
        }
        self.selected = selected;
        self.feature_rows_visible = Self::INITIAL_FEATURE_ROWS;
    }

    pub(in crate::app) fn stop_simulation(&mut self) {
        if let Some(mut simulation) = self.simulation.take() {
            simulation.stop();
            debug!(ticks = simulation.ticks(), "bubble simulation torn down");
        }
        self.dragging = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{Cluster, ClusterMetadata};
    use crate::layout::{ForceSimulation, Viewport};

    fn result(ids: &[&str]) -> Arc<AnalysisResult> {
        Arc::new(AnalysisResult {
            clusters: ids
                .iter()
                .map(|id| Cluster {
                    id: (*id).to_owned(),
                    theme: format!("Theme {id}"),
                    size: 3,
                    centroid: None,
                    metadata: ClusterMetadata::default(),
                    features: Vec::new(),
                    summary: None,
                })
                .collect(),
            insights: None,
            total_features: 3 * ids.len() as u64,
        })
    }

    fn model(ids: &[&str]) -> ViewModel {
        ViewModel::new(
            AnalysisContext::new("ctx"),
            result(ids),
            ForceConfig::default(),
        )
    }

    #[test]
    fn leaving_bubbles_drops_the_simulation() {
        let mut model = model(&["a", "b"]);
        model.simulation = Some(ForceSimulation::new(
            &model.result.clusters,
            Viewport::default(),
            model.force_config,
        ));
        model.dragging = Some(0);

        model.set_view(ChartView::Dendrogram);
        assert!(model.simulation.is_none());
        assert_eq!(model.dragging, None);
        assert_eq!(model.view, ChartView::Dendrogram);
    }

    #[test]
    fn refresh_keeps_selection_by_cluster_id() {
        let mut previous = model(&["a", "b", "c"]);
        previous.set_selected(Some(2));
        previous.view = ChartView::Scatter;
        previous.search = "exp".to_owned();

        let mut next = model(&["c", "a"]);
        next.carry_over(&previous);
        assert_eq!(next.selected, Some(0));
        assert_eq!(next.view, ChartView::Scatter);
        assert_eq!(next.search, "exp");

        let mut gone = model(&["x"]);
        gone.carry_over(&previous);
        assert_eq!(gone.selected, None);
    }

    #[test]
    fn new_selection_resets_feature_paging() {
        let mut model = model(&["a", "b"]);
        model.feature_rows_visible = 96;
        model.set_selected(Some(1));
        assert_eq!(model.feature_rows_visible, ViewModel::INITIAL_FEATURE_ROWS);
    }
}
