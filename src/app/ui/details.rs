use eframe::egui::{self, RichText, Ui};

use crate::insights::Insights;
use crate::util::{format_percent, format_requests, truncate_label};
use crate::viz::bubble::priority_summary;

use super::super::ViewModel;

const FEATURE_ROW_HEIGHT: f32 = 22.0;
const FEATURE_LABEL_CHARS: usize = 48;

fn draw_insights(ui: &mut Ui, insights: &Insights) {
    if !insights.most_common_requests.is_empty() {
        ui.label(RichText::new("Most common requests").strong());
        for request in &insights.most_common_requests {
            ui.label(format!("{}  ({})", request.name, request.count))
                .on_hover_text(request.summary.as_str());
        }
        ui.add_space(6.0);
    }

    if !insights.top_pain_points.is_empty() {
        ui.label(RichText::new("Top pain points").strong());
        for pain_point in &insights.top_pain_points {
            ui.label(format!(
                "{}  {}",
                pain_point.name,
                format_percent(pain_point.percentage)
            ))
            .on_hover_text(pain_point.description.as_str());
        }
        ui.add_space(6.0);
    }

    if let Some(score) = &insights.average_priority_score {
        ui.label(RichText::new("Average priority score").strong());
        ui.label(score.score_text());
        if !score.description.is_empty() {
            ui.small(score.description.as_str());
        }
        ui.add_space(6.0);
    }

    if !insights.trends_over_time.is_empty() {
        ui.label(RichText::new("Requests over time").strong());
        for trend in &insights.trends_over_time {
            ui.label(format!("{}: {}", trend.month, format_requests(trend.requests)));
        }
    }
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Cluster Details");
        ui.add_space(6.0);

        match self.selected {
            Some(index) => self.draw_cluster_details(ui, index),
            None => {
                ui.label("Select a cluster from the chart or the list.");
            }
        }

        ui.separator();
        let result = self.result.clone();
        egui::CollapsingHeader::new("Insights")
            .default_open(true)
            .show(ui, |ui| match &result.insights {
                Some(insights) => draw_insights(ui, insights),
                None => {
                    ui.label("No insights were returned for this analysis.");
                }
            });
    }

    fn draw_cluster_details(&mut self, ui: &mut Ui, index: usize) {
        let result = self.result.clone();
        let Some(cluster) = result.clusters.get(index) else {
            ui.label("Selected cluster no longer exists in this analysis.");
            return;
        };

        ui.label(RichText::new(cluster.theme.as_str()).strong());
        ui.small(format!("id {}", cluster.id));
        ui.add_space(6.0);

        ui.label(priority_summary(cluster));
        if let Some(coherence) = cluster.metadata.coherence_score {
            ui.label(format!("Coherence: {coherence:.2}"));
        }
        if let Some(distance) = cluster.metadata.avg_distance {
            ui.label(format!("Average distance: {distance:.2}"));
        }
        if let Some(summary) = &cluster.summary {
            ui.add_space(4.0);
            ui.label(summary.as_str());
        }

        ui.separator();
        ui.label(RichText::new("Requests").strong());
        if cluster.features.is_empty() {
            ui.label("This cluster carries no request details.");
            return;
        }

        let row_count = cluster.features.len().min(self.feature_rows_visible);
        let mut should_load_more = false;

        egui::ScrollArea::vertical()
            .id_salt("cluster_features_scroll")
            .max_height(320.0)
            .auto_shrink([false, false])
            .show_rows(ui, FEATURE_ROW_HEIGHT, row_count, |ui, row_range| {
                if row_range.end + Self::FEATURE_PREFETCH_MARGIN >= row_count {
                    should_load_more = true;
                }

                for row in row_range {
                    let Some(reference) = cluster.features.get(row) else {
                        continue;
                    };
                    let feature = &reference.feature;
                    let marker = if feature.is_high_priority() { "!" } else { " " };
                    let label = format!(
                        "{marker} {}",
                        truncate_label(feature.display_title(), FEATURE_LABEL_CHARS)
                    );

                    let mut hover = feature.description.clone();
                    if !feature.priority.is_empty() {
                        hover.push_str(&format!("\nPriority: {}", feature.priority));
                    }
                    if !feature.customer_type.is_empty() {
                        hover.push_str(&format!("\nCustomer: {}", feature.customer_type));
                    }
                    ui.label(label).on_hover_text(hover);
                }
            });

        if should_load_more && row_count < cluster.features.len() {
            self.feature_rows_visible =
                (row_count + Self::FEATURE_PAGE_ROWS).min(cluster.features.len());
        }
    }
}
