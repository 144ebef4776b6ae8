use eframe::egui::{self, Color32, RichText, Sense, Ui, vec2};

use crate::util::{format_requests, truncate_label};
use crate::viz::bubble::LEGEND_LABEL_CHARS;
use crate::viz::cluster_color;

use super::super::{ChartView, ViewModel};

const CLUSTER_ROW_HEIGHT: f32 = 22.0;

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("View");
        ui.add_space(4.0);

        ui.horizontal(|ui| {
            for view in ChartView::ALL {
                if ui
                    .selectable_label(self.view == view, view.label())
                    .clicked()
                {
                    self.set_view(view);
                }
            }
        });

        ui.separator();

        ui.label(RichText::new("Search").strong());
        ui.add(
            egui::TextEdit::singleline(&mut self.search)
                .hint_text("theme or request title")
                .desired_width(f32::INFINITY),
        )
        .on_hover_text("Fuzzy search; bubbles that do not match are dimmed.");

        ui.separator();

        match self.view {
            ChartView::Bubbles => self.draw_bubble_controls(ui),
            ChartView::Dendrogram => {
                ui.checkbox(&mut self.show_all_labels, "Show all labels")
                    .on_hover_text("Label every node instead of only the root and hovered node.");
            }
            ChartView::Scatter => {
                ui.label("Points use the coordinates computed by the analysis service.");
            }
        }

        ui.separator();
        self.draw_cluster_list(ui);
    }

    fn draw_bubble_controls(&mut self, ui: &mut Ui) {
        let mut changed = false;

        changed |= ui
            .add(
                egui::Slider::new(&mut self.force_config.padding, 0.0..=12.0)
                    .text("Padding")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Gap kept between neighbouring bubbles.")
            .changed();

        changed |= ui
            .add(
                egui::Slider::new(&mut self.force_config.radius_scale, 20.0..=160.0)
                    .text("Max radius")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Radius of the largest cluster before fitting to the view.")
            .changed();

        if changed {
            self.stop_simulation();
        }

        let status = match &self.simulation {
            Some(simulation) if simulation.is_running() => {
                format!("settling (alpha {:.3})", simulation.alpha())
            }
            Some(simulation) => format!("settled after {} ticks", simulation.ticks()),
            None => "not started".to_owned(),
        };
        ui.small(status);

        if ui
            .button("Re-run layout")
            .on_hover_text("Start the bubble layout again from a fresh spiral.")
            .clicked()
        {
            self.stop_simulation();
        }
    }

    fn draw_cluster_list(&mut self, ui: &mut Ui) {
        let matches = self.search_matches();
        let order = self
            .result
            .clusters_by_size()
            .into_iter()
            .filter(|index| matches.as_ref().is_none_or(|matches| matches.contains(index)))
            .collect::<Vec<_>>();

        ui.label(RichText::new(format!("Clusters ({})", order.len())).strong());
        if order.is_empty() {
            ui.label("No clusters match the search.");
            return;
        }

        let mut clicked = None;
        egui::ScrollArea::vertical()
            .id_salt("cluster_list_scroll")
            .auto_shrink([false, false])
            .show_rows(ui, CLUSTER_ROW_HEIGHT, order.len(), |ui, row_range| {
                for row in row_range {
                    let Some(&index) = order.get(row) else {
                        continue;
                    };
                    let Some(cluster) = self.result.clusters.get(index) else {
                        continue;
                    };

                    ui.horizontal(|ui| {
                        let (swatch, _) = ui.allocate_exact_size(vec2(12.0, 12.0), Sense::hover());
                        ui.painter()
                            .circle_filled(swatch.center(), 6.0, cluster_color(index));

                        let label = format!(
                            "{}  ({})",
                            truncate_label(&cluster.theme, LEGEND_LABEL_CHARS),
                            format_requests(cluster.size)
                        );
                        let response = ui
                            .selectable_label(self.selected == Some(index), label)
                            .on_hover_text(cluster.theme.as_str());
                        if response.clicked() {
                            clicked = Some(index);
                        }
                    });
                }
            });

        if let Some(index) = clicked {
            let next = if self.selected == Some(index) {
                None
            } else {
                Some(index)
            };
            self.set_selected(next);
        }

        if self.selected.is_some()
            && ui
                .add(egui::Button::new("Clear selection").fill(Color32::TRANSPARENT))
                .clicked()
        {
            self.set_selected(None);
        }
    }
}
