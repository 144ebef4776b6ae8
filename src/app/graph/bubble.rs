use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Sense, Stroke, Ui, pos2, vec2};

use crate::insights::Cluster;
use crate::layout::{ForceSimulation, Viewport};
use crate::viz::bubble::{
    BubbleHighlight, bubble_circles, bubble_tooltip, legend_entries, legend_origin_x,
};
use crate::viz::{MUTED_TEXT, cluster_color};

use super::super::ViewModel;
use super::super::render_utils::{
    blend_color, draw_background, paint_circle, paint_tooltip, to_layout, to_screen,
};

const LEGEND_SWATCH_RADIUS: f32 = 6.0;
const LEGEND_TEXT_OFFSET: f32 = 15.0;
const SELECTION_RING_GAP: f32 = 4.0;

fn draw_legend(painter: &Painter, origin: Pos2, height: f32, clusters: &[Cluster]) {
    for entry in legend_entries(clusters, height) {
        let center = origin + entry.offset;
        painter.circle_filled(center, LEGEND_SWATCH_RADIUS, entry.color);
        painter.text(
            center + vec2(LEGEND_TEXT_OFFSET, -6.0),
            Align2::LEFT_CENTER,
            entry.label,
            FontId::proportional(13.0),
            Color32::from_gray(30),
        );
        painter.text(
            center + vec2(LEGEND_TEXT_OFFSET, 9.0),
            Align2::LEFT_CENTER,
            entry.detail,
            FontId::proportional(11.0),
            MUTED_TEXT,
        );
    }
}

impl ViewModel {
    pub(in crate::app) fn draw_bubbles(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        draw_background(&painter, rect);

        let legend_x = legend_origin_x(rect.width());
        let chart_rect = match legend_x {
            Some(x) => Rect::from_min_max(rect.min, pos2(rect.left() + x, rect.bottom())),
            None => rect,
        };
        let origin = chart_rect.min;
        let viewport = Viewport::new(chart_rect.width(), chart_rect.height());
        let matches = self.search_matches();

        let result = &self.result;
        let force_config = self.force_config;
        let simulation = self
            .simulation
            .get_or_insert_with(|| ForceSimulation::new(&result.clusters, viewport, force_config));
        simulation.resize(viewport);

        if response.drag_started()
            && let Some(position) = response.interact_pointer_pos()
        {
            let point = to_layout(origin, position);
            if let Some(index) = simulation.node_at(point)
                && simulation.pin(index, point)
            {
                self.dragging = Some(index);
            }
        }
        if let Some(index) = self.dragging {
            if response.dragged()
                && let Some(position) = response.interact_pointer_pos()
            {
                simulation.drag_to(index, to_layout(origin, position));
            }
            if response.drag_stopped() {
                simulation.release(index);
                self.dragging = None;
            }
        }

        if simulation.tick() || self.dragging.is_some() {
            ui.ctx().request_repaint();
        }

        let pointer = Self::pointer_in_layout(&response, origin, chart_rect);
        let hovered = self
            .dragging
            .or_else(|| pointer.and_then(|point| simulation.node_at(point)));
        let nodes = simulation.nodes();

        let circles = bubble_circles(
            nodes,
            BubbleHighlight {
                hovered,
                matches: matches.as_deref(),
            },
        );
        for circle in &circles {
            paint_circle(&painter, origin, circle);
        }

        if let Some(selected) = self.selected
            && let Some(node) = nodes.iter().find(|node| node.cluster_index == selected)
        {
            painter.circle_stroke(
                to_screen(origin, node.position),
                node.radius + SELECTION_RING_GAP,
                Stroke::new(
                    2.0,
                    blend_color(cluster_color(selected), Color32::WHITE, 0.35),
                ),
            );
        }

        if legend_x.is_some() {
            draw_legend(
                &painter,
                chart_rect.right_top(),
                rect.height(),
                &self.result.clusters,
            );
        }

        let hovered_cluster = hovered
            .and_then(|index| nodes.get(index))
            .map(|node| node.cluster_index);
        if let Some(cluster_index) = hovered_cluster
            && let Some(cluster) = self.result.clusters.get(cluster_index)
            && let Some(pointer) = pointer
        {
            paint_tooltip(&painter, to_screen(origin, pointer), rect, &bubble_tooltip(cluster));
        }

        Self::update_cursor(ui, hovered.is_some(), self.dragging.is_some());
        if response.clicked() {
            self.set_selected(hovered_cluster);
        }
    }
}
