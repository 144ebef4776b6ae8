use eframe::egui::{Align2, Color32, FontId, Sense, Stroke, Ui};

use crate::layout::{ScatterLayout, Viewport};
use crate::viz::scatter::{
    EMPTY_MESSAGE, ScatterHover, scatter_centroids, scatter_points, scatter_tooltip,
};
use crate::viz::{MUTED_TEXT, cluster_color};

use super::super::render_utils::{
    blend_color, draw_background, paint_circle, paint_tooltip, to_screen,
};
use super::super::{CachedLayout, ViewModel};
use super::interaction::scatter_hover_at;

impl ViewModel {
    fn ensure_scatter(&mut self, viewport: Viewport) {
        if self
            .scatter
            .as_ref()
            .is_some_and(|cached| cached.viewport == viewport)
        {
            return;
        }

        self.scatter = Some(CachedLayout {
            viewport,
            layout: ScatterLayout::compute(&self.result.clusters, viewport),
        });
    }

    pub(in crate::app) fn draw_scatter(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click());
        let painter = ui.painter_at(rect);
        draw_background(&painter, rect);

        self.ensure_scatter(Viewport::new(rect.width(), rect.height()));
        let Some(cached) = &self.scatter else {
            return;
        };
        let layout = &cached.layout;
        if layout.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                EMPTY_MESSAGE,
                FontId::proportional(15.0),
                MUTED_TEXT,
            );
            return;
        }

        let origin = rect.min;
        let pointer = Self::pointer_in_layout(&response, origin, rect);
        let hovered = pointer.and_then(|point| scatter_hover_at(layout, point));

        for point in scatter_points(layout, hovered) {
            paint_circle(&painter, origin, &point);
        }
        for centroid in scatter_centroids(layout, hovered) {
            paint_circle(&painter, origin, &centroid);
        }

        if let Some(selected) = self.selected {
            for centroid in layout
                .centroids
                .iter()
                .filter(|centroid| centroid.cluster_index == selected)
            {
                painter.circle_stroke(
                    to_screen(origin, centroid.position),
                    16.0,
                    Stroke::new(
                        2.0,
                        blend_color(cluster_color(selected), Color32::BLACK, 0.25),
                    ),
                );
            }
        }

        if let Some(hovered) = hovered
            && let Some(tooltip) = scatter_tooltip(layout, &self.result.clusters, hovered)
            && let Some(pointer) = pointer
        {
            paint_tooltip(&painter, to_screen(origin, pointer), rect, &tooltip);
        }

        let clicked_cluster = hovered.and_then(|hovered| match hovered {
            ScatterHover::Point(index) => layout.points.get(index).map(|point| point.cluster_index),
            ScatterHover::Centroid(index) => layout
                .centroids
                .get(index)
                .map(|centroid| centroid.cluster_index),
        });
        Self::update_cursor(ui, hovered.is_some(), false);
        if response.clicked() {
            self.set_selected(clicked_cluster);
        }
    }
}
