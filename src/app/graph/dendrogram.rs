use eframe::egui::{Sense, Ui};

use crate::layout::{HierarchyConfig, HierarchyInput, HierarchyLayout, ROOT_LABEL, Viewport};
use crate::viz::dendrogram::{
    dendrogram_labels, dendrogram_links, dendrogram_nodes, dendrogram_tooltip,
};

use super::super::render_utils::{
    draw_background, paint_circle, paint_label, paint_link, paint_tooltip, to_screen,
};
use super::super::{CachedLayout, ViewModel};

const NODE_HIT_RADIUS: f32 = 8.0;

impl ViewModel {
    fn ensure_hierarchy(&mut self, viewport: Viewport) {
        if self
            .hierarchy
            .as_ref()
            .is_some_and(|cached| cached.viewport == viewport)
        {
            return;
        }

        let input = HierarchyInput::from_clusters(ROOT_LABEL, &self.result.clusters);
        let config = HierarchyConfig {
            viewport,
            ..HierarchyConfig::default()
        };
        self.hierarchy = Some(CachedLayout {
            viewport,
            layout: HierarchyLayout::compute(&input, &config),
        });
    }

    pub(in crate::app) fn draw_dendrogram(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click());
        let painter = ui.painter_at(rect);
        draw_background(&painter, rect);

        self.ensure_hierarchy(Viewport::new(rect.width(), rect.height()));
        let Some(cached) = &self.hierarchy else {
            return;
        };
        let layout = &cached.layout;
        let origin = rect.min;

        let pointer = Self::pointer_in_layout(&response, origin, rect);
        let hovered = pointer.and_then(|point| layout.node_at(point, NODE_HIT_RADIUS));

        for link in dendrogram_links(layout, hovered) {
            paint_link(&painter, origin, &link);
        }
        for node in dendrogram_nodes(layout, hovered) {
            paint_circle(&painter, origin, &node);
        }
        for label in dendrogram_labels(layout, hovered, self.show_all_labels) {
            paint_label(&painter, origin, &label);
        }

        if let Some(index) = hovered
            && let Some(tooltip) = dendrogram_tooltip(layout, index)
            && let Some(pointer) = pointer
        {
            paint_tooltip(&painter, to_screen(origin, pointer), rect, &tooltip);
        }

        // Any node below a first-level branch selects that branch's cluster.
        let clicked_cluster = hovered.and_then(|index| layout.branch_ordinal(index));
        Self::update_cursor(ui, hovered.is_some(), false);
        if response.clicked() {
            self.set_selected(clicked_cluster);
        }
    }
}
