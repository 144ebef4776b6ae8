use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{CursorIcon, Pos2, Rect, Response, Ui, Vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::insights::Cluster;
use crate::layout::ScatterLayout;
use crate::viz::scatter::ScatterHover;

use super::super::render_utils::to_layout;
use super::super::{SearchMatchCache, ViewModel};

const CENTROID_HIT_RADIUS: f32 = 12.0;
const POINT_HIT_RADIUS: f32 = 8.0;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// Indices of clusters whose theme or any request title fuzzily matches.
pub(in crate::app) fn matching_clusters(clusters: &[Cluster], query: &str) -> HashSet<usize> {
    let matcher = SkimMatcherV2::default();
    clusters
        .iter()
        .enumerate()
        .filter(|(_, cluster)| {
            fuzzy_match_score(&matcher, &cluster.theme, query).is_some()
                || cluster.features.iter().any(|reference| {
                    fuzzy_match_score(&matcher, &reference.feature.title, query).is_some()
                })
        })
        .map(|(index, _)| index)
        .collect()
}

/// Centroids win over points since they are drawn on top.
pub(in crate::app) fn scatter_hover_at(layout: &ScatterLayout, point: Vec2) -> Option<ScatterHover> {
    let centroid = layout
        .centroids
        .iter()
        .enumerate()
        .map(|(index, centroid)| (index, (centroid.position - point).length()))
        .filter(|(_, distance)| *distance <= CENTROID_HIT_RADIUS)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| ScatterHover::Centroid(index));

    centroid.or_else(|| {
        layout
            .point_at(point, POINT_HIT_RADIUS)
            .map(ScatterHover::Point)
    })
}

impl ViewModel {
    pub(in crate::app) fn search_matches(&mut self) -> Option<Arc<HashSet<usize>>> {
        let query = self.search.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(cache) = &self.search_match_cache
            && cache.query == query
        {
            return Some(Arc::clone(&cache.matches));
        }

        let matches = Arc::new(matching_clusters(&self.result.clusters, query));
        self.search_match_cache = Some(SearchMatchCache {
            query: query.to_owned(),
            matches: Arc::clone(&matches),
        });
        Some(matches)
    }

    pub(in crate::app) fn pointer_in_layout(
        response: &Response,
        origin: Pos2,
        bounds: Rect,
    ) -> Option<Vec2> {
        response
            .hover_pos()
            .filter(|position| bounds.contains(*position))
            .map(|position| to_layout(origin, position))
    }

    pub(in crate::app) fn update_cursor(ui: &Ui, hovering: bool, dragging: bool) {
        if dragging {
            ui.ctx().set_cursor_icon(CursorIcon::Grabbing);
        } else if hovering {
            ui.ctx().set_cursor_icon(CursorIcon::PointingHand);
        }
    }
}
