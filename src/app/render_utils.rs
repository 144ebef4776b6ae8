use eframe::egui::{
    Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke, StrokeKind, Vec2, pos2, vec2,
};

use crate::viz::{CirclePrimitive, LabelPrimitive, LinkPrimitive, TextAnchor, Tooltip};

const TOOLTIP_OFFSET: Vec2 = vec2(14.0, 14.0);
const TOOLTIP_PADDING: f32 = 8.0;
const TOOLTIP_LINE_HEIGHT: f32 = 16.0;

pub(super) fn to_screen(origin: Pos2, point: Vec2) -> Pos2 {
    origin + point
}

pub(super) fn to_layout(origin: Pos2, position: Pos2) -> Vec2 {
    position - origin
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(250, 250, 250));

    let step = 56.0;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(0, 0, 0, 12));

    let mut x = rect.left() + step;
    while x < rect.right() {
        painter.line_segment([pos2(x, rect.top()), pos2(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + step;
    while y < rect.bottom() {
        painter.line_segment([pos2(rect.left(), y), pos2(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn anchor_align(anchor: TextAnchor) -> Align2 {
    match anchor {
        TextAnchor::Start => Align2::LEFT_CENTER,
        TextAnchor::Middle => Align2::CENTER_CENTER,
        TextAnchor::End => Align2::RIGHT_CENTER,
    }
}

pub(super) fn paint_circle(painter: &Painter, origin: Pos2, circle: &CirclePrimitive) {
    let center = to_screen(origin, circle.center);
    painter.circle_filled(center, circle.radius, circle.fill);
    painter.circle_stroke(
        center,
        circle.radius,
        Stroke::new(circle.stroke.width, circle.stroke.color),
    );
}

pub(super) fn paint_link(painter: &Painter, origin: Pos2, link: &LinkPrimitive) {
    let points = link
        .points
        .iter()
        .map(|point| to_screen(origin, *point))
        .collect::<Vec<_>>();
    painter.add(Shape::line(
        points,
        Stroke::new(link.stroke.width, link.stroke.color),
    ));
}

/// Strong labels sit on a light plate so they stay readable over links.
pub(super) fn paint_label(painter: &Painter, origin: Pos2, label: &LabelPrimitive) {
    let plate = label.strong.then(|| painter.add(Shape::Noop));
    let text_rect = painter.text(
        to_screen(origin, label.position),
        anchor_align(label.anchor),
        &label.text,
        FontId::proportional(label.size),
        label.color,
    );
    if let Some(plate) = plate {
        painter.set(
            plate,
            Shape::rect_filled(
                text_rect.expand(2.0),
                3.0,
                Color32::from_rgba_unmultiplied(255, 255, 255, 220),
            ),
        );
    }
}

/// Top-left corner for a tooltip of `size` next to `pointer`, flipped to the
/// other side of the pointer when it would leave `bounds`.
pub(super) fn tooltip_origin(pointer: Pos2, size: Vec2, bounds: Rect) -> Pos2 {
    let mut origin = pointer + TOOLTIP_OFFSET;
    if origin.x + size.x > bounds.right() {
        origin.x = pointer.x - TOOLTIP_OFFSET.x - size.x;
    }
    if origin.y + size.y > bounds.bottom() {
        origin.y = pointer.y - TOOLTIP_OFFSET.y - size.y;
    }
    pos2(origin.x.max(bounds.left()), origin.y.max(bounds.top()))
}

pub(super) fn paint_tooltip(painter: &Painter, pointer: Pos2, bounds: Rect, tooltip: &Tooltip) {
    let title = painter.layout_no_wrap(
        tooltip.title.clone(),
        FontId::proportional(14.0),
        Color32::from_gray(20),
    );
    let lines = tooltip
        .lines
        .iter()
        .map(|line| {
            painter.layout_no_wrap(line.clone(), FontId::proportional(12.0), Color32::from_gray(70))
        })
        .collect::<Vec<_>>();

    let width = lines
        .iter()
        .map(|galley| galley.size().x)
        .fold(title.size().x, f32::max);
    let height = title.size().y + (lines.len() as f32 * TOOLTIP_LINE_HEIGHT);
    let size = vec2(width, height) + Vec2::splat(TOOLTIP_PADDING * 2.0);
    let origin = tooltip_origin(pointer, size, bounds);

    painter.rect(
        Rect::from_min_size(origin, size),
        4.0,
        Color32::from_rgba_unmultiplied(255, 255, 255, 240),
        Stroke::new(1.0, Color32::from_gray(200)),
        StrokeKind::Inside,
    );

    let mut cursor = origin + Vec2::splat(TOOLTIP_PADDING);
    let title_height = title.size().y;
    painter.galley(cursor, title, Color32::from_gray(20));
    cursor.y += title_height;
    for line in lines {
        painter.galley(cursor, line, Color32::from_gray(70));
        cursor.y += TOOLTIP_LINE_HEIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_and_screen_space_round_trip() {
        let origin = pos2(120.0, 40.0);
        let screen = to_screen(origin, vec2(10.0, 5.0));
        assert_eq!(screen, pos2(130.0, 45.0));
        assert_eq!(to_layout(origin, screen), vec2(10.0, 5.0));
    }

    #[test]
    fn tooltip_flips_near_the_edges() {
        let bounds = Rect::from_min_size(Pos2::ZERO, vec2(400.0, 300.0));
        let size = vec2(100.0, 50.0);

        assert_eq!(tooltip_origin(pos2(10.0, 10.0), size, bounds), pos2(24.0, 24.0));
        assert_eq!(
            tooltip_origin(pos2(390.0, 290.0), size, bounds),
            pos2(276.0, 226.0)
        );
    }

    #[test]
    fn label_anchors_map_to_alignment() {
        assert_eq!(anchor_align(TextAnchor::Start), Align2::LEFT_CENTER);
        assert_eq!(anchor_align(TextAnchor::End), Align2::RIGHT_CENTER);
    }

    #[test]
    fn blend_color_mixes_channels() {
        let base = Color32::from_rgb(0, 0, 0);
        let overlay = Color32::from_rgb(200, 100, 50);
        assert_eq!(blend_color(base, overlay, 0.0), base);
        assert_eq!(blend_color(base, overlay, 1.0), overlay);
        assert_eq!(blend_color(base, overlay, 0.5), Color32::from_rgb(100, 50, 25));
    }
}
