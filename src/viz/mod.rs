//! Turns layouts plus cluster metadata into plain drawing primitives.
//!
//! Nothing here touches a painter; the egui shell and the JSON export both
//! consume the same primitives.

pub mod bubble;
pub mod dendrogram;
pub mod scatter;

use eframe::egui::{Color32, Vec2};

pub const PALETTE: [Color32; 10] = [
    Color32::from_rgb(0x4c, 0x90, 0x85),
    Color32::from_rgb(0xF1, 0x5A, 0x5A),
    Color32::from_rgb(0x7C, 0x4D, 0xFF),
    Color32::from_rgb(0xFB, 0xB1, 0x3C),
    Color32::from_rgb(0x34, 0x98, 0xDB),
    Color32::from_rgb(0x9B, 0x59, 0xB6),
    Color32::from_rgb(0x2E, 0xCC, 0x71),
    Color32::from_rgb(0xE6, 0x7E, 0x22),
    Color32::from_rgb(0x34, 0x49, 0x5E),
    Color32::from_rgb(0xC0, 0x39, 0x2B),
];

pub const NEUTRAL: Color32 = Color32::from_rgb(0xCC, 0xCC, 0xCC);
pub const MUTED_TEXT: Color32 = Color32::from_rgb(0x66, 0x66, 0x66);
pub const HOVER_STROKE: Color32 = Color32::from_rgb(0x2B, 0x2B, 0x2B);

pub fn cluster_color(index: usize) -> Color32 {
    PALETTE[index % PALETTE.len()]
}

/// Scales each channel by `0.7^k`, keeping alpha.
pub fn darker(color: Color32, k: f32) -> Color32 {
    let factor = 0.7_f32.powf(k.max(0.0));
    let scale = |channel: u8| (channel as f32 * factor).round() as u8;
    Color32::from_rgba_unmultiplied(
        scale(color.r()),
        scale(color.g()),
        scale(color.b()),
        color.a(),
    )
}

pub fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(
        color.r(),
        color.g(),
        color.b(),
        (opacity.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

pub fn hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub width: f32,
    pub color: Color32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CirclePrimitive {
    /// Index of the layout element this circle draws.
    pub key: usize,
    pub center: Vec2,
    pub radius: f32,
    pub fill: Color32,
    pub stroke: StrokeStyle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkPrimitive {
    pub source: usize,
    pub target: usize,
    pub points: Vec<Vec2>,
    pub stroke: StrokeStyle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LabelPrimitive {
    pub key: usize,
    pub position: Vec2,
    pub text: String,
    pub anchor: TextAnchor,
    pub size: f32,
    pub strong: bool,
    pub color: Color32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tooltip {
    pub title: String,
    pub lines: Vec<String>,
}
