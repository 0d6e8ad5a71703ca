//! # Screen Rendering
//!
//! Turns a `(Screen, MetricSnapshot)` pair into a panel-sized [`PixelBuffer`].
//! Rendering happens in two steps so the text can be checked without decoding
//! pixels:
//!
//! 1. [`layout`] formats the snapshot into a [`Frame`]: title, up to three value
//!    lines and a page indicator
//! 2. [`render_frame`] rasterises the frame with embedded-graphics mono fonts
//!
//! Both steps are pure. Identical input always produces byte-identical buffers.

use crate::framebuffer::{PixelBuffer, PANEL_HEIGHT, PANEL_WIDTH};
use crate::metrics::{ConnectionKind, MetricSnapshot};
use crate::Screen;
use embedded_graphics::{
    mono_font::{
        iso_8859_1::{FONT_5X8, FONT_6X10, FONT_7X13_BOLD},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Baseline, Text},
};

/// Drawn in place of any value that could not be read.
pub const PLACEHOLDER: &str = "N/A";

/// Text shown while the power-off sequence runs.
pub const SHUTDOWN_NOTICE: &str = "Shutting down...";

const MARGIN: i32 = 2;
const TITLE_FONT: &MonoFont<'static> = &FONT_7X13_BOLD;
const BODY_FONT: &MonoFont<'static> = &FONT_6X10;
const PAGE_FONT: &MonoFont<'static> = &FONT_5X8;
const RULE_Y: i32 = 15;
const FIRST_LINE_Y: i32 = 18;
const LINE_PITCH: i32 = 12;
const MAX_LINES: usize = 3;

/// Text content of one page, before rasterisation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub title: String,
    pub lines: Vec<String>,
    /// e.g. "2/5"
    pub page: String,
}

impl Frame {
    /// True when any line mentions `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.title.contains(needle) || self.lines.iter().any(|l| l.contains(needle))
    }
}

/// Render a metric page.
pub fn render(screen: Screen, snapshot: &MetricSnapshot) -> PixelBuffer {
    render_frame(&layout(screen, snapshot))
}

/// Format a snapshot into page text.
///
/// A snapshot that belongs to another screen is treated as unavailable.
pub fn layout(screen: Screen, snapshot: &MetricSnapshot) -> Frame {
    let fallback;
    let snapshot = if snapshot.screen() == screen {
        snapshot
    } else {
        fallback = MetricSnapshot::unavailable(screen);
        &fallback
    };

    let lines = match snapshot {
        MetricSnapshot::Network(info) => {
            let link = match info.connection {
                Some(ConnectionKind::Wifi) => {
                    format!("WiFi: {}", info.ssid.as_deref().unwrap_or(PLACEHOLDER))
                }
                Some(kind) => format!("Type: {}", kind.label()),
                None => format!("Type: {PLACEHOLDER}"),
            };
            vec![link, format!("IP: {}", or_placeholder(info.ipv4))]
        }
        MetricSnapshot::Storage(info) => vec![
            match info.free_bytes {
                Some(bytes) => format!("{} free", format_bytes(bytes)),
                None => format!("{PLACEHOLDER} free"),
            },
            format!("Used: {}", percent_or_placeholder(info.used_percent)),
        ],
        MetricSnapshot::SystemLoad(info) => vec![
            format!("CPU: {}", percent_or_placeholder(info.cpu_percent)),
            format!(
                "RAM: {} ({})",
                info.ram_used_mb
                    .map(|mb| format!("{mb}MB"))
                    .unwrap_or_else(|| PLACEHOLDER.to_string()),
                percent_or_placeholder(info.ram_percent)
            ),
        ],
        MetricSnapshot::Temperature(info) => vec![info
            .celsius
            .map(|c| format!("{c:.1}°C"))
            .unwrap_or_else(|| PLACEHOLDER.to_string())],
        MetricSnapshot::Clock(info) => match info.local {
            Some(now) => vec![
                now.format("%d/%m/%Y").to_string(),
                now.format("%H:%M:%S").to_string(),
            ],
            None => vec![PLACEHOLDER.to_string(), PLACEHOLDER.to_string()],
        },
    };

    Frame {
        title: screen.title().to_string(),
        lines,
        page: format!("{}/{}", screen.index() + 1, Screen::COUNT),
    }
}

/// Rasterise a frame onto a fresh panel buffer.
pub fn render_frame(frame: &Frame) -> PixelBuffer {
    let mut buffer = PixelBuffer::panel();

    draw_text(&mut buffer, &frame.title, TITLE_FONT, Point::new(MARGIN, 1));
    Line::new(
        Point::new(MARGIN, RULE_Y),
        Point::new(PANEL_WIDTH as i32 - 1 - MARGIN, RULE_Y),
    )
    .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
    .draw(&mut buffer)
    .ok();

    for (index, line) in frame.lines.iter().take(MAX_LINES).enumerate() {
        draw_text(&mut buffer, line, BODY_FONT, line_origin(index));
    }

    // Page indicator in the bottom-right corner
    let page_width = text_width(&frame.page, PAGE_FONT);
    let page_height = PAGE_FONT.character_size.height as i32;
    draw_text(
        &mut buffer,
        &frame.page,
        PAGE_FONT,
        Point::new(
            PANEL_WIDTH as i32 - MARGIN - page_width,
            PANEL_HEIGHT as i32 - page_height,
        ),
    );

    buffer
}

/// A single line of text centred on an otherwise dark panel.
pub fn render_notice(text: &str) -> PixelBuffer {
    let mut buffer = PixelBuffer::panel();
    let width = text_width(text, BODY_FONT);
    let height = BODY_FONT.character_size.height as i32;
    let origin = Point::new(
        (PANEL_WIDTH as i32 - width).max(0) / 2,
        (PANEL_HEIGHT as i32 - height) / 2,
    );
    draw_text(&mut buffer, text, BODY_FONT, origin);
    buffer
}

/// Top-left corner of value line `index`.
pub fn line_origin(index: usize) -> Point {
    Point::new(MARGIN, FIRST_LINE_Y + index as i32 * LINE_PITCH)
}

/// Human-readable byte count with one decimal, binary multiples.
pub fn format_bytes(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Whole-number percentage, rounded half away from zero.
pub fn format_percent(percent: f32) -> String {
    format!("{}%", percent.round() as i64)
}

fn percent_or_placeholder(percent: Option<f32>) -> String {
    percent
        .map(format_percent)
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn or_placeholder<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn text_width(text: &str, font: &MonoFont<'_>) -> i32 {
    let advance = font.character_size.width + font.character_spacing;
    (text.chars().count() as u32 * advance) as i32
}

fn draw_text(buffer: &mut PixelBuffer, text: &str, font: &MonoFont<'_>, origin: Point) {
    let style = MonoTextStyle::new(font, BinaryColor::On);
    Text::with_baseline(text, origin, style, Baseline::Top)
        .draw(buffer)
        .ok();
}
