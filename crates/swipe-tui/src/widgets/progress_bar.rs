//! Smooth Unicode bars: preview progress and recommendation scores.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_MUTED, C_PLAYING, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// `fraction` of `width` cells filled with eighth-block precision.
pub fn bar(fraction: f64, width: usize) -> String {
    let eighths = (fraction.clamp(0.0, 1.0) * width as f64 * 8.0) as usize;
    let full_blocks = eighths / 8;
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width + 4);
    for _ in 0..full_blocks {
        bar.push('█');
    }
    if full_blocks < width {
        bar.push(BLOCKS[partial]);
        for _ in (full_blocks + 1)..width {
            bar.push(' ');
        }
    }
    bar
}

/// Preview progress with a trailing percentage.
pub fn draw_progress(frame: &mut Frame, area: Rect, progress: f32, label: &str) {
    if area.width < 8 || area.height == 0 {
        return;
    }
    let right = format!(" {:>3}%", (progress.clamp(0.0, 1.0) * 100.0).round() as u32);
    let left = format!("{} ", label);
    let bar_w = area
        .width
        .saturating_sub((left.chars().count() + right.len()) as u16)
        .max(4) as usize;

    let spans = vec![
        Span::styled(left, Style::default().fg(C_SECONDARY)),
        Span::styled(bar(f64::from(progress), bar_w), Style::default().fg(C_PLAYING)),
        Span::styled(right, Style::default().fg(C_MUTED)),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Small labelled score bar for a 0..1 value, e.g. `nrg ▕███▍  ▏`.
pub fn score_span(label: &'static str, value: f64, width: usize, color: Color) -> Vec<Span<'static>> {
    vec![
        Span::styled(format!("{} ", label), Style::default().fg(C_MUTED)),
        Span::styled(bar(value, width), Style::default().fg(color)),
        Span::raw(" "),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_uses_partial_blocks() {
        assert_eq!(bar(0.0, 4), "    ");
        assert_eq!(bar(1.0, 4), "████");
        assert_eq!(bar(0.5625, 2), "█▏");
    }

    #[test]
    fn bar_clamps_out_of_range() {
        assert_eq!(bar(3.0, 3), "███");
        assert_eq!(bar(-1.0, 3), "   ");
    }
}
