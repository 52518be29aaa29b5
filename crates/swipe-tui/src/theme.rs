//! Color palette and style constants for the swipe TUI.

use ratatui::style::{Color, Modifier, Style};

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(18, 18, 18);
pub const C_ACCENT: Color = Color::Rgb(30, 215, 96);
pub const C_LIKE: Color = Color::Rgb(80, 200, 120);
pub const C_DISLIKE: Color = Color::Rgb(255, 80, 80);
pub const C_PLAYING: Color = Color::Rgb(80, 200, 120);
pub const C_LOADING: Color = Color::Rgb(255, 184, 80);
pub const C_MUTED: Color = Color::Rgb(72, 72, 88);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_SELECTION_BG: Color = Color::Rgb(28, 28, 40);
pub const C_PANEL_BORDER: Color = Color::Rgb(40, 40, 52);
pub const C_PANEL_BORDER_FOCUSED: Color = Color::Rgb(120, 100, 200);
pub const C_CARD_BG: Color = Color::Rgb(26, 26, 34);
pub const C_FILTER_BG: Color = Color::Rgb(20, 20, 32);
pub const C_FILTER_FG: Color = Color::Rgb(255, 200, 80);
pub const C_TAG: Color = Color::Rgb(80, 140, 200);
pub const C_ENERGY: Color = Color::Rgb(255, 140, 80);
pub const C_POPULARITY: Color = Color::Rgb(180, 120, 220);
pub const C_DANCE: Color = Color::Rgb(80, 180, 220);
pub const C_TOAST_INFO: Color = Color::Rgb(80, 160, 220);
pub const C_TOAST_SUCCESS: Color = Color::Rgb(80, 200, 120);
pub const C_TOAST_WARNING: Color = Color::Rgb(255, 184, 80);
pub const C_TOAST_ERROR: Color = Color::Rgb(255, 95, 95);

// ── Predefined styles ─────────────────────────────────────────────────────────

pub fn style_default() -> Style {
    Style::default().fg(C_PRIMARY)
}

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY)
}

pub fn style_accent() -> Style {
    Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD)
}

pub fn style_playing() -> Style {
    Style::default().fg(C_PLAYING)
}

pub fn style_selected() -> Style {
    Style::default()
        .bg(C_SELECTION_BG)
        .fg(C_PRIMARY)
        .add_modifier(Modifier::BOLD)
}

pub fn style_focused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER_FOCUSED)
}

pub fn style_unfocused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER)
}

pub fn style_filter() -> Style {
    Style::default().fg(C_FILTER_FG).bg(C_FILTER_BG)
}

pub fn style_muted() -> Style {
    Style::default().fg(C_MUTED)
}

/// Mix `color` toward the background by `opacity` (0 = invisible, 1 = full).
/// Non-RGB colors are returned unchanged above half opacity, else the
/// background.
pub fn fade(color: Color, opacity: f32) -> Color {
    let t = opacity.clamp(0.0, 1.0);
    match (color, C_BG) {
        (Color::Rgb(r, g, b), Color::Rgb(br, bg, bb)) => {
            let mix = |c: u8, base: u8| (f32::from(base) + (f32::from(c) - f32::from(base)) * t).round() as u8;
            Color::Rgb(mix(r, br), mix(g, bg), mix(b, bb))
        }
        _ if t >= 0.5 => color,
        _ => C_BG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_interpolates_toward_background() {
        assert_eq!(fade(C_LIKE, 1.0), C_LIKE);
        assert_eq!(fade(C_LIKE, 0.0), C_BG);
        assert_eq!(fade(Color::Rgb(118, 118, 118), 0.5), Color::Rgb(68, 68, 68));
    }
}
