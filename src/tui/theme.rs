//! Color theme definitions for the UI.
//!
//! Provides 5 built-in themes: default, cyber, dracula, nord, monochrome.
//! Themes can be selected via the `--theme` CLI flag and cycled at runtime.

use ratatui::style::Color;
use std::borrow::Cow;

/// All themeable colors in the application
#[derive(Clone, Debug)]
pub struct Theme {
    name: Cow<'static, str>,

    // UI chrome
    pub border: Color,
    pub text: Color,
    pub text_dim: Color,

    // Status indicators
    pub success: Color,
    pub warning: Color,
    pub error: Color,

    // Accents
    pub shortcut: Color,
    pub header: Color,

    // Map surface
    pub landmass: Color,
    pub graticule: Color,
    pub packet_direct: Color,
    pub packet_hinted: Color,
    pub marker: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

impl Theme {
    pub fn default_theme() -> Self {
        Self {
            name: Cow::Borrowed("default"),

            border: Color::Cyan,
            text: Color::White,
            text_dim: Color::Gray,

            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,

            shortcut: Color::Yellow,
            header: Color::Cyan,

            landmass: Color::DarkGray,
            graticule: Color::Rgb(40, 40, 50),
            packet_direct: Color::Cyan,
            packet_hinted: Color::Magenta,
            marker: Color::LightYellow,
        }
    }

    /// Cyber theme - neon on dark
    pub fn cyber() -> Self {
        Self {
            name: Cow::Borrowed("cyber"),

            border: Color::Rgb(0, 255, 255),
            text: Color::Rgb(255, 255, 255),
            text_dim: Color::Rgb(100, 100, 120),

            success: Color::Rgb(0, 255, 150),
            warning: Color::Rgb(255, 200, 0),
            error: Color::Rgb(255, 50, 100),

            shortcut: Color::Rgb(255, 0, 255),
            header: Color::Rgb(0, 255, 255),

            landmass: Color::Rgb(40, 60, 80),
            graticule: Color::Rgb(25, 35, 50),
            packet_direct: Color::Rgb(0, 255, 255),
            packet_hinted: Color::Rgb(255, 0, 255),
            marker: Color::Rgb(255, 255, 0),
        }
    }

    /// Dracula theme - popular dark theme
    pub fn dracula() -> Self {
        Self {
            name: Cow::Borrowed("dracula"),

            border: Color::Rgb(189, 147, 249),
            text: Color::Rgb(248, 248, 242),
            text_dim: Color::Rgb(98, 114, 164),

            success: Color::Rgb(80, 250, 123),
            warning: Color::Rgb(255, 184, 108),
            error: Color::Rgb(255, 85, 85),

            shortcut: Color::Rgb(241, 250, 140),
            header: Color::Rgb(255, 121, 198),

            landmass: Color::Rgb(68, 71, 90),
            graticule: Color::Rgb(48, 50, 66),
            packet_direct: Color::Rgb(139, 233, 253),
            packet_hinted: Color::Rgb(255, 121, 198),
            marker: Color::Rgb(241, 250, 140),
        }
    }

    /// Nord theme - arctic blues
    pub fn nord() -> Self {
        Self {
            name: Cow::Borrowed("nord"),

            border: Color::Rgb(136, 192, 208),
            text: Color::Rgb(216, 222, 233),
            text_dim: Color::Rgb(76, 86, 106),

            success: Color::Rgb(163, 190, 140),
            warning: Color::Rgb(235, 203, 139),
            error: Color::Rgb(191, 97, 106),

            shortcut: Color::Rgb(235, 203, 139),
            header: Color::Rgb(136, 192, 208),

            landmass: Color::Rgb(67, 76, 94),
            graticule: Color::Rgb(46, 52, 64),
            packet_direct: Color::Rgb(136, 192, 208),
            packet_hinted: Color::Rgb(180, 142, 173),
            marker: Color::Rgb(235, 203, 139),
        }
    }

    /// Monochrome theme - no color, for limited terminals
    pub fn monochrome() -> Self {
        Self {
            name: Cow::Borrowed("monochrome"),

            border: Color::White,
            text: Color::White,
            text_dim: Color::DarkGray,

            success: Color::White,
            warning: Color::Gray,
            error: Color::White,

            shortcut: Color::White,
            header: Color::White,

            landmass: Color::DarkGray,
            graticule: Color::Black,
            packet_direct: Color::White,
            packet_hinted: Color::Gray,
            marker: Color::White,
        }
    }

    /// Get theme by name (falls back to default)
    pub fn by_name(name: &str) -> Self {
        match name {
            "cyber" => Self::cyber(),
            "dracula" => Self::dracula(),
            "nord" => Self::nord(),
            "monochrome" => Self::monochrome(),
            _ => Self::default_theme(),
        }
    }

    /// List available theme names in cycle order
    pub fn list() -> &'static [&'static str] {
        &["default", "cyber", "dracula", "nord", "monochrome"]
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_roundtrip() {
        for name in Theme::list() {
            assert_eq!(Theme::by_name(name).name(), *name);
        }
    }

    #[test]
    fn test_unknown_name_falls_back() {
        assert_eq!(Theme::by_name("no-such-theme").name(), "default");
    }
}
