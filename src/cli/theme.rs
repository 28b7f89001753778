use crate::config::{
    HexColor, StyleOverride, ThemeConfig as UserThemeConfig, ThemeModifier, ThemePreset, ThemeToken,
};
use ratatui::style::{Color, Modifier, Style};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Theme {
    enabled: bool,
    styles: HashMap<ThemeToken, Style>,
}

impl Theme {
    #[cfg(test)]
    pub fn new(enabled: bool) -> Self {
        Self::from_config(enabled, &UserThemeConfig::default())
    }

    pub fn from_config(enabled: bool, config: &UserThemeConfig) -> Self {
        let mut styles: HashMap<ThemeToken, Style> = ThemeToken::ALL
            .into_iter()
            .map(|token| (token, preset_style(config.preset, token)))
            .collect();
        for (token, override_style) in &config.styles {
            let base = styles.get(token).copied().unwrap_or_default();
            styles.insert(*token, merge_style(base, override_style));
        }

        Self { enabled, styles }
    }

    /// Styling is off when `NO_COLOR` is set to anything non-empty.
    pub fn color_enabled_from_env() -> bool {
        std::env::var_os("NO_COLOR").is_none_or(|value| value.is_empty())
    }

    pub fn style(&self, token: ThemeToken) -> Style {
        if !self.enabled {
            return match token {
                ThemeToken::UserPrompt => Style::default().add_modifier(Modifier::BOLD),
                ThemeToken::Status => Style::default().add_modifier(Modifier::REVERSED),
                _ => Style::default(),
            };
        }

        self.styles.get(&token).copied().unwrap_or_default()
    }
}

/// Colors a preset shares across its token styles.
struct Palette {
    accent: Color,
    text: Color,
    answer: Color,
    muted: Color,
    error: Color,
    status_bg: Color,
    input_bg: Color,
}

fn palette(preset: ThemePreset) -> Palette {
    match preset {
        ThemePreset::Default => Palette {
            accent: Color::Rgb(122, 162, 247),
            text: Color::White,
            answer: Color::Rgb(192, 202, 245),
            muted: Color::Rgb(120, 124, 153),
            error: Color::Rgb(247, 118, 142),
            status_bg: Color::Rgb(36, 40, 59),
            input_bg: Color::Rgb(22, 22, 30),
        },
        ThemePreset::Light => Palette {
            accent: Color::Rgb(31, 111, 235),
            text: Color::Rgb(36, 41, 47),
            answer: Color::Rgb(9, 60, 120),
            muted: Color::Rgb(87, 96, 106),
            error: Color::Rgb(176, 0, 32),
            status_bg: Color::Rgb(221, 227, 234),
            input_bg: Color::Rgb(246, 248, 250),
        },
        ThemePreset::HighContrast => Palette {
            accent: Color::Rgb(255, 215, 0),
            text: Color::Rgb(255, 255, 255),
            answer: Color::Rgb(135, 206, 250),
            muted: Color::Rgb(220, 220, 220),
            error: Color::Rgb(255, 64, 64),
            status_bg: Color::Rgb(0, 0, 0),
            input_bg: Color::Rgb(0, 0, 0),
        },
    }
}

fn preset_style(preset: ThemePreset, token: ThemeToken) -> Style {
    let palette = palette(preset);
    match token {
        ThemeToken::UserPrompt => Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD),
        ThemeToken::UserInput => Style::default().fg(palette.text),
        ThemeToken::AssistantText => Style::default().fg(palette.answer),
        ThemeToken::AssistantWaiting => Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::ITALIC),
        ThemeToken::ToolRequest => Style::default()
            .fg(palette.muted)
            .add_modifier(Modifier::ITALIC),
        ThemeToken::ToolResult | ThemeToken::SystemInfo => Style::default().fg(palette.muted),
        ThemeToken::SystemError => Style::default()
            .fg(palette.error)
            .add_modifier(Modifier::BOLD),
        ThemeToken::Status => Style::default().fg(palette.text).bg(palette.status_bg),
        ThemeToken::InputBlock => Style::default().fg(palette.text).bg(palette.input_bg),
    }
}

fn merge_style(base: Style, override_style: &StyleOverride) -> Style {
    let mut merged = base;

    if let Some(fg) = override_style.fg {
        merged = merged.fg(color_from_hex(fg));
    }
    if let Some(bg) = override_style.bg {
        merged = merged.bg(color_from_hex(bg));
    }
    // An explicit modifier list replaces the preset's modifiers.
    if let Some(modifiers) = &override_style.modifiers {
        let combined = modifiers
            .iter()
            .fold(Modifier::empty(), |acc, modifier| acc | to_ratatui(*modifier));
        merged = merged.remove_modifier(Modifier::all()).add_modifier(combined);
    }

    merged
}

fn color_from_hex(color: HexColor) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

fn to_ratatui(modifier: ThemeModifier) -> Modifier {
    match modifier {
        ThemeModifier::Bold => Modifier::BOLD,
        ThemeModifier::Dim => Modifier::DIM,
        ThemeModifier::Italic => Modifier::ITALIC,
        ThemeModifier::Underlined => Modifier::UNDERLINED,
        ThemeModifier::Reversed => Modifier::REVERSED,
    }
}
