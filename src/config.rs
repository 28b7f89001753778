use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::agent::AgentConfig;

pub const DEFAULT_PERSONA_NAME: &str = "Alex Morgan";
pub const DEFAULT_PROFILE_PATH: &str = "me/linkedin.pdf";
pub const DEFAULT_SUMMARY_PATH: &str = "me/summary.txt";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_PUSHOVER_BASE_URL: &str = "https://api.pushover.net";

const CONFIG_DIR_NAME: &str = "persona-chat";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub persona_name: String,
    pub profile_path: PathBuf,
    pub summary_path: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub pushover_token: Option<String>,
    pub pushover_user: Option<String>,
    pub pushover_base_url: String,
    pub agent: AgentConfig,
    pub theme: ThemeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeConfig {
    pub preset: ThemePreset,
    pub styles: HashMap<ThemeToken, StyleOverride>,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            preset: ThemePreset::Default,
            styles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemePreset {
    Default,
    Light,
    HighContrast,
}

impl FromStr for ThemePreset {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "default" => Ok(Self::Default),
            "light" => Ok(Self::Light),
            "high-contrast" => Ok(Self::HighContrast),
            _ => Err(format!("unknown preset '{value}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeToken {
    UserPrompt,
    UserInput,
    AssistantText,
    AssistantWaiting,
    ToolRequest,
    ToolResult,
    SystemInfo,
    SystemError,
    Status,
    InputBlock,
}

impl ThemeToken {
    pub const ALL: [ThemeToken; 10] = [
        Self::UserPrompt,
        Self::UserInput,
        Self::AssistantText,
        Self::AssistantWaiting,
        Self::ToolRequest,
        Self::ToolResult,
        Self::SystemInfo,
        Self::SystemError,
        Self::Status,
        Self::InputBlock,
    ];
}

impl FromStr for ThemeToken {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "user_prompt" => Ok(Self::UserPrompt),
            "user_input" => Ok(Self::UserInput),
            "assistant_text" => Ok(Self::AssistantText),
            "assistant_waiting" => Ok(Self::AssistantWaiting),
            "tool_request" => Ok(Self::ToolRequest),
            "tool_result" => Ok(Self::ToolResult),
            "system_info" => Ok(Self::SystemInfo),
            "system_error" => Ok(Self::SystemError),
            "status" => Ok(Self::Status),
            "input_block" => Ok(Self::InputBlock),
            _ => Err(format!("unknown token '{value}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOverride {
    pub fg: Option<HexColor>,
    pub bg: Option<HexColor>,
    pub modifiers: Option<Vec<ThemeModifier>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || "invalid hex color, expected #RRGGBB".to_string();
        let digits = value.strip_prefix('#').ok_or_else(invalid)?;
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(invalid());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| invalid())
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeModifier {
    Bold,
    Dim,
    Italic,
    Underlined,
    Reversed,
}

impl FromStr for ThemeModifier {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "bold" => Ok(Self::Bold),
            "dim" => Ok(Self::Dim),
            "italic" => Ok(Self::Italic),
            "underlined" => Ok(Self::Underlined),
            "reversed" => Ok(Self::Reversed),
            _ => Err(format!("unknown modifier '{value}'")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    persona_name: Option<String>,
    profile_path: Option<PathBuf>,
    summary_path: Option<PathBuf>,
    openai_api_key: Option<String>,
    openai_model: Option<String>,
    openai_base_url: Option<String>,
    pushover_token: Option<String>,
    pushover_user: Option<String>,
    pushover_base_url: Option<String>,
    agent: Option<RawAgentConfig>,
    theme: Option<RawThemeConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAgentConfig {
    max_rounds: Option<usize>,
    round_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThemeConfig {
    name: Option<String>,
    styles: Option<HashMap<String, RawStyleOverride>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStyleOverride {
    fg: Option<String>,
    bg: Option<String>,
    modifiers: Option<Vec<String>>,
}

impl AppConfig {
    /// Loads from the default location, see [`AppConfig::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Environment (with `.env` filling gaps) over the TOML file over defaults.
    /// An explicit path must exist; the discovered one is optional.
    pub fn load_from(explicit_path: Option<&Path>) -> Result<Self> {
        let (config_path, file_config) = match explicit_path {
            Some(path) => {
                if !path.is_file() {
                    bail!("Failed to load config {}: file not found", path.display());
                }
                (path.to_path_buf(), load_file_config(path)?)
            }
            None => {
                let path = discover_config_path()?;
                let file_config = load_file_config(&path)?;
                (path, file_config)
            }
        };
        let file = file_config.unwrap_or_default();

        dotenvy::dotenv().ok();

        let agent = validate_agent(file.agent.as_ref(), &config_path)?;
        let theme = validate_theme(file.theme.as_ref(), &config_path)?;

        Ok(Self {
            persona_name: layered("PERSONA_NAME", &file.persona_name)
                .unwrap_or_else(|| DEFAULT_PERSONA_NAME.to_string()),
            profile_path: env_non_empty("PERSONA_PROFILE_PATH")
                .map(PathBuf::from)
                .or(file.profile_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILE_PATH)),
            summary_path: env_non_empty("PERSONA_SUMMARY_PATH")
                .map(PathBuf::from)
                .or(file.summary_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SUMMARY_PATH)),
            openai_api_key: layered("OPENAI_API_KEY", &file.openai_api_key),
            openai_model: layered("OPENAI_MODEL", &file.openai_model)
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: layered("OPENAI_BASE_URL", &file.openai_base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            pushover_token: layered("PUSHOVER_TOKEN", &file.pushover_token),
            pushover_user: layered("PUSHOVER_USER", &file.pushover_user),
            pushover_base_url: layered("PUSHOVER_BASE_URL", &file.pushover_base_url)
                .unwrap_or_else(|| DEFAULT_PUSHOVER_BASE_URL.to_string()),
            agent,
            theme,
        })
    }
}

fn layered(env_key: &str, file_value: &Option<String>) -> Option<String> {
    env_non_empty(env_key).or_else(|| {
        file_value
            .as_deref()
            .and_then(non_empty)
            .map(ToOwned::to_owned)
    })
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow!("Failed to resolve config path: HOME directory is unavailable"))?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

fn validate_agent(raw_agent: Option<&RawAgentConfig>, config_path: &Path) -> Result<AgentConfig> {
    let mut config = AgentConfig::default();
    let Some(agent) = raw_agent else {
        return Ok(config);
    };

    if let Some(max_rounds) = agent.max_rounds {
        if max_rounds == 0 {
            return Err(config_error(
                config_path,
                "agent.max_rounds",
                "must be at least 1",
            ));
        }
        config.max_rounds = max_rounds;
    }

    if let Some(secs) = agent.round_timeout_secs {
        if secs == 0 {
            return Err(config_error(
                config_path,
                "agent.round_timeout_secs",
                "must be at least 1",
            ));
        }
        config.round_timeout_ms = secs.saturating_mul(1_000);
    }

    Ok(config)
}

fn validate_theme(raw_theme: Option<&RawThemeConfig>, config_path: &Path) -> Result<ThemeConfig> {
    let mut config = ThemeConfig::default();
    let Some(theme) = raw_theme else {
        return Ok(config);
    };

    if let Some(name) = &theme.name {
        config.preset = parse_key(name, config_path, "theme.name")?;
    }

    for (token_name, raw_style) in theme.styles.iter().flatten() {
        let key = format!("theme.styles.{token_name}");
        let token: ThemeToken = parse_key(token_name, config_path, &key)?;

        let fg = raw_style
            .fg
            .as_deref()
            .map(|value| parse_key(value, config_path, &format!("{key}.fg")))
            .transpose()?;
        let bg = raw_style
            .bg
            .as_deref()
            .map(|value| parse_key(value, config_path, &format!("{key}.bg")))
            .transpose()?;
        let modifiers = raw_style
            .modifiers
            .as_ref()
            .map(|values| {
                values
                    .iter()
                    .map(|value| parse_key(value, config_path, &format!("{key}.modifiers")))
                    .collect::<Result<Vec<ThemeModifier>>>()
            })
            .transpose()?;

        config.styles.insert(token, StyleOverride { fg, bg, modifiers });
    }

    Ok(config)
}

fn parse_key<T: FromStr<Err = String>>(value: &str, config_path: &Path, key_path: &str) -> Result<T> {
    T::from_str(value).map_err(|reason| config_error(config_path, key_path, &reason))
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|value| non_empty(&value).map(ToOwned::to_owned))
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}
