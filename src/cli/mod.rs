mod app;
mod args;
mod commands;
#[cfg(test)]
mod test_support;
pub(crate) mod theme;
mod timeline;

pub use app::{AppState, run_chat, welcome_message};
pub use args::CliArgs;

pub fn color_enabled_from_env() -> bool {
    theme::Theme::color_enabled_from_env()
}
