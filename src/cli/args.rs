use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "persona_chat")]
#[command(
    about = "Terminal chat with an assistant that answers as you, from your profile",
    long_about = "Terminal chat with an assistant that answers as you, from your profile\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default search path when --config is not provided:\n    1. $XDG_CONFIG_HOME/persona-chat/config.toml\n    2. ~/.config/persona-chat/config.toml\n\nEnvironment variables (and a .env file) override config file values."
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print redacted HTTP request/response dumps to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}
