//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for cud-chat
#[derive(Parser, Debug)]
#[command(name = "cud-chat")]
#[command(author, version, about = "Terminal chat client with in-conversation image generation")]
#[command(long_about = r#"
cud-chat streams replies from a local chat model and generates images on a
ComfyUI backend whenever the model asks for one.

Configuration files are loaded from (in priority order):
1. CUD_* environment variables (e.g. CUD_CHAT__API_URL)
2. --config <path>     Explicit config file
3. ./cud.toml          Project-level config
4. ~/.config/cud-chat/config.toml   Global config

Example:
  cud-chat
  cud-chat -m Elora
  cud-chat --fresh -vv --log-file /tmp/cud-chat.log
"#)]
pub struct Cli {
    /// Model to chat with (overrides the stored selection)
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Start with an empty conversation instead of restoring the last one
    #[arg(long)]
    pub fresh: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
