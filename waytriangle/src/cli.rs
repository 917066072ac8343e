use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Cli {
    /// Initial window width in pixels
    #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(i32).range(1..))]
    pub width: Option<i32>,

    /// Initial window height in pixels
    #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(i32).range(1..))]
    pub height: Option<i32>,

    /// Window title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Directory holding basic.vert and basic.frag, instead of the built-in shaders
    #[arg(short, long, value_name = "DIR")]
    pub shader_dir: Option<String>,

    /// Present as fast as possible instead of waiting for vertical blank
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_vsync: bool,

    /// Do not ask the compositor for server-side decorations
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_decorations: bool,

    /// Start fullscreen
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub fullscreen: bool,

    /// Log level to be used for printing to stderr
    #[cfg(feature = "logger")]
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<tracing::Level>,

    /// Path to the config file
    #[arg(short, long, value_name = "FILE_PATH")]
    pub config: Option<String>,
}
