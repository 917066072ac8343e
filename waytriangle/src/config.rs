use crate::cli::Cli;
use libwaytriangle::{SessionConfig, ShaderSource};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Read, path::PathBuf};
use tracing::Level;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    pub window: Option<Window>,
    pub render: Option<Render>,
    pub log: Option<Log>,
}

impl Config {
    pub fn load(path: &PathBuf) -> Option<Config> {
        let mut config_file = File::open(path).ok()?;
        let mut config_str = String::new();
        config_file.read_to_string(&mut config_str).ok()?;

        toml::from_str(&config_str)
            .inspect_err(|e| tracing::warn!("ignoring {}: {e}", path.display()))
            .ok()
    }

    /// `$XDG_CONFIG_HOME/waytriangle/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("waytriangle").join("config.toml"))
    }

    /// Layers the command line over this file over the library defaults.
    pub fn session_config(self, cli: &Cli) -> SessionConfig {
        let defaults = SessionConfig::default();
        let window = self.window.unwrap_or_default();
        let render = self.render.unwrap_or_default();

        let shader_dir = cli
            .shader_dir
            .as_deref()
            .map(expand_path)
            .or_else(|| {
                render
                    .shader_dir
                    .map(|dir| expand_path(&dir.to_string_lossy()))
            });

        SessionConfig {
            width: cli
                .width
                .or(dimension(window.width, "width"))
                .unwrap_or(defaults.width),
            height: cli
                .height
                .or(dimension(window.height, "height"))
                .unwrap_or(defaults.height),
            title: cli
                .title
                .clone()
                .or(window.title)
                .unwrap_or(defaults.title),
            vsync: !cli.no_vsync && render.vsync.unwrap_or(defaults.vsync),
            decorations: !cli.no_decorations
                && window.decorations.unwrap_or(defaults.decorations),
            fullscreen: cli.fullscreen || window.fullscreen.unwrap_or(defaults.fullscreen),
            shaders: shader_dir.map_or(defaults.shaders, ShaderSource::Directory),
        }
    }
}

/// Drops a `[window]` dimension below one pixel so the default applies.
fn dimension(value: Option<i32>, name: &str) -> Option<i32> {
    match value {
        Some(pixels) if pixels < 1 => {
            tracing::warn!("ignoring [window] {name} = {pixels}, must be at least 1");
            None
        }
        value => value,
    }
}

/// Expands `~` and environment variables, keeping the input on failure.
pub fn expand_path(path: &str) -> PathBuf {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .unwrap_or_else(|_| PathBuf::from(path))
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Window {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub title: Option<String>,
    pub decorations: Option<bool>,
    pub fullscreen: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Render {
    pub vsync: Option<bool>,
    pub shader_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            level: Some("info".to_string()),
        }
    }
}

impl Log {
    pub fn get_level(self) -> Level {
        self.level
            .map_or(Level::INFO, |level| match level.as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" => Level::WARN,
                "error" => Level::ERROR,
                _ => Level::INFO,
            })
    }
}
