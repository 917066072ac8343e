use std::{io, path::PathBuf, result};

use thiserror::Error;
use wayland_backend::client::WaylandError;
use wayland_client::{
    ConnectError, DispatchError,
    globals::{BindError, GlobalError},
};

use crate::gpu::ShaderStage;

pub type Result<T, E = Error> = result::Result<T, E>;

/// Error type for libwaytriangle.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to connect to the wayland display: {0}")]
    Connect(#[from] ConnectError),
    #[error("global error: {0}")]
    Global(#[from] GlobalError),
    #[error("bind error: {0}")]
    Bind(#[from] BindError),
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("wayland connection error: {0}")]
    Wayland(#[from] WaylandError),
    #[error("{0} global missing")]
    GlobalMissing(&'static str),

    #[error("EGL failed to get a display")]
    EglDisplay,
    #[error("EGL failed to initialize: {0}")]
    EglInitialize(khronos_egl::Error),
    #[error("EGL failed to bind the OpenGL API: {0}")]
    EglBindApi(khronos_egl::Error),
    #[error("EGL failed to choose a configuration: {0}")]
    EglChooseConfig(khronos_egl::Error),
    #[error("EGL has no configuration matching 8-bit RGBA with OpenGL")]
    EglNoConfig,
    #[error("EGL failed to create an OpenGL context: {0}")]
    EglCreateContext(khronos_egl::Error),
    #[error("EGL failed to create a window: {0}")]
    EglWindow(#[from] wayland_egl::Error),
    #[error("EGL failed to create a surface: {0}")]
    EglCreateSurface(khronos_egl::Error),
    #[error("EGL failed to make the OpenGL context current: {0}")]
    EglMakeCurrent(khronos_egl::Error),
    #[error("EGL failed to enable vsync: {0}")]
    EglSwapInterval(khronos_egl::Error),
    #[error("EGL failed to present the frame: {0}")]
    EglSwapBuffers(khronos_egl::Error),

    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("failed to create gl program")]
    CreateProgram,
    #[error("failed to link gl program: {0}")]
    LinkProgram(String),

    #[error("failed to read {path}: {source}")]
    ReadFile { path: PathBuf, source: io::Error },

    #[error("failed to map the keymap: {0}")]
    KeymapMap(io::Error),
    #[error("failed to compile the keymap")]
    KeymapCompile,

    #[error("session is not ready to render")]
    NotReady,
}
