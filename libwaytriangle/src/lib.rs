//! `libwaytriangle` opens a single xdg-shell window on a Wayland compositor,
//! binds a core-profile OpenGL 3.3 context to it through EGL and draws one
//! coloured triangle on a blue background until the window is closed.
//!
//! To get started, look at [`Session`]:
//!
//! ```no_run
//! use libwaytriangle::{Session, SessionConfig};
//!
//! let (mut session, mut event_queue) = Session::connect(SessionConfig::default())?;
//! session.run(&mut event_queue)?;
//! session.deinit();
//! # Ok::<(), libwaytriangle::Error>(())
//! ```

mod dispatch;
pub mod error;
pub mod file;
pub mod gpu;
pub mod input;
pub mod renderer;
mod state;
pub mod teardown;
pub mod window;

pub use crate::error::{Error, Result};
pub use crate::renderer::{Renderer, ShaderSource};
pub use crate::state::{Session, SessionConfig, Stage};
