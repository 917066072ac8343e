use std::{ffi::c_void, io::ErrorKind, ptr};

use khronos_egl as egl;
use wayland_backend::client::WaylandError;
use wayland_client::{
    Connection, EventQueue, Proxy, QueueHandle,
    globals::{BindError, GlobalList, registry_queue_init},
    protocol::{
        wl_compositor::WlCompositor, wl_keyboard::WlKeyboard, wl_registry::WlRegistry,
        wl_seat::WlSeat, wl_surface::WlSurface,
    },
};
use wayland_egl::WlEglSurface;
use wayland_protocols::xdg::{
    decoration::zv1::client::{
        zxdg_decoration_manager_v1::ZxdgDecorationManagerV1,
        zxdg_toplevel_decoration_v1::{self, ZxdgToplevelDecorationV1},
    },
    shell::client::{xdg_surface::XdgSurface, xdg_toplevel::XdgToplevel, xdg_wm_base::XdgWmBase},
};

use crate::{
    error::{Error, Result},
    gpu::{Gl, NativeGl},
    input::{KeyAction, KeyboardState},
    renderer::{Renderer, ShaderSource},
    teardown::{Resource, Teardown},
    window::WindowState,
};

/// Everything the caller chooses about the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub width: i32,
    pub height: i32,
    pub title: String,
    pub vsync: bool,
    /// Ask for server-side decorations when the compositor offers them.
    pub decorations: bool,
    pub fullscreen: bool,
    pub shaders: ShaderSource,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            title: "OpenGL Window".to_string(),
            vsync: true,
            decorations: true,
            fullscreen: false,
            shaders: ShaderSource::Embedded,
        }
    }
}

/// How far initialisation got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Disconnected,
    Connected,
    GlobalsBound,
    SurfaceCreated,
    GraphicsReady,
}

const CONFIG_ATTRIBUTES: [egl::Int; 13] = [
    egl::SURFACE_TYPE,
    egl::WINDOW_BIT,
    egl::RED_SIZE,
    8,
    egl::GREEN_SIZE,
    8,
    egl::BLUE_SIZE,
    8,
    egl::ALPHA_SIZE,
    8,
    egl::RENDERABLE_TYPE,
    egl::OPENGL_BIT,
    egl::NONE,
];

const CONTEXT_ATTRIBUTES: [egl::Int; 7] = [
    egl::CONTEXT_MAJOR_VERSION,
    3,
    egl::CONTEXT_MINOR_VERSION,
    3,
    egl::CONTEXT_OPENGL_PROFILE_MASK,
    egl::CONTEXT_OPENGL_CORE_PROFILE_BIT,
    egl::NONE,
];

/// A single window with an OpenGL context bound to it.
///
/// All protocol objects are held as `Option`s filled in acquisition order;
/// [`Session::deinit`] empties them in reverse and also runs on drop.
pub struct Session<G: Gl = NativeGl> {
    pub config: SessionConfig,
    pub window: WindowState,
    pub keyboard: KeyboardState,
    stage: Stage,

    pub(crate) connection: Option<Connection>,
    pub(crate) registry: Option<WlRegistry>,
    pub(crate) compositor: Option<WlCompositor>,
    pub(crate) wm_base: Option<XdgWmBase>,
    pub(crate) decoration_manager: Option<ZxdgDecorationManagerV1>,
    pub(crate) seat: Option<WlSeat>,
    pub(crate) wl_keyboard: Option<WlKeyboard>,

    pub(crate) wl_surface: Option<WlSurface>,
    pub(crate) xdg_surface: Option<XdgSurface>,
    pub(crate) toplevel: Option<XdgToplevel>,
    pub(crate) decoration: Option<ZxdgToplevelDecorationV1>,

    egl: egl::Instance<egl::Static>,
    pub(crate) egl_window: Option<WlEglSurface>,
    egl_display: Option<egl::Display>,
    egl_context: Option<egl::Context>,
    egl_surface: Option<egl::Surface>,
    pub(crate) renderer: Option<Renderer<G>>,
}

impl<G: Gl> std::fmt::Debug for Session<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("stage", &self.stage)
            .field("window", &self.window)
            .field("keyboard", &self.keyboard)
            .field("decorated", &self.decoration.is_some())
            .field("seat", &self.seat.is_some())
            .finish_non_exhaustive()
    }
}

fn required<I>(bound: Result<I, BindError>, interface: &'static str) -> Result<I> {
    match bound {
        Ok(proxy) => Ok(proxy),
        Err(BindError::NotPresent) => {
            tracing::error!("Compositor does not advertise {interface}");
            Err(Error::GlobalMissing(interface))
        }
        Err(e) => Err(e.into()),
    }
}

/// Socket I/O that would block is left for the next loop iteration.
fn retry_later<T>(result: Result<T, WaylandError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(WaylandError::Io(e)) if e.kind() == ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn optional<I>(bound: Result<I, BindError>, interface: &'static str) -> Option<I> {
    bound
        .inspect_err(|e| tracing::debug!("{interface} unavailable: {e}"))
        .ok()
}

impl Session {
    /// A session that has acquired nothing yet.
    pub fn new(config: SessionConfig) -> Self {
        Self::unconnected(config)
    }

    /// Runs every initialisation stage, ending with a current OpenGL
    /// context and a compiled renderer.
    ///
    /// On failure everything acquired so far is released before returning.
    pub fn connect(config: SessionConfig) -> Result<(Self, EventQueue<Self>)> {
        let mut session = Self::new(config);
        let mut event_queue = session.bind_globals()?;
        session.create_window(&event_queue.handle())?;
        session.await_first_configure(&mut event_queue)?;
        session.init_egl()?;
        Ok((session, event_queue))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    fn bind_globals(&mut self) -> Result<EventQueue<Self>> {
        let connection = Connection::connect_to_env()
            .inspect_err(|e| tracing::error!("Failed to connect to Wayland display: {e}"))?;
        self.connection = Some(connection.clone());
        self.advance(Stage::Connected);

        let (globals, event_queue) = registry_queue_init::<Self>(&connection)?;
        let qh = event_queue.handle();
        self.registry = Some(globals.registry().clone());
        tracing::trace!("Globals advertised: {:#?}", globals.contents().clone_list());

        self.compositor = Some(required(
            globals.bind::<WlCompositor, _, _>(&qh, 1..=4, ()),
            "wl_compositor",
        )?);
        self.wm_base = Some(required(
            globals.bind::<XdgWmBase, _, _>(&qh, 1..=6, ()),
            "xdg_wm_base",
        )?);
        self.bind_optional(&globals, &qh);

        self.advance(Stage::GlobalsBound);
        Ok(event_queue)
    }

    fn bind_optional(&mut self, globals: &GlobalList, qh: &QueueHandle<Self>) {
        if self.config.decorations {
            self.decoration_manager = optional(
                globals.bind::<ZxdgDecorationManagerV1, _, _>(qh, 1..=1, ()),
                "zxdg_decoration_manager_v1",
            );
        }
        self.seat = optional(globals.bind::<WlSeat, _, _>(qh, 1..=7, ()), "wl_seat");
    }

    #[tracing::instrument(skip(self, qh), level = "debug")]
    fn create_window(&mut self, qh: &QueueHandle<Self>) -> Result<()> {
        let compositor = self
            .compositor
            .as_ref()
            .ok_or(Error::GlobalMissing("wl_compositor"))?;
        let wm_base = self
            .wm_base
            .as_ref()
            .ok_or(Error::GlobalMissing("xdg_wm_base"))?;

        let wl_surface = compositor.create_surface(qh, ());
        let xdg_surface = wm_base.get_xdg_surface(&wl_surface, qh, ());
        let toplevel = xdg_surface.get_toplevel(qh, ());
        toplevel.set_title(self.config.title.clone());

        if let Some(manager) = &self.decoration_manager {
            let decoration = manager.get_toplevel_decoration(&toplevel, qh, ());
            decoration.set_mode(zxdg_toplevel_decoration_v1::Mode::ServerSide);
            self.decoration = Some(decoration);
        }
        if self.window.fullscreen {
            toplevel.set_fullscreen(None);
        }

        self.wl_surface = Some(wl_surface);
        self.xdg_surface = Some(xdg_surface);
        self.toplevel = Some(toplevel);
        self.advance(Stage::SurfaceCreated);
        Ok(())
    }

    fn await_first_configure(&mut self, event_queue: &mut EventQueue<Self>) -> Result<()> {
        if let Some(surface) = &self.wl_surface {
            surface.commit();
        }
        event_queue.blocking_dispatch(self)?;
        tracing::debug!(
            "first configure handled, window is {}x{}",
            self.window.width,
            self.window.height
        );
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    fn init_egl(&mut self) -> Result<()> {
        let wl_display = self
            .connection
            .as_ref()
            .map(Connection::display)
            .ok_or(Error::NotReady)?;
        let wl_surface_id = self.wl_surface.as_ref().ok_or(Error::NotReady)?.id();

        let display = unsafe { self.egl.get_display(wl_display.id().as_ptr() as *mut c_void) }
            .ok_or_else(|| {
                tracing::error!("EGL failed to get a display.");
                Error::EglDisplay
            })?;
        self.egl_display = Some(display);

        let (major, minor) = self.egl.initialize(display).map_err(|e| {
            tracing::error!("EGL failed to initialize.");
            Error::EglInitialize(e)
        })?;
        tracing::debug!("EGL {major}.{minor} initialized");

        self.egl.bind_api(egl::OPENGL_API).map_err(|e| {
            tracing::error!("EGL failed to bind OpenGL API.");
            Error::EglBindApi(e)
        })?;

        let config = self
            .egl
            .choose_first_config(display, &CONFIG_ATTRIBUTES)
            .map_err(|e| {
                tracing::error!("EGL failed to choose a configuration.");
                Error::EglChooseConfig(e)
            })?
            .ok_or_else(|| {
                tracing::error!("EGL failed to choose a configuration.");
                Error::EglNoConfig
            })?;

        self.egl_context = Some(
            self.egl
                .create_context(display, config, None, &CONTEXT_ATTRIBUTES)
                .map_err(|e| {
                    tracing::error!("EGL failed to create an OpenGL context.");
                    Error::EglCreateContext(e)
                })?,
        );

        let egl_window = WlEglSurface::new(wl_surface_id, self.window.width, self.window.height)
            .inspect_err(|_| tracing::error!("EGL failed to create a window."))?;
        let native_window = egl_window.ptr() as egl::NativeWindowType;
        self.egl_window = Some(egl_window);

        let surface = unsafe {
            self.egl
                .create_window_surface(display, config, native_window, None)
                .map_err(|e| {
                    tracing::error!("EGL failed to create a surface.");
                    Error::EglCreateSurface(e)
                })?
        };
        self.egl_surface = Some(surface);

        self.egl
            .make_current(display, Some(surface), Some(surface), self.egl_context)
            .map_err(|e| {
                tracing::error!("EGL failed to make the OpenGL context current.");
                Error::EglMakeCurrent(e)
            })?;

        if self.config.vsync {
            self.egl.swap_interval(display, 1).map_err(|e| {
                tracing::error!("EGL failed to enable vsync.");
                Error::EglSwapInterval(e)
            })?;
        }

        let egl = &self.egl;
        let gl = NativeGl::load(|symbol| {
            egl.get_proc_address(symbol)
                .map_or(ptr::null(), |f| f as *const c_void)
        });
        let renderer = Renderer::new(gl, &self.config.shaders)?;
        renderer.resize(self.window.width, self.window.height);
        self.renderer = Some(renderer);

        self.window.running = true;
        self.advance(Stage::GraphicsReady);
        tracing::info!(
            "OpenGL window ready at {}x{}",
            self.window.width,
            self.window.height
        );
        Ok(())
    }
}

impl<G: Gl> Session<G> {
    /// A session that has acquired nothing yet.
    pub(crate) fn unconnected(config: SessionConfig) -> Self {
        let window = WindowState::new(config.width, config.height, config.fullscreen);
        Self {
            config,
            window,
            keyboard: KeyboardState::default(),
            stage: Stage::Disconnected,

            connection: None,
            registry: None,
            compositor: None,
            wm_base: None,
            decoration_manager: None,
            seat: None,
            wl_keyboard: None,

            wl_surface: None,
            xdg_surface: None,
            toplevel: None,
            decoration: None,

            egl: egl::Instance::new(egl::Static),
            egl_window: None,
            egl_display: None,
            egl_context: None,
            egl_surface: None,
            renderer: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!("session stage {:?} -> {stage:?}", self.stage);
        self.stage = stage;
    }

    /// Resizes the native window and the viewport to a configured size.
    pub(crate) fn resize_drawable(&self, width: i32, height: i32) {
        if let Some(egl_window) = &self.egl_window {
            egl_window.resize(width, height, 0, 0);
        }
        if let Some(renderer) = &self.renderer {
            renderer.resize(width, height);
        }
    }

    pub(crate) fn apply_key_action(&mut self, action: KeyAction) {
        match action {
            KeyAction::Quit => {
                tracing::info!("Escape pressed, shutting down");
                self.window.running = false;
            }
            KeyAction::ToggleFullscreen => {
                let fullscreen = self.window.toggle_fullscreen();
                tracing::debug!("fullscreen {fullscreen}");
                if let Some(toplevel) = &self.toplevel {
                    if fullscreen {
                        toplevel.set_fullscreen(None);
                    } else {
                        toplevel.unset_fullscreen();
                    }
                }
            }
        }
    }

    /// Drives the window until it is closed: dispatch what has arrived,
    /// draw, present, flush.
    pub fn run(&mut self, event_queue: &mut EventQueue<Self>) -> Result<()> {
        if self.stage != Stage::GraphicsReady {
            return Err(Error::NotReady);
        }

        while self.window.running {
            self.dispatch_ready(event_queue)?;
            if !self.window.running {
                break;
            }

            self.present()?;

            if let Some(connection) = &self.connection {
                if retry_later(connection.flush())?.is_none() {
                    tracing::trace!("send buffer full, flushing with the next frame");
                }
            }
        }
        tracing::info!("event loop finished");
        Ok(())
    }

    /// Dispatches queued events and whatever can be read from the socket
    /// without blocking.
    fn dispatch_ready(&mut self, event_queue: &mut EventQueue<Self>) -> Result<()> {
        event_queue.dispatch_pending(self)?;

        if let Some(guard) = event_queue.prepare_read() {
            retry_later(guard.read())?;
        }

        event_queue.dispatch_pending(self)?;
        Ok(())
    }

    fn present(&self) -> Result<()> {
        let (Some(renderer), Some(display), Some(surface)) =
            (&self.renderer, self.egl_display, self.egl_surface)
        else {
            return Err(Error::NotReady);
        };

        renderer.render();
        self.egl
            .swap_buffers(display, surface)
            .map_err(Error::EglSwapBuffers)?;
        tracing::trace!("eglSwapBuffers called");
        Ok(())
    }

    /// Releases everything acquired, newest first. Safe to call repeatedly.
    ///
    /// Returns what was actually released this time.
    pub fn deinit(&mut self) -> Vec<Resource> {
        let egl = &self.egl;
        let display = self.egl_display;

        let mut teardown = Teardown::default();
        teardown
            .release(Resource::Renderer, &mut self.renderer, Renderer::destroy)
            .release_with(Resource::EglSurface, &mut self.egl_surface, |surface| {
                display.map_or(Ok(()), |display| egl.destroy_surface(display, surface))
            })
            .release_with(Resource::EglContext, &mut self.egl_context, |context| {
                display.map_or(Ok(()), |display| {
                    egl.make_current(display, None, None, None)?;
                    egl.destroy_context(display, context)
                })
            })
            .release_with(Resource::EglDisplay, &mut self.egl_display, |display| {
                egl.terminate(display)
            })
            .release(Resource::EglWindow, &mut self.egl_window, drop)
            .release(Resource::Decoration, &mut self.decoration, |decoration| {
                decoration.destroy()
            })
            .release(Resource::Toplevel, &mut self.toplevel, |toplevel| {
                toplevel.destroy()
            })
            .release(Resource::XdgSurface, &mut self.xdg_surface, |surface| {
                surface.destroy()
            })
            .release(
                Resource::DecorationManager,
                &mut self.decoration_manager,
                |manager| manager.destroy(),
            )
            .release(Resource::WmBase, &mut self.wm_base, |wm_base| {
                wm_base.destroy()
            })
            .release(Resource::Keyboard, &mut self.wl_keyboard, |keyboard| {
                if keyboard.version() >= 3 {
                    keyboard.release();
                }
            })
            .release(Resource::Seat, &mut self.seat, |seat| {
                if seat.version() >= 5 {
                    seat.release();
                }
            })
            .release(Resource::Surface, &mut self.wl_surface, |surface| {
                surface.destroy()
            })
            .release(Resource::Compositor, &mut self.compositor, drop)
            .release(Resource::Registry, &mut self.registry, drop)
            .release_with(Resource::Connection, &mut self.connection, |connection| {
                connection.flush()
            });

        if !teardown.released().is_empty() {
            self.window.running = false;
            self.stage = Stage::Disconnected;
        }
        teardown.released().to_vec()
    }
}

impl<G: Gl> Drop for Session<G> {
    fn drop(&mut self) {
        self.deinit();
    }
}
