use wayland_client::{
    Connection, Dispatch, Proxy, QueueHandle, WEnum, delegate_noop,
    globals::GlobalListContents,
    protocol::{wl_compositor, wl_keyboard, wl_registry, wl_seat, wl_surface},
};
use wayland_protocols::xdg::{
    decoration::zv1::client::{zxdg_decoration_manager_v1, zxdg_toplevel_decoration_v1},
    shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base},
};

use crate::{gpu::Gl, input::read_keymap, state::Session};

impl<G: Gl + 'static> Dispatch<wl_registry::WlRegistry, GlobalListContents> for Session<G> {
    fn event(
        _: &mut Self,
        _: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        // Globals appearing or vanishing after startup are not used.
        if let wl_registry::Event::Global {
            name, interface, ..
        } = event
        {
            tracing::trace!("late global {name}: {interface}");
        }
    }
}

impl<G: Gl + 'static> Dispatch<xdg_wm_base::XdgWmBase, ()> for Session<G> {
    #[tracing::instrument(skip(xdg_wm_base), ret, level = "trace")]
    fn event(
        _: &mut Self,
        xdg_wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            xdg_wm_base.pong(serial);
        }
    }
}

impl<G: Gl + 'static> Dispatch<xdg_surface::XdgSurface, ()> for Session<G> {
    #[tracing::instrument(skip(xdg_surface), ret, level = "trace")]
    fn event(
        _: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
        }
    }
}

impl<G: Gl + 'static> Dispatch<xdg_toplevel::XdgToplevel, ()> for Session<G> {
    #[tracing::instrument(skip(state), ret, level = "trace")]
    fn event(
        state: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                if let Some((width, height)) = state.window.configure(width, height) {
                    state.resize_drawable(width, height);
                }
            }
            xdg_toplevel::Event::Close => {
                tracing::info!("Compositor asked the window to close");
                state.window.close();
            }
            _ => {}
        }
    }
}

impl<G: Gl + 'static> Dispatch<zxdg_toplevel_decoration_v1::ZxdgToplevelDecorationV1, ()>
    for Session<G>
{
    fn event(
        _: &mut Self,
        _: &zxdg_toplevel_decoration_v1::ZxdgToplevelDecorationV1,
        event: zxdg_toplevel_decoration_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let zxdg_toplevel_decoration_v1::Event::Configure { mode } = event {
            tracing::debug!("decoration mode {mode:?}");
        }
    }
}

impl<G: Gl + 'static> Dispatch<wl_seat::WlSeat, ()> for Session<G> {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(capabilities),
        } = event
        else {
            return;
        };

        let has_keyboard = capabilities.contains(wl_seat::Capability::Keyboard);
        match (has_keyboard, state.wl_keyboard.take()) {
            (true, None) => {
                tracing::debug!("keyboard available");
                state.wl_keyboard = Some(seat.get_keyboard(qh, ()));
            }
            (true, keyboard) => state.wl_keyboard = keyboard,
            (false, Some(keyboard)) => {
                tracing::debug!("keyboard removed");
                if keyboard.version() >= 3 {
                    keyboard.release();
                }
                state.keyboard.clear();
            }
            (false, None) => {}
        }
    }
}

impl<G: Gl + 'static> Dispatch<wl_keyboard::WlKeyboard, ()> for Session<G> {
    fn event(
        state: &mut Self,
        _: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            // Bindings use raw key codes, the keymap only resolves modifiers.
            wl_keyboard::Event::Keymap {
                format: WEnum::Value(wl_keyboard::KeymapFormat::XkbV1),
                fd,
                size,
            } => {
                let loaded = read_keymap(fd, size).and_then(|text| state.keyboard.set_keymap(text));
                if let Err(e) = loaded {
                    tracing::warn!("keymap unusable, Alt bindings disabled: {e}");
                }
            }
            wl_keyboard::Event::Keymap { format, .. } => {
                tracing::debug!("keymap format {format:?} not supported");
            }
            wl_keyboard::Event::Enter { keys, .. } => {
                state.keyboard.enter(
                    keys.chunks_exact(4)
                        .map(|key| u32::from_ne_bytes([key[0], key[1], key[2], key[3]])),
                );
            }
            wl_keyboard::Event::Leave { .. } => state.keyboard.clear(),
            wl_keyboard::Event::Key {
                key,
                state: WEnum::Value(key_state),
                ..
            } => match key_state {
                wl_keyboard::KeyState::Pressed => {
                    if let Some(action) = state.keyboard.press(key) {
                        state.apply_key_action(action);
                    }
                }
                wl_keyboard::KeyState::Released => state.keyboard.release(key),
                _ => {}
            },
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => {
                state
                    .keyboard
                    .set_modifiers(mods_depressed, mods_latched, mods_locked, group);
            }
            wl_keyboard::Event::RepeatInfo { rate, delay } => {
                tracing::trace!("key repeat {rate}/s after {delay}ms");
            }
            _ => {}
        }
    }
}

impl<G: Gl + 'static> Dispatch<wl_surface::WlSurface, ()> for Session<G> {
    fn event(
        _state: &mut Self,
        _proxy: &wl_surface::WlSurface,
        _event: <wl_surface::WlSurface as wayland_client::Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
    }
}

delegate_noop!(@<G: Gl + 'static> Session<G>: wl_compositor::WlCompositor);
delegate_noop!(
    @<G: Gl + 'static> Session<G>: zxdg_decoration_manager_v1::ZxdgDecorationManagerV1
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gpu::tests::{Call, RecordingGl},
        input::{
            keys,
            tests::{TEST_KEYMAP, XKB_LEFT_ALT, depressed_mask},
        },
        renderer::{Renderer, ShaderSource},
        state::SessionConfig,
        teardown::Resource,
    };
    use std::{io::Write, os::fd::OwnedFd, os::unix::net::UnixStream};
    use wayland_client::EventQueue;

    type TestSession = Session<RecordingGl>;

    /// A session wired to a connection nobody serves. Proxies are inert, so
    /// requests the handlers issue go nowhere.
    struct Harness {
        session: TestSession,
        gl: RecordingGl,
        connection: Connection,
        qh: QueueHandle<TestSession>,
        _queue: EventQueue<TestSession>,
        _peer: UnixStream,
    }

    impl Harness {
        fn new() -> Self {
            let (client, peer) = UnixStream::pair().expect("socket pair");
            let connection = Connection::from_socket(client).expect("connection");
            let queue = connection.new_event_queue();
            Self {
                session: Session::unconnected(SessionConfig::default()),
                gl: RecordingGl::default(),
                qh: queue.handle(),
                connection,
                _queue: queue,
                _peer: peer,
            }
        }

        fn with_renderer(mut self) -> Self {
            let renderer =
                Renderer::new(self.gl.clone(), &ShaderSource::Embedded).expect("renderer");
            self.session.renderer = Some(renderer);
            self.gl.take_calls();
            self
        }

        fn inert<I: Proxy>(&self) -> I {
            I::inert(self.connection.backend().downgrade())
        }

        fn send<I>(&mut self, proxy: &I, event: I::Event)
        where
            I: Proxy,
            TestSession: Dispatch<I, ()>,
        {
            <TestSession as Dispatch<I, ()>>::event(
                &mut self.session,
                proxy,
                event,
                &(),
                &self.connection,
                &self.qh,
            );
        }

        fn key(&mut self, keyboard: &wl_keyboard::WlKeyboard, key: u32, pressed: bool) {
            let state = if pressed {
                wl_keyboard::KeyState::Pressed
            } else {
                wl_keyboard::KeyState::Released
            };
            self.send(
                keyboard,
                wl_keyboard::Event::Key {
                    serial: 1,
                    time: 0,
                    key,
                    state: WEnum::Value(state),
                },
            );
        }
    }

    fn configure(width: i32, height: i32) -> xdg_toplevel::Event {
        xdg_toplevel::Event::Configure {
            width,
            height,
            states: Vec::new(),
        }
    }

    fn capabilities(capabilities: wl_seat::Capability) -> wl_seat::Event {
        wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(capabilities),
        }
    }

    #[test]
    fn toplevel_configure_resizes_window_and_viewport() {
        let mut harness = Harness::new().with_renderer();
        let toplevel = harness.inert::<xdg_toplevel::XdgToplevel>();

        harness.send(&toplevel, configure(1024, 768));

        assert_eq!(
            (harness.session.window.width, harness.session.window.height),
            (1024, 768)
        );
        assert_eq!(harness.gl.take_calls(), vec![Call::Viewport(1024, 768)]);
    }

    #[test]
    fn same_size_configure_still_sets_the_viewport() {
        let mut harness = Harness::new().with_renderer();
        let toplevel = harness.inert::<xdg_toplevel::XdgToplevel>();

        harness.send(&toplevel, configure(640, 480));

        assert_eq!(harness.gl.take_calls(), vec![Call::Viewport(640, 480)]);
    }

    #[test]
    fn zero_size_configure_keeps_the_current_size() {
        let mut harness = Harness::new().with_renderer();
        let toplevel = harness.inert::<xdg_toplevel::XdgToplevel>();

        harness.send(&toplevel, configure(0, 0));

        assert_eq!(
            (harness.session.window.width, harness.session.window.height),
            (640, 480)
        );
        assert!(harness.gl.take_calls().is_empty());
    }

    #[test]
    fn close_stops_the_session() {
        let mut harness = Harness::new();
        harness.session.window.running = true;
        let toplevel = harness.inert::<xdg_toplevel::XdgToplevel>();

        harness.send(&toplevel, xdg_toplevel::Event::Close);

        assert!(!harness.session.window.running);
    }

    #[test]
    fn seat_keyboard_follows_the_capability() {
        let mut harness = Harness::new();
        let seat = harness.inert::<wl_seat::WlSeat>();

        harness.send(&seat, capabilities(wl_seat::Capability::Pointer));
        assert!(harness.session.wl_keyboard.is_none());

        harness.send(&seat, capabilities(wl_seat::Capability::Keyboard));
        assert!(harness.session.wl_keyboard.is_some());

        harness.send(&seat, capabilities(wl_seat::Capability::Pointer));
        assert!(harness.session.wl_keyboard.is_none());
    }

    #[test]
    fn teardown_without_a_seat_releases_no_keyboard() {
        let mut harness = Harness::new().with_renderer();

        let released = harness.session.deinit();

        assert_eq!(released, vec![Resource::Renderer]);
        assert!(harness.gl.calls().contains(&Call::DeleteBuffer(4)));
    }

    #[test]
    fn teardown_releases_a_keyboard_the_seat_provided() {
        let mut harness = Harness::new();
        let seat = harness.inert::<wl_seat::WlSeat>();
        harness.send(&seat, capabilities(wl_seat::Capability::Keyboard));

        let released = harness.session.deinit();

        assert_eq!(released, vec![Resource::Keyboard]);
    }

    #[test]
    fn keys_held_on_enter_are_decoded_and_need_a_fresh_press() {
        let mut harness = Harness::new();
        harness.session.window.running = true;
        let keyboard = harness.inert::<wl_keyboard::WlKeyboard>();
        let surface = harness.inert::<wl_surface::WlSurface>();
        let held = [keys::ESC, keys::F]
            .iter()
            .flat_map(|key| key.to_ne_bytes())
            .collect();

        harness.send(
            &keyboard,
            wl_keyboard::Event::Enter {
                serial: 1,
                surface,
                keys: held,
            },
        );
        harness.key(&keyboard, keys::ESC, true);
        harness.key(&keyboard, keys::F, true);

        assert!(harness.session.window.running);
        assert!(!harness.session.window.fullscreen);

        harness.key(&keyboard, keys::ESC, false);
        harness.key(&keyboard, keys::ESC, true);

        assert!(!harness.session.window.running);
    }

    #[test]
    fn repeated_presses_toggle_fullscreen_once() {
        let mut harness = Harness::new();
        let keyboard = harness.inert::<wl_keyboard::WlKeyboard>();

        harness.key(&keyboard, keys::F11, true);
        harness.key(&keyboard, keys::F11, true);
        assert!(harness.session.window.fullscreen);

        harness.key(&keyboard, keys::F11, false);
        harness.key(&keyboard, keys::F11, true);
        assert!(!harness.session.window.fullscreen);
    }

    #[test]
    fn alt_enter_uses_the_compositor_keymap() {
        let mut harness = Harness::new();
        let keyboard = harness.inert::<wl_keyboard::WlKeyboard>();
        let mut file = tempfile::tempfile().expect("temp file");
        file.write_all(TEST_KEYMAP.as_bytes()).expect("write");
        file.write_all(b"\0").expect("write");

        harness.send(
            &keyboard,
            wl_keyboard::Event::Keymap {
                format: WEnum::Value(wl_keyboard::KeymapFormat::XkbV1),
                fd: OwnedFd::from(file),
                size: TEST_KEYMAP.len() as u32 + 1,
            },
        );
        harness.key(&keyboard, keys::ENTER, true);
        harness.key(&keyboard, keys::ENTER, false);
        assert!(!harness.session.window.fullscreen);

        harness.send(
            &keyboard,
            wl_keyboard::Event::Modifiers {
                serial: 2,
                mods_depressed: depressed_mask(&[XKB_LEFT_ALT]),
                mods_latched: 0,
                mods_locked: 0,
                group: 0,
            },
        );
        harness.key(&keyboard, keys::ENTER, true);

        assert!(harness.session.window.fullscreen);
    }

    #[test]
    fn leave_forgets_held_keys_and_alt() {
        let mut harness = Harness::new();
        let keyboard = harness.inert::<wl_keyboard::WlKeyboard>();
        let surface = harness.inert::<wl_surface::WlSurface>();
        harness.key(&keyboard, keys::F, true);

        harness.send(&keyboard, wl_keyboard::Event::Leave { serial: 3, surface });
        harness.key(&keyboard, keys::F, true);

        assert!(!harness.session.window.fullscreen, "toggled twice");
        assert!(!harness.session.keyboard.alt_held());
    }
}
