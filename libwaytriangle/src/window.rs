/// Client-side view of the toplevel window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    pub width: i32,
    pub height: i32,
    pub running: bool,
    pub fullscreen: bool,
}

impl WindowState {
    pub fn new(width: i32, height: i32, fullscreen: bool) -> Self {
        Self {
            width,
            height,
            running: false,
            fullscreen,
        }
    }

    /// Applies a toplevel configure, returning the size the drawable must
    /// take. Non-positive sizes leave the compositor's choice to us and are
    /// ignored.
    pub fn configure(&mut self, width: i32, height: i32) -> Option<(i32, i32)> {
        if width <= 0 || height <= 0 {
            return None;
        }

        self.width = width;
        self.height = height;
        Some((width, height))
    }

    pub fn close(&mut self) {
        self.running = false;
    }

    /// Flips the fullscreen flag, returning the new value.
    pub fn toggle_fullscreen(&mut self) -> bool {
        self.fullscreen = !self.fullscreen;
        self.fullscreen
    }
}
