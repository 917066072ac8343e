//! Keyboard bindings, driven by raw evdev key codes and the compositor's
//! keymap for modifier state.

use std::{collections::HashSet, fmt, fs::File, os::fd::OwnedFd};

use memmap2::MmapOptions;
use xkbcommon::xkb;

use crate::error::{Error, Result};

/// Evdev key codes, as delivered by `wl_keyboard.key`.
pub mod keys {
    pub const ESC: u32 = 1;
    pub const ENTER: u32 = 28;
    pub const F: u32 = 33;
    pub const F11: u32 = 87;
    pub const KP_ENTER: u32 = 96;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    ToggleFullscreen,
    Quit,
}

/// Reads an `xkb_v1` keymap handed over by the compositor.
///
/// The fd may be sealed read-only, so it is mapped private.
pub fn read_keymap(fd: OwnedFd, size: u32) -> Result<String> {
    let file = File::from(fd);
    let map = unsafe {
        MmapOptions::new()
            .len(size as usize)
            .map_copy_read_only(&file)
    }
    .map_err(Error::KeymapMap)?;

    let text = String::from_utf8_lossy(&map);
    Ok(text.trim_end_matches('\0').to_owned())
}

#[derive(Default)]
pub struct KeyboardState {
    held: HashSet<u32>,
    xkb: Option<xkb::State>,
    alt: bool,
}

impl fmt::Debug for KeyboardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyboardState")
            .field("held", &self.held)
            .field("keymap", &self.xkb.is_some())
            .field("alt", &self.alt)
            .finish()
    }
}

impl KeyboardState {
    /// Compiles `text` and tracks modifiers through it from now on.
    pub fn set_keymap(&mut self, text: String) -> Result<()> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_string(
            &context,
            text,
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or(Error::KeymapCompile)?;

        self.xkb = Some(xkb::State::new(&keymap));
        self.alt = false;
        Ok(())
    }

    /// Handles a press, returning the bound action on the press edge only.
    pub fn press(&mut self, key: u32) -> Option<KeyAction> {
        if !self.held.insert(key) {
            return None;
        }

        match key {
            keys::ESC => Some(KeyAction::Quit),
            keys::F | keys::F11 => Some(KeyAction::ToggleFullscreen),
            keys::ENTER | keys::KP_ENTER if self.alt => Some(KeyAction::ToggleFullscreen),
            _ => None,
        }
    }

    pub fn release(&mut self, key: u32) {
        self.held.remove(&key);
    }

    /// Applies a `wl_keyboard.modifiers` event. Without a keymap the mask
    /// cannot be interpreted and Alt reads as released.
    pub fn set_modifiers(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) {
        self.alt = match &mut self.xkb {
            Some(state) => {
                state.update_mask(depressed, latched, locked, 0, 0, group);
                state.mod_name_is_active(xkb::MOD_NAME_ALT, xkb::STATE_MODS_EFFECTIVE)
            }
            None => {
                tracing::debug!("modifiers before any keymap, ignored");
                false
            }
        };
    }

    pub fn alt_held(&self) -> bool {
        self.alt
    }

    /// Takes focus with `held` already down; those keys act only after
    /// being released and pressed again.
    pub fn enter(&mut self, held: impl IntoIterator<Item = u32>) {
        self.held.clear();
        self.held.extend(held);
    }

    /// Forgets held keys and modifiers, used when keyboard focus leaves the
    /// surface. The keymap is kept.
    pub fn clear(&mut self) {
        self.held.clear();
        self.alt = false;
    }
}
