use std::fmt::Display;

/// Everything a session may acquire, in the order it must be released.
///
/// Later entries may be referenced by earlier ones, never the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Resource {
    Renderer,
    EglSurface,
    EglContext,
    EglDisplay,
    EglWindow,
    Decoration,
    Toplevel,
    XdgSurface,
    DecorationManager,
    WmBase,
    Keyboard,
    Seat,
    Surface,
    Compositor,
    Registry,
    Connection,
}

pub const RELEASE_ORDER: [Resource; 16] = [
    Resource::Renderer,
    Resource::EglSurface,
    Resource::EglContext,
    Resource::EglDisplay,
    Resource::EglWindow,
    Resource::Decoration,
    Resource::Toplevel,
    Resource::XdgSurface,
    Resource::DecorationManager,
    Resource::WmBase,
    Resource::Keyboard,
    Resource::Seat,
    Resource::Surface,
    Resource::Compositor,
    Resource::Registry,
    Resource::Connection,
];

/// Runs release steps over `Option` slots, skipping empty ones.
///
/// A slot is emptied before its release step runs, so running the same
/// teardown again does nothing.
#[derive(Debug, Default)]
pub struct Teardown {
    released: Vec<Resource>,
    last: Option<Resource>,
}

impl Teardown {
    pub fn release<T>(
        &mut self,
        resource: Resource,
        slot: &mut Option<T>,
        release: impl FnOnce(T),
    ) -> &mut Self {
        self.release_with(resource, slot, |value| {
            release(value);
            Ok::<_, std::convert::Infallible>(())
        })
    }

    /// Like [`Teardown::release`] for steps that can fail; a failure is
    /// logged and teardown carries on.
    pub fn release_with<T, E: Display>(
        &mut self,
        resource: Resource,
        slot: &mut Option<T>,
        release: impl FnOnce(T) -> Result<(), E>,
    ) -> &mut Self {
        debug_assert!(
            self.last.is_none_or(|last| last < resource),
            "{resource:?} released out of order"
        );
        self.last = Some(resource);

        let Some(value) = slot.take() else {
            tracing::trace!("{resource:?} was never acquired");
            return self;
        };
        if let Err(e) = release(value) {
            tracing::warn!("failed to release {resource:?}: {e}");
        } else {
            tracing::debug!("{resource:?} released");
        }
        self.released.push(resource);
        self
    }

    pub fn released(&self) -> &[Resource] {
        &self.released
    }
}
