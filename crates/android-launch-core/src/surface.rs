//! Render-target lifecycle.
//!
//! The pipeline renders from its own threads through whatever window handle
//! it was last given, so the order of handle updates and window releases is
//! the whole contract here:
//!
//! - attach: install the new handle, then release the previous window.
//! - detach: clear the handle to `0`, then release the window.
//!
//! Releasing a window means dropping its [`NativeWindowRef`].

use tracing::debug;

use crate::pipeline::Pipeline;

/// An acquired native window. Dropping it releases the window.
pub trait NativeWindowRef: Send + 'static {
    /// Address handed to the pipeline.
    fn raw_handle(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    NoWindow,
    HasWindow,
}

/// At most one window per bridge.
pub struct WindowSlot<W> {
    current: Option<W>,
}

impl<W> Default for WindowSlot<W> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<W: NativeWindowRef> WindowSlot<W> {
    pub fn state(&self) -> WindowState {
        if self.current.is_some() {
            WindowState::HasWindow
        } else {
            WindowState::NoWindow
        }
    }

    /// Installs `window` on `target`, replacing any current window.
    pub fn attach<P>(&mut self, target: &mut P, window: W)
    where
        P: Pipeline<Window = W>,
    {
        let handle = window.raw_handle();
        let previous = self.current.take();
        if let Some(previous) = &previous {
            debug!(
                "Replacing native window {:#x} with {handle:#x}",
                previous.raw_handle()
            );
        } else {
            debug!("Received native window {handle:#x}");
        }

        target.set_window_handle(handle);
        self.current = Some(window);
        drop(previous);
    }

    /// Clears the handle on `target`, then releases the window.
    pub fn detach<P>(&mut self, target: &mut P)
    where
        P: Pipeline<Window = W>,
    {
        let Some(window) = self.current.take() else {
            return;
        };
        debug!("Releasing native window {:#x}", window.raw_handle());
        target.set_window_handle(0);
        drop(window);
    }
}
