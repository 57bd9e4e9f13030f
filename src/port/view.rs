// SPDX-License-Identifier: MPL-2.0
//! Video-view port definition.
//!
//! A [`VideoView`] binds decoded frames to a host window. The host hands the
//! window over as a [`SharedWindow`]; [`crate::render::WindowVideoView`] is
//! the bundled implementation, built on the wgpu presentation pipeline.

use crate::media::FramePlanes;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

/// What a host window must provide for surface creation.
///
/// The handle traits give the graphics backend its surface target; the size
/// sizes the swapchain. Window types from `winit` and comparable toolkits
/// satisfy the handle bounds already, so hosts usually only add
/// `surface_size`.
pub trait RenderWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {
    /// Current drawable size in physical pixels.
    fn surface_size(&self) -> (u32, u32);
}

/// A host window shared between the host and the presentation pipeline.
pub type SharedWindow = Arc<dyn RenderWindow>;

/// Port for presenting decoded frames onto a host window.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` and take `&self`: the host's video
/// decode chain renders from its own thread while the session rebinds the
/// window or closes the view. Implementations guard their state with
/// internal locking.
///
/// # Caller Obligation
///
/// Graphics work is not serialized across threads here. Hosts deliver
/// [`render`](VideoView::render) calls from one thread at a time; rebinding
/// through [`set_render`](VideoView::set_render) may happen from another.
pub trait VideoView: Send + Sync {
    /// Rebinds the view to a window. Presentation resources for any prior
    /// window are torn down first; new ones build lazily on the next render.
    fn set_render(&self, window: SharedWindow);

    /// Presents one decoded frame. A view with no bound window ignores the
    /// frame; presentation failures are logged, never propagated, so a lost
    /// surface cannot take down the decode chain.
    fn render(&self, frame: &FramePlanes);

    /// Releases the window binding and all presentation resources; idempotent.
    fn close(&self);
}
