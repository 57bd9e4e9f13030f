// SPDX-License-Identifier: MPL-2.0
//! Windowed implementation of the [`VideoView`] port.
//!
//! # Thread Safety
//!
//! One mutex guards the attached window and the presenter built on it.
//! Every GPU call happens under that lock, which is what makes the
//! lock-free [`FramePresenter`] sound: there is exactly one path into the
//! pipeline. The lock is never held while calling out to other playback
//! collaborators.
//!
//! # Lifecycle
//!
//! The presenter is built lazily on the first [`render`](VideoView::render)
//! after a window is attached, and rebuilt in place when a frame arrives
//! with a different chroma layout than the pipeline was built for.

use std::sync::Mutex;

use crate::media::FramePlanes;
use crate::port::{SharedWindow, VideoView};
use crate::render::facade::FramePresenter;

#[derive(Default)]
struct ViewState {
    window: Option<SharedWindow>,
    presenter: Option<FramePresenter>,
}

/// Presents frames into an externally owned window.
#[derive(Default)]
pub struct WindowVideoView {
    state: Mutex<ViewState>,
}

impl WindowVideoView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoView for WindowVideoView {
    fn set_render(&self, window: SharedWindow) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        // Tear the old pipeline down before it can touch the new surface.
        state.presenter = None;
        state.window = Some(window);
    }

    fn render(&self, frame: &FramePlanes) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let state = &mut *state;
        let Some(window) = state.window.as_ref() else {
            return;
        };

        let stale = state
            .presenter
            .as_ref()
            .is_none_or(|presenter| presenter.layout() != frame.layout);
        if stale {
            state.presenter = None;
            match FramePresenter::init(Some(SharedWindow::clone(window)), frame.layout) {
                Ok(presenter) => state.presenter = Some(presenter),
                Err(err) => {
                    log::error!("Failed to build presentation pipeline: {err}");
                    return;
                }
            }
        }

        if let Some(presenter) = state.presenter.as_mut() {
            if let Err(err) = presenter.draw(frame) {
                log::warn!("Dropped frame: {err}");
            }
        }
    }

    fn close(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.presenter = None;
        state.window = None;
    }
}
