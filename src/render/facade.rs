// SPDX-License-Identifier: MPL-2.0
//! One-call frame presentation over the display context and YUV renderer.
//!
//! [`FramePresenter`] owns both pipeline stages by value and drives a whole
//! frame through them: plane upload, conversion draw, present. It carries no
//! lock of its own; the owning view serializes access, so the stages never
//! observe each other mid-update.

use crate::error::{Error, Result};
use crate::media::{ChromaLayout, FramePlanes};
use crate::port::SharedWindow;
use crate::render::context::DisplayContext;
use crate::render::shader::{YuvRenderer, PLANE_CHROMA_A, PLANE_CHROMA_B, PLANE_LUMA};

/// Presents decoded frames of one chroma layout to one window.
///
/// # Lifecycle
///
/// Built fully initialized by [`FramePresenter::init`]; a layout change
/// means dropping the presenter and building a new one. [`Drop`] releases
/// the GPU resources, so an explicit [`close`](Self::close) is only needed
/// to release them early.
pub struct FramePresenter {
    context: DisplayContext,
    renderer: YuvRenderer,
    layout: ChromaLayout,
}

impl FramePresenter {
    /// Brings up the surface, device and conversion pipeline for `window`.
    ///
    /// # Errors
    ///
    /// Fails without side effects when `window` is `None`, and with the
    /// context torn down again when the GPU cannot be initialized.
    pub fn init(window: Option<SharedWindow>, layout: ChromaLayout) -> Result<Self> {
        let Some(window) = window else {
            return Err(Error::Graphics(
                "cannot present without an attached window".to_string(),
            ));
        };

        let mut context = DisplayContext::new();
        context.init(window)?;
        let (device, format) = match (context.device_queue(), context.surface_format()) {
            (Some((device, _)), Some(format)) => (device, format),
            _ => {
                context.close();
                return Err(Error::Graphics(
                    "display context initialized without a device".to_string(),
                ));
            }
        };

        let mut renderer = YuvRenderer::new();
        renderer.init(&device, format, layout);

        Ok(Self {
            context,
            renderer,
            layout,
        })
    }

    /// The chroma layout the conversion pipeline was built for.
    #[must_use]
    pub fn layout(&self) -> ChromaLayout {
        self.layout
    }

    /// Uploads `frame`'s planes, converts and presents.
    ///
    /// A temporarily unavailable surface skips the frame and reports
    /// success; playback continues with the next one.
    ///
    /// # Errors
    ///
    /// Fails when `frame` carries a different chroma layout than the one the
    /// pipeline was built for.
    pub fn draw(&mut self, frame: &FramePlanes) -> Result<()> {
        if frame.layout != self.layout {
            return Err(Error::Graphics(format!(
                "frame layout {:?} does not match pipeline layout {:?}",
                frame.layout, self.layout
            )));
        }
        let Some((device, queue)) = self.context.device_queue() else {
            return Ok(());
        };

        self.renderer.upload_plane(
            &device,
            &queue,
            PLANE_LUMA,
            frame.width,
            frame.height,
            &frame.planes[0],
            false,
        );
        let chroma_width = frame.chroma_width();
        let chroma_height = frame.chroma_height();
        if self.layout.has_interleaved_chroma() {
            self.renderer.upload_plane(
                &device,
                &queue,
                PLANE_CHROMA_A,
                chroma_width,
                chroma_height,
                &frame.planes[1],
                true,
            );
        } else {
            self.renderer.upload_plane(
                &device,
                &queue,
                PLANE_CHROMA_A,
                chroma_width,
                chroma_height,
                &frame.planes[1],
                false,
            );
            self.renderer.upload_plane(
                &device,
                &queue,
                PLANE_CHROMA_B,
                chroma_width,
                chroma_height,
                &frame.planes[2],
                false,
            );
        }

        let Some(target) = self.context.current_view() else {
            return Ok(());
        };
        self.renderer.draw(&device, &queue, &target);
        self.context.draw();
        Ok(())
    }

    /// Releases the pipeline and the display context; idempotent.
    pub fn close(&mut self) {
        self.renderer.close();
        self.context.close();
    }
}

impl Drop for FramePresenter {
    fn drop(&mut self) {
        self.close();
    }
}
