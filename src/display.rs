use async_trait::async_trait;
use crossbeam::channel::{self, Receiver, Sender};
use image::imageops::FilterType;
use image::RgbaImage;
use log::{debug, info};
use std::path::Path;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::CaptureError;
use crate::patterns::Pattern;

/// Something that can put a pattern on the projection surface.
#[async_trait]
pub trait PatternDisplay: Send {
    /// Surface size in physical pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Shows `pattern` stretched over `surface_size`; returns once it is on screen.
    async fn present(&mut self, pattern: &Pattern, surface_size: (u32, u32)) -> Result<(), CaptureError>;
}

/// Loads a pattern image and stretches it to exactly `size`, ignoring aspect ratio.
pub fn load_scaled(path: &Path, size: (u32, u32)) -> Result<RgbaImage, CaptureError> {
    let img = image::open(path).map_err(|e| CaptureError::AssetLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let rgba = img.to_rgba8();
    if rgba.dimensions() == size {
        return Ok(rgba);
    }

    // Nearest keeps stripe edges binary.
    Ok(image::imageops::resize(&rgba, size.0, size.1, FilterType::Nearest))
}

/// A scaled pattern on its way to the UI thread.
pub struct ProjectedFrame {
    pub index: usize,
    pub image: RgbaImage,
}

/// Messages from the UI thread back to the session.
pub enum DisplayEvent {
    /// The surface is up; carries its pixel size and a handle to wake the UI.
    Ready { size: (u32, u32), ctx: egui::Context },
    /// The frame with this index has been painted and swapped in.
    Presented(usize),
}

/// UI-side ends of the display channels.
pub struct SurfaceLink {
    pub frames: Receiver<ProjectedFrame>,
    pub events: UnboundedSender<DisplayEvent>,
}

/// Session-side ends of the display channels, before the surface is up.
pub struct ProjectorLink {
    frames: Sender<ProjectedFrame>,
    events: UnboundedReceiver<DisplayEvent>,
}

pub fn link() -> (ProjectorLink, SurfaceLink) {
    let (frames_tx, frames_rx) = channel::bounded(1);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    (
        ProjectorLink {
            frames: frames_tx,
            events: events_rx,
        },
        SurfaceLink {
            frames: frames_rx,
            events: events_tx,
        },
    )
}

/// Full-screen projector surface driven by the egui window in `ui`.
pub struct ProjectorDisplay {
    frames: Option<Sender<ProjectedFrame>>,
    events: UnboundedReceiver<DisplayEvent>,
    size: (u32, u32),
    ctx: egui::Context,
}

impl ProjectorDisplay {
    /// Waits until the UI reports its surface.
    pub async fn connect(link: ProjectorLink) -> Result<Self, CaptureError> {
        let ProjectorLink { frames, mut events } = link;

        loop {
            match events.recv().await {
                Some(DisplayEvent::Ready { size, ctx }) => {
                    info!("Projection surface ready: {}x{}", size.0, size.1);
                    return Ok(Self {
                        frames: Some(frames),
                        events,
                        size,
                        ctx,
                    });
                }
                Some(DisplayEvent::Presented(index)) => {
                    debug!("Ignoring presentation ack {} before surface ready", index);
                }
                None => return Err(CaptureError::DisplayClosed),
            }
        }
    }
}

#[async_trait]
impl PatternDisplay for ProjectorDisplay {
    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    async fn present(&mut self, pattern: &Pattern, surface_size: (u32, u32)) -> Result<(), CaptureError> {
        let path = pattern.path.clone();
        let image = tokio::task::spawn_blocking(move || load_scaled(&path, surface_size))
            .await
            .map_err(|e| CaptureError::AssetLoad {
                path: pattern.path.clone(),
                reason: e.to_string(),
            })??;

        let frames = self.frames.as_ref().ok_or(CaptureError::DisplayClosed)?;
        frames
            .send(ProjectedFrame {
                index: pattern.index,
                image,
            })
            .map_err(|_| CaptureError::DisplayClosed)?;
        self.ctx.request_repaint();

        loop {
            match self.events.recv().await {
                Some(DisplayEvent::Presented(index)) if index == pattern.index => {
                    debug!("Pattern {} presented", index);
                    return Ok(());
                }
                Some(DisplayEvent::Presented(index)) => {
                    debug!("Stale presentation ack {} while waiting for {}", index, pattern.index);
                }
                Some(DisplayEvent::Ready { .. }) => {}
                None => return Err(CaptureError::DisplayClosed),
            }
        }
    }
}

impl Drop for ProjectorDisplay {
    fn drop(&mut self) {
        // Disconnect first so the woken UI sees the closed channel.
        self.frames.take();
        self.ctx.request_repaint();
    }
}
