use crossbeam::channel::TryRecvError;
use eframe::egui;

use crate::display::{DisplayEvent, SurfaceLink};

/// Full-screen window that shows whatever pattern the session hands it.
pub struct ProjectorApp {
    pub link: SurfaceLink,
    pub pattern_texture: Option<egui::TextureHandle>,
    /// Painted during the previous pass; acknowledged once the next pass begins.
    pub pending_ack: Option<usize>,
    pub surface_announced: bool,
    /// Surface size seen on the previous pass while waiting for it to settle.
    pub last_surface_size: Option<(u32, u32)>,
    pub fullscreen: bool,
    pub closing: bool,
}

/// Returns the size to announce once the window geometry has settled.
///
/// The size must be non-empty and unchanged since the previous pass. When
/// fullscreen was requested, a viewport that still reports windowed mode is
/// not settled yet; an unknown fullscreen state falls back to stability alone.
pub fn settled_surface_size(
    previous: Option<(u32, u32)>,
    current: (u32, u32),
    fullscreen_requested: bool,
    fullscreen_reported: Option<bool>,
) -> Option<(u32, u32)> {
    if current.0 == 0 || current.1 == 0 {
        return None;
    }
    if fullscreen_requested && fullscreen_reported == Some(false) {
        return None;
    }
    (previous == Some(current)).then_some(current)
}

impl ProjectorApp {
    pub fn new(link: SurfaceLink, fullscreen: bool) -> Self {
        Self {
            link,
            pattern_texture: None,
            pending_ack: None,
            surface_announced: false,
            last_surface_size: None,
            fullscreen,
            closing: false,
        }
    }

    fn announce_surface(&mut self, ctx: &egui::Context) {
        let rect = ctx.screen_rect();
        let pixels_per_point = ctx.pixels_per_point();
        let current = (
            (rect.width().max(0.0) * pixels_per_point).round() as u32,
            (rect.height().max(0.0) * pixels_per_point).round() as u32,
        );
        let reported = ctx.input(|i| i.viewport().fullscreen);

        let previous = self.last_surface_size.replace(current);
        let Some(size) = settled_surface_size(previous, current, self.fullscreen, reported) else {
            log::debug!("Waiting for display surface to settle ({}x{} px)", current.0, current.1);
            ctx.request_repaint();
            return;
        };

        log::info!("Display surface {}x{} px", size.0, size.1);
        let _ = self.link.events.send(DisplayEvent::Ready {
            size,
            ctx: ctx.clone(),
        });
        self.surface_announced = true;
    }

    fn receive_frames(&mut self, ctx: &egui::Context) {
        loop {
            match self.link.frames.try_recv() {
                Ok(frame) => {
                    let index = frame.index;
                    self.upload_pattern_texture(ctx, frame);
                    self.pending_ack = Some(index);
                    ctx.request_repaint();
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closing {
                        log::info!("Capture session ended, closing display");
                        self.closing = true;
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                    break;
                }
            }
        }
    }

    fn render(&self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let screen_rect = ui.max_rect();
                ui.painter().rect_filled(screen_rect, 0.0, egui::Color32::BLACK);

                if let Some(texture) = &self.pattern_texture {
                    ui.painter().image(
                        texture.id(),
                        screen_rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
            });
    }
}

impl eframe::App for ProjectorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ESC aborts the session by closing the surface
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            log::warn!("Display closed by operator");
            self.closing = true;
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        if !self.surface_announced {
            self.announce_surface(ctx);
        }

        if let Some(index) = self.pending_ack.take() {
            let _ = self.link.events.send(DisplayEvent::Presented(index));
        }

        self.receive_frames(ctx);
        self.render(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_pass_is_never_settled() {
        assert_eq!(settled_surface_size(None, (1920, 1080), false, None), None);
    }

    #[test]
    fn test_settles_after_one_stable_pass() {
        assert_eq!(
            settled_surface_size(Some((1920, 1080)), (1920, 1080), false, None),
            Some((1920, 1080))
        );
    }

    #[test]
    fn test_resize_restarts_the_wait() {
        // Window manager applied fullscreen between the two passes
        assert_eq!(settled_surface_size(Some((800, 600)), (1920, 1080), true, None), None);
        assert_eq!(
            settled_surface_size(Some((1920, 1080)), (1920, 1080), true, Some(true)),
            Some((1920, 1080))
        );
    }

    #[test]
    fn test_waits_while_fullscreen_is_pending() {
        assert_eq!(settled_surface_size(Some((800, 600)), (800, 600), true, Some(false)), None);
        assert_eq!(
            settled_surface_size(Some((800, 600)), (800, 600), false, Some(false)),
            Some((800, 600))
        );
    }

    #[test]
    fn test_empty_surface_is_never_settled() {
        assert_eq!(settled_surface_size(Some((0, 0)), (0, 0), false, None), None);
        assert_eq!(settled_surface_size(Some((1920, 0)), (1920, 0), false, None), None);
    }
}
