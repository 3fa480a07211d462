use egui::{Context, TextureOptions};

use crate::display::ProjectedFrame;
use crate::ui::ProjectorApp;

impl ProjectorApp {
    pub fn upload_pattern_texture(&mut self, ctx: &Context, frame: ProjectedFrame) {
        let image = frame.image;
        if image.width() == 0 || image.height() == 0 {
            return;
        }

        let size = [image.width() as usize, image.height() as usize];
        let pixels = image.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());

        // Patterns are pre-scaled to the surface, so sample 1:1
        let reusable = self
            .pattern_texture
            .as_ref()
            .map_or(false, |texture| texture.size() == size);

        if reusable {
            if let Some(texture) = self.pattern_texture.as_mut() {
                texture.set(color_image, TextureOptions::NEAREST);
            }
        } else {
            let texture = ctx.load_texture("pattern", color_image, TextureOptions::NEAREST);
            self.pattern_texture = Some(texture);
        }
    }
}
