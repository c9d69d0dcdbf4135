// Drawing and saving helpers for annotated frames. Everything here works on an owned
// `RgbImage` copy; frames handed to the engine are never touched.

pub mod image_helper {
    use image::{ImageEncoder, Rgb, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use std::path::Path;

    pub const ALERT_RED: Rgb<u8> = Rgb([255, 0, 0]);
    pub const CLEAR_GREEN: Rgb<u8> = Rgb([0, 255, 0]);

    /// Writes an RGB image as PNG.
    pub fn save(path: &Path, image: &RgbImage) -> Result<(), image::error::ImageError> {
        let output = std::io::BufWriter::new(std::fs::File::create(path)?);
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )?;

        Ok(())
    }

    /// Divides the image into `columns x rows` cells with lines of `thickness` pixels.
    /// Only interior lines are drawn; the outer border is left alone.
    pub fn draw_grid(image: &mut RgbImage, columns: u32, rows: u32, color: Rgb<u8>, thickness: u32) {
        let (width, height) = image.dimensions();
        if columns == 0 || rows == 0 || thickness == 0 || width == 0 || height == 0 {
            return;
        }
        let cell_width = width / columns;
        let cell_height = height / rows;

        for column in 1..columns {
            let line = Rect::at((column * cell_width) as i32, 0).of_size(thickness, height);
            draw_filled_rect_mut(image, line, color);
        }
        for row in 1..rows {
            let line = Rect::at(0, (row * cell_height) as i32).of_size(width, thickness);
            draw_filled_rect_mut(image, line, color);
        }
    }

    /// Paints a horizontal bar along the top edge. A zero length draws nothing.
    pub fn draw_bar(image: &mut RgbImage, length: u32, height: u32, color: Rgb<u8>) {
        if length == 0 || height == 0 {
            return;
        }
        draw_filled_rect_mut(image, Rect::at(0, 0).of_size(length, height), color);
    }
}

#[cfg(test)]
mod tests {
    use super::image_helper::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn save_and_reload_png() {
        let dir = tempfile::tempdir().expect("Error creating temp dir.");
        let path = dir.path().join("white_file.png");
        let image = RgbImage::from_pixel(50, 40, Rgb([255, 255, 255]));

        save(&path, &image).expect("Error Saving File.");

        let reloaded = image::open(&path).expect("Error Loading File.").to_rgb8();
        assert_eq!(reloaded.dimensions(), (50, 40));
        assert_eq!(reloaded.get_pixel(10, 10), &Rgb([255, 255, 255]));
    }

    #[test]
    fn grid_draws_interior_lines_only() {
        let mut image = RgbImage::new(90, 90);
        draw_grid(&mut image, 3, 3, ALERT_RED, 1);

        assert_eq!(image.get_pixel(30, 5), &ALERT_RED);
        assert_eq!(image.get_pixel(60, 80), &ALERT_RED);
        assert_eq!(image.get_pixel(5, 30), &ALERT_RED);
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(15, 15), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(31, 15), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(89, 89), &Rgb([0, 0, 0]));
    }

    #[test]
    fn bar_clips_to_bounds_and_skips_zero_length() {
        let mut image = RgbImage::new(10, 10);
        draw_bar(&mut image, 100, 3, CLEAR_GREEN);
        assert_eq!(image.get_pixel(9, 2), &CLEAR_GREEN);
        assert_eq!(image.get_pixel(9, 3), &Rgb([0, 0, 0]));

        let mut untouched = RgbImage::new(10, 10);
        draw_bar(&mut untouched, 0, 3, CLEAR_GREEN);
        assert!(untouched.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
