// THEORY:
// The color heuristic is the cheap, model-free half of the fire decision. It asks a
// single question of a frame: "are enough pixels flame-colored?"
//
// A pixel is flame-colored when its 8-bit HSV encoding falls inside any configured
// band. The default bands cover low red, the wrapped-around high red, and
// yellow/orange, each with a saturation and value floor of 100 so that washed-out or
// dark pixels never count. Bands are unioned per pixel: a pixel that sits in two
// bands still counts once.
//
// The verdict is a strict comparison: the frame is flame-colored only when the match
// count exceeds the threshold.

use crate::core_modules::frame::Frame;
use crate::core_modules::pixel::pixel::Hsv;
use serde::{Deserialize, Serialize};

/// An inclusive HSV box in the 8-bit scale (H 0..=179, S 0..=255, V 0..=255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvBand {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvBand {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower[0]..=self.upper[0]).contains(&hsv.hue)
            && (self.lower[1]..=self.upper[1]).contains(&hsv.saturation)
            && (self.lower[2]..=self.upper[2]).contains(&hsv.value)
    }
}

pub const LOW_RED: HsvBand = HsvBand::new([0, 100, 100], [10, 255, 255]);
pub const HIGH_RED: HsvBand = HsvBand::new([160, 100, 100], [179, 255, 255]);
pub const YELLOW: HsvBand = HsvBand::new([18, 100, 100], [30, 255, 255]);

pub const DEFAULT_PIXEL_THRESHOLD: usize = 500;

/// Policy for the flame-color test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorHeuristicConfig {
    pub bands: Vec<HsvBand>,
    /// The frame is flame-colored when strictly more than this many pixels match.
    pub pixel_threshold: usize,
}

impl Default for ColorHeuristicConfig {
    fn default() -> Self {
        Self {
            bands: vec![LOW_RED, HIGH_RED, YELLOW],
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
        }
    }
}

/// Result of one color pass over a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorReport {
    pub matching_pixels: usize,
    pub verdict: bool,
}

#[derive(Debug, Clone)]
pub struct ColorHeuristic {
    config: ColorHeuristicConfig,
}

impl ColorHeuristic {
    pub fn new(config: ColorHeuristicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ColorHeuristicConfig {
        &self.config
    }

    pub fn is_flame_colored(&self, hsv: Hsv) -> bool {
        self.config.bands.iter().any(|band| band.contains(hsv))
    }

    /// Number of pixels inside the union of all bands.
    pub fn count_matching(&self, frame: &Frame) -> usize {
        frame
            .pixels()
            .filter(|pixel| self.is_flame_colored(pixel.to_hsv()))
            .count()
    }

    pub fn evaluate(&self, frame: &Frame) -> ColorReport {
        let matching_pixels = self.count_matching(frame);
        ColorReport {
            matching_pixels,
            verdict: matching_pixels > self.config.pixel_threshold,
        }
    }
}

impl Default for ColorHeuristic {
    fn default() -> Self {
        Self::new(ColorHeuristicConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;
    use image::RgbImage;

    const FLAME: Pixel = Pixel { red: 200, green: 69, blue: 43 };

    /// A 100x100 black frame with the first `count` pixels painted `FLAME`.
    fn frame_with_flame_pixels(count: u32) -> Frame {
        let mut image = RgbImage::new(100, 100);
        for index in 0..count {
            image.put_pixel(index % 100, index / 100, FLAME.into());
        }
        Frame::new(image)
    }

    #[test]
    fn black_frame_is_not_flame_colored() {
        let report = ColorHeuristic::default().evaluate(&Frame::filled(100, 100, Pixel::default()));
        assert_eq!(report, ColorReport { matching_pixels: 0, verdict: false });
    }

    #[test]
    fn more_than_threshold_matches_is_flame_colored() {
        let report = ColorHeuristic::default().evaluate(&frame_with_flame_pixels(501));
        assert_eq!(report.matching_pixels, 501);
        assert!(report.verdict);
    }

    #[test]
    fn exactly_threshold_matches_is_not_flame_colored() {
        let report = ColorHeuristic::default().evaluate(&frame_with_flame_pixels(500));
        assert_eq!(report.matching_pixels, 500);
        assert!(!report.verdict);
    }

    #[test]
    fn pixels_in_overlapping_bands_count_once() {
        let config = ColorHeuristicConfig {
            bands: vec![LOW_RED, LOW_RED, HsvBand::new([0, 0, 0], [179, 255, 255])],
            pixel_threshold: 0,
        };
        let report = ColorHeuristic::new(config).evaluate(&frame_with_flame_pixels(10));
        assert_eq!(report.matching_pixels, 100 * 100);
    }

    #[test]
    fn default_bands_cover_red_yellow_and_wrapped_red() {
        let heuristic = ColorHeuristic::default();
        assert!(heuristic.is_flame_colored(Hsv { hue: 0, saturation: 100, value: 100 }));
        assert!(heuristic.is_flame_colored(Hsv { hue: 179, saturation: 255, value: 255 }));
        assert!(heuristic.is_flame_colored(Hsv { hue: 25, saturation: 180, value: 220 }));
        // Orange gap between the low-red and yellow bands.
        assert!(!heuristic.is_flame_colored(Hsv { hue: 14, saturation: 200, value: 200 }));
        // Too pale / too dark.
        assert!(!heuristic.is_flame_colored(Hsv { hue: 5, saturation: 99, value: 200 }));
        assert!(!heuristic.is_flame_colored(Hsv { hue: 5, saturation: 200, value: 99 }));
    }

    #[test]
    fn sky_blue_never_matches() {
        let frame = Frame::filled(64, 64, Pixel::new(90, 160, 230));
        assert_eq!(ColorHeuristic::default().count_matching(&frame), 0);
    }
}
