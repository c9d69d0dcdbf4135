// THEORY:
// The `frame` module holds the two data containers that flow through the decision
// engine: the raw `Frame` handed over by a video source, and the `NormalizedTensor`
// derived from it for the classifier.
//
// A `Frame` is immutable once produced. The engine only ever reads it; renderers that
// want to draw take their own copy. A `NormalizedTensor` has no life of its own: it is
// built for one classifier call and dropped right after.

use crate::core_modules::pixel::pixel::Pixel;
use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Side length of the square classifier input.
pub const TENSOR_SIDE: u32 = 224;
/// Color channels in the classifier input.
pub const TENSOR_CHANNELS: usize = 3;
/// Full input shape: batch, height, width, channels.
pub const TENSOR_SHAPE: [usize; 4] = [1, TENSOR_SIDE as usize, TENSOR_SIDE as usize, TENSOR_CHANNELS];

/// An immutable 3-channel raster image, stored as RGB.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Builds a frame from a packed RGB byte buffer.
    /// Returns `None` if the buffer length does not match `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    /// Builds a frame from a packed BGR byte buffer, as delivered by most capture APIs.
    pub fn from_bgr(width: u32, height: u32, mut data: Vec<u8>) -> Option<Self> {
        for bgr in data.chunks_exact_mut(TENSOR_CHANNELS) {
            bgr.swap(0, 2);
        }
        Self::from_rgb(width, height, data)
    }

    /// A frame filled with a single color.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
        Self::new(RgbImage::from_pixel(width, height, pixel.into()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.image.width() as usize * self.image.height() as usize
    }

    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.image.pixels().map(Pixel::from)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// Channel order the classifier expects in its input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    Rgb,
    /// Models trained on frames straight out of an OpenCV capture see BGR.
    #[default]
    Bgr,
}

/// A (1, 224, 224, 3) float tensor with every element in [0, 1].
#[derive(Debug, Clone)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    /// Resizes the frame to 224x224 (bilinear), scales each byte by 1/255 and adds
    /// a leading batch dimension of one.
    pub fn from_frame(frame: &Frame, order: ChannelOrder) -> Self {
        let resized = imageops::resize(frame.image(), TENSOR_SIDE, TENSOR_SIDE, FilterType::Triangle);

        let mut data = Array4::<f32>::zeros(TENSOR_SHAPE);
        for (x, y, rgb) in resized.enumerate_pixels() {
            let [red, green, blue] = rgb.0;
            let ordered = match order {
                ChannelOrder::Rgb => [red, green, blue],
                ChannelOrder::Bgr => [blue, green, red],
            };
            for (channel, byte) in ordered.into_iter().enumerate() {
                data[[0, y as usize, x as usize, channel]] = byte as f32 / 255.0;
            }
        }

        Self { data }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Row-major (batch, height, width, channel) contents. Borrowed when the array is
    /// already in standard layout, copied out in logical order otherwise.
    pub fn contiguous(&self) -> Cow<'_, [f32]> {
        match self.data.as_slice() {
            Some(values) => Cow::Borrowed(values),
            None => Cow::Owned(self.data.iter().copied().collect()),
        }
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data.into_raw_vec_and_offset().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_rejects_short_buffers() {
        assert!(Frame::from_rgb(4, 4, vec![0; 10]).is_none());
        assert!(Frame::from_rgb(4, 4, vec![0; 48]).is_some());
    }

    #[test]
    fn from_bgr_swaps_red_and_blue() {
        let frame = Frame::from_bgr(1, 1, vec![10, 20, 30]).unwrap();
        assert_eq!(frame.pixels().next(), Some(Pixel::new(30, 20, 10)));
    }

    #[test]
    fn tensor_has_batch_shape_and_unit_range() {
        let frame = Frame::filled(640, 480, Pixel::new(255, 128, 0));
        let tensor = NormalizedTensor::from_frame(&frame, ChannelOrder::Rgb);

        assert_eq!(tensor.shape(), &TENSOR_SHAPE);
        assert_eq!(tensor.contiguous().len(), 224 * 224 * 3);
        assert!(tensor.contiguous().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn tensor_respects_channel_order() {
        let frame = Frame::filled(32, 32, Pixel::new(255, 0, 0));

        let rgb = NormalizedTensor::from_frame(&frame, ChannelOrder::Rgb);
        let bgr = NormalizedTensor::from_frame(&frame, ChannelOrder::Bgr);

        assert!(rgb.view()[[0, 10, 10, 0]] > 0.99);
        assert!(rgb.view()[[0, 10, 10, 2]] < 0.01);
        assert!(bgr.view()[[0, 10, 10, 0]] < 0.01);
        assert!(bgr.view()[[0, 10, 10, 2]] > 0.99);
    }

    #[test]
    fn contiguous_reads_non_standard_layouts_in_logical_order() {
        use ndarray::ShapeBuilder;

        let values: Vec<f32> = (0..12).map(|v| v as f32 / 12.0).collect();
        let data = Array4::from_shape_vec((1, 2, 2, 3).f(), values).unwrap();
        let expected: Vec<f32> = data.iter().copied().collect();
        let tensor = NormalizedTensor { data };

        let contiguous = tensor.contiguous();
        assert!(matches!(contiguous, Cow::Owned(_)));
        assert_eq!(contiguous.len(), 12);
        assert_eq!(contiguous.as_ref(), expected.as_slice());
        assert_eq!(contiguous[1], 4.0 / 12.0);
    }
}
