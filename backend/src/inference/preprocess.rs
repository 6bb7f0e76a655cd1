use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use ndarray::Array4;
use shared::{InputSpec, TensorLayout};

use super::model::InferenceError;

/// Spatial resolution the classifier was trained on.
pub const INPUT_SIZE: u32 = 50;

pub fn load_image(path: &Path) -> Result<DynamicImage, InferenceError> {
    ImageReader::open(path)
        .map_err(InferenceError::Unreadable)?
        .with_guessed_format()
        .map_err(InferenceError::Unreadable)?
        .decode()
        .map_err(InferenceError::Decode)
}

pub fn batch_shape(layout: TensorLayout) -> [usize; 4] {
    let size = INPUT_SIZE as usize;
    match layout {
        TensorLayout::Nhwc => [1, size, size, 3],
        TensorLayout::Nchw => [1, 3, size, size],
    }
}

/// Resizes to INPUT_SIZE x INPUT_SIZE (nearest neighbour, aspect ratio not kept)
/// and lays the RGB channels out as a batch of one.
pub fn image_to_batch(image: &DynamicImage, input: &InputSpec) -> Array4<f32> {
    let rgb = image
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Nearest)
        .to_rgb8();
    let [n, d1, d2, d3] = batch_shape(input.layout);

    Array4::from_shape_fn((n, d1, d2, d3), |(_, a, b, c)| {
        let (y, x, channel) = match input.layout {
            TensorLayout::Nhwc => (a, b, c),
            TensorLayout::Nchw => (b, c, a),
        };
        rgb.get_pixel(x as u32, y as u32)[channel] as f32 * input.pixel_scale
    })
}
