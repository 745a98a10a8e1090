//! Image preprocessing.
//!
//! Training samples go through the fixed augmentation pipeline: random
//! rotation within ±30°, grayscale conversion, resize to 256×256, then
//! normalization to [0, 1]. Prediction inputs skip the rotation.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use rand::prelude::*;
use std::path::Path;

use crate::error::Error;
use crate::math::Tensor;
use crate::network::INPUT_SIDE;

/// Maximum magnitude of the random training rotation, in degrees.
pub const MAX_ROTATION_DEG: f64 = 30.0;

/// Decodes an image file and applies the full training transform, with a
/// rotation angle drawn fresh per call.
pub fn load_training_image(path: &Path) -> Result<Tensor, Error> {
    let img = image::open(path)
        .map_err(|e| Error::Dataset(format!("cannot decode '{}': {}", path.display(), e)))?;
    let angle = rand::thread_rng().gen_range(-MAX_ROTATION_DEG..=MAX_ROTATION_DEG);
    let gray = rotate_grayscale(&img.to_luma8(), angle);
    Ok(grayscale_to_tensor(&resize(&gray)))
}

/// Prediction-path transform: grayscale, resize, normalize. No rotation.
pub fn image_to_input(img: &DynamicImage) -> Tensor {
    grayscale_to_tensor(&resize(&img.to_luma8()))
}

fn resize(gray: &GrayImage) -> GrayImage {
    image::imageops::resize(gray, INPUT_SIDE as u32, INPUT_SIDE as u32, FilterType::Lanczos3)
}

fn grayscale_to_tensor(gray: &GrayImage) -> Tensor {
    let data = gray.pixels().map(|p| p.0[0] as f64 / 255.0).collect();
    Tensor::from_data(1, INPUT_SIDE, INPUT_SIDE, data)
}

/// Rotates about the image center by `angle_deg`, sampling the source with
/// nearest-neighbor lookup. Pixels mapped from outside the source are black.
fn rotate_grayscale(gray: &GrayImage, angle_deg: f64) -> GrayImage {
    let (w, h) = gray.dimensions();
    let cx = (w as f64 - 1.0) / 2.0;
    let cy = (h as f64 - 1.0) / 2.0;
    let theta = angle_deg.to_radians();
    let (sin, cos) = theta.sin_cos();

    GrayImage::from_fn(w, h, |x, y| {
        // Inverse mapping: rotate the destination coordinate by -theta.
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = cos * dx + sin * dy + cx;
        let sy = -sin * dx + cos * dy + cy;
        let sx = sx.round();
        let sy = sy.round();
        if sx < 0.0 || sy < 0.0 || sx >= w as f64 || sy >= h as f64 {
            image::Luma([0u8])
        } else {
            *gray.get_pixel(sx as u32, sy as u32)
        }
    })
}
