//! Preprocessing: [`RawImage`] -> normalized [`InputTensor`].
//!
//! The classifier was trained on images stretched to exactly 224x224 —
//! aspect ratio is NOT preserved and no padding is applied. Letterboxing
//! here would feed the model a distribution it never saw in training.
//!
//! Numeric policy: `f32` end to end. Each channel byte is divided by 255.0,
//! giving values in `[0,1]`, packed row-major as NHWC `[1,224,224,3]`.

use image::imageops::FilterType;

use super::types::{InputTensor, RawImage};
use super::PipelineError;
use crate::config::{TARGET_SIZE, TENSOR_LEN, TENSOR_SHAPE};

/// Stretch-resize, extract R,G,B and normalize into a fixed-shape tensor.
///
/// Deterministic: the same bitmap always produces a bit-identical buffer.
pub fn preprocess(raw: &RawImage) -> Result<InputTensor, PipelineError> {
    if raw.width() == 0 || raw.height() == 0 {
        return Err(PipelineError::Preprocessing("Zero-size image".into()));
    }

    let resized = if raw.width() == TARGET_SIZE && raw.height() == TARGET_SIZE {
        raw.as_rgb().clone()
    } else {
        image::imageops::resize(raw.as_rgb(), TARGET_SIZE, TARGET_SIZE, FilterType::Triangle)
    };

    let mut data = Vec::with_capacity(TENSOR_LEN);
    for pixel in resized.pixels() {
        data.push(pixel.0[0] as f32 / 255.0);
        data.push(pixel.0[1] as f32 / 255.0);
        data.push(pixel.0[2] as f32 / 255.0);
    }

    InputTensor::new(data, TENSOR_SHAPE)
}
