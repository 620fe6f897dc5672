//! Core data types flowing through the pipeline.
//!
//! Ownership follows the stage order: a [`RawImage`] is produced by
//! acquisition and consumed by preprocessing; an [`InputTensor`] is
//! immutable once constructed and read by inference; an [`OutputVector`]
//! is validated by the decision stage, which produces the final
//! [`DiagnosisResult`].

use std::fmt;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use super::PipelineError;
use crate::config::CLASS_COUNT;

// ═══════════════════════════════════════════════════════════
// ScanClass — fixed 3-class ordering
// ═══════════════════════════════════════════════════════════

/// Diagnosis classes in the model's fixed output order.
///
/// The index mapping (0 = normal, 1 = pneumonia, 2 = cancer_or_other) is a
/// contract with the trained model and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanClass {
    Normal,
    Pneumonia,
    CancerOrOther,
}

impl ScanClass {
    /// All classes, in model output order.
    pub const ALL: [ScanClass; CLASS_COUNT] = [
        ScanClass::Normal,
        ScanClass::Pneumonia,
        ScanClass::CancerOrOther,
    ];

    /// Position of this class in the model output vector.
    pub fn index(self) -> usize {
        match self {
            ScanClass::Normal => 0,
            ScanClass::Pneumonia => 1,
            ScanClass::CancerOrOther => 2,
        }
    }

    /// Class at the given output position, if in range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Stable wire name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            ScanClass::Normal => "normal",
            ScanClass::Pneumonia => "pneumonia",
            ScanClass::CancerOrOther => "cancer_or_other",
        }
    }
}

impl fmt::Display for ScanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════
// RawImage — decoded bitmap
// ═══════════════════════════════════════════════════════════

/// Decoded RGB bitmap prior to any resizing. Alpha is dropped at decode.
#[derive(Debug, Clone)]
pub struct RawImage {
    image: RgbImage,
}

impl RawImage {
    /// Wrap an already-decoded RGB buffer.
    /// A zero-dimension bitmap is corrupt input, not an image.
    pub fn new(image: RgbImage) -> Result<Self, PipelineError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PipelineError::UnsupportedInput(
                "Decoded image has zero dimensions".into(),
            ));
        }
        Ok(Self { image })
    }

    /// Convert any decoded image, discarding the alpha channel if present.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, PipelineError> {
        Self::new(image.to_rgb8())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }
}

// ═══════════════════════════════════════════════════════════
// InputTensor — fixed-shape normalized buffer
// ═══════════════════════════════════════════════════════════

/// Flat `f32` buffer in `[0,1]` with a declared NHWC shape.
///
/// Invariant (enforced at construction): buffer length equals the product
/// of the shape. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
    shape: [usize; 4],
}

impl InputTensor {
    pub fn new(data: Vec<f32>, shape: [usize; 4]) -> Result<Self, PipelineError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(PipelineError::Preprocessing(format!(
                "Tensor length {} does not match shape {:?} (expected {})",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self { data, shape })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

// ═══════════════════════════════════════════════════════════
// OutputVector — raw class probabilities
// ═══════════════════════════════════════════════════════════

/// Flat probability buffer as returned by the engine.
///
/// Not validated here — the decision stage rejects wrong lengths and
/// degenerate contents, so engine bugs surface as errors, not diagnoses.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputVector(Vec<f32>);

impl OutputVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for OutputVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

// ═══════════════════════════════════════════════════════════
// ClassProbabilities / DiagnosisResult — the output contract
// ═══════════════════════════════════════════════════════════

/// Per-class probabilities, always all present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub normal: f32,
    pub pneumonia: f32,
    pub cancer_or_other: f32,
}

impl ClassProbabilities {
    pub fn get(&self, class: ScanClass) -> f32 {
        match class {
            ScanClass::Normal => self.normal,
            ScanClass::Pneumonia => self.pneumonia,
            ScanClass::CancerOrOther => self.cancer_or_other,
        }
    }
}

/// Final pipeline output, serialized camelCase for consuming surfaces.
///
/// All fields are always present: an invalid result carries a null
/// diagnosis, zero confidence, zeroed probabilities and a non-empty error
/// message. Confidence is a 0–1 fraction throughout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub diagnosis: Option<ScanClass>,
    pub confidence: f32,
    pub probabilities: ClassProbabilities,
    pub is_valid: bool,
    pub error: Option<String>,
}

impl DiagnosisResult {
    pub fn valid(diagnosis: ScanClass, confidence: f32, probabilities: ClassProbabilities) -> Self {
        Self {
            diagnosis: Some(diagnosis),
            confidence,
            probabilities,
            is_valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            diagnosis: None,
            confidence: 0.0,
            probabilities: ClassProbabilities::default(),
            is_valid: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TENSOR_LEN;

    #[test]
    fn class_index_round_trips() {
        for class in ScanClass::ALL {
            assert_eq!(ScanClass::from_index(class.index()), Some(class));
        }
        assert_eq!(ScanClass::from_index(3), None);
    }

    #[test]
    fn class_wire_names_are_stable() {
        assert_eq!(
            serde_json::to_value(ScanClass::CancerOrOther).unwrap(),
            serde_json::json!("cancer_or_other")
        );
        assert_eq!(ScanClass::Normal.to_string(), "normal");
    }

    #[test]
    fn raw_image_rejects_zero_dimensions() {
        let empty = RgbImage::new(0, 0);
        let result = RawImage::new(empty);
        assert!(matches!(
            result,
            Err(PipelineError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn raw_image_drops_alpha() {
        let rgba = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 128]));
        let raw = RawImage::from_dynamic(DynamicImage::ImageRgba8(rgba)).unwrap();
        assert_eq!(raw.as_rgb().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn tensor_rejects_length_mismatch() {
        let result = InputTensor::new(vec![0.0; 10], [1, 224, 224, 3]);
        assert!(matches!(result, Err(PipelineError::Preprocessing(_))));
    }

    #[test]
    fn tensor_accepts_exact_length() {
        let tensor = InputTensor::new(vec![0.5; TENSOR_LEN], [1, 224, 224, 3]).unwrap();
        assert_eq!(tensor.len(), TENSOR_LEN);
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
    }

    #[test]
    fn valid_result_serializes_camel_case() {
        let result = DiagnosisResult::valid(
            ScanClass::Pneumonia,
            0.75,
            ClassProbabilities {
                normal: 0.125,
                pneumonia: 0.75,
                cancer_or_other: 0.125,
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["diagnosis"], "pneumonia");
        assert_eq!(json["isValid"], true);
        assert_eq!(json["confidence"], 0.75);
        assert_eq!(json["probabilities"]["cancer_or_other"], 0.125);
        assert!(json["error"].is_null());
    }

    #[test]
    fn invalid_result_has_all_fields_present() {
        let result = DiagnosisResult::invalid("engine exploded");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["diagnosis"].is_null());
        assert_eq!(json["confidence"], 0.0);
        assert_eq!(json["isValid"], false);
        assert_eq!(json["error"], "engine exploded");
        assert!(json.get("probabilities").is_some());
    }
}
