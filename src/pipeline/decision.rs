//! Diagnosis decision: [`OutputVector`] -> [`DiagnosisResult`].
//!
//! Pure arg-max over exactly three class probabilities. No I/O, no engine
//! access. A vector the engine should never have produced — wrong length,
//! non-finite values, nothing above zero — is rejected as an error. In
//! particular, the all-zero vector that upstream error paths used to emit
//! must never arg-max into a "normal" diagnosis.
//!
//! Tie-break: the lowest index wins, i.e. `normal` is preferred over
//! `pneumonia`, which is preferred over `cancer_or_other`.

use tracing::warn;

use super::types::{ClassProbabilities, DiagnosisResult, OutputVector, ScanClass};
use super::PipelineError;
use crate::config::CLASS_COUNT;

/// Validate the vector and pick the winning class.
///
/// Confidence is the winning probability as a 0–1 fraction. Minor
/// numerical drift (values slightly negative or above one, sum away from
/// exactly 1.0) is tolerated; structural defects are not.
pub fn evaluate(
    output: &OutputVector,
) -> Result<(ScanClass, f32, ClassProbabilities), PipelineError> {
    let values = output.as_slice();
    if values.len() != CLASS_COUNT {
        return Err(PipelineError::InvalidOutputShape {
            expected: CLASS_COUNT,
            actual: values.len(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::DegenerateOutput(
            "Non-finite class probability".into(),
        ));
    }

    let mut winner = 0;
    for (index, value) in values.iter().enumerate() {
        if *value > values[winner] {
            winner = index;
        }
    }

    if values[winner] <= 0.0 {
        return Err(PipelineError::DegenerateOutput(
            "No class probability above zero".into(),
        ));
    }

    let probabilities = ClassProbabilities {
        normal: values[0],
        pneumonia: values[1],
        cancer_or_other: values[2],
    };
    Ok((ScanClass::ALL[winner], values[winner], probabilities))
}

/// Fold [`evaluate`] into the result shape consumed by calling surfaces.
pub fn decide(output: &OutputVector) -> DiagnosisResult {
    match evaluate(output) {
        Ok((diagnosis, confidence, probabilities)) => {
            DiagnosisResult::valid(diagnosis, confidence, probabilities)
        }
        Err(e) => {
            warn!(error = %e, "Diagnosis rejected");
            DiagnosisResult::invalid(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_normal_wins() {
        let result = decide(&OutputVector::new(vec![0.9, 0.05, 0.05]));
        assert!(result.is_valid);
        assert_eq!(result.diagnosis, Some(ScanClass::Normal));
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn clear_pneumonia_wins() {
        let result = decide(&OutputVector::new(vec![0.1, 0.8, 0.1]));
        assert!(result.is_valid);
        assert_eq!(result.diagnosis, Some(ScanClass::Pneumonia));
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.probabilities.pneumonia, 0.8);
    }

    #[test]
    fn cancer_class_wins_when_highest() {
        let result = decide(&OutputVector::new(vec![0.2, 0.3, 0.5]));
        assert_eq!(result.diagnosis, Some(ScanClass::CancerOrOther));
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn short_vector_is_rejected_not_defaulted() {
        let result = decide(&OutputVector::new(vec![0.5, 0.5]));
        assert!(!result.is_valid);
        assert_eq!(result.diagnosis, None);
        assert!(result.error.as_deref().unwrap().contains("2"));
    }

    #[test]
    fn long_vector_is_rejected() {
        let result = decide(&OutputVector::new(vec![0.25; 4]));
        assert!(!result.is_valid);
        assert_eq!(result.diagnosis, None);
    }

    #[test]
    fn all_zero_vector_is_an_error_not_normal() {
        // Upstream error paths used to emit [0,0,0]; arg-max would report
        // a confident-looking "normal" for a failed run.
        let result = decide(&OutputVector::new(vec![0.0, 0.0, 0.0]));
        assert!(!result.is_valid);
        assert_eq!(result.diagnosis, None);
        assert!(matches!(
            evaluate(&OutputVector::new(vec![0.0, 0.0, 0.0])),
            Err(PipelineError::DegenerateOutput(_))
        ));
    }

    #[test]
    fn nan_is_rejected() {
        let result = decide(&OutputVector::new(vec![f32::NAN, 0.5, 0.5]));
        assert!(!result.is_valid);
    }

    #[test]
    fn exact_tie_prefers_lowest_index() {
        let result = decide(&OutputVector::new(vec![0.4, 0.4, 0.2]));
        assert_eq!(result.diagnosis, Some(ScanClass::Normal));

        let result = decide(&OutputVector::new(vec![0.2, 0.4, 0.4]));
        assert_eq!(result.diagnosis, Some(ScanClass::Pneumonia));

        let result = decide(&OutputVector::new(vec![0.25, 0.25, 0.25]));
        assert_eq!(result.diagnosis, Some(ScanClass::Normal));
    }

    #[test]
    fn tolerates_numeric_drift() {
        // Engines do not guarantee a strict simplex.
        let result = decide(&OutputVector::new(vec![-0.01, 0.62, 0.41]));
        assert!(result.is_valid);
        assert_eq!(result.diagnosis, Some(ScanClass::Pneumonia));
        assert_eq!(result.confidence, 0.62);
    }

    #[test]
    fn confidence_is_a_fraction_not_a_percentage() {
        let result = decide(&OutputVector::new(vec![1.0, 0.0, 0.0]));
        assert_eq!(result.confidence, 1.0);
    }
}
