/// Crate-level constants
pub const CRATE_NAME: &str = "pulmoscan";
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Square edge length the classifier was trained on.
pub const TARGET_SIZE: u32 = 224;

/// Color channels fed to the model (R, G, B — alpha is dropped at decode).
pub const CHANNELS: usize = 3;

/// Number of diagnosis classes the model emits.
pub const CLASS_COUNT: usize = 3;

/// Flat length of one input tensor.
pub const TENSOR_LEN: usize = (TARGET_SIZE as usize) * (TARGET_SIZE as usize) * CHANNELS;

/// Declared input shape: batch of one, height, width, channels.
pub const TENSOR_SHAPE: [usize; 4] = [1, TARGET_SIZE as usize, TARGET_SIZE as usize, CHANNELS];

/// Maximum scan payload size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial uploads.
pub const MAX_SCAN_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Minimum valid scan payload size in bytes (smallest valid PNG is ~67 bytes).
pub const MIN_SCAN_BYTES: usize = 67;

/// Bound on remote scan downloads.
pub const IMAGE_FETCH_TIMEOUT_SECS: u64 = 15;

/// Bound on the one-time model download.
pub const MODEL_FETCH_TIMEOUT_SECS: u64 = 60;

/// How often the diagnosis worker polls for pending scans.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "pulmoscan=info"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_len_matches_shape_product() {
        assert_eq!(TENSOR_LEN, TENSOR_SHAPE.iter().product::<usize>());
    }

    #[test]
    fn tensor_shape_is_batch_of_one() {
        assert_eq!(TENSOR_SHAPE, [1, 224, 224, 3]);
    }

    #[test]
    fn byte_bounds_are_ordered() {
        assert!(MIN_SCAN_BYTES < MAX_SCAN_BYTES);
    }

    #[test]
    fn crate_version_matches_cargo() {
        assert_eq!(CRATE_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
