//! Image acquisition: local file or remote URL -> decoded [`RawImage`].
//!
//! Validation happens before decode: media type first (cheap), then byte
//! bounds, then the decode itself. PDF is rejected here — scanned PDF
//! documents go through a separate document path, never this pipeline.

use std::path::Path;

use tracing::debug;

use super::types::RawImage;
use super::PipelineError;
use crate::config::{IMAGE_FETCH_TIMEOUT_SECS, MAX_SCAN_BYTES, MIN_SCAN_BYTES};

/// Media types the pipeline accepts. `image/jpg` is a non-standard alias
/// some upload surfaces still send.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

/// Reject anything the decoder cannot treat as a bitmap.
pub fn validate_media_type(media_type: &str) -> Result<(), PipelineError> {
    let normalized = media_type
        .split(';')
        .next()
        .unwrap_or(media_type)
        .trim()
        .to_ascii_lowercase();

    if normalized == "application/pdf" {
        return Err(PipelineError::UnsupportedInput(
            "PDF scans are not decodable as bitmaps; submit a JPEG or PNG export".into(),
        ));
    }
    if ACCEPTED_MEDIA_TYPES.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(PipelineError::UnsupportedInput(format!(
            "Unsupported media type: {media_type}"
        )))
    }
}

/// Byte-bound check before decoding.
pub fn validate_scan_bytes(bytes: &[u8]) -> Result<(), PipelineError> {
    if bytes.len() < MIN_SCAN_BYTES {
        return Err(PipelineError::UnsupportedInput(
            "Scan payload too small to be a valid image".into(),
        ));
    }
    if bytes.len() > MAX_SCAN_BYTES {
        return Err(PipelineError::UnsupportedInput(format!(
            "Scan payload exceeds {}MB limit",
            MAX_SCAN_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Decode validated bytes into a [`RawImage`], dropping alpha.
pub fn decode_scan(bytes: &[u8]) -> Result<RawImage, PipelineError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::UnsupportedInput(format!("Failed to decode image: {e}")))?;
    RawImage::from_dynamic(decoded)
}

/// Acquire a scan from a local file.
///
/// The media type is inferred from the extension; files with no
/// recognizable image extension are rejected before any bytes are read.
pub fn acquire_from_file(path: &Path) -> Result<RawImage, PipelineError> {
    let media_type = mime_guess::from_path(path)
        .first_raw()
        .ok_or_else(|| {
            PipelineError::UnsupportedInput(format!(
                "Cannot determine media type of {}",
                path.display()
            ))
        })?;
    validate_media_type(media_type)?;

    let bytes = std::fs::read(path)?;
    validate_scan_bytes(&bytes)?;
    let raw = decode_scan(&bytes)?;
    debug!(
        path = %path.display(),
        media_type,
        size = bytes.len(),
        dimensions = format!("{}x{}", raw.width(), raw.height()),
        "Scan acquired from file"
    );
    Ok(raw)
}

// ═══════════════════════════════════════════════════════════
// Remote acquisition
// ═══════════════════════════════════════════════════════════

/// A downloaded scan payload plus the media type the server declared, if any.
#[derive(Debug, Clone)]
pub struct FetchedScan {
    pub bytes: Vec<u8>,
    pub media_type: Option<String>,
}

/// Downloads scan payloads. Implementations own their timeout policy and
/// must map a timeout to [`PipelineError::FetchTimeout`], never hang.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedScan, PipelineError>;
}

/// Blocking HTTP fetcher with a bounded per-request timeout.
pub struct HttpImageFetcher {
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpImageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, PipelineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PipelineError::Fetch {
                url: String::new(),
                status: None,
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Fetcher with the standard scan-download bound.
    pub fn with_default_timeout() -> Result<Self, PipelineError> {
        Self::new(IMAGE_FETCH_TIMEOUT_SECS)
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedScan, PipelineError> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                PipelineError::FetchTimeout {
                    url: url.to_string(),
                    seconds: self.timeout_secs,
                }
            } else {
                PipelineError::Fetch {
                    url: url.to_string(),
                    status: None,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {status}"),
            });
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::FetchTimeout {
                        url: url.to_string(),
                        seconds: self.timeout_secs,
                    }
                } else {
                    PipelineError::Fetch {
                        url: url.to_string(),
                        status: None,
                        message: e.to_string(),
                    }
                }
            })?
            .to_vec();

        Ok(FetchedScan { bytes, media_type })
    }
}

/// Acquire a scan from a remote URL via the given fetcher.
///
/// The server-declared Content-Type is validated when present; servers
/// that omit it are given the benefit of the decode attempt.
pub fn acquire_from_url(
    fetcher: &dyn ImageFetcher,
    url: &str,
) -> Result<RawImage, PipelineError> {
    let fetched = fetcher.fetch(url)?;
    if let Some(ref media_type) = fetched.media_type {
        validate_media_type(media_type)?;
    }
    validate_scan_bytes(&fetched.bytes)?;
    let raw = decode_scan(&fetched.bytes)?;
    debug!(
        url,
        size = fetched.bytes.len(),
        dimensions = format!("{}x{}", raw.width(), raw.height()),
        "Scan acquired from URL"
    );
    Ok(raw)
}

// ═══════════════════════════════════════════════════════════
// Mock fetcher (testing)
// ═══════════════════════════════════════════════════════════

enum MockResponse {
    Payload { bytes: Vec<u8>, media_type: Option<String> },
    Status(u16),
    Timeout,
}

/// Mock fetcher returning a configured payload or failure.
pub struct MockImageFetcher {
    response: MockResponse,
}

impl MockImageFetcher {
    pub fn ok(bytes: Vec<u8>, media_type: Option<&str>) -> Self {
        Self {
            response: MockResponse::Payload {
                bytes,
                media_type: media_type.map(str::to_string),
            },
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            response: MockResponse::Status(status),
        }
    }

    pub fn timeout() -> Self {
        Self {
            response: MockResponse::Timeout,
        }
    }
}

impl ImageFetcher for MockImageFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedScan, PipelineError> {
        match &self.response {
            MockResponse::Payload { bytes, media_type } => Ok(FetchedScan {
                bytes: bytes.clone(),
                media_type: media_type.clone(),
            }),
            MockResponse::Status(status) => Err(PipelineError::Fetch {
                url: url.to_string(),
                status: Some(*status),
                message: format!("HTTP {status}"),
            }),
            MockResponse::Timeout => Err(PipelineError::FetchTimeout {
                url: url.to_string(),
                seconds: IMAGE_FETCH_TIMEOUT_SECS,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageOutputFormat::Png).unwrap();
        cursor.into_inner()
    }

    // ── media types ──

    #[test]
    fn accepts_jpeg_and_png() {
        assert!(validate_media_type("image/jpeg").is_ok());
        assert!(validate_media_type("image/jpg").is_ok());
        assert!(validate_media_type("image/png").is_ok());
        assert!(validate_media_type("IMAGE/PNG").is_ok());
        assert!(validate_media_type("image/png; charset=binary").is_ok());
    }

    #[test]
    fn rejects_pdf_with_dedicated_message() {
        let err = validate_media_type("application/pdf").unwrap_err();
        assert!(err.to_string().contains("PDF"));
    }

    #[test]
    fn rejects_other_media_types() {
        assert!(validate_media_type("text/plain").is_err());
        assert!(validate_media_type("image/webp").is_err());
    }

    // ── byte bounds ──

    #[test]
    fn rejects_tiny_payload() {
        let err = validate_scan_bytes(&[0x89, 0x50]).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn rejects_oversized_payload() {
        let big = vec![0u8; MAX_SCAN_BYTES + 1];
        let err = validate_scan_bytes(&big).unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn accepts_in_bounds_payload() {
        assert!(validate_scan_bytes(&encode_png(10, 10, [0, 0, 0])).is_ok());
    }

    // ── decode ──

    #[test]
    fn decodes_valid_png() {
        let raw = decode_scan(&encode_png(12, 8, [40, 50, 60])).unwrap();
        assert_eq!(raw.width(), 12);
        assert_eq!(raw.height(), 8);
    }

    #[test]
    fn decode_garbage_is_unsupported_input() {
        let garbage = [0xDE, 0xAD, 0xBE, 0xEF].repeat(30);
        let err = decode_scan(&garbage).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedInput(_)));
    }

    // ── file acquisition ──

    #[test]
    fn acquires_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, encode_png(20, 20, [128, 128, 128])).unwrap();

        let raw = acquire_from_file(&path).unwrap();
        assert_eq!(raw.width(), 20);
    }

    #[test]
    fn rejects_pdf_file_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let err = acquire_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("PDF"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.dat");
        std::fs::write(&path, encode_png(10, 10, [0, 0, 0])).unwrap();

        assert!(acquire_from_file(&path).is_err());
    }

    // ── URL acquisition ──

    #[test]
    fn acquires_from_mock_url() {
        let fetcher = MockImageFetcher::ok(encode_png(30, 30, [10, 10, 10]), Some("image/png"));
        let raw = acquire_from_url(&fetcher, "https://example.com/scan.png").unwrap();
        assert_eq!(raw.width(), 30);
    }

    #[test]
    fn http_404_surfaces_status() {
        let fetcher = MockImageFetcher::status(404);
        let err = acquire_from_url(&fetcher, "https://example.com/missing.png").unwrap_err();
        assert_eq!(err.http_status(), Some(404));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn timeout_is_its_own_kind() {
        let fetcher = MockImageFetcher::timeout();
        let err = acquire_from_url(&fetcher, "https://example.com/slow.png").unwrap_err();
        assert!(matches!(err, PipelineError::FetchTimeout { .. }));
    }

    #[test]
    fn declared_pdf_content_type_is_rejected() {
        let fetcher = MockImageFetcher::ok(encode_png(10, 10, [0, 0, 0]), Some("application/pdf"));
        let err = acquire_from_url(&fetcher, "https://example.com/scan").unwrap_err();
        assert!(err.to_string().contains("PDF"));
    }

    #[test]
    fn missing_content_type_falls_through_to_decode() {
        let fetcher = MockImageFetcher::ok(encode_png(10, 10, [0, 0, 0]), None);
        assert!(acquire_from_url(&fetcher, "https://example.com/scan").is_ok());
    }
}
