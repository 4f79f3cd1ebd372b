//! Checks applied before anything is uploaded or sent to the gateway.

use image::ImageFormat;
use shared::StudioError;

/// Largest accepted upload, 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedImage {
    pub filename: String,
    pub mime: &'static str,
    pub size_bytes: usize,
}

fn mime_for(format: ImageFormat) -> Option<&'static str> {
    let mime = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Avif => "image/avif",
        _ => return None,
    };
    Some(mime)
}

/// Sniff the payload and reject anything that is not a supported image or is
/// too large.
pub fn validate_upload(filename: &str, bytes: &[u8]) -> Result<ValidatedImage, StudioError> {
    if bytes.is_empty() {
        return Err(StudioError::validation("Please upload an image file"));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(StudioError::validation(format!(
            "{} is larger than 10MB",
            filename
        )));
    }
    let mime = image::guess_format(bytes)
        .ok()
        .and_then(mime_for)
        .ok_or_else(|| StudioError::validation("Please upload an image file"))?;

    Ok(ValidatedImage {
        filename: filename.to_string(),
        mime,
        size_bytes: bytes.len(),
    })
}

/// A prompt must contain something besides whitespace.
pub fn validate_prompt(prompt: &str) -> Result<(), StudioError> {
    if prompt.trim().is_empty() {
        return Err(StudioError::validation(
            "Please provide a description of the new clothing",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub accepted: Vec<ValidatedImage>,
    pub rejected_not_image: usize,
    pub rejected_too_large: usize,
}

/// Keep the images within the size limit, counting what was dropped and why.
pub fn validate_batch<'a, I>(files: I) -> BatchReport
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut report = BatchReport::default();
    for (name, bytes) in files {
        let is_image = image::guess_format(bytes)
            .ok()
            .and_then(mime_for)
            .is_some();
        if !is_image {
            report.rejected_not_image += 1;
            continue;
        }
        match validate_upload(name, bytes) {
            Ok(valid) => report.accepted.push(valid),
            Err(_) => report.rejected_too_large += 1,
        }
    }
    report
}


#[cfg(test)]
mod tests {
    use super::fixtures::PNG_HEADER;
    use super::*;

    #[test]
    fn accepts_png_and_reports_mime() {
        let valid = validate_upload("look.png", PNG_HEADER).unwrap();
        assert_eq!(valid.mime, "image/png");
        assert_eq!(valid.size_bytes, PNG_HEADER.len());
    }

    #[test]
    fn rejects_non_images_and_empty_payloads() {
        assert!(validate_upload("notes.txt", b"hello world").unwrap_err().is_validation());
        assert!(validate_upload("empty.png", b"").is_err());
    }

    #[test]
    fn rejects_oversized_uploads() {
        let mut big = PNG_HEADER.to_vec();
        big.resize(MAX_UPLOAD_BYTES + 1, 0);
        let err = validate_upload("big.png", &big).unwrap_err();
        assert!(err.to_string().contains("larger than 10MB"));
    }

    #[test]
    fn blank_prompt_is_rejected() {
        assert!(validate_prompt("  \n").is_err());
        assert!(validate_prompt("red dress").is_ok());
    }

    #[test]
    fn batch_counts_rejections() {
        let mut big = PNG_HEADER.to_vec();
        big.resize(MAX_UPLOAD_BYTES + 1, 0);
        let files: Vec<(&str, &[u8])> = vec![
            ("a.png", PNG_HEADER),
            ("b.txt", b"text"),
            ("c.png", &big),
        ];
        let report = validate_batch(files);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.rejected_not_image, 1);
        assert_eq!(report.rejected_too_large, 1);
    }
}
