//! Uploaded picture as received from the client.

use std::path::Path;

use axum::body::Bytes;

use super::ValidationError;

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Map a declared content type. Parameters such as `; charset=` are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnsupportedContentType` for anything but
    /// `image/jpeg` and `image/png`.
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, ValidationError> {
        let declared = content_type.unwrap_or_default();
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            _ => Err(ValidationError::UnsupportedContentType(declared.to_owned())),
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    /// Size of the upload in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Stem of the client file name, reduced to characters that are safe in
    /// a file name. Falls back to `picture`.
    #[must_use]
    pub fn base_name(&self) -> String {
        const MAX_LENGTH: usize = 64;

        let stem: String = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).file_stem())
            .map(|stem| stem.to_string_lossy())
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .take(MAX_LENGTH)
            .collect();

        if stem.is_empty() {
            "picture".to_owned()
        } else {
            stem
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn upload(name: Option<&str>) -> Upload {
        Upload {
            file_name: name.map(str::to_owned),
            content_type: Some("image/png".to_owned()),
            bytes: Bytes::from_static(b"abc"),
        }
    }

    #[test]
    fn test_accepted_content_types() {
        assert_eq!(ImageKind::from_content_type(Some("image/jpeg")).unwrap(), ImageKind::Jpeg);
        assert_eq!(ImageKind::from_content_type(Some("IMAGE/PNG")).unwrap(), ImageKind::Png);
        assert_eq!(
            ImageKind::from_content_type(Some("image/png; q=1")).unwrap(),
            ImageKind::Png
        );
    }

    #[test]
    fn test_rejected_content_types() {
        for declared in [Some("text/plain"), Some("image/gif"), Some(""), None] {
            assert!(matches!(
                ImageKind::from_content_type(declared),
                Err(ValidationError::UnsupportedContentType(_))
            ));
        }
    }

    #[test]
    fn test_base_name_is_sanitised() {
        assert_eq!(upload(Some("selfie.jpg")).base_name(), "selfie");
        assert_eq!(upload(Some("../../etc/passwd")).base_name(), "passwd");
        assert_eq!(upload(Some("my photo (1).png")).base_name(), "myphoto1");
        assert_eq!(upload(Some("....")).base_name(), "picture");
        assert_eq!(upload(None).base_name(), "picture");
    }

    #[test]
    fn test_size() {
        assert_eq!(upload(None).size(), 3);
    }
}
