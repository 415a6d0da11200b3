//! Image payloads carried inside user messages.
//!
//! Images are held as raw bytes in memory and encoded as standard base64
//! wherever they leave the process: in saved history files and in `data:`
//! URLs on the wire.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use std::path::Path;
use tracing::warn;

const SUPPORTED_SUBTYPES: &[(&str, &str)] = &[
    ("jpg", "jpeg"),
    ("jpeg", "jpeg"),
    ("png", "png"),
    ("gif", "gif"),
    ("webp", "webp"),
];

const FALLBACK_SUBTYPE: &str = "jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    /// Subtype of the `image/*` media type, e.g. `png`.
    pub media_subtype: String,
    pub data: Vec<u8>,
}

impl ImagePart {
    pub fn new(media_subtype: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_subtype: media_subtype.into(),
            data,
        }
    }

    pub fn mime_type(&self) -> String {
        format!("image/{}", self.media_subtype)
    }

    pub fn encode_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.data)
    }

    pub fn from_base64(
        media_subtype: impl Into<String>,
        encoded: &str,
    ) -> Result<Self, base64::DecodeError> {
        let data = BASE64_STANDARD.decode(encoded.trim())?;
        Ok(Self::new(media_subtype, data))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.encode_base64())
    }

    /// Parses `data:image/<subtype>;base64,<payload>`.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:image/")?;
        let (subtype, payload) = rest.split_once(";base64,")?;
        if subtype.is_empty() {
            return None;
        }
        Self::from_base64(subtype, payload).ok()
    }
}

/// Maps a file extension to an image subtype, falling back to `jpeg`.
pub fn media_subtype_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref().and_then(|ext| {
        SUPPORTED_SUBTYPES
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, subtype)| *subtype)
    }) {
        Some(subtype) => subtype,
        None => {
            warn!(
                path = %path.display(),
                "unsupported image extension, treating as {FALLBACK_SUBTYPE}"
            );
            FALLBACK_SUBTYPE
        }
    }
}

pub fn read_image(path: &Path) -> std::io::Result<ImagePart> {
    let data = std::fs::read(path)?;
    Ok(ImagePart::new(media_subtype_for(path), data))
}
