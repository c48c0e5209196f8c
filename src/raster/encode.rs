//! Encoded bitmaps: `DynamicImage` ⇄ bytes ⇄ `data:` URI.
//!
//! The remote service ships page images as base64 `data:` URIs; the local
//! renderer produces a `DynamicImage`. Both end up as an [`EncodedImage`]
//! (MIME type + bytes) so the rest of the crate can treat them alike.
//! PNG is used for everything this crate encodes itself because it is
//! lossless and stamp lettering is thin.

use crate::error::StampError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

static RE_DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:(?P<mime>[A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+)(?:;[^,;]*)*?;base64,(?P<data>.*)$")
        .expect("data URI regex is valid")
});

/// Errors while encoding or decoding a bitmap.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("not a base64 data URI")]
    NotADataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}

/// An encoded bitmap and its MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl EncodedImage {
    /// PNG-encode an image.
    pub fn png(img: &DynamicImage) -> Result<Self, EncodeError> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
        Ok(Self {
            mime_type: "image/png".to_string(),
            bytes: buf,
        })
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self, EncodeError> {
        let caps = RE_DATA_URI
            .captures(uri.trim())
            .ok_or(EncodeError::NotADataUri)?;
        let payload: String = caps["data"].split_whitespace().collect();
        let bytes = STANDARD.decode(payload.as_bytes())?;
        Ok(Self {
            mime_type: caps["mime"].to_ascii_lowercase(),
            bytes,
        })
    }

    /// Render as a `data:` URI, the form an `<img src>` accepts.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    /// Decode the bitmap. The format is sniffed from the bytes, not the MIME type.
    pub fn decode(&self) -> Result<DynamicImage, EncodeError> {
        Ok(image::load_from_memory(&self.bytes)?)
    }

    /// Write the encoded bytes to `path` as-is.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StampError> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes).map_err(|source| StampError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Wrote {} bytes to {}", self.bytes.len(), path.display());
        Ok(())
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            _ => "bin",
        }
    }
}
