//! Image encoding: [`ImageAsset`] → base64 inline part.
//!
//! The generateContent API takes images inline in the JSON body as base64
//! with a MIME type. The uploaded bytes are sent as-is; re-encoding a JPEG
//! scan as PNG would only inflate the request.

use crate::pipeline::input::ImageAsset;
use crate::pipeline::llm::InlineData;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Wrap an image as a base64 inline-data part.
pub fn encode_image(image: &ImageAsset) -> InlineData {
    let data = STANDARD.encode(image.bytes());
    debug!("Encoded image → {} bytes base64", data.len());

    InlineData {
        mime_type: image.mime_type().to_string(),
        data,
    }
}
