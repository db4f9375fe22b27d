use anyhow::Context;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

lazy_static! {
    static ref DATA_URI_RE: Regex =
        Regex::new(r"(?s)^data:image/([A-Za-z0-9]{1,10});base64,(.+)$").unwrap();
}

/// Image bytes ready for the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub body: Bytes,
    pub content_type: String,
    pub ext: String,
}

/// Decodes `data:image/<ext>;base64,<payload>`; the stored file is named by
/// the declared extension.
pub fn decode_data_uri(uri: &str) -> Result<DecodedImage, ApiError> {
    let caps = DATA_URI_RE
        .captures(uri.trim())
        .ok_or_else(|| ApiError::validation("image", "expected data:image/<ext>;base64,<data>"))?;
    let ext = caps[1].to_ascii_lowercase();
    let payload: String = caps[2].chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let body = Base64::decode_vec(&payload)
        .map_err(|_| ApiError::validation("image", "invalid base64 payload"))?;
    if body.is_empty() {
        return Err(ApiError::validation("image", "empty image"));
    }
    Ok(DecodedImage {
        body: Bytes::from(body),
        content_type: format!("image/{ext}"),
        ext,
    })
}

/// Multipart file part; the extension comes from its content type.
pub fn decode_upload(body: Bytes, content_type: &str) -> Result<DecodedImage, ApiError> {
    let ext = ext_from_mime(content_type)
        .ok_or_else(|| ApiError::validation("image", "unsupported image type"))?;
    if body.is_empty() {
        return Err(ApiError::validation("image", "empty image"));
    }
    Ok(DecodedImage {
        body,
        content_type: content_type.to_string(),
        ext: ext.to_string(),
    })
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Uploads under `recipes/<uuid>.<ext>` and returns the key.
pub async fn store(st: &AppState, image: DecodedImage) -> Result<String, ApiError> {
    let key = format!("recipes/{}.{}", Uuid::new_v4(), image.ext);
    st.storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

/// Best-effort removal of an object that is no longer referenced.
pub async fn discard(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, key, "failed to delete image");
    }
}

pub async fn url(st: &AppState, key: &str) -> Result<String, ApiError> {
    let url = st
        .storage
        .presign_get(key, st.config.storage.url_ttl_secs)
        .await
        .with_context(|| format!("presign url for {}", key))?;
    Ok(url)
}
