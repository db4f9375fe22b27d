use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header,
    Json,
};
use bytes::Bytes;

use super::{
    dto::RecipeWriteRequest,
    image::{decode_data_uri, decode_upload, DecodedImage},
};
use crate::error::ApiError;

/// Recipe write body: either JSON, or multipart with a `payload` part holding
/// the JSON and an `image` file part.
#[derive(Debug)]
pub struct RecipeForm {
    pub body: RecipeWriteRequest,
    pub upload: Option<(Bytes, String)>,
}

impl RecipeForm {
    pub fn json(body: RecipeWriteRequest) -> Self {
        Self { body, upload: None }
    }

    /// The submitted image, if any. A file part wins over an inline data URI.
    pub fn image(&self) -> Result<Option<DecodedImage>, ApiError> {
        if let Some((body, content_type)) = &self.upload {
            return decode_upload(body.clone(), content_type).map(Some);
        }
        match self.body.image.as_deref().map(str::trim) {
            Some(uri) if !uri.is_empty() => decode_data_uri(uri).map(Some),
            _ => Ok(None),
        }
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

#[async_trait]
impl<S> FromRequest<S> for RecipeForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Json(body) = Json::<RecipeWriteRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::validation("body", e.body_text()))?;
            return Ok(Self::json(body));
        }

        let mut mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation("body", e.body_text()))?;
        let mut body = None;
        let mut upload = None;
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| ApiError::validation("body", e.to_string()))?
        {
            let name = field.name().map(|s| s.to_string());
            match name.as_deref() {
                Some("payload") => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::validation("payload", e.to_string()))?;
                    let parsed: RecipeWriteRequest = serde_json::from_str(&text)
                        .map_err(|e| ApiError::validation("payload", e.to_string()))?;
                    body = Some(parsed);
                }
                Some("image") => {
                    let content_type = field
                        .content_type()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "application/octet-stream".into());
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::validation("image", e.to_string()))?;
                    upload = Some((data, content_type));
                }
                _ => {}
            }
        }

        let body = body.ok_or_else(|| ApiError::validation("payload", "field is required"))?;
        Ok(Self { body, upload })
    }
}
