//! Chat endpoints.
//!
//! `GET  /api/chat/history`: current transcript
//! `POST /api/chat/send`: one full turn (multipart: text + optional file)
//! `POST /api/chat/reset`: clear transcript and persisted history

use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::extract;
use crate::models::{Message, Usage};

pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Body limit for `/chat/send`; phone photos and scanned worksheets
/// are well above axum's 2 MB default.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Serialize)]
pub struct HistoryResponse {
    pub username: String,
    pub messages: Vec<Message>,
}

/// `GET /api/chat/history`: the transcript as it would be reloaded.
pub async fn history(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = ctx.session_for(&user.username)?;
    // The session lock may be held by an in-flight turn; wait for it on
    // the blocking pool, not on an async worker thread.
    let messages = tokio::task::spawn_blocking(move || {
        let session = session
            .lock()
            .map_err(|_| ApiError::Internal("session lock".into()))?;
        Ok::<_, ApiError>(session.transcript().to_vec())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("history task: {e}")))??;
    Ok(Json(HistoryResponse {
        username: user.username,
        messages,
    }))
}

#[derive(Serialize)]
pub struct SendResponse {
    pub reply: Message,
    pub usage: Usage,
    /// Set when the uploaded file could not be used; the turn still ran
    /// on the text alone.
    pub upload_error: Option<String>,
}

/// `POST /api/chat/send`: run one tutoring turn.
///
/// Multipart fields: `message` (text, may be empty when a file is
/// attached) and optionally `file`. An extraction failure is reported
/// in `upload_error` but does not block the turn.
pub async fn send(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    multipart: Multipart,
) -> Result<Json<SendResponse>, ApiError> {
    let parts = read_send_parts(multipart).await?;

    if parts.message.trim().is_empty() && parts.file.is_none() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    if parts.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message too long (max {MAX_MESSAGE_CHARS} chars)"
        )));
    }

    let session = ctx.session_for(&user.username)?;
    let client = ctx.client.clone();
    let options = ctx.options;
    let message = parts.message;
    let file = parts.file;
    let username = user.username.clone();

    // Extraction and the turn itself are blocking work (PDF parsing,
    // image decoding, the provider call); the per-session lock is held
    // for the turn's duration, serializing turns for this learner.
    let (outcome, upload_error) = tokio::task::spawn_blocking(move || {
        let (upload, upload_error) = match file {
            Some(file) => match extract::extract_upload(&file.bytes, &file.mime) {
                Ok(extracted) => (Some(extracted), None),
                Err(e) => {
                    tracing::warn!(user = %username, error = %e, "upload unusable");
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        if message.trim().is_empty() && upload.is_none() {
            // The only input was an upload and it failed; nothing to send.
            return Err(ApiError::BadRequest(
                upload_error.unwrap_or_else(|| "Message cannot be empty".into()),
            ));
        }

        let mut session = session
            .lock()
            .map_err(|_| ApiError::Internal("session lock".into()))?;
        session.append_user_turn(&message, upload);
        let outcome = session.submit(client.as_ref(), &options)?;
        Ok((outcome, upload_error))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("turn task: {e}")))??;

    Ok(Json(SendResponse {
        reply: outcome.message,
        usage: outcome.usage,
        upload_error,
    }))
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub messages: usize,
}

/// `POST /api/chat/reset`: start a new topic.
pub async fn reset(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<ResetResponse>, ApiError> {
    let session = ctx.session_for(&user.username)?;
    tokio::task::spawn_blocking(move || {
        let mut session = session
            .lock()
            .map_err(|_| ApiError::Internal("session lock".into()))?;
        session.reset().map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("reset task: {e}")))??;

    Ok(Json(ResetResponse { messages: 0 }))
}

struct UploadPart {
    bytes: Vec<u8>,
    mime: String,
}

struct SendParts {
    message: String,
    file: Option<UploadPart>,
}

async fn read_send_parts(mut multipart: Multipart) -> Result<SendParts, ApiError> {
    let mut message = String::new();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {e}")))?
    {
        match field.name() {
            Some("message") => {
                message = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Malformed message field: {e}")))?;
            }
            Some("file") => {
                // Prefer the declared content type; fall back to the
                // filename extension, then to sniffing in the extractor.
                let mime = field
                    .content_type()
                    .map(|m| m.to_string())
                    .or_else(|| {
                        field.file_name().map(|name| {
                            mime_guess::from_path(name).first_or_octet_stream().to_string()
                        })
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Malformed file field: {e}")))?
                    .to_vec();
                if !bytes.is_empty() {
                    file = Some(UploadPart { bytes, mime });
                }
            }
            _ => {}
        }
    }

    Ok(SendParts { message, file })
}
