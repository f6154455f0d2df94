// src/handlers/files.rs

use super::{created, ok, parse_bounded, parse_order, Envelope};
use crate::clients::genai::{ChunkingStrategy, FileUpload, ListParams, Page};
use crate::clients::{ByteStream, GenAiClient};
use crate::error::{AppError, Result};
use crate::middleware::{GenAi, MULTIPART_FIELDS_LIMIT};
use crate::validation::{FieldError, FieldErrorType, FieldErrors, QueryParams};
use axum::{
    body::Bytes,
    extract::{multipart::Field, multipart::MultipartError, Multipart, Path},
    extract::multipart::MultipartRejection,
    http::StatusCode,
    Json,
};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub const DEFAULT_PURPOSE: &str = "assistants";
/// Chunks in flight between the form reader and the upstream request.
const UPLOAD_CHANNEL_DEPTH: usize = 4;

type Chunk = std::result::Result<Bytes, std::io::Error>;

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(format!("invalid multipart body: {}", e.body_text()))
    }
}

/// Text fields of the upload form.
#[derive(Debug, Default)]
struct UploadForm {
    /// Store named by the route, when the upload is addressed to one.
    target_store: Option<String>,
    vector_store_id: Option<String>,
    purpose: Option<String>,
    chunking_type: Option<String>,
    max_chunk_size_tokens: Option<String>,
    chunk_overlap_tokens: Option<String>,
    file_seen: bool,
    text_bytes: usize,
}

/// Validated form: target vector store and chunking strategy.
type ValidatedForm = (String, Option<ChunkingStrategy>);

impl UploadForm {
    fn set(&mut self, name: &str, value: String) -> Result<()> {
        match name {
            "vector_store_id" => self.vector_store_id = Some(value),
            "purpose" if self.file_seen => {
                return Err(AppError::validation(FieldError::invalid(
                    "purpose",
                    "must be sent before the file part",
                )))
            }
            "purpose" => self.purpose = Some(value),
            "chunking_type" => self.chunking_type = Some(value),
            "max_chunk_size_tokens" => self.max_chunk_size_tokens = Some(value),
            "chunk_overlap_tokens" => self.chunk_overlap_tokens = Some(value),
            other => {
                return Err(AppError::validation(FieldError::new(
                    FieldErrorType::FieldValueNotSupported,
                    other,
                    "unknown form field",
                )))
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<ValidatedForm> {
        let mut errors = FieldErrors::new();
        if !self.file_seen {
            errors.push(FieldError::required("file"));
        }
        let from_form = self
            .vector_store_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let vector_store_id = match (self.target_store.as_deref(), from_form) {
            (Some(target), Some(named)) if target != named => {
                errors.push(FieldError::invalid(
                    "vector_store_id",
                    "does not match the vector store in the path",
                ));
                None
            }
            (Some(target), _) => Some(target),
            (None, named) => named,
        };
        if vector_store_id.is_none() && self.target_store.is_none() {
            errors.push(FieldError::required("vector_store_id"));
        }
        errors.into_result()?;

        let chunking = ChunkingStrategy::from_form(
            self.chunking_type.as_deref(),
            self.max_chunk_size_tokens.as_deref(),
            self.chunk_overlap_tokens.as_deref(),
        );
        if self.chunking_type.is_some() && chunking.is_none() {
            debug!(chunking_type = ?self.chunking_type, "Discarding incomplete chunking strategy");
        }
        Ok((vector_store_id.unwrap_or_default().to_string(), chunking))
    }

    fn purpose(&self) -> String {
        self.purpose
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PURPOSE.to_string())
    }
}

/// Reads a text field, enforcing the shared cap on buffered form text.
async fn read_text(field: &mut Field<'_>, form: &mut UploadForm) -> Result<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        form.text_bytes += chunk.len();
        if form.text_bytes > MULTIPART_FIELDS_LIMIT {
            return Err(AppError::PayloadTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(|_| {
        let name = field.name().unwrap_or_default().to_string();
        AppError::validation(FieldError::invalid(name, "must be UTF-8 text"))
    })
}

struct FileMeta {
    filename: String,
    content_type: Option<String>,
    purpose: String,
}

/// Walks the form. The file part is forwarded chunk by chunk into `chunks`
/// as it arrives; its metadata goes out on `meta` first so the upstream
/// request can start.
///
/// `Ok(None)` means the upstream stopped reading before the file ended.
async fn read_form(
    multipart: &mut Multipart,
    target_store: Option<String>,
    meta: oneshot::Sender<FileMeta>,
    chunks: &mpsc::Sender<Chunk>,
) -> Result<Option<ValidatedForm>> {
    let mut form = UploadForm {
        target_store,
        ..UploadForm::default()
    };
    let mut meta = Some(meta);

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name != "file" {
            let value = read_text(&mut field, &mut form).await?;
            form.set(&name, value)?;
            continue;
        }

        let Some(meta) = meta.take() else {
            return Err(AppError::validation(FieldError::new(
                FieldErrorType::FieldValueDuplicate,
                "file",
                "only one file may be uploaded per request",
            )));
        };
        form.file_seen = true;
        let file_meta = FileMeta {
            filename: field.file_name().unwrap_or("upload").to_string(),
            content_type: field.content_type().map(str::to_string),
            purpose: form.purpose(),
        };
        if meta.send(file_meta).is_err() {
            return Err(AppError::Internal("upload request was dropped".into()));
        }

        let mut forwarded = 0usize;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            forwarded += chunk.len();
            if chunks.send(Ok(chunk)).await.is_err() {
                return Ok(None);
            }
        }
        debug!(bytes = forwarded, "File part forwarded upstream");
    }

    form.validate().map(Some)
}

fn receiver_stream(rx: mpsc::Receiver<Chunk>) -> ByteStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|chunk| (chunk, rx)) }).boxed()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_id: String,
    pub vector_store_file: Value,
}

type MultipartBody = std::result::Result<Multipart, MultipartRejection>;

/// Streams the file part to the upstream `/files` endpoint while the rest of
/// the form is still being read, then attaches it to the vector store.
pub async fn upload_file(
    GenAi(client): GenAi,
    multipart: MultipartBody,
) -> Result<(StatusCode, Json<Envelope<UploadedFile>>)> {
    upload(client, multipart, None).await
}

/// Same upload, addressed to the vector store in the path. A `vector_store_id`
/// form field is optional here and must name the same store.
pub async fn upload_to_vector_store(
    GenAi(client): GenAi,
    Path(vector_store_id): Path<String>,
    multipart: MultipartBody,
) -> Result<(StatusCode, Json<Envelope<UploadedFile>>)> {
    upload(client, multipart, Some(vector_store_id)).await
}

async fn upload(
    client: Arc<dyn GenAiClient>,
    multipart: MultipartBody,
    target_store: Option<String>,
) -> Result<(StatusCode, Json<Envelope<UploadedFile>>)> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let (meta_tx, meta_rx) = oneshot::channel::<FileMeta>();
    let (chunk_tx, chunk_rx) = mpsc::channel::<Chunk>(UPLOAD_CHANNEL_DEPTH);

    let upload = async {
        let meta = meta_rx.await.ok()?;
        Some(
            client
                .upload_file(FileUpload {
                    filename: meta.filename,
                    content_type: meta.content_type,
                    purpose: meta.purpose,
                    body: receiver_stream(chunk_rx),
                })
                .await,
        )
    };

    let reader = async move {
        let outcome = read_form(&mut multipart, target_store, meta_tx, &chunk_tx).await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Upload form rejected; aborting upstream upload");
            let _ = chunk_tx
                .send(Err(std::io::Error::other("upload aborted: form validation failed")))
                .await;
        }
        outcome
    };

    let (uploaded, form) = tokio::join!(upload, reader);
    let form = form?;
    let file = match uploaded {
        Some(result) => result?,
        None => return Err(AppError::validation(FieldError::required("file"))),
    };
    let Some((vector_store_id, chunking)) = form else {
        return Err(AppError::Internal(
            "upstream stopped reading the upload".into(),
        ));
    };

    info!(
        file.id = %file.id,
        file.bytes = file.bytes,
        vector_store.id = %vector_store_id,
        chunking = ?chunking,
        "File uploaded"
    );
    let vector_store_file = client
        .attach_file(&vector_store_id, &file.id, chunking)
        .await?;
    Ok(created(UploadedFile {
        file_id: file.id,
        vector_store_file,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct FilesQuery {
    pub limit: Option<String>,
    pub order: Option<String>,
    pub purpose: Option<String>,
}

pub async fn list_files(
    GenAi(client): GenAi,
    QueryParams(query): QueryParams<FilesQuery>,
) -> Result<Json<Envelope<Page<Value>>>> {
    let mut errors = FieldErrors::new();
    let limit = parse_bounded(&mut errors, "query.limit", query.limit.as_deref(), 1, 10_000);
    let order = parse_order(&mut errors, "query.order", query.order.as_deref());
    errors.into_result()?;
    let params = ListParams {
        limit: limit.map(|l| l as u32),
        order,
        purpose: query.purpose.filter(|p| !p.is_empty()),
        ..ListParams::default()
    };
    Ok(ok(client.list_files(&params).await?))
}

pub async fn delete_file(GenAi(client): GenAi, Path(id): Path<String>) -> Result<Json<Envelope<Value>>> {
    Ok(ok(client.delete_file(&id).await?))
}
