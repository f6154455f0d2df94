// src/clients/genai.rs

//! GenAI capability set and its OpenAI-compatible REST implementation.

use crate::error::{GenAiError, GenAiErrorKind};
use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::stream::BoxStream;
use reqwest::{
    multipart::{Form, Part},
    Client, Method, RequestBuilder,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

/// Streamed request body. Errors abort the upstream request.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Model {
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: Some("model".to_string()),
            created: None,
            owned_by: Some(owned_by.into()),
            extra: Map::new(),
        }
    }
}

/// One page of an OpenAI-style list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateVectorStoreParams {
    pub name: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticChunking {
    pub max_chunk_size_tokens: u32,
    pub chunk_overlap_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChunkingStrategy {
    Auto,
    Static {
        #[serde(rename = "static")]
        config: StaticChunking,
    },
}

impl ChunkingStrategy {
    /// Builds a strategy from upload form fields. A static strategy with
    /// missing or out-of-range numbers is discarded, as is an unknown type.
    pub fn from_form(kind: Option<&str>, max_tokens: Option<&str>, overlap: Option<&str>) -> Option<Self> {
        match kind.map(str::trim)? {
            "auto" => Some(Self::Auto),
            "static" => {
                let max_chunk_size_tokens: u32 = max_tokens?.trim().parse().ok()?;
                let chunk_overlap_tokens: u32 = overlap?.trim().parse().ok()?;
                (max_chunk_size_tokens > 0).then_some(Self::Static {
                    config: StaticChunking {
                        max_chunk_size_tokens,
                        chunk_overlap_tokens,
                    },
                })
            }
            _ => None,
        }
    }
}

/// File part streamed to the upstream `/files` endpoint.
pub struct FileUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub purpose: String,
    pub body: ByteStream,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    FileSearch { vector_store_ids: Vec<String> },
}

/// Upstream `POST /responses` body. Only these parameters are ever forwarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateResponseParams {
    pub model: String,
    pub input: Vec<InputMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseObject {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

impl ResponseObject {
    /// First `output_text` of the first `message` output item.
    pub fn first_output_text(&self) -> Option<&str> {
        self.output
            .iter()
            .find(|item| item.kind == "message")?
            .content
            .iter()
            .find(|part| part.kind == "output_text")?
            .text
            .as_deref()
    }
}

#[async_trait]
pub trait GenAiClient: Send + Sync {
    async fn list_models(&self) -> Result<Vec<Model>, GenAiError>;

    async fn list_vector_stores(&self, params: &ListParams) -> Result<Page<Value>, GenAiError>;

    async fn create_vector_store(&self, params: &CreateVectorStoreParams) -> Result<Value, GenAiError>;

    async fn delete_vector_store(&self, id: &str) -> Result<Value, GenAiError>;

    async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        params: &ListParams,
    ) -> Result<Page<Value>, GenAiError>;

    /// Streams the file to `/files` without buffering it.
    async fn upload_file(&self, upload: FileUpload) -> Result<FileObject, GenAiError>;

    /// Adds an uploaded file to a vector store with an optional chunking strategy.
    async fn attach_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
        chunking: Option<ChunkingStrategy>,
    ) -> Result<Value, GenAiError>;

    /// Detaches a file from a vector store. The file itself is kept.
    async fn delete_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<Value, GenAiError>;

    async fn list_files(&self, params: &ListParams) -> Result<Page<Value>, GenAiError>;

    async fn delete_file(&self, id: &str) -> Result<Value, GenAiError>;

    async fn create_response(&self, params: &CreateResponseParams) -> Result<ResponseObject, GenAiError>;

    async fn get_response(&self, id: &str) -> Result<ResponseObject, GenAiError>;
}

/// Error message from an OpenAI (`error.message`) or FastAPI (`detail`) style body.
fn upstream_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("detail"))
                .or_else(|| v.get("message"))
        })
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.chars().take(512).collect())
}

/// Client for one GenAI service, bound to the caller's token.
pub struct OpenAiCompatibleClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl OpenAiCompatibleClient {
    /// `service_url` plus `api_prefix` (e.g. `/v1`) forms the base for every call.
    pub fn new(
        http: Client,
        service_url: &str,
        api_prefix: &str,
        token: Option<String>,
    ) -> Result<Self, GenAiError> {
        let mut base_url = Url::parse(service_url).map_err(|e| {
            GenAiError::new(GenAiErrorKind::Internal, format!("invalid service URL {service_url}: {e}"))
        })?;
        {
            let mut segments = base_url.path_segments_mut().map_err(|_| {
                GenAiError::new(GenAiErrorKind::Internal, "service URL cannot be a base")
            })?;
            segments.pop_if_empty();
            segments.extend(api_prefix.split('/').filter(|s| !s.is_empty()));
        }
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.http.request(method, self.url(segments));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GenAiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GenAiError::from_reqwest(&e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "GenAI service request failed");
            return Err(GenAiError::with_status(status.as_u16(), upstream_message(&body)));
        }
        response.json::<T>().await.map_err(|e| {
            GenAiError::new(GenAiErrorKind::Internal, format!("invalid GenAI response: {e}"))
        })
    }
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<Model>,
}

#[async_trait]
impl GenAiClient for OpenAiCompatibleClient {
    async fn list_models(&self) -> Result<Vec<Model>, GenAiError> {
        let list: ModelList = self.send(self.request(Method::GET, &["models"])).await?;
        Ok(list.data)
    }

    async fn list_vector_stores(&self, params: &ListParams) -> Result<Page<Value>, GenAiError> {
        self.send(self.request(Method::GET, &["vector_stores"]).query(params))
            .await
    }

    async fn create_vector_store(&self, params: &CreateVectorStoreParams) -> Result<Value, GenAiError> {
        self.send(self.request(Method::POST, &["vector_stores"]).json(params))
            .await
    }

    async fn delete_vector_store(&self, id: &str) -> Result<Value, GenAiError> {
        self.send(self.request(Method::DELETE, &["vector_stores", id]))
            .await
    }

    async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        params: &ListParams,
    ) -> Result<Page<Value>, GenAiError> {
        self.send(
            self.request(Method::GET, &["vector_stores", vector_store_id, "files"])
                .query(params),
        )
        .await
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<FileObject, GenAiError> {
        let mut part = Part::stream(reqwest::Body::wrap_stream(upload.body))
            .file_name(upload.filename);
        if let Some(content_type) = upload.content_type.as_deref() {
            part = part.mime_str(content_type).map_err(|e| {
                GenAiError::new(GenAiErrorKind::InvalidRequest, format!("invalid content type: {e}"))
            })?;
        }
        let form = Form::new().text("purpose", upload.purpose).part("file", part);
        self.send(self.request(Method::POST, &["files"]).multipart(form))
            .await
    }

    async fn attach_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
        chunking: Option<ChunkingStrategy>,
    ) -> Result<Value, GenAiError> {
        let mut body = serde_json::json!({ "file_id": file_id });
        if let Some(strategy) = chunking {
            body["chunking_strategy"] = serde_json::to_value(strategy).unwrap_or(Value::Null);
        }
        self.send(
            self.request(Method::POST, &["vector_stores", vector_store_id, "files"])
                .json(&body),
        )
        .await
    }

    async fn list_files(&self, params: &ListParams) -> Result<Page<Value>, GenAiError> {
        self.send(self.request(Method::GET, &["files"]).query(params))
            .await
    }

    async fn delete_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<Value, GenAiError> {
        self.send(self.request(
            Method::DELETE,
            &["vector_stores", vector_store_id, "files", file_id],
        ))
        .await
    }

    async fn delete_file(&self, id: &str) -> Result<Value, GenAiError> {
        self.send(self.request(Method::DELETE, &["files", id])).await
    }

    async fn create_response(&self, params: &CreateResponseParams) -> Result<ResponseObject, GenAiError> {
        self.send(self.request(Method::POST, &["responses"]).json(params))
            .await
    }

    async fn get_response(&self, id: &str) -> Result<ResponseObject, GenAiError> {
        self.send(self.request(Method::GET, &["responses", id])).await
    }
}
