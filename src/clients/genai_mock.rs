// src/clients/genai_mock.rs

//! Deterministic GenAI fixtures used when `mock_ls_client` is enabled.

use super::genai::{
    ChunkingStrategy, CreateResponseParams, CreateVectorStoreParams, FileObject, FileUpload,
    GenAiClient, ListParams, Model, OutputItem, ContentPart, Page, ResponseObject,
};
use crate::error::{GenAiError, GenAiErrorKind};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

pub const MOCK_VECTOR_STORE_ID: &str = "vs_mock123";
pub const MOCK_FILE_ID: &str = "file-mock123";
pub const MOCK_RESPONSE_ID: &str = "resp_mock123";
const MOCK_CREATED_AT: i64 = 1_735_689_600;

/// Four chat models and three embedding models.
pub fn mock_models() -> Vec<Model> {
    vec![
        Model::new("ollama/llama3.2:3b", "ollama"),
        Model::new("ollama/granite3.3:8b", "ollama"),
        Model::new("vllm/mistral-7b-instruct", "vllm"),
        Model::new("vllm/qwen2.5-7b-instruct", "vllm"),
        Model::new("ollama/all-minilm:l6-v2", "ollama"),
        Model::new("sentence-transformers/nomic-embed-text-v1.5", "sentence-transformers"),
        Model::new("vllm/granite-embedding-125m", "vllm"),
    ]
}

#[derive(Debug, Default, Clone)]
pub struct MockGenAiClient;

impl MockGenAiClient {
    pub fn new() -> Self {
        Self
    }
}

fn mock_vector_store(id: &str, name: &str, metadata: Value) -> Value {
    json!({
        "id": id,
        "object": "vector_store",
        "name": name,
        "created_at": MOCK_CREATED_AT,
        "status": "completed",
        "usage_bytes": 0,
        "file_counts": { "total": 1, "completed": 1, "in_progress": 0, "failed": 0, "cancelled": 0 },
        "metadata": metadata,
    })
}

fn single_page(items: Vec<Value>) -> Page<Value> {
    let first_id = items.first().and_then(|v| v["id"].as_str()).map(str::to_string);
    let last_id = items.last().and_then(|v| v["id"].as_str()).map(str::to_string);
    Page {
        data: items,
        first_id,
        last_id,
        has_more: false,
    }
}

fn mock_response(id: &str, model: &str, text: String) -> ResponseObject {
    ResponseObject {
        id: id.to_string(),
        model: model.to_string(),
        status: "completed".to_string(),
        created_at: MOCK_CREATED_AT,
        output: vec![OutputItem {
            kind: "message".to_string(),
            role: Some("assistant".to_string()),
            content: vec![ContentPart {
                kind: "output_text".to_string(),
                text: Some(text),
            }],
        }],
        usage: Some(json!({ "input_tokens": 12, "output_tokens": 9, "total_tokens": 21 })),
    }
}

#[async_trait]
impl GenAiClient for MockGenAiClient {
    async fn list_models(&self) -> Result<Vec<Model>, GenAiError> {
        Ok(mock_models())
    }

    async fn list_vector_stores(&self, _params: &ListParams) -> Result<Page<Value>, GenAiError> {
        Ok(single_page(vec![mock_vector_store(
            MOCK_VECTOR_STORE_ID,
            "Mock Vector Store",
            json!({}),
        )]))
    }

    async fn create_vector_store(&self, params: &CreateVectorStoreParams) -> Result<Value, GenAiError> {
        Ok(mock_vector_store(
            "vs_mock456",
            &params.name,
            Value::Object(params.metadata.clone()),
        ))
    }

    async fn delete_vector_store(&self, id: &str) -> Result<Value, GenAiError> {
        Ok(json!({ "id": id, "object": "vector_store.deleted", "deleted": true }))
    }

    async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        _params: &ListParams,
    ) -> Result<Page<Value>, GenAiError> {
        Ok(single_page(vec![json!({
            "id": MOCK_FILE_ID,
            "object": "vector_store.file",
            "vector_store_id": vector_store_id,
            "status": "completed",
            "created_at": MOCK_CREATED_AT,
        })]))
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<FileObject, GenAiError> {
        let mut body = upload.body;
        let mut bytes = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                GenAiError::new(GenAiErrorKind::InvalidRequest, format!("upload aborted: {e}"))
            })?;
            bytes += chunk.len() as u64;
        }
        Ok(FileObject {
            id: MOCK_FILE_ID.to_string(),
            bytes,
            filename: upload.filename,
            purpose: upload.purpose,
            created_at: MOCK_CREATED_AT,
        })
    }

    async fn attach_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
        chunking: Option<ChunkingStrategy>,
    ) -> Result<Value, GenAiError> {
        Ok(json!({
            "id": file_id,
            "object": "vector_store.file",
            "vector_store_id": vector_store_id,
            "status": "completed",
            "created_at": MOCK_CREATED_AT,
            "chunking_strategy": chunking.unwrap_or(ChunkingStrategy::Auto),
        }))
    }

    async fn delete_vector_store_file(
        &self,
        _vector_store_id: &str,
        file_id: &str,
    ) -> Result<Value, GenAiError> {
        Ok(json!({ "id": file_id, "object": "vector_store.file.deleted", "deleted": true }))
    }

    async fn list_files(&self, params: &ListParams) -> Result<Page<Value>, GenAiError> {
        Ok(single_page(vec![json!({
            "id": MOCK_FILE_ID,
            "object": "file",
            "bytes": 16384,
            "filename": "mock.txt",
            "purpose": params.purpose.clone().unwrap_or_else(|| "assistants".to_string()),
            "created_at": MOCK_CREATED_AT,
        })]))
    }

    async fn delete_file(&self, id: &str) -> Result<Value, GenAiError> {
        Ok(json!({ "id": id, "object": "file", "deleted": true }))
    }

    async fn create_response(&self, params: &CreateResponseParams) -> Result<ResponseObject, GenAiError> {
        let prompt = params
            .input
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(mock_response(
            MOCK_RESPONSE_ID,
            &params.model,
            format!("This is a mock response to: {prompt}"),
        ))
    }

    async fn get_response(&self, id: &str) -> Result<ResponseObject, GenAiError> {
        if id != MOCK_RESPONSE_ID {
            return Err(GenAiError::new(
                GenAiErrorKind::NotFound,
                format!("response {id} not found"),
            ));
        }
        Ok(mock_response(
            MOCK_RESPONSE_ID,
            "ollama/llama3.2:3b",
            "This is a mock response".to_string(),
        ))
    }
}
