// src/handlers/responses.rs

use super::{ok, Envelope};
use crate::clients::genai::{CreateResponseParams, InputMessage, ResponseObject, Tool};
use crate::error::{AppError, Result};
use crate::middleware::GenAi;
use crate::validation::{FieldError, FieldErrors, StrictJson};
use axum::{extract::Path, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const CHAT_ROLES: [&str; 2] = ["user", "assistant"];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateResponseRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub model: String,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
    #[serde(default)]
    pub chat_context: Vec<ChatMessage>,
    pub instructions: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

impl CreateResponseRequest {
    /// Validates and converts into the upstream request. Only the fields
    /// listed here are forwarded.
    pub fn into_params(self) -> Result<CreateResponseParams> {
        if self.stream {
            return Err(AppError::BadRequest(
                "streaming responses are not supported".into(),
            ));
        }

        let mut errors = FieldErrors::new();
        if self.input.trim().is_empty() {
            errors.push(FieldError::required("data.input"));
        }
        if self.model.trim().is_empty() {
            errors.push(FieldError::required("data.model"));
        }
        if let Some(t) = self.temperature {
            errors.check_range("data.temperature", t, 0.0, 2.0);
        }
        if let Some(p) = self.top_p {
            errors.check_range("data.top_p", p, 0.0, 1.0);
        }
        for (i, message) in self.chat_context.iter().enumerate() {
            if !CHAT_ROLES.contains(&message.role.as_str()) {
                errors.push(FieldError::not_supported(
                    format!("data.chat_context[{i}].role"),
                    &message.role,
                    &CHAT_ROLES,
                ));
            }
        }
        for (i, id) in self.vector_store_ids.iter().enumerate() {
            if id.trim().is_empty() {
                errors.push(FieldError::required(format!("data.vector_store_ids[{i}]")));
            }
        }
        errors.into_result()?;

        let mut input: Vec<InputMessage> = self
            .chat_context
            .into_iter()
            .map(|m| InputMessage {
                role: m.role,
                content: m.content,
            })
            .collect();
        input.push(InputMessage {
            role: "user".to_string(),
            content: self.input,
        });

        let tools = if self.vector_store_ids.is_empty() {
            Vec::new()
        } else {
            vec![Tool::FileSearch {
                vector_store_ids: self.vector_store_ids,
            }]
        };

        Ok(CreateResponseParams {
            model: self.model,
            input,
            instructions: self.instructions,
            temperature: self.temperature,
            top_p: self.top_p,
            tools,
        })
    }
}

/// Flattened response: the first text output instead of the output item list.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SimpleResponse {
    pub id: String,
    pub model: String,
    pub status: String,
    pub created_at: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

impl From<ResponseObject> for SimpleResponse {
    fn from(response: ResponseObject) -> Self {
        let content = response.first_output_text().unwrap_or_default().to_string();
        Self {
            id: response.id,
            model: response.model,
            status: response.status,
            created_at: response.created_at,
            content,
            usage: response.usage,
        }
    }
}

pub async fn create_response(
    GenAi(client): GenAi,
    StrictJson(request): StrictJson<CreateResponseRequest>,
) -> Result<Json<Envelope<SimpleResponse>>> {
    let params = request.into_params()?;
    let response = client.create_response(&params).await?;
    Ok(ok(SimpleResponse::from(response)))
}

pub async fn get_response(
    GenAi(client): GenAi,
    Path(id): Path<String>,
) -> Result<Json<Envelope<SimpleResponse>>> {
    let response = client.get_response(&id).await?;
    Ok(ok(SimpleResponse::from(response)))
}
