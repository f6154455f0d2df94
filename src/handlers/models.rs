// src/handlers/models.rs

use super::{ok, Envelope};
use crate::clients::genai::Model;
use crate::error::Result;
use crate::middleware::GenAi;
use crate::validation::{FieldError, FieldErrors, QueryParams};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Llm,
    Embedding,
}

impl ModelType {
    const NAMES: [&'static str; 2] = ["llm", "embedding"];

    /// Embedding models are recognised by id: `embed` or `minilm`, any case.
    pub fn classify(model_id: &str) -> Self {
        let id = model_id.to_ascii_lowercase();
        if id.contains("embed") || id.contains("minilm") {
            Self::Embedding
        } else {
            Self::Llm
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "llm" => Some(Self::Llm),
            "embedding" => Some(Self::Embedding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    #[serde(flatten)]
    pub model: Model,
    #[serde(rename = "type")]
    pub model_type: ModelType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelCatalog {
    pub models: Vec<ModelInfo>,
    pub llm_models: Vec<ModelInfo>,
    pub embedding_models: Vec<ModelInfo>,
}

impl ModelCatalog {
    pub fn build(models: Vec<Model>, only: Option<ModelType>) -> Self {
        let models: Vec<ModelInfo> = models
            .into_iter()
            .map(|model| ModelInfo {
                model_type: ModelType::classify(&model.id),
                model,
            })
            .filter(|info| only.map_or(true, |t| info.model_type == t))
            .collect();
        let of_type = |t: ModelType| -> Vec<ModelInfo> {
            models.iter().filter(|m| m.model_type == t).cloned().collect()
        };
        Self {
            llm_models: of_type(ModelType::Llm),
            embedding_models: of_type(ModelType::Embedding),
            models,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub model_type: Option<String>,
}

pub async fn list_models(
    GenAi(client): GenAi,
    QueryParams(query): QueryParams<ModelsQuery>,
) -> Result<Json<Envelope<ModelCatalog>>> {
    let mut errors = FieldErrors::new();
    let only = match query.model_type.as_deref().filter(|v| !v.is_empty()) {
        Some(raw) => {
            let parsed = ModelType::parse(raw);
            if parsed.is_none() {
                errors.push(FieldError::not_supported("query.model_type", raw, &ModelType::NAMES));
            }
            parsed
        }
        None => None,
    };
    errors.into_result()?;

    let models = client.list_models().await?;
    Ok(ok(ModelCatalog::build(models, only)))
}
