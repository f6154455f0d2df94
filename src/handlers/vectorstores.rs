// src/handlers/vectorstores.rs

use super::{created, ok, parse_bounded, parse_order, Envelope};
use crate::clients::genai::{CreateVectorStoreParams, ListParams, Page};
use crate::error::Result;
use crate::middleware::GenAi;
use crate::validation::{FieldError, FieldErrors, QueryParams, StrictJson};
use axum::{
    extract::Path,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

pub const NAME_MAX_LEN: usize = 256;
pub const METADATA_MAX_ENTRIES: usize = 16;
pub const METADATA_KEY_MAX_LEN: usize = 64;
pub const METADATA_VALUE_MAX_LEN: usize = 512;
const DEFAULT_LIMIT: i64 = 20;

/// Pagination query shared by the vector-store and file listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub order: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
}

impl ListQuery {
    pub(crate) fn validate(&self, errors: &mut FieldErrors) -> ListParams {
        let limit = parse_bounded(errors, "query.limit", self.limit.as_deref(), 1, 100)
            .unwrap_or(DEFAULT_LIMIT);
        let order = parse_order(errors, "query.order", self.order.as_deref())
            .unwrap_or_else(|| "desc".to_string());
        ListParams {
            limit: Some(limit as u32),
            order: Some(order),
            after: self.after.clone().filter(|s| !s.is_empty()),
            before: self.before.clone().filter(|s| !s.is_empty()),
            purpose: None,
        }
    }
}

pub async fn list_vector_stores(
    GenAi(client): GenAi,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Envelope<Page<Value>>>> {
    let mut errors = FieldErrors::new();
    let params = query.validate(&mut errors);
    errors.into_result()?;
    Ok(ok(client.list_vector_stores(&params).await?))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateVectorStoreRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CreateVectorStoreRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError::required("data.name"));
        } else if self.name.chars().count() > NAME_MAX_LEN {
            errors.push(FieldError::too_long("data.name", NAME_MAX_LEN));
        }
        if self.metadata.len() > METADATA_MAX_ENTRIES {
            errors.push(FieldError::too_many("data.metadata", METADATA_MAX_ENTRIES));
        }
        for (key, value) in &self.metadata {
            if key.chars().count() > METADATA_KEY_MAX_LEN {
                errors.push(FieldError::too_long(format!("data.metadata[{key}]"), METADATA_KEY_MAX_LEN));
            }
            if value.chars().count() > METADATA_VALUE_MAX_LEN {
                errors.push(FieldError::too_long(
                    format!("data.metadata[{key}]"),
                    METADATA_VALUE_MAX_LEN,
                ));
            }
        }
        errors.into_result()
    }
}

pub async fn create_vector_store(
    GenAi(client): GenAi,
    StrictJson(request): StrictJson<CreateVectorStoreRequest>,
) -> Result<(StatusCode, Json<Envelope<Value>>)> {
    request.validate()?;
    let params = CreateVectorStoreParams {
        name: request.name,
        metadata: request
            .metadata
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect::<Map<_, _>>(),
    };
    Ok(created(client.create_vector_store(&params).await?))
}

pub async fn delete_vector_store(
    GenAi(client): GenAi,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Value>>> {
    Ok(ok(client.delete_vector_store(&id).await?))
}

pub async fn list_vector_store_files(
    GenAi(client): GenAi,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<Json<Envelope<Page<Value>>>> {
    let mut errors = FieldErrors::new();
    let params = query.validate(&mut errors);
    errors.into_result()?;
    Ok(ok(client.list_vector_store_files(&id, &params).await?))
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DeletedVectorStoreFile {
    pub id: String,
    pub object: String,
    pub deleted: bool,
}

/// Detaches the file from the store, then deletes the file itself. A failed
/// file delete is logged; the detach has already happened.
pub async fn delete_vector_store_file(
    GenAi(client): GenAi,
    Path((vector_store_id, file_id)): Path<(String, String)>,
) -> Result<Json<Envelope<DeletedVectorStoreFile>>> {
    client
        .delete_vector_store_file(&vector_store_id, &file_id)
        .await?;
    if let Err(e) = client.delete_file(&file_id).await {
        warn!(
            file.id = %file_id,
            vector_store.id = %vector_store_id,
            error = %e,
            "Failed to delete file after removing it from the vector store"
        );
    }
    Ok(ok(DeletedVectorStoreFile {
        id: file_id,
        object: "vector_store.file.deleted".to_string(),
        deleted: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, metadata: &[(&str, &str)]) -> CreateVectorStoreRequest {
        CreateVectorStoreRequest {
            name: name.to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn fields(result: Result<()>) -> Vec<String> {
        match result {
            Err(crate::error::AppError::Validation(errors)) => {
                errors.into_iter().map(|e| e.field).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn name_is_required_and_bounded() {
        assert_eq!(fields(request("", &[("k", "v")]).validate()), vec!["data.name"]);
        assert_eq!(fields(request(&"n".repeat(257), &[]).validate()), vec!["data.name"]);
        assert!(request(&"n".repeat(256), &[]).validate().is_ok());
    }

    #[test]
    fn metadata_limits() {
        let many: Vec<(String, String)> = (0..17).map(|i| (format!("k{i}"), "v".into())).collect();
        let mut req = request("docs", &[]);
        req.metadata = many.into_iter().collect();
        assert_eq!(fields(req.validate()), vec!["data.metadata"]);

        let long_key = "k".repeat(65);
        let long_value = "v".repeat(513);
        let req = request("docs", &[(long_key.as_str(), "v"), ("ok", long_value.as_str())]);
        assert_eq!(fields(req.validate()).len(), 2);
    }

    #[test]
    fn list_query_defaults_and_bounds() {
        let mut errors = FieldErrors::new();
        let params = ListQuery::default().validate(&mut errors);
        assert!(errors.is_empty());
        assert_eq!(params.limit, Some(20));
        assert_eq!(params.order.as_deref(), Some("desc"));

        let mut errors = FieldErrors::new();
        ListQuery {
            limit: Some("101".into()),
            order: Some("random".into()),
            ..ListQuery::default()
        }
        .validate(&mut errors);
        let err = errors.into_result().unwrap_err();
        assert!(matches!(err, crate::error::AppError::Validation(ref list) if list.len() == 2));
    }
}
