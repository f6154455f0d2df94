// src/handlers/secrets.rs

use super::{ok, parse_bounded, Envelope};
use crate::clients::kubernetes::Secret;
use crate::clients::s3::STORAGE_SECRET_KEYS;
use crate::error::Result;
use crate::middleware::{KubeClient, Namespace};
use crate::validation::{FieldError, FieldErrors, QueryParams};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const LLS_SECRET_KEYS: [&str; 2] = ["LLAMA_STACK_CLIENT_API_KEY", "LLAMA_STACK_CLIENT_BASE_URL"];
const DISPLAY_NAME_ANNOTATION: &str = super::namespaces::DISPLAY_NAME_ANNOTATION;

/// Well-known credential shapes a secret can be classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Storage,
    Lls,
}

impl SecretKind {
    const NAMES: [&'static str; 2] = ["storage", "lls"];
    const ALL: [SecretKind; 2] = [SecretKind::Storage, SecretKind::Lls];

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "storage" => Some(Self::Storage),
            "lls" => Some(Self::Lls),
            _ => None,
        }
    }

    fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::Storage => &STORAGE_SECRET_KEYS,
            Self::Lls => &LLS_SECRET_KEYS,
        }
    }

    /// Tag reported on each listed item.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Storage => "s3",
            Self::Lls => "lls",
        }
    }

    fn matches(self, secret: &Secret) -> bool {
        secret.has_keys_ignore_case(self.required_keys())
    }
}

/// A secret as listed to the browser. Values never leave the server.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SecretItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl SecretItem {
    fn new(secret: Secret, kind: SecretKind) -> Self {
        let display_name = secret
            .metadata
            .annotations
            .get(DISPLAY_NAME_ANNOTATION)
            .filter(|v| !v.trim().is_empty())
            .cloned();
        Self {
            name: secret.metadata.name,
            namespace: secret.metadata.namespace,
            kind: kind.tag().to_string(),
            display_name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SecretsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Keeps the secrets matching any of `kinds`, tagged with the first kind
/// they match, then applies `offset`/`limit`.
pub fn filter_secrets(
    secrets: Vec<Secret>,
    kinds: &[SecretKind],
    offset: usize,
    limit: Option<usize>,
) -> Vec<SecretItem> {
    secrets
        .into_iter()
        .filter_map(|secret| {
            let kind = kinds.iter().copied().find(|k| k.matches(&secret))?;
            Some(SecretItem::new(secret, kind))
        })
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Lists credential secrets in the `resource` namespace. Without `type`,
/// both storage and GenAI credentials are returned.
pub async fn list_secrets(
    KubeClient(client): KubeClient,
    namespace: Namespace,
    QueryParams(query): QueryParams<SecretsQuery>,
) -> Result<Json<Envelope<Vec<SecretItem>>>> {
    let mut errors = FieldErrors::new();
    let kinds: Vec<SecretKind> = match query.kind.as_deref().filter(|v| !v.trim().is_empty()) {
        Some(raw) => match SecretKind::parse(raw) {
            Some(kind) => vec![kind],
            None => {
                errors.push(FieldError::not_supported("query.type", raw, &SecretKind::NAMES));
                Vec::new()
            }
        },
        None => SecretKind::ALL.to_vec(),
    };
    let limit = parse_bounded(&mut errors, "query.limit", query.limit.as_deref(), 0, i64::MAX);
    let offset = parse_bounded(&mut errors, "query.offset", query.offset.as_deref(), 0, i64::MAX);
    errors.into_result()?;

    let secrets = client.list_secrets(namespace.as_str()).await?;
    let total = secrets.len();
    let items = filter_secrets(
        secrets,
        &kinds,
        offset.unwrap_or(0) as usize,
        limit.map(|l| l as usize),
    );
    debug!(namespace = namespace.as_str(), total, matched = items.len(), "Secrets filtered");
    Ok(ok(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::kubernetes_mock::mock_secret;

    fn fixture() -> Vec<Secret> {
        vec![
            mock_secret(
                "ns-a",
                "aws-full",
                &[
                    ("aws_access_key_id", "AKIA"),
                    ("aws_secret_access_key", "secret"),
                    ("aws_region_name", "us-east-1"),
                    ("endpoint_url", "http://minio:9000"),
                ],
            ),
            mock_secret(
                "ns-a",
                "aws-partial",
                &[
                    ("aws_access_key_id", "AKIA"),
                    ("aws_secret_access_key", "secret"),
                    ("aws_region_name", "us-east-1"),
                ],
            ),
            mock_secret("ns-a", "unrelated", &[("password", "x")]),
            mock_secret(
                "ns-a",
                "lls-upper",
                &[
                    ("llama_stack_client_api_key", "k"),
                    ("LLAMA_STACK_CLIENT_BASE_URL", "http://lsd:8321"),
                ],
            ),
        ]
    }

    #[test]
    fn storage_requires_all_four_keys() {
        let items = filter_secrets(fixture(), &[SecretKind::Storage], 0, None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "aws-full");
        assert_eq!(items[0].kind, "s3");
    }

    #[test]
    fn lls_keys_match_case_insensitively() {
        let items = filter_secrets(fixture(), &[SecretKind::Lls], 0, None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, "lls");
    }

    #[test]
    fn untyped_listing_returns_both_kinds() {
        let items = filter_secrets(fixture(), &SecretKind::ALL, 0, None);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["aws-full", "lls-upper"]);
    }

    #[test]
    fn offset_and_limit_apply_after_filtering() {
        let items = filter_secrets(fixture(), &SecretKind::ALL, 1, Some(5));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "lls-upper");
        assert!(filter_secrets(fixture(), &SecretKind::ALL, 0, Some(0)).is_empty());
    }

    #[test]
    fn empty_result_serializes_as_array() {
        let items = filter_secrets(Vec::new(), &SecretKind::ALL, 0, None);
        let json = serde_json::to_value(Envelope { data: items }).unwrap();
        assert_eq!(json["data"], serde_json::json!([]));
    }

    #[test]
    fn values_are_not_listed() {
        let items = filter_secrets(fixture(), &[SecretKind::Storage], 0, None);
        let json = serde_json::to_string(&items).unwrap();
        assert!(!json.contains("AKIA"));
        assert!(!json.contains("data"));
    }
}
