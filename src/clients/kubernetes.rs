// src/clients/kubernetes.rs

//! Kubernetes capability set used by the request pipeline, and its REST
//! implementation against the apiserver.

use crate::config::DiscoveryConfig;
use crate::error::{KubeError, KubeErrorKind};
use crate::validation::{FieldError, FieldErrorType};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    pub metadata: ObjectMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: ObjectMeta,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
    /// Base64-encoded values, as returned by the apiserver.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Secret {
    /// True when every key in `required` is present, compared ASCII-case-insensitively.
    pub fn has_keys_ignore_case(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|want| self.data.keys().any(|k| k.eq_ignore_ascii_case(want)))
    }

    /// Decoded value for `key` (case-insensitive lookup).
    pub fn value_ignore_case(&self, key: &str) -> Option<String> {
        let (_, encoded) = self.data.iter().find(|(k, _)| k.eq_ignore_ascii_case(key))?;
        let bytes = STANDARD.decode(encoded.trim()).ok()?;
        String::from_utf8(bytes).ok().map(|s| s.trim().to_string())
    }
}

/// A custom resource instance. Only the name and status URL are interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomResource {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: Value,
}

impl CustomResource {
    pub fn service_url(&self) -> Option<&str> {
        self.status
            .get("serviceURL")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Group/version/plural of a custom resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKind {
    pub group: String,
    pub version: String,
    pub plural: String,
}

impl From<&DiscoveryConfig> for ResourceKind {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            group: config.group.clone(),
            version: config.version.clone(),
            plural: config.plural.clone(),
        }
    }
}

/// Question put to the apiserver: may the subject `verb` `group/resource` in `namespace`?
///
/// Without a `user` the review is self-scoped to the client's own token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessReview {
    pub namespace: String,
    pub verb: String,
    pub group: String,
    pub resource: String,
    pub user: Option<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[async_trait]
pub trait KubernetesClient: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, KubeError>;

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, KubeError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, KubeError>;

    async fn list_custom_resources(
        &self,
        kind: &ResourceKind,
        namespace: &str,
    ) -> Result<Vec<CustomResource>, KubeError>;

    /// Returns the review decision; apiserver refusals surface as errors.
    async fn subject_access_review(&self, review: &AccessReview) -> Result<bool, KubeError>;

    /// Username the apiserver associates with the client's credentials.
    async fn current_user(&self) -> Result<String, KubeError>;
}

const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";

/// Service accounts are shown by their short name, other users unchanged.
pub fn display_username(username: &str) -> &str {
    match username.strip_prefix(SERVICE_ACCOUNT_PREFIX) {
        Some(rest) => rest.split_once(':').map_or(rest, |(_, name)| name),
        None => username,
    }
}

/// apiserver `Status` failure body.
#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    details: Option<StatusDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusDetails {
    #[serde(default)]
    causes: Vec<StatusCause>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusCause {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    field: String,
}

fn status_error(http_status: u16, body: &str) -> KubeError {
    let parsed: StatusBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code.unwrap_or(http_status);
    let kind = KubeErrorKind::classify(parsed.reason.as_deref(), code);
    let message = if parsed.message.is_empty() {
        format!("apiserver returned status {http_status}")
    } else {
        parsed.message
    };
    let causes = parsed
        .details
        .map(|d| {
            d.causes
                .into_iter()
                .map(|c| FieldError::new(FieldErrorType::from_reason(&c.reason), c.field, c.message))
                .collect()
        })
        .unwrap_or_default();
    KubeError {
        kind,
        code,
        message,
        causes,
    }
}

/// REST client bound to one bearer token.
pub struct RestKubernetesClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl RestKubernetesClient {
    pub fn new(http: Client, base_url: Url, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url,
            token: token.into(),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, KubeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KubeError::transport("apiserver URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, KubeError> {
        let response = builder
            .send()
            .await
            .map_err(|e| KubeError::transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = status_error(status.as_u16(), &body);
            debug!(status = status.as_u16(), reason = ?err.kind, "apiserver request failed");
            return Err(err);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| KubeError::transport(format!("invalid apiserver response: {e}")))
    }
}

#[async_trait]
impl KubernetesClient for RestKubernetesClient {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, KubeError> {
        let url = self.url(&["api", "v1", "namespaces"])?;
        let list: ObjectList<Namespace> = self.send(self.request(Method::GET, url)).await?;
        Ok(list.items)
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, KubeError> {
        let url = self.url(&["api", "v1", "namespaces", namespace, "secrets"])?;
        let list: ObjectList<Secret> = self.send(self.request(Method::GET, url)).await?;
        Ok(list.items)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, KubeError> {
        let url = self.url(&["api", "v1", "namespaces", namespace, "secrets", name])?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn list_custom_resources(
        &self,
        kind: &ResourceKind,
        namespace: &str,
    ) -> Result<Vec<CustomResource>, KubeError> {
        let url = self.url(&[
            "apis",
            kind.group.as_str(),
            kind.version.as_str(),
            "namespaces",
            namespace,
            kind.plural.as_str(),
        ])?;
        let list: ObjectList<CustomResource> = self.send(self.request(Method::GET, url)).await?;
        Ok(list.items)
    }

    async fn subject_access_review(&self, review: &AccessReview) -> Result<bool, KubeError> {
        let attributes = json!({
            "namespace": review.namespace,
            "verb": review.verb,
            "group": review.group,
            "resource": review.resource,
        });
        let (kind, plural, spec) = match &review.user {
            Some(user) => (
                "SubjectAccessReview",
                "subjectaccessreviews",
                json!({ "user": user, "groups": review.groups, "resourceAttributes": attributes }),
            ),
            None => (
                "SelfSubjectAccessReview",
                "selfsubjectaccessreviews",
                json!({ "resourceAttributes": attributes }),
            ),
        };
        let body = json!({
            "apiVersion": "authorization.k8s.io/v1",
            "kind": kind,
            "spec": spec,
        });
        let url = self.url(&["apis", "authorization.k8s.io", "v1", plural])?;
        let response: Value = self
            .send(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(response
            .pointer("/status/allowed")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn current_user(&self) -> Result<String, KubeError> {
        let body = json!({
            "apiVersion": "authentication.k8s.io/v1",
            "kind": "SelfSubjectReview",
        });
        let url = self.url(&["apis", "authentication.k8s.io", "v1", "selfsubjectreviews"])?;
        let response: Value = self
            .send(self.request(Method::POST, url).json(&body))
            .await?;
        let username = response
            .pointer("/status/userInfo/username")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if username.is_empty() {
            return Err(KubeError::new(
                KubeErrorKind::Other,
                500,
                "self subject review returned no username",
            ));
        }
        Ok(display_username(username).to_string())
    }
}
