// src/clients/kubernetes_mock.rs

//! In-memory cluster fixture used when `mock_k8s_client` is enabled.

use super::kubernetes::{
    AccessReview, CustomResource, KubernetesClient, Namespace, ObjectMeta, ResourceKind, Secret,
};
use crate::error::KubeError;
use crate::identity::{RequestIdentity, ANONYMOUS_USER};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Token that may do anything in the mock cluster.
pub const MOCK_ADMIN_TOKEN: &str = "T-admin";
/// Token limited to `MOCK_USER_NAMESPACE`.
pub const MOCK_USER_TOKEN: &str = "T-user";
/// Token the mock apiserver rejects as unauthenticated.
pub const MOCK_INVALID_TOKEN: &str = "T-invalid";
pub const MOCK_USER_NAMESPACE: &str = "ns-a";
pub const MOCK_SERVICE_URL: &str = "http://llama-stack-service.ns-a.svc.cluster.local:8321";

/// Fixture contents: namespaces, secrets, custom resources and who may list what.
#[derive(Debug, Default, Clone)]
pub struct MockCluster {
    pub namespaces: Vec<String>,
    pub secrets: HashMap<String, Vec<Secret>>,
    pub custom_resources: HashMap<String, Vec<CustomResource>>,
    /// Principals (token or user id) allowed everywhere.
    pub admins: HashSet<String>,
    /// Principal to the namespaces it may access.
    pub grants: HashMap<String, HashSet<String>>,
    /// Principals the apiserver answers with 401.
    pub rejected: HashSet<String>,
    /// Token to the username a self review reports. Unmapped principals report themselves.
    pub usernames: HashMap<String, String>,
}

fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: name.to_string(),
        namespace: namespace.map(str::to_string),
        ..ObjectMeta::default()
    }
}

/// Secret with base64 encoded values, as the apiserver would return it.
pub fn mock_secret(namespace: &str, name: &str, entries: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: meta(name, Some(namespace)),
        secret_type: Some("Opaque".to_string()),
        data: entries
            .iter()
            .map(|(k, v)| (k.to_string(), STANDARD.encode(v)))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn mock_custom_resource(namespace: &str, name: &str, service_url: Option<&str>) -> CustomResource {
    let status = match service_url {
        Some(url) => json!({ "phase": "Ready", "serviceURL": url }),
        None => json!({ "phase": "Initializing" }),
    };
    CustomResource {
        metadata: meta(name, Some(namespace)),
        status,
    }
}

impl MockCluster {
    /// Default fixture.
    ///
    /// * `ns-a`: one distribution with a service URL and three secrets
    ///   (complete S3 credentials, partial S3 credentials, unrelated).
    /// * `ns-b`: one distribution, not granted to `T-user`.
    /// * `ns-empty`: no distributions.
    /// * `ns-pending`: a distribution without a service URL.
    pub fn fixture() -> Self {
        let mut cluster = Self {
            namespaces: ["ns-a", "ns-b", "ns-empty", "ns-pending"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            ..Self::default()
        };

        cluster.secrets.insert(
            "ns-a".to_string(),
            vec![
                mock_secret(
                    "ns-a",
                    "aws-connection-models",
                    &[
                        ("aws_access_key_id", "AKIAMOCK"),
                        ("aws_secret_access_key", "mock-secret"),
                        ("aws_region_name", "us-east-1"),
                        ("endpoint_url", "http://minio.ns-a.svc:9000"),
                        ("aws_s3_bucket", "models"),
                    ],
                ),
                mock_secret(
                    "ns-a",
                    "aws-connection-partial",
                    &[
                        ("aws_access_key_id", "AKIAMOCK"),
                        ("aws_secret_access_key", "mock-secret"),
                        ("aws_region_name", "us-east-1"),
                    ],
                ),
                mock_secret("ns-a", "unrelated", &[("password", "hunter2")]),
            ],
        );
        cluster.secrets.insert(
            "ns-b".to_string(),
            vec![mock_secret(
                "ns-b",
                "llama-stack-credentials",
                &[
                    ("LLAMA_STACK_CLIENT_API_KEY", "key"),
                    ("LLAMA_STACK_CLIENT_BASE_URL", "http://lsd.ns-b.svc:8321"),
                ],
            )],
        );

        cluster.custom_resources.insert(
            "ns-a".to_string(),
            vec![mock_custom_resource("ns-a", "lsd-genai-playground", Some(MOCK_SERVICE_URL))],
        );
        cluster.custom_resources.insert(
            "ns-b".to_string(),
            vec![mock_custom_resource(
                "ns-b",
                "lsd-genai-playground",
                Some("http://llama-stack-service.ns-b.svc.cluster.local:8321"),
            )],
        );
        cluster.custom_resources.insert(
            "ns-pending".to_string(),
            vec![mock_custom_resource("ns-pending", "lsd-starting", None)],
        );

        cluster.admins.insert(MOCK_ADMIN_TOKEN.to_string());
        cluster.grants.insert(
            MOCK_USER_TOKEN.to_string(),
            HashSet::from([MOCK_USER_NAMESPACE.to_string()]),
        );
        cluster.rejected.insert(MOCK_INVALID_TOKEN.to_string());
        cluster
            .usernames
            .insert(MOCK_ADMIN_TOKEN.to_string(), "kube:admin".to_string());
        cluster
            .usernames
            .insert(MOCK_USER_TOKEN.to_string(), "user-a".to_string());
        cluster
    }

    fn may_access(&self, principal: &str, namespace: &str) -> bool {
        self.admins.contains(principal)
            || self
                .grants
                .get(principal)
                .is_some_and(|namespaces| namespaces.contains(namespace))
    }
}

/// Mock client bound to one caller.
pub struct MockKubernetesClient {
    cluster: Arc<MockCluster>,
    principal: Option<String>,
}

impl MockKubernetesClient {
    /// Binds to the identity's token, or its user id when there is no token.
    /// Anonymous callers act as cluster admin.
    pub fn new(cluster: Arc<MockCluster>, identity: &RequestIdentity) -> Self {
        let principal = if identity.is_anonymous() {
            None
        } else {
            identity.token.clone().or_else(|| identity.user_id.clone())
        };
        Self { cluster, principal }
    }

    fn check_authenticated(&self) -> Result<(), KubeError> {
        match &self.principal {
            Some(p) if self.cluster.rejected.contains(p) => {
                Err(KubeError::unauthorized("Unauthorized"))
            }
            _ => Ok(()),
        }
    }

    fn check_namespace(&self, namespace: &str, resource: &str) -> Result<(), KubeError> {
        self.check_authenticated()?;
        match &self.principal {
            Some(p) if !self.cluster.may_access(p, namespace) => Err(KubeError::forbidden(format!(
                "{resource} is forbidden: User cannot list resource \"{resource}\" in the namespace \"{namespace}\""
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KubernetesClient for MockKubernetesClient {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, KubeError> {
        self.check_authenticated()?;
        Ok(self
            .cluster
            .namespaces
            .iter()
            .filter(|ns| match &self.principal {
                Some(p) => self.cluster.may_access(p, ns),
                None => true,
            })
            .map(|ns| Namespace {
                metadata: meta(ns, None),
            })
            .collect())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, KubeError> {
        self.check_namespace(namespace, "secrets")?;
        Ok(self.cluster.secrets.get(namespace).cloned().unwrap_or_default())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, KubeError> {
        self.check_namespace(namespace, "secrets")?;
        self.cluster
            .secrets
            .get(namespace)
            .and_then(|secrets| secrets.iter().find(|s| s.metadata.name == name))
            .cloned()
            .ok_or_else(|| KubeError::not_found(format!("secrets \"{name}\" not found")))
    }

    async fn list_custom_resources(
        &self,
        kind: &ResourceKind,
        namespace: &str,
    ) -> Result<Vec<CustomResource>, KubeError> {
        self.check_namespace(namespace, &kind.plural)?;
        Ok(self
            .cluster
            .custom_resources
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn subject_access_review(&self, review: &AccessReview) -> Result<bool, KubeError> {
        self.check_authenticated()?;
        let subject = review.user.as_ref().or(self.principal.as_ref());
        Ok(match subject {
            Some(p) => self.cluster.may_access(p, &review.namespace),
            None => true,
        })
    }

    async fn current_user(&self) -> Result<String, KubeError> {
        self.check_authenticated()?;
        Ok(match &self.principal {
            Some(p) => self.cluster.usernames.get(p).unwrap_or(p).clone(),
            None => ANONYMOUS_USER.to_string(),
        })
    }
}
