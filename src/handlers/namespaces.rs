// src/handlers/namespaces.rs

use super::{ok, Envelope};
use crate::clients::kubernetes::Namespace;
use crate::error::Result;
use crate::middleware::KubeClient;
use axum::Json;
use serde::{Deserialize, Serialize};

pub const DISPLAY_NAME_ANNOTATION: &str = "openshift.io/display-name";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct NamespaceItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl From<Namespace> for NamespaceItem {
    fn from(ns: Namespace) -> Self {
        let display_name = ns
            .metadata
            .annotations
            .get(DISPLAY_NAME_ANNOTATION)
            .filter(|v| !v.trim().is_empty())
            .cloned();
        Self {
            name: ns.metadata.name,
            display_name,
        }
    }
}

/// Namespaces the caller's credentials can list.
pub async fn list_namespaces(KubeClient(client): KubeClient) -> Result<Json<Envelope<Vec<NamespaceItem>>>> {
    let namespaces = client.list_namespaces().await?;
    Ok(ok(namespaces.into_iter().map(NamespaceItem::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::kubernetes::ObjectMeta;

    #[test]
    fn display_name_comes_from_annotation() {
        let mut metadata = ObjectMeta {
            name: "team-a".into(),
            ..ObjectMeta::default()
        };
        metadata
            .annotations
            .insert(DISPLAY_NAME_ANNOTATION.into(), "Team A".into());
        let item = NamespaceItem::from(Namespace { metadata });
        assert_eq!(item.display_name.as_deref(), Some("Team A"));

        let bare = NamespaceItem::from(Namespace::default());
        assert!(bare.display_name.is_none());
        assert!(serde_json::to_value(&bare).unwrap().get("display_name").is_none());
    }
}
