// src/middleware/mod.rs

//! Request pipeline: recovery, telemetry and CORS wrap the whole router;
//! identity, namespace, authorization and upstream attachment are per route group.

pub mod authorize;
pub mod cors;
pub mod identity;
pub mod namespace;
pub mod recovery;
pub mod request_size_limit;
pub mod upstream;

pub use authorize::{authorize, AccessRule, Gate};
pub use cors::cors_layer;
pub use identity::attach_identity;
pub use namespace::{require_namespace, require_resource_namespace, Namespace};
pub use recovery::recovery_layer;
pub use request_size_limit::{content_length_limit, JSON_BODY_LIMIT, MULTIPART_FIELDS_LIMIT};
pub use upstream::{attach_genai, attach_kubernetes, GenAi, KubeClient};
