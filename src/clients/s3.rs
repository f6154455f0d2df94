// src/clients/s3.rs

//! Object-store reads: path-style `GetObject` signed with AWS Signature V4.

use super::kubernetes::Secret;
use super::ByteStream;
use crate::error::S3Error;
use crate::validation::FieldError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const EMPTY_PAYLOAD_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub const KEY_ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const KEY_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const KEY_REGION: &str = "aws_region_name";
pub const KEY_ENDPOINT: &str = "endpoint_url";

/// Keys a secret must carry to be usable as object-store credentials.
pub const STORAGE_SECRET_KEYS: [&str; 4] =
    [KEY_ACCESS_KEY_ID, KEY_SECRET_ACCESS_KEY, KEY_REGION, KEY_ENDPOINT];

#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint_url: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish_non_exhaustive()
    }
}

impl S3Credentials {
    /// Reads the four credential keys (case-insensitive) from a secret.
    pub fn from_secret(secret: &Secret) -> Result<Self, Vec<FieldError>> {
        let mut missing = Vec::new();
        let mut read = |key: &str| {
            secret.value_ignore_case(key).filter(|v| !v.is_empty()).unwrap_or_else(|| {
                missing.push(FieldError::required(format!("secret.data.{key}")));
                String::new()
            })
        };
        let credentials = Self {
            access_key_id: read(KEY_ACCESS_KEY_ID),
            secret_access_key: read(KEY_SECRET_ACCESS_KEY),
            region: read(KEY_REGION),
            endpoint_url: read(KEY_ENDPOINT),
        };
        if missing.is_empty() {
            Ok(credentials)
        } else {
            Err(missing)
        }
    }
}

/// Streamed object body plus the metadata forwarded to the browser.
pub struct ObjectStream {
    pub content_type: Option<String>,
    pub body: ByteStream,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream, S3Error>;
}

/// Percent-encodes everything outside the SigV4 unreserved set.
fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn hmac(key: &[u8], data: &str) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// SigV4 `Authorization` header value.
///
/// `headers` must be lowercase names sorted by name, and include `host`,
/// `x-amz-content-sha256` and `x-amz-date`.
pub fn sign_v4(
    credentials: &S3Credentials,
    method: &str,
    canonical_uri: &str,
    headers: &[(&str, &str)],
    payload_hash: &str,
    at: DateTime<Utc>,
) -> String {
    let amz_date = at.format("%Y%m%dT%H%M%SZ").to_string();
    let date = at.format("%Y%m%d").to_string();
    let scope = format!("{date}/{}/s3/aws4_request", credentials.region);

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");
    let canonical_request =
        format!("{method}\n{canonical_uri}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}");

    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        sha256_hex(&canonical_request)
    );

    let k_date = hmac(format!("AWS4{}", credentials.secret_access_key).as_bytes(), &date);
    let k_region = hmac(&k_date, &credentials.region);
    let k_service = hmac(&k_region, "s3");
    let k_signing = hmac(&k_service, "aws4_request");
    let signature = hex::encode(hmac(&k_signing, &string_to_sign));

    format!(
        "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    )
}

pub struct S3Client {
    http: Client,
    credentials: S3Credentials,
}

impl S3Client {
    pub fn new(http: Client, credentials: S3Credentials) -> Self {
        Self { http, credentials }
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<(Url, String), S3Error> {
        let canonical_uri = std::iter::once(bucket)
            .chain(key.split('/'))
            .map(uri_encode)
            .fold(String::new(), |mut acc, segment| {
                acc.push('/');
                acc.push_str(&segment);
                acc
            });
        let base = self.credentials.endpoint_url.trim_end_matches('/');
        let url = Url::parse(&format!("{base}{canonical_uri}")).map_err(|e| S3Error {
            status: 0,
            body: format!("invalid endpoint URL: {e}"),
        })?;
        let canonical_uri = url.path().to_string();
        Ok((url, canonical_uri))
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectStream, S3Error> {
        let (url, canonical_uri) = self.object_url(bucket, key)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(S3Error {
                    status: 0,
                    body: "endpoint URL has no host".to_string(),
                })
            }
        };
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let authorization = sign_v4(
            &self.credentials,
            "GET",
            &canonical_uri,
            &[
                ("host", &host),
                ("x-amz-content-sha256", EMPTY_PAYLOAD_SHA256),
                ("x-amz-date", &amz_date),
            ],
            EMPTY_PAYLOAD_SHA256,
            now,
        );

        let response = self
            .http
            .get(url)
            .header("x-amz-content-sha256", EMPTY_PAYLOAD_SHA256)
            .header("x-amz-date", &amz_date)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| S3Error {
                status: 0,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), bucket, "object store GetObject failed");
            return Err(S3Error {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(ObjectStream {
            content_type,
            body: Box::pin(body),
        })
    }
}
