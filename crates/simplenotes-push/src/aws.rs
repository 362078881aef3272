//! AWS API Gateway (WebSocket APIs) management client with SigV4 auth.
//!
//! Sockets terminate at API Gateway; this process only sees connection ids.
//! Delivery and teardown go through the management API:
//!   POST   {endpoint}/@connections/{id}   body = envelope bytes
//!   DELETE {endpoint}/@connections/{id}
//!
//! Credentials come from the standard chain: `AWS_ACCESS_KEY_ID` /
//! `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`, then `~/.aws/credentials`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode, Url};
use sha2::{Digest, Sha256};
use simplenotes_core::config::ApiGatewayConfig;
use tracing::{debug, warn};

use crate::error::{PushError, Result};
use crate::gateway::PushGateway;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "execute-api";

/// AWS credentials resolved from the standard chain.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

pub struct ApiGatewayClient {
    client: reqwest::Client,
    endpoint: Url,
    region: String,
    credentials: AwsCredentials,
}

impl ApiGatewayClient {
    pub fn new(endpoint: &str, region: String, credentials: AwsCredentials) -> Result<Self> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| PushError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if endpoint.host_str().is_none() {
            return Err(PushError::InvalidEndpoint(format!("{endpoint}: missing host")));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            region,
            credentials,
        })
    }

    /// Build a client from config, resolving credentials from the standard chain.
    pub fn from_config(cfg: &ApiGatewayConfig) -> Result<Self> {
        let credentials = resolve_aws_credentials(cfg.profile.as_deref())?;
        Self::new(&cfg.endpoint, cfg.region.clone(), credentials)
    }

    fn connection_url(&self, connection_id: &str) -> Result<Url> {
        let raw = format!(
            "{}/@connections/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            uri_encode(connection_id)
        );
        Url::parse(&raw).map_err(|e| PushError::InvalidEndpoint(e.to_string()))
    }

    /// Sign and send one management API call.
    async fn send(&self, method: Method, connection_id: &str, body: &[u8]) -> Result<()> {
        let url = self.connection_url(connection_id)?;
        let headers = sign_request(
            method.as_str(),
            &url,
            body,
            &self.region,
            &self.credentials,
            Utc::now(),
        );

        let mut builder = self.client.request(method, url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let resp = builder.body(body.to_vec()).send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::GONE {
            return Err(PushError::Gone {
                connection_id: connection_id.to_string(),
            });
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PushError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PushGateway for ApiGatewayClient {
    async fn post_to_connection(&self, connection_id: &str, payload: &str) -> Result<()> {
        let result = self.send(Method::POST, connection_id, payload.as_bytes()).await;
        if let Err(ref e) = result {
            // usually the client already disconnected
            warn!(conn_id = %connection_id, error = %e, "failed to push to connection");
        }
        result
    }

    async fn delete_connection(&self, connection_id: &str) -> Result<()> {
        debug!(conn_id = %connection_id, "deleting gateway connection");
        self.send(Method::DELETE, connection_id, &[]).await
    }
}

// ── SigV4 helpers ────────────────────────────────────────────────────────────

/// Compute the SigV4 headers (`x-amz-date`, optional `x-amz-security-token`,
/// `Authorization`) for a request.
fn sign_request(
    method: &str,
    url: &Url,
    body: &[u8],
    region: &str,
    credentials: &AwsCredentials,
    now: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let host = match url.port() {
        Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_string(),
    };
    let payload_hash = hex::encode(Sha256::digest(body));

    let (canonical_headers, signed_headers) = match credentials.session_token {
        Some(ref token) => (
            format!("host:{host}\nx-amz-date:{amz_date}\nx-amz-security-token:{token}\n"),
            "host;x-amz-date;x-amz-security-token",
        ),
        None => (
            format!("host:{host}\nx-amz-date:{amz_date}\n"),
            "host;x-amz-date",
        ),
    };

    let canonical_request = format!(
        "{method}\n{}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
        canonical_path(url.path())
    );

    let credential_scope = format!("{date_stamp}/{region}/{SERVICE}/aws4_request");
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    let string_to_sign =
        format!("AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{canonical_hash}");

    let signing_key = derive_signing_key(
        &credentials.secret_access_key,
        &date_stamp,
        region,
        SERVICE,
    );
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));
    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        credentials.access_key_id, credential_scope, signed_headers, signature
    );

    let mut headers = vec![("x-amz-date", amz_date)];
    if let Some(ref token) = credentials.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }
    headers.push(("Authorization", authorization));
    headers
}

/// Non-S3 services sign the path with every segment encoded once more.
fn canonical_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// RFC 3986 encoding as SigV4 wants it: only unreserved bytes stay literal.
fn uri_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

// ── AWS credential resolution ────────────────────────────────────────────────

fn resolve_aws_credentials(profile: Option<&str>) -> Result<AwsCredentials> {
    if let (Ok(key_id), Ok(secret)) = (
        std::env::var("AWS_ACCESS_KEY_ID"),
        std::env::var("AWS_SECRET_ACCESS_KEY"),
    ) {
        return Ok(AwsCredentials {
            access_key_id: key_id,
            secret_access_key: secret,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        });
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let cred_path = format!("{home}/.aws/credentials");
    let content = std::fs::read_to_string(&cred_path).map_err(|_| {
        PushError::Credentials(
            "set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or configure ~/.aws/credentials".into(),
        )
    })?;

    parse_aws_credentials_file(&content, profile.unwrap_or("default"))
}

fn parse_aws_credentials_file(content: &str, profile: &str) -> Result<AwsCredentials> {
    let mut in_profile = false;
    let mut key_id = None;
    let mut secret = None;
    let mut session_token = None;

    for line in content.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = name.trim() == profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().to_string();
            match k.trim() {
                "aws_access_key_id" => key_id = Some(v),
                "aws_secret_access_key" => secret = Some(v),
                "aws_session_token" => session_token = Some(v),
                _ => {}
            }
        }
    }

    match (key_id, secret) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(AwsCredentials {
            access_key_id,
            secret_access_key,
            session_token,
        }),
        _ => Err(PushError::Credentials(format!(
            "profile '{profile}' not found or incomplete in ~/.aws/credentials"
        ))),
    }
}
