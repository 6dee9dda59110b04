use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KiraError;

pub const DEFAULT_LOOKUP_URL: &str = "https://www.ebi.ac.uk/ena/submit/drop-box/references";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Study,
    Sample,
    Run,
    Analysis,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Study => "study",
            ReferenceKind::Sample => "sample",
            ReferenceKind::Run => "run",
            ReferenceKind::Analysis => "analysis",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote metadata object a manifest value points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub kind: ReferenceKind,
    /// Archive accession of the object (ERS…, ERP…, ERR…, ERZ…).
    pub accession: String,
    /// Identifier written back into the manifest value.
    pub canonical_id: String,
    pub alias: Option<String>,
    pub scientific_name: Option<String>,
    pub tax_id: Option<u64>,
}

impl ResolvedReference {
    pub fn new(kind: ReferenceKind, accession: impl Into<String>) -> Self {
        let accession = accession.into();
        Self {
            kind,
            canonical_id: accession.clone(),
            accession,
            alias: None,
            scientific_name: None,
            tax_id: None,
        }
    }

    pub fn with_canonical_id(mut self, canonical_id: impl Into<String>) -> Self {
        self.canonical_id = canonical_id.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupErrorKind {
    NotFound,
    Auth,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupError {
    pub kind: LookupErrorKind,
    pub message: String,
}

impl LookupError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: LookupErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: LookupErrorKind::Auth,
            message: message.into(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self {
            kind: LookupErrorKind::System,
            message: message.into(),
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub trait MetadataLookup: Send + Sync {
    fn resolve(&self, kind: ReferenceKind, id: &str) -> Result<ResolvedReference, LookupError>;
}

#[derive(Debug, Clone)]
pub struct LookupCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct EnaHttpLookup {
    client: Client,
    base_url: String,
    credentials: Option<LookupCredentials>,
}

impl EnaHttpLookup {
    pub fn new(
        base_url: Option<&str>,
        credentials: Option<LookupCredentials>,
    ) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-submit/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::LookupHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| KiraError::LookupHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_LOOKUP_URL)
                .trim_end_matches('/')
                .to_string(),
            credentials,
        })
    }

    fn reference_url(&self, kind: ReferenceKind, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, kind.as_str(), id)
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, LookupError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(LookupError::system(err.to_string()));
                }
            }
        }
    }
}

impl MetadataLookup for EnaHttpLookup {
    fn resolve(&self, kind: ReferenceKind, id: &str) -> Result<ResolvedReference, LookupError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| LookupError::auth("no lookup credentials configured"))?;
        let url = self.reference_url(kind, id);
        let response = self.send_with_retries(|| {
            self.client
                .get(&url)
                .basic_auth(&credentials.username, Some(&credentials.password))
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LookupError::auth(format!(
                "invalid credentials for {}",
                credentials.username
            )));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::not_found(format!("unknown {kind}: {id}")));
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "reference lookup failed".to_string());
            return Err(LookupError::system(format!(
                "status {}: {message}",
                status.as_u16()
            )));
        }

        let raw: Value = response
            .json()
            .map_err(|err| LookupError::system(err.to_string()))?;
        extract_reference(kind, &raw)
            .ok_or_else(|| LookupError::system(format!("unexpected {kind} response for {id}")))
    }
}

/// Maps a drop-box reference response onto a [`ResolvedReference`].
///
/// Samples resolve to their BioSample id and studies to their BioProject id when
/// the archive reports one; runs and analyses keep their accession.
pub fn extract_reference(kind: ReferenceKind, raw: &Value) -> Option<ResolvedReference> {
    let accession = raw.get("id").and_then(|value| value.as_str())?;
    let secondary = match kind {
        ReferenceKind::Sample => raw.get("biosampleId"),
        ReferenceKind::Study => raw.get("bioProjectId"),
        ReferenceKind::Run | ReferenceKind::Analysis => None,
    }
    .and_then(|value| value.as_str())
    .filter(|value| !value.is_empty());

    let mut reference = ResolvedReference::new(kind, accession);
    if let Some(secondary) = secondary {
        reference = reference.with_canonical_id(secondary);
    }
    reference.alias = raw
        .get("alias")
        .and_then(|value| value.as_str())
        .map(|value| value.to_string());
    let organism = raw.get("organism");
    reference.scientific_name = organism
        .and_then(|value| value.get("scientificName"))
        .and_then(|value| value.as_str())
        .map(|value| value.to_string());
    reference.tax_id = organism
        .and_then(|value| value.get("taxId"))
        .and_then(|value| value.as_u64());
    Some(reference)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
