//! Postal code (CEP) lookup.
//!
//! The field validator only needs to know whether a CEP exists. The lookup is
//! a trait so the pipeline can run against the public ViaCEP service, a
//! compatible mirror (`VIACEP_URL`), or a fixed answer in tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadastro::cep::{CepLookup, ViaCepClient};
//!
//! let client = ViaCepClient::from_env();
//! let outcome = client.lookup("01310100").await;
//! assert!(outcome.is_found());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::future::Future;

use crate::error::LookupError;

/// Public ViaCEP endpoint
pub const DEFAULT_VIACEP_URL: &str = "https://viacep.com.br/ws";

/// Address returned by a successful lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub cep: String,
    pub logradouro: String,
    pub complemento: String,
    pub bairro: String,
    pub localidade: String,
    pub uf: String,
    pub ibge: String,
    pub ddd: String,
}

/// Result of looking up one CEP.
#[derive(Debug)]
pub enum CepOutcome {
    /// The service knows this CEP.
    Found(Address),
    /// The service answered that the CEP does not exist.
    NotFound,
    /// The request or the response was unusable.
    Failed(LookupError),
}

impl CepOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, CepOutcome::Found(_))
    }

    pub fn address(&self) -> Option<&Address> {
        match self {
            CepOutcome::Found(address) => Some(address),
            _ => None,
        }
    }
}

/// A postal code lookup service.
pub trait CepLookup: Send + Sync {
    /// Look up a CEP given as 8 digits.
    fn lookup(&self, cep: &str) -> impl Future<Output = CepOutcome> + Send;
}

/// ViaCEP HTTP client
#[derive(Clone)]
pub struct ViaCepClient {
    client: reqwest::Client,
    base_url: String,
}

impl ViaCepClient {
    /// Create a client for an explicit base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a client from environment variable VIACEP_URL
    pub fn from_env() -> Self {
        // Try loading .env file
        let _ = dotenvy::dotenv();

        let base_url = env::var("VIACEP_URL").unwrap_or_else(|_| DEFAULT_VIACEP_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, cep: &str) -> String {
        format!("{}/{}/json/", self.base_url.trim_end_matches('/'), cep)
    }

    async fn fetch(&self, cep: &str) -> Result<(u16, String), LookupError> {
        let response = self
            .client
            .get(self.url(cep))
            .send()
            .await
            .map_err(|e| LookupError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| LookupError::Request(e.to_string()))?;

        Ok((status, body))
    }
}

impl CepLookup for ViaCepClient {
    async fn lookup(&self, cep: &str) -> CepOutcome {
        match self.fetch(cep).await {
            Ok((status, body)) => interpret_response(status, &body),
            Err(e) => CepOutcome::Failed(e),
        }
    }
}

/// Classify a ViaCEP answer.
///
/// Only a 2xx JSON object without an `erro` key counts as found.
pub fn interpret_response(status: u16, body: &str) -> CepOutcome {
    if !(200..300).contains(&status) {
        return CepOutcome::Failed(LookupError::Status(status));
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return CepOutcome::Failed(LookupError::InvalidBody(e.to_string())),
    };

    match value {
        Value::Object(ref obj) if obj.contains_key("erro") => CepOutcome::NotFound,
        Value::Object(_) => match serde_json::from_value::<Address>(value) {
            Ok(address) => CepOutcome::Found(address),
            Err(e) => CepOutcome::Failed(LookupError::InvalidBody(e.to_string())),
        },
        other => CepOutcome::Failed(LookupError::InvalidBody(format!("expected object, got {}", other))),
    }
}
