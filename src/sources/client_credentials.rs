use std::sync::Arc;
use std::time::Duration;
use std::{env, fs};

use anyhow::{anyhow, Result};
use http::header::ACCEPT;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace, warn};

use crate::config::issuer::{AuthStyle, CredentialValue, IssuerConfig};
use crate::error::TokenCacheError;
use crate::sources::{IssueCredential, IssuedToken};
use crate::utils::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HTTP_TIMEOUT_MS, GRANT_TYPE_CLIENT_CREDENTIALS,
};

/// OAuth2 client-credentials issuer.
///
/// Client id and secret are resolved on every call, so a deployment that
/// lacks them still starts and reports the problem per request.
#[derive(Debug, Clone)]
pub struct ClientCredentialsIssuer {
    config: Arc<IssuerConfig>,
    client: Client,
}

impl ClientCredentialsIssuer {
    pub fn new(config: IssuerConfig) -> Result<Self> {
        let timeout = config.timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS);
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout))
            .connect_timeout(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS.min(timeout)))
            .build()
            .map_err(|e| anyhow!("failed to build issuer HTTP client: {}", e))?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }
}

impl IssueCredential for ClientCredentialsIssuer {
    async fn issue(&self, subject: &str) -> Result<IssuedToken, TokenCacheError> {
        let client_id = resolve_credential(self.config.client_id.as_ref(), "client_id")?;
        let client_secret =
            SecretString::from(resolve_credential(self.config.client_secret.as_ref(), "client_secret")?);

        let mut form: Vec<(&str, String)> =
            vec![("grant_type", GRANT_TYPE_CLIENT_CREDENTIALS.to_owned())];
        let mut request = self
            .client
            .post(&self.config.url)
            .header(ACCEPT, "application/json");

        match self.config.auth_style {
            AuthStyle::Form => {
                form.push(("client_id", client_id.clone()));
                form.push(("client_secret", client_secret.expose_secret().to_owned()));
            }
            AuthStyle::Basic => {
                request = request.basic_auth(&client_id, Some(client_secret.expose_secret()));
            }
        }
        if let Some(scope) = &self.config.scope {
            form.push(("scope", scope.to_owned()));
        }

        debug!(subject = %subject, client_id = %client_id, url = %self.config.url, "requesting token from issuer");

        let response = request.form(&form).send().await.map_err(|e| {
            warn!(subject = %subject, error = %e, "issuer request failed");
            TokenCacheError::issuance(None, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_owned());
            warn!(subject = %subject, status = %status, "issuer rejected token request");
            // may echo credentials back, so trace only
            trace!(subject = %subject, body = %body, "issuer rejection body");
            return Err(TokenCacheError::issuance(
                Some(status.as_u16()),
                format!("issuer responded with {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TokenCacheError::issuance(Some(status.as_u16()), e.to_string()))?;
        serde_json::from_str::<IssuedToken>(&body).map_err(|e| {
            warn!(subject = %subject, error = %e, "issuer returned an unparsable token response");
            TokenCacheError::issuance(Some(status.as_u16()), format!("invalid token response: {}", e))
        })
    }
}

fn resolve_credential(value: Option<&CredentialValue>, field: &str) -> Result<String, TokenCacheError> {
    let value = value
        .ok_or_else(|| TokenCacheError::Configuration(format!("issuer {} is not configured", field)))?;

    let resolved = match value {
        CredentialValue::Literal { value } => value.to_owned(),
        CredentialValue::FromEnv { from_env } => env::var(from_env).map_err(|_| {
            TokenCacheError::Configuration(format!("issuer {}: env var '{}' is not set", field, from_env))
        })?,
        CredentialValue::FromFile { path } => fs::read_to_string(path)
            .map(|content| content.trim().to_string())
            .map_err(|e| {
                TokenCacheError::Configuration(format!("issuer {}: cannot read '{}': {}", field, path, e))
            })?,
    };

    if resolved.trim().is_empty() {
        return Err(TokenCacheError::Configuration(format!("issuer {} is empty", field)));
    }
    Ok(resolved)
}
