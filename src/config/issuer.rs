use serde::Deserialize;

use crate::config::settings::SettingsConfig;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    pub issuer: IssuerConfig,
}

/// ================================
/// Credential issuer
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct IssuerConfig {
    /// full token endpoint url
    pub url: String,
    /// resolved on every issuance; absence is reported at call time
    pub client_id: Option<CredentialValue>,
    pub client_secret: Option<CredentialValue>,
    #[serde(default)]
    pub auth_style: AuthStyle,
    pub scope: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl IssuerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_id: None,
            client_secret: None,
            auth_style: AuthStyle::default(),
            scope: None,
            timeout_ms: None,
        }
    }

    pub fn with_credentials(mut self, client_id: CredentialValue, client_secret: CredentialValue) -> Self {
        self.client_id = Some(client_id);
        self.client_secret = Some(client_secret);
        self
    }
}

/// Where a client credential comes from
#[derive(Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CredentialValue {
    Literal {
        value: String,
    },
    FromEnv {
        from_env: String,
    },
    FromFile {
        path: String,
    },
}

impl CredentialValue {
    pub fn literal(value: impl Into<String>) -> Self {
        CredentialValue::Literal { value: value.into() }
    }

    pub fn from_env(var: impl Into<String>) -> Self {
        CredentialValue::FromEnv { from_env: var.into() }
    }
}

// literals may hold secrets
impl std::fmt::Debug for CredentialValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialValue::Literal { .. } => f.write_str("Literal([REDACTED])"),
            CredentialValue::FromEnv { from_env } => write!(f, "FromEnv({from_env})"),
            CredentialValue::FromFile { path } => write!(f, "FromFile({path})"),
        }
    }
}

/// How client credentials travel to the issuer
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthStyle {
    /// `client_id` / `client_secret` form fields
    #[default]
    Form,
    /// HTTP Basic authorization header
    Basic,
}
