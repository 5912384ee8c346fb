//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks logging / retry / server / metrics invariants
//! - Checks issuer url, timeout and credential source shapes
//!
//! Missing client credentials are deliberately not an error here: they are
//! reported per issuance call.

use tracing::{error, info};

use crate::config::issuer::{CredentialValue, IssuerConfig, ServiceConfig};
use crate::config::settings::{MetricsConfig, RetryConfig, ServerConfig, SettingsConfig};
use crate::observability::metrics::get_metrics;
use crate::utils::constants::{HEALTH_PATH, RESERVED_PATH_PREFIXES};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_issuer(&cfg.issuer, &mut errors);

    if errors.is_empty() {
        info!("config is valid");
        Ok(())
    } else {
        let metrics = get_metrics().await;
        metrics.config_validation_errors.inc_by(errors.len() as u64);
        for e in &errors {
            error!("config validation: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }
    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }
    validate_server(&settings.server, errors);
    validate_metrics(&settings.metrics, errors);
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("settings.retry.attempts must be >= 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_server(server: &ServerConfig, errors: &mut Vec<String>) {
    if server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if server.port.parse::<u16>().is_err() {
        errors.push(format!("settings.server.port '{}' is not a valid port", server.port));
    }
}

fn validate_metrics(metrics: &MetricsConfig, errors: &mut Vec<String>) {
    if !metrics.is_enabled {
        return;
    }
    if !metrics.path.starts_with('/') {
        errors.push(format!("settings.metrics.path '{}' must start with '/'", metrics.path));
    }
    if metrics.path == HEALTH_PATH
        || RESERVED_PATH_PREFIXES
            .iter()
            .any(|prefix| metrics.path.starts_with(prefix))
    {
        errors.push(format!(
            "settings.metrics.path '{}' collides with a token route",
            metrics.path
        ));
    }
}

fn validate_issuer(issuer: &IssuerConfig, errors: &mut Vec<String>) {
    if !(issuer.url.starts_with("http://") || issuer.url.starts_with("https://")) {
        errors.push(format!("issuer.url '{}' must be an http(s) url", issuer.url));
    }
    if issuer.timeout_ms == Some(0) {
        errors.push("issuer.timeout_ms must be > 0".to_string());
    }
    if issuer.scope.as_deref().is_some_and(|scope| scope.trim().is_empty()) {
        errors.push("issuer.scope must not be empty when set".to_string());
    }
    for (field, value) in [
        ("client_id", issuer.client_id.as_ref()),
        ("client_secret", issuer.client_secret.as_ref()),
    ] {
        match value {
            Some(CredentialValue::FromEnv { from_env }) if from_env.trim().is_empty() => {
                errors.push(format!("issuer.{}.from_env must name a variable", field))
            }
            Some(CredentialValue::FromFile { path }) if path.trim().is_empty() => {
                errors.push(format!("issuer.{}.path must not be empty", field))
            }
            _ => {}
        }
    }
}
