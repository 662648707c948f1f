//! Configuration validation.
//!
//! Problems are collected rather than returned one at a time so callers can
//! show the operator everything that needs fixing before any network call.

use super::{EndpointConfig, MigrationConfig, MigrationMode, MigrationOptions};

/// Collect every configuration problem for the given mode.
pub fn validate(config: &MigrationConfig, mode: MigrationMode) -> Vec<String> {
    let mut errors = Vec::new();

    check_endpoint("source", &config.source, &mut errors);

    if mode.needs_target() {
        match &config.target {
            Some(target) => {
                check_endpoint("target", target, &mut errors);
                if !config.source.url.is_empty()
                    && normalize_url(&config.source.url) == normalize_url(&target.url)
                {
                    errors.push("source and target cannot be the same project".into());
                }
            }
            None => {
                errors.push("target url is required".into());
                errors.push("target key is required".into());
            }
        }
    }

    if config.include_storage && mode.needs_target() {
        if config.source.service_key().is_none() {
            errors.push("source service key is required when storage migration is enabled".into());
        }
        let target_service = config.target.as_ref().and_then(|t| t.service_key());
        if target_service.is_none() {
            errors.push("target service key is required when storage migration is enabled".into());
        }
    }

    if let Some(bucket) = &config.storage_bucket {
        if bucket.trim().is_empty() {
            errors.push("storage bucket override cannot be empty".into());
        }
    }

    errors
}

/// Collect problems with per-run options.
pub fn validate_options(options: &MigrationOptions) -> Vec<String> {
    let mut errors = Vec::new();
    if options.batch_size == 0 {
        errors.push("batch size must be at least 1".into());
    }
    if !options.include_schema && !options.include_data && !options.include_storage {
        errors.push("no migration phase selected".into());
    }
    errors
}

/// Problems between a configuration and the options of one run.
///
/// Storage is switched on in both places; they must agree.
pub fn validate_selection(config: &MigrationConfig, options: &MigrationOptions) -> Vec<String> {
    let mut errors = Vec::new();
    match (config.include_storage, options.include_storage) {
        (true, false) => errors
            .push("storage migration is enabled in the config but not selected for this run".into()),
        (false, true) => errors
            .push("storage migration is selected for this run but not enabled in the config".into()),
        _ => {}
    }
    errors
}

fn check_endpoint(side: &str, endpoint: &EndpointConfig, errors: &mut Vec<String>) {
    let url = endpoint.url.trim();
    if url.is_empty() {
        errors.push(format!("{} url is required", side));
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!(
            "{} url must start with http:// or https://, got '{}'",
            side, url
        ));
    }
    if endpoint.anon_key.trim().is_empty() {
        errors.push(format!("{} key is required", side));
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}
