use crate::config::types::{
    Config, CrawlerConfig, EndpointConfig, IdentityEntry, OutputConfig, PathsConfig,
    RelayCredentials,
};
use crate::ConfigError;
use reqwest::header::HeaderValue;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_endpoint_config(&config.endpoint)?;
    validate_paths_config(&config.paths)?;
    validate_output_config(&config.output)?;
    if let Some(relay) = &config.relay {
        validate_relay(relay)?;
    }
    validate_identities(&config.identities)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.max_segments < 1 {
        return Err(ConfigError::Validation(format!(
            "max_segments must be >= 1, got {}",
            config.max_segments
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    let rate = config.effective_rate();
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "rate_limit must be a positive number, got {}",
            rate
        )));
    }

    Ok(())
}

/// Validates the upstream endpoint
fn validate_endpoint_config(config: &EndpointConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if !config.segment_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "segment_path must start with '/', got '{}'",
            config.segment_path
        )));
    }

    Ok(())
}

fn validate_paths_config(config: &PathsConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("catalog", &config.catalog),
        ("data_dir", &config.data_dir),
        ("checkpoint", &config.checkpoint),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates relay credentials once, so the proxy never has to be rebuilt per request
fn validate_relay(relay: &RelayCredentials) -> Result<(), ConfigError> {
    if relay.host.is_empty() {
        return Err(ConfigError::Validation(
            "relay host cannot be empty".to_string(),
        ));
    }

    if relay.host.contains(['/', '@', ':']) {
        return Err(ConfigError::Validation(format!(
            "relay host must be a bare host name, got '{}'",
            relay.host
        )));
    }

    if relay.port == 0 {
        return Err(ConfigError::Validation(
            "relay port must be non-zero".to_string(),
        ));
    }

    if relay.username.is_empty() {
        return Err(ConfigError::Validation(
            "relay username cannot be empty".to_string(),
        ));
    }

    Url::parse(&relay.proxy_url())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid relay address: {}", e)))?;

    Ok(())
}

fn validate_identities(identities: &[IdentityEntry]) -> Result<(), ConfigError> {
    for (i, entry) in identities.iter().enumerate() {
        if entry.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "identity #{} has an empty user-agent",
                i + 1
            )));
        }

        for value in [
            &entry.user_agent,
            &entry.referer,
            &entry.accept,
            &entry.accept_language,
            &entry.cache_control,
        ] {
            HeaderValue::from_str(value).map_err(|_| {
                ConfigError::InvalidHeader(format!("identity #{}: '{}'", i + 1, value))
            })?;
        }
    }
    Ok(())
}
