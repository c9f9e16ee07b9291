//! S3 client configuration and creation.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use bf_error::Result;

/// Configuration for building the S3 client handle.
///
/// The client is constructed once by the orchestrating caller and passed
/// into every component that talks to the store; nothing in this crate
/// holds ambient credentials or a global client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// AWS region; falls back to the environment when unset
    pub region: Option<String>,

    /// Custom endpoint URL (for LocalStack or S3-compatible stores)
    pub endpoint: Option<String>,

    /// Explicit access key (optional; the default provider chain applies
    /// otherwise)
    pub access_key: Option<String>,

    /// Explicit secret key (optional)
    pub secret_key: Option<String>,

    /// AWS profile name (optional)
    pub profile: Option<String>,

    /// Per-operation timeout in seconds; 0 disables the timeout
    pub operation_timeout_secs: u64,
}

impl ClientConfig {
    /// Create a configuration with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set a custom endpoint (for LocalStack).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set explicit credentials.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set the AWS profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set the per-operation timeout in seconds.
    pub fn with_operation_timeout(mut self, secs: u64) -> Self {
        self.operation_timeout_secs = secs;
        self
    }
}

/// Create an S3 client from configuration.
///
/// Custom endpoints force path-style addressing, which is what LocalStack
/// and most S3-compatible stores expect.
pub async fn create_client(config: &ClientConfig) -> Result<Client> {
    use aws_config::Region;

    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        let credentials =
            aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "bf-store");
        loader = loader.credentials_provider(credentials);
    }

    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile);
    }

    if config.operation_timeout_secs > 0 {
        loader = loader.timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(Duration::from_secs(config.operation_timeout_secs))
                .build(),
        );
    }

    let aws_config = loader.load().await;

    let builder = aws_sdk_s3::config::Builder::from(&aws_config);
    let s3_config = if config.endpoint.is_some() {
        builder.force_path_style(true).build()
    } else {
        builder.build()
    };

    Ok(Client::from_conf(s3_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_region("eu-west-1")
            .with_endpoint("http://localhost:4566")
            .with_operation_timeout(60);

        assert_eq!(config.region, Some("eu-west-1".to_string()));
        assert_eq!(config.endpoint, Some("http://localhost:4566".to_string()));
        assert_eq!(config.operation_timeout_secs, 60);
    }

    #[test]
    fn test_client_config_credentials() {
        let config = ClientConfig::new().with_credentials("access", "secret");

        assert_eq!(config.access_key, Some("access".to_string()));
        assert_eq!(config.secret_key, Some("secret".to_string()));
        assert!(config.profile.is_none());
    }

    #[tokio::test]
    async fn test_create_client_offline() {
        // Client construction never touches the network
        let config = ClientConfig::new()
            .with_region("us-east-1")
            .with_credentials("test", "test")
            .with_endpoint("http://localhost:4566");

        assert!(create_client(&config).await.is_ok());
    }
}
