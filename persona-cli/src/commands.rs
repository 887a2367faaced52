//! CLI command implementations
//!
//! Each command builds an [`IdentityProvider`] from the configuration file,
//! runs one operation and closes the session backing again.

use anyhow::{anyhow, bail, Context, Result};
use persona_auth::{CertificateRequest, CheckSessionRequest, IdentityProvider, IdpConfig};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

async fn load_provider(config_path: &Path) -> Result<IdentityProvider> {
    let config = IdpConfig::load(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    debug!(issuer = %config.issuer, delegated = config.is_delegated(), "Loaded configuration");

    IdentityProvider::from_config(config)
        .await
        .context("Failed to start identity provider")
}

/// Parse a public key given inline as JSON or as `@path`
pub fn parse_public_key(argument: &str) -> Result<BTreeMap<String, String>> {
    let json = match argument.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read public key from {}", path))?,
        None => argument.to_string(),
    };

    serde_json::from_str(&json)
        .map_err(|e| anyhow!("Public key must be a JSON object of strings: {}", e))
}

/// Execute support-document command
pub async fn execute_support_document(config_path: &Path) -> Result<String> {
    let provider = load_provider(config_path).await?;
    let document = String::from_utf8(provider.support_document().to_vec())
        .context("Support document is not valid UTF-8");
    provider.close().await?;
    document
}

/// Execute issue command
///
/// # Arguments
/// * `config_path` - Configuration file
/// * `email` - Email address to certify
/// * `public_key` - Inline JSON or `@path`
/// * `duration` - Requested validity in seconds
/// * `require_session` - Refuse without a live session
pub async fn execute_issue(
    config_path: &Path,
    email: String,
    public_key: &str,
    duration: i64,
    require_session: bool,
) -> Result<String> {
    let public_key = parse_public_key(public_key)?;
    let provider = load_provider(config_path).await?;

    let request = CertificateRequest {
        email,
        public_key,
        duration,
    };
    let result = issue(&provider, &request, require_session).await;
    provider.close().await?;

    let token = result?;
    info!(email = %request.email, "Issued identity certificate");
    Ok(token)
}

async fn issue(
    provider: &IdentityProvider,
    request: &CertificateRequest,
    require_session: bool,
) -> Result<String> {
    if require_session {
        let check = CheckSessionRequest {
            email: request.email.clone(),
        };
        let live = provider
            .check_session(&check)
            .await
            .context("Failed to check session")?;
        if !live {
            bail!("{} has no live session", request.email);
        }
    }

    provider
        .generate_certificate(request)
        .context("Failed to issue identity certificate")
}

/// Execute create-session command
pub async fn execute_create_session(config_path: &Path, email: &str, duration: i64) -> Result<()> {
    let provider = load_provider(config_path).await?;
    let result = provider
        .create_session(email, duration)
        .await
        .with_context(|| format!("Failed to create session for {}", email));
    provider.close().await?;

    result?;
    info!(email = %email, duration, "Created session");
    Ok(())
}

/// Execute check-session command
pub async fn execute_check_session(config_path: &Path, email: String) -> Result<bool> {
    let provider = load_provider(config_path).await?;
    let result = provider
        .check_session(&CheckSessionRequest { email })
        .await
        .context("Failed to check session");
    provider.close().await?;
    result
}
