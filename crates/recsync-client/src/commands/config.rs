//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret::SecretRef;

const REDACTED: &str = "<redacted>";

/// Returns a copy of `config` with literal secrets hidden.
///
/// `pass::`, `env::` and `file::` references are kept since they only name
/// where the secret lives.
pub fn redacted(config: &ClientConfig) -> ClientConfig {
    let mut config = config.clone();
    if let Some(ref mut secret) = config.oauth.client_secret {
        if !SecretRef::parse(secret).is_reference() {
            *secret = REDACTED.to_string();
        }
    }
    config
}

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&redacted(config))
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", config.source_path().display());
    println!("# ledger: {}", config.ledger_path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration without contacting the provider.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate().map_err(ClientError::Config)?;
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(config: &ClientConfig) -> ClientResult<()> {
    println!("config: {}", config.source_path().display());
    Ok(())
}
