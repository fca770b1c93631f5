//! The `users` command.

use chrono::Local;
use recsync_engine::SyncPlan;
use recsync_providers::{Owner, RecordingProvider};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Fetches the account's users and keeps the configured ones.
pub async fn selected_owners(
    provider: &dyn RecordingProvider,
    config: &ClientConfig,
) -> ClientResult<Vec<Owner>> {
    let range = config
        .date_range(None, None, Local::now().date_naive())
        .map_err(ClientError::Config)?;
    let plan = SyncPlan::new(range, config.recordings.window_days)
        .with_owners(config.users.include.iter().cloned());
    let owners = provider.list_owners().await?;
    Ok(plan.select_owners(owners))
}

/// Renders owners one per line, or as a JSON array.
pub fn render(owners: &[Owner], json: bool) -> String {
    if json {
        let values: Vec<_> = owners
            .iter()
            .map(|o| {
                serde_json::json!({
                    "id": o.id,
                    "email": o.email,
                    "display_name": o.display_name,
                })
            })
            .collect();
        return serde_json::Value::Array(values).to_string();
    }

    owners
        .iter()
        .map(|o| {
            if o.display_name.is_empty() || o.display_name == o.email {
                format!("{}\t{}", o.id, o.email)
            } else {
                format!("{}\t{}\t{}", o.id, o.email, o.display_name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs `recsync users`.
pub async fn users(config: &ClientConfig, json: bool) -> ClientResult<()> {
    let provider = super::connect(config).await?;
    let owners = selected_owners(&provider, config).await?;
    if owners.is_empty() && !json {
        println!("No users selected.");
    } else {
        println!("{}", render(&owners, json));
    }
    Ok(())
}
