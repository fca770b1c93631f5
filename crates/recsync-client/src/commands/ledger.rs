//! Ledger inspection commands.

use recsync_core::MeetingId;
use recsync_engine::CompletionLedger;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Show the ledger file path.
pub fn path(config: &ClientConfig) -> ClientResult<()> {
    println!("ledger: {}", config.ledger_path().display());
    Ok(())
}

/// Print every completed recording ID in the order it was recorded.
pub fn list(config: &ClientConfig) -> ClientResult<()> {
    let ledger = CompletionLedger::open(config.ledger_path())?;
    for id in ledger.iter() {
        println!("{}", id);
    }
    Ok(())
}

/// Succeed if `id` is in the ledger.
pub fn contains(config: &ClientConfig, id: &str) -> ClientResult<()> {
    let ledger = CompletionLedger::open(config.ledger_path())?;
    check(&ledger, id)?;
    println!("{} is synchronized", id);
    Ok(())
}

fn check(ledger: &CompletionLedger, id: &str) -> ClientResult<()> {
    if ledger.is_complete(&MeetingId::new(id)) {
        Ok(())
    } else {
        Err(ClientError::NotFound(format!(
            "{} is not in {}",
            id,
            ledger.path().display()
        )))
    }
}
