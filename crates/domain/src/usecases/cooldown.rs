//! Per-platform rate-limit cooldowns that survive restarts

use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::model::Cooldown;
use crate::ports::{Clock, DocumentStore, StorageError};
use crate::state::StateFile;

/// Longest cooldown ever recorded, whatever the platform asks for
pub const MAX_COOLDOWN: std::time::Duration = std::time::Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
#[error("Failed to save cooldowns while {operation}: {source}")]
pub struct CooldownError {
    pub operation: String,
    #[source]
    pub source: StorageError,
}

pub struct CooldownBook {
    state: StateFile<Cooldown>,
    clock: Arc<dyn Clock>,
}

impl CooldownBook {
    pub async fn open(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: StateFile::open(store).await,
            clock,
        }
    }

    /// Active cooldown for `platform`, if it has not yet expired
    pub fn active(&self, platform: &str) -> Option<&Cooldown> {
        let now = self.clock.now();
        self.state
            .get(platform)
            .filter(|cooldown| cooldown.until > now)
    }

    /// Put `platform` on cooldown for `duration`, capped at
    /// [`MAX_COOLDOWN`]. Returns the expiry.
    pub async fn start(
        &mut self,
        platform: &str,
        duration: std::time::Duration,
        reason: &str,
    ) -> Result<OffsetDateTime, CooldownError> {
        let now = self.clock.now();
        let until = time::Duration::try_from(duration.min(MAX_COOLDOWN))
            .ok()
            .and_then(|length| now.checked_add(length))
            .unwrap_or(now);
        let cooldown = Cooldown {
            until,
            reason: reason.to_string(),
        };

        self.state
            .update(|entries| entries.insert(platform.to_string(), cooldown))
            .await
            .map_err(|source| CooldownError {
                operation: format!("starting cooldown for {}", platform),
                source,
            })?;

        tracing::warn!(platform = %platform, until = %until, reason = %reason, "Platform on cooldown");
        Ok(until)
    }

    /// Drop expired cooldowns; returns the platforms released
    pub async fn clear_expired(&mut self) -> Result<Vec<String>, CooldownError> {
        let now = self.clock.now();
        let expired: Vec<String> = self
            .state
            .entries()
            .iter()
            .filter(|(_, cooldown)| cooldown.until <= now)
            .map(|(platform, _)| platform.clone())
            .collect();

        if expired.is_empty() {
            return Ok(expired);
        }

        self.state
            .update(|entries| {
                for platform in &expired {
                    entries.remove(platform);
                }
            })
            .await
            .map_err(|source| CooldownError {
                operation: "clearing expired cooldowns".to_string(),
                source,
            })?;

        for platform in &expired {
            tracing::info!(platform = %platform, "Cooldown expired");
        }
        Ok(expired)
    }

    pub fn all(&self) -> &BTreeMap<String, Cooldown> {
        self.state.entries()
    }
}
