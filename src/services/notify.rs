//! Award notification delivery
//!
//! Granted awards carry a `notified_at` stamp that is set only after a
//! successful delivery, so each row is announced at most once. Delivery
//! failure leaves the row unstamped for the next pass; award persistence
//! is never affected by notification problems.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::adapters::{Notifier, PendingAwardNotice, PickemStore};
use crate::error::Result;

#[derive(Clone)]
pub struct AwardNotifier {
    store: PickemStore,
    notifier: Option<Arc<dyn Notifier>>,
}

impl AwardNotifier {
    pub fn new(store: PickemStore, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { store, notifier }
    }

    /// Deliver every unannounced award; returns how many went out.
    pub async fn deliver_pending(&self) -> Result<usize> {
        let Some(notifier) = &self.notifier else {
            debug!("no award webhook configured; skipping");
            return Ok(0);
        };

        let pending = self.store.awards_needing_notification().await?;
        let mut delivered = 0;
        for notice in pending {
            match notifier.send_text(&announcement(&notice)).await {
                Ok(()) => {
                    self.store
                        .mark_award_notified(notice.player_award_id, Utc::now())
                        .await?;
                    delivered += 1;
                }
                Err(e) => {
                    // Left unstamped; the next pass retries.
                    error!(
                        player_award_id = notice.player_award_id,
                        "award notification failed: {e}"
                    );
                }
            }
        }
        if delivered > 0 {
            info!(delivered, "award notifications sent");
        }
        Ok(delivered)
    }
}

fn announcement(notice: &PendingAwardNotice) -> String {
    format!(
        "🎉 Congratulations <@{}> — you earned **{}** (season {}, week {})!",
        notice.player_discord_id, notice.award_name, notice.season, notice.week_no
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announcement_mentions_player_and_award() {
        let notice = PendingAwardNotice {
            player_award_id: 1,
            player_discord_id: 12345,
            player_nick_name: "alpha".to_string(),
            award_name: "Won The Week".to_string(),
            season: 2025,
            week_no: 3,
        };
        let text = announcement(&notice);
        assert!(text.contains("<@12345>"));
        assert!(text.contains("Won The Week"));
        assert!(text.contains("week 3"));
    }
}
