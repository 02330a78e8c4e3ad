//! Kickoff reminders
//!
//! Fired by the reminder cascade before the week's first kickoff: finds
//! active players with no picks in yet and nudges them over the webhook.
//! Delivery failures are logged and never propagated.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::adapters::{Notifier, PickemStore};
use crate::domain::{Player, WeekInfo};
use crate::error::Result;

/// Humanize the time left before kickoff ("2 hours, 5 minutes")
pub fn format_time_to_kickoff(delta: Duration) -> String {
    let minutes = delta.num_minutes().max(0);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };
    match (hours, minutes) {
        (0, m) => plural(m, "minute"),
        (h, 0) => plural(h, "hour"),
        (h, m) => format!("{}, {}", plural(h, "hour"), plural(m, "minute")),
    }
}

/// Active players with no picks for the week
pub fn late_players(players: &[Player], picked_player_ids: &HashSet<i32>) -> Vec<Player> {
    players
        .iter()
        .filter(|player| player.id.is_some_and(|id| !picked_player_ids.contains(&id)))
        .cloned()
        .collect()
}

#[derive(Clone)]
pub struct ReminderService {
    store: PickemStore,
    notifier: Option<Arc<dyn Notifier>>,
    picks_url: Option<String>,
}

impl ReminderService {
    pub fn new(
        store: PickemStore,
        notifier: Option<Arc<dyn Notifier>>,
        picks_url: Option<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            picks_url,
        }
    }

    pub async fn send_kickoff_reminder(&self, week: WeekInfo) -> Result<()> {
        let Some(notifier) = &self.notifier else {
            debug!("no reminder webhook configured; skipping");
            return Ok(());
        };

        let players = self.store.active_players().await?;
        let picked: HashSet<i32> = self
            .store
            .picks_for_week(week)
            .await?
            .into_iter()
            .map(|pick| pick.player_id)
            .collect();
        let late = late_players(&players, &picked);
        if late.is_empty() {
            debug!(%week, "everyone has picks in; no reminder needed");
            return Ok(());
        }

        let first_kickoff = self.store.first_kickoff_of_week(week).await?;
        let message = self.build_message(&late, first_kickoff);
        info!(%week, late = late.len(), "sending kickoff reminder");
        if let Err(e) = notifier.send_text(&message).await {
            error!("kickoff reminder delivery failed: {e}");
        }
        Ok(())
    }

    fn build_message(&self, late: &[Player], first_kickoff: Option<DateTime<Utc>>) -> String {
        let mut message =
            String::from("This is your friendly reminder that picks are still missing from:\n");
        for player in late {
            message.push_str(&format!("• <@{}>\n", player.discord_id));
        }
        if let Some(url) = &self.picks_url {
            message.push_str(&format!("\nGet 'em in at {url}!"));
        }
        if let Some(kickoff) = first_kickoff {
            message.push_str(&format!(
                "\nKickoff of the first game is in {}!",
                format_time_to_kickoff(kickoff - Utc::now())
            ));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: i32) -> Player {
        Player {
            id: Some(id),
            first_name: "Pat".to_string(),
            last_name: "Example".to_string(),
            nick_name: format!("p{id}"),
            email: format!("p{id}@example.test"),
            discord_id: 9000 + id as i64,
            active: true,
        }
    }

    #[test]
    fn test_late_players_are_those_without_picks() {
        let players = vec![player(1), player(2), player(3)];
        let picked: HashSet<i32> = [1, 3].into_iter().collect();
        let late = late_players(&players, &picked);
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].id, Some(2));
    }

    #[test]
    fn test_format_time_to_kickoff() {
        assert_eq!(format_time_to_kickoff(Duration::minutes(125)), "2 hours, 5 minutes");
        assert_eq!(format_time_to_kickoff(Duration::minutes(60)), "1 hour");
        assert_eq!(format_time_to_kickoff(Duration::minutes(7)), "7 minutes");
        assert_eq!(format_time_to_kickoff(Duration::minutes(1)), "1 minute");
        assert_eq!(format_time_to_kickoff(Duration::minutes(-3)), "0 minutes");
    }
}
