use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use tracing::{error, info, warn};

use crate::config::{Config, EnvConfig};
use crate::data::gamma_api::{ApiError, GammaApiClient};
use crate::data::types::Station;
use crate::telegram::client::{TelegramClient, TelegramError};
use crate::telegram::commands::{self, Command};
use crate::telegram::types::ReplyKeyboardMarkup;
use crate::tracker::resolver::{resolve_slug, MatchRule};
use crate::tracker::service::{top_outcomes, Tracker};

/// Seconds Telegram holds a getUpdates long poll open.
const UPDATE_POLL_TIMEOUT_SECS: u64 = 30;
/// Pause before re-polling after a failed or conflicted update poll.
const UPDATE_RETRY_SECS: u64 = 5;

const HELP_TEXT: &str = "Available commands:
/alert london - start tracking London
/alert nyc - start tracking NYC
/stop london - stop tracking London
/stop nyc - stop tracking NYC
/current london - show current top 3 London options
/current nyc - show current top 3 NYC options
/resolve - show resolved outcome
/streak london - show streak for London
/streak nyc - show streak for NYC
/help - show this help";

pub struct Bot {
    tracker: Tracker,
    gamma: GammaApiClient,
    telegram: TelegramClient,
    alert_chat_id: i64,
    check_interval: Duration,
    refresh_hour: u32,
    refresh_minute: u32,
    utc_offset: FixedOffset,
    match_rule: MatchRule,
}

impl Bot {
    pub fn new(config: &Config, env: &EnvConfig) -> Result<Self> {
        let utc_offset = FixedOffset::east_opt(config.polling.utc_offset_minutes * 60)
            .context("utc_offset_minutes out of range")?;
        if NaiveTime::from_hms_opt(config.polling.refresh_hour, config.polling.refresh_minute, 0)
            .is_none()
        {
            anyhow::bail!(
                "Invalid daily refresh time {:02}:{:02}",
                config.polling.refresh_hour,
                config.polling.refresh_minute
            );
        }

        Ok(Self {
            tracker: Tracker::new(),
            gamma: GammaApiClient::new(env.gamma_url.clone()),
            telegram: TelegramClient::new(&env.telegram_bot_token),
            alert_chat_id: env.telegram_chat_id,
            check_interval: Duration::from_secs(config.polling.check_interval_secs),
            refresh_hour: config.polling.refresh_hour,
            refresh_minute: config.polling.refresh_minute,
            utc_offset,
            match_rule: config.resolver.match_rule,
        })
    }

    /// Resolve the day's slugs once, then spawn the long-lived loops:
    /// one check loop per station, the daily slug refresh, and the
    /// command poll loop.
    pub async fn run(self: Arc<Self>) {
        self.refresh_slugs().await;

        for station in Station::ALL {
            let bot = self.clone();
            tokio::spawn(async move {
                bot.station_loop(station).await;
            });
        }

        let bot = self.clone();
        tokio::spawn(async move {
            bot.daily_refresh_loop().await;
        });

        let bot = self.clone();
        tokio::spawn(async move {
            bot.command_loop().await;
        });
    }

    async fn station_loop(&self, station: Station) {
        let mut interval = tokio::time::interval(self.check_interval);
        // The first tick completes immediately; consume it so checks start
        // one interval after launch.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.check_station(station).await;
        }
    }

    /// One check cycle: tracking guard, slug guard, fetch, diff, resolution.
    /// Fetch failures are logged and skipped; the next tick retries.
    async fn check_station(&self, station: Station) {
        if !self.tracker.is_tracking(station) {
            return;
        }
        let slug = match self.tracker.current_slug(station) {
            Some(slug) => slug,
            None => return,
        };

        let detail = match self.gamma.fetch_market(&slug).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!("[{}] market fetch failed: {}", station.label(), e);
                return;
            }
        };

        let changes = self.tracker.diff_prices(station, &detail);
        if !changes.is_empty() {
            let message = format!("[{}] {}", station.label(), changes.join(", "));
            self.telegram.send_message(self.alert_chat_id, &message).await;
        }

        let today = Utc::now().with_timezone(&self.utc_offset).date_naive();
        if let Some(announcement) = self.tracker.detect_resolution(station, &detail, today) {
            self.telegram
                .send_message(self.alert_chat_id, &announcement)
                .await;
        }
    }

    /// Re-resolve the day's market slug for every station.
    async fn refresh_slugs(&self) {
        let markets = match self.gamma.fetch_markets().await {
            Ok(markets) => markets,
            Err(e) => {
                warn!("Market list fetch failed, keeping current slugs: {}", e);
                return;
            }
        };

        let today = Utc::now().with_timezone(&self.utc_offset).date_naive();
        for station in Station::ALL {
            let slug = resolve_slug(station, &markets, today, self.match_rule);
            match &slug {
                Some(slug) => info!("Updated slug for {}: {}", station.name(), slug),
                None => info!("No market found for {} today", station.name()),
            }
            self.tracker.update_slug(station, slug);
        }
    }

    /// Self-rescheduling daily refresh: sleep until the next configured
    /// wall-clock fire time, refresh, re-arm.
    async fn daily_refresh_loop(&self) {
        loop {
            let now = Utc::now().with_timezone(&self.utc_offset);
            let wait = until_next_refresh(now, self.refresh_hour, self.refresh_minute);
            tokio::time::sleep(wait).await;
            self.refresh_slugs().await;
        }
    }

    async fn command_loop(&self) {
        let mut offset = 0i64;
        loop {
            match self.telegram.get_updates(offset, UPDATE_POLL_TIMEOUT_SECS).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let message = match update.message {
                            Some(message) => message,
                            None => continue,
                        };
                        let text = match message.text {
                            Some(text) => text,
                            None => continue,
                        };
                        if let Some(command) = commands::parse(&text) {
                            self.handle_command(message.chat.id, command).await;
                        }
                    }
                }
                Err(TelegramError::Conflict) => {
                    warn!("Polling conflict detected. Wait a few seconds and restart the bot.");
                    tokio::time::sleep(Duration::from_secs(UPDATE_RETRY_SECS)).await;
                }
                Err(e) => {
                    error!("Update poll failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(UPDATE_RETRY_SECS)).await;
                }
            }
        }
    }

    async fn handle_command(&self, chat_id: i64, command: Command) {
        match command {
            Command::Start => {
                self.telegram
                    .send_keyboard(
                        chat_id,
                        "Hi! Use the buttons below or type commands:",
                        &command_keyboard(),
                    )
                    .await;
            }
            Command::Alert(station) => {
                self.tracker.set_tracking(station, true);
                self.telegram
                    .send_message(
                        chat_id,
                        &format!("✅ Now tracking {} weather markets!", station.name()),
                    )
                    .await;
                self.check_station(station).await;
            }
            Command::Stop(station) => {
                self.tracker.set_tracking(station, false);
                self.telegram
                    .send_message(chat_id, &format!("⏹ Stopped tracking {}.", station.name()))
                    .await;
            }
            Command::Current(station) => {
                let reply = self.current_snapshot(station).await;
                self.telegram.send_message(chat_id, &reply).await;
            }
            Command::Resolve => {
                let mut lines = Vec::new();
                for station in Station::ALL {
                    lines.push(self.resolution_line(station).await);
                }
                self.telegram.send_message(chat_id, &lines.join("\n")).await;
            }
            Command::Streak(station) => {
                let reply = self.streak_report(station);
                self.telegram.send_message(chat_id, &reply).await;
            }
            Command::Help => {
                self.telegram.send_message(chat_id, HELP_TEXT).await;
            }
        }
    }

    /// Top-3 snapshot for /current. Reads market data, mutates nothing.
    async fn current_snapshot(&self, station: Station) -> String {
        let slug = match self.tracker.current_slug(station) {
            Some(slug) => slug,
            None => return format!("No market found for {} today.", station.name()),
        };

        match self.gamma.fetch_market(&slug).await {
            Ok(detail) => format!(
                "[{}] {}",
                station.label(),
                top_outcomes(&detail.outcomes).join(", ")
            ),
            Err(ApiError::NoMarket) => format!("No market found for {} today.", station.name()),
            Err(e) => {
                warn!("[{}] snapshot fetch failed: {}", station.label(), e);
                format!("No market found for {} today.", station.name())
            }
        }
    }

    async fn resolution_line(&self, station: Station) -> String {
        let slug = match self.tracker.current_slug(station) {
            Some(slug) => slug,
            None => return format!("[{}] No market found today.", station.label()),
        };

        match self.gamma.fetch_market(&slug).await {
            Ok(detail) => match detail.resolved_outcome {
                Some(winner) => format!(
                    "✅ [{}] {}: {}",
                    station.label(),
                    detail.end_date.format("%Y-%m-%d"),
                    winner
                ),
                None => format!("[{}] Market not yet resolved", station.label()),
            },
            Err(ApiError::NoMarket) => format!("[{}] No market found today.", station.label()),
            Err(e) => {
                warn!("[{}] resolve fetch failed: {}", station.label(), e);
                format!("[{}] No market found today.", station.label())
            }
        }
    }

    fn streak_report(&self, station: Station) -> String {
        let winners = self.tracker.recent_winners(station);
        if winners.is_empty() {
            return format!("No streak data yet for {}.", station.name());
        }

        let mut lines = vec![format!(
            "📈 {} streak (last {} results):",
            station.label(),
            winners.len()
        )];
        for entry in &winners {
            lines.push(format!("{}: {}", entry.date.format("%Y-%m-%d"), entry.winner));
        }
        lines.join("\n")
    }
}

fn command_keyboard() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup::from_rows(&[
        &["/alert london", "/alert nyc"],
        &["/stop london", "/stop nyc"],
        &["/current london", "/current nyc"],
        &["/resolve", "/streak london", "/streak nyc"],
        &["/help"],
    ])
}

/// Time until the next daily fire at hour:minute in the given wall clock.
/// A fire time at or before `now` rolls over to tomorrow.
fn until_next_refresh(now: DateTime<FixedOffset>, hour: u32, minute: u32) -> Duration {
    let fire_time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let mut fire = now.date_naive().and_time(fire_time);
    if fire <= now.naive_local() {
        fire = fire + chrono::Duration::days(1);
    }
    (fire - now.naive_local())
        .to_std()
        .unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(offset_secs: i32, h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(offset_secs)
            .unwrap()
            .with_ymd_and_hms(2026, 8, 7, h, m, s)
            .unwrap()
    }

    #[test]
    fn test_refresh_later_today() {
        let wait = until_next_refresh(at(0, 0, 0, 0), 0, 5);
        assert_eq!(wait, Duration::from_secs(300));
    }

    #[test]
    fn test_refresh_rolls_over_to_tomorrow() {
        let wait = until_next_refresh(at(0, 10, 0, 0), 0, 5);
        assert_eq!(wait, Duration::from_secs(14 * 3600 + 5 * 60));
    }

    #[test]
    fn test_refresh_at_exact_fire_time_waits_a_day() {
        let wait = until_next_refresh(at(0, 0, 5, 0), 0, 5);
        assert_eq!(wait, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_refresh_uses_wall_clock_of_offset() {
        // 23:50 wall clock in UTC+1; 15 minutes to 00:05 regardless of UTC.
        let wait = until_next_refresh(at(3600, 23, 50, 0), 0, 5);
        assert_eq!(wait, Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_command_keyboard_layout() {
        let keyboard = command_keyboard();
        assert_eq!(keyboard.keyboard.len(), 5);
        assert_eq!(keyboard.keyboard[0][0].text, "/alert london");
        assert_eq!(keyboard.keyboard[3].len(), 3);
        assert_eq!(keyboard.keyboard[4][0].text, "/help");
    }
}
