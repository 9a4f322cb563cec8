//! End-to-end pipeline tests: command handling feeds the store, the
//! schedulers read it fresh and deliver snapshots through the gateway
//! seam, and the store document migrates deterministically on disk.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::Mutex;

use tickwatch::adapters::{ChatGateway, ChatTarget, QuoteFetcher};
use tickwatch::commands::{CommandContext, CommandHandler, WatchCommand};
use tickwatch::domain::{Snapshot, StockQuote, CURRENT_VERSION};
use tickwatch::error::Result;
use tickwatch::safety::RateLimiter;
use tickwatch::scheduler::{DailyPushConfig, DailyPushScheduler, IntervalPushConfig, IntervalPushScheduler};
use tickwatch::{WatchlistFile, WatchlistService};

struct StaticQuotes;

#[async_trait]
impl QuoteFetcher for StaticQuotes {
    async fn fetch_quote(&self, symbol: &str) -> Result<StockQuote> {
        Ok(StockQuote {
            symbol: symbol.to_string(),
            name: format!("{symbol} Co"),
            price: dec!(100.00),
            change: dec!(1.50),
            change_pct: dec!(1.52),
            high: dec!(101.00),
            low: dec!(98.00),
        })
    }
}

#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, Snapshot)>>,
}

impl RecordingGateway {
    async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn resolve_target(&self, group_id: &str) -> Result<ChatTarget> {
        Ok(ChatTarget {
            group_id: group_id.to_string(),
            endpoint: format!("test://{group_id}"),
        })
    }

    async fn send_snapshot(&self, target: &ChatTarget, snapshot: &Snapshot) -> Result<()> {
        self.sent
            .lock()
            .await
            .push((target.group_id.clone(), snapshot.clone()));
        Ok(())
    }
}

fn service_in(dir: &tempfile::TempDir) -> Arc<WatchlistService> {
    Arc::new(WatchlistService::new(WatchlistFile::new(
        dir.path().join("watchlist.json"),
    )))
}

fn handler(service: Arc<WatchlistService>) -> CommandHandler {
    CommandHandler::new(
        service,
        Arc::new(RateLimiter::new([])),
        Arc::new(StaticQuotes),
        Vec::new(),
        "15:05".to_string(),
        10,
    )
}

fn ctx() -> CommandContext {
    CommandContext {
        group_id: "G1".to_string(),
        group_name: "Traders".to_string(),
        user_id: "u1".to_string(),
    }
}

fn local(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 3, day, hour, minute, second)
        .unwrap()
}

#[tokio::test]
async fn daily_push_fires_exactly_once_per_day() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);

    // Configure the group through the command surface
    let handler = handler(service.clone());
    handler
        .handle(&ctx(), WatchCommand::Add { codes: vec!["sh600519".to_string()] })
        .await
        .unwrap();
    handler.handle(&ctx(), WatchCommand::Subscribe).await.unwrap();

    let gateway = Arc::new(RecordingGateway::default());
    let scheduler = DailyPushScheduler::new(
        DailyPushConfig {
            hour: 15,
            minute: 5,
            ..DailyPushConfig::default()
        },
        service,
        Arc::new(StaticQuotes),
        gateway.clone(),
    );

    // 15:05:00 with no prior push: exactly one snapshot goes out
    scheduler.run_tick(local(8, 15, 5, 0)).await;
    assert_eq!(gateway.sent_count().await, 1);

    // Same minute, later wake-up: the date marker suppresses a second send
    scheduler.run_tick(local(8, 15, 5, 30)).await;
    assert_eq!(gateway.sent_count().await, 1);

    // Next day at the configured time: pushes again
    scheduler.run_tick(local(9, 15, 5, 0)).await;
    assert_eq!(gateway.sent_count().await, 2);

    let sent = gateway.sent.lock().await;
    assert_eq!(sent[0].0, "G1");
    assert_eq!(sent[0].1.rows[0].symbol, "sh600519");
}

#[tokio::test]
async fn interval_reminders_honor_spacing() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);

    let handler = handler(service.clone());
    handler
        .handle(
            &ctx(),
            WatchCommand::SetReminder {
                code: "sh600519".to_string(),
                minutes: 30,
            },
        )
        .await
        .unwrap();

    let gateway = Arc::new(RecordingGateway::default());
    let scheduler = IntervalPushScheduler::new(
        IntervalPushConfig::default(),
        service,
        Arc::new(StaticQuotes),
        gateway.clone(),
    );

    scheduler.run_tick(local(8, 10, 0, 0)).await;
    assert_eq!(gateway.sent_count().await, 1);

    // Under the cadence: nothing
    scheduler.run_tick(local(8, 10, 29, 0)).await;
    assert_eq!(gateway.sent_count().await, 1);

    // At the cadence: due again
    scheduler.run_tick(local(8, 10, 30, 0)).await;
    assert_eq!(gateway.sent_count().await, 2);
}

#[tokio::test]
async fn mutations_are_visible_to_the_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let handler = handler(service.clone());
    handler.handle(&ctx(), WatchCommand::Subscribe).await.unwrap();
    handler
        .handle(&ctx(), WatchCommand::Add { codes: vec!["sh600519".to_string()] })
        .await
        .unwrap();

    let gateway = Arc::new(RecordingGateway::default());
    let scheduler = DailyPushScheduler::new(
        DailyPushConfig {
            hour: 15,
            minute: 5,
            ..DailyPushConfig::default()
        },
        service,
        Arc::new(StaticQuotes),
        gateway.clone(),
    );

    scheduler.run_tick(local(8, 15, 5, 0)).await;
    assert_eq!(gateway.sent_count().await, 1);

    // Unsubscribe between ticks; the next day's tick reloads the store
    // fresh and must see it
    handler.handle(&ctx(), WatchCommand::Unsubscribe).await.unwrap();
    scheduler.run_tick(local(9, 15, 5, 0)).await;
    assert_eq!(gateway.sent_count().await, 1);
}

#[tokio::test]
async fn migration_from_v1_is_deterministic_and_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watchlist.json");
    let legacy = serde_json::json!({
        "version": 1,
        "groups": {
            "G1": {
                "group_id": "G1",
                "group_name": "Traders",
                "stocks": ["sh600519"],
                "subscribed": true,
                "stock_intervals": {"sh600519": 30},
                "updated_at": ""
            }
        }
    });
    std::fs::write(&path, serde_json::to_vec(&legacy).unwrap()).unwrap();

    let file = WatchlistFile::new(&path);
    let store = file.load().await.unwrap();
    assert_eq!(store.version, CURRENT_VERSION);
    let group = &store.groups["G1"];
    assert!(group.enabled);
    assert!(group.subscribed);
    assert_eq!(group.default_limit, 5);
    assert_eq!(group.window_minutes, 10);
    assert_eq!(group.stocks, vec!["sh600519".to_string()]);
    assert_eq!(group.stock_intervals["sh600519"], 30);

    // Save, reload, save again: the document has reached a fixed point
    file.save(&store).await.unwrap();
    let first = std::fs::read(&path).unwrap();
    let reloaded = file.load().await.unwrap();
    file.save(&reloaded).await.unwrap();
    let second = std::fs::read(&path).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn migrated_defaults_drive_rate_limiting() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let handler = handler(service.clone());

    let t0 = Utc.with_ymd_and_hms(2024, 3, 8, 10, 0, 0).unwrap();

    // Creating the group gives it the migration defaults: 5 per 10 min
    handler
        .handle_at(
            &ctx(),
            WatchCommand::Add { codes: vec!["sh600519".to_string()] },
            t0,
        )
        .await
        .unwrap();
    // One mutation already counted; four more queries fill the window
    for i in 0..4 {
        let reply = handler
            .handle_at(&ctx(), WatchCommand::List, t0 + Duration::minutes(i))
            .await
            .unwrap();
        assert!(!reply.starts_with("Rate limit"), "query {i} should pass");
    }

    let denied = handler
        .handle_at(&ctx(), WatchCommand::List, t0 + Duration::minutes(5))
        .await
        .unwrap();
    assert!(denied.starts_with("Rate limit reached: 5 requests per 10 min"));

    // Once the window has fully elapsed, queries pass again
    let reply = handler
        .handle_at(&ctx(), WatchCommand::List, t0 + Duration::minutes(20))
        .await
        .unwrap();
    assert!(reply.starts_with("Following (1):"));
}
