// End-to-end campaign flows against an in-memory store and a scripted
// Discord fake: tally idempotence, chunked broadcast, failure bookkeeping,
// and the due-campaign scheduler.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use rollcall_discord::{ChatApi, DiscordError, MessageInfo, UserInfo};
use rollcall_engine::{build, lifecycle, run_due, send, tally, EngineError, EngineTuning};
use rollcall_store::{CampaignStatus, Store, StoreError};

fn user(id: &str, bot: bool) -> UserInfo {
    UserInfo {
        id: id.to_string(),
        username: format!("user-{id}"),
        display_name: None,
        bot,
    }
}

/// Scripted stand-in for the Discord session.
#[derive(Default)]
struct FakeChat {
    /// (channel, message, emoji) -> current reactors.
    reactions: Mutex<HashMap<(String, String, String), Vec<UserInfo>>>,
    /// Messages that message_get should report as missing.
    missing: Mutex<HashSet<(String, String)>>,
    /// Outcomes popped per message_send call; empty queue means success.
    send_script: Mutex<VecDeque<Result<(), DiscordError>>>,
    /// Every successfully "sent" (channel, content) pair, in order.
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeChat {
    fn react(&self, channel: &str, message: &str, emoji: &str, u: UserInfo) {
        self.reactions
            .lock()
            .unwrap()
            .entry((channel.into(), message.into(), emoji.into()))
            .or_default()
            .push(u);
    }

    fn mark_missing(&self, channel: &str, message: &str) {
        self.missing
            .lock()
            .unwrap()
            .insert((channel.into(), message.into()));
    }

    fn script_sends(&self, outcomes: Vec<Result<(), DiscordError>>) {
        *self.send_script.lock().unwrap() = outcomes.into();
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn message_get(&self, channel_id: &str, message_id: &str) -> Result<MessageInfo, DiscordError> {
        if self
            .missing
            .lock()
            .unwrap()
            .contains(&(channel_id.to_string(), message_id.to_string()))
        {
            return Err(DiscordError::NotFound("unknown message".into()));
        }
        Ok(MessageInfo {
            id: message_id.to_string(),
            channel_id: channel_id.to_string(),
            author: user("999", false),
            content: "sign up here".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        })
    }

    async fn reaction_users(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<Vec<UserInfo>, DiscordError> {
        Ok(self
            .reactions
            .lock()
            .unwrap()
            .get(&(
                channel_id.to_string(),
                message_id.to_string(),
                emoji.to_string(),
            ))
            .cloned()
            .unwrap_or_default())
    }

    async fn message_send(
        &self,
        channel_id: &str,
        content: &str,
        _reply_to: Option<&str>,
    ) -> Result<String, DiscordError> {
        if let Some(outcome) = self.send_script.lock().unwrap().pop_front() {
            outcome?;
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        Ok("424242".to_string())
    }
}

async fn create(store: &Store, chat: &FakeChat, message: &str, emoji: &str) -> i64 {
    lifecycle::create_campaign(
        store,
        chat,
        Some("raid night"),
        "777",
        message,
        emoji,
        Utc::now() - Duration::minutes(1),
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn happy_path_tick_tallies_sends_and_completes() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    chat.react("777", "1000", "✅", user("11", false));
    chat.react("777", "1000", "✅", user("22", false));
    chat.react("777", "1000", "✅", user("33", true)); // bot, ignored

    let outcomes = run_due(&store, &chat, &EngineTuning::instant(), Utc::now())
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].tally.as_ref().unwrap().new_optins, 2);

    let sent = chat.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "777");
    assert!(sent[0].1.contains("<@11> <@22>"));

    let campaign = store.get_campaign(id).unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);

    let logs = store.list_logs(id).unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].success);
    assert_eq!(logs[0].recipient_count, 2);
    assert_eq!(logs[0].message_chunks, 1);
}

#[tokio::test]
async fn duplicate_create_reports_existing_id() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let first = create(&store, &chat, "1000", "✅").await;

    let err = lifecycle::create_campaign(
        &store,
        &chat,
        None,
        "777",
        "1000",
        "✅",
        Utc::now(),
    )
    .await
    .unwrap_err();
    match err {
        EngineError::Store(StoreError::Duplicate { existing }) => assert_eq!(existing, first),
        other => panic!("expected Duplicate, got {other:?}"),
    }
    assert_eq!(lifecycle::list_campaigns(&store, None).unwrap().len(), 1);
}

#[tokio::test]
async fn create_rejects_missing_message() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    chat.mark_missing("777", "1000");

    let err = lifecycle::create_campaign(
        &store,
        &chat,
        None,
        "777",
        "1000",
        "✅",
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Discord(DiscordError::NotFound(_))
    ));
    assert!(lifecycle::list_campaigns(&store, None).unwrap().is_empty());
}

#[tokio::test]
async fn tally_is_idempotent_until_reactions_change() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    for u in ["1", "2", "3"] {
        chat.react("777", "1000", "✅", user(u, false));
    }

    let first = tally(&store, &chat, id).await.unwrap();
    assert_eq!((first.new_optins, first.existing_optins), (3, 0));

    let second = tally(&store, &chat, id).await.unwrap();
    assert_eq!((second.new_optins, second.existing_optins), (0, 3));
    assert_eq!(store.count_opt_ins(id).unwrap(), 3);

    chat.react("777", "1000", "✅", user("4", false));
    let third = tally(&store, &chat, id).await.unwrap();
    assert_eq!((third.new_optins, third.existing_optins), (1, 3));
}

#[tokio::test]
async fn emoji_equality_is_exact() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    // Reactions under a different emoji never count.
    chat.react("777", "1000", "🎉", user("1", false));
    let summary = tally(&store, &chat, id).await.unwrap();
    assert_eq!(summary.total, 0);
}

/// Enough 18-digit reactors to force `n` chunks (89 fit in the first,
/// 88 in each continuation).
fn flood_reactors(chat: &FakeChat, count: u64) {
    for i in 0..count {
        let id = format!("{:018}", 300_000_000_000_000_000u64 + i);
        chat.react("777", "1000", "✅", user(&id, false));
    }
}

#[tokio::test]
async fn rate_limited_chunk_is_retried_and_broadcast_completes() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    flood_reactors(&chat, 100); // two chunks
    tally(&store, &chat, id).await.unwrap();

    chat.script_sends(vec![
        Ok(()),
        Err(DiscordError::RateLimited {
            retry_after: Some(0.0),
        }),
        Ok(()),
    ]);

    let summary = send(&store, &chat, &EngineTuning::instant(), id, false)
        .await
        .unwrap();
    assert!(summary.success);
    assert_eq!(summary.chunks_sent, 2);
    assert_eq!(chat.sent().len(), 2);

    let logs = store.list_logs(id).unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].success);
    assert_eq!(logs[0].message_chunks, 2);
    assert_eq!(
        store.get_campaign(id).unwrap().status,
        CampaignStatus::Completed
    );
}

#[tokio::test]
async fn exhausted_rate_limit_retries_surface_as_failure() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    chat.react("777", "1000", "✅", user("1", false));
    tally(&store, &chat, id).await.unwrap();

    let limited = || DiscordError::RateLimited {
        retry_after: Some(0.0),
    };
    chat.script_sends(vec![Err(limited()), Err(limited()), Err(limited()), Err(limited())]);

    let summary = send(&store, &chat, &EngineTuning::instant(), id, false)
        .await
        .unwrap();
    assert!(!summary.success);
    assert_eq!(summary.chunks_sent, 0);
    assert_eq!(
        store.get_campaign(id).unwrap().status,
        CampaignStatus::Active
    );
}

#[tokio::test]
async fn mid_broadcast_failure_logs_partial_and_resends_from_scratch() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    flood_reactors(&chat, 200); // three chunks
    tally(&store, &chat, id).await.unwrap();

    chat.script_sends(vec![
        Ok(()),
        Err(DiscordError::Transient("gateway hiccup".into())),
    ]);

    let failed = send(&store, &chat, &EngineTuning::instant(), id, false)
        .await
        .unwrap();
    assert!(!failed.success);
    assert_eq!(failed.chunks_sent, 1);
    assert_eq!(failed.chunk_total, 3);
    assert_eq!(
        store.get_campaign(id).unwrap().status,
        CampaignStatus::Active
    );

    let logs = store.list_logs(id).unwrap();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].success);
    assert_eq!(logs[0].message_chunks, 1);
    assert_eq!(logs[0].error_message.as_deref(), Some("transient Discord failure: gateway hiccup"));

    // Re-send restarts from chunk 0: at-least-once, not deduplicated.
    let retried = send(&store, &chat, &EngineTuning::instant(), id, false)
        .await
        .unwrap();
    assert!(retried.success);
    assert_eq!(retried.chunks_sent, 3);
    assert_eq!(chat.sent().len(), 1 + 3);
    assert_eq!(store.list_logs(id).unwrap().len(), 2);
    assert_eq!(
        store.get_campaign(id).unwrap().status,
        CampaignStatus::Completed
    );
}

#[tokio::test]
async fn empty_roster_send_logs_zero_chunks_and_keeps_status() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    let broadcast = build(&store, id, None).unwrap();
    assert!(broadcast.chunks.is_empty());

    let summary = send(&store, &chat, &EngineTuning::instant(), id, false)
        .await
        .unwrap();
    assert!(summary.success);
    assert_eq!(summary.chunks_sent, 0);
    assert!(chat.sent().is_empty());

    let logs = store.list_logs(id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message_chunks, 0);
    assert!(logs[0].success);
    assert_eq!(
        store.get_campaign(id).unwrap().status,
        CampaignStatus::Active
    );
}

#[tokio::test]
async fn dry_run_send_touches_nothing_but_the_store() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    chat.react("777", "1000", "✅", user("1", false));
    tally(&store, &chat, id).await.unwrap();

    let summary = send(&store, &chat, &EngineTuning::instant(), id, true)
        .await
        .unwrap();
    assert!(summary.success);
    assert!(summary.dry_run);
    assert_eq!(summary.chunks_sent, 1);
    assert!(chat.sent().is_empty());

    // The audit row and the completion transition still happen.
    assert_eq!(store.list_logs(id).unwrap().len(), 1);
    assert_eq!(
        store.get_campaign(id).unwrap().status,
        CampaignStatus::Completed
    );
}

#[tokio::test]
async fn scheduler_with_nothing_due_returns_empty() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();

    let outcomes = run_due(&store, &chat, &EngineTuning::instant(), Utc::now())
        .await
        .unwrap();
    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn scheduler_runs_campaigns_soonest_first() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();

    let later = lifecycle::create_campaign(
        &store,
        &chat,
        Some("later"),
        "777",
        "2000",
        "✅",
        Utc::now() - Duration::minutes(1),
    )
    .await
    .unwrap();
    let sooner = lifecycle::create_campaign(
        &store,
        &chat,
        Some("sooner"),
        "777",
        "1000",
        "✅",
        Utc::now() - Duration::minutes(10),
    )
    .await
    .unwrap();

    chat.react("777", "1000", "✅", user("1", false));
    chat.react("777", "2000", "✅", user("2", false));

    let outcomes = run_due(&store, &chat, &EngineTuning::instant(), Utc::now())
        .await
        .unwrap();
    let ids: Vec<i64> = outcomes.iter().map(|o| o.campaign_id).collect();
    assert_eq!(ids, vec![sooner.id, later.id]);
    assert!(outcomes.iter().all(|o| o.success));

    for id in ids {
        assert_eq!(
            store.get_campaign(id).unwrap().status,
            CampaignStatus::Completed
        );
    }
}

#[tokio::test]
async fn scheduler_sends_persisted_roster_despite_tally_failure() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    chat.react("777", "1000", "✅", user("1", false));
    tally(&store, &chat, id).await.unwrap();

    // The signup message disappears before the tick.
    chat.mark_missing("777", "1000");

    let outcomes = run_due(&store, &chat, &EngineTuning::instant(), Utc::now())
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].tally_error.is_some());
    assert!(outcomes[0].success, "send should still go out");
    assert_eq!(chat.sent().len(), 1);
    assert!(chat.sent()[0].1.contains("<@1>"));
}

#[tokio::test]
async fn delete_returns_store_to_pre_create_state() {
    let store = Store::open_in_memory().unwrap();
    let chat = FakeChat::default();
    let id = create(&store, &chat, "1000", "✅").await;

    chat.react("777", "1000", "✅", user("1", false));
    tally(&store, &chat, id).await.unwrap();
    send(&store, &chat, &EngineTuning::instant(), id, false)
        .await
        .unwrap();

    lifecycle::delete_campaign(&store, id).unwrap();

    assert!(lifecycle::list_campaigns(&store, None).unwrap().is_empty());
    assert_eq!(store.count_opt_ins(id).unwrap(), 0);
    assert!(store.list_logs(id).unwrap().is_empty());
    assert!(matches!(
        lifecycle::get_campaign(&store, id),
        Err(EngineError::Store(StoreError::NotFound { .. }))
    ));
}
