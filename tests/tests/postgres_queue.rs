//! Job queue tests against a real Postgres database.
//!
//! Requires Docker for the Postgres testcontainer, or a server reachable
//! through `WEATHER_TEST_DATABASE_URL`.

use chrono::{Duration, Utc};
use ingest_core::{Job, ParserRegistry, PROCESS_JOB};
use integration_tests::{fixtures, mocks::StaticPoller, setup::TestContext};
use queue::{JobQueue, QueueConfig};
use std::sync::Arc;
use worker::PollScheduler;

#[tokio::test]
async fn test_submit_and_pending_keys() {
    let ctx = TestContext::new().await;
    let queue = &ctx.queue;

    queue
        .submit(&Job::process(fixtures::mosmix_url(), 20))
        .await
        .unwrap();
    queue
        .submit(&Job::new("backfill", fixtures::synop_url(1), 0))
        .await
        .unwrap();

    let pending = queue.pending_keys(PROCESS_JOB).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending.contains(&fixtures::mosmix_url()));
    assert_eq!(queue.queue_depth(PROCESS_JOB).await.unwrap(), 1);
}

#[tokio::test]
async fn test_claim_locks_and_release_unlocks() {
    let ctx = TestContext::new().await;
    let queue = &ctx.queue;

    queue
        .submit(&Job::process(fixtures::recent_url("tu", "01766"), 10))
        .await
        .unwrap();
    queue
        .submit(&Job::process(fixtures::synop_url(1), 40))
        .await
        .unwrap();

    let claimed = queue.claim(PROCESS_JOB).await.unwrap().unwrap();
    assert_eq!(claimed.job.key, fixtures::synop_url(1));
    assert!(queue.is_locked(&claimed.job.key).await.unwrap());
    assert!(!queue
        .pending_keys(PROCESS_JOB)
        .await
        .unwrap()
        .contains(&claimed.job.key));

    assert!(queue.release(&claimed.job.key).await.unwrap());
    assert!(!queue.is_locked(&claimed.job.key).await.unwrap());
    assert!(!queue.release(&claimed.job.key).await.unwrap());
}

#[tokio::test]
async fn test_claim_skips_locked_keys() {
    let ctx = TestContext::new().await;
    let url = fixtures::mosmix_url();
    ctx.lock_at(&url, Utc::now()).await;
    ctx.queue.submit(&Job::process(url, 20)).await.unwrap();

    assert!(ctx.queue.claim(PROCESS_JOB).await.unwrap().is_none());
    assert_eq!(ctx.queue.queue_depth(PROCESS_JOB).await.unwrap(), 1);
}

#[tokio::test]
async fn test_expire_locks_threshold() {
    let ctx = TestContext::new().await;
    let now = Utc::now();
    ctx.lock_at("stale", now - Duration::seconds(1900)).await;
    ctx.lock_at("fresh", now - Duration::seconds(600)).await;

    let expired = ctx
        .queue
        .expire_locks(QueueConfig::default().lock_max_age())
        .await
        .unwrap();

    assert_eq!(expired, vec!["stale".to_string()]);
    assert!(!ctx.queue.is_locked("stale").await.unwrap());
    assert!(ctx.queue.is_locked("fresh").await.unwrap());
}

/// The scheduler against the Postgres queue submits each file once.
#[tokio::test]
async fn test_poll_cycles_are_idempotent() {
    let ctx = TestContext::new().await;
    let urls = vec![fixtures::mosmix_url(), fixtures::current_url("10382")];
    let poller = StaticPoller::new(fixtures::updated_all(&urls));
    let running = fixtures::synop_url(1);
    ctx.lock_at(&running, Utc::now()).await;
    poller.set_files(fixtures::updated_all(&[
        urls[0].clone(),
        urls[1].clone(),
        running.clone(),
    ]));

    let scheduler = PollScheduler::new(
        Arc::new(poller),
        ctx.queue.clone(),
        Arc::new(ParserRegistry::with_defaults().unwrap()),
        QueueConfig::default(),
    );

    let first = scheduler.run_poll_cycle(true).await.unwrap().summary.unwrap();
    assert_eq!(first.enqueued, 2);
    assert_eq!(first.already_running, 1);

    let second = scheduler.run_poll_cycle(true).await.unwrap().summary.unwrap();
    assert_eq!(second.enqueued, 0);
    assert_eq!(second.already_queued, 2);
    assert_eq!(ctx.queue.queue_depth(PROCESS_JOB).await.unwrap(), 2);
}

/// Dry-run polls work against a database without the queue tables and
/// leave them uncreated.
#[tokio::test]
async fn test_dry_run_needs_no_queue_tables() {
    let ctx = TestContext::without_queue().await;
    assert!(!ctx.table_names().await.contains(&"job_queue".to_string()));

    let poller = StaticPoller::new(vec![fixtures::updated(fixtures::mosmix_url())]);
    let scheduler = PollScheduler::new(
        Arc::new(poller),
        ctx.queue.clone(),
        Arc::new(ParserRegistry::with_defaults().unwrap()),
        QueueConfig::default(),
    );

    let cycle = scheduler.run_poll_cycle(false).await.unwrap();
    assert_eq!(cycle.files.len(), 1);
    assert!(cycle.summary.is_none());

    let tables = ctx.table_names().await;
    assert!(tables.contains(&"sources".to_string()));
    assert!(!tables.contains(&"job_queue".to_string()));
    assert!(!tables.contains(&"job_locks".to_string()));

    // Enqueueing needs the tables
    assert!(scheduler.run_poll_cycle(true).await.is_err());
}
