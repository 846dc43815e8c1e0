//! CadenceScheduler - the timed publish loop
//!
//! A single scheduler owns the posting cadence. `post_next` is guarded by an
//! in-flight flag so a tick never overlaps a manual post (or vice versa).

use super::slots::{grace_minutes, minutes_into_slot, next_slot};
use super::ScheduleConfig;
use crate::publisher::{PublishReceipt, Publisher};
use crate::store::{ContentQueue, ItemStatus, QueueItem, StoreError};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Format of `posted_at` in item metadata (local wall-clock)
pub const POSTED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const LOG_PREVIEW_CHARS: usize = 60;

/// Source of "now" for every scheduling decision
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Posting,
}

/// Result of one publish attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    /// No approved items
    Empty,
    /// Another publish is already in flight
    Busy,
    Posted {
        item: QueueItem,
        receipt: PublishReceipt,
    },
    /// Publisher refused; the item stays approved
    Failed { item_id: String, error: String },
}

/// Result of one scheduler tick
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    OutsideWindow,
    TooSoon { last_posted: NaiveDateTime },
    OffSlot { minutes_into_slot: f64 },
    Attempted(PostOutcome),
}

/// An approved item and when it is expected to go out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledItem {
    pub item: QueueItem,
    pub estimated_time: NaiveDateTime,
}

/// Assign each approved item (given newest first) its expected slot
///
/// Items go out oldest first; each one claims the next slot at or after the
/// previous slot plus one minute.
pub fn project_schedule(
    config: &ScheduleConfig,
    approved: Vec<QueueItem>,
    now: NaiveDateTime,
) -> Vec<ScheduledItem> {
    let mut from = now;
    let mut preview = Vec::with_capacity(approved.len());
    for item in approved.into_iter().rev() {
        let estimated_time = next_slot(config, from);
        from = estimated_time + Duration::minutes(1);
        preview.push(ScheduledItem {
            item,
            estimated_time,
        });
    }
    preview
}

/// Resets the in-flight flag when a publish attempt ends, on every path
struct PostingGuard<'a>(&'a AtomicBool);

impl<'a> PostingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PostingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CadenceScheduler {
    queue: Arc<dyn ContentQueue>,
    publisher: Arc<dyn Publisher>,
    config: ScheduleConfig,
    clock: Clock,
    poll_interval: StdDuration,
    posting: AtomicBool,
}

impl CadenceScheduler {
    /// Scheduler on the local wall clock, polling every 60s
    pub fn new(
        queue: Arc<dyn ContentQueue>,
        publisher: Arc<dyn Publisher>,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            queue,
            publisher,
            config,
            clock: Arc::new(|| chrono::Local::now().naive_local()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            posting: AtomicBool::new(false),
        }
    }

    /// Replace the clock (for testing)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Set the tick interval; the slot grace window scales with it
    pub fn with_poll_interval(mut self, poll_interval: StdDuration) -> Self {
        self.poll_interval = poll_interval.max(StdDuration::from_millis(1));
        self
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn poll_interval(&self) -> StdDuration {
        self.poll_interval
    }

    pub fn state(&self) -> SchedulerState {
        if self.posting.load(Ordering::Acquire) {
            SchedulerState::Posting
        } else {
            SchedulerState::Idle
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn next_slot(&self, from: NaiveDateTime) -> NaiveDateTime {
        next_slot(&self.config, from)
    }

    /// Latest `posted_at` among items posted on `now`'s date
    pub async fn last_posted_today(
        &self,
        now: NaiveDateTime,
    ) -> Result<Option<NaiveDateTime>, StoreError> {
        let posted = self.queue.get_by_status(ItemStatus::Posted).await?;

        Ok(posted
            .iter()
            .filter_map(|item| item.metadata.get("posted_at")?.as_str())
            .filter_map(|s| NaiveDateTime::parse_from_str(s, POSTED_AT_FORMAT).ok())
            .filter(|t| t.date() == now.date())
            .max())
    }

    /// Decide whether `now` is a posting moment and, if so, publish
    pub async fn check_and_post(&self, now: NaiveDateTime) -> Result<CheckOutcome, StoreError> {
        if !self.config.in_window(now) {
            return Ok(CheckOutcome::OutsideWindow);
        }

        match self.last_posted_today(now).await? {
            Some(last_posted) => {
                let interval_secs = (self.config.interval_hours() * 3600.0).round() as i64;
                if now - last_posted < Duration::seconds(interval_secs) {
                    return Ok(CheckOutcome::TooSoon { last_posted });
                }
            }
            None => {
                let into_slot = minutes_into_slot(&self.config, now);
                if into_slot > grace_minutes(self.poll_interval) {
                    return Ok(CheckOutcome::OffSlot {
                        minutes_into_slot: into_slot,
                    });
                }
            }
        }

        Ok(CheckOutcome::Attempted(self.post_next().await?))
    }

    /// Publish the oldest approved item immediately, ignoring the cadence
    ///
    /// `posted_at` is read from the clock once the publisher returns, so a
    /// slow publish pushes the next interval back accordingly.
    pub async fn post_next(&self) -> Result<PostOutcome, StoreError> {
        let Some(_guard) = PostingGuard::acquire(&self.posting) else {
            return Ok(PostOutcome::Busy);
        };

        let mut approved = self.queue.get_by_status(ItemStatus::Approved).await?;
        let Some(mut item) = approved.pop() else {
            log::info!("📭 No approved content in queue");
            return Ok(PostOutcome::Empty);
        };
        let remaining = approved.len();

        let preview: String = item.content.chars().take(LOG_PREVIEW_CHARS).collect();
        log::info!("📤 Publishing {}: \"{}...\"", item.id, preview);

        let receipt = match self.publisher.publish(&item.content).await {
            Ok(receipt) => receipt,
            Err(e) => {
                log::warn!("⚠️  Publish failed for {}: {}", item.id, e);
                log::warn!("   └─ Item stays approved, will retry on a later tick");
                return Ok(PostOutcome::Failed {
                    item_id: item.id,
                    error: e.to_string(),
                });
            }
        };

        let posted_at = self.now();
        self.queue.update_status(&item.id, ItemStatus::Posted).await?;

        let mut patch = Map::new();
        patch.insert("external_id".into(), Value::String(receipt.external_id.clone()));
        patch.insert("external_url".into(), Value::String(receipt.url.clone()));
        patch.insert(
            "posted_at".into(),
            Value::String(posted_at.format(POSTED_AT_FORMAT).to_string()),
        );
        self.queue.update_metadata(&item.id, patch.clone()).await?;

        item.status = ItemStatus::Posted;
        item.metadata.extend(patch);

        log::info!("✅ Posted {}", item.id);
        log::info!("   ├─ URL: {}", receipt.url);
        log::info!("   └─ {} approved items remaining", remaining);

        Ok(PostOutcome::Posted { item, receipt })
    }

    /// Approved items with their estimated publish times, oldest first
    ///
    /// Read-only: calling it twice yields the same result.
    pub async fn schedule_preview(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<ScheduledItem>, StoreError> {
        let approved = self.queue.get_by_status(ItemStatus::Approved).await?;
        Ok(project_schedule(&self.config, approved, now))
    }

    async fn tick(&self) {
        let now = self.now();
        match self.check_and_post(now).await {
            Ok(CheckOutcome::Attempted(PostOutcome::Posted { .. })) => {}
            Ok(CheckOutcome::Attempted(PostOutcome::Failed { .. })) => {}
            Ok(outcome) => log::debug!("⏸️  No post at {}: {:?}", now, outcome),
            Err(e) => log::error!("❌ Scheduler tick failed: {}", e),
        }
    }

    /// Spawn the polling loop
    ///
    /// The loop runs until `SchedulerHandle::stop` is called or the handle is
    /// dropped. A tick that has started publishing always runs to completion.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);

        log::info!("⏰ Starting cadence scheduler");
        log::info!("   ├─ Interval: {}h", self.config.interval_hours());
        log::info!(
            "   ├─ Window: {:02}:00-{:02}:00",
            self.config.start_hour(),
            self.config.end_hour()
        );
        log::info!("   └─ Poll: {:?}", self.poll_interval);

        let join = tokio::spawn(async move {
            let mut timer = interval(scheduler.poll_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = timer.tick() => {}
                }
                if *shutdown_rx.borrow() {
                    break;
                }

                scheduler.tick().await;
            }

            log::info!("🛑 Cadence scheduler stopped");
        });

        SchedulerHandle { shutdown_tx, join }
    }
}

/// Running scheduler loop
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signal shutdown and wait for the loop to exit
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            log::error!("❌ Scheduler task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::PublishError;
    use crate::store::StatusCounts;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemQueue {
        items: Mutex<Vec<QueueItem>>,
        broken: AtomicBool,
    }

    #[async_trait]
    impl ContentQueue for MemQueue {
        async fn insert(&self, item: &QueueItem) -> Result<(), StoreError> {
            self.items.lock().unwrap().push(item.clone());
            Ok(())
        }

        async fn get_by_id(&self, id: &str) -> Result<Option<QueueItem>, StoreError> {
            Ok(self.items.lock().unwrap().iter().find(|i| i.id == id).cloned())
        }

        async fn get_by_status(&self, status: ItemStatus) -> Result<Vec<QueueItem>, StoreError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::LockPoisoned);
            }
            let mut items: Vec<QueueItem> = self
                .items
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.status == status)
                .cloned()
                .collect();
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(items)
        }

        async fn update_status(&self, id: &str, status: ItemStatus) -> Result<(), StoreError> {
            let mut items = self.items.lock().unwrap();
            let item = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            item.status = status;
            Ok(())
        }

        async fn update_metadata(
            &self,
            id: &str,
            patch: Map<String, Value>,
        ) -> Result<(), StoreError> {
            let mut items = self.items.lock().unwrap();
            let item = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            item.metadata.extend(patch);
            Ok(())
        }

        async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
            let mut counts = StatusCounts::default();
            for item in self.items.lock().unwrap().iter() {
                *counts.counts.entry(item.status).or_insert(0) += 1;
            }
            Ok(counts)
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<String>>,
        fail: AtomicBool,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(PublishError::Rejected {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(text.to_string());
            Ok(PublishReceipt {
                external_id: format!("ext-{}", sent.len()),
                url: format!("https://example.com/p/{}", sent.len()),
            })
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 16)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn item(id: &str, minute: u32, status: ItemStatus) -> QueueItem {
        QueueItem {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 2, 16, 7, minute, 0).unwrap(),
            generation_date: NaiveDate::from_ymd_opt(2026, 2, 16).unwrap(),
            status,
            post_type: "daily_recap".to_string(),
            content: format!("post {}", id),
            metadata: Map::new(),
        }
    }

    fn posted_at(id: &str, minute: u32, when: NaiveDateTime) -> QueueItem {
        let mut item = item(id, minute, ItemStatus::Posted);
        item.metadata.insert(
            "posted_at".into(),
            Value::String(when.format(POSTED_AT_FORMAT).to_string()),
        );
        item
    }

    async fn setup(items: Vec<QueueItem>) -> (Arc<MemQueue>, Arc<RecordingPublisher>, CadenceScheduler) {
        let queue = Arc::new(MemQueue::default());
        for i in &items {
            queue.insert(i).await.unwrap();
        }
        let publisher = Arc::new(RecordingPublisher::default());
        let scheduler = CadenceScheduler::new(
            queue.clone(),
            publisher.clone(),
            ScheduleConfig::default(),
        )
        .with_clock(Arc::new(|| at(9, 0)));
        (queue, publisher, scheduler)
    }

    #[tokio::test]
    async fn test_outside_window_never_posts() {
        let (_, publisher, scheduler) = setup(vec![item("a", 0, ItemStatus::Approved)]).await;

        for now in [at(8, 59), at(21, 0), at(23, 30)] {
            assert_eq!(
                scheduler.check_and_post(now).await.unwrap(),
                CheckOutcome::OutsideWindow
            );
        }
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_post_of_day_waits_for_slot() {
        let (_, publisher, scheduler) = setup(vec![item("a", 0, ItemStatus::Approved)]).await;

        let outcome = scheduler.check_and_post(at(9, 45)).await.unwrap();
        assert!(matches!(outcome, CheckOutcome::OffSlot { .. }));

        // Two minutes past 10:30 is still inside the grace window
        let outcome = scheduler.check_and_post(at(10, 32)).await.unwrap();
        assert!(matches!(
            outcome,
            CheckOutcome::Attempted(PostOutcome::Posted { .. })
        ));
        assert_eq!(publisher.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_grace_window_scales_with_poll_interval() {
        let (_, _, scheduler) = setup(vec![item("a", 0, ItemStatus::Approved)]).await;
        let scheduler = scheduler.with_poll_interval(StdDuration::from_secs(300));

        let outcome = scheduler.check_and_post(at(9, 8)).await.unwrap();
        assert!(matches!(
            outcome,
            CheckOutcome::Attempted(PostOutcome::Posted { .. })
        ));
    }

    #[tokio::test]
    async fn test_interval_gate_after_todays_post() {
        let (_, publisher, scheduler) = setup(vec![
            posted_at("done", 0, at(9, 0)),
            item("a", 1, ItemStatus::Approved),
        ])
        .await;

        let outcome = scheduler.check_and_post(at(10, 29)).await.unwrap();
        assert_eq!(outcome, CheckOutcome::TooSoon { last_posted: at(9, 0) });

        // Interval elapsed: the slot alignment check no longer applies
        let outcome = scheduler.check_and_post(at(10, 47)).await.unwrap();
        assert!(matches!(
            outcome,
            CheckOutcome::Attempted(PostOutcome::Posted { .. })
        ));
        assert_eq!(*publisher.sent.lock().unwrap(), vec!["post a".to_string()]);
    }

    #[tokio::test]
    async fn test_yesterdays_post_does_not_gate_today() {
        let yesterday = at(20, 0) - Duration::days(1);
        let (_, _, scheduler) = setup(vec![
            posted_at("old", 0, yesterday),
            item("a", 1, ItemStatus::Approved),
        ])
        .await;

        assert_eq!(scheduler.last_posted_today(at(9, 0)).await.unwrap(), None);
        let outcome = scheduler.check_and_post(at(9, 1)).await.unwrap();
        assert!(matches!(
            outcome,
            CheckOutcome::Attempted(PostOutcome::Posted { .. })
        ));
    }

    #[tokio::test]
    async fn test_post_next_is_fifo_and_records_receipt() {
        let (queue, publisher, scheduler) = setup(vec![
            item("newer", 30, ItemStatus::Approved),
            item("older", 10, ItemStatus::Approved),
            item("draft", 5, ItemStatus::Pending),
        ])
        .await;

        let PostOutcome::Posted { item, receipt } = scheduler.post_next().await.unwrap() else {
            panic!("expected a post");
        };
        assert_eq!(item.id, "older");
        assert_eq!(receipt.external_id, "ext-1");

        let stored = queue.get_by_id("older").await.unwrap().unwrap();
        assert_eq!(stored.status, ItemStatus::Posted);
        assert_eq!(stored.metadata["external_id"], "ext-1");
        assert_eq!(stored.metadata["external_url"], "https://example.com/p/1");
        assert_eq!(stored.metadata["posted_at"], "2026-02-16T09:00:00");

        scheduler.post_next().await.unwrap();
        assert_eq!(
            *publisher.sent.lock().unwrap(),
            vec!["post older".to_string(), "post newer".to_string()]
        );
        assert_eq!(scheduler.post_next().await.unwrap(), PostOutcome::Empty);
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_item_approved() {
        let (queue, publisher, scheduler) = setup(vec![item("a", 0, ItemStatus::Approved)]).await;
        publisher.fail.store(true, Ordering::SeqCst);

        let outcome = scheduler.post_next().await.unwrap();
        assert!(matches!(outcome, PostOutcome::Failed { ref item_id, .. } if item_id == "a"));

        let stored = queue.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.status, ItemStatus::Approved);
        assert!(stored.metadata.is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        publisher.fail.store(false, Ordering::SeqCst);
        assert!(matches!(
            scheduler.post_next().await.unwrap(),
            PostOutcome::Posted { .. }
        ));
    }

    #[tokio::test]
    async fn test_busy_while_posting() {
        let (_, _, scheduler) = setup(vec![item("a", 0, ItemStatus::Approved)]).await;

        let _held = PostingGuard::acquire(&scheduler.posting).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Posting);
        assert_eq!(scheduler.post_next().await.unwrap(), PostOutcome::Busy);
    }

    #[tokio::test]
    async fn test_schedule_preview() {
        let (queue, _, scheduler) = setup(vec![
            item("b", 20, ItemStatus::Approved),
            item("a", 10, ItemStatus::Approved),
            item("c", 30, ItemStatus::Approved),
        ])
        .await;

        let preview = scheduler.schedule_preview(at(19, 0)).await.unwrap();
        let summary: Vec<(&str, NaiveDateTime)> = preview
            .iter()
            .map(|s| (s.item.id.as_str(), s.estimated_time))
            .collect();

        let tomorrow = |h: u32, m: u32| at(h, m) + Duration::days(1);
        assert_eq!(
            summary,
            vec![("a", at(19, 30)), ("b", tomorrow(9, 0)), ("c", tomorrow(10, 30))]
        );

        // Read-only and repeatable
        assert_eq!(scheduler.schedule_preview(at(19, 0)).await.unwrap(), preview);
        assert_eq!(queue.status_counts().await.unwrap().get(ItemStatus::Approved), 3);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (queue, publisher, scheduler) = setup(vec![item("a", 0, ItemStatus::Approved)]).await;
        let scheduler = Arc::new(scheduler.with_poll_interval(StdDuration::from_millis(10)));

        let handle = scheduler.start();
        for _ in 0..100 {
            if !publisher.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        handle.stop().await;

        assert_eq!(publisher.sent.lock().unwrap().len(), 1);
        let stored = queue.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.status, ItemStatus::Posted);
    }

    /// Publisher that takes `delay` of clock time to complete
    struct SlowPublisher {
        clock: Arc<Mutex<NaiveDateTime>>,
        delay: Duration,
    }

    #[async_trait]
    impl Publisher for SlowPublisher {
        async fn publish(&self, _text: &str) -> Result<PublishReceipt, PublishError> {
            let mut now = self.clock.lock().unwrap();
            *now += self.delay;
            Ok(PublishReceipt {
                external_id: "slow-1".to_string(),
                url: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_posted_at_taken_after_publish_returns() {
        let queue = Arc::new(MemQueue::default());
        queue.insert(&item("a", 0, ItemStatus::Approved)).await.unwrap();

        let clock = Arc::new(Mutex::new(at(9, 0)));
        let clock_fn = clock.clone();
        let publisher = Arc::new(SlowPublisher {
            clock: clock.clone(),
            delay: Duration::minutes(20),
        });
        let scheduler = CadenceScheduler::new(queue.clone(), publisher, ScheduleConfig::default())
            .with_clock(Arc::new(move || *clock_fn.lock().unwrap()));

        let outcome = scheduler.check_and_post(at(9, 0)).await.unwrap();
        assert!(matches!(outcome, CheckOutcome::Attempted(PostOutcome::Posted { .. })));

        let stored = queue.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.metadata["posted_at"], "2026-02-16T09:20:00");
        assert_eq!(
            scheduler.last_posted_today(at(10, 0)).await.unwrap(),
            Some(at(9, 20))
        );
    }

    #[tokio::test]
    async fn test_loop_survives_store_and_publish_failures() {
        let (queue, publisher, scheduler) = setup(vec![item("a", 0, ItemStatus::Approved)]).await;
        let scheduler = Arc::new(scheduler.with_poll_interval(StdDuration::from_millis(5)));

        queue.broken.store(true, Ordering::SeqCst);
        publisher.fail.store(true, Ordering::SeqCst);

        let handle = scheduler.start();

        // Store errors on every tick
        tokio::time::sleep(StdDuration::from_millis(40)).await;
        assert!(!handle.is_finished());
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 0);

        // Store recovers, publisher keeps failing
        queue.broken.store(false, Ordering::SeqCst);
        for _ in 0..100 {
            if publisher.attempts.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        assert!(publisher.attempts.load(Ordering::SeqCst) >= 3);
        assert!(!handle.is_finished());
        assert_eq!(
            queue.get_by_id("a").await.unwrap().unwrap().status,
            ItemStatus::Approved
        );

        // Publisher recovers; the same item goes out on a later tick
        publisher.fail.store(false, Ordering::SeqCst);
        for _ in 0..100 {
            if !publisher.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        assert!(!handle.is_finished());
        handle.stop().await;

        let stored = queue.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.status, ItemStatus::Posted);
        assert_eq!(*publisher.sent.lock().unwrap(), vec!["post a".to_string()]);
    }
}
