//! Integration tests: SQLite content queue → CadenceScheduler → Publisher
//!
//! The scheduler runs against a real store in a temp directory with a
//! recording publisher and a settable clock.

#[cfg(test)]
mod scheduler_integration_tests {
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use serde_json::Map;
    use skiflow::publisher::{PublishError, PublishReceipt, Publisher};
    use skiflow::scheduler::{CadenceScheduler, CheckOutcome, PostOutcome, ScheduleConfig};
    use skiflow::store::{ContentQueue, ItemStatus, QueueItem, SqliteStore};
    use std::sync::{Arc, Mutex};
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    const SCHEMA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/sql");

    #[derive(Default)]
    struct MockPublisher {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Publisher for MockPublisher {
        async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(text.to_string());
            Ok(PublishReceipt {
                external_id: format!("mock-{}", sent.len()),
                url: format!("https://example.com/mock/{}", sent.len()),
            })
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 16)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn approved(id: &str, created_hour: u32) -> QueueItem {
        QueueItem {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 2, 16, created_hour, 0, 0).unwrap(),
            generation_date: NaiveDate::from_ymd_opt(2026, 2, 16).unwrap(),
            status: ItemStatus::Approved,
            post_type: "powder_alert".to_string(),
            content: format!("content {}", id),
            metadata: Map::new(),
        }
    }

    struct Harness {
        _dir: TempDir,
        store: Arc<SqliteStore>,
        publisher: Arc<MockPublisher>,
        clock: Arc<Mutex<NaiveDateTime>>,
        scheduler: CadenceScheduler,
    }

    impl Harness {
        async fn new(items: Vec<QueueItem>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = Arc::new(SqliteStore::open(dir.path().join("q.db"), SCHEMA_DIR).unwrap());
            for item in &items {
                store.insert(item).await.unwrap();
            }

            let publisher = Arc::new(MockPublisher::default());
            let clock = Arc::new(Mutex::new(at(9, 0)));
            let clock_fn = clock.clone();
            let scheduler =
                CadenceScheduler::new(store.clone(), publisher.clone(), ScheduleConfig::default())
                    .with_clock(Arc::new(move || *clock_fn.lock().unwrap()));

            Self {
                _dir: dir,
                store,
                publisher,
                clock,
                scheduler,
            }
        }

        fn set_time(&self, t: NaiveDateTime) {
            *self.clock.lock().unwrap() = t;
        }

        fn sent(&self) -> Vec<String> {
            self.publisher.sent.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_fifo_across_slots() {
        // Test: t1 < t2 < t3 inserted out of order, posted in creation order
        let h = Harness::new(vec![approved("t2", 6), approved("t3", 7), approved("t1", 5)]).await;

        for (hour, minute) in [(9, 0), (10, 30), (12, 0)] {
            h.set_time(at(hour, minute));
            let outcome = h.scheduler.check_and_post(at(hour, minute)).await.unwrap();
            assert!(
                matches!(outcome, CheckOutcome::Attempted(PostOutcome::Posted { .. })),
                "expected a post at {:02}:{:02}, got {:?}",
                hour,
                minute,
                outcome
            );
        }

        assert_eq!(h.sent(), vec!["content t1", "content t2", "content t3"]);

        let posted = h.store.get_by_status(ItemStatus::Posted).await.unwrap();
        assert_eq!(posted.len(), 3);
        let t1 = h.store.get_by_id("t1").await.unwrap().unwrap();
        assert_eq!(t1.metadata["posted_at"], "2026-02-16T09:00:00");
        assert_eq!(t1.metadata["external_id"], "mock-1");
    }

    #[tokio::test]
    async fn test_interval_gate_uses_stored_posts() {
        // Test: a post at 09:00 blocks the next one until 10:30
        let h = Harness::new(vec![approved("a", 5), approved("b", 6)]).await;

        h.scheduler.check_and_post(at(9, 0)).await.unwrap();
        let outcome = h.scheduler.check_and_post(at(10, 0)).await.unwrap();
        assert_eq!(outcome, CheckOutcome::TooSoon { last_posted: at(9, 0) });

        h.set_time(at(10, 30));
        let outcome = h.scheduler.check_and_post(at(10, 30)).await.unwrap();
        assert!(matches!(outcome, CheckOutcome::Attempted(PostOutcome::Posted { .. })));

        let outcome = h.scheduler.check_and_post(at(11, 0)).await.unwrap();
        assert_eq!(outcome, CheckOutcome::TooSoon { last_posted: at(10, 30) });

        h.set_time(at(12, 0));
        let outcome = h.scheduler.check_and_post(at(12, 0)).await.unwrap();
        assert_eq!(outcome, CheckOutcome::Attempted(PostOutcome::Empty));
    }

    #[tokio::test]
    async fn test_preview_is_idempotent_and_read_only() {
        let h = Harness::new(vec![approved("a", 5), approved("b", 6), approved("c", 7)]).await;

        let first = h.scheduler.schedule_preview(at(9, 5)).await.unwrap();
        let second = h.scheduler.schedule_preview(at(9, 5)).await.unwrap();
        assert_eq!(first, second);

        let times: Vec<NaiveDateTime> = first.iter().map(|s| s.estimated_time).collect();
        assert_eq!(times, vec![at(10, 30), at(12, 0), at(13, 30)]);

        let counts = h.store.status_counts().await.unwrap();
        assert_eq!(counts.get(ItemStatus::Approved), 3);
        assert_eq!(counts.get(ItemStatus::Posted), 0);
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn test_running_loop_posts_then_stops() {
        // Test: start() checks immediately; stop() ends the loop
        let h = Harness::new(vec![approved("a", 5), approved("b", 6)]).await;
        let Harness {
            _dir,
            store,
            publisher,
            clock,
            scheduler,
        } = h;
        let scheduler = Arc::new(scheduler.with_poll_interval(StdDuration::from_millis(10)));

        let handle = scheduler.start();
        for _ in 0..100 {
            if !publisher.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }

        // Same clock reading: the interval gate holds back the second item
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(publisher.sent.lock().unwrap().len(), 1);

        // Advance past the interval and let the loop pick up the second item
        *clock.lock().unwrap() = at(9, 0) + Duration::minutes(90);
        for _ in 0..100 {
            if publisher.sent.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }

        handle.stop().await;

        assert_eq!(publisher.sent.lock().unwrap().len(), 2);
        assert!(store.get_by_status(ItemStatus::Approved).await.unwrap().is_empty());

        // No further ticks after stop
        *clock.lock().unwrap() = at(13, 30);
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(publisher.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clock_outside_window_never_posts() {
        let h = Harness::new(vec![approved("a", 5)]).await;
        h.set_time(at(21, 0));

        assert_eq!(
            h.scheduler.check_and_post(h.scheduler.now()).await.unwrap(),
            CheckOutcome::OutsideWindow
        );
        assert!(h.sent().is_empty());
    }
}
