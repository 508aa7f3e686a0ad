use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::{Map, json};
use tokio::time::{Duration, Instant, sleep};

use super::*;
use crate::source::Subscription;

#[derive(Debug, thiserror::Error)]
#[error("fake backend unavailable")]
struct FakeError;

struct Feed {
    overlay_id: String,
    alerts: mpsc::Sender<Alert>,
    shutdown: Option<mpsc::Receiver<()>>,
}

#[derive(Default)]
struct Inner {
    pending: HashMap<String, Vec<Alert>>,
    fetch_fails: bool,
    failing_acks: HashSet<AlertId>,
    fetches: Vec<String>,
    acks: Vec<(AlertId, Instant)>,
    feeds: Vec<Feed>,
}

#[derive(Clone, Default)]
struct FakeSource(Arc<Mutex<Inner>>);

impl FakeSource {
    fn with_pending(overlay_id: &str, alerts: Vec<Alert>) -> Self {
        let fake = Self::default();
        fake.0
            .lock()
            .unwrap()
            .pending
            .insert(overlay_id.to_string(), alerts);
        fake
    }

    fn fail_fetch(&self) {
        self.0.lock().unwrap().fetch_fails = true;
    }

    fn fail_ack(&self, id: i64) {
        self.0.lock().unwrap().failing_acks.insert(AlertId::Int(id));
    }

    fn fetches(&self) -> Vec<String> {
        self.0.lock().unwrap().fetches.clone()
    }

    fn acks(&self) -> Vec<(AlertId, Instant)> {
        self.0.lock().unwrap().acks.clone()
    }

    fn ack_ids(&self) -> Vec<AlertId> {
        self.acks().into_iter().map(|(id, _)| id).collect()
    }

    fn feed_sender(&self, overlay_id: &str) -> Option<mpsc::Sender<Alert>> {
        self.0
            .lock()
            .unwrap()
            .feeds
            .iter()
            .rev()
            .find(|f| f.overlay_id == overlay_id)
            .map(|f| f.alerts.clone())
    }

    fn take_shutdown(&self, overlay_id: &str) -> Option<mpsc::Receiver<()>> {
        self.0
            .lock()
            .unwrap()
            .feeds
            .iter_mut()
            .rev()
            .find(|f| f.overlay_id == overlay_id)
            .and_then(|f| f.shutdown.take())
    }

    async fn wait_for_feed(&self, overlay_id: &str) -> mpsc::Sender<Alert> {
        for _ in 0..100 {
            if let Some(tx) = self.feed_sender(overlay_id) {
                return tx;
            }
            tokio::task::yield_now().await;
        }
        panic!("no subscription for {overlay_id}");
    }

    async fn wait_for_acks(&self, count: usize) {
        for _ in 0..100 {
            if self.acks().len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} acks, got {:?}", self.ack_ids());
    }
}

impl AlertSource for FakeSource {
    type Error = FakeError;

    async fn fetch_pending(&self, overlay_id: &str) -> Result<Vec<Alert>, FakeError> {
        let mut inner = self.0.lock().unwrap();
        inner.fetches.push(overlay_id.to_string());
        if inner.fetch_fails {
            return Err(FakeError);
        }
        Ok(inner.pending.get(overlay_id).cloned().unwrap_or_default())
    }

    async fn subscribe_created(&self, overlay_id: &str) -> Result<Subscription, FakeError> {
        let (alert_tx, alert_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        self.0.lock().unwrap().feeds.push(Feed {
            overlay_id: overlay_id.to_string(),
            alerts: alert_tx,
            shutdown: Some(shutdown_rx),
        });
        Ok(Subscription::new(alert_rx, shutdown_tx))
    }

    async fn mark_shown(&self, id: &AlertId) -> Result<(), FakeError> {
        let mut inner = self.0.lock().unwrap();
        inner.acks.push((id.clone(), Instant::now()));
        if inner.failing_acks.contains(id) {
            return Err(FakeError);
        }
        Ok(())
    }
}

fn alert(id: i64) -> Alert {
    let mut payload = Map::new();
    payload.insert("message".into(), json!(format!("alert {id}")));
    Alert::new(id, payload)
}

fn shown_alert(id: i64) -> Alert {
    Alert {
        is_shown: true,
        ..alert(id)
    }
}

async fn settle_until_seen(queue: &AlertQueue, seen: usize) {
    for _ in 0..100 {
        if queue.inspect().await.unwrap().seen >= seen {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("queue never saw {seen} alerts");
}

#[tokio::test(start_paused = true)]
async fn admit_into_idle_queue_is_displayed_immediately() {
    let queue = AlertQueue::spawn(FakeSource::default());

    assert!(queue.admit(alert(1)).await.unwrap());
    let snap = queue.inspect().await.unwrap();

    assert_eq!(snap.phase, Phase::Displaying);
    assert_eq!(snap.active.map(|a| a.id), Some(AlertId::Int(1)));
    assert!(!snap.is_settling);
    assert_eq!(queue.active_alert().map(|a| a.id), Some(AlertId::Int(1)));
}

#[tokio::test(start_paused = true)]
async fn default_timing_is_five_seconds_display_then_one_second_settle() {
    let fake = FakeSource::default();
    let queue = AlertQueue::spawn(fake.clone());
    let start = Instant::now();

    queue.admit(alert(1)).await.unwrap();

    sleep(Duration::from_millis(4999)).await;
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Displaying);
    assert!(fake.acks().is_empty());

    sleep(Duration::from_millis(1)).await;
    let snap = queue.inspect().await.unwrap();
    assert_eq!(snap.phase, Phase::Settling);
    assert!(queue.is_settling());
    assert_eq!(snap.active.map(|a| a.id), Some(AlertId::Int(1)));

    fake.wait_for_acks(1).await;
    let (acked, at) = fake.acks()[0].clone();
    assert_eq!(acked, AlertId::Int(1));
    assert_eq!(at - start, Duration::from_millis(5000));

    sleep(Duration::from_millis(999)).await;
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Settling);

    sleep(Duration::from_millis(1)).await;
    let snap = queue.inspect().await.unwrap();
    assert_eq!(snap.phase, Phase::Idle);
    assert!(snap.active.is_none());
    assert!(snap.queued.is_empty());
    assert_eq!(Instant::now() - start, Duration::from_millis(6000));
    assert_eq!(snap.acknowledged, 1);
}

#[tokio::test(start_paused = true)]
async fn alerts_are_shown_in_admission_order_each_acked_once() {
    let fake = FakeSource::default();
    let queue = AlertQueue::spawn(fake.clone());

    for id in [3, 1, 2] {
        queue.admit(alert(id)).await.unwrap();
    }

    let mut shown = Vec::new();
    for _ in 0..3 {
        let snap = queue.inspect().await.unwrap();
        shown.push(snap.active.map(|a| a.id).unwrap());
        sleep(Duration::from_millis(6000)).await;
    }

    fake.wait_for_acks(3).await;
    let expected = vec![AlertId::Int(3), AlertId::Int(1), AlertId::Int(2)];
    assert_eq!(shown, expected);
    assert_eq!(fake.ack_ids(), expected);
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn failed_ack_still_removes_alert_and_advances() {
    let fake = FakeSource::default();
    fake.fail_ack(1);
    let queue = AlertQueue::spawn(fake.clone());

    queue.admit(alert(1)).await.unwrap();
    queue.admit(alert(2)).await.unwrap();

    sleep(Duration::from_millis(6000)).await;
    let snap = queue.inspect().await.unwrap();
    assert_eq!(snap.phase, Phase::Displaying);
    assert_eq!(snap.active.map(|a| a.id), Some(AlertId::Int(2)));
    assert_eq!(snap.queued, vec![AlertId::Int(2)]);
    assert_eq!(snap.ack_failures, 1);
    assert_eq!(fake.ack_ids(), vec![AlertId::Int(1)]);
}

#[tokio::test(start_paused = true)]
async fn duration_override_applies_to_next_display() {
    let fake = FakeSource::default();
    let queue = AlertQueue::spawn(fake.clone());
    queue.configure("", Some("3".into())).await.unwrap();

    queue.admit(alert(1)).await.unwrap();
    sleep(Duration::from_millis(2999)).await;
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Displaying);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Settling);
    assert_eq!(queue.snapshot().display_duration_ms, 3000);
}

#[tokio::test(start_paused = true)]
async fn invalid_duration_override_falls_back_to_default() {
    let queue = AlertQueue::spawn(FakeSource::default());
    queue.configure("", Some("abc".into())).await.unwrap();

    queue.admit(alert(1)).await.unwrap();
    sleep(Duration::from_millis(4999)).await;
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Displaying);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Settling);
}

#[tokio::test(start_paused = true)]
async fn reconfiguring_mid_display_does_not_rearm_timer() {
    let queue = AlertQueue::spawn(FakeSource::default());

    queue.admit(alert(1)).await.unwrap();
    queue.admit(alert(2)).await.unwrap();
    sleep(Duration::from_millis(1000)).await;
    queue.configure("", Some("3".into())).await.unwrap();

    // In-flight display keeps its original five seconds.
    sleep(Duration::from_millis(3000)).await;
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Displaying);
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Settling);

    // Next alert uses the new three seconds.
    sleep(Duration::from_millis(1000)).await;
    let snap = queue.inspect().await.unwrap();
    assert_eq!(snap.active.map(|a| a.id), Some(AlertId::Int(2)));
    sleep(Duration::from_millis(3000)).await;
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Settling);
}

#[tokio::test(start_paused = true)]
async fn bulk_fetch_and_feed_overlap_is_deduplicated() {
    let fake = FakeSource::with_pending("overlay-1", vec![alert(1), alert(2)]);
    let queue = AlertQueue::spawn(fake.clone());

    queue.configure("overlay-1", None).await.unwrap();
    settle_until_seen(&queue, 2).await;

    let feed = fake.wait_for_feed("overlay-1").await;
    feed.send(alert(1)).await.unwrap();
    feed.send(alert(3)).await.unwrap();
    settle_until_seen(&queue, 3).await;

    let snap = queue.inspect().await.unwrap();
    assert_eq!(
        snap.queued,
        vec![AlertId::Int(1), AlertId::Int(2), AlertId::Int(3)]
    );
    assert_eq!(snap.overlay_id.as_deref(), Some("overlay-1"));
    assert!(!queue.admit(alert(1)).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn feed_ignores_alerts_already_shown() {
    let fake = FakeSource::default();
    let queue = AlertQueue::spawn(fake.clone());
    queue.configure("overlay-1", None).await.unwrap();

    let feed = fake.wait_for_feed("overlay-1").await;
    feed.send(shown_alert(7)).await.unwrap();
    feed.send(alert(8)).await.unwrap();
    settle_until_seen(&queue, 1).await;

    let snap = queue.inspect().await.unwrap();
    assert_eq!(snap.queued, vec![AlertId::Int(8)]);
    assert_eq!(snap.seen, 1);
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_leaves_feed_as_delivery_path() {
    let fake = FakeSource::default();
    fake.fail_fetch();
    let queue = AlertQueue::spawn(fake.clone());
    queue.configure("overlay-1", None).await.unwrap();

    let feed = fake.wait_for_feed("overlay-1").await;
    feed.send(alert(4)).await.unwrap();
    settle_until_seen(&queue, 1).await;

    assert_eq!(fake.fetches(), vec!["overlay-1".to_string()]);
    assert_eq!(queue.active_alert().map(|a| a.id), Some(AlertId::Int(4)));
}

#[tokio::test(start_paused = true)]
async fn identity_change_unsubscribes_stale_feed_and_keeps_dedup() {
    let fake = FakeSource::with_pending("a", vec![alert(1)]);
    let queue = AlertQueue::spawn(fake.clone());

    queue.configure("a", None).await.unwrap();
    fake.wait_for_feed("a").await;
    settle_until_seen(&queue, 1).await;
    let mut stale_shutdown = fake.take_shutdown("a").unwrap();

    queue.configure("b", None).await.unwrap();
    assert_eq!(stale_shutdown.recv().await, Some(()));

    let feed_b = fake.wait_for_feed("b").await;
    feed_b.send(alert(1)).await.unwrap();
    feed_b.send(alert(5)).await.unwrap();
    settle_until_seen(&queue, 2).await;

    let snap = queue.inspect().await.unwrap();
    assert_eq!(fake.fetches(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(snap.queued, vec![AlertId::Int(1), AlertId::Int(5)]);
    assert_eq!(snap.overlay_id.as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn same_identity_only_updates_duration() {
    let fake = FakeSource::default();
    let queue = AlertQueue::spawn(fake.clone());

    queue.configure("a", None).await.unwrap();
    fake.wait_for_feed("a").await;
    queue.configure("a", Some("8".into())).await.unwrap();

    let snap = queue.inspect().await.unwrap();
    tokio::task::yield_now().await;
    assert_eq!(fake.fetches(), vec!["a".to_string()]);
    assert_eq!(snap.display_duration_ms, 8000);
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_feed_but_not_in_flight_alert() {
    let fake = FakeSource::default();
    let queue = AlertQueue::spawn(fake.clone());
    queue.configure("a", None).await.unwrap();

    let feed = fake.wait_for_feed("a").await;
    feed.send(alert(1)).await.unwrap();
    settle_until_seen(&queue, 1).await;
    let mut shutdown = fake.take_shutdown("a").unwrap();

    queue.dispose().await.unwrap();
    assert_eq!(shutdown.recv().await, Some(()));
    assert!(queue.inspect().await.unwrap().overlay_id.is_none());

    sleep(Duration::from_millis(6000)).await;
    fake.wait_for_acks(1).await;
    assert_eq!(fake.ack_ids(), vec![AlertId::Int(1)]);
    assert_eq!(queue.inspect().await.unwrap().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_finishes_only_the_active_alert() {
    let fake = FakeSource::default();
    let queue = AlertQueue::spawn(fake.clone());
    queue.admit(alert(1)).await.unwrap();
    queue.admit(alert(2)).await.unwrap();
    drop(queue);

    sleep(Duration::from_secs(30)).await;
    fake.wait_for_acks(1).await;
    assert_eq!(fake.ack_ids(), vec![AlertId::Int(1)]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_resolves_after_in_flight_alert_is_acknowledged() {
    let fake = FakeSource::default();
    let queue = AlertQueue::spawn(fake.clone());
    let other = queue.clone();
    queue.configure("a", None).await.unwrap();
    fake.wait_for_feed("a").await;
    let mut feed_shutdown = fake.take_shutdown("a").unwrap();
    queue.admit(alert(1)).await.unwrap();
    queue.admit(alert(2)).await.unwrap();
    let start = Instant::now();

    queue.shutdown().await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(6000));
    assert_eq!(feed_shutdown.recv().await, Some(()));
    fake.wait_for_acks(1).await;
    assert_eq!(fake.ack_ids(), vec![AlertId::Int(1)]);
    assert!(matches!(other.inspect().await, Err(QueueError::Closed)));
    assert!(matches!(other.admit(alert(3)).await, Err(QueueError::Closed)));
}
