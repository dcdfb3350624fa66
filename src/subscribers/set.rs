//! # Fan-out of bus events to subscribers.
//!
//! Every subscriber gets its own bounded queue and worker task, so a slow or
//! panicking subscriber only ever hurts itself:
//!
//! ```text
//! Bus ──► forward_from ──► emit_arc(event)
//!                              ├──► queue ──► worker ──► LogWriter.on_event()
//!                              ├──► queue ──► worker ──► audit.on_event()  ── panic ──► SubscriberPanicked
//!                              └──► queue (full) ──x  SubscriberOverflow
//! ```
//!
//! Each subscriber sees events in publish order; there is no ordering between
//! subscribers. A panic inside `on_event` is caught (`AssertUnwindSafe`), logged and
//! published, and the worker moves on to the next event. State the subscriber shares
//! behind a lock may be left half-updated by such a panic.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Queue {
    subscriber: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Subscribers with their queues and workers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Must be called inside a tokio runtime.
    ///
    /// Queue capacity comes from [`Subscribe::queue_capacity`] (at least 1). `bus`
    /// receives the set's own `SubscriberOverflow` / `SubscriberPanicked` events.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (queues, workers): (Vec<Queue>, Vec<JoinHandle<()>>) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let queue = Queue {
                    subscriber: sub.name(),
                    tx,
                };
                (queue, spawn_worker(sub, rx, bus.clone()))
            })
            .unzip();

        Self {
            queues,
            workers,
            bus,
        }
    }

    /// Queues a copy of `event` for every subscriber.
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Queues `event` for every subscriber without waiting.
    ///
    /// A subscriber whose queue is full (or whose worker is gone) misses the event
    /// and a `SubscriberOverflow` is published, except for overflow events
    /// themselves.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let report = event.kind != EventKind::SubscriberOverflow;

        for queue in &self.queues {
            let reason = match queue.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if report {
                warn!(subscriber = queue.subscriber, reason, "subscriber missed an event");
                self.bus
                    .publish(Event::subscriber_overflow(queue.subscriber, reason));
            }
        }
    }

    /// Spawns the listener that forwards every bus event into this set.
    ///
    /// The listener runs until `stop` is cancelled or the bus is closed. On stop,
    /// events already queued on the bus are still forwarded before it exits.
    /// Lagging only skips the missed events. Events produced by this set's own
    /// workers (`SubscriberOverflow`, `SubscriberPanicked`) are not forwarded back
    /// into it; they are logged by the workers and remain visible on the bus.
    pub fn forward_from(self: &Arc<Self>, bus: &Bus, stop: CancellationToken) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let set = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                let res = tokio::select! {
                    biased;
                    res = rx.recv() => res,
                    _ = stop.cancelled() => break,
                };

                match res {
                    Ok(ev)
                        if matches!(
                            ev.kind,
                            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
                        ) =>
                    {
                        continue;
                    }
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Returns true if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Closes every queue and waits for the workers to process what is left.
    pub async fn shutdown(self) {
        drop(self.queues);
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "subscriber worker aborted");
            }
        }
    }
}

fn spawn_worker(
    sub: Arc<dyn Subscribe>,
    mut rx: mpsc::Receiver<Arc<Event>>,
    bus: Bus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            let delivery = std::panic::AssertUnwindSafe(sub.on_event(&ev)).catch_unwind();
            if let Err(panic) = delivery.await {
                let info = panic_message(&*panic);
                warn!(subscriber = sub.name(), %info, "subscriber panicked");
                bus.publish(Event::subscriber_panicked(sub.name(), info));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploder;

    #[async_trait]
    impl Subscribe for Exploder {
        async fn on_event(&self, _event: &Event) {
            panic!("exploded");
        }

        fn name(&self) -> &'static str {
            "exploder"
        }
    }

    #[tokio::test]
    async fn test_forward_from_delivers_bus_events() {
        let bus = Bus::new(16);
        let recorder = Arc::new(Recorder::default());
        let set = Arc::new(SubscriberSet::new(vec![recorder.clone()], bus.clone()));
        let stop = CancellationToken::new();
        let listener = set.forward_from(&bus, stop.clone());

        bus.publish(Event::new(EventKind::ServerStarting));
        bus.publish(Event::new(EventKind::ServerListening));

        for _ in 0..100 {
            if recorder.seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![EventKind::ServerStarting, EventKind::ServerListening]
        );

        stop.cancel();
        listener.await.unwrap();
    }

    struct Stalled(tokio::sync::Notify);

    #[async_trait]
    impl Subscribe for Stalled {
        async fn on_event(&self, _event: &Event) {
            self.0.notified().await;
        }

        fn name(&self) -> &'static str {
            "stalled"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_full_queue_reports_overflow() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let stalled = Arc::new(Stalled(tokio::sync::Notify::new()));
        let set = SubscriberSet::new(vec![stalled.clone()], bus.clone());

        // One event is held by the worker, one fills the queue, the third overflows.
        set.emit(&Event::new(EventKind::ConnectionOpened));
        tokio::time::sleep(Duration::from_millis(20)).await;
        set.emit(&Event::new(EventKind::ConnectionOpened));
        set.emit(&Event::new(EventKind::ConnectionOpened));

        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("overflow published")
            .unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.task.as_deref(), Some("stalled"));
        assert_eq!(ev.reason.as_deref(), Some("full"));

        stalled.0.notify_one();
        stalled.0.notify_one();
        set.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_survives_aborted_worker() {
        let bus = Bus::new(16);
        let stalled = Arc::new(Stalled(tokio::sync::Notify::new()));
        let set = SubscriberSet::new(vec![stalled], bus);

        set.workers[0].abort();
        tokio::time::timeout(Duration::from_secs(2), set.shutdown())
            .await
            .expect("shutdown completes");
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let recorder = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![Arc::new(Exploder), recorder.clone()], bus.clone());
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::ServerStopped));

        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("panic event published")
            .unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.task.as_deref(), Some("exploder"));
        assert_eq!(ev.reason.as_deref(), Some("exploded"));

        set.shutdown().await;
        assert_eq!(*recorder.seen.lock().unwrap(), vec![EventKind::ServerStopped]);
    }
}
