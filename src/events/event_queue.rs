use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};

use crate::errors::{ServerError, ServerResult};
use crate::events::Event;

/// Default buffer size of a queue and its taps.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Bounded single-producer event channel with broadcast taps.
///
/// One queue backs one execution: the executor enqueues, the handler's event
/// pump dequeues, and resubscribing clients observe through [`tap`]. A tap is
/// a child queue that receives every event enqueued *after* its creation, in
/// enqueue order; it never sees history. Closing a queue closes all of its
/// taps, but a closed queue still hands out its buffered events before
/// `dequeue` starts returning `None`.
///
/// [`tap`]: EventQueue::tap
pub struct EventQueue {
    tx: mpsc::Sender<Event>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Event>>,
    taps: Mutex<Vec<Arc<EventQueue>>>,
    closed: watch::Sender<bool>,
    capacity: usize,
    /// Serializes producers so the consumer and every tap observe the same
    /// event order even when enqueues race.
    send_lock: tokio::sync::Mutex<()>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let (closed, _) = watch::channel(false);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            taps: Mutex::new(Vec::new()),
            closed,
            capacity,
            send_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Enqueue an event for the consumer and every live tap.
    ///
    /// Applies backpressure: waits for buffer space rather than dropping.
    /// Producers are serialized, so interleaved enqueues reach the consumer
    /// and every tap in one and the same order. Taps that have closed (their
    /// subscriber went away) are skipped and pruned; a closed queue rejects
    /// the event outright.
    pub async fn enqueue(&self, event: Event) -> ServerResult<()> {
        let _send = self.send_lock.lock().await;
        if self.is_closed() {
            return Err(ServerError::QueueClosed);
        }
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| ServerError::QueueClosed)?;

        // Fan out to taps, including taps of taps. Snapshot each taps list
        // (dropping closed entries) before awaiting so no lock is held
        // across a send.
        let mut pending: Vec<Arc<EventQueue>> = snapshot_live_taps(&self.taps);
        while let Some(tap) = pending.pop() {
            pending.extend(snapshot_live_taps(&tap.taps));
            if !tap.is_closed() {
                let _ = tap.tx.send(event.clone()).await;
            }
        }
        Ok(())
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the queue is closed and its buffer is drained.
    pub async fn dequeue(&self) -> Option<Event> {
        let mut rx = self.rx.lock().await;
        let mut closed = self.closed.subscribe();
        loop {
            if *closed.borrow() {
                return rx.try_recv().ok();
            }
            tokio::select! {
                event = rx.recv() => return event,
                changed = closed.changed() => {
                    if changed.is_err() {
                        return rx.try_recv().ok();
                    }
                }
            }
        }
    }

    /// Create a tap: a child queue that observes all events enqueued from
    /// this point on.
    pub fn tap(&self) -> Arc<EventQueue> {
        let child = Arc::new(EventQueue::with_capacity(self.capacity));
        self.taps.lock().unwrap().push(child.clone());
        child
    }

    /// Close the queue and all taps. Idempotent. Buffered events remain
    /// dequeueable; new enqueues fail with [`ServerError::QueueClosed`].
    pub fn close(&self) {
        let already_closed = self.closed.send_replace(true);
        if already_closed {
            return;
        }
        let taps = std::mem::take(&mut *self.taps.lock().unwrap());
        for tap in taps {
            tap.close();
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_live_taps(taps: &Mutex<Vec<Arc<EventQueue>>>) -> Vec<Arc<EventQueue>> {
    let mut taps = taps.lock().unwrap();
    taps.retain(|tap| !tap.is_closed());
    taps.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::{Message, Task, TaskState, TaskStatus, TaskStatusUpdateEvent};
    use std::time::Duration;

    fn status(task_id: &str, state: TaskState) -> Event {
        Event::StatusUpdate(TaskStatusUpdateEvent::new(
            task_id,
            "ctx",
            TaskStatus::new(state),
            state.is_terminal(),
        ))
    }

    #[tokio::test]
    async fn events_come_out_in_enqueue_order() {
        let queue = EventQueue::new();
        queue.enqueue(status("t1", TaskState::Submitted)).await.unwrap();
        queue.enqueue(status("t1", TaskState::Working)).await.unwrap();
        queue.enqueue(status("t1", TaskState::Completed)).await.unwrap();

        let states: Vec<TaskState> = [
            queue.dequeue().await.unwrap(),
            queue.dequeue().await.unwrap(),
            queue.dequeue().await.unwrap(),
        ]
        .into_iter()
        .map(|e| match e {
            Event::StatusUpdate(e) => e.status.state,
            other => panic!("unexpected event: {other:?}"),
        })
        .collect();
        assert_eq!(
            states,
            [TaskState::Submitted, TaskState::Working, TaskState::Completed]
        );
    }

    #[tokio::test]
    async fn taps_see_only_events_after_their_creation() {
        let queue = EventQueue::new();
        queue.enqueue(status("t1", TaskState::Submitted)).await.unwrap();

        let tap = queue.tap();
        queue.enqueue(status("t1", TaskState::Working)).await.unwrap();
        queue.enqueue(status("t1", TaskState::Completed)).await.unwrap();

        // Tap starts at the Working event, in order.
        match tap.dequeue().await.unwrap() {
            Event::StatusUpdate(e) => assert_eq!(e.status.state, TaskState::Working),
            other => panic!("unexpected event: {other:?}"),
        }
        match tap.dequeue().await.unwrap() {
            Event::StatusUpdate(e) => assert_eq!(e.status.state, TaskState::Completed),
            other => panic!("unexpected event: {other:?}"),
        }

        // Primary consumer still sees everything.
        match queue.dequeue().await.unwrap() {
            Event::StatusUpdate(e) => assert_eq!(e.status.state, TaskState::Submitted),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn taps_of_taps_receive_events_too() {
        let queue = EventQueue::new();
        let tap = queue.tap();
        let tap_of_tap = tap.tap();

        queue.enqueue(Event::Message(Message::agent_text("hi"))).await.unwrap();
        assert!(tap.dequeue().await.is_some());
        assert!(tap_of_tap.dequeue().await.is_some());
    }

    #[tokio::test]
    async fn racing_producers_reach_consumer_and_taps_in_the_same_order() {
        let queue = Arc::new(EventQueue::new());
        let tap = queue.tap();

        let mut producers = Vec::new();
        for p in 0..2 {
            let queue = queue.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..20 {
                    queue
                        .enqueue(Event::Message(Message::agent_text(format!("{p}-{i}"))))
                        .await
                        .unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }
        queue.close();

        let drain = |q: Arc<EventQueue>| async move {
            let mut texts = Vec::new();
            while let Some(event) = q.dequeue().await {
                if let Event::Message(m) = event {
                    texts.push(m.parts[0].as_text().unwrap().to_string());
                }
            }
            texts
        };
        let primary = drain(queue.clone()).await;
        let tapped = drain(tap).await;
        assert_eq!(primary.len(), 40);
        assert_eq!(primary, tapped);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_drains_the_buffer() {
        let queue = EventQueue::new();
        queue.enqueue(Event::Task(Task::new("t1", "ctx"))).await.unwrap();
        queue.enqueue(Event::Task(Task::new("t1", "ctx"))).await.unwrap();

        queue.close();
        queue.close();

        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn enqueue_after_close_is_rejected() {
        let queue = EventQueue::new();
        queue.close();
        let err = queue
            .enqueue(Event::Task(Task::new("t1", "ctx")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::QueueClosed));
    }

    #[tokio::test]
    async fn closing_the_parent_closes_its_taps() {
        let queue = EventQueue::new();
        let tap = queue.tap();
        queue.close();
        assert!(tap.is_closed());
        assert!(tap.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn close_wakes_a_blocked_consumer() {
        let queue = Arc::new(EventQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };
        tokio::task::yield_now().await;
        queue.close();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("consumer did not wake")
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn a_full_queue_applies_backpressure() {
        let queue = Arc::new(EventQueue::with_capacity(1));
        queue.enqueue(Event::Task(Task::new("t1", "ctx"))).await.unwrap();

        let blocked = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue.enqueue(Event::Task(Task::new("t1", "ctx"))).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        assert!(queue.dequeue().await.is_some());
        blocked.await.unwrap().unwrap();
    }
}
