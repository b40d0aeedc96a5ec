use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use msgs::event::PlacementEvent;
use msgs::server_msg::ServerMsg;
use tokio::sync::{broadcast, mpsc};

#[derive(Debug)]
pub enum BatcherMsg {
    Events(Vec<PlacementEvent>),
    Join,
    Leave,
}

/// Handle onto the batcher task. Cheap to clone; request handlers and
/// connection processes only ever talk to the task through this.
#[derive(Clone)]
pub struct BroadcastHandle {
    to_batcher: mpsc::UnboundedSender<BatcherMsg>,
    frames: broadcast::Sender<String>,
    viewer_count: Arc<AtomicUsize>,
}

impl BroadcastHandle {
    /// Queue events for the next batch frame.
    pub fn publish(&self, events: Vec<PlacementEvent>) {
        if self.to_batcher.send(BatcherMsg::Events(events)).is_err() {
            tracing::warn!("broadcast batcher is gone, dropping events");
        }
    }

    pub fn viewer_joined(&self) {
        let _ = self.to_batcher.send(BatcherMsg::Join);
    }

    pub fn viewer_left(&self) {
        let _ = self.to_batcher.send(BatcherMsg::Leave);
    }

    /// Serialized frames, ready to push to a socket.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.frames.subscribe()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewer_count.load(Ordering::Relaxed)
    }
}

/// Spawn the single batcher task. It alone owns the pending queue and the
/// viewer counter: placements coalesce until the tick fires and go out as
/// one `placement_batch` frame, while join/leave changes push a
/// `connected_count` frame immediately. The task ends when every handle is
/// dropped.
pub fn spawn_batcher_process(tick: Duration) -> BroadcastHandle {
    let (to_batcher, mut from_handles) = mpsc::unbounded_channel();
    let (frames, _) = broadcast::channel::<String>(256);
    let viewer_count = Arc::new(AtomicUsize::new(0));

    let handle = BroadcastHandle {
        to_batcher,
        frames: frames.clone(),
        viewer_count: viewer_count.clone(),
    };

    tokio::spawn(async move {
        let mut queue: Vec<PlacementEvent> = Vec::new();
        let mut count = 0usize;
        let mut interval = tokio::time::interval(tick);
        // the first tick completes immediately; the queue cannot have
        // anything in it yet
        interval.tick().await;
        loop {
            tokio::select! {
                msg = from_handles.recv() => {
                    let Some(msg) = msg else { break };
                    match msg {
                        BatcherMsg::Events(events) => queue.extend(events),
                        BatcherMsg::Join => {
                            count += 1;
                            viewer_count.store(count, Ordering::Relaxed);
                            send_frame(&frames, &ServerMsg::ConnectedCount { count });
                        }
                        BatcherMsg::Leave => {
                            count = count.saturating_sub(1);
                            viewer_count.store(count, Ordering::Relaxed);
                            send_frame(&frames, &ServerMsg::ConnectedCount { count });
                        }
                    }
                }
                _ = interval.tick() => {
                    if queue.is_empty() {
                        continue;
                    }
                    let events = std::mem::take(&mut queue);
                    tracing::debug!(batched = events.len(), "pushing placement batch");
                    send_frame(&frames, &ServerMsg::PlacementBatch { events });
                }
            }
        }
    });

    handle
}

fn send_frame(frames: &broadcast::Sender<String>, msg: &ServerMsg) {
    match serde_json::to_string(msg) {
        // send only fails with no subscribers, which is fine
        Ok(json) => {
            let _ = frames.send(json);
        }
        Err(e) => tracing::error!("error while encoding broadcast frame: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next_msg(rx: &mut broadcast::Receiver<String>) -> ServerMsg {
        let json = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("frame before timeout")
            .expect("channel open");
        serde_json::from_str(&json).expect("valid frame")
    }

    #[tokio::test]
    async fn events_coalesce_into_one_frame() {
        let handle = spawn_batcher_process(Duration::from_millis(10));
        let mut rx = handle.subscribe();

        let event = |color: u8| PlacementEvent {
            x: 0,
            y: 0,
            color_index: color,
            user_id: "u1".to_string(),
            timestamp: 1,
        };
        handle.publish(vec![event(1), event(2)]);
        handle.publish(vec![event(3)]);

        match next_msg(&mut rx).await {
            ServerMsg::PlacementBatch { events } => assert_eq!(events.len(), 3),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn join_and_leave_push_counts_immediately() {
        let handle = spawn_batcher_process(Duration::from_secs(3600));
        let mut rx = handle.subscribe();

        handle.viewer_joined();
        match next_msg(&mut rx).await {
            ServerMsg::ConnectedCount { count } => assert_eq!(count, 1),
            other => panic!("unexpected frame: {other:?}"),
        }
        assert_eq!(handle.viewer_count(), 1);

        handle.viewer_left();
        match next_msg(&mut rx).await {
            ServerMsg::ConnectedCount { count } => assert_eq!(count, 0),
            other => panic!("unexpected frame: {other:?}"),
        }
        assert_eq!(handle.viewer_count(), 0);
    }

    #[tokio::test]
    async fn empty_ticks_push_nothing() {
        let handle = spawn_batcher_process(Duration::from_millis(5));
        let mut rx = handle.subscribe();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
