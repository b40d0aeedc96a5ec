use futures::{FutureExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use warp::ws::{Message, WebSocket};

use crate::context::AppContextRef;

/// One subscribed viewer. The channel is push-only: batched placement frames
/// and connected-count frames flow out, anything the client sends besides a
/// close is ignored.
pub async fn viewer_connection_process(ws: WebSocket, context: AppContextRef) {
    let (viewer_ws_sender, mut viewer_ws_rcv) = ws.split();
    let (to_viewer, viewer_rcv) = mpsc::unbounded_channel();

    let viewer_rcv_stream = UnboundedReceiverStream::new(viewer_rcv);
    tokio::task::spawn(viewer_rcv_stream.forward(viewer_ws_sender).map(|result| {
        if let Err(e) = result {
            tracing::debug!("error sending websocket msg: {e}");
        }
    }));

    let mut frames = context.broadcast.subscribe();
    context.broadcast.viewer_joined();
    tracing::debug!("viewer connected");

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Ok(frame) => {
                        if to_viewer.send(Ok(Message::text(frame))).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("slow viewer skipped {skipped} frames");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = viewer_ws_rcv.next() => {
                match incoming {
                    Some(Ok(msg)) => {
                        if msg.is_close() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!("error receiving ws message: {e}");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    context.broadcast.viewer_left();
    tracing::debug!("viewer disconnected");
}
