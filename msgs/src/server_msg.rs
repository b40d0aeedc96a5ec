use serde::{Deserialize, Serialize};

use crate::event::PlacementEvent;

/// Frames pushed to subscribed viewers over the websocket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    /// All placements coalesced since the previous tick, delivered as one
    /// frame.
    #[serde(rename = "placement_batch")]
    PlacementBatch { events: Vec<PlacementEvent> },

    /// Live viewer count, sent on every join/leave (never batched).
    #[serde(rename = "connected_count")]
    ConnectedCount { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_frame_wire_shape() {
        let msg = ServerMsg::PlacementBatch {
            events: vec![PlacementEvent {
                x: 3,
                y: 7,
                color_index: 5,
                user_id: "u1".to_string(),
                timestamp: 1700000000000,
            }],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"placement_batch\""));
        assert!(json.contains("\"colorIndex\":5"));
        assert!(json.contains("\"userId\":\"u1\""));
    }

    #[test]
    fn connected_count_roundtrip() {
        let json = serde_json::to_string(&ServerMsg::ConnectedCount { count: 12 }).unwrap();
        let back: ServerMsg = serde_json::from_str(&json).unwrap();
        match back {
            ServerMsg::ConnectedCount { count } => assert_eq!(count, 12),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
