//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for observing an order's amend countdown.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The customer wants to top up the order. The server pauses the
    /// countdown, marks the order active for the next checkout and closes
    /// the socket.
    AddMoreItems,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on a live countdown.
    CountdownStarted {
        order_id: Uuid,
        remaining_secs: u32,
        display: String,
    },

    /// Sent once per second while the countdown runs.
    Tick { remaining_secs: u32, display: String },

    /// The countdown was paused so more items can be added.
    Paused { order_id: Uuid, remaining_secs: u32 },

    /// The amend window has closed; the order can only be tracked now.
    Expired {
        order_id: Uuid,
        tracking_reference: String,
        eta_minutes: u32,
    },

    /// Reports a fatal error to the client, which should display an error message.
    Error { message: String },
}
