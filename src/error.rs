//! Error types for the playback core.
//!
//! Nothing here is fatal for the process: the subscription and the service
//! turn every variant into a callback, a [`Notice`](crate::audio::notice::Notice)
//! or a log line.

use std::time::Duration;

use thiserror::Error;

use crate::audio::state::{ConnectionStatus, PlayerStatus};

/// Failures around a single track once it is already queued.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The track resolved, but no audio stream came back.
    #[error("no audio stream available for {0}")]
    StreamUnavailable(String),

    /// The media behind the track could not be reached at play time.
    #[error("stream acquisition failed for {url}: {reason}")]
    StreamAcquisition { url: String, reason: String },

    /// The player reported an error mid-stream.
    #[error("player error: {0}")]
    Player(String),

    /// The transport refused the operation.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures of the voice transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A bounded wait for a connection state ran out.
    #[error("timed out after {after:?} waiting for {status:?}")]
    Timeout {
        status: ConnectionStatus,
        after: Duration,
    },

    /// The state channel was closed (transport dropped).
    #[error("transport state channel closed")]
    Closed,

    /// Joining or rejoining the voice channel failed.
    #[error("join failed: {0}")]
    Join(String),

    /// The transport attempted a transition the state machine forbids.
    #[error("illegal connection transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: ConnectionStatus,
        to: ConnectionStatus,
    },

    /// The player attempted a transition the state machine forbids.
    #[error("illegal player transition {from:?} -> {to:?}")]
    IllegalPlayerTransition { from: PlayerStatus, to: PlayerStatus },
}

/// Failures inside a track resolver. Never leaves the resolver: it is folded
/// into a `NotTarget` notice with the matching reason code.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to spawn yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("yt-dlp exited with an error: {0}")]
    Extractor(String),

    #[error("invalid yt-dlp output: {0}")]
    Json(#[from] serde_json::Error),
}
