//! Connection and player state machines.
//!
//! Both external collaborators (the voice transport and the audio player)
//! report their state as one of these tagged values. Implementations advance
//! them through [`ConnectionState::transition`] / [`PlayerStatus::transition`]
//! so an illegal jump surfaces as an error instead of silently corrupting the
//! subscription's view of the world.

use crate::error::TransportError;

/// Close code sent by the voice gateway when the bot was moved or kicked.
pub const CLOSE_CODE_DISCONNECTED: u16 = 4014;

/// Payload-free discriminant of [`ConnectionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Signalling,
    Connecting,
    Ready,
    Disconnected,
    Destroyed,
}

/// Why the transport dropped to `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The voice websocket closed; `code` is the close code when known.
    WebSocketClose { code: Option<u16> },
    /// Any other failure (timeouts, IO, rejected join...).
    Other(String),
}

impl DisconnectReason {
    /// `true` for the "moved or kicked" close code.
    pub fn is_moved_or_kicked(&self) -> bool {
        matches!(
            self,
            DisconnectReason::WebSocketClose {
                code: Some(CLOSE_CODE_DISCONNECTED)
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Signalling,
    Connecting,
    Ready,
    Disconnected(DisconnectReason),
    Destroyed,
}

impl ConnectionState {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Signalling => ConnectionStatus::Signalling,
            ConnectionState::Connecting => ConnectionStatus::Connecting,
            ConnectionState::Ready => ConnectionStatus::Ready,
            ConnectionState::Disconnected(_) => ConnectionStatus::Disconnected,
            ConnectionState::Destroyed => ConnectionStatus::Destroyed,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, ConnectionState::Destroyed)
    }

    /// Whether `self -> next` is an edge of the connection state machine.
    ///
    /// `Destroyed` is absorbing and reachable from every other state. A
    /// disconnected transport may be re-signalled by a rejoin.
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        use ConnectionStatus::*;

        match (self.status(), next.status()) {
            (Destroyed, _) => false,
            (_, Destroyed) => true,
            (Signalling, Connecting | Ready | Disconnected) => true,
            (Connecting, Ready | Disconnected | Signalling) => true,
            (Ready, Connecting | Signalling | Disconnected) => true,
            (Disconnected, Signalling | Connecting) => true,
            _ => false,
        }
    }

    /// Applies `next`, returning the previous state.
    pub fn transition(&mut self, next: ConnectionState) -> Result<ConnectionState, TransportError> {
        if !self.can_transition_to(&next) {
            return Err(TransportError::IllegalTransition {
                from: self.status(),
                to: next.status(),
            });
        }
        Ok(std::mem::replace(self, next))
    }
}

/// Playback state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerStatus {
    Idle,
    Buffering,
    Playing,
    Paused,
    /// Paused by the driver because no connection is listening.
    AutoPaused,
}

impl PlayerStatus {
    /// Anything other than `Idle` means a resource is loaded.
    pub fn is_loaded(self) -> bool {
        !matches!(self, PlayerStatus::Idle)
    }

    pub fn can_transition_to(self, next: PlayerStatus) -> bool {
        use PlayerStatus::*;

        match (self, next) {
            (a, b) if a == b => false,
            // stop() is valid from anywhere, and so is a fresh play().
            (_, Idle) | (Idle, Buffering | Playing) => true,
            (Buffering, Playing | Paused) => true,
            (Playing, Buffering | Paused | AutoPaused) => true,
            (Paused | AutoPaused, Playing | Buffering) => true,
            (AutoPaused, Paused) | (Paused, AutoPaused) => true,
            _ => false,
        }
    }

    pub fn transition(&mut self, next: PlayerStatus) -> Result<PlayerStatus, TransportError> {
        if !self.can_transition_to(next) {
            return Err(TransportError::IllegalPlayerTransition { from: *self, to: next });
        }
        Ok(std::mem::replace(self, next))
    }
}

/// Notifications emitted by a player.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    StateChange { old: PlayerStatus, new: PlayerStatus },
    Error(String),
}
