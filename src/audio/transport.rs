//! Contracts of the external voice collaborators.
//!
//! The subscription never talks to songbird directly: it only sees these
//! traits, which keeps the reconnect policy testable with in-memory fakes.
//! The production implementations live in [`crate::voice`].

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::Input;
use std::{sync::Arc, time::Duration};
use tokio::sync::{broadcast, watch};

use crate::{
    audio::state::{ConnectionState, ConnectionStatus, PlayerEvent, PlayerStatus},
    error::{PlaybackError, TransportError},
};

/// A connection to a voice endpoint.
#[async_trait]
pub trait VoiceTransport: Send + Sync + 'static {
    /// Receiver over the connection state; the current value is always
    /// readable and every transition bumps the version.
    fn subscribe(&self) -> watch::Receiver<ConnectionState>;

    /// Consecutive rejoin attempts since the last time the transport was
    /// `Ready`.
    fn rejoin_attempts(&self) -> u32;

    /// Requests a reconnection to the same channel.
    async fn rejoin(&self) -> Result<(), TransportError>;

    /// Tears the connection down. Idempotent: destroying an already destroyed
    /// transport does nothing.
    async fn destroy(&self);

    fn state(&self) -> ConnectionState {
        let rx = self.subscribe();
        let state = rx.borrow().clone();
        state
    }
}

/// Audio output bound to a transport.
#[async_trait]
pub trait VoicePlayer: Send + Sync + 'static {
    fn status(&self) -> PlayerStatus;

    /// State changes and errors, in emission order.
    fn events(&self) -> broadcast::Receiver<PlayerEvent>;

    /// Starts playing `input`, replacing whatever was loaded.
    async fn play(&self, input: Input) -> Result<(), PlaybackError>;

    /// Stops playback. With `force` the player drops to `Idle` immediately
    /// instead of waiting for the driver to acknowledge.
    async fn stop(&self, force: bool);

    /// How long the current resource has been playing; zero while idle.
    async fn playback_duration(&self) -> Duration;
}

/// Opens transports. One call per new subscription.
#[async_trait]
pub trait VoiceConnector: Send + Sync + 'static {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(Arc<dyn VoiceTransport>, Arc<dyn VoicePlayer>), TransportError>;
}

/// Waits until the transport reaches `status`, for at most `limit`.
///
/// Resolves immediately if the transport is already there.
pub async fn enters_state(
    rx: &mut watch::Receiver<ConnectionState>,
    status: ConnectionStatus,
    limit: Duration,
) -> Result<(), TransportError> {
    enters_any_state(rx, &[status], limit).await
}

/// Like [`enters_state`], for the first of several target statuses.
///
/// A timeout reports the first status of `targets`.
pub async fn enters_any_state(
    rx: &mut watch::Receiver<ConnectionState>,
    targets: &[ConnectionStatus],
    limit: Duration,
) -> Result<(), TransportError> {
    let reached = rx.wait_for(|state| targets.contains(&state.status()));
    match tokio::time::timeout(limit, reached).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(TransportError::Closed),
        Err(_) => Err(TransportError::Timeout {
            status: targets.first().copied().unwrap_or(ConnectionStatus::Ready),
            after: limit,
        }),
    }
}
