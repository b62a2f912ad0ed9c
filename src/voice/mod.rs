//! Implementación de transporte y player sobre songbird.

mod player;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::context_data::DisconnectReason as DriverDisconnectReason,
    model::CloseCode,
    Call, CoreEvent, Event, EventContext, EventHandler as VoiceEventHandler, Songbird,
};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Weak,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        state::{ConnectionState, ConnectionStatus, DisconnectReason, CLOSE_CODE_DISCONNECTED},
        transport::{VoiceConnector, VoicePlayer, VoiceTransport},
    },
    error::TransportError,
};

pub use player::SongbirdPlayer;

/// Abre conexiones de voz con el manager de songbird.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(Arc<dyn VoiceTransport>, Arc<dyn VoicePlayer>), TransportError> {
        let transport = SongbirdTransport::join(self.manager.clone(), guild_id, channel_id).await?;
        let player = SongbirdPlayer::new(transport.call.clone());
        Ok((transport, player))
    }
}

/// Conexión a un canal de voz.
///
/// Traduce los eventos del driver de songbird a [`ConnectionState`] y
/// recuerda el canal para poder hacer rejoin.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<Mutex<Call>>,
    state: watch::Sender<ConnectionState>,
    rejoin_attempts: AtomicU32,
}

impl SongbirdTransport {
    pub async fn join(
        manager: Arc<Songbird>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<Self>, TransportError> {
        let call = manager.get_or_insert(guild_id);
        let (state, _) = watch::channel(ConnectionState::Signalling);
        let transport = Arc::new(Self {
            manager,
            guild_id,
            channel_id,
            call: call.clone(),
            state,
            rejoin_attempts: AtomicU32::new(0),
        });

        {
            let mut handler = call.lock().await;
            // un Call reutilizado puede traer handlers de una sesión anterior
            handler.remove_all_global_events();
            for event in [
                CoreEvent::DriverConnect,
                CoreEvent::DriverReconnect,
                CoreEvent::DriverDisconnect,
            ] {
                handler.add_global_event(
                    Event::Core(event),
                    DriverStateHandler {
                        transport: Arc::downgrade(&transport),
                    },
                );
            }
        }

        if let Err(e) = transport.connect_channel().await {
            transport.destroy().await;
            return Err(e);
        }
        Ok(transport)
    }

    async fn connect_channel(&self) -> Result<(), TransportError> {
        self.advance(ConnectionState::Connecting);

        match self.manager.join(self.guild_id, self.channel_id).await {
            Ok(call) => {
                if let Err(e) = call.lock().await.deafen(true).await {
                    debug!("No se pudo ensordecer en guild {}: {:?}", self.guild_id, e);
                }
                self.mark_ready();
                info!("🔊 Conectado al canal {} en guild {}", self.channel_id, self.guild_id);
                Ok(())
            }
            Err(e) => {
                warn!("❌ Error al unirse al canal {} en guild {}: {:?}", self.channel_id, self.guild_id, e);
                self.advance(ConnectionState::Disconnected(DisconnectReason::Other(e.to_string())));
                Err(TransportError::Join(e.to_string()))
            }
        }
    }

    fn advance(&self, next: ConnectionState) -> bool {
        advance_state(&self.state, self.guild_id, next)
    }

    fn mark_ready(&self) {
        if mark_ready_state(&self.state, self.guild_id) {
            self.rejoin_attempts.store(0, Ordering::SeqCst);
        }
    }
}

/// Aplica una transición válida; devuelve `false` si se ignoró.
fn advance_state(state: &watch::Sender<ConnectionState>, guild_id: GuildId, next: ConnectionState) -> bool {
    state.send_if_modified(|state| {
        if state.status() == next.status() {
            return false;
        }
        match state.transition(next) {
            Ok(previous) => {
                debug!("🔌 Guild {}: {:?} -> {:?}", guild_id, previous.status(), state.status());
                true
            }
            Err(e) => {
                debug!("Guild {}: transición ignorada ({})", guild_id, e);
                false
            }
        }
    })
}

/// Lleva el estado a `Ready`, pasando por `Connecting` si venía de una
/// desconexión (el driver reconecta solo tras un cambio de canal).
///
/// Devuelve `true` si el estado final es `Ready`.
fn mark_ready_state(state: &watch::Sender<ConnectionState>, guild_id: GuildId) -> bool {
    let status = state.borrow().status();
    if status == ConnectionStatus::Disconnected {
        advance_state(state, guild_id, ConnectionState::Connecting);
    }
    advance_state(state, guild_id, ConnectionState::Ready);
    state.borrow().status() == ConnectionStatus::Ready
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn rejoin_attempts(&self) -> u32 {
        self.rejoin_attempts.load(Ordering::SeqCst)
    }

    async fn rejoin(&self) -> Result<(), TransportError> {
        let destroyed = self.state.borrow().is_destroyed();
        if destroyed {
            return Err(TransportError::Closed);
        }
        let attempt = self.rejoin_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        info!("🔄 Rejoin #{} en guild {}", attempt, self.guild_id);

        self.advance(ConnectionState::Signalling);
        self.connect_channel().await
    }

    async fn destroy(&self) {
        if !self.advance(ConnectionState::Destroyed) {
            return;
        }
        if let Err(e) = self.manager.remove(self.guild_id).await {
            debug!("Guild {}: remove sin conexión activa ({:?})", self.guild_id, e);
        }
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
    }
}

fn disconnect_reason(reason: Option<&DriverDisconnectReason>) -> DisconnectReason {
    match reason {
        Some(DriverDisconnectReason::WsClosed(Some(CloseCode::Disconnected))) => {
            DisconnectReason::WebSocketClose {
                code: Some(CLOSE_CODE_DISCONNECTED),
            }
        }
        Some(DriverDisconnectReason::WsClosed(_)) => DisconnectReason::WebSocketClose { code: None },
        Some(other) => DisconnectReason::Other(format!("{other:?}")),
        None => DisconnectReason::Other("requested".into()),
    }
}

/// Handler para eventos del driver de voz
struct DriverStateHandler {
    transport: Weak<SongbirdTransport>,
}

#[async_trait]
impl VoiceEventHandler for DriverStateHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let Some(transport) = self.transport.upgrade() else {
            return Some(Event::Cancel);
        };

        match ctx {
            EventContext::DriverConnect(_) | EventContext::DriverReconnect(_) => {
                transport.mark_ready();
            }
            EventContext::DriverDisconnect(data) => {
                let reason = disconnect_reason(data.reason.as_ref());
                debug!("🔌 Driver desconectado en guild {}: {:?}", transport.guild_id, reason);
                transport.advance(ConnectionState::Disconnected(reason));
            }
            _ => {}
        }

        None
    }
}
