use serenity::model::id::GuildId;
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::MusicQueue,
        state::{ConnectionState, ConnectionStatus, DisconnectReason, PlayerEvent, PlayerStatus},
        track::Track,
        transport::{enters_any_state, enters_state, VoicePlayer, VoiceTransport},
    },
    error::PlaybackError,
};

/// Tiempos y límites de reconexión del transporte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Máximo en Signalling/Connecting antes de destruir la conexión
    pub ready_timeout: Duration,
    /// Margen tras un cierre 4014 para distinguir "movido" de "expulsado"
    pub moved_grace: Duration,
    /// Paso del backoff lineal entre intentos de rejoin
    pub rejoin_backoff: Duration,
    pub max_rejoin_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(20),
            moved_grace: Duration::from_secs(5),
            rejoin_backoff: Duration::from_secs(5),
            max_rejoin_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Espera antes del rejoin número `attempts + 1`
    pub fn rejoin_delay(&self, attempts: u32) -> Duration {
        self.rejoin_backoff.saturating_mul(attempts.saturating_add(1))
    }
}

/// Callbacks del ciclo de vida de una sesión.
pub trait SubscriptionHandler: Send + Sync + 'static {
    fn on_error(&self, error: &PlaybackError);
    fn on_start(&self, track: &Track);
    fn on_finish(&self, track: &Track);
    fn on_destroy(&self);
}

/// Sesión de reproducción de un guild.
///
/// Une la cola compartida con un par transporte + player y aplica la
/// política de reconexión. Dos tareas de fondo observan los cambios de estado
/// del transporte y del player; ambas terminan cuando la sesión se destruye.
pub struct Subscription {
    id: u64,
    guild_id: GuildId,
    transport: Arc<dyn VoiceTransport>,
    player: Arc<dyn VoicePlayer>,
    queue: Arc<MusicQueue>,
    handler: Arc<dyn SubscriptionHandler>,
    policy: ReconnectPolicy,
    /// Solo un drenado de la cola a la vez
    queue_lock: tokio::sync::Mutex<()>,
    /// Solo una espera de Ready a la vez
    ready_lock: AtomicBool,
    current: parking_lot::RwLock<Option<Track>>,
    destroyed: AtomicBool,
    shutdown: CancellationToken,
}

impl Subscription {
    /// Crea la sesión y arranca los observadores de estado.
    pub fn start(
        id: u64,
        guild_id: GuildId,
        transport: Arc<dyn VoiceTransport>,
        player: Arc<dyn VoicePlayer>,
        queue: Arc<MusicQueue>,
        handler: Arc<dyn SubscriptionHandler>,
        policy: ReconnectPolicy,
    ) -> Arc<Self> {
        let connection = transport.subscribe();
        let player_events = player.events();

        let subscription = Arc::new(Self {
            id,
            guild_id,
            transport,
            player,
            queue,
            handler,
            policy,
            queue_lock: tokio::sync::Mutex::new(()),
            ready_lock: AtomicBool::new(false),
            current: parking_lot::RwLock::new(None),
            destroyed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(subscription.clone().watch_connection(connection));
        tokio::spawn(subscription.clone().watch_player(player_events));

        info!("🔗 Sesión {} creada para guild {}", id, guild_id);
        subscription
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Track en reproducción, si lo hay
    pub fn now_playing(&self) -> Option<Track> {
        self.current.read().clone()
    }

    /// Tiempo reproducido del track actual
    pub async fn playback_duration(&self) -> Duration {
        if self.player.status().is_loaded() {
            self.player.playback_duration().await
        } else {
            Duration::ZERO
        }
    }

    /// Tiempo estimado que le queda al track actual
    pub async fn current_remaining(&self) -> Duration {
        match self.now_playing() {
            Some(track) => track.playback_time.saturating_sub(self.playback_duration().await),
            None => Duration::ZERO,
        }
    }

    /// Intenta reproducir el siguiente track de la cola.
    ///
    /// No hace nada si ya hay un drenado en curso, si el player no está en
    /// `Idle` o si la sesión fue destruida. Un track sin stream o que falla al
    /// resolverse se descarta y se prueba con el siguiente.
    pub async fn process_queue(&self) {
        if self.is_destroyed() {
            return;
        }
        let Ok(_guard) = self.queue_lock.try_lock() else {
            debug!("Drenado ya en curso en guild {}", self.guild_id);
            return;
        };
        if self.player.status() != PlayerStatus::Idle {
            return;
        }

        while let Some(track) = self.queue.pop(self.guild_id) {
            let Some(acquired) = self.until_shutdown(track.resolve_stream()).await else {
                debug!("🛑 Drenado descartado en guild {}: sesión destruida", self.guild_id);
                return;
            };

            let input = match acquired {
                Ok(Some(input)) => input,
                Ok(None) => {
                    self.report_skip(&track, PlaybackError::StreamUnavailable(track.url.clone()));
                    continue;
                }
                Err(e) => {
                    self.report_skip(&track, e);
                    continue;
                }
            };

            if self.is_destroyed() {
                return;
            }

            *self.current.write() = Some(track.clone());
            match self.player.play(input).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title);
                    return;
                }
                Err(e) => {
                    *self.current.write() = None;
                    self.report_skip(&track, e);
                }
            }
        }

        debug!("📭 Cola vacía en guild {}", self.guild_id);
    }

    /// Salta el track actual.
    ///
    /// Con el player en `Idle` solo descarta la cabeza de la cola; si hay algo
    /// cargado lo detiene y el paso a `Idle` arranca el siguiente.
    pub async fn skip(&self) {
        if self.player.status() == PlayerStatus::Idle {
            if let Some(track) = self.queue.pop(self.guild_id) {
                info!("⏭️ Descartado sin reproducir en guild {}: {}", self.guild_id, track.title);
            }
        } else {
            self.player.stop(false).await;
        }
    }

    /// Destruye el transporte; la limpieza ocurre al observar `Destroyed`.
    pub async fn destroy(&self) {
        self.transport.destroy().await;
    }

    fn report_skip(&self, track: &Track, error: PlaybackError) {
        warn!("⏭️ Saltando '{}' en guild {}: {}", track.title, self.guild_id, error);
        self.handler.on_error(&error);
    }

    async fn until_shutdown<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            output = fut => Some(output),
        }
    }

    // Transporte

    async fn watch_connection(
        self: Arc<Self>,
        mut rx: tokio::sync::watch::Receiver<ConnectionState>,
    ) {
        let mut state = rx.borrow_and_update().clone();
        loop {
            debug!("🔌 Guild {}: transporte en {:?}", self.guild_id, state.status());
            if state.is_destroyed() {
                self.on_destroyed().await;
                return;
            }
            tokio::spawn(self.clone().on_connection_state(state));

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        warn!("Transporte de guild {} perdido sin destruirse", self.guild_id);
                        self.on_destroyed().await;
                        return;
                    }
                }
            }
            state = rx.borrow_and_update().clone();
        }
    }

    async fn on_connection_state(self: Arc<Self>, state: ConnectionState) {
        match state {
            ConnectionState::Disconnected(reason) => self.on_disconnected(reason).await,
            ConnectionState::Signalling | ConnectionState::Connecting => self.await_ready().await,
            ConnectionState::Ready | ConnectionState::Destroyed => {}
        }
    }

    async fn on_disconnected(&self, reason: DisconnectReason) {
        if reason.is_moved_or_kicked() {
            // 4014: movido de canal (se reconecta solo) o expulsado
            let mut rx = self.transport.subscribe();
            let recovered = enters_any_state(
                &mut rx,
                &[
                    ConnectionStatus::Signalling,
                    ConnectionStatus::Connecting,
                    ConnectionStatus::Ready,
                ],
                self.policy.moved_grace,
            );
            match self.until_shutdown(recovered).await {
                None => {}
                Some(Ok(())) => info!("🔀 Guild {}: canal de voz cambiado", self.guild_id),
                Some(Err(e)) => {
                    warn!("👢 Guild {}: sin reconexión tras cierre 4014 ({})", self.guild_id, e);
                    self.transport.destroy().await;
                }
            }
            return;
        }

        let attempts = self.transport.rejoin_attempts();
        if attempts >= self.policy.max_rejoin_attempts {
            warn!(
                "🚫 Guild {}: {} intentos de reconexión agotados, destruyendo",
                self.guild_id, attempts
            );
            self.transport.destroy().await;
            return;
        }

        let delay = self.policy.rejoin_delay(attempts);
        info!(
            "🔄 Guild {}: desconectado ({:?}), rejoin #{} en {:?}",
            self.guild_id,
            reason,
            attempts + 1,
            delay
        );
        if self.until_shutdown(tokio::time::sleep(delay)).await.is_none() {
            return;
        }
        if self.transport.state().is_destroyed() {
            return;
        }
        if let Err(e) = self.transport.rejoin().await {
            warn!("❌ Guild {}: rejoin falló: {}", self.guild_id, e);
        }
    }

    async fn await_ready(&self) {
        if self.ready_lock.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut rx = self.transport.subscribe();
        let ready = enters_state(&mut rx, ConnectionStatus::Ready, self.policy.ready_timeout);
        if let Some(Err(e)) = self.until_shutdown(ready).await {
            if !self.transport.state().is_destroyed() {
                warn!("⏰ Guild {}: {}, destruyendo conexión", self.guild_id, e);
                self.transport.destroy().await;
            }
        }

        self.ready_lock.store(false, Ordering::SeqCst);
    }

    /// Limpieza final: una sola vez, descarta la cola pendiente.
    async fn on_destroyed(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("💥 Sesión {} de guild {} destruida", self.id, self.guild_id);

        self.shutdown.cancel();
        self.handler.on_destroy();

        // espera a que un drenado en curso vea la cancelación
        let _guard = self.queue_lock.lock().await;
        self.player.stop(true).await;
        *self.current.write() = None;
        self.queue.clear(self.guild_id);
    }

    // Player

    async fn watch_player(self: Arc<Self>, mut events: broadcast::Receiver<PlayerEvent>) {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                event = events.recv() => event,
            };

            match event {
                Ok(PlayerEvent::StateChange { old, new }) => self.on_player_state(old, new),
                Ok(PlayerEvent::Error(message)) => {
                    self.handler.on_error(&PlaybackError::Player(message));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Guild {}: {} eventos del player perdidos", self.guild_id, skipped);
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    fn on_player_state(self: &Arc<Self>, old: PlayerStatus, new: PlayerStatus) {
        if new == PlayerStatus::Idle && old != PlayerStatus::Idle {
            let finished = self.current.write().take();
            if let Some(track) = finished {
                debug!("✅ Terminado en guild {}: {}", self.guild_id, track.title);
                self.handler.on_finish(&track);
            }
            let this = self.clone();
            tokio::spawn(async move { this.process_queue().await });
        } else if new == PlayerStatus::Playing {
            let current = self.current.read().clone();
            if let Some(track) = current {
                self.handler.on_start(&track);
            }
        }
    }
}
