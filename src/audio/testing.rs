//! Fakes en memoria para probar la sesión y el servicio sin Discord.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::{HttpRequest, Input};
use std::{
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{broadcast, watch, Notify};

use crate::{
    audio::{
        state::{ConnectionState, PlayerEvent, PlayerStatus},
        subscription::SubscriptionHandler,
        track::{Author, StreamSource, Track, TrackKind},
        transport::{VoiceConnector, VoicePlayer, VoiceTransport},
    },
    error::{PlaybackError, TransportError},
};

pub fn silent_input(name: &str) -> Input {
    Input::from(HttpRequest::new(
        reqwest::Client::new(),
        format!("https://media.invalid/{name}.webm"),
    ))
}

enum FakeStream {
    Ready(String),
    Failing,
    Missing,
    Gated(String, Arc<Notify>),
}

#[async_trait]
impl StreamSource for FakeStream {
    async fn resolve_stream(&self) -> Result<Option<Input>, PlaybackError> {
        match self {
            FakeStream::Ready(name) => Ok(Some(silent_input(name))),
            FakeStream::Failing => Err(PlaybackError::StreamAcquisition {
                url: "https://media.invalid".into(),
                reason: "403".into(),
            }),
            FakeStream::Missing => Ok(None),
            FakeStream::Gated(name, gate) => {
                gate.notified().await;
                Ok(Some(silent_input(name)))
            }
        }
    }
}

fn build(title: &str, source: FakeStream) -> Track {
    Track::new(
        TrackKind::YoutubeVideo,
        Author {
            name: "tester".into(),
            url: "https://www.youtube.com/@tester".into(),
        },
        title.to_string(),
        format!("https://www.youtube.com/watch?v={title}"),
        Duration::from_secs(60),
        Arc::new(source),
    )
}

/// Track de 60s que se resuelve sin problemas
pub fn track(title: &str) -> Track {
    build(title, FakeStream::Ready(title.to_string()))
}

pub fn timed_track(title: &str, playback_time: Duration) -> Track {
    let mut track = track(title);
    track.playback_time = playback_time;
    track
}

pub fn failing_track(title: &str) -> Track {
    build(title, FakeStream::Failing)
}

/// Existe pero no devuelve stream
pub fn silent_track(title: &str) -> Track {
    build(title, FakeStream::Missing)
}

/// Se queda resolviendo hasta que `gate` lo libere
pub fn blocking_track(title: &str, gate: Arc<Notify>) -> Track {
    build(title, FakeStream::Gated(title.to_string(), gate))
}

/// Deja correr las tareas pendientes sin avanzar el reloj
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Espera (en tiempo virtual) hasta que `condition` se cumpla
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

pub struct FakeTransport {
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    rejoins: AtomicU32,
    destroys: AtomicU32,
}

impl FakeTransport {
    pub fn new(initial: ConnectionState) -> Arc<Self> {
        let (state, _) = watch::channel(initial);
        Arc::new(Self {
            state,
            attempts: AtomicU32::new(0),
            rejoins: AtomicU32::new(0),
            destroys: AtomicU32::new(0),
        })
    }

    /// Fuerza un estado sin pasar por la máquina de estados
    pub fn set(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    pub fn set_attempts(&self, attempts: u32) {
        self.attempts.store(attempts, Ordering::SeqCst);
    }

    pub fn rejoin_calls(&self) -> u32 {
        self.rejoins.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> u32 {
        self.destroys.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn rejoin_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn rejoin(&self) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.rejoins.fetch_add(1, Ordering::SeqCst);
        self.set(ConnectionState::Signalling);
        Ok(())
    }

    async fn destroy(&self) {
        if self.state.borrow().is_destroyed() {
            return;
        }
        self.destroys.fetch_add(1, Ordering::SeqCst);
        self.set(ConnectionState::Destroyed);
    }
}

pub struct FakePlayer {
    status: Mutex<PlayerStatus>,
    events: broadcast::Sender<PlayerEvent>,
    plays: AtomicUsize,
    elapsed: Mutex<Duration>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            status: Mutex::new(PlayerStatus::Idle),
            events,
            plays: AtomicUsize::new(0),
            elapsed: Mutex::new(Duration::ZERO),
        })
    }

    fn set_status(&self, new: PlayerStatus) {
        let old = std::mem::replace(&mut *self.status.lock(), new);
        if old != new {
            let _ = self.events.send(PlayerEvent::StateChange { old, new });
        }
    }

    /// El track actual termina solo
    pub fn finish(&self) {
        self.set_status(PlayerStatus::Idle);
    }

    pub fn emit_error(&self, message: &str) {
        let _ = self.events.send(PlayerEvent::Error(message.to_string()));
    }

    pub fn set_elapsed(&self, elapsed: Duration) {
        *self.elapsed.lock() = elapsed;
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoicePlayer for FakePlayer {
    fn status(&self) -> PlayerStatus {
        *self.status.lock()
    }

    fn events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    async fn play(&self, input: Input) -> Result<(), PlaybackError> {
        drop(input);
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.set_status(PlayerStatus::Playing);
        Ok(())
    }

    async fn stop(&self, _force: bool) {
        self.set_status(PlayerStatus::Idle);
    }

    async fn playback_duration(&self) -> Duration {
        *self.elapsed.lock()
    }
}

/// Conector que entrega fakes nuevos en cada llamada y guarda los creados.
#[derive(Default)]
pub struct FakeConnector {
    pub fail: std::sync::atomic::AtomicBool,
    connections: Mutex<Vec<(ChannelId, Arc<FakeTransport>, Arc<FakePlayer>)>>,
}

impl FakeConnector {
    pub fn connections(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn last(&self) -> Option<(Arc<FakeTransport>, Arc<FakePlayer>)> {
        self.connections
            .lock()
            .last()
            .map(|(_, transport, player)| (transport.clone(), player.clone()))
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(Arc<dyn VoiceTransport>, Arc<dyn VoicePlayer>), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Join("no route".into()));
        }
        let transport = FakeTransport::new(ConnectionState::Ready);
        let player = FakePlayer::new();
        self.connections
            .lock()
            .push((channel_id, transport.clone(), player.clone()));
        Ok((transport, player))
    }
}

/// Guarda todo lo que la sesión notifica
#[derive(Default)]
pub struct RecordingHandler {
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    destroyed: AtomicUsize,
}

impl RecordingHandler {
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl SubscriptionHandler for RecordingHandler {
    fn on_error(&self, error: &PlaybackError) {
        self.errors.lock().push(error.to_string());
    }

    fn on_start(&self, track: &Track) {
        self.started.lock().push(track.title.clone());
    }

    fn on_finish(&self, track: &Track) {
        self.finished.lock().push(track.title.clone());
    }

    fn on_destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}
