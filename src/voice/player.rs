use async_trait::async_trait;
use songbird::{
    input::Input,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error};

use crate::{
    audio::{
        state::{PlayerEvent, PlayerStatus},
        transport::VoicePlayer,
    },
    error::PlaybackError,
};

struct PlayerShared {
    status: parking_lot::Mutex<PlayerStatus>,
    current: parking_lot::Mutex<Option<TrackHandle>>,
    events: broadcast::Sender<PlayerEvent>,
    /// Los eventos de un handle viejo se ignoran
    generation: AtomicU64,
}

impl PlayerShared {
    fn set_status(&self, next: PlayerStatus) {
        let mut status = self.status.lock();
        let old = *status;
        match status.transition(next) {
            Ok(_) => {
                let _ = self.events.send(PlayerEvent::StateChange { old, new: next });
            }
            Err(e) => debug!("Player: {}", e),
        }
    }
}

/// Player de un solo track sobre un `Call` de songbird.
pub struct SongbirdPlayer {
    call: Arc<Mutex<Call>>,
    shared: Arc<PlayerShared>,
}

impl SongbirdPlayer {
    pub fn new(call: Arc<Mutex<Call>>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            call,
            shared: Arc::new(PlayerShared {
                status: parking_lot::Mutex::new(PlayerStatus::Idle),
                current: parking_lot::Mutex::new(None),
                events,
                generation: AtomicU64::new(0),
            }),
        })
    }
}

#[async_trait]
impl VoicePlayer for SongbirdPlayer {
    fn status(&self) -> PlayerStatus {
        *self.shared.status.lock()
    }

    fn events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.shared.events.subscribe()
    }

    async fn play(&self, input: Input) -> Result<(), PlaybackError> {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // antes de registrar eventos: el Play del driver puede llegar enseguida
        self.shared.set_status(PlayerStatus::Buffering);

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        for (event, status) in [
            (TrackEvent::Preparing, PlayerStatus::Buffering),
            (TrackEvent::Play, PlayerStatus::Playing),
            (TrackEvent::Pause, PlayerStatus::Paused),
            (TrackEvent::End, PlayerStatus::Idle),
            (TrackEvent::Error, PlayerStatus::Idle),
        ] {
            let registered = handle.add_event(
                Event::Track(event),
                TrackStateHandler {
                    shared: self.shared.clone(),
                    generation,
                    status,
                },
            );
            if let Err(e) = registered {
                let _ = handle.stop();
                self.shared.generation.fetch_add(1, Ordering::SeqCst);
                self.shared.set_status(PlayerStatus::Idle);
                return Err(PlaybackError::Player(e.to_string()));
            }
        }

        *self.shared.current.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self, force: bool) {
        let handle = self.shared.current.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.stop() {
                debug!("Stop sobre un track ya terminado: {:?}", e);
            }
        }
        if force {
            // sin esperar al evento End del driver
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            self.shared.set_status(PlayerStatus::Idle);
        }
    }

    async fn playback_duration(&self) -> Duration {
        let handle = self.shared.current.lock().clone();
        match handle {
            Some(handle) => handle
                .get_info()
                .await
                .map(|info| info.position)
                .unwrap_or_default(),
            None => Duration::ZERO,
        }
    }
}

/// Handler para eventos de un track
struct TrackStateHandler {
    shared: Arc<PlayerShared>,
    generation: u64,
    status: PlayerStatus,
}

#[async_trait]
impl VoiceEventHandler for TrackStateHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if self.shared.generation.load(Ordering::SeqCst) != self.generation {
            return Some(Event::Cancel);
        }

        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                if let PlayMode::Errored(e) = &state.playing {
                    error!("❌ Error en track: {:?}", e);
                    let _ = self.shared.events.send(PlayerEvent::Error(format!("{e:?}")));
                }
            }
        }

        if self.status == PlayerStatus::Idle {
            self.shared.current.lock().take();
        }
        self.shared.set_status(self.status);
        None
    }
}
