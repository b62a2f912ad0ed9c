use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        notice::{Notice, PlaybackEvent, QueuePage},
        queue::MusicQueue,
        subscription::{ReconnectPolicy, Subscription, SubscriptionHandler},
        track::{total_playback_time, Track},
        transport::VoiceConnector,
    },
    error::PlaybackError,
    sources::{ResolveContext, Resolution, TrackResolver},
};

/// Canal de voz del usuario que pidió reproducir, con lo que el bot puede
/// hacer en él.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinTarget {
    pub channel_id: ChannelId,
    pub can_view: bool,
    pub can_connect: bool,
    pub can_move_members: bool,
    pub channel_full: bool,
}

type Registry = DashMap<GuildId, Arc<Subscription>>;

/// Orquestador multi-guild.
///
/// Dueño del registro de sesiones y de la cola compartida. A lo sumo existe
/// una sesión por guild; crearla se serializa con un lock por guild.
pub struct AudioService {
    queue: Arc<MusicQueue>,
    resolver: Arc<dyn TrackResolver>,
    connector: Arc<dyn VoiceConnector>,
    subscriptions: Arc<Registry>,
    guild_locks: DashMap<GuildId, Arc<tokio::sync::Mutex<()>>>,
    policy: ReconnectPolicy,
    page_size: usize,
    next_session: AtomicU64,
    events: broadcast::Sender<PlaybackEvent>,
}

impl AudioService {
    pub fn new(
        resolver: Arc<dyn TrackResolver>,
        connector: Arc<dyn VoiceConnector>,
        policy: ReconnectPolicy,
        page_size: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            queue: Arc::new(MusicQueue::new()),
            resolver,
            connector,
            subscriptions: Arc::new(DashMap::new()),
            guild_locks: DashMap::new(),
            policy,
            page_size: page_size.max(1),
            next_session: AtomicU64::new(1),
            events,
        }
    }

    /// Eventos de reproducción de todos los guilds
    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn has_session(&self, guild_id: GuildId) -> bool {
        self.subscriptions.contains_key(&guild_id)
    }

    pub fn queue(&self) -> &Arc<MusicQueue> {
        &self.queue
    }

    fn subscription(&self, guild_id: GuildId) -> Option<Arc<Subscription>> {
        // clonar y soltar la referencia del shard antes de cualquier await
        self.subscriptions.get(&guild_id).map(|s| s.value().clone())
    }

    fn guild_lock(&self, guild_id: GuildId) -> Arc<tokio::sync::Mutex<()>> {
        self.guild_locks.entry(guild_id).or_default().clone()
    }

    /// Resuelve `key` y encola el resultado; crea la sesión si hace falta.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        key: Option<&str>,
        voice: Option<JoinTarget>,
    ) -> Vec<Notice> {
        let lock = self.guild_lock(guild_id);
        let notices = {
            let _guard = lock.lock().await;
            self.enqueue_locked(guild_id, key, voice).await
        };
        drop(lock);

        // solo el mapa lo referencia: nadie más espera este guild
        self.guild_locks
            .remove_if(&guild_id, |_, lock| Arc::strong_count(lock) == 1);
        notices
    }

    async fn enqueue_locked(
        &self,
        guild_id: GuildId,
        key: Option<&str>,
        voice: Option<JoinTarget>,
    ) -> Vec<Notice> {
        let existing = self.subscription(guild_id);
        if existing.is_none() && voice.is_none() {
            return vec![Notice::ConnectVoiceChannelFirst];
        }
        let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
            return vec![Notice::MissingArgument];
        };

        let current_remaining = match &existing {
            Some(subscription) => subscription.current_remaining().await,
            None => Default::default(),
        };
        let ctx = ResolveContext::new(guild_id, self.queue.clone(), current_remaining);
        let Resolution { tracks, notices } = self.resolver.resolve(key, &ctx).await;
        if tracks.is_empty() {
            return notices;
        }

        let subscription = match existing {
            Some(subscription) => subscription,
            None => {
                let Some(target) = voice else {
                    return vec![Notice::ConnectVoiceChannelFirst];
                };
                match self.open_session(guild_id, target).await {
                    Ok(subscription) => subscription,
                    Err(notice) => return vec![notice],
                }
            }
        };

        info!("📥 {} tracks encolados en guild {}", tracks.len(), guild_id);
        self.queue.push(guild_id, tracks);
        subscription.process_queue().await;
        notices
    }

    async fn open_session(
        &self,
        guild_id: GuildId,
        target: JoinTarget,
    ) -> Result<Arc<Subscription>, Notice> {
        if !target.can_view {
            return Err(Notice::MissingViewChannelPermission);
        }
        if !target.can_connect {
            return Err(Notice::MissingConnectPermission);
        }
        if !target.can_move_members && target.channel_full {
            return Err(Notice::VoiceChannelFull);
        }

        let (transport, player) = self
            .connector
            .connect(guild_id, target.channel_id)
            .await
            .map_err(|e| {
                error!("❌ No se pudo conectar al canal {} en guild {}: {}", target.channel_id, guild_id, e);
                Notice::ConnectFailed
            })?;

        let session_id = self.next_session.fetch_add(1, Ordering::SeqCst);
        let hooks = Arc::new(SessionHooks {
            guild_id,
            session_id,
            registry: Arc::downgrade(&self.subscriptions),
            events: self.events.clone(),
        });
        let subscription = Subscription::start(
            session_id,
            guild_id,
            transport,
            player,
            self.queue.clone(),
            hooks,
            self.policy,
        );
        self.subscriptions.insert(guild_id, subscription.clone());
        Ok(subscription)
    }

    pub fn shuffle(&self, guild_id: GuildId) -> Vec<Notice> {
        self.queue.shuffle(guild_id);
        vec![Notice::QueueShuffled]
    }

    pub fn clear(&self, guild_id: GuildId) -> Vec<Notice> {
        self.queue.clear(guild_id);
        vec![Notice::QueueCleared]
    }

    /// Destruye la sesión del guild. Sin sesión no responde nada.
    pub async fn disconnect(&self, guild_id: GuildId) -> Vec<Notice> {
        let Some(subscription) = self.subscription(guild_id) else {
            return Vec::new();
        };
        info!("👋 Desconectando guild {}", guild_id);
        subscription.destroy().await;
        vec![Notice::Disconnected]
    }

    /// Salta el track actual o, mientras no suena nada, descarta el
    /// siguiente de la cola.
    pub async fn skip(&self, guild_id: GuildId) -> Vec<Notice> {
        let Some(subscription) = self.subscription(guild_id) else {
            return vec![Notice::NothingPlaying];
        };
        if subscription.now_playing().is_none() && self.queue.len(guild_id) == 0 {
            return vec![Notice::NothingPlaying];
        }
        subscription.skip().await;
        vec![Notice::TrackSkipped]
    }

    /// Página `page` (1-based) de la cola; sin argumento, la primera.
    pub async fn queue_page(&self, guild_id: GuildId, page: Option<&str>) -> Vec<Notice> {
        let index = match page.map(parse_page) {
            None => 0,
            Some(Some(index)) => index,
            Some(None) => return vec![Notice::InvalidPage],
        };

        let all = self.queue.snapshot(guild_id);
        let start = index.saturating_mul(self.page_size);
        let tracks: Vec<Track> = all.iter().skip(start).take(self.page_size).cloned().collect();
        if tracks.is_empty() {
            return vec![Notice::PageEmpty];
        }

        let current_remaining = match self.subscription(guild_id) {
            Some(subscription) => subscription.current_remaining().await,
            None => Default::default(),
        };

        vec![Notice::Queue(QueuePage {
            page: index + 1,
            total_pages: all.len().div_ceil(self.page_size),
            total_items: all.len(),
            tracks,
            total_time: total_playback_time(&all) + current_remaining,
        })]
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Vec<Notice> {
        let Some(subscription) = self.subscription(guild_id) else {
            return vec![Notice::NothingPlaying];
        };
        let Some(track) = subscription.now_playing() else {
            return vec![Notice::NothingPlaying];
        };
        let elapsed = subscription.playback_duration().await;
        vec![Notice::NowPlaying { track, elapsed }]
    }
}

/// Índice 0-based a partir de un número de página escrito por el usuario.
fn parse_page(raw: &str) -> Option<usize> {
    match raw.trim().parse::<usize>() {
        Ok(page) if page >= 1 => Some(page - 1),
        _ => None,
    }
}

/// Conecta los callbacks de una sesión con el registro y el bus de eventos.
struct SessionHooks {
    guild_id: GuildId,
    session_id: u64,
    registry: Weak<Registry>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl SubscriptionHandler for SessionHooks {
    fn on_error(&self, error: &PlaybackError) {
        warn!("⚠️ Error de reproducción en guild {}: {}", self.guild_id, error);
        let _ = self.events.send(PlaybackEvent::Error {
            guild_id: self.guild_id,
            message: error.to_string(),
        });
    }

    fn on_start(&self, track: &Track) {
        info!("▶️ Guild {}: {}", self.guild_id, track.title);
        let _ = self.events.send(PlaybackEvent::Started {
            guild_id: self.guild_id,
            track: track.clone(),
        });
    }

    fn on_finish(&self, track: &Track) {
        debug!("⏹️ Guild {}: {}", self.guild_id, track.title);
        let _ = self.events.send(PlaybackEvent::Finished {
            guild_id: self.guild_id,
            track: track.clone(),
        });
    }

    fn on_destroy(&self) {
        if let Some(registry) = self.registry.upgrade() {
            // una sesión vieja no debe borrar a su reemplazo
            let removed = registry.remove_if(&self.guild_id, |_, s| s.id() == self.session_id);
            if removed.is_some() {
                debug!("🧹 Sesión {} removida del registro", self.session_id);
            }
        }
        let _ = self.events.send(PlaybackEvent::Destroyed { guild_id: self.guild_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            notice::NotTargetReason,
            state::PlayerStatus,
            testing::{blocking_track, eventually, settle, timed_track, track, FakeConnector},
            transport::{VoicePlayer, VoiceTransport},
        },
        sources::MockTrackResolver,
    };
    use pretty_assertions::assert_eq;
    use std::{sync::atomic::Ordering, time::Duration};

    const GUILD: GuildId = GuildId::new(7);

    fn target() -> JoinTarget {
        JoinTarget {
            channel_id: ChannelId::new(70),
            can_view: true,
            can_connect: true,
            can_move_members: false,
            channel_full: false,
        }
    }

    /// Resolver que devuelve un track por cada palabra de la clave
    fn echo_resolver() -> MockTrackResolver {
        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().returning(|key, ctx| {
            let tracks: Vec<Track> = key.split(',').map(track).collect();
            let notices = vec![Notice::TrackQueued {
                track: tracks[0].clone(),
                position: ctx.queued_tracks().len() + 1,
                track_time: tracks[0].playback_time,
                total_time: tracks[0].playback_time + ctx.queued_time() + ctx.current_remaining(),
            }];
            Resolution { tracks, notices }
        });
        resolver
    }

    fn service_with(resolver: MockTrackResolver) -> (AudioService, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::default());
        let service = AudioService::new(
            Arc::new(resolver),
            connector.clone(),
            ReconnectPolicy::default(),
            5,
        );
        (service, connector)
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_requires_voice_channel_without_session() {
        let (service, connector) = service_with(MockTrackResolver::new());
        let notices = service.enqueue(GUILD, Some("a"), None).await;
        assert!(matches!(notices.as_slice(), [Notice::ConnectVoiceChannelFirst]));
        assert_eq!(connector.connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_requires_a_key() {
        let (service, _) = service_with(MockTrackResolver::new());
        let notices = service.enqueue(GUILD, None, Some(target())).await;
        assert!(matches!(notices.as_slice(), [Notice::MissingArgument]));
        let notices = service.enqueue(GUILD, Some("  "), Some(target())).await;
        assert!(matches!(notices.as_slice(), [Notice::MissingArgument]));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_key_creates_no_session() {
        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().returning(|key, _| {
            Resolution::rejected(key, NotTargetReason::NoMatch)
        });
        let (service, connector) = service_with(resolver);

        let notices = service.enqueue(GUILD, Some("https://example.com"), Some(target())).await;
        assert!(matches!(
            notices.as_slice(),
            [Notice::NotTarget { reason: NotTargetReason::NoMatch, .. }]
        ));
        assert!(!service.has_session(GUILD));
        assert_eq!(connector.connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn join_preconditions_are_checked_in_order() {
        let (service, connector) = service_with(echo_resolver());

        let mut t = target();
        t.can_view = false;
        t.can_connect = false;
        let notices = service.enqueue(GUILD, Some("a"), Some(t)).await;
        assert!(matches!(notices.as_slice(), [Notice::MissingViewChannelPermission]));

        t.can_view = true;
        let notices = service.enqueue(GUILD, Some("a"), Some(t)).await;
        assert!(matches!(notices.as_slice(), [Notice::MissingConnectPermission]));

        t.can_connect = true;
        t.channel_full = true;
        let notices = service.enqueue(GUILD, Some("a"), Some(t)).await;
        assert!(matches!(notices.as_slice(), [Notice::VoiceChannelFull]));

        // mover miembros permite entrar a un canal lleno
        t.can_move_members = true;
        let notices = service.enqueue(GUILD, Some("a"), Some(t)).await;
        assert!(matches!(notices.as_slice(), [Notice::TrackQueued { .. }]));
        assert_eq!(connector.connections(), 1);
        assert_eq!(service.queue().len(GUILD), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_is_reported() {
        let (service, connector) = service_with(echo_resolver());
        connector.fail.store(true, Ordering::SeqCst);
        let notices = service.enqueue(GUILD, Some("a"), Some(target())).await;
        assert!(matches!(notices.as_slice(), [Notice::ConnectFailed]));
        assert!(!service.has_session(GUILD));
        assert_eq!(service.queue().len(GUILD), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_enqueue_starts_playback_and_later_ones_queue() {
        let (service, connector) = service_with(echo_resolver());
        let mut events = service.events();

        service.enqueue(GUILD, Some("a"), Some(target())).await;
        let (_, player) = connector.last().unwrap();
        assert_eq!(player.status(), PlayerStatus::Playing);

        match events.recv().await.unwrap() {
            PlaybackEvent::Started { guild_id, track } => {
                assert_eq!(guild_id, GUILD);
                assert_eq!(track.title, "a");
            }
            other => panic!("unexpected event {other:?}"),
        }

        // con sesión activa no hace falta estar en un canal
        let notices = service.enqueue(GUILD, Some("b,c"), None).await;
        match notices.as_slice() {
            [Notice::TrackQueued { position, total_time, .. }] => {
                assert_eq!(*position, 1);
                // 60s nuevos + 60s del track actual sin reproducir
                assert_eq!(*total_time, Duration::from_secs(120));
            }
            other => panic!("unexpected notices {other:?}"),
        }
        assert_eq!(connector.connections(), 1);
        assert_eq!(service.queue().len(GUILD), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_on_idle_session_resumes_playback() {
        let (service, connector) = service_with(echo_resolver());
        service.enqueue(GUILD, Some("a"), Some(target())).await;
        let (_, player) = connector.last().unwrap();

        player.finish();
        settle().await;
        assert_eq!(player.status(), PlayerStatus::Idle);

        service.enqueue(GUILD, Some("b"), None).await;
        assert_eq!(player.status(), PlayerStatus::Playing);
        assert_eq!(player.plays(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_enqueues_create_one_session() {
        let (service, connector) = service_with(echo_resolver());
        let service = Arc::new(service);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service.enqueue(GUILD, Some(&format!("t{i}")), Some(target())).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(connector.connections(), 1);
        assert_eq!(service.queue().len(GUILD), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn destroyed_session_leaves_registry() {
        let (service, connector) = service_with(echo_resolver());
        service.enqueue(GUILD, Some("a,b"), Some(target())).await;
        assert!(service.has_session(GUILD));

        let notices = service.disconnect(GUILD).await;
        assert!(matches!(notices.as_slice(), [Notice::Disconnected]));
        eventually(|| !service.has_session(GUILD)).await;
        settle().await;
        assert_eq!(service.queue().len(GUILD), 0);

        // una nueva petición abre otra sesión
        service.enqueue(GUILD, Some("c"), Some(target())).await;
        assert!(service.has_session(GUILD));
        assert_eq!(connector.connections(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_destroy_keeps_the_new_session() {
        let (service, connector) = service_with(echo_resolver());
        service.enqueue(GUILD, Some("a"), Some(target())).await;
        let (old_transport, _) = connector.last().unwrap();
        let old = service.subscription(GUILD).unwrap();

        // reemplazo manual del registro, como si la vieja fuera a destruirse tarde
        service.subscriptions.remove(&GUILD);
        service.enqueue(GUILD, Some("b"), Some(target())).await;
        let fresh = service.subscription(GUILD).unwrap();
        assert_ne!(old.id(), fresh.id());

        old_transport.destroy().await;
        eventually(|| old.is_destroyed()).await;
        settle().await;

        assert_eq!(service.subscription(GUILD).unwrap().id(), fresh.id());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_without_session_is_silent() {
        let (service, _) = service_with(MockTrackResolver::new());
        assert!(service.disconnect(GUILD).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn skip_requires_something_playing() {
        let (service, _) = service_with(echo_resolver());
        assert!(matches!(service.skip(GUILD).await.as_slice(), [Notice::NothingPlaying]));

        service.enqueue(GUILD, Some("a,b"), Some(target())).await;
        assert!(matches!(service.skip(GUILD).await.as_slice(), [Notice::TrackSkipped]));
        settle().await;

        let np = service.now_playing(GUILD).await;
        match np.as_slice() {
            [Notice::NowPlaying { track, .. }] => assert_eq!(track.title, "b"),
            other => panic!("unexpected notices {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn now_playing_reports_elapsed() {
        let (service, connector) = service_with(echo_resolver());
        assert!(matches!(service.now_playing(GUILD).await.as_slice(), [Notice::NothingPlaying]));

        service.enqueue(GUILD, Some("a"), Some(target())).await;
        let (_, player) = connector.last().unwrap();
        player.set_elapsed(Duration::from_secs(12));

        match service.now_playing(GUILD).await.as_slice() {
            [Notice::NowPlaying { track, elapsed }] => {
                assert_eq!(track.title, "a");
                assert_eq!(*elapsed, Duration::from_secs(12));
            }
            other => panic!("unexpected notices {other:?}"),
        }
    }

    #[tokio::test]
    async fn queue_pages_are_one_based() {
        let (service, _) = service_with(MockTrackResolver::new());
        service.queue().push(
            GUILD,
            (1..=12)
                .map(|i| timed_track(&format!("t{i}"), Duration::from_secs(10)))
                .collect(),
        );

        let titles = |notices: Vec<Notice>| match notices.as_slice() {
            [Notice::Queue(page)] => (
                page.page,
                page.total_pages,
                page.tracks.iter().map(|t| t.title.clone()).collect::<Vec<_>>(),
                page.total_time,
            ),
            other => panic!("unexpected notices {other:?}"),
        };

        let (page, total, names, time) = titles(service.queue_page(GUILD, None).await);
        assert_eq!((page, total), (1, 3));
        assert_eq!(names, vec!["t1", "t2", "t3", "t4", "t5"]);
        assert_eq!(time, Duration::from_secs(120));

        let (page, _, names, _) = titles(service.queue_page(GUILD, Some("3")).await);
        assert_eq!(page, 3);
        assert_eq!(names, vec!["t11", "t12"]);

        assert!(matches!(
            service.queue_page(GUILD, Some("4")).await.as_slice(),
            [Notice::PageEmpty]
        ));
        // la cola no cambia al listar
        assert_eq!(service.queue().len(GUILD), 12);
    }

    #[tokio::test]
    async fn invalid_pages_are_rejected() {
        let (service, _) = service_with(MockTrackResolver::new());
        for raw in ["abc", "0", "-1", "1.5"] {
            assert!(
                matches!(service.queue_page(GUILD, Some(raw)).await.as_slice(), [Notice::InvalidPage]),
                "page {raw}"
            );
        }
        assert!(matches!(service.queue_page(GUILD, None).await.as_slice(), [Notice::PageEmpty]));
    }

    #[tokio::test]
    async fn shuffle_and_clear_always_acknowledge() {
        let (service, _) = service_with(MockTrackResolver::new());
        assert!(matches!(service.shuffle(GUILD).as_slice(), [Notice::QueueShuffled]));
        service.queue().push(GUILD, vec![track("a"), track("b")]);
        assert!(matches!(service.clear(GUILD).as_slice(), [Notice::QueueCleared]));
        assert_eq!(service.queue().len(GUILD), 0);
    }

    #[test]
    fn page_parsing() {
        assert_eq!(parse_page("1"), Some(0));
        assert_eq!(parse_page(" 3 "), Some(2));
        assert_eq!(parse_page("0"), None);
        assert_eq!(parse_page("x"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn guild_locks_are_released_after_enqueue() {
        let (service, _) = service_with(echo_resolver());
        service.enqueue(GUILD, Some("a"), Some(target())).await;
        service.enqueue(GuildId::new(8), None, Some(target())).await;
        assert!(service.guild_locks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn skip_while_resolving_drops_next_entry() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let mut resolver = MockTrackResolver::new();
        let first = gate.clone();
        resolver.expect_resolve().returning(move |_, _| Resolution {
            tracks: vec![blocking_track("a", first.clone()), track("b"), track("c")],
            notices: Vec::new(),
        });
        let (service, connector) = service_with(resolver);
        let service = Arc::new(service);

        let pending = {
            let service = service.clone();
            tokio::spawn(async move { service.enqueue(GUILD, Some("list"), Some(target())).await })
        };
        eventually(|| service.has_session(GUILD)).await;
        settle().await;

        // "a" sigue resolviéndose: no hay track actual pero sí cola
        assert!(service.subscription(GUILD).unwrap().now_playing().is_none());
        assert!(matches!(service.skip(GUILD).await.as_slice(), [Notice::TrackSkipped]));
        let titles: Vec<String> = service.queue().snapshot(GUILD).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["c".to_string()]);

        gate.notify_one();
        pending.await.unwrap();
        let (_, player) = connector.last().unwrap();
        assert_eq!(player.status(), PlayerStatus::Playing);
        assert_eq!(service.subscription(GUILD).unwrap().now_playing().unwrap().title, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn skip_with_empty_session_reports_nothing_playing() {
        let (service, connector) = service_with(echo_resolver());
        service.enqueue(GUILD, Some("a"), Some(target())).await;
        let (_, player) = connector.last().unwrap();
        player.finish();
        settle().await;

        assert!(service.has_session(GUILD));
        assert!(matches!(service.skip(GUILD).await.as_slice(), [Notice::NothingPlaying]));
    }
}
