//! # Bot Module
//!
//! Capa de Discord: recibe mensajes con prefijo (o mención), los traduce a
//! llamadas del [`AudioService`] y responde con los embeds de `ui::embeds`.
//!
//! También anuncia cada track que empieza en el último canal de texto desde
//! el que se usó un comando en ese guild.

use dashmap::DashMap;
use regex::Regex;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Message, Ready},
    async_trait,
    http::Http,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

pub mod commands;

use crate::{
    audio::{notice::PlaybackEvent, service::AudioService},
    config::Config,
    ui::embeds,
};

/// Handler de eventos de Discord.
pub struct JukeboxBot {
    config: Arc<Config>,
    pub service: Arc<AudioService>,
    /// `<@id>` o `<@!id>` del bot, conocido recién en `ready`
    mention: OnceLock<Regex>,
    /// Canal de texto donde anunciar, por guild
    announce_channels: Arc<DashMap<GuildId, ChannelId>>,
    announcer_started: AtomicBool,
}

impl JukeboxBot {
    pub fn new(config: Arc<Config>, service: Arc<AudioService>) -> Self {
        Self {
            config,
            service,
            mention: OnceLock::new(),
            announce_channels: Arc::new(DashMap::new()),
            announcer_started: AtomicBool::new(false),
        }
    }

    /// Resto del mensaje tras el prefijo o la mención, si lo hay
    fn strip_prefix<'a>(&self, content: &'a str) -> Option<&'a str> {
        if let Some(found) = self.mention.get().and_then(|re| re.find(content)) {
            return Some(&content[found.end()..]);
        }
        content.strip_prefix(self.config.command_prefix.as_str())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        match Regex::new(&format!(r"^<@!?{}>\s*", ready.user.id)) {
            Ok(re) => {
                let _ = self.mention.set(re);
            }
            Err(e) => error!("Error al compilar el patrón de mención: {:?}", e),
        }

        // un reconnect del gateway vuelve a disparar ready
        if !self.announcer_started.swap(true, Ordering::SeqCst) {
            let http = ctx.http.clone();
            let events = self.service.events();
            let channels = self.announce_channels.clone();
            tokio::spawn(async move {
                announce_now_playing(http, events, channels).await;
            });
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let Some(rest) = self.strip_prefix(&msg.content) else {
            return;
        };
        let Some((command, args)) = commands::parse(rest) else {
            return;
        };

        debug!("💬 {:?} {:?} en guild {}", command, args, guild_id);
        self.announce_channels.insert(guild_id, msg.channel_id);

        if let Err(e) = commands::dispatch(&ctx, &msg, guild_id, self, command, &args).await {
            error!("Error manejando comando {:?}: {:?}", command, e);
        }
    }
}

async fn announce_now_playing(
    http: Arc<Http>,
    mut events: broadcast::Receiver<PlaybackEvent>,
    channels: Arc<DashMap<GuildId, ChannelId>>,
) {
    loop {
        match events.recv().await {
            Ok(PlaybackEvent::Started { guild_id, track }) => {
                let Some(channel_id) = channels.get(&guild_id).map(|c| *c) else {
                    continue;
                };
                let message = embeds::Reply {
                    content: None,
                    embeds: vec![embeds::now_playing_embed(&track)],
                }
                .into_message();
                if let Err(e) = channel_id.send_message(&http, message).await {
                    warn!("Error al enviar mensaje now playing: {:?}", e);
                }
            }
            Ok(PlaybackEvent::Destroyed { guild_id }) => {
                debug!("📴 Sesión terminada en guild {}", guild_id);
            }
            Ok(PlaybackEvent::Finished { .. } | PlaybackEvent::Error { .. }) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("Anunciador atrasado: {} eventos perdidos", skipped);
            }
            Err(RecvError::Closed) => return,
        }
    }
}
