use anyhow::Result;
use serenity::{
    all::{GuildId, Message, Permissions, UserId},
    prelude::Context,
};

use super::JukeboxBot;
use crate::{
    audio::{notice::Notice, service::JoinTarget},
    ui::embeds,
};

/// Comandos de texto soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Play,
    Shuffle,
    Disconnect,
    Queue,
    NowPlaying,
    Clear,
    Skip,
}

impl Command {
    /// Nombre o alias, sin distinguir mayúsculas
    pub fn from_name(name: &str) -> Option<Self> {
        let command = match name.to_lowercase().as_str() {
            "ping" => Command::Ping,
            "play" | "p" => Command::Play,
            "shuffle" => Command::Shuffle,
            "disconnect" | "dc" => Command::Disconnect,
            "queue" | "q" => Command::Queue,
            "now_playing" | "np" => Command::NowPlaying,
            "clear" | "cls" => Command::Clear,
            "skip" => Command::Skip,
            _ => return None,
        };
        Some(command)
    }
}

/// Separa el texto que sigue al prefijo en comando y argumentos.
///
/// Los argumentos se separan por espacios y se descartan los vacíos.
pub fn parse(rest: &str) -> Option<(Command, Vec<&str>)> {
    let mut tokens = rest.split(' ').filter(|token| !token.is_empty());
    let command = Command::from_name(tokens.next()?)?;
    Some((command, tokens.collect()))
}

/// Canal de voz del autor y lo que el bot puede hacer ahí, según la caché.
fn voice_target(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<JoinTarget> {
    let bot_id = ctx.cache.current_user().id;
    let guild = ctx.cache.guild(guild_id)?;

    let channel_id = guild.voice_states.get(&user_id)?.channel_id?;
    let channel = guild.channels.get(&channel_id)?;

    let permissions = match guild.members.get(&bot_id) {
        Some(member) => guild.user_permissions_in(channel, member),
        None => Permissions::empty(),
    };
    let occupants = guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id))
        .count();
    let channel_full = channel
        .user_limit
        .is_some_and(|limit| limit > 0 && occupants >= limit as usize);

    Some(JoinTarget {
        channel_id,
        can_view: permissions.view_channel(),
        can_connect: permissions.connect(),
        can_move_members: permissions.move_members(),
        channel_full,
    })
}

/// Ejecuta un comando y responde en el canal del mensaje
pub async fn dispatch(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    bot: &JukeboxBot,
    command: Command,
    args: &[&str],
) -> Result<()> {
    let service = &bot.service;

    let notices: Vec<Notice> = match command {
        Command::Ping => {
            msg.channel_id.say(&ctx.http, "🏓 Pong!").await?;
            return Ok(());
        }
        Command::Play => {
            let target = voice_target(ctx, guild_id, msg.author.id);
            service.enqueue(guild_id, args.first().copied(), target).await
        }
        Command::Shuffle => service.shuffle(guild_id),
        Command::Disconnect => service.disconnect(guild_id).await,
        Command::Queue => service.queue_page(guild_id, args.first().copied()).await,
        Command::NowPlaying => service.now_playing(guild_id).await,
        Command::Clear => service.clear(guild_id),
        Command::Skip => service.skip(guild_id).await,
    };

    for notice in &notices {
        let message = embeds::render(notice).into_message();
        msg.channel_id.send_message(&ctx.http, message).await?;
    }
    Ok(())
}
