use anyhow::Result;
use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize};
use songbird::input::{HttpRequest, Input};
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use super::{ResolveContext, Resolution, TrackResolver};
use crate::{
    audio::{
        notice::{NotTargetReason, Notice},
        track::{total_playback_time, Author, StreamSource, Track, TrackKind},
    },
    error::{PlaybackError, ResolveError},
};

const ACCEPTED_ORIGINS: [&str; 2] = ["https://www.youtube.com", "https://youtube.com"];

/// Opus en webm primero: songbird lo pasa sin recodificar
const AUDIO_FORMAT: &str = "bestaudio[acodec=opus][ext=webm]/bestaudio/best";

/// Lo que se pidió, según la URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Video(String),
    Playlist(String),
}

/// Clasifica una clave sin tocar la red.
pub(crate) fn classify(key: &str) -> Result<Target, NotTargetReason> {
    let url = Url::parse(key).map_err(|_| NotTargetReason::MalformedUrl)?;
    if url.scheme() != "https" {
        return Err(NotTargetReason::NonAcceptableUrlProtocol);
    }

    let origin = url.origin().ascii_serialization();
    if !ACCEPTED_ORIGINS.contains(&origin.as_str()) {
        return Err(NotTargetReason::NoMatch);
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    };

    let path = url.path();
    if path.starts_with("/playlist") {
        param("list")
            .map(Target::Playlist)
            .ok_or(NotTargetReason::PlaylistIdNotIncluded)
    } else if path.starts_with("/watch") {
        param("v")
            .map(Target::Video)
            .ok_or(NotTargetReason::VideoIdNotIncluded)
    } else {
        Err(NotTargetReason::NotPlaylistUrlOrPlaybackUrl)
    }
}

/// Invocaciones de yt-dlp, con límite de procesos simultáneos.
struct YtDlp {
    program: String,
    lang: Option<String>,
    timeout: Duration,
    // Limitar procesos concurrentes para evitar rate limiting
    limiter: Semaphore,
}

impl YtDlp {
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, ResolveError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Extractor(e.to_string()))?;

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ResolveError::Extractor(format!("sin respuesta tras {:?}", self.timeout)))??;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Extractor(error.trim().to_string()));
        }
        Ok(output.stdout)
    }

    async fn json<T: DeserializeOwned>(&self, flags: &[&str], url: &str) -> Result<T, ResolveError> {
        let lang_arg = self.lang.as_ref().map(|lang| format!("youtube:lang={lang}"));

        let mut args: Vec<&str> = flags.to_vec();
        args.push("--no-warnings");
        if let Some(lang_arg) = &lang_arg {
            args.extend(["--extractor-args", lang_arg.as_str()]);
        }
        args.push(url);

        let stdout = self.run(&args).await?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}

/// Audio de un video, pedido a yt-dlp recién al reproducir
struct YtDlpStream {
    ytdlp: Arc<YtDlp>,
    http: reqwest::Client,
    url: String,
}

#[async_trait]
impl StreamSource for YtDlpStream {
    async fn resolve_stream(&self) -> Result<Option<Input>, PlaybackError> {
        debug!("🎵 Obteniendo URL de stream para: {}", self.url);

        let stdout = self
            .ytdlp
            .run(&["--no-playlist", "-f", AUDIO_FORMAT, "--get-url", "--no-warnings", &self.url])
            .await
            .map_err(|e| PlaybackError::StreamAcquisition {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&stdout);
        let Some(stream_url) = stdout.lines().map(str::trim).find(|line| !line.is_empty()) else {
            return Ok(None);
        };

        Ok(Some(Input::from(HttpRequest::new(
            self.http.clone(),
            stream_url.to_string(),
        ))))
    }
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    uploader_url: Option<String>,
    channel: Option<String>,
    channel_url: Option<String>,
    thumbnail: Option<String>,
    webpage_url: String,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistInfo {
    title: Option<String>,
    thumbnails: Option<Vec<Thumbnail>>,
    entries: Option<Vec<PlaylistEntry>>,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    id: String,
    title: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    uploader_url: Option<String>,
    channel: Option<String>,
    channel_url: Option<String>,
    thumbnails: Option<Vec<Thumbnail>>,
    playlist_index: Option<u64>,
}

fn seconds(duration: Option<f64>) -> Duration {
    duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or_default()
}

/// La última miniatura que lista yt-dlp es la de mayor resolución
fn best_thumbnail(thumbnails: Option<Vec<Thumbnail>>) -> Option<String> {
    thumbnails?.pop().map(|t| t.url)
}

/// Resolver de videos y playlists de YouTube vía yt-dlp.
pub struct YouTubeResolver {
    ytdlp: Arc<YtDlp>,
    http: reqwest::Client,
    video_id: Regex,
    playlist_id: Regex,
}

impl YouTubeResolver {
    pub fn new(program: &str, lang: Option<String>, timeout: Duration) -> Result<Self> {
        // sin timeout total: el body del stream dura lo que dure la canción
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            ytdlp: Arc::new(YtDlp {
                program: program.to_string(),
                lang,
                timeout,
                limiter: Semaphore::new(3),
            }),
            http,
            video_id: Regex::new(r"^[A-Za-z0-9_-]{11}$")?,
            playlist_id: Regex::new(r"^[A-Za-z0-9_-]+$")?,
        })
    }

    fn track(
        &self,
        title: String,
        url: String,
        author: Author,
        duration: Option<f64>,
        thumbnail: Option<String>,
    ) -> Track {
        let source = Arc::new(YtDlpStream {
            ytdlp: self.ytdlp.clone(),
            http: self.http.clone(),
            url: url.clone(),
        });
        Track::new(TrackKind::YoutubeVideo, author, title, url, seconds(duration), source)
            .with_thumbnail(thumbnail)
    }

    fn video_track(&self, info: VideoInfo) -> Track {
        let author = Author {
            name: info.uploader.or(info.channel).unwrap_or_default(),
            url: info.uploader_url.or(info.channel_url).unwrap_or_default(),
        };
        self.track(info.title, info.webpage_url, author, info.duration, info.thumbnail)
    }

    fn playlist_tracks(&self, entries: Vec<PlaylistEntry>) -> Vec<Track> {
        let mut entries = entries;
        entries.sort_by_key(|entry| entry.playlist_index.unwrap_or(u64::MAX));

        entries
            .into_iter()
            .map(|entry| {
                let url = entry
                    .url
                    .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", entry.id));
                let author = Author {
                    name: entry.uploader.or(entry.channel).unwrap_or_default(),
                    url: entry.uploader_url.or(entry.channel_url).unwrap_or_default(),
                };
                self.track(
                    entry.title.unwrap_or_else(|| entry.id.clone()),
                    url,
                    author,
                    entry.duration,
                    best_thumbnail(entry.thumbnails),
                )
            })
            .collect()
    }

    async fn resolve_video(&self, key: &str, id: &str, ctx: &ResolveContext) -> Resolution {
        if !self.video_id.is_match(id) {
            return Resolution::rejected(key, NotTargetReason::FailedToGetHandle);
        }

        let url = format!("https://www.youtube.com/watch?v={id}");
        let info: VideoInfo = match self.ytdlp.json(&["--no-playlist", "--dump-json"], &url).await {
            Ok(info) => info,
            Err(e) => {
                warn!("❌ No se pudo obtener metadata de {}: {}", url, e);
                return Resolution::rejected(key, NotTargetReason::FailedToFetchMetadata);
            }
        };

        let track = self.video_track(info);
        info!("🎵 Resuelto: {}", track.title);

        let queued = ctx.queued_tracks();
        let track_time = track.playback_time;
        let notice = Notice::TrackQueued {
            track: track.clone(),
            position: queued.len() + 1,
            track_time,
            total_time: track_time + total_playback_time(&queued) + ctx.current_remaining(),
        };
        Resolution {
            tracks: vec![track],
            notices: vec![notice],
        }
    }

    async fn resolve_playlist(&self, key: &str, id: &str, ctx: &ResolveContext) -> Resolution {
        if !self.playlist_id.is_match(id) {
            return Resolution::rejected(key, NotTargetReason::FailedToGetHandle);
        }

        let url = format!("https://www.youtube.com/playlist?list={id}");
        let info: PlaylistInfo = match self
            .ytdlp
            .json(&["--flat-playlist", "--dump-single-json"], &url)
            .await
        {
            Ok(info) => info,
            Err(e) => {
                warn!("❌ No se pudo obtener la playlist {}: {}", url, e);
                return Resolution::rejected(key, NotTargetReason::FailedToFetchMetadata);
            }
        };

        let tracks = self.playlist_tracks(info.entries.unwrap_or_default());
        if tracks.is_empty() {
            return Resolution::rejected(key, NotTargetReason::EmptyPlaylist);
        }

        let title = info.title.unwrap_or_default();
        info!("📋 Playlist '{}' resuelta: {} tracks", title, tracks.len());

        let queued = ctx.queued_tracks();
        let added_time = total_playback_time(&tracks);
        let notice = Notice::PlaylistQueued {
            title,
            thumbnail: best_thumbnail(info.thumbnails),
            count: tracks.len(),
            total: queued.len() + tracks.len(),
            added_time,
            total_time: added_time + total_playback_time(&queued) + ctx.current_remaining(),
        };
        Resolution {
            tracks,
            notices: vec![notice],
        }
    }
}

#[async_trait]
impl TrackResolver for YouTubeResolver {
    async fn resolve(&self, key: &str, ctx: &ResolveContext) -> Resolution {
        match classify(key) {
            Ok(Target::Video(id)) => self.resolve_video(key, &id, ctx).await,
            Ok(Target::Playlist(id)) => self.resolve_playlist(key, &id, ctx).await,
            Err(reason) => {
                debug!("🔍 Clave rechazada ({}): {}", reason.code(), key);
                Resolution::rejected(key, reason)
            }
        }
    }
}
