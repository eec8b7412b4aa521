//! HTTP surface.
//!
//! Maps requests onto the session operations and the catalog:
//!
//! * `GET /get_current_track_beta` - header `ya-token`
//! * `GET /play_ynison_track` - headers `ya-token` and `track-id`
//! * `GET /song/{track_id}` - header `ya-token`
//! * `GET /songs?track_ids=1,2,3` - header `ya-token`
//!
//! Library lookups, all with header `ya-token`:
//!
//! * `GET /album/{album_id}`
//! * `GET /artist/{artist_id}`
//! * `GET /favourite_songs?skip=0&count=25`
//! * `GET /get_likes_from_username?username=...&skip=0&count=10`
//! * `GET /like_track/{track_id}` and `GET /dislike_track/{track_id}`
//! * `GET /search?request=...`
//! * `GET /new_release?skip=0&count=10`
//! * `GET /playlist_of_the_day`
//!
//! Anything else is served from the static directory. Errors are returned as
//! `{"detail": "<message>"}` with a status code derived from the
//! [`ErrorKind`].

use std::{future::Future, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, time::timeout};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    catalog::Library,
    error::{Error, ErrorKind, Result},
    protocol::catalog::{AlbumInfo, ArtistInfo, LikeOutcome, Metadata, SearchResult, TrackPage},
    session::{CurrentState, Session},
    token::Token,
};

/// Header carrying the OAuth token.
pub const TOKEN_HEADER: &str = "ya-token";

/// Header carrying the track to play.
pub const TRACK_ID_HEADER: &str = "track-id";

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Session,
    pub catalog: Arc<dyn Library>,
}

impl AppState {
    #[must_use]
    pub fn new(session: Session, catalog: Arc<dyn Library>) -> Self {
        Self { session, catalog }
    }

    /// Runs `operation` under the configured request deadline.
    async fn deadline<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        timeout(self.session.config().request_timeout, operation).await?
    }
}

/// Response of `GET /get_current_track_beta`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    #[serde(flatten)]
    pub state: CurrentState,

    /// Catalog metadata of the selected track, if it is a catalog track.
    pub track: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct SongsQuery {
    track_ids: String,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    skip: usize,
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LikesQuery {
    username: String,
    #[serde(default)]
    skip: usize,
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    request: String,
}

/// Page size of the token's own likes.
const FAVOURITES_PAGE: usize = 25;

/// Page size of other listings.
const PAGE: usize = 10;

#[derive(Serialize)]
struct Detail {
    detail: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.kind {
            ErrorKind::HandshakeFailed
            | ErrorKind::ChannelFailed
            | ErrorKind::MalformedPayload
            | ErrorKind::IndexOutOfRange => StatusCode::BAD_GATEWAY,
            ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }

        let body = Detail {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .ok_or_else(|| Error::invalid_argument(format!("missing `{name}` header")))?
        .to_str()
        .map_err(|e| Error::invalid_argument(format!("`{name}` header: {e}")))
}

fn token(headers: &HeaderMap) -> Result<Token> {
    header(headers, TOKEN_HEADER)?.parse()
}

fn parse_id(what: &str, id: &str) -> Result<u64> {
    id.trim()
        .parse()
        .map_err(|e| Error::invalid_argument(format!("{what} id {id:?}: {e}")))
}

fn parse_track_id(id: &str) -> Result<u64> {
    parse_id("track", id)
}

async fn current_track(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<NowPlaying>> {
    let token = token(&headers)?;
    let current = state.deadline(state.session.state(&token)).await?;

    let track = match current.selected().and_then(|playable| playable.track_id()) {
        Some(track_id) => Some(state.deadline(state.catalog.resolve(&token, track_id)).await?),
        None => None,
    };

    Ok(Json(NowPlaying {
        state: CurrentState::from(&current),
        track,
    }))
}

async fn play_track(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<bool>> {
    let token = token(&headers)?;
    let track_id = parse_track_id(header(&headers, TRACK_ID_HEADER)?)?;
    let pushed = state
        .deadline(state.session.push_track(&token, track_id))
        .await?;
    Ok(Json(pushed))
}

async fn song(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Metadata>> {
    let token = token(&headers)?;
    let track_id = parse_track_id(&track_id)?;
    let metadata = state
        .deadline(state.catalog.resolve(&token, track_id))
        .await?;
    Ok(Json(metadata))
}

async fn songs(
    State(state): State<AppState>,
    Query(query): Query<SongsQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Metadata>>> {
    let token = token(&headers)?;
    let track_ids = query
        .track_ids
        .split(',')
        .filter(|id| !id.trim().is_empty())
        .map(parse_track_id)
        .collect::<Result<Vec<_>>>()?;

    let mut tracks = Vec::with_capacity(track_ids.len());
    for track_id in track_ids {
        tracks.push(
            state
                .deadline(state.catalog.resolve(&token, track_id))
                .await?,
        );
    }
    Ok(Json(tracks))
}

async fn album(
    State(state): State<AppState>,
    Path(album_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AlbumInfo>> {
    let token = token(&headers)?;
    let album_id = parse_id("album", &album_id)?;
    let album = state.deadline(state.catalog.album(&token, album_id)).await?;
    Ok(Json(album))
}

async fn artist(
    State(state): State<AppState>,
    Path(artist_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ArtistInfo>> {
    let token = token(&headers)?;
    let artist_id = parse_id("artist", &artist_id)?;
    let artist = state
        .deadline(state.catalog.artist(&token, artist_id))
        .await?;
    Ok(Json(artist))
}

async fn favourite_songs(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<TrackPage>> {
    let token = token(&headers)?;
    let count = query.count.unwrap_or(FAVOURITES_PAGE);
    let page = state
        .deadline(state.catalog.liked_tracks(&token, None, query.skip, count))
        .await?;
    Ok(Json(page))
}

async fn likes_of_user(
    State(state): State<AppState>,
    Query(query): Query<LikesQuery>,
    headers: HeaderMap,
) -> Result<Json<TrackPage>> {
    let token = token(&headers)?;
    let username = query.username.trim();
    if username.is_empty() {
        return Err(Error::invalid_argument("empty `username`"));
    }

    let count = query.count.unwrap_or(PAGE);
    let page = state
        .deadline(
            state
                .catalog
                .liked_tracks(&token, Some(username), query.skip, count),
        )
        .await?;
    Ok(Json(page))
}

async fn set_liked(
    state: &AppState,
    headers: &HeaderMap,
    track_id: &str,
    liked: bool,
) -> Result<Json<LikeOutcome>> {
    let token = token(headers)?;
    let track_id = parse_track_id(track_id)?;
    let outcome = state
        .deadline(state.catalog.set_liked(&token, track_id, liked))
        .await?;
    Ok(Json(outcome))
}

async fn like_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<LikeOutcome>> {
    set_liked(&state, &headers, &track_id, true).await
}

async fn dislike_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<LikeOutcome>> {
    set_liked(&state, &headers, &track_id, false).await
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    headers: HeaderMap,
) -> Result<Json<SearchResult>> {
    let token = token(&headers)?;
    let text = query.request.trim();
    if text.is_empty() {
        return Err(Error::invalid_argument("empty search `request`"));
    }

    let result = state.deadline(state.catalog.search(&token, text)).await?;
    Ok(Json(result))
}

async fn new_releases(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<AlbumInfo>>> {
    let token = token(&headers)?;
    let count = query.count.unwrap_or(PAGE);
    let albums = state
        .deadline(state.catalog.new_releases(&token, query.skip, count))
        .await?;
    Ok(Json(albums))
}

async fn playlist_of_the_day(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Metadata>>> {
    let token = token(&headers)?;
    let tracks = state
        .deadline(state.catalog.playlist_of_the_day(&token))
        .await?;
    Ok(Json(tracks))
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    let static_dir = state.session.config().static_dir.clone();

    Router::new()
        .route("/get_current_track_beta", get(current_track))
        .route("/play_ynison_track", get(play_track))
        .route("/song/:track_id", get(song))
        .route("/songs", get(songs))
        .route("/album/:album_id", get(album))
        .route("/artist/:artist_id", get(artist))
        .route("/favourite_songs", get(favourite_songs))
        .route("/get_likes_from_username", get(likes_of_user))
        .route("/like_track/:track_id", get(like_track))
        .route("/dislike_track/:track_id", get(dislike_track))
        .route("/search", get(search))
        .route("/new_release", get(new_releases))
        .route("/playlist_of_the_day", get(playlist_of_the_day))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router on `config.bind` until `shutdown` completes.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind = state.session.config().bind;
    let listener = TcpListener::bind(bind).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
