//! Catalog REST API responses.
//!
//! Every catalog response wraps its payload in a `result` member:
//!
//! ```json
//! {
//!     "invocationInfo": { "req-id": "...", "hostname": "..." },
//!     "result": [{
//!         "id": "12345",
//!         "title": "Song",
//!         "artists": [{ "name": "Artist" }],
//!         "albums": [{ "id": 678 }],
//!         "coverUri": "avatars.yandex.net/get-music-content/.../%%",
//!         "durationMs": 215000
//!     }]
//! }
//! ```
//!
//! Direct links take two more steps: `download-info` lists the available
//! encodings, and the chosen entry's `downloadInfoUrl` returns the storage
//! location to sign.
//!
//! The wire types below mirror only the members this crate reads. The
//! summaries at the end ([`Metadata`], [`AlbumInfo`], [`ArtistInfo`],
//! [`TrackPage`], [`SearchResult`]) are what the HTTP surface returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use url::Url;
use veil::Redact;

/// Response wrapper.
#[derive(Clone, Debug, Deserialize)]
pub struct Response<T> {
    pub result: T,
}

/// A catalog track.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Track {
    /// Numeric for catalog tracks, `"{id}:{album}"` or a UUID for others.
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    pub title: String,
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub cover_uri: Option<String>,
    pub duration_ms: u64,
    pub available: bool,
}

impl Track {
    /// The catalog id, if this is a catalog track.
    #[must_use]
    pub fn numeric_id(&self) -> Option<u64> {
        match TrackId::from(self.id.as_str()) {
            TrackId::Numeric(id) => Some(id),
            TrackId::Other(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Artist {
    pub name: String,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Album {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,
    pub title: String,
    pub artists: Vec<Artist>,
    pub track_count: u32,
    pub cover_uri: Option<String>,

    /// Discs, each a list of tracks. Only sent by `with-tracks`.
    pub volumes: Vec<Vec<Track>>,
}

/// Reference to a track in likes and generated playlists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrackShort {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
}

/// `artists/{id}/brief-info`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BriefInfo {
    pub artist: ArtistDetails,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArtistDetails {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,
    pub name: String,
    pub cover: Option<Cover>,
    pub genres: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Cover {
    pub uri: String,
}

/// `artists/{id}/tracks`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArtistTracks {
    pub tracks: Vec<Track>,
}

/// `artists/{id}/direct-albums`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArtistAlbums {
    pub albums: Vec<Album>,
}

/// `account/status`.
#[derive(Clone, Debug, Deserialize)]
pub struct AccountStatus {
    pub account: Account,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Account {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub uid: u64,
}

/// `users/{owner}/likes/tracks`.
#[derive(Clone, Debug, Deserialize)]
pub struct Likes {
    pub library: LikedLibrary,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LikedLibrary {
    pub tracks: Vec<TrackShort>,
}

/// `search`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Search {
    pub best: Option<SearchBest>,
    pub tracks: Option<SearchTracks>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchBest {
    #[serde(rename = "type")]
    pub kind: String,
    pub result: Value,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchTracks {
    pub results: Vec<Track>,
}

/// `landing3/new-releases`.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewReleases {
    #[serde_as(as = "Vec<PickFirst<(_, DisplayFromStr)>>")]
    pub new_releases: Vec<u64>,
}

/// `feed`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Feed {
    pub generated_playlists: Vec<GeneratedPlaylist>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GeneratedPlaylist {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: GeneratedPlaylistData,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GeneratedPlaylistData {
    pub tracks: Vec<TrackShort>,
}

impl GeneratedPlaylist {
    /// Feed type of the daily mix.
    pub const PLAYLIST_OF_THE_DAY: &'static str = "playlistOfTheDay";
}

/// One available encoding of a track.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub codec: String,
    #[serde(default)]
    pub bitrate_in_kbps: u32,
    #[serde(default)]
    pub preview: bool,
    pub download_info_url: Url,
}

/// Storage location returned by a `downloadInfoUrl`.
#[derive(Clone, Redact, PartialEq, Eq, Deserialize)]
pub struct Location {
    pub host: String,
    pub path: String,
    pub ts: String,
    #[redact]
    pub s: String,
}

/// Track metadata as returned by the HTTP surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub track_id: TrackId,
    pub title: String,
    pub artist: String,
    pub img: String,
    pub duration: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub album: Option<u64>,
    pub download_link: String,
}

/// Album summary with the ids of its first disc.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumInfo {
    pub title: String,
    pub artists: String,
    pub track_count: u32,
    pub img: String,
    pub tracks: Vec<u64>,
}

/// Artist summary with album and popular track ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistInfo {
    pub id: u64,
    pub name: String,
    pub cover_url: String,
    pub genres: Vec<String>,
    pub albums: Vec<u64>,
    pub tracks: Vec<u64>,
}

/// One page of a track listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPage {
    pub skipped: usize,

    /// Entries in the requested window, including any that were skipped
    /// because they could not be resolved.
    pub count: usize,
    pub total: usize,
    pub tracks: Vec<Metadata>,
}

/// Outcome of liking or unliking a track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
    /// Whether the catalog acknowledged the change with a new revision.
    pub message: bool,
}

/// Search results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Kind of the best match: `track`, `album`, `artist` or another kind
    /// that is passed through without details.
    #[serde(rename = "type")]
    pub kind: String,
    pub best: Option<BestMatch>,
    pub tracks: Vec<Metadata>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BestMatch {
    Track(Metadata),
    Album(AlbumInfo),
    Artist(ArtistInfo),
}

/// Numeric for catalog tracks, the raw id otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackId {
    Numeric(u64),
    Other(String),
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        let prefix = id.split(':').next().unwrap_or(id);
        match prefix.parse() {
            Ok(id) => Self::Numeric(id),
            Err(_) => Self::Other(id.to_owned()),
        }
    }
}
