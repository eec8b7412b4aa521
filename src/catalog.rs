//! Track metadata from the catalog REST API.
//!
//! The session protocol only carries track ids. [`TrackInfo`] turns an id
//! into display metadata and a direct download link; [`Library`] adds the
//! album, artist, likes, search and feed lookups served next to the session
//! endpoints. [`Client`] implements both against the catalog API.
//!
//! Listings resolve each track in turn and skip the ones that fail, logging
//! a warning. Lookups of a single item propagate the failure.
//!
//! # Direct links
//!
//! The direct link is built from the storage location of the chosen
//! encoding:
//!
//! ```text
//! https://{host}/get-mp3/{md5(SALT + path[1..] + s)}/{ts}{path}
//! ```

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use url::{form_urlencoded, Url};

use crate::{
    error::{Error, Result},
    protocol::{
        self,
        catalog::{
            AccountStatus, Album, AlbumInfo, ArtistAlbums, ArtistInfo, ArtistTracks, BestMatch,
            BriefInfo, DownloadInfo, Feed, GeneratedPlaylist, LikeOutcome, Likes, Location,
            Metadata, NewReleases, Response, Search, SearchResult, Track, TrackId, TrackPage,
            TrackShort,
        },
    },
    token::Token,
    transport::Transport,
};

/// Resolves track ids to metadata.
#[async_trait]
pub trait TrackInfo: Send + Sync {
    /// Resolves `track_id` on behalf of `token`.
    ///
    /// # Errors
    ///
    /// * `Unauthenticated` - the catalog rejected the token
    /// * `NotFound` - no such track, or no downloadable encoding
    /// * `Unavailable` - the catalog could not be reached
    /// * `MalformedPayload` - unexpected response
    async fn resolve(&self, token: &Token, track_id: u64) -> Result<Metadata>;
}

/// Catalog lookups beyond single tracks.
///
/// Every method fails with the same kinds as [`TrackInfo::resolve`].
#[async_trait]
pub trait Library: TrackInfo {
    async fn album(&self, token: &Token, album_id: u64) -> Result<AlbumInfo>;

    async fn artist(&self, token: &Token, artist_id: u64) -> Result<ArtistInfo>;

    /// Lists liked tracks of `owner`, or of the token's own account if
    /// `None`. `owner` is a login or a numeric uid.
    async fn liked_tracks(
        &self,
        token: &Token,
        owner: Option<&str>,
        skip: usize,
        count: usize,
    ) -> Result<TrackPage>;

    /// Adds `track_id` to the token's likes, or removes it.
    async fn set_liked(&self, token: &Token, track_id: u64, liked: bool) -> Result<LikeOutcome>;

    async fn search(&self, token: &Token, text: &str) -> Result<SearchResult>;

    async fn new_releases(&self, token: &Token, skip: usize, count: usize)
        -> Result<Vec<AlbumInfo>>;

    /// Tracks of the generated daily playlist, empty if the feed has none.
    async fn playlist_of_the_day(&self, token: &Token) -> Result<Vec<Metadata>>;
}

/// Returns the window of `items` after `skip`, at most `count` long.
#[must_use]
pub fn page<T>(items: &[T], skip: usize, count: usize) -> &[T] {
    let start = skip.min(items.len());
    let end = start.saturating_add(count).min(items.len());
    &items[start..end]
}

/// Catalog API client.
pub struct Client {
    transport: Arc<Transport>,
    base_url: Url,
}

impl Client {
    /// Salt of the direct link signature.
    const SIGN_SALT: &'static str = "XGRlBW9FXlekgbPrRHuSiA";

    /// Size of cover images.
    const COVER_SIZE: &'static str = "1000x1000";

    /// Preferred codec of direct links.
    const CODEC: &'static str = "mp3";

    #[must_use]
    pub fn new(transport: Arc<Transport>, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    async fn send<T>(&self, mut request: reqwest::Request, token: &Token, origin: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Debug,
    {
        let mut authorization = HeaderValue::from_str(&format!("OAuth {}", token.as_str()))?;
        authorization.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, authorization);

        let response = self.transport.http.execute(request).await?;
        let body = response.error_for_status()?.text().await?;
        protocol::json(&body, origin)
    }

    async fn get<T>(&self, url: Url, token: &Token, origin: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Debug,
    {
        let request = self.transport.http.get(url);
        self.send(request, token, origin).await
    }

    async fn api<T>(&self, path: &str, token: &Token, origin: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Debug,
    {
        let url = self.base_url.join(path)?;
        let response: Response<T> = self.get(url, token, origin).await?;
        Ok(response.result)
    }

    async fn account_uid(&self, token: &Token) -> Result<u64> {
        let status: AccountStatus = self.api("account/status", token, "account status").await?;
        Ok(status.account.uid)
    }

    async fn track(&self, token: &Token, track_id: u64) -> Result<Track> {
        let url = self.base_url.join(&format!("tracks/{track_id}"))?;
        let response: Response<Vec<Track>> = self.get(url, token, "tracks").await?;
        response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("track {track_id} not found")))
    }

    async fn download_link(&self, token: &Token, track_id: u64) -> Result<String> {
        let url = self
            .base_url
            .join(&format!("tracks/{track_id}/download-info"))?;
        let response: Response<Vec<DownloadInfo>> =
            self.get(url, token, "download-info").await?;
        let info = Self::choose(&response.result).ok_or_else(|| {
            Error::not_found(format!("track {track_id} has no downloadable encoding"))
        })?;

        let mut url = info.download_info_url.clone();
        url.query_pairs_mut().append_pair("format", "json");
        let location: Location = self.get(url, token, "download location").await?;

        Ok(Self::direct_link(&location))
    }

    /// Picks the best full-length mp3, or any encoding if there is none.
    fn choose(infos: &[DownloadInfo]) -> Option<&DownloadInfo> {
        infos
            .iter()
            .filter(|info| info.codec == Self::CODEC && !info.preview)
            .max_by_key(|info| info.bitrate_in_kbps)
            .or_else(|| infos.first())
    }

    /// Signs the storage location into a direct link.
    #[must_use]
    pub fn direct_link(location: &Location) -> String {
        let path = location.path.strip_prefix('/').unwrap_or(&location.path);
        let sign = format!(
            "{:x}",
            Md5::digest(format!("{}{path}{}", Self::SIGN_SALT, location.s))
        );
        format!(
            "https://{}/get-mp3/{sign}/{}{}",
            location.host, location.ts, location.path
        )
    }

    /// Expands a cover URI template to a full-size image link.
    #[must_use]
    pub fn cover(uri: &str) -> String {
        match uri.strip_suffix("%%") {
            Some(prefix) => format!("https://{prefix}{}", Self::COVER_SIZE),
            None => format!("https://{uri}"),
        }
    }

    /// Assembles metadata from a catalog track.
    #[must_use]
    pub fn metadata(track: &Track, download_link: String) -> Metadata {
        let duration = track.duration_ms / 1000;
        let rounded = (track.duration_ms + 500) / 1000;

        Metadata {
            track_id: TrackId::from(track.id.as_str()),
            title: track.title.clone(),
            artist: track
                .artists
                .iter()
                .map(|artist| artist.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            img: track.cover_uri.as_deref().map(Self::cover).unwrap_or_default(),
            duration,
            minutes: rounded / 60,
            seconds: rounded % 60,
            album: track.albums.first().map(|album| album.id),
            download_link,
        }
    }

    /// Summarizes an album with the catalog ids of its first disc.
    #[must_use]
    pub fn album_info(album: &Album) -> AlbumInfo {
        AlbumInfo {
            title: album.title.clone(),
            artists: album
                .artists
                .iter()
                .map(|artist| artist.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            track_count: album.track_count,
            img: album.cover_uri.as_deref().map(Self::cover).unwrap_or_default(),
            tracks: album
                .volumes
                .first()
                .map(|volume| volume.iter().filter_map(Track::numeric_id).collect())
                .unwrap_or_default(),
        }
    }

    async fn track_metadata(&self, token: &Token, track: &Track) -> Result<Metadata> {
        let track_id = track
            .numeric_id()
            .ok_or_else(|| Error::not_found(format!("{} is not a catalog track", track.id)))?;
        let download_link = self.download_link(token, track_id).await?;
        Ok(Self::metadata(track, download_link))
    }

    /// Resolves listed tracks, skipping the ones that fail.
    async fn resolve_listed(&self, token: &Token, tracks: &[TrackShort]) -> Vec<Metadata> {
        let mut resolved = Vec::new();
        for track in tracks {
            let TrackId::Numeric(track_id) = TrackId::from(track.id.as_str()) else {
                trace!("skipping non-catalog track {}", track.id);
                continue;
            };
            match self.resolve(token, track_id).await {
                Ok(metadata) => resolved.push(metadata),
                Err(e) => warn!("skipping track {track_id}: {e}"),
            }
        }
        resolved
    }

    fn search_url(&self, text: &str, kind: &str) -> Result<Url> {
        let mut url = self.base_url.join("search")?;
        url.query_pairs_mut()
            .append_pair("text", text)
            .append_pair("nocorrect", "false")
            .append_pair("type", kind)
            .append_pair("page", "0")
            .append_pair("playlist-in-best", "true");
        Ok(url)
    }

    /// Numeric `id` of a search result, sent as a number or a string.
    fn result_id(result: &Value) -> Result<u64> {
        let id = result
            .get("id")
            .ok_or_else(|| Error::malformed_payload("search result has no id"))?;
        match id {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| Error::malformed_payload(format!("search result id {id} is not numeric")))
    }

    /// Details the best search match, if it is of a kind with details.
    async fn best_match(&self, token: &Token, kind: &str, result: Value) -> Result<Option<BestMatch>> {
        let best = match kind {
            "track" => {
                let track: Track = serde_json::from_value(result)?;
                BestMatch::Track(self.track_metadata(token, &track).await?)
            }
            "album" => BestMatch::Album(self.album(token, Self::result_id(&result)?).await?),
            "artist" => BestMatch::Artist(self.artist(token, Self::result_id(&result)?).await?),
            other => {
                debug!("best match of kind {other} has no details");
                return Ok(None);
            }
        };
        Ok(Some(best))
    }
}

#[async_trait]
impl TrackInfo for Client {
    async fn resolve(&self, token: &Token, track_id: u64) -> Result<Metadata> {
        let track = self.track(token, track_id).await?;
        let download_link = self.download_link(token, track_id).await?;
        debug!("resolved track {track_id}: {}", track.title);
        Ok(Self::metadata(&track, download_link))
    }
}

#[async_trait]
impl Library for Client {
    async fn album(&self, token: &Token, album_id: u64) -> Result<AlbumInfo> {
        let album: Album = self
            .api(&format!("albums/{album_id}/with-tracks"), token, "album")
            .await?;
        Ok(Self::album_info(&album))
    }

    async fn artist(&self, token: &Token, artist_id: u64) -> Result<ArtistInfo> {
        let brief: BriefInfo = self
            .api(&format!("artists/{artist_id}/brief-info"), token, "artist")
            .await?;
        let tracks: ArtistTracks = self
            .api(&format!("artists/{artist_id}/tracks"), token, "artist tracks")
            .await?;
        let albums: ArtistAlbums = self
            .api(&format!("artists/{artist_id}/direct-albums"), token, "artist albums")
            .await?;

        let artist = brief.artist;
        Ok(ArtistInfo {
            id: artist.id,
            name: artist.name,
            cover_url: artist
                .cover
                .map(|cover| Self::cover(&cover.uri))
                .unwrap_or_default(),
            genres: artist.genres,
            albums: albums.albums.iter().map(|album| album.id).collect(),
            tracks: tracks.tracks.iter().filter_map(Track::numeric_id).collect(),
        })
    }

    async fn liked_tracks(
        &self,
        token: &Token,
        owner: Option<&str>,
        skip: usize,
        count: usize,
    ) -> Result<TrackPage> {
        let owner = match owner {
            Some(owner) => owner.to_owned(),
            None => self.account_uid(token).await?.to_string(),
        };
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::invalid_argument(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["users", owner.as_str(), "likes", "tracks"]);
        let likes: Response<Likes> = self.get(url, token, "likes").await?;
        let likes = likes.result;

        let all = &likes.library.tracks;
        let window = page(all, skip, count);
        let tracks = self.resolve_listed(token, window).await;
        debug!(
            "resolved {} of {} liked tracks of {owner}",
            tracks.len(),
            window.len()
        );

        Ok(TrackPage {
            skipped: skip,
            count: window.len(),
            total: all.len(),
            tracks,
        })
    }

    async fn set_liked(&self, token: &Token, track_id: u64, liked: bool) -> Result<LikeOutcome> {
        let uid = self.account_uid(token).await?;
        let action = if liked { "add-multiple" } else { "remove" };
        let url = self
            .base_url
            .join(&format!("users/{uid}/likes/tracks/{action}"))?;
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("track-ids", &track_id.to_string())
            .finish();

        let request = self.transport.http.post_form(url, form);
        let response: Response<Value> = self.send(request, token, "like").await?;
        let message = response.result.get("revision").is_some();
        debug!("{action} track {track_id}: acknowledged {message}");
        Ok(LikeOutcome { message })
    }

    async fn search(&self, token: &Token, text: &str) -> Result<SearchResult> {
        let all: Response<Search> = self
            .get(self.search_url(text, "all")?, token, "search")
            .await?;

        let (kind, best) = match all.result.best {
            Some(best) => {
                let details = self.best_match(token, &best.kind, best.result).await?;
                (best.kind, details)
            }
            None => (String::new(), None),
        };

        let found: Response<Search> = self
            .get(self.search_url(text, "track")?, token, "track search")
            .await?;

        let mut tracks = Vec::new();
        for track in found.result.tracks.map(|tracks| tracks.results).unwrap_or_default() {
            match self.track_metadata(token, &track).await {
                Ok(metadata) => tracks.push(metadata),
                Err(e) => warn!("skipping track {}: {e}", track.id),
            }
        }

        Ok(SearchResult { kind, best, tracks })
    }

    async fn new_releases(
        &self,
        token: &Token,
        skip: usize,
        count: usize,
    ) -> Result<Vec<AlbumInfo>> {
        let releases: NewReleases = self
            .api("landing3/new-releases", token, "new releases")
            .await?;

        let mut albums = Vec::new();
        for album_id in page(&releases.new_releases, skip, count) {
            albums.push(self.album(token, *album_id).await?);
        }
        Ok(albums)
    }

    async fn playlist_of_the_day(&self, token: &Token) -> Result<Vec<Metadata>> {
        let feed: Feed = self.api("feed", token, "feed").await?;
        let Some(playlist) = feed
            .generated_playlists
            .iter()
            .find(|playlist| playlist.kind == GeneratedPlaylist::PLAYLIST_OF_THE_DAY)
        else {
            debug!("feed has no playlist of the day");
            return Ok(Vec::new());
        };

        Ok(self.resolve_listed(token, &playlist.data.tracks).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::catalog::Artist;

    fn download_info(codec: &str, bitrate_in_kbps: u32, preview: bool) -> DownloadInfo {
        DownloadInfo {
            codec: codec.to_owned(),
            bitrate_in_kbps,
            preview,
            download_info_url: Url::parse(&format!("https://storage.example/{codec}/{bitrate_in_kbps}"))
                .unwrap(),
        }
    }

    #[test]
    fn direct_links_are_signed() {
        let location = Location {
            host: "s1.storage.example".to_owned(),
            path: "/rmusic/U2FsdGVk/abc".to_owned(),
            ts: "0005f3c1".to_owned(),
            s: "deadbeef".to_owned(),
        };

        let expected_sign = format!(
            "{:x}",
            Md5::digest("XGRlBW9FXlekgbPrRHuSiArmusic/U2FsdGVk/abcdeadbeef")
        );
        assert_eq!(
            Client::direct_link(&location),
            format!("https://s1.storage.example/get-mp3/{expected_sign}/0005f3c1/rmusic/U2FsdGVk/abc")
        );
    }

    #[test]
    fn covers_are_full_size() {
        assert_eq!(
            Client::cover("avatars.yandex.net/get-music-content/1/2/%%"),
            "https://avatars.yandex.net/get-music-content/1/2/1000x1000"
        );
    }

    #[test]
    fn prefers_best_full_mp3() {
        let infos = vec![
            download_info("aac", 256, false),
            download_info("mp3", 128, false),
            download_info("mp3", 320, true),
            download_info("mp3", 192, false),
        ];
        let chosen = Client::choose(&infos).unwrap();
        assert_eq!((chosen.codec.as_str(), chosen.bitrate_in_kbps), ("mp3", 192));

        let aac_only = vec![download_info("aac", 64, false)];
        assert_eq!(Client::choose(&aac_only).unwrap().codec, "aac");
        assert!(Client::choose(&[]).is_none());
    }

    #[test]
    fn pages_are_clamped() {
        let items = [1, 2, 3, 4, 5];
        assert_eq!(page(&items, 0, 2), [1, 2]);
        assert_eq!(page(&items, 3, 10), [4, 5]);
        assert!(page(&items, 7, 2).is_empty());
        assert_eq!(page(&items, 1, usize::MAX), [2, 3, 4, 5]);
    }

    #[test]
    fn search_result_ids() {
        assert_eq!(Client::result_id(&serde_json::json!({"id": 42})).unwrap(), 42);
        assert_eq!(Client::result_id(&serde_json::json!({"id": "42"})).unwrap(), 42);
        for result in [serde_json::json!({}), serde_json::json!({"id": "x1"})] {
            let err = Client::result_id(&result).unwrap_err();
            assert_eq!(err.kind, crate::error::ErrorKind::MalformedPayload);
        }
    }

    #[test]
    fn album_info_lists_first_disc() {
        let track = |id: &str| Track {
            id: id.to_owned(),
            ..Track::default()
        };
        let album = Album {
            id: 678,
            title: "Album".to_owned(),
            artists: vec![
                Artist {
                    name: "A".to_owned(),
                },
                Artist {
                    name: "B".to_owned(),
                },
            ],
            track_count: 3,
            cover_uri: Some("avatars.example/a/%%".to_owned()),
            volumes: vec![vec![track("1"), track("local-2"), track("3")], vec![track("4")]],
        };

        let info = Client::album_info(&album);
        assert_eq!(info.artists, "A, B");
        assert_eq!(info.img, "https://avatars.example/a/1000x1000");
        assert_eq!(info.tracks, [1, 3]);
        assert_eq!(info.track_count, 3);
    }

    #[test]
    fn metadata_from_track() {
        let track = Track {
            id: "12345:678".to_owned(),
            title: "Song".to_owned(),
            artists: vec![
                Artist {
                    name: "A".to_owned(),
                },
                Artist {
                    name: "B".to_owned(),
                },
            ],
            albums: vec![Album {
                id: 678,
                title: "Album".to_owned(),
                ..Album::default()
            }],
            cover_uri: Some("avatars.example/c/%%".to_owned()),
            duration_ms: 215_600,
            available: true,
        };

        let metadata = Client::metadata(&track, "https://link".to_owned());
        assert_eq!(metadata.track_id, TrackId::Numeric(12_345));
        assert_eq!(metadata.artist, "A, B");
        assert_eq!(metadata.img, "https://avatars.example/c/1000x1000");
        assert_eq!(metadata.duration, 215);
        assert_eq!((metadata.minutes, metadata.seconds), (3, 36));
        assert_eq!(metadata.album, Some(678));
        assert_eq!(metadata.download_link, "https://link");
    }
}
