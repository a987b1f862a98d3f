//!
//! src/fetch.rs  Oct 19th, 2026 
//!
//! Defines methods for hitting the playlist endpoints and returning
//! the page of items in both raw and typed form. No retries, a failure
//! here ends the run
//!

use chrono::{DateTime, Utc};
use reqwest::{Client, header, redirect, RequestBuilder};
use tracing::{debug, info, warn};

use crate::config::{check_playlist_id, HttpConfig, PlaylistConfig, SpotifyConfig};
use crate::types::{PlaylistItem, PlaylistTracksPage, TokenResponse};
use crate::EtlError;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, EtlError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .build()
        .map_err(|e| EtlError::Http(format!("build client: {e}")))
}

/// One playlist page as it came off the wire
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub items: Vec<PlaylistItem>,
    pub raw: Vec<serde_json::Value>,
    pub fetched_at: DateTime<Utc>
}

impl Snapshot {
    /// Keeps the untyped items for the raw dump and parses a typed copy
    pub fn from_raw(raw: Vec<serde_json::Value>, fetched_at: DateTime<Utc>) ->
        Result<Self, EtlError> {
        let items = raw.iter()
            .map(|v| serde_json::from_value::<PlaylistItem>(v.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok( Self { items, raw, fetched_at } )
    }
}

#[derive(Clone, Debug)]
pub struct SpotifyClient {
    pub http: Client,
    pub cfg: SpotifyConfig
}

impl SpotifyClient {
    pub fn new(http_config: &HttpConfig, cfg: &SpotifyConfig) ->
        Result<Self, EtlError> {

        let http = base_client(http_config)?;
        Ok( Self {
            http,
            cfg: cfg.clone()
        })
    }

    pub fn token_request(&self) -> RequestBuilder {
        self.http
            .post(self.cfg.token_url.clone())
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
    }

    /// GET /v1/playlists/{id}/tracks?limit=&offset=0[&market=]
    pub fn playlist_tracks(&self, playlist: &PlaylistConfig, bearer: &str) ->
        Result<RequestBuilder, EtlError> {
        check_playlist_id(&playlist.playlist_id)?;
        let url = self.cfg.api_base
            .join(&format!("playlists/{}/tracks", playlist.playlist_id))
            .map_err(|e| EtlError::Config(format!("playlist url: {e}")))?;

        let mut query = vec![
            ("limit", playlist.page_limit.to_string()),
            ("offset", "0".to_string())
        ];
        if let Some(market) = &playlist.market {
            query.push(("market", market.clone()));
        }
        Ok( self.http.get(url).bearer_auth(bearer).query(&query) )
    }

    /// Client credentials exchange, returns the bearer token
    pub async fn access_token(&self) -> Result<String, EtlError> {
        let response = self.token_request().send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::Http(format!("token request returned {status}")));
        }

        let token: TokenResponse = response.json().await?;
        debug!(
            token_type = ?token.token_type,
            expires_in = ?token.expires_in,
            "extract.token"
        );
        Ok(token.access_token)
    }

    /// Pulls a single page of the playlist, anything past it is ignored
    pub async fn extract(&self, playlist: &PlaylistConfig) -> Result<Snapshot, EtlError> {
        info!(playlist = %playlist.playlist_id, limit = playlist.page_limit, "extract.start");

        let bearer = self.access_token().await?;
        let response = self.playlist_tracks(playlist, &bearer)?.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::Http(
                format!("playlist {} returned {status}", playlist.playlist_id)
            ));
        }

        let page: PlaylistTracksPage = response.json().await?;
        if page.next.is_some() {
            warn!(total = ?page.total, "extract.more_pages_ignored");
        }

        let snapshot = Snapshot::from_raw(page.items, Utc::now())?;
        info!(items = snapshot.items.len(), total = ?page.total, "extract.done");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;

    fn test_config() -> SpotifyConfig {
        SpotifyConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            token_url: Url::parse("https://accounts.spotify.com/api/token").unwrap(),
            api_base: Url::parse("https://api.spotify.com/v1/").unwrap()
        }
    }

    #[test]
    fn playlist_request_targets_single_page() {
        let client = SpotifyClient::new(&HttpConfig::default(), &test_config()).unwrap();
        let playlist = PlaylistConfig {
            market: Some("CO".to_string()),
            ..PlaylistConfig::default()
        };

        let request = client.playlist_tracks(&playlist, "bearer-token").unwrap()
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://api.spotify.com/v1/playlists/37i9dQZEVXbOa2lmxNORXQ/tracks?limit=50&offset=0&market=CO"
        );
        assert_eq!(
            request.headers().get(header::AUTHORIZATION).unwrap(),
            "Bearer bearer-token"
        );
    }

    #[test]
    fn playlist_id_cannot_leave_its_path_segment() {
        let client = SpotifyClient::new(&HttpConfig::default(), &test_config()).unwrap();
        for id in ["../../me", "abc?market=US", "abc/followers"] {
            let playlist = PlaylistConfig {
                playlist_id: id.to_string(),
                ..PlaylistConfig::default()
            };
            assert!(
                matches!(client.playlist_tracks(&playlist, "t"), Err(EtlError::Config(_))),
                "{id}"
            );
        }
    }

    #[test]
    fn token_request_uses_client_credentials() {
        let client = SpotifyClient::new(&HttpConfig::default(), &test_config()).unwrap();
        let request = client.token_request().build().unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/api/token");
        let auth = request.headers().get(header::AUTHORIZATION).unwrap();
        assert!(auth.to_str().unwrap().starts_with("Basic "));
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, b"grant_type=client_credentials");
    }

    #[test]
    fn snapshot_keeps_raw_and_typed_items_aligned() {
        let raw = vec![
            json!({ "added_at": "2025-09-13T05:00:00Z", "track": { "id": "a", "name": "A" } }),
            json!({ "added_at": "2025-09-13T05:00:00Z", "track": null }),
        ];
        let snapshot = Snapshot::from_raw(raw.clone(), Utc::now()).unwrap();

        assert_eq!(snapshot.raw, raw);
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.items[0].track.as_ref().unwrap().id.as_deref(), Some("a"));
        assert!(snapshot.items[1].track.is_none());
    }

    #[test]
    fn snapshot_rejects_malformed_items() {
        let raw = vec![json!({ "added_at": "not a date" })];
        assert!(matches!(
            Snapshot::from_raw(raw, Utc::now()),
            Err(EtlError::Parse(_))
        ));
    }
}
