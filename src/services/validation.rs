//! URL verification for career clips: format checks, accessibility probing
//! and the staleness policy that drives background revalidation.
//!
//! Probe failures are carried as data in [`ValidationOutcome`], never as
//! errors - nothing in this module is allowed to throw past the
//! validate-and-persist boundary in `services::clips`.

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use url::Url;

use crate::constants::{
    MAX_REDIRECT_HOPS, PROBE_TIMEOUT_SECS, PROBE_USER_AGENT, REVALIDATION_WINDOW_DAYS,
};
use crate::models::Platform;

/// Hosts we trust enough to probe and serve. Shared by the format check and
/// the redirect-target check, so a clip can never redirect its way off-list.
pub const ALLOWED_HOSTS: &[&str] = &[
    // YouTube family
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtu.be",
    "www.youtube-nocookie.com",
    // TikTok family
    "tiktok.com",
    "www.tiktok.com",
    "m.tiktok.com",
    "vm.tiktok.com",
    "vt.tiktok.com",
];

/// Content types accepted on a successful probe. An absent header is also
/// accepted - several platforms omit it on lightweight responses.
const ACCEPTED_CONTENT_TYPE_PREFIXES: &[&str] = &["text/html", "video/", "application/json"];

/// Result of a format check or accessibility probe
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub reason: Option<String>,
    pub status_code: Option<u16>,
    pub resolved_url: Option<String>,
}

impl ValidationOutcome {
    pub fn valid(status_code: Option<u16>, resolved_url: Option<String>) -> Self {
        ValidationOutcome {
            is_valid: true,
            reason: None,
            status_code,
            resolved_url,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        ValidationOutcome {
            is_valid: false,
            reason: Some(reason.into()),
            status_code: None,
            resolved_url: None,
        }
    }

    pub fn invalid_with_status(reason: impl Into<String>, status_code: u16) -> Self {
        ValidationOutcome {
            is_valid: false,
            reason: Some(reason.into()),
            status_code: Some(status_code),
            resolved_url: None,
        }
    }
}

/// Checks clip URLs for safety and reachability.
///
/// Cheap to clone: the reqwest client is internally reference counted and
/// the in-flight set is shared, so clones spawned into background tasks all
/// observe the same revalidation state.
#[derive(Clone)]
pub struct ClipValidator {
    http: Client,
    allowed_hosts: Arc<Vec<String>>,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl ClipValidator {
    pub fn new() -> Self {
        Self::with_allowed_hosts(ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect())
    }

    pub fn with_allowed_hosts(allowed_hosts: Vec<String>) -> Self {
        // Redirects are handled manually so each hop can be re-checked
        // against the allowlist before it is followed.
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(PROBE_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(PROBE_USER_AGENT)
            .build()
            .expect("Failed to create probe HTTP client");

        ClipValidator {
            http,
            allowed_hosts: Arc::new(allowed_hosts),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Mark a clip as being revalidated. Returns false if another task
    /// already holds it, so concurrent readers don't probe the same clip
    /// twice.
    pub fn begin_revalidation(&self, clip_id: i64) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight set poisoned")
            .insert(clip_id)
    }

    pub fn finish_revalidation(&self, clip_id: i64) {
        self.in_flight
            .lock()
            .expect("in-flight set poisoned")
            .remove(&clip_id);
    }

    /// Pure format check: HTTPS scheme and an allowlisted host. No I/O.
    pub fn check_url_format(&self, url: &str) -> ValidationOutcome {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return ValidationOutcome::invalid(format!("Invalid URL format: {}", e)),
        };

        if parsed.scheme() != "https" {
            return ValidationOutcome::invalid("URL must use the HTTPS protocol");
        }

        let Some(host) = parsed.host_str() else {
            return ValidationOutcome::invalid("Invalid URL format: no host");
        };

        if !self.host_allowed(host) {
            return ValidationOutcome::invalid(format!(
                "Host '{}' is not in allowlist of supported platforms",
                host
            ));
        }

        ValidationOutcome::valid(None, None)
    }

    /// Exact match or subdomain of an allowlisted host
    fn host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
    }

    /// Probe a URL (already format-checked) for reachability.
    ///
    /// Follows redirects manually, re-checking each hop's host against the
    /// allowlist, up to [`MAX_REDIRECT_HOPS`]. Each request carries its own
    /// timeout; there is no deadline across the whole chain.
    pub async fn probe_url(&self, url: &str) -> ValidationOutcome {
        let mut current = url.to_string();
        let mut hops: u8 = 0;

        loop {
            let response = match self.send_probe(&current).await {
                Ok(response) => response,
                Err(outcome) => return outcome,
            };

            let status = response.status();
            let code = status.as_u16();

            // Success and 304 are checked first: 304 sits inside the 3xx
            // range but is a validity signal, not a redirect.
            if status.is_success() || status == StatusCode::NOT_MODIFIED {
                if let Some(content_type) = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                {
                    let acceptable = ACCEPTED_CONTENT_TYPE_PREFIXES
                        .iter()
                        .any(|prefix| content_type.starts_with(prefix));
                    if !acceptable {
                        return ValidationOutcome::invalid_with_status(
                            format!("Unexpected content type '{}'", content_type),
                            code,
                        );
                    }
                }
                return ValidationOutcome::valid(Some(code), (hops > 0).then(|| current.clone()));
            }

            if status.is_redirection() {
                if hops >= MAX_REDIRECT_HOPS {
                    return ValidationOutcome::invalid_with_status(
                        format!("Too many redirects (more than {})", MAX_REDIRECT_HOPS),
                        code,
                    );
                }

                let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                else {
                    return ValidationOutcome::invalid_with_status(
                        "Redirect response missing Location header",
                        code,
                    );
                };

                // Location may be relative; resolve against the current URL
                let base = match Url::parse(&current) {
                    Ok(base) => base,
                    Err(e) => {
                        return ValidationOutcome::invalid(format!("Invalid URL format: {}", e));
                    }
                };
                let target = match base.join(location) {
                    Ok(target) => target,
                    Err(e) => {
                        return ValidationOutcome::invalid_with_status(
                            format!("Invalid redirect target '{}': {}", location, e),
                            code,
                        );
                    }
                };

                let target_host = target.host_str().unwrap_or_default();
                if !self.host_allowed(target_host) {
                    return ValidationOutcome::invalid_with_status(
                        format!("Redirect to non-allowed domain '{}'", target_host),
                        code,
                    );
                }

                current = target.to_string();
                hops += 1;
                continue;
            }

            return match code {
                404 | 410 => ValidationOutcome::invalid_with_status(
                    format!("Content not found (HTTP {})", code),
                    code,
                ),
                c if c >= 500 => ValidationOutcome::invalid_with_status(
                    format!("Server error (HTTP {})", code),
                    code,
                ),
                _ => ValidationOutcome::invalid_with_status(format!("HTTP error {}", code), code),
            };
        }
    }

    /// Send the lightweight existence check. HEAD first; hosts that reject
    /// the method (405, or a non-timeout transport error) get one retry as
    /// a GET restricted to the first byte.
    async fn send_probe(&self, url: &str) -> Result<reqwest::Response, ValidationOutcome> {
        match self.http.head(url).send().await {
            Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
                self.send_range_fallback(url).await
            }
            Ok(response) => Ok(response),
            Err(e) if e.is_timeout() => Err(Self::timeout_outcome()),
            Err(_) => self.send_range_fallback(url).await,
        }
    }

    async fn send_range_fallback(&self, url: &str) -> Result<reqwest::Response, ValidationOutcome> {
        match self
            .http
            .get(url)
            .header(RANGE, "bytes=0-0")
            .send()
            .await
        {
            Ok(response) => Ok(response),
            Err(e) if e.is_timeout() => Err(Self::timeout_outcome()),
            Err(e) => Err(ValidationOutcome::invalid(format!("Network error: {}", e))),
        }
    }

    fn timeout_outcome() -> ValidationOutcome {
        ValidationOutcome::invalid(format!(
            "Request timed out after {} seconds",
            PROBE_TIMEOUT_SECS
        ))
    }
}

impl Default for ClipValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Staleness policy: a record with no check on file, or one checked more
/// than the revalidation window ago, needs re-checking.
pub fn needs_revalidation(last_checked_at: Option<DateTime<Utc>>) -> bool {
    match last_checked_at {
        None => true,
        Some(checked) => Utc::now() - checked > Duration::days(REVALIDATION_WINDOW_DAYS),
    }
}

/// Derive a thumbnail URL from the platform and clip URL, when possible.
///
/// YouTube publishes predictable thumbnail addresses keyed by video id;
/// TikTok does not, so no derivation is attempted there.
pub fn derive_thumbnail_url(platform: Platform, url: &str) -> Option<String> {
    match platform {
        Platform::Youtube => extract_youtube_video_id(url)
            .map(|id| format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id)),
        Platform::Tiktok => None,
    }
}

/// Pull the video id out of the common YouTube URL shapes:
/// `watch?v=ID`, `youtu.be/ID`, `/shorts/ID`, `/embed/ID`.
fn extract_youtube_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;

    if host == "youtu.be" || host.ends_with(".youtu.be") {
        return parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|id| !id.is_empty())
            .map(|id| id.to_string());
    }

    let mut segments = parsed.path_segments()?;
    match segments.next()? {
        "watch" => parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned()),
        "shorts" | "embed" => segments
            .next()
            .filter(|id| !id.is_empty())
            .map(|id| id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ClipValidator {
        ClipValidator::new()
    }

    /// Validator whose allowlist also trusts the local mock server
    fn validator_for(server: &mockito::Server) -> ClipValidator {
        let mut hosts: Vec<String> = ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect();
        hosts.push(server.host_with_port().split(':').next().unwrap().to_string());
        ClipValidator::with_allowed_hosts(hosts)
    }

    #[test]
    fn rejects_non_https_scheme() {
        let outcome = validator().check_url_format("http://www.youtube.com/watch?v=abc");
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("HTTPS"));
    }

    #[test]
    fn rejects_host_outside_allowlist() {
        let outcome = validator().check_url_format("https://www.example.com/video");
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("not in allowlist"));
    }

    #[test]
    fn rejects_unparseable_url() {
        let outcome = validator().check_url_format("not-a-valid-url");
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("Invalid URL format"));
    }

    #[test]
    fn accepts_all_allowlisted_hosts() {
        let v = validator();
        for host in ALLOWED_HOSTS {
            let outcome = v.check_url_format(&format!("https://{}/some/clip", host));
            assert!(outcome.is_valid, "expected {} to pass", host);
        }
    }

    #[test]
    fn accepts_subdomain_of_allowlisted_host() {
        assert!(
            validator()
                .check_url_format("https://music.youtube.com/watch?v=abc")
                .is_valid
        );
    }

    #[test]
    fn rejects_lookalike_host_suffix() {
        // evilyoutube.com is not a subdomain of youtube.com
        let outcome = validator().check_url_format("https://evilyoutube.com/watch?v=abc");
        assert!(!outcome.is_valid);
    }

    #[test]
    fn missing_check_is_stale() {
        assert!(needs_revalidation(None));
    }

    #[test]
    fn old_check_is_stale() {
        assert!(needs_revalidation(Some(Utc::now() - Duration::days(8))));
    }

    #[test]
    fn recent_check_is_fresh() {
        assert!(!needs_revalidation(Some(Utc::now() - Duration::hours(1))));
    }

    #[test]
    fn derives_youtube_thumbnails_from_common_shapes() {
        let expected = Some("https://img.youtube.com/vi/abc123DEF45/hqdefault.jpg".to_string());
        for url in [
            "https://www.youtube.com/watch?v=abc123DEF45",
            "https://youtu.be/abc123DEF45",
            "https://www.youtube.com/shorts/abc123DEF45",
            "https://www.youtube-nocookie.com/embed/abc123DEF45",
        ] {
            assert_eq!(derive_thumbnail_url(Platform::Youtube, url), expected, "{}", url);
        }
    }

    #[test]
    fn no_thumbnail_derivation_for_tiktok() {
        assert_eq!(
            derive_thumbnail_url(Platform::Tiktok, "https://www.tiktok.com/@user/video/123"),
            None
        );
    }

    #[test]
    fn no_thumbnail_for_unrecognized_youtube_path() {
        assert_eq!(
            derive_thumbnail_url(Platform::Youtube, "https://www.youtube.com/channel/UCabc"),
            None
        );
    }

    #[tokio::test]
    async fn probe_accepts_200_with_html_content_type() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("HEAD", "/clip")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .create_async()
            .await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/clip", server.url()))
            .await;
        assert!(outcome.is_valid, "reason: {:?}", outcome.reason);
        assert_eq!(outcome.status_code, Some(200));
    }

    #[tokio::test]
    async fn probe_accepts_partial_content_with_video_type() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("HEAD", "/clip")
            .with_status(206)
            .with_header("content-type", "video/mp4")
            .create_async()
            .await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/clip", server.url()))
            .await;
        assert!(outcome.is_valid);
        assert_eq!(outcome.status_code, Some(206));
    }

    #[tokio::test]
    async fn probe_accepts_success_without_content_type() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/clip").with_status(204).create_async().await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/clip", server.url()))
            .await;
        assert!(outcome.is_valid);
    }

    #[tokio::test]
    async fn probe_accepts_304_not_modified() {
        let mut server = mockito::Server::new_async().await;
        // 304 sits in the 3xx range but must not be treated as a redirect
        let _m = server.mock("HEAD", "/clip").with_status(304).create_async().await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/clip", server.url()))
            .await;
        assert!(outcome.is_valid, "reason: {:?}", outcome.reason);
        assert_eq!(outcome.status_code, Some(304));
    }

    #[tokio::test]
    async fn probe_rejects_unexpected_content_type() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("HEAD", "/clip")
            .with_status(200)
            .with_header("content-type", "image/png")
            .create_async()
            .await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/clip", server.url()))
            .await;
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("content type"));
    }

    #[tokio::test]
    async fn probe_classifies_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/gone").with_status(404).create_async().await;
        let _m = server.mock("HEAD", "/removed").with_status(410).create_async().await;

        let v = validator_for(&server);
        for path in ["/gone", "/removed"] {
            let outcome = v.probe_url(&format!("{}{}", server.url(), path)).await;
            assert!(!outcome.is_valid);
            assert!(outcome.reason.unwrap().contains("not found"));
        }
    }

    #[tokio::test]
    async fn probe_classifies_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/clip").with_status(500).create_async().await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/clip", server.url()))
            .await;
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("Server error"));
        assert_eq!(outcome.status_code, Some(500));
    }

    #[tokio::test]
    async fn probe_classifies_other_client_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/clip").with_status(403).create_async().await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/clip", server.url()))
            .await;
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("403"));
    }

    #[tokio::test]
    async fn probe_follows_redirect_to_allowed_host() {
        let mut server = mockito::Server::new_async().await;
        let target = format!("{}/final", server.url());
        let _m = server
            .mock("HEAD", "/short")
            .with_status(301)
            .with_header("location", &target)
            .create_async()
            .await;
        let _m = server
            .mock("HEAD", "/final")
            .with_status(200)
            .with_header("content-type", "text/html")
            .create_async()
            .await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/short", server.url()))
            .await;
        assert!(outcome.is_valid, "reason: {:?}", outcome.reason);
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.resolved_url, Some(target));
    }

    #[tokio::test]
    async fn probe_resolves_relative_redirect() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("HEAD", "/short")
            .with_status(302)
            .with_header("location", "/final")
            .create_async()
            .await;
        let _m = server.mock("HEAD", "/final").with_status(200).create_async().await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/short", server.url()))
            .await;
        assert!(outcome.is_valid, "reason: {:?}", outcome.reason);
    }

    #[tokio::test]
    async fn probe_rejects_redirect_to_disallowed_host() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("HEAD", "/short")
            .with_status(301)
            .with_header("location", "https://malicious.example.com/video")
            .create_async()
            .await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/short", server.url()))
            .await;
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("non-allowed domain"));
    }

    #[tokio::test]
    async fn probe_rejects_redirect_without_location() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/short").with_status(302).create_async().await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/short", server.url()))
            .await;
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("Location"));
    }

    #[tokio::test]
    async fn probe_rejects_redirect_loop_past_hop_cap() {
        let mut server = mockito::Server::new_async().await;
        // Redirects to itself forever; the hop cap has to break the loop
        let _m = server
            .mock("HEAD", "/loop")
            .with_status(301)
            .with_header("location", "/loop")
            .create_async()
            .await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/loop", server.url()))
            .await;
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("Too many redirects"));
    }

    #[tokio::test]
    async fn probe_falls_back_to_ranged_get_when_head_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/clip").with_status(405).create_async().await;
        let get_mock = server
            .mock("GET", "/clip")
            .match_header("range", "bytes=0-0")
            .with_status(206)
            .with_header("content-type", "video/mp4")
            .create_async()
            .await;

        let outcome = validator_for(&server)
            .probe_url(&format!("{}/clip", server.url()))
            .await;
        assert!(outcome.is_valid, "reason: {:?}", outcome.reason);
        get_mock.assert_async().await;
    }

    #[tokio::test]
    async fn probe_falls_back_to_ranged_get_after_transport_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // A host that drops HEAD connections cold but serves the ranged GET;
        // the fallback has to rescue it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 512];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                if buf[..n].starts_with(b"HEAD") {
                    drop(socket);
                } else {
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\n\
                              content-type: text/html\r\n\
                              content-length: 0\r\n\
                              connection: close\r\n\r\n",
                        )
                        .await;
                }
            }
        });

        let outcome = ClipValidator::with_allowed_hosts(vec!["127.0.0.1".to_string()])
            .probe_url(&format!("http://{}/clip", addr))
            .await;
        assert!(outcome.is_valid, "reason: {:?}", outcome.reason);
        assert_eq!(outcome.status_code, Some(200));
    }

    #[tokio::test]
    async fn probe_reports_network_error_for_unreachable_host() {
        // Nothing listens here; connection is refused immediately
        let outcome = ClipValidator::with_allowed_hosts(vec!["127.0.0.1".to_string()])
            .probe_url("http://127.0.0.1:9/clip")
            .await;
        assert!(!outcome.is_valid);
        assert!(outcome.reason.unwrap().contains("Network error"));
    }

    #[test]
    fn in_flight_marker_dedupes_and_releases() {
        let v = validator();
        assert!(v.begin_revalidation(42));
        assert!(!v.begin_revalidation(42));
        v.finish_revalidation(42);
        assert!(v.begin_revalidation(42));
    }
}
