use crate::crawlers::crawler::BrowserPage;
use crate::error::{Error, Result};
use crate::filter::LinkFilter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use url::Url;

/// A browser cookie as persisted in the state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Unix seconds; `None` for session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl StoredCookie {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// RFC 6265 domain match; cookies without a domain match any host
    pub fn matches_host(&self, host: &str) -> bool {
        match self.domain.as_deref() {
            Some(domain) => {
                let domain = domain.trim_start_matches('.');
                host.eq_ignore_ascii_case(domain)
                    || host
                        .to_ascii_lowercase()
                        .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
            }
            None => true,
        }
    }

    /// Whether this cookie would be sent with a request to `url` at time `now`
    pub fn applies_to(&self, url: &Url, now: i64) -> bool {
        if self.is_expired(now) {
            return false;
        }
        if self.secure && url.scheme() != "https" {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        if !self.matches_host(host) {
            return false;
        }
        match self.path.as_deref() {
            Some(path) if path != "/" => {
                let req = url.path();
                req == path
                    || (req.starts_with(path)
                        && (path.ends_with('/') || req[path.len()..].starts_with('/')))
            }
            _ => true,
        }
    }
}

/// One localStorage key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

/// localStorage captured for one origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<StorageEntry>,
}

/// Serialized authentication context handed to and from the browser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

/// A page to open while restoring, with what gets injected there
#[derive(Debug, Clone)]
pub struct RestoreTarget {
    pub origin: Url,
    pub cookies: Vec<StoredCookie>,
    pub local_storage: Vec<StorageEntry>,
}

impl SessionState {
    /// Read a saved state; a missing file means the user never logged in
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotLoggedIn(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let state: Self =
            serde_json::from_str(&contents).map_err(|e| Error::InvalidSession {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if state.cookies.is_empty() {
            return Err(Error::InvalidSession {
                path: path.to_path_buf(),
                reason: "no cookies recorded".to_string(),
            });
        }

        ::log::debug!(
            "Loaded session state from {} ({} cookies, {} origins)",
            path.display(),
            state.cookies.len(),
            state.origins.len()
        );
        Ok(state)
    }

    /// Write the state next to its final location, then rename it into place
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".to_string());
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));

        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies
    pub fn cookie_header(&self, url: &Url, now: i64) -> Option<String> {
        cookie_header(&self.cookies, url, now)
    }

    /// Group live cookies and storage by the page they must be injected from.
    ///
    /// Captured origins come first; cookie domains not covered by one of
    /// them get an `https://<domain>/` target of their own.
    pub fn restore_plan(&self, now: i64) -> Vec<RestoreTarget> {
        let mut targets: Vec<RestoreTarget> = Vec::new();

        for origin in &self.origins {
            match Url::parse(&origin.origin) {
                Ok(url) => targets.push(RestoreTarget {
                    origin: url,
                    cookies: Vec::new(),
                    local_storage: origin.local_storage.clone(),
                }),
                Err(e) => ::log::warn!("Ignoring saved origin {:?}: {}", origin.origin, e),
            }
        }

        for cookie in self.cookies.iter().filter(|c| !c.is_expired(now)) {
            let existing = targets.iter_mut().find(|t| {
                t.origin
                    .host_str()
                    .is_some_and(|host| cookie.matches_host(host))
            });
            if let Some(target) = existing {
                target.cookies.push(cookie.clone());
                continue;
            }

            let Some(domain) = cookie.domain.as_deref() else {
                continue;
            };
            match Url::parse(&format!("https://{}/", domain.trim_start_matches('.'))) {
                Ok(origin) => targets.push(RestoreTarget {
                    origin,
                    cookies: vec![cookie.clone()],
                    local_storage: Vec::new(),
                }),
                Err(e) => ::log::warn!("Ignoring cookie {} for {:?}: {}", cookie.name, domain, e),
            }
        }

        targets.retain(|t| !t.cookies.is_empty() || !t.local_storage.is_empty());
        targets
    }
}

/// Build a `Cookie` header from whichever cookies apply to `url`
pub fn cookie_header(cookies: &[StoredCookie], url: &Url, now: i64) -> Option<String> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for c in cookies.iter().filter(|c| c.applies_to(url, now)) {
        // First cookie of a name wins, as in the browser's own ordering
        if seen.insert(c.name.as_str()) {
            pairs.push(format!("{}={}", c.name, c.value));
        }
    }

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Performs the interactive login and replays saved state into new browsers
pub struct SessionManager<'a> {
    filter: &'a LinkFilter,
}

impl<'a> SessionManager<'a> {
    pub fn new(filter: &'a LinkFilter) -> Self {
        Self { filter }
    }

    /// Open `seed`, wait for the user to finish logging in, then save the
    /// browser's cookies and localStorage to `state_path`.
    ///
    /// Nothing is written when the browser is still on the login page or
    /// holds no cookies.
    pub async fn login<P, R>(
        &self,
        page: &mut P,
        seed: &Url,
        confirm: &mut R,
        state_path: &Path,
    ) -> Result<SessionState>
    where
        P: BrowserPage + ?Sized,
        R: AsyncBufRead + Unpin,
    {
        page.goto(seed).await?;
        println!(
            "Please complete login in the opened browser. Once the page is accessible, return here and press Enter to continue..."
        );

        let mut line = String::new();
        confirm.read_line(&mut line).await?;

        let current = page.current_url().await?;
        if self.filter.is_login_redirect(&current) {
            ::log::warn!("Browser is still on the login page: {}", current);
            return Err(Error::LoginIncomplete(current.to_string()));
        }

        let state = self.capture(page, &current).await?;
        if state.cookies.is_empty() {
            return Err(Error::LoginIncomplete(current.to_string()));
        }

        state.save(state_path)?;
        ::log::info!(
            "Saved {} cookies to {}",
            state.cookies.len(),
            state_path.display()
        );
        Ok(state)
    }

    async fn capture<P: BrowserPage + ?Sized>(
        &self,
        page: &mut P,
        current: &Url,
    ) -> Result<SessionState> {
        let cookies = page.cookies().await?;
        let local_storage = match page.local_storage().await {
            Ok(entries) => entries,
            Err(e) => {
                ::log::warn!("Could not read localStorage on {}: {}", current, e);
                Vec::new()
            }
        };

        // The login page's origin is kept even without storage; restore
        // navigates there before injecting the cookies that match it.
        let origins = vec![OriginState {
            origin: current.origin().ascii_serialization(),
            local_storage,
        }];

        Ok(SessionState { cookies, origins })
    }

    /// Inject a saved state into a fresh browser. Returns the number of cookies added.
    ///
    /// Origins that fail to load are skipped along with their cookies.
    pub async fn restore<P: BrowserPage + ?Sized>(
        &self,
        page: &mut P,
        state: &SessionState,
    ) -> Result<usize> {
        let mut added = 0;
        for target in state.restore_plan(unix_now()) {
            ::log::debug!(
                "Restoring {} cookies and {} storage entries on {}",
                target.cookies.len(),
                target.local_storage.len(),
                target.origin
            );
            if let Err(e) = page.goto(&target.origin).await {
                ::log::warn!("Skipping restore on {}: {}", target.origin, e);
                continue;
            }

            for cookie in &target.cookies {
                match page.add_cookie(cookie).await {
                    Ok(()) => added += 1,
                    Err(e) => ::log::warn!("Failed to restore cookie {}: {}", cookie.name, e),
                }
            }

            if !target.local_storage.is_empty() {
                page.set_local_storage(&target.local_storage).await?;
            }
        }

        ::log::info!("Restored {} cookies into the browser", added);
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawlers::testing::FakeSite;

    fn cookie(name: &str, domain: &str) -> StoredCookie {
        StoredCookie {
            name: name.to_string(),
            value: format!("{name}-value"),
            domain: Some(domain.to_string()),
            path: Some("/".to_string()),
            expires: None,
            http_only: true,
            secure: true,
            same_site: Some("Lax".to_string()),
        }
    }

    #[test]
    fn test_load_missing_is_not_logged_in() {
        let dir = tempfile::tempdir().unwrap();
        let err = SessionState::load(&dir.path().join("state.json")).unwrap_err();
        assert!(matches!(err, Error::NotLoggedIn(_)));
    }

    #[test]
    fn test_load_rejects_garbage_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SessionState::load(&path),
            Err(Error::InvalidSession { .. })
        ));

        std::fs::write(&path, r#"{"cookies": [], "origins": []}"#).unwrap();
        assert!(matches!(
            SessionState::load(&path),
            Err(Error::InvalidSession { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = SessionState {
            cookies: vec![cookie("sid", ".academy.example.com")],
            origins: vec![OriginState {
                origin: "https://academy.example.com".to_string(),
                local_storage: vec![StorageEntry {
                    name: "token".to_string(),
                    value: "abc".to_string(),
                }],
            }],
        };

        state.save(&path).unwrap();
        assert_eq!(SessionState::load(&path).unwrap(), state);

        // No temp file left behind
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_reads_browser_tool_state_shape() {
        let json = r#"{
            "cookies": [{"name": "sid", "value": "1", "domain": "academy.example.com",
                         "path": "/", "expires": 4102444800, "httpOnly": true,
                         "secure": true, "sameSite": "Lax"}],
            "origins": [{"origin": "https://academy.example.com",
                         "localStorage": [{"name": "k", "value": "v"}]}]
        }"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.cookies[0].expires, Some(4102444800));
        assert!(state.cookies[0].http_only);
        assert_eq!(state.origins[0].local_storage[0].name, "k");
    }

    #[test]
    fn test_cookie_header_matching() {
        let mut scoped = cookie("scoped", "academy.example.com");
        scoped.path = Some("/learning".to_string());
        let mut expired = cookie("old", ".example.com");
        expired.expires = Some(100);
        let cookies = vec![
            cookie("sid", ".example.com"),
            scoped,
            expired,
            cookie("other", "elsewhere.org"),
        ];

        let url = Url::parse("https://academy.example.com/learning/megacombo").unwrap();
        assert_eq!(
            cookie_header(&cookies, &url, 1000).as_deref(),
            Some("sid=sid-value; scoped=scoped-value")
        );

        let sibling = Url::parse("https://academy.example.com/learningx").unwrap();
        assert_eq!(
            cookie_header(&cookies, &sibling, 1000).as_deref(),
            Some("sid=sid-value")
        );

        // Secure cookies stay off plain http
        let plain = Url::parse("http://academy.example.com/").unwrap();
        assert_eq!(cookie_header(&cookies, &plain, 1000), None);
    }

    #[test]
    fn test_restore_plan_groups_by_origin() {
        let mut expired = cookie("old", "academy.example.com");
        expired.expires = Some(10);
        let state = SessionState {
            cookies: vec![
                cookie("sid", ".academy.example.com"),
                cookie("cdn", "cdn.example.net"),
                expired,
            ],
            origins: vec![OriginState {
                origin: "https://academy.example.com".to_string(),
                local_storage: vec![StorageEntry {
                    name: "k".to_string(),
                    value: "v".to_string(),
                }],
            }],
        };

        let plan = state.restore_plan(1000);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].origin.as_str(), "https://academy.example.com/");
        assert_eq!(plan[0].cookies.len(), 1);
        assert_eq!(plan[0].local_storage.len(), 1);
        assert_eq!(plan[1].origin.as_str(), "https://cdn.example.net/");
    }

    #[tokio::test]
    async fn test_login_without_cookies_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let filter = LinkFilter::default();
        let manager = SessionManager::new(&filter);

        let mut site = FakeSite::new();
        let seed = Url::parse("https://academy.example.com/learning/megacombo").unwrap();
        let mut enter = &b"\n"[..];

        let err = manager
            .login(&mut site, &seed, &mut enter, &state_path)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LoginIncomplete(_)));
        assert!(!state_path.exists());

        // The following download run cannot authenticate
        assert!(matches!(
            SessionState::load(&state_path),
            Err(Error::NotLoggedIn(_))
        ));
    }

    #[tokio::test]
    async fn test_login_still_on_login_page_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let filter = LinkFilter::default();
        let manager = SessionManager::new(&filter);

        let seed = Url::parse("https://academy.example.com/learning").unwrap();
        let mut site = FakeSite::new()
            .with_cookie(cookie("csrf", "academy.example.com"))
            .with_redirect(&seed, "https://academy.example.com/users/sign_in");
        let mut enter = &b"\n"[..];

        let err = manager
            .login(&mut site, &seed, &mut enter, &state_path)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LoginIncomplete(_)));
        assert!(!state_path.exists());
    }

    #[tokio::test]
    async fn test_login_saves_and_restore_replays() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let filter = LinkFilter::default();
        let manager = SessionManager::new(&filter);

        let seed = Url::parse("https://academy.example.com/learning").unwrap();
        let mut site = FakeSite::new()
            .with_cookie(cookie("sid", "academy.example.com"))
            .with_local_storage("token", "abc");
        let mut enter = &b"\n"[..];

        let saved = manager
            .login(&mut site, &seed, &mut enter, &state_path)
            .await
            .unwrap();
        assert_eq!(saved.cookies.len(), 1);
        assert_eq!(saved.origins[0].origin, "https://academy.example.com");

        let loaded = SessionState::load(&state_path).unwrap();
        let mut fresh = FakeSite::new();
        let added = manager.restore(&mut fresh, &loaded).await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(fresh.cookie_names(), vec!["sid".to_string()]);
        assert_eq!(fresh.storage_len(), 1);
    }

    #[tokio::test]
    async fn test_login_without_storage_keeps_origin() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let filter = LinkFilter::default();
        let manager = SessionManager::new(&filter);

        let seed = Url::parse("https://academy.example.com/learning").unwrap();
        let mut site = FakeSite::new().with_cookie(cookie("sid", ".example.com"));
        let mut enter = &b"\n"[..];

        let saved = manager
            .login(&mut site, &seed, &mut enter, &state_path)
            .await
            .unwrap();
        assert_eq!(saved.origins.len(), 1);
        assert_eq!(saved.origins[0].origin, "https://academy.example.com");
        assert!(saved.origins[0].local_storage.is_empty());

        // The parent-domain cookie is replayed from the login page's origin
        let plan = saved.restore_plan(unix_now());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].origin.as_str(), "https://academy.example.com/");
        assert_eq!(plan[0].cookies.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_skips_unreachable_origin() {
        let filter = LinkFilter::default();
        let manager = SessionManager::new(&filter);
        let state = SessionState {
            cookies: vec![
                cookie("parent", ".example.com"),
                cookie("cdn", "cdn.example.net"),
            ],
            origins: vec![],
        };

        let mut fresh = FakeSite::new().with_broken("https://example.com/");
        let added = manager.restore(&mut fresh, &state).await.unwrap();

        assert_eq!(added, 1);
        assert_eq!(fresh.cookie_names(), vec!["cdn".to_string()]);
        assert_eq!(fresh.visits.len(), 2);
    }
}
