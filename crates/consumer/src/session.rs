//! Per-user consumer session.
//!
//! A [`ConsumerSession`] is created by the caller (typically one per portal
//! user session) and passed into every invocation. It carries the cookies
//! each producer handed out and the producer-side session ids of the items
//! the user interacted with.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::protocol::{Cookie, SessionContext, UserContext};

#[derive(Debug, Clone)]
struct RemoteSession {
    id: String,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct SessionInner {
    /// Keyed by producer id.
    cookies: HashMap<String, Vec<Cookie>>,
    cookies_initialized: HashSet<String>,
    /// Keyed by (producer id, item handle).
    remote: HashMap<(String, String), RemoteSession>,
}

#[derive(Debug)]
pub struct ConsumerSession {
    id: String,
    user: Option<UserContext>,
    inner: Mutex<SessionInner>,
}

impl ConsumerSession {
    pub fn new(user: Option<UserContext>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user(&self) -> Option<&UserContext> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    // ── cookies ────────────────────────────────────────────────────

    pub fn cookies_initialized(&self, producer_id: &str) -> bool {
        self.inner.lock().cookies_initialized.contains(producer_id)
    }

    pub fn cookies(&self, producer_id: &str) -> Vec<Cookie> {
        self.inner
            .lock()
            .cookies
            .get(producer_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_cookies(&self, producer_id: &str, cookies: Vec<Cookie>) {
        let mut inner = self.inner.lock();
        inner.cookies.insert(producer_id.to_owned(), cookies);
        inner.cookies_initialized.insert(producer_id.to_owned());
    }

    /// Forget the producer's cookies so the next call initializes them again.
    pub fn reset_cookies(&self, producer_id: &str) {
        let mut inner = self.inner.lock();
        inner.cookies.remove(producer_id);
        inner.cookies_initialized.remove(producer_id);
    }

    // ── remote sessions ────────────────────────────────────────────

    /// Live producer session id for an item; expired ids are dropped.
    pub fn session_id(&self, producer_id: &str, handle: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let key = (producer_id.to_owned(), handle.to_owned());
        match inner.remote.get(&key) {
            Some(s) if s.expires_at.map_or(true, |at| Instant::now() < at) => Some(s.id.clone()),
            Some(_) => {
                inner.remote.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Record the session context a response carried, if any.
    pub fn update(&self, producer_id: &str, handle: &str, context: Option<&SessionContext>) {
        let Some(context) = context else {
            return;
        };
        // An expiry too far out to represent never expires.
        let expires_at = u64::try_from(context.expires_secs)
            .ok()
            .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)));
        self.inner.lock().remote.insert(
            (producer_id.to_owned(), handle.to_owned()),
            RemoteSession {
                id: context.session_id.clone(),
                expires_at,
            },
        );
    }

    /// Drop the item's session id; the next call re-sends full state.
    pub fn invalidate(&self, producer_id: &str, handle: &str) {
        self.inner
            .lock()
            .remote
            .remove(&(producer_id.to_owned(), handle.to_owned()));
    }
}

impl Default for ConsumerSession {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(id: &str, expires_secs: i64) -> SessionContext {
        SessionContext {
            session_id: id.into(),
            expires_secs,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_ids_expire() {
        let session = ConsumerSession::anonymous();
        session.update("p", "item", Some(&ctx("s1", 10)));
        assert_eq!(session.session_id("p", "item").as_deref(), Some("s1"));
        assert!(session.session_id("other", "item").is_none());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(session.session_id("p", "item").is_none());
    }

    #[tokio::test]
    async fn negative_expiry_never_expires_and_invalidate_drops() {
        let session = ConsumerSession::anonymous();
        session.update("p", "item", Some(&ctx("s1", -1)));
        session.update("p", "item", None);
        assert_eq!(session.session_id("p", "item").as_deref(), Some("s1"));

        session.invalidate("p", "item");
        assert!(session.session_id("p", "item").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_expiry_never_expires() {
        let session = ConsumerSession::anonymous();
        session.update("p", "item", Some(&ctx("s1", i64::MAX)));

        tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        assert_eq!(session.session_id("p", "item").as_deref(), Some("s1"));
    }

    #[test]
    fn cookies_are_scoped_per_producer() {
        let session = ConsumerSession::new(Some(UserContext {
            user_id: "alice".into(),
            ..Default::default()
        }));
        assert!(session.is_authenticated());
        assert!(!session.cookies_initialized("p"));

        session.set_cookies(
            "p",
            vec![Cookie {
                name: "JSESSIONID".into(),
                value: "abc".into(),
            }],
        );
        assert!(session.cookies_initialized("p"));
        assert!(!session.cookies_initialized("q"));
        assert_eq!(session.cookies("p").len(), 1);

        session.reset_cookies("p");
        assert!(!session.cookies_initialized("p"));
        assert!(session.cookies("p").is_empty());
    }
}
