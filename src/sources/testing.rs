//! Scripted in-process transport for exercising the fetch engine without a
//! network.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::auth::Authenticator;
use super::transport::{MirrorTransport, TransportError, TransportResponse};
use crate::errors::{SourceError, SourceResult};

#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Status code with an empty body
    Status(u16),
    /// 200 with a JSON body
    Json(serde_json::Value),
    /// Arbitrary status and raw body
    Body(u16, String),
    Timeout,
    ConnectError,
    /// Panics inside the calling task
    Panic,
}

#[derive(Default)]
struct MirrorScript {
    queued: VecDeque<ScriptedReply>,
    fallback: Option<ScriptedReply>,
    path_overrides: Vec<(String, ScriptedReply)>,
}

/// Replies are resolved per mirror: a matching path override first, then the
/// queued sequence, then the mirror's fallback. Unrouted URLs fail with a
/// connect error.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, MirrorScript>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used for `mirror` once its queue is drained
    pub fn route(self, mirror: &str, reply: ScriptedReply) -> Self {
        self.script(mirror, |s| s.fallback = Some(reply));
        self
    }

    /// Replies returned in order by successive calls to `mirror`
    pub fn route_sequence(self, mirror: &str, replies: Vec<ScriptedReply>) -> Self {
        self.script(mirror, |s| s.queued.extend(replies));
        self
    }

    /// Reply for any URL on `mirror` containing `path_fragment`
    pub fn route_path(self, mirror: &str, path_fragment: &str, reply: ScriptedReply) -> Self {
        self.script(mirror, |s| {
            s.path_overrides.push((path_fragment.to_string(), reply))
        });
        self
    }

    fn script(&self, mirror: &str, f: impl FnOnce(&mut MirrorScript)) {
        let mut scripts = lock(&self.scripts);
        f(scripts.entry(mirror.to_string()).or_default());
    }

    /// Every requested URL in call order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Session tokens sent with each call, in call order
    pub fn session_tokens(&self) -> Vec<Option<String>> {
        lock(&self.calls)
            .iter()
            .map(|(_, token)| token.clone())
            .collect()
    }

    pub fn calls_to(&self, mirror: &str) -> usize {
        self.calls()
            .iter()
            .filter(|url| belongs_to(url, mirror))
            .count()
    }

    fn resolve(&self, url: &str) -> Option<ScriptedReply> {
        let mut scripts = lock(&self.scripts);
        let (_, script) = scripts
            .iter_mut()
            .filter(|(mirror, _)| belongs_to(url, mirror))
            .max_by_key(|(mirror, _)| mirror.len())?;

        if let Some((_, reply)) = script
            .path_overrides
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
        {
            return Some(reply.clone());
        }
        script.queued.pop_front().or_else(|| script.fallback.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn belongs_to(url: &str, mirror: &str) -> bool {
    url == mirror || url.starts_with(&format!("{}/", mirror))
}

#[async_trait]
impl MirrorTransport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        session_token: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
        lock(&self.calls).push((url.to_string(), session_token.map(str::to_string)));

        match self.resolve(url) {
            Some(ScriptedReply::Status(status)) => Ok(TransportResponse {
                status,
                body: String::new(),
            }),
            Some(ScriptedReply::Json(value)) => Ok(TransportResponse {
                status: 200,
                body: value.to_string(),
            }),
            Some(ScriptedReply::Body(status, body)) => Ok(TransportResponse { status, body }),
            Some(ScriptedReply::Timeout) => Err(TransportError::Timeout),
            Some(ScriptedReply::ConnectError) => {
                Err(TransportError::Connect("connection refused".to_string()))
            }
            Some(ScriptedReply::Panic) => panic!("scripted transport panic for {}", url),
            None => Err(TransportError::Connect(format!("no scripted route for {}", url))),
        }
    }
}

/// Authenticator that hands out a fixed token, or rejects every login
pub struct StaticAuthenticator {
    token: Option<String>,
}

impl StaticAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn rejecting() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn login(
        &self,
        _username: &str,
        _password: &str,
        _tenant_id: &str,
    ) -> SourceResult<String> {
        self.token
            .clone()
            .ok_or_else(|| SourceError::auth_failed("invalid credentials"))
    }
}
