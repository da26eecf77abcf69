use chrono::{TimeDelta, Utc};
use http::header::{COOKIE, SET_COOKIE};
use rand::RngCore;
use tracing::debug;

use crate::route::{Handler, Next};
use crate::{Request, Response};

const SESSION_ID_BYTES: usize = 32;

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// cookie name, also the property the id is stored under
    pub name: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    /// seconds from now until `Expires`; 0 omits the attribute
    pub expires: u64,
    /// `Max-Age` in seconds; 0 omits the attribute
    pub max_age: u64,
    pub secure: bool,
    pub http_only: bool,
    /// takes precedence over `same_site_lax`
    pub same_site_strict: bool,
    pub same_site_lax: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            name: "sessionId".to_owned(),
            domain: None,
            path: None,
            expires: 0,
            max_age: 0,
            secure: false,
            http_only: true,
            same_site_strict: false,
            same_site_lax: false,
        }
    }
}

/// Reads the session id cookie into a request property, issuing a fresh random id
/// with `Set-Cookie` when the client sent none.
#[derive(Debug, Clone)]
pub struct SessionHandler {
    options: SessionOptions,
}

pub fn session_handler(options: SessionOptions) -> SessionHandler {
    SessionHandler { options }
}

impl SessionHandler {
    fn name(&self) -> &str {
        if self.options.name.is_empty() { "sessionId" } else { &self.options.name }
    }

    fn find_cookie(&self, req: &Request) -> Option<String> {
        let name = self.name();
        req.headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| key.trim() == name)
            .map(|(_, value)| value.trim().to_owned())
    }

    fn set_cookie(&self, id: &str) -> String {
        let options = &self.options;
        let mut cookie = format!("{}={id}", self.name());

        if let Some(domain) = options.domain.as_deref().filter(|domain| !domain.is_empty()) {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if let Some(path) = options.path.as_deref().filter(|path| !path.is_empty()) {
            cookie.push_str("; Path=");
            cookie.push_str(path);
        }
        if options.expires > 0 {
            let expires = i64::try_from(options.expires)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|offset| Utc::now().checked_add_signed(offset));
            if let Some(expires) = expires {
                cookie.push_str("; Expires=");
                cookie.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
            }
        }
        if options.max_age > 0 {
            cookie.push_str(&format!("; Max-Age={}", options.max_age));
        }
        if options.secure {
            cookie.push_str("; Secure");
        }
        if options.http_only {
            cookie.push_str("; HttpOnly");
        }
        if options.same_site_strict {
            cookie.push_str("; SameSite=Strict");
        } else if options.same_site_lax {
            cookie.push_str("; SameSite=Lax");
        }
        cookie
    }
}

/// 32 random bytes as 64 uppercase hex characters.
fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}

impl Handler for SessionHandler {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) {
        let name = self.name().to_owned();

        match self.find_cookie(req) {
            Some(id) => req.properties_mut().set(name, id),
            None => {
                let id = new_session_id();
                debug!(session = %id, "issuing new session");
                res.set(SET_COOKIE, self.set_cookie(&id));
                req.properties_mut().set(name, id);
            }
        }

        next.run(req, res);
    }
}
