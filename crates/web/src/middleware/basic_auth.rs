use base64::{Engine as _, engine::general_purpose};
use http::header::AUTHORIZATION;
use tracing::debug;

use crate::route::{Handler, Next};
use crate::{Request, Response};

/// Property holding the decoded user name.
pub const BASIC_USERNAME: &str = "basicUsername";
/// Property holding the decoded password.
pub const BASIC_PASSWORD: &str = "basicPassword";

/// Decodes `Authorization: Basic ...` into the [`BASIC_USERNAME`] and
/// [`BASIC_PASSWORD`] properties. Never answers the request itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuth;

pub fn basic_auth() -> BasicAuth {
    BasicAuth
}

fn decode(header: &str) -> Option<(String, Option<String>)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = general_purpose::STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    if decoded.is_empty() {
        return None;
    }

    match decoded.split_once(':') {
        Some((user, password)) => Some((user.to_owned(), Some(password.to_owned()))),
        None => Some((decoded, None)),
    }
}

impl Handler for BasicAuth {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) {
        let credentials = req.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()).and_then(decode);

        match credentials {
            Some((user, password)) => {
                let properties = req.properties_mut();
                properties.set(BASIC_USERNAME, user);
                if let Some(password) = password {
                    properties.set(BASIC_PASSWORD, password);
                }
            }
            None if req.headers().contains_key(AUTHORIZATION) => debug!("ignoring malformed basic credentials"),
            None => {}
        }

        next.run(req, res);
    }
}
