use std::fs::File;
use std::path::PathBuf;

use http::StatusCode;
use http::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::mime_types;
use crate::route::{Handler, Next};
use crate::{Request, Response};

/// Static file serving settings.
#[derive(Debug, Clone)]
pub struct FilesystemOptions {
    /// directory files are served from; empty disables the middleware
    pub root_path: String,
    /// charset appended to text content types
    pub default_encoding: String,
}

impl Default for FilesystemOptions {
    fn default() -> Self {
        Self { root_path: String::new(), default_encoding: "utf-8".to_owned() }
    }
}

impl FilesystemOptions {
    pub fn new(root_path: impl Into<String>) -> Self {
        Self { root_path: root_path.into(), ..Self::default() }
    }
}

/// Serves files below a root directory.
///
/// The request path, minus the route's registration path, is mapped below the
/// root. `../` segments and repeated slashes are dropped. Found files are streamed
/// with `200`, anything else is answered with `404`. With an empty root the request
/// is passed on untouched.
#[derive(Debug, Clone)]
pub struct Filesystem {
    options: FilesystemOptions,
}

pub fn filesystem(mut options: FilesystemOptions) -> Filesystem {
    if !options.root_path.is_empty() && !options.root_path.ends_with('/') {
        options.root_path.push('/');
    }
    Filesystem { options }
}

impl Filesystem {
    /// Maps a request path below the root directory.
    fn resolve(&self, path: &str, middleware_path: &str) -> PathBuf {
        let relative = path.strip_prefix(middleware_path).filter(|_| !middleware_path.is_empty()).unwrap_or(path);
        let mut rest = relative.trim_start_matches('/');
        let mut resolved = self.options.root_path.clone();

        while let Some(c) = rest.chars().next() {
            if let Some(after) = rest.strip_prefix("../") {
                rest = after;
            } else if c == '/' && resolved.ends_with('/') {
                rest = &rest[1..];
            } else {
                resolved.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
        PathBuf::from(resolved)
    }

    fn content_type(&self, path: &str) -> String {
        let extension = path.rsplit_once('.').map(|(_, extension)| extension).filter(|extension| {
            !extension.is_empty() && extension.chars().all(|c| c.is_ascii_alphanumeric())
        });

        match extension.and_then(mime_types::lookup) {
            Some(found) if found.binary => found.mime.to_string(),
            Some(found) => format!("{}; charset={}", found.mime.essence_str(), self.options.default_encoding),
            None => format!("{}; charset={}", mime::TEXT_PLAIN.essence_str(), self.options.default_encoding),
        }
    }
}

impl Handler for Filesystem {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) {
        if self.options.root_path.is_empty() {
            next.run(req, res);
            return;
        }

        let path = req.uri().path();
        let file_path = self.resolve(path, req.middleware_path());
        res.set(CONTENT_TYPE, self.content_type(path));

        let file = match File::open(&file_path) {
            Ok(file) if file.metadata().is_ok_and(|metadata| metadata.is_file()) => file,
            Ok(_) => {
                debug!(path = %file_path.display(), "not a regular file");
                res.end(StatusCode::NOT_FOUND);
                return;
            }
            Err(e) => {
                debug!(path = %file_path.display(), cause = %e, "file not found");
                res.end(StatusCode::NOT_FOUND);
                return;
            }
        };

        if let Err(e) = res.stream(StatusCode::OK, file) {
            warn!(path = %file_path.display(), cause = %e, "failed to stream file");
        }
    }
}
