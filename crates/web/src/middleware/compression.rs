use http::header::ACCEPT_ENCODING;

use crate::codec::Compression;
use crate::route::{Handler, Next};
use crate::{Request, Response};

/// Picks gzip or deflate from `Accept-Encoding` and sets the response's
/// compression flags. The dispatcher does the same before every chain when
/// auto-compression is on.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressionSelector;

pub fn compression() -> CompressionSelector {
    CompressionSelector
}

impl Handler for CompressionSelector {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) {
        let selected = req
            .headers()
            .get(ACCEPT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .and_then(Compression::from_accept_encoding);

        if selected.is_some() {
            let flags = res.flags().with_compression(selected);
            res.set_flags(flags);
        }
        next.run(req, res);
    }
}
