//! Response head type.

use http::Response;

/// The head of an HTTP response: status, version and headers, with an empty body
/// placeholder. Bodies travel separately as [`PayloadItem`](super::PayloadItem)s.
pub type ResponseHead = Response<()>;
