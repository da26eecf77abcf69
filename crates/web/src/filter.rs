//! Composable request filters.
//!
//! Every route's match rule is an [`AllFilter`] holding the method filter, the path
//! rule and whatever extra filters were added through
//! [`RouteBuilder::with`](crate::route::RouteBuilder::with).
//!
//! # Examples
//!
//! ```
//! use cex_web::filter::{all_filter, fn_filter, get_method, header};
//! use http::{HeaderName, HeaderValue};
//!
//! let mut combined = all_filter();
//! combined
//!     .and(get_method())
//!     .and(header(HeaderName::from_static("x-api-key"), HeaderValue::from_static("secret")))
//!     .and(fn_filter(|req| req.url().starts_with("/api")));
//! ```

use http::{HeaderName, HeaderValue, Method};

use crate::Request;

/// Decides whether a request is eligible for a route.
///
/// Filters must be `Send + Sync`: the route lists are shared by every worker.
pub trait Filter: Send + Sync {
    fn matches(&self, req: &Request) -> bool;
}

struct FnFilter<F: Fn(&Request) -> bool>(F);

impl<F: Fn(&Request) -> bool + Send + Sync> Filter for FnFilter<F> {
    fn matches(&self, req: &Request) -> bool {
        (self.0)(req)
    }
}

/// Creates a filter from a closure.
pub fn fn_filter<F>(f: F) -> impl Filter
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    FnFilter(f)
}

/// A filter that matches every request.
#[derive(Debug, Clone, Copy)]
pub struct TrueFilter;

pub fn true_filter() -> TrueFilter {
    TrueFilter
}

impl Filter for TrueFilter {
    #[inline]
    fn matches(&self, _req: &Request) -> bool {
        true
    }
}

pub fn any_filter() -> AnyFilter {
    AnyFilter::new()
}

/// OR-composition; an empty chain matches.
#[derive(Default)]
pub struct AnyFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl AnyFilter {
    fn new() -> Self {
        Self { filters: vec![] }
    }

    pub fn or<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl Filter for AnyFilter {
    fn matches(&self, req: &Request) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter.matches(req))
    }
}

pub fn all_filter() -> AllFilter {
    AllFilter::new()
}

/// AND-composition; an empty chain matches. Filters run in insertion order and stop
/// at the first miss.
#[derive(Default)]
pub struct AllFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl AllFilter {
    fn new() -> Self {
        Self { filters: vec![] }
    }

    pub fn and<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub(crate) fn and_boxed(&mut self, filter: Box<dyn Filter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Filter for AllFilter {
    fn matches(&self, req: &Request) -> bool {
        self.filters.iter().all(|filter| filter.matches(req))
    }
}

impl std::fmt::Debug for AnyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyFilter").field("filters", &self.filters.len()).finish()
    }
}

impl std::fmt::Debug for AllFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllFilter").field("filters", &self.filters.len()).finish()
    }
}

/// Matches one HTTP method.
#[derive(Debug, Clone)]
pub struct MethodFilter(Method);

impl Filter for MethodFilter {
    fn matches(&self, req: &Request) -> bool {
        self.0.eq(req.method())
    }
}

/// Creates a filter for an arbitrary method, such as WebDAV's `PROPFIND`.
pub fn method(method: Method) -> MethodFilter {
    MethodFilter(method)
}

macro_rules! method_filter {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Creates a filter that matches HTTP ", stringify!($upper_case_method), " requests.")]
        #[inline]
        pub fn $method() -> MethodFilter {
            MethodFilter(Method::$upper_case_method)
        }
    };
}

method_filter!(get_method, GET);
method_filter!(post_method, POST);
method_filter!(put_method, PUT);
method_filter!(delete_method, DELETE);
method_filter!(head_method, HEAD);
method_filter!(options_method, OPTIONS);
method_filter!(connect_method, CONNECT);
method_filter!(patch_method, PATCH);
method_filter!(trace_method, TRACE);

/// Matches requests carrying a header with exactly this value.
#[derive(Debug, Clone)]
pub struct HeaderFilter(HeaderName, HeaderValue);

pub fn header(name: HeaderName, value: HeaderValue) -> HeaderFilter {
    HeaderFilter(name, value)
}

impl Filter for HeaderFilter {
    fn matches(&self, req: &Request) -> bool {
        req.headers().get_all(&self.0).iter().any(|value| self.1.eq(value))
    }
}
