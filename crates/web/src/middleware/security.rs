use std::fmt::Write as _;

use crate::route::{Handler, Next};
use crate::{Request, Response};

/// Value of the `Referrer-Policy` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferrerPolicy {
    NoReferrer,
    NoReferrerWhenDowngrade,
    SameOrigin,
    Origin,
    StrictOrigin,
    OriginWhenCrossOrigin,
    StrictOriginWhenCrossOrigin,
    UnsafeUrl,
}

impl ReferrerPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferrerPolicy::NoReferrer => "no-referrer",
            ReferrerPolicy::NoReferrerWhenDowngrade => "no-referrer-when-downgrade",
            ReferrerPolicy::SameOrigin => "same-origin",
            ReferrerPolicy::Origin => "origin",
            ReferrerPolicy::StrictOrigin => "strict-origin",
            ReferrerPolicy::OriginWhenCrossOrigin => "origin-when-cross-origin",
            ReferrerPolicy::StrictOriginWhenCrossOrigin => "strict-origin-when-cross-origin",
            ReferrerPolicy::UnsafeUrl => "unsafe-url",
        }
    }
}

/// Value of the `X-Frame-Options` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOptions {
    Deny,
    SameOrigin,
    AllowFrom(String),
}

/// Which security headers [`security_headers`] emits.
///
/// `None` leaves the corresponding header out.
#[derive(Debug, Clone)]
pub struct SecurityOptions {
    /// `Some(true)` sends `X-DNS-Prefetch-Control: off`, `Some(false)` sends `on`.
    pub dns_prefetch_off: Option<bool>,
    pub frame_options: Option<FrameOptions>,
    /// base64 SHA-256 pins for `Public-Key-Pins`; empty disables the header
    pub hpkp_keys: Vec<String>,
    pub hpkp_max_age: u64,
    pub hpkp_include_subdomains: bool,
    pub hpkp_report_uri: Option<String>,
    /// `Strict-Transport-Security` max-age in seconds; 0 disables the header
    pub sts_max_age: u64,
    pub sts_include_subdomains: bool,
    pub sts_preload: bool,
    pub ie_no_open: bool,
    pub disable_cache: bool,
    pub no_sniff: bool,
    pub referrer_policy: Option<ReferrerPolicy>,
    pub xss_protection: bool,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self {
            dns_prefetch_off: Some(true),
            frame_options: None,
            hpkp_keys: Vec::new(),
            hpkp_max_age: 31_536_000,
            hpkp_include_subdomains: true,
            hpkp_report_uri: None,
            sts_max_age: 31_536_000,
            sts_include_subdomains: false,
            sts_preload: false,
            ie_no_open: true,
            disable_cache: true,
            no_sniff: true,
            referrer_policy: None,
            xss_protection: true,
        }
    }
}

/// Sets a configurable group of security related response headers, then continues
/// the chain.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    options: SecurityOptions,
}

pub fn security_headers(options: SecurityOptions) -> SecurityHeaders {
    SecurityHeaders { options }
}

impl SecurityHeaders {
    fn public_key_pins(&self) -> Option<String> {
        let options = &self.options;
        if options.hpkp_max_age == 0 || options.hpkp_keys.is_empty() {
            return None;
        }

        let mut pins =
            options.hpkp_keys.iter().map(|key| format!("pin-sha256=\"{key}\"")).collect::<Vec<_>>().join("; ");
        let _ = write!(pins, "; max-age={}", options.hpkp_max_age);
        if options.hpkp_include_subdomains {
            pins.push_str("; includeSubdomains");
        }
        if let Some(uri) = options.hpkp_report_uri.as_deref().filter(|uri| !uri.is_empty()) {
            let _ = write!(pins, "; report-uri=\"{uri}\"");
        }
        Some(pins)
    }

    fn strict_transport_security(&self) -> Option<String> {
        let options = &self.options;
        if options.sts_max_age == 0 {
            return None;
        }

        let mut sts = format!("max-age={}", options.sts_max_age);
        if options.sts_include_subdomains {
            sts.push_str("; includeSubdomains");
        }
        if options.sts_preload {
            sts.push_str("; preload");
        }
        Some(sts)
    }
}

impl Handler for SecurityHeaders {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next<'_>) {
        let options = &self.options;

        if let Some(off) = options.dns_prefetch_off {
            res.set("x-dns-prefetch-control", if off { "off" } else { "on" });
        }
        match &options.frame_options {
            Some(FrameOptions::Deny) => res.set("x-frame-options", "DENY"),
            Some(FrameOptions::SameOrigin) => res.set("x-frame-options", "SAMEORIGIN"),
            Some(FrameOptions::AllowFrom(origin)) => res.set("x-frame-options", format!("ALLOW-FROM {origin}")),
            None => {}
        }
        if let Some(pins) = self.public_key_pins() {
            res.set("public-key-pins", pins);
        }
        if let Some(sts) = self.strict_transport_security() {
            res.set("strict-transport-security", sts);
        }
        if options.ie_no_open {
            res.set("x-download-options", "noopen");
        }
        if options.disable_cache {
            res.set("cache-control", "no-store, no-cache, must-revalidate, proxy-revalidate");
            res.set("pragma", "no-cache");
            res.set("expires", "0");
        }
        if options.no_sniff {
            res.set("x-content-type-options", "nosniff");
        }
        if let Some(policy) = options.referrer_policy {
            res.set("referrer-policy", policy.as_str());
        }
        if options.xss_protection {
            res.set("x-xss-protection", "1; mode=block");
        }

        next.run(req, res);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferedOutput;
    use crate::route;
    use http::{HeaderMap, StatusCode, Version};

    fn headers_for(options: SecurityOptions) -> HeaderMap {
        let routes = vec![
            route::middleware(security_headers(options)).build(None),
            route::middleware(route::handler_fn(|_, res, _| res.end(StatusCode::OK))).build(None),
        ];
        let mut req: Request = http::Request::builder().uri("/").body(()).unwrap().into();
        let output = BufferedOutput::new();
        let mut res = Response::new(Box::new(output.clone()), Version::HTTP_11);
        Next::new(&routes).run(&mut req, &mut res);
        output.headers()
    }

    #[test]
    fn defaults() {
        let headers = headers_for(SecurityOptions::default());

        assert_eq!(headers["x-dns-prefetch-control"], "off");
        assert_eq!(headers["strict-transport-security"], "max-age=31536000");
        assert_eq!(headers["x-download-options"], "noopen");
        assert_eq!(headers["cache-control"], "no-store, no-cache, must-revalidate, proxy-revalidate");
        assert_eq!(headers["pragma"], "no-cache");
        assert_eq!(headers["expires"], "0");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-xss-protection"], "1; mode=block");
        assert!(!headers.contains_key("x-frame-options"));
        assert!(!headers.contains_key("public-key-pins"));
        assert!(!headers.contains_key("referrer-policy"));
    }

    #[test]
    fn everything_enabled() {
        let headers = headers_for(SecurityOptions {
            dns_prefetch_off: Some(false),
            frame_options: Some(FrameOptions::AllowFrom("https://example.com".into())),
            hpkp_keys: vec!["AbC=".into(), "DeF=".into()],
            hpkp_report_uri: Some("https://example.com/hpkp".into()),
            sts_include_subdomains: true,
            sts_preload: true,
            referrer_policy: Some(ReferrerPolicy::StrictOriginWhenCrossOrigin),
            ..SecurityOptions::default()
        });

        assert_eq!(headers["x-dns-prefetch-control"], "on");
        assert_eq!(headers["x-frame-options"], "ALLOW-FROM https://example.com");
        assert_eq!(
            headers["public-key-pins"],
            "pin-sha256=\"AbC=\"; pin-sha256=\"DeF=\"; max-age=31536000; includeSubdomains; report-uri=\"https://example.com/hpkp\""
        );
        assert_eq!(headers["strict-transport-security"], "max-age=31536000; includeSubdomains; preload");
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
    }

    #[test]
    fn everything_disabled() {
        let headers = headers_for(SecurityOptions {
            dns_prefetch_off: None,
            sts_max_age: 0,
            ie_no_open: false,
            disable_cache: false,
            no_sniff: false,
            xss_protection: false,
            ..SecurityOptions::default()
        });

        assert_eq!(headers.len(), 1, "{headers:?}");
        assert!(headers.contains_key("date"));
    }
}
