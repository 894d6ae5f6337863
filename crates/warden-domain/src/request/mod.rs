//! Proxied request context and service-name parsing.
//!
//! A [`ProxyRequest`] is what the gateway hands to the decision point: the
//! method, the path below the proxy prefix, query parameters, headers and the
//! already-authenticated [`Principal`]. It is shared as a [`RequestContext`]
//! so service handles can hold a reference to the live request.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DomainError, DomainResult};
use crate::model::Principal;

/// Shared handle to the request currently being evaluated.
pub type RequestContext = Arc<ProxyRequest>;

/// An incoming request as seen by the decision point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    /// Header names are stored lowercased.
    headers: HashMap<String, String>,
    principal: Principal,
}

impl ProxyRequest {
    /// Builds a request from a method and a path with an optional query string.
    pub fn new(method: impl Into<String>, uri: &str, principal: Principal) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        let query = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.to_string(),
            query,
            headers: HashMap::new(),
            principal,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Wraps the request into a shareable context.
    pub fn into_context(self) -> RequestContext {
        Arc::new(self)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns the first query parameter with the given name, ignoring case.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true when the request asks to bypass cached results.
    ///
    /// Honors `Cache-Control: no-cache` and the legacy `Pragma: no-cache`.
    pub fn cache_bypass(&self) -> bool {
        let has_no_cache = |value: &str| {
            value
                .split(',')
                .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
        };
        self.header("cache-control").is_some_and(has_no_cache)
            || self.header("pragma").is_some_and(has_no_cache)
    }
}

/// Service name and raw path segments extracted from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub service_name: String,
    /// Segments below the service, before any service-type interpretation.
    pub segments: Vec<String>,
}

/// Extracts the targeted service from a request.
///
/// Implementations must be idempotent and free of side effects.
pub trait RequestParser: Send + Sync {
    fn parse(&self, request: &ProxyRequest) -> DomainResult<ParsedRequest>;
}

/// Parses `<prefix>/<service>/<segments...>` paths.
#[derive(Debug, Clone, Default)]
pub struct ProxyPathParser {
    prefix: String,
}

impl ProxyPathParser {
    /// Creates a parser stripping the given path prefix (e.g. `/ows/proxy`).
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }
}

impl RequestParser for ProxyPathParser {
    fn parse(&self, request: &ProxyRequest) -> DomainResult<ParsedRequest> {
        let path = request.path();
        let relative = if self.prefix.is_empty() {
            path
        } else {
            match path.strip_prefix(self.prefix.as_str()) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
                _ => {
                    return Err(DomainError::InvalidRequest {
                        message: format!("path '{}' is not below '{}'", path, self.prefix),
                    })
                }
            }
        };

        let mut segments = relative
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let service_name = segments.next().ok_or_else(|| DomainError::InvalidRequest {
            message: format!("no service name in path '{path}'"),
        })?;

        Ok(ParsedRequest {
            service_name,
            segments: segments.collect(),
        })
    }
}
