mod attachments;
#[cfg(feature = "hyper")]
pub mod hyper;

pub use attachments::Attachments;

use crate::status::StatusCode;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const CONTENT_TYPE: &str = "Content-type";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=UTF-8";

/// The request methods a route can be registered for.
///
/// Methods are compared case-insensitively and stored in lowercase form, so
/// `"GET"`, `"get"` and `"Get"` all resolve to [`Method::Get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "get", alias = "Get", alias = "GET")]
    Get,

    #[serde(rename = "post", alias = "Post", alias = "POST")]
    Post,

    #[serde(rename = "put", alias = "Put", alias = "PUT")]
    Put,

    #[serde(rename = "delete", alias = "Delete", alias = "DELETE")]
    Delete,

    #[serde(rename = "patch", alias = "Patch", alias = "PATCH")]
    Patch,

    #[serde(rename = "options", alias = "Options", alias = "OPTIONS")]
    Options,
}

impl Method {
    /// Every supported method, in the order `any` registers them.
    pub const ALL: [Method; 6] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Options,
    ];

    /// The normalized (lowercase) name of the method.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
            Method::Patch => "patch",
            Method::Options => "options",
        }
    }

    /// Case-insensitive comparison against a raw request method.
    pub fn matches(&self, method: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(method)
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.matches(s.trim()))
            .ok_or_else(|| UnknownMethod {
                method: s.to_string(),
            })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Method '{method}' is not supported.")]
pub struct UnknownMethod {
    pub method: String,
}

/// Ordered header list with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces every value stored under `name`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An incoming request as seen by the router.
///
/// # Behavior
/// A `Request` is an immutable value: every `with_*` method consumes the
/// request and returns an updated copy. Each request receives a random v4
/// UUID on creation which is used to correlate log lines for one dispatch.
#[derive(Debug, Clone)]
pub struct Request {
    id: Uuid,
    method: String,
    path: String,
    query: Option<String>,
    headers: Headers,
    body: Vec<u8>,
    attachments: Attachments,
}

impl Request {
    /// Creates a request from a raw method and a request target.
    ///
    /// # Parameters
    /// - `method`: the request method as received (any case).
    /// - `uri`: the request target, e.g. `/users/42?expand=true`. The query
    ///   string is split off and kept separately, a fragment is dropped.
    ///
    /// # Examples
    /// ```rust
    /// use routeline::message::Request;
    ///
    /// let request = Request::new("GET", "/users/42?expand=true");
    /// assert_eq!(request.path(), "/users/42");
    /// assert_eq!(request.query_param("expand").as_deref(), Some("true"));
    /// ```
    pub fn new(method: impl Into<String>, uri: impl AsRef<str>) -> Self {
        let (path, query) = split_target(uri.as_ref());
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            path,
            query,
            headers: Headers::new(),
            body: Vec::new(),
            attachments: Attachments::new(),
        }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded query-string pairs in the order they appear.
    pub fn query_params(&self) -> Vec<(String, String)> {
        match &self.query {
            Some(query) => url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Decoded value for `name` in the query string; the last one when repeated.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.as_ref().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == name)
                .last()
                .map(|(_, value)| value.into_owned())
        })
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn attachment<K>(&self, key: impl AsRef<str>) -> Option<&K>
    where
        K: Send + Sync + 'static,
    {
        self.attachments.get::<K>(key)
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Replaces the request target; the path and query string are both reset.
    pub fn with_uri(mut self, uri: impl AsRef<str>) -> Self {
        let (path, query) = split_target(uri.as_ref());
        self.path = path;
        self.query = query;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_attachment<K>(mut self, key: impl AsRef<str>, value: K) -> Self
    where
        K: Send + Sync + 'static,
    {
        self.attachments.add(key, value);
        self
    }
}

fn split_target(target: &str) -> (String, Option<String>) {
    let target = target.split('#').next().unwrap_or_default();
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (target, None),
    };
    let path = if path.is_empty() { "/" } else { path };
    (path.to_string(), query)
}

/// An outgoing response.
///
/// Like [`Request`], a response is updated through consuming `with_*` calls
/// that return a new value. The default response has status 200, no headers
/// and an empty body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn with_status(mut self, status: impl Into<StatusCode>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets `name` to `value`, replacing any existing values.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Adds another value for `name`, keeping existing ones.
    pub fn with_added_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Turns this response into an HTML page with the given status and body.
    pub fn into_html(self, status: impl Into<StatusCode>, body: impl Into<String>) -> Self {
        self.with_status(status)
            .with_body(body.into())
            .with_header(CONTENT_TYPE, HTML_CONTENT_TYPE)
    }
}

/// What a handler hands back to the dispatcher.
///
/// # Behavior
/// - `Response` is returned to the caller as is.
/// - `Text` is wrapped into a 200 HTML response.
/// - `Empty` (and empty text) is a handler bug and fails the dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Response(Response),
    Text(String),
    Empty,
}

impl Reply {
    pub fn is_empty(&self) -> bool {
        match self {
            Reply::Response(_) => false,
            Reply::Text(text) => text.is_empty(),
            Reply::Empty => true,
        }
    }
}

impl From<Response> for Reply {
    fn from(value: Response) -> Self {
        Reply::Response(value)
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Text(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Text(value.to_string())
    }
}

impl From<Cow<'_, str>> for Reply {
    fn from(value: Cow<'_, str>) -> Self {
        Reply::Text(value.into_owned())
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl<T> From<Option<T>> for Reply
where
    T: Into<Reply>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(reply) => reply.into(),
            None => Reply::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("options".parse::<Method>().unwrap(), Method::Options);
        assert_eq!("Patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("HEAD".parse::<Method>().is_err());
        assert!(Method::Delete.matches("DELETE"));
        assert_eq!(Method::Put.to_string(), "PUT");
    }

    #[test]
    fn test_method_deserialize_aliases() {
        let methods: Vec<Method> = serde_json::from_str(r#"["get", "POST", "Delete"]"#).unwrap();
        assert_eq!(methods, vec![Method::Get, Method::Post, Method::Delete]);
    }

    #[test]
    fn test_request_splits_target() {
        let request = Request::new("get", "/search?q=rust+router&page=2#top");
        assert_eq!(request.path(), "/search");
        assert_eq!(request.query_string(), Some("q=rust+router&page=2"));
        assert_eq!(
            request.query_params(),
            vec![
                ("q".to_string(), "rust router".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        assert_eq!(request.query_param("missing"), None);
        let repeated = Request::new("GET", "/q?a=1&a=2");
        assert_eq!(repeated.query_param("a").as_deref(), Some("2"));

        let request = Request::new("GET", "");
        assert_eq!(request.path(), "/");
        assert!(request.query_params().is_empty());
    }

    #[test]
    fn test_request_updates_return_new_values() {
        let original = Request::new("GET", "/a");
        let updated = original
            .clone()
            .with_uri("/b?x=1")
            .with_header("X-Trace", "abc")
            .with_attachment("user", String::from("alice"));
        assert_eq!(original.path(), "/a");
        assert!(original.header("x-trace").is_none());
        assert_eq!(updated.path(), "/b");
        assert_eq!(updated.header("x-trace"), Some("abc"));
        assert_eq!(updated.id(), original.id());
        assert_eq!(
            updated.attachment::<String>("user").map(String::as_str),
            Some("alice")
        );
    }

    #[test]
    fn test_response_headers() {
        let response = Response::new()
            .with_header("Set-Cookie", "a=1")
            .with_added_header("set-cookie", "b=2")
            .with_header("Content-Type", "text/plain");
        assert_eq!(response.headers().get_all("SET-COOKIE").count(), 2);
        assert_eq!(response.header("content-type"), Some("text/plain"));

        let replaced = response.with_header("content-type", HTML_CONTENT_TYPE);
        assert_eq!(replaced.headers().get_all("Content-Type").count(), 1);
        assert_eq!(replaced.header(CONTENT_TYPE), Some(HTML_CONTENT_TYPE));
    }

    #[test]
    fn test_reply_conversions() {
        assert_eq!(Reply::from("<p>ok</p>"), Reply::Text("<p>ok</p>".to_string()));
        assert!(Reply::from(()).is_empty());
        assert!(Reply::from("").is_empty());
        assert!(Reply::from(None::<String>).is_empty());
        assert!(!Reply::from(Response::new()).is_empty());
    }
}
