//! Conversions between hyper messages and the router's own message types.

use crate::message::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};

/// Collects a hyper request into a router [`Request`].
///
/// The body is buffered completely; headers that are not valid UTF-8 are skipped.
pub async fn from_hyper<B>(request: hyper::Request<B>) -> Result<Request, B::Error>
where
    B: Body,
{
    let (parts, body) = request.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map(|path_and_query| path_and_query.as_str())
        .unwrap_or("/");
    let mut converted = Request::new(parts.method.as_str(), target);
    for (name, value) in parts.headers.iter() {
        match value.to_str() {
            Ok(value) => converted = converted.with_header(name.as_str(), value),
            Err(_) => log::debug!("Skipping non UTF-8 header '{}'", name),
        }
    }
    let body = body.collect().await?.to_bytes();
    Ok(converted.with_body(body.to_vec()))
}

/// Builds a hyper response from a router [`Response`].
pub fn into_hyper(response: Response) -> Result<hyper::Response<Full<Bytes>>, hyper::http::Error> {
    let mut builder = hyper::Response::builder().status(response.status().as_u16());
    for (name, value) in response.headers().iter() {
        builder = builder.header(name, value);
    }
    builder.body(Full::new(Bytes::from(response.body().to_vec())))
}
