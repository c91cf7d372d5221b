// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::convert::Infallible;

use bytes::Bytes;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Full};
use hyper::{header, http, Response, StatusCode};
use serde_json::json;
use tracing::{debug, error};

/// Response body type of the service: either a complete buffer or a stream of matches.
pub type Body = UnsyncBoxBody<Bytes, Infallible>;

pub fn full_body(data: impl Into<Bytes>) -> Body {
    Full::new(data.into()).boxed_unsync()
}

/// Does two things:
/// 1. Logs the given message. A success status code (within 200-299) will cause a debug log to be
///    written, otherwise error will be written.
/// 2. Returns the given message in the body of JSON response with the given status code.
///
/// Response body format:
/// {
///     "message": message
/// }
pub fn log_and_create_http_response(
    message: &str,
    status: StatusCode,
) -> http::Result<Response<Body>> {
    if status.is_success() {
        debug!("{message}");
    } else {
        error!("{message}");
    }
    let body = json!({ "message": message }).to_string();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full_body(body))
}

/// Splits a query string into decoded key/value pairs. `+` stands for a space, as in HTML form
/// encoding.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// First value of `key` in a parsed query.
pub fn query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

pub fn decode_component(component: &str) -> String {
    let component = component.replace('+', " ");
    match urlencoding::decode(&component) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => component,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let pairs = parse_query("q=eth0%7Cwlan0+up&range=all&flag&=x");
        assert_eq!(query_value(&pairs, "q"), Some("eth0|wlan0 up"));
        assert_eq!(query_value(&pairs, "range"), Some("all"));
        assert_eq!(query_value(&pairs, "flag"), Some(""));
        assert_eq!(query_value(&pairs, "missing"), None);
    }

    #[test]
    fn test_first_value_wins() {
        let pairs = parse_query("range=all&range=todayyesterday");
        assert_eq!(query_value(&pairs, "range"), Some("all"));
    }

    #[test]
    fn test_invalid_escape_is_kept_verbatim() {
        assert_eq!(decode_component("100%"), "100%");
        assert_eq!(decode_component("%ff"), "%ff");
    }

    #[tokio::test]
    async fn test_log_and_create_http_response() {
        let response =
            log_and_create_http_response("host \"dr\" not found", StatusCode::NOT_FOUND).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"message":"host \"dr\" not found"}"#);
    }
}
