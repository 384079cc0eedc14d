pub mod mapi;
pub mod node;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Error, ErrorKind};
use std::str::FromStr;
use std::time::Duration;

fn _version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
fn _pkg_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

pub fn version() -> String {
    format!("{}: {}", _pkg_name(), _version())
}

#[test]
fn test_version() {
    println!("{}", version());
}

pub fn get_url(base: &str, request_uri: &str) -> String {
    format!(
        "{base}/{request_uri}",
        base = base.trim_end_matches('/'),
        request_uri = request_uri.trim_start_matches('/')
    )
}

pub fn get_client(timeout: Duration) -> Result<Client, Error> {
    ClientBuilder::new()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::new(ErrorKind::Other, format!("{:?}", e)))
}

pub fn header_map(additional_headers: &Option<HashMap<String, String>>) -> Result<HeaderMap, Error> {
    let mut header_map = HeaderMap::new();
    if let Some(m) = additional_headers {
        for (k, v) in m {
            header_map.insert(
                HeaderName::from_str(k).map_err(|e| {
                    Error::new(
                        ErrorKind::InvalidData,
                        format!("Failed to Parse Header Name {},\r\n {}", k, e),
                    )
                })?,
                HeaderValue::from_str(v).map_err(|e| {
                    Error::new(
                        ErrorKind::InvalidData,
                        format!("Failed to Parse Header value {},\r\n {}", v, e),
                    )
                })?,
            );
        }
    }
    Ok(header_map)
}

pub fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Failed to Parse Json {},\r\n {}", body, e),
        )
    })
}

async fn read_ok_body(resp: Response, url: &str) -> Result<Option<String>, Error> {
    match resp.status() {
        reqwest::StatusCode::NOT_FOUND => Ok(None),
        status if status.is_success() => resp
            .text()
            .await
            .map(Some)
            .map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string())),
        status => Err(Error::new(
            ErrorKind::InvalidData,
            format!("Bad Status Code: {:?}, for URL {:?}", status, url),
        )),
    }
}

pub async fn post<T, D>(
    client: &Client,
    url: &str,
    data: &D,
    additional_headers: &Option<HashMap<String, String>>,
) -> Result<T, Error>
where
    T: DeserializeOwned,
    D: Serialize + ?Sized,
{
    match client
        .post(url)
        .headers(header_map(additional_headers)?)
        .json(data)
        .send()
        .await
    {
        Ok(resp) => match read_ok_body(resp, url).await? {
            Some(body) => parse_json(&body),
            None => Err(Error::new(ErrorKind::NotFound, format!("Not Found: {url}"))),
        },
        Err(err) => Err(Error::new(ErrorKind::InvalidData, format!("{:?}", err))),
    }
}

/// GET returning the body text, or `None` on 404.
pub async fn get_text(
    client: &Client,
    url: &str,
    additional_headers: &Option<HashMap<String, String>>,
) -> Result<Option<String>, Error> {
    match client
        .get(url)
        .headers(header_map(additional_headers)?)
        .send()
        .await
    {
        Ok(resp) => read_ok_body(resp, url).await,
        Err(err) => Err(Error::new(ErrorKind::InvalidData, format!("{:?}", err))),
    }
}

#[test]
fn test_get_url_joins_slashes() {
    assert_eq!(get_url("http://node:8332/", "/tx/raw"), "http://node:8332/tx/raw");
    assert_eq!(get_url("http://node:8332", "tx/raw"), "http://node:8332/tx/raw");
}
