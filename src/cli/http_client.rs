use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

const AUTHORIZATION_HEADER: &str = "x-authorization";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// The requests the status-url backend sends. Every call is authenticated
/// with the api key.
pub trait HttpClient {
    /// Multipart POST of `fields` plus `file` as the `file` part.
    fn post_form(
        &self,
        url: &str,
        api_key: &str,
        fields: &[(String, String)],
        file: &Path,
    ) -> Result<HttpResponse>;

    fn get(&self, url: &str, api_key: &str) -> Result<HttpResponse>;

    /// Streams the body of `url` into `sink` and returns the declared content
    /// type.
    fn download(&self, url: &str, api_key: &str, sink: &mut dyn Write) -> Result<Option<String>>;

    fn delete(&self, url: &str, api_key: &str) -> Result<HttpResponse>;
}

pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<ReqwestClient> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("could not build the http client")?;

        Ok(ReqwestClient { client })
    }

    fn headers(api_key: &str) -> Result<HeaderMap> {
        Ok(vec![
            (header::ACCEPT, HeaderValue::from_static("application/json")),
            (
                HeaderName::from_static(AUTHORIZATION_HEADER),
                api_key
                    .parse::<HeaderValue>()
                    .context("api key is not a valid header value")?,
            ),
        ]
        .into_iter()
        .collect())
    }
}

fn content_type(res: &Response) -> Option<String> {
    res.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn into_response(res: Response) -> Result<HttpResponse> {
    let status = res.status().as_u16();
    let content_type = content_type(&res);
    let body = res.text()?;

    Ok(HttpResponse {
        status,
        content_type,
        body,
    })
}

pub fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .map(|value| value.to_ascii_lowercase().contains("json"))
        .unwrap_or(false)
}

impl HttpClient for ReqwestClient {
    fn post_form(
        &self,
        url: &str,
        api_key: &str,
        fields: &[(String, String)],
        file: &Path,
    ) -> Result<HttpResponse> {
        let mut form = multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        let form = form
            .file("file", file)
            .with_context(|| format!("could not attach {}", file.display()))?;

        let res = self
            .client
            .post(url)
            .headers(Self::headers(api_key)?)
            .multipart(form)
            .send()?;

        into_response(res)
    }

    fn get(&self, url: &str, api_key: &str) -> Result<HttpResponse> {
        let res = self
            .client
            .get(url)
            .headers(Self::headers(api_key)?)
            .send()?;

        into_response(res)
    }

    fn download(&self, url: &str, api_key: &str, sink: &mut dyn Write) -> Result<Option<String>> {
        let mut res = self
            .client
            .get(url)
            .headers(Self::headers(api_key)?)
            .send()?;
        let content_type = content_type(&res);

        // error documents are handed back to the caller, anything else failing
        // is not worth writing to disk
        if !res.status().is_success() && !is_json(content_type.as_deref()) {
            return Err(anyhow!("{} returned {}", url, res.status()));
        }

        res.copy_to(sink)?;
        Ok(content_type)
    }

    fn delete(&self, url: &str, api_key: &str) -> Result<HttpResponse> {
        let res = self
            .client
            .delete(url)
            .headers(Self::headers(api_key)?)
            .send()?;

        into_response(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_carry_api_key() {
        let headers = ReqwestClient::headers("54321").unwrap();
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert_eq!(headers[AUTHORIZATION_HEADER], "54321");
    }

    #[test]
    fn invalid_api_key_is_rejected() {
        assert!(ReqwestClient::headers("bad\nkey").is_err());
    }

    #[test]
    fn json_content_types() {
        assert!(is_json(Some("application/json")));
        assert!(is_json(Some("application/json; charset=utf-8")));
        assert!(is_json(Some("application/problem+json")));
        assert!(!is_json(Some("application/zip")));
        assert!(!is_json(Some("application/octet-stream")));
        assert!(!is_json(None));
    }
}
