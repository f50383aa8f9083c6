//! Request building and response decoding shared by every endpoint

use log::{debug, trace};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::error::{ClientError, Result};

/// Helper for building and executing one HTTP request
pub struct FetchBuilder<'a> {
    client: &'a Client,
    url: Url,
    method: Method,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> FetchBuilder<'a> {
    /// Start a request at `base` extended by `segments`
    pub fn new(client: &'a Client, base: &Url, segments: &[&str], method: Method) -> Result<Self> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(base.to_string()))?
            .pop_if_empty()
            .extend(segments);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            client,
            url,
            method,
            headers,
            query_params: Vec::new(),
            body: None,
        })
    }

    /// Append one query parameter
    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query_params.push((key.to_string(), value.into()));
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(json);
        Ok(self)
    }

    /// The final URL, query included
    pub fn url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    async fn send(&self) -> Result<reqwest::Response> {
        let url = self.url();
        debug!("{} {}", self.method, url);

        let mut req = self
            .client
            .request(self.method.clone(), url.clone())
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }

        let response = req.send().await?;
        trace!("{} {} -> {}", self.method, url, response.status());

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            debug!("request rejected with {}: {}", status, message);
            return Err(ClientError::ServerRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Execute the request and decode the body as JSON
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<T> {
        let response = self.send().await?;
        let bytes = response.bytes().await?;
        let result = serde_json::from_slice::<T>(&bytes)?;
        Ok(result)
    }

    /// Execute the request and only report the success status
    pub async fn execute_status(&self) -> Result<StatusCode> {
        let response = self.send().await?;
        Ok(response.status())
    }
}

/// Helper for creating HTTP requests
pub struct Fetch;

impl Fetch {
    /// Create a GET request
    pub fn get<'a>(client: &'a Client, base: &Url, segments: &[&str]) -> Result<FetchBuilder<'a>> {
        FetchBuilder::new(client, base, segments, Method::GET)
    }

    /// Create a POST request
    pub fn post<'a>(client: &'a Client, base: &Url, segments: &[&str]) -> Result<FetchBuilder<'a>> {
        FetchBuilder::new(client, base, segments, Method::POST)
    }

    /// Create a DELETE request
    pub fn delete<'a>(client: &'a Client, base: &Url, segments: &[&str]) -> Result<FetchBuilder<'a>> {
        FetchBuilder::new(client, base, segments, Method::DELETE)
    }
}
