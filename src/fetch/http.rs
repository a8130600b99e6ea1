// src/fetch/http.rs

use reqwest::blocking::Client;
use std::{io::Read, time::Duration};
use tracing::debug;
use url::Url;

use super::Transport;
use crate::error::{Error, Result};

/// Blocking reqwest transport. `read_timeout` bounds each read on the
/// socket, so a slow but progressing archive transfer is not cut off.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<Box<dyn Read + '_>> {
        let resp = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| Error::Transfer {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transfer {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }
        debug!(%url, %status, length = ?resp.content_length(), "response headers received");
        Ok(Box::new(resp))
    }
}
