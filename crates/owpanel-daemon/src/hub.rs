//! Vera hub `data_request` client
//!
//! Every hub operation is a single GET to the plugin's data request
//! handler, selected by the `funct` query value. A response only counts as
//! successful with status 200. There is no retry.

use owpanel_core::{RegistrationRequest, CREATE_FUNCT};
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::HubConfig;

/// Hub function returning the service type table
pub const GET_TYPES_FUNCT: &str = "gettypes";
/// Hub function returning the device capability table
pub const GET_CAPABILITIES_FUNCT: &str = "getdevcap";
/// Hub function returning newly discovered devices
pub const GET_NEW_FUNCT: &str = "getnew";

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Invalid hub URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request {funct} failed: {source}")]
    Transport {
        funct: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request {funct} returned status {status}")]
    Status { funct: String, status: u16 },
}

/// Operations the panel needs from the hub
pub trait Hub {
    /// Call hub function `funct` with extra query parameters, returning the body
    async fn request(&self, funct: &str, params: &[(String, String)]) -> Result<String, HubError>;

    async fn get_types(&self) -> Result<String, HubError> {
        self.request(GET_TYPES_FUNCT, &[]).await
    }

    async fn get_capabilities(&self) -> Result<String, HubError> {
        self.request(GET_CAPABILITIES_FUNCT, &[]).await
    }

    async fn get_new_devices(&self) -> Result<String, HubError> {
        self.request(GET_NEW_FUNCT, &[]).await
    }

    /// Ask the hub to create the given devices
    async fn create(&self, request: &RegistrationRequest) -> Result<(), HubError> {
        self.request(CREATE_FUNCT, &request.params()).await?;
        Ok(())
    }
}

/// HTTP client for the hub
pub struct HubClient {
    client: reqwest::Client,
    endpoint: Url,
    plugin_id: String,
}

impl HubClient {
    pub fn new(config: &HubConfig) -> Result<Self, HubError> {
        let url = config.endpoint();
        let endpoint = Url::parse(&url).map_err(|e| HubError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(HubError::Client)?;

        info!(endpoint = %endpoint, plugin = %config.plugin_id, "Hub client ready");

        Ok(Self {
            client,
            endpoint,
            plugin_id: config.plugin_id.clone(),
        })
    }

    /// Build the request URL: `id` and `funct` first, then `params` in order
    ///
    /// Keys and values are form-URL-encoded.
    pub fn request_url(&self, funct: &str, params: &[(String, String)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("id", &self.plugin_id);
            query.append_pair("funct", funct);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }
}

impl Hub for HubClient {
    async fn request(&self, funct: &str, params: &[(String, String)]) -> Result<String, HubError> {
        let url = self.request_url(funct, params);
        debug!(url = %url, "Sending hub request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| HubError::Transport {
                funct: funct.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(funct = %funct, status = %status, "Hub request was not accepted");
            return Err(HubError::Status {
                funct: funct.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| HubError::Transport {
            funct: funct.to_string(),
            source,
        })?;
        debug!(funct = %funct, bytes = body.len(), "Hub request completed");
        Ok(body)
    }
}
