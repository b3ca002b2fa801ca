use anyhow::{Context, Result};
use http::{header::CONTENT_TYPE, HeaderValue, Method};
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use crate::{
    config::Config,
    query_builder::{self, Endpoint},
    url_builder,
};

/// Everything needed to send one query to the backend
pub struct RequestBuilder {
    pub url: Url,
    pub body: String,
    pub credentials: Option<(String, String)>,

    /// Skip TLS certificate verification
    pub insecure: bool,
}

impl RequestBuilder {
    /// Renders the query for the given configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let endpoint = Endpoint::for_config(config);
        let url = url_builder::endpoint_url(&config.url_base, endpoint)?;
        let body = serde_json::to_string_pretty(&query_builder::build(config))
            .context("render query")?;

        Ok(Self {
            url,
            body,
            credentials: config
                .credentials()
                .map(|(username, password)| (username.to_owned(), password.to_owned())),
            insecure: config.insecure,
        })
    }

    /// Sends the request
    pub async fn send(self) -> Result<Response> {
        debug!(url = %self.url, "sending query");
        debug!("query request body:\n{}", self.body);

        let response = self.build()?.send().await.context("send query")?;

        debug!(status = %response.status(), "received response");

        Ok(response)
    }

    fn build(self) -> Result<reqwest::RequestBuilder> {
        let client = Client::builder()
            .danger_accept_invalid_certs(self.insecure)
            .build()
            .context("build HTTP client")?;

        let mut request = client
            .request(Method::GET, self.url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(self.body);

        if let Some((username, password)) = self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        Ok(request)
    }
}
