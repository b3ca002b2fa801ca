use anyhow::{Context, Result};
use url::Url;

use crate::query_builder::Endpoint;

const HTTP_HOSTNAMES: [&str; 2] = ["localhost", "127.0.0.1"];

/// Builds the URL of a backend endpoint from the configured base URL
///
/// The base URL may carry a path (e.g. an index pattern), in which case the
/// endpoint is appended to it. A base URL without a scheme gets `http` for
/// local hosts and `https` otherwise.
pub fn endpoint_url(base: &str, endpoint: Endpoint) -> Result<Url> {
    let mut url = parse_base(base)?;

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    url.join(endpoint.as_str()).context("join endpoint path")
}

fn parse_base(input: &str) -> Result<Url> {
    let input = input.trim();

    if input.starts_with("http://") || input.starts_with("https://") {
        return input.parse::<Url>().context("parse base URL");
    }

    let url = format!("https://{}", input)
        .parse::<Url>()
        .context("parse base URL")?;
    let hostname = url.host_str().context("get host")?;

    if HTTP_HOSTNAMES.contains(&hostname) {
        format!("http://{}", input)
            .parse::<Url>()
            .context("parse base URL")
    } else {
        Ok(url)
    }
}
