//! Upload endpoint parsing and bucket derivation.

use url::Url;

use crate::{Error, Result};

const AWS_DOMAIN: &str = ".amazonaws.com";

/// Parses an upload endpoint, assuming `http` when no scheme is given.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(Error::invalid_input().with_message("Endpoint cannot be empty"));
    }

    let url = if endpoint.contains("://") {
        Url::parse(endpoint)?
    } else {
        Url::parse(&format!("http://{endpoint}"))?
    };

    if url.host_str().is_none() {
        return Err(Error::invalid_input()
            .with_message("Endpoint has no host")
            .with_context(endpoint.to_owned()));
    }

    Ok(url)
}

/// Derives the bucket name from an upload endpoint.
///
/// Handles virtual-hosted AWS endpoints (`bucket.s3.amazonaws.com`,
/// `bucket.s3-us-west-2.amazonaws.com`), path-style AWS endpoints
/// (`s3.amazonaws.com/bucket`) and custom domains, where the whole host is the
/// bucket name.
pub fn bucket_from_endpoint(endpoint: &str) -> Result<String> {
    let url = parse_endpoint(endpoint)?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

    let Some(service) = host.strip_suffix(AWS_DOMAIN) else {
        return Ok(host);
    };

    let labels: Vec<&str> = service.split('.').collect();
    let Some(s3_at) = labels.iter().position(|label| is_s3_label(label)) else {
        return Ok(host);
    };

    if s3_at > 0 {
        return Ok(labels[..s3_at].join("."));
    }

    url.path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            Error::invalid_input()
                .with_message("Path-style endpoint does not name a bucket")
                .with_context(endpoint.to_owned())
        })
}

fn is_s3_label(label: &str) -> bool {
    label == "s3" || label.starts_with("s3-")
}
