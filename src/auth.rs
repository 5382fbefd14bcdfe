use serde::Deserialize;

use crate::{config::{AuthConfig, TargetHost}, prelude::*};


/// Success body of the token endpoint. Other fields are ignored.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// JSON body sent to the token endpoint.
pub fn token_request_body(username: &str, password: &str) -> serde_json::Value {
    serde_json::json!({
        "username": username,
        "password": password,
    })
}

/// Performs a single password login against the target and returns the
/// access token. Any non-success status is an authentication error; there is
/// no retry.
pub async fn fetch_token(
    client: &reqwest::Client,
    host: &TargetHost,
    auth: &AuthConfig,
) -> Result<String> {
    let url = format!("{}{}", host.as_str(), auth.token_path);
    debug!(%url, username = %auth.username, "requesting access token");

    let response = client.post(&url)
        .json(&token_request_body(&auth.username, &auth.password))
        .send()
        .await
        .with_context(|| format!("failed to reach token endpoint '{url}'"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("authentication failed: token endpoint '{url}' replied {status}");
    }

    let body: TokenResponse = response.json().await
        .context("token endpoint replied with unexpected body")?;
    Ok(body.access_token)
}
