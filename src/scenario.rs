//! The goose scenario: one simulated user logs in once, then repeatedly
//! executes one of three weighted GET tasks against the bike service.

use std::{sync::Arc, time::Duration};

use goose::prelude::*;

use crate::{auth::{TokenResponse, token_request_body}, config::{AuthConfig, Config}, prelude::*};


const BRANDS: [&str; 3] = ["Trek", "Giant", "Specialized"];
const TYPES: [&str; 2] = ["Mountain", "Road"];

/// Per-user state, set once by the on-start transaction.
struct Session {
    token: String,
}

/// Builds the "BikeRequests" scenario. The relative weights 100/80/60 make
/// goose pick the id/brand/type task in roughly that ratio; each user pauses
/// for `1 / load.throughput` seconds between two task executions.
pub fn build(config: &Config) -> Result<Scenario, GooseError> {
    let pause = wait_between(config.load.throughput);

    let auth = Arc::new(config.auth.clone());
    let accept_invalid_certs = config.target.accept_invalid_certs;
    let on_start: TransactionFunction = Arc::new(move |user| {
        let auth = Arc::clone(&auth);
        Box::pin(async move { authenticate(user, &auth, accept_invalid_certs).await })
    });

    Ok(scenario!("BikeRequests")
        .set_wait_time(pause, pause)?
        .register_transaction(Transaction::new(on_start)
            .set_name("authenticate")
            .set_on_start())
        .register_transaction(transaction!(get_by_id)
            .set_name("get_by_id")
            .set_weight(100)?)
        .register_transaction(transaction!(get_by_brand)
            .set_name("get_by_brand")
            .set_weight(80)?)
        .register_transaction(transaction!(get_by_type)
            .set_name("get_by_type")
            .set_weight(60)?))
}

/// Fixed pause between task executions for a constant per-user throughput.
fn wait_between(throughput: f64) -> Duration {
    // `load.throughput` is validated to be finite and positive.
    Duration::from_secs_f64(1.0 / throughput)
}

fn id_paths() -> Vec<String> {
    (1..=10).map(|id| format!("/bike/{id}")).collect()
}

fn brand_paths() -> Vec<String> {
    BRANDS.iter().map(|brand| format!("/bike?brand={brand}")).collect()
}

fn type_paths() -> Vec<String> {
    TYPES.iter().map(|ty| format!("/bike?type={ty}")).collect()
}

/// Runs once per simulated user, before any other transaction: swaps in a
/// lenient TLS client if configured, then trades the configured credentials
/// for an access token. On any failure the user keeps no token and its data
/// tasks stay idle, it is not retried.
async fn authenticate(
    user: &mut GooseUser,
    auth: &AuthConfig,
    accept_invalid_certs: bool,
) -> TransactionResult {
    if accept_invalid_certs {
        user.set_client_builder(crate::util::client_builder(true)).await?;
    }

    let body = token_request_body(&auth.username, &auth.password);
    let request_builder = user
        .get_request_builder(&GooseMethod::Post, &auth.token_path)?
        .json(&body);
    let request = GooseRequest::builder()
        .method(GooseMethod::Post)
        .name("authenticate")
        .set_request_builder(request_builder)
        .build();

    let mut goose = user.request(request).await?;
    match goose.response {
        Ok(response) if response.status().is_success() => {
            match response.json::<TokenResponse>().await {
                Ok(token) => {
                    user.set_session_data(Session { token: token.access_token });
                    Ok(())
                }
                Err(e) => {
                    let reason = format!("token endpoint replied with unexpected body: {e}");
                    user.set_failure(&reason, &mut goose.request, None, None)
                }
            }
        }
        Ok(response) => {
            let reason = format!("authentication failed with status {}", response.status());
            user.set_failure(&reason, &mut goose.request, None, None)
        }
        Err(e) => {
            let reason = format!("authentication request failed: {e}");
            user.set_failure(&reason, &mut goose.request, None, None)
        }
    }
}

/// GET requests with a path variable, ids 1 through 10.
async fn get_by_id(user: &mut GooseUser) -> TransactionResult {
    authorized_gets(user, id_paths(), "get /bike/{id}").await
}

/// GET requests with the `brand` query parameter.
async fn get_by_brand(user: &mut GooseUser) -> TransactionResult {
    authorized_gets(user, brand_paths(), "get /bike?brand").await
}

/// GET requests with the `type` query parameter.
async fn get_by_type(user: &mut GooseUser) -> TransactionResult {
    authorized_gets(user, type_paths(), "get /bike?type").await
}

/// Issues one bearer-authorized GET per path, in order. Individual request
/// failures are recorded by goose and do not stop the remaining requests.
async fn authorized_gets(
    user: &mut GooseUser,
    paths: Vec<String>,
    name: &str,
) -> TransactionResult {
    // No token means authentication failed for this user at startup. Issue
    // no data calls then.
    let Some(token) = user.get_session_data::<Session>().map(|s| s.token.clone()) else {
        debug!("skipping '{name}': user holds no access token");
        return Ok(());
    };

    for path in &paths {
        let request_builder = user
            .get_request_builder(&GooseMethod::Get, path)?
            .header("Authorization", format!("Bearer {token}"));
        let request = GooseRequest::builder()
            .name(name)
            .set_request_builder(request_builder)
            .build();
        let _ = user.request(request).await?;
    }

    Ok(())
}
