/// Builder for the HTTP clients we hand out: the one-shot client used by
/// `check` and the per-user clients of the load test. Accepting invalid
/// certificates is needed for targets running with self-signed certs.
pub fn client_builder(accept_invalid_certs: bool) -> reqwest::ClientBuilder {
    let builder = reqwest::Client::builder();
    if accept_invalid_certs {
        builder.danger_accept_invalid_certs(true)
    } else {
        builder
    }
}
