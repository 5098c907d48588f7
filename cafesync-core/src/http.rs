//! Shared HTTP client construction.

use reqwest::Client;

/// A client with the aws-lc-rs TLS provider installed as the process
/// default. Installing again is a no-op.
pub fn client() -> Client {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    Client::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_construction_reuses_provider() {
        let _first = client();
        let _second = client();
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }
}
