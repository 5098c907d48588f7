// Instagram Graph API media source.

use reqwest::Client;
use tracing::{info, instrument};

use crate::config::{SourceCredentials, SourceSection};
use crate::error::{CafeError, UpstreamError};
use crate::types::UpstreamRecord;

use super::{MediaSource, PageRequest, PageTransport, paginate};

/// Bearer-authenticated HTTP transport.
pub struct ReqwestTransport {
    client: Client,
    token: String,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new(token: String) -> Self {
        Self {
            client: crate::http::client(),
            token,
        }
    }
}

#[async_trait::async_trait]
impl PageTransport for ReqwestTransport {
    async fn get_page(&self, request: &PageRequest) -> crate::error::Result<serde_json::Value> {
        let builder = match request {
            PageRequest::First { url, query } => self.client.get(url).query(query),
            PageRequest::Next(url) => self.client.get(url),
        };

        let resp = builder
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(network_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(network_error)?;

        // Graph API errors arrive as a JSON `error` envelope with a 4xx status;
        // hand those to the envelope parser so they surface as `Api` errors.
        let parsed = serde_json::from_str::<serde_json::Value>(&text);
        if status.is_success() {
            return parsed.map_err(|e| CafeError::Upstream(UpstreamError::Parse(e.to_string())));
        }
        match parsed {
            Ok(body) if body.get("error").is_some() => Ok(body),
            _ => Err(CafeError::Upstream(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            })),
        }
    }
}

/// Cursor URLs carry the access token, so the URL is dropped from the message.
fn network_error(e: reqwest::Error) -> CafeError {
    CafeError::Upstream(UpstreamError::Network(e.without_url().to_string()))
}

/// Media listing for one Instagram account.
pub struct InstagramSource {
    transport: Box<dyn PageTransport>,
    first: PageRequest,
}

impl std::fmt::Debug for InstagramSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstagramSource")
            .field("url", &self.first.url())
            .finish_non_exhaustive()
    }
}

impl InstagramSource {
    pub fn new(section: &SourceSection, credentials: &SourceCredentials) -> Self {
        Self::with_transport(
            section,
            &credentials.user_id,
            Box::new(ReqwestTransport::new(credentials.access_token.clone())),
        )
    }

    /// Build with a custom transport (used by tests).
    pub fn with_transport(
        section: &SourceSection,
        user_id: &str,
        transport: Box<dyn PageTransport>,
    ) -> Self {
        Self {
            transport,
            first: first_request(section, user_id),
        }
    }
}

/// The initial media listing request for `user_id`.
pub fn first_request(section: &SourceSection, user_id: &str) -> PageRequest {
    PageRequest::First {
        url: format!(
            "https://{}/{}/{}/media",
            section.host, section.api_version, user_id
        ),
        query: vec![
            ("fields".to_string(), section.fields.clone()),
            ("limit".to_string(), section.page_size.to_string()),
        ],
    }
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl MediaSource for InstagramSource {
    fn name(&self) -> &str {
        "instagram"
    }

    #[instrument(skip_all, name = "instagram_fetch")]
    async fn fetch_all(&self) -> crate::error::Result<Vec<UpstreamRecord>> {
        info!("Fetching Instagram media");
        let records = paginate(self.transport.as_ref(), self.first.clone()).await?;
        info!(total = records.len(), "Instagram fetch complete");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_uses_configured_page_size() {
        let section = SourceSection {
            page_size: 50,
            ..SourceSection::default()
        };
        let PageRequest::First { url, query } = first_request(&section, "1789") else {
            panic!("expected first request");
        };
        assert_eq!(url, "https://graph.instagram.com/v23.0/1789/media");
        assert!(query.contains(&("limit".to_string(), "50".to_string())));
        assert!(query.iter().any(|(k, v)| k == "fields" && v.contains("media_url")));
        assert!(query.iter().all(|(k, _)| k != "access_token"));
    }

    #[tokio::test]
    async fn network_error_omits_cursor_url() {
        let transport = ReqwestTransport::new("header-token".into());
        let cursor = PageRequest::Next(
            "http://127.0.0.1:9/v23.0/1/media?access_token=SECRET123&after=X".into(),
        );
        let err = transport.get_page(&cursor).await.unwrap_err();
        assert!(matches!(err, CafeError::Upstream(UpstreamError::Network(_))));
        let msg = err.to_string();
        assert!(!msg.contains("SECRET123"), "{msg}");
        assert!(!msg.contains("access_token"), "{msg}");
    }

    #[test]
    fn debug_hides_token() {
        let transport = ReqwestTransport::new("very-secret".into());
        assert!(!format!("{transport:?}").contains("very-secret"));
    }
}
