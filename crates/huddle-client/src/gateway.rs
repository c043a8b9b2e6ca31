//! HTTP client for the backend token gateway.
//!
//! Plain request/response: no retries, no caching. Every endpoint answers
//! with an [`ApiResponse`] envelope; an envelope without `success` is a
//! gateway error.

use async_trait::async_trait;
use huddle_common::{ApiResponse, Error, Result};
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::types::Uid;

const APP_TOKEN_PATH: &[&str] = &["agora", "chat", "app", "token"];
const CHANNEL_TOKEN_PATH: &[&str] = &["agora", "chat", "user", "channel"];
const USER_TOKEN_PATH: &[&str] = &["agora", "chat", "user"];

/// Where join and chat tokens come from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Token for joining `channel` as `uid`.
    async fn channel_token(&self, uid: &Uid, channel: &str) -> Result<String>;

    /// Chat access token for a named chat user.
    async fn user_token(&self, chat_user: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct TokenGateway {
    http: reqwest::Client,
    base_url: Url,
}

impl TokenGateway {
    pub fn new(base_url: &str, timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid gateway url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "gateway url {base_url} cannot carry a path"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::config(format!("http client: {e}")))?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            &config.gateway_url,
            config.http_timeout(),
            config.connect_timeout(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /agora/chat/app/token`
    pub async fn app_token(&self) -> Result<ApiResponse> {
        let url = self.endpoint(APP_TOKEN_PATH, &[])?;
        self.get(url).await
    }

    /// `GET /agora/chat/user/channel?uid=&channel=`
    pub async fn channel_token_response(&self, uid: &Uid, channel: &str) -> Result<ApiResponse> {
        let mut url = self.endpoint(CHANNEL_TOKEN_PATH, &[])?;
        url.query_pairs_mut()
            .append_pair("uid", &uid.to_string())
            .append_pair("channel", channel);
        self.get(url).await
    }

    /// `GET /agora/chat/user/{chatUserName}`
    pub async fn user_token_response(&self, chat_user: &str) -> Result<ApiResponse> {
        if chat_user.is_empty() {
            return Err(Error::gateway("chat user name is empty"));
        }
        let url = self.endpoint(USER_TOKEN_PATH, &[chat_user])?;
        self.get(url).await
    }

    fn endpoint(&self, path: &[&str], tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("gateway url cannot carry a path"))?
            .pop_if_empty()
            .extend(path.iter().chain(tail.iter()));
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<ApiResponse> {
        debug!(%url, "token request");
        let resp = self.http.get(url.clone()).send().await.map_err(|e| {
            warn!(%url, "error fetching token: {}", e);
            Error::gateway(e)
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%url, %status, "token request failed");
            return Err(Error::gateway(format!("{url} returned {status}")));
        }

        let body = resp.json::<ApiResponse>().await.map_err(|e| {
            warn!(%url, "undecodable token response: {}", e);
            Error::gateway(format!("undecodable response: {e}"))
        })?;
        if !body.success {
            let reason = body
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "request was not successful".into());
            warn!(%url, %reason, "token request refused");
            return Err(Error::gateway(reason));
        }
        Ok(body)
    }
}

#[async_trait]
impl TokenSource for TokenGateway {
    async fn channel_token(&self, uid: &Uid, channel: &str) -> Result<String> {
        self.channel_token_response(uid, channel).await?.into_token()
    }

    async fn user_token(&self, chat_user: &str) -> Result<String> {
        self.user_token_response(chat_user).await?.into_token()
    }
}

/// Mock token source for testing.
pub mod mock {
    use super::*;
    use crate::helpers::lock;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Issues `"<kind>-<subject>"` tokens and records every request. Uids or
    /// user names added with [`StaticTokens::refuse`] fail with a gateway
    /// error.
    #[derive(Debug, Default)]
    pub struct StaticTokens {
        refused: Mutex<HashSet<String>>,
        refuse_all: AtomicBool,
        requests: Mutex<Vec<String>>,
    }

    impl StaticTokens {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn refuse(&self, subject: impl Into<String>) {
            lock(&self.refused).insert(subject.into());
        }

        pub fn refuse_all(&self, refuse: bool) {
            self.refuse_all.store(refuse, Ordering::SeqCst);
        }

        pub fn requests(&self) -> Vec<String> {
            lock(&self.requests).clone()
        }

        fn issue(&self, kind: &str, subject: String) -> Result<String> {
            lock(&self.requests).push(format!("{kind}:{subject}"));
            if self.refuse_all.load(Ordering::SeqCst) || lock(&self.refused).contains(&subject) {
                return Err(Error::gateway(format!("token refused for {subject}")));
            }
            Ok(format!("{kind}-{subject}"))
        }
    }

    #[async_trait]
    impl TokenSource for StaticTokens {
        async fn channel_token(&self, uid: &Uid, channel: &str) -> Result<String> {
            self.issue(&format!("rtc@{channel}"), uid.to_string())
        }

        async fn user_token(&self, chat_user: &str) -> Result<String> {
            self.issue("chat", chat_user.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> TokenGateway {
        TokenGateway::new(
            &server.uri(),
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_url() {
        let err = TokenGateway::new("not a url", Duration::from_secs(1), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(TokenGateway::new(
            "mailto:ops@example.com",
            Duration::from_secs(1),
            Duration::from_secs(1)
        )
        .is_err());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let gw = TokenGateway::new(
            "https://tokens.example.com/api/",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = gw.endpoint(USER_TOKEN_PATH, &["ana maria"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://tokens.example.com/api/agora/chat/user/ana%20maria"
        );
    }

    #[tokio::test]
    async fn test_app_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agora/chat/app/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": "true",
                "data": "app-token",
                "error": ""
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = gateway(&server).app_token().await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.data.as_deref(), Some("app-token"));
    }

    #[tokio::test]
    async fn test_channel_token_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agora/chat/user/channel"))
            .and(query_param("uid", "4711"))
            .and(query_param("channel", "test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": "rtc-token",
                "error": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = gateway(&server)
            .channel_token(&Uid::Number(4711), "test")
            .await
            .unwrap();
        assert_eq!(token, "rtc-token");
    }

    #[tokio::test]
    async fn test_user_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agora/chat/user/ana"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": "true",
                "data": "chat-token",
                "error": ""
            })))
            .mount(&server)
            .await;

        assert_eq!(gateway(&server).user_token("ana").await.unwrap(), "chat-token");
    }

    #[tokio::test]
    async fn test_http_error_maps_to_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = gateway(&server).app_token().await.unwrap_err();
        assert!(err.is_gateway());
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "data": null,
                "error": "user not found"
            })))
            .mount(&server)
            .await;

        let err = gateway(&server).user_token("ghost").await.unwrap_err();
        assert!(err.to_string().contains("user not found"));
    }

    #[tokio::test]
    async fn test_refused_app_token_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agora/chat/app/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "app disabled"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = gateway(&server).app_token().await.unwrap_err();
        assert!(err.is_gateway());
        assert!(err.to_string().contains("app disabled"));
    }

    #[tokio::test]
    async fn test_refused_envelope_fails_every_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": "false",
                "data": "ignored",
                "error": ""
            })))
            .mount(&server)
            .await;

        let gw = gateway(&server);
        let err = gw
            .channel_token_response(&Uid::Number(7), "test")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not successful"));
        assert!(gw.user_token_response("ana").await.unwrap_err().is_gateway());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        assert!(gateway(&server).app_token().await.unwrap_err().is_gateway());
    }

    #[tokio::test]
    async fn test_empty_user_name_rejected_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(gateway(&server).user_token("").await.is_err());
    }

    #[tokio::test]
    async fn test_static_tokens_refusal() {
        let tokens = mock::StaticTokens::new();
        tokens.refuse("47111");
        assert_eq!(
            tokens.channel_token(&Uid::Number(4711), "test").await.unwrap(),
            "rtc@test-4711"
        );
        assert!(tokens
            .channel_token(&Uid::Number(4711).screen_share(), "test")
            .await
            .is_err());
        assert_eq!(tokens.requests().len(), 2);
    }
}
