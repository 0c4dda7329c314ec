//! Social login provider adapters
//!
//! Clients sign in with a provider SDK and hand us the provider access
//! token. We call the provider's user-info endpoint with it and pull a
//! uniform profile out of the provider-specific payload.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const USERINFO_TIMEOUT: Duration = Duration::from_secs(10);

/// Supported social login providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    /// Google
    Google,
    /// Kakao
    Kakao,
    /// Naver
    Naver,
}

impl OAuthProvider {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Kakao => "kakao",
            Self::Naver => "naver",
        }
    }

    /// User-info endpoint
    #[must_use]
    pub fn userinfo_url(&self) -> &'static str {
        match self {
            Self::Google => "https://www.googleapis.com/oauth2/v2/userinfo",
            Self::Kakao => "https://kapi.kakao.com/v2/user/me",
            Self::Naver => "https://openapi.naver.com/v1/nid/me",
        }
    }

    /// Pull a profile out of a user-info payload
    pub fn extract_profile(&self, payload: &Value) -> Result<SocialProfile> {
        let str_at = |path: &[&str]| -> Option<String> {
            let mut node = payload;
            for key in path {
                node = node.get(key)?;
            }
            node.as_str().filter(|s| !s.is_empty()).map(str::to_string)
        };
        let id_at = |key: &str| -> Option<String> {
            match payload.get(key)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };

        let (email, name, avatar, provider_id) = match self {
            Self::Google => (
                str_at(&["email"]),
                str_at(&["name"]),
                str_at(&["picture"]),
                id_at("id"),
            ),
            Self::Kakao => (
                str_at(&["kakao_account", "email"]),
                str_at(&["properties", "nickname"]),
                str_at(&["properties", "profile_image"]),
                id_at("id"),
            ),
            Self::Naver => (
                str_at(&["response", "email"]),
                str_at(&["response", "name"]),
                str_at(&["response", "profile_image"]),
                payload
                    .get("response")
                    .and_then(|r| r.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            ),
        };

        let email = email.ok_or_else(|| {
            Error::OAuth(format!("{} profile has no email", self.as_str()))
        })?;

        Ok(SocialProfile {
            provider: *self,
            provider_id,
            name: name.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string()),
            email,
            avatar,
        })
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "kakao" => Ok(Self::Kakao),
            "naver" => Ok(Self::Naver),
            other => Err(Error::InvalidInput(format!(
                "unsupported provider: {}",
                other
            ))),
        }
    }
}

/// Provider-independent profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialProfile {
    /// Provider that vouched for the profile
    pub provider: OAuthProvider,
    /// Provider-side account id
    pub provider_id: Option<String>,
    /// Verified email
    pub email: String,
    /// Display name
    pub name: String,
    /// Profile image URL
    pub avatar: Option<String>,
}

/// Turns a provider access token into a verified profile
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// Exchange a provider access token for a profile
    async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<SocialProfile>;
}

/// Fetches profiles from provider user-info endpoints
#[derive(Clone)]
pub struct OAuthClient {
    client: Client,
}

impl OAuthClient {
    /// Create a client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(USERINFO_TIMEOUT)
            .build()
            .map_err(|e| Error::OAuth(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProfileFetcher for OAuthClient {
    #[instrument(skip(self, access_token), fields(provider = provider.as_str()))]
    async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<SocialProfile> {
        let response = self
            .client
            .get(provider.userinfo_url())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::OAuth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::OAuth(format!(
                "{} rejected the token: HTTP {}",
                provider.as_str(),
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::OAuth(format!("invalid user info: {}", e)))?;
        debug!("User info fetched");
        provider.extract_profile(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_google_profile() {
        let payload = json!({"id": "1234", "email": "mom@example.com", "name": "Jiwoo", "picture": "https://img/p.png"});
        let p = OAuthProvider::Google.extract_profile(&payload).unwrap();
        assert_eq!(p.email, "mom@example.com");
        assert_eq!(p.name, "Jiwoo");
        assert_eq!(p.avatar.as_deref(), Some("https://img/p.png"));
        assert_eq!(p.provider_id.as_deref(), Some("1234"));
    }

    #[test]
    fn test_kakao_profile_numeric_id() {
        let payload = json!({
            "id": 987654321,
            "kakao_account": {"email": "dad@kakao.com"},
            "properties": {"nickname": "Minho", "profile_image": "http://k/img.jpg"}
        });
        let p = OAuthProvider::Kakao.extract_profile(&payload).unwrap();
        assert_eq!(p.email, "dad@kakao.com");
        assert_eq!(p.name, "Minho");
        assert_eq!(p.provider_id.as_deref(), Some("987654321"));
    }

    #[test]
    fn test_naver_profile_without_name_uses_email_local_part() {
        let payload = json!({"resultcode": "00", "response": {"id": "nv1", "email": "parent@naver.com"}});
        let p = OAuthProvider::Naver.extract_profile(&payload).unwrap();
        assert_eq!(p.name, "parent");
        assert!(p.avatar.is_none());
    }

    #[test]
    fn test_missing_email_is_rejected() {
        let payload = json!({"id": 1, "properties": {"nickname": "x"}});
        assert!(matches!(
            OAuthProvider::Kakao.extract_profile(&payload),
            Err(Error::OAuth(_))
        ));
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("Google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert!("apple".parse::<OAuthProvider>().is_err());
    }
}
