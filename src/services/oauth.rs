//! Google OAuth authorization-code flow.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GoogleOAuthConfig;
use crate::models::IdentityAssertion;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent page the browser is redirected to.
    fn authorize_url(&self) -> anyhow::Result<String>;

    /// Trades an authorization code for the identity it vouches for.
    async fn exchange_code(&self, code: &str) -> anyhow::Result<IdentityAssertion>;
}

pub struct GoogleProvider {
    config: GoogleOAuthConfig,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(config: GoogleOAuthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self) -> anyhow::Result<String> {
        anyhow::ensure!(
            self.config.is_configured(),
            "GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set"
        );
        let url = reqwest::Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
            ],
        )
        .context("failed to build Google authorize URL")?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<IdentityAssertion> {
        let token: TokenResponse = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
            ])
            .send()
            .await
            .context("Google token exchange failed")?
            .error_for_status()
            .context("Google token endpoint returned error")?
            .json()
            .await
            .context("failed to parse Google token response")?;

        let info: UserInfo = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("Google userinfo request failed")?
            .error_for_status()
            .context("Google userinfo endpoint returned error")?
            .json()
            .await
            .context("failed to parse Google userinfo")?;

        let email = info.email.context("Google profile has no email")?;
        Ok(IdentityAssertion::new(info.sub, email, info.name, info.picture))
    }
}
