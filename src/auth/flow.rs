//! OAuth Flow Helper
//!
//! Authorization code flow with PKCE (RFC 7636) against the Procore
//! identity provider, plus the client credentials grant for service accounts.

use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::core::{
    DefaultPkceGenerator, HttpMethod, HttpRequest, HttpTransport, PkceGenerator,
    CODE_CHALLENGE_METHOD,
};
use crate::error::{
    create_token_error_from_response, AuthError, ConfigurationError, ProcoreError, ProcoreResult,
    ProtocolError,
};
use crate::types::{AccessToken, ProcoreAuthOptions, TokenResponse};

/// Authorization URL together with the verifier the caller must keep.
#[derive(Clone)]
pub struct AuthorizationUrl {
    pub url: String,
    /// PKCE verifier to pass to [`OAuthFlowHelper::exchange_code_for_token`].
    /// Empty when PKCE is disabled.
    pub code_verifier: String,
    pub state: Option<String>,
}

impl std::fmt::Debug for AuthorizationUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationUrl")
            .field("url", &self.url)
            .field("code_verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// Helper for the interactive OAuth flows.
pub struct OAuthFlowHelper {
    options: ProcoreAuthOptions,
    transport: Arc<dyn HttpTransport>,
    pkce: Box<dyn PkceGenerator>,
}

impl OAuthFlowHelper {
    /// Create new flow helper.
    pub fn new(options: ProcoreAuthOptions, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_pkce_generator(options, transport, Box::new(DefaultPkceGenerator::new()))
    }

    /// Create a flow helper with a custom PKCE generator.
    pub fn with_pkce_generator(
        options: ProcoreAuthOptions,
        transport: Arc<dyn HttpTransport>,
        pkce: Box<dyn PkceGenerator>,
    ) -> Self {
        Self {
            options,
            transport,
            pkce,
        }
    }

    /// Build the URL the user is sent to for consent.
    pub fn generate_authorization_url(&self, state: Option<&str>) -> ProcoreResult<AuthorizationUrl> {
        let mut url = Url::parse(&self.options.authorization_endpoint).map_err(|_| {
            ConfigurationError::InvalidEndpoint {
                url: self.options.authorization_endpoint.clone(),
            }
        })?;

        let state = state.filter(|s| !s.is_empty()).map(str::to_string);
        let mut code_verifier = String::new();

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.options.client_id)
                .append_pair("redirect_uri", &self.options.redirect_uri)
                .append_pair("scope", &self.options.scopes.join(" "));

            if self.options.use_pkce {
                let params = self.pkce.generate();
                query
                    .append_pair("code_challenge", &params.code_challenge)
                    .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);
                code_verifier = params.code_verifier;
            }

            if let Some(state) = &state {
                query.append_pair("state", state);
            }
        }

        debug!(pkce = self.options.use_pkce, "Generated authorization URL");
        Ok(AuthorizationUrl {
            url: url.into(),
            code_verifier,
            state,
        })
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code_for_token(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> ProcoreResult<AccessToken> {
        if code.trim().is_empty() {
            return Err(ProcoreError::invalid_argument(
                "code",
                "Authorization code cannot be empty",
            ));
        }
        if self.options.use_pkce && code_verifier.trim().is_empty() {
            return Err(ProcoreError::invalid_argument(
                "code_verifier",
                "Code verifier cannot be empty",
            ));
        }

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.options.redirect_uri.as_str()),
            ("client_id", self.options.client_id.as_str()),
            ("client_secret", self.options.client_secret.expose_secret().as_str()),
        ];
        if !code_verifier.is_empty() {
            params.push(("code_verifier", code_verifier));
        }

        let token = self.request_token(&params).await?;
        info!("Exchanged authorization code for access token");
        Ok(token)
    }

    /// Obtain a token with the client credentials grant.
    pub async fn client_credentials_token(&self) -> ProcoreResult<AccessToken> {
        let token = self
            .request_token(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.options.client_id.as_str()),
                ("client_secret", self.options.client_secret.expose_secret().as_str()),
            ])
            .await?;
        info!("Obtained client credentials access token");
        Ok(token)
    }

    /// Compare the state returned on the callback with the one sent.
    pub fn validate_state(&self, expected: &str, received: &str) -> ProcoreResult<()> {
        let matches = expected.len() == received.len()
            && expected
                .bytes()
                .zip(received.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0;
        if matches {
            Ok(())
        } else {
            Err(AuthError::StateMismatch.into())
        }
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> ProcoreResult<AccessToken> {
        let request = HttpRequest::new(HttpMethod::Post, &self.options.token_endpoint)
            .header("Accept", "application/json")
            .form(params);

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(create_token_error_from_response(response.status, &response.body));
        }

        let token_response: TokenResponse =
            serde_json::from_str(&response.body).map_err(ProtocolError::from)?;
        token_response.into_access_token(None)
    }
}
