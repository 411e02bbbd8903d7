// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OpenID Connect authorization code flow with PKCE.
//!
//! Provider metadata comes from discovery (`<issuer>/.well-known/openid-configuration`)
//! or from a static document. Per-browser login state lives in this module's
//! own [`SessionTable`], separate from the SSO handshake state.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use openidconnect::core::{
    CoreAuthDisplay, CoreAuthenticationFlow, CoreClaimName, CoreClaimType, CoreClient,
    CoreClientAuthMethod, CoreGenderClaim, CoreGrantType, CoreJsonWebKey, CoreJsonWebKeySet,
    CoreJweContentEncryptionAlgorithm, CoreJweKeyManagementAlgorithm, CoreJwsSigningAlgorithm,
    CoreResponseMode, CoreResponseType, CoreSubjectIdentifierType,
};
use openidconnect::{
    AdditionalClaims, AdditionalProviderMetadata, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, EndpointMaybeSet, EndpointNotSet, EndpointSet, IssuerUrl,
    JsonWebKeySetUrl, Nonce as OidcNonce, OAuth2TokenResponse, PkceCodeChallenge,
    PkceCodeVerifier, ProviderMetadata, RedirectUrl, ResponseTypes, Scope, TokenUrl,
    UserInfoClaims, UserInfoUrl,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::{
    Authentication, AuthorizationResponse, ClaimSet, IdentityError, IdentityProvider,
    LogoutOutcome,
};
use crate::config::BridgeConfig;
use crate::session::{SessionId, SessionTable};

/// ID token claims that describe the token rather than the user.
const PROTOCOL_CLAIMS: &[&str] = &[
    "iss", "aud", "exp", "iat", "nbf", "nonce", "auth_time", "azp", "at_hash", "c_hash", "acr",
    "amr", "sid", "jti",
];

const OPENID_SCOPE: &str = "openid";

/// Discovery fields beyond the core set that the bridge uses.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LogoutProviderMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
}

impl AdditionalProviderMetadata for LogoutProviderMetadata {}

pub type OidcProviderMetadata = ProviderMetadata<
    LogoutProviderMetadata,
    CoreAuthDisplay,
    CoreClientAuthMethod,
    CoreClaimName,
    CoreClaimType,
    CoreGrantType,
    CoreJweContentEncryptionAlgorithm,
    CoreJweKeyManagementAlgorithm,
    CoreJsonWebKey,
    CoreResponseMode,
    CoreResponseType,
    CoreSubjectIdentifierType,
>;

type ProviderClient = CoreClient<
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

/// Provider endpoints given by the operator instead of discovered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

impl StaticProviderMetadata {
    /// Core metadata for an authorization-code provider signing with RS256.
    /// The key set is left empty.
    pub fn to_provider_metadata(&self) -> Result<OidcProviderMetadata, IdentityError> {
        let metadata = OidcProviderMetadata::new(
            IssuerUrl::new(self.issuer.clone()).map_err(invalid_url("issuer"))?,
            AuthUrl::new(self.authorization_endpoint.clone())
                .map_err(invalid_url("authorization_endpoint"))?,
            JsonWebKeySetUrl::new(self.jwks_uri.clone()).map_err(invalid_url("jwks_uri"))?,
            vec![ResponseTypes::new(vec![CoreResponseType::Code])],
            vec![CoreSubjectIdentifierType::Public],
            vec![CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256],
            LogoutProviderMetadata {
                end_session_endpoint: self.end_session_endpoint.clone(),
            },
        );

        let token_endpoint = self
            .token_endpoint
            .clone()
            .map(TokenUrl::new)
            .transpose()
            .map_err(invalid_url("token_endpoint"))?;
        let userinfo_endpoint = self
            .userinfo_endpoint
            .clone()
            .map(UserInfoUrl::new)
            .transpose()
            .map_err(invalid_url("userinfo_endpoint"))?;

        Ok(metadata
            .set_token_endpoint(token_endpoint)
            .set_userinfo_endpoint(userinfo_endpoint))
    }
}

fn invalid_url(field: &'static str) -> impl Fn(url::ParseError) -> IdentityError {
    move |e| IdentityError::Configuration(format!("invalid {field}: {e}"))
}

/// Client registration and per-deployment settings.
#[derive(Debug, Clone)]
pub struct OidcOptions {
    pub client_id: String,
    pub client_secret: String,
    /// Requested in addition to `openid`.
    pub scopes: Vec<String>,
    pub extra_auth_params: BTreeMap<String, String>,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: String,
    pub session_lifetime: Duration,
    pub session_capacity: usize,
}

impl OidcOptions {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            client_id: config.oidc_client_id.clone(),
            client_secret: config.oidc_client_secret.clone(),
            scopes: config
                .oidc_scope
                .iter()
                .filter(|scope| scope.as_str() != OPENID_SCOPE)
                .cloned()
                .collect(),
            extra_auth_params: config.oidc_extra_auth_request_params.clone(),
            redirect_uri: config.redirect_uri(),
            post_logout_redirect_uri: config.logout_redirect_uri(),
            session_lifetime: config.session_lifetime(),
            session_capacity: config.session_capacity,
        }
    }
}

/// Userinfo claims outside the standard set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct ExtraClaims {
    #[serde(flatten)]
    fields: serde_json::Map<String, Value>,
}

impl AdditionalClaims for ExtraClaims {}

#[derive(Debug, Clone)]
struct PendingLogin {
    csrf: String,
    nonce: String,
    pkce_verifier: String,
    return_to: String,
}

#[derive(Debug, Clone)]
enum IdentitySession {
    Pending(PendingLogin),
    Authenticated {
        claims: ClaimSet,
        id_token: Option<String>,
    },
}

pub struct OidcIdentity {
    client: ProviderClient,
    http: reqwest::Client,
    options: OidcOptions,
    end_session_endpoint: Option<String>,
    sessions: SessionTable<IdentitySession>,
}

impl OidcIdentity {
    /// Resolves the provider (discovery or static metadata plus its key set)
    /// and builds the client.
    pub async fn connect(config: &BridgeConfig) -> Result<Self, IdentityError> {
        let http = http_client()?;

        let metadata = match &config.oidc_provider_metadata {
            Some(static_metadata) => {
                let metadata = static_metadata.to_provider_metadata()?;
                let jwks = CoreJsonWebKeySet::fetch_async(metadata.jwks_uri(), &http)
                    .await
                    .map_err(|e| IdentityError::Provider(format!("JWKS fetch failed: {e}")))?;
                info!(issuer = %static_metadata.issuer, "Using static OpenID provider metadata");
                metadata.set_jwks(jwks)
            }
            None => {
                let issuer = IssuerUrl::new(config.oidc_issuer.clone())
                    .map_err(invalid_url("OIDC_ISSUER"))?;
                let metadata = OidcProviderMetadata::discover_async(issuer, &http)
                    .await
                    .map_err(|e| IdentityError::Provider(format!("discovery failed: {e}")))?;
                info!(issuer = %config.oidc_issuer, "Discovered OpenID provider");
                metadata
            }
        };

        Self::with_metadata(metadata, OidcOptions::from_config(config), http)
    }

    pub fn with_metadata(
        metadata: OidcProviderMetadata,
        options: OidcOptions,
        http: reqwest::Client,
    ) -> Result<Self, IdentityError> {
        let end_session_endpoint = metadata.additional_metadata().end_session_endpoint.clone();
        let redirect_uri = RedirectUrl::new(options.redirect_uri.clone())
            .map_err(invalid_url("redirect URI"))?;

        let client = CoreClient::from_provider_metadata(
            metadata,
            ClientId::new(options.client_id.clone()),
            Some(ClientSecret::new(options.client_secret.clone())),
        )
        .set_redirect_uri(redirect_uri);

        Ok(Self {
            client,
            http,
            sessions: SessionTable::new(options.session_capacity, options.session_lifetime),
            options,
            end_session_endpoint,
        })
    }

    async fn fetch_claims(
        &self,
        access_token: openidconnect::AccessToken,
        subject: openidconnect::SubjectIdentifier,
        id_token_claims: ClaimSet,
    ) -> Result<ClaimSet, IdentityError> {
        let Ok(request) = self.client.user_info(access_token, Some(subject)) else {
            debug!("Provider has no userinfo endpoint, using ID token claims");
            return Ok(without_protocol_claims(id_token_claims));
        };

        let userinfo: UserInfoClaims<ExtraClaims, CoreGenderClaim> = request
            .request_async(&self.http)
            .await
            .map_err(|e| IdentityError::Provider(format!("userinfo request failed: {e}")))?;

        to_claim_set(&userinfo)
    }
}

#[async_trait]
impl IdentityProvider for OidcIdentity {
    async fn authenticate(
        &self,
        session: &SessionId,
        return_to: &str,
    ) -> Result<Authentication, IdentityError> {
        if let Some(IdentitySession::Authenticated { claims, .. }) = self.sessions.get(session) {
            return Ok(Authentication::Authenticated(claims));
        }

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            CsrfToken::new_random,
            OidcNonce::new_random,
        );
        for scope in &self.options.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        for (name, value) in &self.options.extra_auth_params {
            request = request.add_extra_param(name.as_str(), value.as_str());
        }
        let (url, csrf, nonce) = request.set_pkce_challenge(pkce_challenge).url();

        self.sessions.insert(
            *session,
            IdentitySession::Pending(PendingLogin {
                csrf: csrf.secret().clone(),
                nonce: nonce.secret().clone(),
                pkce_verifier: pkce_verifier.secret().clone(),
                return_to: return_to.to_string(),
            }),
        );

        Ok(Authentication::Redirect(url.to_string()))
    }

    async fn complete(
        &self,
        session: &SessionId,
        response: AuthorizationResponse,
    ) -> Result<String, IdentityError> {
        let Some(IdentitySession::Pending(pending)) = self.sessions.get(session) else {
            return Err(IdentityError::NoPendingLogin);
        };

        if response.state.as_deref() != Some(pending.csrf.as_str()) {
            return Err(IdentityError::StateMismatch);
        }

        if let Some(error) = response.error {
            let message = match response.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            return Err(IdentityError::Denied(message));
        }

        let code = response.code.ok_or(IdentityError::MissingCode)?;

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .map_err(|e| IdentityError::Configuration(e.to_string()))?
            .set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| IdentityError::Provider(format!("token exchange failed: {e}")))?;

        let id_token = token_response
            .extra_fields()
            .id_token()
            .ok_or_else(|| IdentityError::InvalidToken("no id_token in token response".into()))?;

        let verifier = self.client.id_token_verifier();
        let id_claims = id_token
            .claims(&verifier, &OidcNonce::new(pending.nonce))
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;

        let claims = self
            .fetch_claims(
                token_response.access_token().clone(),
                id_claims.subject().clone(),
                to_claim_set(id_claims)?,
            )
            .await?;

        let id_token_hint = serde_json::to_value(id_token)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string));

        debug!(claims = claims.len(), "OpenID login completed");

        self.sessions.insert(
            *session,
            IdentitySession::Authenticated {
                claims,
                id_token: id_token_hint,
            },
        );

        Ok(pending.return_to)
    }

    async fn logout(&self, session: &SessionId) -> Result<LogoutOutcome, IdentityError> {
        let Some(IdentitySession::Authenticated { id_token, .. }) = self.sessions.remove(session)
        else {
            return Ok(LogoutOutcome::Complete);
        };

        let Some(endpoint) = &self.end_session_endpoint else {
            return Ok(LogoutOutcome::Complete);
        };

        let mut url = Url::parse(endpoint).map_err(invalid_url("end_session_endpoint"))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(hint) = &id_token {
                query.append_pair("id_token_hint", hint);
            }
            query.append_pair("client_id", &self.options.client_id);
            query.append_pair(
                "post_logout_redirect_uri",
                &self.options.post_logout_redirect_uri,
            );
        }

        Ok(LogoutOutcome::Redirect(url.into()))
    }
}

fn http_client() -> Result<reqwest::Client, IdentityError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| IdentityError::Configuration(format!("failed to create HTTP client: {e}")))
}

fn without_protocol_claims(claims: ClaimSet) -> ClaimSet {
    claims
        .into_iter()
        .filter(|(key, _)| !PROTOCOL_CLAIMS.contains(&key.as_str()))
        .collect()
}

fn to_claim_set(claims: &impl Serialize) -> Result<ClaimSet, IdentityError> {
    serde_json::to_value(claims)
        .and_then(serde_json::from_value)
        .map_err(|e| IdentityError::Provider(format!("unreadable claims: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn static_metadata(end_session_endpoint: Option<&str>) -> StaticProviderMetadata {
        StaticProviderMetadata {
            issuer: "https://op.example.com".to_string(),
            authorization_endpoint: "https://op.example.com/a_very_unique_auth".to_string(),
            jwks_uri: "https://op.example.com/jwks".to_string(),
            token_endpoint: Some("https://op.example.com/token".to_string()),
            userinfo_endpoint: None,
            end_session_endpoint: end_session_endpoint.map(str::to_string),
        }
    }

    fn identity(end_session_endpoint: Option<&str>) -> OidcIdentity {
        let config = BridgeConfig {
            oidc_scope: vec!["openid".into(), "profile".into(), "email".into()],
            oidc_extra_auth_request_params: BTreeMap::from([(
                "prompt".to_string(),
                "login".to_string(),
            )]),
            ..BridgeConfig::default()
        };
        let metadata = static_metadata(end_session_endpoint)
            .to_provider_metadata()
            .unwrap();
        OidcIdentity::with_metadata(
            metadata,
            OidcOptions::from_config(&config),
            reqwest::Client::new(),
        )
        .unwrap()
    }

    async fn start_login(identity: &OidcIdentity, session: &SessionId) -> Url {
        match identity.authenticate(session, "/sso/auth").await.unwrap() {
            Authentication::Redirect(url) => Url::parse(&url).unwrap(),
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    fn query(url: &Url) -> BTreeMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[tokio::test]
    async fn authorization_request_targets_configured_provider() {
        let identity = identity(None);
        let url = start_login(&identity, &SessionId::new()).await;
        let params = query(&url);

        assert_eq!(url.host_str(), Some("op.example.com"));
        assert_eq!(url.path(), "/a_very_unique_auth");
        assert_eq!(params["client_id"], "dummy_client_id");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid profile email");
        assert_eq!(params["prompt"], "login");
        assert_eq!(
            params["redirect_uri"],
            "https://discourse-sso.example.com/redirect_uri"
        );
        assert_eq!(params["code_challenge_method"], "S256");
        assert!(params.contains_key("state"));
        assert!(params.contains_key("nonce"));
    }

    #[tokio::test]
    async fn callback_without_login_is_rejected() {
        let err = identity(None)
            .complete(&SessionId::new(), AuthorizationResponse::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NoPendingLogin));
    }

    #[tokio::test]
    async fn callback_with_foreign_state_is_rejected() {
        let identity = identity(None);
        let session = SessionId::new();
        start_login(&identity, &session).await;

        let err = identity
            .complete(
                &session,
                AuthorizationResponse {
                    code: Some("code".into()),
                    state: Some("forged".into()),
                    ..AuthorizationResponse::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::StateMismatch));
    }

    #[tokio::test]
    async fn provider_error_is_reported() {
        let identity = identity(None);
        let session = SessionId::new();
        let state = query(&start_login(&identity, &session).await)["state"].clone();

        let err = identity
            .complete(
                &session,
                AuthorizationResponse {
                    state: Some(state.clone()),
                    error: Some("access_denied".into()),
                    error_description: Some("user cancelled".into()),
                    ..AuthorizationResponse::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "identity provider refused the login: access_denied: user cancelled"
        );

        let err = identity
            .complete(
                &session,
                AuthorizationResponse {
                    state: Some(state),
                    ..AuthorizationResponse::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::MissingCode));
    }

    #[tokio::test]
    async fn authenticated_session_returns_claims() {
        let identity = identity(None);
        let session = SessionId::new();
        let claims: ClaimSet = serde_json::from_value(json!({"sub": "john_doe"})).unwrap();
        identity.sessions.insert(
            session,
            IdentitySession::Authenticated {
                claims: claims.clone(),
                id_token: None,
            },
        );

        assert_eq!(
            identity.authenticate(&session, "/sso/auth").await.unwrap(),
            Authentication::Authenticated(claims)
        );
    }

    #[tokio::test]
    async fn logout_redirects_to_end_session_endpoint() {
        let identity = identity(Some("https://op.example.com/logout"));
        let session = SessionId::new();
        identity.sessions.insert(
            session,
            IdentitySession::Authenticated {
                claims: ClaimSet::new(),
                id_token: Some("header.payload.signature".into()),
            },
        );

        let LogoutOutcome::Redirect(url) = identity.logout(&session).await.unwrap() else {
            panic!("expected redirect");
        };
        let url = Url::parse(&url).unwrap();
        let params = query(&url);
        assert_eq!(url.path(), "/logout");
        assert_eq!(params["id_token_hint"], "header.payload.signature");
        assert_eq!(params["client_id"], "dummy_client_id");
        assert_eq!(
            params["post_logout_redirect_uri"],
            "https://discourse-sso.example.com/logout"
        );

        assert_eq!(
            identity.logout(&session).await.unwrap(),
            LogoutOutcome::Complete
        );
    }

    #[tokio::test]
    async fn logout_without_end_session_endpoint_completes() {
        let identity = identity(None);
        let session = SessionId::new();
        identity.sessions.insert(
            session,
            IdentitySession::Authenticated {
                claims: ClaimSet::new(),
                id_token: None,
            },
        );

        assert_eq!(
            identity.logout(&session).await.unwrap(),
            LogoutOutcome::Complete
        );
        assert!(matches!(
            identity.authenticate(&session, "/").await.unwrap(),
            Authentication::Redirect(_)
        ));
    }

    #[test]
    fn malformed_static_metadata_is_a_configuration_error() {
        let mut metadata = static_metadata(None);
        metadata.authorization_endpoint = "not a url".into();
        assert!(matches!(
            metadata.to_provider_metadata(),
            Err(IdentityError::Configuration(_))
        ));
    }

    #[test]
    fn id_token_fallback_drops_protocol_claims() {
        let claims: ClaimSet = serde_json::from_value(json!({
            "iss": "https://op.example.com",
            "nonce": "n",
            "sub": "john_doe",
            "email": "john_doe@example.com",
        }))
        .unwrap();
        let kept = without_protocol_claims(claims);
        assert_eq!(kept.keys().collect::<Vec<_>>(), vec!["email", "sub"]);
    }
}
