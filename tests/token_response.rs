mod common;

use std::time::Duration as StdDuration;

use jsonwebtoken::Algorithm;
use time::Duration;

use kagami::auth::TokenRequest;
use kagami::core::models::ClientConfig;
use kagami::core::types::{AccessTokenType, GrantType, ResponseType};
use kagami::crypto::Crypto;
use kagami::db::MemoryStore;
use kagami::oidc::claim_hash;
use kagami::provider::introspection::Introspector;
use kagami::provider::token::{create_token_response, needs_refresh_token};
use kagami::provider::verifier::AccessTokenVerifier;

use common::*;

async fn counting_provider(client: ClientConfig) -> kagami::provider::OpenIdProvider<CountingStore> {
    provider(CountingStore::new(memory_store(client).await))
}

#[tokio::test]
async fn offline_access_authorization_issues_every_token_and_deletes_once() {
    let client = web_client();
    let provider = counting_provider(client.clone()).await;
    let request = saved(&provider.store().inner, auth_request("openid email offline_access"), "abc").await;

    let response = create_token_response(ISSUER, &request, &client, &provider, true, Some("abc"), None)
        .await
        .unwrap();

    assert!(!response.access_token.is_empty());
    assert!(response.refresh_token.is_some());
    assert!(!response.id_token.is_empty());
    assert_eq!(response.state.as_deref(), Some("xyz"));
    assert!(response.expires_in > 290 && response.expires_in <= 300);
    assert_eq!(provider.store().deletions(), 1);
    assert_eq!(provider.store().signing_key_fetches(), 1);

    let claims = decode_claims(&response.id_token);
    assert_eq!(claims["iss"], ISSUER);
    assert_eq!(claims["sub"], "alice");
    assert_eq!(claims["aud"], serde_json::json!([CLIENT_ID]));
    assert_eq!(claims["azp"], CLIENT_ID);
    assert_eq!(claims["nonce"], "n-0S6_WzA2Mj");
    assert_eq!(claims["acr"], "urn:mace:incommon:iap:silver");
    assert_eq!(claims["amr"], serde_json::json!(["pwd"]));
    assert_eq!(claims["at_hash"], claim_hash(&response.access_token, Algorithm::HS256));
    assert_eq!(claims["c_hash"], claim_hash("abc", Algorithm::HS256));
    // email is a userinfo scope and an access token was issued with it
    assert!(claims.get("email").is_none());
}

#[tokio::test]
async fn refresh_token_needs_offline_access_code_flow_and_grant() {
    let client = web_client();
    let mut no_refresh_grant = web_client();
    no_refresh_grant.grant_types = vec![GrantType::AuthorizationCode];

    let offline = TokenRequest::from(auth_request("openid offline_access"));
    assert!(needs_refresh_token(&offline, &client));
    assert!(!needs_refresh_token(&offline, &no_refresh_grant));
    assert!(!needs_refresh_token(&TokenRequest::from(auth_request("openid")), &client));

    let mut implicit = auth_request("openid offline_access");
    implicit.response_type = ResponseType::IdTokenToken;
    assert!(!needs_refresh_token(&TokenRequest::from(implicit), &client));

    assert!(needs_refresh_token(&TokenRequest::from(refresh_request("openid")), &no_refresh_grant));
}

#[tokio::test]
async fn refresh_request_is_never_deleted_and_carries_no_nonce() {
    let client = web_client();
    let provider = counting_provider(client.clone()).await;
    let request = TokenRequest::from(refresh_request("openid offline_access"));

    let response = create_token_response(ISSUER, &request, &client, &provider, true, None, None)
        .await
        .unwrap();

    assert!(response.refresh_token.is_some());
    assert!(response.state.is_none());
    assert_eq!(provider.store().deletions(), 0);

    let claims = decode_claims(&response.id_token);
    assert!(claims.get("nonce").is_none());
    assert!(claims.get("acr").is_none());
    assert!(claims.get("c_hash").is_none());
}

#[tokio::test]
async fn id_token_only_carries_userinfo_and_no_access_token_hash() {
    let client = web_client();
    let provider = counting_provider(client.clone()).await;
    let request = saved(&provider.store().inner, auth_request("openid email profile"), "abc").await;

    let response = create_token_response(ISSUER, &request, &client, &provider, false, None, None)
        .await
        .unwrap();

    assert!(response.access_token.is_empty());
    assert!(response.refresh_token.is_none());
    assert_eq!(response.expires_in, 0);

    let claims = decode_claims(&response.id_token);
    assert!(claims.get("at_hash").is_none());
    assert!(claims.get("c_hash").is_none());
    assert_eq!(claims["email"], "alice@example.com");
    assert_eq!(claims["name"], "Alice Liddell");

    let body = serde_json::to_value(&response).unwrap();
    assert!(body.get("access_token").is_none());
}

#[tokio::test]
async fn client_may_allow_userinfo_next_to_access_token() {
    let mut client = web_client();
    client.id_token_userinfo_assertion = true;
    let provider = counting_provider(client.clone()).await;
    let request = saved(&provider.store().inner, auth_request("openid email"), "abc").await;

    let response = create_token_response(ISSUER, &request, &client, &provider, true, None, None)
        .await
        .unwrap();

    let claims = decode_claims(&response.id_token);
    assert!(claims.get("at_hash").is_some());
    assert_eq!(claims["email"], "alice@example.com");
}

#[tokio::test]
async fn restricted_id_token_scopes_skip_userinfo_lookup() {
    let mut client = web_client();
    client.id_token_scopes = Some(Vec::new());
    let provider = counting_provider(client.clone()).await;

    let mut request = auth_request("custom");
    request.subject = "nobody".to_string();
    let request = saved(&provider.store().inner, request, "abc").await;

    // "custom" is dropped by the client restriction, so the unknown
    // subject is never looked up.
    let response = create_token_response(ISSUER, &request, &client, &provider, false, None, None)
        .await
        .unwrap();
    let claims = decode_claims(&response.id_token);
    assert!(claims.get("department").is_none());
}

#[tokio::test]
async fn custom_scope_claims_cannot_rebind_id_token_subject() {
    let client = web_client();
    let provider = counting_provider(client.clone()).await;
    let mut profile = alice();
    let custom = profile.scope_claims.get_mut("custom").unwrap();
    custom.insert("sub".to_string(), serde_json::json!("mallory"));
    custom.insert("aud".to_string(), serde_json::json!("evil"));
    custom.insert("iss".to_string(), serde_json::json!("https://evil.example"));
    provider.store().inner.add_user("alice", profile).await;

    let request = saved(&provider.store().inner, auth_request("openid custom"), "abc").await;
    let response = create_token_response(ISSUER, &request, &client, &provider, false, None, None)
        .await
        .unwrap();

    let claims = decode_claims(&response.id_token);
    assert_eq!(claims["sub"], "alice");
    assert_eq!(claims["aud"], serde_json::json!([CLIENT_ID]));
    assert_eq!(claims["iss"], ISSUER);
    assert_eq!(claims["department"], "wonderland");
}

#[tokio::test]
async fn bearer_token_decrypts_to_id_and_subject() {
    let client = web_client();
    let provider = counting_provider(client.clone()).await;
    let request = saved(&provider.store().inner, auth_request("openid"), "abc").await;

    let response = create_token_response(ISSUER, &request, &client, &provider, true, None, None)
        .await
        .unwrap();

    let plaintext = Introspector::crypto(&provider).decrypt(&response.access_token).unwrap();
    let (id, subject) = plaintext.split_once(':').unwrap();
    assert!(!id.is_empty());
    assert_eq!(subject, "alice");
}

#[tokio::test]
async fn jwt_access_token_carries_private_claims() {
    let mut client = web_client();
    client.access_token_type = AccessTokenType::Jwt;
    let provider = counting_provider(client.clone()).await;
    let request = saved(&provider.store().inner, auth_request("openid email custom"), "abc").await;

    let response = create_token_response(ISSUER, &request, &client, &provider, true, None, None)
        .await
        .unwrap();

    let claims = provider
        .access_token_verifier()
        .verify_access_token(&response.access_token)
        .unwrap();
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.client_id.0, CLIENT_ID);
    assert_eq!(claims.private_claims["department"], "wonderland");
    assert!(claims.private_claims.get("email").is_none());

    // one key for the access token, one for the ID token
    assert_eq!(provider.store().signing_key_fetches(), 2);
}

#[tokio::test]
async fn clock_skew_extends_validity() {
    let mut client = web_client();
    client.clock_skew = StdDuration::from_secs(60);
    let provider = counting_provider(client.clone()).await;
    let request = saved(&provider.store().inner, auth_request("openid"), "abc").await;

    let response = create_token_response(ISSUER, &request, &client, &provider, true, None, None)
        .await
        .unwrap();
    assert!(response.expires_in > 350 && response.expires_in <= 360);

    let claims = decode_claims(&response.id_token);
    let lifetime = claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap();
    assert!((3659..=3661).contains(&lifetime));
}

#[tokio::test]
async fn past_expiry_reports_zero_expires_in() {
    let client = web_client();
    let store = MemoryStore::new("pepper".to_string(), signing_key())
        .with_access_token_lifetime(Duration::minutes(-10));
    store.add_user("alice", alice()).await;
    let request = saved(&store, auth_request("openid"), "abc").await;
    let provider = provider(store);

    let response = create_token_response(ISSUER, &request, &client, &provider, true, None, None)
        .await
        .unwrap();
    assert!(!response.access_token.is_empty());
    assert_eq!(response.expires_in, 0);
}

#[tokio::test]
async fn failed_deletion_fails_the_response() {
    let client = web_client();
    let provider = counting_provider(client.clone()).await;
    let request = TokenRequest::from(auth_request("openid"));

    // nothing was saved under this request id
    let result = create_token_response(ISSUER, &request, &client, &provider, true, None, None).await;
    assert!(result.is_err());
    assert_eq!(provider.store().deletions(), 1);
}

#[tokio::test]
async fn rotated_key_applies_to_later_tokens_only() {
    let client = web_client();
    let store = memory_store(client.clone()).await;
    let provider = provider(store);
    let request = TokenRequest::from(refresh_request("openid"));

    let first = create_token_response(ISSUER, &request, &client, &provider, false, None, None)
        .await
        .unwrap();

    provider
        .store()
        .rotate_signing_key(kagami::crypto::SigningKey::new(
            Some("k2".to_string()),
            Algorithm::HS384,
            jsonwebtoken::EncodingKey::from_secret(b"next"),
        ))
        .await;
    let second = create_token_response(ISSUER, &request, &client, &provider, false, None, None)
        .await
        .unwrap();

    assert_eq!(jsonwebtoken::decode_header(&first.id_token).unwrap().kid.as_deref(), Some("k1"));
    let header = jsonwebtoken::decode_header(&second.id_token).unwrap();
    assert_eq!(header.kid.as_deref(), Some("k2"));
    assert_eq!(header.alg, Algorithm::HS384);
}
