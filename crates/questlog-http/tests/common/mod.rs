#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use questlog_core::{ApiUrl, MemoryStorage};
use questlog_http::{Client, ClientConfig};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// API URL pointing at the mock server.
pub fn api_url(server: &MockServer) -> ApiUrl {
    // http is only accepted for loopback hosts
    ApiUrl::new(&format!("http://127.0.0.1:{}", server.address().port())).unwrap()
}

/// A client backed by in-memory storage the test can inspect.
pub fn client(server: &MockServer) -> (Client, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let client = Client::new(ClientConfig::new(api_url(server)), storage.clone()).unwrap();
    (client, storage)
}

/// Accept amy/secret and hand out the given pair.
pub async fn mount_login(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "amy", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": access,
            "refreshToken": refresh
        })))
        .mount(server)
        .await;
}

/// A signed-looking token carrying `claims`. The signature is not checked client side.
pub fn jwt(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}
