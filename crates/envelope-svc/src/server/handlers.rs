//! Axum request handlers for all service endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, ErrorResponse,
    HealthResponse,
};
use common::ServiceError;
use envelope::{EncryptionContext, ErrorKind};
use tracing::warn;

use super::state::AppState;

/// `POST /encrypt` — encrypt `value` under a fresh data key.
///
/// `null` and `""` are echoed back without contacting the key provider.
pub async fn encrypt(State(state): State<AppState>, Json(req): Json<EncryptRequest>) -> Response {
    let context = req.context.map(EncryptionContext::from);
    match state
        .encryptor
        .encrypt_field(req.value.as_deref(), context.as_ref())
        .await
    {
        Ok(value) => (StatusCode::OK, Json(EncryptResponse { value })).into_response(),
        Err(e) => failure("encrypt", e),
    }
}

/// `POST /decrypt` — recover the plaintext of an envelope token.
///
/// The request must carry the same context the token was encrypted with.
pub async fn decrypt(State(state): State<AppState>, Json(req): Json<DecryptRequest>) -> Response {
    let context = req.context.map(EncryptionContext::from);
    match state
        .encryptor
        .decrypt_field(req.value.as_deref(), context.as_ref())
        .await
    {
        Ok(value) => (StatusCode::OK, Json(DecryptResponse { value })).into_response(),
        Err(e) => failure("decrypt", e),
    }
}

/// `GET /health` — liveness check reporting the key-encrypting key in use.
pub async fn health(State(state): State<AppState>) -> Response {
    let body = HealthResponse {
        status: "ok".into(),
        kek_id: state.encryptor.kek_id().to_string(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn service_error(e: &envelope::Error) -> ServiceError {
    match e.kind() {
        ErrorKind::Format => ServiceError::BadRequest(e.to_string()),
        ErrorKind::Authentication => ServiceError::AuthenticationFailed,
        ErrorKind::Provider => ServiceError::Provider(e.to_string()),
        ErrorKind::Configuration => ServiceError::Internal(e.to_string()),
    }
}

fn failure(operation: &'static str, e: envelope::Error) -> Response {
    let err = service_error(&e);
    warn!(operation, kind = ?e.kind(), error = %e, "request failed");

    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::new(err.code(), err.to_string()))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::router;
    use async_trait::async_trait;
    use axum_test::TestServer;
    use envelope::{
        DataKey, Encryptor, KekId, KekProvider, LocalAeadKeyProvider, PlaintextKey,
        ProviderError,
    };
    use serde_json::{json, Value};
    use std::time::Duration;

    fn server_with(encryptor: Encryptor) -> TestServer {
        let app = router::build(AppState::new(encryptor), Duration::from_secs(30));
        TestServer::new(app).unwrap()
    }

    fn server() -> TestServer {
        server_with(Encryptor::new(
            LocalAeadKeyProvider::new(&[0x42; 32]).unwrap(),
        ))
    }

    async fn encrypt_value(server: &TestServer, body: Value) -> String {
        let resp = server.post("/encrypt").json(&body).await;
        resp.assert_status_ok();
        resp.json::<EncryptResponse>().value.unwrap()
    }

    struct UnavailableKms {
        id: KekId,
    }

    #[async_trait]
    impl KekProvider for UnavailableKms {
        fn id(&self) -> &KekId {
            &self.id
        }

        async fn request_data_key(
            &self,
            _context: Option<&EncryptionContext>,
        ) -> Result<DataKey, envelope::Error> {
            Err(ProviderError::call("generate_data_key", "access denied").into())
        }

        async fn decrypt_data_key(
            &self,
            _wrapped: &[u8],
            _context: Option<&EncryptionContext>,
        ) -> Result<PlaintextKey, envelope::Error> {
            Err(ProviderError::rejected("decrypt", "InvalidCiphertextException").into())
        }
    }

    #[tokio::test]
    async fn round_trip_with_context() {
        let server = server();
        let ctx = json!({"tenant": "acme"});
        let token = encrypt_value(&server, json!({"value": "123-45-6789", "context": ctx})).await;
        assert!(token.starts_with('1'));

        let resp = server
            .post("/decrypt")
            .json(&json!({"value": token, "context": ctx}))
            .await;
        resp.assert_status_ok();
        assert_eq!(
            resp.json::<DecryptResponse>().value.as_deref(),
            Some("123-45-6789")
        );
    }

    #[tokio::test]
    async fn null_and_empty_pass_through() {
        let server = server();
        let resp = server.post("/encrypt").json(&json!({"value": null})).await;
        resp.assert_status_ok();
        assert_eq!(resp.json::<Value>(), json!({"value": null}));

        let resp = server.post("/decrypt").json(&json!({"value": ""})).await;
        resp.assert_status_ok();
        assert_eq!(resp.json::<Value>(), json!({"value": ""}));
    }

    #[tokio::test]
    async fn wrong_context_is_422() {
        let server = server();
        let token = encrypt_value(
            &server,
            json!({"value": "secret", "context": {"tenant": "acme"}}),
        )
        .await;

        let resp = server
            .post("/decrypt")
            .json(&json!({"value": token, "context": {"tenant": "other"}}))
            .await;
        assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = resp.json::<ErrorResponse>();
        assert_eq!(body.code, "authentication_failed");
        assert!(!body.message.contains("other"));
    }

    #[tokio::test]
    async fn unknown_version_is_400() {
        let resp = server()
            .post("/decrypt")
            .json(&json!({"value": "2abc"}))
            .await;
        assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.json::<ErrorResponse>().code, "bad_request");
    }

    #[tokio::test]
    async fn malformed_token_is_400() {
        let resp = server()
            .post("/decrypt")
            .json(&json!({"value": "1!!!not-base64"}))
            .await;
        assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn provider_failure_is_502() {
        let server = server_with(Encryptor::new(UnavailableKms {
            id: KekId::new("arn:aws:kms:us-east-1:111122223333:key/test"),
        }));
        let resp = server.post("/encrypt").json(&json!({"value": "secret"})).await;
        assert_eq!(resp.status_code(), StatusCode::BAD_GATEWAY);
        let body = resp.json::<ErrorResponse>();
        assert_eq!(body.code, "provider_error");
        assert!(!body.message.contains("secret"));
    }

    #[tokio::test]
    async fn kms_rejected_ciphertext_is_422() {
        let token = encrypt_value(&server(), json!({"value": "secret"})).await;
        let kms = server_with(Encryptor::new(UnavailableKms {
            id: KekId::new("arn:aws:kms:us-east-1:111122223333:key/test"),
        }));

        let resp = kms
            .post("/decrypt")
            .json(&json!({"value": token, "context": {"tenant": "other"}}))
            .await;
        assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            resp.json::<ErrorResponse>().code,
            "authentication_failed"
        );
    }

    #[tokio::test]
    async fn legacy_tokens_rejected_by_default() {
        let resp = server()
            .post("/decrypt")
            .json(&json!({"value": "gqF2AQ=="}))
            .await;
        assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_kek_id() {
        let expected = LocalAeadKeyProvider::new(&[0x42; 32]).unwrap();
        let resp = server().get("/health").await;
        resp.assert_status_ok();
        let body = resp.json::<HealthResponse>();
        assert_eq!(body.status, "ok");
        assert_eq!(body.kek_id, expected.id().as_str());
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let resp = server().get("/nope").await;
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(resp.json::<ErrorResponse>().code, "not_found");
    }
}
