use actix_web::{web, HttpResponse};

use crate::auth::{LoginRequest, NewStaffAccount, Principal, RegisterCustomer};
use crate::error::AppResult;
use crate::state::AppState;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/register", web::post().to(register))
        .route("/auth/login", web::post().to(login))
        .route("/auth/me", web::get().to(me))
        .route("/users", web::post().to(create_staff));
}

async fn register(state: web::Data<AppState>, body: web::Json<RegisterCustomer>) -> AppResult<HttpResponse> {
    let customer = state.auth.register(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(customer))
}

async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> AppResult<HttpResponse> {
    let response = state.auth.login(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn me(principal: Principal) -> HttpResponse {
    HttpResponse::Ok().json(principal)
}

async fn create_staff(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<NewStaffAccount>,
) -> AppResult<HttpResponse> {
    let account = state.auth.create_staff(&principal, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(account))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{json, Value};

    use crate::api::testing::{self, test_app};

    #[actix_web::test]
    async fn test_register_login_me() {
        let (state, _) = testing::state();
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "name": "Maria",
                "email": "maria@example.com",
                "password": "correct-horse"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": "maria@example.com", "password": "correct-horse" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["tokenType"], "Bearer");
        assert_eq!(body["user"]["role"], "CUSTOMER");
        let token = body["accessToken"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let me: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(me["email"], "maria@example.com");
    }

    #[actix_web::test]
    async fn test_duplicate_registration_is_conflict() {
        let (state, _) = testing::state();
        let app = test_app!(state);
        let body = json!({ "name": "Ana", "email": "ana@example.com", "password": "long-enough" });

        let first = test::TestRequest::post().uri("/api/auth/register").set_json(&body).to_request();
        assert_eq!(test::call_service(&app, first).await.status(), StatusCode::CREATED);

        let second = test::TestRequest::post().uri("/api/auth/register").set_json(&body).to_request();
        let resp = test::call_service(&app, second).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let payload: Value = test::read_body_json(resp).await;
        assert_eq!(payload["errorCode"], "DUPLICATE_RESOURCE");
        assert_eq!(payload["path"], "/api/auth/register");
    }

    #[actix_web::test]
    async fn test_login_failures_look_identical() {
        let (state, _) = testing::state();
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "name": "Bia", "email": "bia@example.com", "password": "long-enough" }))
            .to_request();
        test::call_service(&app, req).await;

        let mut payloads = Vec::new();
        for (email, password) in [("bia@example.com", "wrong-password"), ("nobody@example.com", "long-enough")] {
            let req = test::TestRequest::post()
                .uri("/api/auth/login")
                .set_json(json!({ "email": email, "password": password }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            let payload: Value = test::read_body_json(resp).await;
            payloads.push((payload["message"].clone(), payload["errorCode"].clone()));
        }
        assert_eq!(payloads[0], payloads[1]);
        assert_eq!(payloads[0].1, "AUTH_INVALID_CREDENTIALS");
    }

    #[actix_web::test]
    async fn test_missing_token_and_bad_body() {
        let (state, _) = testing::state();
        let app = test_app!(state);

        let req = test::TestRequest::get().uri("/api/auth/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let payload: Value = test::read_body_json(resp).await;
        assert_eq!(payload["errorCode"], "AUTH_INVALID_TOKEN");

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let payload: Value = test::read_body_json(resp).await;
        assert_eq!(payload["errorCode"], "VALIDATION_ERROR");
        assert_eq!(payload["path"], "/api/auth/register");
    }
}
