mod common;

use actix_web::http::header;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use common::{bearer, test_state};
use jurisdoc_server::auth::model::TokenResponse;
use jurisdoc_server::configure_api;

#[actix_web::test]
async fn test_setup_mode_then_regular_login() {
    let state = test_state();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_api),
    )
    .await;

    // Wrong bootstrap password
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "admin", "password": "wrong"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    // Bootstrap login while no user exists
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "admin", "password": "admin123"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let setup: TokenResponse = test::read_body_json(resp).await;
    assert!(setup.setup_mode);
    assert_eq!(setup.token_type, "Bearer");

    // The setup session may create the first admin
    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .insert_header((
            header::AUTHORIZATION,
            format!("Bearer {}", setup.access_token),
        ))
        .set_json(json!({
            "username": "dra.ana",
            "password": "segredo-forte",
            "display_name": "Dra. Ana",
            "is_admin": true
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let user: Value = test::read_body_json(resp).await;
    assert_eq!(user["username"], "dra.ana");
    assert_eq!(user["is_admin"], true);
    assert!(user.get("password_hash").is_none());

    // Setup mode is over
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "admin", "password": "admin123"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({"refresh_token": setup.refresh_token}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    // Regular login
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "dra.ana", "password": "segredo-forte"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let tokens: TokenResponse = test::read_body_json(resp).await;
    assert!(!tokens.setup_mode);

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header((
            header::AUTHORIZATION,
            format!("Bearer {}", tokens.access_token),
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["username"], "dra.ana");
    assert_eq!(me["is_admin"], true);

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({"refresh_token": tokens.refresh_token.clone()}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let refreshed: TokenResponse = test::read_body_json(resp).await;
    assert_eq!(refreshed.refresh_token, tokens.refresh_token);
}

#[actix_web::test]
async fn test_wrong_password_is_401() {
    let state = test_state();
    let admin = bearer(&state, true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .insert_header((header::AUTHORIZATION, admin))
        .set_json(json!({"username": "joao", "password": "senha-do-joao"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "joao", "password": "outra-senha"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "ninguem", "password": "senha-do-joao"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_create_user_rules() {
    let state = test_state();
    let admin = bearer(&state, true);
    let user = bearer(&state, false);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .insert_header((header::AUTHORIZATION, user))
        .set_json(json!({"username": "maria", "password": "senha-longa"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .set_json(json!({"username": "maria", "password": "senha-longa"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .insert_header((header::AUTHORIZATION, admin.clone()))
        .set_json(json!({"username": "maria", "password": "curta"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .insert_header((header::AUTHORIZATION, admin.clone()))
        .set_json(json!({"username": "maria", "password": "senha-longa"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["is_admin"], false);

    let req = test::TestRequest::post()
        .uri("/api/auth/users")
        .insert_header((header::AUTHORIZATION, admin))
        .set_json(json!({"username": "maria", "password": "outra-senha"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
}

#[actix_web::test]
async fn test_access_token_cannot_refresh() {
    let state = test_state();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "admin", "password": "admin123"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let setup: TokenResponse = test::read_body_json(resp).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({"refresh_token": setup.access_token}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({"refresh_token": setup.refresh_token}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let refreshed: TokenResponse = test::read_body_json(resp).await;
    assert!(refreshed.setup_mode);
}
