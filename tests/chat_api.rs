use actix_web::{test, web, App};
use async_trait::async_trait;
use mapchat_server::auth::handlers::{login, register, verify};
use mapchat_server::chat::handlers::{clear_history, history, send};
use mapchat_server::config::{
    AuthConfig, CreditsConfig, NotifyConfig, RateLimitSettings, ServerConfig, Settings,
    StoreConfig,
};
use mapchat_server::error::AppError;
use mapchat_server::ledger::handlers::balance;
use mapchat_server::{AppState, EchoProvider, Notifier};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

struct CapturingNotifier {
    last_code: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send_otp(&self, _email: &str, code: &str) -> Result<(), AppError> {
        *self.last_code.lock().unwrap() = Some(code.to_string());
        Ok(())
    }
}

struct TestContext {
    state: web::Data<AppState>,
    last_code: Arc<Mutex<Option<String>>>,
    snapshot_path: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        Self::with_settings(|_| {})
    }

    fn with_settings(adjust: impl FnOnce(&mut Settings)) -> Self {
        let snapshot_path =
            std::env::temp_dir().join(format!("mapchat-chat-api-{}.json", Uuid::new_v4()));
        let mut settings = Settings {
            environment: "test".to_string(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                workers: 1,
            },
            store: StoreConfig {
                snapshot_path: snapshot_path.to_string_lossy().into_owned(),
            },
            auth: AuthConfig {
                jwt_secret: "integration_secret".to_string(),
                token_expiry_hours: 1,
                otp_ttl_minutes: 10,
            },
            credits: CreditsConfig {
                signup_bonus: 100,
                chat_cost: 1,
                daily_limit: 50,
            },
            rate_limit: RateLimitSettings {
                max_requests: 10,
                window_seconds: 60,
            },
            notify: NotifyConfig {
                webhook_url: "http://127.0.0.1:9/otp".to_string(),
                timeout_seconds: 1,
            },
        };
        adjust(&mut settings);

        let last_code = Arc::new(Mutex::new(None));
        let notifier = Arc::new(CapturingNotifier {
            last_code: last_code.clone(),
        });
        let state = AppState::with_components(settings, notifier, Arc::new(EchoProvider))
            .expect("Failed to build state");
        Self {
            state: web::Data::new(state),
            last_code,
            snapshot_path,
        }
    }

    fn code(&self) -> String {
        self.last_code
            .lock()
            .unwrap()
            .clone()
            .expect("No verification code was sent")
    }

    fn cleanup(&self) {
        let _ = fs::remove_file(&self.snapshot_path);
    }
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/register", web::post().to(register))
        .route("/auth/verify", web::post().to(verify))
        .route("/auth/login", web::post().to(login))
        .route("/credits", web::get().to(balance))
        .route("/chat", web::post().to(send))
        .route("/chat/history", web::get().to(history))
        .route("/chat/history", web::delete().to(clear_history));
}

#[actix_web::test]
async fn test_chat_round_trip() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "chat@example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;
    let response = test::TestRequest::post()
        .uri("/auth/verify")
        .set_json(json!({
            "email": "chat@example.com",
            "code": ctx.code()
        }))
        .send_request(&app)
        .await;
    let body: serde_json::Value = test::read_body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();

    let response = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"message": "where am I"}))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["message"]["role"], "assistant");
    assert_eq!(body["message"]["content"], "You said: where am I");
    assert_eq!(body["credits"], 99);

    let response = test::TestRequest::get()
        .uri("/chat/history")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = test::read_body_json(response).await;
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");

    let response = test::TestRequest::delete()
        .uri("/chat/history")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);

    let response = test::TestRequest::get()
        .uri("/chat/history")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    let body: serde_json::Value = test::read_body_json(response).await;
    assert!(body.as_array().unwrap().is_empty());

    ctx.cleanup();
}

#[actix_web::test]
async fn test_chat_without_credits_is_payment_required() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

    // Registered but never verified, so the balance is still zero
    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "skint@example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;
    let response = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({
            "email": "skint@example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;
    let body: serde_json::Value = test::read_body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();

    let response = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"message": "hello"}))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 402);

    // The declined message was not stored
    let response = test::TestRequest::get()
        .uri("/chat/history")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    let body: serde_json::Value = test::read_body_json(response).await;
    assert!(body.as_array().unwrap().is_empty());

    ctx.cleanup();
}

#[actix_web::test]
async fn test_chat_rate_limited_after_burst() {
    let ctx = TestContext::with_settings(|settings| {
        settings.rate_limit.max_requests = 2;
    });
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "burst@example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;
    let response = test::TestRequest::post()
        .uri("/auth/verify")
        .set_json(json!({
            "email": "burst@example.com",
            "code": ctx.code()
        }))
        .send_request(&app)
        .await;
    let body: serde_json::Value = test::read_body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();

    for i in 0..2 {
        let response = test::TestRequest::post()
            .uri("/chat")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({"message": format!("message {}", i)}))
            .send_request(&app)
            .await;
        assert_eq!(response.status(), 200);
    }

    let response = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"message": "one too many"}))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 429);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Rate limited"));

    // The throttled request cost nothing
    let response = test::TestRequest::get()
        .uri("/credits")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["credits"], 98);

    ctx.cleanup();
}

#[actix_web::test]
async fn test_chat_daily_cap() {
    let ctx = TestContext::with_settings(|settings| {
        settings.credits.daily_limit = 1;
    });
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "daily@example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;
    let response = test::TestRequest::post()
        .uri("/auth/verify")
        .set_json(json!({
            "email": "daily@example.com",
            "code": ctx.code()
        }))
        .send_request(&app)
        .await;
    let body: serde_json::Value = test::read_body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();

    let response = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"message": "first"}))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);

    let response = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"message": "second"}))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 429);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Daily usage limit"));

    ctx.cleanup();
}

#[actix_web::test]
async fn test_chat_validation_and_auth() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().app_data(ctx.state.clone()).configure(routes)).await;

    let response = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"message": "anonymous"}))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 401);

    test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "strict@example.com",
            "password": "password123"
        }))
        .send_request(&app)
        .await;
    let response = test::TestRequest::post()
        .uri("/auth/verify")
        .set_json(json!({
            "email": "strict@example.com",
            "code": ctx.code()
        }))
        .send_request(&app)
        .await;
    let body: serde_json::Value = test::read_body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();

    let response = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"message": "   "}))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);

    ctx.cleanup();
}
