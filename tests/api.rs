use axum::body::Body;
use axum::extract::Path;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use campus_safety::config::AppConfig;
use campus_safety::db::Database;
use campus_safety::{bootstrap_admin, handlers, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@astu.edu.et";
const ADMIN_PASSWORD: &str = "admin-pass";

/// Voyage stand-in: texts mentioning "fire" point one way, everything else the other.
async fn mock_embeddings(Json(body): Json<Value>) -> Json<Value> {
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let text = text.as_str().unwrap_or_default().to_lowercase();
            let embedding = if text.contains("fire") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            };
            json!({ "embedding": embedding, "index": index })
        })
        .collect();
    Json(json!({ "data": data }))
}

const REJECTED_KEY: &str = "revoked-key";

/// Gemini stand-in. Echoes a canned answer, or a report tag when asked to report.
async fn mock_generate(
    Path(_model): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("x-goog-api-key").is_some_and(|k| k == REJECTED_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "code": 401, "message": "API key not valid", "status": "UNAUTHENTICATED" } })),
        );
    }
    let contents = body["contents"].as_array().cloned().unwrap_or_default();
    let prompt = contents
        .last()
        .and_then(|c| c["parts"][0]["text"].as_str())
        .unwrap_or_default()
        .to_string();
    let text = if prompt.contains("Student Question: I want to report") {
        "Thank you.\n[REPORT_FINALIZED: Security|Theft|Dorm Block 5|Laptop stolen|High]".to_string()
    } else if prompt.contains("Relevant Information from Campus Safety Documents") {
        format!("Based on campus documents: evacuate. (turns: {})", contents.len())
    } else {
        format!("Please contact campus security. (turns: {})", contents.len())
    };
    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        })),
    )
}

async fn spawn_mock_upstream() -> String {
    let app = Router::new()
        .route("/v1/embeddings", post(mock_embeddings))
        .route("/v1beta/models/{model}", post(mock_generate));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn test_app_with(configure: impl FnOnce(&mut AppConfig)) -> Router {
    let upstream = spawn_mock_upstream().await;
    let mut config = AppConfig {
        jwt_secret: "test-secret".into(),
        voyage_api_key: Some("voyage-test".into()),
        voyage_base_url: upstream.clone(),
        gemini_api_key: Some("gemini-test".into()),
        gemini_base_url: upstream,
        admin_email: Some(ADMIN_EMAIL.into()),
        admin_password: Some(ADMIN_PASSWORD.into()),
        ..AppConfig::default()
    };
    configure(&mut config);
    let db = Database::open_in_memory().unwrap();
    bootstrap_admin(&db, &config).unwrap();
    handlers::router(AppState::new(db, config))
}

async fn test_app() -> Router {
    test_app_with(|_| {}).await
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn signup(app: &Router, name: &str, email: &str) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "name": name, "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn upload(app: &Router, token: &str, title: &str, content: &str, category: &str) -> Value {
    let (status, body) = call(
        app,
        "POST",
        "/api/chat/upload/text",
        Some(token),
        Some(json!({ "title": title, "content": content, "category": category, "tags": ["campus"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["document"].clone()
}

#[tokio::test]
async fn health_status_and_unknown_route() {
    let app = test_app().await;

    let (status, body) = call(&app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = call(&app, "GET", "/api/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["generation"], true);

    let (status, body) = call(&app, "GET", "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Route /api/nope not found");
}

#[tokio::test]
async fn framework_rejections_use_the_error_envelope() {
    let app = test_app().await;

    let (status, body) = call(&app, "PUT", "/api/chat/ask", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Method PUT not allowed on /api/chat/ask");

    let (status, body) = call(&app, "DELETE", "/", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);

    // JSON sent to the multipart endpoint
    let admin = admin_token(&app).await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/chat/upload/file",
        Some(&admin),
        Some(json!({ "title": "Not a form" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn signup_login_and_me() {
    let app = test_app().await;
    let token = signup(&app, "Dawit Bekele", "Dawit@ASTU.edu.et").await;

    let (status, body) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let user = &body["data"]["user"];
    assert_eq!(user["email"], "dawit@astu.edu.et");
    assert_eq!(user["role"], "student");
    assert!(user.get("passwordHash").is_none());

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "name": "Other", "email": "dawit@astu.edu.et", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists with this email");

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "dawit@astu.edu.et", "password": "wrong-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@astu.edu.et", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": " DAWIT@astu.edu.et ", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["token"].as_str().is_some());
}

#[tokio::test]
async fn signup_validation_errors_are_listed() {
    let app = test_app().await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "name": "", "email": "not-an-email", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn privileged_signup_is_downgraded_unless_allowed() {
    let app = test_app().await;
    let (_, body) = call(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "name": "Eve", "email": "eve@astu.edu.et", "password": "secret1", "role": "admin" })),
    )
    .await;
    assert_eq!(body["data"]["user"]["role"], "student");

    let app = test_app_with(|c| c.allow_privileged_signup = true).await;
    let (_, body) = call(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "name": "Sara", "email": "sara@astu.edu.et", "password": "secret1", "role": "staff" })),
    )
    .await;
    assert_eq!(body["data"]["user"]["role"], "staff");
}

#[tokio::test]
async fn token_problems_are_rejected() {
    let app = test_app().await;

    let (status, body) = call(&app, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized, no token provided");

    let (status, body) = call(&app, "GET", "/api/auth/me", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized, token failed");

    let expired = campus_safety::auth::issue_token("someone", "test-secret", -1).unwrap();
    let (status, body) = call(&app, "GET", "/api/auth/me", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token expired, please login again");
}

#[tokio::test]
async fn profile_update_rejects_taken_email() {
    let app = test_app().await;
    let token = signup(&app, "Hana", "hana@astu.edu.et").await;
    signup(&app, "Lulit", "lulit@astu.edu.et").await;

    let (status, body) = call(
        &app,
        "PUT",
        "/api/auth/profile",
        Some(&token),
        Some(json!({ "email": "lulit@astu.edu.et" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");

    let (status, body) = call(
        &app,
        "PUT",
        "/api/auth/profile",
        Some(&token),
        Some(json!({ "name": "Hana T." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["name"], "Hana T.");
    assert_eq!(body["data"]["user"]["email"], "hana@astu.edu.et");
}

#[tokio::test]
async fn only_editors_manage_documents() {
    let app = test_app().await;
    let student = signup(&app, "Student", "student@astu.edu.et").await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/chat/upload/text",
        Some(&student),
        Some(json!({ "title": "Fire Safety", "content": "Use the stairs during a fire." })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "User role 'student' is not authorized to access this route"
    );

    let admin = admin_token(&app).await;
    let doc = upload(&app, &admin, "Fire Safety", "Use the stairs during a fire.", "emergency").await;
    assert_eq!(doc["chunkCount"], 1);
    assert_eq!(doc["embeddedChunks"], 1);

    let id = doc["id"].as_str().unwrap();
    let (status, _) = call(&app, "DELETE", &format!("/api/chat/documents/{id}"), Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "DELETE", &format!("/api/chat/documents/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "GET", &format!("/api/chat/documents/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_validation() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/chat/upload/text",
        Some(&admin),
        Some(json!({ "title": "ok title", "content": "long enough content", "category": "gossip" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0], "Invalid category");
}

#[tokio::test]
async fn embedding_outage_keeps_document_without_vectors() {
    let app = test_app_with(|c| c.voyage_base_url = "http://127.0.0.1:9".into()).await;
    let admin = admin_token(&app).await;
    let doc = upload(&app, &admin, "Clinic Hours", "The clinic opens at 8am daily.", "resource").await;
    assert_eq!(doc["chunkCount"], 1);
    assert_eq!(doc["embeddedChunks"], 0);
}

#[tokio::test]
async fn documents_paginate_and_filter() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    for i in 0..3 {
        upload(&app, &admin, &format!("Policy {i}"), "Campus policy text body.", "policy").await;
    }
    upload(&app, &admin, "Fire Drill", "Fire drills happen each term.", "emergency").await;

    let (status, body) = call(&app, "GET", "/api/chat/documents?limit=3&page=2", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"], json!({ "total": 4, "page": 2, "pages": 2 }));
    let docs = body["data"]["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["title"], "Policy 0");
    assert!(docs[0].get("content").is_none());

    let (_, body) = call(&app, "GET", "/api/chat/documents?category=emergency", Some(&admin), None).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);

    let (_, body) = call(&app, "GET", "/api/chat/documents?search=drill", Some(&admin), None).await;
    assert_eq!(body["data"]["documents"][0]["title"], "Fire Drill");

    let (status, _) = call(&app, "GET", "/api/chat/documents", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn viewing_a_document_counts_views() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let doc = upload(&app, &admin, "Emergency Numbers", "Security desk: 911 on campus.", "emergency").await;
    let id = doc["id"].as_str().unwrap();
    call(&app, "GET", &format!("/api/chat/documents/{id}"), Some(&admin), None).await;
    let (_, body) = call(&app, "GET", &format!("/api/chat/documents/{id}"), Some(&admin), None).await;
    assert_eq!(body["data"]["document"]["viewCount"], 2);
    assert_eq!(body["data"]["document"]["content"], "Security desk: 911 on campus.");
}

#[tokio::test]
async fn file_upload_accepts_text_files() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let boundary = "X-BOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\nsafety\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"tags\"\r\n\r\nlabs, chemicals\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"lab-rules.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nWear goggles in every chemistry lab.\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat/upload/file")
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let doc = &body["data"]["document"];
    assert_eq!(doc["title"], "lab-rules");
    assert_eq!(doc["fileType"], "txt");
    assert_eq!(doc["category"], "safety");
    assert_eq!(doc["tags"], json!(["labs", "chemicals"]));
}

#[tokio::test]
async fn file_upload_rejects_other_types() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let boundary = "X-BOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"map.png\"\r\n\
         Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat/upload/file")
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only .pdf and .txt files are supported");
}

#[tokio::test]
async fn ask_retrieves_sources_and_keeps_history() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    upload(&app, &admin, "Fire Safety", "During a fire use the stairs, never the lift.", "emergency").await;
    upload(&app, &admin, "Library Hours", "The library opens at 8am on weekdays.", "resource").await;

    let student = signup(&app, "Student", "student@astu.edu.et").await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/chat/ask",
        Some(&student),
        Some(json!({ "question": "What should I do in a fire?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert!(data["answer"].as_str().unwrap().starts_with("Based on campus documents"));
    let sources = data["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["title"], "Fire Safety");
    assert!(data.get("report").is_none());

    let conversation_id = data["conversationId"].as_str().unwrap().to_string();
    let (status, body) = call(
        &app,
        "POST",
        "/api/chat/ask",
        Some(&student),
        Some(json!({ "question": "And if the stairs are blocked by fire?", "conversationId": conversation_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // two prior turns plus the new prompt
    assert!(body["data"]["answer"].as_str().unwrap().contains("(turns: 3)"));

    let (_, body) = call(
        &app,
        "GET",
        &format!("/api/chat/conversations/{conversation_id}/messages"),
        Some(&student),
        None,
    )
    .await;
    let roles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["user", "model", "user", "model"]);

    // another user cannot read or continue it
    let other = signup(&app, "Other", "other@astu.edu.et").await;
    let (status, _) = call(
        &app,
        "GET",
        &format!("/api/chat/conversations/{conversation_id}/messages"),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, "GET", "/api/chat/conversations", Some(&student), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn ask_validates_question() {
    let app = test_app().await;
    let student = signup(&app, "Student", "student@astu.edu.et").await;
    let (status, body) = call(&app, "POST", "/api/chat/ask", Some(&student), Some(json!({ "question": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide a question");

    let long = "q".repeat(1001);
    let (status, body) = call(&app, "POST", "/api/chat/ask", Some(&student), Some(json!({ "question": long }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Question is too long (max 1000 characters)");
}

async fn assert_nothing_persisted(app: &Router, token: &str) {
    let (_, body) = call(app, "GET", "/api/chat/conversations", Some(token), None).await;
    assert_eq!(body["data"], json!([]));
    let (_, body) = call(app, "GET", "/api/reports", Some(token), None).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn ask_without_generation_key_is_a_gateway_error() {
    let app = test_app_with(|c| c.gemini_api_key = None).await;
    let student = signup(&app, "Student", "student@astu.edu.et").await;
    for _ in 0..3 {
        let (status, body) = call(
            &app,
            "POST",
            "/api/chat/ask",
            Some(&student),
            Some(json!({ "question": "Where is the clinic?" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "Gemini API key is invalid or missing");
    }
    assert_nothing_persisted(&app, &student).await;
}

#[tokio::test]
async fn ask_with_rejected_key_persists_nothing() {
    let app = test_app_with(|c| c.gemini_api_key = Some(REJECTED_KEY.into())).await;
    let student = signup(&app, "Student", "student@astu.edu.et").await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/chat/ask",
        Some(&student),
        Some(json!({ "question": "I want to report a stolen laptop" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["message"], "Gemini API key is invalid or missing");
    assert_nothing_persisted(&app, &student).await;
}

#[tokio::test]
async fn ask_falls_back_when_generation_is_down() {
    let app = test_app_with(|c| c.gemini_base_url = "http://127.0.0.1:9".into()).await;
    let student = signup(&app, "Student", "student@astu.edu.et").await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/chat/ask",
        Some(&student),
        Some(json!({ "question": "Where is the clinic?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["answer"], campus_safety::rag::FALLBACK_ANSWER);
}

#[tokio::test]
async fn chat_report_tag_files_a_report() {
    let app = test_app().await;
    let student = signup(&app, "Student", "student@astu.edu.et").await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/chat/ask",
        Some(&student),
        Some(json!({ "question": "I want to report a stolen laptop" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    let answer = data["answer"].as_str().unwrap();
    assert!(!answer.contains("REPORT_FINALIZED"));
    assert!(answer.contains("securely registered"));
    assert_eq!(data["report"]["category"], "Theft");
    assert_eq!(data["report"]["priority"], "high");
    assert_eq!(data["report"]["status"], "open");

    let (_, body) = call(&app, "GET", "/api/reports", Some(&student), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reports_are_scoped_and_managed_by_staff() {
    let app = test_app().await;
    let alice = signup(&app, "Alice", "alice@astu.edu.et").await;
    let bob = signup(&app, "Bob", "bob@astu.edu.et").await;
    let admin = admin_token(&app).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/reports",
        Some(&alice),
        Some(json!({
            "type": "maintenance",
            "category": "Plumbing",
            "location": "Block C",
            "description": "Leaking pipe",
            "priority": "critical"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["kind"], "maintenance");

    let (status, body) = call(&app, "POST", "/api/reports", Some(&bob), Some(json!({ "category": "Theft" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);

    let (status, _) = call(&app, "GET", &format!("/api/reports/{id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = call(&app, "GET", "/api/reports", Some(&bob), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = call(
        &app,
        "PATCH",
        &format!("/api/reports/{id}/status"),
        Some(&alice),
        Some(json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = call(&app, "GET", "/api/reports/stats", Some(&admin), None).await;
    assert_eq!(body["data"]["urgent"], 1);

    let (status, body) = call(
        &app,
        "PATCH",
        &format!("/api/reports/{id}/status"),
        Some(&admin),
        Some(json!({ "status": "in_review" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_review");

    let (_, body) = call(&app, "GET", "/api/reports?status=in_review", Some(&admin), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn deactivated_accounts_lose_access() {
    let app = test_app().await;
    let admin = admin_token(&app).await;
    let token = signup(&app, "Temp", "temp@astu.edu.et").await;

    let (_, body) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    let user_id = body["data"]["user"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        "PATCH",
        &format!("/api/users/{user_id}/active"),
        Some(&token),
        Some(json!({ "isActive": false })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "PATCH",
        &format!("/api/users/{user_id}/active"),
        Some(&admin),
        Some(json!({ "isActive": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User account is deactivated");

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "temp@astu.edu.et", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Your account has been deactivated");
}
