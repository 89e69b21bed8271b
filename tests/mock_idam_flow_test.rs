//! Full sign-in journey in mock mode: the app discovers the mock provider
//! it hosts itself, and a browser-like client walks login, callback,
//! dashboard, and logout.

use finrem_citizen_ui::build_router;
use finrem_citizen_ui::middleware::AppConfig;
use finrem_citizen_ui::oidc::OidcConfig;
use finrem_citizen_ui::session::MemoryStore;

async fn spawn_app() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");

    let issuer = format!("{base}/mock-idam").parse().unwrap();
    let config = AppConfig::new(
        OidcConfig::new(issuer, "finrem-citizen-ui", "mock-idam-secret"),
        "test-session-secret",
    )
    .with_secure_cookies(false)
    .with_mock_idam(true);

    let app = build_router(&config, MemoryStore::new()).unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

#[tokio::test]
async fn anonymous_visit_lands_on_the_mock_sign_in_form() {
    let base = spawn_app().await;
    let client = browser();

    let response = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.url().path().starts_with("/mock-idam/login"));
    let body = response.text().await.unwrap();
    assert!(body.contains("Sign in"));
}

#[tokio::test]
async fn full_sign_in_journey_through_the_mock_provider() {
    let base = spawn_app().await;
    let client = browser();

    // Landing on the form captures client_id and redirect_uri for the POST.
    let form_page = client.get(format!("{base}/login")).send().await.unwrap();
    assert!(form_page.url().path().starts_with("/mock-idam/login"));

    let response = client
        .post(format!("{base}/mock-idam/authenticate"))
        .form(&[
            ("email", "test-cred@hmcts.org"),
            ("password", "anything"),
            ("client_id", "finrem-citizen-ui"),
            ("redirect_uri", &format!("{base}/oauth2/callback")),
            ("state", ""),
        ])
        .send()
        .await
        .unwrap();

    // Redirected through the callback to the home page.
    assert_eq!(response.status(), 200);
    assert_eq!(response.url().path(), "/");
    let body = response.text().await.unwrap();
    assert!(body.contains("Test Cred"));

    // The session now opens the dashboard.
    let dashboard = client
        .get(format!("{base}/task-list-upload-dashboard"))
        .send()
        .await
        .unwrap();
    assert_eq!(dashboard.status(), 200);
    let html = dashboard.text().await.unwrap();
    assert!(html.contains("Documents to submit before your hearing on 28 January 2026"));
    assert!(html.contains("Hearing bundle"));

    // Logout walks the mock end-session endpoint back to an anonymous
    // landing, which bounces to the sign-in form again.
    let logout = client.get(format!("{base}/logout")).send().await.unwrap();
    assert_eq!(logout.status(), 200);
    assert!(logout.url().path().starts_with("/mock-idam/login"));
}

#[tokio::test]
async fn wrong_credentials_re_render_the_form_with_an_error() {
    let base = spawn_app().await;
    let client = browser();

    let response = client
        .post(format!("{base}/mock-idam/authenticate"))
        .form(&[
            ("email", "intruder@example.com"),
            ("password", "guess"),
            ("client_id", "finrem-citizen-ui"),
            ("redirect_uri", &format!("{base}/oauth2/callback")),
            ("state", ""),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("Incorrect email or password"));
}

#[tokio::test]
async fn stale_authorization_codes_are_rejected() {
    let base = spawn_app().await;
    let client = browser();

    let response = client
        .post(format!("{base}/mock-idam/o/token"))
        .form(&[("code", "mock-auth-code-unknown"), ("grant_type", "authorization_code")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}
