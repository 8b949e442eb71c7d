//! Black-box tests over the full handler stack: real route table, real
//! session/identity middleware, in-memory SQLite with migrations applied.

use actix_identity::IdentityMiddleware;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    http::{header, StatusCode},
    test,
    web::Data,
    App,
};
use shelfwatch::{config_app, db, errors::AppError, AppState};
use sqlx::sqlite::SqlitePoolOptions;

const PASSWORD: &str = "p@ssw0rd-long-enough";

async fn test_state() -> AppState {
    // single connection so every query sees the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    sqlx::migrate!().run(&pool).await.expect("run migrations");
    AppState {
        db_pool: pool,
        low_stock_threshold: 5,
    }
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(IdentityMiddleware::default())
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(Data::new($state.clone()))
                .configure(config_app),
        )
        .await
    };
}

/// Signs up a user through the real handler and returns the session cookies
/// issued on the redirect response.
macro_rules! signup_cookies {
    ($app:expr, $username:expr) => {{
        let req = test::TestRequest::post()
            .uri("/signup")
            .set_form([
                ("username", $username),
                ("password", PASSWORD),
                ("password2", PASSWORD),
            ])
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        resp.response()
            .cookies()
            .map(|c| c.into_owned())
            .collect::<Vec<_>>()
    }};
}

macro_rules! with_cookies {
    ($req:expr, $cookies:expr) => {{
        let mut req = $req;
        for cookie in &$cookies {
            req = req.cookie(cookie.clone());
        }
        req.to_request()
    }};
}

macro_rules! body_text {
    ($resp:expr) => {{
        let body = test::read_body($resp).await;
        String::from_utf8_lossy(&body).into_owned()
    }};
}

#[actix_web::test]
async fn signup_logs_the_new_user_in() {
    let state = test_state().await;
    let app = test_app!(state);

    let cookies = signup_cookies!(&app, "alice");

    // the very next request is already authenticated, no login step
    let req = with_cookies!(test::TestRequest::get().uri("/dashboard"), cookies);
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn signup_rejects_duplicate_username() {
    let state = test_state().await;
    let app = test_app!(state);

    signup_cookies!(&app, "alice");

    let req = test::TestRequest::post()
        .uri("/signup")
        .set_form([
            ("username", "alice"),
            ("password", PASSWORD),
            ("password2", PASSWORD),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db_pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[actix_web::test]
async fn signup_rejects_password_mismatch_without_creating_account() {
    let state = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/signup")
        .set_form([
            ("username", "alice"),
            ("password", PASSWORD),
            ("password2", "something-else-entirely"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db_pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[actix_web::test]
async fn dashboard_redirects_anonymous_to_login() {
    let state = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/dashboard").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/login"
    );
}

#[actix_web::test]
async fn dashboard_lists_only_own_items() {
    let state = test_state().await;
    let app = test_app!(state);

    let alice_cookies = signup_cookies!(&app, "alice");
    signup_cookies!(&app, "bob");

    let alice = db::get_user_by_username(&state, "alice")
        .await
        .unwrap()
        .unwrap();
    let bob = db::get_user_by_username(&state, "bob")
        .await
        .unwrap()
        .unwrap();
    db::create_item(&state, alice.id, "Widget".to_owned(), 50, None, None)
        .await
        .unwrap();
    db::create_item(&state, bob.id, "Gadget".to_owned(), 50, None, None)
        .await
        .unwrap();

    let req = with_cookies!(test::TestRequest::get().uri("/dashboard"), alice_cookies);
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text!(resp);
    assert!(body.contains("Widget"));
    assert!(!body.contains("Gadget"));
}

#[actix_web::test]
async fn dashboard_flags_low_stock_with_singular_message() {
    let state = test_state().await;
    let app = test_app!(state);

    let cookies = signup_cookies!(&app, "alice");
    let alice = db::get_user_by_username(&state, "alice")
        .await
        .unwrap()
        .unwrap();
    db::create_item(
        &state,
        alice.id,
        "Widget".to_owned(),
        3,
        Some("123".to_owned()),
        None,
    )
    .await
    .unwrap();
    db::create_item(&state, alice.id, "Gadget".to_owned(), 50, None, None)
        .await
        .unwrap();

    let req = with_cookies!(test::TestRequest::get().uri("/dashboard"), cookies);
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text!(resp);
    assert!(body.contains("1 item has low inventory"));
}

#[actix_web::test]
async fn category_filter_narrows_listing_but_not_low_stock() {
    let state = test_state().await;
    let app = test_app!(state);

    let cookies = signup_cookies!(&app, "alice");
    let alice = db::get_user_by_username(&state, "alice")
        .await
        .unwrap()
        .unwrap();
    // plenty of stock in category 1, one low item in category 2
    db::create_item(&state, alice.id, "Widget".to_owned(), 20, None, Some(1))
        .await
        .unwrap();
    db::create_item(&state, alice.id, "Gadget".to_owned(), 1, None, Some(2))
        .await
        .unwrap();

    let req = with_cookies!(
        test::TestRequest::get().uri("/dashboard?category=1"),
        cookies
    );
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text!(resp);
    assert!(body.contains("Widget"));
    assert!(!body.contains("Gadget"));
    // the hidden low item still drives the banner
    assert!(body.contains("1 item has low inventory"));
}

#[actix_web::test]
async fn update_item_applies_add_adjustment() {
    let state = test_state().await;
    let app = test_app!(state);

    signup_cookies!(&app, "alice");
    let alice = db::get_user_by_username(&state, "alice")
        .await
        .unwrap()
        .unwrap();
    let item = db::create_item(
        &state,
        alice.id,
        "Widget".to_owned(),
        3,
        Some("123".to_owned()),
        None,
    )
    .await
    .unwrap();

    let req = test::TestRequest::post()
        .uri("/update-item")
        .set_form([
            ("barcode", "123"),
            ("name", "Widget"),
            ("quantity", "3"),
            ("action", "add"),
            ("quantity_change", "7"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let updated = db::find_item_by_id(&state, item.id).await.unwrap();
    assert_eq!(updated.quantity, 10);
}

#[actix_web::test]
async fn update_item_rejects_non_numeric_quantity_change() {
    let state = test_state().await;
    let app = test_app!(state);

    signup_cookies!(&app, "alice");
    let alice = db::get_user_by_username(&state, "alice")
        .await
        .unwrap()
        .unwrap();
    let item = db::create_item(
        &state,
        alice.id,
        "Widget".to_owned(),
        3,
        Some("123".to_owned()),
        None,
    )
    .await
    .unwrap();

    let req = test::TestRequest::post()
        .uri("/update-item")
        .set_form([
            ("barcode", "123"),
            ("name", "Widget"),
            ("quantity", "3"),
            ("action", "add"),
            ("quantity_change", "seven"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // nothing was persisted
    let unchanged = db::find_item_by_id(&state, item.id).await.unwrap();
    assert_eq!(unchanged.quantity, 3);
}

#[actix_web::test]
async fn update_item_with_unknown_barcode_is_not_found() {
    let state = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/update-item")
        .set_form([
            ("barcode", "does-not-exist"),
            ("name", "Widget"),
            ("quantity", "3"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn search_unknown_barcode_is_not_found() {
    let state = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/search?barcode=nope")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn search_without_barcode_renders_empty_view() {
    let state = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/search").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn add_then_delete_item_flow() {
    let state = test_state().await;
    let app = test_app!(state);

    let cookies = signup_cookies!(&app, "alice");

    let req = with_cookies!(
        test::TestRequest::post().uri("/item/add").set_form([
            ("name", "Widget"),
            ("quantity", "9"),
            ("barcode", "555"),
        ]),
        cookies
    );
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let item = db::find_item_by_barcode(&state, "555").await.unwrap();

    let req = with_cookies!(
        test::TestRequest::post().uri(&format!("/item/delete/{}", item.id)),
        cookies
    );
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let req = with_cookies!(test::TestRequest::get().uri("/dashboard"), cookies);
    let resp = test::call_service(&app, req).await;
    let body = body_text!(resp);
    assert!(!body.contains("Widget"));

    let err = db::find_item_by_id(&state, item.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[actix_web::test]
async fn login_issues_session_for_existing_user() {
    let state = test_state().await;
    let app = test_app!(state);

    signup_cookies!(&app, "alice");

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("username", "alice"), ("password", PASSWORD)])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookies: Vec<_> = resp
        .response()
        .cookies()
        .map(|c| c.into_owned())
        .collect();

    let req = with_cookies!(test::TestRequest::get().uri("/dashboard"), cookies);
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("username", "alice"), ("password", "wrong-password-here")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn edit_is_scoped_to_owner() {
    let state = test_state().await;
    let app = test_app!(state);

    signup_cookies!(&app, "alice");
    let bob_cookies = signup_cookies!(&app, "bob");

    let alice = db::get_user_by_username(&state, "alice")
        .await
        .unwrap()
        .unwrap();
    let item = db::create_item(&state, alice.id, "Widget".to_owned(), 9, None, None)
        .await
        .unwrap();

    let req = with_cookies!(
        test::TestRequest::get().uri(&format!("/item/edit/{}", item.id)),
        bob_cookies
    );
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
