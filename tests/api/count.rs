use crate::helpers::{email_body, spawn_app};

#[tokio::test]
async fn count_starts_at_zero() {
    // GIVEN
    let app = spawn_app().await;

    // WHEN
    let response = app.get_count().await;

    // THEN
    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["count"], 0);
    assert_eq!(body["fallback"], false);
}

#[tokio::test]
async fn count_excludes_blocked_entries() {
    // GIVEN
    let app = spawn_app().await;
    for email in ["a@user.com", "b@user.com", "spam@user.com"] {
        app.post_waitlist(email_body(email))
            .await
            .error_for_status()
            .unwrap();
    }
    app.store.block("spam@user.com");

    // WHEN
    let body: serde_json::Value = app.get_count().await.json().await.unwrap();

    // THEN
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn count_falls_back_to_the_default_when_the_store_fails() {
    // GIVEN
    let app = spawn_app().await;
    app.store.fail_counts(true);

    // WHEN
    let response = app.get_count().await;

    // THEN
    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["count"], 1247);
    assert_eq!(body["fallback"], true);
}

#[tokio::test]
async fn count_falls_back_to_the_last_known_value() {
    // GIVEN
    let app = spawn_app().await;
    app.post_waitlist(email_body("a@user.com"))
        .await
        .error_for_status()
        .unwrap();
    app.store.fail_counts(true);

    // WHEN
    let body: serde_json::Value = app.get_count().await.json().await.unwrap();

    // THEN
    assert_eq!(body["count"], 1);
    assert_eq!(body["fallback"], true);
}
