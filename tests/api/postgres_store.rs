use claims::assert_ok;
use waitlist::{
    domain::{Location, NewWaitlistEntry, WaitlistEmail},
    store::{StoreError, WaitlistStore},
};

use crate::helpers::{email_body, postgres_store, spawn_app_with_postgres};

fn new_entry(email: &str) -> NewWaitlistEntry {
    NewWaitlistEntry {
        email: WaitlistEmail::parse(email).unwrap(),
        niche: "client_management".into(),
        source: "landing_page".into(),
        location: Location {
            country: Some("Portugal".into()),
            city: Some("Lisbon".into()),
            ..Default::default()
        },
        user_agent: None,
    }
}

#[tokio::test]
async fn insert_returns_the_stored_row() {
    // GIVEN
    let (store, pool) = postgres_store().await;

    // WHEN
    let entry = assert_ok!(store.insert(&new_entry("new@user.com")).await);

    // THEN
    assert_eq!(entry.email, "new@user.com");
    assert_eq!(entry.country.as_deref(), Some("Portugal"));
    assert_eq!(entry.city.as_deref(), Some("Lisbon"));
    assert!(!entry.blocked);

    let saved: (String, bool) = sqlx::query_as("SELECT email, blocked FROM waitlist")
        .fetch_one(&pool)
        .await
        .expect("Failed to fetch saved entry.");
    assert_eq!(saved, ("new@user.com".to_string(), false));
}

#[tokio::test]
async fn rows_inserted_without_an_id_get_one_from_the_table() {
    // GIVEN
    let (store, pool) = postgres_store().await;

    // WHEN
    sqlx::query("INSERT INTO waitlist (email) VALUES ('direct@user.com')")
        .execute(&pool)
        .await
        .expect("Failed to insert without an id.");

    // THEN
    assert_eq!(assert_ok!(store.count_visible().await), 1);
}

#[tokio::test]
async fn duplicate_email_in_another_case_is_rejected_by_the_table() {
    // GIVEN
    let (store, pool) = postgres_store().await;
    assert_ok!(store.insert(&new_entry("new@user.com")).await);
    sqlx::query("UPDATE waitlist SET email = 'New@User.com'")
        .execute(&pool)
        .await
        .expect("Failed to update entry.");

    // WHEN
    let result = store.insert(&new_entry("new@user.com")).await;

    // THEN
    assert!(matches!(result, Err(StoreError::DuplicateEmail)));
}

#[tokio::test]
async fn count_excludes_blocked_rows() {
    // GIVEN
    let (store, pool) = postgres_store().await;
    for email in ["a@user.com", "b@user.com", "spam@user.com"] {
        assert_ok!(store.insert(&new_entry(email)).await);
    }
    sqlx::query("UPDATE waitlist SET blocked = true WHERE email = 'spam@user.com'")
        .execute(&pool)
        .await
        .expect("Failed to block entry.");

    // WHEN
    let count = store.count_visible().await;

    // THEN
    assert_eq!(assert_ok!(count), 2);
}

#[tokio::test]
async fn join_persists_to_postgres_and_rejects_the_second_attempt() {
    // GIVEN
    let app = spawn_app_with_postgres().await;

    // WHEN
    let first = app.post_waitlist(email_body("  Someone@Example.com ")).await;
    let second = app.post_waitlist(email_body("someone@example.com")).await;

    // THEN
    assert_eq!(200, first.status().as_u16());
    assert_eq!(409, second.status().as_u16());

    let body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(body["error"], "DUPLICATE_EMAIL");
    assert_eq!(body["count"], 1);

    let saved: (String,) = sqlx::query_as("SELECT email FROM waitlist")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to fetch saved entry.");
    assert_eq!(saved.0, "someone@example.com");

    let count: serde_json::Value = app.get_count().await.json().await.unwrap();
    assert_eq!(count["count"], 1);
}
