use std::sync::Arc;

use once_cell::sync::Lazy;
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use uuid::Uuid;
use wiremock::MockServer;
use waitlist::{
    configuration::{DatabaseSettings, PrivacySettings, Settings, StoreBackend},
    startup::{get_connection_pool, Application},
    store::{InMemoryWaitlistStore, PostgresWaitlistStore},
    telemetry::{get_subscriber, init_subscriber},
};

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryWaitlistStore>,
    pub geolocation_server: MockServer,
}

static TRACING: Lazy<()> = Lazy::new(|| {
    let name = "test".to_string();
    let level = "debug".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(name, level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(name, level, std::io::sink);
        init_subscriber(subscriber);
    };
});

/// A server backed by a freshly migrated Postgres database.
pub struct PostgresTestApp {
    pub address: String,
    pub db_pool: PgPool,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_privacy(PrivacySettings::default()).await
}

pub async fn spawn_app_with_privacy(privacy: PrivacySettings) -> TestApp {
    Lazy::force(&TRACING);

    let geolocation_server = MockServer::start().await;

    let config = {
        let mut config = Settings::get().expect("Failed to read configuration");
        config.application.port = 0;
        config.store.backend = StoreBackend::Memory;
        config.geolocation.enabled = true;
        config.geolocation.base_url = geolocation_server.uri();
        config.geolocation.timeout_milliseconds = 500;
        config.privacy = privacy;

        config
    };

    let store = Arc::new(InMemoryWaitlistStore::new());
    let app = Application::build_with_store(config, store.clone())
        .await
        .expect("Failed to build app.");
    let address = format!("http://127.0.0.1:{}", app.port);

    tokio::spawn(app.run_until_stopped());

    TestApp {
        address,
        store,
        geolocation_server,
    }
}

pub async fn spawn_app_with_postgres() -> PostgresTestApp {
    Lazy::force(&TRACING);

    let config = {
        let mut config = Settings::get().expect("Failed to read configuration");
        config.database.database_name = Uuid::new_v4().to_string();
        config.application.port = 0;
        config.store.backend = StoreBackend::Postgres;
        config.geolocation.enabled = false;

        config
    };

    configure_database(&config.database).await;

    let app = Application::build(config.clone())
        .await
        .expect("Failed to build app.");
    let address = format!("http://127.0.0.1:{}", app.port);

    tokio::spawn(app.run_until_stopped());

    PostgresTestApp {
        address,
        db_pool: get_connection_pool(&config.database),
    }
}

/// A `PostgresWaitlistStore` over its own freshly migrated database.
pub async fn postgres_store() -> (PostgresWaitlistStore, PgPool) {
    Lazy::force(&TRACING);

    let mut config = Settings::get().expect("Failed to read configuration");
    config.database.database_name = Uuid::new_v4().to_string();

    let pool = configure_database(&config.database).await;

    (PostgresWaitlistStore::new(pool.clone()), pool)
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let connection = PgPoolOptions::new()
        .connect_with(config.without_db())
        .await
        .expect("Failed to connect to Postgres");

    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    // Migrate database
    let connection_pool = PgPoolOptions::new()
        .connect_with(config.with_db())
        .await
        .expect("Failed to connect to Postgres.");

    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database");

    connection_pool
}

impl PostgresTestApp {
    pub async fn post_waitlist(&self, body: String) -> reqwest::Response {
        reqwest::Client::new()
            .post(&format!("{}/waitlist", self.address))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .expect("Could not send request")
    }

    pub async fn get_count(&self) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("{}/waitlist/count", self.address))
            .send()
            .await
            .expect("Failed to send request")
    }
}

impl TestApp {
    pub async fn post_waitlist(&self, body: String) -> reqwest::Response {
        reqwest::Client::new()
            .post(&format!("{}/waitlist", self.address))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .expect("Could not send request")
    }

    pub async fn post_waitlist_from(&self, body: String, ip: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(&format!("{}/waitlist", self.address))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("X-Forwarded-For", ip)
            .header("User-Agent", "Mozilla/5.0 (test)")
            .body(body)
            .send()
            .await
            .expect("Could not send request")
    }

    pub async fn get_count(&self) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("{}/waitlist/count", self.address))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn healthcheck(&self) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("{}/healthz", self.address))
            .send()
            .await
            .expect("Failed to send request")
    }
}

pub fn email_body(email: &str) -> String {
    format!("email={}", urlencoding::encode(email))
}
