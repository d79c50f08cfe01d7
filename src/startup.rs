use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::{
    configuration::{DatabaseSettings, Settings, StoreBackend},
    geolocation::GeoLocationClient,
    run,
    signup::WaitlistService,
    store::{InMemoryWaitlistStore, PostgresWaitlistStore, SupabaseWaitlistStore, WaitlistStore},
};

pub struct Application {
    pub port: u16,
    pub server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, std::io::Error> {
        let store = build_store(&config);
        Self::build_with_store(config, store).await
    }

    /// Builds the application around an already constructed store.
    pub async fn build_with_store(
        config: Settings,
        store: Arc<dyn WaitlistStore>,
    ) -> Result<Self, std::io::Error> {
        let address = (config.application.host.clone(), config.application.port);

        let geolocation = if config.geolocation.enabled {
            GeoLocationClient::new(
                config.geolocation.base_url.clone(),
                config.geolocation.timeout(),
            )
        } else {
            GeoLocationClient::disabled()
        };
        let service = WaitlistService::new(store, geolocation, config.waitlist, config.privacy);

        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let server = run(listener, service)?;

        Ok(Self { port, server })
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn build_store(config: &Settings) -> Arc<dyn WaitlistStore> {
    tracing::info!(backend = ?config.store.backend, "Configuring waitlist store");
    match config.store.backend {
        StoreBackend::Postgres => Arc::new(PostgresWaitlistStore::new(get_connection_pool(
            &config.database,
        ))),
        StoreBackend::Supabase => Arc::new(SupabaseWaitlistStore::new(
            config.supabase.base_url.clone(),
            config.supabase.api_key.clone(),
            config.supabase.table.clone(),
            config.supabase.timeout(),
        )),
        StoreBackend::Memory => Arc::new(InMemoryWaitlistStore::new()),
    }
}

pub fn get_connection_pool(config: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.with_db())
}
