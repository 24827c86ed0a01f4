#[macro_use]
extern crate rocket;

use bson::doc;
use mongodb::Client;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::{Config, StorageKind};
use crate::data::user::db::UserDbExt;
use crate::error::BackendError;
use crate::route::mount_api;
use crate::store::{Backend, MemoryStore, MongoStore, SchedulingStore, StoreSettings};

pub mod calendar;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod resp;
pub mod role;
pub mod route;
pub mod store;
pub mod util;

/// Store managed by the HTTP server.
pub type Store = SchedulingStore<Backend>;

pub async fn create(config: Config, log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }

    let backend = match config.storage {
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage, nothing survives a restart.");
            Backend::Memory(MemoryStore::new())
        }
        StorageKind::Mongodb => {
            tracing::info!("Connecting to MongoDB: {}", config.mongodb_uri);
            let client = Client::with_uri_str(config.mongodb_uri.as_str()).await?;

            tracing::info!("Using MongoDB database: {}", config.mongodb_db);
            let db = client.database(config.mongodb_db.as_str());

            if let Err(e) = db.run_command(doc! { "ping": 1 }, None).await {
                tracing::error!("Unable to connect to MongoDB.");
                return Err(e.into());
            }

            Backend::Mongo(MongoStore::new(&db, &config.mongodb_collection))
        }
    };

    create_with_backend(config, backend).await
}

/// Seeds the bootstrap admin into `backend` and builds the server around it.
pub async fn create_with_backend(
    config: Config,
    backend: Backend,
) -> Result<Rocket<Build>, BackendError> {
    let store = SchedulingStore::new(backend, StoreSettings::from(&config));

    tracing::info!("Seeding bootstrap admin...");
    store.bootstrap().await?;

    tracing::info!("Setting up CORS...");
    let cors = rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    tracing::info!("Starting HTTP server...");
    Ok(build(store).manage(config).attach(cors))
}

/// Rocket instance serving the API from `store`.
pub fn build(store: Store) -> Rocket<Build> {
    mount_api(rocket::build().manage(store))
}

#[cfg(test)]
mod tests {
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    use super::*;
    use crate::data::user::{bootstrap_admin_id, USER_COLLECTION_NAME};
    use crate::route::login_as;
    use crate::store::DocumentStore;

    #[rocket::async_test]
    async fn starts_on_a_store_with_a_legacy_superuser() {
        let memory = MemoryStore::new();
        memory
            .save(
                USER_COLLECTION_NAME,
                json!([{"id": "1700", "username": "tamar", "code": "9999"}]),
            )
            .await
            .unwrap();

        let rocket = create_with_backend(Config::in_memory(), Backend::Memory(memory))
            .await
            .expect("server refused to start");
        let client = Client::tracked(rocket).await.expect("valid rocket instance");

        let admin = login_as(&client, "tamar", "4378").await;
        assert_eq!(admin["id"], bootstrap_admin_id("tamar").as_str());
        assert_eq!(admin["isAdmin"], true);
    }
}
