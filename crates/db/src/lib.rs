//! MongoDB client factory for the shelf service.
//!
//! The client is built once at startup, handed to whoever needs a
//! [`mongodb::Database`], and shut down by [`DbModule::stop`].

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bson::doc;
use mongodb::{options::ClientOptions, Client, Database};
use shelf_kernel::{settings::DatabaseSettings, InitCtx, Module};

const APP_NAME: &str = "shelf";

/// Connected client plus the database selected by configuration.
#[derive(Clone, Debug)]
pub struct DbHandle {
    client: Client,
    database: Database,
}

impl DbHandle {
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Round-trip a `ping` command to the server.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .context("mongodb ping failed")?;
        Ok(())
    }

    /// Close pooled connections and end server sessions.
    pub async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}

/// Build client options from the connection string and configured timeouts.
pub async fn client_options(settings: &DatabaseSettings) -> anyhow::Result<ClientOptions> {
    let mut options = ClientOptions::parse(&settings.uri)
        .await
        .context("invalid mongodb connection string")?;

    let timeout = Duration::from_millis(settings.connect_timeout_ms);
    options.app_name = Some(APP_NAME.to_string());
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);

    Ok(options)
}

/// Create the client. Connections are opened lazily on first use.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<DbHandle> {
    let options = client_options(settings).await?;
    let client = Client::with_options(options).context("failed to build mongodb client")?;
    let database = client.database(&settings.database);

    tracing::info!(
        target: "shelf-db",
        database = %settings.database,
        "mongodb client created"
    );

    Ok(DbHandle { client, database })
}

/// Core module owning the client lifecycle.
pub struct DbModule {
    handle: DbHandle,
}

impl DbModule {
    pub fn new(handle: DbHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Module for DbModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.handle.ping().await?;
        tracing::info!(module = self.name(), "mongodb reachable");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.handle.close().await;
        tracing::info!(module = self.name(), "mongodb client shut down");
        Ok(())
    }
}
