pub mod books;

use std::sync::Arc;

use anyhow::Context;
use shelf_kernel::{
    settings::{Settings, StoreBackend},
    ModuleRegistry,
};

use books::store::{BookStore, MemoryBookStore, MongoBookStore};

/// Connect the configured store and register every module with the registry
pub async fn register_all(registry: &mut ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    let database = &settings.database;

    let store: Arc<dyn BookStore> = match database.backend {
        StoreBackend::Mongodb => {
            let handle = shelf_db::connect(database)
                .await
                .context("failed to create mongodb client")?;
            let store = MongoBookStore::new(handle.database(), &database.collection);
            registry.register_core(Arc::new(shelf_db::DbModule::new(handle)));
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory book store; nothing will be persisted");
            Arc::new(MemoryBookStore::new())
        }
    };

    registry.register_custom(books::create_module(store, database));
    Ok(())
}
