//! Shelf application library
//!
//! The book catalog module and the bootstrap shared by the binaries.

pub mod modules;

use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Build the registry for `settings` and run every module through init and start.
pub async fn boot(settings: &Settings) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, settings).await?;

    let ctx = InitCtx { settings };
    registry.boot(&ctx).await?;
    Ok(registry)
}

/// Boot, serve until a shutdown signal, then stop every module.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    shelf_http::error::expose_internal_details(settings.environment.is_development());

    let registry = boot(&settings).await?;
    let served = shelf_http::start_server(&registry, &settings).await;

    // Release the store even when serving failed.
    let stopped = registry.shutdown().await;
    served?;
    stopped
}
