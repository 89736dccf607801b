use anyhow::Context;
use clap::{Parser, Subcommand};
use shelf_kernel::{
    settings::{Settings, StoreBackend},
    ModuleRegistry,
};

#[derive(Debug, Parser)]
#[command(name = "shelf", version, about = "Library catalog service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server until ctrl-c or SIGTERM
    Serve,
    /// Load settings, reach the store and exit
    Check,
    /// Print the merged OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().with_context(|| "failed to load shelf settings")?;

    match cli.command {
        Command::Serve => {
            shelf_telemetry::init(&settings.telemetry)?;
            shelf_app::run(settings).await
        }
        Command::Check => {
            shelf_telemetry::init(&settings.telemetry)?;
            let registry = shelf_app::boot(&settings).await?;
            registry.shutdown().await?;
            println!(
                "ok: environment={:?} backend={:?} modules={}",
                settings.environment,
                settings.database.backend,
                registry.modules().len()
            );
            Ok(())
        }
        Command::Openapi => {
            // The document does not depend on the store; skip connecting.
            let mut offline = settings.clone();
            offline.database.backend = StoreBackend::Memory;

            let mut registry = ModuleRegistry::new();
            shelf_app::modules::register_all(&mut registry, &offline).await?;

            let document =
                shelf_http::router::openapi_document(&registry, &offline.server.api_prefix);
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
    }
}
