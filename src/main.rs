mod modules;

use std::sync::Arc;

use anyhow::Context;
use shelfstack_auth::SessionGate;
use shelfstack_kernel::settings::Settings;
use shelfstack_kernel::{InitCtx, ModuleRegistry};
use shelfstack_store::BookStore;
use time::Duration;

use modules::books::service::InventoryService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load shelfstack settings")?;

    shelfstack_telemetry::init(&settings.telemetry);

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "shelfstack bootstrap starting"
    );

    let store = shelfstack_store::connect(&settings.database)
        .await
        .context("failed to open book store")?;

    let gate = Arc::new(SessionGate::new(
        settings.auth.username.clone(),
        settings.auth.password.clone(),
        Duration::minutes(settings.auth.session_ttl_minutes),
    ));

    let service = Arc::new(InventoryService::new(store.clone(), gate.clone()));

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, service, gate);

    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_all(&ctx).await?;

    store
        .migrate(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;

    registry.start_all(&ctx).await?;

    tracing::info!("shelfstack bootstrap complete");

    shelfstack_http::start_server(&registry, &settings).await
}
