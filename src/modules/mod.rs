pub mod auth;
pub mod books;
pub mod dashboard;

use std::sync::Arc;

use shelfstack_auth::SessionGate;
use shelfstack_kernel::ModuleRegistry;

use books::service::InventoryService;

/// Register all application modules with the registry.
pub fn register_all(
    registry: &mut ModuleRegistry,
    service: Arc<InventoryService>,
    gate: Arc<SessionGate>,
) {
    registry.register(auth::create_module(gate));
    registry.register(books::create_module(service.clone()));
    registry.register(dashboard::create_module(service));
}
