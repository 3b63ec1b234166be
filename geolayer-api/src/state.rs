//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use geolayer_storage::{CustomerRegistry, LayerCache};

use crate::auth::SuperuserKey;
use crate::hub::UpdateHub;

/// Application-wide state shared across all routes and the admin server.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<LayerCache>,
    pub registry: Arc<CustomerRegistry>,
    pub hub: Arc<UpdateHub>,
    pub superuser: SuperuserKey,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        cache: Arc<LayerCache>,
        registry: Arc<CustomerRegistry>,
        hub: Arc<UpdateHub>,
        superuser: SuperuserKey,
    ) -> Self {
        Self {
            cache,
            registry,
            hub,
            superuser,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<LayerCache>, cache);
crate::impl_from_ref!(Arc<CustomerRegistry>, registry);
crate::impl_from_ref!(Arc<UpdateHub>, hub);
crate::impl_from_ref!(SuperuserKey, superuser);
crate::impl_from_ref!(Instant, start_time);
