//! WebSocket Event Types
//!
//! Notifications pushed to live subscribers of a datasource. Events carry
//! only the datasource id; clients re-fetch the layer over HTTP.

use geolayer_core::DatasourceId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HubEvent {
    /// Sent once when a subscription is established.
    Connected { datasource: DatasourceId },

    /// A feature was added or edited, or the whole layer was replaced.
    LayerUpdated { datasource: DatasourceId },

    /// The layer was physically removed.
    LayerDeleted { datasource: DatasourceId },
}

impl HubEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            HubEvent::Connected { .. } => "Connected",
            HubEvent::LayerUpdated { .. } => "LayerUpdated",
            HubEvent::LayerDeleted { .. } => "LayerDeleted",
        }
    }
}
