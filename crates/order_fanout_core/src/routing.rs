use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Which subscriptions of the fan-out topic accept an event. Mirrors the
/// filter policies attached to each role's queue subscription.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Routes {
    pub fulfillment: bool,
    pub analytics: bool,
    pub shipping: bool,
}

impl Routes {
    pub fn targets(&self) -> Vec<Role> {
        let mut targets = Vec::with_capacity(3);
        if self.fulfillment {
            targets.push(Role::Fulfillment);
        }
        if self.analytics {
            targets.push(Role::Analytics);
        }
        if self.shipping {
            targets.push(Role::Shipping);
        }
        targets
    }
}

pub fn route_event(event_type: &str, priority: &str) -> Routes {
    Routes {
        fulfillment: matches!(event_type, "OrderPlaced" | "OrderUpdated"),
        analytics: matches!(event_type, "OrderPlaced" | "OrderShipped") && priority == "high",
        shipping: event_type == "OrderPlaced",
    }
}
