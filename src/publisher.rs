//! Outbound publishing of property updates.
//!
//! [`PropertyUpdatePublisher`] is an after-update listener: it looks up the
//! entity that owns the updated property, picks a routing key from the
//! owner's kind and publishes the merged payload
//! `{state fields, previous_value, owner fields}`.

use crate::error::ListenerError;
use crate::notify::{StateEvent, StateListener};
use crate::state::{Property, State};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Owner kind of a property attached to a device.
pub const DEVICE_PROPERTY: &str = "device_property";
/// Owner kind of a property attached to a channel.
pub const CHANNEL_PROPERTY: &str = "channel_property";

/// Routing key for updated device properties.
pub const DEVICE_PROPERTY_UPDATED: &str = "fb.bus.entity.updated.device.property";
/// Routing key for updated channel properties.
pub const CHANNEL_PROPERTY_UPDATED: &str = "fb.bus.entity.updated.channel.property";

/// Payload key carrying the value before the update.
pub const PREVIOUS_VALUE: &str = "previous_value";

/// The entity a property state belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    /// Routing table key, e.g. [`DEVICE_PROPERTY`].
    pub kind: String,
    /// Entity fields merged into the published payload.
    pub fields: Map<String, Value>,
}

impl Owner {
    pub fn new(kind: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            fields,
        }
    }
}

/// Looks up the owning entity of a state.
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    async fn resolve(&self, id: Uuid) -> Result<Option<Owner>, ListenerError>;
}

/// Message bus the payload is handed to.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, routing_key: &str, payload: Value) -> Result<(), ListenerError>;
}

/// Publishes every property update to the message bus.
pub struct PropertyUpdatePublisher {
    resolver: Arc<dyn OwnerResolver>,
    publisher: Arc<dyn Publisher>,
    routes: HashMap<String, String>,
}

impl PropertyUpdatePublisher {
    /// Publisher with the device and channel property routes registered.
    pub fn new(resolver: Arc<dyn OwnerResolver>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            resolver,
            publisher,
            routes: HashMap::new(),
        }
        .with_route(DEVICE_PROPERTY, DEVICE_PROPERTY_UPDATED)
        .with_route(CHANNEL_PROPERTY, CHANNEL_PROPERTY_UPDATED)
    }

    /// Map an owner kind to a routing key, replacing any previous mapping.
    pub fn with_route(mut self, kind: impl Into<String>, routing_key: impl Into<String>) -> Self {
        self.routes.insert(kind.into(), routing_key.into());
        self
    }

    pub fn routing_key(&self, kind: &str) -> Option<&str> {
        self.routes.get(kind).map(String::as_str)
    }

    /// Build and publish the payload for one update.
    pub async fn publish_update(&self, state: &Property, previous: &Property) -> Result<(), ListenerError> {
        let owner = self
            .resolver
            .resolve(state.id())
            .await?
            .ok_or(ListenerError::OwnerNotFound(state.id()))?;

        let routing_key = self
            .routing_key(&owner.kind)
            .ok_or_else(|| ListenerError::UnsupportedOwner(owner.kind.clone()))?;

        let mut payload = state.to_map();
        payload.insert(
            PREVIOUS_VALUE.to_string(),
            previous.value().map_or(Value::Null, |v| Value::String(v.to_string())),
        );
        // Owner fields win on key collisions.
        payload.extend(owner.fields);

        debug!(id = %state.id(), routing_key, "Publishing property update");
        self.publisher.publish(routing_key, Value::Object(payload)).await
    }
}

#[async_trait]
impl StateListener<Property> for PropertyUpdatePublisher {
    async fn on_event(&self, event: &StateEvent<'_, Property>) -> Result<(), ListenerError> {
        match event {
            StateEvent::Updated { state, previous } => self.publish_update(state, previous).await,
            _ => Ok(()),
        }
    }
}
