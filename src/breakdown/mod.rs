//! Breakdown keys and the registries that track which keys exist.

pub mod keys;
pub mod registry;

pub use keys::{BreakdownKey, EndpointInputQueue, EndpointInstanceId, EndpointMessageType};
pub use registry::{
    BreakdownRegistry, EndpointGrouping, EndpointInputQueueRegistry, EndpointRegistry,
    MessageTypeRegistry,
};
