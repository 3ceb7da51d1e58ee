//! Breakdown key identities.
//!
//! A breakdown key is the dimension a measurement is tagged with. Every key
//! belongs to exactly one endpoint, exposed through
//! [`BreakdownKey::endpoint_name`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Common behaviour of the instance, queue and message-type keys.
pub trait BreakdownKey: Clone + Eq + Hash + Ord + fmt::Debug + Send + Sync + 'static {
    /// Name of the endpoint owning this key
    fn endpoint_name(&self) -> &str;

    /// True when `other` has the same identity but different display details.
    ///
    /// Registries treat such a change as structural and republish.
    fn details_differ(&self, _other: &Self) -> bool {
        false
    }
}

/// One running instance of an endpoint.
///
/// Identity is the endpoint name plus the instance id; the instance name is a
/// display label that may arrive after the id was first seen.
#[derive(Debug, Clone)]
pub struct EndpointInstanceId {
    endpoint_name: String,
    instance_id: String,
    instance_name: String,
}

impl EndpointInstanceId {
    /// Create an instance key whose display name is its id
    pub fn new(endpoint_name: impl Into<String>, instance_id: impl Into<String>) -> Self {
        let instance_id = instance_id.into();
        Self {
            endpoint_name: endpoint_name.into(),
            instance_name: instance_id.clone(),
            instance_id,
        }
    }

    /// Create an instance key with an explicit display name
    pub fn with_name(
        endpoint_name: impl Into<String>,
        instance_id: impl Into<String>,
        instance_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            instance_id: instance_id.into(),
            instance_name: instance_name.into(),
        }
    }

    /// Stable instance identifier
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Display name
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }
}

impl PartialEq for EndpointInstanceId {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint_name == other.endpoint_name && self.instance_id == other.instance_id
    }
}

impl Eq for EndpointInstanceId {}

impl Hash for EndpointInstanceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.endpoint_name.hash(state);
        self.instance_id.hash(state);
    }
}

impl PartialOrd for EndpointInstanceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EndpointInstanceId {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.endpoint_name, &self.instance_id).cmp(&(&other.endpoint_name, &other.instance_id))
    }
}

impl fmt::Display for EndpointInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.endpoint_name, self.instance_id)
    }
}

impl BreakdownKey for EndpointInstanceId {
    fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    fn details_differ(&self, other: &Self) -> bool {
        self.instance_name != other.instance_name
    }
}

/// Input queue of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointInputQueue {
    endpoint_name: String,
    input_queue: String,
}

impl EndpointInputQueue {
    /// Create a queue key
    pub fn new(endpoint_name: impl Into<String>, input_queue: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            input_queue: input_queue.into(),
        }
    }

    /// Queue address
    pub fn input_queue(&self) -> &str {
        &self.input_queue
    }
}

impl fmt::Display for EndpointInputQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.endpoint_name, self.input_queue)
    }
}

impl BreakdownKey for EndpointInputQueue {
    fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }
}

/// Message type handled by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointMessageType {
    endpoint_name: String,
    message_type: String,
}

impl EndpointMessageType {
    /// Create a message-type key
    pub fn new(endpoint_name: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            message_type: message_type.into(),
        }
    }

    /// Message type as reported (usually assembly-qualified)
    pub fn message_type(&self) -> &str {
        &self.message_type
    }
}

impl fmt::Display for EndpointMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.endpoint_name, self.message_type)
    }
}

impl BreakdownKey for EndpointMessageType {
    fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }
}
