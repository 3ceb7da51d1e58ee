//! Response models of the dashboard queries.
//!
//! Models serialize with camelCase field names, the shape the HTTP layer
//! returns to the dashboard.

use crate::metrics::MonitoredValues;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Metric name to series
pub type MetricValues = BTreeMap<&'static str, MonitoredValues>;

/// One row of the endpoint overview
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredEndpoint {
    /// Endpoint name
    pub name: String,
    /// Ids of every known instance
    pub endpoint_instance_ids: Vec<String>,
    /// True when any instance is stale
    pub is_stale: bool,
    /// Series per metric
    pub metrics: MetricValues,
}

/// One instance in the endpoint detail view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredEndpointInstance {
    /// Instance id
    pub id: String,
    /// Display name
    pub name: String,
    /// True when the instance has been silent past the grace period
    pub is_stale: bool,
    /// Series per metric
    pub metrics: MetricValues,
}

/// One message type in the endpoint detail view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredEndpointMessageType {
    /// Message type as reported
    pub id: String,
    /// Parsed parts of `id`
    #[serde(flatten)]
    pub descriptor: MessageTypeDescriptor,
    /// Series per metric
    pub metrics: MetricValues,
}

/// Latest point and window average of one metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDigest {
    /// Most recent point
    pub latest: f64,
    /// Window average
    pub average: f64,
}

/// Series with the timestamps of its points
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredValuesWithTimings {
    /// Window average
    pub average: f64,
    /// One value per interval, oldest first
    pub points: Vec<f64>,
    /// Start of the interval behind each point
    pub time_axis_values: Vec<DateTime<Utc>>,
}

/// Everything the detail view shows for one endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredEndpointDetails {
    /// Digest per metric
    pub digest: BTreeMap<&'static str, MetricDigest>,
    /// Full series for the detailed metrics
    pub metric_details: BTreeMap<&'static str, MonitoredValuesWithTimings>,
    /// Per-instance series
    pub instances: Vec<MonitoredEndpointInstance>,
    /// Per-message-type series
    pub message_types: Vec<MonitoredEndpointMessageType>,
}

/// Parts of an assembly-qualified type name such as
/// `Shop.PlaceOrder, Shop.Messages, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTypeDescriptor {
    /// Full type name
    pub type_name: String,
    /// Assembly name
    pub assembly_name: Option<String>,
    /// Assembly version
    pub assembly_version: Option<String>,
    /// Assembly culture
    pub culture: Option<String>,
    /// Public key token
    pub public_key_token: Option<String>,
}

impl MessageTypeDescriptor {
    /// Split an assembly-qualified name. Anything that does not look like one
    /// becomes the type name as is.
    pub fn parse(message_type: &str) -> Self {
        let parts = split_top_level(message_type);
        let mut parts = parts.into_iter().map(str::trim);

        let mut descriptor = MessageTypeDescriptor {
            type_name: parts.next().unwrap_or_default().to_owned(),
            assembly_name: parts.next().filter(|s| !s.is_empty()).map(str::to_owned),
            ..Default::default()
        };

        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let value = Some(value.trim().to_owned());
            match key.trim() {
                "Version" => descriptor.assembly_version = value,
                "Culture" => descriptor.culture = value,
                "PublicKeyToken" => descriptor.public_key_token = value,
                _ => {},
            }
        }

        descriptor
    }
}

/// Split on commas outside square brackets (generic arguments)
fn split_top_level(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&value[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    parts.push(&value[start..]);

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_assembly_qualified_name() {
        let descriptor = MessageTypeDescriptor::parse(
            "Shop.PlaceOrder, Shop.Messages, Version=1.2.0.0, Culture=neutral, PublicKeyToken=null",
        );

        assert_eq!(
            descriptor,
            MessageTypeDescriptor {
                type_name: "Shop.PlaceOrder".to_owned(),
                assembly_name: Some("Shop.Messages".to_owned()),
                assembly_version: Some("1.2.0.0".to_owned()),
                culture: Some("neutral".to_owned()),
                public_key_token: Some("null".to_owned()),
            }
        );
    }

    #[test]
    fn test_parse_plain_name() {
        let descriptor = MessageTypeDescriptor::parse("Shop.PlaceOrder");
        assert_eq!(descriptor.type_name, "Shop.PlaceOrder");
        assert_eq!(descriptor.assembly_name, None);
        assert_eq!(descriptor.assembly_version, None);
    }

    #[test]
    fn test_parse_generic_type() {
        let descriptor = MessageTypeDescriptor::parse(
            "Shop.Envelope`1[[Shop.PlaceOrder, Shop.Messages]], Shop.Messages, Version=2.0.0.0",
        );
        assert_eq!(descriptor.type_name, "Shop.Envelope`1[[Shop.PlaceOrder, Shop.Messages]]");
        assert_eq!(descriptor.assembly_name.as_deref(), Some("Shop.Messages"));
        assert_eq!(descriptor.assembly_version.as_deref(), Some("2.0.0.0"));
    }

    #[test]
    fn test_serialized_shape() {
        let digest = MetricDigest {
            latest: 1.5,
            average: 2.0,
        };
        let json = serde_json::to_value(digest).unwrap();
        assert_eq!(json, serde_json::json!({ "latest": 1.5, "average": 2.0 }));

        let message_type = MonitoredEndpointMessageType {
            id: "A, B".to_owned(),
            descriptor: MessageTypeDescriptor::parse("A, B"),
            metrics: MetricValues::new(),
        };
        let json = serde_json::to_value(&message_type).unwrap();
        assert_eq!(json["typeName"], "A");
        assert_eq!(json["assemblyName"], "B");
        assert!(json["metrics"].as_object().unwrap().is_empty());
    }
}
