//! Resource/Traffic Wrappers

use serde::{Deserialize, Serialize};
use std::fmt;

/// ResourceType represents the classification of resources
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Common,
    Web,
    Rpc,
    ApiGateway,
    DbSql,
    Cache,
    Mq,
}

impl Default for ResourceType {
    fn default() -> Self {
        ResourceType::Common
    }
}

impl From<u8> for ResourceType {
    fn from(v: u8) -> Self {
        match v {
            1 => ResourceType::Web,
            2 => ResourceType::Rpc,
            3 => ResourceType::ApiGateway,
            4 => ResourceType::DbSql,
            5 => ResourceType::Cache,
            6 => ResourceType::Mq,
            _ => ResourceType::Common,
        }
    }
}

/// TrafficType describes the traffic direction of a guarded call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficType {
    Inbound,
    Outbound,
}

impl Default for TrafficType {
    fn default() -> Self {
        TrafficType::Outbound
    }
}

/// ResourceWrapper identifies the invocation target.
#[derive(Debug, Clone, Default)]
pub struct ResourceWrapper {
    /// globally unique resource name
    name: String,
    /// resource classification
    classification: ResourceType,
    /// Inbound or Outbound
    traffic_type: TrafficType,
}

impl ResourceWrapper {
    pub fn new(name: String, classification: ResourceType, traffic_type: TrafficType) -> Self {
        Self {
            name,
            classification,
            traffic_type,
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn classification(&self) -> ResourceType {
        self.classification
    }

    pub fn traffic_type(&self) -> TrafficType {
        self.traffic_type
    }
}

impl fmt::Display for ResourceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceWrapper{{name={}, trafficType={:?}, classification={:?}}}",
            self.name, self.traffic_type, self.classification
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification_from_u8() {
        assert_eq!(ResourceType::Web, 1u8.into());
        assert_eq!(ResourceType::Common, 250u8.into());
    }
}
