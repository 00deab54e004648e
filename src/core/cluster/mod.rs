//! Cluster quota accounting. The core treats the token server as the
//! transport-agnostic `TokenService` trait; an in-process embedded server
//! lives in `server`, and remote transports implement the same trait on the
//! client side and register through `set_token_service`.

pub mod server;

pub use server::*;

use crate::base::ParamKey;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Outcome status of a token request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenResultStatus {
    Ok = 0,
    BadRequest = 1,
    Blocked = 2,
    /// the request may pass after waiting `wait_in_ms`
    ShouldWait = 3,
    NoRuleExists = 4,
    Fail = 5,
    /// the namespace-level request limit of the server was exceeded
    TooManyRequest = 6,
}

impl Default for TokenResultStatus {
    fn default() -> Self {
        TokenResultStatus::Fail
    }
}

/// Result of a token acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterTokenResult {
    pub status: TokenResultStatus,
    /// remaining quota of the current window, best effort
    pub remaining: i32,
    pub wait_in_ms: u32,
}

impl ClusterTokenResult {
    pub fn new(status: TokenResultStatus) -> Self {
        ClusterTokenResult {
            status,
            ..Default::default()
        }
    }

    pub fn ok(remaining: i32) -> Self {
        ClusterTokenResult {
            status: TokenResultStatus::Ok,
            remaining,
            wait_in_ms: 0,
        }
    }

    pub fn should_wait(wait_in_ms: u32) -> Self {
        ClusterTokenResult {
            status: TokenResultStatus::ShouldWait,
            remaining: 0,
            wait_in_ms,
        }
    }

    pub fn blocked() -> Self {
        ClusterTokenResult {
            status: TokenResultStatus::Blocked,
            remaining: 0,
            wait_in_ms: 0,
        }
    }
}

/// Wire record of a token request. Only the rule id travels, not the rule,
/// which keeps the packet small.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    pub flow_id: u64,
    pub acquire_count: u32,
    pub prioritized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<ParamKey>>,
}

/// Wire record of a token response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    pub status: TokenResultStatus,
    pub remaining: i32,
    pub wait_in_ms: u32,
}

impl From<ClusterTokenResult> for TokenResponse {
    fn from(r: ClusterTokenResult) -> Self {
        TokenResponse {
            status: r.status,
            remaining: r.remaining,
            wait_in_ms: r.wait_in_ms,
        }
    }
}

/// The client/server contract of cluster quota accounting.
pub trait TokenService: Send + Sync {
    /// Request tokens from the token server.
    fn request_token(
        &self,
        flow_id: u64,
        acquire_count: u32,
        prioritized: bool,
    ) -> ClusterTokenResult;

    /// Request tokens for specific parameter values from the token server.
    fn request_param_token(
        &self,
        flow_id: u64,
        acquire_count: u32,
        params: Vec<ParamKey>,
    ) -> ClusterTokenResult;
}

lazy_static! {
    static ref TOKEN_SERVICE: RwLock<Option<Arc<dyn TokenService>>> = RwLock::new(None);
}

/// Registers the token service the flow checkers consult: a remote client or
/// the embedded `DefaultTokenService`.
pub fn set_token_service(service: Arc<dyn TokenService>) {
    *TOKEN_SERVICE.write().unwrap() = Some(service);
}

pub fn get_token_service() -> Option<Arc<dyn TokenService>> {
    TOKEN_SERVICE.read().unwrap().clone()
}

pub fn clear_token_service() {
    *TOKEN_SERVICE.write().unwrap() = None;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let req = TokenRequest {
            flow_id: 7,
            acquire_count: 2,
            prioritized: true,
            params: Some(vec!["k".into()]),
        };
        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: TokenRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.flow_id, 7);
        assert_eq!(decoded.acquire_count, 2);
        assert!(decoded.prioritized);
        assert_eq!(decoded.params.unwrap(), vec![String::from("k")]);

        let resp: TokenResponse = ClusterTokenResult::should_wait(250).into();
        let encoded = serde_json::to_string(&resp).unwrap();
        let decoded: TokenResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.status, TokenResultStatus::ShouldWait);
        assert_eq!(decoded.wait_in_ms, 250);
    }
}
