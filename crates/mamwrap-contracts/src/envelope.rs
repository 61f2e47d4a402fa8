//! The JSON-RPC request envelope.
//!
//! Every RPC call is a fresh, immutable `RpcRequest`. Nothing is shared
//! between calls, so one client can drive several jobs at once.

use serde::{Serialize, Serializer};
use serde_json::Value;

pub const REQUEST_ID: u64 = 1;
pub const API_VERSION: &str = "1.0";
pub const JSONRPC_VERSION: &str = "2.0";

/// The RPC operations this client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    AuthenticateUser,
    VersionStatus,
    WrapAsync,
    CreateTransaction,
    Publish,
}

impl RpcMethod {
    /// The dot-qualified method name sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            RpcMethod::AuthenticateUser => "com.apperian.eas.user.authenticateuser",
            RpcMethod::VersionStatus => "com.apperian.eas.apps.getversionstatus",
            RpcMethod::WrapAsync => "com.apperian.eas.apps.wrapappasync",
            RpcMethod::CreateTransaction => "com.apperian.eas.apps.create",
            RpcMethod::Publish => "com.apperian.eas.apps.publish",
        }
    }
}

impl Serialize for RpcMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One outbound RPC call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    pub id: u64,
    pub api_version: &'static str,
    pub method: RpcMethod,
    pub jsonrpc: &'static str,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: RpcMethod, params: Value) -> Self {
        Self {
            id: REQUEST_ID,
            api_version: API_VERSION,
            method,
            jsonrpc: JSONRPC_VERSION,
            params,
        }
    }
}
