//! Authenticated session state.
//!
//! The platform runs two APIs side by side and each wants its own login:
//! the REST API issues a token sent as `X-TOKEN`, the RPC API issues a token
//! sent inside every request's params. A `Session` holds both, plus the
//! user psk the wrap endpoint asks for.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::info;

use mamwrap_contracts::{
    envelope::{RpcMethod, RpcRequest},
    error::{MamError, MamResult},
    ids::Psk,
};

use crate::http::{join, read_body, transport_error, Transport};
use crate::response::unwrap_response;

#[derive(Clone)]
pub struct Session {
    rest_token: SecretString,
    rpc_token: SecretString,
    user_psk: Option<Psk>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("rest_token", &"[REDACTED]")
            .field("rpc_token", &"[REDACTED]")
            .field("user_psk", &self.user_psk)
            .finish()
    }
}

impl Session {
    pub fn new(rest_token: SecretString, rpc_token: SecretString, user_psk: Option<Psk>) -> Self {
        Self { rest_token, rpc_token, user_psk }
    }

    /// Log in to both APIs with the same credentials.
    ///
    /// The REST login runs first; its response may also carry the user psk.
    pub fn login(transport: &Transport, user: &str, password: &SecretString) -> MamResult<Self> {
        // ── REST ─────────────────────────────────────────────────────────────
        let url = join(&transport.endpoints().rest_url, &["users", "authenticate", ""])?;
        let response = transport
            .http()
            .post(url)
            .json(&json!({ "user_id": user, "password": password.expose_secret() }))
            .send()
            .map_err(transport_error)?;
        let (status, body) = read_body(response)?;
        let rest = unwrap_response(status, &body, &[])?;

        let rest_token = rest
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| MamError::MalformedResponse {
                reason: "missing key 'token'".to_string(),
                body: body.clone(),
            })?
            .to_string();
        let user_psk = rest
            .get("user_psk")
            .and_then(|psk| serde_json::from_value::<Psk>(psk.clone()).ok());

        // ── RPC ──────────────────────────────────────────────────────────────
        let request = RpcRequest::new(
            RpcMethod::AuthenticateUser,
            json!({ "email": user, "password": password.expose_secret() }),
        );
        let rpc_token = transport.send_rpc(&request, &["result", "token"])?;
        let rpc_token = rpc_token.as_str().ok_or_else(|| MamError::MalformedResponse {
            reason: "'result.token' is not a string".to_string(),
            body: rpc_token.to_string(),
        })?;

        info!(user = %user, user_psk = ?user_psk, "session established");

        Ok(Self::new(rest_token.into(), rpc_token.to_string().into(), user_psk))
    }

    pub fn user_psk(&self) -> Option<&Psk> {
        self.user_psk.as_ref()
    }

    pub(crate) fn rest_token(&self) -> &str {
        self.rest_token.expose_secret()
    }

    pub(crate) fn rpc_token(&self) -> &str {
        self.rpc_token.expose_secret()
    }
}
