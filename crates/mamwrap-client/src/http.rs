//! The HTTP-backed platform client.
//!
//! `PlatformClient` implements every platform-facing trait from
//! `mamwrap_core::traits` over a blocking `reqwest` client. Each call builds
//! a fresh request; the only state shared between calls is the immutable
//! session, so one client can serve several drivers at once.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use mamwrap_contracts::{
    credential::Credential,
    envelope::{RpcMethod, RpcRequest},
    error::{MamError, MamResult},
    ids::Psk,
    job::{SigningStatus, VersionDetail, VersionStatus, WrapSubmission},
    rule::ExistingPolicySnapshot,
};
use mamwrap_core::traits::{
    AppDetailService, PolicyQueryService, PublishService, SigningService, WrapService,
};

use crate::config::{ClientConfig, RegionEndpoints};
use crate::response::{unwrap_as, unwrap_response, value_to_id};
use crate::session::Session;

/// Value of the `X-Ds-Client-Type` header on RPC calls.
pub const CLIENT_TYPE: &str = "9";

/// Unauthenticated request plumbing: the HTTP client, the region's
/// endpoints and the RPC client token.
pub struct Transport {
    http: Client,
    endpoints: RegionEndpoints,
    client_token: Option<SecretString>,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> MamResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            http,
            endpoints: config.endpoints()?,
            client_token: config.client_token.clone(),
        })
    }

    pub fn endpoints(&self) -> &RegionEndpoints {
        &self.endpoints
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// A request carrying the headers every RPC-side call needs.
    fn rpc_request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url).header("X-Ds-Client-Type", CLIENT_TYPE);
        match &self.client_token {
            Some(token) => builder.header("X-HTTP-Token", token.expose_secret()),
            None => builder,
        }
    }

    /// Post `request` to the RPC endpoint and unwrap `path` from the reply.
    pub(crate) fn send_rpc(&self, request: &RpcRequest, path: &[&str]) -> MamResult<Value> {
        debug!(method = request.method.as_str(), "rpc call");
        let response = self
            .rpc_request(Method::POST, self.endpoints.rpc_url.clone())
            .json(request)
            .send()
            .map_err(transport_error)?;
        let (status, body) = read_body(response)?;
        unwrap_response(status, &body, path)
    }
}

/// An authenticated client for one platform region.
pub struct PlatformClient {
    transport: Transport,
    session: Session,
}

impl PlatformClient {
    /// Build a transport from `config` and log in with its credentials.
    pub fn connect(config: &ClientConfig) -> MamResult<Self> {
        let transport = Transport::new(config)?;
        let user = config.user.as_deref().ok_or_else(|| MamError::Config {
            reason: "no user configured; set MAMWRAP_USER or pass --user".to_string(),
        })?;
        let password = config.password.as_ref().ok_or_else(|| MamError::Config {
            reason: "no password configured; set MAMWRAP_PASSWORD".to_string(),
        })?;
        let session = Session::login(&transport, user, password)?;
        Ok(Self { transport, session })
    }

    /// Use an existing session instead of logging in.
    pub fn with_session(config: &ClientConfig, session: Session) -> MamResult<Self> {
        Ok(Self { transport: Transport::new(config)?, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Signing credentials stored for the organization.
    pub fn credentials(&self) -> MamResult<Vec<Credential>> {
        let url = join(&self.transport.endpoints.rest_url, &["v1", "credentials", ""])?;
        let (status, body) = self.rest(Method::GET, url)?;
        unwrap_as(status, &body, &["credentials"])
    }

    /// An RPC call with the session token added to `params`.
    fn rpc(&self, method: RpcMethod, mut params: Value, path: &[&str]) -> MamResult<Value> {
        if let Value::Object(fields) = &mut params {
            fields.insert(
                "token".to_string(),
                Value::String(self.session.rpc_token().to_string()),
            );
        }
        self.transport.send_rpc(&RpcRequest::new(method, params), path)
    }

    fn rest(&self, method: Method, url: Url) -> MamResult<(u16, String)> {
        debug!(method = %method, url = %url, "rest call");
        let response = self
            .transport
            .http
            .request(method, url)
            .header("X-TOKEN", self.session.rest_token())
            .send()
            .map_err(transport_error)?;
        read_body(response)
    }
}

impl AppDetailService for PlatformClient {
    fn version_detail(&self, app_psk: &Psk) -> MamResult<VersionDetail> {
        let url = join(&self.transport.endpoints.rest_url, &["v1", "applications", app_psk.as_str()])?;
        let (status, body) = self.rest(Method::GET, url)?;
        unwrap_as(status, &body, &["application", "version"])
    }
}

impl PolicyQueryService for PlatformClient {
    /// A 404 means the version never had a dynamic policy.
    fn existing_policy(&self, version_psk: &Psk) -> MamResult<ExistingPolicySnapshot> {
        let url = join(
            &self.transport.endpoints.rpc_url,
            &["policies", "dynamic", "policy", "version", version_psk.as_str()],
        )?;
        debug!(url = %url, "fetching stored dynamic policy");
        let response = self
            .transport
            .rpc_request(Method::GET, url)
            .send()
            .map_err(transport_error)?;
        let (status, body) = read_body(response)?;

        match unwrap_as(status, &body, &[]) {
            Err(MamError::Http { status: 404, .. }) => {
                debug!(version_psk = %version_psk, "no stored dynamic policy");
                Ok(ExistingPolicySnapshot::empty())
            }
            other => other,
        }
    }
}

impl WrapService for PlatformClient {
    fn wrap_status(&self, app_psk: &Psk) -> MamResult<VersionStatus> {
        let result = self.rpc(RpcMethod::VersionStatus, json!({ "appPsk": app_psk }), &["result"])?;
        serde_json::from_value(result.clone()).map_err(|e| MamError::MalformedResponse {
            reason: format!("unexpected version status shape: {}", e),
            body: result.to_string(),
        })
    }

    fn submit_wrap(&self, submission: &WrapSubmission) -> MamResult<()> {
        let params = json!({
            "appPsk": submission.app_psk,
            "data": submission.active_flags,
            "dynamicPolicyInfo": { "policy_data": submission.action },
            "apperianWrapperVersion": submission.wrapper_version,
            "userPsk": self.session.user_psk(),
            "pythonAuthToken": self.session.rpc_token(),
        });
        self.rpc(RpcMethod::WrapAsync, params, &[])?;
        Ok(())
    }
}

impl SigningService for PlatformClient {
    fn submit_signing(&self, app_psk: &Psk, credential_psk: &Psk) -> MamResult<SigningStatus> {
        let url = join(
            &self.transport.endpoints.rest_url,
            &["v1", "applications", app_psk.as_str(), "credentials", credential_psk.as_str()],
        )?;
        let (status, body) = self.rest(Method::PUT, url)?;
        let reply = unwrap_response(status, &body, &[])?;
        // No status in the reply means signing never started.
        Ok(match reply.get("signing_status").and_then(Value::as_str) {
            Some(status) => SigningStatus::from(status.to_string()),
            None => SigningStatus::NotStarted,
        })
    }
}

impl PublishService for PlatformClient {
    fn create_transaction(&self) -> MamResult<String> {
        let id = self.rpc(RpcMethod::CreateTransaction, json!({}), &["result", "transactionID"])?;
        value_to_id(&id).ok_or_else(|| MamError::MalformedResponse {
            reason: "'result.transactionID' is not an id".to_string(),
            body: id.to_string(),
        })
    }

    fn publish(&self, transaction_id: &str, file_id: &str, metadata: &Value) -> MamResult<Psk> {
        let params = json!({
            "EASEmetadata": metadata,
            "files": { "application": file_id },
            "transactionID": transaction_id,
        });
        let app_id = self.rpc(RpcMethod::Publish, params, &["result", "appID"])?;
        serde_json::from_value(app_id.clone()).map_err(|_| MamError::MalformedResponse {
            reason: "'result.appID' is not an id".to_string(),
            body: app_id.to_string(),
        })
    }
}

/// Append path segments to `base`. A trailing `""` segment yields a
/// trailing slash.
pub(crate) fn join(base: &Url, segments: &[&str]) -> MamResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| MamError::Config {
            reason: format!("'{}' cannot be used as a base URL", base),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn read_body(response: Response) -> MamResult<(u16, String)> {
    let status = response.status().as_u16();
    let body = response.text().map_err(transport_error)?;
    Ok((status, body))
}

pub(crate) fn transport_error(error: reqwest::Error) -> MamError {
    MamError::Transport { reason: error.to_string() }
}
