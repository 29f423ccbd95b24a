// ABOUTME: Typed calls over the JSON-RPC control channel.
// ABOUTME: Workspace join, activity notification, and port sharing requests.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::error::BoxError;
use crate::layers::ControlChannel;

pub const JOIN_WORKSPACE_METHOD: &str = "workspace.joinWorkspace";
pub const NOTIFY_ACTIVITY_METHOD: &str = "ICodespaceHostService.notifyCodespaceOfClientActivity";
pub const START_SHARING_METHOD: &str = "serverSharing.startSharing";
pub const GET_STREAM_METHOD: &str = "streamManager.getStream";

/// Connection mode requested when joining; the client runs next to the user.
pub const CONNECTION_MODE_LOCAL: &str = "local";

/// Errors from a typed control-channel call.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("failed to encode {method} params: {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{method} failed: {source}")]
    Call {
        method: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to decode {method} result: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Call `method` with `params` and decode the result into `R`.
pub async fn invoke<P, R>(
    control: &dyn ControlChannel,
    method: &str,
    params: &P,
) -> Result<R, RpcError>
where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let params = serde_json::to_value(params).map_err(|e| RpcError::Encode {
        method: method.to_string(),
        source: e,
    })?;

    let result = control
        .call(method, params)
        .await
        .map_err(|e| RpcError::Call {
            method: method.to_string(),
            source: e,
        })?;

    serde_json::from_value(result).map_err(|e| RpcError::Decode {
        method: method.to_string(),
        source: e,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    pub is_non_interactive: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinWorkspaceArgs {
    pub id: String,
    pub connection_mode: String,
    pub joining_user_session_token: String,
    pub client_capabilities: ClientCapabilities,
}

impl JoinWorkspaceArgs {
    /// Join request for an interactive, local client.
    pub fn new(session_id: &str, session_token: &str) -> Self {
        Self {
            id: session_id.to_string(),
            connection_mode: CONNECTION_MODE_LOCAL.to_string(),
            joining_user_session_token: session_token.to_string(),
            client_capabilities: ClientCapabilities {
                is_non_interactive: false,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinWorkspaceResult {
    pub session_number: i64,
}

/// Admit this client into the shared workspace. Issued once per session; no retries.
pub async fn join_workspace(
    control: &dyn ControlChannel,
    args: &JoinWorkspaceArgs,
) -> Result<JoinWorkspaceResult, RpcError> {
    invoke(control, JOIN_WORKSPACE_METHOD, args).await
}

/// Tell the host the client is active so the workspace is not reclaimed.
pub async fn notify_activity(
    control: &dyn ControlChannel,
    client_name: &str,
    reason: &str,
) -> Result<(), RpcError> {
    let params = json!([client_name, [reason]]);
    let _: serde_json::Value = invoke(control, NOTIFY_ACTIVITY_METHOD, &params).await?;
    Ok(())
}

/// Identifies the stream a shared port is served on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStream {
    pub stream_name: String,
    pub stream_condition: String,
}

/// Ask the host to share `port` under `session_name`.
pub async fn start_sharing(
    control: &dyn ControlChannel,
    session_name: &str,
    port: u16,
) -> Result<SharedStream, RpcError> {
    let params = json!([port, session_name, format!("http://localhost:{}", port)]);
    invoke(control, START_SHARING_METHOD, &params).await
}

/// Resolve a shared stream to the id of an SSH channel that carries it.
pub async fn get_stream(
    control: &dyn ControlChannel,
    stream: &SharedStream,
) -> Result<String, RpcError> {
    let params = [stream.stream_name.as_str(), stream.stream_condition.as_str()];
    invoke(control, GET_STREAM_METHOD, &params).await
}
