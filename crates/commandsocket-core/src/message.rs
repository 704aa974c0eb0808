//! Protocol messages.
//!
//! Both roles exchange one JSON document per socket frame. The client role
//! tags requests with an `action` string and a `reqID` drawn from its
//! correlation ring; the hub role sends typed requests carrying a
//! process-wide `id`. Unsolicited state pushes carry a `type` category and
//! only the fields the sender wants to update.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request as sent by the client role: `{ action, reqID, ...params }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequest {
    pub action: String,
    #[serde(rename = "reqID")]
    pub req_id: u64,
    #[serde(flatten)]
    pub params: Value,
}

/// A response as received by the client role: `{ resID, ...fields }`.
///
/// Frames without a `resID` are not correlatable and are dropped by the
/// connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientResponse {
    #[serde(rename = "resID")]
    pub res_id: u64,
    #[serde(flatten)]
    pub fields: Value,
}

/// Wraps a hub request or response with its correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correlated<T> {
    pub id: u64,
    #[serde(flatten)]
    pub body: T,
}

/// Severity of an alert shown in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warn,
    Error,
}

/// Requests the hub can dispatch to its primary client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HubRequest {
    Alert {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        level: Option<AlertLevel>,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Vec<String>>,
    },
    Status {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Input {
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<bool>,
    },
    Pick {
        title: String,
        options: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        multi: Option<bool>,
    },
    Command {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<Vec<Value>>,
    },
    DebugStart {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        folder: Option<String>,
    },
    DebugStop,
    Activate {
        extension: String,
    },
}

/// Result payload of a hub request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HubResponse {
    Ok,
    String { value: String },
    Strings { value: Vec<String> },
    Error { message: String },
}

/// An unsolicited state push from an editor client.
///
/// Every field beyond the category tag is optional where the editor may
/// omit it; the hub merges only what is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StatePush {
    Version {
        version: String,
    },
    Focus {
        focus: bool,
    },
    Commands {
        commands: Vec<String>,
    },
    Debug {
        debug: bool,
        name: Option<String>,
        breakpoints: Option<u32>,
    },
    Environment {
        host: Option<String>,
        name: Option<String>,
        language: Option<String>,
        remote: Option<String>,
        shell: Option<String>,
    },
    Extensions {
        extensions: Vec<String>,
        active: Vec<String>,
    },
    Workspace {
        name: Option<String>,
        trusted: Option<bool>,
        folders: Option<Vec<String>>,
    },
    Git {
        branch: Option<String>,
        commit: Option<String>,
        remote: Option<String>,
        url: Option<String>,
        ahead: Option<u32>,
        behind: Option<u32>,
        changes: Option<u32>,
    },
    Editor {
        name: Option<String>,
        path: Option<String>,
        language: Option<String>,
        encoding: Option<String>,
        eol: Option<String>,
        indent: Option<u32>,
        tabs: Option<bool>,
        column: Option<u32>,
        line: Option<u32>,
        lines: Option<u32>,
        warnings: Option<u32>,
        errors: Option<u32>,
        dirty: Option<bool>,
    },
}
