//! Message formats for reaching a network owned by another task.
//!
//! Requests are `{id, type, data}`, responses `{id, type: success|error,
//! data?, error?}`, and notifications `{type: change|state-update, groupId,
//! change?, state?}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use bassline_core::{
    BlendMode, BoundaryDirection, Change, ContactId, GroupId, GroupState, NetworkState, WireId, WireType,
};

use crate::error::SchedulerError;

fn yes() -> bool {
    true
}

/// An operation on the network, carried as a request's `type` and `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    RegisterGroup {
        group: GroupState,
    },
    AddGroup {
        name: String,
        #[serde(default)]
        parent_id: Option<GroupId>,
        #[serde(default)]
        primitive: Option<String>,
    },
    RemoveGroup {
        group_id: GroupId,
    },
    AddContact {
        group_id: GroupId,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        blend_mode: BlendMode,
        #[serde(default)]
        name: Option<String>,
        /// Makes the contact a boundary contact.
        #[serde(default)]
        boundary_direction: Option<BoundaryDirection>,
    },
    RemoveContact {
        contact_id: ContactId,
    },
    Connect {
        from_id: ContactId,
        to_id: ContactId,
        #[serde(default, rename = "type")]
        wire_type: WireType,
    },
    Disconnect {
        wire_id: WireId,
    },
    ScheduleUpdate {
        contact_id: ContactId,
        content: Value,
    },
    SchedulePropagation {
        from_id: ContactId,
        to_id: ContactId,
        content: Value,
    },
    Flush,
    GetState {
        group_id: GroupId,
    },
    GetContact {
        contact_id: ContactId,
    },
    GetWire {
        wire_id: WireId,
    },
    ExportState,
    ImportState {
        state: NetworkState,
    },
    ExtractToGroup {
        contact_ids: Vec<ContactId>,
        group_name: String,
        parent_group_id: GroupId,
    },
    CopyGroup {
        group_id: GroupId,
        target_parent_id: GroupId,
        #[serde(default)]
        new_name: Option<String>,
        #[serde(default = "yes")]
        deep: bool,
    },
    CopySelection {
        #[serde(default)]
        contact_ids: Vec<ContactId>,
        #[serde(default)]
        group_ids: Vec<GroupId>,
        target_group_id: GroupId,
        #[serde(default = "yes")]
        include_wires: bool,
        #[serde(default = "yes")]
        deep: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Request {
    pub fn new(id: impl Into<String>, command: &Command) -> Result<Self, SchedulerError> {
        let mut encoded = serde_json::to_value(command)?;
        let kind = match encoded.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_string(),
            None => {
                return Err(SchedulerError::InvalidRequest(
                    "command encoded without a type".to_string(),
                ))
            }
        };
        let data = encoded
            .as_object_mut()
            .and_then(|obj| obj.remove("data"))
            .unwrap_or(Value::Null);
        Ok(Request {
            id: id.into(),
            kind,
            data,
        })
    }

    /// Decodes the request's `type` and `data` into a [`Command`].
    pub fn command(&self) -> Result<Command, SchedulerError> {
        serde_json::from_value(json!({ "type": self.kind, "data": self.data }))
            .map_err(|err| SchedulerError::InvalidRequest(format!("{}: {err}", self.kind)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(rename = "type")]
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(id: impl Into<String>, data: Value) -> Self {
        Response {
            id: id.into(),
            status: ResponseStatus::Success,
            data: (!data.is_null()).then_some(data),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: &SchedulerError) -> Self {
        Response {
            id: id.into(),
            status: ResponseStatus::Error,
            data: None,
            error: Some(error.to_string()),
        }
    }

    /// The payload, or the reported error.
    pub fn into_result(self) -> Result<Value, SchedulerError> {
        match self.status {
            ResponseStatus::Success => Ok(self.data.unwrap_or(Value::Null)),
            ResponseStatus::Error => Err(SchedulerError::Remote {
                id: self.id,
                message: self.error.unwrap_or_default(),
            }),
        }
    }
}

/// Pushed to every listener after a request's changes are acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Notification {
    Change { group_id: GroupId, change: Change },
    StateUpdate { group_id: GroupId, state: GroupState },
}

impl Notification {
    pub fn group_id(&self) -> &GroupId {
        match self {
            Notification::Change { group_id, .. } | Notification::StateUpdate { group_id, .. } => group_id,
        }
    }
}
