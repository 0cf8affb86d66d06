//! The declarative Bassline document.
//!
//! A [`BasslineSpec`] describes one group: its contacts and wires, an
//! optional boundary interface, nested gadgets, and seed values. Contacts are
//! addressed by local string ids; a contact inside a nested gadget is
//! addressed as `"<gadgetId>.<localId>"`, to any depth.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bassline_core::{BlendMode, WireType};

/// Separates a gadget id from the address inside it.
pub const PORT_SEPARATOR: char = '.';

/// Prefix marking a contact as an attribute port.
pub const ATTRIBUTE_PREFIX: char = '@';

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasslineSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Marks the group as a built-in computed gadget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primitive: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<Interface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,
    /// Values written after the topology is built, keyed by address.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub seeds: IndexMap<String, Value>,
    /// blake3 hex digest of this document with `hash` cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Local contact ids exposed at the group boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl Interface {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty() && self.attributes.is_empty()
    }

    pub fn ports(&self) -> impl Iterator<Item = &String> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .chain(self.attributes.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(default)]
    pub topology: Topology,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gadgets: Vec<GadgetSpec>,
}

impl Build {
    pub fn is_empty(&self) -> bool {
        self.topology.contacts.is_empty() && self.gadgets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    #[serde(default)]
    pub contacts: Vec<ContactSpec>,
    #[serde(default)]
    pub wires: Vec<WireSpec>,
    /// Ids of the nested gadgets, in order. Informational.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subgroups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSpec {
    pub id: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Value>,
}

impl ContactSpec {
    pub fn new(id: impl Into<String>) -> Self {
        ContactSpec {
            id: id.into(),
            content: Value::Null,
            blend_mode: BlendMode::default(),
            attributes: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSpec {
    pub from: String,
    pub to: String,
    #[serde(default, rename = "type")]
    pub wire_type: WireType,
}

/// A nested document instantiated as a subgroup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GadgetSpec {
    pub id: String,
    pub spec: BasslineSpec,
}

impl BasslineSpec {
    pub fn new(name: impl Into<String>) -> Self {
        BasslineSpec {
            name: name.into(),
            ..BasslineSpec::default()
        }
    }

    pub fn contacts(&self) -> &[ContactSpec] {
        self.build
            .as_ref()
            .map(|b| b.topology.contacts.as_slice())
            .unwrap_or_default()
    }

    pub fn wires(&self) -> &[WireSpec] {
        self.build
            .as_ref()
            .map(|b| b.topology.wires.as_slice())
            .unwrap_or_default()
    }

    pub fn gadgets(&self) -> &[GadgetSpec] {
        self.build
            .as_ref()
            .map(|b| b.gadgets.as_slice())
            .unwrap_or_default()
    }

    /// Every address a wire or seed in this document may use: local contact
    /// ids, then each gadget's addresses prefixed with its id.
    pub fn addresses(&self) -> Vec<String> {
        let mut out: Vec<String> = self.contacts().iter().map(|c| c.id.clone()).collect();
        for gadget in self.gadgets() {
            out.extend(
                gadget
                    .spec
                    .addresses()
                    .into_iter()
                    .map(|inner| port_address(&gadget.id, &inner)),
            );
        }
        out
    }
}

/// Joins a gadget id and an address inside it.
pub fn port_address(gadget: &str, inner: &str) -> String {
    format!("{gadget}{PORT_SEPARATOR}{inner}")
}
