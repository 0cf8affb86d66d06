//! Describing a group subtree as a document.

use std::collections::{HashMap, HashSet};

use bassline_core::{BoundaryDirection, ContactId, CoreError, GroupId, GroupState, NetworkState};

use crate::error::FormatError;
use crate::hash::with_hash;
use crate::spec::{
    port_address, BasslineSpec, Build, ContactSpec, GadgetSpec, Interface, Topology, WireSpec, ATTRIBUTE_PREFIX,
    PORT_SEPARATOR,
};

/// Exports `group_id` and its subgroups as a hashed document.
///
/// Contacts are addressed by their name when it is unique within the group,
/// by their id otherwise; subgroups become gadgets addressed the same way.
/// `@`-prefixed boundary contacts are attribute ports, other boundary
/// contacts are inputs or outputs by direction. Current contents are carried as contact
/// content, so the document has no seeds.
pub fn export_group_as_bassline(state: &NetworkState, group_id: &GroupId) -> Result<BasslineSpec, FormatError> {
    let (spec, _) = export_group(state, group_id)?;
    Ok(with_hash(spec)?)
}

/// Returns the document and the address of every contact in the subtree.
fn export_group(
    state: &NetworkState,
    group_id: &GroupId,
) -> Result<(BasslineSpec, HashMap<ContactId, String>), FormatError> {
    let gs = state
        .get_group(group_id)
        .ok_or_else(|| CoreError::GroupNotFound { id: group_id.clone() })?;

    // `@` marks attribute ports; an internal contact with such a name is
    // addressed by id instead.
    let contact_names = gs.group.contact_ids.iter().map(|id| {
        let name = gs
            .contacts
            .get(id)
            .and_then(|c| c.name.clone().filter(|n| c.is_boundary || !n.starts_with(ATTRIBUTE_PREFIX)));
        (id.to_string(), name)
    });
    let local = local_ids(contact_names);

    let mut addresses: HashMap<ContactId, String> = HashMap::new();
    let mut contacts = Vec::with_capacity(gs.group.contact_ids.len());
    let mut interface = Interface::default();
    for (contact_id, address) in gs.group.contact_ids.iter().zip(local) {
        let Some(contact) = gs.contacts.get(contact_id) else {
            continue;
        };
        if contact.is_boundary && address.starts_with(ATTRIBUTE_PREFIX) {
            interface.attributes.push(address.clone());
        } else if contact.is_boundary {
            match contact.boundary_direction {
                Some(BoundaryDirection::Output) => interface.outputs.push(address.clone()),
                _ => interface.inputs.push(address.clone()),
            }
        }
        contacts.push(ContactSpec {
            id: address.clone(),
            content: contact.content.clone(),
            blend_mode: contact.blend_mode,
            attributes: contact.attributes.clone(),
        });
        addresses.insert(contact_id.clone(), address);
    }

    let gadget_names = gs.group.subgroup_ids.iter().map(|id| {
        let name = state.get_group(id).map(|sub| sub.group.name.clone());
        (id.to_string(), name)
    });
    let gadget_ids = local_ids(gadget_names);

    let mut gadgets = Vec::with_capacity(gs.group.subgroup_ids.len());
    for (subgroup_id, gadget_id) in gs.group.subgroup_ids.iter().zip(gadget_ids) {
        let (spec, inner) = export_group(state, subgroup_id)?;
        for (contact_id, address) in inner {
            addresses.insert(contact_id, port_address(&gadget_id, &address));
        }
        gadgets.push(GadgetSpec { id: gadget_id, spec });
    }

    let wires = owned_wires(gs, &addresses);

    let spec = BasslineSpec {
        name: gs.group.name.clone(),
        primitive: gs.group.primitive.clone(),
        attributes: gs.group.attributes.clone(),
        interface: (!interface.is_empty()).then_some(interface),
        build: Some(Build {
            topology: Topology {
                contacts,
                wires,
                subgroups: gadgets.iter().map(|g| g.id.clone()).collect(),
            },
            gadgets,
        }),
        ..BasslineSpec::default()
    };
    Ok((spec, addresses))
}

fn owned_wires(gs: &GroupState, addresses: &HashMap<ContactId, String>) -> Vec<WireSpec> {
    let mut wires = Vec::with_capacity(gs.wires.len());
    for wire in gs.wires.values() {
        match (addresses.get(&wire.from_id), addresses.get(&wire.to_id)) {
            (Some(from), Some(to)) => wires.push(WireSpec {
                from: from.clone(),
                to: to.clone(),
                wire_type: wire.wire_type,
            }),
            _ => {
                tracing::warn!(
                    wire = %wire.id,
                    group = %gs.group.id,
                    "dropping wire that leaves the exported subtree"
                );
            }
        }
    }
    wires
}

/// Picks a local address per entry: its name when present, usable and
/// unique among siblings, else its id.
fn local_ids(entries: impl Iterator<Item = (String, Option<String>)>) -> Vec<String> {
    let entries: Vec<(String, Option<String>)> = entries.collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut repeated: HashSet<&str> = HashSet::new();
    for name in entries.iter().filter_map(|(_, name)| name.as_deref()) {
        if !seen.insert(name) {
            repeated.insert(name);
        }
    }
    entries
        .iter()
        .map(|(id, name)| match name.as_deref() {
            Some(name)
                if !name.is_empty() && !name.contains(PORT_SEPARATOR) && !repeated.contains(name) =>
            {
                name.to_string()
            }
            _ => id.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bassline_core::{Contact, Group, Wire, WireType};
    use serde_json::json;

    fn network() -> NetworkState {
        let root = GroupId::from("root");
        let g = GroupId::from("g");
        let mut state = NetworkState::with_root(root.clone(), "root");
        state.add_group(Group::with_id(g.clone(), "mixer", Some(root))).unwrap();
        let mut level = Contact::boundary(g.clone(), BoundaryDirection::Input).with_name("level");
        level.id = ContactId::from("c-level");
        let mut out = Contact::boundary(g.clone(), BoundaryDirection::Output).with_name("out");
        out.id = ContactId::from("c-out");
        let mut gain = Contact::boundary(g.clone(), BoundaryDirection::Input)
            .with_name("@gain")
            .with_content(json!(0.5));
        gain.id = ContactId::from("c-gain");
        for contact in [level, out, gain] {
            state.add_contact(&g, contact).unwrap();
        }
        state
            .add_wire(Wire::new(
                g,
                ContactId::from("c-level"),
                ContactId::from("c-out"),
                WireType::Directed,
            ))
            .unwrap();
        state
    }

    #[test]
    fn interface_is_detected() {
        let spec = export_group_as_bassline(&network(), &GroupId::from("g")).unwrap();
        let interface = spec.interface.clone().unwrap();
        assert_eq!(interface.inputs, vec!["level".to_string()]);
        assert_eq!(interface.outputs, vec!["out".to_string()]);
        assert_eq!(interface.attributes, vec!["@gain".to_string()]);
        assert_eq!(spec.contacts()[2].content, json!(0.5));
        assert_eq!(
            spec.wires(),
            &[WireSpec {
                from: "level".to_string(),
                to: "out".to_string(),
                wire_type: WireType::Directed,
            }]
        );
        assert!(spec.hash.is_some());
    }

    #[test]
    fn internal_contacts_never_become_attribute_ports() {
        let mut state = network();
        let g = GroupId::from("g");
        let mut hidden = Contact::new(g.clone()).with_name("@hidden");
        hidden.id = ContactId::from("c-hidden");
        state.add_contact(&g, hidden).unwrap();

        let spec = export_group_as_bassline(&state, &g).unwrap();
        let interface = spec.interface.clone().unwrap();
        assert_eq!(interface.attributes, vec!["@gain".to_string()]);
        assert!(interface.ports().all(|p| p != "c-hidden"));
        assert_eq!(spec.contacts()[3].id, "c-hidden");
    }

    #[test]
    fn repeated_names_fall_back_to_ids() {
        let ids = local_ids(
            vec![
                ("1".to_string(), Some("x".to_string())),
                ("2".to_string(), Some("x".to_string())),
                ("3".to_string(), Some("a.b".to_string())),
                ("4".to_string(), None),
                ("5".to_string(), Some("y".to_string())),
            ]
            .into_iter(),
        );
        assert_eq!(ids, vec!["1", "2", "3", "4", "y"]);
    }

    #[test]
    fn unknown_group_is_an_error() {
        assert!(matches!(
            export_group_as_bassline(&network(), &GroupId::from("nope")),
            Err(FormatError::Core(CoreError::GroupNotFound { .. }))
        ));
    }
}
