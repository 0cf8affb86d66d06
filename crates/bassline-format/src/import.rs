//! Instantiating a document against a scheduler.

use indexmap::IndexMap;
use serde_json::Value;

use bassline_core::{BoundaryDirection, Contact, ContactId, Group, GroupId};
use bassline_scheduler::Scheduler;

use crate::error::{FormatError, ValidationError};
use crate::spec::{port_address, BasslineSpec};
use crate::validate::validate;

/// What an import created, keyed by document address.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub group_id: GroupId,
    /// Address (`"in"`, `"gadget.port"`) to created contact.
    pub contacts: IndexMap<String, ContactId>,
    /// Gadget address to created subgroup.
    pub gadgets: IndexMap<String, GroupId>,
}

/// Builds `spec` as a new subgroup of `parent`.
///
/// The document is validated before anything is created. Contacts get fresh
/// ids and keep their document id as `name`; nested gadget groups are named
/// after their gadget id. Seeds are scheduled last, nested gadgets' first,
/// and propagate under the scheduler's policy.
pub fn import_bassline(
    scheduler: &mut dyn Scheduler,
    spec: &BasslineSpec,
    parent: &GroupId,
) -> Result<ImportResult, FormatError> {
    validate(spec)?;
    scheduler.get_state(parent)?;

    let mut seeds = Vec::new();
    let built = instantiate(scheduler, spec, &spec.name, parent, &mut seeds)?;
    for (contact_id, value) in seeds {
        scheduler.schedule_update(&contact_id, value)?;
    }

    tracing::debug!(
        name = %spec.name,
        group = %built.group_id,
        contacts = built.contacts.len(),
        gadgets = built.gadgets.len(),
        "imported bassline"
    );
    Ok(built)
}

fn instantiate(
    scheduler: &mut dyn Scheduler,
    spec: &BasslineSpec,
    group_name: &str,
    parent: &GroupId,
    seeds: &mut Vec<(ContactId, Value)>,
) -> Result<ImportResult, FormatError> {
    let mut group = Group::new(group_name, Some(parent.clone()));
    group.primitive = spec.primitive.clone();
    group.attributes = spec.attributes.clone();
    let group_id = scheduler.add_group(group)?;

    let interface = spec.interface.clone().unwrap_or_default();
    let mut contacts: IndexMap<String, ContactId> = IndexMap::new();
    for contact_spec in spec.contacts() {
        let direction = if interface.outputs.contains(&contact_spec.id) {
            Some(BoundaryDirection::Output)
        } else if interface.inputs.contains(&contact_spec.id) || interface.attributes.contains(&contact_spec.id) {
            Some(BoundaryDirection::Input)
        } else {
            None
        };
        let mut contact = match direction {
            Some(direction) => Contact::boundary(group_id.clone(), direction),
            None => Contact::new(group_id.clone()),
        }
        .with_content(contact_spec.content.clone())
        .with_blend_mode(contact_spec.blend_mode)
        .with_name(contact_spec.id.clone());
        contact.attributes = contact_spec.attributes.clone();
        let id = scheduler.add_contact(&group_id, contact)?;
        contacts.insert(contact_spec.id.clone(), id);
    }

    let mut gadgets: IndexMap<String, GroupId> = IndexMap::new();
    for gadget in spec.gadgets() {
        let inner = instantiate(scheduler, &gadget.spec, &gadget.id, &group_id, seeds)?;
        gadgets.insert(gadget.id.clone(), inner.group_id);
        for (address, id) in inner.gadgets {
            gadgets.insert(port_address(&gadget.id, &address), id);
        }
        for (address, id) in inner.contacts {
            contacts.insert(port_address(&gadget.id, &address), id);
        }
    }

    let resolve = |address: &str| -> Result<ContactId, FormatError> {
        contacts.get(address).cloned().ok_or_else(|| {
            ValidationError::UnknownContact {
                name: spec.name.clone(),
                context: "wire".to_string(),
                id: address.to_string(),
            }
            .into()
        })
    };
    for wire in spec.wires() {
        let from = resolve(&wire.from)?;
        let to = resolve(&wire.to)?;
        scheduler.connect(&from, &to, wire.wire_type)?;
    }
    for (address, value) in &spec.seeds {
        seeds.push((resolve(address)?, value.clone()));
    }

    Ok(ImportResult {
        group_id,
        contacts,
        gadgets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bassline_core::{MergeRegistry, NetworkState};
    use bassline_scheduler::ImmediateScheduler;
    use serde_json::json;

    fn scheduler() -> ImmediateScheduler {
        ImmediateScheduler::new(
            NetworkState::with_root(GroupId::from("root"), "root"),
            Arc::new(MergeRegistry::with_builtins()),
        )
    }

    fn relay() -> BasslineSpec {
        serde_json::from_value(json!({
            "name": "relay",
            "interface": {"inputs": ["in"], "outputs": ["out"]},
            "build": {"topology": {
                "contacts": [{"id": "in"}, {"id": "out"}],
                "wires": [{"from": "in", "to": "out", "type": "directed"}]
            }},
            "seeds": {"in": "ping"}
        }))
        .unwrap()
    }

    #[test]
    fn builds_contacts_wires_and_seeds() {
        let mut s = scheduler();
        let result = import_bassline(&mut s, &relay(), &GroupId::from("root")).unwrap();

        let group = s.get_state(&result.group_id).unwrap();
        assert_eq!(group.group.name, "relay");
        assert_eq!(group.group.boundary_contact_ids.len(), 2);
        assert_eq!(group.wires.len(), 1);

        let out = s.get_contact(&result.contacts["out"]).unwrap();
        assert_eq!(out.name.as_deref(), Some("out"));
        assert_eq!(out.boundary_direction, Some(BoundaryDirection::Output));
        assert_eq!(out.content, json!("ping"));
    }

    #[test]
    fn invalid_documents_change_nothing() {
        let mut s = scheduler();
        let mut spec = relay();
        spec.seeds.insert("nowhere".to_string(), json!(1));

        assert!(matches!(
            import_bassline(&mut s, &spec, &GroupId::from("root")),
            Err(FormatError::Invalid(ValidationError::UnknownContact { .. }))
        ));
        assert_eq!(s.network().group_count(), 1);
        assert_eq!(s.network().contact_count(), 0);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut s = scheduler();
        assert!(matches!(
            import_bassline(&mut s, &relay(), &GroupId::from("elsewhere")),
            Err(FormatError::Scheduler(_))
        ));
        assert_eq!(s.network().group_count(), 1);
    }
}
