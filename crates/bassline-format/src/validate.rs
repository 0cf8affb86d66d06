//! Structural checks run before a document touches a network.

use std::collections::HashSet;

use crate::error::{FormatError, ValidationError};
use crate::hash::compute_hash;
use crate::spec::BasslineSpec;

/// Checks `spec` and every nested gadget.
///
/// A document passing validation instantiates without structural errors:
/// every interface entry names a local contact and every wire endpoint and
/// seed names an address the document defines. Only the top-level document
/// needs a non-empty build; a nested gadget may be an empty group.
pub fn validate(spec: &BasslineSpec) -> Result<(), FormatError> {
    if spec.build.as_ref().map_or(true, |b| b.is_empty()) {
        return Err(ValidationError::EmptyBuild {
            name: spec.name.clone(),
        }
        .into());
    }
    validate_structure(spec)
}

fn validate_structure(spec: &BasslineSpec) -> Result<(), FormatError> {
    if spec.name.trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }

    let mut local: HashSet<&str> = HashSet::new();
    for contact in spec.contacts() {
        if !local.insert(contact.id.as_str()) {
            return Err(ValidationError::DuplicateContact {
                name: spec.name.clone(),
                id: contact.id.clone(),
            }
            .into());
        }
    }
    let mut gadget_ids: HashSet<&str> = HashSet::new();
    for gadget in spec.gadgets() {
        if !gadget_ids.insert(gadget.id.as_str()) {
            return Err(ValidationError::DuplicateGadget {
                name: spec.name.clone(),
                id: gadget.id.clone(),
            }
            .into());
        }
        validate_structure(&gadget.spec)?;
    }

    let unknown = |context: &str, id: &str| -> FormatError {
        ValidationError::UnknownContact {
            name: spec.name.clone(),
            context: context.to_string(),
            id: id.to_string(),
        }
        .into()
    };

    if let Some(interface) = &spec.interface {
        if let Some(port) = interface.ports().find(|p| !local.contains(p.as_str())) {
            return Err(unknown("interface", port));
        }
    }

    let addresses: HashSet<String> = spec.addresses().into_iter().collect();
    for wire in spec.wires() {
        for end in [&wire.from, &wire.to] {
            if !addresses.contains(end) {
                return Err(unknown("wire", end));
            }
        }
    }
    if let Some(key) = spec.seeds.keys().find(|k| !addresses.contains(*k)) {
        return Err(unknown("seed", key));
    }

    if let Some(expected) = &spec.hash {
        let actual = compute_hash(spec)?;
        if &actual != expected {
            return Err(ValidationError::HashMismatch {
                name: spec.name.clone(),
                expected: expected.clone(),
                actual,
            }
            .into());
        }
    }
    Ok(())
}
