use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use bassline_core::{
    BlendMode, BoundaryDirection, Contact, ContactId, Group, GroupId, GroupState, MergeRegistry, NetworkState, Wire,
    WireType,
};
use bassline_format::{
    export_group_as_bassline, import_bassline, validate, BasslineSpec, FormatError, ValidationError, WireSpec,
};
use bassline_scheduler::{BatchScheduler, ImmediateScheduler, Scheduler};

fn root() -> GroupId {
    GroupId::from("root")
}

fn fresh_state() -> NetworkState {
    NetworkState::with_root(root(), "root")
}

fn lattices() -> Arc<MergeRegistry> {
    Arc::new(MergeRegistry::with_builtins())
}

fn synth() -> BasslineSpec {
    serde_json::from_value(json!({
        "name": "synth",
        "version": "1.0",
        "interface": {"inputs": ["freq"], "outputs": ["signal"], "attributes": ["@gain"]},
        "build": {
            "topology": {
                "contacts": [
                    {"id": "freq"},
                    {"id": "signal"},
                    {"id": "@gain", "content": 0.5},
                    {"id": "peak", "blendMode": "merge"}
                ],
                "wires": [
                    {"from": "freq", "to": "osc.in", "type": "directed"},
                    {"from": "osc.out", "to": "signal", "type": "directed"}
                ]
            },
            "gadgets": [{
                "id": "osc",
                "spec": {
                    "name": "oscillator",
                    "primitive": "sine",
                    "interface": {"inputs": ["in"], "outputs": ["out"]},
                    "build": {"topology": {
                        "contacts": [{"id": "in"}, {"id": "out"}],
                        "wires": [{"from": "in", "to": "out", "type": "directed"}]
                    }}
                }
            }]
        },
        "seeds": {"freq": 440}
    }))
    .unwrap()
}

fn content(scheduler: &dyn Scheduler, id: &bassline_core::ContactId) -> Value {
    scheduler.get_contact(id).unwrap().content
}

#[test]
fn import_builds_nested_gadgets_and_seeds() {
    let mut s = ImmediateScheduler::new(fresh_state(), lattices());
    let result = import_bassline(&mut s, &synth(), &root()).unwrap();

    let osc = &result.gadgets["osc"];
    let osc_state = s.get_state(osc).unwrap();
    assert_eq!(osc_state.group.name, "osc");
    assert_eq!(osc_state.group.primitive.as_deref(), Some("sine"));
    assert_eq!(osc_state.group.parent_id.as_ref(), Some(&result.group_id));

    // 440 enters at freq and crosses the gadget to the output.
    assert_eq!(content(&s, &result.contacts["osc.out"]), json!(440));
    assert_eq!(content(&s, &result.contacts["signal"]), json!(440));

    let gain = s.get_contact(&result.contacts["@gain"]).unwrap();
    assert!(gain.is_boundary);
    assert_eq!(gain.boundary_direction, Some(BoundaryDirection::Input));
    assert_eq!(gain.content, json!(0.5));
}

#[test]
fn seeds_follow_the_scheduling_policy() {
    let mut s = BatchScheduler::new(fresh_state(), lattices());
    let result = import_bassline(&mut s, &synth(), &root()).unwrap();
    let signal = &result.contacts["signal"];

    assert_eq!(content(&s, signal), Value::Null);
    s.flush().unwrap();
    assert_eq!(content(&s, signal), json!(440));
}

#[test]
fn export_import_export_is_stable() {
    let mut first = ImmediateScheduler::new(fresh_state(), lattices());
    let imported = import_bassline(&mut first, &synth(), &root()).unwrap();
    let exported = export_group_as_bassline(first.network(), &imported.group_id).unwrap();

    validate(&exported).unwrap();
    assert_eq!(exported.name, "synth");
    assert_eq!(exported.interface, synth().interface);
    assert!(exported.seeds.is_empty());
    assert_eq!(exported.gadgets()[0].id, "osc");
    assert!(exported.wires().contains(&WireSpec {
        from: "freq".to_string(),
        to: "osc.in".to_string(),
        wire_type: bassline_core::WireType::Directed,
    }));

    let mut second = ImmediateScheduler::new(fresh_state(), lattices());
    let reimported = import_bassline(&mut second, &exported, &root()).unwrap();
    assert_eq!(content(&second, &reimported.contacts["signal"]), json!(440));

    let again = export_group_as_bassline(second.network(), &reimported.group_id).unwrap();
    assert_eq!(again, exported);

    let text = serde_json::to_string(&exported).unwrap();
    let parsed: BasslineSpec = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, exported);
}

#[test]
fn tampered_documents_are_refused() {
    let mut s = ImmediateScheduler::new(fresh_state(), lattices());
    let imported = import_bassline(&mut s, &synth(), &root()).unwrap();
    let mut exported = export_group_as_bassline(s.network(), &imported.group_id).unwrap();
    exported.name = "renamed".to_string();

    let groups_before = s.network().group_count();
    assert!(matches!(
        import_bassline(&mut s, &exported, &root()),
        Err(FormatError::Invalid(ValidationError::HashMismatch { .. }))
    ));
    assert_eq!(s.network().group_count(), groups_before);
}

#[test]
fn empty_subgroups_survive_a_round_trip() {
    let g = GroupId::from("g");
    let mut state = fresh_state();
    state.add_group(Group::with_id(g.clone(), "outer", Some(root()))).unwrap();
    state.add_group(Group::with_id(GroupId::from("e"), "empty", Some(g.clone()))).unwrap();
    state.add_contact(&g, Contact::new(g.clone()).with_name("x")).unwrap();

    let exported = export_group_as_bassline(&state, &g).unwrap();
    validate(&exported).unwrap();
    assert_eq!(exported.gadgets()[0].id, "empty");

    let mut s = ImmediateScheduler::new(fresh_state(), lattices());
    let imported = import_bassline(&mut s, &exported, &root()).unwrap();
    let empty = s.get_state(&imported.gadgets["empty"]).unwrap();
    assert!(empty.contacts.is_empty());
    assert_eq!(empty.group.parent_id.as_ref(), Some(&imported.group_id));
}

#[test]
fn internal_at_names_stay_internal() {
    let g = GroupId::from("g");
    let mut state = fresh_state();
    state.add_group(Group::with_id(g.clone(), "outer", Some(root()))).unwrap();
    let hidden = state.add_contact(&g, Contact::new(g.clone()).with_name("@hidden")).unwrap();

    let exported = export_group_as_bassline(&state, &g).unwrap();
    let mut s = ImmediateScheduler::new(fresh_state(), lattices());
    let imported = import_bassline(&mut s, &exported, &root()).unwrap();

    let copy = s.get_contact(&imported.contacts[hidden.as_str()]).unwrap();
    assert!(!copy.is_boundary);
    assert!(s.get_state(&imported.group_id).unwrap().group.boundary_contact_ids.is_empty());
}

/// Sorted (blend mode, boundary direction, degree) per contact.
fn shape(gs: &GroupState) -> Vec<(bool, Option<BoundaryDirection>, usize)> {
    let mut out: Vec<_> = gs
        .contacts
        .values()
        .map(|c| {
            let degree = gs
                .wires
                .values()
                .map(|w| usize::from(w.from_id == c.id) + usize::from(w.to_id == c.id))
                .sum();
            (c.blend_mode == BlendMode::Merge, c.direction(), degree)
        })
        .collect();
    out.sort_by_key(|(merge, direction, degree)| (*merge, direction.map(|d| d == BoundaryDirection::Output), *degree));
    out
}

proptest! {
    #[test]
    fn export_import_preserves_shape(
        kinds in proptest::collection::vec((any::<bool>(), 0u8..3), 1..6),
        edges in proptest::collection::vec((0usize..6, 0usize..6, any::<bool>()), 0..10),
        hollow in any::<bool>(),
        hidden in any::<bool>(),
    ) {
        let g = GroupId::from("g");
        let mut state = fresh_state();
        state.add_group(Group::with_id(g.clone(), "shape", Some(root()))).unwrap();
        if hollow {
            state.add_group(Group::with_id(GroupId::from("hollow"), "hollow", Some(g.clone()))).unwrap();
        }
        let mut ids: Vec<ContactId> = Vec::new();
        for (merge, boundary) in &kinds {
            let contact = match boundary {
                1 => Contact::boundary(g.clone(), BoundaryDirection::Input),
                2 => Contact::boundary(g.clone(), BoundaryDirection::Output),
                _ => Contact::new(g.clone()),
            };
            let blend = if *merge { BlendMode::Merge } else { BlendMode::AcceptLast };
            ids.push(state.add_contact(&g, contact.with_blend_mode(blend)).unwrap());
        }
        if hidden {
            ids.push(state.add_contact(&g, Contact::new(g.clone()).with_name("@hidden")).unwrap());
        }
        for (from, to, directed) in edges {
            let wire_type = if directed { WireType::Directed } else { WireType::Bidirectional };
            let from = ids[from % ids.len()].clone();
            let to = ids[to % ids.len()].clone();
            state.add_wire(Wire::new(g.clone(), from, to, wire_type)).unwrap();
        }

        let exported = export_group_as_bassline(&state, &g).unwrap();
        let mut s = ImmediateScheduler::new(fresh_state(), lattices());
        let imported = import_bassline(&mut s, &exported, &root()).unwrap();

        let before = state.get_group(&g).unwrap();
        let after = s.get_state(&imported.group_id).unwrap();
        prop_assert_eq!(after.contacts.len(), before.contacts.len());
        prop_assert_eq!(after.wires.len(), before.wires.len());
        prop_assert_eq!(
            after.group.boundary_contact_ids.len(),
            before.group.boundary_contact_ids.len()
        );
        prop_assert_eq!(shape(&after), shape(before));
        prop_assert_eq!(after.group.subgroup_ids.len(), usize::from(hollow));
    }
}
