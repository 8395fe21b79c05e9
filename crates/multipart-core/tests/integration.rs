//! End-to-end tests for cell representations, placement rules, hooks,
//! capabilities, persistence, and mirror replay.

use multipart_core::capability::{CapabilityJoiners, CapabilityKind, ContainerCapability};
use multipart_core::config::{AddPolicy, MultipartConfig};
use multipart_core::engine::{MultipartEngine, MultipartError};
use multipart_core::host::{CellGrid, HostError, HostGrid};
use multipart_core::id::CellId;
use multipart_core::persist::{ReadMode, WriteMode, decode_cell, encode_cell};
use multipart_core::registry::PartRegistry;
use multipart_core::representation::{Representation, RepresentationKind};
use multipart_core::slot::{Face, Slot};
use multipart_core::sync::{NotifyLevel, Side, SyncDelta};
use multipart_core::test_utils::*;
use std::sync::Arc;

fn slots_of(grid: &CellGrid, cell: CellId) -> Vec<Slot> {
    grid.representation(cell)
        .map(|rep| rep.parts().map(|p| p.slot()).collect())
        .unwrap_or_default()
}

// ===========================================================================
// Representation transitions
// ===========================================================================

#[test]
fn second_part_promotes_and_removal_collapses() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();

    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    assert_eq!(grid.kind(cell), Some(RepresentationKind::SinglePart));

    engine.add_part(&mut grid, cell, Slot::DOWN, state(PANEL), None).unwrap();
    assert_eq!(grid.kind(cell), Some(RepresentationKind::Container));
    assert_eq!(slots_of(&grid, cell), vec![Slot::DOWN, Slot::UP]);

    let removed = engine.remove_part(&mut grid, cell, Slot::UP).unwrap().unwrap();
    assert_eq!(removed.slot(), Slot::UP);
    assert_eq!(grid.kind(cell), Some(RepresentationKind::SinglePart));
    assert_eq!(engine.get(&grid, cell, Slot::DOWN).unwrap().cell(), cell);
}

#[test]
fn lone_ticking_part_needs_ticking_container() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();

    engine
        .add_part(&mut grid, cell, Slot::NORTH, state(PUMP), Some(pump_tile()))
        .unwrap();
    assert_eq!(grid.kind(cell), Some(RepresentationKind::TickingContainer));
    assert_eq!(slots_of(&grid, cell), vec![Slot::NORTH]);

    engine.remove_part(&mut grid, cell, Slot::NORTH).unwrap();
    assert_eq!(grid.kind(cell), Some(RepresentationKind::Absent));
}

#[test]
fn ticking_part_promotes_single_part_cell() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine
        .add_part(&mut grid, cell, Slot::Center, state(PUMP), Some(pump_tile()))
        .unwrap();
    assert_eq!(grid.kind(cell), Some(RepresentationKind::TickingContainer));
}

#[test]
fn ticking_part_promotes_plain_container() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine.add_part(&mut grid, cell, Slot::DOWN, state(PANEL), None).unwrap();
    engine
        .add_part(&mut grid, cell, Slot::Center, state(PUMP), Some(pump_tile()))
        .unwrap();
    assert_eq!(grid.kind(cell), Some(RepresentationKind::TickingContainer));
    assert!(
        grid.representation(cell)
            .unwrap()
            .parts()
            .all(|p| p.cell() == cell)
    );
}

#[test]
fn removing_last_ticking_part_demotes() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine.add_part(&mut grid, cell, Slot::DOWN, state(NOTE), Some(note_tile("x"))).unwrap();
    engine
        .add_part(&mut grid, cell, Slot::Center, state(PUMP), Some(pump_tile()))
        .unwrap();

    engine.remove_part(&mut grid, cell, Slot::Center).unwrap();
    assert_eq!(grid.kind(cell), Some(RepresentationKind::Container));
}

#[test]
fn ticking_part_survives_as_last_part() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine
        .add_part(&mut grid, cell, Slot::Center, state(PUMP), Some(pump_tile()))
        .unwrap();
    engine.remove_part(&mut grid, cell, Slot::UP).unwrap();
    assert_eq!(grid.kind(cell), Some(RepresentationKind::TickingContainer));
}

#[test]
fn removed_tile_is_invalidated_and_collapsed_tile_validated() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(NOTE), Some(note_tile("a"))).unwrap();
    engine.add_part(&mut grid, cell, Slot::DOWN, state(NOTE), Some(note_tile("b"))).unwrap();

    let removed = engine.remove_part(&mut grid, cell, Slot::UP).unwrap().unwrap();
    assert!(!removed.tile_as::<NoteTile>().unwrap().valid);

    let remaining = engine.get(&grid, cell, Slot::DOWN).unwrap();
    assert!(remaining.tile_as::<NoteTile>().unwrap().valid);
}

// ===========================================================================
// Placement rules
// ===========================================================================

#[test]
fn ghost_slot_on_occupied_slot_blocks_placement() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::Center, state(GEM), None).unwrap();

    // NORTH is free and the sign's plate clears the gem, but the sign also
    // claims the center slot.
    assert!(engine.get(&grid, cell, Slot::NORTH).is_none());
    assert!(!engine.can_add_part(&grid, cell, Slot::NORTH, state(SIGN), None).unwrap());
    assert!(engine.can_add_part(&grid, cell, Slot::NORTH, state(PANEL), None).unwrap());
}

#[test]
fn resident_ghost_slot_blocks_primary_slot() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::NORTH, state(SIGN), None).unwrap();
    assert!(!engine.can_add_part(&grid, cell, Slot::Center, state(GEM), None).unwrap());
}

#[test]
fn two_parts_cannot_share_a_ghost_slot() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::NORTH, state(SIGN), None).unwrap();
    assert!(!engine.can_add_part(&grid, cell, Slot::SOUTH, state(SIGN), None).unwrap());
    assert!(engine.can_add_part(&grid, cell, Slot::SOUTH, state(PANEL), None).unwrap());
}

#[test]
fn occupied_primary_slot_blocks_placement() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    assert!(!engine.can_add_part(&grid, cell, Slot::UP, state(PANEL), None).unwrap());
}

#[test]
fn adding_into_occupied_slot_fails_under_either_policy() {
    for policy in [AddPolicy::Trust, AddPolicy::Validate] {
        let (registry, log) = test_registry();
        let engine = MultipartEngine::new(registry).with_config(MultipartConfig {
            add_policy: policy,
            ..MultipartConfig::default()
        });
        let (mut grid, cell) = authoritative_grid();
        engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
        log.clear();
        grid.drain_journal();
        grid.drain_outbox();

        let err = engine
            .add_part(&mut grid, cell, Slot::UP, state(PANEL), None)
            .unwrap_err();
        assert!(matches!(err, MultipartError::Occupied { slot: Slot::UP }), "{policy:?}");
        assert_eq!(grid.kind(cell), Some(RepresentationKind::SinglePart));
        assert_eq!(grid.representation(cell).unwrap().len(), 1);
        assert!(log.calls().is_empty());
        assert!(grid.journal().is_empty());
        assert!(grid.outbox().is_empty());

        let err = engine
            .place_part(&mut grid, cell, Slot::UP, state(SIGN))
            .unwrap_err();
        assert!(matches!(err, MultipartError::Occupied { slot: Slot::UP }));
    }
}

#[test]
fn overlapping_boxes_block_placement() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    assert!(!engine.can_add_part(&grid, cell, Slot::Center, state(BULKY), None).unwrap());
    // The post only touches the up plate.
    assert!(engine.can_add_part(&grid, cell, Slot::Center, state(POST), None).unwrap());
}

#[test]
fn full_cell_of_standard_parts_fits() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    for slot in Slot::all() {
        assert!(
            engine.can_add_part(&grid, cell, slot, state(PANEL), None).unwrap(),
            "{slot}"
        );
        engine.add_part(&mut grid, cell, slot, state(PANEL), None).unwrap();
    }
    assert_eq!(grid.representation(cell).unwrap().len(), 27);
}

#[test]
fn trust_policy_inserts_without_checking() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine.add_part(&mut grid, cell, Slot::Center, state(BULKY), None).unwrap();
    assert_eq!(grid.representation(cell).unwrap().len(), 2);
}

#[test]
fn validate_policy_rejects_conflicts() {
    let (registry, _log) = test_registry();
    let engine = MultipartEngine::new(registry).with_config(MultipartConfig {
        add_policy: AddPolicy::Validate,
        ..MultipartConfig::default()
    });
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    grid.drain_journal();

    let err = engine
        .add_part(&mut grid, cell, Slot::Center, state(BULKY), None)
        .unwrap_err();
    assert!(matches!(err, MultipartError::Rejected { slot: Slot::Center }));
    assert_eq!(grid.kind(cell), Some(RepresentationKind::SinglePart));
    assert!(grid.journal().is_empty());
}

// ===========================================================================
// Hooks and notifications
// ===========================================================================

#[test]
fn hooks_run_self_first_then_siblings() {
    let (engine, log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine.add_part(&mut grid, cell, Slot::DOWN, state(PANEL), None).unwrap();
    assert_eq!(
        log.calls(),
        vec![
            HookCall::Added { slot: Slot::UP },
            HookCall::Added { slot: Slot::DOWN },
            HookCall::PartAdded {
                observer: Slot::UP,
                added: Slot::DOWN
            },
        ]
    );

    log.clear();
    engine.remove_part(&mut grid, cell, Slot::UP).unwrap();
    assert_eq!(
        log.calls(),
        vec![
            HookCall::Removed { slot: Slot::UP },
            HookCall::PartRemoved {
                observer: Slot::DOWN,
                removed: Slot::UP
            },
        ]
    );
}

#[test]
fn migration_sends_one_full_resync_instead_of_add() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    let first = grid.drain_outbox();
    assert!(matches!(first.as_slice(), [(_, SyncDelta::Add { .. })]));

    engine.add_part(&mut grid, cell, Slot::DOWN, state(PANEL), None).unwrap();
    let second = grid.drain_outbox();
    assert!(matches!(second.as_slice(), [(_, SyncDelta::FullResync { .. })]));

    engine.add_part(&mut grid, cell, Slot::NORTH, state(PANEL), None).unwrap();
    let third = grid.drain_outbox();
    assert!(matches!(third.as_slice(), [(_, SyncDelta::Add { .. })]));
}

#[test]
fn removal_notifies_by_side() {
    let (engine, log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    grid.drain_journal();
    grid.drain_outbox();
    engine.remove_part(&mut grid, cell, Slot::UP).unwrap();
    assert!(grid.journal().contains(&multipart_core::host::HostEvent::VisualUpdate {
        cell,
        level: NotifyLevel::Full
    }));
    assert!(matches!(grid.outbox(), [(_, SyncDelta::Remove { .. })]));

    let (mut mirror, mcell) = mirrored_grid();
    engine.add_part(&mut mirror, mcell, Slot::UP, state(PANEL), None).unwrap();
    mirror.drain_journal();
    log.clear();
    engine.remove_part(&mut mirror, mcell, Slot::UP).unwrap();
    assert!(mirror.journal().contains(&multipart_core::host::HostEvent::VisualUpdate {
        cell: mcell,
        level: NotifyLevel::RenderOnly
    }));
    assert!(mirror.outbox().is_empty());
    // Removal hooks run on both sides.
    assert_eq!(log.calls(), vec![HookCall::Removed { slot: Slot::UP }]);
}

/// A host that refuses every representation swap.
struct RefusingHost(CellGrid);

impl HostGrid for RefusingHost {
    fn side(&self) -> Side {
        self.0.side()
    }

    fn representation(&self, cell: CellId) -> Option<&Representation> {
        self.0.representation(cell)
    }

    fn representation_mut(&mut self, cell: CellId) -> Option<&mut Representation> {
        self.0.representation_mut(cell)
    }

    fn take_representation(&mut self, cell: CellId) -> Result<Representation, HostError> {
        self.0.take_representation(cell)
    }

    fn set_representation(&mut self, cell: CellId, _rep: Representation) -> Result<(), HostError> {
        Err(HostError::Refused {
            cell,
            reason: "read-only region".to_string(),
        })
    }

    fn notify_visual_update(&mut self, cell: CellId, level: NotifyLevel) {
        self.0.notify_visual_update(cell, level);
    }

    fn recompute_lighting(&mut self, cell: CellId) {
        self.0.recompute_lighting(cell);
    }

    fn broadcast(&mut self, cell: CellId, delta: SyncDelta) {
        self.0.broadcast(cell, delta);
    }
}

#[test]
fn refused_swap_propagates() {
    let (engine, _log) = test_engine();
    let (grid, cell) = authoritative_grid();
    let mut host = RefusingHost(grid);
    let err = engine
        .add_part(&mut host, cell, Slot::UP, state(PANEL), None)
        .unwrap_err();
    assert!(matches!(err, MultipartError::Host(HostError::Refused { .. })));
    assert!(host.0.outbox().is_empty());
}

// ===========================================================================
// Ticking
// ===========================================================================

#[test]
fn tick_reaches_ticking_tiles_only() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(NOTE), Some(note_tile("n"))).unwrap();
    engine
        .add_part(&mut grid, cell, Slot::Center, state(PUMP), Some(pump_tile()))
        .unwrap();

    for _ in 0..3 {
        assert_eq!(engine.tick(&mut grid, cell).unwrap(), 1);
    }
    let pump = engine.get(&grid, cell, Slot::Center).unwrap();
    assert_eq!(pump.tile_as::<PumpTile>().unwrap().ticks, 3);
}

#[test]
fn tick_demotes_when_tiles_stop_ticking() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine.add_part(&mut grid, cell, Slot::DOWN, state(PANEL), None).unwrap();
    engine
        .add_part(&mut grid, cell, Slot::Center, state(PUMP), Some(pump_tile()))
        .unwrap();

    engine
        .get_mut(&mut grid, cell, Slot::Center)
        .unwrap()
        .tile_as_mut::<PumpTile>()
        .unwrap()
        .active = false;
    assert_eq!(engine.tick(&mut grid, cell).unwrap(), 0);
    assert_eq!(grid.kind(cell), Some(RepresentationKind::Container));
    assert_eq!(engine.tick(&mut grid, cell).unwrap(), 0);
}

#[test]
fn single_parts_and_absent_cells_do_not_tick() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    assert_eq!(engine.tick(&mut grid, cell).unwrap(), 0);
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    assert_eq!(engine.tick(&mut grid, cell).unwrap(), 0);
}

// ===========================================================================
// Capabilities
// ===========================================================================

fn fluid_capacity(engine: &MultipartEngine, grid: &CellGrid, cell: CellId, face: Option<Face>) -> Option<u32> {
    engine
        .capability(grid, cell, FLUID, face)
        .and_then(|cap| cap.downcast_ref::<FluidTank>().map(|t| t.capacity))
}

#[test]
fn capability_follows_face_then_border_then_all() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine
        .add_part(&mut grid, cell, Slot::NORTH, state(TANK), Some(tank_tile(5)))
        .unwrap();
    engine
        .add_part(&mut grid, cell, Slot::Center, state(PUMP), Some(pump_tile()))
        .unwrap();

    assert_eq!(fluid_capacity(&engine, &grid, cell, Some(Face::North)), Some(5));
    assert_eq!(fluid_capacity(&engine, &grid, cell, Some(Face::South)), Some(1000));
    assert_eq!(fluid_capacity(&engine, &grid, cell, None), Some(1005));
    assert!(engine.has_capability(&grid, cell, FLUID, Some(Face::East)));
}

#[test]
fn several_providers_without_joiner_fall_through() {
    let (registry, _log) = test_registry();
    let engine = MultipartEngine::new(registry);
    let (mut grid, cell) = authoritative_grid();
    engine
        .add_part(&mut grid, cell, Slot::NORTH, state(TANK), Some(tank_tile(5)))
        .unwrap();
    engine
        .add_part(&mut grid, cell, Slot::SOUTH, state(TANK), Some(tank_tile(6)))
        .unwrap();

    assert_eq!(fluid_capacity(&engine, &grid, cell, Some(Face::North)), Some(5));
    assert_eq!(fluid_capacity(&engine, &grid, cell, None), None);

    if let Some(Representation::Container(container)) = grid.representation_mut(cell) {
        container.attach_capability(FLUID, Arc::new(FluidTank { capacity: 42 }));
    }
    assert_eq!(fluid_capacity(&engine, &grid, cell, None), Some(42));
}

#[test]
fn container_identity_capability() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine.add_part(&mut grid, cell, Slot::DOWN, state(PANEL), None).unwrap();
    let cap = engine
        .capability(&grid, cell, CapabilityKind::CONTAINER, None)
        .unwrap();
    assert_eq!(
        cap.downcast_ref::<ContainerCapability>(),
        Some(&ContainerCapability { cell })
    );
    assert!(!engine.has_capability(&grid, cell, FLUID, None));
    assert!(CapabilityJoiners::new().join(FLUID, Vec::new()).is_none());
}

// ===========================================================================
// Persistence
// ===========================================================================

fn populated(engine: &MultipartEngine) -> (CellGrid, CellId) {
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine
        .add_part(&mut grid, cell, Slot::NORTH, state(NOTE), Some(note_tile("hello")))
        .unwrap();
    engine
        .add_part(&mut grid, cell, Slot::Center, state(PUMP), Some(pump_tile()))
        .unwrap();
    engine.tick(&mut grid, cell).unwrap();
    engine.tick(&mut grid, cell).unwrap();
    (grid, cell)
}

fn observed(grid: &CellGrid, cell: CellId) -> Vec<(Slot, u32, Option<multipart_core::tag::TagCompound>)> {
    grid.representation(cell)
        .unwrap()
        .parts()
        .map(|p| (p.slot(), p.state().to_raw(), p.tile().map(|t| t.write())))
        .collect()
}

#[test]
fn save_and_load_round_trip() {
    let (engine, _log) = test_engine();
    let (grid, cell) = populated(&engine);
    let table = engine.write_cell(&grid, cell, WriteMode::Save).unwrap();

    let (mut fresh, fresh_cell) = authoritative_grid();
    engine.read_cell(&mut fresh, fresh_cell, &table, ReadMode::Save).unwrap();

    assert_eq!(observed(&fresh, fresh_cell), observed(&grid, cell));
    assert_eq!(fresh.kind(fresh_cell), Some(RepresentationKind::TickingContainer));
    assert!(fresh.outbox().is_empty());
}

#[test]
fn binary_snapshot_round_trip() {
    let (engine, _log) = test_engine();
    let (grid, cell) = populated(&engine);
    let table = engine.write_cell(&grid, cell, WriteMode::Save).unwrap();
    let bytes = encode_cell(&table).unwrap();

    let (mut fresh, fresh_cell) = authoritative_grid();
    engine
        .read_cell(&mut fresh, fresh_cell, &decode_cell(&bytes).unwrap(), ReadMode::Save)
        .unwrap();
    assert_eq!(observed(&fresh, fresh_cell), observed(&grid, cell));
}

#[test]
fn loading_two_parts_materializes_container_directly() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine.add_part(&mut grid, cell, Slot::UP, state(PANEL), None).unwrap();
    engine.add_part(&mut grid, cell, Slot::DOWN, state(PANEL), None).unwrap();
    let table = engine.write_cell(&grid, cell, WriteMode::Save).unwrap();

    let (mut fresh, fresh_cell) = authoritative_grid();
    engine.read_cell(&mut fresh, fresh_cell, &table, ReadMode::Save).unwrap();
    let kinds: Vec<_> = fresh
        .journal()
        .iter()
        .filter_map(|e| match e {
            multipart_core::host::HostEvent::Replaced { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![RepresentationKind::Container]);
}

fn registry_without_note() -> PartRegistry {
    let (mut registry, _log) = test_registry();
    registry.unregister(NOTE);
    registry
}

#[test]
fn missing_descriptor_is_preserved_and_recovered() {
    let (engine, _log) = test_engine();
    let (grid, cell) = populated(&engine);
    let original = engine.write_cell(&grid, cell, WriteMode::Save).unwrap();

    // Load where the note kind is unknown.
    let reduced = MultipartEngine::new(registry_without_note());
    let (mut partial, partial_cell) = authoritative_grid();
    reduced
        .read_cell(&mut partial, partial_cell, &original, ReadMode::Save)
        .unwrap();
    assert!(reduced.get(&partial, partial_cell, Slot::NORTH).is_none());
    let missing = partial
        .representation(partial_cell)
        .unwrap()
        .missing_parts()
        .unwrap();
    assert!(missing.contains_key(&Slot::NORTH));

    // Saving again echoes the unresolved record unchanged.
    let resaved = reduced
        .write_cell(&partial, partial_cell, WriteMode::Save)
        .unwrap();
    assert_eq!(resaved, original);

    // Once the kind is back, the part reappears with its tile state.
    let (mut restored, restored_cell) = authoritative_grid();
    engine
        .read_cell(&mut restored, restored_cell, &resaved, ReadMode::Save)
        .unwrap();
    let note = engine.get(&restored, restored_cell, Slot::NORTH).unwrap();
    assert_eq!(note.tile_as::<NoteTile>().unwrap().text, "hello");
    assert!(
        restored
            .representation(restored_cell)
            .unwrap()
            .missing_parts()
            .unwrap()
            .is_empty()
    );
}

#[test]
fn adding_into_missing_slot_clears_record() {
    let (engine, _log) = test_engine();
    let (grid, cell) = populated(&engine);
    let original = engine.write_cell(&grid, cell, WriteMode::Save).unwrap();

    let reduced = MultipartEngine::new(registry_without_note());
    let (mut partial, partial_cell) = authoritative_grid();
    reduced
        .read_cell(&mut partial, partial_cell, &original, ReadMode::Save)
        .unwrap();
    reduced
        .add_part(&mut partial, partial_cell, Slot::NORTH, state(PANEL), None)
        .unwrap();
    let missing = partial
        .representation(partial_cell)
        .unwrap()
        .missing_parts()
        .unwrap();
    assert!(missing.is_empty());
}

#[test]
fn lone_unresolved_record_keeps_a_container() {
    let (engine, _log) = test_engine();
    let (mut grid, cell) = authoritative_grid();
    engine
        .add_part(&mut grid, cell, Slot::NORTH, state(NOTE), Some(note_tile("only")))
        .unwrap();
    let table = engine.write_cell(&grid, cell, WriteMode::Save).unwrap();

    let reduced = MultipartEngine::new(registry_without_note());
    let (mut partial, partial_cell) = authoritative_grid();
    reduced
        .read_cell(&mut partial, partial_cell, &table, ReadMode::Save)
        .unwrap();
    assert_eq!(partial.kind(partial_cell), Some(RepresentationKind::Container));
    assert_eq!(reduced.write_cell(&partial, partial_cell, WriteMode::Save).unwrap(), table);
}

// ===========================================================================
// Mirror replay
// ===========================================================================

fn forward(engine: &MultipartEngine, from: &mut CellGrid, to: &mut CellGrid, cell: CellId, mirror_cell: CellId) {
    for (source, delta) in from.drain_outbox() {
        assert_eq!(source, cell);
        engine.apply_delta(to, mirror_cell, &delta).unwrap();
    }
}

#[test]
fn mirror_tracks_authoritative_cell() {
    let (engine, _log) = test_engine();
    let (mut auth, cell) = authoritative_grid();
    let (mut mirror, mirror_cell) = mirrored_grid();

    engine.add_part(&mut auth, cell, Slot::UP, state(PANEL), None).unwrap();
    forward(&engine, &mut auth, &mut mirror, cell, mirror_cell);
    assert_eq!(mirror.kind(mirror_cell), Some(RepresentationKind::SinglePart));

    engine
        .add_part(&mut auth, cell, Slot::NORTH, state(NOTE), Some(note_tile("sync")))
        .unwrap();
    forward(&engine, &mut auth, &mut mirror, cell, mirror_cell);
    assert_eq!(mirror.kind(mirror_cell), Some(RepresentationKind::Container));

    engine
        .add_part(&mut auth, cell, Slot::Center, state(PUMP), Some(pump_tile()))
        .unwrap();
    forward(&engine, &mut auth, &mut mirror, cell, mirror_cell);
    assert_eq!(mirror.kind(mirror_cell), Some(RepresentationKind::TickingContainer));
    assert_eq!(observed(&mirror, mirror_cell), observed(&auth, cell));

    engine.remove_part(&mut auth, cell, Slot::Center).unwrap();
    engine.remove_part(&mut auth, cell, Slot::UP).unwrap();
    forward(&engine, &mut auth, &mut mirror, cell, mirror_cell);
    assert_eq!(mirror.kind(mirror_cell), Some(RepresentationKind::SinglePart));
    let note = engine.get(&mirror, mirror_cell, Slot::NORTH).unwrap();
    assert_eq!(note.tile_as::<NoteTile>().unwrap().text, "sync");
    assert!(mirror.outbox().is_empty());
}

#[test]
fn fresh_mirror_catches_up_with_initial_sync() {
    let (engine, _log) = test_engine();
    let (auth, cell) = populated(&engine);
    let (mut mirror, mirror_cell) = mirrored_grid();

    let delta = engine.initial_sync(&auth, cell).unwrap();
    engine.apply_delta(&mut mirror, mirror_cell, &delta).unwrap();
    assert_eq!(observed(&mirror, mirror_cell), observed(&auth, cell));
}

#[test]
fn delta_with_unknown_slot_id_is_rejected() {
    let (engine, _log) = test_engine();
    let (mut mirror, mirror_cell) = mirrored_grid();
    let err = engine
        .apply_delta(
            &mut mirror,
            mirror_cell,
            &SyncDelta::Remove {
                slot: multipart_core::id::SlotId(200),
            },
        )
        .unwrap_err();
    assert!(matches!(err, MultipartError::UnknownSlotId(_)));
}

#[test]
fn mirror_without_full_resync_replays_adds() {
    let (registry, _log) = test_registry();
    let engine = MultipartEngine::new(registry).with_config(MultipartConfig {
        broadcast_full_resync_on_migration: false,
        ..MultipartConfig::default()
    });
    let (mut auth, cell) = authoritative_grid();
    let (mut mirror, mirror_cell) = mirrored_grid();

    engine.add_part(&mut auth, cell, Slot::UP, state(PANEL), None).unwrap();
    engine.add_part(&mut auth, cell, Slot::DOWN, state(PANEL), None).unwrap();
    assert!(
        auth.outbox()
            .iter()
            .all(|(_, d)| matches!(d, SyncDelta::Add { .. }))
    );
    forward(&engine, &mut auth, &mut mirror, cell, mirror_cell);
    assert_eq!(slots_of(&mirror, mirror_cell), vec![Slot::DOWN, Slot::UP]);
}
