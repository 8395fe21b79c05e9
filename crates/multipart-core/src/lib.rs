//! Multipart Core -- several independent parts sharing one grid cell.
//!
//! A cell normally holds one thing. This crate lets it hold up to 27 parts,
//! one per slot (six faces, the center, twelve edges, eight corners), while
//! keeping the common case cheap: a lone part lives directly in the cell and
//! only cells with two or more parts, or with a ticking part, pay for a
//! container.
//!
//! # Representations
//!
//! Every cell is in one of four states, see
//! [`representation::RepresentationKind`]:
//!
//! | state              | holds                                         |
//! |--------------------|-----------------------------------------------|
//! | `Absent`           | nothing                                       |
//! | `SinglePart`       | one part without a ticking tile               |
//! | `Container`        | two or more parts, none ticking               |
//! | `TickingContainer` | one or more parts, at least one ticking       |
//!
//! Adding and removing parts migrates between them; see
//! [`engine::MultipartEngine::add_part`] and
//! [`engine::MultipartEngine::remove_part`].
//!
//! # Mutation Pattern
//!
//! The engine does not own cells. It borrows them from a
//! [`host::HostGrid`], buffers side effects, and flushes them once the new
//! representation is installed:
//!
//! ```rust,ignore
//! let engine = MultipartEngine::new(registry);
//! let mut grid = CellGrid::authoritative();
//! let cell = grid.create_cell();
//! if engine.can_add_part(&grid, cell, Slot::UP, state, None)? {
//!     engine.add_part(&mut grid, cell, Slot::UP, state, None)?;
//! }
//! ```
//!
//! # Key Types
//!
//! - [`engine::MultipartEngine`] -- Every cell-level operation.
//! - [`container::MultipartContainer`] -- Parts of one cell keyed by slot.
//! - [`descriptor::PartDescriptor`] / [`descriptor::Tile`] -- Content
//!   extension points.
//! - [`slot::SlotRegistry`] -- Session-local slot ids.
//! - [`registry::PartRegistry`] -- Placement state to descriptor lookup.
//! - [`sync::SyncDelta`] -- Changes sent from the authoritative side to
//!   mirrors.
//! - [`persist`] -- Part tables and versioned binary snapshots via bitcode.

pub mod capability;
pub mod config;
pub mod container;
pub mod descriptor;
pub mod engine;
pub mod fixed;
pub mod host;
pub mod id;
pub mod occlusion;
pub mod part;
pub mod persist;
pub mod registry;
pub mod representation;
pub mod slot;
pub mod sync;
pub mod tag;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
