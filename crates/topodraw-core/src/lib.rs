//! Topodraw Core - Device model, link graph, placement and persistence
//!
//! This crate provides the editable network topology behind Topodraw:
//! - Address validation with a single canonical IPv4 form
//! - Computer and switch devices with two-sided link bookkeeping
//! - Grid placement of new devices without overlap
//! - The topology store, the single entry point for edits
//! - A lenient line-oriented file format with two-pass loading
//! - Per-user sessions that persist after every edit

pub mod address;
pub mod codec;
pub mod device;
pub mod graph;
pub mod placement;
pub mod session;
pub mod topology;

pub use address::{validate_and_format_ip, AddressError, CanonicalIp};
pub use codec::{CodecError, LoadWarning, Loaded};
pub use device::{Device, DeviceId, DeviceKind, Links, Position};
pub use graph::{DeviceGraph, Inconsistency, LinkError};
pub use placement::{place_without_overlap, Canvas, Rect};
pub use session::{Role, Session, SessionError, User};
pub use topology::{Edge, Topology, TopologyError, TopologySnapshot};
