//! Topology store: the single entry point for adding, editing and removing
//! devices
//!
//! The store keeps devices in insertion order, indexes them by name, and
//! delegates link bookkeeping to [`DeviceGraph`]. Every operation validates
//! its input before touching any state, so a rejected add or edit leaves the
//! topology exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::address::{AddressError, CanonicalIp};
use crate::device::{Device, DeviceId, DeviceKind, Position};
use crate::graph::{DeviceGraph, LinkError};
use crate::placement::{self, Canvas, Rect};

/// Marker the persisted format uses for "no link"
pub const NO_LINK: &str = "None";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Device name '{0}' already exists, please choose a different name")]
    DuplicateName(String),
    #[error("Invalid device name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("Invalid IP address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("Device {0} not found")]
    NotFound(DeviceId),
    #[error("No device named '{0}'")]
    UnknownDevice(String),
    #[error("{device} is a {actual}, expected a {expected}")]
    WrongKind {
        device: String,
        expected: DeviceKind,
        actual: DeviceKind,
    },
    #[error("{target} is not available as a link for {device}")]
    LinkUnavailable { device: String, target: String },
    #[error("A computer links to at most one device, got {0}")]
    TooManyLinks(usize),
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// A drawable connection between two devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Serializable view of one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub name: String,
    pub kind: DeviceKind,
    pub ip: CanonicalIp,
    pub position: Position,
    pub links: Vec<String>,
}

/// Serializable view of a whole topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub canvas: Canvas,
    pub devices: Vec<DeviceSummary>,
    pub edges: Vec<Edge>,
}

/// Devices of one session, in insertion order
#[derive(Debug, Clone, Default)]
pub struct Topology {
    graph: DeviceGraph,
    order: Vec<DeviceId>,
    names: HashMap<String, DeviceId>,
    canvas: Canvas,
}

impl Topology {
    /// Create an empty topology on a canvas
    pub fn new(canvas: Canvas) -> Self {
        Self {
            graph: DeviceGraph::new(),
            order: Vec::new(),
            names: HashMap::new(),
            canvas,
        }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn graph(&self) -> &DeviceGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut DeviceGraph {
        &mut self.graph
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.graph.get(id)
    }

    /// Exact, case-sensitive lookup
    pub fn find_by_name(&self, name: &str) -> Option<DeviceId> {
        self.names.get(name).copied()
    }

    /// Look up a device handle by name or fail with `UnknownDevice`
    pub fn resolve(&self, name: &str) -> Result<DeviceId, TopologyError> {
        self.find_by_name(name)
            .ok_or_else(|| TopologyError::UnknownDevice(name.to_string()))
    }

    /// Devices in insertion order
    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.order
            .iter()
            .filter_map(|id| self.graph.get(*id).map(|d| (*id, d)))
    }

    fn device(&self, id: DeviceId) -> Result<&Device, TopologyError> {
        self.graph.get(id).ok_or(TopologyError::NotFound(id))
    }

    fn expect_kind(&self, id: DeviceId, expected: DeviceKind) -> Result<&Device, TopologyError> {
        let device = self.device(id)?;
        if device.kind() == expected {
            Ok(device)
        } else {
            Err(TopologyError::WrongKind {
                device: device.name.clone(),
                expected,
                actual: device.kind(),
            })
        }
    }

    /// Add a device at the first free grid slot
    ///
    /// A computer accepts at most one initial link; a switch any number.
    /// Every link target must be offered by [`Topology::link_candidates`].
    pub fn add_device(
        &mut self,
        kind: DeviceKind,
        name: &str,
        ip: &str,
        initial_links: &[DeviceId],
    ) -> Result<DeviceId, TopologyError> {
        let name = validate_name(name)?;
        if self.names.contains_key(&name) {
            return Err(TopologyError::DuplicateName(name));
        }
        let ip = CanonicalIp::parse(ip)?;
        if kind == DeviceKind::Computer && initial_links.len() > 1 {
            return Err(TopologyError::TooManyLinks(initial_links.len()));
        }
        for target in initial_links {
            self.check_candidate(None, &name, *target)?;
        }

        let occupied: Vec<Rect> = self
            .devices()
            .map(|(_, d)| Rect::footprint(d.position))
            .collect();
        let position = placement::place_without_overlap(self.canvas, &occupied);

        let id = self.register(Device::new(kind, name, ip, position));
        match kind {
            DeviceKind::Computer => self
                .graph
                .set_linked_device(id, initial_links.first().copied())?,
            DeviceKind::Switch => self.graph.set_linked_devices(id, initial_links)?,
        }

        if let Some(device) = self.graph.get(id) {
            info!(
                device = %device.name,
                kind = %kind,
                ip = %device.ip,
                position = %position,
                "Added device"
            );
        }
        Ok(id)
    }

    /// Register a device at its own position, without links
    ///
    /// Only name uniqueness is checked; used when rebuilding a topology from
    /// a file.
    pub(crate) fn insert_loaded(&mut self, device: Device) -> Result<DeviceId, TopologyError> {
        if self.names.contains_key(&device.name) {
            return Err(TopologyError::DuplicateName(device.name));
        }
        Ok(self.register(device))
    }

    fn register(&mut self, device: Device) -> DeviceId {
        let name = device.name.clone();
        let id = self.graph.insert(device);
        self.names.insert(name, id);
        self.order.push(id);
        id
    }

    /// Rename a device; its links follow since they are held by handle
    pub fn rename_device(&mut self, id: DeviceId, new_name: &str) -> Result<(), TopologyError> {
        let old = self.device(id)?.name.clone();
        let new_name = validate_name(new_name)?;
        if new_name == old {
            return Ok(());
        }
        if self.names.contains_key(&new_name) {
            return Err(TopologyError::DuplicateName(new_name));
        }

        self.names.remove(&old);
        self.names.insert(new_name.clone(), id);
        if let Some(device) = self.graph.get_mut(id) {
            device.name = new_name.clone();
        }
        info!(from = %old, to = %new_name, "Renamed device");
        Ok(())
    }

    /// Replace a device's address
    pub fn set_device_ip(&mut self, id: DeviceId, ip: &str) -> Result<(), TopologyError> {
        self.device(id)?;
        let ip = CanonicalIp::parse(ip)?;
        if let Some(device) = self.graph.get_mut(id) {
            debug!(device = %device.name, ip = %ip, "Updated address");
            device.ip = ip;
        }
        Ok(())
    }

    /// Point a computer at a new target, or unlink it with `None`
    pub fn relink_computer(
        &mut self,
        id: DeviceId,
        target: Option<DeviceId>,
    ) -> Result<(), TopologyError> {
        let name = self.expect_kind(id, DeviceKind::Computer)?.name.clone();
        if let Some(target) = target {
            self.check_candidate(Some(id), &name, target)?;
        }
        self.graph.set_linked_device(id, target)?;
        Ok(())
    }

    /// Replace a switch's link set
    pub fn relink_switch(
        &mut self,
        id: DeviceId,
        targets: &[DeviceId],
    ) -> Result<(), TopologyError> {
        let name = self.expect_kind(id, DeviceKind::Switch)?.name.clone();
        for target in targets {
            self.check_candidate(Some(id), &name, *target)?;
        }
        self.graph.set_linked_devices(id, targets)?;
        Ok(())
    }

    /// Sever every link of a device and remove it
    pub fn delete_device(&mut self, id: DeviceId) -> Result<Device, TopologyError> {
        let device = self.graph.remove(id).ok_or(TopologyError::NotFound(id))?;
        self.names.remove(&device.name);
        self.order.retain(|d| *d != id);
        info!(device = %device.name, "Deleted device");
        Ok(device)
    }

    /// Move a device, keeping its footprint on the canvas
    pub fn move_device(&mut self, id: DeviceId, to: Position) -> Result<Position, TopologyError> {
        let canvas = self.canvas;
        let device = self.graph.get_mut(id).ok_or(TopologyError::NotFound(id))?;
        device.position = placement::clamp(to, canvas);
        Ok(device.position)
    }

    /// Adopt a new canvas size and pull every device back inside it
    pub fn resize_canvas(&mut self, canvas: Canvas) {
        self.canvas = canvas;
        self.clamp_positions();
    }

    pub(crate) fn clamp_positions(&mut self) {
        let canvas = self.canvas;
        for id in &self.order {
            if let Some(device) = self.graph.get_mut(*id) {
                let clamped = placement::clamp(device.position, canvas);
                if clamped != device.position {
                    debug!(
                        device = %device.name,
                        from = %device.position,
                        to = %clamped,
                        "Clamped position"
                    );
                    device.position = clamped;
                }
            }
        }
    }

    /// Devices that may be offered as link targets
    ///
    /// `editing` is the device whose links are being chosen, or `None` for a
    /// device that does not exist yet. Computers that already carry a link
    /// are left out, except for the edited device's current links.
    pub fn link_candidates(&self, editing: Option<DeviceId>) -> Vec<DeviceId> {
        self.devices()
            .map(|(id, _)| id)
            .filter(|id| self.is_candidate(editing, *id))
            .collect()
    }

    fn is_candidate(&self, editing: Option<DeviceId>, target: DeviceId) -> bool {
        if Some(target) == editing {
            return false;
        }
        let Some(device) = self.graph.get(target) else {
            return false;
        };
        let current = editing
            .and_then(|id| self.graph.get(id))
            .is_some_and(|e| e.links_to(target));
        current || device.is_switch() || !device.has_link()
    }

    fn check_candidate(
        &self,
        editing: Option<DeviceId>,
        name: &str,
        target: DeviceId,
    ) -> Result<(), TopologyError> {
        let target_device = self.device(target)?;
        if self.is_candidate(editing, target) {
            Ok(())
        } else {
            Err(TopologyError::LinkUnavailable {
                device: name.to_string(),
                target: target_device.name.clone(),
            })
        }
    }

    /// Every link once, in device order
    ///
    /// Links recorded on both endpoints produce a single edge.
    pub fn edges(&self) -> Vec<Edge> {
        let mut seen: Vec<(DeviceId, DeviceId)> = Vec::new();
        let mut edges = Vec::new();
        for (id, device) in self.devices() {
            let targets = device
                .linked_device()
                .into_iter()
                .chain(device.linked_devices().iter().copied());
            for target in targets {
                let key = (id.min(target), id.max(target));
                if seen.contains(&key) {
                    continue;
                }
                if let Some(to) = self.graph.name_of(target) {
                    seen.push(key);
                    edges.push(Edge {
                        from: device.name.clone(),
                        to: to.to_string(),
                    });
                }
            }
        }
        edges
    }

    /// Names of a device's outgoing links, in stored order
    pub fn link_names(&self, id: DeviceId) -> Vec<String> {
        let Some(device) = self.graph.get(id) else {
            return Vec::new();
        };
        device
            .linked_device()
            .into_iter()
            .chain(device.linked_devices().iter().copied())
            .filter_map(|l| self.graph.name_of(l).map(str::to_string))
            .collect()
    }

    /// Get topology as JSON-serializable structure
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            canvas: self.canvas,
            devices: self
                .devices()
                .map(|(id, d)| DeviceSummary {
                    name: d.name.clone(),
                    kind: d.kind(),
                    ip: d.ip.clone(),
                    position: d.position,
                    links: self.link_names(id),
                })
                .collect(),
            edges: self.edges(),
        }
    }
}

/// Check a device name and return it trimmed
///
/// Names end up as fields of the persisted line format, so the field and
/// list separators and the "no link" marker are rejected.
pub fn validate_name(raw: &str) -> Result<String, TopologyError> {
    let name = raw.trim();
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains([',', ';']) {
        Some("',' and ';' are not allowed")
    } else if name.contains(['\r', '\n']) {
        Some("line breaks are not allowed")
    } else if name == NO_LINK {
        Some("'None' is reserved")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(TopologyError::InvalidName {
            name: raw.to_string(),
            reason,
        }),
        None => Ok(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Topology {
        Topology::new(Canvas::default())
    }

    #[test]
    fn test_add_device_places_and_registers() {
        let mut topo = topology();
        let sw = topo.add_device(DeviceKind::Switch, "sw1", "10.0.0.1", &[]).unwrap();
        let pc = topo.add_device(DeviceKind::Computer, " pc1 ", "10.0.0.2", &[sw]).unwrap();

        assert_eq!(topo.len(), 2);
        assert_eq!(topo.find_by_name("pc1"), Some(pc));
        assert_eq!(topo.get(sw).unwrap().position, Position::new(20, 20));
        assert_eq!(topo.get(pc).unwrap().position, Position::new(20, 120));
        assert_eq!(topo.get(pc).unwrap().ip.as_str(), "010.000.000.002");
        assert_eq!(topo.get(sw).unwrap().linked_devices(), &[pc]);
        topo.graph().check_consistency().unwrap();
    }

    #[test]
    fn test_add_rejects_duplicates_without_mutation() {
        let mut topo = topology();
        topo.add_device(DeviceKind::Computer, "pc1", "10.0.0.1", &[]).unwrap();

        let err = topo.add_device(DeviceKind::Switch, "pc1", "10.0.0.2", &[]).unwrap_err();
        assert_eq!(err, TopologyError::DuplicateName("pc1".to_string()));
        // Case-sensitive
        topo.add_device(DeviceKind::Computer, "PC1", "10.0.0.3", &[]).unwrap();
        assert_eq!(topo.len(), 2);
    }

    #[test]
    fn test_add_rejects_invalid_address_without_mutation() {
        let mut topo = topology();
        let err = topo.add_device(DeviceKind::Computer, "pc1", "1.2.3", &[]).unwrap_err();
        assert_eq!(err, TopologyError::InvalidAddress(AddressError::SegmentCount(3)));
        assert!(topo.is_empty());
        assert_eq!(topo.find_by_name("pc1"), None);
    }

    #[test]
    fn test_invalid_names() {
        for bad in ["", "  ", "a,b", "a;b", "None", "a\nb"] {
            assert!(
                matches!(validate_name(bad), Err(TopologyError::InvalidName { .. })),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(validate_name(" pc 1 ").unwrap(), "pc 1");
    }

    #[test]
    fn test_computer_accepts_one_initial_link() {
        let mut topo = topology();
        let a = topo.add_device(DeviceKind::Switch, "a", "10.0.0.1", &[]).unwrap();
        let b = topo.add_device(DeviceKind::Switch, "b", "10.0.0.2", &[]).unwrap();
        let err = topo
            .add_device(DeviceKind::Computer, "pc", "10.0.0.3", &[a, b])
            .unwrap_err();
        assert_eq!(err, TopologyError::TooManyLinks(2));
        assert_eq!(topo.len(), 2);
    }

    #[test]
    fn test_linked_computer_is_not_a_candidate() {
        let mut topo = topology();
        let sw = topo.add_device(DeviceKind::Switch, "sw", "10.0.0.1", &[]).unwrap();
        let pc = topo.add_device(DeviceKind::Computer, "pc", "10.0.0.2", &[sw]).unwrap();
        let free = topo.add_device(DeviceKind::Computer, "free", "10.0.0.3", &[]).unwrap();

        assert_eq!(topo.link_candidates(None), vec![sw, free]);

        // The current link stays visible while editing
        assert_eq!(topo.link_candidates(Some(sw)), vec![pc, free]);
        assert_eq!(topo.link_candidates(Some(pc)), vec![sw, free]);

        let other = topo.add_device(DeviceKind::Switch, "other", "10.0.0.4", &[]).unwrap();
        let err = topo.relink_switch(other, &[pc]).unwrap_err();
        assert_eq!(
            err,
            TopologyError::LinkUnavailable {
                device: "other".to_string(),
                target: "pc".to_string(),
            }
        );
        assert_eq!(topo.get(pc).unwrap().linked_device(), Some(sw));
    }

    #[test]
    fn test_relink_computer_between_switches() {
        let mut topo = topology();
        let a = topo.add_device(DeviceKind::Switch, "a", "10.0.0.1", &[]).unwrap();
        let b = topo.add_device(DeviceKind::Switch, "b", "10.0.0.2", &[]).unwrap();
        let pc = topo.add_device(DeviceKind::Computer, "pc", "10.0.0.3", &[a]).unwrap();

        topo.relink_computer(pc, Some(b)).unwrap();
        assert!(topo.get(a).unwrap().linked_devices().is_empty());
        assert_eq!(topo.get(b).unwrap().linked_devices(), &[pc]);

        topo.relink_computer(pc, None).unwrap();
        assert!(topo.get(b).unwrap().linked_devices().is_empty());
        topo.graph().check_consistency().unwrap();
    }

    #[test]
    fn test_relink_checks_kind() {
        let mut topo = topology();
        let sw = topo.add_device(DeviceKind::Switch, "sw", "10.0.0.1", &[]).unwrap();
        assert!(matches!(
            topo.relink_computer(sw, None),
            Err(TopologyError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_rename_keeps_links_and_index() {
        let mut topo = topology();
        let sw = topo.add_device(DeviceKind::Switch, "sw", "10.0.0.1", &[]).unwrap();
        let pc = topo.add_device(DeviceKind::Computer, "pc", "10.0.0.2", &[sw]).unwrap();

        topo.rename_device(sw, "core").unwrap();
        assert_eq!(topo.find_by_name("sw"), None);
        assert_eq!(topo.find_by_name("core"), Some(sw));
        assert_eq!(topo.graph().linked_device_name(pc).unwrap(), "core");

        // Renaming to its own name is fine, to another device's is not
        topo.rename_device(sw, "core").unwrap();
        assert_eq!(
            topo.rename_device(sw, "pc"),
            Err(TopologyError::DuplicateName("pc".to_string()))
        );
        assert_eq!(topo.get(sw).unwrap().name, "core");
    }

    #[test]
    fn test_set_device_ip() {
        let mut topo = topology();
        let pc = topo.add_device(DeviceKind::Computer, "pc", "10.0.0.1", &[]).unwrap();
        topo.set_device_ip(pc, "192.168.1.1").unwrap();
        assert_eq!(topo.get(pc).unwrap().ip.as_str(), "192.168.001.001");

        assert!(topo.set_device_ip(pc, "999.1.1.1").is_err());
        assert_eq!(topo.get(pc).unwrap().ip.as_str(), "192.168.001.001");
    }

    #[test]
    fn test_delete_switch_unlinks_its_computers() {
        let mut topo = topology();
        let sw = topo.add_device(DeviceKind::Switch, "sw", "10.0.0.1", &[]).unwrap();
        let pcs: Vec<_> = (0..3)
            .map(|i| {
                topo.add_device(DeviceKind::Computer, &format!("pc{i}"), "10.0.0.2", &[sw])
                    .unwrap()
            })
            .collect();

        let removed = topo.delete_device(sw).unwrap();
        assert_eq!(removed.name, "sw");
        for pc in pcs {
            assert_eq!(topo.get(pc).unwrap().linked_device(), None);
        }
        assert_eq!(topo.find_by_name("sw"), None);
        assert_eq!(topo.delete_device(sw), Err(TopologyError::NotFound(sw)));
        topo.graph().check_consistency().unwrap();
    }

    #[test]
    fn test_new_device_avoids_existing_footprints() {
        let mut topo = topology();
        let a = topo.add_device(DeviceKind::Computer, "a", "10.0.0.1", &[]).unwrap();
        topo.move_device(a, Position::new(20, 120)).unwrap();
        let b = topo.add_device(DeviceKind::Computer, "b", "10.0.0.2", &[]).unwrap();
        let c = topo.add_device(DeviceKind::Computer, "c", "10.0.0.3", &[]).unwrap();
        assert_eq!(topo.get(b).unwrap().position, Position::new(20, 20));
        assert_eq!(topo.get(c).unwrap().position, Position::new(20, 220));
    }

    #[test]
    fn test_move_and_resize_clamp() {
        let mut topo = topology();
        let pc = topo.add_device(DeviceKind::Computer, "pc", "10.0.0.1", &[]).unwrap();
        assert_eq!(
            topo.move_device(pc, Position::new(2000, -5)).unwrap(),
            Position::new(720, 0)
        );

        topo.resize_canvas(Canvas::new(400, 300));
        assert_eq!(topo.get(pc).unwrap().position, Position::new(320, 0));
    }

    #[test]
    fn test_edges_are_reported_once() {
        let mut topo = topology();
        let core = topo.add_device(DeviceKind::Switch, "core", "10.0.0.1", &[]).unwrap();
        let edge = topo.add_device(DeviceKind::Switch, "edge", "10.0.0.2", &[core]).unwrap();
        topo.add_device(DeviceKind::Computer, "pc", "10.0.0.3", &[edge]).unwrap();

        let edges = topo.edges();
        assert_eq!(
            edges,
            vec![
                Edge {
                    from: "core".to_string(),
                    to: "edge".to_string(),
                },
                Edge {
                    from: "edge".to_string(),
                    to: "pc".to_string(),
                },
            ]
        );

        let snapshot = topo.snapshot();
        assert_eq!(snapshot.devices.len(), 3);
        assert_eq!(snapshot.devices[1].links, vec!["core", "pc"]);
    }
}
