//! Device types for the editable topology

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::address::CanonicalIp;

/// Handle to a device slot inside a topology
///
/// Handles are never reused within one topology, so a handle to a deleted
/// device stays invalid instead of aliasing a newer device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub usize);

impl DeviceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which kind of device a node is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    Computer,
    Switch,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Computer => "Computer",
            Self::Switch => "Switch",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown device kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for DeviceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Computer" => Ok(Self::Computer),
            "Switch" => Ok(Self::Switch),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Top-left corner of a device footprint on the canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Link payload, one variant per device kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Links {
    /// A computer links to at most one device
    Computer { linked_device: Option<DeviceId> },
    /// A switch links to any number of devices, in insertion order
    Switch { linked_devices: Vec<DeviceId> },
}

impl Links {
    /// No links, shaped for the given kind
    pub fn empty(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Computer => Self::Computer { linked_device: None },
            DeviceKind::Switch => Self::Switch {
                linked_devices: Vec::new(),
            },
        }
    }
}

/// A device in a topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Unique name within the topology
    pub name: String,
    /// Address in canonical form
    pub ip: CanonicalIp,
    /// Canvas position of the footprint
    pub position: Position,
    /// Outgoing links
    pub links: Links,
}

impl Device {
    /// Create an unlinked device of the given kind
    pub fn new(kind: DeviceKind, name: String, ip: CanonicalIp, position: Position) -> Self {
        Self {
            name,
            ip,
            position,
            links: Links::empty(kind),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self.links {
            Links::Computer { .. } => DeviceKind::Computer,
            Links::Switch { .. } => DeviceKind::Switch,
        }
    }

    pub fn is_computer(&self) -> bool {
        matches!(self.links, Links::Computer { .. })
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.links, Links::Switch { .. })
    }

    /// The computer's single link, `None` for switches and unlinked computers
    pub fn linked_device(&self) -> Option<DeviceId> {
        match self.links {
            Links::Computer { linked_device } => linked_device,
            Links::Switch { .. } => None,
        }
    }

    /// The switch's link set, empty for computers
    pub fn linked_devices(&self) -> &[DeviceId] {
        match &self.links {
            Links::Computer { .. } => &[],
            Links::Switch { linked_devices } => linked_devices,
        }
    }

    /// Whether this device carries any outgoing link
    pub fn has_link(&self) -> bool {
        match &self.links {
            Links::Computer { linked_device } => linked_device.is_some(),
            Links::Switch { linked_devices } => !linked_devices.is_empty(),
        }
    }

    /// Whether this device's outgoing links reference `id`
    pub fn links_to(&self, id: DeviceId) -> bool {
        match &self.links {
            Links::Computer { linked_device } => *linked_device == Some(id),
            Links::Switch { linked_devices } => linked_devices.contains(&id),
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Name: {}, IP: {}", self.name, self.ip)
    }
}
