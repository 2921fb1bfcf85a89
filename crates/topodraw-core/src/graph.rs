//! Device arena and two-sided link maintenance
//!
//! Devices are stored in slots addressed by [`DeviceId`]. Links are recorded
//! on both endpoints whenever a switch is involved, so every update here
//! touches both sides before returning:
//!
//! - a computer linked to a switch appears in that switch's set
//! - every computer in a switch's set links back to that switch
//! - switch-to-switch links are present in both sets
//!
//! A computer linked to another computer is a one-sided link; the target
//! does not record it.

use thiserror::Error;
use tracing::debug;

use crate::device::{Device, DeviceId, DeviceKind, Links};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("device {0} does not exist")]
    NotFound(DeviceId),
    #[error("device {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: DeviceId,
        expected: DeviceKind,
        actual: DeviceKind,
    },
}

/// A violation of the two-sided link invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    #[error("{from} links to missing device {to}")]
    Dangling { from: String, to: DeviceId },
    #[error("{0} links to itself")]
    SelfLink(String),
    #[error("switch {switch} lists {target} more than once")]
    DuplicateLink { switch: String, target: String },
    #[error("{from} links to {to} but {to} does not link back")]
    OneSided { from: String, to: String },
}

/// Arena of devices with link maintenance
#[derive(Debug, Clone, Default)]
pub struct DeviceGraph {
    slots: Vec<Option<Device>>,
}

impl DeviceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a device and return its handle
    ///
    /// Any links already set on `device` are dropped; links are only ever
    /// established through the two-sided update functions.
    pub fn insert(&mut self, mut device: Device) -> DeviceId {
        device.links = Links::empty(device.kind());
        let id = DeviceId(self.slots.len());
        self.slots.push(Some(device));
        id
    }

    /// Sever every link of a device and take it out of the arena
    pub fn remove(&mut self, id: DeviceId) -> Option<Device> {
        if !self.contains(id) {
            return None;
        }
        self.sever_all(id);
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Name of a live device
    pub fn name_of(&self, id: DeviceId) -> Option<&str> {
        self.get(id).map(|d| d.name.as_str())
    }

    /// All live devices in slot order
    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|d| (DeviceId(i), d)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind_of(&self, id: DeviceId) -> Result<DeviceKind, LinkError> {
        self.get(id).map(Device::kind).ok_or(LinkError::NotFound(id))
    }

    fn expect_kind(&self, id: DeviceId, expected: DeviceKind) -> Result<(), LinkError> {
        let actual = self.kind_of(id)?;
        if actual == expected {
            Ok(())
        } else {
            Err(LinkError::WrongKind {
                id,
                expected,
                actual,
            })
        }
    }

    fn switch_links_mut(&mut self, id: DeviceId) -> Option<&mut Vec<DeviceId>> {
        match self.get_mut(id).map(|d| &mut d.links) {
            Some(Links::Switch { linked_devices }) => Some(linked_devices),
            _ => None,
        }
    }

    fn set_computer_link(&mut self, id: DeviceId, target: Option<DeviceId>) {
        if let Some(Links::Computer { linked_device }) = self.get_mut(id).map(|d| &mut d.links) {
            *linked_device = target;
        }
    }

    /// Point a computer at `target`, or unlink it with `None`
    ///
    /// The computer leaves the set of the switch it was linked to before
    /// joining the new one. A target equal to the computer itself is ignored.
    pub fn set_linked_device(
        &mut self,
        computer: DeviceId,
        target: Option<DeviceId>,
    ) -> Result<(), LinkError> {
        self.expect_kind(computer, DeviceKind::Computer)?;
        let target_kind = match target {
            Some(t) if t == computer => {
                debug!(device = %computer, "Ignoring self link");
                return Ok(());
            }
            Some(t) => Some(self.kind_of(t)?),
            None => None,
        };

        let previous = self.get(computer).and_then(Device::linked_device);
        if let Some(prev) = previous.filter(|p| Some(*p) != target) {
            if let Some(set) = self.switch_links_mut(prev) {
                set.retain(|id| *id != computer);
            }
        }

        self.set_computer_link(computer, target);

        if let (Some(t), Some(DeviceKind::Switch)) = (target, target_kind) {
            if let Some(set) = self.switch_links_mut(t) {
                if !set.contains(&computer) {
                    set.push(computer);
                }
            }
        }

        debug!(device = %computer, from = ?previous, to = ?target, "Computer link updated");
        Ok(())
    }

    /// Replace a switch's link set, updating the other endpoint of every
    /// link that is removed or added
    ///
    /// Self-links, duplicates and handles of missing devices in `new_set`
    /// are dropped. Links kept from the current set keep their order; new
    /// links are appended in the order given.
    pub fn set_linked_devices(
        &mut self,
        switch: DeviceId,
        new_set: &[DeviceId],
    ) -> Result<(), LinkError> {
        self.expect_kind(switch, DeviceKind::Switch)?;

        let mut wanted: Vec<DeviceId> = Vec::with_capacity(new_set.len());
        for &id in new_set {
            if id == switch {
                debug!(device = %switch, "Ignoring self link");
            } else if !self.contains(id) {
                debug!(device = %switch, target = %id, "Ignoring link to missing device");
            } else if !wanted.contains(&id) {
                wanted.push(id);
            }
        }

        let current = self
            .get(switch)
            .map(|d| d.linked_devices().to_vec())
            .unwrap_or_default();

        for &gone in current.iter().filter(|id| !wanted.contains(id)) {
            self.detach_peer(switch, gone);
        }
        for &added in wanted.iter().filter(|id| !current.contains(id)) {
            self.attach_peer(switch, added);
        }

        let mut next: Vec<DeviceId> = current
            .into_iter()
            .filter(|id| wanted.contains(id))
            .collect();
        for id in wanted {
            if !next.contains(&id) {
                next.push(id);
            }
        }
        debug!(device = %switch, links = next.len(), "Switch links updated");
        if let Some(set) = self.switch_links_mut(switch) {
            *set = next;
        }
        Ok(())
    }

    /// Remove `switch` from the peer's side of a link
    fn detach_peer(&mut self, switch: DeviceId, peer: DeviceId) {
        match self.get_mut(peer).map(|d| &mut d.links) {
            Some(Links::Computer { linked_device }) if *linked_device == Some(switch) => {
                *linked_device = None;
            }
            Some(Links::Switch { linked_devices }) => linked_devices.retain(|id| *id != switch),
            _ => {}
        }
    }

    /// Record `switch` on the peer's side of a link
    fn attach_peer(&mut self, switch: DeviceId, peer: DeviceId) {
        match self.get(peer).map(Device::kind) {
            Some(DeviceKind::Switch) => {
                if let Some(set) = self.switch_links_mut(peer) {
                    if !set.contains(&switch) {
                        set.push(switch);
                    }
                }
            }
            Some(DeviceKind::Computer) => {
                let previous = self.get(peer).and_then(Device::linked_device);
                if let Some(prev) = previous.filter(|p| *p != switch) {
                    if let Some(set) = self.switch_links_mut(prev) {
                        set.retain(|id| *id != peer);
                    }
                }
                self.set_computer_link(peer, Some(switch));
            }
            None => {}
        }
    }

    /// Clear every incoming and outgoing link of a device
    pub fn sever_all(&mut self, id: DeviceId) {
        for slot in self.slots.iter_mut().flatten() {
            match &mut slot.links {
                Links::Computer { linked_device } => {
                    if *linked_device == Some(id) {
                        *linked_device = None;
                    }
                }
                Links::Switch { linked_devices } => linked_devices.retain(|l| *l != id),
            }
        }
        match self.get_mut(id).map(|d| &mut d.links) {
            Some(Links::Computer { linked_device }) => *linked_device = None,
            Some(Links::Switch { linked_devices }) => linked_devices.clear(),
            None => {}
        }
    }

    /// Name of the computer's linked device, or `None`
    pub fn linked_device_name(&self, computer: DeviceId) -> Result<String, LinkError> {
        self.expect_kind(computer, DeviceKind::Computer)?;
        Ok(self
            .get(computer)
            .and_then(Device::linked_device)
            .and_then(|id| self.name_of(id))
            .unwrap_or("None")
            .to_string())
    }

    /// Comma-joined names of the switch's links, or `None` when empty
    pub fn linked_devices_names(&self, switch: DeviceId) -> Result<String, LinkError> {
        self.expect_kind(switch, DeviceKind::Switch)?;
        let names: Vec<&str> = self
            .get(switch)
            .map(|d| d.linked_devices())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.name_of(*id))
            .collect();
        if names.is_empty() {
            Ok("None".to_string())
        } else {
            Ok(names.join(", "))
        }
    }

    /// Verify the two-sided link invariant across the whole arena
    pub fn check_consistency(&self) -> Result<(), Inconsistency> {
        for (id, device) in self.iter() {
            match &device.links {
                Links::Computer { linked_device: None } => {}
                Links::Computer {
                    linked_device: Some(target),
                } => {
                    let peer = self.check_target(id, device, *target)?;
                    if peer.is_switch() && !peer.linked_devices().contains(&id) {
                        return Err(Inconsistency::OneSided {
                            from: device.name.clone(),
                            to: peer.name.clone(),
                        });
                    }
                }
                Links::Switch { linked_devices } => {
                    for (i, target) in linked_devices.iter().enumerate() {
                        let peer = self.check_target(id, device, *target)?;
                        if linked_devices[..i].contains(target) {
                            return Err(Inconsistency::DuplicateLink {
                                switch: device.name.clone(),
                                target: peer.name.clone(),
                            });
                        }
                        if !peer.links_to(id) {
                            return Err(Inconsistency::OneSided {
                                from: device.name.clone(),
                                to: peer.name.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_target(
        &self,
        id: DeviceId,
        device: &Device,
        target: DeviceId,
    ) -> Result<&Device, Inconsistency> {
        if target == id {
            return Err(Inconsistency::SelfLink(device.name.clone()));
        }
        self.get(target).ok_or_else(|| Inconsistency::Dangling {
            from: device.name.clone(),
            to: target,
        })
    }
}
