//! Per-user editing session
//!
//! A session binds one authenticated user to their topology file
//! (`<data_dir>/<user>.txt`). Every mutating call goes through the store
//! and is then written back to disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::codec::{self, CodecError, LoadWarning};
use crate::device::{Device, DeviceId, DeviceKind, Position};
use crate::placement::Canvas;
use crate::topology::{Topology, TopologyError};

const FILE_EXTENSION: &str = "txt";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("User '{user}' is not allowed to {action}")]
    PermissionDenied { user: String, action: &'static str },
    #[error("Invalid user name '{0}'")]
    InvalidUserName(String),
    #[error("Unknown role '{0}', expected 'admin' or 'user'")]
    UnknownRole(String),
}

/// Access level supplied by the authentication layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(SessionError::UnknownRole(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::User => f.write_str("user"),
        }
    }
}

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub role: Role,
}

impl User {
    /// Create a user whose name can serve as a file stem
    pub fn new(name: &str, role: Role) -> Result<Self, SessionError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', '\0'])
            && name.trim() == name;
        if valid {
            Ok(Self {
                name: name.to_string(),
                role,
            })
        } else {
            Err(SessionError::InvalidUserName(name.to_string()))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Path of a user's topology file inside `data_dir`
pub fn topology_path(data_dir: &Path, user: &str) -> PathBuf {
    data_dir.join(format!("{user}.{FILE_EXTENSION}"))
}

/// One user's open topology
#[derive(Debug)]
pub struct Session {
    user: User,
    data_dir: PathBuf,
    path: PathBuf,
    topology: Topology,
    warnings: Vec<LoadWarning>,
}

impl Session {
    /// Open (or create) the user's topology file
    pub fn open(
        user: User,
        data_dir: impl Into<PathBuf>,
        canvas: Canvas,
    ) -> Result<Self, SessionError> {
        let data_dir = data_dir.into();
        let path = topology_path(&data_dir, &user.name);
        let loaded = codec::load(&path, canvas)?;
        info!(
            user = %user.name,
            role = %user.role,
            devices = loaded.topology.len(),
            "Opened session"
        );
        Ok(Self {
            user,
            data_dir,
            path,
            topology: loaded.topology,
            warnings: loaded.warnings,
        })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Problems repaired while loading the file
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// Write the topology back to the user's file
    pub fn save(&self) -> Result<(), SessionError> {
        codec::save(&self.path, &self.topology)?;
        Ok(())
    }

    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut Topology) -> Result<T, TopologyError>,
    ) -> Result<T, SessionError> {
        let value = op(&mut self.topology)?;
        self.save()?;
        Ok(value)
    }

    pub fn add_device(
        &mut self,
        kind: DeviceKind,
        name: &str,
        ip: &str,
        initial_links: &[DeviceId],
    ) -> Result<DeviceId, SessionError> {
        self.mutate(|t| t.add_device(kind, name, ip, initial_links))
    }

    pub fn rename_device(&mut self, id: DeviceId, new_name: &str) -> Result<(), SessionError> {
        self.mutate(|t| t.rename_device(id, new_name))
    }

    pub fn set_device_ip(&mut self, id: DeviceId, ip: &str) -> Result<(), SessionError> {
        self.mutate(|t| t.set_device_ip(id, ip))
    }

    pub fn relink_computer(
        &mut self,
        id: DeviceId,
        target: Option<DeviceId>,
    ) -> Result<(), SessionError> {
        self.mutate(|t| t.relink_computer(id, target))
    }

    pub fn relink_switch(
        &mut self,
        id: DeviceId,
        targets: &[DeviceId],
    ) -> Result<(), SessionError> {
        self.mutate(|t| t.relink_switch(id, targets))
    }

    pub fn delete_device(&mut self, id: DeviceId) -> Result<Device, SessionError> {
        self.mutate(|t| t.delete_device(id))
    }

    pub fn move_device(&mut self, id: DeviceId, to: Position) -> Result<Position, SessionError> {
        self.mutate(|t| t.move_device(id, to))
    }

    pub fn resize_canvas(&mut self, canvas: Canvas) -> Result<(), SessionError> {
        self.mutate(|t| {
            t.resize_canvas(canvas);
            Ok(())
        })
    }

    /// Save the current user's work and switch to another user's file
    pub fn change_user(&mut self, user: User) -> Result<(), SessionError> {
        self.save()?;
        let next = Self::open(user, self.data_dir.clone(), self.topology.canvas())?;
        *self = next;
        Ok(())
    }

    /// Names of all users with a stored topology (admin only)
    pub fn list_users(&self) -> Result<Vec<String>, SessionError> {
        if !self.user.is_admin() {
            return Err(SessionError::PermissionDenied {
                user: self.user.name.clone(),
                action: "list users",
            });
        }

        let mut users = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir).map_err(CodecError::from)? {
            let path = entry.map_err(CodecError::from)?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == FILE_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    users.push(stem.to_string());
                }
            }
        }
        users.sort();
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn user(name: &str, role: Role) -> User {
        User::new(name, role).unwrap()
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" User ".parse::<Role>().unwrap(), Role::User);
        assert!(matches!(
            "root".parse::<Role>(),
            Err(SessionError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_user_names_must_be_file_stems() {
        for bad in ["", "../etc", "a/b", ".hidden", " padded"] {
            assert!(User::new(bad, Role::User).is_err(), "{bad:?} should be rejected");
        }
        assert!(User::new("alice", Role::User).is_ok());
    }

    #[test]
    fn test_mutations_are_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let mut session =
            Session::open(user("alice", Role::User), temp_dir.path(), Canvas::default()).unwrap();
        assert!(session.path().exists());

        let sw = session
            .add_device(DeviceKind::Switch, "sw1", "10.0.0.1", &[])
            .unwrap();
        session
            .add_device(DeviceKind::Computer, "pc1", "10.0.0.2", &[sw])
            .unwrap();
        session.rename_device(sw, "core").unwrap();

        let reopened =
            Session::open(user("alice", Role::User), temp_dir.path(), Canvas::default()).unwrap();
        let topo = reopened.topology();
        assert_eq!(topo.len(), 2);
        let pc = topo.find_by_name("pc1").unwrap();
        assert_eq!(topo.graph().linked_device_name(pc).unwrap(), "core");
        assert!(reopened.warnings().is_empty());
    }

    #[test]
    fn test_failed_mutation_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let mut session =
            Session::open(user("alice", Role::User), temp_dir.path(), Canvas::default()).unwrap();
        session
            .add_device(DeviceKind::Computer, "pc1", "10.0.0.1", &[])
            .unwrap();
        let before = std::fs::read_to_string(session.path()).unwrap();

        let err = session
            .add_device(DeviceKind::Computer, "pc1", "10.0.0.2", &[])
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Topology(TopologyError::DuplicateName(_))
        ));
        assert_eq!(std::fs::read_to_string(session.path()).unwrap(), before);
    }

    #[test]
    fn test_change_user_switches_files() {
        let temp_dir = TempDir::new().unwrap();
        let mut session =
            Session::open(user("alice", Role::User), temp_dir.path(), Canvas::default()).unwrap();
        session
            .add_device(DeviceKind::Computer, "pc1", "10.0.0.1", &[])
            .unwrap();

        session.change_user(user("bob", Role::User)).unwrap();
        assert_eq!(session.user().name, "bob");
        assert!(session.topology().is_empty());
        assert!(topology_path(temp_dir.path(), "alice").exists());
        assert!(topology_path(temp_dir.path(), "bob").exists());
    }

    #[test]
    fn test_list_users_requires_admin() {
        let temp_dir = TempDir::new().unwrap();
        Session::open(user("alice", Role::User), temp_dir.path(), Canvas::default()).unwrap();
        let session =
            Session::open(user("bob", Role::User), temp_dir.path(), Canvas::default()).unwrap();
        assert!(matches!(
            session.list_users(),
            Err(SessionError::PermissionDenied { .. })
        ));

        let admin =
            Session::open(user("root", Role::Admin), temp_dir.path(), Canvas::default()).unwrap();
        assert_eq!(admin.list_users().unwrap(), vec!["alice", "bob", "root"]);
    }
}
