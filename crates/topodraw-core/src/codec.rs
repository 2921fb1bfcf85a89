//! Line-oriented persistence of a topology
//!
//! One device per line, six comma-separated fields:
//!
//! ```text
//! <Kind>,<name>,<ip>,<links>,<x>,<y>
//! Switch,core,192.168.001.001,pc1;edge,20,20
//! Computer,pc1,192.168.001.010,core,20,120
//! ```
//!
//! A computer's link field holds one device name or `None`; a switch's holds
//! `;`-separated names (empty when unlinked). Loading is lenient: bad lines
//! are skipped and bad positions replaced, each reported as a
//! [`LoadWarning`], and the load only fails when the file cannot be read.

use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::address::CanonicalIp;
use crate::device::{Device, DeviceId, DeviceKind, Links, Position};
use crate::placement::{Canvas, FALLBACK_POSITION};
use crate::topology::{validate_name, Topology, NO_LINK};

const FIELD_COUNT: usize = 6;
const LINK_SEPARATOR: &str = ";";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A recoverable problem found while loading
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    #[error("line {line}: skipped malformed record: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("line {line}: invalid position for {device}, using default")]
    InvalidPosition { line: usize, device: String },
    #[error("line {line}: {device} links to unknown device '{target}'")]
    UnresolvedLink {
        line: usize,
        device: String,
        target: String,
    },
}

impl LoadWarning {
    pub fn line(&self) -> usize {
        match self {
            Self::MalformedRecord { line, .. }
            | Self::InvalidPosition { line, .. }
            | Self::UnresolvedLink { line, .. } => *line,
        }
    }
}

/// A topology rebuilt from text, with everything that had to be repaired
#[derive(Debug, Clone)]
pub struct Loaded {
    pub topology: Topology,
    pub warnings: Vec<LoadWarning>,
}

/// Fields of one line after the first pass
struct Record<'a> {
    line: usize,
    id: DeviceId,
    kind: DeviceKind,
    link_field: &'a str,
}

/// Serialize every device, in collection order
pub fn encode(topology: &Topology) -> String {
    let mut out = String::new();
    for (_, device) in topology.devices() {
        let links = match &device.links {
            Links::Computer { linked_device } => linked_device
                .and_then(|id| topology.graph().name_of(id))
                .unwrap_or(NO_LINK)
                .to_string(),
            Links::Switch { linked_devices } => linked_devices
                .iter()
                .filter_map(|id| topology.graph().name_of(*id))
                .collect::<Vec<_>>()
                .join(LINK_SEPARATOR),
        };
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            device.kind(),
            device.name,
            device.ip,
            links,
            device.position.x,
            device.position.y
        ));
    }
    out
}

/// Rebuild a topology from text
///
/// Devices are created first and linked in a second pass, since a link may
/// name a device defined further down. Positions are finally clamped to
/// `canvas`, which may be smaller than when the file was written.
pub fn decode(text: &str, canvas: Canvas) -> Loaded {
    decode_with(text, canvas, Vec::new())
}

fn decode_with(text: &str, canvas: Canvas, mut warnings: Vec<LoadWarning>) -> Loaded {
    let mut topology = Topology::new(canvas);

    let records: Vec<Record<'_>> = text
        .lines()
        .enumerate()
        .filter(|(_, raw)| !raw.trim().is_empty())
        .filter_map(|(index, raw)| {
            match create_device(&mut topology, index + 1, raw, &mut warnings) {
                Ok(record) => Some(record),
                Err(warning) => {
                    warnings.push(warning);
                    None
                }
            }
        })
        .collect();

    for record in &records {
        link_device(&mut topology, record, &mut warnings);
    }

    topology.clamp_positions();

    warnings.sort_by_key(LoadWarning::line);
    for warning in &warnings {
        warn!(line = warning.line(), "{}", warning);
    }
    if let Err(e) = topology.graph().check_consistency() {
        warn!(error = %e, "Loaded topology has inconsistent links");
    }

    Loaded { topology, warnings }
}

/// First pass: parse one line and register its device without links
fn create_device<'a>(
    topology: &mut Topology,
    line: usize,
    raw: &'a str,
    warnings: &mut Vec<LoadWarning>,
) -> Result<Record<'a>, LoadWarning> {
    let malformed = |reason: String| LoadWarning::MalformedRecord { line, reason };

    let fields: Vec<&str> = raw.splitn(FIELD_COUNT, ',').map(str::trim).collect();
    if fields.len() < FIELD_COUNT {
        return Err(malformed(format!(
            "expected {FIELD_COUNT} fields, found {}",
            fields.len()
        )));
    }

    let kind = fields[0]
        .parse::<DeviceKind>()
        .map_err(|e| malformed(e.to_string()))?;
    let name = validate_name(fields[1]).map_err(|e| malformed(e.to_string()))?;
    let ip = CanonicalIp::parse(fields[2]).map_err(|e| malformed(e.to_string()))?;

    let position = match (fields[4].parse::<i32>(), fields[5].parse::<i32>()) {
        (Ok(x), Ok(y)) => Position::new(x, y),
        _ => {
            warnings.push(LoadWarning::InvalidPosition {
                line,
                device: name.clone(),
            });
            FALLBACK_POSITION
        }
    };

    let id = topology
        .insert_loaded(Device::new(kind, name, ip, position))
        .map_err(|e| malformed(e.to_string()))?;

    Ok(Record {
        line,
        id,
        kind,
        link_field: fields[3],
    })
}

/// Second pass: resolve link names and connect the record's device
fn link_device(topology: &mut Topology, record: &Record<'_>, warnings: &mut Vec<LoadWarning>) {
    let device_name = topology
        .graph()
        .name_of(record.id)
        .unwrap_or_default()
        .to_string();

    let names: Vec<&str> = match record.kind {
        DeviceKind::Computer if record.link_field == NO_LINK => Vec::new(),
        DeviceKind::Computer => vec![record.link_field],
        DeviceKind::Switch => record.link_field.split(LINK_SEPARATOR).map(str::trim).collect(),
    };

    let mut targets = Vec::with_capacity(names.len());
    for name in names.into_iter().filter(|n| !n.is_empty()) {
        match topology.find_by_name(name) {
            Some(id) => targets.push(id),
            None => warnings.push(LoadWarning::UnresolvedLink {
                line: record.line,
                device: device_name.clone(),
                target: name.to_string(),
            }),
        }
    }

    let result = match record.kind {
        DeviceKind::Computer => match targets.first() {
            Some(target) => topology.graph_mut().set_linked_device(record.id, Some(*target)),
            None => Ok(()),
        },
        DeviceKind::Switch => topology.graph_mut().set_linked_devices(record.id, &targets),
    };
    if let Err(e) = result {
        warnings.push(LoadWarning::MalformedRecord {
            line: record.line,
            reason: e.to_string(),
        });
    }
}

/// Write a topology file, replacing the previous contents
///
/// The text goes to a sibling temporary file that is then renamed over
/// `path`, so readers never see a half-written file.
pub fn save(path: &Path, topology: &Topology) -> Result<(), CodecError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, encode(topology))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    info!(path = %path.display(), devices = topology.len(), "Saved topology");
    Ok(())
}

/// Load a topology file, creating an empty one if it does not exist yet
pub fn load(path: &Path, canvas: Canvas) -> Result<Loaded, CodecError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, "")?;
        info!(path = %path.display(), "Created empty topology file");
        return Ok(Loaded {
            topology: Topology::new(canvas),
            warnings: Vec::new(),
        });
    }

    let bytes = std::fs::read(path)?;
    let (text, warnings) = valid_lines(&bytes);
    let loaded = decode_with(&text, canvas, warnings);
    info!(
        path = %path.display(),
        devices = loaded.topology.len(),
        warnings = loaded.warnings.len(),
        "Loaded topology"
    );
    Ok(loaded)
}

/// Keep the lines that are valid UTF-8
///
/// Invalid lines are blanked so later lines keep their numbers, and each one
/// is reported as a malformed record.
fn valid_lines(bytes: &[u8]) -> (String, Vec<LoadWarning>) {
    let mut text = String::with_capacity(bytes.len());
    let mut warnings = Vec::new();
    for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
        if index > 0 {
            text.push('\n');
        }
        match std::str::from_utf8(raw) {
            Ok(line) => text.push_str(line),
            Err(e) => warnings.push(LoadWarning::MalformedRecord {
                line: index + 1,
                reason: format!("invalid UTF-8: {e}"),
            }),
        }
    }
    (text, warnings)
}
