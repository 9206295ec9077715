//! Core forensic artifact model.
//!
//! Every artifact shares one shape: a [`ArtifactKind`] tag, a kind-specific
//! identity key, a kind-specific [`Payload`] and the time it was observed.
//! Payloads are a closed set of tagged variants so the differ and the noise
//! filter can dispatch on the tag exhaustively.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of forensic artifact captured from the device.
///
/// The declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    File,
    DatabaseRow,
    XmlEntry,
    Process,
    Socket,
    NetworkFlow,
    ApkEntry,
}

impl ArtifactKind {
    /// All kinds, in report order.
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::File,
        ArtifactKind::DatabaseRow,
        ArtifactKind::XmlEntry,
        ArtifactKind::Process,
        ArtifactKind::Socket,
        ArtifactKind::NetworkFlow,
        ArtifactKind::ApkEntry,
    ];

    /// Parse a kind from its display name (case-insensitive, `-`/`_` ignored)
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();

        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.to_string().to_lowercase() == normalized)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::File => write!(f, "File"),
            ArtifactKind::DatabaseRow => write!(f, "DatabaseRow"),
            ArtifactKind::XmlEntry => write!(f, "XmlEntry"),
            ArtifactKind::Process => write!(f, "Process"),
            ArtifactKind::Socket => write!(f, "Socket"),
            ArtifactKind::NetworkFlow => write!(f, "NetworkFlow"),
            ArtifactKind::ApkEntry => write!(f, "ApkEntry"),
        }
    }
}

/// File on the device filesystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilePayload {
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Raw content, when the capture pulled the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    /// File is only visible through deleted-file recovery
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessed_at: Option<DateTime<Utc>>,
}

/// One row of an SQLite database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowPayload {
    pub database: String,
    pub table: String,
    #[serde(default)]
    pub columns: BTreeMap<String, Value>,
}

/// One element of an XML file (shared preferences and friends)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XmlPayload {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Running process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessPayload {
    pub pid: u32,
    #[serde(default)]
    pub argv: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Open socket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocketPayload {
    pub protocol: String,
    pub local_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
}

/// Network flow observed on the emulator interface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowPayload {
    pub protocol: String,
    pub remote_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_host: Option<String>,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_received: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Installed package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApkPayload {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}

/// Kind-specific artifact content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    File(FilePayload),
    DatabaseRow(RowPayload),
    XmlEntry(XmlPayload),
    Process(ProcessPayload),
    Socket(SocketPayload),
    NetworkFlow(FlowPayload),
    ApkEntry(ApkPayload),
}

impl Payload {
    /// The kind this payload variant belongs to
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Payload::File(_) => ArtifactKind::File,
            Payload::DatabaseRow(_) => ArtifactKind::DatabaseRow,
            Payload::XmlEntry(_) => ArtifactKind::XmlEntry,
            Payload::Process(_) => ArtifactKind::Process,
            Payload::Socket(_) => ArtifactKind::Socket,
            Payload::NetworkFlow(_) => ArtifactKind::NetworkFlow,
            Payload::ApkEntry(_) => ArtifactKind::ApkEntry,
        }
    }

    /// Structural timestamp fields of this variant.
    ///
    /// These never take part in content equality.
    pub fn time_fields(&self) -> &'static [&'static str] {
        match self {
            Payload::File(_) => &["modified_at", "accessed_at"],
            Payload::Process(_) => &["started_at"],
            Payload::NetworkFlow(_) => &["first_seen", "last_seen"],
            Payload::ApkEntry(_) => &["installed_at"],
            Payload::DatabaseRow(_) | Payload::XmlEntry(_) | Payload::Socket(_) => &[],
        }
    }

    /// Flatten the payload into `field name -> value`.
    ///
    /// Map-valued fields (row columns, XML attributes) are flattened one
    /// level deep as `columns.NAME` / `attributes.NAME`. Absent optional
    /// fields are omitted.
    pub fn fields(&self) -> serde_json::Result<BTreeMap<String, Value>> {
        let mut flat = BTreeMap::new();
        if let Value::Object(object) = serde_json::to_value(self)? {
            for (name, value) in object {
                if name == "type" {
                    continue;
                }
                match value {
                    Value::Object(nested) => {
                        for (key, inner) in nested {
                            flat.insert(format!("{}.{}", name, key), inner);
                        }
                    }
                    other => {
                        flat.insert(name, other);
                    }
                }
            }
        }
        Ok(flat)
    }

    /// Look up a single flattened field (see [`Payload::fields`])
    pub fn field_value(&self, name: &str) -> Option<Value> {
        self.fields().ok()?.remove(name)
    }
}

/// One forensic artifact observed in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub identity_key: String,
    pub payload: Payload,
    pub observed_at: DateTime<Utc>,
}

impl Artifact {
    /// Create an artifact whose kind tag follows the payload variant
    pub fn new(identity_key: impl Into<String>, payload: Payload, observed_at: DateTime<Utc>) -> Self {
        Self {
            kind: payload.kind(),
            identity_key: identity_key.into(),
            payload,
            observed_at,
        }
    }

    /// File artifact keyed by its path
    pub fn file(path: &str, payload: FilePayload, observed_at: DateTime<Utc>) -> Self {
        Self::new(path, Payload::File(payload), observed_at)
    }

    /// Database row keyed by database, table and primary key
    pub fn database_row(primary_key: &str, payload: RowPayload, observed_at: DateTime<Utc>) -> Self {
        let key = format!("{}:{}:{}", payload.database, payload.table, primary_key);
        Self::new(key, Payload::DatabaseRow(payload), observed_at)
    }

    /// XML entry keyed by file and element id
    pub fn xml_entry(element_id: &str, payload: XmlPayload, observed_at: DateTime<Utc>) -> Self {
        let key = format!("{}#{}", payload.file, element_id);
        Self::new(key, Payload::XmlEntry(payload), observed_at)
    }

    /// Process keyed by PID and command
    pub fn process(payload: ProcessPayload, observed_at: DateTime<Utc>) -> Self {
        let command = payload.argv.first().map(String::as_str).unwrap_or("");
        let key = format!("{}:{}", payload.pid, command);
        Self::new(key, Payload::Process(payload), observed_at)
    }

    /// Socket keyed by its protocol and endpoint pair
    pub fn socket(payload: SocketPayload, observed_at: DateTime<Utc>) -> Self {
        let remote = payload.remote_address.as_deref().unwrap_or("*");
        let key = format!("{} {} -> {}", payload.protocol, payload.local_address, remote);
        Self::new(key, Payload::Socket(payload), observed_at)
    }

    /// Network flow keyed by protocol and remote endpoint
    pub fn network_flow(payload: FlowPayload, observed_at: DateTime<Utc>) -> Self {
        let key = format!("{} {}", payload.protocol, payload.remote_address);
        Self::new(key, Payload::NetworkFlow(payload), observed_at)
    }

    /// Installed package keyed by package name
    pub fn apk_entry(payload: ApkPayload, observed_at: DateTime<Utc>) -> Self {
        let key = payload.package.clone();
        Self::new(key, Payload::ApkEntry(payload), observed_at)
    }
}

/// Immutable capture of device state at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub label: String,
    pub captured_at: DateTime<Utc>,
    artifacts: Vec<Artifact>,
}

impl Snapshot {
    pub fn new(label: impl Into<String>, captured_at: DateTime<Utc>, artifacts: Vec<Artifact>) -> Self {
        Self {
            label: label.into(),
            captured_at,
            artifacts,
        }
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Artifacts tagged with `kind`
    pub fn partition(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(move |a| a.kind == kind)
    }

    /// Kinds present in this snapshot
    pub fn kinds(&self) -> BTreeSet<ArtifactKind> {
        self.artifacts.iter().map(|a| a.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// New snapshot holding only the artifacts accepted by `keep`
    pub fn filtered<F>(&self, keep: F) -> Snapshot
    where
        F: Fn(&Artifact) -> bool,
    {
        Snapshot {
            label: self.label.clone(),
            captured_at: self.captured_at,
            artifacts: self.artifacts.iter().filter(|a| keep(a)).cloned().collect(),
        }
    }
}
