//! Field-level payload comparison.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::differ::models::DiffOptions;
use crate::models::{FilePayload, Payload};
use crate::utils::hash::sha256_hex;

/// Fields that differ between two payloads of the same variant
#[derive(Debug, Default, PartialEq)]
pub(crate) struct PayloadDelta {
    pub content_fields: Vec<String>,
    pub time_fields: Vec<String>,
}

impl PayloadDelta {
    pub fn is_empty(&self) -> bool {
        self.content_fields.is_empty() && self.time_fields.is_empty()
    }

    /// Only time fields changed
    pub fn is_timestamp_only(&self) -> bool {
        self.content_fields.is_empty() && !self.time_fields.is_empty()
    }

    pub fn into_changed_fields(self) -> Vec<String> {
        let mut fields = self.content_fields;
        fields.extend(self.time_fields);
        fields
    }
}

/// Compare two payloads field by field.
///
/// Both payloads are expected to be the same variant; the caller validates
/// kind tags before comparing.
pub(crate) fn compare_payloads(
    before: &Payload,
    after: &Payload,
    options: &DiffOptions,
) -> serde_json::Result<PayloadDelta> {
    let before_fields = comparable_fields(before, options)?;
    let after_fields = comparable_fields(after, options)?;

    let names: BTreeSet<&String> = before_fields.keys().chain(after_fields.keys()).collect();

    let mut delta = PayloadDelta::default();
    for name in names {
        if before_fields.get(name) == after_fields.get(name) {
            continue;
        }
        if is_time_field(before, name, options) {
            delta.time_fields.push(name.clone());
        } else {
            delta.content_fields.push(name.clone());
        }
    }

    Ok(delta)
}

/// Flattened fields, with file content replaced by its hash in hash mode
fn comparable_fields(payload: &Payload, options: &DiffOptions) -> serde_json::Result<BTreeMap<String, Value>> {
    let payload = match payload {
        Payload::File(file) if options.hash_files => Cow::Owned(Payload::File(hashed(file))),
        other => Cow::Borrowed(other),
    };
    payload.fields()
}

fn hashed(file: &FilePayload) -> FilePayload {
    let sha256 = file
        .sha256
        .clone()
        .or_else(|| file.content.as_deref().map(sha256_hex));

    FilePayload {
        sha256,
        content: None,
        ..file.clone()
    }
}

fn is_time_field(payload: &Payload, name: &str, options: &DiffOptions) -> bool {
    if payload.time_fields().contains(&name) {
        return true;
    }

    let nested = name
        .strip_prefix("columns.")
        .or_else(|| name.strip_prefix("attributes."));

    match nested {
        Some(key) => options.time_fields.contains(&key.to_lowercase()),
        None => false,
    }
}
