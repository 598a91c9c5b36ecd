// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Label parsing: from a job's label set to a [`RunnerSpec`].
//!
//! Reserved labels carry the configured prefix: `type-*`, `in-*`,
//! `image-{arch}-{kind}-{name}`, `setup-*`, `startup-*`. Anything else
//! rides along as a plain runner label. Derivation is deterministic:
//! the same labels, configuration, and catalogs always produce the same
//! spec and fingerprint.

use ghr_config::Config;
use ghr_core::catalog::{Catalog, ImageRef};
use ghr_core::RunnerSpec;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a job's label set could not be turned into a spec. The job is
/// skipped for the tick; a new job event with different labels retries.
#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    #[error("conflicting '{category}' labels: {first} vs {second}")]
    DuplicateCategory {
        category: &'static str,
        first: String,
        second: String,
    },
    #[error("unknown server type: {0}")]
    UnknownServerType(String),
    #[error("unknown location: {0}")]
    UnknownLocation(String),
    #[error("unknown image: {0}")]
    UnknownImage(String),
    #[error("invalid image reference: {0}")]
    InvalidImageRef(String),
    #[error("script not found: {0}")]
    ScriptNotFound(PathBuf),
    #[error("scripts directory is not configured")]
    NoScriptsDir,
}

/// One-level meta-label expansion. A label equal to a configured
/// meta-label key (under the prefix) is replaced by its list; expansion
/// is not transitive and duplicates keep their first occurrence.
pub fn expand_meta_labels(
    labels: &BTreeSet<String>,
    meta: &HashMap<String, Vec<String>>,
    label_prefix: &str,
) -> Vec<String> {
    let prefix = normalized_prefix(label_prefix);
    let mut expanded: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut push = |label: String, expanded: &mut Vec<String>| {
        if seen.insert(label.clone()) {
            expanded.push(label);
        }
    };

    for label in labels {
        let label = label.to_lowercase();
        push(label.clone(), &mut expanded);

        let raw = match label.strip_prefix(&prefix) {
            Some(raw) if !prefix.is_empty() => raw,
            _ if prefix.is_empty() => label.as_str(),
            _ => continue,
        };
        if let Some(expansion) = meta.get(raw) {
            for item in expansion {
                push(item.to_lowercase(), &mut expanded);
            }
        }
    }
    expanded
}

fn normalized_prefix(label_prefix: &str) -> String {
    let prefix = label_prefix.to_lowercase();
    if prefix.is_empty() || prefix.ends_with('-') {
        prefix
    } else {
        format!("{prefix}-")
    }
}

#[derive(Default)]
struct Reserved {
    server_type: Option<String>,
    location: Option<String>,
    image: Option<String>,
    setup: Option<String>,
    startup: Option<String>,
}

fn take(
    slot: &mut Option<String>,
    category: &'static str,
    value: &str,
) -> Result<(), SpecError> {
    match slot {
        Some(existing) if existing != value => Err(SpecError::DuplicateCategory {
            category,
            first: existing.clone(),
            second: value.to_string(),
        }),
        _ => {
            *slot = Some(value.to_string());
            Ok(())
        }
    }
}

fn partition(labels: &[String], label_prefix: &str) -> Result<Reserved, SpecError> {
    let prefix = normalized_prefix(label_prefix);
    let mut reserved = Reserved::default();

    for label in labels {
        let raw = if prefix.is_empty() {
            label.as_str()
        } else {
            match label.strip_prefix(&prefix) {
                Some(raw) => raw,
                None => continue,
            }
        };

        if let Some(value) = raw.strip_prefix("type-") {
            take(&mut reserved.server_type, "type", value)?;
        } else if let Some(value) = raw.strip_prefix("in-") {
            take(&mut reserved.location, "in", value)?;
        } else if let Some(value) = raw.strip_prefix("image-") {
            take(&mut reserved.image, "image", value)?;
        } else if let Some(value) = raw.strip_prefix("setup-") {
            take(&mut reserved.setup, "setup", value)?;
        } else if let Some(value) = raw.strip_prefix("startup-") {
            take(&mut reserved.startup, "startup", value)?;
        }
    }
    Ok(reserved)
}

fn resolve_script(dir: &Path, file: String) -> Result<PathBuf, SpecError> {
    let path = dir.join(file);
    if path.is_file() {
        Ok(path)
    } else {
        Err(SpecError::ScriptNotFound(path))
    }
}

/// Derive the spec for a job's label set.
pub fn derive_spec(
    job_labels: &BTreeSet<String>,
    config: &Config,
    catalog: &Catalog,
    ssh_keys_hash: &str,
) -> Result<RunnerSpec, SpecError> {
    let expanded = expand_meta_labels(job_labels, &config.meta_label, &config.label_prefix);
    let reserved = partition(&expanded, &config.label_prefix)?;

    let server_type_name = reserved
        .server_type
        .unwrap_or_else(|| config.default_server_type.to_lowercase());
    let server_type = catalog
        .server_type(&server_type_name)
        .ok_or_else(|| SpecError::UnknownServerType(server_type_name.clone()))?;

    let location = match reserved
        .location
        .or_else(|| config.default_location.as_ref().map(|l| l.to_lowercase()))
    {
        Some(name) => Some(
            catalog
                .location(&name)
                .map(|l| l.name.clone())
                .ok_or(SpecError::UnknownLocation(name))?,
        ),
        None => None,
    };

    let image_ref = match reserved.image {
        Some(raw) => ImageRef::parse(&raw, '-').map_err(SpecError::InvalidImageRef)?,
        None => config.default_image.clone(),
    };
    let image = catalog
        .image(&image_ref)
        .ok_or_else(|| SpecError::UnknownImage(image_ref.to_string()))?;

    let scripts_dir = config.scripts.as_deref().ok_or(SpecError::NoScriptsDir)?;
    let setup_script = resolve_script(
        scripts_dir,
        match reserved.setup {
            Some(name) => format!("{name}.sh"),
            None => "setup.sh".to_string(),
        },
    )?;
    let startup_script = resolve_script(
        scripts_dir,
        match reserved.startup {
            Some(name) => format!("{name}.sh"),
            None => format!("startup-{}.sh", server_type.architecture),
        },
    )?;

    Ok(RunnerSpec {
        server_type: server_type.name.clone(),
        location,
        image: image_ref,
        image_id: image.id,
        setup_script,
        startup_script,
        labels: expanded.into_iter().collect(),
        ssh_keys_hash: ssh_keys_hash.to_string(),
    })
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod tests;
