// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud catalogs: server types, locations, images, SSH keys, prices.
//!
//! Catalogs are fetched once at startup and treated as immutable. Label
//! resolution and eviction pricing both read from here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// CPU architecture as reported by the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    X86,
    Arm,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::X86 => write!(f, "x86"),
            Arch::Arm => write!(f, "arm"),
        }
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86" => Ok(Arch::X86),
            "arm" => Ok(Arch::Arm),
            other => Err(format!("unknown architecture: {other}")),
        }
    }
}

/// Image kind as reported by the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    System,
    Snapshot,
    Backup,
    App,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::System => write!(f, "system"),
            ImageKind::Snapshot => write!(f, "snapshot"),
            ImageKind::Backup => write!(f, "backup"),
            ImageKind::App => write!(f, "app"),
        }
    }
}

impl FromStr for ImageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(ImageKind::System),
            "snapshot" => Ok(ImageKind::Snapshot),
            "backup" => Ok(ImageKind::Backup),
            "app" => Ok(ImageKind::App),
            other => Err(format!("unknown image kind: {other}")),
        }
    }
}

/// Reference to a cloud image: `{arch}:{kind}:{name-or-description}`.
///
/// The label form uses `-` as the separator (`image-x86-system-ubuntu-22.04`);
/// configuration uses `:`. System and app images resolve by name,
/// snapshots and backups by description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef {
    pub arch: Arch,
    pub kind: ImageKind,
    pub name: String,
}

impl ImageRef {
    pub fn new(arch: Arch, kind: ImageKind, name: impl Into<String>) -> Self {
        Self {
            arch,
            kind,
            name: name.into(),
        }
    }

    /// Label-safe form with `-` separators, used in cloud labels where
    /// `:` is not a legal value character.
    pub fn to_label(&self) -> String {
        format!("{}-{}-{}", self.arch, self.kind, self.name)
    }

    /// Parse `{arch}{sep}{kind}{sep}{name}`. The name segment may itself
    /// contain the separator.
    pub fn parse(s: &str, sep: char) -> Result<Self, String> {
        let mut parts = s.splitn(3, sep);
        let arch = parts.next().unwrap_or_default().parse::<Arch>()?;
        let kind = parts
            .next()
            .ok_or_else(|| format!("image reference missing kind: {s}"))?
            .parse::<ImageKind>()?;
        let name = parts
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("image reference missing name: {s}"))?;
        Ok(Self::new(arch, kind, name))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.arch, self.kind, self.name)
    }
}

impl TryFrom<String> for ImageRef {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ImageRef::parse(&s, ':')
    }
}

impl From<ImageRef> for String {
    fn from(r: ImageRef) -> Self {
        r.to_string()
    }
}

/// A server type from the cloud catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTypeInfo {
    pub id: u64,
    pub name: String,
    pub architecture: Arch,
}

/// A location from the cloud catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub id: u64,
    pub name: String,
}

/// An image from the cloud catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: u64,
    pub kind: ImageKind,
    pub architecture: Arch,
    pub name: Option<String>,
    pub description: String,
}

/// An SSH key registered at the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyInfo {
    pub id: u64,
    pub name: String,
    pub fingerprint: String,
}

/// Immutable snapshot of the cloud's catalogs.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub server_types: Vec<ServerTypeInfo>,
    pub locations: Vec<LocationInfo>,
    pub images: Vec<ImageInfo>,
}

impl Catalog {
    /// Resolve a server type by name (case-insensitive).
    pub fn server_type(&self, name: &str) -> Option<&ServerTypeInfo> {
        self.server_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a location by name (case-insensitive).
    pub fn location(&self, name: &str) -> Option<&LocationInfo> {
        self.locations
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
    }

    /// Resolve an image reference. System and app images match by name,
    /// snapshots and backups by description.
    pub fn image(&self, r: &ImageRef) -> Option<&ImageInfo> {
        self.images.iter().find(|i| {
            if i.architecture != r.arch || i.kind != r.kind {
                return false;
            }
            match r.kind {
                ImageKind::System | ImageKind::App => i
                    .name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(&r.name)),
                ImageKind::Snapshot | ImageKind::Backup => {
                    i.description.eq_ignore_ascii_case(&r.name)
                }
            }
        })
    }
}

/// Hourly prices keyed by `(server_type, location)`.
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    hourly: HashMap<(String, String), f64>,
}

impl PriceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, server_type: &str, location: &str, price_hourly: f64) {
        self.hourly.insert(
            (server_type.to_lowercase(), location.to_lowercase()),
            price_hourly,
        );
    }

    pub fn price_per_hour(&self, server_type: &str, location: &str) -> Option<f64> {
        self.hourly
            .get(&(server_type.to_lowercase(), location.to_lowercase()))
            .copied()
    }

    pub fn price_per_minute(&self, server_type: &str, location: &str) -> Option<f64> {
        self.price_per_hour(server_type, location).map(|p| p / 60.0)
    }

    pub fn is_empty(&self) -> bool {
        self.hourly.is_empty()
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
