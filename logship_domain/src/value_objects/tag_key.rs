// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Semantic Tag Vocabulary
//!
//! The set of recognised semantic tag keys is fixed and enumerated here.
//! Two naming schemes coexist and are selected per pipeline:
//!
//! - **Legacy**: double-underscore names (`__path__`, `__hostname__`, …)
//!   plus the single-underscore container names (`_pod_name_`, …)
//! - **Modern**: dot-separated namespaces (`log.file.path`, `host.name`, …)
//!
//! `HostIp` exists only in the modern scheme and `UserDefinedId` only in
//! the legacy scheme; rendering the missing combination falls back to the
//! scheme that defines it so a tag never silently disappears.

use serde::{Deserialize, Serialize};

/// Tag naming scheme selected by a pipeline's global options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TagScheme {
    #[default]
    Legacy,
    Modern,
}

/// The fixed set of semantic tag keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKey {
    FileOffset,
    FileInode,
    FilePath,
    K8sNamespace,
    K8sPodName,
    K8sPodUid,
    ContainerName,
    ContainerIp,
    ContainerImageName,
    K8sContainerName,
    K8sContainerImageName,
    K8sContainerIp,
    HostName,
    HostIp,
    UserDefinedId,
}

impl TagKey {
    /// Legacy rendering, or `None` where the legacy scheme has no name.
    pub fn legacy_name(&self) -> Option<&'static str> {
        match self {
            TagKey::FileOffset => Some("__file_offset__"),
            TagKey::FileInode => Some("__inode__"),
            TagKey::FilePath => Some("__path__"),
            TagKey::K8sNamespace => Some("_namespace_"),
            TagKey::K8sPodName => Some("_pod_name_"),
            TagKey::K8sPodUid => Some("_pod_uid_"),
            TagKey::ContainerName => Some("_container_name_"),
            TagKey::ContainerIp => Some("_container_ip_"),
            TagKey::ContainerImageName => Some("_image_name_"),
            TagKey::K8sContainerName => Some("_container_name_"),
            TagKey::K8sContainerImageName => Some("_image_name_"),
            TagKey::K8sContainerIp => Some("_container_ip_"),
            TagKey::HostName => Some("__hostname__"),
            TagKey::HostIp => None,
            TagKey::UserDefinedId => Some("__user_defined_id__"),
        }
    }

    /// Modern rendering, or `None` where the modern scheme has no name.
    pub fn modern_name(&self) -> Option<&'static str> {
        match self {
            TagKey::FileOffset => Some("log.file.offset"),
            TagKey::FileInode => Some("log.file.inode"),
            TagKey::FilePath => Some("log.file.path"),
            TagKey::K8sNamespace => Some("k8s.namespace"),
            TagKey::K8sPodName => Some("k8s.pod.name"),
            TagKey::K8sPodUid => Some("k8s.pod.uid"),
            TagKey::ContainerName => Some("container.name"),
            TagKey::ContainerIp => Some("container.ip"),
            TagKey::ContainerImageName => Some("container.image.name"),
            TagKey::K8sContainerName => Some("k8s.container.name"),
            TagKey::K8sContainerImageName => Some("k8s.container.image.name"),
            TagKey::K8sContainerIp => Some("k8s.container.ip"),
            TagKey::HostName => Some("host.name"),
            TagKey::HostIp => Some("host.ip"),
            TagKey::UserDefinedId => None,
        }
    }

    /// Renders this key under `scheme`, falling back to the other scheme
    /// for the keys that exist in only one.
    pub fn render(&self, scheme: TagScheme) -> &'static str {
        let preferred = match scheme {
            TagScheme::Legacy => self.legacy_name(),
            TagScheme::Modern => self.modern_name(),
        };
        preferred
            .or_else(|| self.legacy_name())
            .or_else(|| self.modern_name())
            .expect("every tag key has at least one rendering")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_renderings() {
        assert_eq!(TagKey::FilePath.render(TagScheme::Legacy), "__path__");
        assert_eq!(TagKey::FileOffset.render(TagScheme::Legacy), "__file_offset__");
        assert_eq!(TagKey::HostName.render(TagScheme::Legacy), "__hostname__");
        assert_eq!(TagKey::UserDefinedId.render(TagScheme::Legacy), "__user_defined_id__");
    }

    #[test]
    fn test_modern_renderings() {
        assert_eq!(TagKey::FilePath.render(TagScheme::Modern), "log.file.path");
        assert_eq!(TagKey::K8sPodName.render(TagScheme::Modern), "k8s.pod.name");
        assert_eq!(TagKey::HostIp.render(TagScheme::Modern), "host.ip");
    }

    #[test]
    fn test_scheme_fallbacks() {
        // HostIp has no legacy name; falls back to the modern one
        assert_eq!(TagKey::HostIp.render(TagScheme::Legacy), "host.ip");
        // UserDefinedId has no modern name; falls back to the legacy one
        assert_eq!(TagKey::UserDefinedId.render(TagScheme::Modern), "__user_defined_id__");
    }
}
