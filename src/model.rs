//! Canonical record types shared by the reader, merge engine and writer.
//!
//! Field names serialize in the camelCase form the surrounding API layer
//! exposes (`createdAt`, `viewpointGuid`, `snapshotData`).

use serde::{Deserialize, Serialize};

/// Project-level metadata discovered in an archive. Fields stay `None`
/// when the source archive never declared them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcf_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

/// A binary attachment as carried through a transport boundary.
///
/// `Binary` is what the reader produces. `Text` is accepted on the way in
/// (JSON callers send base64 or literal text); the writer coerces it back
/// to bytes without the caller having to care.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Binary(Vec<u8>),
    Text(String),
}

/// One issue/comment-thread record within a BCF archive.
///
/// `guid` is the join key across archives during a merge. A topic whose
/// markup never declared a guid gets the basename of its folder instead;
/// if even that is empty the merge engine assigns a per-archive placeholder
/// that never collides with a real guid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub viewpoints: Vec<Viewpoint>,
    /// Archive-relative path of the topic's primary image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_data: Option<Payload>,
}

impl Topic {
    /// Flat reference-string view of the viewpoints, computed on demand
    /// from the canonical structured list. Per viewpoint the first
    /// non-empty of viewpoint file, snapshot file, guid, index.
    pub fn viewpoint_refs(&self) -> Vec<String> {
        self.viewpoints
            .iter()
            .filter_map(|vp| {
                [&vp.viewpoint, &vp.snapshot, &vp.guid, &vp.index]
                    .into_iter()
                    .find_map(|value| {
                        value
                            .as_deref()
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                    })
            })
            .collect()
    }
}

/// A single comment on a topic. Identity for deduplication is the
/// `(author, date, text)` tuple, trimmed, case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Non-owning back-reference to a viewpoint by guid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewpoint_guid: Option<String>,
}

/// A saved camera position plus optional snapshot image. `viewpoint` and
/// `snapshot` are archive-relative file references after the reader has
/// resolved them; the `*_data` fields carry the referenced bytes when the
/// entry existed inside the archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewpoint_data: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_data: Option<Payload>,
}
