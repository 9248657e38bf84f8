//! Merge Engine: combines N archives into one canonical record set.
//!
//! Topics join on guid across archives. Scalars complete first-non-empty,
//! comments and viewpoints union append-only, and the chosen snapshot
//! follows the archive with the latest parsed `createdAt`. Inputs are
//! never mutated; the engine works on its own copies and hands the result
//! to the writer.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{BcfError, BcfResult};
use crate::model::{Comment, ProjectMeta, Topic, Viewpoint};
use crate::reader::read_bcf;
use crate::writer::write_bcf;

type CommentKey = (String, String, String);
type ViewpointKey = (String, String, String, String);

/// Merge multiple BCF archives into a single archive and return its path.
///
/// When `out_path` is omitted a persisted temporary `.bcfzip` file is
/// created and returned. Fails before any I/O on an empty input list, and
/// aborts without partial output when any input path is missing.
pub fn merge_bcfs<P: AsRef<Path>>(paths: &[P], out_path: Option<&Path>) -> BcfResult<PathBuf> {
    let (merged_meta, merged_topics) = merge_records(paths)?;

    let output_path = match out_path {
        Some(path) => path.to_path_buf(),
        None => {
            let tmp = tempfile::Builder::new()
                .prefix("merged_")
                .suffix(".bcfzip")
                .tempfile()?;
            let (_file, path) = tmp.keep().map_err(|e| BcfError::Io(e.error))?;
            path
        }
    };

    write_bcf(&output_path, &merged_meta, &merged_topics)?;
    Ok(output_path)
}

/// Accumulate the canonical merged record set without writing it out.
pub(crate) fn merge_records<P: AsRef<Path>>(
    paths: &[P],
) -> BcfResult<(ProjectMeta, Vec<Topic>)> {
    if paths.is_empty() {
        return Err(BcfError::NoInputs);
    }

    let mut merged_meta = ProjectMeta::default();
    let mut aggregated: HashMap<String, AggregatedTopic> = HashMap::new();
    let mut topic_order: Vec<String> = Vec::new();

    for (archive_index, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BcfError::Read {
                path: path.to_path_buf(),
                reason: "no such file or directory".to_string(),
            });
        }

        let (meta, topics) = read_bcf(path);
        log::debug!(
            "merging {} topic(s) from {}",
            topics.len(),
            path.display()
        );

        fill(&mut merged_meta.bcf_version, meta.bcf_version);
        fill(&mut merged_meta.project_name, meta.project_name);

        for (topic_index, topic) in topics.into_iter().enumerate() {
            let guid = match topic.guid.as_deref().map(str::trim) {
                Some(guid) if !guid.is_empty() => guid.to_string(),
                // Placeholder keyed by position: never collides with a real
                // guid, so guid-less topics stay out of cross-archive joins.
                _ => format!("__missing_guid__{archive_index}_{topic_index}"),
            };

            match aggregated.entry(guid.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(AggregatedTopic::new(topic));
                    topic_order.push(guid);
                }
                Entry::Occupied(mut slot) => slot.get_mut().absorb(topic),
            }
        }
    }

    let merged_topics: Vec<Topic> = topic_order
        .iter()
        .filter_map(|guid| aggregated.remove(guid))
        .map(AggregatedTopic::into_topic)
        .collect();

    Ok((merged_meta, merged_topics))
}

/// One merged topic under accumulation, with the key sets that make the
/// comment/viewpoint unions append-only and the timestamp tracked for the
/// currently chosen snapshot.
struct AggregatedTopic {
    topic: Topic,
    comment_keys: HashSet<CommentKey>,
    viewpoint_keys: HashSet<ViewpointKey>,
    snapshot_timestamp: Option<NaiveDateTime>,
}

impl AggregatedTopic {
    fn new(topic: Topic) -> Self {
        let comment_keys = topic.comments.iter().map(comment_key).collect();
        let viewpoint_keys = topic.viewpoints.iter().map(viewpoint_key).collect();
        let snapshot_timestamp = topic
            .created_at
            .as_deref()
            .and_then(parse_timestamp);
        AggregatedTopic {
            topic,
            comment_keys,
            viewpoint_keys,
            snapshot_timestamp,
        }
    }

    fn absorb(&mut self, incoming: Topic) {
        self.reconcile_snapshot(&incoming);

        // Scalar completion: a later archive only fills blanks, it never
        // overwrites a present value.
        fill(&mut self.topic.guid, incoming.guid);
        fill(&mut self.topic.title, incoming.title);
        fill(&mut self.topic.status, incoming.status);
        fill(&mut self.topic.priority, incoming.priority);
        fill(&mut self.topic.author, incoming.author);
        fill(&mut self.topic.created_at, incoming.created_at);

        for comment in incoming.comments {
            if self.comment_keys.insert(comment_key(&comment)) {
                self.topic.comments.push(comment);
            }
        }

        for viewpoint in incoming.viewpoints {
            if self.viewpoint_keys.insert(viewpoint_key(&viewpoint)) {
                self.topic.viewpoints.push(viewpoint);
            }
        }
    }

    /// An incoming snapshot displaces the current one only when none is set
    /// yet, the tracked timestamp is unparsable, or the incoming topic's
    /// `createdAt` parses strictly later. Path and payload move together.
    fn reconcile_snapshot(&mut self, incoming: &Topic) {
        let Some(incoming_snapshot) = incoming
            .snapshot
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return;
        };
        let incoming_timestamp = incoming
            .created_at
            .as_deref()
            .and_then(parse_timestamp);

        // Same path, missing bytes: complete the payload without touching
        // the freshness decision.
        if self.topic.snapshot.as_deref() == Some(incoming_snapshot)
            && self.topic.snapshot_data.is_none()
            && incoming.snapshot_data.is_some()
        {
            self.topic.snapshot_data = incoming.snapshot_data.clone();
        }

        let replace = match (&self.topic.snapshot, self.snapshot_timestamp) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(_), Some(current)) => {
                incoming_timestamp.is_some_and(|ts| ts > current)
            }
        };
        if replace {
            self.topic.snapshot = Some(incoming_snapshot.to_string());
            self.topic.snapshot_data = incoming.snapshot_data.clone();
            self.snapshot_timestamp = incoming_timestamp.or(self.snapshot_timestamp);
        }
    }

    fn into_topic(self) -> Topic {
        self.topic
    }
}

/// First-non-empty-wins completion for one scalar slot.
fn fill(slot: &mut Option<String>, value: Option<String>) {
    let blank = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank && value.as_deref().map_or(false, |s| !s.trim().is_empty()) {
        *slot = value;
    }
}

fn keyed(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("").trim().to_string()
}

fn comment_key(comment: &Comment) -> CommentKey {
    (
        keyed(&comment.author),
        keyed(&comment.date),
        keyed(&comment.text),
    )
}

fn viewpoint_key(viewpoint: &Viewpoint) -> ViewpointKey {
    (
        keyed(&viewpoint.guid),
        keyed(&viewpoint.viewpoint),
        keyed(&viewpoint.snapshot),
        keyed(&viewpoint.index),
    )
}

/// Lenient timestamp cascade: RFC 3339 first (trailing `Z` as UTC), then
/// the common date/time patterns, else unparsable.
pub(crate) fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let candidate = value.trim();
    if candidate.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(candidate) {
        return Some(parsed.naive_utc());
    }
    let head = candidate.split('.').next().unwrap_or(candidate);
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(head, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
