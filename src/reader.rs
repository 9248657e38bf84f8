//! Archive Reader: turns one BCF archive (zip or extracted directory) into
//! `(ProjectMeta, Vec<Topic>)`.
//!
//! The reader never fails. Unrecognized containers, malformed XML and
//! dangling file references all degrade to empty/default values, because
//! "no topics extracted" is a normal, user-facing outcome downstream.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::model::{Comment, Payload, ProjectMeta, Topic, Viewpoint};
use crate::xml::{self, XmlElement};

/// Ordered source keys per topic field; attributes are consulted before
/// child elements, first non-empty value wins.
const TOPIC_GUID_KEYS: &[&str] = &["Guid"];
const TOPIC_TITLE_KEYS: &[&str] = &["Title"];
const TOPIC_STATUS_KEYS: &[&str] = &["Status", "TopicStatus"];
const TOPIC_PRIORITY_KEYS: &[&str] = &["Priority"];
const TOPIC_AUTHOR_KEYS: &[&str] = &["CreationAuthor", "Author"];
const TOPIC_CREATED_KEYS: &[&str] = &["CreationDate", "CreatedDate"];
const TOPIC_SNAPSHOT_KEYS: &[&str] = &["Snapshot"];

const COMMENT_GUID_KEYS: &[&str] = &["Guid"];
const COMMENT_AUTHOR_KEYS: &[&str] = &["Author", "CreationAuthor"];
const COMMENT_DATE_KEYS: &[&str] = &["Date", "CreationDate"];
const COMMENT_VIEWPOINT_KEYS: &[&str] = &["ViewpointGuid"];

const VERSION_VALUE_KEYS: &[&str] = &["DetailedVersion", "VersionId", "Version"];
const PROJECT_NAME_KEYS: &[&str] = &["Name", "ProjectName"];

/// Child local names that mark a bare `Viewpoint` element as carrying real
/// viewpoint data (guards the fallback scan against unrelated elements of
/// the same name, e.g. comment back-references).
const VIEWPOINT_PAYLOAD_CHILDREN: &[&str] =
    &["viewpoint", "snapshot", "orthogonalcamera", "perspectivecamera"];

/// Read a BCF 2.1/3.0 archive and extract project metadata and topics.
///
/// Accepts a zip file or an extracted directory (also a path ending in
/// `.bcf`). Anything else yields empty structures.
pub fn read_bcf(path: &Path) -> (ProjectMeta, Vec<Topic>) {
    match Container::open(path) {
        Some(mut container) => read_container(&mut container),
        None => (ProjectMeta::default(), Vec::new()),
    }
}

/// One access layer over both container kinds, so zip-backed and
/// directory-backed archives with equal content read identically.
enum Container {
    Zip(zip::ZipArchive<fs::File>),
    Dir(PathBuf),
}

impl Container {
    fn open(path: &Path) -> Option<Container> {
        if let Ok(file) = fs::File::open(path) {
            if let Ok(archive) = zip::ZipArchive::new(file) {
                return Some(Container::Zip(archive));
            }
        }
        let looks_extracted =
            path.is_dir() || path.to_string_lossy().to_lowercase().ends_with(".bcf");
        if looks_extracted {
            return Some(Container::Dir(path.to_path_buf()));
        }
        None
    }

    /// Sorted archive-relative entry names (files only, forward slashes).
    fn entry_names(&mut self) -> Vec<String> {
        let mut names: Vec<String> = match self {
            Container::Zip(archive) => archive
                .file_names()
                .filter(|name| !name.ends_with('/'))
                .map(str::to_string)
                .collect(),
            Container::Dir(root) => walkdir::WalkDir::new(&*root)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| {
                    entry
                        .path()
                        .strip_prefix(&*root)
                        .ok()
                        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                })
                .collect(),
        };
        names.sort();
        names
    }

    fn read_entry(&mut self, name: &str) -> Option<Vec<u8>> {
        match self {
            Container::Zip(archive) => {
                let mut entry = archive.by_name(name).ok()?;
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes).ok()?;
                Some(bytes)
            }
            Container::Dir(root) => {
                let path = root.join(name.replace('/', std::path::MAIN_SEPARATOR_STR));
                if path.is_file() {
                    fs::read(path).ok()
                } else {
                    None
                }
            }
        }
    }
}

fn read_container(container: &mut Container) -> (ProjectMeta, Vec<Topic>) {
    let names = container.entry_names();
    let mut meta = ProjectMeta::default();

    if let Some(version_file) = find_by_suffix(&names, &["bcf.version"]) {
        if let Some(bytes) = container.read_entry(&version_file) {
            meta.bcf_version = parse_version(&bytes);
        }
    }
    if let Some(project_file) = find_by_suffix(&names, &["project.bcfp"]) {
        if let Some(bytes) = container.read_entry(&project_file) {
            meta.project_name = parse_project_name(&bytes);
        }
    }

    let topic_files: Vec<String> = names
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.ends_with("markup.bcf") || lower.ends_with("topic.bcf")
        })
        .cloned()
        .collect();

    let mut topics = Vec::new();
    for topic_file in topic_files {
        let topic_dir = posix_dirname(&topic_file);
        let bytes = container.read_entry(&topic_file).unwrap_or_default();
        let mut topic = parse_topic(&bytes);
        if topic.guid.as_deref().map_or(true, |g| g.trim().is_empty()) {
            let folder = posix_basename(topic_dir);
            if !folder.is_empty() {
                topic.guid = Some(folder.to_string());
            }
        }
        attach_payloads(&mut topic, topic_dir, container);
        topics.push(topic);
    }

    (meta, topics)
}

/// First entry (in sorted order) whose lowercased name ends with one of the
/// given suffixes.
fn find_by_suffix(names: &[String], suffixes: &[&str]) -> Option<String> {
    names
        .iter()
        .find(|name| {
            let lower = name.to_lowercase();
            suffixes.iter().any(|suffix| lower.ends_with(suffix))
        })
        .cloned()
}

fn parse_version(bytes: &[u8]) -> Option<String> {
    let root = xml::parse(bytes)?;
    let candidate = std::iter::once(&root)
        .chain(root.descendants())
        .find(|elem| elem.is_named("versioninfo") || elem.is_named("version"))?;
    candidate.lookup(VERSION_VALUE_KEYS).or_else(|| {
        let text = candidate.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    })
}

fn parse_project_name(bytes: &[u8]) -> Option<String> {
    let root = xml::parse(bytes)?;
    std::iter::once(&root)
        .chain(root.descendants())
        .filter(|elem| elem.is_named("projectinfo") || elem.is_named("project"))
        .find_map(|elem| elem.lookup(PROJECT_NAME_KEYS))
}

/// Parse one topic markup document. Malformed XML yields an empty skeleton
/// so sibling topics are unaffected.
pub(crate) fn parse_topic(bytes: &[u8]) -> Topic {
    let Some(root) = xml::parse(bytes) else {
        log::warn!("malformed topic markup, emitting empty skeleton");
        return Topic::default();
    };

    let topic_elem = if root.is_named("topic") {
        Some(&root)
    } else {
        root.descendants().find(|elem| elem.is_named("topic"))
    };

    let mut topic = Topic::default();
    if let Some(elem) = topic_elem {
        topic.guid = elem.lookup(TOPIC_GUID_KEYS);
        topic.title = elem.lookup(TOPIC_TITLE_KEYS);
        topic.status = elem.lookup(TOPIC_STATUS_KEYS);
        topic.priority = elem.lookup(TOPIC_PRIORITY_KEYS);
        topic.author = elem.lookup(TOPIC_AUTHOR_KEYS);
        topic.created_at = elem.lookup(TOPIC_CREATED_KEYS);
        topic.snapshot = elem.lookup(TOPIC_SNAPSHOT_KEYS);
    }

    topic.comments = collect_comments(&root);
    topic.viewpoints = collect_viewpoints(&root);

    // No snapshot referenced directly on the topic element: take the first
    // viewpoint that carries one.
    if topic.snapshot.is_none() {
        topic.snapshot = topic
            .viewpoints
            .iter()
            .find_map(|vp| vp.snapshot.clone());
    }

    topic
}

fn collect_comments(root: &XmlElement) -> Vec<Comment> {
    let parent = if root.is_named("comments") {
        Some(root)
    } else {
        root.child("comments")
    };

    match parent {
        Some(parent) => parent
            .children
            .iter()
            .filter(|elem| elem.is_named("comment"))
            .map(parse_comment)
            .collect(),
        // No container element: scan the whole document.
        None => root
            .descendants()
            .filter(|elem| elem.is_named("comment"))
            .map(parse_comment)
            .collect(),
    }
}

fn parse_comment(elem: &XmlElement) -> Comment {
    Comment {
        guid: elem.lookup(COMMENT_GUID_KEYS),
        author: elem.lookup(COMMENT_AUTHOR_KEYS),
        date: elem.lookup(COMMENT_DATE_KEYS),
        text: elem.child_text("comment"),
        viewpoint_guid: elem.lookup(COMMENT_VIEWPOINT_KEYS),
    }
}

fn collect_viewpoints(root: &XmlElement) -> Vec<Viewpoint> {
    let parent = root
        .child("viewpoints")
        .or_else(|| root.is_named("viewpoints").then_some(root));

    let candidates: Vec<&XmlElement> = match parent {
        Some(parent) => parent
            .children
            .iter()
            .filter(|elem| elem.is_named("viewpoint"))
            .collect(),
        None => root
            .descendants()
            .filter(|elem| elem.is_named("viewpoint") && has_viewpoint_payload(elem))
            .collect(),
    };

    candidates
        .into_iter()
        .map(|elem| Viewpoint {
            guid: elem.lookup(&["Guid"]),
            viewpoint: elem.child_text("viewpoint"),
            snapshot: elem.child_text("snapshot"),
            index: elem.lookup(&["Index"]),
            viewpoint_data: None,
            snapshot_data: None,
        })
        .collect()
}

fn has_viewpoint_payload(elem: &XmlElement) -> bool {
    elem.children.iter().any(|child| {
        VIEWPOINT_PAYLOAD_CHILDREN
            .iter()
            .any(|name| child.is_named(name))
    })
}

/// Resolve file references against the topic directory (archive root for
/// absolute-looking ones), then attach the referenced bytes where the
/// entries exist. Dangling references keep their path without payload.
fn attach_payloads(topic: &mut Topic, topic_dir: &str, container: &mut Container) {
    let mut topic_snapshot_path = resolve_reference(topic_dir, topic.snapshot.as_deref());
    let mut topic_snapshot_data: Option<Vec<u8>> = None;

    for vp in &mut topic.viewpoints {
        vp.viewpoint = resolve_reference(topic_dir, vp.viewpoint.as_deref());
        vp.snapshot = resolve_reference(topic_dir, vp.snapshot.as_deref());

        if let Some(path) = vp.viewpoint.clone() {
            if let Some(bytes) = container.read_entry(&path) {
                vp.viewpoint_data = Some(Payload::Binary(bytes));
            }
        }
        if let Some(path) = vp.snapshot.clone() {
            if let Some(bytes) = container.read_entry(&path) {
                vp.snapshot_data = Some(Payload::Binary(bytes.clone()));
                if topic_snapshot_path.is_none() {
                    topic_snapshot_path = Some(path);
                }
                if topic_snapshot_data.is_none() {
                    topic_snapshot_data = Some(bytes);
                }
            }
        }
    }

    if topic_snapshot_path.is_none() {
        if let Some(vp) = topic.viewpoints.iter().find(|vp| vp.snapshot.is_some()) {
            topic_snapshot_path = vp.snapshot.clone();
            topic_snapshot_data = match &vp.snapshot_data {
                Some(Payload::Binary(bytes)) => Some(bytes.clone()),
                _ => None,
            };
        }
    }

    if topic_snapshot_data.is_none() {
        if let Some(path) = &topic_snapshot_path {
            topic_snapshot_data = container.read_entry(path);
        }
    }

    topic.snapshot = topic_snapshot_path;
    topic.snapshot_data = topic_snapshot_data.map(Payload::Binary);
}

/// Resolve a reference from a topic markup document to a normalized,
/// forward-slash, archive-relative path. Leading path separators resolve
/// from the archive root instead of the topic directory.
fn resolve_reference(topic_dir: &str, reference: Option<&str>) -> Option<String> {
    let reference = reference?.trim();
    if reference.is_empty() {
        return None;
    }
    if reference.starts_with('/') || reference.starts_with('\\') {
        return Some(normalize_posix(
            reference.trim_start_matches(['/', '\\']),
        ));
    }
    if topic_dir.is_empty() {
        return Some(normalize_posix(reference));
    }
    Some(normalize_posix(&format!("{topic_dir}/{reference}")))
}

fn normalize_posix(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let normalized = path.replace('\\', "/");
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn posix_dirname(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    }
}

fn posix_basename(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, base)) => base,
        None => path,
    }
}
