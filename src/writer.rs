//! Archive Writer: serializes a canonical record set into a structurally
//! valid `.bcfzip` archive.
//!
//! Every declared file reference always resolves to actual bytes — missing
//! payloads fall back to the topic snapshot, then to a built-in placeholder
//! image — so the produced archive stays fully openable downstream.

use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;

use crate::error::{BcfError, BcfResult};
use crate::model::{Comment, Payload, ProjectMeta, Topic, Viewpoint};

const DEFAULT_BCF_VERSION: &str = "2.1";

/// 1x1 transparent PNG used when a declared snapshot has no payload.
const BLANK_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d,
    0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
    0x08, 0x04, 0x00, 0x00, 0x00, 0xb5, 0x1c, 0x0c, 0x02, 0x00, 0x00, 0x00,
    0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0xfc, 0xff, 0x17, 0x00,
    0x03, 0x03, 0x01, 0xff, 0xa5, 0xe5, 0xdd, 0x5f, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Serialise BCF data into a `.bcfzip` archive at `out_path`.
///
/// Sparse records never error; only I/O and zip failures propagate.
pub fn write_bcf(out_path: &Path, project_meta: &ProjectMeta, topics: &[Topic]) -> BcfResult<()> {
    let version = clean(project_meta.bcf_version.as_deref()).unwrap_or(DEFAULT_BCF_VERSION);
    let project_name = clean(project_meta.project_name.as_deref());

    let file = fs::File::create(out_path)?;
    let mut archive = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    archive.start_file("bcf.version".to_string(), options)?;
    archive.write_all(&build_version_xml(version)?)?;

    if let Some(name) = project_name {
        archive.start_file("project.bcfp".to_string(), options)?;
        archive.write_all(&build_project_xml(name)?)?;
    }

    let mut used_topic_dirs: HashSet<String> = HashSet::new();

    for (index, topic) in topics.iter().enumerate() {
        let fallback = format!("topic_{:04}", index + 1);
        let topic_guid = clean(topic.guid.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| fallback.clone());

        let mut folder = sanitize_segment(&topic_guid, &fallback);
        if used_topic_dirs.contains(&folder) {
            let base = folder.clone();
            let mut counter = 1;
            while used_topic_dirs.contains(&format!("{base}_{counter}")) {
                counter += 1;
            }
            folder = format!("{base}_{counter}");
        }
        used_topic_dirs.insert(folder.clone());

        let (markup, attachments) = build_topic_entries(topic, &topic_guid)?;

        archive.start_file(format!("{folder}/markup.bcf"), options)?;
        archive.write_all(&markup)?;
        for (name, data) in attachments {
            archive.start_file(format!("{folder}/{name}"), options)?;
            archive.write_all(&data)?;
        }
    }

    archive.finish()?;
    Ok(())
}

/// Markup document plus the attachment entries (file name, bytes) for one
/// topic. Viewpoint/snapshot file names are allocated here so the markup
/// references exactly what gets written.
fn build_topic_entries(topic: &Topic, topic_guid: &str) -> BcfResult<(Vec<u8>, Vec<(String, Vec<u8>)>)> {
    let topic_snapshot_bytes = topic.snapshot_data.as_ref().map(coerce_payload);

    let placeholder;
    let viewpoints: &[Viewpoint] = if topic.viewpoints.is_empty() {
        // A topic folder must stay structurally complete: synthesize one
        // placeholder viewpoint/snapshot pair.
        placeholder = [Viewpoint::default()];
        &placeholder
    } else {
        &topic.viewpoints
    };

    let mut used_names: HashSet<String> = HashSet::new();
    let mut attachments: Vec<(String, Vec<u8>)> = Vec::new();
    let mut planned: Vec<PlannedViewpoint> = Vec::new();

    for (ordinal, vp) in viewpoints.iter().enumerate() {
        let number = ordinal + 1;

        let viewpoint_default = format!("viewpoint_{number:02}.bcfv");
        let viewpoint_name = unique_name(
            &sanitize_segment(
                posix_basename(clean(vp.viewpoint.as_deref()).unwrap_or("")),
                &viewpoint_default,
            ),
            &mut used_names,
        );

        let snapshot_default = format!("snapshot_{number:02}.png");
        let snapshot_name = match clean(vp.snapshot.as_deref()) {
            Some(reference) => unique_name(
                &sanitize_segment(posix_basename(reference), &snapshot_default),
                &mut used_names,
            ),
            None => unique_name(&snapshot_default, &mut used_names),
        };

        let viewpoint_bytes = match &vp.viewpoint_data {
            Some(payload) => coerce_payload(payload),
            None => build_visualization_xml(clean(vp.guid.as_deref()))?,
        };
        let snapshot_bytes = vp
            .snapshot_data
            .as_ref()
            .map(coerce_payload)
            .or_else(|| topic_snapshot_bytes.clone())
            .unwrap_or_else(|| BLANK_PNG.to_vec());

        attachments.push((viewpoint_name.clone(), viewpoint_bytes));
        attachments.push((snapshot_name.clone(), snapshot_bytes));
        planned.push(PlannedViewpoint {
            guid: clean(vp.guid.as_deref()).map(str::to_string),
            index: clean(vp.index.as_deref()).map(str::to_string),
            viewpoint_name,
            snapshot_name,
        });
    }

    let markup = build_markup_xml(topic, topic_guid, &planned)?;
    Ok((markup, attachments))
}

struct PlannedViewpoint {
    guid: Option<String>,
    index: Option<String>,
    viewpoint_name: String,
    snapshot_name: String,
}

fn build_markup_xml(
    topic: &Topic,
    topic_guid: &str,
    viewpoints: &[PlannedViewpoint],
) -> BcfResult<Vec<u8>> {
    let mut writer = xml_writer();
    start_document(&mut writer)?;
    writer
        .write_event(Event::Start(BytesStart::new("Markup")))
        .map_err(xml_err)?;

    let mut topic_elem = BytesStart::new("Topic");
    topic_elem.push_attribute(("Guid", topic_guid));
    if let Some(status) = clean(topic.status.as_deref()) {
        topic_elem.push_attribute(("TopicStatus", status));
    }
    writer
        .write_event(Event::Start(topic_elem))
        .map_err(xml_err)?;
    // Absent fields are omitted, not emitted empty.
    if let Some(title) = clean(topic.title.as_deref()) {
        write_text_element(&mut writer, "Title", title)?;
    }
    if let Some(priority) = clean(topic.priority.as_deref()) {
        write_text_element(&mut writer, "Priority", priority)?;
    }
    if let Some(created_at) = clean(topic.created_at.as_deref()) {
        write_text_element(&mut writer, "CreationDate", created_at)?;
    }
    if let Some(author) = clean(topic.author.as_deref()) {
        write_text_element(&mut writer, "CreationAuthor", author)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("Topic")))
        .map_err(xml_err)?;

    if !topic.comments.is_empty() {
        writer
            .write_event(Event::Start(BytesStart::new("Comments")))
            .map_err(xml_err)?;
        for comment in &topic.comments {
            write_comment(&mut writer, comment)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("Comments")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::Start(BytesStart::new("Viewpoints")))
        .map_err(xml_err)?;
    for vp in viewpoints {
        let mut vp_elem = BytesStart::new("Viewpoint");
        if let Some(guid) = &vp.guid {
            vp_elem.push_attribute(("Guid", guid.as_str()));
        }
        if let Some(index) = &vp.index {
            vp_elem.push_attribute(("Index", index.as_str()));
        }
        writer
            .write_event(Event::Start(vp_elem))
            .map_err(xml_err)?;
        write_text_element(&mut writer, "Viewpoint", &vp.viewpoint_name)?;
        write_text_element(&mut writer, "Snapshot", &vp.snapshot_name)?;
        writer
            .write_event(Event::End(BytesEnd::new("Viewpoint")))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("Viewpoints")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::End(BytesEnd::new("Markup")))
        .map_err(xml_err)?;
    Ok(finish_document(writer))
}

fn write_comment(writer: &mut Writer<Cursor<Vec<u8>>>, comment: &Comment) -> BcfResult<()> {
    let mut elem = BytesStart::new("Comment");
    if let Some(guid) = clean(comment.guid.as_deref()) {
        elem.push_attribute(("Guid", guid));
    }
    writer.write_event(Event::Start(elem)).map_err(xml_err)?;
    if let Some(date) = clean(comment.date.as_deref()) {
        write_text_element(writer, "Date", date)?;
    }
    if let Some(author) = clean(comment.author.as_deref()) {
        write_text_element(writer, "Author", author)?;
    }
    if let Some(text) = clean(comment.text.as_deref()) {
        write_text_element(writer, "Comment", text)?;
    }
    if let Some(viewpoint_guid) = clean(comment.viewpoint_guid.as_deref()) {
        let mut reference = BytesStart::new("Viewpoint");
        reference.push_attribute(("Guid", viewpoint_guid));
        writer
            .write_event(Event::Empty(reference))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("Comment")))
        .map_err(xml_err)?;
    Ok(())
}

fn build_version_xml(version: &str) -> BcfResult<Vec<u8>> {
    let mut writer = xml_writer();
    start_document(&mut writer)?;
    let mut root = BytesStart::new("Version");
    root.push_attribute(("VersionId", version));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;
    write_text_element(&mut writer, "DetailedVersion", version)?;
    writer
        .write_event(Event::End(BytesEnd::new("Version")))
        .map_err(xml_err)?;
    Ok(finish_document(writer))
}

fn build_project_xml(project_name: &str) -> BcfResult<Vec<u8>> {
    let mut writer = xml_writer();
    start_document(&mut writer)?;
    writer
        .write_event(Event::Start(BytesStart::new("ProjectExtension")))
        .map_err(xml_err)?;
    let mut project = BytesStart::new("Project");
    project.push_attribute(("Name", project_name));
    writer
        .write_event(Event::Empty(project))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("ProjectExtension")))
        .map_err(xml_err)?;
    Ok(finish_document(writer))
}

/// Minimal geometry document for a viewpoint that arrived without one.
fn build_visualization_xml(guid: Option<&str>) -> BcfResult<Vec<u8>> {
    let mut writer = xml_writer();
    start_document(&mut writer)?;
    let mut root = BytesStart::new("VisualizationInfo");
    if let Some(guid) = guid {
        root.push_attribute(("Guid", guid));
    }
    writer.write_event(Event::Empty(root)).map_err(xml_err)?;
    Ok(finish_document(writer))
}

fn xml_writer() -> Writer<Cursor<Vec<u8>>> {
    Writer::new(Cursor::new(Vec::new()))
}

fn start_document(writer: &mut Writer<Cursor<Vec<u8>>>) -> BcfResult<()> {
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)
}

fn finish_document(writer: Writer<Cursor<Vec<u8>>>) -> Vec<u8> {
    writer.into_inner().into_inner()
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> BcfResult<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn xml_err<E: Display>(error: E) -> BcfError {
    BcfError::Xml(error.to_string())
}

/// Trimmed non-empty view of an optional string.
fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Payload bytes regardless of the caller's transport choice: raw bytes
/// as-is; text decoded as strict base64 when valid, else literal UTF-8.
pub(crate) fn coerce_payload(payload: &Payload) -> Vec<u8> {
    match payload {
        Payload::Binary(bytes) => bytes.clone(),
        Payload::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            match STANDARD.decode(trimmed) {
                Ok(decoded) => decoded,
                Err(_) => trimmed.as_bytes().to_vec(),
            }
        }
    }
}

/// Filesystem-safe name segment: alphanumerics, dot, underscore and hyphen
/// survive, everything else becomes an underscore. Dot-only or empty
/// results fall back to the synthesized ordinal name.
pub(crate) fn sanitize_segment(value: &str, fallback: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let candidate = replaced.trim_matches(|c| c == '.' || c == '/');
    if candidate.is_empty() || candidate == "." || candidate == ".." {
        fallback.to_string()
    } else {
        candidate.to_string()
    }
}

/// Collision-free name within one topic folder; the numeric suffix goes
/// before the first dot so extensions stay intact.
fn unique_name(base_name: &str, existing: &mut HashSet<String>) -> String {
    if existing.insert(base_name.to_string()) {
        return base_name.to_string();
    }
    let (stem, suffix) = match base_name.split_once('.') {
        Some((stem, rest)) => (stem, Some(rest)),
        None => (base_name, None),
    };
    let mut counter = 1;
    loop {
        let candidate = match suffix {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        if existing.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

fn posix_basename(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, base)) => base,
        None => path,
    }
}
