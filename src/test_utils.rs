//! Shared fixtures for the archive tests: zip and directory archive
//! builders plus canned markup documents.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Helper: create a zip archive from (entry name, content) pairs.
pub fn create_test_zip(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let zip_path = dir.join(name);
    let file = fs::File::create(&zip_path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (entry_name, content) in files {
        writer.start_file(entry_name.to_string(), options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
    zip_path
}

/// Helper: materialize the same entries as an extracted-directory archive.
pub fn create_test_dir_archive(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let root = dir.join(name);
    fs::create_dir_all(&root).unwrap();
    for (entry_name, content) in files {
        let path = root.join(entry_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    root
}

/// Helper: read one entry out of a written archive.
pub fn read_zip_entry(zip_path: &Path, entry_name: &str) -> Option<Vec<u8>> {
    use std::io::Read;
    let file = fs::File::open(zip_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(entry_name).ok()?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    Some(bytes)
}

pub const VERSION_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<Version VersionId="2.1"><DetailedVersion>2.1</DetailedVersion></Version>"#;

pub const PROJECT_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<ProjectExtension><Project Name="Tower A"/></ProjectExtension>"#;

/// Full markup document for topic T1 with one comment and one viewpoint.
pub const MARKUP_T1: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<Markup>
  <Topic Guid="T1" TopicStatus="Open">
    <Title>Clash</Title>
    <Priority>High</Priority>
    <CreationDate>2024-01-01T10:00:00Z</CreationDate>
    <CreationAuthor>Alice</CreationAuthor>
  </Topic>
  <Comments>
    <Comment Guid="C1">
      <Date>2024-01-01</Date>
      <Author>Alice</Author>
      <Comment>Check wall</Comment>
    </Comment>
  </Comments>
  <Viewpoints>
    <Viewpoint Guid="V1" Index="1">
      <Viewpoint>viewpoint.bcfv</Viewpoint>
      <Snapshot>snapshot.png</Snapshot>
    </Viewpoint>
  </Viewpoints>
</Markup>"#;

/// Build a minimal markup document from the given pieces.
pub fn markup(guid: &str, status: &str, created_at: &str, comments: &str, viewpoints: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Markup>
  <Topic Guid="{guid}" TopicStatus="{status}">
    <CreationDate>{created_at}</CreationDate>
  </Topic>
  {comments}
  {viewpoints}
</Markup>"#
    )
    .into_bytes()
}

pub fn comment_block(author: &str, date: &str, text: &str) -> String {
    format!(
        "<Comments><Comment><Date>{date}</Date><Author>{author}</Author><Comment>{text}</Comment></Comment></Comments>"
    )
}

pub fn viewpoint_block(guid: &str, snapshot: &str) -> String {
    format!(
        "<Viewpoints><Viewpoint Guid=\"{guid}\"><Viewpoint>viewpoint.bcfv</Viewpoint><Snapshot>{snapshot}</Snapshot></Viewpoint></Viewpoints>"
    )
}
