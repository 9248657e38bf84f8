//! Write-then-read checks: an archive produced by the writer yields the
//! same canonical records when handed back to the reader.

use crate::model::{Comment, Payload, ProjectMeta, Topic, Viewpoint};
use crate::reader::read_bcf;
use crate::writer::write_bcf;
use tempfile::TempDir;

#[test]
fn test_topic_scalars_survive_roundtrip() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("round.bcfzip");
    let topic = Topic {
        guid: Some("T1".to_string()),
        title: Some("Clash at level 3".to_string()),
        status: Some("Open".to_string()),
        priority: Some("High".to_string()),
        author: Some("Alice".to_string()),
        created_at: Some("2024-01-01T10:00:00Z".to_string()),
        ..Topic::default()
    };
    write_bcf(&out, &ProjectMeta::default(), &[topic.clone()]).unwrap();

    let (_, topics) = read_bcf(&out);
    assert_eq!(topics.len(), 1);
    let back = &topics[0];
    assert_eq!(back.guid, topic.guid);
    assert_eq!(back.title, topic.title);
    assert_eq!(back.status, topic.status);
    assert_eq!(back.priority, topic.priority);
    assert_eq!(back.author, topic.author);
    assert_eq!(back.created_at, topic.created_at);
}

#[test]
fn test_comments_survive_roundtrip() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("round.bcfzip");
    let comments = vec![
        Comment {
            guid: Some("C1".to_string()),
            author: Some("Alice".to_string()),
            date: Some("2024-01-01".to_string()),
            text: Some("Check wall".to_string()),
            viewpoint_guid: None,
        },
        Comment {
            guid: Some("C2".to_string()),
            author: Some("Bob".to_string()),
            date: Some("2024-01-02".to_string()),
            text: Some("Resolved".to_string()),
            viewpoint_guid: None,
        },
    ];
    let topic = Topic {
        guid: Some("T1".to_string()),
        comments: comments.clone(),
        ..Topic::default()
    };
    write_bcf(&out, &ProjectMeta::default(), &[topic]).unwrap();

    let (_, topics) = read_bcf(&out);
    assert_eq!(topics[0].comments, comments);
}

#[test]
fn test_viewpoints_survive_roundtrip_with_payloads() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("round.bcfzip");
    let topic = Topic {
        guid: Some("T1".to_string()),
        viewpoints: vec![Viewpoint {
            guid: Some("V1".to_string()),
            viewpoint: Some("cam.bcfv".to_string()),
            snapshot: Some("snap.png".to_string()),
            index: Some("1".to_string()),
            viewpoint_data: Some(Payload::Binary(b"CAMERA".to_vec())),
            snapshot_data: Some(Payload::Binary(b"IMAGE".to_vec())),
        }],
        ..Topic::default()
    };
    write_bcf(&out, &ProjectMeta::default(), &[topic]).unwrap();

    let (_, topics) = read_bcf(&out);
    let back = &topics[0].viewpoints;
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].guid.as_deref(), Some("V1"));
    assert_eq!(back[0].index.as_deref(), Some("1"));
    // References come back archive-relative, under the topic folder.
    assert_eq!(back[0].viewpoint.as_deref(), Some("T1/cam.bcfv"));
    assert_eq!(back[0].snapshot.as_deref(), Some("T1/snap.png"));
    assert_eq!(
        back[0].viewpoint_data,
        Some(Payload::Binary(b"CAMERA".to_vec()))
    );
    assert_eq!(
        back[0].snapshot_data,
        Some(Payload::Binary(b"IMAGE".to_vec()))
    );
    // The topic-level snapshot follows the viewpoint's.
    assert_eq!(topics[0].snapshot.as_deref(), Some("T1/snap.png"));
    assert_eq!(
        topics[0].snapshot_data,
        Some(Payload::Binary(b"IMAGE".to_vec()))
    );
}

#[test]
fn test_project_meta_roundtrip() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("round.bcfzip");
    let meta = ProjectMeta {
        bcf_version: Some("3.0".to_string()),
        project_name: Some("Tower A".to_string()),
    };
    write_bcf(&out, &meta, &[]).unwrap();

    let (back, topics) = read_bcf(&out);
    assert_eq!(back, meta);
    assert!(topics.is_empty());
}

#[test]
fn test_default_version_reads_back() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("round.bcfzip");
    write_bcf(&out, &ProjectMeta::default(), &[]).unwrap();

    let (meta, _) = read_bcf(&out);
    assert_eq!(meta.bcf_version.as_deref(), Some("2.1"));
    assert_eq!(meta.project_name, None);
}

#[test]
fn test_empty_topic_roundtrips_as_complete_folder() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("round.bcfzip");
    write_bcf(&out, &ProjectMeta::default(), &[Topic::default()]).unwrap();

    let (_, topics) = read_bcf(&out);
    assert_eq!(topics.len(), 1);
    let back = &topics[0];
    // The synthesized folder name becomes the guid on the way back.
    assert_eq!(back.guid.as_deref(), Some("topic_0001"));
    assert_eq!(back.viewpoints.len(), 1);
    assert!(back.viewpoints[0].viewpoint_data.is_some());
    assert_eq!(
        back.viewpoints[0].snapshot.as_deref(),
        Some("topic_0001/snapshot_01.png")
    );
    match &back.snapshot_data {
        Some(Payload::Binary(bytes)) => assert!(bytes.starts_with(b"\x89PNG")),
        other => panic!("expected placeholder snapshot bytes, got {other:?}"),
    }
}

#[test]
fn test_payload_json_transport() {
    let binary: Payload = serde_json::from_str("[1, 2, 255]").unwrap();
    assert_eq!(binary, Payload::Binary(vec![1, 2, 255]));

    let text: Payload = serde_json::from_str(r#""aGVsbG8=""#).unwrap();
    assert_eq!(text, Payload::Text("aGVsbG8=".to_string()));

    let topic = Topic {
        guid: Some("T1".to_string()),
        created_at: Some("2024-01-01".to_string()),
        ..Topic::default()
    };
    let json = serde_json::to_string(&topic).unwrap();
    assert!(json.contains(r#""createdAt":"2024-01-01""#));
    let back: Topic = serde_json::from_str(&json).unwrap();
    assert_eq!(back, topic);
}
