//! Healthz artifact downloads against a device streaming header, bytes and
//! trailer.

mod common;

use gnoic_api::{hash, HashMethod};
use gnoic_cli::invoke::healthz;
use gnoic_cli::CliError;
use gnoic_proto::healthz::{artifact_header::ArtifactType, ArtifactHeader, FileArtifactType};

use common::{session, ArtifactDevice};

fn file_header(name: &str, payload: &[u8], hashed: &[u8]) -> ArtifactHeader {
    ArtifactHeader {
        id: "core-1".into(),
        artifact_type: Some(ArtifactType::File(FileArtifactType {
            name: name.into(),
            size: payload.len() as i64,
            hash: Some(hash(HashMethod::Sha256, hashed).unwrap()),
            ..Default::default()
        })),
    }
}

#[tokio::test]
async fn file_artifact_is_written_after_trailer() {
    let payload: Vec<u8> = (0..10_000).map(|i| (i % 199) as u8).collect();
    let header = file_header("/var/core/bgpd.core", &payload, &payload);
    let device = ArtifactDevice::new(header, payload.clone(), 4096);
    let addr = device.serve().await;
    let session = session(addr).await;
    let dst = tempfile::tempdir().unwrap();

    let artifact = healthz::artifact(&session, "core-1", dst.path())
        .await
        .unwrap();

    assert_eq!(*device.requested.lock().unwrap(), vec!["core-1".to_string()]);
    assert_eq!(artifact.kind, "file");
    assert_eq!(artifact.size, payload.len() as u64);
    // three byte chunks and the trailer
    assert_eq!(artifact.messages, 4);
    let written = dst.path().join("bgpd.core");
    assert_eq!(artifact.file.as_deref(), Some(written.as_path()));
    assert_eq!(std::fs::read(&written).unwrap(), payload);
}

#[tokio::test]
async fn file_artifact_with_bad_hash_writes_nothing() {
    let payload = b"core dump contents".to_vec();
    let header = file_header("bgpd.core", &payload, b"something else");
    let device = ArtifactDevice::new(header, payload, 5);
    let addr = device.serve().await;
    let session = session(addr).await;
    let dst = tempfile::tempdir().unwrap();
    let out = dst.path().join("artifacts");

    let err = healthz::artifact(&session, "core-1", &out)
        .await
        .unwrap_err();

    assert!(matches!(err, CliError::Payload(_)), "got {err:?}");
    assert!(!out.exists());
    assert_eq!(std::fs::read_dir(dst.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn proto_artifact_is_drained_without_a_file() {
    let header = ArtifactHeader {
        id: "state-1".into(),
        artifact_type: Some(ArtifactType::Proto(Default::default())),
    };
    let device = ArtifactDevice::new(header, vec![0_u8; 8], 4);
    let addr = device.serve().await;
    let session = session(addr).await;
    let dst = tempfile::tempdir().unwrap();

    let artifact = healthz::artifact(&session, "state-1", dst.path())
        .await
        .unwrap();

    assert_eq!(artifact.kind, "proto");
    assert!(artifact.file.is_none());
    assert_eq!(artifact.messages, 3);
    assert_eq!(std::fs::read_dir(dst.path()).unwrap().count(), 0);
}
