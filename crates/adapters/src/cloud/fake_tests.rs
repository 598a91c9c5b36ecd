// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn request(name: &str) -> CreateServerRequest {
    CreateServerRequest {
        name: name.to_string(),
        server_type: "cx22".to_string(),
        location: None,
        image_id: 10,
        ssh_key_ids: vec![100],
        labels: HashMap::new(),
    }
}

#[tokio::test]
async fn create_then_list_round_trips() {
    let cloud = FakeCloud::new();
    cloud.set_epoch_ms(1_000_000_000);

    let server = cloud
        .create_server(request("github-hetzner-runner-1-2"))
        .await
        .unwrap();
    assert_eq!(server.status, ServerStatus::Running);
    assert!(server.public_ipv4.is_some());

    let listed = cloud.list_servers().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "github-hetzner-runner-1-2");
}

#[tokio::test]
async fn duplicate_name_is_name_taken() {
    let cloud = FakeCloud::new();
    cloud
        .create_server(request("github-hetzner-runner-1-2"))
        .await
        .unwrap();

    let err = cloud
        .create_server(request("github-hetzner-runner-1-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::NameTaken(_)));
}

#[tokio::test]
async fn rename_rejects_existing_target_name() {
    let cloud = FakeCloud::new();
    let id = cloud.add_server(
        "github-hetzner-runner-recycle-1",
        ServerStatus::Off,
        "cx22",
        "fsn1",
        0,
        HashMap::new(),
    );
    cloud.add_server(
        "github-hetzner-runner-5-6",
        ServerStatus::Running,
        "cx22",
        "fsn1",
        0,
        HashMap::new(),
    );

    let err = cloud
        .rename_server(id, "github-hetzner-runner-5-6", HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::NameTaken(_)));
}

#[tokio::test]
async fn rename_replaces_labels() {
    let cloud = FakeCloud::new();
    let mut labels = HashMap::new();
    labels.insert("role".to_string(), "active".to_string());
    let id = cloud.add_server(
        "github-hetzner-runner-1-2",
        ServerStatus::Off,
        "cx22",
        "fsn1",
        0,
        labels,
    );

    let mut new_labels = HashMap::new();
    new_labels.insert("role".to_string(), "recycle".to_string());
    let updated = cloud
        .rename_server(id, "github-hetzner-runner-recycle-9", new_labels)
        .await
        .unwrap();

    assert_eq!(updated.name, "github-hetzner-runner-recycle-9");
    assert_eq!(updated.labels.get("role").map(String::as_str), Some("recycle"));
    assert_eq!(
        cloud.calls().last(),
        Some(&CloudCall::Rename {
            id,
            from: "github-hetzner-runner-1-2".to_string(),
            to: "github-hetzner-runner-recycle-9".to_string(),
        })
    );
}

#[tokio::test]
async fn delete_removes_and_records() {
    let cloud = FakeCloud::new();
    let id = cloud.add_server(
        "github-hetzner-runner-1-2",
        ServerStatus::Off,
        "cx22",
        "fsn1",
        0,
        HashMap::new(),
    );

    cloud.delete_server(id).await.unwrap();
    assert!(cloud.list_servers().await.unwrap().is_empty());
    assert!(matches!(
        cloud.delete_server(id).await.unwrap_err(),
        CloudError::NotFound(_)
    ));
}

#[tokio::test]
async fn rebuild_marks_running_and_records_image() {
    let cloud = FakeCloud::new();
    let id = cloud.add_server(
        "github-hetzner-runner-1-2",
        ServerStatus::Off,
        "cx22",
        "fsn1",
        0,
        HashMap::new(),
    );

    cloud.rebuild_server(id, 77).await.unwrap();
    assert_eq!(
        cloud.server_by_name("github-hetzner-runner-1-2").unwrap().status,
        ServerStatus::Running
    );
    assert!(cloud
        .calls()
        .contains(&CloudCall::Rebuild { id, image_id: 77 }));
}

#[tokio::test]
async fn fail_creates_surfaces_api_error() {
    let cloud = FakeCloud::new();
    cloud.set_fail_creates(true);
    let err = cloud.create_server(request("x")).await.unwrap_err();
    assert!(matches!(err, CloudError::Api { .. }));
}
