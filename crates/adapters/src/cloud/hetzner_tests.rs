// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn server_json() -> serde_json::Value {
    serde_json::json!({
        "id": 42,
        "name": "github-hetzner-runner-100-7",
        "status": "running",
        "created": "2026-07-01T12:00:00+00:00",
        "public_net": { "ipv4": { "ip": "203.0.113.5" }, "ipv6": null },
        "server_type": { "id": 1, "name": "cx22", "architecture": "x86", "cores": 2 },
        "datacenter": { "id": 3, "name": "fsn1-dc14", "location": { "id": 1, "name": "fsn1", "city": "Falkenstein" } },
        "labels": { "role": "active", "image": "x86-system-ubuntu-22.04" }
    })
}

#[test]
fn server_dto_maps_to_core_server() {
    let dto: ServerDto = serde_json::from_value(server_json()).unwrap();
    let server = to_server(dto);

    assert_eq!(server.cloud_id, 42);
    assert_eq!(server.name, "github-hetzner-runner-100-7");
    assert_eq!(server.status, ServerStatus::Running);
    assert_eq!(server.server_type, "cx22");
    assert_eq!(server.location, "fsn1");
    assert_eq!(server.image, "x86-system-ubuntu-22.04");
    assert_eq!(server.public_ipv4, Some("203.0.113.5".parse().unwrap()));
    assert_eq!(server.labels.get("role").map(String::as_str), Some("active"));
}

#[test]
fn server_without_ipv4_maps_to_none() {
    let mut json = server_json();
    json["public_net"]["ipv4"] = serde_json::Value::Null;
    let dto: ServerDto = serde_json::from_value(json).unwrap();
    assert_eq!(to_server(dto).public_ipv4, None);
}

#[test]
fn status_mapping_covers_transitional_states() {
    assert_eq!(parse_status("off"), ServerStatus::Off);
    assert_eq!(parse_status("running"), ServerStatus::Running);
    assert_eq!(parse_status("stopping"), ServerStatus::Stopping);
    assert_eq!(parse_status("deleting"), ServerStatus::Stopping);
    assert_eq!(parse_status("initializing"), ServerStatus::Starting);
    assert_eq!(parse_status("starting"), ServerStatus::Starting);
    assert_eq!(parse_status("rebuilding"), ServerStatus::Starting);
}

#[test]
fn image_dto_decodes_type_field() {
    let json = serde_json::json!({
        "id": 10,
        "type": "snapshot",
        "architecture": "arm",
        "name": null,
        "description": "ci-base",
        "status": "available"
    });
    let dto: ImageDto = serde_json::from_value(json).unwrap();
    assert_eq!(dto.kind, "snapshot");
    assert_eq!(parse_image_kind(&dto.kind).unwrap(), ImageKind::Snapshot);
    assert_eq!(parse_arch(&dto.architecture).unwrap(), Arch::Arm);
    assert_eq!(dto.name, None);
    assert_eq!(dto.description, "ci-base");
}

#[test]
fn pricing_envelope_parses_net_decimal_strings() {
    let json = serde_json::json!({
        "pricing": {
            "currency": "EUR",
            "server_types": [
                {
                    "id": 1,
                    "name": "cpx21",
                    "prices": [
                        { "location": "fsn1", "price_hourly": { "net": "0.0120000000", "gross": "0.0143" } },
                        { "location": "ash", "price_hourly": { "net": "0.0130000000", "gross": "0.0155" } }
                    ]
                }
            ]
        }
    });
    let envelope: PricingEnvelope = serde_json::from_value(json).unwrap();
    assert_eq!(envelope.pricing.server_types.len(), 1);
    let prices = &envelope.pricing.server_types[0].prices;
    assert_eq!(prices[0].location, "fsn1");
    assert_eq!(prices[0].price_hourly.net, "0.0120000000");
}

#[test]
fn pagination_meta_decodes_next_page() {
    let json = serde_json::json!({
        "servers": [],
        "meta": { "pagination": { "page": 1, "per_page": 50, "next_page": 2, "total_entries": 70 } }
    });
    let page: ServersPage = serde_json::from_value(json).unwrap();
    assert_eq!(page.meta.pagination.next_page, Some(2));

    let json = serde_json::json!({
        "servers": [],
        "meta": { "pagination": { "page": 2, "per_page": 50, "next_page": null, "total_entries": 70 } }
    });
    let page: ServersPage = serde_json::from_value(json).unwrap();
    assert_eq!(page.meta.pagination.next_page, None);
}
