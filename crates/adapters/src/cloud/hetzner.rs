// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hetzner Cloud REST client.

use super::{CloudAdapter, CloudError, CreateServerRequest};
use crate::http::{send_with_retry, USER_AGENT};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ghr_core::catalog::{Arch, ImageInfo, ImageKind, LocationInfo, PriceCatalog, ServerTypeInfo, SshKeyInfo};
use ghr_core::server::{Server, ServerStatus, LABEL_IMAGE, LABEL_PREFIX};
use ghr_core::SERVER_NAME_PREFIX;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;

const DEFAULT_BASE_URL: &str = "https://api.hetzner.cloud/v1";
const PER_PAGE: u32 = 50;

/// Typed client for the Hetzner Cloud API.
#[derive(Clone)]
pub struct HetznerCloud {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HetznerCloud {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, CloudError> {
        let mut builder = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = send_with_retry(builder).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }
        if status == StatusCode::NO_CONTENT {
            // DELETE returns no body; decode from an empty object.
            return serde_json::from_value(serde_json::json!({}))
                .map_err(|e| CloudError::Decode(e.to_string()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| CloudError::Decode(e.to_string()))
    }

    /// Fetch every page of a list endpoint, concatenating `extract`ed items.
    async fn paged<T: DeserializeOwned, I>(
        &self,
        path: &str,
        query: &str,
        extract: impl Fn(T) -> (Vec<I>, Option<u32>),
    ) -> Result<Vec<I>, CloudError> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let sep = if query.is_empty() { "" } else { "&" };
            let paged_path =
                format!("{path}?{query}{sep}page={page}&per_page={PER_PAGE}");
            let body: T = self.send(Method::GET, &paged_path, None).await?;
            let (mut page_items, next_page) = extract(body);
            items.append(&mut page_items);
            match next_page {
                Some(next) => page = next,
                None => return Ok(items),
            }
        }
    }
}

async fn error_from_response(status: StatusCode, response: reqwest::Response) -> CloudError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        code: String,
        message: String,
    }

    match response.json::<ErrorBody>().await {
        Ok(body) => match body.error.code.as_str() {
            "uniqueness_error" => CloudError::NameTaken(body.error.message),
            "not_found" => CloudError::NotFound(body.error.message),
            _ => CloudError::Api {
                code: body.error.code,
                message: body.error.message,
            },
        },
        Err(_) => CloudError::Api {
            code: status.as_str().to_string(),
            message: format!("HTTP {status}"),
        },
    }
}

// === Wire types ===

#[derive(Debug, Deserialize)]
struct Pagination {
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct ServerDto {
    id: u64,
    name: String,
    status: String,
    created: DateTime<Utc>,
    public_net: PublicNetDto,
    server_type: ServerTypeDto,
    datacenter: DatacenterDto,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PublicNetDto {
    ipv4: Option<Ipv4Dto>,
}

#[derive(Debug, Deserialize)]
struct Ipv4Dto {
    ip: String,
}

#[derive(Debug, Deserialize)]
struct ServerTypeDto {
    id: u64,
    name: String,
    architecture: String,
}

#[derive(Debug, Deserialize)]
struct DatacenterDto {
    location: LocationDto,
}

#[derive(Debug, Deserialize)]
struct LocationDto {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ImageDto {
    id: u64,
    #[serde(rename = "type")]
    kind: String,
    architecture: String,
    name: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct SshKeyDto {
    id: u64,
    name: String,
    fingerprint: String,
}

#[derive(Debug, Deserialize)]
struct ServersPage {
    servers: Vec<ServerDto>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: ServerDto,
}

#[derive(Debug, Deserialize)]
struct ServerTypesPage {
    server_types: Vec<ServerTypeDto>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct LocationsPage {
    locations: Vec<LocationDto>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct ImagesPage {
    images: Vec<ImageDto>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct SshKeysPage {
    ssh_keys: Vec<SshKeyDto>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct SshKeyEnvelope {
    ssh_key: SshKeyDto,
}

#[derive(Debug, Deserialize)]
struct PricingEnvelope {
    pricing: PricingDto,
}

#[derive(Debug, Deserialize)]
struct PricingDto {
    server_types: Vec<ServerTypePricingDto>,
}

#[derive(Debug, Deserialize)]
struct ServerTypePricingDto {
    name: String,
    prices: Vec<LocationPriceDto>,
}

#[derive(Debug, Deserialize)]
struct LocationPriceDto {
    location: String,
    price_hourly: PriceDto,
}

#[derive(Debug, Deserialize)]
struct PriceDto {
    net: String,
}

fn parse_status(status: &str) -> ServerStatus {
    match status {
        "off" => ServerStatus::Off,
        "running" => ServerStatus::Running,
        "stopping" | "deleting" => ServerStatus::Stopping,
        // initializing, starting, rebuilding, migrating, unknown
        _ => ServerStatus::Starting,
    }
}

fn parse_arch(arch: &str) -> Result<Arch, CloudError> {
    arch.parse::<Arch>().map_err(CloudError::Decode)
}

fn parse_image_kind(kind: &str) -> Result<ImageKind, CloudError> {
    kind.parse::<ImageKind>().map_err(CloudError::Decode)
}

fn to_server(dto: ServerDto) -> Server {
    let public_ipv4 = dto
        .public_net
        .ipv4
        .and_then(|v| v.ip.parse::<Ipv4Addr>().ok());
    let image = dto.labels.get(LABEL_IMAGE).cloned().unwrap_or_default();
    Server {
        cloud_id: dto.id,
        name: dto.name,
        status: parse_status(&dto.status),
        server_type: dto.server_type.name,
        location: dto.datacenter.location.name,
        image,
        public_ipv4,
        created_at: dto.created,
        labels: dto.labels,
    }
}

#[async_trait]
impl CloudAdapter for HetznerCloud {
    async fn list_servers(&self) -> Result<Vec<Server>, CloudError> {
        let selector = format!("label_selector={LABEL_PREFIX}%3D{SERVER_NAME_PREFIX}");
        let dtos = self
            .paged("/servers", &selector, |page: ServersPage| {
                (page.servers, page.meta.pagination.next_page)
            })
            .await?;
        Ok(dtos.into_iter().map(to_server).collect())
    }

    async fn get_server(&self, id: u64) -> Result<Option<Server>, CloudError> {
        match self
            .send::<ServerEnvelope>(Method::GET, &format!("/servers/{id}"), None)
            .await
        {
            Ok(envelope) => Ok(Some(to_server(envelope.server))),
            Err(CloudError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_server(&self, req: CreateServerRequest) -> Result<Server, CloudError> {
        let mut body = serde_json::json!({
            "name": req.name,
            "server_type": req.server_type,
            "image": req.image_id.to_string(),
            "ssh_keys": req.ssh_key_ids,
            "labels": req.labels,
            "start_after_create": true,
        });
        if let Some(location) = &req.location {
            body["location"] = serde_json::Value::String(location.clone());
        }
        let envelope: ServerEnvelope = self.send(Method::POST, "/servers", Some(body)).await?;
        Ok(to_server(envelope.server))
    }

    async fn delete_server(&self, id: u64) -> Result<(), CloudError> {
        self.send::<serde_json::Value>(Method::DELETE, &format!("/servers/{id}"), None)
            .await?;
        Ok(())
    }

    async fn rename_server(
        &self,
        id: u64,
        name: &str,
        labels: HashMap<String, String>,
    ) -> Result<Server, CloudError> {
        let body = serde_json::json!({ "name": name, "labels": labels });
        let envelope: ServerEnvelope = self
            .send(Method::PUT, &format!("/servers/{id}"), Some(body))
            .await?;
        Ok(to_server(envelope.server))
    }

    async fn rebuild_server(&self, id: u64, image_id: u64) -> Result<(), CloudError> {
        let body = serde_json::json!({ "image": image_id.to_string() });
        self.send::<serde_json::Value>(
            Method::POST,
            &format!("/servers/{id}/actions/rebuild"),
            Some(body),
        )
        .await?;
        Ok(())
    }

    async fn power_off(&self, id: u64) -> Result<(), CloudError> {
        self.send::<serde_json::Value>(
            Method::POST,
            &format!("/servers/{id}/actions/poweroff"),
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_server_types(&self) -> Result<Vec<ServerTypeInfo>, CloudError> {
        let dtos = self
            .paged("/server_types", "", |page: ServerTypesPage| {
                (page.server_types, page.meta.pagination.next_page)
            })
            .await?;
        dtos.into_iter()
            .map(|dto| {
                Ok(ServerTypeInfo {
                    id: dto.id,
                    name: dto.name,
                    architecture: parse_arch(&dto.architecture)?,
                })
            })
            .collect()
    }

    async fn list_locations(&self) -> Result<Vec<LocationInfo>, CloudError> {
        let dtos = self
            .paged("/locations", "", |page: LocationsPage| {
                (page.locations, page.meta.pagination.next_page)
            })
            .await?;
        Ok(dtos
            .into_iter()
            .map(|dto| LocationInfo {
                id: dto.id,
                name: dto.name,
            })
            .collect())
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>, CloudError> {
        let dtos = self
            .paged("/images", "status=available", |page: ImagesPage| {
                (page.images, page.meta.pagination.next_page)
            })
            .await?;
        dtos.into_iter()
            .map(|dto| {
                Ok(ImageInfo {
                    id: dto.id,
                    kind: parse_image_kind(&dto.kind)?,
                    architecture: parse_arch(&dto.architecture)?,
                    name: dto.name,
                    description: dto.description,
                })
            })
            .collect()
    }

    async fn list_ssh_keys(&self) -> Result<Vec<SshKeyInfo>, CloudError> {
        let dtos = self
            .paged("/ssh_keys", "", |page: SshKeysPage| {
                (page.ssh_keys, page.meta.pagination.next_page)
            })
            .await?;
        Ok(dtos
            .into_iter()
            .map(|dto| SshKeyInfo {
                id: dto.id,
                name: dto.name,
                fingerprint: dto.fingerprint,
            })
            .collect())
    }

    async fn create_ssh_key(
        &self,
        name: &str,
        public_key: &str,
    ) -> Result<SshKeyInfo, CloudError> {
        let body = serde_json::json!({ "name": name, "public_key": public_key });
        let envelope: SshKeyEnvelope = self.send(Method::POST, "/ssh_keys", Some(body)).await?;
        Ok(SshKeyInfo {
            id: envelope.ssh_key.id,
            name: envelope.ssh_key.name,
            fingerprint: envelope.ssh_key.fingerprint,
        })
    }

    async fn prices(&self) -> Result<PriceCatalog, CloudError> {
        let envelope: PricingEnvelope = self.send(Method::GET, "/pricing", None).await?;
        let mut catalog = PriceCatalog::new();
        for server_type in envelope.pricing.server_types {
            for price in server_type.prices {
                match price.price_hourly.net.parse::<f64>() {
                    Ok(hourly) => catalog.insert(&server_type.name, &price.location, hourly),
                    Err(_) => {
                        tracing::warn!(
                            server_type = %server_type.name,
                            location = %price.location,
                            net = %price.price_hourly.net,
                            "unparseable price, skipping"
                        );
                    }
                }
            }
        }
        Ok(catalog)
    }
}

#[cfg(test)]
#[path = "hetzner_tests.rs"]
mod tests;
