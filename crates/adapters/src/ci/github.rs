// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub REST client for workflow jobs and self-hosted runners.

use super::cache::{CachePolicy, HttpCache};
use super::{CiAdapter, CiError, RateLimit};
use crate::http::{send_with_retry, USER_AGENT};
use async_trait::async_trait;
use ghr_core::job::{Job, JobStatus};
use ghr_core::runner::{Runner, RunnerStatus};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const PER_PAGE: u32 = 100;

/// Typed client for the GitHub Actions API, with a conditional-GET cache
/// to stay within the API rate limit.
#[derive(Clone)]
pub struct GithubCi {
    http: reqwest::Client,
    base_url: String,
    token: String,
    repository: String,
    cache: HttpCache,
}

impl GithubCi {
    pub fn new(
        token: impl Into<String>,
        repository: impl Into<String>,
        cache_dir: impl AsRef<Path>,
    ) -> Self {
        Self::with_base_url(token, repository, cache_dir, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        token: impl Into<String>,
        repository: impl Into<String>,
        cache_dir: impl AsRef<Path>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            repository: repository.into(),
            cache: HttpCache::new(cache_dir.as_ref(), vec!["github.com".to_string()]),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}{}", self.base_url, self.repository, path)
    }

    fn builder(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    /// GET with conditional revalidation against the cache.
    async fn get_text(&self, url: &str) -> Result<String, CiError> {
        let policy = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| self.cache.policy(h)))
            .unwrap_or(CachePolicy::NoStore);
        let cached = match policy {
            CachePolicy::Revalidate => self.cache.get(url),
            CachePolicy::NoStore => None,
        };

        let mut builder = self.builder(Method::GET, url);
        if let Some(entry) = &cached {
            if let Some(etag) = &entry.etag {
                builder = builder.header("If-None-Match", etag);
            }
            if let Some(last_modified) = &entry.last_modified {
                builder = builder.header("If-Modified-Since", last_modified);
            }
        }

        let response = send_with_retry(builder).await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            if let Some(entry) = cached {
                return Ok(entry.body);
            }
            return Err(CiError::Decode(
                "304 Not Modified without a cached body".to_string(),
            ));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CiError::Api {
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        let etag = header_string(&response, "ETag");
        let last_modified = header_string(&response, "Last-Modified");
        let body = response.text().await.map_err(CiError::Http)?;

        if policy == CachePolicy::Revalidate {
            self.cache.put(url, etag, last_modified, &body);
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CiError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| CiError::Decode(e.to_string()))
    }

    /// Fetch pages until a short page signals the end.
    async fn paged<T: DeserializeOwned, I>(
        &self,
        url: &str,
        extract: impl Fn(T) -> Vec<I>,
    ) -> Result<Vec<I>, CiError> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let sep = if url.contains('?') { '&' } else { '?' };
            let paged_url = format!("{url}{sep}per_page={PER_PAGE}&page={page}");
            let body: T = self.get_json(&paged_url).await?;
            let page_items = extract(body);
            let len = page_items.len();
            items.extend(page_items);
            if len < PER_PAGE as usize {
                return Ok(items);
            }
            page += 1;
        }
    }
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

// === Wire types ===

#[derive(Debug, Deserialize)]
struct WorkflowRunsPage {
    workflow_runs: Vec<WorkflowRunDto>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunDto {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JobsPage {
    jobs: Vec<JobDto>,
}

#[derive(Debug, Deserialize)]
struct JobDto {
    id: u64,
    run_id: u64,
    status: String,
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RunnersPage {
    runners: Vec<RunnerDto>,
}

#[derive(Debug, Deserialize)]
struct RunnerDto {
    id: u64,
    name: String,
    status: String,
    busy: bool,
    #[serde(default)]
    labels: Vec<RunnerLabelDto>,
}

#[derive(Debug, Deserialize)]
struct RunnerLabelDto {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RegistrationTokenDto {
    token: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitEnvelope {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitDto,
}

#[derive(Debug, Deserialize)]
struct RateLimitDto {
    limit: u64,
    remaining: u64,
    reset: u64,
}

fn parse_job_status(status: &str) -> Option<JobStatus> {
    match status {
        "queued" => Some(JobStatus::Queued),
        "in_progress" => Some(JobStatus::InProgress),
        "completed" => Some(JobStatus::Completed),
        // waiting, pending, requested: not eligible for a runner yet
        _ => None,
    }
}

fn to_job(dto: JobDto) -> Option<Job> {
    let status = parse_job_status(&dto.status)?;
    let labels: BTreeSet<String> = dto.labels.iter().map(|l| l.to_lowercase()).collect();
    Some(Job::new(dto.run_id, dto.id, status, labels))
}

fn to_runner(dto: RunnerDto) -> Runner {
    let status = if dto.status == "online" {
        RunnerStatus::Online
    } else {
        RunnerStatus::Offline
    };
    Runner {
        id: dto.id,
        name: dto.name,
        status,
        busy: dto.busy,
        labels: dto.labels.iter().map(|l| l.name.to_lowercase()).collect(),
    }
}

#[async_trait]
impl CiAdapter for GithubCi {
    async fn list_jobs(&self, status: JobStatus) -> Result<Vec<Job>, CiError> {
        // Runs are returned newest first; job order follows run order.
        let runs_url = self.repo_url(&format!("/actions/runs?status={status}"));
        let runs = self
            .paged(&runs_url, |page: WorkflowRunsPage| page.workflow_runs)
            .await?;

        let mut jobs = Vec::new();
        for run in runs {
            let jobs_url = self.repo_url(&format!("/actions/runs/{}/jobs", run.id));
            let run_jobs = self.paged(&jobs_url, |page: JobsPage| page.jobs).await?;
            jobs.extend(
                run_jobs
                    .into_iter()
                    .filter_map(to_job)
                    .filter(|j| j.status == status),
            );
        }
        Ok(jobs)
    }

    async fn list_runners(&self) -> Result<Vec<Runner>, CiError> {
        let url = self.repo_url("/actions/runners");
        let dtos = self.paged(&url, |page: RunnersPage| page.runners).await?;
        Ok(dtos.into_iter().map(to_runner).collect())
    }

    async fn registration_token(&self) -> Result<String, CiError> {
        let url = self.repo_url("/actions/runners/registration-token");
        let response = send_with_retry(self.builder(Method::POST, &url)).await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CiError::Api {
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }
        let dto: RegistrationTokenDto = response
            .json()
            .await
            .map_err(|e| CiError::Decode(e.to_string()))?;
        Ok(dto.token)
    }

    async fn remove_runner(&self, id: u64) -> Result<(), CiError> {
        let url = self.repo_url(&format!("/actions/runners/{id}"));
        let response = send_with_retry(self.builder(Method::DELETE, &url)).await?;
        let status = response.status();
        // Removing an already-gone runner is not an error.
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let message = response.text().await.unwrap_or_default();
            return Err(CiError::Api {
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }
        Ok(())
    }

    async fn rate_limit(&self) -> Result<RateLimit, CiError> {
        let url = format!("{}/rate_limit", self.base_url);
        let envelope: RateLimitEnvelope = self.get_json(&url).await?;
        Ok(RateLimit {
            limit: envelope.resources.core.limit,
            remaining: envelope.resources.core.remaining,
            reset_epoch: envelope.resources.core.reset,
        })
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
