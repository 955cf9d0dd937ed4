//! Bulk model management across every configured host.
//!
//! Each operation runs one future per host and collects a report per host and
//! model; a failing host never stops the others.

pub mod parameters;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use tracing::{info, warn};

use crate::api::models::{self, ApiError};
use crate::core::assignment::{list_selectable, SelectableModel};
use crate::core::config::Host;
use parameters::{extract_settings, SamplingSettings};

#[async_trait]
pub trait ModelHost: Send + Sync {
    fn name(&self) -> &str;

    /// Models the operator wants on this host.
    fn configured_models(&self) -> &[String];

    async fn list_models(&self) -> Result<Vec<String>, ApiError>;
    async fn loaded_models(&self) -> Result<Vec<String>, ApiError>;
    async fn pull_model(&self, model: &str) -> Result<(), ApiError>;
    async fn delete_model(&self, model: &str) -> Result<(), ApiError>;
    async fn unload_model(&self, model: &str) -> Result<(), ApiError>;
    /// Raw `parameters` text from the model's metadata.
    async fn model_parameters(&self, model: &str) -> Result<String, ApiError>;
}

pub struct OllamaHost {
    host: Host,
    client: Client,
}

impl OllamaHost {
    pub fn new(host: Host, client: Client) -> Self {
        Self { host, client }
    }

    pub fn from_hosts(hosts: &[Host], client: &Client) -> Vec<Self> {
        hosts
            .iter()
            .map(|h| Self::new(h.clone(), client.clone()))
            .collect()
    }
}

#[async_trait]
impl ModelHost for OllamaHost {
    fn name(&self) -> &str {
        &self.host.name
    }

    fn configured_models(&self) -> &[String] {
        &self.host.models
    }

    async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        models::fetch_catalogue(&self.client, &self.host.url).await
    }

    async fn loaded_models(&self) -> Result<Vec<String>, ApiError> {
        models::fetch_loaded_models(&self.client, &self.host.url).await
    }

    async fn pull_model(&self, model: &str) -> Result<(), ApiError> {
        models::pull_model(&self.client, &self.host.url, model).await
    }

    async fn delete_model(&self, model: &str) -> Result<(), ApiError> {
        models::delete_model(&self.client, &self.host.url, model).await
    }

    async fn unload_model(&self, model: &str) -> Result<(), ApiError> {
        models::unload_model(&self.client, &self.host.url, model).await
    }

    async fn model_parameters(&self, model: &str) -> Result<String, ApiError> {
        let details = models::fetch_model_details(&self.client, &self.host.url, model).await?;
        Ok(details.parameters)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Pull,
    Delete,
    Keep,
    Unload,
    List,
}

impl Operation {
    fn verb(self) -> &'static str {
        match self {
            Operation::Pull => "Pulling",
            Operation::Delete => "Deleting",
            Operation::Keep => "Keeping",
            Operation::Unload => "Unloading",
            Operation::List => "Listing",
        }
    }
}

/// Result of one action against one host.
///
/// `model` is `None` when the host itself could not be queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub host: String,
    pub model: Option<String>,
    pub operation: Operation,
    pub outcome: Result<(), String>,
}

impl OperationReport {
    pub fn describe(&self) -> String {
        let target = match &self.model {
            Some(model) => format!("{model} on {}", self.host),
            None => self.host.clone(),
        };
        match &self.outcome {
            Ok(()) => format!("{} model: {target}", self.operation.verb()),
            Err(err) => format!("Error {} {target}: {err}", self.operation.verb().to_lowercase()),
        }
    }
}

fn report(
    host: &dyn ModelHost,
    model: Option<&str>,
    operation: Operation,
    outcome: Result<(), ApiError>,
) -> OperationReport {
    let outcome = outcome.map_err(|err| err.to_string());
    match (&outcome, model) {
        (Ok(()), Some(model)) => info!(host = host.name(), model, ?operation, "done"),
        (Ok(()), None) => {}
        (Err(err), _) => warn!(host = host.name(), model, ?operation, "failed: {err}"),
    }
    OperationReport {
        host: host.name().to_string(),
        model: model.map(str::to_string),
        operation,
        outcome,
    }
}

async fn pull_on<H: ModelHost>(host: &H) -> Vec<OperationReport> {
    let mut reports = Vec::new();
    for model in host.configured_models() {
        let outcome = host.pull_model(model).await;
        reports.push(report(host, Some(model.as_str()), Operation::Pull, outcome));
    }
    reports
}

async fn delete_unlisted_on<H: ModelHost>(host: &H) -> Vec<OperationReport> {
    let installed = match host.list_models().await {
        Ok(installed) => installed,
        Err(err) => return vec![report(host, None, Operation::List, Err(err))],
    };
    let mut reports = Vec::new();
    for model in installed {
        if host.configured_models().contains(&model) {
            reports.push(report(host, Some(model.as_str()), Operation::Keep, Ok(())));
            continue;
        }
        let outcome = host.delete_model(&model).await;
        reports.push(report(host, Some(model.as_str()), Operation::Delete, outcome));
    }
    reports
}

async fn unload_on<H: ModelHost>(host: &H) -> Vec<OperationReport> {
    let loaded = match host.loaded_models().await {
        Ok(loaded) => loaded,
        Err(err) => return vec![report(host, None, Operation::List, Err(err))],
    };
    let mut reports = Vec::new();
    for model in loaded {
        let outcome = host.unload_model(&model).await;
        reports.push(report(host, Some(model.as_str()), Operation::Unload, outcome));
    }
    reports
}

/// Pull every configured model, hosts in parallel.
pub async fn pull_all<H: ModelHost>(hosts: &[H]) -> Vec<OperationReport> {
    join_all(hosts.iter().map(|host| pull_on(host))).await.concat()
}

/// Delete every installed model that is not in its host's configured list.
pub async fn delete_unlisted<H: ModelHost>(hosts: &[H]) -> Vec<OperationReport> {
    join_all(hosts.iter().map(|host| delete_unlisted_on(host)))
        .await
        .concat()
}

/// Make each host hold exactly its configured models.
pub async fn sync_all<H: ModelHost>(hosts: &[H]) -> Vec<OperationReport> {
    let mut reports = delete_unlisted(hosts).await;
    reports.extend(pull_all(hosts).await);
    reports
}

pub async fn unload_all<H: ModelHost>(hosts: &[H]) -> Vec<OperationReport> {
    join_all(hosts.iter().map(|host| unload_on(host))).await.concat()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostListing {
    pub host: String,
    pub models: Result<Vec<SelectableModel>, String>,
}

/// Installed models per host with their loaded state. Hosts sorted by name,
/// models in catalogue order.
pub async fn list_all<H: ModelHost>(hosts: &[H]) -> Vec<HostListing> {
    let mut listings = join_all(hosts.iter().map(|host| async move {
        let models = match (host.list_models().await, host.loaded_models().await) {
            (Ok(installed), Ok(loaded)) => Ok(installed
                .iter()
                .map(|name| SelectableModel {
                    name: name.clone(),
                    loaded: loaded.contains(name),
                })
                .collect()),
            (Err(err), _) | (_, Err(err)) => Err(err.to_string()),
        };
        HostListing {
            host: host.name().to_string(),
            models,
        }
    }))
    .await;
    listings.sort_by(|a, b| a.host.cmp(&b.host));
    listings
}

/// Candidate models for the picker: configured list, loaded ones first.
pub async fn selectable_for<H: ModelHost + ?Sized>(
    host: &H,
    candidates: &[String],
) -> Result<Vec<SelectableModel>, ApiError> {
    let loaded = host.loaded_models().await?;
    Ok(list_selectable(candidates, &loaded))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelParameters {
    pub model: String,
    pub settings: Result<SamplingSettings, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostParameters {
    pub host: String,
    pub models: Result<Vec<ModelParameters>, String>,
}

pub async fn parameters_all<H: ModelHost>(hosts: &[H]) -> Vec<HostParameters> {
    join_all(hosts.iter().map(|host| async move {
        let models = match host.list_models().await {
            Ok(installed) => {
                let mut models = Vec::with_capacity(installed.len());
                for model in installed {
                    let settings = host
                        .model_parameters(&model)
                        .await
                        .map(|text| extract_settings(&text))
                        .map_err(|err| err.to_string());
                    models.push(ModelParameters { model, settings });
                }
                Ok(models)
            }
            Err(err) => Err(err.to_string()),
        };
        HostParameters {
            host: host.name().to_string(),
            models,
        }
    }))
    .await
}
