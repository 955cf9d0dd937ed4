//! One-shot requests against a host: model catalogue, loaded models, warm-up
//! and the model-management calls.

use std::error::Error as StdError;
use std::fmt;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    DeleteRequest, GenerateRequest, ModelListResponse, ModelShowResponse, PullRequest,
    ShowRequest, UnloadRequest,
};
use crate::utils::url::construct_api_url;

/// Errors returned by the one-shot host requests.
#[derive(Debug)]
pub enum ApiError {
    /// The request never produced a response (unreachable host, timeout).
    Transport(reqwest::Error),
    /// The host answered with a non-2xx status.
    Status { status: StatusCode, body: String },
    /// The response body was not the JSON we expected.
    Decode(reqwest::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(err) => write!(f, "request failed: {err}"),
            ApiError::Status { status, body } => {
                let body = body.trim();
                if body.is_empty() {
                    write!(f, "API returned non-200 status: {status}")
                } else {
                    write!(f, "API returned non-200 status: {status}. Body: {body}")
                }
            }
            ApiError::Decode(err) => write!(f, "could not decode response: {err}"),
        }
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ApiError::Transport(err) | ApiError::Decode(err) => Some(err),
            ApiError::Status { .. } => None,
        }
    }
}

/// Turn a non-2xx response into [`ApiError::Status`], folding the body text in.
pub async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(ApiError::Status { status, body })
}

async fn get_json<T: DeserializeOwned>(client: &Client, url: String) -> Result<T, ApiError> {
    let response = client.get(url).send().await.map_err(ApiError::Transport)?;
    let response = ensure_success(response).await?;
    response.json::<T>().await.map_err(ApiError::Decode)
}

/// Models currently resident in memory (`GET /api/ps`).
pub async fn fetch_loaded_models(client: &Client, base_url: &str) -> Result<Vec<String>, ApiError> {
    let url = construct_api_url(base_url, "api/ps");
    let response: ModelListResponse = get_json(client, url).await?;
    Ok(response.into_names())
}

/// Every model installed on the host (`GET /api/tags`).
pub async fn fetch_catalogue(client: &Client, base_url: &str) -> Result<Vec<String>, ApiError> {
    let url = construct_api_url(base_url, "api/tags");
    let response: ModelListResponse = get_json(client, url).await?;
    Ok(response.into_names())
}

/// Load `model` into memory with a throwaway generation so the first chat
/// round does not pay the load time. Any non-2xx answer is an error.
pub async fn warm_model(client: &Client, base_url: &str, model: &str) -> Result<(), ApiError> {
    let url = construct_api_url(base_url, "api/generate");
    debug!(%url, model, "warming model");
    let response = client
        .post(url)
        .json(&GenerateRequest {
            model,
            prompt: ".",
            stream: false,
        })
        .send()
        .await
        .map_err(ApiError::Transport)?;
    ensure_success(response).await?;
    Ok(())
}

pub async fn fetch_model_details(
    client: &Client,
    base_url: &str,
    model: &str,
) -> Result<ModelShowResponse, ApiError> {
    let url = construct_api_url(base_url, "api/show");
    let response = client
        .post(url)
        .json(&ShowRequest { name: model })
        .send()
        .await
        .map_err(ApiError::Transport)?;
    let response = ensure_success(response).await?;
    response
        .json::<ModelShowResponse>()
        .await
        .map_err(ApiError::Decode)
}

pub async fn pull_model(client: &Client, base_url: &str, model: &str) -> Result<(), ApiError> {
    let url = construct_api_url(base_url, "api/pull");
    let response = client
        .post(url)
        .json(&PullRequest {
            name: model,
            stream: false,
        })
        .send()
        .await
        .map_err(ApiError::Transport)?;
    ensure_success(response).await?;
    Ok(())
}

pub async fn delete_model(client: &Client, base_url: &str, model: &str) -> Result<(), ApiError> {
    let url = construct_api_url(base_url, "api/delete");
    let response = client
        .delete(url)
        .json(&DeleteRequest { model })
        .send()
        .await
        .map_err(ApiError::Transport)?;
    ensure_success(response).await?;
    Ok(())
}

pub async fn unload_model(client: &Client, base_url: &str, model: &str) -> Result<(), ApiError> {
    let url = construct_api_url(base_url, "api/chat");
    let response = client
        .post(url)
        .json(&UnloadRequest {
            model,
            keep_alive: 0,
        })
        .send()
        .await
        .map_err(ApiError::Transport)?;
    ensure_success(response).await?;
    Ok(())
}
