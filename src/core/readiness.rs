//! Warm-up of every assigned model before the chat view opens.

use futures_util::future::join_all;
use reqwest::Client;
use tracing::{info, warn};

use crate::api::models::warm_model;
use crate::core::chat_stream::SessionIndex;

/// One (host, model) pair that must answer before chat starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessTarget {
    pub index: SessionIndex,
    pub host_name: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessResult {
    pub index: SessionIndex,
    pub host_name: String,
    pub outcome: Result<(), String>,
}

/// Warm all targets concurrently; results come back in target order.
pub async fn warm_sessions(client: &Client, targets: &[ReadinessTarget]) -> Vec<ReadinessResult> {
    let warmups = targets.iter().map(|target| async move {
        let outcome = warm_model(client, &target.base_url, &target.model)
            .await
            .map_err(|err| err.to_string());
        match &outcome {
            Ok(()) => info!(host = %target.host_name, model = %target.model, "model ready"),
            Err(err) => warn!(host = %target.host_name, model = %target.model, "warm-up failed: {err}"),
        }
        ReadinessResult {
            index: target.index,
            host_name: target.host_name.clone(),
            outcome,
        }
    });
    join_all(warmups).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{closed_port_url, spawn_fake_host, FakeResponse};

    fn target(index: usize, base_url: &str) -> ReadinessTarget {
        ReadinessTarget {
            index: SessionIndex(index),
            host_name: format!("H{index}"),
            base_url: base_url.to_string(),
            model: "m".into(),
        }
    }

    #[tokio::test]
    async fn results_follow_target_order_and_isolate_failures() {
        let ok = spawn_fake_host(vec![FakeResponse::json(200, r#"{"response":"."}"#)]).await;
        let missing =
            spawn_fake_host(vec![FakeResponse::json(404, r#"{"error":"model not found"}"#)]).await;
        let down = closed_port_url().await;

        let results = warm_sessions(
            &Client::new(),
            &[
                target(0, &ok.base_url),
                target(1, &missing.base_url),
                target(2, &down),
            ],
        )
        .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].outcome, Ok(()));
        let err = results[1].outcome.clone().expect_err("404");
        assert!(err.contains("404") && err.contains("model not found"), "{err}");
        assert!(results[2].outcome.is_err());
        assert_eq!(results[2].index, SessionIndex(2));

        let requests = ok.requests().await;
        assert_eq!(requests[0].request_line, "POST /api/generate HTTP/1.1");
    }
}
