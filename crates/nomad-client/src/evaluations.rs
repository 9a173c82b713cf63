//! Evaluation endpoints

use tracing::instrument;

use crate::client::{encode_path_segment, NomadClient};
use crate::error::Result;
use crate::subscription::Subscription;
use crate::types::AllocationListStub;

/// Evaluation operations, obtained through [`NomadClient::evaluations`]
#[derive(Debug, Clone, Copy)]
pub struct Evaluations<'a> {
    client: &'a NomadClient,
}

impl<'a> Evaluations<'a> {
    pub(crate) fn new(client: &'a NomadClient) -> Self {
        Self { client }
    }

    /// Allocations created by an evaluation
    #[instrument(skip(self))]
    pub async fn allocations(&self, eval_id: &str) -> Result<Vec<AllocationListStub>> {
        self.client
            .get_json(&allocations_path(eval_id), Vec::new())
            .await
    }

    pub fn allocations_blocking(&self, eval_id: &str) -> Subscription {
        self.client
            .blocking_query(allocations_path(eval_id), Vec::new())
    }
}

fn allocations_path(eval_id: &str) -> String {
    format!("/v1/evaluation/{}/allocations", encode_path_segment(eval_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::testing::MockTransport;
    use crate::transport::TransportResponse;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_allocations() {
        let mock = Arc::new(MockTransport::new());
        let client = NomadClient::with_transport(ClientConfig::default(), mock.clone());
        mock.push_response(TransportResponse::json_ok(&json!([{
            "ID": "a1",
            "EvalID": "e1",
            "JobID": "web",
            "TaskGroup": "frontend",
            "ClientStatus": "running"
        }])));

        let allocs = client.evaluations().allocations("e1").await.unwrap();

        assert_eq!(allocs.len(), 1);
        assert_eq!(allocs[0].job_id, "web");
        assert_eq!(allocs[0].client_status, "running");
        assert_eq!(mock.requests()[0].path, "/v1/evaluation/e1/allocations");
    }
}
