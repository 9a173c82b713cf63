//! Job endpoints

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::client::{encode_path_segment, NomadClient};
use crate::error::Result;
use crate::subscription::Subscription;
use crate::types::{
    DispatchRequest, Job, JobDispatchResponse, JobListOptions, JobListStub, JobRegisterResponse,
    ScaleRequest,
};

/// Job operations, obtained through [`NomadClient::jobs`]
#[derive(Debug, Clone, Copy)]
pub struct Jobs<'a> {
    client: &'a NomadClient,
}

impl<'a> Jobs<'a> {
    pub(crate) fn new(client: &'a NomadClient) -> Self {
        Self { client }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// List jobs in the configured namespace
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<JobListStub>> {
        self.list_with(&JobListOptions::default()).await
    }

    /// List jobs, optionally by ID prefix
    #[instrument(skip(self))]
    pub async fn list_with(&self, options: &JobListOptions) -> Result<Vec<JobListStub>> {
        self.client.get_json("/v1/jobs", options.params()).await
    }

    /// Watch the job list
    ///
    /// Each "data" event carries the full list as JSON.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use nomad_client::{NomadClient, JobListStub};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = NomadClient::from_env()?;
    /// let subscription = client.jobs().list_blocking();
    /// subscription.on_data(|value| {
    ///     if let Ok(jobs) = serde_json::from_value::<Vec<JobListStub>>(value.clone()) {
    ///         println!("{} jobs", jobs.len());
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn list_blocking(&self) -> Subscription {
        self.list_blocking_with(&JobListOptions::default())
    }

    pub fn list_blocking_with(&self, options: &JobListOptions) -> Subscription {
        self.client.blocking_query("/v1/jobs", options.params())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, job_id: &str) -> Result<Job> {
        self.client
            .get_json(&job_path(job_id), Vec::new())
            .await
    }

    /// Watch a single job; "data" carries the job as JSON
    pub fn get_blocking(&self, job_id: &str) -> Subscription {
        self.client.blocking_query(job_path(job_id), Vec::new())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Dispatch an instance of a parameterized job
    #[instrument(skip(self, request), fields(payload_len = request.payload.len()))]
    pub async fn dispatch(
        &self,
        job_id: &str,
        request: &DispatchRequest,
    ) -> Result<JobDispatchResponse> {
        let path = format!("{}/dispatch", job_path(job_id));
        let response: JobDispatchResponse = self.client.post_json(&path, request.to_body()).await?;
        debug!("Dispatched {} as {}", job_id, response.dispatched_job_id);
        Ok(response)
    }

    /// Shorthand for [`Jobs::dispatch`] with a payload and metadata
    pub async fn dispatch_with(
        &self,
        job_id: &str,
        payload: impl Into<Vec<u8>>,
        meta: HashMap<String, String>,
    ) -> Result<JobDispatchResponse> {
        let request = DispatchRequest {
            payload: payload.into(),
            meta,
        };
        self.dispatch(job_id, &request).await
    }

    /// Change the count of one task group
    #[instrument(skip(self))]
    pub async fn scale(&self, job_id: &str, request: &ScaleRequest) -> Result<JobRegisterResponse> {
        let path = format!("{}/scale", job_path(job_id));
        let response: JobRegisterResponse = self.client.post_json(&path, request.to_body()).await?;
        debug!(
            "Scaled {}/{} to {:?} (eval {})",
            job_id, request.group, request.count, response.eval_id
        );
        Ok(response)
    }
}

fn job_path(job_id: &str) -> String {
    format!("/v1/job/{}", encode_path_segment(job_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::testing::MockTransport;
    use crate::transport::TransportResponse;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn client() -> (NomadClient, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new());
        (
            NomadClient::with_transport(ClientConfig::default(), mock.clone()),
            mock,
        )
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let (client, mock) = client();
        mock.push_response(TransportResponse::json_ok(&json!([
            {"ID": "web", "Name": "web", "Type": "service", "Status": "running"}
        ])));

        let jobs = client
            .jobs()
            .list_with(&JobListOptions {
                prefix: Some("we".into()),
            })
            .await
            .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, "running");
        let request = &mock.requests()[0];
        assert_eq!(request.path, "/v1/jobs");
        assert_eq!(request.query_value("prefix"), Some("we"));
    }

    #[tokio::test]
    async fn test_dispatch_posts_encoded_payload() {
        let (client, mock) = client();
        mock.push_response(TransportResponse::json_ok(&json!({
            "DispatchedJobID": "report/dispatch-1-abc",
            "EvalID": "e1",
            "EvalCreateIndex": 10,
            "JobCreateIndex": 9,
            "Index": 10
        })));

        let mut meta = HashMap::new();
        meta.insert("day".to_string(), "monday".to_string());
        let response = client
            .jobs()
            .dispatch_with("report", b"{}".to_vec(), meta)
            .await
            .unwrap();

        assert_eq!(response.dispatched_job_id, "report/dispatch-1-abc");
        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/v1/job/report/dispatch");
        let body = request.body.as_ref().unwrap();
        assert_eq!(body["Payload"], "e30=");
        assert_eq!(body["Meta"]["day"], "monday");
    }

    #[tokio::test]
    async fn test_scale_targets_group() {
        let (client, mock) = client();
        mock.push_response(TransportResponse::json_ok(&json!({
            "EvalID": "e2",
            "EvalCreateIndex": 20,
            "JobModifyIndex": 19,
            "Index": 20
        })));

        let response = client
            .jobs()
            .scale("web", &ScaleRequest::new("frontend", 3))
            .await
            .unwrap();

        assert_eq!(response.eval_id, "e2");
        let request = &mock.requests()[0];
        assert_eq!(request.path, "/v1/job/web/scale");
        assert_eq!(request.body.as_ref().unwrap()["Target"]["Group"], "frontend");
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_blocking_encodes_child_job_id() {
        let (client, mock) = client();
        let sub = client.jobs().get_blocking("batch/dispatch-1-ab");
        sub.on_data(|_| {});

        tokio::time::sleep(Duration::from_millis(10)).await;
        let request = &mock.requests()[0];
        assert_eq!(request.path, "/v1/job/batch%2Fdispatch-1-ab");
        assert_eq!(request.query_value("index"), Some("0"));
    }
}
