//! Client (node agent) endpoints

use tracing::instrument;

use crate::client::{encode_path_segment, NomadClient};
use crate::error::Result;
use crate::subscription::Subscription;
use crate::types::LogOptions;

/// Client agent operations, obtained through [`NomadClient::clients`]
#[derive(Debug, Clone, Copy)]
pub struct Clients<'a> {
    client: &'a NomadClient,
}

impl<'a> Clients<'a> {
    pub(crate) fn new(client: &'a NomadClient) -> Self {
        Self { client }
    }

    /// Fetch a task's log of an allocation
    #[instrument(skip(self))]
    pub async fn logs(&self, alloc_id: &str, options: &LogOptions) -> Result<String> {
        self.client
            .get_text(&logs_path(alloc_id), options.params())
            .await
    }

    /// Watch a task's log with blocking queries
    ///
    /// The task name and log type ride along with every request. Logs are
    /// requested as JSON frames since "data" events carry JSON; `plain` is
    /// ignored. "data" fires only when the agent reports a newer index.
    pub fn logs_blocking(&self, alloc_id: &str, options: &LogOptions) -> Subscription {
        let framed = LogOptions {
            plain: false,
            ..options.clone()
        };
        self.client
            .blocking_query(logs_path(alloc_id), framed.params())
    }
}

fn logs_path(alloc_id: &str) -> String {
    format!("/v1/client/fs/logs/{}", encode_path_segment(alloc_id))
}
