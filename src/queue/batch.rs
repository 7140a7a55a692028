use std::fmt::Debug;

use aws_sdk_batch::Client;
use aws_sdk_batch::error::DisplayErrorContext;
use aws_sdk_batch::types::{ContainerOverrides, KeyValuePair};
use log::debug;

use super::{JobQueue, JobSpec};
use crate::error::{Error, Result};

/// AWS Batch job queue bound to one queue and job definition
#[derive(Clone)]
pub struct BatchQueue {
    client: Client,
    job_queue: String,
    job_definition: String,
}

impl Debug for BatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchQueue")
            .field("job_queue", &self.job_queue)
            .field("job_definition", &self.job_definition)
            .finish()
    }
}

impl BatchQueue {
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        job_queue: String,
        job_definition: String,
        endpoint: Option<&str>,
    ) -> Self {
        let mut builder = aws_sdk_batch::config::Builder::from(sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self { client: Client::from_conf(builder.build()), job_queue, job_definition }
    }

    pub fn from_client(client: Client, job_queue: String, job_definition: String) -> Self {
        Self { client, job_queue, job_definition }
    }
}

impl JobQueue for BatchQueue {
    async fn submit_job(&self, spec: &JobSpec) -> Result<String> {
        let environment = spec
            .environment
            .iter()
            .map(|(name, value)| KeyValuePair::builder().name(name).value(value).build())
            .collect::<Vec<_>>();
        let overrides = ContainerOverrides::builder().set_environment(Some(environment)).build();

        let resp = self
            .client
            .submit_job()
            .job_name(&spec.name)
            .job_queue(&self.job_queue)
            .job_definition(&self.job_definition)
            .container_overrides(overrides)
            .send()
            .await
            .map_err(|e| Error::JobSubmission(format!("{}: {}", spec.name, DisplayErrorContext(&e))))?;

        debug!("{:?}", resp);
        Ok(resp.job_id().to_owned())
    }
}
