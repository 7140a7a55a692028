use std::fmt::Debug;

use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use log::debug;

use super::{ObjectKey, ObjectStore};
use crate::error::{Error, Result};

/// Object store backed by one S3 bucket
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store").field("bucket", &self.bucket).finish()
    }
}

impl S3Store {
    /// Create a client for `bucket`, inheriting everything else from `sdk_config`
    ///
    /// `endpoint` overrides the service endpoint (LocalStack, MinIO) and switches
    /// to path-style addressing.
    pub fn new(sdk_config: &aws_config::SdkConfig, bucket: String, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self { client: Client::from_conf(builder.build()), bucket }
    }

    pub fn from_client(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectKey>> {
        let mut keys = vec![];
        let mut token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| Error::store_access(prefix, DisplayErrorContext(&e)))?;

            keys.extend(resp.contents().iter().filter_map(|obj| obj.key().map(str::to_owned)));
            debug!("s3://{}/{}: {} keys so far", self.bucket, prefix, keys.len());

            match resp.next_continuation_token() {
                Some(next) => token = Some(next.to_owned()),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::store_access(key, DisplayErrorContext(&e)))?;
        let data = resp.body.collect().await.map_err(|e| Error::store_access(key, e))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::store_write(key, DisplayErrorContext(&e)))?;
        Ok(())
    }
}
