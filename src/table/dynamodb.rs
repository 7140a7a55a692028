use std::collections::HashMap;
use std::fmt::Debug;

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use log::warn;

use super::{RecordTable, STATUS_OK, VectorRecord};
use crate::error::{Error, Result};

pub const ATTR_IMAGE_ID: &str = "ImageId";
pub const ATTR_CREATED: &str = "Created";
pub const ATTR_VECTOR: &str = "Vector";
pub const ATTR_DIMENSION: &str = "Dimension";
pub const ATTR_DATA_TYPE: &str = "DataType";

/// DynamoDB table with `ImageId` as partition key
#[derive(Clone)]
pub struct DynamoTable {
    client: Client,
    table_name: String,
}

impl Debug for DynamoTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoTable").field("table_name", &self.table_name).finish()
    }
}

impl DynamoTable {
    /// `region` overrides the SDK region, the table may live elsewhere than the bucket
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        table_name: String,
        region: Option<String>,
        endpoint: Option<&str>,
    ) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);
        if let Some(region) = region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self { client: Client::from_conf(builder.build()), table_name }
    }

    pub fn from_client(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    fn itemize(record: &VectorRecord) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (ATTR_IMAGE_ID.to_string(), AttributeValue::S(record.image_id.clone())),
            (ATTR_CREATED.to_string(), AttributeValue::S(record.created.clone())),
            (ATTR_VECTOR.to_string(), AttributeValue::B(Blob::new(record.vector.clone()))),
            (ATTR_DIMENSION.to_string(), AttributeValue::N(record.dimension.to_string())),
            (ATTR_DATA_TYPE.to_string(), AttributeValue::S(record.data_type.clone())),
        ])
    }
}

impl RecordTable for DynamoTable {
    async fn put_item(&self, record: &VectorRecord) -> Result<u16> {
        let resp = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::itemize(record)))
            .send()
            .await;

        match resp {
            Ok(_) => Ok(STATUS_OK),
            // 服务端已响应，返回其状态码由调用方决定
            Err(SdkError::ServiceError(e)) => {
                let status = e.raw().status().as_u16();
                warn!("put_item {} returned {}: {}", record.image_id, status, e.err());
                Ok(status)
            }
            Err(e) => Err(Error::store_write(&record.image_id, DisplayErrorContext(&e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::operation::put_item::PutItemOutput;
    use aws_smithy_mocks::{mock, mock_client};
    use aws_smithy_runtime_api::http::{Response, StatusCode};
    use aws_smithy_types::body::SdkBody;

    use super::*;

    #[tokio::test]
    async fn accepted_write_is_ok() {
        let rule = mock!(Client::put_item)
            .match_requests(|req| {
                req.table_name() == Some("vectors")
                    && req.item().and_then(|item| item.get(ATTR_IMAGE_ID))
                        == Some(&AttributeValue::S("cat".to_string()))
            })
            .then_output(|| PutItemOutput::builder().build());
        let table = DynamoTable::from_client(mock_client!(aws_sdk_dynamodb, [&rule]), "vectors".into());

        let status = table.put_item(&VectorRecord::new("cat", &[1.0])).await.unwrap();
        assert_eq!(status, STATUS_OK);
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn rejected_write_reports_the_status() {
        let rule = mock!(Client::put_item).then_http_response(|| {
            Response::new(
                StatusCode::try_from(400).unwrap(),
                SdkBody::from(
                    r#"{"__type":"com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException","message":"no"}"#,
                ),
            )
        });
        let table = DynamoTable::from_client(mock_client!(aws_sdk_dynamodb, [&rule]), "vectors".into());

        let status = table.put_item(&VectorRecord::new("cat", &[1.0])).await.unwrap();
        assert_eq!(status, 400);
    }

    #[test]
    fn item_schema() {
        let record = VectorRecord::new("img-001", &[1.0, 2.0]);
        let item = DynamoTable::itemize(&record);

        assert_eq!(item.len(), 5);
        assert_eq!(item[ATTR_IMAGE_ID].as_s().unwrap(), "img-001");
        assert_eq!(item[ATTR_DIMENSION].as_n().unwrap(), "2");
        assert_eq!(item[ATTR_DATA_TYPE].as_s().unwrap(), "float32");
        assert_eq!(item[ATTR_VECTOR].as_b().unwrap().as_ref(), record.vector.as_slice());
        assert_eq!(item[ATTR_CREATED].as_s().unwrap(), &record.created);
    }
}
