mod batch;

use std::future::Future;

use serde::Serialize;

pub use self::batch::BatchQueue;
use crate::error::Result;

/// Everything the queue needs to start one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    /// Job name, unique within one dispatch
    pub name: String,
    /// Environment overrides applied to the job's container, in insertion order
    pub environment: Vec<(String, String)>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), environment: vec![] }
    }

    pub fn env(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.environment.push((name.into(), value.to_string()));
        self
    }

    /// Value of the environment override `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.environment.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// An external queue accepting asynchronous job submissions
pub trait JobQueue: Send + Sync {
    /// Submit one job, returning the identifier assigned by the queue
    fn submit_job(&self, spec: &JobSpec) -> impl Future<Output = Result<String>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keeps_order_and_lookup() {
        let spec = JobSpec::new("job").env("A", 1).env("B", "two");
        assert_eq!(spec.environment, vec![("A".into(), "1".into()), ("B".into(), "two".into())]);
        assert_eq!(spec.get("B"), Some("two"));
        assert_eq!(spec.get("C"), None);
    }
}
