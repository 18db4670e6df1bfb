//! Job domain types

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Unique key the engine assigns to a job
pub type JobKey = i64;

/// A single unit of work activated for this client
///
/// The engine leases the job to the activating worker until `deadline`.
/// Before that instant the handler must resolve it (complete, fail or throw
/// a business error), otherwise the job becomes available to other workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub key: JobKey,
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub process_instance_key: i64,
    #[serde(default)]
    pub bpmn_process_id: String,
    #[serde(default)]
    pub process_definition_version: i32,
    #[serde(default)]
    pub process_definition_key: i64,
    #[serde(default)]
    pub element_id: String,
    #[serde(default)]
    pub element_instance_key: i64,
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
    #[serde(default)]
    pub worker: String,
    #[serde(default)]
    pub retries: i32,
    /// Lease deadline in epoch milliseconds
    #[serde(default)]
    pub deadline: i64,
    #[serde(default = "empty_object")]
    pub variables: serde_json::Value,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl Job {
    /// Creates a job with the given key and type and empty metadata
    pub fn new(key: JobKey, job_type: impl Into<String>) -> Self {
        Self {
            key,
            job_type: job_type.into(),
            process_instance_key: 0,
            bpmn_process_id: String::new(),
            process_definition_version: 0,
            process_definition_key: 0,
            element_id: String::new(),
            element_instance_key: 0,
            custom_headers: HashMap::new(),
            worker: String::new(),
            retries: 0,
            deadline: 0,
            variables: empty_object(),
            tenant_id: None,
        }
    }

    /// Deserializes the job variables into `T`
    pub fn variables_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.variables)
    }

    /// Returns the job variables as a map of name to JSON value
    pub fn variables_as_map(&self) -> serde_json::Result<HashMap<String, serde_json::Value>> {
        self.variables_as()
    }

    /// Looks up a single custom header set on the task definition
    pub fn custom_header(&self, name: &str) -> Option<&str> {
        self.custom_headers.get(name).map(String::as_str)
    }

    /// Lease deadline as a timestamp
    ///
    /// Returns `None` if the engine sent a value outside the representable range.
    pub fn deadline_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.deadline).single()
    }

    /// Whether the lease has already run out at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() >= self.deadline
    }

    /// Time left on the lease at `now`, zero once expired
    pub fn time_left_at(&self, now: DateTime<Utc>) -> Duration {
        let millis = self.deadline.saturating_sub(now.timestamp_millis());
        Duration::from_millis(millis.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Job {
        serde_json::from_value(json!({
            "key": 123,
            "type": "foo",
            "retries": 3,
            "deadline": 123123,
            "worker": "default",
            "bpmnProcessId": "fooProcess",
            "processInstanceKey": 1233,
            "elementId": "foobar",
            "customHeaders": { "foo": "bar" },
            "variables": { "orderId": 7, "express": true }
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_camel_case() {
        let job = sample();
        assert_eq!(job.key, 123);
        assert_eq!(job.job_type, "foo");
        assert_eq!(job.retries, 3);
        assert_eq!(job.bpmn_process_id, "fooProcess");
        assert_eq!(job.process_instance_key, 1233);
        assert_eq!(job.tenant_id, None);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let job: Job = serde_json::from_value(json!({ "key": 1, "type": "bar" })).unwrap();
        assert_eq!(job, Job::new(1, "bar"));
        assert!(job.variables_as_map().unwrap().is_empty());
    }

    #[test]
    fn test_variables_as() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Order {
            order_id: u32,
            express: bool,
        }

        let order: Order = sample().variables_as().unwrap();
        assert_eq!(order.order_id, 7);
        assert!(order.express);
    }

    #[test]
    fn test_custom_header() {
        let job = sample();
        assert_eq!(job.custom_header("foo"), Some("bar"));
        assert_eq!(job.custom_header("missing"), None);
    }

    #[test]
    fn test_deadline_helpers() {
        let mut job = Job::new(1, "foo");
        job.deadline = 10_000;

        let before = Utc.timestamp_millis_opt(7_500).unwrap();
        let after = Utc.timestamp_millis_opt(12_000).unwrap();

        assert_eq!(job.deadline_at(), Utc.timestamp_millis_opt(10_000).single());
        assert!(!job.is_expired_at(before));
        assert!(job.is_expired_at(after));
        assert_eq!(job.time_left_at(before), Duration::from_millis(2_500));
        assert_eq!(job.time_left_at(after), Duration::ZERO);
    }
}
