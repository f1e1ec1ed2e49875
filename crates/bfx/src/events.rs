// ai
//! 📨 Events: forging S3 notifications for objects S3 never notified anyone about.
//!
//! 🎬 *[a Lambda sits by the queue, waiting for a PUT event that was never sent]*
//! *[the object has existed since 2019. the notification config since Tuesday.]*
//! *[enter: the EventTemplate. it knows the region, the bucket, the owner.]*
//! *[it asks only for an object and a clock reading.]*
//!
//! This module builds the exact JSON shape S3 writes into SQS for
//! `ObjectCreated:Put`: `{"Records":[{...}]}`. Consumers parse this shape
//! already, so the field names are not ours to choose.
//!
//! 🧠 Knowledge graph:
//! - `EventTemplate`: the static half (region, bucket ARN/name, owner, event knobs)
//! - `EventTemplate::build_record`: pure, `&self`, no I/O, call it from a thousand tasks
//! - `EventEnvelope`: the `Records` wrapper, always exactly one record here
//! - sequencer = wall-clock nanos as 16 uppercase hex digits. Two objects built in
//!   the same nanosecond (or on a clock that steps backwards) get equal or
//!   out-of-order sequencers. Downstream last-writer-wins tolerates that; we do
//!   not pretend otherwise.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::app_config::EventConfig;
use crate::common::ObjectDescriptor;

const EVENT_SOURCE: &str = "aws:s3";
const EVENT_VERSION: &str = "2.1";
const S3_SCHEMA_VERSION: &str = "1.0";

/// 📬 The outer wrapper SQS consumers expect. One record per envelope, every time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

/// 📨 One S3 event notification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub aws_region: String,
    pub event_name: String,
    pub event_source: String,
    pub event_time: String,
    pub event_version: String,
    pub request_parameters: BTreeMap<String, String>,
    pub response_elements: BTreeMap<String, String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    #[serde(rename = "configurationId")]
    pub configuration_id: String,
    pub object: S3Object,
    #[serde(rename = "s3SchemaVersion")]
    pub s3_schema_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Bucket {
    pub arn: String,
    pub name: String,
    #[serde(rename = "ownerIdentity")]
    pub owner_identity: OwnerIdentity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerIdentity {
    #[serde(rename = "principalId")]
    pub principal_id: String,
}

/// 🪣 The object half of the record. `eTag` is always present, even when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Object {
    #[serde(rename = "eTag")]
    pub e_tag: String,
    pub key: String,
    pub sequencer: String,
    pub size: u64,
}

/// 🧬 Everything that is the same for every object in a run.
///
/// Built once at startup, wrapped in an `Arc`, read by every worker. Nobody
/// mutates it after construction; each record is a fresh value.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTemplate {
    region: String,
    bucket_name: String,
    bucket_arn: String,
    principal_id: String,
    event_name: String,
    configuration_id: String,
    request_parameters: BTreeMap<String, String>,
    response_elements: BTreeMap<String, String>,
}

impl EventTemplate {
    /// 🏗️ Assemble the static half of every record.
    pub fn new(
        region: impl Into<String>,
        bucket_name: impl Into<String>,
        principal_id: impl Into<String>,
        event_config: &EventConfig,
    ) -> Self {
        let bucket_name = bucket_name.into();
        let request_parameters = BTreeMap::from([(
            "sourceIPAddress".to_string(),
            event_config.source_ip.clone(),
        )]);
        let response_elements = BTreeMap::from([
            ("x-amz-id-2".to_string(), "SIMULATED_ID_2".to_string()),
            (
                "x-amz-request-id".to_string(),
                "SIMULATED_REQUEST_ID".to_string(),
            ),
        ]);

        Self {
            region: region.into(),
            bucket_arn: format!("arn:aws:s3:::{bucket_name}"),
            bucket_name,
            principal_id: principal_id.into(),
            event_name: event_config.event_name.clone(),
            configuration_id: event_config.configuration_id.clone(),
            request_parameters,
            response_elements,
        }
    }

    /// 🔨 Forge one record for `object` as if S3 emitted it at `emitted_at`.
    ///
    /// Pure: same inputs, same record. Only `eventTime` and `sequencer`
    /// depend on the clock reading.
    pub fn build_record(&self, object: &ObjectDescriptor, emitted_at: DateTime<Utc>) -> EventRecord {
        EventRecord {
            aws_region: self.region.clone(),
            event_name: self.event_name.clone(),
            event_source: EVENT_SOURCE.to_string(),
            event_time: emitted_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            event_version: EVENT_VERSION.to_string(),
            request_parameters: self.request_parameters.clone(),
            response_elements: self.response_elements.clone(),
            s3: S3Entity {
                bucket: S3Bucket {
                    arn: self.bucket_arn.clone(),
                    name: self.bucket_name.clone(),
                    owner_identity: OwnerIdentity {
                        principal_id: self.principal_id.clone(),
                    },
                },
                configuration_id: self.configuration_id.clone(),
                object: S3Object {
                    e_tag: object.tag.clone(),
                    key: object.key.clone(),
                    sequencer: sequencer_for(emitted_at),
                    size: object.size,
                },
                s3_schema_version: S3_SCHEMA_VERSION.to_string(),
            },
        }
    }
}

/// ⏱️ Unix nanos as 16 uppercase hex digits. Pre-1970 clocks get zero and our sympathy.
fn sequencer_for(emitted_at: DateTime<Utc>) -> String {
    let the_nanos = emitted_at
        .timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or_default();
    format!("{the_nanos:016X}")
}

impl EventEnvelope {
    /// 📬 Wrap exactly one record, the way S3 does for a single PUT.
    pub fn single(record: EventRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    /// 🦆 Serialize into the string body that goes on the queue.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self).context("💀 Failed to serialize the event envelope to JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn the_template() -> EventTemplate {
        EventTemplate::new(
            "ap-northeast-1",
            "my-bucket",
            "123456789012",
            &EventConfig::default(),
        )
    }

    fn the_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45)
            .single()
            .expect("💀 a perfectly normal date refused to exist")
            + chrono::Duration::nanoseconds(123_456_789)
    }

    #[test]
    fn the_one_where_a_record_survives_the_round_trip() {
        let the_object = ObjectDescriptor::new("data/2024/file.parquet", "\"abc123\"", 4096);
        let the_record = the_template().build_record(&the_object, the_clock());
        let the_payload = EventEnvelope::single(the_record)
            .to_payload()
            .expect("💀 serialization should not fail on plain strings");

        let the_parsed: EventEnvelope =
            serde_json::from_str(&the_payload).expect("💀 our own JSON should parse back");
        assert_eq!(the_parsed.records.len(), 1);
        let the_object_back = &the_parsed.records[0].s3.object;
        assert_eq!(the_object_back.key, "data/2024/file.parquet");
        assert_eq!(the_object_back.size, 4096);
        assert_eq!(the_object_back.e_tag, "\"abc123\"");
    }

    #[test]
    fn the_one_where_an_empty_tag_and_zero_size_still_show_up() {
        let the_object = ObjectDescriptor::new("empty/.keep", "", 0);
        let the_record = the_template().build_record(&the_object, the_clock());
        let the_json: serde_json::Value =
            serde_json::to_value(EventEnvelope::single(the_record)).expect("💀 to_value failed");

        let the_object_json = &the_json["Records"][0]["s3"]["object"];
        assert_eq!(the_object_json["eTag"], serde_json::json!(""));
        assert_eq!(the_object_json["size"], serde_json::json!(0));
    }

    #[test]
    fn the_one_where_the_payload_has_the_shape_lambdas_expect() {
        let the_object = ObjectDescriptor::new("k", "\"t\"", 7);
        let the_record = the_template().build_record(&the_object, the_clock());
        let the_json: serde_json::Value =
            serde_json::to_value(EventEnvelope::single(the_record)).expect("💀 to_value failed");

        let the_record_json = &the_json["Records"][0];
        assert_eq!(the_record_json["awsRegion"], "ap-northeast-1");
        assert_eq!(the_record_json["eventName"], "ObjectCreated:Put");
        assert_eq!(the_record_json["eventSource"], "aws:s3");
        assert_eq!(the_record_json["eventVersion"], "2.1");
        assert_eq!(the_record_json["eventTime"], "2024-05-01T12:30:45.123456789Z");
        assert_eq!(the_record_json["requestParameters"]["sourceIPAddress"], "N/A");
        assert_eq!(the_record_json["responseElements"]["x-amz-request-id"], "SIMULATED_REQUEST_ID");
        assert_eq!(the_record_json["s3"]["bucket"]["arn"], "arn:aws:s3:::my-bucket");
        assert_eq!(the_record_json["s3"]["bucket"]["name"], "my-bucket");
        assert_eq!(the_record_json["s3"]["bucket"]["ownerIdentity"]["principalId"], "123456789012");
        assert_eq!(the_record_json["s3"]["configurationId"], "SimulatedEvent");
        assert_eq!(the_record_json["s3"]["s3SchemaVersion"], "1.0");
    }

    #[test]
    fn the_one_where_the_sequencer_is_sixteen_shouty_hex_digits() {
        let the_record = the_template().build_record(&ObjectDescriptor::new("k", "", 1), the_clock());
        let the_sequencer = &the_record.s3.object.sequencer;

        assert_eq!(the_sequencer.len(), 16);
        assert!(the_sequencer.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        let the_expected = the_clock().timestamp_nanos_opt().expect("💀 2024 fits in i64 nanos");
        assert_eq!(u64::from_str_radix(the_sequencer, 16).ok(), u64::try_from(the_expected).ok());
    }

    #[test]
    fn the_one_where_later_clocks_get_bigger_sequencers() {
        let the_template = the_template();
        let the_object = ObjectDescriptor::new("same-key", "", 1);
        let the_early = the_template.build_record(&the_object, the_clock());
        let the_late =
            the_template.build_record(&the_object, the_clock() + chrono::Duration::seconds(1));

        // -- 🔢 fixed width hex, so string order == numeric order
        assert!(the_late.s3.object.sequencer > the_early.s3.object.sequencer);
    }

    #[test]
    fn the_one_where_building_twice_only_changes_the_clock_fields() {
        let the_template = the_template();
        let the_object = ObjectDescriptor::new("idempotent/key", "\"e\"", 99);
        let the_first = the_template.build_record(&the_object, the_clock());
        let mut the_second =
            the_template.build_record(&the_object, the_clock() + chrono::Duration::milliseconds(5));

        assert_ne!(the_first.event_time, the_second.event_time);
        assert_ne!(the_first.s3.object.sequencer, the_second.s3.object.sequencer);

        the_second.event_time = the_first.event_time.clone();
        the_second.s3.object.sequencer = the_first.s3.object.sequencer.clone();
        assert_eq!(the_first, the_second);
    }

    #[test]
    fn the_one_where_event_knobs_flow_into_the_record() {
        let the_knobs = EventConfig {
            event_name: "ObjectCreated:Copy".to_string(),
            configuration_id: "Backfill2024".to_string(),
            source_ip: "10.0.0.1".to_string(),
        };
        let the_record = EventTemplate::new("us-east-1", "b", "p", &the_knobs)
            .build_record(&ObjectDescriptor::new("k", "", 1), the_clock());

        assert_eq!(the_record.event_name, "ObjectCreated:Copy");
        assert_eq!(the_record.s3.configuration_id, "Backfill2024");
        assert_eq!(the_record.request_parameters["sourceIPAddress"], "10.0.0.1");
    }
}
