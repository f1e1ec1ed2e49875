// ai
//! ☁️ AWS plumbing: one shared SDK config, three clients, one identity check.
//!
//! Credentials come from the default provider chain (env vars → ~/.aws/config →
//! IAM role → hope). We don't resolve them ourselves and we don't want to.
//! An `endpoint_url` flips everything to a custom endpoint (LocalStack) and
//! turns on path-style S3 addressing, because LocalStack doesn't do DNS buckets.

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::info;

use crate::app_config::AppConfig;

/// 🔧 Build the SDK config everybody shares: region, optional endpoint, default creds.
pub async fn load_sdk_config(region: &str, endpoint_url: Option<&str>) -> SdkConfig {
    let mut the_loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

    if let Some(endpoint) = endpoint_url {
        the_loader = the_loader.endpoint_url(endpoint);
    }

    the_loader.load().await
}

/// 🪣 S3 client, path-style when someone pointed us at a custom endpoint.
pub fn s3_client(sdk_config: &SdkConfig, force_path_style: bool) -> aws_sdk_s3::Client {
    let the_s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
        .force_path_style(force_path_style)
        .build();
    aws_sdk_s3::Client::from_conf(the_s3_config)
}

pub fn sqs_client(sdk_config: &SdkConfig) -> aws_sdk_sqs::Client {
    aws_sdk_sqs::Client::new(sdk_config)
}

/// 🪪 Ask STS who we are. The account id becomes `principalId` in every record.
///
/// 💀 Failure here is fatal: no identity, no events. Usually means credentials
/// are missing or expired.
pub async fn resolve_account_id(sdk_config: &SdkConfig) -> Result<String> {
    let the_sts = aws_sdk_sts::Client::new(sdk_config);
    let the_identity = the_sts
        .get_caller_identity()
        .send()
        .await
        .context(
            "💀 GetCallerIdentity failed. STS doesn't know who we are, and honestly neither do we. \
             Check: credentials, AWS_PROFILE, session expiry.",
        )?;

    let the_account_id = the_identity
        .account()
        .context("💀 GetCallerIdentity answered without an account id. Identity crisis confirmed.")?
        .to_string();

    info!("🪪 AWS Account ID: {}", the_account_id);
    Ok(the_account_id)
}

/// 🏗️ The whole AWS kit for one run, built from the app config.
#[derive(Debug, Clone)]
pub struct AwsClients {
    pub sdk_config: SdkConfig,
    pub s3: aws_sdk_s3::Client,
    pub sqs: aws_sdk_sqs::Client,
}

impl AwsClients {
    pub async fn from_app_config(app_config: &AppConfig) -> Self {
        let the_endpoint = app_config.endpoint_url.as_deref();
        let sdk_config = load_sdk_config(&app_config.region, the_endpoint).await;
        let s3 = s3_client(&sdk_config, the_endpoint.is_some());
        let sqs = sqs_client(&sdk_config);
        Self {
            sdk_config,
            s3,
            sqs,
        }
    }
}
