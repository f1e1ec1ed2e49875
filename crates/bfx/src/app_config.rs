//! 🔧 App Configuration: the sacred env-and-TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Layers, last one wins:
//! 1. serde defaults
//! 2. the classic env names: `S3_BUCKET_NAME`, `S3_PREFIX`, `SQS_QUEUE_URL`
//! 3. `BFX_*` env vars (`__` splits nested keys: `BFX_RUNTIME__MAX_CONCURRENCY=50`)
//! 4. an optional TOML file

use anyhow::{Context, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🪣 the bucket whose objects need their long-lost PUT events
    pub bucket: String,
    /// 📂 only objects under this prefix get replayed
    pub prefix: String,
    /// 📬 where the forged events land
    pub queue_url: String,
    /// 🌎 region for the SDK clients *and* the `awsRegion` field in every record
    #[serde(default = "default_region")]
    pub region: String,
    /// 🧪 custom endpoint (LocalStack and friends). `None` means real AWS.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default, alias = "supervisor_config")]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub event: EventConfig,
}

/// 🎛️ The concurrency knobs. They live in their own apartment, away from the targets.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// 🚦 max batches being dispatched at once
    #[serde(default = "default_max_concurrency", alias = "concurrency")]
    pub max_concurrency: usize,
    /// 🧺 objects per worker batch
    #[serde(default = "default_batch_size", alias = "max_batch_size")]
    pub batch_size: usize,
    /// 📊 draw the progress bar or keep the terminal zen
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            batch_size: default_batch_size(),
            show_progress: default_show_progress(),
        }
    }
}

/// 📨 What the forged events claim about themselves.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EventConfig {
    #[serde(default = "default_event_name")]
    pub event_name: String,
    #[serde(default = "default_configuration_id")]
    pub configuration_id: String,
    #[serde(default = "default_source_ip")]
    pub source_ip: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            event_name: default_event_name(),
            configuration_id: default_configuration_id(),
            source_ip: default_source_ip(),
        }
    }
}

// 🌎 Tokyo. Someone had to pick a default and they picked ramen.
fn default_region() -> String {
    "ap-northeast-1".to_string()
}

// 🚦 100 concurrent batches. SQS has never met a number it couldn't throttle.
fn default_max_concurrency() -> usize {
    100
}

fn default_batch_size() -> usize {
    10
}

fn default_show_progress() -> bool {
    true
}

fn default_event_name() -> String {
    "ObjectCreated:Put".to_string()
}

fn default_configuration_id() -> String {
    "SimulatedEvent".to_string()
}

fn default_source_ip() -> String {
    "N/A".to_string()
}

impl AppConfig {
    /// ✅ The fatal-at-startup checks serde can't express: blank strings and zero knobs.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut the_missing = Vec::new();
        if self.bucket.trim().is_empty() {
            the_missing.push("bucket (S3_BUCKET_NAME / BFX_BUCKET)");
        }
        if self.prefix.trim().is_empty() {
            the_missing.push("prefix (S3_PREFIX / BFX_PREFIX)");
        }
        if self.queue_url.trim().is_empty() {
            the_missing.push("queue_url (SQS_QUEUE_URL / BFX_QUEUE_URL)");
        }
        if !the_missing.is_empty() {
            bail!(
                "💀 Required configuration is empty: {}. We need a bucket, a prefix and a queue. \
                 Three things. Not two. Not 'I'll set it later'.",
                the_missing.join(", ")
            );
        }
        if self.runtime.max_concurrency == 0 {
            bail!("💀 runtime.max_concurrency must be at least 1. Zero workers move zero events.");
        }
        if self.runtime.batch_size == 0 {
            bail!("💀 runtime.batch_size must be at least 1. An empty batch is just a mood.");
        }
        Ok(())
    }
}

/// 🗺️ The classic env names existing deploy scripts already export, mapped onto our keys.
fn classic_env() -> Env {
    Env::raw().filter_map(|key| match key.as_str().to_ascii_uppercase().as_str() {
        "S3_BUCKET_NAME" => Some("bucket".into()),
        "S3_PREFIX" => Some("prefix".into()),
        "SQS_QUEUE_URL" => Some("queue_url".into()),
        _ => None,
    })
}

/// 🏗️ All the layers, unextracted. Split out so tests can stack extra providers on top.
fn figment_for(config_file_name: Option<&Path>) -> Figment {
    let config = Figment::new()
        .merge(classic_env())
        .merge(Env::prefixed("BFX_").split("__"));

    match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    }
}

/// 🎛️ Command-line values that beat every config layer. `None` leaves the layer's value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub max_concurrency: Option<usize>,
    pub batch_size: Option<usize>,
}

impl ConfigOverrides {
    fn apply_to(&self, runtime: &mut RuntimeConfig) {
        if let Some(max_concurrency) = self.max_concurrency {
            runtime.max_concurrency = max_concurrency;
        }
        if let Some(batch_size) = self.batch_size {
            runtime.batch_size = batch_size;
        }
    }
}

/// 🚀 Load the config from env vars and (optionally) a TOML file, then validate it.
///
/// 💀 Returns an error if a required value is missing or empty. That is a
/// fatal startup condition: nothing gets listed, nothing gets sent.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    load_config_with(config_file_name, &ConfigOverrides::default())
}

/// 🚀 Same as [`load_config`], with command-line overrides applied before the
/// one and only validation. A file with `max_concurrency = 0` plus
/// `--concurrency 4` is a valid config.
pub fn load_config_with(
    config_file_name: Option<&Path>,
    overrides: &ConfigOverrides,
) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables \
             (S3_BUCKET_NAME, S3_PREFIX, SQS_QUEUE_URL, BFX_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables \
                 (S3_BUCKET_NAME, S3_PREFIX, SQS_QUEUE_URL, BFX_*). No file was provided, \
                 so this one's all on the environment. Classic."
            .to_string(),
    };

    let mut app_config: AppConfig =
        figment_for(config_file_name).extract().context(context_msg)?;
    overrides.apply_to(&mut app_config.runtime);
    app_config.validate()?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;

    fn write_test_config(contents: &str) -> tempfile::NamedTempFile {
        let mut the_file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("💀 Failed to create a temp config. The filesystem said 'new phone who dis'.");
        the_file
            .write_all(contents.as_bytes())
            .expect("💀 Failed to write test config.");
        the_file
    }

    #[test]
    fn the_one_where_a_toml_file_brings_everything() {
        let the_file = write_test_config(
            r#"
            bucket = "my-bucket"
            prefix = "data/2024/"
            queue_url = "https://sqs.ap-northeast-1.amazonaws.com/123/q"
            region = "us-west-2"

            [runtime]
            max_concurrency = 8
            batch_size = 3
            show_progress = false

            [event]
            configuration_id = "Backfill"
            "#,
        );

        let the_config: AppConfig = figment_for(Some(the_file.path()))
            .extract()
            .expect("💀 A complete TOML should parse.");

        assert_eq!(the_config.bucket, "my-bucket");
        assert_eq!(the_config.prefix, "data/2024/");
        assert_eq!(the_config.region, "us-west-2");
        assert_eq!(the_config.runtime.max_concurrency, 8);
        assert_eq!(the_config.runtime.batch_size, 3);
        assert!(!the_config.runtime.show_progress);
        assert_eq!(the_config.event.configuration_id, "Backfill");
        assert_eq!(the_config.event.event_name, "ObjectCreated:Put");
        assert!(the_config.validate().is_ok());
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        let the_file = write_test_config(
            r#"
            bucket = "b"
            prefix = "p/"
            queue_url = "q"
            "#,
        );

        let the_config: AppConfig = Figment::new()
            .merge(Toml::file(the_file.path()))
            .extract()
            .expect("💀 Defaults should fill the gaps.");

        assert_eq!(the_config.region, "ap-northeast-1");
        assert_eq!(the_config.runtime, RuntimeConfig::default());
        assert_eq!(the_config.runtime.max_concurrency, 100);
        assert_eq!(the_config.runtime.batch_size, 10);
        assert_eq!(the_config.event, EventConfig::default());
        assert!(the_config.endpoint_url.is_none());
    }

    #[test]
    fn the_one_where_the_classic_env_names_still_work() {
        Jail::expect_with(|jail| {
            jail.set_env("S3_BUCKET_NAME", "legacy-bucket");
            jail.set_env("S3_PREFIX", "legacy/");
            jail.set_env("SQS_QUEUE_URL", "https://sqs.example/legacy");
            jail.set_env("BFX_RUNTIME__MAX_CONCURRENCY", "7");

            let the_config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(the_config.bucket, "legacy-bucket");
            assert_eq!(the_config.prefix, "legacy/");
            assert_eq!(the_config.queue_url, "https://sqs.example/legacy");
            assert_eq!(the_config.runtime.max_concurrency, 7);
            Ok(())
        });
    }

    #[test]
    fn the_one_where_bfx_env_beats_the_classics() {
        Jail::expect_with(|jail| {
            jail.set_env("S3_BUCKET_NAME", "old");
            jail.set_env("BFX_BUCKET", "new");
            jail.set_env("BFX_PREFIX", "p/");
            jail.set_env("BFX_QUEUE_URL", "q");

            let the_config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(the_config.bucket, "new");
            Ok(())
        });
    }

    #[test]
    fn the_one_where_a_missing_queue_is_fatal() {
        Jail::expect_with(|jail| {
            jail.set_env("S3_BUCKET_NAME", "b");
            jail.set_env("S3_PREFIX", "p/");

            assert!(load_config(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn the_one_where_blank_strings_do_not_count_as_config() {
        Jail::expect_with(|jail| {
            jail.set_env("S3_BUCKET_NAME", "b");
            jail.set_env("S3_PREFIX", "   ");
            jail.set_env("SQS_QUEUE_URL", "q");

            let the_error = load_config(None).expect_err("💀 a blank prefix should be rejected");
            assert!(the_error.to_string().contains("prefix"));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_command_line_rescues_a_zero_in_the_file() {
        let the_file = write_test_config(
            r#"
            bucket = "b"
            prefix = "p/"
            queue_url = "q"
            [runtime]
            max_concurrency = 0
            batch_size = 0
            "#,
        );

        assert!(load_config(Some(the_file.path())).is_err());

        let the_overrides = ConfigOverrides {
            max_concurrency: Some(4),
            batch_size: Some(25),
        };
        let the_config = load_config_with(Some(the_file.path()), &the_overrides)
            .expect("💀 the overrides fix both zeros, validation should pass");
        assert_eq!(the_config.runtime.max_concurrency, 4);
        assert_eq!(the_config.runtime.batch_size, 25);
    }

    #[test]
    fn the_one_where_a_zero_on_the_command_line_is_still_rejected() {
        let the_file = write_test_config(
            r#"
            bucket = "b"
            prefix = "p/"
            queue_url = "q"
            "#,
        );
        let the_overrides = ConfigOverrides {
            max_concurrency: Some(0),
            batch_size: None,
        };

        let the_error = load_config_with(Some(the_file.path()), &the_overrides)
            .expect_err("💀 --concurrency 0 should not sneak past validation");
        assert!(the_error.to_string().contains("max_concurrency"));
    }

    #[test]
    fn the_one_where_zero_concurrency_is_rejected() {
        let the_file = write_test_config(
            r#"
            bucket = "b"
            prefix = "p/"
            queue_url = "q"
            [runtime]
            concurrency = 0
            "#,
        );

        let the_config: AppConfig = Figment::new()
            .merge(Toml::file(the_file.path()))
            .extract()
            .expect("💀 zero still parses; validation is where it dies");
        assert_eq!(the_config.runtime.max_concurrency, 0);
        assert!(the_config.validate().is_err());
    }
}
