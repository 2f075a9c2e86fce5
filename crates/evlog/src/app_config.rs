//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing.": every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment: `EVLOG_*` environment variables first, then an optional
//! TOML file on top. Nested keys in env vars use a double underscore, so
//! `EVLOG_BUFFER__MAX_BATCH_LEN=500` lands in `buffer.max_batch_len`.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::StoreConfig;
use crate::buffer::BufferConfig;
use crate::schema::SchemaConfig;

/// 📦 Everything the service needs to know about itself.
///
/// Only `backend` is mandatory; the buffer and schema sections have defaults
/// that are fine for most deployments.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🗄️ Which store to talk to, and how.
    pub backend: StoreConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
}

/// 🚀 Load the config: from env vars, optionally topped with a TOML file.
///
/// 📐 `None` → env vars only. `Some(path)` → env vars + TOML, merged; TOML wins on conflicts.
///
/// 💀 Returns an error if the merged config doesn't fit [`AppConfig`], with a message
/// that says where it looked.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("EVLOG_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (EVLOG_*). \
             The file exists in our hearts, but apparently not in a shape we understand.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (EVLOG_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_test_config(contents: &str) -> NamedTempFile {
        // 🧪 Figment wants TOML from disk, like it's method acting.
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("💀 Failed to create a temp config. The filesystem said 'new phone who dis'.");
        file.write_all(contents.as_bytes())
            .expect("💀 Failed to write test config.");
        file
    }

    #[test]
    fn the_one_where_every_section_shows_up() {
        let file = write_test_config(
            r#"
            [backend.elasticsearch]
            url = "http://localhost:9200"
            api_key = "c2VjcmV0"

            [buffer]
            flush_interval_ms = 250
            max_batch_len = 500

            [schema]
            base_name = ".kibana"
            version = "8.9.0"

            [schema.ilm]
            delete_after = "7d"
            "#,
        );

        let app_config = load_config(Some(file.path()))
            .expect("💀 Full config should parse. The schema drift goblin does not get this win.");

        match &app_config.backend {
            StoreConfig::Elasticsearch(es) => {
                assert_eq!(es.url, "http://localhost:9200");
                assert_eq!(es.api_key.as_deref(), Some("c2VjcmV0"));
            }
            honestly_who_knows => panic!(
                "💀 Expected Elasticsearch backend config, but serde took us to {honestly_who_knows:?}. Plot twist energy."
            ),
        }
        assert_eq!(app_config.buffer.flush_interval_ms, 250);
        assert_eq!(app_config.buffer.max_batch_len, 500);
        assert_eq!(app_config.schema.names().alias, ".kibana-event-log-8.9.0");
        assert_eq!(app_config.schema.ilm.delete_after, "7d");
        assert_eq!(app_config.schema.ilm.rollover_max_age, "30d");
    }

    #[test]
    fn the_one_where_defaults_fill_the_silence() {
        let file = write_test_config(r#"backend = "in_memory""#);

        let app_config = load_config(Some(file.path())).expect("💀 Minimal config should parse.");

        assert!(matches!(app_config.backend, StoreConfig::InMemory));
        assert_eq!(app_config.buffer, BufferConfig::default());
        assert_eq!(app_config.schema.base_name, "evlog");
        assert_eq!(app_config.schema.version, "8.0.0");
    }

    #[test]
    fn the_one_where_a_missing_backend_is_called_out() {
        let file = write_test_config(
            r#"
            [buffer]
            max_batch_len = 5
            "#,
        );

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(
            err.to_string().contains(&file.path().display().to_string()),
            "error should name the file: {err:#}"
        );
    }
}
