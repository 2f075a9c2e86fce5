//! 🏗️ The Schema Provisioner: makes sure the event log has somewhere to live.
//!
//! 🎬 *[startup. the cluster may be empty. it may be half-built by a sibling
//! process that got there first. it may have leftovers from an older release.
//! the provisioner does not know which. the provisioner does not need to know.]*
//!
//! Every operation is a check-then-create that tolerates losing the race:
//! - template creation uses `create=true`; if it fails, we look again, and if the
//!   template is there now, somebody else won and that's fine.
//! - index creation swallows `resource_already_exists_exception`.
//!
//! Anything else that goes wrong becomes [`EventLogError::Provisioning`], naming
//! the artifact and the operation, and startup stops. No retries. 🦆

use anyhow::Result;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::backends::EventStore;
use crate::client::ClientHandle;
use crate::error::{BackendError, EventLogError};
use crate::schema::{self, EsNames, IlmConfig, SchemaConfig};

/// 🏷️ Alias options that survive being re-added as hidden.
const PRESERVED_ALIAS_OPTIONS: [&str; 5] = ["is_write_index", "filter", "index_routing", "routing", "search_routing"];

/// 🏗️ Idempotent creation of the policy, template, initial index and alias.
#[derive(Debug, Clone)]
pub struct SchemaProvisioner {
    client: ClientHandle,
    names: EsNames,
    ilm: IlmConfig,
}

impl SchemaProvisioner {
    pub fn new(client: ClientHandle, schema: &SchemaConfig) -> Self {
        Self {
            client,
            names: schema.names(),
            ilm: schema.ilm.clone(),
        }
    }

    pub fn names(&self) -> &EsNames {
        &self.names
    }

    /// 🚀 The whole startup sequence: hide leftovers, then policy, template, initial index.
    pub async fn initialize(&self) -> Result<()> {
        info!("🏗️ provisioning event log {}", self.names.alias);
        self.set_existing_assets_to_hidden().await?;
        self.create_ilm_policy_if_not_exists().await?;
        self.create_index_template_if_not_exists().await?;
        self.create_initial_index_if_not_exists().await?;
        info!("✅ event log {} is provisioned", self.names.alias);
        Ok(())
    }

    // ----- initialization steps -----

    /// 🙈 Older releases left visible templates, indices and aliases behind. Hide them.
    pub async fn set_existing_assets_to_hidden(&self) -> Result<()> {
        let pattern = &self.names.index_pattern;

        let templates = self.get_existing_legacy_index_templates(pattern).await?;
        for (name, template) in &templates {
            if template.pointer("/settings/index/hidden").and_then(Value::as_str) != Some("true") {
                self.set_legacy_index_template_to_hidden(name, template).await?;
            }
        }

        let indices = self.get_existing_indices(pattern).await?;
        for (index, settings) in &indices {
            if settings.pointer("/settings/index/hidden").and_then(Value::as_str) != Some("true") {
                self.set_index_to_hidden(index).await?;
            }
        }

        let aliases = self.get_existing_index_aliases(pattern).await?;
        for (index, entry) in &aliases {
            let Some(index_aliases) = entry.get("aliases").and_then(Value::as_object) else {
                continue;
            };
            let visible: Map<String, Value> = index_aliases
                .iter()
                .filter(|(_, options)| options.get("is_hidden").and_then(Value::as_bool) != Some(true))
                .map(|(alias, options)| (alias.clone(), options.clone()))
                .collect();
            if !visible.is_empty() {
                self.set_index_aliases_to_hidden(index, &visible).await?;
            }
        }
        Ok(())
    }

    pub async fn create_ilm_policy_if_not_exists(&self) -> Result<()> {
        let name = &self.names.ilm_policy;
        if !self.does_ilm_policy_exist(name).await? {
            self.create_ilm_policy(name, &schema::ilm_policy(&self.ilm)).await?;
        }
        Ok(())
    }

    pub async fn create_index_template_if_not_exists(&self) -> Result<()> {
        let name = &self.names.index_template;
        if !self.does_index_template_exist(name).await? {
            self.create_index_template(name, &schema::index_template(&self.names)).await?;
        }
        Ok(())
    }

    pub async fn create_initial_index_if_not_exists(&self) -> Result<()> {
        if !self.does_alias_exist(&self.names.alias).await? {
            self.create_index(&self.names.initial_index, &schema::initial_index_body(&self.names))
                .await?;
        }
        Ok(())
    }

    // ----- primitives -----

    pub async fn does_ilm_policy_exist(&self, name: &str) -> Result<bool> {
        let artifact = format!("ilm policy {name}");
        let store = self.client.get().await?;
        store
            .ilm_policy_exists(name)
            .await
            .map_err(|source| EventLogError::provisioning(artifact, "checking existence of", source).into())
    }

    pub async fn create_ilm_policy(&self, name: &str, policy: &Value) -> Result<()> {
        let store = self.client.get().await?;
        store
            .put_ilm_policy(name, policy)
            .await
            .map_err(|source| EventLogError::provisioning(format!("ilm policy {name}"), "creating", source))?;
        debug!("♻️ created ilm policy {name}");
        Ok(())
    }

    /// 🔍 Either flavour of template counts.
    pub async fn does_index_template_exist(&self, name: &str) -> Result<bool> {
        let store = self.client.get().await?;
        let checked = async {
            Ok::<_, anyhow::Error>(
                store.legacy_template_exists(name).await? || store.index_template_exists(name).await?,
            )
        }
        .await;
        checked.map_err(|source| {
            EventLogError::provisioning(format!("index template {name}"), "checking existence of", source).into()
        })
    }

    /// 🏁 Create-only PUT. Losing the race to another process is a success.
    pub async fn create_index_template(&self, name: &str, template: &Value) -> Result<()> {
        let store = self.client.get().await?;
        let Err(create_err) = store.put_index_template(name, template, true).await else {
            debug!("🏗️ created index template {name}");
            return Ok(());
        };
        // -- somebody may have beaten us to it; if the template is there now, we're done
        let exists = match self.does_index_template_exist(name).await {
            Ok(exists) => exists,
            Err(recheck_err) => {
                debug!("💀 creating index template {name} failed ({create_err:#}) and so did checking for it");
                return Err(recheck_err);
            }
        };
        if exists {
            debug!("🤝 index template {name} was created concurrently; carrying on");
            return Ok(());
        }
        Err(EventLogError::provisioning(format!("index template {name}"), "creating", create_err).into())
    }

    pub async fn get_existing_legacy_index_templates(&self, pattern: &str) -> Result<Map<String, Value>> {
        let store = self.client.get().await?;
        store.get_legacy_templates(pattern).await.map_err(|source| {
            EventLogError::provisioning(format!("index template {pattern}"), "getting existing", source).into()
        })
    }

    /// 🙈 Re-PUT a legacy template exactly as it was, plus `index.hidden: true`.
    pub async fn set_legacy_index_template_to_hidden(&self, name: &str, current: &Value) -> Result<()> {
        let mut template = current.clone();
        let Some(body) = template.as_object_mut() else {
            return Err(EventLogError::provisioning(
                format!("index template {name}"),
                "setting to hidden",
                anyhow::anyhow!("template body is not an object: {current}"),
            )
            .into());
        };
        let settings = body.entry("settings").or_insert_with(|| json!({}));
        if !settings.is_object() {
            *settings = json!({});
        }
        if let Some(settings) = settings.as_object_mut() {
            settings.insert("index.hidden".to_owned(), Value::Bool(true));
            // -- a nested `index.hidden` would shadow the dotted one
            if let Some(Value::Object(index)) = settings.get_mut("index") {
                index.remove("hidden");
            }
        }

        let store = self.client.get().await?;
        store.put_legacy_template(name, &template).await.map_err(|source| {
            EventLogError::provisioning(format!("index template {name}"), "setting to hidden", source)
        })?;
        debug!("🙈 legacy template {name} is now hidden");
        Ok(())
    }

    pub async fn get_existing_indices(&self, pattern: &str) -> Result<Map<String, Value>> {
        let store = self.client.get().await?;
        store.get_index_settings(pattern).await.map_err(|source| {
            EventLogError::provisioning(format!("index {pattern}"), "getting existing", source).into()
        })
    }

    pub async fn set_index_to_hidden(&self, index: &str) -> Result<()> {
        let store = self.client.get().await?;
        store
            .put_index_settings(index, &json!({ "index.hidden": true }))
            .await
            .map_err(|source| EventLogError::provisioning(format!("index {index}"), "setting to hidden", source))?;
        debug!("🙈 index {index} is now hidden");
        Ok(())
    }

    pub async fn get_existing_index_aliases(&self, pattern: &str) -> Result<Map<String, Value>> {
        let store = self.client.get().await?;
        store.get_aliases(pattern).await.map_err(|source| {
            EventLogError::provisioning(format!("index aliases for {pattern}"), "getting existing", source).into()
        })
    }

    /// 🙈 Re-add each alias with its routing, filter and write flag intact, now hidden.
    pub async fn set_index_aliases_to_hidden(&self, index: &str, aliases: &Map<String, Value>) -> Result<()> {
        let actions: Vec<Value> = aliases
            .iter()
            .map(|(alias, options)| {
                let mut add = Map::new();
                add.insert("index".to_owned(), json!(index));
                add.insert("alias".to_owned(), json!(alias));
                for key in PRESERVED_ALIAS_OPTIONS {
                    if let Some(value) = options.get(key) {
                        add.insert(key.to_owned(), value.clone());
                    }
                }
                add.insert("is_hidden".to_owned(), Value::Bool(true));
                json!({ "add": add })
            })
            .collect();

        let store = self.client.get().await?;
        store.update_aliases(&json!({ "actions": actions })).await.map_err(|source| {
            EventLogError::provisioning(format!("index aliases for {index}"), "setting to hidden", source)
        })?;
        debug!("🙈 {} aliases on {index} are now hidden", aliases.len());
        Ok(())
    }

    pub async fn does_alias_exist(&self, name: &str) -> Result<bool> {
        let store = self.client.get().await?;
        store.alias_exists(name).await.map_err(|source| {
            EventLogError::provisioning(format!("index alias {name}"), "checking existence of", source).into()
        })
    }

    /// 🚀 Create an index; an index that already exists is not a problem.
    pub async fn create_index(&self, name: &str, body: &Value) -> Result<()> {
        let store = self.client.get().await?;
        match store.create_index(name, body).await {
            Ok(()) => {
                debug!("🚀 created index {name}");
                Ok(())
            }
            Err(err)
                if BackendError::find_in(&err)
                    .is_some_and(|backend| backend.is_type("resource_already_exists_exception")) =>
            {
                debug!("🤝 index {name} already exists; carrying on");
                Ok(())
            }
            Err(source) => Err(EventLogError::provisioning(format!("index {name}"), "creating", source).into()),
        }
    }
}
