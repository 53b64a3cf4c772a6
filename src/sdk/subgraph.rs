//! DAO lookups against the OSx subgraph.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::dao::{DaoDescriptor, InstalledPlugin};
use crate::primitives::Address;
use crate::sdk::DaoDirectory;

const DAO_FIELDS: &str = "id subdomain plugins { appliedPreparation { pluginAddress } appliedPluginRepo { subdomain } }";
const DAO_ENS_SUFFIX: &str = ".dao.eth";

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubgraphDao {
    id: Address,
    #[serde(default)]
    subdomain: Option<String>,
    #[serde(default)]
    plugins: Vec<SubgraphPlugin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubgraphPlugin {
    #[serde(default)]
    applied_preparation: Option<AppliedPreparation>,
    #[serde(default)]
    applied_plugin_repo: Option<PluginRepo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppliedPreparation {
    plugin_address: Address,
}

#[derive(Debug, Deserialize)]
struct PluginRepo {
    subdomain: String,
}

impl From<SubgraphDao> for DaoDescriptor {
    fn from(dao: SubgraphDao) -> Self {
        // plugins that were prepared but never applied are not installed
        let plugins = dao
            .plugins
            .into_iter()
            .filter_map(|p| {
                Some(InstalledPlugin {
                    id: format!("{}.plugin.dao.eth", p.applied_plugin_repo?.subdomain),
                    instance_address: p.applied_preparation?.plugin_address,
                })
            })
            .collect();

        DaoDescriptor {
            address: dao.id,
            ens: dao
                .subdomain
                .filter(|s| !s.is_empty())
                .map(|s| format!("{}{}", s, DAO_ENS_SUFFIX)),
            plugins,
        }
    }
}

/// Query text and variables for a lookup key.
fn lookup_query(address_or_name: &str) -> (String, Value) {
    let key = address_or_name.trim();
    if Address::looks_like_address(key) {
        (
            format!("query Dao($address: ID!) {{ dao(id: $address) {{ {} }} }}", DAO_FIELDS),
            json!({ "address": key.to_lowercase() }),
        )
    } else {
        let subdomain = key.strip_suffix(DAO_ENS_SUFFIX).unwrap_or(key);
        (
            format!(
                "query DaoBySubdomain($subdomain: String!) {{ daos(where: {{ subdomain: $subdomain }}, first: 1) {{ {} }} }}",
                DAO_FIELDS
            ),
            json!({ "subdomain": subdomain }),
        )
    }
}

/// Pull the DAO out of either query shape; `None` when nothing matched.
fn extract_dao(data: Value) -> Result<Option<SubgraphDao>> {
    let node = match data {
        Value::Object(mut map) => match (map.remove("dao"), map.remove("daos")) {
            (Some(dao), _) => dao,
            (None, Some(Value::Array(mut daos))) if !daos.is_empty() => daos.swap_remove(0),
            _ => Value::Null,
        },
        _ => Value::Null,
    };
    if node.is_null() {
        return Ok(None);
    }
    serde_json::from_value(node)
        .map(Some)
        .context("Unexpected DAO shape in subgraph response")
}

pub struct SubgraphDirectory {
    http: reqwest::Client,
    url: String,
}

impl SubgraphDirectory {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl DaoDirectory for SubgraphDirectory {
    async fn get_dao(&self, address_or_name: &str) -> Result<Option<DaoDescriptor>> {
        let (query, variables) = lookup_query(address_or_name);
        let response: GraphQlResponse = self
            .http
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .context("Subgraph request failed")?
            .json()
            .await
            .context("Unexpected subgraph response")?;

        if let Some(first) = response.errors.first() {
            bail!("Subgraph query failed: {}", first.message);
        }
        let dao = match response.data {
            Some(data) => extract_dao(data)?,
            None => None,
        };
        Ok(dao.map(DaoDescriptor::from))
    }
}
