// dbclonetool/src/platform/rest.rs
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use super::{AsyncJobHandle, BackupPlatform, DatabaseMetadata, JobState, ResolvedTarget};
use crate::config::{PlatformAuth, PlatformConnection};
use crate::errors::{CloneError, Result};

#[derive(Debug, Clone, Deserialize)]
struct ClusterInfo {
    id: String,
    version: String,
    timezone: ClusterTimezone,
}

#[derive(Debug, Clone, Deserialize)]
struct ClusterTimezone {
    timezone: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseSummary {
    id: String,
    #[serde(default)]
    standalone_host_name: Option<String>,
    #[serde(default)]
    rac_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedObject {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RacCluster {
    id: String,
    #[serde(default)]
    nodes: Vec<RacNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RacNode {
    node_name: String,
}

/// Compares host names on their short form, ignoring case.
fn same_host(candidate: &str, hostname: &str) -> bool {
    let short = |name: &str| name.split('.').next().unwrap_or(name).to_ascii_lowercase();
    short(candidate) == short(hostname)
}

/// REST client for the backup platform's management API.
pub struct RestPlatform {
    client: Client,
    base_url: Url,
    auth: PlatformAuth,
    cluster: OnceCell<ClusterInfo>,
}

impl RestPlatform {
    pub fn connect(connection: &PlatformConnection) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!connection.verify_tls)
            .build()?;
        let base_url = Url::parse(&format!("https://{}/", connection.node))?;
        Ok(Self {
            client,
            base_url,
            auth: connection.auth.clone(),
            cluster: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(path)?;
        debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        Ok(match &self.auth {
            PlatformAuth::Token(token) => builder.bearer_auth(token),
            PlatformAuth::Basic { username, password } => builder.basic_auth(username, Some(password)),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .request(Method::GET, path)?
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn cluster(&self) -> Result<&ClusterInfo> {
        self.cluster
            .get_or_try_init(|| async { self.get::<ClusterInfo>("api/v1/cluster/me", &[]).await })
            .await
    }
}

#[async_trait]
impl BackupPlatform for RestPlatform {
    async fn cluster_version(&self) -> Result<String> {
        Ok(self.cluster().await?.version.clone())
    }

    async fn cluster_timezone(&self) -> Result<String> {
        Ok(self.cluster().await?.timezone.timezone.clone())
    }

    async fn database_metadata(&self, host: &str, db_name: &str) -> Result<DatabaseMetadata> {
        let page: Page<DatabaseSummary> = self
            .get("api/internal/oracle/db", &[("name", db_name), ("is_relic", "false")])
            .await?;
        let summary = page
            .data
            .into_iter()
            .find(|db| {
                db.standalone_host_name.as_deref().is_some_and(|h| same_host(h, host))
                    || db.rac_name.as_deref().is_some_and(|r| same_host(r, host))
            })
            .ok_or_else(|| {
                CloneError::Resolution(format!(
                    "The database {} on {} was not found on the backup platform",
                    db_name, host
                ))
            })?;
        self.get(&format!("api/internal/oracle/db/{}", summary.id), &[]).await
    }

    async fn resolve_target(&self, hostname: &str) -> Result<ResolvedTarget> {
        let cluster_id = self.cluster().await?.id.clone();
        let page: Page<NamedObject> = self
            .get(
                "api/internal/oracle/hierarchy/root/children",
                &[("name", hostname), ("primary_cluster_id", cluster_id.as_str())],
            )
            .await?;
        page.data
            .into_iter()
            .find(|object| same_host(&object.name, hostname))
            .map(|object| ResolvedTarget(object.id))
            .ok_or_else(|| CloneError::Resolution(format!("No mount target found for host {}", hostname)))
    }

    async fn resolve_host_target(&self, hostname: &str) -> Result<ResolvedTarget> {
        let cluster_id = self.cluster().await?.id.clone();
        let page: Page<NamedObject> = self
            .get(
                "api/internal/oracle/host",
                &[("name", hostname), ("primary_cluster_id", cluster_id.as_str())],
            )
            .await?;
        page.data
            .into_iter()
            .find(|host| same_host(&host.name, hostname))
            .map(|host| ResolvedTarget(host.id))
            .ok_or_else(|| CloneError::Resolution(format!("No Oracle host found with name {}", hostname)))
    }

    async fn resolve_rac_target(&self, hostname: &str) -> Result<ResolvedTarget> {
        let cluster_id = self.cluster().await?.id.clone();
        let page: Page<RacCluster> = self
            .get("api/internal/oracle/rac", &[("primary_cluster_id", cluster_id.as_str())])
            .await?;
        page.data
            .into_iter()
            .find(|rac| rac.nodes.iter().any(|node| same_host(&node.node_name, hostname)))
            .map(|rac| ResolvedTarget(rac.id))
            .ok_or_else(|| CloneError::Resolution(format!("No RAC cluster found containing node {}", hostname)))
    }

    async fn request_live_mount(
        &self,
        db_id: &str,
        target: &ResolvedTarget,
        time_ms: i64,
        files_only: bool,
        mount_path: &Path,
    ) -> Result<AsyncJobHandle> {
        let body = json!({
            "recoveryPoint": { "timestampMs": time_ms },
            "targetOracleHostOrRacId": target.0,
            "targetMountPath": mount_path.to_string_lossy(),
            "shouldMountFilesOnly": files_only,
        });
        let response = self
            .request(Method::POST, &format!("api/internal/oracle/db/{}/mount", db_id))?
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn poll_job(&self, job_id: &str) -> Result<JobState> {
        self.get(&format!("api/internal/oracle/request/{}", job_id), &[]).await
    }

    async fn request_unmount(&self, mount_id: &str) -> Result<AsyncJobHandle> {
        let response = self
            .request(Method::DELETE, &format!("api/internal/oracle/db/mount/{}", mount_id))?
            .query(&[("force", "false")])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
