// ABOUTME: HTTP implementation of ControlPlane against the Power Virtual Server API.
// ABOUTME: Handles bearer-token refresh, CRN headers, and status-code classification.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::auth::{BearerToken, IamAuthenticator};
use super::error::CloudError;
use super::models::{
    AttachRequest, BulkDeleteRequest, CloneRequest, CloneTask, CloneTaskRef,
    CreateInstanceRequest, CreateInstanceResponse, DetachRequest, InstanceDetail, InstanceList,
    SnapshotDetail, SnapshotRecord, SnapshotRef, SnapshotVolume, VolumeDetail, VolumeRefList,
};
use super::traits::ControlPlane;
use crate::config::{BootConfig, Config};
use crate::error::Result;
use crate::types::{CloneTaskId, InstanceId, InstanceName, SnapshotId, VolumeId};

/// Refresh the token when it has less than this much life left.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Power Virtual Server API client scoped to one workspace.
pub struct PowerVsClient {
    http: reqwest::Client,
    iam: IamAuthenticator,
    api_key: String,
    crn: String,
    v1_base: String,
    v2_base: String,
    token: RwLock<Option<BearerToken>>,
}

impl std::fmt::Debug for PowerVsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerVsClient")
            .field("v1_base", &self.v1_base)
            .field("authenticated", &self.token.read().is_some())
            .finish_non_exhaustive()
    }
}

impl PowerVsClient {
    /// Build a client from configuration, resolving the API key now.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lparclone/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(CloudError::from)?;

        let endpoint = config.api_endpoint();
        let endpoint = endpoint.trim_end_matches('/');
        let workspace = config.cloud_instance_id()?;

        Ok(Self {
            iam: IamAuthenticator::new(http.clone(), config.iam_endpoint.clone()),
            http,
            api_key: config.api_key.resolve()?,
            crn: config.crn.clone(),
            v1_base: format!("{endpoint}/pcloud/v1/cloud-instances/{workspace}"),
            v2_base: format!("{endpoint}/pcloud/v2/cloud-instances/{workspace}"),
            token: RwLock::new(None),
        })
    }

    /// Current bearer token, exchanging a new one when close to expiry.
    async fn bearer(&self) -> std::result::Result<String, CloudError> {
        let now = chrono::Utc::now();
        let margin = chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        {
            let guard = self.token.read();
            match guard.as_ref() {
                None => return Err(CloudError::NotAuthenticated),
                Some(token) if !token.is_expiring(now, margin) => {
                    return Ok(token.access_token.clone());
                }
                Some(_) => {}
            }
        }

        tracing::debug!("bearer token near expiry, refreshing");
        let token = self.iam.get_token(&self.api_key).await?;
        let access = token.access_token.clone();
        *self.token.write() = Some(token);
        Ok(access)
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
    ) -> std::result::Result<RequestBuilder, CloudError> {
        let bearer = self.bearer().await?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(bearer)
            .header("CRN", &self.crn)
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    /// Send and decode a JSON response body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<&(impl Serialize + Sync)>,
    ) -> std::result::Result<T, CloudError> {
        let response = self.send(method, &url, body).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| CloudError::Decode {
            path: url,
            message: e.to_string(),
        })
    }

    /// Send and discard the response body.
    async fn send_unit(
        &self,
        method: Method,
        url: String,
        body: Option<&(impl Serialize + Sync)>,
    ) -> std::result::Result<(), CloudError> {
        self.send(method, &url, body).await.map(|_| ())
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> std::result::Result<reqwest::Response, CloudError> {
        let mut builder = self.request(method.clone(), url).await?;
        if let Some(body) = body {
            builder = builder.json(body);
        }

        tracing::debug!(%method, url, "control plane request");
        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CloudError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::Http {
                method: method.to_string(),
                path: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn v1(&self, path: &str) -> String {
        format!("{}/{}", self.v1_base, path)
    }

    fn v2(&self, path: &str) -> String {
        format!("{}/{}", self.v2_base, path)
    }
}

/// Placeholder body type for requests without one.
const NO_BODY: Option<&()> = None;

#[async_trait]
impl ControlPlane for PowerVsClient {
    async fn authenticate(&self) -> std::result::Result<(), CloudError> {
        let token = self.iam.get_token(&self.api_key).await?;
        *self.token.write() = Some(token);
        Ok(())
    }

    async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> std::result::Result<CreateInstanceResponse, CloudError> {
        self.send_json(Method::POST, self.v1("pvm-instances"), Some(request))
            .await
    }

    async fn get_instance(
        &self,
        id: &InstanceId,
    ) -> std::result::Result<InstanceDetail, CloudError> {
        self.send_json(Method::GET, self.v1(&format!("pvm-instances/{id}")), NO_BODY)
            .await
    }

    async fn find_instance_by_name(
        &self,
        name: &InstanceName,
    ) -> std::result::Result<Option<InstanceId>, CloudError> {
        let list: InstanceList = self
            .send_json(Method::GET, self.v1("pvm-instances"), NO_BODY)
            .await?;
        Ok(list
            .instances
            .into_iter()
            .find(|i| i.server_name.as_deref() == Some(name.as_str()))
            .and_then(|i| i.id))
    }

    async fn delete_instance(&self, id: &InstanceId) -> std::result::Result<(), CloudError> {
        self.send_unit(Method::DELETE, self.v1(&format!("pvm-instances/{id}")), NO_BODY)
            .await
    }

    async fn create_snapshot(
        &self,
        instance: &str,
        name: &str,
    ) -> std::result::Result<SnapshotRef, CloudError> {
        #[derive(Serialize)]
        struct Body<'a> {
            name: &'a str,
        }

        let path = format!(
            "pvm-instances/{}/snapshots",
            urlencoding::encode(instance)
        );
        self.send_json(Method::POST, self.v1(&path), Some(&Body { name }))
            .await
    }

    async fn get_snapshot(
        &self,
        id: &SnapshotId,
    ) -> std::result::Result<SnapshotDetail, CloudError> {
        let record: SnapshotRecord = self
            .send_json(Method::GET, self.v1(&format!("snapshots/{id}")), NO_BODY)
            .await?;

        // The snapshot record only lists volume ids; bootability lives on the volume.
        let mut volumes = Vec::with_capacity(record.volume_snapshots.len());
        if record.status.eq_ignore_ascii_case("available") {
            for source in record.volume_snapshots.keys() {
                let volume = self.get_volume(&VolumeId::new(source.as_str())).await?;
                volumes.push(SnapshotVolume {
                    id: volume.id,
                    bootable: volume.bootable,
                });
            }
        }

        Ok(SnapshotDetail {
            status: record.status,
            volumes,
        })
    }

    async fn clone_volumes(
        &self,
        request: &CloneRequest,
    ) -> std::result::Result<CloneTaskRef, CloudError> {
        self.send_json(Method::POST, self.v2("volumes-clone-async"), Some(request))
            .await
    }

    async fn get_clone_task(
        &self,
        id: &CloneTaskId,
    ) -> std::result::Result<CloneTask, CloudError> {
        self.send_json(
            Method::GET,
            self.v2(&format!("volumes-clone-tasks/{id}")),
            NO_BODY,
        )
        .await
    }

    async fn get_volume(&self, id: &VolumeId) -> std::result::Result<VolumeDetail, CloudError> {
        self.send_json(Method::GET, self.v1(&format!("volumes/{id}")), NO_BODY)
            .await
    }

    async fn attach_volumes(
        &self,
        instance: &InstanceId,
        boot: &VolumeId,
        data: &[VolumeId],
    ) -> std::result::Result<(), CloudError> {
        let body = AttachRequest {
            boot_volume_id: boot,
            volume_ids: std::iter::once(boot).chain(data.iter()).collect(),
        };
        self.send_unit(
            Method::POST,
            self.v2(&format!("pvm-instances/{instance}/volumes")),
            Some(&body),
        )
        .await
    }

    async fn list_instance_volumes(
        &self,
        instance: &InstanceId,
    ) -> std::result::Result<Vec<VolumeId>, CloudError> {
        let list: VolumeRefList = self
            .send_json(
                Method::GET,
                self.v1(&format!("pvm-instances/{instance}/volumes")),
                NO_BODY,
            )
            .await?;
        Ok(list.volumes.into_iter().map(|v| v.id).collect())
    }

    async fn detach_all_volumes(&self, instance: &InstanceId) -> std::result::Result<(), CloudError> {
        let body = DetachRequest {
            detach_all_volumes: true,
            detach_primary_boot_volume: true,
        };
        self.send_unit(
            Method::POST,
            self.v2(&format!("pvm-instances/{instance}/volumes/remove")),
            Some(&body),
        )
        .await
    }

    async fn delete_volumes(&self, ids: &[VolumeId]) -> std::result::Result<(), CloudError> {
        self.send_unit(
            Method::DELETE,
            self.v2("volumes"),
            Some(&BulkDeleteRequest { volume_ids: ids }),
        )
        .await
    }

    async fn configure_boot_mode(
        &self,
        instance: &InstanceId,
        boot: &BootConfig,
    ) -> std::result::Result<(), CloudError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body<'a> {
            boot_mode: &'a str,
            operating_mode: &'a str,
        }

        self.send_unit(
            Method::PUT,
            self.v1(&format!("pvm-instances/{instance}")),
            Some(&Body {
                boot_mode: &boot.boot_mode,
                operating_mode: &boot.operating_mode,
            }),
        )
        .await
    }

    async fn start_instance(&self, instance: &InstanceId) -> std::result::Result<(), CloudError> {
        #[derive(Serialize)]
        struct Body {
            action: &'static str,
        }

        self.send_unit(
            Method::POST,
            self.v1(&format!("pvm-instances/{instance}/action")),
            Some(&Body { action: "start" }),
        )
        .await
    }
}
