//! Docker-backed container driver.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, CreateImageOptions, ListImagesOptions};
use bollard::service::HostConfig;
use futures_util::StreamExt;
use std::path::Path;
use streamdock_core::{Error, Result};
use tokio::sync::mpsc;

use crate::logs::frame_bytes;
use crate::{
    ContainerDriver, ContainerHandle, ContainerState, ImageInfo, LogStream, RunSpec,
    archive_directory,
};

/// Drives containers through the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerDriver {
    docker: Docker,
}

impl DockerDriver {
    /// Connect using the local defaults (`DOCKER_HOST` or the platform socket).
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`] if the client cannot be set up.
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::RuntimeUnavailable(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Connect to a custom socket path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`] if the client cannot be set up.
    pub fn with_socket(socket_path: &str) -> Result<Self> {
        let docker = Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| Error::RuntimeUnavailable(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Connect to `socket_path` if given, otherwise to the local defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`] if the client cannot be set up.
    pub fn connect(socket_path: Option<&str>) -> Result<Self> {
        match socket_path {
            Some(path) => Self::with_socket(path),
            None => Self::new(),
        }
    }

    /// Follow a container's output, starting with the last `tail_lines`.
    #[must_use]
    pub fn follow_logs(&self, container_id: &str, tail_lines: usize) -> LogStream {
        LogStream::start(self.docker.clone(), container_id.to_string(), tail_lines)
    }
}

/// Map a bollard error onto the streamdock taxonomy.
pub(crate) fn classify(err: BollardError) -> Error {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => Error::NotFound(message),
        BollardError::DockerResponseServerError { message, .. } => Error::Docker(message),
        err @ (BollardError::SocketNotFoundError(_) | BollardError::RequestTimeoutError) => {
            Error::RuntimeUnavailable(err.to_string())
        }
        err if is_connection_error(&err) => Error::RuntimeUnavailable(err.to_string()),
        err => Error::Docker(err.to_string()),
    }
}

/// Transport failures carry an IO error somewhere in their source chain.
fn is_connection_error(err: &BollardError) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if current.is::<std::io::Error>() {
            return true;
        }
        source = current.source();
    }
    false
}

/// Split an image reference into name and tag, defaulting the tag to `latest`.
fn split_reference(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].rfind(':') {
        Some(i) => (&image[..name_start + i], &image[name_start + i + 1..]),
        None => (image, "latest"),
    }
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    async fn version(&self) -> Result<String> {
        self.docker.ping().await.map_err(classify)?;
        let version = self.docker.version().await.map_err(classify)?;
        Ok(version.version.unwrap_or_else(|| "unknown".to_string()))
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await.map_err(classify) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn build_image(
        &self,
        context: &Path,
        tag: &str,
        lines: &mpsc::UnboundedSender<String>,
    ) -> Result<()> {
        let context = context.to_path_buf();
        let tarball = tokio::task::spawn_blocking(move || archive_directory(&context))
            .await
            .map_err(|e| Error::Docker(format!("build context task failed: {e}")))??;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(bytes::Bytes::from(tarball)));

        while let Some(result) = stream.next().await {
            let info = result.map_err(classify)?;
            if let Some(error) = info.error {
                return Err(Error::Docker(format!(
                    "build of {tag} failed: {}",
                    error.trim_end()
                )));
            }
            if let Some(text) = info.stream {
                for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
                    let _ = lines.send(line.to_string());
                }
            }
        }

        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let (from_image, tag) = split_reference(image);
        let options = Some(CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::debug!(image, "{status}");
                    }
                }
                Err(e) => return Err(classify(e)),
            }
        }

        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(classify)?;

        Ok(images
            .into_iter()
            .map(|image| ImageInfo {
                tags: image
                    .repo_tags
                    .into_iter()
                    .filter(|tag| tag != "<none>:<none>")
                    .collect(),
                size: image.size,
            })
            .collect())
    }

    async fn run_container(&self, spec: &RunSpec) -> Result<ContainerHandle> {
        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            ..Default::default()
        };

        let mut env: Vec<String> = spec
            .environment
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        env.sort();

        let binds = (!spec.volumes.is_empty()).then(|| spec.volumes.to_bollard_binds());

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(env),
            tty: Some(true),
            open_stdin: Some(true),
            host_config: Some(HostConfig {
                binds,
                auto_remove: Some(spec.auto_remove),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| match classify(e) {
                Error::NotFound(_) => Error::ImageNotFound(spec.image.clone()),
                other => other,
            })?;

        for warning in &response.warnings {
            tracing::warn!(container = %spec.name, "{warning}");
        }

        if let Err(e) = self
            .docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
        {
            // Don't leave a created-but-never-started container behind.
            let _ = self
                .docker
                .remove_container(
                    &response.id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;
            return Err(classify(e));
        }

        Ok(ContainerHandle { id: response.id })
    }

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<()> {
        let options = StopContainerOptions { t: timeout_secs };
        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(classify)
    }

    async fn fetch_logs(&self, id: &str, tail_lines: usize) -> Result<String> {
        let options = LogsOptions::<String> {
            follow: false,
            stdout: true,
            stderr: true,
            tail: tail_lines.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(options));
        let mut output = Vec::new();

        while let Some(result) = stream.next().await {
            if let Some(bytes) = frame_bytes(result.map_err(classify)?) {
                output.extend_from_slice(&bytes);
            }
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerState>> {
        let options = ListContainersOptions::<String> {
            all: include_stopped,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(classify)?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                Some(ContainerState {
                    id: c.id?,
                    status: c.state.unwrap_or_default(),
                })
            })
            .collect())
    }
}
