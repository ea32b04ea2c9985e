use std::path::Path;
use std::pin::pin;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StatsOptions, UploadToContainerOptions,
    WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bytes::Bytes;
use futures_util::stream::StreamExt;

use super::{InstanceLogs, InstanceSpec, RuntimeError, SandboxHandle, SandboxRuntime};

/// Sandbox runtime backed by the local Docker engine
///
/// Each instance is one container. Containers are never reused and are
/// force-removed together with their anonymous volumes.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to the daemon from the environment and checks it answers
    pub async fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;

        log::info!("Docker runtime connected");
        Ok(Self { docker })
    }

    /// Pulls `image` unless it is already present locally
    async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        log::info!("Image {image} not found locally, pulling");
        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });
        let mut progress = pin!(self.docker.create_image(options, None, None));
        while let Some(step) = progress.next().await {
            step.map_err(|e| RuntimeError::api("pull image", e))?;
        }

        Ok(())
    }
}

/// Converts a limit into the engine's signed representation
fn engine_value(field: &str, value: u64) -> Result<i64, RuntimeError> {
    i64::try_from(value)
        .map_err(|_| RuntimeError::api("create", format!("{field} limit {value} out of range")))
}

/// Packs a single file into an in-memory tar archive
fn single_file_archive(file_name: &str, contents: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);

    let mut builder = tar::Builder::new(Vec::new());
    builder.append_data(&mut header, file_name, contents)?;
    builder.into_inner()
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    async fn create(&self, spec: &InstanceSpec) -> Result<SandboxHandle, RuntimeError> {
        self.ensure_image(&spec.image).await?;

        // No volumes or binds are attached, so the writable layer dies with
        // the container.
        let host_config = HostConfig {
            memory: Some(engine_value("memory", spec.limits.memory_bytes)?),
            nano_cpus: Some(engine_value("nano_cpus", spec.limits.cpu_nanos)?),
            pids_limit: Some(engine_value("pids_limit", spec.limits.pids_limit)?),
            oom_kill_disable: Some(!spec.limits.oom_kill),
            network_mode: spec
                .security
                .network_disabled
                .then(|| "none".to_string()),
            security_opt: spec
                .security
                .no_new_privileges
                .then(|| vec!["no-new-privileges".to_string()]),
            readonly_rootfs: Some(false),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            working_dir: Some(spec.working_dir.clone()),
            tty: Some(false),
            network_disabled: Some(spec.security.network_disabled),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| RuntimeError::api("create", e))?;

        for warning in &response.warnings {
            log::warn!("Docker warning for container {}: {warning}", response.id);
        }

        Ok(SandboxHandle::new(response.id))
    }

    async fn inject_file(
        &self,
        handle: &SandboxHandle,
        contents: Vec<u8>,
        dest: &str,
    ) -> Result<(), RuntimeError> {
        let dest = Path::new(dest);
        let (dir, file_name) = match (dest.parent(), dest.file_name()) {
            (Some(dir), Some(name)) => (dir.to_string_lossy(), name.to_string_lossy()),
            _ => {
                return Err(RuntimeError::api(
                    "inject",
                    format!("invalid destination {}", dest.display()),
                ));
            }
        };

        let archive = single_file_archive(&file_name, &contents)
            .map_err(|e| RuntimeError::api("inject", e))?;

        let options = UploadToContainerOptions {
            path: dir.into_owned(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(handle.id(), Some(options), Bytes::from(archive))
            .await
            .map_err(|e| RuntimeError::api("inject", e))
    }

    async fn start(&self, handle: &SandboxHandle) -> Result<(), RuntimeError> {
        self.docker
            .start_container(handle.id(), None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::api("start", e))
    }

    async fn wait(&self, handle: &SandboxHandle) -> Result<i64, RuntimeError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut statuses = pin!(self.docker.wait_container(handle.id(), Some(options)));

        match statuses.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // The engine reports a non-zero exit as a wait "error"
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RuntimeError::api("wait", e)),
            None => Err(RuntimeError::api("wait", "stream ended without exit status")),
        }
    }

    async fn kill(&self, handle: &SandboxHandle) -> Result<(), RuntimeError> {
        self.docker
            .kill_container(handle.id(), Some(KillContainerOptions { signal: "SIGKILL" }))
            .await
            .map_err(|e| RuntimeError::api("kill", e))
    }

    async fn read_logs(&self, handle: &SandboxHandle) -> Result<InstanceLogs, RuntimeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            timestamps: false,
            ..Default::default()
        };
        let mut chunks = pin!(self.docker.logs(handle.id(), Some(options)));

        let mut logs = InstanceLogs::default();
        while let Some(chunk) = chunks.next().await {
            match chunk.map_err(|e| RuntimeError::api("read logs", e))? {
                LogOutput::StdOut { message } => logs.stdout.extend_from_slice(&message),
                LogOutput::StdErr { message } => logs.stderr.extend_from_slice(&message),
                _ => {}
            }
        }

        Ok(logs)
    }

    async fn read_memory_usage(&self, handle: &SandboxHandle) -> Result<Option<u64>, RuntimeError> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
        };
        let mut samples = pin!(self.docker.stats(handle.id(), Some(options)));

        match samples.next().await {
            Some(Ok(stats)) => Ok(stats
                .memory_stats
                .max_usage
                .or(stats.memory_stats.usage)),
            Some(Err(e)) => Err(RuntimeError::api("read stats", e)),
            None => Ok(None),
        }
    }

    async fn remove(&self, handle: &SandboxHandle) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        self.docker
            .remove_container(handle.id(), Some(options))
            .await
            .map_err(|e| RuntimeError::api("remove", e))
    }
}
