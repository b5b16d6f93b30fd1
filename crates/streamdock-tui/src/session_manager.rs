//! Session lifecycle management.

use chrono::Local;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use streamdock_core::{
    Config, Error, EventSink, OUTPUT_MOUNT, Result, Session, SessionEvent, SessionRegistry,
    SessionStatus, StreamRequest,
};
use streamdock_docker::{ContainerDriver, ImageInfo, RunSpec, VolumeMap, VolumeMode};
use tokio::sync::mpsc;

/// Seconds the daemon waits for a container to exit before killing it.
pub const STOP_TIMEOUT_SECS: i64 = 10;

/// Lines shown when viewing a session's output.
pub const LOG_TAIL_LINES: usize = 100;

/// Pause between container launches within one batch.
pub const DEFAULT_LAUNCH_DELAY: Duration = Duration::from_secs(2);

/// Outcome of a batch start.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Sessions that were created, in launch order.
    pub started: Vec<Session>,
    /// Zero-based batch index and error of every launch that failed.
    pub failures: Vec<(usize, Error)>,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Sessions whose status changed.
    pub updated: usize,
    /// Sessions removed because their container is gone.
    pub pruned: Vec<Session>,
    /// Per-session errors; the pass continued past each.
    pub errors: Vec<(String, Error)>,
}

/// Outcome of stopping several sessions.
#[derive(Debug, Default)]
pub struct StopReport {
    /// Container ids that were stopped or already gone.
    pub stopped: Vec<String>,
    /// Container ids that could not be stopped.
    pub errors: Vec<(String, Error)>,
}

/// Runs the session workflows against a container driver.
///
/// Shared between the presentation loop and background tasks behind an
/// `Arc`. All state lives in the registry; results are reported through the
/// event sink.
pub struct SessionManager {
    /// Container runtime.
    driver: Arc<dyn ContainerDriver>,
    /// Sessions we own.
    registry: Arc<SessionRegistry>,
    /// Configuration.
    config: Config,
    /// Where configuration is saved on shutdown.
    config_path: Option<PathBuf>,
    /// Event channel to the presentation layer.
    sink: EventSink,
    /// Pause between launches in a batch.
    launch_delay: Duration,
}

impl SessionManager {
    /// Create a session manager with an empty registry.
    pub fn new(driver: Arc<dyn ContainerDriver>, config: Config, sink: EventSink) -> Self {
        Self {
            driver,
            registry: Arc::new(SessionRegistry::new()),
            config,
            config_path: None,
            sink,
            launch_delay: DEFAULT_LAUNCH_DELAY,
        }
    }

    /// Set the pause between launches within a batch.
    #[must_use]
    pub const fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    /// Save configuration to `path` on shutdown.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// The session registry.
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Active configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The event sink workflows report through.
    pub const fn sink(&self) -> &EventSink {
        &self.sink
    }

    /// Snapshot of all sessions.
    pub fn sessions(&self) -> Vec<Session> {
        self.registry.get_all()
    }

    /// Check the daemon and whether the configured image exists.
    ///
    /// A missing image is only reported. Returns the engine version.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the daemon cannot be reached.
    pub async fn check_runtime(&self) -> Result<String> {
        let version = match self.driver.version().await {
            Ok(version) => version,
            Err(e) => {
                self.sink.log_error(format!("Docker error: {e}"));
                return Err(e);
            }
        };
        self.sink.log(format!("Docker status: OK - Version {version}"));

        let image = &self.config.docker_image;
        match self.driver.image_exists(image).await {
            Ok(true) => self.sink.log(format!("Docker image '{image}' found")),
            Ok(false) => self.sink.log(format!(
                "{} - you may need to build it",
                Error::ImageNotFound(image.clone())
            )),
            Err(e) => self
                .sink
                .log_error(format!("Error checking image '{image}': {e}")),
        }

        Ok(version)
    }

    fn run_spec(&self, request: &StreamRequest, sequence: u64, name: &str) -> RunSpec {
        let mut volumes = VolumeMap::new();
        if let Some(dir) = request.bound_directory() {
            volumes.bind(dir, OUTPUT_MOUNT, VolumeMode::ReadWrite);
        }

        RunSpec {
            image: self.config.docker_image.trim().to_string(),
            name: name.to_string(),
            environment: request.environment(sequence),
            volumes,
            auto_remove: self.config.auto_remove_containers,
        }
    }

    /// Start `request.count` containers, one after another.
    ///
    /// A failed launch is logged and the batch moves on; nothing is
    /// registered for it. An unreachable daemon ends the batch at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid, no image is configured,
    /// the daemon cannot be reached, or the runtime hands out a container id
    /// that is already registered. Sessions started before the error stay
    /// registered.
    pub async fn start_batch(&self, request: &StreamRequest) -> Result<BatchReport> {
        if let Err(e) = request.validate() {
            self.sink.log_error(format!("Cannot start containers: {e}"));
            return Err(e);
        }
        if self.config.docker_image.trim().is_empty() {
            let e = Error::Config("no docker image configured".into());
            self.sink.log_error(format!("Cannot start containers: {e}"));
            return Err(e);
        }

        let mut report = BatchReport::default();

        for index in 0..request.count {
            let sequence = self.registry.next_sequence();
            let name = format!("{}-{sequence}", self.config.container_prefix);
            let spec = self.run_spec(request, sequence, &name);
            let output_target = request.output_target(sequence);

            self.sink.log(format!("Starting container: {name}"));
            self.sink.log(format!("  URL: {}", request.url.trim()));
            self.sink.log(format!("  Quality: {}", request.quality));
            self.sink.log(format!("  Output: {output_target}"));

            match self.driver.run_container(&spec).await {
                Ok(handle) => {
                    let session = Session {
                        id: handle.id,
                        name: name.clone(),
                        sequence,
                        source_url: request.url.trim().to_string(),
                        quality: request.quality.clone(),
                        output_target,
                        created_at: Local::now(),
                        runtime_status: SessionStatus::Running,
                    };

                    if let Err(e) = self.registry.register(session.clone()) {
                        tracing::error!(session = %name, "{e}");
                        self.sink.log_error(format!("Stopped starting containers: {e}"));
                        return Err(e);
                    }
                    self.sink.emit(SessionEvent::Created(session.clone()));
                    self.sink.log(format!("Container {name} started successfully"));
                    report.started.push(session);
                }
                Err(e) if e.is_unavailable() => {
                    self.sink.log_error(format!("Docker error: {e}"));
                    self.sink.log(format!(
                        "Started {} of {} container(s)",
                        report.started.len(),
                        request.count
                    ));
                    return Err(e);
                }
                Err(e) => {
                    self.sink.log_error(format!("Error starting container {}: {e}", index + 1));
                    report.failures.push((index, e));
                }
            }

            if index + 1 < request.count && !self.launch_delay.is_zero() {
                tokio::time::sleep(self.launch_delay).await;
            }
        }

        self.sink.log(format!(
            "Started {} of {} container(s)",
            report.started.len(),
            request.count
        ));
        Ok(report)
    }

    fn forget(&self, id: &str) -> Option<Session> {
        let session = self.registry.unregister(id)?;
        self.sink.emit(SessionEvent::Removed {
            id: session.id.clone(),
            name: session.name.clone(),
        });
        Some(session)
    }

    /// Stop a session and stop tracking it.
    ///
    /// Unknown ids and containers that are already gone are not errors.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the container could not be stopped; the
    /// session stays registered in that case.
    pub async fn stop_session(&self, id: &str) -> Result<()> {
        let Some(session) = self.registry.get(id) else {
            return Ok(());
        };

        self.sink.log(format!("Stopping container: {}", session.name));

        match self.driver.stop_container(id, STOP_TIMEOUT_SECS).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(session = %session.name, "container already gone");
            }
            Err(e) => {
                self.sink.log_error(format!("Error stopping container {}: {e}", session.name));
                return Err(e);
            }
        }

        self.forget(id);
        self.sink.log(format!("Container {} stopped", session.name));
        Ok(())
    }

    /// Stop a session if it is running, remove its container, and stop
    /// tracking it.
    ///
    /// # Errors
    ///
    /// Returns the driver error if stopping or removing failed for a reason
    /// other than the container being gone.
    pub async fn remove_session(&self, id: &str) -> Result<()> {
        let Some(session) = self.registry.get(id) else {
            return Ok(());
        };

        let result: Result<()> = async {
            if session.runtime_status.is_active() {
                match self.driver.stop_container(id, STOP_TIMEOUT_SECS).await {
                    Err(e) if !e.is_not_found() => return Err(e),
                    _ => {}
                }
            }
            match self.driver.remove_container(id).await {
                Err(e) if !e.is_not_found() => Err(e),
                _ => Ok(()),
            }
        }
        .await;

        if let Err(e) = result {
            self.sink.log_error(format!("Error removing container {}: {e}", session.name));
            return Err(e);
        }

        self.forget(id);
        self.sink.log(format!("Container {} removed", session.name));
        Ok(())
    }

    /// Stop every registered session, continuing past failures.
    pub async fn stop_all(&self) -> StopReport {
        let ids = self.registry.ids();
        let mut report = StopReport::default();

        if ids.is_empty() {
            self.sink.log("No containers to stop");
            return report;
        }

        for id in ids {
            match self.stop_session(&id).await {
                Ok(()) => report.stopped.push(id),
                Err(e) => report.errors.push((id, e)),
            }
        }

        if report.errors.is_empty() {
            self.sink.log("All containers stopped");
        } else {
            self.sink.log_error(format!(
                "Stopped {} container(s), {} failed",
                report.stopped.len(),
                report.errors.len()
            ));
        }
        report
    }

    /// Align the registry with the containers the runtime reports.
    ///
    /// Sessions whose container is gone are removed; the rest get their
    /// status refreshed. A problem with one session does not stop the pass.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the container list cannot be fetched.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let live = match self.driver.list_containers(true).await {
            Ok(live) => live,
            Err(e) => {
                self.sink.log_error(format!("Error refreshing container status: {e}"));
                return Err(e);
            }
        };
        let live: HashMap<&str, &str> = live
            .iter()
            .map(|c| (c.id.as_str(), c.status.as_str()))
            .collect();

        let mut report = ReconcileReport::default();

        for session in self.registry.get_all() {
            let Some(state) = live.get(session.id.as_str()) else {
                if let Some(mut gone) = self.forget(&session.id) {
                    self.sink.log(format!("Container {} no longer exists", gone.name));
                    gone.runtime_status = SessionStatus::Missing;
                    report.pruned.push(gone);
                }
                continue;
            };

            match SessionStatus::from_runtime_state(state) {
                Some(status) => {
                    if self.registry.update_status(&session.id, status) {
                        self.sink.emit(SessionEvent::Updated {
                            id: session.id.clone(),
                            status,
                        });
                        report.updated += 1;
                    }
                }
                None => {
                    let e = Error::Docker(format!("unrecognised container state '{state}'"));
                    self.sink
                        .log_error(format!("Error refreshing container {}: {e}", session.name));
                    report.errors.push((session.id.clone(), e));
                }
            }
        }

        self.sink.log("Container status refreshed");
        Ok(report)
    }

    /// Write the build context into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be written.
    pub fn create_build_context(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        match streamdock_assets::write_build_context(dir) {
            Ok(written) => {
                self.sink.log(format!(
                    "Docker files created successfully in {}",
                    dir.display()
                ));
                Ok(written)
            }
            Err(e) => {
                self.sink.log_error(format!("Error creating Docker files: {e}"));
                Err(e)
            }
        }
    }

    /// Build `tag` from the build context in `dir`.
    ///
    /// Build output is forwarded to the event sink line by line, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is missing, `tag` is empty, or the build
    /// fails.
    pub async fn build_image(&self, dir: &Path, tag: &str) -> Result<()> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::Config("image name is empty".into()));
        }
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "build directory {} does not exist; create the Docker files first",
                dir.display()
            )));
        }

        self.sink.log(format!("Building Docker image '{tag}'..."));
        self.sink.log("This may take several minutes...");

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let sink = self.sink.clone();
        let forward = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                sink.log(format!("Build: {line}"));
            }
        });

        let result = self.driver.build_image(dir, tag, &tx).await;
        drop(tx);
        let _ = forward.await;

        match &result {
            Ok(()) => self
                .sink
                .log(format!("Docker image '{tag}' built successfully!")),
            Err(e) => self
                .sink
                .log_error(format!("Error building Docker image: {e}")),
        }
        result
    }

    /// Pull `tag` from its registry.
    ///
    /// # Errors
    ///
    /// Returns an error if `tag` is empty or the pull fails.
    pub async fn pull_image(&self, tag: &str) -> Result<()> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::Config("image name is empty".into()));
        }

        self.sink.log(format!("Pulling Docker image '{tag}'..."));
        let result = self.driver.pull_image(tag).await;
        match &result {
            Ok(()) => self
                .sink
                .log(format!("Docker image '{tag}' pulled successfully!")),
            Err(e) => self
                .sink
                .log_error(format!("Error pulling Docker image: {e}")),
        }
        result
    }

    /// List local images and log them.
    ///
    /// # Errors
    ///
    /// Returns the driver error if listing fails.
    pub async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        let images = match self.driver.list_images().await {
            Ok(images) => images,
            Err(e) => {
                self.sink.log_error(format!("Error listing Docker images: {e}"));
                return Err(e);
            }
        };

        self.sink.log("Available Docker images:");
        for image in &images {
            for tag in image.display_tags() {
                self.sink.log(format!("  {tag} ({:.1} MB)", image.size_mb()));
            }
        }
        Ok(images)
    }

    /// Recent output of a session's container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the session is not registered, or the
    /// driver error.
    pub async fn session_logs(&self, id: &str, tail_lines: usize) -> Result<String> {
        if self.registry.get(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }

        self.driver
            .fetch_logs(id, tail_lines)
            .await
            .inspect_err(|e| {
                self.sink.log_error(format!("Error viewing container logs: {e}"));
            })
    }

    /// Save configuration to the configured path.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is set or the file cannot be written.
    pub fn save_config(&self) -> Result<()> {
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| Error::Config("no config path set".into()))?;
        match self.config.save_to(path) {
            Ok(()) => {
                self.sink.log("Configuration saved");
                Ok(())
            }
            Err(e) => {
                self.sink.log_error(format!("Error saving config: {e}"));
                Err(e)
            }
        }
    }

    /// Stop every session and save configuration. Never fails.
    pub async fn shutdown(&self) -> StopReport {
        let report = if self.registry.is_empty() {
            StopReport::default()
        } else {
            self.sink.log("Stopping all containers before closing...");
            self.stop_all().await
        };

        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save_to(path) {
                self.sink.log_error(format!("Error saving config: {e}"));
            }
        }

        report
    }
}
