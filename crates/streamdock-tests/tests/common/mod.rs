//! In-memory container runtime shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use streamdock_core::{Config, Error, EventSink, Result, SessionEvent};
use streamdock_docker::{ContainerDriver, ContainerHandle, ContainerState, ImageInfo, RunSpec};
use streamdock_tui::SessionManager;
use tokio::sync::mpsc;

#[derive(Debug)]
struct Container {
    id: String,
    state: String,
    auto_remove: bool,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    containers: Vec<Container>,
    runs: Vec<RunSpec>,
    failing_runs: HashSet<usize>,
    failing_stops: HashSet<String>,
    repeated_id: Option<String>,
    unavailable: bool,
    down_after_runs: Option<usize>,
    run_attempts: usize,
    images: Vec<ImageInfo>,
    build_lines: Vec<String>,
    build_error: Option<String>,
    builds: Vec<String>,
    pulls: Vec<String>,
    stop_calls: Vec<String>,
    remove_calls: Vec<String>,
    logs: HashMap<String, String>,
}

/// A scriptable stand-in for the Docker daemon.
#[derive(Debug, Default)]
pub struct FakeDriver {
    state: Mutex<State>,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make the `n`-th `run_container` call (zero-based) fail.
    pub fn fail_run(&self, n: usize) {
        self.lock().failing_runs.insert(n);
    }

    /// Make stopping `id` fail with a daemon error.
    pub fn fail_stop(&self, id: &str) {
        self.lock().failing_stops.insert(id.to_string());
    }

    /// Hand out the same container id for every run.
    pub fn repeat_id(&self, id: &str) {
        self.lock().repeated_id = Some(id.to_string());
    }

    /// Simulate the daemon going away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Let `n` containers start, then behave as if the daemon went away.
    pub fn go_down_after(&self, n: usize) {
        self.lock().down_after_runs = Some(n);
    }

    /// Delete a container behind streamdock's back.
    pub fn remove_out_of_band(&self, id: &str) {
        self.lock().containers.retain(|c| c.id != id);
    }

    /// Change the state string reported for a container.
    pub fn set_state(&self, id: &str, state: &str) {
        if let Some(c) = self.lock().containers.iter_mut().find(|c| c.id == id) {
            c.state = state.to_string();
        }
    }

    pub fn add_image(&self, tags: &[&str], size: i64) {
        self.lock().images.push(ImageInfo {
            tags: tags.iter().map(ToString::to_string).collect(),
            size,
        });
    }

    pub fn set_build_output(&self, lines: &[&str], error: Option<&str>) {
        let mut state = self.lock();
        state.build_lines = lines.iter().map(ToString::to_string).collect();
        state.build_error = error.map(ToString::to_string);
    }

    pub fn set_logs(&self, id: &str, text: &str) {
        self.lock().logs.insert(id.to_string(), text.to_string());
    }

    pub fn runs(&self) -> Vec<RunSpec> {
        self.lock().runs.clone()
    }

    /// Every `run_container` call, including those refused while down.
    pub fn run_attempts(&self) -> usize {
        self.lock().run_attempts
    }

    pub fn builds(&self) -> Vec<String> {
        self.lock().builds.clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.lock().pulls.clone()
    }

    pub fn stop_calls(&self) -> Vec<String> {
        self.lock().stop_calls.clone()
    }

    pub fn remove_calls(&self) -> Vec<String> {
        self.lock().remove_calls.clone()
    }

    pub fn live_ids(&self) -> Vec<String> {
        self.lock().containers.iter().map(|c| c.id.clone()).collect()
    }

    fn check(&self) -> Result<()> {
        if self.lock().unavailable {
            Err(Error::RuntimeUnavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContainerDriver for FakeDriver {
    async fn version(&self) -> Result<String> {
        self.check()?;
        Ok("27.0.0-fake".to_string())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.check()?;
        Ok(self
            .lock()
            .images
            .iter()
            .any(|i| i.tags.iter().any(|t| t == image || t.split(':').next() == Some(image))))
    }

    async fn build_image(
        &self,
        _context: &Path,
        tag: &str,
        lines: &mpsc::UnboundedSender<String>,
    ) -> Result<()> {
        self.check()?;
        let (output, error) = {
            let mut state = self.lock();
            state.builds.push(tag.to_string());
            (state.build_lines.clone(), state.build_error.clone())
        };
        for line in output {
            let _ = lines.send(line);
            tokio::task::yield_now().await;
        }
        match error {
            Some(e) => Err(Error::Docker(e)),
            None => Ok(()),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.check()?;
        self.lock().pulls.push(image.to_string());
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        self.check()?;
        Ok(self.lock().images.clone())
    }

    async fn run_container(&self, spec: &RunSpec) -> Result<ContainerHandle> {
        self.lock().run_attempts += 1;
        self.check()?;
        let mut state = self.lock();
        if state.down_after_runs.is_some_and(|n| state.runs.len() >= n) {
            state.unavailable = true;
            return Err(Error::RuntimeUnavailable("connection refused".into()));
        }
        let call = state.runs.len();
        state.runs.push(spec.clone());

        if state.failing_runs.contains(&call) {
            return Err(Error::Docker(format!("Conflict creating {}", spec.name)));
        }

        let id = match &state.repeated_id {
            Some(id) => id.clone(),
            None => {
                state.next_id += 1;
                format!("{:064x}", state.next_id)
            }
        };
        state.containers.push(Container {
            id: id.clone(),
            state: "running".to_string(),
            auto_remove: spec.auto_remove,
        });
        Ok(ContainerHandle { id })
    }

    async fn stop_container(&self, id: &str, _timeout_secs: i64) -> Result<()> {
        self.check()?;
        let mut state = self.lock();
        state.stop_calls.push(id.to_string());

        if state.failing_stops.contains(id) {
            return Err(Error::Docker(format!("cannot stop {id}")));
        }

        let Some(index) = state.containers.iter().position(|c| c.id == id) else {
            return Err(Error::NotFound(format!("No such container: {id}")));
        };
        if state.containers[index].auto_remove {
            state.containers.remove(index);
        } else {
            state.containers[index].state = "exited".to_string();
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.check()?;
        let mut state = self.lock();
        state.remove_calls.push(id.to_string());
        let before = state.containers.len();
        state.containers.retain(|c| c.id != id);
        if state.containers.len() == before {
            return Err(Error::NotFound(format!("No such container: {id}")));
        }
        Ok(())
    }

    async fn fetch_logs(&self, id: &str, tail_lines: usize) -> Result<String> {
        self.check()?;
        let state = self.lock();
        if !state.containers.iter().any(|c| c.id == id) {
            return Err(Error::NotFound(format!("No such container: {id}")));
        }
        let text = state.logs.get(id).cloned().unwrap_or_default();
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(tail_lines);
        Ok(lines[start..].join("\n"))
    }

    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerState>> {
        self.check()?;
        Ok(self
            .lock()
            .containers
            .iter()
            .filter(|c| include_stopped || c.state == "running")
            .map(|c| ContainerState {
                id: c.id.clone(),
                status: c.state.clone(),
            })
            .collect())
    }
}

/// A manager over `driver` with no launch delay.
pub fn manager(
    driver: &Arc<FakeDriver>,
    config: Config,
) -> (SessionManager, mpsc::UnboundedReceiver<SessionEvent>) {
    let (sink, events) = EventSink::channel();
    let driver: Arc<dyn ContainerDriver> = driver.clone();
    let manager = SessionManager::new(driver, config, sink).with_launch_delay(Duration::ZERO);
    (manager, events)
}

/// Every queued event.
pub fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Every queued log line.
pub fn drain_logs(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<String> {
    drain(events)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::Log(line) => Some(line),
            _ => None,
        })
        .collect()
}
