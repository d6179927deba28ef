// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Root
//!
//! The composition root: every process-wide service is created here once
//! and threaded as references through the tree: no process-wide
//! singletons, so tests construct their own agents. Destruction order is
//! the reverse of construction: pipelines first, then the dumper's final
//! checkpoint pass, then the passive services.

use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use logship_bootstrap::platform::create_platform;
use logship_bootstrap::shutdown::ShutdownCoordinator;
use logship_domain::AgentError;

use crate::application::{HostFacts, PipelineManager};
use crate::infrastructure::alarms::AlarmSink;
use crate::infrastructure::checkpoint::{CheckpointDumper, CheckpointStore};
use crate::infrastructure::config::{load_pipeline_configs, AgentSettings};
use crate::infrastructure::discovery::{ContainerRegistry, Discovery};
use crate::infrastructure::metrics::endpoint::MetricsEndpoint;
use crate::infrastructure::metrics::{MetricsService, WriteMetrics};
use crate::infrastructure::scheduler::{Scheduler, SchedulerConfig};
use crate::infrastructure::watch::{FsEvent, FsEventListener};

/// The assembled agent.
pub struct Agent {
    settings: AgentSettings,
    config_dir: PathBuf,
    metrics_port: u16,
    alarms: Arc<AlarmSink>,
    metrics: Arc<MetricsService>,
    write_metrics: Arc<WriteMetrics>,
    store: Arc<CheckpointStore>,
    listener: Arc<FsEventListener>,
    scheduler: Arc<Scheduler>,
    manager: Arc<PipelineManager>,
    fs_events: Mutex<Option<mpsc::Receiver<FsEvent>>>,
}

impl Agent {
    /// Builds every service. Nothing runs yet.
    pub fn build(
        config_dir: PathBuf,
        data_dir: PathBuf,
        settings: AgentSettings,
        metrics_port: u16,
    ) -> Result<Self, AgentError> {
        let alarms = AlarmSink::new();
        let metrics = Arc::new(MetricsService::new()?);
        let write_metrics = WriteMetrics::new();
        let store = Arc::new(CheckpointStore::new(
            data_dir.join("checkpoints"),
            Arc::clone(&alarms),
        ));
        let (listener, fs_events) =
            FsEventListener::new(settings.watch_queue_capacity, Arc::clone(&alarms))?;
        let listener = Arc::new(listener);
        let scheduler = Arc::new(Scheduler::new(
            SchedulerConfig {
                workers: settings.scheduler_workers,
                ..Default::default()
            },
            Arc::clone(&alarms),
        ));
        let discovery = Arc::new(Mutex::new(Discovery::new(Arc::clone(&alarms))));
        let containers = Arc::new(RwLock::new(ContainerRegistry::new()));

        let platform = create_platform();
        let host = HostFacts {
            hostname: platform.hostname(),
            host_ip: platform.host_ip().map(|ip| ip.to_string()),
        };

        let manager = PipelineManager::new(
            Arc::clone(&store),
            Arc::clone(&alarms),
            Arc::clone(&metrics),
            Arc::clone(&write_metrics),
            Arc::clone(&scheduler),
            Arc::clone(&listener),
            discovery,
            containers,
            host,
        );

        Ok(Self {
            settings,
            config_dir,
            metrics_port,
            alarms,
            metrics,
            write_metrics,
            store,
            listener,
            scheduler,
            manager,
            fs_events: Mutex::new(Some(fs_events)),
        })
    }

    pub fn manager(&self) -> &Arc<PipelineManager> {
        &self.manager
    }

    pub fn alarms(&self) -> &Arc<AlarmSink> {
        &self.alarms
    }

    pub fn write_metrics(&self) -> &Arc<WriteMetrics> {
        &self.write_metrics
    }

    /// The fs listener; held here so the watcher outlives every pipeline.
    pub fn listener(&self) -> &Arc<FsEventListener> {
        &self.listener
    }

    /// Loads and validates configs without running; the `validate`
    /// subcommand.
    pub fn validate_configs(&self) -> Result<usize, AgentError> {
        let outcome = load_pipeline_configs(&self.config_dir)?;
        if !outcome.failures.is_empty() {
            let detail: Vec<String> = outcome
                .failures
                .iter()
                .map(|(path, error)| format!("{}: {error}", path.display()))
                .collect();
            return Err(AgentError::invalid_config(detail.join("; ")));
        }
        Ok(outcome.configs.len())
    }

    /// Runs until shutdown. Returns an error only for unrecoverable
    /// configuration failures (every document refused at startup).
    pub async fn run(self: Arc<Self>, coordinator: ShutdownCoordinator) -> Result<(), AgentError> {
        let token = coordinator.token();

        // Restore durable state first
        self.store.load()?;

        // Configuration: refuse-all at startup is unrecoverable
        let outcome = load_pipeline_configs(&self.config_dir)?;
        if outcome.configs.is_empty() && !outcome.failures.is_empty() {
            return Err(AgentError::invalid_config(format!(
                "all {} pipeline documents are invalid",
                outcome.failures.len()
            )));
        }

        // Process priority from the strongest global request
        let priority = outcome
            .configs
            .iter()
            .map(|c| c.global.process_priority)
            .find(|p| *p != 0);
        if let Some(nice) = priority {
            if let Err(e) = create_platform().set_process_priority(nice) {
                warn!(nice, error = %e, "failed to set process priority");
            }
        }

        self.manager.install_all(outcome.configs).await;

        // Long-lived service tasks
        let mut service_tasks = Vec::new();

        let scheduler = Arc::clone(&self.scheduler);
        let scheduler_token = token.clone();
        service_tasks.push(tokio::spawn(async move {
            scheduler.run(scheduler_token).await;
        }));

        let dumper = CheckpointDumper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.metrics),
            Duration::from_secs(self.settings.checkpoint_dump_interval_secs.max(1)),
        );
        service_tasks.push(tokio::spawn(dumper.run(token.clone())));

        let endpoint = MetricsEndpoint::new(Arc::clone(&self.metrics), self.metrics_port);
        service_tasks.push(tokio::spawn(async move {
            if let Err(e) = endpoint.start().await {
                error!(error = %e, "metrics endpoint failed");
            }
        }));

        // Watch router: fs events → discovery → pumps
        let mut fs_events = self
            .fs_events
            .lock()
            .take()
            .ok_or_else(|| AgentError::internal("agent run() called twice"))?;
        let manager = Arc::clone(&self.manager);
        let router_token = token.clone();
        service_tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = fs_events.recv() => match event {
                        Some(event) => {
                            let routed = manager.discovery().lock().handle_event(&event);
                            for discovery_event in routed {
                                manager.route_discovery(discovery_event).await;
                            }
                        }
                        None => return,
                    },
                    _ = router_token.cancelled() => return,
                }
            }
        }));

        // Scheduler status export
        let status_scheduler = Arc::clone(&self.scheduler);
        let status_token = token.clone();
        service_tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for (task, counts) in status_scheduler.drain_status() {
                            if counts != Default::default() {
                                info!(
                                    task,
                                    success = counts.success,
                                    error = counts.error,
                                    skipped = counts.skipped,
                                    dropped = counts.dropped,
                                    "task status"
                                );
                            }
                        }
                    }
                    _ = status_token.cancelled() => return,
                }
            }
        }));

        info!("agent running");
        token.cancelled().await;
        info!("agent shutting down");

        // Reverse order: pipelines, final dump, then passive services
        self.manager.remove_all().await;
        if let Err(e) = self.store.dump() {
            error!(error = %e, "final checkpoint dump failed");
        }
        for task in service_tasks {
            task.abort();
        }
        coordinator.complete_shutdown();
        Ok(())
    }
}
