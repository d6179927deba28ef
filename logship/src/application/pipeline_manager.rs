// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Manager
//!
//! Installs validated configurations as running pipelines and tears them
//! down in the documented order: stop the owning pump (readers), let the
//! processor chain drain (the pump's final flush), drain the sender
//! queues of the pipeline's keys, dump the final checkpoint, destroy.
//!
//! The installed set is replaced by atomic pointer swap (`arc-swap`);
//! readers of the snapshot never block an install. An invalid new
//! configuration is refused per pipeline and the previous one keeps
//! running. In-flight sender items hold `Arc` references to their old
//! flushers, so a reload never invalidates an ongoing send.

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use logship_bootstrap::shutdown::CancellationToken;
use logship_domain::entities::InputConfig;
use logship_domain::services::Collector;
use logship_domain::{AgentError, PipelineConfig};

use crate::application::pump::{FilePump, PumpMsg};
use crate::application::RuntimePipeline;
use crate::infrastructure::alarms::AlarmSink;
use crate::infrastructure::checkpoint::CheckpointStore;
use crate::infrastructure::collectors::{
    discover_pull_targets, CommandCollector, HttpScrapeCollector, InternalMetricsCollector,
    OperatorEnv,
};
use crate::infrastructure::discovery::{ContainerRegistry, Discovery, DiscoveryEvent, PathMatcher};
use crate::infrastructure::metrics::{MetricsService, WriteMetrics};
use crate::infrastructure::processors::ProcessorContext;
use crate::infrastructure::scheduler::{ScheduledJob, Scheduler, TaskSpec};
use crate::infrastructure::sender::{ConcurrencyLimiter, LimiterConfig, SinkDriver, SinkDriverConfig};
use crate::infrastructure::watch::FsEventListener;

/// Host facts threaded into processor contexts.
#[derive(Debug, Clone)]
pub struct HostFacts {
    pub hostname: String,
    pub host_ip: Option<String>,
}

struct PipelineHandles {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    task_names: Vec<String>,
    pump_tx: Option<mpsc::Sender<PumpMsg>>,
}

/// Owns the installed pipeline set and its lifecycles.
pub struct PipelineManager {
    store: Arc<CheckpointStore>,
    alarms: Arc<AlarmSink>,
    metrics: Arc<MetricsService>,
    write_metrics: Arc<WriteMetrics>,
    scheduler: Arc<Scheduler>,
    listener: Arc<FsEventListener>,
    discovery: Arc<Mutex<Discovery>>,
    containers: Arc<RwLock<ContainerRegistry>>,
    host: HostFacts,
    snapshot: ArcSwap<HashMap<String, Arc<RuntimePipeline>>>,
    running: Mutex<HashMap<String, PipelineHandles>>,
}

impl PipelineManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<CheckpointStore>,
        alarms: Arc<AlarmSink>,
        metrics: Arc<MetricsService>,
        write_metrics: Arc<WriteMetrics>,
        scheduler: Arc<Scheduler>,
        listener: Arc<FsEventListener>,
        discovery: Arc<Mutex<Discovery>>,
        containers: Arc<RwLock<ContainerRegistry>>,
        host: HostFacts,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            alarms,
            metrics,
            write_metrics,
            scheduler,
            listener,
            discovery,
            containers,
            host,
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            running: Mutex::new(HashMap::new()),
        })
    }

    /// The current installed set (atomic snapshot).
    pub fn pipelines(&self) -> Arc<HashMap<String, Arc<RuntimePipeline>>> {
        self.snapshot.load_full()
    }

    /// The shared discovery registry (the watch router feeds it).
    pub fn discovery(&self) -> &Arc<Mutex<Discovery>> {
        &self.discovery
    }

    /// Routes one discovery event to the owning pipeline's pump.
    pub async fn route_discovery(&self, event: DiscoveryEvent) {
        match &event {
            DiscoveryEvent::WatchDir(dir) => {
                if let Err(e) = self.listener.add_watch(dir) {
                    warn!(dir = %dir.display(), error = %e, "failed to watch directory");
                }
            }
            DiscoveryEvent::FileAppeared { pipeline, .. }
            | DiscoveryEvent::FileModified { pipeline, .. }
            | DiscoveryEvent::FileRemoved { pipeline, .. } => {
                let tx = self
                    .running
                    .lock()
                    .get(pipeline)
                    .and_then(|handles| handles.pump_tx.clone());
                if let Some(tx) = tx {
                    let _ = tx.send(PumpMsg::Discovery(event)).await;
                }
            }
        }
    }

    /// Installs every config; failures refuse that pipeline only.
    pub async fn install_all(self: &Arc<Self>, configs: Vec<PipelineConfig>) {
        for config in configs {
            let name = config.name.clone();
            if let Err(e) = self.install(config).await {
                warn!(pipeline = %name, error = %e, "refusing pipeline install");
            }
        }
    }

    /// Installs (or replaces) one pipeline.
    pub async fn install(self: &Arc<Self>, config: PipelineConfig) -> Result<(), AgentError> {
        let name = config.name.clone();
        if self.running.lock().contains_key(&name) {
            // Hot reload: tear the old instance down first; in-flight
            // items keep their flusher references alive.
            self.remove(&name).await;
        }

        let ctx = Arc::new(ProcessorContext {
            pipeline: name.clone(),
            alarms: Arc::clone(&self.alarms),
            tag_scheme: config.global.tag_scheme,
            enable_timestamp_nanosecond: config.global.enable_timestamp_nanosecond,
            hostname: self.host.hostname.clone(),
            host_ip: self.host.host_ip.clone(),
            user_defined_id: config.global.user_defined_id.clone(),
        });
        let pipeline = RuntimePipeline::build(config, ctx, &self.write_metrics)?;

        let token = CancellationToken::new();
        let mut tasks = Vec::new();
        let mut task_names = Vec::new();
        let mut pump_tx = None;

        // Sink drivers, one per flusher
        for (index, queue) in pipeline.queues.iter().enumerate() {
            let max_concurrency = match &pipeline.config.flushers[index] {
                logship_domain::entities::FlusherConfig::Http(http) => http.max_concurrency,
                logship_domain::entities::FlusherConfig::File(_) => 1,
            };
            let limiter = Arc::new(ConcurrencyLimiter::new(LimiterConfig {
                max_allowed: max_concurrency.max(1),
                ..Default::default()
            }));
            let max_try_count = match &pipeline.config.flushers[index] {
                logship_domain::entities::FlusherConfig::Http(http) => http.max_retries,
                logship_domain::entities::FlusherConfig::File(_) => 3,
            };
            let driver = SinkDriver::new(
                format!("{name}#{index}"),
                SinkDriverConfig {
                    max_try_count,
                    ..Default::default()
                },
                Arc::clone(queue),
                limiter,
                Arc::clone(&self.store),
                Arc::clone(&self.metrics),
                Arc::clone(&self.alarms),
            );
            tasks.push(tokio::spawn(driver.run(token.clone())));
        }

        // Inputs
        for input in pipeline.config.inputs.clone() {
            match input {
                InputConfig::File(file_config) => {
                    let matcher = Arc::new(PathMatcher::from_config(&file_config, None)?);
                    self.discovery.lock().register_pipeline(
                        &name,
                        Arc::clone(&matcher),
                        file_config.allow_multi_config,
                    );
                    if file_config.enable_container_discovery {
                        let containers = self.containers.read();
                        for info in containers.containers() {
                            if let Ok(rebased) =
                                PathMatcher::from_config(&file_config, Some(&info.path))
                            {
                                self.discovery.lock().register_pipeline(
                                    &name,
                                    Arc::new(rebased),
                                    true,
                                );
                            }
                        }
                    }

                    let (tx, rx) = FilePump::channel(64);
                    let tick_interval = Duration::from_millis(file_config.tick_interval_ms.max(100));
                    let pump = FilePump::new(
                        Arc::clone(&pipeline),
                        file_config,
                        Arc::clone(&self.store),
                        Arc::clone(&self.alarms),
                        Arc::clone(&self.metrics),
                        Arc::clone(&self.containers),
                    );
                    let task_name = format!("file-tick:{name}");
                    self.scheduler
                        .add_task(TaskSpec::new(&task_name, tick_interval), FilePump::tick_job(tx.clone()));
                    task_names.push(task_name);
                    tasks.push(tokio::spawn(pump.run(rx, token.clone())));
                    pump_tx = Some(tx);
                }
                InputConfig::HttpScrape(scrape) => {
                    let collector = Arc::new(HttpScrapeCollector::new(scrape)?);
                    // Under an operator, the static target list is replaced
                    // by pull-target discovery on the scrape cadence.
                    if let Some(env) = OperatorEnv::from_env() {
                        let sd_name = format!("sd:{}:{}", name, collector.job());
                        let refresh = collector.interval();
                        self.scheduler.add_task(
                            TaskSpec::new(&sd_name, refresh),
                            Arc::new(SdRefreshJob {
                                env,
                                collector: Arc::clone(&collector),
                                refresh,
                            }),
                        );
                        task_names.push(sd_name);
                    }
                    self.schedule_collector(&pipeline, collector, &mut task_names);
                }
                InputConfig::Command(command) => {
                    let collector = Arc::new(CommandCollector::new(command));
                    self.schedule_collector(&pipeline, collector, &mut task_names);
                }
                InputConfig::InternalMetrics(internal) => {
                    let collector = Arc::new(InternalMetricsCollector::new(
                        internal,
                        Arc::clone(&self.write_metrics),
                    ));
                    self.schedule_collector(&pipeline, collector, &mut task_names);
                }
            }
        }

        // Publish the new snapshot (atomic pointer swap)
        self.snapshot.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), Arc::clone(&pipeline));
            next
        });
        self.running.lock().insert(
            name.clone(),
            PipelineHandles {
                token,
                tasks,
                task_names,
                pump_tx,
            },
        );
        self.metrics.active_pipelines.inc();

        // Seed the pump with everything already on disk
        let seed: Vec<DiscoveryEvent> = self.discovery.lock().initial_scan();
        for event in seed {
            self.route_discovery(event).await;
        }
        info!(pipeline = %name, "pipeline installed");
        Ok(())
    }

    fn schedule_collector(
        &self,
        pipeline: &Arc<RuntimePipeline>,
        collector: Arc<dyn Collector>,
        task_names: &mut Vec<String>,
    ) {
        let task_name = format!("collector:{}:{}", pipeline.name(), collector.name());
        let interval = collector.interval();
        let job = Arc::new(CollectorJob {
            pipeline: Arc::clone(pipeline),
            collector,
        });
        self.scheduler.add_task(TaskSpec::new(&task_name, interval), job);
        task_names.push(task_name);
    }

    /// Tears one pipeline down in order; waits for queue drain up to the
    /// grace budget.
    pub async fn remove(&self, name: &str) {
        let Some(handles) = self.running.lock().remove(name) else {
            return;
        };

        // (a) stop the owning reader/pump and collector ticks
        for task_name in &handles.task_names {
            self.scheduler.remove_task(task_name);
        }
        handles.token.cancel();
        self.discovery.lock().unregister_pipeline(name);

        // (b)+(c) pump drains on cancel; wait for sink queues to empty
        let pipeline = self.snapshot.load().get(name).cloned();
        if let Some(pipeline) = &pipeline {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            loop {
                let remaining: usize = pipeline.queues.iter().map(|q| q.len()).sum();
                if remaining == 0 || tokio::time::Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            for queue in &pipeline.queues {
                let dropped = queue.drain_pipeline(name);
                if dropped > 0 {
                    warn!(pipeline = name, dropped, "dropped undelivered items at teardown");
                }
            }
            pipeline.metrics().mark_deleted();
        }

        for task in handles.tasks {
            task.abort();
        }

        // (d) final checkpoint dump
        if let Err(e) = self.store.dump_job(name) {
            warn!(pipeline = name, error = %e, "final checkpoint dump failed");
        }

        // (e) destroy
        self.snapshot.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(name);
            next
        });
        self.metrics.active_pipelines.dec();
        info!(pipeline = name, "pipeline removed");
    }

    /// Removes every pipeline (shutdown path).
    pub async fn remove_all(&self) {
        let names: Vec<String> = self.running.lock().keys().cloned().collect();
        for name in names {
            self.remove(&name).await;
        }
    }
}

/// Scheduler job refreshing a scrape collector's targets from the
/// operator's pull-target endpoint.
struct SdRefreshJob {
    env: OperatorEnv,
    collector: Arc<HttpScrapeCollector>,
    refresh: Duration,
}

#[async_trait::async_trait]
impl ScheduledJob for SdRefreshJob {
    async fn run(&self, _cancel: &CancellationToken) -> Result<(), AgentError> {
        let targets = discover_pull_targets(&self.env, self.collector.job(), self.refresh).await?;
        self.collector.set_targets(targets);
        Ok(())
    }
}

/// Scheduler job wrapping one collector tick.
struct CollectorJob {
    pipeline: Arc<RuntimePipeline>,
    collector: Arc<dyn Collector>,
}

#[async_trait::async_trait]
impl ScheduledJob for CollectorJob {
    async fn run(&self, cancel: &CancellationToken) -> Result<(), AgentError> {
        let groups = self.collector.collect().await?;
        for mut group in groups {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled("collector tick".into()));
            }
            self.pipeline.process_group(&mut group);
            self.pipeline.dispatch(&group, &[]).await;
        }
        Ok(())
    }
}
