// src/scheduler.rs
//
// Drives the pipeline: an interval ticker and the manual-trigger surface are
// two producers feeding one worker through a capacity-1 channel, so at most
// one cycle ever runs and ticks landing mid-cycle are simply dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pipeline::{CycleReport, CycleTrigger, Pipeline};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerCfg {
    pub check_interval: Duration,
    pub warmup_delay: Duration,
}

pub struct CycleRequest {
    trigger: CycleTrigger,
    reply: Option<oneshot::Sender<CycleReport>>,
}

/// Cloneable handle for queueing manual cycles (the API holds one).
#[derive(Clone)]
pub struct SchedulerClient {
    trigger_tx: mpsc::Sender<CycleRequest>,
}

impl SchedulerClient {
    /// Queue a manual cycle and wait for its report. `None` when a cycle is
    /// already running or queued, or the scheduler is shutting down.
    pub async fn trigger_manual(&self) -> Option<CycleReport> {
        let (tx, rx) = oneshot::channel();
        let req = CycleRequest {
            trigger: CycleTrigger::Manual,
            reply: Some(tx),
        };
        match self.trigger_tx.try_send(req) {
            Ok(()) => rx.await.ok(),
            Err(_) => None,
        }
    }
}

pub struct SchedulerHandle {
    client: SchedulerClient,
    shutdown_tx: watch::Sender<bool>,
    ticker: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn client(&self) -> SchedulerClient {
        self.client.clone()
    }

    /// Graceful stop: the in-flight fetch is bounded by its timeout, the
    /// remaining sources of the current cycle are abandoned, and both tasks
    /// are awaited. State was already persisted per cycle.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.ticker.await;
        let _ = self.worker.await;
    }
}

/// Spawn the ticker and the pipeline worker. The first cycle fires after
/// `warmup_delay` so the notification transports have a moment to come up,
/// then every `check_interval`.
pub fn spawn(pipeline: Arc<Pipeline>, cfg: SchedulerCfg) -> SchedulerHandle {
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<CycleRequest>(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let tick_tx = trigger_tx.clone();
    let mut tick_shutdown = shutdown_rx.clone();
    let ticker = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + cfg.warmup_delay;
        let mut interval = tokio::time::interval_at(start, cfg.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let req = CycleRequest {
                        trigger: CycleTrigger::Tick,
                        reply: None,
                    };
                    if tick_tx.try_send(req).is_err() {
                        tracing::debug!("cycle in progress, tick dropped");
                    }
                }
                _ = tick_shutdown.changed() => break,
            }
        }
    });

    let mut worker_shutdown = shutdown_rx;
    let worker = tokio::spawn(async move {
        loop {
            let req = tokio::select! {
                req = trigger_rx.recv() => req,
                _ = worker_shutdown.changed() => break,
            };
            let Some(req) = req else { break };
            if *worker_shutdown.borrow() {
                break;
            }
            let report = pipeline.run_cycle(req.trigger, &worker_shutdown).await;
            if let Some(reply) = req.reply {
                let _ = reply.send(report);
            }
        }
        tracing::info!("scheduler stopped");
    });

    SchedulerHandle {
        client: SchedulerClient { trigger_tx },
        shutdown_tx,
        ticker,
        worker,
    }
}
