use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::task::JoinHandle;

use crate::scenario::{Scenario, ScenarioExecutor};
use crate::worker::{worker_loop, WorkerContext};

/// Reconciliation interval. Finer than the shortest spike stage (10 s) by a
/// wide margin so ramps stay smooth; the tick never blocks on I/O.
const TICK: Duration = Duration::from_millis(250);

struct WorkerHandle {
    retire: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// The live worker set of one scenario. Owned exclusively by the scheduler;
/// workers only read their own retire flag and report completion by exiting.
struct ScenarioPool {
    scenario: Scenario,
    handles: Vec<WorkerHandle>,
    spawned_once: bool,
    next_worker_id: u64,
}

impl ScenarioPool {
    fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            handles: Vec::new(),
            spawned_once: false,
            next_worker_id: 0,
        }
    }

    /// Bring the live worker count in line with the scenario's target for
    /// `elapsed`: spawn when under, mark the most recently spawned workers
    /// for graceful retirement when over.
    fn reconcile(&mut self, ctx: &Arc<WorkerContext>, elapsed: Duration) {
        self.handles.retain(|h| !h.join.is_finished());

        if let ScenarioExecutor::PerWorkerIterations { workers, iterations } =
            self.scenario.executor
        {
            if !self.spawned_once && elapsed >= self.scenario.start_offset {
                info!(
                    "scenario {}: spawning {workers} workers x {iterations} iterations",
                    self.scenario.name
                );
                for _ in 0..workers {
                    self.spawn(ctx, Some(iterations));
                }
                self.spawned_once = true;
            }
            return;
        }

        let target = self.scenario.target_at(elapsed) as usize;
        let live: Vec<usize> = self
            .handles
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.retire.load(Ordering::Relaxed))
            .map(|(i, _)| i)
            .collect();

        if live.len() < target {
            let deficit = target - live.len();
            debug!(
                "scenario {}: target {target}, live {}, spawning {deficit}",
                self.scenario.name,
                live.len()
            );
            for _ in 0..deficit {
                self.spawn(ctx, None);
            }
        } else if live.len() > target {
            let surplus = live.len() - target;
            debug!(
                "scenario {}: target {target}, live {}, retiring {surplus}",
                self.scenario.name,
                live.len()
            );
            for idx in live.into_iter().rev().take(surplus) {
                self.handles[idx].retire.store(true, Ordering::Relaxed);
            }
        }
    }

    fn spawn(&mut self, ctx: &Arc<WorkerContext>, iteration_budget: Option<u32>) {
        let retire = Arc::new(AtomicBool::new(false));
        let join = tokio::spawn(worker_loop(
            Arc::clone(ctx),
            self.scenario.name.clone(),
            self.next_worker_id,
            Arc::clone(&retire),
            iteration_budget,
        ));
        self.next_worker_id += 1;
        self.handles.push(WorkerHandle { retire, join });
    }

    /// `true` once the scenario can never contribute concurrency again and
    /// all of its workers have drained.
    fn is_done(&self, elapsed: Duration) -> bool {
        if !self.handles.is_empty() {
            return false;
        }
        match self.scenario.span() {
            // Iteration-driven: done once the one-time spawn has happened.
            None => self.spawned_once,
            Some(span) => elapsed >= self.scenario.start_offset + span,
        }
    }

    /// Mark every worker for retirement and wait for all of them to exit.
    async fn shutdown(&mut self) {
        for handle in &self.handles {
            handle.retire.store(true, Ordering::Relaxed);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join.await;
        }
    }
}

/// Drive every scenario to completion (or cancellation): tick, reconcile
/// each pool against its own offset-shifted clock, and finally drain all
/// remaining workers. In-flight requests are never aborted; on cancellation
/// workers stop at their next iteration boundary.
pub async fn run_scenarios(ctx: Arc<WorkerContext>) {
    let mut pools: Vec<ScenarioPool> = ctx
        .config
        .scenarios
        .iter()
        .cloned()
        .map(ScenarioPool::new)
        .collect();

    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;
        if ctx.cancel.load(Ordering::Relaxed) {
            info!("cancellation requested, draining workers");
            break;
        }

        let elapsed = ctx.clock.elapsed();
        let mut all_done = true;
        for pool in &mut pools {
            pool.reconcile(&ctx, elapsed);
            if !pool.is_done(elapsed) {
                all_done = false;
            }
        }
        if all_done {
            break;
        }
    }

    for pool in &mut pools {
        pool.shutdown().await;
    }
}
