use std::time::Duration;

use cacheload_runner::scenario::{Scenario, ScenarioExecutor, Stage};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn ramping(start_target: u32, stages: Vec<Stage>, start_offset: Duration) -> Scenario {
    Scenario {
        name: "ramp".to_string(),
        executor: ScenarioExecutor::RampingWorkers { start_target, stages },
        start_offset,
    }
}

#[test]
fn test_ramping_interpolation_from_zero() {
    // Stages [(30s, 50), (60s, 100)] starting at target 0:
    // at 15s the target is halfway from 0 to 50; at 60s it is 30/60 into
    // the second stage, halfway from 50 to 100.
    let scenario = ramping(
        0,
        vec![
            Stage { duration: secs(30), target: 50 },
            Stage { duration: secs(60), target: 100 },
        ],
        Duration::ZERO,
    );

    assert_eq!(scenario.target_at(secs(15)), 25);
    assert_eq!(scenario.target_at(secs(60)), 75);
}

#[test]
fn test_ramping_stage_boundaries() {
    let scenario = ramping(
        0,
        vec![
            Stage { duration: secs(30), target: 50 },
            Stage { duration: secs(60), target: 100 },
        ],
        Duration::ZERO,
    );

    assert_eq!(scenario.target_at(secs(0)), 0);
    assert_eq!(scenario.target_at(secs(30)), 50);
    // At the very end of the last stage the scenario is over.
    assert_eq!(scenario.target_at(secs(90)), 0);
    assert_eq!(scenario.target_at(secs(500)), 0);
}

#[test]
fn test_ramping_starts_from_start_target() {
    let scenario = ramping(
        10,
        vec![Stage { duration: secs(30), target: 50 }],
        Duration::ZERO,
    );

    assert_eq!(scenario.target_at(secs(0)), 10);
    assert_eq!(scenario.target_at(secs(15)), 30);
}

#[test]
fn test_ramping_down() {
    let scenario = ramping(
        0,
        vec![
            Stage { duration: secs(10), target: 100 },
            Stage { duration: secs(10), target: 0 },
        ],
        Duration::ZERO,
    );

    assert_eq!(scenario.target_at(secs(10)), 100);
    assert_eq!(scenario.target_at(secs(15)), 50);
}

#[test]
fn test_start_offset_shifts_the_whole_profile() {
    let scenario = ramping(
        0,
        vec![Stage { duration: secs(30), target: 50 }],
        secs(60),
    );

    // Inactive before its offset.
    assert_eq!(scenario.target_at(secs(0)), 0);
    assert_eq!(scenario.target_at(secs(59)), 0);
    // 15s into its own clock.
    assert_eq!(scenario.target_at(secs(75)), 25);
    assert_eq!(scenario.target_at(secs(90)), 0);
}

#[test]
fn test_zero_duration_stage_jumps_instantly() {
    let scenario = ramping(
        0,
        vec![
            Stage { duration: secs(0), target: 100 },
            Stage { duration: secs(10), target: 100 },
        ],
        Duration::ZERO,
    );

    assert_eq!(scenario.target_at(secs(0)), 100);
    assert_eq!(scenario.target_at(secs(5)), 100);
}

#[test]
fn test_constant_workers_hold_then_drop() {
    let scenario = Scenario {
        name: "steady".to_string(),
        executor: ScenarioExecutor::ConstantWorkers { workers: 300, duration: secs(180) },
        start_offset: secs(300),
    };

    assert_eq!(scenario.target_at(secs(0)), 0);
    assert_eq!(scenario.target_at(secs(300)), 300);
    assert_eq!(scenario.target_at(secs(479)), 300);
    assert_eq!(scenario.target_at(secs(480)), 0);
}

#[test]
fn test_per_worker_iterations_nominal_target() {
    let scenario = Scenario {
        name: "warmup".to_string(),
        executor: ScenarioExecutor::PerWorkerIterations { workers: 5, iterations: 20 },
        start_offset: Duration::ZERO,
    };

    // Iteration-driven scenarios report their nominal worker count; the
    // scheduler spawns that set once and lets workers retire themselves.
    assert_eq!(scenario.target_at(secs(0)), 5);
    assert_eq!(scenario.target_at(secs(1000)), 5);
    assert_eq!(scenario.span(), None);
}

#[test]
fn test_span_sums_stage_durations() {
    let scenario = ramping(
        0,
        vec![
            Stage { duration: secs(30), target: 50 },
            Stage { duration: secs(60), target: 100 },
        ],
        secs(10),
    );
    assert_eq!(scenario.span(), Some(secs(90)));

    let constant = Scenario {
        name: "c".to_string(),
        executor: ScenarioExecutor::ConstantWorkers { workers: 1, duration: secs(42) },
        start_offset: Duration::ZERO,
    };
    assert_eq!(constant.span(), Some(secs(42)));
}
