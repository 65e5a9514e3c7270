use std::time::Duration;

use cacheload_runner::plans::Plan;
use cacheload_runner::scenario::ScenarioExecutor;
use cacheload_runner::workload::SleepPolicy;

#[test]
fn test_plan_names_round_trip() {
    for plan in [Plan::Performance, Plan::Stress, Plan::Spike] {
        assert_eq!(Plan::from_name(plan.as_name()), Some(plan));
    }
    assert_eq!(Plan::from_name("soak"), None);
    assert_eq!(Plan::from_name(""), None);
    // Names are exact, not case-folded.
    assert_eq!(Plan::from_name("Performance"), None);
}

#[test]
fn test_every_plan_builds_and_validates() {
    for plan in [Plan::Performance, Plan::Stress, Plan::Spike] {
        let config = plan
            .build("http://localhost:8080")
            .unwrap_or_else(|e| panic!("plan {} failed to build: {e}", plan.as_name()));
        config
            .validate()
            .unwrap_or_else(|e| panic!("plan {} failed validation: {e}", plan.as_name()));
        assert_eq!(config.base_url, "http://localhost:8080");
        assert!(!config.scenarios.is_empty());
    }
}

#[test]
fn test_performance_plan_structure() {
    let config = Plan::Performance.build("http://x").unwrap();

    let names: Vec<&str> = config.scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["warmup", "ramp_up", "stress", "spike"]);

    assert!(matches!(
        config.scenarios[0].executor,
        ScenarioExecutor::PerWorkerIterations { workers: 5, iterations: 20 }
    ));
    // Ramp peaks at 200 workers two and a half minutes after its offset.
    assert_eq!(
        config.scenarios[1].target_at(Duration::from_secs(30 + 210)),
        200
    );
    assert!(matches!(
        config.scenarios[2].executor,
        ScenarioExecutor::ConstantWorkers { workers: 300, .. }
    ));
    assert_eq!(config.scenarios[3].start_offset, Duration::from_secs(510));

    assert_eq!(config.workload.mix_for("default").patterns().len(), 4);
    assert_eq!(config.thresholds.len(), 5);
}

#[test]
fn test_stress_plan_reaches_two_thousand_workers() {
    let config = Plan::Stress.build("http://x").unwrap();

    assert_eq!(config.scenarios.len(), 1);
    // Peak at the end of the fourth stage: 2 + 5 + 5 + 3 minutes in.
    assert_eq!(
        config.scenarios[0].target_at(Duration::from_secs(15 * 60)),
        2000
    );
    // Ramps all the way back to zero.
    assert_eq!(
        config.scenarios[0].target_at(Duration::from_secs(18 * 60)),
        0
    );
}

#[test]
fn test_spike_plan_phase_behaviour() {
    let config = Plan::Spike.build("http://x").unwrap();

    assert_eq!(config.phases.resolve(Duration::from_secs(30)), "normal");
    assert_eq!(config.phases.resolve(Duration::from_secs(90)), "spike");
    assert_eq!(config.phases.resolve(Duration::from_secs(300)), "recovery");

    // The spike phase hammers a tiny hot set and tolerates non-5xx answers.
    let spike_mix = config.workload.mix_for("spike");
    assert!(spike_mix
        .patterns()
        .iter()
        .all(|p| p.accepted.contains(404) && !p.accepted.contains(500)));
    assert!(spike_mix.patterns().iter().all(|p| p.key_limit <= Some(5)));

    // Normal traffic only accepts 200.
    let normal_mix = config.workload.mix_for("normal");
    assert!(normal_mix.patterns().iter().all(|p| !p.accepted.contains(404)));

    assert!(matches!(config.sleep, SleepPolicy::ByPhase { .. }));
}
