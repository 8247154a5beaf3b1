use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use voxel_chunk_tasks::{
    config::TaskManagerConfig,
    engine_state::{
        task_management::diagnostics::{RecordingDiagnostics, Severity},
        voxels::{
            chunk_pos,
            generator::{GeneratorSettings, PerlinChunkGenerator},
        },
        EngineState,
    },
};

fn engine(settings: GeneratorSettings, diagnostics: &RecordingDiagnostics) -> EngineState<PerlinChunkGenerator> {
    EngineState::new(
        TaskManagerConfig::default().with_worker_count(2),
        PerlinChunkGenerator::new(settings),
        Arc::new(diagnostics.clone()),
    )
}

fn tick_until_idle(engine: &mut EngineState<PerlinChunkGenerator>) -> usize {
    let deadline = Instant::now() + Duration::from_secs(20);
    let mut resolved = 0;
    while !engine.is_idle() && Instant::now() < deadline {
        resolved += engine.tick().total();
        thread::sleep(Duration::from_millis(2));
    }
    resolved
}

#[test]
fn requested_area_ends_up_in_the_world_and_forced() {
    let diagnostics = RecordingDiagnostics::new();
    let mut engine = engine(GeneratorSettings::default(), &diagnostics);
    engine.start().unwrap();

    assert_eq!(engine.request_area(chunk_pos(0, 0), 1), 9);
    assert_eq!(tick_until_idle(&mut engine), 9);

    {
        let world = engine.world().get();
        assert_eq!(world.chunk_count(), 9);
        assert_eq!(world.forced_count(), 9);
        for x in -1..=1 {
            for z in -1..=1 {
                let chunk = world.get_chunk_at(chunk_pos(x, z)).unwrap();
                assert!(chunk.is_complete());
                assert!(world.is_forced(chunk_pos(x, z)));
            }
        }
    }

    let report = engine.stop().unwrap();
    assert_eq!(report.joined, 2);
    assert_eq!(report.timed_out, 0);
}

#[test]
fn chunks_are_not_requested_twice() {
    let diagnostics = RecordingDiagnostics::new();
    let mut engine = engine(GeneratorSettings::default(), &diagnostics);
    engine.start().unwrap();

    assert!(engine.request_chunk(chunk_pos(3, 3)));
    assert!(!engine.request_chunk(chunk_pos(3, 3)));
    tick_until_idle(&mut engine);
    assert!(!engine.request_chunk(chunk_pos(3, 3)));
    assert_eq!(engine.world().get().chunk_count(), 1);

    engine.stop();
}

#[test]
fn chunks_outside_the_border_fail_and_are_forgotten() {
    let diagnostics = RecordingDiagnostics::new();
    let settings = GeneratorSettings {
        world_border: 1,
        ..GeneratorSettings::default()
    };
    let mut engine = engine(settings, &diagnostics);
    engine.start().unwrap();

    assert!(engine.request_chunk(chunk_pos(5, 0)));
    assert!(engine.request_chunk(chunk_pos(0, 0)));
    assert_eq!(tick_until_idle(&mut engine), 2);

    assert!(engine.is_idle());
    assert_eq!(engine.world().get().chunk_count(), 1);
    assert!(engine.world().get().contains(chunk_pos(0, 0)));
    assert_eq!(diagnostics.count(Severity::Error, "outside the world border"), 1);

    engine.stop();
}

#[test]
fn requests_before_start_are_dropped() {
    let diagnostics = RecordingDiagnostics::new();
    let mut engine = engine(GeneratorSettings::default(), &diagnostics);

    assert!(!engine.request_chunk(chunk_pos(0, 0)));
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(diagnostics.count(Severity::Warn, "Dropped task"), 1);
    assert!(engine.stop().is_none());
}

#[test]
fn stopping_forgets_pending_requests() {
    let diagnostics = RecordingDiagnostics::new();
    let mut engine = engine(GeneratorSettings::default(), &diagnostics);
    engine.start().unwrap();

    engine.request_area(chunk_pos(0, 0), 3);
    engine.stop().unwrap();

    assert!(engine.is_idle());
    assert_eq!(engine.tick().total(), 0);
    assert!(!engine.task_manager().is_active());
}

#[test]
fn areas_at_the_coordinate_limit_are_requested_without_panicking() {
    let diagnostics = RecordingDiagnostics::new();
    let mut engine = engine(GeneratorSettings::default(), &diagnostics);
    engine.start().unwrap();

    assert_eq!(engine.request_area(chunk_pos(i32::MAX, 0), 1), 6);
    assert_eq!(engine.request_area(chunk_pos(i32::MIN, i32::MIN), 1), 4);
    assert_eq!(tick_until_idle(&mut engine), 10);

    assert_eq!(engine.world().get().chunk_count(), 0);
    assert_eq!(diagnostics.count(Severity::Error, "outside the world border"), 10);
    assert_eq!(diagnostics.count(Severity::Error, "panicked"), 0);

    engine.stop();
}
