//! Acquisition lifecycle tests against the simulated detector.
//!
//! Time base 1 ms: one scan cycle takes 84 ms.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use multibeam_scan::engine::{EngineState, ScanEngine};
use multibeam_scan::hal::bus::Direction;
use multibeam_scan::hal::sim::{SimulatedBus, INJECTED_WRITE_STATUS};
use multibeam_scan::sample::{BusSample, ControlLines};
use multibeam_scan::{FaultCode, ScanConfig, ScanError, TimeBase, CHANNEL_COUNT};

const DEADLINE: Duration = Duration::from_secs(10);

fn config() -> ScanConfig {
    ScanConfig::new("Dev1", TimeBase::from_menu_index(3).unwrap())
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_output_refused_releases_input() {
    let bus = Arc::new(SimulatedBus::new());
    bus.refuse_acquire(Direction::Output);
    let mut engine = ScanEngine::new(Arc::clone(&bus), config());

    let err = engine.start().unwrap_err();

    assert!(matches!(
        err,
        ScanError::Init {
            direction: Direction::Output,
            ..
        }
    ));
    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(bus.active_tasks(), 0);
    assert!(engine.take_logs().is_none());
    assert_ne!(err.exit_code(), 0);
}

#[test]
fn test_input_refused_acquires_nothing() {
    let bus = Arc::new(SimulatedBus::new());
    bus.refuse_acquire(Direction::Input);
    bus.record_writes();
    let mut engine = ScanEngine::new(Arc::clone(&bus), config());

    assert!(matches!(
        engine.start(),
        Err(ScanError::Init {
            direction: Direction::Input,
            ..
        })
    ));
    assert_eq!(bus.active_tasks(), 0);
    assert!(bus.writes().is_empty());
}

#[test]
fn test_read_failures_on_one_tube_do_not_stop_the_scan() {
    let bus = Arc::new(SimulatedBus::new());
    for ch in 0..CHANNEL_COUNT {
        bus.set_tube(ch, BusSample::position(ch as u8 % 15 + 1));
    }
    bus.fail_reads(7, u32::MAX);

    let mut engine = ScanEngine::new(Arc::clone(&bus), config());
    engine.start().unwrap();
    assert_eq!(engine.state(), EngineState::Running);
    let shared = engine.shared();

    let updated = wait_until(|| {
        let snapshot = shared.table.snapshot();
        snapshot
            .iter()
            .filter(|r| r.index != 7)
            .all(|r| r.position == r.index as u8 % 15 + 1)
            && shared.fault.snapshot().read_timeouts >= 2
    });
    engine.stop().unwrap();

    assert!(updated, "other tubes were not decoded in time");
    assert_eq!(shared.table.get(7).position, 0);
    assert!(!shared.fault.is_active());
    assert_eq!(shared.fault.snapshot().last_channel, Some(7));
    assert_eq!(bus.active_tasks(), 0);
}

#[test]
fn test_stop_completes_pulse_and_releases_lines() {
    let bus = Arc::new(SimulatedBus::new());
    bus.record_writes();
    let mut engine = ScanEngine::new(Arc::clone(&bus), config());

    engine.start().unwrap();
    thread::sleep(Duration::from_millis(37));
    engine.stop().unwrap();

    let writes = bus.writes();
    assert!(!writes.is_empty());
    assert!(writes.last().unwrap().lines.is_released());
    assert_eq!(bus.lines(), ControlLines::RELEASED);

    // Every asserted line is followed by a release
    for pair in writes.windows(2) {
        if !pair[0].lines.is_released() {
            assert!(pair[1].lines.is_released(), "{:?}", pair);
        }
    }
    assert!(!(writes[0].lines.reset && writes[0].lines.clock));
    assert_eq!(writes[0].lines, ControlLines::RESET);

    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(engine.is_halted());
    assert_eq!(bus.active_tasks(), 0);
}

#[test]
fn test_first_cycle_write_sequence() {
    let bus = Arc::new(SimulatedBus::new());
    bus.record_writes();
    let mut engine = ScanEngine::new(Arc::clone(&bus), config());

    engine.start().unwrap();
    assert!(wait_until(|| bus.cycle() >= 2));
    engine.stop().unwrap();

    let tb = config().time_base;
    let writes = bus.writes();
    assert_eq!(writes[0].lines, ControlLines::RESET);
    assert_eq!(writes[0].hold, tb.half_periods(6));
    assert_eq!(writes[1].lines, ControlLines::RELEASED);
    assert_eq!(writes[1].hold, tb.half_periods(2));
    for ch in 0..CHANNEL_COUNT {
        assert_eq!(writes[2 + 2 * ch].lines, ControlLines::CLOCK);
        assert_eq!(writes[2 + 2 * ch].hold, tb.half_periods(5));
        assert_eq!(writes[3 + 2 * ch].lines, ControlLines::RELEASED);
    }
    assert_eq!(writes[2 + 2 * CHANNEL_COUNT].lines, ControlLines::RESET);
}

#[test]
fn test_write_failure_is_fatal() {
    let bus = Arc::new(SimulatedBus::new());
    bus.record_writes();
    bus.fail_write_after(5);
    let mut engine = ScanEngine::new(Arc::clone(&bus), config());

    engine.start().unwrap();
    let shared = engine.shared();
    assert!(shared.phase.wait_halted(DEADLINE));

    let err = engine.stop().unwrap_err();
    assert!(matches!(err, ScanError::Write { .. }));
    assert_eq!(err.exit_code(), INJECTED_WRITE_STATUS);

    let fault = shared.fault.snapshot();
    assert!(fault.active);
    assert_eq!(fault.code, FaultCode::WriteFailed);
    assert_eq!(fault.status, INJECTED_WRITE_STATUS);

    // Five good writes, then the release after the failure
    let writes = bus.writes();
    assert_eq!(writes.len(), 6);
    assert_eq!(bus.lines(), ControlLines::RELEASED);
    assert_eq!(bus.active_tasks(), 0);
}

#[test]
fn test_restart() {
    let bus = Arc::new(SimulatedBus::new());
    bus.set_tube(3, BusSample::position(6));
    let mut engine = ScanEngine::new(Arc::clone(&bus), config());

    engine.start().unwrap();
    assert!(matches!(engine.start(), Err(ScanError::AlreadyRunning)));
    engine.stop().unwrap();
    engine.stop().unwrap();
    assert_eq!(bus.active_tasks(), 0);

    engine.start().unwrap();
    assert!(engine.take_logs().is_some());
    let shared = engine.shared();
    assert!(wait_until(|| shared.table.get(3).position == 6));
    engine.stop().unwrap();
    assert_eq!(bus.active_tasks(), 0);
}

#[test]
fn test_drop_stops_acquisition() {
    let bus = Arc::new(SimulatedBus::new());
    {
        let mut engine = ScanEngine::new(Arc::clone(&bus), config());
        engine.start().unwrap();
        assert_eq!(bus.active_tasks(), 2);
    }
    assert_eq!(bus.active_tasks(), 0);
    assert!(bus.lines().is_released());
}
