//! Time base selection and waveform timing

use std::time::Duration;

use multibeam_scan::console::prompt_time_base;
use multibeam_scan::generator::{cycle_schedule, CYCLE_HALF_PERIODS};
use multibeam_scan::phase::WaveformPhase;
use multibeam_scan::TimeBase;

#[test]
fn test_menu_entries() {
    let expected = [0.00001, 0.0001, 0.001, 0.01];
    for (index, secs) in (1u8..=4).zip(expected) {
        assert_eq!(TimeBase::from_menu_index(index).map(|t| t.secs()), Some(secs));
    }
    assert!(TimeBase::from_menu_index(0).is_none());
    assert!(TimeBase::from_menu_index(5).is_none());
}

#[test]
fn test_choice_falls_back_to_default() {
    assert_eq!(TimeBase::from_choice("4").secs(), 0.01);
    assert_eq!(TimeBase::from_choice(" 1 trailing").secs(), 0.00001);

    for line in ["", "0", "5", "01", "+2", "two", "3.0"] {
        assert_eq!(TimeBase::from_choice(line), TimeBase::DEFAULT, "choice {:?}", line);
    }
    assert_eq!(TimeBase::DEFAULT.secs(), 0.0002);
}

#[test]
fn test_cycle_length_for_every_menu_entry() {
    for tb in TimeBase::MENU.into_iter().chain([TimeBase::DEFAULT]) {
        let total: Duration = cycle_schedule().map(|step| step.hold(tb)).sum();
        assert_eq!(total, tb.half_periods(CYCLE_HALF_PERIODS), "Tb {}", tb);
        assert_eq!(total, tb.half_periods(2) * 84, "Tb {}", tb);
    }
}

#[test]
fn test_schedule_holds() {
    let tb = TimeBase::from_menu_index(4).unwrap();
    let holds: Vec<(WaveformPhase, Duration)> = cycle_schedule().take(4).map(|s| (s.phase, s.hold(tb))).collect();

    assert_eq!(
        holds,
        vec![
            (WaveformPhase::ResetActive, Duration::from_millis(30)),
            (WaveformPhase::Idle, Duration::from_millis(10)),
            (WaveformPhase::ClockHigh(0), Duration::from_millis(25)),
            (WaveformPhase::ClockLow(0), Duration::from_millis(25)),
        ]
    );
}

#[test]
fn test_prompt_reads_one_line() {
    let mut input = "3\nstop\n".as_bytes();
    let mut out = Vec::new();

    let tb = prompt_time_base(&mut input, &mut out).unwrap();

    assert_eq!(tb.secs(), 0.001);
    // The rest of the input is left for the console
    assert_eq!(input, b"stop\n");
}
