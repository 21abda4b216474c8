use cvep_core::{CodeBankError, CodeFamily, MarkerEvent, MarkerKind, TrialOutcome, TrialPhase};
use cvep_experiment::config::CustomKey;
use cvep_experiment::{
    ConfigError, GridLayout, InputSignal, MarkerSink, MemoryRecorder, RecorderError,
    SessionError, SpellerConfig, TickStatus, build_session,
};
use cvep_timing::ManualTimer;
use std::time::Duration;

const FRAME: Duration = Duration::from_nanos(16_666_667);

fn custom_config(codes: &[&str]) -> SpellerConfig {
    let mut config = SpellerConfig::default();
    config.grid.layout = GridLayout::Custom {
        keys: (0..codes.len())
            .map(|i| CustomKey {
                label: format!("K{i}"),
                x: i as i32 * 150,
                y: 0,
            })
            .collect(),
    };
    config.codes.source = CodeFamily::Table {
        codes: codes.iter().map(|s| s.parse().unwrap()).collect(),
    };
    config.timing.frame_rate = Some(60.0);
    config.timing.cue_s = 0.1;
    config.timing.stimulation_s = 0.2;
    config.timing.inter_trial_s = 0.0;
    config.seed = Some(1);
    config
}

/// Fails with `error` once `allowed` markers have gone through.
struct FlakySink {
    inner: MemoryRecorder,
    allowed: usize,
    error: RecorderError,
}

impl MarkerSink for FlakySink {
    fn push(&mut self, event: &MarkerEvent) -> Result<(), RecorderError> {
        if self.allowed == 0 {
            return Err(self.error.clone());
        }
        self.allowed -= 1;
        self.inner.push(event)
    }
}

/// Loses every stimulation onset.
struct LossySink(MemoryRecorder);

impl MarkerSink for LossySink {
    fn push(&mut self, event: &MarkerEvent) -> Result<(), RecorderError> {
        if matches!(event.kind, MarkerKind::StimOnset { .. }) {
            return Err(RecorderError::Dropped("queue full".into()));
        }
        self.0.push(event)
    }
}

#[test]
fn insufficient_codes_fail_before_any_trial() {
    let config = custom_config(&["11110000", "11110001", "11001100", "11110010", "10101010"]);
    let recorder = MemoryRecorder::new();
    let result = build_session(&config, None, ManualTimer::new(), recorder.clone());
    match result {
        Err(SessionError::CodeBank(CodeBankError::InsufficientCodes {
            requested,
            available,
            length,
        })) => {
            assert_eq!((requested, available, length), (5, 3, 8));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("session built with too few codes"),
    }
    assert!(recorder.events().is_empty());
}

#[test]
fn lost_recorder_stops_the_session() {
    let config = custom_config(&["1100", "1010", "0110"]);
    let timer = ManualTimer::new();
    let recorder = MemoryRecorder::new();
    let sink = FlakySink {
        inner: recorder.clone(),
        allowed: 3,
        error: RecorderError::Unavailable("connection reset".into()),
    };
    let mut session = build_session(&config, None, timer.clone(), sink).unwrap();

    // settings, run-start and cue-onset go through.
    timer.advance(FRAME);
    assert_eq!(session.tick(InputSignal::continue_key()).unwrap(), TickStatus::Running);
    let mut result = Ok(TickStatus::Running);
    for _ in 0..20 {
        timer.advance(FRAME);
        result = session.tick(InputSignal::none());
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(
        result,
        Err(SessionError::Recorder(RecorderError::Unavailable(_)))
    ));
    assert_eq!(session.phase(), TrialPhase::Aborted);
    assert_eq!(session.records()[0].outcome, TrialOutcome::Aborted);
    assert_eq!(recorder.events().len(), 3);
    timer.advance(FRAME);
    assert_eq!(session.tick(InputSignal::none()).unwrap(), TickStatus::Aborted);
}

#[test]
fn dropped_markers_do_not_block_the_trial_loop() {
    let config = custom_config(&["1100", "1010", "0110"]);
    let timer = ManualTimer::new();
    let recorder = MemoryRecorder::new();
    let mut session =
        build_session(&config, None, timer.clone(), LossySink(recorder.clone())).unwrap();

    timer.advance(FRAME);
    session.tick(InputSignal::continue_key()).unwrap();
    let mut guard = 0;
    loop {
        timer.advance(FRAME);
        if session.tick(InputSignal::none()).unwrap() != TickStatus::Running {
            break;
        }
        guard += 1;
        assert!(guard < 1_000);
    }
    assert_eq!(session.emitter().dropped(), 3);
    assert_eq!(session.records().len(), 3);
    let offsets = recorder
        .events()
        .iter()
        .filter(|e| matches!(e.kind, MarkerKind::StimOffset { .. }))
        .count();
    assert_eq!(offsets, 3);
}

#[test]
fn abandoned_trial_is_archived_and_the_run_continues() {
    let config = custom_config(&["1100", "1010", "0110"]);
    let timer = ManualTimer::new();
    let recorder = MemoryRecorder::new();
    let mut session = build_session(&config, None, timer.clone(), recorder.clone()).unwrap();

    timer.advance(FRAME);
    session.tick(InputSignal::continue_key()).unwrap();
    for _ in 0..8 {
        timer.advance(FRAME);
        session.tick(InputSignal::none()).unwrap();
    }
    assert_eq!(session.phase(), TrialPhase::Stimulating);
    session.abandon_trial("frame buffer lost").unwrap();

    let mut guard = 0;
    loop {
        timer.advance(FRAME);
        if session.tick(InputSignal::none()).unwrap() != TickStatus::Running {
            break;
        }
        guard += 1;
        assert!(guard < 1_000);
    }
    let outcomes: Vec<TrialOutcome> = session.records().iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            TrialOutcome::Abandoned,
            TrialOutcome::Completed,
            TrialOutcome::Completed
        ]
    );
    let labels = recorder.labels();
    assert!(labels.contains(&"trial-abandoned;trial=1".to_string()));
    assert!(!labels.contains(&"stim-offset;trial=1".to_string()));
    assert_eq!(labels.last().map(String::as_str), Some("run-end;run=1"));
}

#[test]
fn oversized_drift_tolerance_is_a_configuration_error() {
    let mut config = custom_config(&["11110000", "11001100"]);
    config.timing.drift_tolerance_ms = Some(1e300);
    assert!(config.validate().is_ok());
    let result = build_session(&config, None, ManualTimer::new(), MemoryRecorder::new());
    assert!(matches!(
        result,
        Err(SessionError::Configuration(ConfigError::Invalid(_)))
    ));
}
