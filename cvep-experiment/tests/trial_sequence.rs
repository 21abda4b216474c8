use cvep_core::{
    CodeFamily, MarkerEvent, MarkerKind, StatusMessage, TrialOutcome, TrialPhase,
};
use cvep_experiment::config::CustomKey;
use cvep_experiment::{
    GridLayout, InputSignal, MemoryRecorder, Session, SpellerConfig, TickStatus, build_session,
};
use cvep_timing::ManualTimer;
use std::time::Duration;

const FRAME: Duration = Duration::from_nanos(16_666_667);

fn four_key_config(seed: u64) -> SpellerConfig {
    let mut config = SpellerConfig::default();
    config.grid.layout = GridLayout::Custom {
        keys: ["A", "B", "C", "D"]
            .iter()
            .enumerate()
            .map(|(i, label)| CustomKey {
                label: label.to_string(),
                x: i as i32 * 200,
                y: 0,
            })
            .collect(),
    };
    config.codes.source = CodeFamily::Table {
        codes: ["11110000", "11001100", "10101010", "10010110"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect(),
    };
    config.timing.frame_rate = Some(60.0);
    config.timing.cue_s = 1.0;
    config.timing.stimulation_s = 2.0;
    config.seed = Some(seed);
    config
}

type TestSession = Session<ManualTimer, MemoryRecorder>;

fn start(config: &SpellerConfig) -> (TestSession, ManualTimer, MemoryRecorder) {
    let timer = ManualTimer::new();
    let recorder = MemoryRecorder::new();
    let session = build_session(config, None, timer.clone(), recorder.clone()).unwrap();
    (session, timer, recorder)
}

fn tick(session: &mut TestSession, timer: &ManualTimer, input: InputSignal) -> TickStatus {
    timer.advance(FRAME);
    session.tick(input).unwrap()
}

fn run_until_paused(session: &mut TestSession, timer: &ManualTimer) {
    let mut guard = 0;
    while tick(session, timer, InputSignal::none()) == TickStatus::Running {
        guard += 1;
        assert!(guard < 10_000, "run never ended");
    }
}

fn cued_targets(events: &[MarkerEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            MarkerKind::CueOnset { target, .. } => Some(target),
            _ => None,
        })
        .collect()
}

fn position(events: &[MarkerEvent], wanted: &MarkerKind) -> usize {
    events
        .iter()
        .position(|e| &e.kind == wanted)
        .unwrap_or_else(|| panic!("missing {wanted}"))
}

#[test]
fn one_run_cues_every_symbol_with_ordered_markers() {
    let (mut session, timer, recorder) = start(&four_key_config(42));
    tick(&mut session, &timer, InputSignal::continue_key());
    run_until_paused(&mut session, &timer);

    let events = recorder.events();
    let mut targets = cued_targets(&events);
    targets.sort_unstable();
    assert_eq!(targets, vec![0, 1, 2, 3]);

    let (trial, key) = events
        .iter()
        .find_map(|e| match &e.kind {
            MarkerKind::CueOnset { trial, target: 2, key } => Some((*trial, key.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(key, "C");
    let cue = position(
        &events,
        &MarkerKind::CueOnset {
            trial,
            target: 2,
            key,
        },
    );
    let onset = position(&events, &MarkerKind::StimOnset { trial });
    let offset = position(&events, &MarkerKind::StimOffset { trial });
    assert!(cue < onset && onset < offset);
    assert!(events[cue].timestamp_ns < events[onset].timestamp_ns);
    assert!(events[onset].timestamp_ns < events[offset].timestamp_ns);

    // 1 s of cue and 2 s of stimulation at 60 Hz.
    let frame_ns = FRAME.as_nanos() as u64;
    assert_eq!(events[onset].timestamp_ns - events[cue].timestamp_ns, 60 * frame_ns);
    assert_eq!(events[offset].timestamp_ns - events[onset].timestamp_ns, 120 * frame_ns);

    for pair in events.windows(2) {
        assert!(pair[0].timestamp_ns <= pair[1].timestamp_ns);
    }
    assert!(matches!(events[0].kind, MarkerKind::Settings(_)));
    assert_eq!(events[1].kind, MarkerKind::RunStart { run: 1 });
    assert_eq!(events.last().unwrap().kind, MarkerKind::RunEnd { run: 1 });

    assert_eq!(session.records().len(), 4);
    assert!(session.records().iter().all(|r| r.outcome == TrialOutcome::Completed));
    assert_eq!(session.status_message(), StatusMessage::Finished);
}

#[test]
fn same_seed_reproduces_the_trial_order() {
    let orders: Vec<Vec<usize>> = (0..2)
        .map(|_| {
            let mut config = four_key_config(7);
            config.runs = 2;
            let (mut session, timer, recorder) = start(&config);
            for _ in 0..2 {
                tick(&mut session, &timer, InputSignal::continue_key());
                run_until_paused(&mut session, &timer);
            }
            cued_targets(&recorder.events())
        })
        .collect();
    assert_eq!(orders[0].len(), 8);
    assert_eq!(orders[0], orders[1]);
}

#[test]
fn runs_pause_for_continue_and_each_covers_all_symbols() {
    let mut config = four_key_config(3);
    config.runs = 2;
    let (mut session, timer, recorder) = start(&config);

    tick(&mut session, &timer, InputSignal::continue_key());
    run_until_paused(&mut session, &timer);
    assert_eq!(session.status_message(), StatusMessage::RunComplete);
    let after_first = recorder.events().len();
    for _ in 0..30 {
        assert_eq!(tick(&mut session, &timer, InputSignal::none()), TickStatus::Paused);
    }
    assert_eq!(recorder.events().len(), after_first);

    tick(&mut session, &timer, InputSignal::continue_key());
    assert_eq!(session.current_run(), Some(2));
    run_until_paused(&mut session, &timer);
    assert_eq!(
        tick(&mut session, &timer, InputSignal::continue_key()),
        TickStatus::Finished
    );

    let events = recorder.events();
    let settings = events
        .iter()
        .filter(|e| matches!(e.kind, MarkerKind::Settings(_)))
        .count();
    assert_eq!(settings, 1);
    let targets = cued_targets(&events);
    for run in targets.chunks(4) {
        let mut run = run.to_vec();
        run.sort_unstable();
        assert_eq!(run, vec![0, 1, 2, 3]);
    }
    assert_eq!(session.records().len(), 8);
}

#[test]
fn abort_mid_stimulation_skips_stim_offset() {
    let (mut session, timer, recorder) = start(&four_key_config(11));
    tick(&mut session, &timer, InputSignal::continue_key());
    while session.phase() == TrialPhase::Cueing {
        tick(&mut session, &timer, InputSignal::none());
    }
    assert_eq!(session.phase(), TrialPhase::Stimulating);
    // Stimulation frame 1 was shown by the tick that left the cue.
    for _ in 1..30 {
        tick(&mut session, &timer, InputSignal::none());
    }
    assert_eq!(
        tick(&mut session, &timer, InputSignal::abort()),
        TickStatus::Aborted
    );
    for _ in 0..200 {
        assert_eq!(
            tick(&mut session, &timer, InputSignal::continue_key()),
            TickStatus::Aborted
        );
    }

    let events = recorder.events();
    let aborts: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind == MarkerKind::Abort)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(aborts, vec![events.len() - 1]);
    assert!(!events.iter().any(|e| matches!(e.kind, MarkerKind::StimOffset { .. })));
    assert!(!events.iter().any(|e| matches!(e.kind, MarkerKind::RunEnd { .. })));

    let record = session.records().last().unwrap();
    assert_eq!(record.outcome, TrialOutcome::Aborted);
    assert!(record.stim_onset_ns.is_some());
    assert_eq!(record.stim_offset_ns, None);
    assert_eq!(session.records().len(), 1);
}
