use crate::error::SessionError;
use crate::input::InputSignal;
use crate::recorder::{MarkerEmitter, MarkerSink, RecorderError};
use crate::scheduler::{Run, TrialScheduler};
use crate::stimulation::StimulationClock;
use crate::trial::{ActiveTrial, TrialTiming};
use cvep_core::{
    Layout, MarkerEvent, MarkerKind, StatusMessage, TrialOutcome, TrialPhase, TrialRecord,
    VisualState,
};
use cvep_timing::{DriftMonitor, Timer};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// A tick never needs more than: continue -> run-start -> cue, or
// inter-trial end -> run-end.
const MAX_TRANSITIONS_PER_TICK: usize = 8;

/// What the presentation loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Running,
    /// Waiting for the continue key.
    Paused,
    Finished,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdleState {
    AwaitingContinue,
    /// Between trials of a run; the next tick dequeues a target.
    Ready,
    /// All runs done and acknowledged.
    Done,
}

#[derive(Debug)]
enum MachineState {
    Idle(IdleState),
    Cueing,
    Stimulating(Vec<StimulationClock>),
    InterTrialInterval,
    Aborted,
}

enum Step {
    Stay,
    Advanced,
}

/// Sequences runs and trials one display refresh at a time.
///
/// The presentation loop calls [`tick`](Self::tick) once per refresh with
/// the input gathered since the previous one, then draws [`frame`](Self::frame).
/// Markers are emitted synchronously from inside the tick, so their order is
/// the order of the transitions.
pub struct SpellerStateMachine<T, M, R>
where
    T: Timer<Timestamp = u64>,
    M: MarkerSink,
    R: Rng,
{
    layout: Arc<Layout>,
    timing: TrialTiming,
    timer: T,
    emitter: MarkerEmitter<M>,
    scheduler: TrialScheduler<R>,
    state: MachineState,
    current: Option<ActiveTrial>,
    run: Option<Run>,
    runs_total: usize,
    runs_started: usize,
    settings: Option<Vec<(String, String)>>,
    records: Vec<TrialRecord>,
    frame: Vec<VisualState>,
    drift: DriftMonitor,
}

impl<T, M, R> SpellerStateMachine<T, M, R>
where
    T: Timer<Timestamp = u64>,
    M: MarkerSink,
    R: Rng,
{
    pub fn new(
        layout: Arc<Layout>,
        timing: TrialTiming,
        runs: usize,
        timer: T,
        sink: M,
        scheduler: TrialScheduler<R>,
    ) -> Self {
        let frame = vec![VisualState::Off; layout.len()];
        let drift = DriftMonitor::new(timing.frame_period, timing.drift_tolerance);
        Self {
            layout,
            timing,
            timer,
            emitter: MarkerEmitter::new(sink),
            scheduler,
            state: MachineState::Idle(IdleState::AwaitingContinue),
            current: None,
            run: None,
            runs_total: runs,
            runs_started: 0,
            settings: None,
            records: Vec::new(),
            frame,
            drift,
        }
    }

    /// Key/value pairs sent as a `settings` marker on the first continue.
    pub fn with_settings(mut self, settings: Vec<(String, String)>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Advances by one display refresh.
    ///
    /// Abort takes precedence over every other signal. A lost recorder stops
    /// the session: the machine ends up `Aborted` and the error is returned.
    pub fn tick(&mut self, input: InputSignal) -> Result<TickStatus, SessionError> {
        if self.is_terminal() {
            return Ok(self.status());
        }
        let now = self.timer.now();
        self.observe_frame(now);

        if input.abort {
            self.abort(now)?;
            return Ok(TickStatus::Aborted);
        }

        let mut continue_pressed = input.continue_pressed;
        for _ in 0..MAX_TRANSITIONS_PER_TICK {
            match self.step(now, &mut continue_pressed) {
                Ok(Step::Stay) => break,
                Ok(Step::Advanced) => {}
                Err(err) => return Err(self.fail(now, err)),
            }
        }
        Ok(self.status())
    }

    /// Gives up on the current trial after a presentation failure and moves on
    /// to the next target.
    pub fn abandon_trial(&mut self, reason: &str) -> Result<(), SessionError> {
        let Some(trial) = self.current.as_ref() else {
            warn!(reason, "no active trial to abandon");
            return Ok(());
        };
        let number = trial.number;
        let now = self.timer.now();
        error!(trial = number, target = trial.target, reason, "trial abandoned");
        if let Err(err) = self
            .emitter
            .emit(MarkerEvent::new(MarkerKind::TrialAbandoned { trial: number }, now))
        {
            return Err(self.fail(now, err));
        }
        if let Some(trial) = self.current.take() {
            self.records.push(trial.into_record(TrialOutcome::Abandoned, now));
        }
        self.state = MachineState::Idle(IdleState::Ready);
        self.frame.fill(VisualState::Off);
        Ok(())
    }

    fn step(&mut self, now: u64, continue_pressed: &mut bool) -> Result<Step, RecorderError> {
        match self.state {
            MachineState::Idle(IdleState::AwaitingContinue) => {
                if !std::mem::take(continue_pressed) {
                    return Ok(Step::Stay);
                }
                self.begin_run(now)
            }
            MachineState::Idle(IdleState::Ready) => self.next_trial(now),
            MachineState::Idle(IdleState::Done) | MachineState::Aborted => Ok(Step::Stay),
            MachineState::Cueing => self.step_cue(now),
            MachineState::Stimulating(_) => self.step_stimulation(now),
            MachineState::InterTrialInterval => self.step_inter_trial(now),
        }
    }

    fn begin_run(&mut self, now: u64) -> Result<Step, RecorderError> {
        if let Some(settings) = self.settings.take() {
            self.emitter
                .emit(MarkerEvent::new(MarkerKind::Settings(settings), now))?;
        }
        if self.runs_started >= self.runs_total {
            info!(runs = self.runs_total, trials = self.records.len(), "session finished");
            self.state = MachineState::Idle(IdleState::Done);
            return Ok(Step::Advanced);
        }
        let run = self.scheduler.next_run();
        let number = run.index() + 1;
        self.emitter
            .emit(MarkerEvent::new(MarkerKind::RunStart { run: number }, now))?;
        info!(run = number, of = self.runs_total, trials = run.len(), "run started");
        self.runs_started += 1;
        self.run = Some(run);
        self.drift.reset();
        self.state = MachineState::Idle(IdleState::Ready);
        Ok(Step::Advanced)
    }

    fn next_trial(&mut self, now: u64) -> Result<Step, RecorderError> {
        let Some(run) = self.run.as_mut() else {
            self.state = MachineState::Idle(IdleState::AwaitingContinue);
            return Ok(Step::Stay);
        };
        let Some((number, target)) = run.next_trial() else {
            return self.finish_run(now);
        };
        let Some(symbol) = self.layout.symbol(target) else {
            warn!(target, "scheduled target is not in the layout");
            return Ok(Step::Advanced);
        };
        self.emitter.emit(MarkerEvent::new(
            MarkerKind::CueOnset {
                trial: number,
                target,
                key: symbol.label.clone(),
            },
            now,
        ))?;
        info!("{:02}/{}\t{}\t{}", number, run.len(), target, symbol.label);
        self.current = Some(ActiveTrial::new(run.index() + 1, number, symbol, now));
        self.state = MachineState::Cueing;
        Ok(Step::Advanced)
    }

    fn step_cue(&mut self, now: u64) -> Result<Step, RecorderError> {
        let Some(trial) = self.current.as_mut() else {
            self.state = MachineState::Idle(IdleState::Ready);
            return Ok(Step::Advanced);
        };
        if trial.frames < self.timing.cue_frames {
            trial.frames += 1;
            self.frame.fill(VisualState::Off);
            if let Some(slot) = self.frame.get_mut(trial.target) {
                *slot = VisualState::Cue;
            }
            return Ok(Step::Stay);
        }
        self.emitter.emit(MarkerEvent::new(
            MarkerKind::StimOnset {
                trial: trial.number,
            },
            now,
        ))?;
        trial.stim_onset_ns = Some(now);
        trial.frames = 0;
        debug!(trial = trial.number, "cue -> stimulation");
        let clocks = self
            .layout
            .symbols()
            .iter()
            .map(|s| self.timing.stimulation.clock(s.code.clone()))
            .collect();
        self.state = MachineState::Stimulating(clocks);
        Ok(Step::Advanced)
    }

    fn step_stimulation(&mut self, now: u64) -> Result<Step, RecorderError> {
        if let MachineState::Stimulating(clocks) = &mut self.state {
            let mut delivered = false;
            for (slot, clock) in self.frame.iter_mut().zip(clocks.iter_mut()) {
                if let Some(state) = clock.next() {
                    *slot = state;
                    delivered = true;
                }
            }
            if delivered {
                if let Some(trial) = self.current.as_mut() {
                    trial.frames += 1;
                }
                return Ok(Step::Stay);
            }
        }
        let Some(trial) = self.current.as_mut() else {
            self.state = MachineState::Idle(IdleState::Ready);
            return Ok(Step::Advanced);
        };
        self.emitter.emit(MarkerEvent::new(
            MarkerKind::StimOffset {
                trial: trial.number,
            },
            now,
        ))?;
        trial.stim_offset_ns = Some(now);
        trial.frames = 0;
        debug!(trial = trial.number, "stimulation -> inter-trial");
        self.state = MachineState::InterTrialInterval;
        Ok(Step::Advanced)
    }

    fn step_inter_trial(&mut self, now: u64) -> Result<Step, RecorderError> {
        if let Some(trial) = self.current.as_mut() {
            if trial.frames < self.timing.inter_trial_frames {
                trial.frames += 1;
                self.frame.fill(VisualState::Off);
                return Ok(Step::Stay);
            }
        }
        if let Some(trial) = self.current.take() {
            self.records.push(trial.into_record(TrialOutcome::Completed, now));
        }
        self.state = MachineState::Idle(IdleState::Ready);
        Ok(Step::Advanced)
    }

    fn finish_run(&mut self, now: u64) -> Result<Step, RecorderError> {
        let number = self.run.as_ref().map_or(0, |r| r.index() + 1);
        self.emitter
            .emit(MarkerEvent::new(MarkerKind::RunEnd { run: number }, now))?;
        let stats = self.timer.calibration_stats();
        info!(
            run = number,
            frames = stats.samples,
            mean_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            min_ms = stats.min_frame_time_ns / 1e6,
            max_ms = stats.max_frame_time_ns / 1e6,
            fps = stats.effective_fps,
            late = self.drift.late_frames(),
            "run complete"
        );
        self.run = None;
        self.frame.fill(VisualState::Off);
        // A continue pressed before the pause was shown must not skip it.
        self.state = MachineState::Idle(IdleState::AwaitingContinue);
        Ok(Step::Stay)
    }

    fn abort(&mut self, now: u64) -> Result<(), RecorderError> {
        warn!(phase = self.phase().name(), "abort requested");
        self.halt(now);
        self.emitter.emit(MarkerEvent::new(MarkerKind::Abort, now))
    }

    fn fail(&mut self, now: u64, err: RecorderError) -> SessionError {
        error!(%err, "stopping session");
        self.halt(now);
        SessionError::Recorder(err)
    }

    fn halt(&mut self, now: u64) {
        if let Some(trial) = self.current.take() {
            self.records.push(trial.into_record(TrialOutcome::Aborted, now));
        }
        self.run = None;
        self.frame.fill(VisualState::Off);
        self.state = MachineState::Aborted;
    }

    fn observe_frame(&mut self, now: u64) {
        let (interval, drift) = self.drift.observe(now);
        if let Some(interval) = interval {
            self.timer.record_frame(interval);
        }
        if let Some(drift) = drift {
            let expected_ms = drift.expected.as_secs_f64() * 1e3;
            let actual_ms = drift.actual.as_secs_f64() * 1e3;
            if self.phase().in_trial() {
                warn!(frame = drift.frame, expected_ms, actual_ms, "frame delivered late");
            } else {
                debug!(frame = drift.frame, expected_ms, actual_ms, "frame delivered late");
            }
        }
    }

    pub fn phase(&self) -> TrialPhase {
        match self.state {
            MachineState::Idle(_) => TrialPhase::Idle,
            MachineState::Cueing => TrialPhase::Cueing,
            MachineState::Stimulating(_) => TrialPhase::Stimulating,
            MachineState::InterTrialInterval => TrialPhase::InterTrialInterval,
            MachineState::Aborted => TrialPhase::Aborted,
        }
    }

    pub fn status(&self) -> TickStatus {
        match self.state {
            MachineState::Aborted => TickStatus::Aborted,
            MachineState::Idle(IdleState::Done) => TickStatus::Finished,
            MachineState::Idle(IdleState::AwaitingContinue) => TickStatus::Paused,
            _ => TickStatus::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            MachineState::Aborted | MachineState::Idle(IdleState::Done)
        )
    }

    /// Per-symbol visual state for the frame produced by the last tick.
    pub fn frame(&self) -> &[VisualState] {
        &self.frame
    }

    pub fn status_message(&self) -> StatusMessage {
        match self.state {
            MachineState::Aborted => StatusMessage::Aborted,
            MachineState::Idle(IdleState::Done) => StatusMessage::Finished,
            MachineState::Idle(IdleState::AwaitingContinue) if self.runs_started == 0 => {
                StatusMessage::WaitingToStart
            }
            MachineState::Idle(IdleState::AwaitingContinue)
                if self.runs_started >= self.runs_total =>
            {
                StatusMessage::Finished
            }
            MachineState::Idle(IdleState::AwaitingContinue) => StatusMessage::RunComplete,
            _ => StatusMessage::None,
        }
    }

    /// Task description shown before the first run.
    pub fn instructions(&self) -> String {
        let fr = self.timing.frame_rate;
        format!(
            "Fixate the key highlighted in green ({:.1} s) and keep fixating it while all keys \
             flash ({:.1} s). Each of {} keys is cued once per run, in random order, \
             about {:.1} min. Press continue to start.",
            self.timing.cue_frames as f64 / fr,
            self.timing.stimulation.total_frames() as f64 / fr,
            self.layout.len(),
            self.timing.run_seconds(self.layout.len()) / 60.0,
        )
    }

    /// Current trial number and the length of its run.
    pub fn progress(&self) -> Option<(usize, usize)> {
        let trial = self.current.as_ref()?;
        let run = self.run.as_ref()?;
        Some((trial.number, run.len()))
    }

    pub fn current_target(&self) -> Option<usize> {
        self.current.as_ref().map(|t| t.target)
    }

    /// One-based number of the run in progress.
    pub fn current_run(&self) -> Option<usize> {
        self.run.as_ref().map(|r| r.index() + 1)
    }

    pub fn runs_started(&self) -> usize {
        self.runs_started
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub fn timing(&self) -> &TrialTiming {
        &self.timing
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn emitter(&self) -> &MarkerEmitter<M> {
        &self.emitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingConfig;
    use crate::recorder::MemoryRecorder;
    use cvep_core::{CodeBank, CodeFamily, Position};
    use cvep_timing::ManualTimer;
    use rand::rngs::StdRng;
    use std::time::Duration;

    type Machine = SpellerStateMachine<ManualTimer, MemoryRecorder, StdRng>;

    fn machine(runs: usize, inter_trial_s: f64) -> (Machine, ManualTimer, MemoryRecorder) {
        let family = CodeFamily::Table {
            codes: ["1100", "1010", "0110"]
                .iter()
                .map(|s| s.parse().unwrap())
                .collect(),
        };
        let bank = CodeBank::build(&family, 3, 4, 1.0).unwrap();
        let labels = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let positions = (0..3).map(|i| Position::new(i * 10, 0)).collect();
        let layout = Arc::new(Layout::new(labels, positions, &bank).unwrap());
        let config = TimingConfig {
            cue_s: 2.0 / 60.0,
            stimulation_s: 4.0 / 60.0,
            inter_trial_s,
            ..TimingConfig::default()
        };
        let timing = TrialTiming::new(&config, 60.0).unwrap();
        let timer = ManualTimer::new();
        let recorder = MemoryRecorder::new();
        let m = SpellerStateMachine::new(
            layout,
            timing,
            runs,
            timer.clone(),
            recorder.clone(),
            TrialScheduler::seeded(3, 7),
        );
        (m, timer, recorder)
    }

    fn tick(m: &mut Machine, timer: &ManualTimer, input: InputSignal) -> TickStatus {
        timer.advance(Duration::from_nanos(16_666_667));
        m.tick(input).unwrap()
    }

    #[test]
    fn idles_until_continue() {
        let (mut m, timer, recorder) = machine(1, 0.0);
        for _ in 0..5 {
            assert_eq!(tick(&mut m, &timer, InputSignal::none()), TickStatus::Paused);
        }
        assert_eq!(m.status_message(), StatusMessage::WaitingToStart);
        assert!(recorder.events().is_empty());

        assert_eq!(tick(&mut m, &timer, InputSignal::continue_key()), TickStatus::Running);
        assert_eq!(m.phase(), TrialPhase::Cueing);
        let labels = recorder.labels();
        assert_eq!(labels[0], "run-start;run=1");
        assert!(labels[1].starts_with("cue-onset;trial=1;"));
    }

    #[test]
    fn phases_last_their_frame_counts() {
        let (mut m, timer, _) = machine(1, 1.0 / 60.0);
        tick(&mut m, &timer, InputSignal::continue_key());
        let target = m.current_target().unwrap();
        assert_eq!(m.frame()[target], VisualState::Cue);
        tick(&mut m, &timer, InputSignal::none());
        assert_eq!(m.phase(), TrialPhase::Cueing);
        for _ in 0..4 {
            tick(&mut m, &timer, InputSignal::none());
            assert_eq!(m.phase(), TrialPhase::Stimulating);
            assert!(!m.frame().contains(&VisualState::Cue));
        }
        tick(&mut m, &timer, InputSignal::none());
        assert_eq!(m.phase(), TrialPhase::InterTrialInterval);
        tick(&mut m, &timer, InputSignal::none());
        assert_eq!(m.phase(), TrialPhase::Cueing);
        assert_eq!(m.records().len(), 1);
        assert_eq!(m.records()[0].outcome, TrialOutcome::Completed);
    }

    #[test]
    fn stimulation_frames_follow_each_code() {
        let (mut m, timer, _) = machine(1, 0.0);
        tick(&mut m, &timer, InputSignal::continue_key());
        tick(&mut m, &timer, InputSignal::none());
        let mut seen = Vec::new();
        for _ in 0..4 {
            tick(&mut m, &timer, InputSignal::none());
            seen.push(m.frame().to_vec());
        }
        use VisualState::{Off, On};
        assert_eq!(
            seen,
            vec![
                vec![On, On, Off],
                vec![On, Off, On],
                vec![Off, On, On],
                vec![Off, Off, Off],
            ]
        );
    }

    #[test]
    fn run_end_pauses_then_finishes() {
        let (mut m, timer, recorder) = machine(1, 0.0);
        tick(&mut m, &timer, InputSignal::continue_key());
        let mut ticks = 0;
        while m.status() == TickStatus::Running {
            tick(&mut m, &timer, InputSignal::none());
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(m.status(), TickStatus::Paused);
        assert_eq!(m.status_message(), StatusMessage::Finished);
        assert_eq!(recorder.labels().last().unwrap(), "run-end;run=1");
        assert_eq!(m.records().len(), 3);

        assert_eq!(tick(&mut m, &timer, InputSignal::continue_key()), TickStatus::Finished);
        assert!(m.is_terminal());
        let before = recorder.events().len();
        tick(&mut m, &timer, InputSignal::abort());
        assert_eq!(recorder.events().len(), before);
    }

    #[test]
    fn abort_from_idle_emits_single_marker() {
        let (mut m, timer, recorder) = machine(2, 0.0);
        assert_eq!(tick(&mut m, &timer, InputSignal::abort()), TickStatus::Aborted);
        assert_eq!(recorder.labels(), vec!["abort".to_string()]);
        tick(&mut m, &timer, InputSignal::abort());
        tick(&mut m, &timer, InputSignal::continue_key());
        assert_eq!(recorder.labels(), vec!["abort".to_string()]);
        assert_eq!(m.status_message(), StatusMessage::Aborted);
    }

    #[test]
    fn held_continue_does_not_skip_the_run_pause() {
        let (mut m, timer, recorder) = machine(2, 0.0);
        let mut status = tick(&mut m, &timer, InputSignal::continue_key());
        let mut ticks = 0;
        while status == TickStatus::Running {
            status = tick(&mut m, &timer, InputSignal::continue_key());
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(status, TickStatus::Paused);
        assert_eq!(m.status_message(), StatusMessage::RunComplete);
        assert_eq!(recorder.labels().last().unwrap(), "run-end;run=1");
        assert_eq!(m.current_run(), None);

        tick(&mut m, &timer, InputSignal::continue_key());
        assert_eq!(m.current_run(), Some(2));
        let events = recorder.events();
        let end = events
            .iter()
            .find(|e| e.kind == MarkerKind::RunEnd { run: 1 })
            .unwrap();
        let start = events
            .iter()
            .find(|e| e.kind == MarkerKind::RunStart { run: 2 })
            .unwrap();
        assert!(end.timestamp_ns < start.timestamp_ns);
    }

    #[test]
    fn abort_during_cue_archives_the_trial() {
        let (mut m, timer, recorder) = machine(1, 0.0);
        tick(&mut m, &timer, InputSignal::continue_key());
        assert_eq!(m.phase(), TrialPhase::Cueing);
        assert_eq!(tick(&mut m, &timer, InputSignal::abort()), TickStatus::Aborted);
        tick(&mut m, &timer, InputSignal::abort());

        let labels = recorder.labels();
        assert_eq!(labels.iter().filter(|l| *l == "abort").count(), 1);
        assert_eq!(labels.last().unwrap(), "abort");
        assert!(!labels.iter().any(|l| l.starts_with("stim-onset")));
        assert_eq!(m.records().len(), 1);
        assert_eq!(m.records()[0].outcome, TrialOutcome::Aborted);
        assert_eq!(m.records()[0].stim_onset_ns, None);
    }

    #[test]
    fn abort_during_inter_trial_interval_archives_the_trial() {
        let (mut m, timer, recorder) = machine(1, 3.0 / 60.0);
        tick(&mut m, &timer, InputSignal::continue_key());
        let mut ticks = 0;
        while m.phase() != TrialPhase::InterTrialInterval {
            tick(&mut m, &timer, InputSignal::none());
            ticks += 1;
            assert!(ticks < 100);
        }
        assert_eq!(tick(&mut m, &timer, InputSignal::abort()), TickStatus::Aborted);
        tick(&mut m, &timer, InputSignal::continue_key());

        let labels = recorder.labels();
        assert_eq!(labels.iter().filter(|l| *l == "abort").count(), 1);
        assert_eq!(labels.last().unwrap(), "abort");
        assert!(!labels.iter().any(|l| l.starts_with("run-end")));
        let record = m.records().last().unwrap();
        assert_eq!(record.outcome, TrialOutcome::Aborted);
        assert!(record.stim_offset_ns.is_some());
        assert_eq!(m.records().len(), 1);
    }

    #[test]
    fn instructions_state_the_task_length() {
        let (m, _timer, _) = machine(1, 0.0);
        let text = m.instructions();
        assert!(text.contains("green (0.0 s)"));
        assert!(text.contains("flash (0.1 s)"));
        assert!(text.contains("Each of 3 keys"));
        assert!(text.contains("about 0.0 min"));
    }

    #[test]
    fn abandoned_trial_moves_to_next_target() {
        let (mut m, timer, recorder) = machine(1, 0.0);
        tick(&mut m, &timer, InputSignal::continue_key());
        tick(&mut m, &timer, InputSignal::none());
        m.abandon_trial("surface lost").unwrap();
        assert_eq!(m.phase(), TrialPhase::Idle);
        assert_eq!(m.records()[0].outcome, TrialOutcome::Abandoned);
        tick(&mut m, &timer, InputSignal::none());
        assert_eq!(m.progress(), Some((2, 3)));
        assert!(recorder.labels().contains(&"trial-abandoned;trial=1".to_string()));
    }

    #[test]
    fn abandon_without_trial_is_a_no_op() {
        let (mut m, _timer, recorder) = machine(1, 0.0);
        m.abandon_trial("nothing running").unwrap();
        assert!(recorder.events().is_empty());
        assert_eq!(m.status(), TickStatus::Paused);
    }
}
