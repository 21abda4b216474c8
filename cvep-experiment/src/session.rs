use crate::config::SpellerConfig;
use crate::error::SessionError;
use crate::recorder::MarkerSink;
use crate::scheduler::TrialScheduler;
use crate::state::SpellerStateMachine;
use crate::trial::TrialTiming;
use cvep_core::{CodeBank, Layout};
use cvep_timing::Timer;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::info;

/// A state machine with production randomness.
pub type Session<T, M> = SpellerStateMachine<T, M, StdRng>;

/// Builds the code bank and assigns codes to the configured grid in
/// row-major order.
pub fn build_layout(config: &SpellerConfig) -> Result<Layout, SessionError> {
    let (labels, positions) = config.grid.keys();
    let length = config.code_length()?;
    let bank = CodeBank::build(
        &config.codes.source,
        positions.len(),
        length,
        config.codes.threshold,
    )?;
    info!(
        family = bank.family(),
        codes = bank.len(),
        length = bank.code_length(),
        max_correlation = bank.max_abs_correlation(),
        "code bank ready"
    );
    Ok(Layout::new(labels, positions, &bank)?)
}

/// Validates the configuration and assembles a session ready for its first
/// tick. Every construction error surfaces here, before anything is drawn.
///
/// `display_refresh` is the monitor's reported rate; a configured frame rate
/// takes precedence.
pub fn build_session<T, M>(
    config: &SpellerConfig,
    display_refresh: Option<f64>,
    timer: T,
    sink: M,
) -> Result<Session<T, M>, SessionError>
where
    T: Timer<Timestamp = u64>,
    M: MarkerSink,
{
    config.validate()?;
    let frame_rate = config
        .timing
        .frame_rate
        .or(display_refresh)
        .ok_or(SessionError::ClockUnavailable)?;
    let timing = TrialTiming::new(&config.timing, frame_rate)?;
    let layout = Arc::new(build_layout(config)?);
    let scheduler = match config.seed {
        Some(seed) => TrialScheduler::seeded(layout.len(), seed),
        None => TrialScheduler::from_entropy(layout.len()),
    };
    info!(
        frame_rate,
        frames_per_bit = timing.stimulation.frames_per_bit(),
        cue_frames = timing.cue_frames,
        stimulation_frames = timing.stimulation.total_frames(),
        inter_trial_frames = timing.inter_trial_frames,
        symbols = layout.len(),
        grid = config.grid.layout.name(),
        runs = config.runs,
        "session configured"
    );
    if config.seed.is_none() {
        info!("trial order seeded from system entropy");
    }
    let settings = config.settings_pairs(frame_rate);
    Ok(
        SpellerStateMachine::new(layout, timing, config.runs, timer, sink, scheduler)
            .with_settings(settings),
    )
}
