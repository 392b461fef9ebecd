//! Session driver: owns a runner for the length of one workout.
//!
//! Presenter intents arrive over an `mpsc` channel and are applied between
//! ticks on the driving thread, so the runner is never touched from two
//! places at once. A `Stop` is handled before the next tick, which means no
//! transition can fire after it.

use crate::runner::RunnerEvent;
use crate::{Clock, PhaseState, Result, RunnerSnapshot, WorkoutConfig, WorkoutRunner, WorkoutSummary};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Intent forwarded by the presenter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    TogglePause,
    Stop,
}

/// Everything a presenter is told during a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Tick(RunnerSnapshot),
    PhaseEntered(PhaseState),
    Completed(WorkoutSummary),
    Stopped,
}

/// How a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed(WorkoutSummary),
    Stopped,
}

/// Start `config` on `runner` and drive it until it completes or is stopped.
///
/// `on_event` is called on this thread for every tick snapshot, every phase
/// change and exactly one terminal event. Fails only if the config is
/// rejected, before anything is reported.
pub fn run_session<C, F>(
    runner: &mut WorkoutRunner<C>,
    config: WorkoutConfig,
    commands: &Receiver<Command>,
    tick_interval: Duration,
    mut on_event: F,
) -> Result<SessionOutcome>
where
    C: Clock,
    F: FnMut(&SessionEvent),
{
    runner.start(config)?;
    let epoch = runner.epoch();
    let mut listening = true;
    let mut next_tick = Instant::now();

    loop {
        if listening {
            let wait = next_tick.saturating_duration_since(Instant::now());
            match commands.recv_timeout(wait) {
                Ok(command) => {
                    if apply(runner, command) {
                        on_event(&SessionEvent::Stopped);
                        return Ok(SessionOutcome::Stopped);
                    }
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("Command channel closed; running to completion");
                    listening = false;
                }
            }
        } else {
            std::thread::sleep(next_tick.saturating_duration_since(Instant::now()));
        }
        next_tick += tick_interval;

        for event in runner.tick_for(epoch) {
            match event {
                RunnerEvent::PhaseEntered(state) => on_event(&SessionEvent::PhaseEntered(state)),
                RunnerEvent::Completed(summary) => {
                    on_event(&SessionEvent::Completed(summary));
                    return Ok(SessionOutcome::Completed(summary));
                }
            }
        }

        if let Some(snapshot) = runner.snapshot() {
            on_event(&SessionEvent::Tick(snapshot));
        }

        // After a stall, resume the cadence from now instead of bursting
        let now = Instant::now();
        if next_tick < now {
            tracing::trace!("Tick schedule fell behind by {:?}", now - next_tick);
            next_tick = now + tick_interval;
        }
    }
}

/// Apply a command; returns true if the session is over
fn apply<C: Clock>(runner: &mut WorkoutRunner<C>, command: Command) -> bool {
    tracing::debug!("Session command: {:?}", command);
    match command {
        Command::Pause => runner.pause(),
        Command::Resume => runner.resume(),
        Command::TogglePause => runner.toggle_pause(),
        Command::Stop => {
            runner.stop();
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, ManualClock, MonotonicClock, Phase};
    use std::sync::mpsc;

    fn quick_config() -> WorkoutConfig {
        WorkoutConfig {
            work_time: 1,
            rest_time: 1,
            exercises: 2,
            rounds: 1,
            round_reset: 5,
            warm_up_time: 0,
        }
    }

    #[test]
    fn test_session_runs_to_completion_without_commands() {
        let (tx, rx) = mpsc::channel();
        drop(tx);

        let mut runner = WorkoutRunner::new(MonotonicClock::new());
        let mut phases = Vec::new();
        let outcome = run_session(
            &mut runner,
            quick_config(),
            &rx,
            Duration::from_millis(20),
            |event| {
                if let SessionEvent::PhaseEntered(state) = event {
                    phases.push(state.phase);
                }
            },
        )
        .unwrap();

        assert_eq!(phases, vec![Phase::Work, Phase::Rest, Phase::Work]);
        match outcome {
            SessionOutcome::Completed(summary) => assert_eq!(summary.exercises, 2),
            SessionOutcome::Stopped => panic!("expected completion"),
        }
        assert!(!runner.is_running());
    }

    #[test]
    fn test_stop_before_first_tick() {
        let (tx, rx) = mpsc::channel();
        tx.send(Command::Stop).unwrap();

        let clock = ManualClock::new(0);
        let mut runner = WorkoutRunner::new(clock.clone());
        let mut events = Vec::new();
        let outcome = run_session(
            &mut runner,
            quick_config(),
            &rx,
            Duration::from_millis(10),
            |event| events.push(*event),
        )
        .unwrap();

        assert_eq!(outcome, SessionOutcome::Stopped);
        assert_eq!(events, vec![SessionEvent::Stopped]);
        assert!(!runner.is_running());
    }

    #[test]
    fn test_pause_then_stop_reports_paused_snapshots() {
        let (tx, rx) = mpsc::channel();
        tx.send(Command::Pause).unwrap();

        let clock = ManualClock::new(0);
        let mut runner = WorkoutRunner::new(clock.clone());
        let mut paused_ticks = 0;
        let outcome = run_session(
            &mut runner,
            quick_config(),
            &rx,
            Duration::from_millis(5),
            |event| {
                if let SessionEvent::Tick(snapshot) = event {
                    assert!(snapshot.is_paused);
                    paused_ticks += 1;
                    clock.advance_ms(10_000);
                    if paused_ticks == 3 {
                        tx.send(Command::Stop).unwrap();
                    }
                }
            },
        )
        .unwrap();

        assert_eq!(outcome, SessionOutcome::Stopped);
        assert_eq!(paused_ticks, 3);
    }

    #[test]
    fn test_ticks_keep_their_spacing_after_a_stall() {
        let (tx, rx) = mpsc::channel();
        let mut runner = WorkoutRunner::new(ManualClock::new(0));
        let mut tick_times = Vec::new();

        let outcome = run_session(
            &mut runner,
            quick_config(),
            &rx,
            Duration::from_millis(10),
            |event| {
                if let SessionEvent::Tick(_) = event {
                    tick_times.push(Instant::now());
                    if tick_times.len() == 2 {
                        std::thread::sleep(Duration::from_millis(300));
                    }
                    if tick_times.len() == 8 {
                        tx.send(Command::Stop).unwrap();
                    }
                }
            },
        )
        .unwrap();

        assert_eq!(outcome, SessionOutcome::Stopped);
        assert_eq!(tick_times.len(), 8);
        for pair in tick_times[1..].windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(5), "ticks only {:?} apart", gap);
        }
    }

    #[test]
    fn test_invalid_config_reports_nothing() {
        let (_tx, rx) = mpsc::channel();
        let mut runner = WorkoutRunner::new(ManualClock::new(0));
        let mut called = false;

        let result = run_session(
            &mut runner,
            WorkoutConfig {
                rounds: 0,
                ..quick_config()
            },
            &rx,
            Duration::from_millis(10),
            |_| called = true,
        );

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert!(!called);
    }
}
