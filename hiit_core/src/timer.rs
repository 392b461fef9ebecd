//! Phase timer state machine.
//!
//! The timer holds the only timing truth for a run: which phase is active,
//! when it started, and the exercise/round counters. Remaining time is
//! always recomputed from the clock, never decremented per tick, so it is
//! correct no matter how irregularly `advance` is called.
//!
//! ```text
//! WarmUp ──► Work ──► Rest ──► Work ──► ... ──► Work ──► Complete
//!                │                        ▲
//!                └── last exercise ──► RoundReset (round += 1)
//! ```

use crate::{Phase, PhaseState, WorkoutConfig};

/// Outcome of a phase expiring
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// A new phase began; `time_remaining` is its full duration
    Entered(PhaseState),
    /// The final work phase ended at `finished_at_ms`
    Complete { finished_at_ms: u64 },
}

#[derive(Clone, Debug)]
pub struct PhaseTimer {
    config: WorkoutConfig,
    phase: Phase,
    current_exercise: u32,
    current_round: u32,
    phase_started_at: u64,
    complete: bool,
}

impl PhaseTimer {
    /// Begin in warm-up at `now_ms`
    pub fn new(config: WorkoutConfig, now_ms: u64) -> Self {
        Self {
            config,
            phase: Phase::WarmUp,
            current_exercise: 1,
            current_round: 1,
            phase_started_at: now_ms,
            complete: false,
        }
    }

    pub fn config(&self) -> &WorkoutConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_exercise(&self) -> u32 {
        self.current_exercise
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn phase_started_at(&self) -> u64 {
        self.phase_started_at
    }

    fn phase_duration_ms(&self) -> u64 {
        u64::from(self.config.phase_duration(self.phase)) * 1000
    }

    /// Instant at which the current phase runs out
    pub fn deadline(&self) -> u64 {
        self.phase_started_at + self.phase_duration_ms()
    }

    /// Whole seconds left in the current phase as seen at `now_ms`.
    ///
    /// A timestamp earlier than the phase start counts as zero elapsed.
    pub fn remaining_at(&self, now_ms: u64) -> u32 {
        let elapsed_secs = now_ms.saturating_sub(self.phase_started_at) / 1000;
        let duration = u64::from(self.config.phase_duration(self.phase));
        // bounded by the u32 duration
        duration.saturating_sub(elapsed_secs) as u32
    }

    /// Current position as seen at `now_ms`
    pub fn state_at(&self, now_ms: u64) -> PhaseState {
        PhaseState {
            phase: self.phase,
            time_remaining: self.remaining_at(now_ms),
            current_exercise: self.current_exercise,
            current_round: self.current_round,
        }
    }

    /// Move the phase start forward, e.g. by the length of a pause
    pub fn shift(&mut self, delta_ms: u64) {
        self.phase_started_at = self.phase_started_at.saturating_add(delta_ms);
    }

    /// Apply every transition that is due at `now_ms`.
    ///
    /// Each new phase starts at the previous phase's deadline, so a long gap
    /// between calls lands in the same place a steady tick would have. Zero
    /// length phases are passed through in the same call.
    pub fn advance(&mut self, now_ms: u64) -> Vec<Transition> {
        let mut transitions = Vec::new();

        while !self.complete && now_ms >= self.deadline() {
            let ended_at = self.deadline();
            match self.next_phase() {
                Some(next) => {
                    self.enter(next, ended_at);
                    transitions.push(Transition::Entered(PhaseState {
                        phase: self.phase,
                        time_remaining: self.config.phase_duration(self.phase),
                        current_exercise: self.current_exercise,
                        current_round: self.current_round,
                    }));
                }
                None => {
                    self.complete = true;
                    transitions.push(Transition::Complete {
                        finished_at_ms: ended_at,
                    });
                }
            }
        }

        transitions
    }

    /// Transition table; `None` means the workout is over
    fn next_phase(&self) -> Option<Phase> {
        let last_exercise = self.current_exercise == self.config.exercises;
        let last_round = self.current_round == self.config.rounds;

        match self.phase {
            Phase::WarmUp => Some(Phase::Work),
            Phase::Work if last_exercise && last_round => None,
            Phase::Work if last_exercise => Some(Phase::RoundReset),
            Phase::Work => Some(Phase::Rest),
            Phase::Rest | Phase::RoundReset => Some(Phase::Work),
        }
    }

    fn enter(&mut self, next: Phase, started_at: u64) {
        match (self.phase, next) {
            (Phase::Rest, Phase::Work) => self.current_exercise += 1,
            (Phase::RoundReset, Phase::Work) => {
                self.current_round += 1;
                self.current_exercise = 1;
            }
            _ => {}
        }

        tracing::debug!(
            "Phase {} -> {} (exercise {}/{}, round {}/{})",
            self.phase,
            next,
            self.current_exercise,
            self.config.exercises,
            self.current_round,
            self.config.rounds
        );

        self.phase = next;
        self.phase_started_at = started_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(work: u32, rest: u32, exercises: u32, rounds: u32, reset: u32, warm: u32) -> WorkoutConfig {
        WorkoutConfig {
            work_time: work,
            rest_time: rest,
            exercises,
            rounds,
            round_reset: reset,
            warm_up_time: warm,
        }
    }

    fn entered(transitions: &[Transition]) -> Vec<(Phase, u32, u32)> {
        transitions
            .iter()
            .filter_map(|t| match t {
                Transition::Entered(s) => Some((s.phase, s.current_exercise, s.current_round)),
                Transition::Complete { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let timer = PhaseTimer::new(config(20, 10, 5, 2, 10, 10), 0);
        let state = timer.state_at(0);

        assert_eq!(state.phase, Phase::WarmUp);
        assert_eq!(state.time_remaining, 10);
        assert_eq!(state.current_exercise, 1);
        assert_eq!(state.current_round, 1);
    }

    #[test]
    fn test_remaining_uses_whole_elapsed_seconds() {
        let timer = PhaseTimer::new(config(20, 10, 5, 2, 10, 10), 1_000);

        assert_eq!(timer.remaining_at(1_999), 10);
        assert_eq!(timer.remaining_at(2_000), 9);
        assert_eq!(timer.remaining_at(10_999), 1);
        assert_eq!(timer.remaining_at(11_000), 0);
        assert_eq!(timer.remaining_at(60_000), 0);
    }

    #[test]
    fn test_clock_before_phase_start_counts_as_zero_elapsed() {
        let timer = PhaseTimer::new(config(20, 10, 5, 2, 10, 10), 5_000);
        assert_eq!(timer.remaining_at(1_000), 10);
    }

    #[test]
    fn test_warm_up_leads_to_work() {
        let mut timer = PhaseTimer::new(config(20, 10, 5, 2, 10, 3), 0);

        assert!(timer.advance(2_999).is_empty());
        let transitions = timer.advance(3_000);
        assert_eq!(entered(&transitions), vec![(Phase::Work, 1, 1)]);
        assert_eq!(timer.remaining_at(3_000), 20);
    }

    #[test]
    fn test_single_round_skips_round_reset() {
        let mut timer = PhaseTimer::new(config(1, 1, 2, 1, 5, 0), 0);
        let transitions = timer.advance(10_000);

        assert_eq!(
            entered(&transitions),
            vec![(Phase::Work, 1, 1), (Phase::Rest, 1, 1), (Phase::Work, 2, 1)]
        );
        assert_eq!(
            transitions.last(),
            Some(&Transition::Complete { finished_at_ms: 3_000 })
        );
        assert!(timer.is_complete());
    }

    #[test]
    fn test_last_exercise_of_round_takes_round_reset() {
        let mut timer = PhaseTimer::new(config(1, 1, 1, 2, 3, 0), 0);
        let transitions = timer.advance(100_000);

        assert_eq!(
            entered(&transitions),
            vec![(Phase::Work, 1, 1), (Phase::RoundReset, 1, 1), (Phase::Work, 1, 2)]
        );
        assert_eq!(
            transitions.last(),
            Some(&Transition::Complete { finished_at_ms: 5_000 })
        );
    }

    #[test]
    fn test_round_reset_resets_exercise_counter() {
        let mut timer = PhaseTimer::new(config(2, 1, 2, 2, 4, 0), 0);
        // work 0-2, rest 2-3, work 3-5, reset 5-9, work 9-11
        timer.advance(9_000);

        assert_eq!(timer.phase(), Phase::Work);
        assert_eq!(timer.current_exercise(), 1);
        assert_eq!(timer.current_round(), 2);
    }

    #[test]
    fn test_one_transition_at_a_time_when_ticked_steadily() {
        let mut timer = PhaseTimer::new(config(2, 1, 2, 1, 0, 1), 0);

        assert_eq!(entered(&timer.advance(1_000)), vec![(Phase::Work, 1, 1)]);
        assert!(timer.advance(2_500).is_empty());
        assert_eq!(entered(&timer.advance(3_000)), vec![(Phase::Rest, 1, 1)]);
        assert_eq!(entered(&timer.advance(4_000)), vec![(Phase::Work, 2, 1)]);
        assert_eq!(
            timer.advance(6_000),
            vec![Transition::Complete { finished_at_ms: 6_000 }]
        );
        assert!(timer.advance(60_000).is_empty());
    }

    #[test]
    fn test_shift_preserves_remaining() {
        let mut timer = PhaseTimer::new(config(20, 10, 5, 2, 10, 10), 0);
        assert_eq!(timer.remaining_at(4_000), 6);

        timer.shift(100_000);
        assert_eq!(timer.remaining_at(104_000), 6);
    }

    #[test]
    fn test_work_phase_count_matches_exercises_times_rounds() {
        for exercises in 1..=4 {
            for rounds in 1..=3 {
                let mut timer = PhaseTimer::new(config(3, 2, exercises, rounds, 1, 2), 0);
                let transitions = timer.advance(u64::MAX / 2);
                let work_count = entered(&transitions)
                    .iter()
                    .filter(|(phase, _, _)| *phase == Phase::Work)
                    .count();

                assert_eq!(work_count as u32, exercises * rounds);
                assert!(timer.is_complete());
            }
        }
    }
}
