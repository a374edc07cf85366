//! Upload decision state machine.
//!
//! State is two numbers: the consecutive motion frame count and the instant of the last
//! upload. Transitions per observed frame:
//!
//! | input                          | effect                                              |
//! |--------------------------------|-----------------------------------------------------|
//! | unoccupied                     | count = 0                                           |
//! | occupied, cooldown running     | nothing; the frame is not counted                   |
//! | occupied, cooldown elapsed     | count += 1                                          |
//! | ... and count >= min frames    | decision at `now`, count = 0, last upload = `now`   |
//!
//! The cooldown gates the counter: while it runs, occupied frames are not counted at all,
//! so a burst that straddles the end of the cooldown starts counting from zero.

use std::time::{Duration, Instant};

use crate::error::PipelineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OccupancySettings {
    pub min_upload_interval: Duration,
    /// Consecutive occupied frames needed once the cooldown has elapsed. Zero behaves
    /// like one.
    pub min_motion_frames: u32,
}

/// Instruction to upload the frame observed at `at`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadDecision {
    pub at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OccupancyPhase {
    Idle,
    Accumulating,
    CoolingDown,
}

pub struct OccupancyStateMachine {
    settings: OccupancySettings,
    consecutive_motion_frames: u32,
    last_upload: Instant,
    last_observed: Option<Instant>,
}

impl OccupancyStateMachine {
    /// `started_at` acts as the previous upload, so the first decision can only come one
    /// full cooldown after start.
    pub fn new(settings: OccupancySettings, started_at: Instant) -> Self {
        Self {
            settings,
            consecutive_motion_frames: 0,
            last_upload: started_at,
            last_observed: None,
        }
    }

    pub fn settings(&self) -> &OccupancySettings {
        &self.settings
    }

    pub fn consecutive_motion_frames(&self) -> u32 {
        self.consecutive_motion_frames
    }

    pub fn last_upload(&self) -> Instant {
        self.last_upload
    }

    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_upload) >= self.settings.min_upload_interval
    }

    pub fn phase(&self, now: Instant) -> OccupancyPhase {
        if !self.cooldown_elapsed(now) {
            OccupancyPhase::CoolingDown
        } else if self.consecutive_motion_frames > 0 {
            OccupancyPhase::Accumulating
        } else {
            OccupancyPhase::Idle
        }
    }

    /// Fails if `now` is earlier than a previously observed instant.
    pub fn ensure_monotonic(&self, now: Instant) -> Result<(), PipelineError> {
        if self.last_observed.is_some_and(|prev| now < prev) {
            return Err(PipelineError::NonMonotonicTimestamp);
        }
        Ok(())
    }

    /// Record a frame instant that carries no occupancy, such as the frame that seeds the
    /// background model. Later frames must not be stamped before it.
    pub fn note_observed(&mut self, now: Instant) -> Result<(), PipelineError> {
        self.ensure_monotonic(now)?;
        self.last_observed = Some(now);
        Ok(())
    }

    /// Feed one frame's occupancy. Fails without touching state if `now` is earlier than
    /// a previously observed instant.
    pub fn observe(
        &mut self,
        occupied: bool,
        now: Instant,
    ) -> Result<Option<UploadDecision>, PipelineError> {
        self.note_observed(now)?;

        if !occupied {
            self.consecutive_motion_frames = 0;
            return Ok(None);
        }
        if !self.cooldown_elapsed(now) {
            return Ok(None);
        }

        self.consecutive_motion_frames += 1;
        if self.consecutive_motion_frames >= self.settings.min_motion_frames {
            self.consecutive_motion_frames = 0;
            self.last_upload = now;
            return Ok(Some(UploadDecision { at: now }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    fn settings(interval_s: u64, frames: u32) -> OccupancySettings {
        OccupancySettings {
            min_upload_interval: Duration::from_secs(interval_s),
            min_motion_frames: frames,
        }
    }

    #[test]
    fn fires_once_after_exact_frame_count() {
        let t0 = Instant::now();
        let mut sm = OccupancyStateMachine::new(settings(30, 32), t0);
        let start = t0 + Duration::from_secs(30);

        let mut decisions = Vec::new();
        for i in 0..40u32 {
            let now = start + TICK * i;
            if let Some(decision) = sm.observe(true, now).unwrap() {
                decisions.push((i + 1, decision));
                assert_eq!(sm.consecutive_motion_frames(), 0);
            }
        }
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].0, 32);
        assert_eq!(decisions[0].1.at, start + TICK * 31);
        assert_eq!(sm.last_upload(), start + TICK * 31);
    }

    #[test]
    fn cooldown_blocks_counting_entirely() {
        let t0 = Instant::now();
        let mut sm = OccupancyStateMachine::new(settings(30, 3), t0);
        for i in 0..51u32 {
            let decision = sm.observe(true, t0 + TICK * i).unwrap();
            assert!(decision.is_none());
            assert_eq!(sm.consecutive_motion_frames(), 0);
        }
        assert_eq!(sm.phase(t0 + TICK * 50), OccupancyPhase::CoolingDown);

        let after = t0 + Duration::from_secs(30);
        assert!(sm.observe(true, after).unwrap().is_none());
        assert!(sm.observe(true, after + TICK).unwrap().is_none());
        assert!(sm.observe(true, after + TICK * 2).unwrap().is_some());
    }

    #[test]
    fn vacancy_resets_count() {
        let t0 = Instant::now();
        let mut sm = OccupancyStateMachine::new(settings(0, 4), t0);
        for i in 0..3u32 {
            assert!(sm.observe(true, t0 + TICK * i).unwrap().is_none());
        }
        assert_eq!(sm.consecutive_motion_frames(), 3);
        assert_eq!(sm.phase(t0 + TICK * 3), OccupancyPhase::Accumulating);

        sm.observe(false, t0 + TICK * 3).unwrap();
        assert_eq!(sm.consecutive_motion_frames(), 0);
        assert_eq!(sm.phase(t0 + TICK * 3), OccupancyPhase::Idle);

        for i in 4..7u32 {
            assert!(sm.observe(true, t0 + TICK * i).unwrap().is_none());
        }
        assert!(sm.observe(true, t0 + TICK * 7).unwrap().is_some());
    }

    #[test]
    fn vacancy_resets_count_during_cooldown() {
        let t0 = Instant::now();
        let mut sm = OccupancyStateMachine::new(settings(10, 2), t0);
        let ready = t0 + Duration::from_secs(10);
        sm.observe(true, ready).unwrap();
        assert!(sm.observe(true, ready + TICK).unwrap().is_some());

        sm.observe(false, ready + TICK * 2).unwrap();
        assert_eq!(sm.consecutive_motion_frames(), 0);
        assert_eq!(sm.phase(ready + TICK * 2), OccupancyPhase::CoolingDown);
    }

    #[test]
    fn at_most_one_decision_per_interval() {
        let t0 = Instant::now();
        let mut sm = OccupancyStateMachine::new(settings(5, 1), t0);
        let mut fired = Vec::new();
        for i in 0..300u32 {
            let now = t0 + TICK * i;
            if let Some(decision) = sm.observe(true, now).unwrap() {
                fired.push(decision.at);
            }
        }
        assert_eq!(fired.len(), 5);
        for pair in fired.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_secs(5));
        }
    }

    #[test]
    fn zero_frame_gate_fires_on_first_counted_frame() {
        let t0 = Instant::now();
        let mut sm = OccupancyStateMachine::new(settings(0, 0), t0);
        assert!(sm.observe(true, t0).unwrap().is_some());
    }

    #[test]
    fn backwards_time_is_rejected_without_state_change() {
        let t0 = Instant::now();
        let mut sm = OccupancyStateMachine::new(settings(0, 5), t0);
        sm.observe(true, t0 + TICK * 2).unwrap();
        let err = sm.observe(true, t0 + TICK).unwrap_err();
        assert!(matches!(err, PipelineError::NonMonotonicTimestamp));
        assert_eq!(sm.consecutive_motion_frames(), 1);

        sm.observe(true, t0 + TICK * 2).unwrap();
        assert_eq!(sm.consecutive_motion_frames(), 2);
    }

    #[test]
    fn noted_instant_bounds_later_frames() {
        let t0 = Instant::now();
        let mut sm = OccupancyStateMachine::new(settings(0, 1), t0);
        sm.note_observed(t0 + TICK * 5).unwrap();
        assert!(matches!(
            sm.observe(true, t0 + TICK),
            Err(PipelineError::NonMonotonicTimestamp)
        ));
        assert_eq!(sm.consecutive_motion_frames(), 0);
        assert!(sm.observe(true, t0 + TICK * 5).unwrap().is_some());
    }
}
