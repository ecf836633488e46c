// Copyright (c) James Kassemi, SC, US. All rights reserved.
use core_types::config::WindowSplit;
use serde::Serialize;

use crate::error::ScheduleError;

/// Split of a window of `blanket_size` steps into a conditioned past (P) and a predicted
/// future (S).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ScheduleParameters {
    blanket_size: usize,
    past_window_size: usize,
    preds_per_step: usize,
}

impl ScheduleParameters {
    /// Resolves `"auto"` sides: both auto gives `P = B / 2` and `S = B - P`, one auto is
    /// derived from the other.
    pub fn resolve(
        blanket_size: usize,
        past_window_size: WindowSplit,
        preds_per_step: WindowSplit,
    ) -> Result<Self, ScheduleError> {
        if blanket_size < 2 {
            return Err(ScheduleError::BlanketTooSmall(blanket_size));
        }
        let (past, preds) = match (past_window_size, preds_per_step) {
            (WindowSplit::Auto, WindowSplit::Auto) => {
                let past = blanket_size / 2;
                (past, blanket_size - past)
            }
            (WindowSplit::Fixed(past), WindowSplit::Auto) => {
                (past, remainder("past_window_size", past, blanket_size)?)
            }
            (WindowSplit::Auto, WindowSplit::Fixed(preds)) => {
                (remainder("preds_per_step", preds, blanket_size)?, preds)
            }
            (WindowSplit::Fixed(past), WindowSplit::Fixed(preds)) => (past, preds),
        };
        Self::new(blanket_size, past, preds)
    }

    pub fn new(
        blanket_size: usize,
        past_window_size: usize,
        preds_per_step: usize,
    ) -> Result<Self, ScheduleError> {
        if blanket_size < 2 {
            return Err(ScheduleError::BlanketTooSmall(blanket_size));
        }
        if past_window_size == 0 {
            return Err(ScheduleError::EmptySplit {
                name: "past_window_size",
            });
        }
        if preds_per_step == 0 {
            return Err(ScheduleError::EmptySplit {
                name: "preds_per_step",
            });
        }
        if past_window_size + preds_per_step != blanket_size {
            return Err(ScheduleError::Inconsistent {
                past: past_window_size,
                preds: preds_per_step,
                blanket: blanket_size,
            });
        }
        Ok(Self {
            blanket_size,
            past_window_size,
            preds_per_step,
        })
    }

    pub fn blanket_size(&self) -> usize {
        self.blanket_size
    }

    pub fn past_window_size(&self) -> usize {
        self.past_window_size
    }

    pub fn preds_per_step(&self) -> usize {
        self.preds_per_step
    }
}

fn remainder(name: &'static str, value: usize, blanket: usize) -> Result<usize, ScheduleError> {
    match blanket.checked_sub(value) {
        Some(rest) if rest > 0 => Ok(rest),
        _ => Err(ScheduleError::Oversized {
            name,
            value,
            blanket,
        }),
    }
}

/// How much real observation seeds the run and how far it predicts, in `trajectory_dt` units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ForecastHorizon {
    assimilation_length: usize,
    lead_time: usize,
    trajectory_dt: u32,
}

impl ForecastHorizon {
    pub fn new(
        assimilation_length: usize,
        lead_time: usize,
        trajectory_dt: u32,
    ) -> Result<Self, ScheduleError> {
        if assimilation_length == 0 {
            return Err(ScheduleError::EmptyAssimilation);
        }
        if lead_time == 0 {
            return Err(ScheduleError::EmptyLeadTime);
        }
        if trajectory_dt == 0 {
            return Err(ScheduleError::ZeroTimestep);
        }
        Ok(Self {
            assimilation_length,
            lead_time,
            trajectory_dt,
        })
    }

    pub fn assimilation_length(&self) -> usize {
        self.assimilation_length
    }

    pub fn lead_time(&self) -> usize {
        self.lead_time
    }

    pub fn trajectory_dt(&self) -> u32 {
        self.trajectory_dt
    }

    /// Final trajectory length: the assimilated observation plus every predicted state.
    pub fn max_traj_size(&self) -> usize {
        self.assimilation_length + self.lead_time
    }

    pub fn num_steps(&self, schedule: &ScheduleParameters) -> usize {
        self.lead_time.div_ceil(schedule.preds_per_step())
    }

    /// First conditioned index inside the window, `P - assimilation_length`.
    pub fn initial_cond_start_idx(
        &self,
        schedule: &ScheduleParameters,
    ) -> Result<usize, ScheduleError> {
        schedule
            .past_window_size()
            .checked_sub(self.assimilation_length)
            .ok_or(ScheduleError::AssimilationExceedsPast {
                assimilation: self.assimilation_length,
                past: schedule.past_window_size(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WindowSplit::{Auto, Fixed};

    #[test]
    fn auto_auto_splits_in_half() {
        let even = ScheduleParameters::resolve(8, Auto, Auto).unwrap();
        assert_eq!((even.past_window_size(), even.preds_per_step()), (4, 4));
        let odd = ScheduleParameters::resolve(7, Auto, Auto).unwrap();
        assert_eq!((odd.past_window_size(), odd.preds_per_step()), (3, 4));
    }

    #[test]
    fn one_auto_is_derived_from_the_other() {
        let derived_preds = ScheduleParameters::resolve(8, Fixed(6), Auto).unwrap();
        assert_eq!(derived_preds.preds_per_step(), 2);
        let derived_past = ScheduleParameters::resolve(8, Auto, Fixed(1)).unwrap();
        assert_eq!(derived_past.past_window_size(), 7);
    }

    #[test]
    fn inconsistent_explicit_split_is_rejected() {
        assert_eq!(
            ScheduleParameters::resolve(8, Fixed(4), Fixed(3)),
            Err(ScheduleError::Inconsistent {
                past: 4,
                preds: 3,
                blanket: 8
            })
        );
    }

    #[test]
    fn zero_sized_sides_are_rejected() {
        assert!(matches!(
            ScheduleParameters::resolve(8, Fixed(8), Auto),
            Err(ScheduleError::Oversized { .. })
        ));
        assert!(matches!(
            ScheduleParameters::resolve(8, Fixed(0), Fixed(8)),
            Err(ScheduleError::EmptySplit { .. })
        ));
        assert!(matches!(
            ScheduleParameters::resolve(8, Auto, Fixed(10)),
            Err(ScheduleError::Oversized { .. })
        ));
        assert_eq!(
            ScheduleParameters::resolve(1, Auto, Auto),
            Err(ScheduleError::BlanketTooSmall(1))
        );
    }

    #[test]
    fn horizon_derivations() {
        let schedule = ScheduleParameters::new(8, 4, 4).unwrap();
        let horizon = ForecastHorizon::new(1, 12, 1).unwrap();
        assert_eq!(horizon.num_steps(&schedule), 3);
        assert_eq!(horizon.max_traj_size(), 13);
        assert_eq!(horizon.initial_cond_start_idx(&schedule), Ok(3));

        let ragged = ForecastHorizon::new(2, 10, 6).unwrap();
        assert_eq!(ragged.num_steps(&schedule), 3);
        assert_eq!(ragged.max_traj_size(), 12);
    }

    #[test]
    fn assimilation_longer_than_past_is_rejected() {
        let schedule = ScheduleParameters::new(8, 4, 4).unwrap();
        let horizon = ForecastHorizon::new(5, 12, 1).unwrap();
        assert_eq!(
            horizon.initial_cond_start_idx(&schedule),
            Err(ScheduleError::AssimilationExceedsPast {
                assimilation: 5,
                past: 4
            })
        );
        let full = ForecastHorizon::new(4, 12, 1).unwrap();
        assert_eq!(full.initial_cond_start_idx(&schedule), Ok(0));
    }

    #[test]
    fn horizon_rejects_empty_inputs() {
        assert_eq!(
            ForecastHorizon::new(0, 1, 1),
            Err(ScheduleError::EmptyAssimilation)
        );
        assert_eq!(ForecastHorizon::new(1, 0, 1), Err(ScheduleError::EmptyLeadTime));
        assert_eq!(ForecastHorizon::new(1, 1, 0), Err(ScheduleError::ZeroTimestep));
    }
}
