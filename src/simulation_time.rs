use crate::core::units::{timestep_seconds, HOURS_PER_DAY};
use itertools::iproduct;
use serde::Deserialize;
use serde_valid::Validate;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct SimulationTime {
    #[serde(rename(deserialize = "start"))]
    #[validate(minimum = 0.)]
    start_time: f64,
    #[serde(rename(deserialize = "end"))]
    end_time: f64,
    #[validate(exclusive_minimum = 0.)]
    step: f64,
}

impl SimulationTime {
    pub fn new(start_time: f64, end_time: f64, step: f64) -> Self {
        Self {
            start_time,
            end_time,
            step,
        }
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Length of a timestep, in hours
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        ((self.end_time - self.start_time) / self.step).ceil().max(0.) as usize
    }

    /// Number of timesteps making up the first day of the run, or the whole run if it is
    /// shorter than a day
    pub fn steps_in_first_day(&self) -> usize {
        self.total_steps()
            .min((HOURS_PER_DAY as f64 / self.step).ceil() as usize)
    }

    pub fn iter(&self) -> SimulationTimeIterator {
        SimulationTimeIterator::from(*self)
    }

    /// Timesteps of the first day, repeated once per warm-up day. Each item carries the
    /// number of the warm-up day it belongs to.
    pub fn warmup_iter(&self, days: u32) -> impl Iterator<Item = (u32, SimulationTimeIteration)> {
        let first_day: Vec<SimulationTimeIteration> =
            self.iter().take(self.steps_in_first_day()).collect();
        iproduct!(0..days, first_day)
    }
}

#[derive(Clone)]
pub struct SimulationTimeIterator {
    current_index: usize,
    current_time: f64,
    started: bool,
    simulation_time: SimulationTime,
}

impl SimulationTimeIterator {
    fn from(simulation_time: SimulationTime) -> Self {
        SimulationTimeIterator {
            current_index: 0,
            current_time: simulation_time.start_time,
            started: false,
            simulation_time,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_day(&self) -> u32 {
        self.current_time as u32 / HOURS_PER_DAY
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationTimeIteration {
    pub index: usize,
    pub time: f64,
    pub timestep: f64,
}

impl SimulationTimeIteration {
    pub fn current_hour(&self) -> u32 {
        self.time.floor() as u32
    }

    pub fn hour_of_day(&self) -> u32 {
        self.current_hour() % HOURS_PER_DAY
    }

    pub fn current_day(&self) -> u32 {
        self.time as u32 / HOURS_PER_DAY
    }

    pub fn timestep_seconds(&self) -> f64 {
        timestep_seconds(self.timestep)
    }
}

impl Iterator for SimulationTimeIterator {
    type Item = SimulationTimeIteration;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started && self.simulation_time.start_time != self.simulation_time.end_time {
            self.started = true;
            return Some(SimulationTimeIteration {
                index: 0,
                time: self.simulation_time.start_time,
                timestep: self.simulation_time.step,
            });
        }
        match self.current_time < (self.simulation_time.end_time - self.simulation_time.step) {
            true => {
                self.current_index += 1;
                self.current_time += self.simulation_time.step;
                Some(SimulationTimeIteration {
                    index: self.current_index,
                    time: self.current_time,
                    timestep: self.simulation_time.step,
                })
            }
            false => None,
        }
    }
}
