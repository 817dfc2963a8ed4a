use std::str::FromStr;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::error::{Error, Result};
use crate::stepper::{Direction, StepSequencer};

/// Text commands accepted on the motor topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    /// Fixed small turn in one direction
    Nudge(Direction),
    /// Absolute target angle in degrees
    Goto(i32),
}

impl FromStr for MotorCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        if text.eq_ignore_ascii_case("clockwise") {
            return Ok(MotorCommand::Nudge(Direction::Clockwise));
        }
        if text.eq_ignore_ascii_case("counterclockwise") {
            return Ok(MotorCommand::Nudge(Direction::CounterClockwise));
        }
        text.parse::<i32>()
            .map(MotorCommand::Goto)
            .map_err(|_| Error::InvalidCommand(s.to_string()))
    }
}

impl MotorCommand {
    /// Run the command on `motor`, returning the number of steps taken.
    pub fn apply<P: OutputPin, D: DelayNs>(
        self,
        motor: &mut StepSequencer<P, D>,
        nudge_degrees: f64,
        step_delay_us: u32,
    ) -> Result<u32> {
        match self {
            MotorCommand::Nudge(direction) => motor.rotate_by_angle(nudge_degrees, step_delay_us, direction),
            MotorCommand::Goto(target) => motor.rotate_to_angle(f64::from(target), step_delay_us),
        }
    }
}
