//! Unipolar stepper (28BYJ-48 class) driven through four coil outputs.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use log::{debug, info};
use rppal::gpio::Gpio;

use crate::error::{Error, Result};

/// Half-step coil activation table, IN1..IN4.
pub const HALF_STEP_SEQUENCE: [[bool; 4]; 8] = [
    [true, false, false, true],
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
];

pub const MAX_ANGLE: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

fn pin_error<E: digital::Error>(err: E) -> Error {
    debug!("coil output failed: {:?}", err);
    Error::Pin(err.kind())
}

/// Claim the four BCM pins IN1..IN4 as outputs, all coils off.
pub fn open_coils(pins: [u8; 4]) -> Result<[rppal::gpio::OutputPin; 4]> {
    let gpio = Gpio::new()?;
    let [in1, in2, in3, in4] = pins;
    Ok([
        gpio.get(in1)?.into_output_low(),
        gpio.get(in2)?.into_output_low(),
        gpio.get(in3)?.into_output_low(),
        gpio.get(in4)?.into_output_low(),
    ])
}

/// Absolute shaft position, kept as a whole number of steps so the angle
/// is always an exact multiple of `360 / resolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorPosition {
    steps: i32,
    resolution: u32,
}

impl MotorPosition {
    pub fn new(resolution: u32) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::Config("step resolution must be positive".into()));
        }
        Ok(MotorPosition {
            steps: 0,
            resolution,
        })
    }

    /// Steps per revolution from the motor's stride angle, its gear ratio and
    /// the number of table rows per step. 5.625°, 1:64 and 8 rows give 512.
    pub fn from_geometry(stride_angle: f64, gear_ratio: f64, sequence_len: usize) -> Result<Self> {
        let resolution = 360.0 / stride_angle * gear_ratio / sequence_len as f64;
        if !resolution.is_finite() || resolution < 1.0 {
            return Err(Error::Config(format!(
                "stride {} and gear ratio {} give no usable resolution",
                stride_angle, gear_ratio
            )));
        }
        Self::new(resolution as u32)
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn steps(&self) -> i32 {
        self.steps
    }

    pub fn step_angle(&self) -> f64 {
        360.0 / self.resolution as f64
    }

    pub fn angle(&self) -> f64 {
        f64::from(self.steps) * 360.0 / f64::from(self.resolution)
    }

    /// Whole steps covered by `degrees`, rounded down.
    ///
    /// Multiply first: 104° at 45 steps per turn is exactly 13 steps.
    pub fn steps_for(&self, degrees: f64) -> u32 {
        (degrees.abs() * f64::from(self.resolution) / 360.0).floor() as u32
    }

    /// Signed distance from here to `target`, in degrees times resolution.
    /// Exact for the current position, so a target already reached stays
    /// below one step.
    fn scaled_offset(&self, target: f64) -> f64 {
        target * f64::from(self.resolution) - f64::from(self.steps) * 360.0
    }

    /// Steps left before the shaft reaches the ±180° stop in `direction`.
    pub fn headroom(&self, direction: Direction) -> u32 {
        let half_turn = (self.resolution / 2) as i32;
        let room = match direction {
            Direction::Clockwise => half_turn - self.steps,
            Direction::CounterClockwise => half_turn + self.steps,
        };
        room.max(0) as u32
    }

    fn advance(&mut self, direction: Direction) {
        if self.headroom(direction) == 0 {
            return;
        }
        match direction {
            Direction::Clockwise => self.steps += 1,
            Direction::CounterClockwise => self.steps -= 1,
        }
    }
}

/// Walks the coil table over four output pins and keeps the position
/// model in step with it.
pub struct StepSequencer<P, D> {
    pins: [P; 4],
    delay: D,
    position: MotorPosition,
    entries_per_step: usize,
    index: usize,
}

impl<P: OutputPin, D: DelayNs> StepSequencer<P, D> {
    /// `entries_per_step` table rows are driven per step, 1..=8.
    pub fn new(pins: [P; 4], delay: D, position: MotorPosition, entries_per_step: usize) -> Result<Self> {
        if entries_per_step == 0 || entries_per_step > HALF_STEP_SEQUENCE.len() {
            return Err(Error::Config(format!(
                "coil entries per step must be within 1..={}, got {}",
                HALF_STEP_SEQUENCE.len(),
                entries_per_step
            )));
        }
        Ok(StepSequencer {
            pins,
            delay,
            position,
            entries_per_step,
            index: 0,
        })
    }

    pub fn position(&self) -> &MotorPosition {
        &self.position
    }

    pub fn angle(&self) -> f64 {
        self.position.angle()
    }

    /// Row of the coil table energized last.
    pub fn sequence_index(&self) -> usize {
        self.index
    }

    /// Turn by `degrees` (magnitude) in `direction`, stopping at ±180°.
    /// Returns the number of whole steps taken.
    pub fn rotate_by_angle(&mut self, degrees: f64, step_delay_us: u32, direction: Direction) -> Result<u32> {
        let requested = self.position.steps_for(degrees);
        let steps = requested.min(self.position.headroom(direction));
        info!(
            "rotate {:?} by {}° -> {} steps from {:.3}°",
            direction,
            degrees,
            steps,
            self.angle()
        );
        self.drive(steps, step_delay_us, direction)?;
        Ok(steps)
    }

    /// Turn to the absolute `target`, clamped to ±180°.
    /// Returns the number of whole steps taken.
    pub fn rotate_to_angle(&mut self, target: f64, step_delay_us: u32) -> Result<u32> {
        let target = target.clamp(-MAX_ANGLE, MAX_ANGLE);
        let offset = self.position.scaled_offset(target);
        let direction = if offset > 0.0 {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        };
        let steps = ((offset.abs() / 360.0).floor() as u32).min(self.position.headroom(direction));
        info!("rotate to {}° -> {} steps {:?}", target, steps, direction);
        self.drive(steps, step_delay_us, direction)?;
        Ok(steps)
    }

    fn drive(&mut self, steps: u32, step_delay_us: u32, direction: Direction) -> Result<()> {
        for _ in 0..steps {
            self.step(step_delay_us, direction)?;
        }
        debug!("motor at {:.3}° ({} steps)", self.angle(), self.position.steps());
        Ok(())
    }

    // One step: the configured slice of the table in order, then the position update.
    fn step(&mut self, step_delay_us: u32, direction: Direction) -> Result<()> {
        let len = HALF_STEP_SEQUENCE.len();
        let n = self.entries_per_step;
        match direction {
            Direction::Clockwise => {
                for i in 0..n {
                    self.activate(i, step_delay_us)?;
                }
            }
            Direction::CounterClockwise => {
                for i in (len - n..len).rev() {
                    self.activate(i, step_delay_us)?;
                }
            }
        }
        self.position.advance(direction);
        Ok(())
    }

    fn activate(&mut self, row: usize, step_delay_us: u32) -> Result<()> {
        self.index = row;
        for (pin, &on) in self.pins.iter_mut().zip(&HALF_STEP_SEQUENCE[row]) {
            if on {
                pin.set_high().map_err(pin_error)?;
            } else {
                pin.set_low().map_err(pin_error)?;
            }
        }
        self.delay.delay_us(step_delay_us);
        Ok(())
    }
}
