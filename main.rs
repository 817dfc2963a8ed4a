use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{debug, error, info, warn, LevelFilter};

use rppal::gpio::OutputPin;
use rppal::hal::Delay;

use envmotor::bme280::Bme280;
use envmotor::bus;
use envmotor::command::MotorCommand;
use envmotor::config::Config;
use envmotor::stepper::{self, MotorPosition, StepSequencer, HALF_STEP_SEQUENCE};

type Motor = StepSequencer<OutputPin, Delay>;

// Lines typed on stdin stand in for messages on the motor topic.
fn spawn_command_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn handle_command(text: &str, motor: &mut Motor, cfg: &Config) {
    let command = match text.parse::<MotorCommand>() {
        Ok(command) => command,
        Err(e) => {
            warn!("{}", e);
            return;
        }
    };
    match command.apply(motor, cfg.nudge_degrees, cfg.step_delay_us) {
        Ok(steps) => info!("{:?}: {} steps, motor at {:.2}°", command, steps, motor.angle()),
        Err(e) => error!("{:?} failed: {}", command, e),
    }
}

fn main() -> anyhow::Result<()> {
    let cfg = Config::parse();
    let level = if cfg.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();
    cfg.validate()?;

    let i2c = bus::open_i2c(cfg.i2c_bus).context("opening I2C bus")?;
    let mut sensor =
        Bme280::new(i2c, cfg.address, Delay::new(), cfg.poll_interval_ms).context("initialising BME280")?;

    let position = MotorPosition::from_geometry(cfg.stride_angle, cfg.gear_ratio, HALF_STEP_SEQUENCE.len())?;
    let coils = stepper::open_coils(cfg.coil_pins()?).context("claiming coil pins")?;
    let mut motor: Motor = StepSequencer::new(coils, Delay::new(), position, cfg.coil_entries_per_step)?;
    info!(
        "motor ready: {} steps per revolution, {} rows per step",
        position.resolution(),
        cfg.coil_entries_per_step
    );

    let commands = spawn_command_reader();
    let mut stdin_open = true;

    loop {
        while stdin_open {
            match commands.try_recv() {
                Ok(text) => handle_command(&text, &mut motor, &cfg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => stdin_open = false,
            }
        }

        match sensor.do_measure() {
            Ok(measurement) => {
                debug!("raw {:?}, t_fine {}", sensor.raw(), sensor.t_fine());
                sensor.dump();
                if let Some(altitude) = sensor.altitude(cfg.sea_level_hpa) {
                    info!("Altitude    : {:7.1} m", altitude);
                }
                println!("{}", measurement);
            }
            Err(e) => {
                error!("measurement failed: {}", e);
                if let Err(e) = sensor.reset() {
                    error!("sensor reset failed: {}", e);
                }
            }
        }

        thread::sleep(Duration::from_secs(cfg.interval));
    }
}
