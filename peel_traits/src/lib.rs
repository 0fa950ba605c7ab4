pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Carriage travel direction. `Down` moves toward the lower limit switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// Microstep resolution select lines of the stepper driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicrostepRes {
    Quarter,
    Sixteenth,
}

impl MicrostepRes {
    /// Microsteps per full motor step.
    pub fn factor(self) -> u32 {
        match self {
            MicrostepRes::Quarter => 4,
            MicrostepRes::Sixteenth => 16,
        }
    }
}

/// Black-box pulse driver: direction, step, enable and resolution lines.
/// Pin writes cannot fail, so the interface is infallible.
pub trait StepPulser {
    fn set_direction(&mut self, dir: Direction);
    /// Emit one step pulse in the currently set direction.
    fn pulse(&mut self);
    /// Cut or restore motor current.
    fn set_enabled(&mut self, enabled: bool);
    fn set_resolution(&mut self, res: MicrostepRes);
}

/// Motion engine capability: schedule microstep runs and report pulse timing.
pub trait Motion {
    /// Schedule `|microsteps|` pulses in the sign's direction at the current
    /// speed. Preempts any in-flight run.
    fn start_move(&mut self, microsteps: i32);
    /// Cancel the remaining pulse count immediately. No deceleration ramp.
    fn stop(&mut self);
    /// Emit the next pulse if due and return microseconds until the following
    /// pulse, or 0 when no run is active.
    fn next_action(&mut self) -> u64;
    /// Change the pulse interval for subsequent pulses.
    fn set_speed(&mut self, rpm: u32);
    fn set_resolution(&mut self, res: MicrostepRes);
    /// Enable/disable motor current. Separate from move start/stop.
    fn set_enabled(&mut self, enabled: bool);
    fn enabled(&self) -> bool;
    /// Pulses still to emit for the in-flight run.
    fn remaining(&self) -> u32;
    fn speed_rpm(&self) -> u32;
}

/// Load-cell amplifier capability (HX711-style).
pub trait LoadCell {
    /// True when a conversion is ready to read.
    fn is_ready(&mut self) -> bool;
    /// Read the next sample in calibrated units (grams).
    fn read_units(&mut self) -> Result<f32, Box<dyn std::error::Error + Send + Sync>>;
    /// Average of `samples` raw readings, uncalibrated.
    fn read_average(&mut self, samples: u8)
    -> Result<f32, Box<dyn std::error::Error + Send + Sync>>;
    /// Zero the reading against the current no-load condition.
    fn tare(&mut self, samples: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_scale(&mut self, scale: f32);
    fn set_offset(&mut self, offset: i32);
    fn scale(&self) -> f32;
    fn offset(&self) -> i32;
}

/// Two limit switches, active HIGH, read once per tick.
pub trait LimitSwitches {
    fn lower_engaged(&mut self) -> bool;
    fn upper_engaged(&mut self) -> bool;
}

/// Host byte stream (serial link). Reads are non-blocking; writes are
/// best-effort, as on a UART.
pub trait HostLink {
    fn read_byte(&mut self) -> Option<u8>;
    /// Write one line, terminated for the host side.
    fn write_line(&mut self, line: &str);
}

/// Non-volatile storage of typed values at fixed byte addresses.
/// Erased storage reads as 0xFF bytes, so an f32 field reads NaN.
pub trait NvStore {
    fn read_f32(&mut self, addr: usize) -> f32;
    fn write_f32(&mut self, addr: usize, value: f32);
    fn read_i32(&mut self, addr: usize) -> i32;
    fn write_i32(&mut self, addr: usize, value: i32);
}

impl<N: NvStore + ?Sized> NvStore for Box<N> {
    fn read_f32(&mut self, addr: usize) -> f32 {
        (**self).read_f32(addr)
    }
    fn write_f32(&mut self, addr: usize, value: f32) {
        (**self).write_f32(addr, value);
    }
    fn read_i32(&mut self, addr: usize) -> i32 {
        (**self).read_i32(addr)
    }
    fn write_i32(&mut self, addr: usize, value: i32) {
        (**self).write_i32(addr, value);
    }
}
