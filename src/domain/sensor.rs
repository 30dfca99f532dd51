use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use super::sanitize::sanitize;

/// Mains is considered absent below this voltage; the whole reading is
/// discarded then, so sensor noise can never turn into accounted energy.
pub const MIN_MAINS_VOLTAGE: f64 = 1.0;

/// One raw instrument reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RawSample {
    pub voltage_v: f64,
    pub current_a: f64,
    pub power_w: f64,
}

impl RawSample {
    pub const ZERO: RawSample = RawSample {
        voltage_v: 0.0,
        current_a: 0.0,
        power_w: 0.0,
    };

    /// Sanitize all channels and apply the mains-absent gate: with no usable
    /// voltage there is no trustworthy current or power either.
    pub fn sanitized(self) -> RawSample {
        let voltage = sanitize(self.voltage_v);
        if voltage < MIN_MAINS_VOLTAGE {
            return RawSample::ZERO;
        }
        RawSample {
            voltage_v: voltage,
            current_a: sanitize(self.current_a),
            power_w: sanitize(self.power_w),
        }
    }
}

/// Supplier of raw readings: real hardware, a gateway, or a simulation.
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn read_sample(&self) -> Result<RawSample>;
}

/// Household-shaped load for running the meter with no hardware attached.
#[cfg(feature = "sim")]
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    pub base_power_w: f64,
    pub noise_w: f64,
}

#[cfg(feature = "sim")]
impl Default for SimulatedSensor {
    fn default() -> Self {
        Self {
            base_power_w: 230.0,
            noise_w: 25.0,
        }
    }
}

#[cfg(feature = "sim")]
#[async_trait]
impl SampleSource for SimulatedSensor {
    async fn read_sample(&self) -> Result<RawSample> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let power = (self.base_power_w + rng.gen_range(-1.0..1.0) * self.noise_w).max(0.0);
        let voltage = 230.0 + rng.gen_range(-1.0..1.0) * 2.0;
        Ok(RawSample {
            voltage_v: voltage,
            current_a: power / voltage,
            power_w: power,
        })
    }
}
