//! PZEM-01x family power monitor behind a Modbus/TCP gateway.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::tcp;
use tokio_modbus::prelude::*;
use tracing::{debug, warn};

use crate::config::SensorConfig;
use crate::domain::sensor::{RawSample, SampleSource};

const MAX_RETRIES: u32 = 3;

/// Input register block shared by the PZEM-014/016: voltage in 0.1 V, then
/// current in 0.001 A and power in 0.1 W as low/high register pairs.
const REG_BASE: u16 = 0x0000;
const REG_COUNT: u16 = 5;

pub struct PzemSensor {
    context: Mutex<tokio_modbus::client::Context>,
    unit_id: u8,
    io_timeout: Duration,
}

impl PzemSensor {
    pub async fn connect(cfg: &SensorConfig) -> Result<Self> {
        let addr = cfg.addr.parse().context("invalid sensor gateway address")?;
        let io_timeout = Duration::from_secs(cfg.timeout_secs.max(1));

        debug!(addr = %cfg.addr, unit = cfg.unit_id, "connecting to PZEM gateway");

        let ctx = timeout(io_timeout, tcp::connect(addr))
            .await
            .context("connection timeout")?
            .context("failed to connect")?;

        Ok(Self {
            context: Mutex::new(ctx),
            unit_id: cfg.unit_id,
            io_timeout,
        })
    }

    async fn read_registers(&self) -> Result<Vec<u16>> {
        for attempt in 1..=MAX_RETRIES {
            {
                let mut ctx = self.context.lock().await;
                ctx.set_slave(Slave(self.unit_id));
                match timeout(self.io_timeout, ctx.read_input_registers(REG_BASE, REG_COUNT)).await
                {
                    Ok(Ok(registers)) => return Ok(registers),
                    Ok(Err(e)) => {
                        warn!(attempt, error = %e, "pzem read failed");
                        if attempt == MAX_RETRIES {
                            return Err(e.into());
                        }
                    }
                    Err(_) => {
                        warn!(attempt, "pzem read timeout");
                        if attempt == MAX_RETRIES {
                            anyhow::bail!("pzem read timeout after {MAX_RETRIES} attempts");
                        }
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
        }
        unreachable!("retry loop always returns")
    }
}

#[async_trait]
impl SampleSource for PzemSensor {
    async fn read_sample(&self) -> Result<RawSample> {
        let registers = self.read_registers().await?;
        Ok(decode(&registers))
    }
}

fn decode(registers: &[u16]) -> RawSample {
    fn pair(lo: u16, hi: u16) -> u32 {
        (hi as u32) << 16 | lo as u32
    }
    if registers.len() < REG_COUNT as usize {
        return RawSample::ZERO;
    }
    RawSample {
        voltage_v: registers[0] as f64 * 0.1,
        current_a: pair(registers[1], registers[2]) as f64 * 0.001,
        power_w: pair(registers[3], registers[4]) as f64 * 0.1,
    }
}
