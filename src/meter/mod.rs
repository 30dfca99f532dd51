use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::domain::accounting::AccountingState;
use crate::domain::sensor::{RawSample, SampleSource};
use crate::domain::smoothing::SmoothingWindow;
use crate::domain::status::{self, StatusReport};
use crate::domain::timer::ElapsedTimer;
use crate::persistence::{Store, StoreError};

/// Shared application state handed to the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub meter: Arc<Meter>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let store = Store::new(cfg.storage.path.clone());

        let mut accounting = AccountingState::default();
        match store.load_into(&mut accounting).await {
            Ok(outcome) => debug!(?outcome, "accounting state loaded"),
            Err(e) => warn!(error = %e, "state load failed, starting from defaults"),
        }

        let sensor = default_sensor(&cfg).await?;
        let meter = Arc::new(Meter::new(
            sensor,
            Arc::new(SystemClock),
            store,
            accounting,
            cfg.meter.smoothing_window,
            cfg.meter.sample_interval(),
        ));

        Ok(Self { cfg, meter })
    }
}

#[cfg(feature = "modbus")]
async fn default_sensor(cfg: &Config) -> Result<Arc<dyn SampleSource>> {
    Ok(Arc::new(
        crate::hardware::pzem::PzemSensor::connect(&cfg.sensor).await?,
    ))
}

#[cfg(all(feature = "sim", not(feature = "modbus")))]
async fn default_sensor(_cfg: &Config) -> Result<Arc<dyn SampleSource>> {
    info!("no hardware sensor configured, using simulated load");
    Ok(Arc::new(crate::domain::sensor::SimulatedSensor::default()))
}

#[cfg(not(any(feature = "sim", feature = "modbus")))]
async fn default_sensor(_cfg: &Config) -> Result<Arc<dyn SampleSource>> {
    anyhow::bail!("built without a sample source; enable the `sim` or `modbus` feature")
}

pub fn spawn_meter_tasks(state: AppState, cfg: Config) {
    let meter = state.meter.clone();
    tokio::spawn(async move {
        meter.run().await;
    });

    let meter2 = state.meter.clone();
    tokio::spawn(async move {
        meter2.persist_loop(cfg.meter.save_interval()).await;
    });
}

/// The metering driver: owns the smoothing window, accounting registers and
/// elapsed timer, and is the only writer of accumulation state.
pub struct Meter {
    sensor: Arc<dyn SampleSource>,
    clock: Arc<dyn Clock>,
    store: Store,
    nominal_dt: Duration,
    started: Instant,
    inner: RwLock<MeterState>,
}

struct MeterState {
    accounting: AccountingState,
    window: SmoothingWindow,
    timer: ElapsedTimer,
    last_sample: RawSample,
    smoothed_w: f64,
    last_tick: Option<Instant>,
    ticks: u64,
}

impl Meter {
    pub fn new(
        sensor: Arc<dyn SampleSource>,
        clock: Arc<dyn Clock>,
        store: Store,
        accounting: AccountingState,
        window_capacity: usize,
        nominal_dt: Duration,
    ) -> Self {
        let timer = ElapsedTimer::from_accumulated_secs(accounting.timer_accum_sec);
        Self {
            sensor,
            clock,
            store,
            nominal_dt,
            started: Instant::now(),
            inner: RwLock::new(MeterState {
                accounting,
                window: SmoothingWindow::new(window_capacity),
                timer,
                last_sample: RawSample::ZERO,
                smoothed_w: 0.0,
                last_tick: None,
                ticks: 0,
            }),
        }
    }

    /// Main metering loop: sample on the configured cadence, check for a
    /// calendar rollover every iteration.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.nominal_dt);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.sample_tick().await;
            self.check_rollover().await;
        }
    }

    /// Periodic write-behind of the durable state.
    pub async fn persist_loop(&self, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.save().await;
        }
    }

    /// One acquisition step: read, gate, smooth, integrate.
    ///
    /// A failed read counts as a zero reading; sensor faults must never stop
    /// the loop or surface as API errors. dt comes from the monotonic clock;
    /// the first tick after boot uses the nominal interval instead of a
    /// meaningless span since process start.
    pub async fn sample_tick(&self) {
        let raw = match self.sensor.read_sample().await {
            Ok(sample) => sample,
            Err(e) => {
                debug!(error = %e, "sensor read failed, treating as zero");
                RawSample::ZERO
            }
        };
        let sample = raw.sanitized();
        let now = Instant::now();

        let mut st = self.inner.write().await;
        let dt = st
            .last_tick
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(self.nominal_dt);
        st.last_tick = Some(now);
        st.last_sample = sample;
        let smoothed = st.window.observe(sample.power_w);
        st.smoothed_w = smoothed;
        st.accounting.accumulate(smoothed, dt);
        st.ticks += 1;
        debug!(
            voltage_v = sample.voltage_v,
            smoothed_w = smoothed,
            daily_kwh = st.accounting.daily_kwh,
            "sample tick"
        );
    }

    /// Fold finished day/month buckets; persists immediately when one closes.
    pub async fn check_rollover(&self) {
        let epoch = self.clock.epoch_seconds();
        let changed = {
            let mut st = self.inner.write().await;
            st.accounting.check_rollover(epoch)
        };
        if changed {
            info!(epoch, "calendar boundary, persisting");
            self.save().await;
        }
    }

    /// Snapshot the durable registers and write them out. A failure is
    /// logged and skipped; memory stays authoritative until the next attempt.
    pub async fn save(&self) {
        let snapshot = {
            let mut st = self.inner.write().await;
            st.accounting.timer_accum_sec = st.timer.accumulated_seconds();
            st.accounting.clone()
        };
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "state save failed, keeping in-memory state");
        }
    }

    pub async fn set_tariff(&self, tariff: f64) {
        {
            let mut st = self.inner.write().await;
            st.accounting.tariff = tariff;
        }
        info!(tariff, "tariff updated");
        self.save().await;
    }

    pub async fn reset_energy(&self) {
        {
            let mut st = self.inner.write().await;
            st.accounting.reset_energy();
        }
        info!("energy counters reset");
        self.save().await;
    }

    pub async fn start_timer(&self) {
        let transitioned = {
            let mut st = self.inner.write().await;
            st.timer.start(Instant::now())
        };
        if transitioned {
            info!("timer started");
            self.save().await;
        }
    }

    pub async fn stop_timer(&self) {
        let transitioned = {
            let mut st = self.inner.write().await;
            st.timer.stop(Instant::now())
        };
        if transitioned {
            info!("timer stopped");
            self.save().await;
        }
    }

    pub async fn reset_timer(&self) {
        {
            let mut st = self.inner.write().await;
            st.timer.reset();
            st.accounting.timer_accum_sec = 0;
        }
        info!("timer reset");
        self.save().await;
    }

    /// Wipe the persistent record and reset the in-memory state to defaults.
    pub async fn format_store(&self) -> Result<(), StoreError> {
        self.store.erase().await?;
        let mut st = self.inner.write().await;
        st.accounting = AccountingState::default();
        st.timer.reset();
        info!("persistent store formatted");
        Ok(())
    }

    /// Current status payload; read-only with respect to accumulation.
    pub async fn status(&self) -> StatusReport {
        let st = self.inner.read().await;
        let now = Instant::now();
        status::project(
            st.last_sample,
            st.smoothed_w,
            &st.accounting,
            self.clock.epoch_seconds(),
            st.timer.is_running(),
            st.timer.elapsed_seconds(now),
        )
    }

    /// Plain-text internals dump for field debugging.
    pub async fn debug_report(&self) -> String {
        let st = self.inner.read().await;
        format!(
            "open-energy-meter {}\n\
             uptime_sec: {}\n\
             ticks: {}\n\
             store: {}\n\
             raw: {:.1} V, {:.3} A, {:.1} W\n\
             smoothed_w: {:.1}\n\
             daily_kwh: {:.6}\n\
             yesterday_kwh: {:.6}\n\
             month_kwh: {:.6}\n\
             last_month_kwh: {:.6}\n\
             tariff: {:.4}\n\
             last_day_num: {:?}\n\
             month_id: {:?}\n\
             last_month_id: {:?}\n\
             timer_running: {}\n\
             timer_sec: {}\n",
            env!("CARGO_PKG_VERSION"),
            self.started.elapsed().as_secs(),
            st.ticks,
            self.store.path().display(),
            st.last_sample.voltage_v,
            st.last_sample.current_a,
            st.last_sample.power_w,
            st.smoothed_w,
            st.accounting.daily_kwh,
            st.accounting.yesterday_kwh,
            st.accounting.month_kwh,
            st.accounting.last_month_kwh,
            st.accounting.tariff,
            st.accounting.last_day_num,
            st.accounting.month_id,
            st.accounting.last_month_id,
            st.timer.is_running(),
            st.timer.elapsed_seconds(Instant::now()),
        )
    }
}
