use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};

use super::sanitize::sanitize;

/// Cost per kWh used until the operator sets one.
pub const DEFAULT_TARIFF: f64 = 10.0;

const SECONDS_PER_DAY: i64 = 86_400;
/// Watt-seconds per kWh.
const WS_PER_KWH: f64 = 3_600_000.0;

/// Day index of an epoch instant (days since 1970-01-01 UTC).
pub fn day_number(epoch: i64) -> i64 {
    epoch.div_euclid(SECONDS_PER_DAY)
}

/// Calendar month key of an epoch instant, encoded YYYYMM (UTC).
pub fn month_key(epoch: i64) -> i32 {
    let dt: DateTime<Utc> = DateTime::from_timestamp(epoch, 0).unwrap_or_default();
    dt.year() * 100 + dt.month() as i32
}

/// The durable energy accounting registers.
///
/// All energy fields are kWh and stay non-negative. Day/month keys are unset
/// until the first rollover check after boot initializes them.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountingState {
    pub daily_kwh: f64,
    pub yesterday_kwh: f64,
    pub month_kwh: f64,
    pub last_month_kwh: f64,
    pub tariff: f64,
    pub last_day_num: Option<i64>,
    pub month_id: Option<i32>,
    pub last_month_id: Option<i32>,
    pub timer_accum_sec: u64,
}

impl Default for AccountingState {
    fn default() -> Self {
        Self {
            daily_kwh: 0.0,
            yesterday_kwh: 0.0,
            month_kwh: 0.0,
            last_month_kwh: 0.0,
            tariff: DEFAULT_TARIFF,
            last_day_num: None,
            month_id: None,
            last_month_id: None,
            timer_accum_sec: 0,
        }
    }
}

impl AccountingState {
    /// Fold one smoothed power sample, held constant over `dt`, into today's
    /// total. Rectangular integration; negative power counts as zero load so
    /// the counter never runs backwards.
    pub fn accumulate(&mut self, smoothed_w: f64, dt: Duration) {
        let p = sanitize(smoothed_w).max(0.0);
        self.daily_kwh += p * dt.as_secs_f64() / WS_PER_KWH;
    }

    /// Close out finished day/month buckets for `epoch`. Returns true when
    /// anything changed and the state should be persisted right away.
    ///
    /// The day is evaluated before the month so a finished day folds into the
    /// month total before any month close-out reads it. Both transitions fire
    /// at most once per distinct boundary: the guard compares the stored key,
    /// not elapsed time.
    pub fn check_rollover(&mut self, epoch: i64) -> bool {
        let today = day_number(epoch);
        let this_month = month_key(epoch);
        let mut changed = false;

        match self.last_day_num {
            None => {
                self.last_day_num = Some(today);
                changed = true;
            }
            Some(day) if day != today => {
                self.month_kwh += self.daily_kwh;
                self.yesterday_kwh = self.daily_kwh;
                self.daily_kwh = 0.0;
                self.last_day_num = Some(today);
                changed = true;
            }
            Some(_) => {}
        }

        match self.month_id {
            None => {
                self.month_id = Some(this_month);
                changed = true;
            }
            Some(month) if month != this_month => {
                self.last_month_kwh = self.month_kwh;
                self.last_month_id = Some(month);
                self.month_id = Some(this_month);
                self.month_kwh = 0.0;
                changed = true;
            }
            Some(_) => {}
        }

        changed
    }

    /// Zero every energy bucket. Tariff and calendar keys stay put.
    pub fn reset_energy(&mut self) {
        self.daily_kwh = 0.0;
        self.yesterday_kwh = 0.0;
        self.month_kwh = 0.0;
        self.last_month_kwh = 0.0;
    }
}
