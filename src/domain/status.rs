use serde::Serialize;

use super::accounting::AccountingState;
use super::sanitize::sanitize;
use super::sensor::RawSample;

/// Externally visible meter status. The field names are the wire contract
/// the dashboard and any scraping clients rely on.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub voltage: f64,
    pub power: f64,
    pub current: f64,
    pub current_display: String,
    pub today_kwh: f64,
    pub yesterday_kwh: f64,
    pub month_kwh: f64,
    pub last_month_kwh: f64,
    pub tariff: f64,
    pub cost_today: f64,
    pub cost_month: f64,
    pub last_month_cost: f64,
    pub energy_per_min: f64,
    pub cost_per_min: f64,
    pub month_id: i32,
    pub last_month_id: i32,
    pub epoch: i64,
    pub timer_running: bool,
    pub timer_sec: u64,
    pub timer_display: String,
}

/// Derive the status payload from the meter's last readings.
///
/// Read-only: re-uses the smoother's last output rather than re-sampling, so
/// the displayed power is the same figure the accounting integrated. Every
/// numeric goes through `sanitize`, so the payload can never carry NaN or
/// infinity downstream.
pub fn project(
    sample: RawSample,
    smoothed_w: f64,
    accounting: &AccountingState,
    epoch: i64,
    timer_running: bool,
    timer_sec: u64,
) -> StatusReport {
    let power = sanitize(smoothed_w);
    let current = sanitize(sample.current_a);
    let tariff = sanitize(accounting.tariff);
    // Wh consumed per minute at the current smoothed draw.
    let energy_per_min = sanitize(power / 60.0);

    StatusReport {
        voltage: sanitize(sample.voltage_v),
        power,
        current,
        current_display: format_current(current),
        today_kwh: sanitize(accounting.daily_kwh),
        yesterday_kwh: sanitize(accounting.yesterday_kwh),
        month_kwh: sanitize(accounting.month_kwh),
        last_month_kwh: sanitize(accounting.last_month_kwh),
        tariff,
        cost_today: sanitize(accounting.daily_kwh * tariff),
        cost_month: sanitize(accounting.month_kwh * tariff),
        last_month_cost: sanitize(accounting.last_month_kwh * tariff),
        energy_per_min,
        cost_per_min: sanitize(energy_per_min / 1000.0 * tariff),
        month_id: accounting.month_id.unwrap_or(0),
        last_month_id: accounting.last_month_id.unwrap_or(0),
        epoch,
        timer_running,
        timer_sec,
        timer_display: format_timer(timer_sec),
    }
}

/// Human-readable current magnitude; milliamps below 1 A.
pub fn format_current(amps: f64) -> String {
    if amps.abs() < 1.0 {
        format!("{:.0} mA", amps * 1000.0)
    } else {
        format!("{:.2} A", amps)
    }
}

/// H:MM:SS clock face, hours unpadded and unbounded.
pub fn format_timer(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}
