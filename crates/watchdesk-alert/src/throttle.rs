use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Mutex;

struct DayWindow {
    day: NaiveDate,
    count: u32,
}

/// Per-alert daily fire counter.
///
/// The window is calendar-day aligned in the gate's configured time zone
/// (not rolling 24h): at local midnight every counter resets. Counters are
/// keyed by alert id, which is globally unique, so one gate serves all
/// tenants; the mutex makes increment-and-compare atomic under concurrent
/// matches for the same alert.
pub struct ThrottleGate {
    tz: Tz,
    counters: Mutex<HashMap<String, DayWindow>>,
}

impl ThrottleGate {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true and increments the counter while the alert is under its
    /// daily limit, false once the limit is reached. A limit of 0 disables
    /// throttling.
    pub fn allow(&self, alert_id: &str, limit: u32, now: DateTime<Utc>) -> bool {
        if limit == 0 {
            return true;
        }

        let today = now.with_timezone(&self.tz).date_naive();
        let mut counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
        let window = counters.entry(alert_id.to_string()).or_insert(DayWindow {
            day: today,
            count: 0,
        });

        if window.day != today {
            window.day = today;
            window.count = 0;
        }

        if window.count >= limit {
            tracing::debug!(alert_id, limit, "Alert throttled (daily limit reached)");
            return false;
        }

        window.count += 1;
        true
    }

    /// Drop the counter for a deleted alert so its id cannot pin memory.
    pub fn forget(&self, alert_id: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
        counters.remove(alert_id);
    }
}
