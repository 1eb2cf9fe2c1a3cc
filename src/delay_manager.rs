use std::time::Duration;
use std::thread;
use rand::Rng;
use log::debug;

use crate::config::DelayRange;

/// Picks a pause inside `range`. Zero ranges never touch the RNG.
pub fn pick_delay(range: DelayRange) -> Duration {
    if range.max_ms == 0 {
        return Duration::ZERO;
    }
    let (lo, hi) = if range.min_ms <= range.max_ms {
        (range.min_ms, range.max_ms)
    } else {
        (range.max_ms, range.min_ms)
    };
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(lo..=hi))
}

pub fn page_delay(range: DelayRange) {
    pause("Page Delay", range);
}

pub fn record_delay(range: DelayRange) {
    pause("Record Delay", range);
}

fn pause(label: &str, range: DelayRange) {
    let delay = pick_delay(range);
    if delay.is_zero() {
        return;
    }
    debug!("Waiting for {} ms ({})...", delay.as_millis(), label);
    thread::sleep(delay);
}
