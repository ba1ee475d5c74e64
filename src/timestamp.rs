use std::cmp;
use std::fmt;
use std::time;

const NANOS_PER_SEC: u32 = 1_000_000_000;
const SECS_PER_DAY: i64 = 86_400;

/// A point in time: seconds since the Unix epoch, plus nanoseconds past the second. Always UTC.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Timestamp {
    sec: i64,
    nano: u32,
}

impl Timestamp {
    /// Create a timestamp from a raw seconds + nanoseconds value. Fails if the nanoseconds
    /// spill into the next second.
    pub fn from_utc(sec: i64, nano: u32) -> Option<Timestamp> {
        if nano >= NANOS_PER_SEC {
            None
        } else {
            Some(Timestamp { sec, nano })
        }
    }

    /// Seconds from `earlier` to `self`, negative if `earlier` is actually later.
    pub fn since(&self, earlier: Timestamp) -> f64 {
        let secs = (self.sec as i128 - earlier.sec as i128) as f64;
        let nanos = self.nano as f64 - earlier.nano as f64;
        secs + nanos / NANOS_PER_SEC as f64
    }

    /// The current system time. A clock set before the Unix epoch reads as the epoch.
    pub fn now_utc() -> Timestamp {
        match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
            Ok(t) => Timestamp {
                sec: t.as_secs() as i64,
                nano: t.subsec_nanos(),
            },
            Err(_) => Timestamp::default(),
        }
    }
}

impl cmp::Ord for Timestamp {
    fn cmp(&self, other: &Timestamp) -> cmp::Ordering {
        if self.sec == other.sec {
            self.nano.cmp(&other.nano)
        } else {
            self.sec.cmp(&other.sec)
        }
    }
}

impl cmp::PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Timestamp) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Civil date from days since 1970-01-01, in the proleptic Gregorian calendar.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

/// RFC 3339, with the fraction trimmed to milliseconds and omitted when zero.
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let days = self.sec.div_euclid(SECS_PER_DAY);
        let secs = self.sec.rem_euclid(SECS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            year,
            month,
            day,
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )?;
        let millis = self.nano / 1_000_000;
        if millis != 0 {
            write!(f, ".{:03}", millis)?;
        }
        f.write_str("Z")
    }
}
