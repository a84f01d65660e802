//! Epoch-to-calendar helpers for storage paths and request signing
//!
//! Uses the standard days-from-civil inversion so no calendar crate is
//! needed for the two formats the providers require.

/// Gregorian (year, month, day) for a day count since 1970-01-01
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// `YYYY/MM/DD` prefix for object keys, from epoch seconds
pub(crate) fn date_prefix(epoch_secs: u64) -> String {
    let (y, m, d) = civil_from_days((epoch_secs / 86_400) as i64);
    format!("{:04}/{:02}/{:02}", y, m, d)
}

/// SigV4 timestamps from epoch seconds: (`YYYYMMDDTHHMMSSZ`, `YYYYMMDD`)
pub(crate) fn amz_timestamp(epoch_secs: u64) -> (String, String) {
    let (y, m, d) = civil_from_days((epoch_secs / 86_400) as i64);
    let secs_of_day = epoch_secs % 86_400;
    let (hh, mm, ss) = (secs_of_day / 3600, (secs_of_day % 3600) / 60, secs_of_day % 60);
    let date = format!("{:04}{:02}{:02}", y, m, d);
    (format!("{}T{:02}{:02}{:02}Z", date, hh, mm, ss), date)
}

/// Current epoch seconds
pub(crate) fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
