//! Utility functions for identifier minting and week formatting

use bech32::Bech32m;
use chrono::Datelike;
use uuid7::uuid7;

use crate::model::Day;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Human-readable label for a week range, e.g. "Feb 3-9, 2025".
pub fn week_label(start: Day, end: Day) -> String {
    let s = start.date();
    let e = end.date();

    if s.year() == e.year() && s.month() == e.month() {
        format!("{} {}-{}, {}", s.format("%b"), s.day(), e.day(), s.year())
    } else if s.year() == e.year() {
        format!(
            "{} {}-{} {}, {}",
            s.format("%b"),
            s.day(),
            e.format("%b"),
            e.day(),
            s.year()
        )
    } else {
        format!(
            "{} {}, {}-{} {}, {}",
            s.format("%b"),
            s.day(),
            s.year(),
            e.format("%b"),
            e.day(),
            e.year()
        )
    }
}
