use once_cell::sync::Lazy;
use regex::Regex;
use time::Duration;

use crate::error::{Error, Result};

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(-?[0-9]+(?:\.[0-9]+)?)(ms|s|m|h|d|w)").expect("Invalid regex")
});

fn to_seconds(number: f64, unit: &str) -> f64 {
    match unit {
        "ms" => number / 1_000.0,
        "s" => number,
        "m" => number * 60.0,
        "h" => number * 3_600.0,
        "d" => number * 86_400.0,
        _ => number * 604_800.0,
    }
}

/**
 * \brief 解析形如 "1h30m"、"-2.5d" 的时长字符串。
 *
 * "0" 与 "-1" 表示不设时长，返回 `Ok(None)`；找不到任何 数值+单位 组合时报错。
 * 匹配之外的字符会被忽略。
 */
pub fn parse_duration(duration: &str) -> Result<Option<Duration>> {
    if duration == "-1" || duration == "0" {
        return Ok(None);
    }

    let mut matched = false;
    let mut total = Duration::ZERO;
    for caps in DURATION_RE.captures_iter(duration) {
        matched = true;
        let number: f64 = caps[1]
            .parse()
            .map_err(|_| Error::InvalidDuration(duration.to_string()))?;
        let part = Duration::checked_seconds_f64(to_seconds(number, &caps[2]))
            .ok_or_else(|| Error::InvalidDuration(duration.to_string()))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| Error::InvalidDuration(duration.to_string()))?;
    }

    if !matched {
        return Err(Error::InvalidDuration(duration.to_string()));
    }
    Ok(Some(total))
}
