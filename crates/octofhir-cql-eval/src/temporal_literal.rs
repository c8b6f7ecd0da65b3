// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parse the ISO-8601 date/dateTime strings a FHIR resource's JSON fields
//! carry (`"2024-03-15"`, `"2024-03-15T10:00:00Z"`) into [`Value`]. This is
//! a separate, small parser from the one lowering uses for CQL date
//! literals (`@2024-03-15`) — those share the same ISO shape but arrive
//! from a different place (resource JSON, not source text), so there is no
//! cross-crate function worth exposing for one `trim_start_matches('@')`
//! difference.

use octofhir_cql_core::{PrecisionDate, PrecisionDateTime, PrecisionTime, Value};

pub fn parse_date_or_datetime(text: &str) -> Option<Value> {
    if text.contains('T') {
        parse_datetime(text).map(Value::DateTime)
    } else {
        parse_date(text).map(Value::Date)
    }
}

pub fn parse_date(text: &str) -> Option<PrecisionDate> {
    let mut parts = text.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: Option<u32> = parts.next().and_then(|m| m.parse().ok());
    let day: Option<u32> = parts.next().and_then(|d| d.parse().ok());
    Some(match (month, day) {
        (Some(m), Some(d)) => PrecisionDate::full(year, m, d),
        (Some(m), None) => PrecisionDate::year_month(year, m),
        _ => PrecisionDate::year(year),
    })
}

pub fn parse_datetime(text: &str) -> Option<PrecisionDateTime> {
    let (date_part, rest) = text.split_once('T')?;
    let date = parse_date(date_part)?;
    if rest.is_empty() {
        return Some(PrecisionDateTime::new(date, None, None));
    }

    let (time_part, tz_part) = split_timezone(rest);
    let time = parse_time(time_part);
    let tz_offset_minutes = tz_part.and_then(parse_tz_offset);
    Some(PrecisionDateTime::new(date, time, tz_offset_minutes))
}

pub fn parse_time(text: &str) -> Option<PrecisionTime> {
    if text.is_empty() {
        return None;
    }
    let mut segments = text.splitn(2, '.');
    let hms = segments.next()?;
    let frac = segments.next();

    let mut hms_parts = hms.split(':');
    let hour: u32 = hms_parts.next()?.parse().ok()?;
    let minute: Option<u32> = hms_parts.next().and_then(|m| m.parse().ok());
    let second: Option<u32> = hms_parts.next().and_then(|s| s.parse().ok());
    let millisecond = frac.map(|f| {
        let mut padded = f.to_string();
        while padded.len() < 3 {
            padded.push('0');
        }
        padded.truncate(3);
        padded.parse::<u32>().unwrap_or(0)
    });

    Some(PrecisionTime::new(hour, minute, second, millisecond))
}

fn split_timezone(text: &str) -> (&str, Option<&str>) {
    if let Some(stripped) = text.strip_suffix('Z') {
        return (stripped, Some("Z"));
    }
    if let Some(pos) = text.rfind(['+', '-']) {
        if pos > 0 {
            return (&text[..pos], Some(&text[pos..]));
        }
    }
    (text, None)
}

fn parse_tz_offset(tz: &str) -> Option<i32> {
    if tz == "Z" {
        return Some(0);
    }
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let tz = &tz[1..];
    let mut parts = tz.splitn(2, ':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    Some(sign * (hours * 60 + minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_only() {
        assert_eq!(parse_date("2024-03-15"), Some(PrecisionDate::full(2024, 3, 15)));
    }

    #[test]
    fn parses_partial_date() {
        assert_eq!(parse_date("2024-03"), Some(PrecisionDate::year_month(2024, 3)));
    }

    #[test]
    fn parses_datetime_with_z_offset() {
        let dt = parse_datetime("2024-03-15T10:30:00Z").unwrap();
        assert_eq!(dt.date, PrecisionDate::full(2024, 3, 15));
    }

    #[test]
    fn parses_datetime_with_numeric_offset() {
        let dt = parse_datetime("2024-03-15T10:30:00-05:00").unwrap();
        assert_eq!(dt.date, PrecisionDate::full(2024, 3, 15));
    }
}
