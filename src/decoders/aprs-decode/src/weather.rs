// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Weather station data following a `_` symbol: `ddd/sssgXXXtXXXrXXX...`.

use aprs_core::WeatherReport;

const MPH_TO_MS: f64 = 0.44704;
const HUNDREDTH_INCH_TO_MM: f64 = 0.254;

enum Field {
    Gust,
    Temperature,
    Rain1h,
    Rain24h,
    RainMidnight,
    Humidity,
    Pressure,
    /// Recognised but not reported (luminosity, snow, raw rain counter).
    Skip,
}

fn field(tag: u8) -> Option<(Field, usize)> {
    Some(match tag {
        b'g' | b'G' => (Field::Gust, 3),
        b't' | b'T' => (Field::Temperature, 3),
        b'r' => (Field::Rain1h, 3),
        b'p' => (Field::Rain24h, 3),
        b'P' => (Field::RainMidnight, 3),
        b'h' => (Field::Humidity, 2),
        b'b' => (Field::Pressure, 5),
        b'L' | b'l' | b's' | b'#' => (Field::Skip, 3),
        _ => return None,
    })
}

/// Parse weather fields. `wind` is direction and speed (m/s) already taken
/// from a compressed course/speed; otherwise the text starts with
/// `ddd/sss`. Returns the report and the unparsed remainder.
pub(crate) fn parse(text: &str, wind: Option<(u16, f64)>) -> (WeatherReport, &str) {
    let mut wx = WeatherReport::default();
    let mut rest = text;

    match wind {
        Some((dir, speed)) => {
            wx.wind_direction = (dir > 0).then_some(dir);
            wx.wind_speed = Some(speed);
        }
        None => {
            if rest.as_bytes().get(3) == Some(&b'/') {
                if let (Some(dir), Some(speed)) = (rest.get(..3), rest.get(4..7)) {
                    wx.wind_direction = value(dir).map(|d| d as u16);
                    wx.wind_speed = value(speed).map(|s| f64::from(s) * MPH_TO_MS);
                    rest = &rest[7..];
                }
            }
        }
    }

    while let Some(&tag) = rest.as_bytes().first() {
        let Some((kind, width)) = field(tag) else {
            break;
        };
        let Some(raw) = rest.get(1..1 + width) else {
            break;
        };
        let placeholder = raw.bytes().all(|c| c == b'.' || c == b' ');
        let v = value(raw);
        if v.is_none() && !placeholder {
            break;
        }
        match kind {
            Field::Gust => wx.wind_gust = v.map(|g| f64::from(g) * MPH_TO_MS),
            Field::Temperature => wx.temperature = v.map(|f| (f64::from(f) - 32.0) * 5.0 / 9.0),
            Field::Rain1h => wx.rain_1h = v.map(|r| f64::from(r) * HUNDREDTH_INCH_TO_MM),
            Field::Rain24h => wx.rain_24h = v.map(|r| f64::from(r) * HUNDREDTH_INCH_TO_MM),
            Field::RainMidnight => wx.rain_midnight = v.map(|r| f64::from(r) * HUNDREDTH_INCH_TO_MM),
            Field::Humidity => wx.humidity = v.map(|h| if h == 0 { 100 } else { h.clamp(0, 100) as u8 }),
            Field::Pressure => wx.pressure = v.map(|b| f64::from(b) / 10.0),
            Field::Skip => {}
        }
        rest = &rest[1 + width..];
    }

    wx.summary = summary(&wx);
    (wx, rest)
}

fn value(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}

fn summary(wx: &WeatherReport) -> String {
    let mut parts = Vec::new();
    if let Some(speed) = wx.wind_speed {
        match wx.wind_direction {
            Some(dir) => parts.push(format!("wind {}° {:.1} m/s", dir, speed)),
            None => parts.push(format!("wind {:.1} m/s", speed)),
        }
    }
    if let Some(gust) = wx.wind_gust {
        parts.push(format!("gust {:.1} m/s", gust));
    }
    if let Some(t) = wx.temperature {
        parts.push(format!("{:.1} °C", t));
    }
    if let Some(h) = wx.humidity {
        parts.push(format!("{}%", h));
    }
    if let Some(p) = wx.pressure {
        parts.push(format!("{:.1} hPa", p));
    }
    if let Some(r) = wx.rain_1h.filter(|r| *r > 0.0) {
        parts.push(format!("rain {:.1} mm/h", r));
    }
    parts.join(", ")
}
