//! Test fixtures: source file URLs and timestamps.

use chrono::{DateTime, TimeZone, Utc};
use ingest_core::{Fingerprint, UpdatedFile};

pub const BASE_URL: &str = "https://opendata.dwd.de/weather";

/// MOSMIX forecast file.
pub fn mosmix_url() -> String {
    format!(
        "{}/local_forecasts/mos/MOSMIX_S/all_stations/kml/MOSMIX_S_LATEST_240.kmz",
        BASE_URL
    )
}

/// Current observations for one station.
pub fn current_url(station: &str) -> String {
    format!("{}/weather_reports/poi/{}-BEOB.csv", BASE_URL, station)
}

/// Recent hourly observation archive for one DWD station.
pub fn recent_url(parameter: &str, dwd_station_id: &str) -> String {
    format!(
        "{}/climate/hourly/{}/recent/stundenwerte_{}_{}_akt.zip",
        BASE_URL,
        parameter,
        parameter.to_uppercase(),
        dwd_station_id
    )
}

/// SYNOP bulletin file.
pub fn synop_url(n: u32) -> String {
    format!(
        "{}/weather/synop/Z__C_EDZW_20240115083000_bda01,synop_bufr_GER_999999_999999__MW_{:03}.json.bz2",
        BASE_URL, n
    )
}

/// File no parser handles.
pub fn unknown_url() -> String {
    format!("{}/misc/README.txt", BASE_URL)
}

/// Wraps a URL with an etag fingerprint.
pub fn updated(url: impl Into<String>) -> UpdatedFile {
    let url = url.into();
    UpdatedFile::new(
        url.clone(),
        Fingerprint {
            etag: Some(format!("\"{:x}\"", url.len())),
            last_modified: None,
            file_size: Some(1024),
        },
    )
}

pub fn updated_all(urls: &[String]) -> Vec<UpdatedFile> {
    urls.iter().map(|u| updated(u.as_str())).collect()
}

/// Midnight UTC on the given day.
pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// Whole hours on the given day.
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}
