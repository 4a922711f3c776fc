//! Postgres table schemas.
//!
//! Only the columns the scheduler and retention logic reason about are
//! fixed here; measurement columns are nullable and owned by the parsers.

/// Station catalogue, one row per station and observation type.
pub const CREATE_SOURCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id serial PRIMARY KEY,
    observation_type text NOT NULL,
    wmo_station_id varchar(5),
    dwd_station_id varchar(5),
    station_name varchar(255),
    lat real,
    lon real,
    height real,
    first_record timestamptz,
    last_record timestamptz,

    CONSTRAINT sources_key UNIQUE (observation_type, wmo_station_id, dwd_station_id),
    CONSTRAINT sources_bounds CHECK (first_record IS NULL OR last_record IS NULL OR first_record <= last_record)
)
"#;

pub const CREATE_SOURCES_STATION_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS sources_station
    ON sources (wmo_station_id, dwd_station_id, observation_type)
"#;

/// Hourly observations, forecasts and current conditions.
pub const CREATE_WEATHER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS weather (
    timestamp timestamptz NOT NULL,
    source_id int NOT NULL REFERENCES sources ON DELETE CASCADE,
    cloud_cover smallint,
    dew_point real,
    precipitation real,
    pressure_msl real,
    relative_humidity smallint,
    sunshine smallint,
    temperature real,
    visibility int,
    wind_direction smallint,
    wind_speed real,
    wind_gust_speed real,
    condition text,

    CONSTRAINT weather_key UNIQUE (timestamp, source_id)
)
"#;

pub const CREATE_WEATHER_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS weather_source_id_timestamp
    ON weather (source_id, timestamp)
"#;

/// Raw SYNOP station messages.
pub const CREATE_SYNOP_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS synop (
    timestamp timestamptz NOT NULL,
    source_id int NOT NULL REFERENCES sources ON DELETE CASCADE,
    cloud_cover smallint,
    dew_point real,
    precipitation_10 real,
    pressure_msl real,
    relative_humidity smallint,
    sunshine_10 smallint,
    temperature real,
    visibility int,
    wind_direction_10 smallint,
    wind_speed_10 real,
    wind_gust_speed_10 real,

    CONSTRAINT synop_key UNIQUE (timestamp, source_id)
)
"#;

pub const CREATE_SYNOP_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS synop_source_id_timestamp
    ON synop (source_id, timestamp)
"#;

/// Idempotency ledger of ingested file versions.
pub const CREATE_PARSED_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS parsed_files (
    url text PRIMARY KEY,
    last_modified timestamptz,
    file_size bigint,
    parsed_at timestamptz NOT NULL DEFAULT now()
)
"#;

/// Returns all DDL statements in dependency order.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_SOURCES_TABLE,
        CREATE_SOURCES_STATION_INDEX,
        CREATE_WEATHER_TABLE,
        CREATE_WEATHER_SOURCE_INDEX,
        CREATE_SYNOP_TABLE,
        CREATE_SYNOP_SOURCE_INDEX,
        CREATE_PARSED_FILES_TABLE,
    ]
}
