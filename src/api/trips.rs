//! Trip records
//!
//! Date-range searches are cached until the end of the local day under
//! [`trip_range_key`]. Writes never invalidate on their own; callers that
//! change trips in a range call [`TripsApi::invalidate_range`] afterwards.

use super::rest::{Filter, Query, RestClient};
use crate::cache::Expiry;
use crate::error::{RemoteFailure, TriplogError, TriplogResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub const TRIPS_TABLE: &str = "trips";

const WITH_EXPAND: &str =
    "*,trips_expand!inner(install_fee,handling_fee,freight_fee,other_fee,is_calculate)";

/// Cache domain key of a date-range search
pub fn trip_range_key(start: NaiveDate, end: NaiveDate) -> String {
    format!("trip_{}_{}", start, end)
}

fn parse_range_key(key: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (start, end) = key.strip_prefix("trip_")?.split_once('_')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

/// Settlement figures kept beside a trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripExpand {
    pub install_fee: f64,
    pub handling_fee: f64,
    pub freight_fee: f64,
    pub other_fee: f64,
    pub is_calculate: bool,
}

/// One logged trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub trip_date: NaiveDate,
    /// `HH:MM-HH:MM`
    #[serde(default)]
    pub time_slot: String,
    #[serde(default)]
    pub tracking_number: String,
    #[serde(default)]
    pub empl_id: String,
    #[serde(default)]
    pub start_location: String,
    #[serde(default)]
    pub end_location: String,
    /// Kilometres
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub highway_fee: f64,
    #[serde(default)]
    pub parking_fee: f64,
    #[serde(default)]
    pub other_fees: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trips_expand: Option<TripExpand>,
    /// Columns not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Trip {
    fn slot_start(&self) -> &str {
        self.time_slot.split('-').next().unwrap_or_default()
    }
}

/// Newest first: by date, then by the start of the time slot
pub fn sort_trips(trips: &mut [Trip]) {
    trips.sort_by(|a, b| match b.trip_date.cmp(&a.trip_date) {
        Ordering::Equal => b.slot_start().cmp(a.slot_start()),
        other => other,
    });
}

fn decode(operation: &str, rows: Vec<Value>) -> TriplogResult<Vec<Trip>> {
    let mut trips: Vec<Trip> = serde_json::from_value(Value::Array(rows)).map_err(|e| {
        TriplogError::Internal(RemoteFailure::new(
            operation,
            format!("malformed trip rows: {}", e),
        ))
    })?;
    sort_trips(&mut trips);
    Ok(trips)
}

fn decode_one(operation: &str, row: Option<Value>) -> TriplogResult<Option<Trip>> {
    Ok(decode(operation, row.into_iter().collect())?.into_iter().next())
}

/// Trip queries and mutations
#[derive(Clone)]
pub struct TripsApi {
    rest: RestClient,
}

impl TripsApi {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Trips dated within `[start, end]`, newest first
    pub async fn search_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> TriplogResult<Vec<Trip>> {
        const OP: &str = "search_trips_by_date_range";
        if end < start {
            return Err(TriplogError::InvalidRequest(RemoteFailure::new(
                OP,
                format!("end date {} is before start date {}", end, start),
            )));
        }

        let query = Query::new()
            .select(WITH_EXPAND)
            .filter(Filter::gte("trip_date", start))
            .filter(Filter::lte("trip_date", end));
        let rows = self
            .rest
            .select_cached(
                TRIPS_TABLE,
                &query,
                &trip_range_key(start, end),
                Expiry::EndOfDay,
            )
            .await
            .map_err(|e| {
                e.during(OP)
                    .with_notice("Failed to load trips for the date range")
            })?;
        decode(OP, rows)
    }

    /// Trips with a tracking number
    pub async fn search_by_tracking_number(
        &self,
        tracking_number: &str,
    ) -> TriplogResult<Vec<Trip>> {
        const OP: &str = "search_trips_by_tracking_number";
        let query = Query::new()
            .select(WITH_EXPAND)
            .filter(Filter::eq("tracking_number", tracking_number));
        let rows = self
            .rest
            .select(TRIPS_TABLE, &query)
            .await
            .map_err(|e| {
                e.during(OP).with_notice(&format!(
                    "Failed to search trips by tracking number {}",
                    tracking_number
                ))
            })?;
        decode(OP, rows)
    }

    /// Trips whose destination contains `fragment`, case-insensitively
    pub async fn search_by_end_location(&self, fragment: &str) -> TriplogResult<Vec<Trip>> {
        const OP: &str = "search_trips_by_end_location";
        let query = Query::new()
            .select(WITH_EXPAND)
            .filter(Filter::ilike("end_location", format!("*{}*", fragment)));
        let rows = self
            .rest
            .select(TRIPS_TABLE, &query)
            .await
            .map_err(|e| {
                e.during(OP)
                    .with_notice(&format!("Failed to search trips by destination {}", fragment))
            })?;
        decode(OP, rows)
    }

    pub async fn get(&self, id: &str) -> TriplogResult<Option<Trip>> {
        const OP: &str = "get_trip";
        let row = self
            .rest
            .get_by_id(TRIPS_TABLE, id)
            .await
            .map_err(|e| e.during(OP).with_notice("Failed to load trip"))?;
        decode_one(OP, row)
    }

    /// Insert a trip. The returned row carries zeroed settlement figures.
    pub async fn add(&self, trip: &Value) -> TriplogResult<Option<Trip>> {
        const OP: &str = "add_trip";
        let row = self
            .rest
            .insert(TRIPS_TABLE, trip)
            .await
            .map_err(|e| e.during(OP).with_notice("Failed to add trip"))?;
        Ok(decode_one(OP, row)?.map(|mut trip| {
            trip.trips_expand.get_or_insert_with(TripExpand::default);
            trip
        }))
    }

    pub async fn edit(&self, id: &str, patch: &Value) -> TriplogResult<Option<Trip>> {
        const OP: &str = "edit_trip";
        let row = self
            .rest
            .update(TRIPS_TABLE, &[Filter::eq("id", id)], patch)
            .await
            .map_err(|e| e.during(OP).with_notice("Failed to update trip"))?;
        decode_one(OP, row)
    }

    /// Soft delete
    pub async fn delete(&self, id: &str) -> TriplogResult<()> {
        self.rest
            .soft_delete(TRIPS_TABLE, id)
            .await
            .map_err(|e| e.during("delete_trip").with_notice("Failed to delete trip"))
    }

    /// Drop every cached search for a date range; returns the new version
    pub fn invalidate_range(&self, start: NaiveDate, end: NaiveDate) -> u64 {
        self.rest.cache().bump(&trip_range_key(start, end))
    }

    /// Bump every known range that covers `date`; returns the bumped keys
    pub fn invalidate_date(&self, date: NaiveDate) -> Vec<String> {
        let cache = self.rest.cache();
        let mut known: Vec<String> = cache.registry().snapshot().into_keys().collect();
        known.extend(cache.keys());
        known.sort();
        known.dedup();

        known
            .into_iter()
            .filter(|key| {
                parse_range_key(key).is_some_and(|(start, end)| start <= date && date <= end)
            })
            .inspect(|key| {
                cache.bump(key);
            })
            .collect()
    }
}
