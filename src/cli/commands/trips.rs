//! Trips command - date-range search through the cache

use crate::api::Trip;
use crate::cli::args::{OutputFormat, TripsArgs};
use crate::context::AppContext;
use crate::error::TriplogResult;
use crate::ui::{TaskSpinner, UiContext};
use console::style;
use tracing::debug;

/// Execute the trips command
pub async fn execute(args: TripsArgs, app: &AppContext) -> TriplogResult<()> {
    if args.refresh {
        let version = app.trips().invalidate_range(args.start, args.end);
        debug!("Invalidated {} to {} (v{})", args.start, args.end, version);
    }

    let ctx = UiContext::detect().with_json(args.format != OutputFormat::Table);
    let mut spinner = TaskSpinner::new(&ctx);
    if ctx.use_fancy_output() {
        spinner.start("Loading trips...");
    }
    let trips = app.trips().search_by_date_range(args.start, args.end).await;
    spinner.clear();
    let trips = trips?;

    match args.format {
        OutputFormat::Table => print_trip_table(&trips),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&trips)?),
        OutputFormat::Plain => {
            for trip in &trips {
                println!("{} {} {}", trip.trip_date, trip.time_slot, trip.tracking_number);
            }
        }
    }

    Ok(())
}

fn print_trip_table(trips: &[Trip]) {
    if trips.is_empty() {
        println!("No trips in this range.");
        return;
    }

    println!(
        "{:<12} {:<12} {:<16} {:<24} {:>9} {:>9}",
        "DATE", "SLOT", "TRACKING", "DESTINATION", "KM", "FEES"
    );
    println!("{}", "-".repeat(87));

    for trip in trips {
        let fees = trip.highway_fee + trip.parking_fee + trip.other_fees;
        println!(
            "{:<12} {:<12} {:<16} {:<24} {:>9.1} {:>9.2}",
            trip.trip_date,
            trip.time_slot,
            trip.tracking_number,
            truncate(&trip.end_location, 24),
            trip.distance,
            fees
        );
    }

    println!();
    println!("Total: {} trip(s)", style(trips.len()).bold());
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let head: String = text.chars().take(width - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("Depot", 24), "Depot");
        assert_eq!(truncate("广州市天河区体育西路一号仓库", 8), "广州市天河...");
    }
}
