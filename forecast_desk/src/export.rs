//! Tabular export of the record set and its totals

use crate::calendar::MonthKey;
use crate::error::Result;
use crate::record::ForecastRecord;
use crate::store::ForecastTotals;
use std::collections::BTreeSet;
use std::io::Write;

const FIXED_COLUMNS: [&str; 10] = [
    "id",
    "forecast_type",
    "cost_code",
    "description",
    "method",
    "weight",
    "budget",
    "cost_to_complete",
    "estimated_at_completion",
    "variance",
];

/// Write one row per record followed by a `TOTAL` footer
///
/// Month columns are the union of every record's window, in calendar order.
pub fn write_csv<W: Write>(records: &[ForecastRecord], totals: &ForecastTotals, writer: W) -> Result<()> {
    let months: Vec<MonthKey> = records
        .iter()
        .flat_map(|r| r.monthly_distribution().keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut csv = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(months.iter().map(MonthKey::to_string));
    csv.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.id().to_string(),
            record.forecast_type().to_string(),
            record.cost_code().to_string(),
            record.description().to_string(),
            record.method().to_string(),
            record.weight().to_string(),
            money(record.budget()),
            money(record.cost_to_complete()),
            money(record.estimated_at_completion()),
            money(record.variance()),
        ];
        row.extend(months.iter().map(|month| {
            record
                .monthly_distribution()
                .get(month)
                .map(|amount| money(*amount))
                .unwrap_or_default()
        }));
        csv.write_record(&row)?;
    }

    let mut footer = vec![
        "TOTAL".to_string(),
        String::new(),
        String::new(),
        format!("{} records", totals.record_count),
        String::new(),
        String::new(),
        money(totals.budget),
        money(totals.cost_to_complete),
        money(totals.estimated_at_completion),
        money(totals.variance),
    ];
    footer.extend(
        months
            .iter()
            .map(|month| money(totals.monthly.get(month).copied().unwrap_or(0.0))),
    );
    csv.write_record(&footer)?;

    csv.flush()?;
    Ok(())
}

fn money(amount: f64) -> String {
    format!("{:.2}", amount)
}
