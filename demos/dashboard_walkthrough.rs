use chrono::NaiveDate;
use receivables_metrics::*;
use serde_json::json;
use std::sync::Arc;

fn invoice(id: &str, client: &str, amount: f64, paid: f64, date: &str, days: f64, status: &str) -> InvoiceRow {
    InvoiceRow {
        id: id.to_string(),
        client_name: Some(client.to_string()),
        invoice_reference: Some(format!("2024-{}", id)),
        invoice_amount: Some(amount),
        paid_amount: Some(paid),
        date_invoiced: Some(date.to_string()),
        days_to_pay: Some(days),
        payment_status: Some(status.to_string()),
        is_late: None,
    }
}

fn print_resolution<T>(label: &str, resolution: &Resolution<T>) {
    let tiers: Vec<String> = resolution
        .attempts
        .iter()
        .map(|a| format!("{:?}={:?}", a.tier, a.outcome))
        .collect();
    println!(
        "  {:<18} {:?} from {:?}  [{}]",
        label,
        resolution.status,
        resolution.provenance,
        tiers.join(", ")
    );
}

#[tokio::main]
async fn main() {
    println!("📊 Receivables Dashboard Walkthrough\n");

    let config = MetricsConfig::default();
    let rows = vec![
        invoice("1001", "Harbor Foods", 1200.0, 1200.0, "2024-01-08", 14.0, "Fully Paid"),
        invoice("1002", "Harbor Foods", 800.0, 300.0, "2024-02-02", 41.0, "partially paid"),
        invoice("1003", "Harbor Foods", 1500.0, 0.0, "2024-03-15T10:00:00Z", 0.0, "Overdue"),
        invoice("1004", "Harbor Foods", 650.0, 700.0, "2024-03-20", 9.0, "Over Paid"),
    ];

    let store = Arc::new(
        InMemoryStore::new()
            .with_summary(
                "Northwind",
                SummaryRecord {
                    total_invoiced: Some(48_000.0),
                    total_paid: Some(41_250.0),
                    payment_status_breakdown: Some(json!({ "Fully Paid": 31, "Unpaid": 4 })),
                    ..SummaryRecord::default()
                },
            )
            .with_invoice_rows(rows, &config),
    );
    let resolver = TierResolver::from_store(store.clone(), config);

    for entity in [
        Entity::new("nw", "Northwind"),
        Entity::new("hf", "Harbor Foods"),
        Entity::new("zz", "Unlisted Ltd"),
    ] {
        println!("🏢 {}", entity.name);
        let snapshot = load_dashboard(&resolver, &entity).await;
        print_resolution("metrics", &snapshot.metrics);
        print_resolution("monthly series", &snapshot.monthly);
        print_resolution("status breakdown", &snapshot.status_breakdown);
        print_resolution("payment trends", &snapshot.payment_trends);

        let metrics = &snapshot.metrics.value;
        println!(
            "  Invoiced ${:.2}  Paid ${:.2}  Outstanding ${:.2}",
            metrics.total_invoiced, metrics.total_paid, metrics.outstanding_amount
        );
        if !metrics.absent_fields.is_empty() {
            println!("  Not reported: {}", metrics.absent_fields.join(", "));
        }
        for month in &snapshot.monthly.value {
            println!(
                "    {:<8} ${:>10.2}  growth {:>6.1}%",
                month.month_key, month.invoiced_total, month.growth_rate
            );
        }
        for entry in &snapshot.status_breakdown.value.to_percentages().entries {
            println!("    {:<14} {:>5.1}%", entry.status.as_str(), entry.value);
        }
        if snapshot.uses_fallback() {
            println!("  ⚠️  Some figures are placeholder data");
        }
        println!();
    }

    println!("🔎 Invoice explorer (Harbor Foods, $500 and up since February, largest first)");
    let records = store.fetch_transactions("Harbor Foods").await.unwrap_or_default();
    let filter = InvoiceFilter::new()
        .with_amount_range(Some(500.0), None)
        .with_date_range(NaiveDate::from_ymd_opt(2024, 2, 1), None);
    let sort = InvoiceSort::new(SortField::Amount, SortDirection::Descending);
    let page = explore_invoices(&records, &filter, sort, 1, resolver.config().page_size);
    for record in &page.items {
        println!(
            "  {:<10} ${:>8.2}  {}",
            record.reference.as_deref().unwrap_or(&record.id),
            record.invoiced(),
            normalize_status(record.payment_status.as_deref())
        );
    }
    println!("  Late invoices: {}", late_records(&records).len());

    println!("\n🖥️  Panel");
    let panel = MetricsPanel::new();
    panel.load(&resolver, Entity::new("hf", "Harbor Foods")).await;
    let shown = panel.snapshot();
    println!("  {:?} via {:?}", shown.status, shown.provenance);
}
