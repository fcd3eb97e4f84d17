use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use receivables_metrics::*;
use std::sync::Arc;
use tokio::sync::Notify;

const INVOICE_TABLE: &str = "\
id,Client Name,Invoice Reference,Invoice Amount,Paid Amount,Date Invoiced,No. Days taken to Pay,Payment Status,Is Late
1,Acme Corp,2024-1001,100.0,100.0,2024-01-05,12,Fully Paid,false
2,Acme Corp,2024-1002,200.0,150.0,2024-02-11T09:30:00Z,45,Partially Paid,
3,Acme Corp,2024-1003,50.0,,2024-02-20 10:00:00,,Unpaid,false
4,Globex,2024-1004,75.0,75.0,not a date,5,Paid,false
";

fn read_invoice_table(data: &str) -> Result<Vec<InvoiceRow>> {
    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn record(id: &str, invoiced: f64, paid: f64, date: Option<NaiveDate>) -> TransactionRecord {
    TransactionRecord {
        id: id.to_string(),
        reference: None,
        entity_name: "Acme Corp".to_string(),
        invoiced_amount: Some(invoiced),
        paid_amount: Some(paid),
        invoice_date: date,
        days_to_pay: None,
        payment_status: None,
        is_late: false,
    }
}

fn acme() -> Entity {
    Entity::new("acme", "Acme Corp")
}

fn globex() -> Entity {
    Entity::new("globex", "Globex")
}

/// Holds the summary fetch for one entity until released.
struct GatedSummaryStore {
    inner: Arc<InMemoryStore>,
    gated_entity: String,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl SummaryStore for GatedSummaryStore {
    async fn fetch_summary(&self, entity_name: &str) -> receivables_metrics::Result<Option<SummaryRecord>> {
        if entity_name == self.gated_entity {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.fetch_summary(entity_name).await
    }
}

fn summary_with_total(total_invoiced: f64) -> SummaryRecord {
    SummaryRecord {
        total_invoiced: Some(total_invoiced),
        total_paid: Some(0.0),
        ..SummaryRecord::default()
    }
}

#[tokio::test]
async fn test_two_month_raw_scenario() {
    let store = Arc::new(InMemoryStore::new().with_transactions(
        "Acme Corp",
        vec![
            record("a", 100.0, 100.0, NaiveDate::from_ymd_opt(2024, 1, 4)),
            record("b", 200.0, 150.0, NaiveDate::from_ymd_opt(2024, 2, 9)),
        ],
    ));
    let resolver = TierResolver::from_store(store, MetricsConfig::default());

    let resolution = resolver.resolve_metrics(&acme()).await;
    let metrics = &resolution.value;

    assert_eq!(resolution.provenance, Provenance::RawRecords);
    assert_eq!(resolution.status, MetricsStatus::Ready);
    assert!((metrics.total_invoiced - 300.0).abs() < 1e-9);
    assert!((metrics.total_paid - 250.0).abs() < 1e-9);
    assert!((metrics.outstanding_amount - 50.0).abs() < 1e-9);
    assert_eq!(metrics.monthly.len(), 2);
    assert_eq!(metrics.monthly[1].month_key, "2024-02");
    assert!((metrics.monthly[1].growth_rate - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_entity_without_data_gets_flagged_fallback() {
    let store = Arc::new(InMemoryStore::new());
    let resolver = TierResolver::from_store(store.clone(), MetricsConfig::default());

    let resolution = resolver.resolve_metrics(&acme()).await;

    assert_eq!(resolution.status, MetricsStatus::FallbackUsed);
    assert_eq!(resolution.value.status, MetricsStatus::FallbackUsed);
    assert_eq!(resolution.provenance, Provenance::Fallback);
    assert!(!resolution.value.is_empty());
    assert_eq!(store.call_count(Provenance::Summary), 1);
    assert_eq!(store.call_count(Provenance::MonthlyTable), 1);
    assert_eq!(store.call_count(Provenance::RawRecords), 1);
}

#[test]
fn test_label_normalization_scenario() {
    let labels = ["Fully Paid", "fully  paid", "PARTIALLY paid", "unpaid", "???"];
    let normalized: Vec<CanonicalStatus> =
        labels.iter().map(|l| normalize_status(Some(*l))).collect();

    assert_eq!(
        normalized,
        vec![
            CanonicalStatus::FullyPaid,
            CanonicalStatus::FullyPaid,
            CanonicalStatus::PartiallyPaid,
            CanonicalStatus::Unknown,
            CanonicalStatus::Unknown,
        ]
    );
    assert_eq!(normalize_status(None), CanonicalStatus::Unknown);

    for status in CanonicalStatus::ALL {
        assert_eq!(normalize_status(Some(status.as_str())), status);
    }
}

#[tokio::test]
async fn test_summary_tier_short_circuits() {
    let store = Arc::new(
        InMemoryStore::new()
            .with_summary("Acme Corp", summary_with_total(900.0))
            .with_transactions(
                "Acme Corp",
                vec![record("a", 1.0, 1.0, NaiveDate::from_ymd_opt(2024, 1, 1))],
            ),
    );
    let resolver = TierResolver::from_store(store.clone(), MetricsConfig::default());

    let resolution = resolver.resolve_metrics(&acme()).await;

    assert_eq!(resolution.provenance, Provenance::Summary);
    assert!((resolution.value.total_invoiced - 900.0).abs() < 1e-9);
    assert_eq!(store.call_count(Provenance::MonthlyTable), 0);
    assert_eq!(store.call_count(Provenance::RawRecords), 0);
}

#[tokio::test]
async fn test_unreachable_tier_is_skipped_not_fatal() {
    let store = Arc::new(
        InMemoryStore::new()
            .unavailable(Provenance::Summary)
            .with_monthly_rows(
                "Acme Corp",
                vec![MonthlyRow {
                    month: Some("2024-03".to_string()),
                    invoiced_amount: Some(80.0),
                    paid_amount: Some(20.0),
                    ..MonthlyRow::default()
                }],
            ),
    );
    let resolver = TierResolver::from_store(store, MetricsConfig::default());

    let resolution = resolver.resolve_metrics(&acme()).await;

    assert_eq!(resolution.provenance, Provenance::MonthlyTable);
    assert!(resolution.had_access_failure());
    assert!((resolution.value.outstanding_amount - 60.0).abs() < 1e-9);
    assert!(resolution
        .value
        .absent_fields
        .contains(&"average_days_to_pay".to_string()));
}

#[tokio::test]
async fn test_late_result_for_previous_selection_is_discarded() {
    let inner = Arc::new(
        InMemoryStore::new()
            .with_summary("Acme Corp", summary_with_total(111.0))
            .with_summary("Globex", summary_with_total(222.0)),
    );
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let gated = Arc::new(GatedSummaryStore {
        inner: inner.clone(),
        gated_entity: "Acme Corp".to_string(),
        entered: entered.clone(),
        release: release.clone(),
    });
    let resolver = TierResolver::new(gated, inner.clone(), inner, MetricsConfig::default());
    let panel = MetricsPanel::new();

    let load_acme = panel.load(&resolver, acme());
    let load_globex = async {
        entered.notified().await;
        let applied = panel.load(&resolver, globex()).await;
        release.notify_one();
        applied
    };
    let (acme_applied, globex_applied) = tokio::join!(load_acme, load_globex);

    assert!(!acme_applied);
    assert!(globex_applied);

    let shown = panel.snapshot();
    assert_eq!(shown.entity, Some(globex()));
    assert_eq!(shown.status, MetricsStatus::Ready);
    let metrics = shown.metrics.expect("metrics for the current selection");
    assert!((metrics.total_invoiced - 222.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_panel_status_transitions() {
    let store = Arc::new(InMemoryStore::new().with_summary("Acme Corp", summary_with_total(5.0)));
    let resolver = TierResolver::from_store(store, MetricsConfig::default());
    let panel = MetricsPanel::new();

    assert_eq!(panel.snapshot().status, MetricsStatus::Idle);
    assert!(panel.load(&resolver, acme()).await);
    assert_eq!(panel.snapshot().status, MetricsStatus::Ready);
    assert_eq!(panel.snapshot().provenance, Some(Provenance::Summary));

    assert!(panel.load(&resolver, globex()).await);
    assert_eq!(panel.snapshot().status, MetricsStatus::FallbackUsed);
}

#[tokio::test]
async fn test_csv_invoice_table_through_resolver() -> Result<()> {
    let config = MetricsConfig::default();
    let rows = read_invoice_table(INVOICE_TABLE)?;
    assert_eq!(rows.len(), 4);

    let store = Arc::new(InMemoryStore::new().with_invoice_rows(rows, &config));
    let resolver = TierResolver::from_store(store, config);

    let snapshot = load_dashboard(&resolver, &acme()).await;
    let metrics = &snapshot.metrics.value;

    assert_eq!(snapshot.metrics.provenance, Provenance::RawRecords);
    assert_eq!(metrics.total_invoices, 3);
    assert!((metrics.total_invoiced - 350.0).abs() < 1e-9);
    assert!((metrics.total_paid - 250.0).abs() < 1e-9);
    assert_eq!(metrics.outstanding_invoices, 2);
    // Invoice 2 has no late flag but took 45 days.
    assert_eq!(metrics.late_count, 1);
    assert!((metrics.late_percentage - 33.0).abs() < 1e-9);
    assert!((metrics.average_days_to_pay - 28.5).abs() < 1e-9);

    let keys: Vec<&str> = snapshot
        .monthly
        .value
        .iter()
        .map(|m| m.month_key.as_str())
        .collect();
    assert_eq!(keys, vec!["2024-01", "2024-02"]);
    assert!((snapshot.monthly.value[1].growth_rate - 150.0).abs() < 1e-9);

    let breakdown = &snapshot.status_breakdown.value;
    assert_eq!(breakdown.get(CanonicalStatus::FullyPaid), 1.0);
    assert_eq!(breakdown.get(CanonicalStatus::PartiallyPaid), 1.0);
    assert_eq!(breakdown.get(CanonicalStatus::Unpaid), 1.0);

    let globex_metrics = resolver.resolve_metrics(&globex()).await;
    assert_eq!(globex_metrics.provenance, Provenance::RawRecords);
    // Unparsable date: counted in totals, absent from the series.
    assert!((globex_metrics.value.total_invoiced - 75.0).abs() < 1e-9);
    assert!(globex_metrics.value.monthly.is_empty());
    Ok(())
}

#[test]
fn test_monthly_totals_match_grand_totals_for_dated_records() {
    let aggregator = RawRecordAggregator::new(MonthGranularity::YearMonth);

    for count in [1usize, 5, 17, 40] {
        let records: Vec<TransactionRecord> = (0..count)
            .map(|i| {
                let month = (i % 12) as u32 + 1;
                let year = 2023 + (i / 12) as i32;
                record(
                    &format!("inv-{}", i),
                    (i as f64 + 1.0) * 12.5,
                    (i as f64) * 7.25,
                    NaiveDate::from_ymd_opt(year, month, 1),
                )
            })
            .collect();

        let aggregation = aggregator.aggregate(&records);
        let metrics = &aggregation.metrics;
        let monthly_invoiced: f64 = metrics.monthly.iter().map(|m| m.invoiced_total).sum();
        let monthly_paid: f64 = metrics.monthly.iter().map(|m| m.paid_total).sum();

        assert!((monthly_invoiced - metrics.total_invoiced).abs() < 1e-6);
        assert!((monthly_paid - metrics.total_paid).abs() < 1e-6);
        assert!(metrics
            .monthly
            .iter()
            .all(|m| (m.outstanding - (m.invoiced_total - m.paid_total)).abs() < 1e-9));
        assert_eq!(metrics.monthly[0].growth_rate, 0.0);
    }
}

#[test]
fn test_short_month_granularity_collapses_years() {
    let aggregator = RawRecordAggregator::new(MonthGranularity::ShortMonth);
    let records = vec![
        record("a", 10.0, 0.0, NaiveDate::from_ymd_opt(2023, 3, 1)),
        record("b", 20.0, 0.0, NaiveDate::from_ymd_opt(2024, 3, 1)),
        record("c", 5.0, 0.0, NaiveDate::from_ymd_opt(2024, 1, 1)),
    ];

    let monthly = aggregator.monthly(&records);
    let keys: Vec<&str> = monthly.iter().map(|m| m.month_key.as_str()).collect();
    assert_eq!(keys, vec!["Jan", "Mar"]);
    assert!((monthly[1].invoiced_total - 30.0).abs() < 1e-9);
    assert!((monthly[1].growth_rate - 500.0).abs() < 1e-9);
}

#[test]
fn test_invoice_explorer_pages_filtered_records() -> Result<()> {
    let config = MetricsConfig::from_json(r#"{ "page_size": 2 }"#)?;
    let records = convert_invoice_rows(read_invoice_table(INVOICE_TABLE)?, &config);

    let filter = InvoiceFilter::new().with_search("2024-100");
    let matched: Vec<TransactionRecord> = filter.apply(&records).into_iter().cloned().collect();
    assert_eq!(matched.len(), 4);

    let second = paginate(&matched, 2, config.page_size);
    assert_eq!(second.total_pages, 2);
    assert_eq!(second.items.len(), 2);
    assert_eq!(second.items[0].id, "3");

    let newest = explore_invoices(&records, &filter, InvoiceSort::default(), 1, config.page_size);
    let newest_ids: Vec<&str> = newest.items.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(newest_ids, vec!["3", "2"]);

    let quickest = InvoiceSort::new(SortField::DaysToPay, SortDirection::Ascending);
    let last_page = explore_invoices(&records, &filter, quickest, 2, config.page_size);
    let last_ids: Vec<&str> = last_page.items.iter().map(|r| r.id.as_str()).collect();
    // invoice 3 has no payment time yet and stays at the end
    assert_eq!(last_ids, vec!["2", "3"]);

    let late = late_records(&records);
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].reference.as_deref(), Some("2024-1002"));
    Ok(())
}
