use crate::schema::MonthlyAggregate;
use crate::utils::{round_half_up, safe_ratio, MonthKey, MONTH_ABBREVIATIONS};
use std::collections::HashMap;

/// Rewrites recognized keys into one spelling ("2024-01", "Jan") so that
/// differently formatted labels for the same month land in one bucket.
pub fn canonical_month_key(key: &str) -> String {
    match MonthKey::parse(key) {
        MonthKey::YearMonth { year, month } => format!("{:04}-{:02}", year, month),
        MonthKey::Abbreviation(month) => MONTH_ABBREVIATIONS[month as usize - 1].to_string(),
        MonthKey::Unrecognized(raw) => raw.trim().to_string(),
    }
}

/// Stable chronological sort: "YYYY-MM" keys by year and month, then
/// abbreviations Jan..Dec, then anything else in encounter order.
pub fn sort_chronologically<T, F>(items: &mut [T], month_key: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by_cached_key(|item| MonthKey::parse(month_key(item)).sort_rank());
}

/// Growth of each value over its predecessor in percent, one decimal.
/// The first entry, and any entry whose predecessor is zero, is 0.
pub fn growth_rates(invoiced: &[f64]) -> Vec<f64> {
    let mut rates = Vec::with_capacity(invoiced.len());
    for (i, current) in invoiced.iter().enumerate() {
        if i == 0 {
            rates.push(0.0);
            continue;
        }
        let previous = invoiced[i - 1];
        let rate = if previous == 0.0 {
            0.0
        } else {
            round_half_up(safe_ratio(current - previous, previous) * 100.0, 1)
        };
        rates.push(rate);
    }
    rates
}

/// Builds the monthly series from `(month_key, invoiced, paid)` entries given
/// in encounter order. Repeated months are summed into one aggregate.
pub fn compose_series<K, I>(entries: I) -> Vec<MonthlyAggregate>
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, f64, f64)>,
{
    let mut buckets: Vec<(String, f64, f64)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (key, invoiced, paid) in entries {
        let key = canonical_month_key(key.as_ref());
        match positions.get(&key) {
            Some(&idx) => {
                buckets[idx].1 += invoiced;
                buckets[idx].2 += paid;
            }
            None => {
                positions.insert(key.clone(), buckets.len());
                buckets.push((key, invoiced, paid));
            }
        }
    }

    sort_chronologically(&mut buckets, |bucket| bucket.0.as_str());

    let invoiced: Vec<f64> = buckets.iter().map(|bucket| bucket.1).collect();
    let rates = growth_rates(&invoiced);

    buckets
        .into_iter()
        .zip(rates)
        .map(|((month_key, invoiced_total, paid_total), growth_rate)| MonthlyAggregate {
            month_key,
            invoiced_total,
            paid_total,
            outstanding: invoiced_total - paid_total,
            growth_rate,
        })
        .collect()
}
