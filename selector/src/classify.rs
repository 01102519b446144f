use indexmap::IndexMap;
use rustc_hash::FxHashSet;

/// Used flag of every audited metric, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageMap(IndexMap<String, bool>);

impl UsageMap {
    /// `false` for names that were never classified.
    pub fn is_used(&self, metric: &str) -> bool {
        self.0.get(metric).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn used(&self) -> impl Iterator<Item = &str> {
        self.with_flag(true)
    }

    pub fn unused(&self) -> impl Iterator<Item = &str> {
        self.with_flag(false)
    }

    pub fn used_count(&self) -> usize {
        self.0.values().filter(|used| **used).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, used)| (name.as_str(), *used))
    }

    fn with_flag(&self, flag: bool) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(move |(_, used)| **used == flag)
            .map(|(name, _)| name.as_str())
    }
}

/// Marks a metric as used when its name occurs anywhere in at least one
/// query.
///
/// Matching is a case-sensitive substring test with no word boundaries:
/// `metric_a` counts as used by a query mentioning `metric_a_total`. Cost is
/// O(metrics × distinct queries × query length), which dominates the audit
/// on large accounts.
pub fn classify<M, Q>(metrics: &[M], queries: &[Q]) -> UsageMap
where
    M: AsRef<str>,
    Q: AsRef<str>,
{
    // Repeated queries cannot change the outcome.
    let mut seen = FxHashSet::default();
    let queries = queries
        .iter()
        .map(AsRef::as_ref)
        .filter(|q| seen.insert(*q))
        .collect::<Vec<&str>>();

    let usage = metrics
        .iter()
        .map(|metric| {
            let metric = metric.as_ref();
            let used = queries.iter().any(|query| query.contains(metric));
            (metric.to_owned(), used)
        })
        .collect();
    UsageMap(usage)
}
