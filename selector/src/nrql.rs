//! Building NRQL text that embeds caller-provided literals.
//!
//! Every value spliced into a query body goes through [`quote_literal`].

/// Renders `value` as a single-quoted NRQL string literal.
///
/// Backslashes and single quotes are escaped with a backslash, so the
/// literal always ends at the closing quote added here.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if matches!(c, '\\' | '\'') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// Filter clause restricting results to metric names sorting after `last_seen`.
pub fn after_clause(last_seen: &str) -> String {
    format!("AND metricName > {}", quote_literal(last_seen))
}

/// Appends the synthetic-offset filter (if any) and the page limit to `base`.
pub fn paged_query(base: &str, last_seen: Option<&str>, limit: usize) -> String {
    let base = base.trim_end();
    match last_seen {
        Some(last_seen) => format!("{base} {} LIMIT {limit}", after_clause(last_seen)),
        None => format!("{base} LIMIT {limit}"),
    }
}
