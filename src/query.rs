//! Query driver (C7): assembles filters, ordering, deduplication, and
//! projection over a [`RecordSet`] (`spec.md §4.7`).
//!
//! This is the one component `spec.md §1` calls out as "not hard" — it is
//! specified only through the interfaces it consumes from the core. The
//! pipeline below runs the ten steps of `spec.md §4.7` in order, logging
//! the surviving record count at each stage boundary.

use itertools::Itertools;
use rand::seq::SliceRandom;

use crate::descriptor::TypeSpec;
use crate::error::{EvalErrorKind, SexError};
use crate::record::{Record, RecordSet};
use crate::sex::{self, Truthiness};

/// The configuration for a single query, per the `QuerySpec` table in
/// `spec.md §6`. A plain data struct with `Default` and `with_*` setters,
/// in the teacher's `Runner::with_validator` idiom (`&mut self`, no
/// consuming builder chain).
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    record_type: Option<String>,
    indexes: Option<String>,
    expression: Option<String>,
    quick: Option<String>,
    random_count: Option<usize>,
    print_fields: Option<Vec<String>>,
    print_values: Option<Vec<String>>,
    print_row: Option<Vec<String>>,
    count: bool,
    include_descriptors: bool,
    collapse: bool,
    case_insensitive: bool,
    sort: Vec<String>,
    group_by: Vec<String>,
    uniq: bool,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record_type(&mut self, record_type: impl Into<String>) {
        self.record_type = Some(record_type.into());
    }

    pub fn with_indexes(&mut self, indexes: impl Into<String>) {
        self.indexes = Some(indexes.into());
    }

    pub fn with_expression(&mut self, expression: impl Into<String>) {
        self.expression = Some(expression.into());
    }

    pub fn with_quick(&mut self, quick: impl Into<String>) {
        self.quick = Some(quick.into());
    }

    pub fn with_random_count(&mut self, count: usize) {
        self.random_count = Some(count);
    }

    pub fn with_print_fields(&mut self, fields: Vec<String>) {
        self.print_fields = Some(fields);
    }

    pub fn with_print_values(&mut self, fields: Vec<String>) {
        self.print_values = Some(fields);
    }

    pub fn with_print_row(&mut self, fields: Vec<String>) {
        self.print_row = Some(fields);
    }

    pub fn with_count(&mut self, count: bool) {
        self.count = count;
    }

    pub fn with_include_descriptors(&mut self, include: bool) {
        self.include_descriptors = include;
    }

    pub fn with_collapse(&mut self, collapse: bool) {
        self.collapse = collapse;
    }

    pub fn with_case_insensitive(&mut self, case_insensitive: bool) {
        self.case_insensitive = case_insensitive;
    }

    pub fn with_sort(&mut self, fields: Vec<String>) {
        self.sort = fields;
    }

    pub fn with_group_by(&mut self, fields: Vec<String>) {
        self.group_by = fields;
    }

    pub fn with_uniq(&mut self, uniq: bool) {
        self.uniq = uniq;
    }

    pub fn include_descriptors(&self) -> bool {
        self.include_descriptors
    }

    pub fn collapse(&self) -> bool {
        self.collapse
    }

    pub fn print_fields(&self) -> Option<&[String]> {
        self.print_fields.as_deref()
    }

    pub fn print_values(&self) -> Option<&[String]> {
        self.print_values.as_deref()
    }

    pub fn print_row(&self) -> Option<&[String]> {
        self.print_row.as_deref()
    }
}

/// The outcome of [`query`]: either the surviving records (grouped by
/// `group_by`, per `spec.md §4.7` step 7) or, if `count` was requested, a
/// bare count that bypasses projection entirely (step 10).
#[derive(Debug, Clone)]
pub enum QueryResult {
    Records {
        groups: Vec<Vec<Record>>,
        /// Evaluation errors other than `MissingField`, collected from
        /// the SEX filter's diagnostic channel (`spec.md §4.6`, §7).
        diagnostics: Vec<EvalErrorKind>,
        include_descriptors: bool,
        collapse: bool,
    },
    Count(usize),
}

impl QueryResult {
    /// Evaluation errors collected while filtering, if any.
    pub fn diagnostics(&self) -> &[EvalErrorKind] {
        match self {
            QueryResult::Records { diagnostics, .. } => diagnostics,
            QueryResult::Count(_) => &[],
        }
    }

    /// The number of surviving records (flattening groups), or the
    /// requested count.
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Records { groups, .. } => groups.iter().map(Vec::len).sum(),
            QueryResult::Count(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs the query pipeline of `spec.md §4.7` against `set`.
///
/// Returns `Err` only for a malformed SEX `expression` (a compile-time
/// error, per `spec.md §7`); in-band evaluation errors raised while
/// filtering never abort the query; they are collected into
/// [`QueryResult::diagnostics`] instead.
pub fn query(set: &RecordSet, spec: &QuerySpec) -> Result<QueryResult, SexError> {
    let records: Vec<&Record> = set.records().iter().collect();

    // Step 1: type filter.
    let records = filter_type(records, spec.record_type.as_deref());
    tracing::debug!(remaining = records.len(), "type filter");

    // Step 2: index filter, evaluated after the type filter.
    let records = filter_indexes(records, spec.indexes.as_deref());
    tracing::debug!(remaining = records.len(), "index filter");

    // Step 3: quick-search.
    let records = filter_quick(records, spec.quick.as_deref(), spec.case_insensitive);
    tracing::debug!(remaining = records.len(), "quick search");

    // Step 4: SEX filter.
    let (records, diagnostics) = filter_expression(records, spec.expression.as_deref(), spec.case_insensitive)?;
    tracing::debug!(remaining = records.len(), diagnostics = diagnostics.len(), "sex filter");
    for diag in &diagnostics {
        tracing::warn!(error = %diag, "sex evaluation error excluded a record");
    }

    // Step 5: random sampling (ordering restored to input order afterward).
    let mut records = sample_random(records, spec.random_count);
    tracing::debug!(remaining = records.len(), "random sampling");

    // Step 6: stable sort.
    if !spec.sort.is_empty() {
        records.sort_by(|a, b| compare_by_keys(a, b, &spec.sort));
        tracing::debug!("sorted by {:?}", spec.sort);
    }

    // Step 7: group-by, partitioning into contiguous equal-key runs.
    let groups = group_contiguous(records, &spec.group_by);
    tracing::debug!(groups = groups.len(), "group by");

    // Step 8: uniq, dropping adjacent records with identical fields.
    let groups: Vec<Vec<Record>> = groups
        .into_iter()
        .map(|group| {
            if spec.uniq {
                group.into_iter().dedup_by(|a, b| a.fields() == b.fields()).collect()
            } else {
                group
            }
        })
        .collect();
    tracing::debug!(remaining = groups.iter().map(Vec::len).sum::<usize>(), "uniq");

    // Step 10: count bypasses projection/formatting only, not group-by/uniq
    // (`spec.md §4.7` step 10).
    if spec.count {
        return Ok(QueryResult::Count(groups.iter().map(Vec::len).sum()));
    }

    Ok(QueryResult::Records {
        groups,
        diagnostics,
        include_descriptors: spec.include_descriptors,
        collapse: spec.collapse,
    })
}

fn filter_type<'a>(records: Vec<&'a Record>, record_type: Option<&str>) -> Vec<&'a Record> {
    match record_type {
        None => records,
        Some(ty) => records.into_iter().filter(|r| r.record_type() == Some(ty)).collect(),
    }
}

/// Parses `spec.md §4.7`'s index-spec grammar: a comma-separated list of
/// single integers or inclusive ranges `a-b`. Unparsable tokens are
/// dropped rather than treated as fatal, matching the spec's silence on
/// an error taxonomy here and its "out-of-range indices silently produce
/// no record" rule.
fn parse_index_ranges(spec: &str) -> Vec<(usize, usize)> {
    spec.split(',')
        .filter_map(|part| {
            let part = part.trim();
            if let Some((lo, hi)) = part.split_once('-') {
                let lo: usize = lo.trim().parse().ok()?;
                let hi: usize = hi.trim().parse().ok()?;
                Some((lo, hi))
            } else {
                let n: usize = part.parse().ok()?;
                Some((n, n))
            }
        })
        .collect()
}

fn filter_indexes<'a>(records: Vec<&'a Record>, indexes: Option<&str>) -> Vec<&'a Record> {
    let Some(spec) = indexes else {
        return records;
    };
    let ranges = parse_index_ranges(spec);
    records
        .into_iter()
        .enumerate()
        .filter(|(i, _)| ranges.iter().any(|&(lo, hi)| *i >= lo && *i <= hi))
        .map(|(_, r)| r)
        .collect()
}

fn filter_quick<'a>(records: Vec<&'a Record>, quick: Option<&str>, ci: bool) -> Vec<&'a Record> {
    let Some(needle) = quick else {
        return records;
    };
    let needle_ci = needle.to_lowercase();
    records
        .into_iter()
        .filter(|r| {
            r.fields().iter().any(|f| {
                if ci {
                    f.value().to_lowercase().contains(&needle_ci)
                } else {
                    f.value().contains(needle)
                }
            })
        })
        .collect()
}

fn filter_expression<'a>(
    records: Vec<&'a Record>,
    expression: Option<&str>,
    ci: bool,
) -> Result<(Vec<&'a Record>, Vec<EvalErrorKind>), SexError> {
    let Some(expr) = expression else {
        return Ok((records, Vec::new()));
    };
    let expr = sex::compile(expr)?;
    let mut diagnostics = Vec::new();
    let kept = records
        .into_iter()
        .filter(|r| {
            let value = sex::evaluate_with(&expr, r, ci);
            match sex::truthy(&value) {
                Truthiness::Pass => true,
                Truthiness::Fail => false,
                Truthiness::Diagnostic(e) => {
                    diagnostics.push(e);
                    false
                }
            }
        })
        .collect();
    Ok((kept, diagnostics))
}

fn sample_random<'a>(records: Vec<&'a Record>, count: Option<usize>) -> Vec<&'a Record> {
    let Some(m) = count else {
        return records;
    };
    if m >= records.len() {
        return records;
    }
    let mut indices: Vec<usize> = (0..records.len()).collect();
    indices.shuffle(&mut rand::thread_rng());
    indices.truncate(m);
    indices.sort_unstable();
    indices.into_iter().map(|i| records[i]).collect()
}

fn is_numeric_type(spec: &TypeSpec) -> bool {
    matches!(spec, TypeSpec::Int | TypeSpec::Real | TypeSpec::Range(_, _))
}

/// Compares two records by a single sort-key field: absent sorts before
/// present, numeric per the descriptor's declared type (`spec.md §4.7`
/// step 6).
fn compare_one_key(a: &Record, b: &Record, field: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a.get_field(field), b.get_field(field)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(av), Some(bv)) => {
            let numeric = a
                .descriptor()
                .and_then(|d| d.type_of(field))
                .is_some_and(is_numeric_type);
            if numeric {
                match (av.parse::<f64>(), bv.parse::<f64>()) {
                    (Ok(an), Ok(bn)) => an.partial_cmp(&bn).unwrap_or(Ordering::Equal),
                    _ => av.cmp(bv),
                }
            } else {
                av.cmp(bv)
            }
        }
    }
}

fn compare_by_keys(a: &Record, b: &Record, keys: &[String]) -> std::cmp::Ordering {
    for key in keys {
        let ordering = compare_one_key(a, b, key);
        if ordering != std::cmp::Ordering::Equal {
            return ordering;
        }
    }
    std::cmp::Ordering::Equal
}

/// Partitions `records` into contiguous runs of equal `group_by` key
/// tuples, without reordering (`spec.md §4.7` step 7, and the design note
/// in `spec.md §9` on `group_by` without `sort` being ambiguous).
fn group_contiguous<'a>(records: Vec<&'a Record>, group_by: &[String]) -> Vec<Vec<Record>> {
    if group_by.is_empty() {
        return vec![records.into_iter().cloned().collect()];
    }
    let mut groups: Vec<Vec<Record>> = Vec::new();
    let mut last_key: Option<Vec<Option<&str>>> = None;
    for record in records {
        let key: Vec<Option<&str>> = group_by.iter().map(|f| record.get_field(f)).collect();
        if last_key.as_ref() == Some(&key) {
            groups.last_mut().expect("a key was already pushed").push(record.clone());
        } else {
            groups.push(vec![record.clone()]);
            last_key = Some(key);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn book_set() -> RecordSet {
        parse(
            "\
%rec: Book
%mandatory: Title Location

Title: Dune
Location: home

Title: Neuromancer
Location: loaned

Title: Snow Crash
Location: home
",
        )
        .unwrap()
    }

    #[test]
    fn sex_filter_with_count() {
        let set = book_set();
        let mut spec = QuerySpec::new();
        spec.with_record_type("Book");
        spec.with_expression("Location = 'home'");
        spec.with_count(true);
        match query(&set, &spec).unwrap() {
            QueryResult::Count(n) => assert_eq!(n, 2),
            _ => panic!("expected a count"),
        }
    }

    #[test]
    fn count_reflects_uniq_dedup_not_just_projection_bypass() {
        let set = parse("Name: A\n\nName: A\n\nName: B\n").unwrap();
        let mut spec = QuerySpec::new();
        spec.with_uniq(true);
        spec.with_count(true);
        match query(&set, &spec).unwrap() {
            QueryResult::Count(n) => assert_eq!(n, 2),
            _ => panic!("expected a count"),
        }
    }

    #[test]
    fn index_filter_keeps_listed_positions() {
        let set = book_set();
        let mut spec = QuerySpec::new();
        spec.with_record_type("Book");
        spec.with_indexes("0,2");
        let QueryResult::Records { groups, .. } = query(&set, &spec).unwrap() else {
            panic!("expected records")
        };
        let titles: Vec<&str> = groups.iter().flatten().map(|r| r.get_field("Title").unwrap()).collect();
        assert_eq!(titles, vec!["Dune", "Snow Crash"]);
    }

    #[test]
    fn quick_search_is_case_insensitive_flag_gated() {
        let set = book_set();
        let mut spec = QuerySpec::new();
        spec.with_quick("DUNE");
        spec.with_case_insensitive(true);
        assert_eq!(query(&set, &spec).unwrap().len(), 1);

        let mut spec = QuerySpec::new();
        spec.with_quick("DUNE");
        assert_eq!(query(&set, &spec).unwrap().len(), 0);
    }

    #[test]
    fn sample_with_m_geq_len_returns_all_in_order() {
        let set = book_set();
        let mut spec = QuerySpec::new();
        spec.with_random_count(10);
        let QueryResult::Records { groups, .. } = query(&set, &spec).unwrap() else {
            panic!("expected records")
        };
        let titles: Vec<&str> = groups.iter().flatten().map(|r| r.get_field("Title").unwrap()).collect();
        assert_eq!(titles, vec!["Dune", "Neuromancer", "Snow Crash"]);
    }

    #[test]
    fn sort_is_stable_and_missing_sorts_first() {
        let set = parse("Name: B\nRank: 2\n\nName: A\n\nName: C\nRank: 2\n").unwrap();
        let mut spec = QuerySpec::new();
        spec.with_sort(vec!["Rank".to_string()]);
        let QueryResult::Records { groups, .. } = query(&set, &spec).unwrap() else {
            panic!("expected records")
        };
        let names: Vec<&str> = groups.iter().flatten().map(|r| r.get_field("Name").unwrap()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn group_by_partitions_contiguous_runs_only() {
        let set = parse("Name: A\nCat: x\n\nName: B\nCat: y\n\nName: C\nCat: x\n").unwrap();
        let mut spec = QuerySpec::new();
        spec.with_group_by(vec!["Cat".to_string()]);
        let QueryResult::Records { groups, .. } = query(&set, &spec).unwrap() else {
            panic!("expected records")
        };
        // Not sorted first, so the two `Cat: x` records are NOT merged
        // into one group; they are non-adjacent.
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn uniq_drops_only_adjacent_duplicates() {
        let set = parse("Name: A\n\nName: A\n\nName: B\n\nName: A\n").unwrap();
        let mut spec = QuerySpec::new();
        spec.with_uniq(true);
        let QueryResult::Records { groups, .. } = query(&set, &spec).unwrap() else {
            panic!("expected records")
        };
        let names: Vec<&str> = groups.iter().flatten().map(|r| r.get_field("Name").unwrap()).collect();
        assert_eq!(names, vec!["A", "B", "A"]);
    }

    #[test]
    fn bad_regex_is_a_diagnostic_not_a_fatal_error() {
        let set = parse("Name: A\n").unwrap();
        let mut spec = QuerySpec::new();
        spec.with_expression("Name ~ '('");
        let QueryResult::Records { groups, diagnostics, .. } = query(&set, &spec).unwrap() else {
            panic!("expected records")
        };
        assert!(groups.iter().flatten().next().is_none());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn malformed_expression_is_a_compile_error() {
        let set = parse("Name: A\n").unwrap();
        let mut spec = QuerySpec::new();
        spec.with_expression("Name = ");
        assert!(query(&set, &spec).is_err());
    }
}
