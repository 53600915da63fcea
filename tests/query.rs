use pretty_assertions::assert_eq;

use recrs::fmt::{format, format_default};
use recrs::parser::parse;
use recrs::query::{query, QueryResult, QuerySpec};

const BOOK_REC: &str = include_str!("fixtures/book.rec");

/// Surfaces the query driver's `tracing::debug!`/`warn!` pipeline
/// instrumentation (`SPEC_FULL.md`, Logging/Tracing) on the test output
/// when run with `--nocapture`, the same way the teacher wires up
/// `tracing_subscriber` ahead of exercising its own pipeline.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn titles(result: &QueryResult) -> Vec<&str> {
    match result {
        QueryResult::Records { groups, .. } => groups
            .iter()
            .flatten()
            .map(|r| r.get_field("Title").unwrap())
            .collect(),
        QueryResult::Count(_) => panic!("expected records, not a count"),
    }
}

#[test]
fn filters_by_record_type_then_sex_expression() {
    init_tracing();
    let set = parse(BOOK_REC).unwrap();
    let mut spec = QuerySpec::new();
    spec.with_record_type("Book");
    spec.with_expression("Location = 'home'");
    let result = query(&set, &spec).unwrap();
    assert_eq!(titles(&result), vec!["Dune", "Snow Crash"]);
}

#[test]
fn quick_search_matches_a_substring_in_any_field() {
    let set = parse(BOOK_REC).unwrap();
    let mut spec = QuerySpec::new();
    spec.with_quick("Gibson");
    let result = query(&set, &spec).unwrap();
    assert_eq!(titles(&result), vec!["Neuromancer"]);
}

#[test]
fn sort_orders_by_a_typed_field_numerically() {
    let set = parse(BOOK_REC).unwrap();
    let mut spec = QuerySpec::new();
    spec.with_sort(vec!["Id".to_string()]);
    spec.with_expression("Id >= 2");
    let result = query(&set, &spec).unwrap();
    assert_eq!(titles(&result), vec!["Neuromancer", "Snow Crash"]);
}

#[test]
fn count_bypasses_projection() {
    let set = parse(BOOK_REC).unwrap();
    let mut spec = QuerySpec::new();
    spec.with_count(true);
    let result = query(&set, &spec).unwrap();
    match result {
        QueryResult::Count(n) => assert_eq!(n, 3),
        _ => panic!("expected a count"),
    }
}

#[test]
fn print_fields_output_is_restricted_to_the_listed_fields() {
    let set = parse(BOOK_REC).unwrap();
    let mut spec = QuerySpec::new();
    spec.with_expression("Id = 1");
    spec.with_print_fields(vec!["Title".to_string(), "Author".to_string()]);
    let result = query(&set, &spec).unwrap();
    let text = format(&result, &spec);
    assert_eq!(text, "Title: Dune\nAuthor: Frank Herbert\n");
}

#[test]
fn default_format_renders_full_records_separated_by_blank_lines() {
    let set = parse(BOOK_REC).unwrap();
    let mut spec = QuerySpec::new();
    spec.with_expression("Id = 1");
    let result = query(&set, &spec).unwrap();
    let text = format_default(&result);
    assert_eq!(text, "Id: 1\nTitle: Dune\nAuthor: Frank Herbert\nLocation: home\nIsbn: 9780441013593\n");
}

#[test]
fn bad_sex_expression_is_rejected_at_compile_time() {
    let set = parse(BOOK_REC).unwrap();
    let mut spec = QuerySpec::new();
    spec.with_expression("Title =");
    assert!(query(&set, &spec).is_err());
}

#[test]
fn group_by_partitions_contiguous_runs() {
    let set = parse(BOOK_REC).unwrap();
    let mut spec = QuerySpec::new();
    spec.with_sort(vec!["Location".to_string()]);
    spec.with_group_by(vec!["Location".to_string()]);
    let result = query(&set, &spec).unwrap();
    match result {
        QueryResult::Records { groups, .. } => {
            assert_eq!(groups.len(), 2);
        }
        _ => panic!("expected records"),
    }
}
