use pretty_assertions::assert_eq;

use recrs::descriptor::{TypeSpec, Violation};
use recrs::parser::parse;

const BOOK_REC: &str = include_str!("fixtures/book.rec");

#[test]
fn fixture_parses_into_three_records_under_one_descriptor() {
    let set = parse(BOOK_REC).unwrap();
    assert_eq!(set.len(), 3);
    let descriptor = set.descriptor("Book").expect("Book descriptor is installed");
    assert_eq!(descriptor.record_type(), "Book");
    assert!(descriptor.mandatory().any(|f| f == "Title"));
    assert!(descriptor.mandatory().any(|f| f == "Author"));
    assert!(descriptor.keys().any(|f| f == "Id"));
}

#[test]
fn key_field_is_typed_and_validated_per_record() {
    let set = parse(BOOK_REC).unwrap();
    let descriptor = set.descriptor("Book").unwrap();
    assert_eq!(descriptor.type_of("Id"), Some(&TypeSpec::Int));
    for (i, record) in set.records().iter().enumerate() {
        assert!(descriptor.validate(record, i).is_empty());
    }
}

#[test]
fn isbn_uniqueness_holds_across_the_set() {
    let set = parse(BOOK_REC).unwrap();
    let descriptor = set.descriptor("Book").unwrap();
    assert!(descriptor.validate_set(set.records()).is_empty());
}

#[test]
fn duplicate_unique_field_is_reported() {
    let text = "\
%rec: Book
%unique: Isbn

Isbn: 111

Isbn: 111
";
    let set = parse(text).unwrap();
    let descriptor = set.descriptor("Book").unwrap();
    let violations = descriptor.validate_set(set.records());
    assert_eq!(
        violations,
        vec![Violation::UniquenessViolation {
            field: "Isbn".to_string(),
            value: "111".to_string(),
        }]
    );
}

#[test]
fn missing_mandatory_field_is_reported_with_its_record_index() {
    let text = "\
%rec: Book
%mandatory: Title

Title: Dune

Author: Nobody
";
    let set = parse(text).unwrap();
    let descriptor = set.descriptor("Book").unwrap();
    let violations = descriptor.validate(&set.records()[1], 1);
    assert_eq!(
        violations,
        vec![Violation::MissingMandatory {
            field: "Title".to_string(),
            record_index: 1,
        }]
    );
}

#[test]
fn crlf_line_endings_parse_identically_to_lf() {
    let lf = parse("Name: Alice\nAge: 30\n").unwrap();
    let crlf = parse("Name: Alice\r\nAge: 30\r\n").unwrap();
    assert_eq!(lf.records()[0].fields(), crlf.records()[0].fields());
}

#[test]
fn continuation_lines_join_into_one_field_value() {
    let set = parse("Description: first line\n+ second line\n").unwrap();
    assert_eq!(set.records()[0].get_field("Description"), Some("first line\nsecond line"));
}

#[test]
fn malformed_line_is_a_fatal_parse_error() {
    assert!(parse("this is not a field line\n").is_err());
}

#[test]
fn descriptor_round_trips_through_display() {
    let set = parse(BOOK_REC).unwrap();
    let descriptor = set.descriptor("Book").unwrap();
    let text = descriptor.to_string();
    let reparsed = parse(&text).unwrap();
    assert_eq!(reparsed.len(), 0, "a descriptor-only recfile yields no data records");
    let reparsed_descriptor = reparsed.descriptor("Book").expect("round-tripped descriptor is installed");
    assert!(reparsed_descriptor.keys().any(|f| f == "Id"));
    assert!(reparsed_descriptor.mandatory().any(|f| f == "Author"));
}
