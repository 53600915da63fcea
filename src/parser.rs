//! Record builder (C2): groups logical lines into records, separating
//! descriptor records from data records and attaching scope
//! (`spec.md §4.2`).

use crate::descriptor::{Descriptor, TypeSpec};
use crate::error::{ParseError, ParseErrorKind};
use crate::record::{Field, Location, Record, RecordSet};
use crate::tokenizer::{LogicalLine, Tokenizer};

/// Parses a complete recfile from a string, per the `parse(text)` entry
/// point in `spec.md §6`.
pub fn parse(text: &str) -> Result<RecordSet, ParseError> {
    parse_stream(text.lines())
}

/// Parses a recfile from anything iterable line-by-line, per the
/// `parse_stream(char-stream)` entry point in `spec.md §6`. A conforming
/// implementation should not need to materialize the full physical-line
/// list (`spec.md §5`); this walks the iterator directly rather than
/// collecting it first.
pub fn parse_stream<'a>(lines: impl Iterator<Item = &'a str>) -> Result<RecordSet, ParseError> {
    parse_named("<input>", lines)
}

/// Like [`parse_stream`], but the given name is attached to error
/// locations — useful when concatenating multiple recfiles together.
pub fn parse_named<'a>(
    name: impl Into<std::sync::Arc<str>>,
    lines: impl Iterator<Item = &'a str>,
) -> Result<RecordSet, ParseError> {
    let mut tokenizer = Tokenizer::new(name, lines);
    let mut set = RecordSet::new();
    let mut current: Vec<Field> = Vec::new();
    let mut current_loc: Option<Location> = None;
    let mut scope: Option<std::sync::Arc<Descriptor>> = None;

    while let Some(logical) = tokenizer.next_logical() {
        match logical? {
            LogicalLine::Blank => {
                flush(&mut set, &mut current, &current_loc, &mut scope)?;
                current_loc = None;
            }
            LogicalLine::Comment => {}
            LogicalLine::Field { name, value, loc } => {
                if current.is_empty() {
                    current_loc = Some(loc.clone());
                }
                current.push(Field::new(name, value));
            }
        }
    }
    flush(&mut set, &mut current, &current_loc, &mut scope)?;

    Ok(set)
}

fn flush(
    set: &mut RecordSet,
    current: &mut Vec<Field>,
    loc: &Option<Location>,
    scope: &mut Option<std::sync::Arc<Descriptor>>,
) -> Result<(), ParseError> {
    if current.is_empty() {
        return Ok(());
    }
    let fields = std::mem::take(current);
    let loc = loc.clone().expect("non-empty record has a location");

    if fields[0].name() == "%rec" {
        let descriptor = build_descriptor(&fields, &loc)?;
        if set.descriptor(descriptor.record_type()).is_some() {
            return Err(ParseErrorKind::DuplicateDescriptor(
                descriptor.record_type().to_string(),
            )
            .at(loc));
        }
        *scope = Some(set.install_descriptor(descriptor));
        return Ok(());
    }

    if fields[0].is_meta() {
        // A meta field that isn't `%rec` leading the record is malformed.
        return Err(ParseErrorKind::MissingRecField.at(loc));
    }

    set.push_record(Record::new(fields, scope.clone(), loc));
    Ok(())
}

fn build_descriptor(fields: &[Field], loc: &Location) -> Result<Descriptor, ParseError> {
    let record_type = fields[0].value().trim();
    if record_type.is_empty() {
        return Err(ParseErrorKind::MissingRecField.at(loc.clone()));
    }
    let mut descriptor = Descriptor::new(record_type.to_string());

    for field in &fields[1..] {
        match field.name() {
            "%rec" => return Err(ParseErrorKind::MissingRecField.at(loc.clone())),
            "%mandatory" => {
                for name in field.value().split_whitespace() {
                    descriptor.add_mandatory(name);
                }
            }
            "%allowed" => {
                for name in field.value().split_whitespace() {
                    descriptor.add_allowed(name);
                }
            }
            "%prohibit" => {
                for name in field.value().split_whitespace() {
                    descriptor.add_prohibited(name);
                }
            }
            "%key" => {
                for name in field.value().split_whitespace() {
                    descriptor.add_key(name);
                }
            }
            "%unique" => {
                for name in field.value().split_whitespace() {
                    descriptor.add_unique(name);
                }
            }
            "%doc" => descriptor.add_doc(field.value()),
            "%type" => {
                let (name, spec) = parse_type_spec(field.value())
                    .ok_or_else(|| {
                        ParseErrorKind::BadDescriptorSyntax(
                            "%type".to_string(),
                            field.value().to_string(),
                        )
                        .at(loc.clone())
                    })?;
                descriptor.add_type(name, spec);
            }
            _ => {
                // Unknown %-prefixed fields are preserved verbatim but
                // have no semantic effect in the core (`spec.md §3`).
            }
        }
    }

    Ok(descriptor)
}

/// Parses a `%type` value: `<field> <type-spec>` (`spec.md §3`).
fn parse_type_spec(value: &str) -> Option<(&str, TypeSpec)> {
    let mut parts = value.split_whitespace();
    let name = parts.next()?;
    let rest: Vec<&str> = parts.collect();
    let spec = match rest.first().copied() {
        Some("int") => TypeSpec::Int,
        Some("bool") => TypeSpec::Bool,
        Some("real") => TypeSpec::Real,
        Some("line") => TypeSpec::Line,
        Some("field") | Some("date") | Some("email") | Some("uuid") => {
            TypeSpec::Other(rest[0].to_string())
        }
        Some("size") => {
            let n: u64 = rest.get(1)?.parse().ok()?;
            TypeSpec::Size(n)
        }
        Some("range") => {
            let lo: i64 = rest.get(1)?.parse().ok()?;
            let hi: i64 = rest.get(2)?.parse().ok()?;
            TypeSpec::Range(lo, hi)
        }
        Some("regexp") => {
            let pattern = rest[1..].join(" ");
            let pattern = pattern
                .strip_prefix('/')
                .and_then(|p| p.strip_suffix('/'))
                .unwrap_or(&pattern);
            let regex = regex::Regex::new(pattern).ok()?;
            TypeSpec::Regexp(regex)
        }
        Some("enum") => TypeSpec::Enum(rest[1..].iter().map(|s| s.to_string()).collect()),
        _ => return None,
    };
    Some((name, spec))
}
