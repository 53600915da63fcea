//! Output formatting for a [`QueryResult`] (`spec.md §6`, §9).
//!
//! `print_fields` takes priority over `print_values`, which takes priority
//! over `print_row`, when more than one is set (`spec.md §9`, Open
//! Questions: "what if more than one print mode is requested"). With none
//! set, [`format_default`] renders full records in rec format, same as
//! [`crate::record::Record`]'s own `Display`.

use std::fmt::Write as _;

use crate::query::{QueryResult, QuerySpec};
use crate::record::{write_field, Record};

/// Renders a query result using the print-mode fields carried by `spec`.
/// `collapse` suppresses the blank line normally printed between records
/// (`spec.md §6`).
pub fn format(result: &QueryResult, spec: &QuerySpec) -> String {
    let QueryResult::Records { groups, .. } = result else {
        return format_default(result);
    };

    let mode = print_mode(spec);
    let mut out = String::new();
    let mut first = true;
    for group in groups {
        for record in group {
            if !first && !spec.collapse() {
                out.push('\n');
            }
            render_record(&mut out, record, &mode);
            first = false;
        }
    }
    out
}

/// Renders a query result with no print-mode configuration: full records
/// in rec format, one blank line between each (`spec.md §6`'s default
/// output).
pub fn format_default(result: &QueryResult) -> String {
    match result {
        QueryResult::Count(n) => format!("{n}\n"),
        QueryResult::Records { groups, include_descriptors, .. } => {
            let mut out = String::new();
            let mut first = true;
            for group in groups {
                for record in group {
                    if !first {
                        out.push('\n');
                    }
                    if *include_descriptors {
                        if let Some(descriptor) = record.descriptor() {
                            write!(out, "{descriptor}").expect("String writes do not fail");
                            out.push('\n');
                        }
                    }
                    write!(out, "{record}").expect("String writes do not fail");
                    first = false;
                }
            }
            out
        }
    }
}

enum PrintMode<'a> {
    Fields(&'a [String]),
    Values(&'a [String]),
    Row(&'a [String]),
    Full,
}

fn print_mode(spec: &QuerySpec) -> PrintMode<'_> {
    if let Some(fields) = spec.print_fields() {
        PrintMode::Fields(fields)
    } else if let Some(fields) = spec.print_values() {
        PrintMode::Values(fields)
    } else if let Some(fields) = spec.print_row() {
        PrintMode::Row(fields)
    } else {
        PrintMode::Full
    }
}

fn render_record(out: &mut String, record: &Record, mode: &PrintMode<'_>) {
    match mode {
        PrintMode::Full => {
            write!(out, "{record}").expect("String writes do not fail");
        }
        PrintMode::Fields(fields) => {
            for name in *fields {
                for value in record.get_fields(name) {
                    write_field(out, name, value).expect("String writes do not fail");
                }
            }
        }
        PrintMode::Values(fields) => {
            for name in *fields {
                for value in record.get_fields(name) {
                    writeln!(out, "{value}").expect("String writes do not fail");
                }
            }
        }
        PrintMode::Row(fields) => {
            let values: Vec<&str> = fields
                .iter()
                .filter_map(|name| record.get_field(name))
                .collect();
            writeln!(out, "{}", values.join(" ")).expect("String writes do not fail");
        }
    }
}
