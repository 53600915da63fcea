//! Descriptor model (C3): `%rec`-declared schemas for a record type.

use std::collections::HashSet;
use std::fmt;

use educe::Educe;
use regex::Regex;

use crate::record::{write_field, Record};

/// A type-spec value recognized in a `%type` declaration (`spec.md §3`).
///
/// `Other` covers type names the core accepts syntactically but does not
/// enforce (`date`, `email`, `field`, `uuid`) — they are preserved for
/// introspection but `validate` never rejects a value because of them.
#[derive(Debug, Clone, Educe)]
#[educe(PartialEq)]
pub enum TypeSpec {
    Int,
    Bool,
    Range(i64, i64),
    Real,
    Size(u64),
    Line,
    Regexp(#[educe(PartialEq(method = "cmp_regex"))] Regex),
    Enum(Vec<String>),
    Other(String),
}

impl Eq for TypeSpec {}

/// Compares two regexes by source pattern, since `Regex` has no
/// `PartialEq` impl of its own (teacher's `cmp_regex` in `parser.rs`).
fn cmp_regex(l: &Regex, r: &Regex) -> bool {
    l.as_str() == r.as_str()
}

/// A single violation of a descriptor's constraints, as produced by
/// [`Descriptor::validate`] (`spec.md §4.3`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingMandatory { field: String, record_index: usize },
    TypeMismatch {
        field: String,
        value: String,
        expected: String,
        record_index: usize,
    },
    ProhibitedField { field: String, record_index: usize },
    DuplicateKey { field: String, record_index: usize },
    /// Detected across a set of records sharing a descriptor, not per
    /// record (`spec.md §4.3`).
    UniquenessViolation { field: String, value: String },
}

/// A `%rec`-declared schema: mandatory fields, typed fields, key/unique
/// constraints, and any other recognized meta-fields for one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    record_type: String,
    mandatory: HashSet<String>,
    prohibited: HashSet<String>,
    allowed: Option<HashSet<String>>,
    types: Vec<(String, TypeSpec)>,
    keys: HashSet<String>,
    unique: HashSet<String>,
    docs: Vec<String>,
}

impl Descriptor {
    pub(crate) fn new(record_type: String) -> Self {
        Self {
            record_type,
            mandatory: HashSet::new(),
            prohibited: HashSet::new(),
            allowed: None,
            types: Vec::new(),
            keys: HashSet::new(),
            unique: HashSet::new(),
            docs: Vec::new(),
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub(crate) fn add_mandatory(&mut self, field: &str) {
        self.mandatory.insert(field.to_string());
    }

    pub(crate) fn add_prohibited(&mut self, field: &str) {
        self.prohibited.insert(field.to_string());
    }

    pub(crate) fn add_allowed(&mut self, field: &str) {
        self.allowed
            .get_or_insert_with(HashSet::new)
            .insert(field.to_string());
    }

    pub(crate) fn add_type(&mut self, field: &str, spec: TypeSpec) {
        self.types.retain(|(n, _)| n != field);
        self.types.push((field.to_string(), spec));
    }

    /// Registers `field` as a key. Per recutils semantics a key field is
    /// implicitly mandatory and unique (`SPEC_FULL.md` C3 supplement).
    pub(crate) fn add_key(&mut self, field: &str) {
        self.keys.insert(field.to_string());
        self.unique.insert(field.to_string());
        self.mandatory.insert(field.to_string());
    }

    pub(crate) fn add_unique(&mut self, field: &str) {
        self.unique.insert(field.to_string());
    }

    pub(crate) fn add_doc(&mut self, text: &str) {
        self.docs.push(text.to_string());
    }

    pub fn mandatory(&self) -> impl Iterator<Item = &str> {
        self.mandatory.iter().map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn docs(&self) -> &[String] {
        &self.docs
    }

    pub fn type_of(&self, field: &str) -> Option<&TypeSpec> {
        self.types
            .iter()
            .find(|(n, _)| n == field)
            .map(|(_, spec)| spec)
    }

    /// Checks a single value against a type-spec (`spec.md §4.3`).
    pub fn type_matches(spec: &TypeSpec, value: &str) -> bool {
        match spec {
            TypeSpec::Int => is_int(value),
            TypeSpec::Real => is_real(value),
            TypeSpec::Bool => matches!(
                value.to_ascii_lowercase().as_str(),
                "yes" | "no" | "true" | "false" | "0" | "1"
            ),
            TypeSpec::Range(lo, hi) => value
                .parse::<i64>()
                .is_ok_and(|n| n >= *lo && n <= *hi),
            TypeSpec::Regexp(pattern) => pattern.is_match(value),
            TypeSpec::Enum(values) => values.iter().any(|v| v == value),
            TypeSpec::Line => !value.contains('\n'),
            TypeSpec::Size(_) | TypeSpec::Other(_) => true,
        }
    }

    /// Validates a single record against this descriptor, per-record
    /// checks only (mandatory, typed, prohibited, allowed, duplicate key).
    /// Uniqueness across a set is checked separately by
    /// [`Descriptor::validate_set`].
    pub fn validate(&self, record: &Record, record_index: usize) -> Vec<Violation> {
        let mut violations = Vec::new();

        for field in self.mandatory() {
            if record.field_count(field) == 0 {
                violations.push(Violation::MissingMandatory {
                    field: field.to_string(),
                    record_index,
                });
            }
        }

        for field in record.fields() {
            if field.is_meta() {
                continue;
            }
            if self.prohibited.contains(field.name()) {
                violations.push(Violation::ProhibitedField {
                    field: field.name().to_string(),
                    record_index,
                });
            }
            if let Some(allowed) = &self.allowed {
                if !allowed.contains(field.name()) && !self.mandatory.contains(field.name()) {
                    violations.push(Violation::ProhibitedField {
                        field: field.name().to_string(),
                        record_index,
                    });
                }
            }
            if let Some(spec) = self.type_of(field.name()) {
                if !Self::type_matches(spec, field.value()) {
                    violations.push(Violation::TypeMismatch {
                        field: field.name().to_string(),
                        value: field.value().to_string(),
                        expected: format!("{spec:?}"),
                        record_index,
                    });
                }
            }
        }

        for key in &self.keys {
            if record.field_count(key) > 1 {
                violations.push(Violation::DuplicateKey {
                    field: key.clone(),
                    record_index,
                });
            }
        }

        violations
    }

    /// Validates uniqueness constraints (`%key`, `%unique`) across a set of
    /// records that share this descriptor.
    pub fn validate_set<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for field in self.unique.iter() {
            let mut seen: HashSet<&str> = HashSet::new();
            for record in records.into_iter() {
                if record.record_type() != Some(self.record_type()) {
                    continue;
                }
                if let Some(value) = record.get_field(field) {
                    if !seen.insert(value) {
                        violations.push(Violation::UniquenessViolation {
                            field: field.clone(),
                            value: value.to_string(),
                        });
                    }
                }
            }
        }
        violations
    }
}

/// Renders a `%type` spec back into the value text recutils would accept
/// for it, for [`Descriptor`]'s `Display` impl.
fn type_spec_to_string(spec: &TypeSpec) -> String {
    match spec {
        TypeSpec::Int => "int".to_string(),
        TypeSpec::Bool => "bool".to_string(),
        TypeSpec::Range(lo, hi) => format!("range {lo} {hi}"),
        TypeSpec::Real => "real".to_string(),
        TypeSpec::Size(n) => format!("size {n}"),
        TypeSpec::Line => "line".to_string(),
        TypeSpec::Regexp(pattern) => format!("regexp /{}/", pattern.as_str()),
        TypeSpec::Enum(values) => format!("enum {}", values.join(" ")),
        TypeSpec::Other(name) => name.clone(),
    }
}

/// Round-trips a descriptor back to rec-format text: `%rec` followed by
/// its other meta-fields in declaration order, for the `include_descriptors`
/// output mode (`spec.md §6`).
impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_field(f, "%rec", &self.record_type)?;
        if !self.mandatory.is_empty() {
            let mut fields: Vec<&str> = self.mandatory.iter().map(String::as_str).collect();
            fields.sort_unstable();
            write_field(f, "%mandatory", &fields.join(" "))?;
        }
        if !self.prohibited.is_empty() {
            let mut fields: Vec<&str> = self.prohibited.iter().map(String::as_str).collect();
            fields.sort_unstable();
            write_field(f, "%prohibit", &fields.join(" "))?;
        }
        if let Some(allowed) = &self.allowed {
            let mut fields: Vec<&str> = allowed.iter().map(String::as_str).collect();
            fields.sort_unstable();
            write_field(f, "%allowed", &fields.join(" "))?;
        }
        for (field, spec) in &self.types {
            write_field(f, "%type", &format!("{field} {}", type_spec_to_string(spec)))?;
        }
        for key in &self.keys {
            write_field(f, "%key", key)?;
        }
        // %unique fields that are not already implied by %key.
        let mut unique_only: Vec<&str> = self
            .unique
            .iter()
            .filter(|f| !self.keys.contains(*f))
            .map(String::as_str)
            .collect();
        unique_only.sort_unstable();
        for field in unique_only {
            write_field(f, "%unique", field)?;
        }
        for doc in &self.docs {
            write_field(f, "%doc", doc)?;
        }
        Ok(())
    }
}

fn is_int(value: &str) -> bool {
    let value = value.strip_prefix(['+', '-']).unwrap_or(value);
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_real(value: &str) -> bool {
    let value = value.strip_prefix(['+', '-']).unwrap_or(value);
    let (mantissa, exponent) = match value.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (value, None),
    };
    if let Some(exponent) = exponent {
        let exponent = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        if exponent.is_empty() || !exponent.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    if int_part.is_empty() && frac_part.map(str::is_empty).unwrap_or(true) {
        return false;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if let Some(frac) = frac_part {
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_type_check() {
        assert!(is_int("42"));
        assert!(is_int("-42"));
        assert!(is_int("+1"));
        assert!(!is_int(""));
        assert!(!is_int("4.2"));
        assert!(!is_int("abc"));
    }

    #[test]
    fn real_type_check() {
        assert!(is_real("3.14"));
        assert!(is_real("-3"));
        assert!(is_real("3."));
        assert!(is_real(".5"));
        assert!(is_real("1e10"));
        assert!(is_real("1.5e-3"));
        assert!(!is_real("e10"));
        assert!(!is_real(""));
        assert!(!is_real("abc"));
    }

    #[test]
    fn range_type_check() {
        let spec = TypeSpec::Range(0, 120);
        assert!(Descriptor::type_matches(&spec, "42"));
        assert!(!Descriptor::type_matches(&spec, "121"));
        assert!(!Descriptor::type_matches(&spec, "-1"));
        assert!(!Descriptor::type_matches(&spec, "abc"));
    }

    #[test]
    fn key_implies_mandatory_and_unique() {
        let mut d = Descriptor::new("Book".into());
        d.add_key("Id");
        assert!(d.mandatory().any(|f| f == "Id"));
        assert!(d.unique.contains("Id"));
    }

    #[test]
    fn display_does_not_duplicate_a_key_field_as_unique() {
        let mut d = Descriptor::new("Book".into());
        d.add_key("Id");
        d.add_unique("Isbn");
        let text = d.to_string();
        assert!(text.contains("%key: Id"));
        assert!(text.contains("%unique: Isbn"));
        assert_eq!(text.matches("%unique:").count(), 1);
    }
}
