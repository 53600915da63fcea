//! Core data model: fields, records, record sets, and source locations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::Descriptor;

/// The location of a logical line in source text.
///
/// Mirrors the teacher's `Location`: a file name plus a 1-based line
/// number. There is no file system in this crate (inputs are `&str`), so
/// `file` is almost always `"<input>"`, but keeping the field lets callers
/// that stitch together multiple sources (e.g. concatenating recfiles)
/// give each a distinct name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    file: Arc<str>,
    line: u32,
}

impl Location {
    pub fn new(file: impl Into<Arc<str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A single `name: value` pair. Field names are not unique within a
/// record; order and multiplicity are preserved (`spec.md §3`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    value: String,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// True if this field's name opens a descriptor record (`%rec`, etc).
    pub fn is_meta(&self) -> bool {
        self.name.starts_with('%')
    }
}

/// An ordered sequence of fields, plus the descriptor in scope (if any).
///
/// Records are immutable once built by the record builder (C2); the query
/// driver only ever projects copies (`spec.md §3`, Lifecycle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Field>,
    descriptor: Option<Arc<Descriptor>>,
    loc: Location,
}

impl Record {
    pub(crate) fn new(fields: Vec<Field>, descriptor: Option<Arc<Descriptor>>, loc: Location) -> Self {
        debug_assert!(!fields.is_empty(), "a record has >= 1 field");
        Self {
            fields,
            descriptor,
            loc,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.descriptor.as_deref()
    }

    pub fn location(&self) -> &Location {
        &self.loc
    }

    /// Whether this is a descriptor record (its first field is `%rec`).
    pub fn is_descriptor(&self) -> bool {
        self.fields
            .first()
            .is_some_and(|f| f.name() == "%rec")
    }

    /// All values of fields named `name`, in insertion order.
    pub fn get_fields(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.name() == name)
            .map(Field::value)
            .collect()
    }

    /// The value of the k-th occurrence (zero-based) of field `name`.
    pub fn get_field_at(&self, name: &str, k: usize) -> Option<&str> {
        self.fields
            .iter()
            .filter(|f| f.name() == name)
            .nth(k)
            .map(Field::value)
    }

    /// The value of the first occurrence of field `name`.
    pub fn get_field(&self, name: &str) -> Option<&str> {
        self.get_field_at(name, 0)
    }

    /// The number of occurrences of field `name`. Always defined; absent
    /// fields count as zero (`spec.md §4.6`).
    pub fn field_count(&self, name: &str) -> usize {
        self.fields.iter().filter(|f| f.name() == name).count()
    }

    /// The record's type name, taken from its descriptor, if any.
    pub fn record_type(&self) -> Option<&str> {
        self.descriptor.as_ref().map(|d| d.record_type())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            write_field(f, field.name(), field.value())?;
        }
        Ok(())
    }
}

/// Renders a single field, folding embedded newlines into `+`-continuation
/// lines (`spec.md §8`'s round-trip invariant: "normalization of
/// multi-line values to `+`-continuation").
pub(crate) fn write_field(f: &mut impl fmt::Write, name: &str, value: &str) -> fmt::Result {
    let mut lines = value.split('\n');
    if let Some(first) = lines.next() {
        writeln!(f, "{name}: {first}")?;
    } else {
        writeln!(f, "{name}: ")?;
    }
    for line in lines {
        writeln!(f, "+ {line}")?;
    }
    Ok(())
}

/// An ordered sequence of records plus the descriptors in scope for them.
///
/// A descriptor applies to every subsequent record of its record type
/// until another `%rec` declaration for that type supersedes it
/// (`spec.md §3`). Descriptors are keyed by record-type name rather than
/// stacked, because scoping in a recfile is per-type, not global
/// (`spec.md §9`, "Descriptor scoping").
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Record>,
    descriptors: HashMap<String, Arc<Descriptor>>,
    descriptor_order: Vec<String>,
}

impl RecordSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_record(&mut self, record: Record) {
        self.records.push(record);
    }

    pub(crate) fn install_descriptor(&mut self, descriptor: Descriptor) -> Arc<Descriptor> {
        let ty = descriptor.record_type().to_string();
        if !self.descriptors.contains_key(&ty) {
            self.descriptor_order.push(ty.clone());
        }
        let descriptor = Arc::new(descriptor);
        self.descriptors.insert(ty, descriptor.clone());
        descriptor
    }

    pub(crate) fn descriptor_for(&self, record_type: &str) -> Option<Arc<Descriptor>> {
        self.descriptors.get(record_type).cloned()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Descriptors in declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptor_order
            .iter()
            .map(move |ty| self.descriptors[ty].as_ref())
    }

    pub fn descriptor(&self, record_type: &str) -> Option<&Descriptor> {
        self.descriptors.get(record_type).map(|d| d.as_ref())
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
