//! Field-level rule accumulator for checks that don't fit `#[derive(Validate)]`.
//!
//! Request bodies are validated with the `validator` derive through
//! [`ValidatedJson`](crate::extractors::ValidatedJson). [`Validator`] covers the
//! rest: query filters and entity state after a partial update is merged. Both
//! produce `validator::ValidationErrors` so the HTTP mapping is identical.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

/// Collects violations per field. Only the first message for a field is kept.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
    fields: HashSet<&'static str>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `ok` holds.
    pub fn check(
        &mut self,
        ok: bool,
        field: &'static str,
        message: impl Into<Cow<'static, str>>,
    ) -> &mut Self {
        if !ok {
            self.add_error(field, message);
        }
        self
    }

    pub fn add_error(&mut self, field: &'static str, message: impl Into<Cow<'static, str>>) {
        if !self.fields.insert(field) {
            return;
        }
        let mut error = ValidationError::new("invalid");
        error.message = Some(message.into());
        self.errors.add(field, error);
    }

    pub fn valid(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.valid() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// True when `value` is one of `permitted`.
pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

/// True when no element repeats.
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}

/// Flatten `ValidationErrors` into `field -> message`.
///
/// Nested structs are keyed as `parent.child`, list entries as `items[0].quantity`.
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    collect(errors, "", &mut out);
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (field, kind) in errors.errors() {
        let key = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(first) = list.first() {
                    let message = first
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| first.code.to_string());
                    out.insert(key, message);
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &key, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, &format!("{key}[{index}]"), out);
                }
            }
        }
    }
}
