//! Per-kind payload schemas.
//!
//! A message kind may declare an ordered list of field types; the dispatcher
//! checks outgoing payloads against it at the send boundary. Lists are
//! checked at the outer level only; element shapes are the kind's own
//! contract.

use types::{FieldKind, Value};

use crate::error::CodecError;

/// Ordered field types one message kind carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<FieldKind>,
}

impl Schema {
    pub fn new(fields: Vec<FieldKind>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldKind] {
        &self.fields
    }

    /// Verify `args` matches this schema in arity and per-slot type.
    pub fn check(&self, args: &[Value]) -> Result<(), CodecError> {
        if args.len() != self.fields.len() {
            return Err(CodecError::Arity {
                expected: self.fields.len(),
                got: args.len(),
            });
        }
        for (index, (value, expected)) in args.iter().zip(&self.fields).enumerate() {
            if value.kind() != *expected {
                return Err(CodecError::FieldType {
                    index,
                    expected: *expected,
                    got: value.kind(),
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<FieldKind> for Schema {
    fn from_iter<T: IntoIterator<Item = FieldKind>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_payload_passes() {
        let schema = Schema::new(vec![FieldKind::U32, FieldKind::Str, FieldKind::List]);
        let args = vec![
            Value::U32(1),
            Value::Str("ok".into()),
            Value::List(vec![Value::U8(2)]),
        ];
        assert!(schema.check(&args).is_ok());
    }

    #[test]
    fn arity_mismatch_rejected() {
        let schema = Schema::new(vec![FieldKind::U32]);
        let err = schema.check(&[]).unwrap_err();
        assert_eq!(err, CodecError::Arity { expected: 1, got: 0 });
    }

    #[test]
    fn type_mismatch_names_the_slot() {
        let schema = Schema::new(vec![FieldKind::U32, FieldKind::Str]);
        let err = schema
            .check(&[Value::U32(1), Value::U64(2)])
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::FieldType {
                index: 1,
                expected: FieldKind::Str,
                got: FieldKind::U64,
            }
        );
    }
}
