use crate::{
    errors::ConversionError,
    types::{TypeHint, Value},
};

/// Value-conversion service reachable through the execution context.
///
/// Recipes use it to coerce raw values into their expected target types;
/// callers may plug in their own implementation.
pub trait Converter: Send + Sync {
    fn convert(&self, value: Value, target: &TypeHint) -> Result<Value, ConversionError>;
}

/// Identity conversion plus the usual scalar coercions.
#[derive(Debug, Default)]
pub struct DefaultConverter;

impl Converter for DefaultConverter {
    fn convert(&self, value: Value, target: &TypeHint) -> Result<Value, ConversionError> {
        match (value, target) {
            (value, TypeHint::Any) => Ok(value),
            // null assigns to any target
            (Value::Null, _) => Ok(Value::Null),
            (value @ Value::Bool(_), TypeHint::Bool) => Ok(value),
            (value @ Value::Int(_), TypeHint::Int) => Ok(value),
            (value @ Value::Float(_), TypeHint::Float) => Ok(value),
            (value @ Value::Str(_), TypeHint::Str) => Ok(value),
            (value @ Value::Array(_), TypeHint::Array) => Ok(value),
            (value @ Value::Set(_), TypeHint::Set) => Ok(value),
            (value @ Value::Map(_), TypeHint::Map) => Ok(value),
            (value @ Value::Bean(_), TypeHint::Bean) => Ok(value),
            (Value::Int(v), TypeHint::Float) => Ok(Value::Float(v as f64)),
            (Value::Str(v), TypeHint::Int) => v
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| mismatch("string", target)),
            (Value::Str(v), TypeHint::Float) => v
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch("string", target)),
            (Value::Str(v), TypeHint::Bool) => match v.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(mismatch("string", target)),
            },
            (Value::Bool(v), TypeHint::Str) => Ok(Value::Str(v.to_string())),
            (Value::Int(v), TypeHint::Str) => Ok(Value::Str(v.to_string())),
            (Value::Float(v), TypeHint::Str) => Ok(Value::Str(v.to_string())),
            (value, target) => Err(mismatch(value.type_label(), target)),
        }
    }
}

fn mismatch(from: &str, to: &TypeHint) -> ConversionError {
    ConversionError {
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(value: Value, target: TypeHint) -> Result<Value, ConversionError> {
        DefaultConverter.convert(value, &target)
    }

    #[test]
    fn identity_and_any_pass_through() {
        assert!(convert(Value::Int(3), TypeHint::Any)
            .unwrap()
            .same_instance(&Value::Int(3)));
        assert!(convert(Value::Int(3), TypeHint::Int)
            .unwrap()
            .same_instance(&Value::Int(3)));
    }

    #[test]
    fn string_scalar_coercions() {
        assert!(convert(Value::Str(" 42 ".into()), TypeHint::Int)
            .unwrap()
            .same_instance(&Value::Int(42)));
        assert!(convert(Value::Str("true".into()), TypeHint::Bool)
            .unwrap()
            .same_instance(&Value::Bool(true)));
        assert!(convert(Value::Int(7), TypeHint::Str)
            .unwrap()
            .same_instance(&Value::Str("7".into())));
    }

    #[test]
    fn incompatible_target_fails_with_both_sides_named() {
        let err = convert(Value::Bool(true), TypeHint::Map).unwrap_err();
        assert_eq!(err.from, "bool");
        assert_eq!(err.to, "map");
    }

    #[test]
    fn null_assigns_to_any_target() {
        assert!(convert(Value::Null, TypeHint::Int).unwrap().is_null());
    }
}
