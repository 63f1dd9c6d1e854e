use std::collections::BTreeMap;

use conduit_types::Field;

/// The closed set of built-in transformation kinds (spec §3
/// `TransformationRule`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    Direct,
    Uppercase,
    Lowercase,
    Cast,
    Default,
}

/// One column rule (spec §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TransformationRule {
    pub source_column: String,
    pub target_column: String,
    pub transformation_type: TransformationType,
    /// Names a remote function when present and not a recognized built-in
    /// name (spec §4.4).
    pub transformation_name: Option<String>,
    pub parameters: BTreeMap<String, String>,
}

/// Names reserved for the built-in dispatch table; anything else passed as
/// `transformation_name` is treated as a remote function name (spec §4.4:
/// "a non-built-in function").
const BUILTIN_NAMES: &[&str] = &["direct", "uppercase", "lowercase", "cast", "default"];

pub fn is_builtin_name(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name.to_ascii_lowercase().as_str())
}

/// The closed-enum dispatch for built-in rules (spec §4.4), grounded on
/// the match-over-closed-enum shape of `dozer-core::aggregation::operators`
/// generalized from aggregation measures to transformation types.
pub fn apply_builtin(value: &Field, rule: &TransformationRule) -> Field {
    match rule.transformation_type {
        TransformationType::Direct => value.clone(),
        TransformationType::Uppercase => match value {
            Field::String(s) => Field::String(s.to_uppercase()),
            other => other.clone(),
        },
        TransformationType::Lowercase => match value {
            Field::String(s) => Field::String(s.to_lowercase()),
            other => other.clone(),
        },
        // Cast: pass through, implementation reserved (spec §4.4).
        TransformationType::Cast => value.clone(),
        TransformationType::Default => {
            if value.is_null() {
                rule.parameters
                    .get("default_value")
                    .map(|s| Field::String(s.clone()))
                    .unwrap_or_else(|| value.clone())
            } else {
                value.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: TransformationType, params: &[(&str, &str)]) -> TransformationRule {
        TransformationRule {
            source_column: "s".to_string(),
            target_column: "t".to_string(),
            transformation_type: kind,
            transformation_name: None,
            parameters: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn uppercase_transforms_strings_only() {
        let r = rule(TransformationType::Uppercase, &[]);
        assert_eq!(apply_builtin(&Field::String("ada".into()), &r), Field::String("ADA".into()));
        assert_eq!(apply_builtin(&Field::Int(5), &r), Field::Int(5));
    }

    #[test]
    fn lowercase_transforms_strings_only() {
        let r = rule(TransformationType::Lowercase, &[]);
        assert_eq!(apply_builtin(&Field::String("ADA".into()), &r), Field::String("ada".into()));
    }

    #[test]
    fn default_substitutes_only_when_null() {
        let r = rule(TransformationType::Default, &[("default_value", "n/a")]);
        assert_eq!(apply_builtin(&Field::Null, &r), Field::String("n/a".into()));
        assert_eq!(apply_builtin(&Field::Int(3), &r), Field::Int(3));
    }

    #[test]
    fn direct_and_cast_pass_through() {
        let direct = rule(TransformationType::Direct, &[]);
        let cast = rule(TransformationType::Cast, &[]);
        assert_eq!(apply_builtin(&Field::Int(9), &direct), Field::Int(9));
        assert_eq!(apply_builtin(&Field::Int(9), &cast), Field::Int(9));
    }

    #[test]
    fn is_builtin_name_is_case_insensitive() {
        assert!(is_builtin_name("Uppercase"));
        assert!(!is_builtin_name("to_upper_remote"));
    }
}
