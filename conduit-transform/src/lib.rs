//! The Transformation Gateway (C7, spec §4.4): resolves per-column rules
//! locally (passthrough, upper/lower, cast, default-when-null) and
//! dispatches named custom rules to an external transformation endpoint,
//! falling back to the source value on any transport error or non-success
//! status rather than aborting the batch.

pub mod client;
pub mod rules;

pub use client::{TransformClient, TransformStatus};
pub use rules::{TransformationRule, TransformationType};

use std::collections::BTreeMap;

use conduit_types::{Field, FieldMap};

/// `TransformData(data, rules, endpoint) -> data'` (spec §4.4). With an
/// empty rule set, returns `data` unchanged. The return value contains
/// only the target columns the rules produced — it is not a union with
/// `data` (spec §4.4's closing line).
pub async fn transform_data(
    data: &FieldMap,
    rules: &[TransformationRule],
    client: Option<&TransformClient>,
) -> FieldMap {
    if rules.is_empty() {
        return data.clone();
    }

    let mut output = BTreeMap::new();
    for rule in rules {
        let Some(source_value) = data.get(&rule.source_column) else {
            // "If it is absent, skip the rule silently."
            continue;
        };

        let transformed = apply_rule(source_value, rule, client).await;
        output.insert(rule.target_column.clone(), transformed);
    }
    output
}

async fn apply_rule(value: &Field, rule: &TransformationRule, client: Option<&TransformClient>) -> Field {
    if let (Some(name), Some(client)) = (&rule.transformation_name, client) {
        if !rules::is_builtin_name(name) {
            match client.invoke(name, value).await {
                Ok(transformed) => return transformed,
                Err(e) => {
                    log::warn!("transform: remote rule `{name}` failed, falling back to source value: {e}");
                    return value.clone();
                }
            }
        }
    }
    rules::apply_builtin(value, rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_types::Field;

    fn rule(source: &str, target: &str, kind: TransformationType) -> TransformationRule {
        TransformationRule {
            source_column: source.to_string(),
            target_column: target.to_string(),
            transformation_type: kind,
            transformation_name: None,
            parameters: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn empty_rule_set_returns_input_unchanged() {
        let data: FieldMap = [("name".to_string(), Field::String("ada".into()))].into_iter().collect();
        let out = transform_data(&data, &[], None).await;
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn missing_source_column_skips_rule_silently() {
        let data = FieldMap::new();
        let out = transform_data(&data, &[rule("missing", "target", TransformationType::Direct)], None).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn output_contains_only_target_columns_not_a_union() {
        let data: FieldMap = [
            ("name".to_string(), Field::String("ada".into())),
            ("other".to_string(), Field::Int(1)),
        ]
        .into_iter()
        .collect();
        let out = transform_data(&data, &[rule("name", "name_up", TransformationType::Uppercase)], None).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("name_up"), Some(&Field::String("ADA".into())));
        assert!(!out.contains_key("other"));
    }

    #[tokio::test]
    async fn transform_data_is_pure_with_no_endpoint() {
        let data: FieldMap = [("name".to_string(), Field::String("ada".into()))].into_iter().collect();
        let rules = vec![rule("name", "name_up", TransformationType::Uppercase)];
        let out1 = transform_data(&data, &rules, None).await;
        let out2 = transform_data(&data, &rules, None).await;
        assert_eq!(out1, out2);
    }
}
