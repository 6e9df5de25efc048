//! Template condition evaluation for the local provider.
//!
//! Supports the intrinsic functions the cluster template uses in its
//! `Conditions` section. List parameters are handled as their raw
//! comma-separated text, which is enough for blank checks.

use crate::error::{Result, StratusError};
use crate::template::ClusterTemplate;
use serde_json::Value;
use std::collections::BTreeMap;

/// Effective parameter values plus the pseudo parameters the stack knows.
pub(crate) struct Scope<'a> {
    template: &'a ClusterTemplate,
    values: BTreeMap<String, String>,
}

impl<'a> Scope<'a> {
    /// Overlay `given` on the template's declared defaults.
    pub(crate) fn new<'p>(
        template: &'a ClusterTemplate,
        given: impl IntoIterator<Item = (&'p str, &'p str)>,
        region: &str,
        stack_name: &str,
    ) -> Self {
        let mut values: BTreeMap<String, String> = template
            .parameter_names()
            .into_iter()
            .map(|name| (name.to_string(), template.parameter_default(name).unwrap_or_default().to_string()))
            .collect();
        for (key, value) in given {
            values.insert(key.to_string(), value.to_string());
        }
        values.insert("AWS::Region".to_string(), region.to_string());
        values.insert("AWS::StackName".to_string(), stack_name.to_string());
        Self { template, values }
    }

    /// Evaluate a named condition.
    pub(crate) fn condition(&self, name: &str) -> Result<bool> {
        self.condition_at_depth(name, 0)
    }

    fn condition_at_depth(&self, name: &str, depth: usize) -> Result<bool> {
        // Conditions may reference each other; a cycle would never end.
        if depth > 16 {
            return Err(template_error(format!("condition '{}' nests too deeply", name)));
        }
        let expr = self
            .template
            .conditions()
            .and_then(|c| c.get(name))
            .ok_or_else(|| template_error(format!("unknown condition '{}'", name)))?;
        self.boolean(expr, depth + 1)
    }

    fn boolean(&self, expr: &Value, depth: usize) -> Result<bool> {
        let (function, args) = single_entry(expr)?;
        match (function, args) {
            ("Condition", Value::String(name)) => self.condition_at_depth(name, depth),
            ("Fn::Equals", Value::Array(pair)) if pair.len() == 2 => {
                Ok(self.scalar(&pair[0])? == self.scalar(&pair[1])?)
            }
            ("Fn::Not", Value::Array(inner)) if inner.len() == 1 => Ok(!self.boolean(&inner[0], depth)?),
            ("Fn::And", Value::Array(items)) => {
                for item in items {
                    if !self.boolean(item, depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ("Fn::Or", Value::Array(items)) => {
                for item in items {
                    if self.boolean(item, depth)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            (other, _) => Err(template_error(format!("unsupported condition function '{}'", other))),
        }
    }

    fn scalar(&self, expr: &Value) -> Result<String> {
        match expr {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Array(items) => {
                let parts = items.iter().map(|v| self.scalar(v)).collect::<Result<Vec<_>>>()?;
                Ok(parts.join(","))
            }
            Value::Object(_) => match single_entry(expr)? {
                ("Ref", Value::String(target)) => self
                    .values
                    .get(target.as_str())
                    .cloned()
                    .ok_or_else(|| template_error(format!("unresolved reference '{}'", target))),
                ("Fn::Join", Value::Array(args)) if args.len() == 2 => {
                    let separator = args[0].as_str().unwrap_or_default();
                    match &args[1] {
                        Value::Array(items) => {
                            let parts = items.iter().map(|v| self.scalar(v)).collect::<Result<Vec<_>>>()?;
                            Ok(parts.join(separator))
                        }
                        other => self.scalar(other),
                    }
                }
                (other, _) => Err(template_error(format!("unsupported function '{}'", other))),
            },
            Value::Null => Ok(String::new()),
        }
    }
}

fn single_entry(expr: &Value) -> Result<(&str, &Value)> {
    match expr.as_object() {
        Some(map) if map.len() == 1 => {
            map.iter().next().map(|(k, v)| (k.as_str(), v)).ok_or_else(|| template_error("empty expression"))
        }
        _ => Err(template_error(format!("malformed expression {}", expr))),
    }
}

fn template_error(reason: impl Into<String>) -> StratusError {
    StratusError::Template { reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::keys;

    fn template() -> ClusterTemplate {
        ClusterTemplate::build(&[], "stratus-setup-test").unwrap()
    }

    #[test]
    fn test_defaults_create_network() {
        let template = template();
        let scope = Scope::new(&template, Vec::<(&str, &str)>::new(), "us-west-2", "s");
        assert!(scope.condition("CreateVpcResources").unwrap());
        assert!(scope.condition("LaunchInstances").unwrap());
        assert!(scope.condition("CreateSecurityGroup").unwrap());
        assert!(scope.condition("CreateEcsInstanceRole").unwrap());
        assert!(!scope.condition("UseSpotInstances").unwrap());
        assert!(!scope.condition("IsCNRegion").unwrap());
        assert!(!scope.condition("UseSpecifiedVpcAvailabilityZones").unwrap());
    }

    #[test]
    fn test_existing_network_and_fargate() {
        let template = template();
        let scope = Scope::new(
            &template,
            [(keys::VPC_ID, "vpc-12345678"), (keys::IS_FARGATE, "true"), (keys::VPC_AZS, "a,b")],
            "cn-north-1",
            "s",
        );
        assert!(!scope.condition("CreateVpcResources").unwrap());
        assert!(!scope.condition("LaunchInstances").unwrap());
        assert!(!scope.condition("CreateSecurityGroup").unwrap());
        assert!(scope.condition("IsCNRegion").unwrap());
        assert!(scope.condition("UseSpecifiedVpcAvailabilityZones").unwrap());
    }

    #[test]
    fn test_unknown_condition() {
        let template = template();
        let scope = Scope::new(&template, Vec::<(&str, &str)>::new(), "r", "s");
        assert!(matches!(scope.condition("Nope"), Err(StratusError::Template { .. })));
    }
}
