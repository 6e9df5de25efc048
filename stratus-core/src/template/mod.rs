//! Cluster stack template.
//!
//! [`render`] produces the full conditional document for a cluster stack.
//! Conditions are never evaluated here: the document always carries every
//! resource, and the stack service decides which ones exist from the
//! parameters it is given. That keeps updates able to bring in resources
//! an earlier parameter set left out.
//!
//! # Example
//!
//! ```ignore
//! use stratus_core::tags::Tag;
//! use stratus_core::template;
//!
//! let body = template::render(&[Tag::new("team", "infra")], "stratus-setup-demo")?;
//! ```

mod cluster;

use crate::error::{Result, StratusError};
use crate::tags::{Tag, NAME_TAG};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Logical ids that downstream tooling looks up after creation.
pub const VPC_LOGICAL_ID: &str = "Vpc";
pub const SUBNET1_LOGICAL_ID: &str = "PubSubnetAz1";
pub const SUBNET2_LOGICAL_ID: &str = "PubSubnetAz2";
pub const SECURITY_GROUP_LOGICAL_ID: &str = "EcsSecurityGroup";
pub const INSTANCE_ASG_LOGICAL_ID: &str = "EcsInstanceAsg";

/// Logical ids reported in the post-creation network summary.
pub const NETWORK_LOGICAL_IDS: &[&str] =
    &[VPC_LOGICAL_ID, SUBNET1_LOGICAL_ID, SUBNET2_LOGICAL_ID, SECURITY_GROUP_LOGICAL_ID];

/// Pseudo parameters the stack service resolves itself.
pub const PSEUDO_PARAMETERS: &[&str] = &[
    "AWS::AccountId",
    "AWS::NoValue",
    "AWS::Partition",
    "AWS::Region",
    "AWS::StackId",
    "AWS::StackName",
    "AWS::URLSuffix",
];

/// Scaling-group tag: the scaling group needs to know whether each tag is
/// copied onto the instances it launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoscalingTag {
    pub key: String,
    pub value: String,
    pub propagate_at_launch: bool,
}

/// Tags for the scaling group. Adds a `Name` tag derived from the stack
/// name unless the caller supplied one; only one `Name` is allowed.
pub fn autoscaling_tags(tags: &[Tag], stack_name: &str) -> Vec<AutoscalingTag> {
    let mut asg_tags: Vec<AutoscalingTag> = tags
        .iter()
        .map(|t| AutoscalingTag {
            key: t.key.clone(),
            value: t.value.clone(),
            propagate_at_launch: true,
        })
        .collect();

    if !tags.iter().any(|t| t.key == NAME_TAG) {
        asg_tags.push(AutoscalingTag {
            key: NAME_TAG.to_string(),
            value: format!("ECS Instance - {}", stack_name),
            propagate_at_launch: true,
        });
    }
    asg_tags
}

/// Render the cluster template for `stack_name` with `tags` on every resource.
pub fn render(tags: &[Tag], stack_name: &str) -> Result<String> {
    let template = ClusterTemplate::build(tags, stack_name)?;
    template.verify()?;
    template.to_json()
}

/// A parsed or freshly built cluster template document.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTemplate {
    document: Value,
}

impl ClusterTemplate {
    /// Build the document without serializing it.
    pub fn build(tags: &[Tag], stack_name: &str) -> Result<Self> {
        let tag_json = serde_json::to_value(tags).map_err(|e| StratusError::Template {
            reason: format!("Failed to encode tags: {}", e),
        })?;
        let asg_json =
            serde_json::to_value(autoscaling_tags(tags, stack_name)).map_err(|e| {
                StratusError::Template { reason: format!("Failed to encode scaling group tags: {}", e) }
            })?;
        Ok(Self { document: cluster::document(&tag_json, &asg_json) })
    }

    /// Parse a previously rendered document.
    pub fn parse(body: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(body)
            .map_err(|e| StratusError::Template { reason: format!("Failed to parse template: {}", e) })?;
        if !document.is_object() {
            return Err(StratusError::Template { reason: "Template is not a JSON object".into() });
        }
        Ok(Self { document })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.document.get(name).and_then(Value::as_object)
    }

    pub fn parameter_names(&self) -> BTreeSet<&str> {
        self.section("Parameters").map(|m| m.keys().map(String::as_str).collect()).unwrap_or_default()
    }

    pub fn condition_names(&self) -> BTreeSet<&str> {
        self.section("Conditions").map(|m| m.keys().map(String::as_str).collect()).unwrap_or_default()
    }

    pub fn resource_ids(&self) -> BTreeSet<&str> {
        self.section("Resources").map(|m| m.keys().map(String::as_str).collect()).unwrap_or_default()
    }

    pub fn conditions(&self) -> Option<&Map<String, Value>> {
        self.section("Conditions")
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.section("Resources").and_then(|r| r.get(logical_id))
    }

    /// Name of the condition guarding `logical_id`, if any.
    pub fn resource_condition(&self, logical_id: &str) -> Option<&str> {
        self.resource(logical_id).and_then(|r| r.get("Condition")).and_then(Value::as_str)
    }

    pub fn resource_type(&self, logical_id: &str) -> Option<&str> {
        self.resource(logical_id).and_then(|r| r.get("Type")).and_then(Value::as_str)
    }

    /// Default value declared for a parameter.
    pub fn parameter_default(&self, name: &str) -> Option<&str> {
        self.section("Parameters")
            .and_then(|p| p.get(name))
            .and_then(|p| p.get("Default"))
            .and_then(Value::as_str)
    }

    /// Check that every reference in the document resolves.
    ///
    /// `Ref` targets must be parameters, resources or pseudo parameters;
    /// condition names used by resources, `Fn::If` and `Condition`
    /// expressions must be declared; `DependsOn` must name a resource and
    /// `Fn::FindInMap` a declared mapping.
    pub fn verify(&self) -> Result<()> {
        let parameters = self.parameter_names();
        let conditions = self.condition_names();
        let resources = self.resource_ids();
        let mappings: BTreeSet<&str> =
            self.section("Mappings").map(|m| m.keys().map(String::as_str).collect()).unwrap_or_default();

        let mut refs = Vec::new();
        collect_references(&self.document, &mut refs);

        for reference in refs {
            let ok = match reference {
                Reference::Ref(target) => {
                    parameters.contains(target)
                        || resources.contains(target)
                        || PSEUDO_PARAMETERS.contains(&target)
                }
                Reference::Condition(name) => conditions.contains(name),
                Reference::DependsOn(name) => resources.contains(name),
                Reference::Mapping(name) => mappings.contains(name),
            };
            if !ok {
                return Err(StratusError::Template { reason: format!("Unresolved {}", reference) });
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.document)
            .map_err(|e| StratusError::Template { reason: format!("Failed to serialize template: {}", e) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reference<'a> {
    Ref(&'a str),
    Condition(&'a str),
    DependsOn(&'a str),
    Mapping(&'a str),
}

impl std::fmt::Display for Reference<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Ref(t) => write!(f, "reference '{}'", t),
            Reference::Condition(c) => write!(f, "condition '{}'", c),
            Reference::DependsOn(r) => write!(f, "dependency '{}'", r),
            Reference::Mapping(m) => write!(f, "mapping '{}'", m),
        }
    }
}

fn collect_references<'a>(value: &'a Value, out: &mut Vec<Reference<'a>>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                match (key.as_str(), inner) {
                    ("Ref", Value::String(target)) => out.push(Reference::Ref(target)),
                    ("Condition", Value::String(name)) => out.push(Reference::Condition(name)),
                    ("DependsOn", Value::String(name)) => out.push(Reference::DependsOn(name)),
                    ("DependsOn", Value::Array(names)) => {
                        out.extend(names.iter().filter_map(Value::as_str).map(Reference::DependsOn))
                    }
                    ("Fn::If", Value::Array(args)) => {
                        if let Some(name) = args.first().and_then(Value::as_str) {
                            out.push(Reference::Condition(name));
                        }
                    }
                    ("Fn::FindInMap", Value::Array(args)) => {
                        if let Some(name) = args.first().and_then(Value::as_str) {
                            out.push(Reference::Mapping(name));
                        }
                    }
                    _ => {}
                }
                // Parameter declarations are not expressions.
                if key != "Parameters" {
                    collect_references(inner, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_references(v, out)),
        _ => {}
    }
}
