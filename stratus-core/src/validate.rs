//! Cross-parameter constraint checks.
//!
//! Each rule inspects a populated [`StackParams`] and reports whether the
//! combination is invalid. [`CLUSTER_CONSTRAINTS`] lists the rules applied
//! before a cluster stack is rendered, in reporting order. Every rule is
//! evaluated; the first violation in list order is surfaced.

use crate::error::{Result, StratusError};
use crate::params::{keys, StackParams};

/// A predicate over two (or one) parameter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Violated when both keys are present.
    MutuallyExclusive { first: &'static str, second: &'static str },
    /// Violated when `key` is present and its comma-split count is outside `[min, max]`.
    Cardinality { key: &'static str, min: usize, max: usize },
    /// Violated when `key` is present and `requires` is absent.
    Dependency { key: &'static str, requires: &'static str },
}

impl Rule {
    pub fn violated(&self, params: &StackParams) -> bool {
        match *self {
            Rule::MutuallyExclusive { first, second } => mutually_exclusive(params, first, second),
            Rule::Cardinality { key, min, max } => outside_cardinality(params, key, min, max),
            Rule::Dependency { key, requires } => missing_dependency(params, key, requires),
        }
    }
}

/// A rule paired with the message shown when it fires.
#[derive(Debug, Clone, Copy)]
pub struct Constraint {
    pub rule: Rule,
    pub message: &'static str,
}

/// Rules checked on every non-empty cluster create.
pub const CLUSTER_CONSTRAINTS: &[Constraint] = &[
    Constraint {
        rule: Rule::MutuallyExclusive { first: keys::VPC_AZS, second: keys::VPC_ID },
        message: "You can only specify '--vpc' or '--azs'",
    },
    Constraint {
        rule: Rule::MutuallyExclusive { first: keys::IS_FARGATE, second: keys::USER_DATA },
        message: "You can only specify '--extra-user-data' with the EC2 launch type",
    },
    Constraint {
        rule: Rule::Cardinality { key: keys::VPC_AZS, min: 2, max: 2 },
        message: "You must specify 2 comma-separated availability zones with the '--azs' flag",
    },
    Constraint {
        rule: Rule::Cardinality { key: keys::INSTANCE_ROLE, min: 1, max: 1 },
        message: "You can only specify one instance role name with the '--instance-role' flag",
    },
    Constraint {
        rule: Rule::Dependency { key: keys::SECURITY_GROUP, requires: keys::VPC_ID },
        message: "You have selected a security group. Please specify a VPC with the '--vpc' flag",
    },
    Constraint {
        rule: Rule::Dependency { key: keys::VPC_ID, requires: keys::SUBNET_IDS },
        message: "You have selected a VPC. Please specify 2 comma-separated subnets with the '--subnets' flag",
    },
    Constraint {
        rule: Rule::Dependency { key: keys::SUBNET_IDS, requires: keys::VPC_ID },
        message: "You have selected subnets. Please specify a VPC with the '--vpc' flag",
    },
];

/// Every constraint in `constraints` that `params` violates, in list order.
pub fn violations<'a>(params: &StackParams, constraints: &'a [Constraint]) -> Vec<&'a Constraint> {
    constraints.iter().filter(|c| c.rule.violated(params)).collect()
}

/// Evaluate all constraints and fail with the first violation.
pub fn check(params: &StackParams, constraints: &[Constraint]) -> Result<()> {
    match violations(params, constraints).first() {
        Some(constraint) => Err(StratusError::validation(constraint.message)),
        None => Ok(()),
    }
}

fn mutually_exclusive(params: &StackParams, first: &str, second: &str) -> bool {
    params.lookup(first).is_present() && params.lookup(second).is_present()
}

fn missing_dependency(params: &StackParams, key: &str, requires: &str) -> bool {
    params.lookup(key).is_present() && !params.lookup(requires).is_present()
}

fn outside_cardinality(params: &StackParams, key: &str, min: usize, max: usize) -> bool {
    match params.lookup(key).value() {
        Some(value) => {
            let count = value.split(',').count();
            count < min || count > max
        }
        None => false,
    }
}
