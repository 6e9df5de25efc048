//! Stack parameter set.
//!
//! An ordered key/value set submitted with stack create and update
//! requests. A key that was never added is distinct from a key added
//! with an empty value; lookups report the former as [`Lookup::Absent`].

use crate::error::{Result, StratusError};
use serde::{Deserialize, Serialize};

/// Parameter keys understood by the cluster template.
pub mod keys {
    pub const ASG_MAX_SIZE: &str = "AsgMaxSize";
    pub const VPC_AZS: &str = "VpcAvailabilityZones";
    pub const SECURITY_GROUP: &str = "SecurityGroupIds";
    pub const SOURCE_CIDR: &str = "SourceCidr";
    pub const ECS_PORT: &str = "EcsPort";
    pub const SUBNET_IDS: &str = "SubnetIds";
    pub const VPC_ID: &str = "VpcId";
    pub const INSTANCE_TYPE: &str = "EcsInstanceType";
    pub const KEY_PAIR_NAME: &str = "KeyName";
    pub const CLUSTER: &str = "EcsCluster";
    pub const AMI_ID: &str = "EcsAmiId";
    pub const ASSOCIATE_PUBLIC_IP_ADDRESS: &str = "AssociatePublicIpAddress";
    pub const IS_IMDS_V2: &str = "IsIMDSv2";
    pub const INSTANCE_ROLE: &str = "InstanceRole";
    pub const IS_FARGATE: &str = "IsFargate";
    pub const USER_DATA: &str = "UserData";
    pub const SPOT_PRICE: &str = "SpotPrice";
}

/// Keys that must hold a value before any stack operation is submitted.
pub const REQUIRED_PARAMETERS: &[&str] = &[keys::CLUSTER];

/// A single stack parameter as exchanged with the stack service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParameter {
    pub key: String,
    pub value: Option<String>,
    /// Ask the stack service to keep the value it already has.
    #[serde(default)]
    pub use_previous_value: bool,
}

impl StackParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: Some(value.into()), use_previous_value: false }
    }
}

/// Outcome of looking up a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Present(&'a str),
    Absent,
}

impl<'a> Lookup<'a> {
    pub fn is_present(&self) -> bool {
        matches!(self, Lookup::Present(_))
    }

    pub fn value(&self) -> Option<&'a str> {
        match self {
            Lookup::Present(v) => Some(v),
            Lookup::Absent => None,
        }
    }
}

/// Ordered parameter set with a required-key list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackParams {
    params: Vec<StackParameter>,
    required: Vec<String>,
}

impl StackParams {
    /// Empty set that will require `required` on [`StackParams::validate`].
    pub fn new<S: AsRef<str>>(required: &[S]) -> Self {
        Self {
            params: Vec::new(),
            required: required.iter().map(|k| k.as_ref().to_string()).collect(),
        }
    }

    /// Seed a set for an update from the parameters the stack already has.
    ///
    /// Every existing entry is kept and marked `use_previous_value`, so the
    /// stack service leaves untouched parameters alone. A required key the
    /// stack did not report is added as a value-less `use_previous_value`
    /// entry for the stack service to fill in.
    pub fn for_update<S: AsRef<str>>(required: &[S], existing: &[StackParameter]) -> Self {
        let mut set = Self::new(required);
        for param in existing {
            set.upsert(StackParameter {
                key: param.key.clone(),
                value: param.value.clone(),
                use_previous_value: true,
            });
        }
        let missing: Vec<String> =
            set.required.iter().filter(|k| set.parameter(k).is_none()).cloned().collect();
        for key in missing {
            set.upsert(StackParameter { key, value: None, use_previous_value: true });
        }
        set
    }

    /// Set `key` to `value`, replacing any earlier value.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.upsert(StackParameter::new(key, value));
    }

    fn upsert(&mut self, param: StackParameter) {
        match self.params.iter_mut().find(|p| p.key == param.key) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
    }

    /// Tri-state lookup. Only entries carrying a value count as present.
    pub fn lookup(&self, key: &str) -> Lookup<'_> {
        match self.params.iter().find(|p| p.key == key) {
            Some(StackParameter { value: Some(v), .. }) => Lookup::Present(v.as_str()),
            _ => Lookup::Absent,
        }
    }

    /// Value for `key`, or `ParameterNotFound` if it was never added.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.lookup(key)
            .value()
            .ok_or_else(|| StratusError::ParameterNotFound { key: key.to_string() })
    }

    /// Full parameter entry, including the `use_previous_value` marker.
    pub fn parameter(&self, key: &str) -> Option<&StackParameter> {
        self.params.iter().find(|p| p.key == key)
    }

    /// Fail on the first required key without a value. A `use_previous_value`
    /// entry is satisfied by the stack service.
    pub fn validate(&self) -> Result<()> {
        let satisfied = |key: &str| match self.parameter(key) {
            Some(p) => p.value.is_some() || p.use_previous_value,
            None => false,
        };
        match self.required.iter().find(|k| !satisfied(k.as_str())) {
            Some(key) => Err(StratusError::MissingParameter { key: key.clone() }),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StackParameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Owned parameter list in insertion order, as sent to the stack service.
    pub fn to_vec(&self) -> Vec<StackParameter> {
        self.params.clone()
    }
}
