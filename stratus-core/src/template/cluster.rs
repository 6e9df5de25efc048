//! The cluster stack document.
//!
//! One fixed set of parameters, conditions and resources. Which resources
//! are actually provisioned is decided by the stack service when it
//! evaluates the conditions against the submitted parameters.

use super::{
    INSTANCE_ASG_LOGICAL_ID, SECURITY_GROUP_LOGICAL_ID, SUBNET1_LOGICAL_ID, SUBNET2_LOGICAL_ID,
    VPC_LOGICAL_ID,
};
use crate::params::keys;
use serde_json::{json, Map, Value};

const DESCRIPTION: &str =
    "AWS CloudFormation template to create resources required to run tasks on an ECS cluster.";

/// Assemble the full document around the rendered tag lists.
pub(super) fn document(tags: &Value, asg_tags: &Value) -> Value {
    let mut resources = Map::new();
    network_resources(&mut resources, tags);
    security_resources(&mut resources, tags);
    compute_resources(&mut resources, asg_tags);

    json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Description": DESCRIPTION,
        "Mappings": mappings(),
        "Parameters": parameters(),
        "Conditions": conditions(),
        "Resources": Value::Object(resources),
    })
}

fn mappings() -> Value {
    json!({
        "VpcCidrs": {
            "vpc": { "cidr": "10.0.0.0/16" },
            "pubsubnet1": { "cidr": "10.0.0.0/24" },
            "pubsubnet2": { "cidr": "10.0.1.0/24" }
        }
    })
}

fn parameter(kind: &str, description: &str, default: &str) -> Value {
    json!({ "Type": kind, "Description": description, "Default": default })
}

fn parameters() -> Value {
    let mut params = Map::new();
    params.insert(keys::AMI_ID.into(), parameter("String", "ECS EC2 AMI id", ""));
    params.insert(keys::INSTANCE_TYPE.into(), parameter("String", "ECS EC2 instance type", ""));
    params.insert(
        keys::SPOT_PRICE.into(),
        parameter("Number", "If greater than 0, then a EC2 Spot instance will be requested", "0"),
    );
    params.insert(
        keys::KEY_PAIR_NAME.into(),
        parameter(
            "String",
            "Optional - Name of an existing EC2 KeyPair to enable SSH access to the ECS instances",
            "",
        ),
    );
    params.insert(
        keys::VPC_ID.into(),
        json!({
            "Type": "String",
            "Description": "Optional - VPC Id of existing VPC. Leave blank to have a new VPC created",
            "Default": "",
            "AllowedPattern": "^(?:vpc-[0-9a-f]{8}|vpc-[0-9a-f]{17}|)$",
            "ConstraintDescription": "VPC Id must begin with 'vpc-' followed by either an 8 or 17 character identifier, or leave blank to have a new VPC created"
        }),
    );
    params.insert(
        keys::SUBNET_IDS.into(),
        parameter(
            "CommaDelimitedList",
            "Optional - Comma separated list of two (2) existing VPC Subnet Ids where ECS instances will run.  Required if setting VpcId.",
            "",
        ),
    );
    params.insert(
        keys::ASG_MAX_SIZE.into(),
        parameter("Number", "Maximum size and initial Desired Capacity of ECS Auto Scaling Group", "1"),
    );
    params.insert(
        keys::SECURITY_GROUP.into(),
        parameter(
            "CommaDelimitedList",
            "Optional - Existing security group to associate the container instances. Creates one by default.",
            "",
        ),
    );
    params.insert(
        keys::SOURCE_CIDR.into(),
        parameter("String", "Optional - CIDR/IP range for EcsPort - defaults to 0.0.0.0/0", "0.0.0.0/0"),
    );
    params.insert(
        keys::ECS_PORT.into(),
        parameter("String", "Optional - Security Group port to open on ECS instances - defaults to port 80", "80"),
    );
    params.insert(
        keys::VPC_AZS.into(),
        parameter(
            "CommaDelimitedList",
            "Optional - Comma-delimited list of VPC availability zones in which to create subnets.  Required if setting VpcId.",
            "",
        ),
    );
    params.insert(
        keys::ASSOCIATE_PUBLIC_IP_ADDRESS.into(),
        parameter(
            "String",
            "Optional - Automatically assign public IP addresses to new instances in this VPC.",
            "true",
        ),
    );
    params.insert(keys::CLUSTER.into(), parameter("String", "ECS Cluster Name", "default"));
    params.insert(keys::INSTANCE_ROLE.into(), parameter("String", "Optional - Instance IAM Role.", ""));
    params.insert(
        keys::IS_FARGATE.into(),
        parameter("String", "Optional - Whether to create resources only for running Fargate tasks.", "false"),
    );
    params.insert(keys::IS_IMDS_V2.into(), parameter("String", "Optional - Disable IMDSv1.", "false"));
    params.insert(
        keys::USER_DATA.into(),
        parameter(
            "String",
            "User data for EC2 instances. Required for EC2 launch type, ignored with Fargate",
            "",
        ),
    );
    Value::Object(params)
}

fn is_blank_list(param: &str) -> Value {
    json!({ "Fn::Equals": [{ "Fn::Join": ["", { "Ref": param }] }, ""] })
}

fn conditions() -> Value {
    let mut conditions = Map::new();
    conditions.insert(
        "IsCNRegion".into(),
        json!({
            "Fn::Or": [
                { "Fn::Equals": [{ "Ref": "AWS::Region" }, "cn-north-1"] },
                { "Fn::Equals": [{ "Ref": "AWS::Region" }, "cn-northwest-1"] }
            ]
        }),
    );
    conditions.insert(
        "LaunchInstances".into(),
        json!({ "Fn::Equals": [{ "Ref": keys::IS_FARGATE }, "false"] }),
    );
    conditions.insert(
        "EnableIMDSv2".into(),
        json!({ "Fn::Equals": [{ "Ref": keys::IS_IMDS_V2 }, "true"] }),
    );
    conditions.insert(
        "CreateVpcResources".into(),
        json!({ "Fn::Equals": [{ "Ref": keys::VPC_ID }, ""] }),
    );
    conditions.insert(
        "CreateSecurityGroup".into(),
        json!({ "Fn::And": [{ "Condition": "LaunchInstances" }, is_blank_list(keys::SECURITY_GROUP)] }),
    );
    conditions.insert(
        "CreateEC2LCWithKeyPair".into(),
        json!({
            "Fn::And": [
                { "Condition": "LaunchInstances" },
                { "Fn::Not": [{ "Fn::Equals": [{ "Ref": keys::KEY_PAIR_NAME }, ""] }] }
            ]
        }),
    );
    conditions.insert(
        "UseSpecifiedVpcAvailabilityZones".into(),
        json!({ "Fn::Not": [is_blank_list(keys::VPC_AZS)] }),
    );
    conditions.insert(
        "CreateEcsInstanceRole".into(),
        json!({
            "Fn::And": [
                { "Condition": "LaunchInstances" },
                { "Fn::Equals": [{ "Ref": keys::INSTANCE_ROLE }, ""] }
            ]
        }),
    );
    conditions.insert(
        "UseSpotInstances".into(),
        json!({ "Fn::Not": [{ "Fn::Equals": [{ "Ref": keys::SPOT_PRICE }, 0] }] }),
    );
    Value::Object(conditions)
}

fn subnet(index: &str, cidr_key: &str, tags: &Value) -> Value {
    json!({
        "Condition": "CreateVpcResources",
        "Type": "AWS::EC2::Subnet",
        "Properties": {
            "VpcId": { "Ref": VPC_LOGICAL_ID },
            "CidrBlock": { "Fn::FindInMap": ["VpcCidrs", cidr_key, "cidr"] },
            "Tags": tags,
            "AvailabilityZone": {
                "Fn::If": [
                    "UseSpecifiedVpcAvailabilityZones",
                    { "Fn::Select": [index, { "Ref": keys::VPC_AZS }] },
                    { "Fn::Select": [index, { "Fn::GetAZs": { "Ref": "AWS::Region" } }] }
                ]
            }
        }
    })
}

fn subnet_route_association(subnet_id: &str) -> Value {
    json!({
        "Condition": "CreateVpcResources",
        "Type": "AWS::EC2::SubnetRouteTableAssociation",
        "Properties": {
            "SubnetId": { "Ref": subnet_id },
            "RouteTableId": { "Ref": "RouteViaIgw" }
        }
    })
}

fn network_resources(resources: &mut Map<String, Value>, tags: &Value) {
    resources.insert(
        VPC_LOGICAL_ID.into(),
        json!({
            "Condition": "CreateVpcResources",
            "Type": "AWS::EC2::VPC",
            "Properties": {
                "EnableDnsSupport": true,
                "EnableDnsHostnames": true,
                "CidrBlock": { "Fn::FindInMap": ["VpcCidrs", "vpc", "cidr"] },
                "Tags": tags
            }
        }),
    );
    resources.insert(SUBNET1_LOGICAL_ID.into(), subnet("0", "pubsubnet1", tags));
    resources.insert(SUBNET2_LOGICAL_ID.into(), subnet("1", "pubsubnet2", tags));
    resources.insert(
        "InternetGateway".into(),
        json!({
            "Condition": "CreateVpcResources",
            "Type": "AWS::EC2::InternetGateway",
            "Properties": { "Tags": tags }
        }),
    );
    resources.insert(
        "AttachGateway".into(),
        json!({
            "Condition": "CreateVpcResources",
            "Type": "AWS::EC2::VPCGatewayAttachment",
            "Properties": {
                "VpcId": { "Ref": VPC_LOGICAL_ID },
                "InternetGatewayId": { "Ref": "InternetGateway" }
            }
        }),
    );
    resources.insert(
        "RouteViaIgw".into(),
        json!({
            "Condition": "CreateVpcResources",
            "Type": "AWS::EC2::RouteTable",
            "Properties": {
                "VpcId": { "Ref": VPC_LOGICAL_ID },
                "Tags": tags
            }
        }),
    );
    resources.insert(
        "PublicRouteViaIgw".into(),
        json!({
            "Condition": "CreateVpcResources",
            "DependsOn": "AttachGateway",
            "Type": "AWS::EC2::Route",
            "Properties": {
                "RouteTableId": { "Ref": "RouteViaIgw" },
                "DestinationCidrBlock": "0.0.0.0/0",
                "GatewayId": { "Ref": "InternetGateway" }
            }
        }),
    );
    resources.insert(
        "PubSubnet1RouteTableAssociation".into(),
        subnet_route_association(SUBNET1_LOGICAL_ID),
    );
    resources.insert(
        "PubSubnet2RouteTableAssociation".into(),
        subnet_route_association(SUBNET2_LOGICAL_ID),
    );
}

fn security_resources(resources: &mut Map<String, Value>, tags: &Value) {
    resources.insert(
        SECURITY_GROUP_LOGICAL_ID.into(),
        json!({
            "Condition": "CreateSecurityGroup",
            "Type": "AWS::EC2::SecurityGroup",
            "Properties": {
                "GroupDescription": "ECS Allowed Ports",
                "Tags": tags,
                "VpcId": {
                    "Fn::If": ["CreateVpcResources", { "Ref": VPC_LOGICAL_ID }, { "Ref": keys::VPC_ID }]
                },
                "SecurityGroupIngress": [{
                    "IpProtocol": "tcp",
                    "FromPort": { "Ref": keys::ECS_PORT },
                    "ToPort": { "Ref": keys::ECS_PORT },
                    "CidrIp": { "Ref": keys::SOURCE_CIDR }
                }]
            }
        }),
    );
    resources.insert(
        "EcsInstanceRole".into(),
        json!({
            "Condition": "CreateEcsInstanceRole",
            "Type": "AWS::IAM::Role",
            "Properties": {
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": {
                            "Service": [
                                { "Fn::If": ["IsCNRegion", "ec2.amazonaws.com.cn", "ec2.amazonaws.com"] }
                            ]
                        },
                        "Action": ["sts:AssumeRole"]
                    }]
                },
                "Path": "/",
                "ManagedPolicyArns": [
                    "arn:aws:iam::aws:policy/service-role/AmazonEC2ContainerServiceforEC2Role"
                ]
            }
        }),
    );
    resources.insert(
        "EcsInstanceProfile".into(),
        json!({
            "Condition": "LaunchInstances",
            "Type": "AWS::IAM::InstanceProfile",
            "Properties": {
                "Path": "/",
                "Roles": [
                    {
                        "Fn::If": [
                            "CreateEcsInstanceRole",
                            { "Ref": "EcsInstanceRole" },
                            { "Ref": keys::INSTANCE_ROLE }
                        ]
                    }
                ]
            }
        }),
    );
}

fn if_or_no_value(condition: &str, value: Value) -> Value {
    json!({ "Fn::If": [condition, value, { "Ref": "AWS::NoValue" }] })
}

fn compute_resources(resources: &mut Map<String, Value>, asg_tags: &Value) {
    resources.insert(
        "EcsInstanceLc".into(),
        json!({
            "Condition": "LaunchInstances",
            "Type": "AWS::AutoScaling::LaunchConfiguration",
            "Properties": {
                "ImageId": { "Ref": keys::AMI_ID },
                "InstanceType": { "Ref": keys::INSTANCE_TYPE },
                "SpotPrice": if_or_no_value("UseSpotInstances", json!({ "Ref": keys::SPOT_PRICE })),
                "AssociatePublicIpAddress": { "Ref": keys::ASSOCIATE_PUBLIC_IP_ADDRESS },
                "IamInstanceProfile": { "Ref": "EcsInstanceProfile" },
                "KeyName": if_or_no_value("CreateEC2LCWithKeyPair", json!({ "Ref": keys::KEY_PAIR_NAME })),
                "MetadataOptions": if_or_no_value(
                    "EnableIMDSv2",
                    json!({ "HttpEndpoint": "enabled", "HttpTokens": "required" })
                ),
                "SecurityGroups": {
                    "Fn::If": [
                        "CreateSecurityGroup",
                        [{ "Ref": SECURITY_GROUP_LOGICAL_ID }],
                        { "Ref": keys::SECURITY_GROUP }
                    ]
                },
                "UserData": { "Fn::Base64": { "Ref": keys::USER_DATA } }
            }
        }),
    );
    resources.insert(
        INSTANCE_ASG_LOGICAL_ID.into(),
        json!({
            "Condition": "LaunchInstances",
            "Type": "AWS::AutoScaling::AutoScalingGroup",
            "Properties": {
                "VPCZoneIdentifier": {
                    "Fn::If": [
                        "CreateVpcResources",
                        [{
                            "Fn::Join": [",", [{ "Ref": SUBNET1_LOGICAL_ID }, { "Ref": SUBNET2_LOGICAL_ID }]]
                        }],
                        { "Ref": keys::SUBNET_IDS }
                    ]
                },
                "LaunchConfigurationName": { "Ref": "EcsInstanceLc" },
                "MinSize": "0",
                "MaxSize": { "Ref": keys::ASG_MAX_SIZE },
                "DesiredCapacity": { "Ref": keys::ASG_MAX_SIZE },
                "Tags": asg_tags
            }
        }),
    );
}
