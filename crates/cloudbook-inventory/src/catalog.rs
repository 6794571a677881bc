//! Resource query catalog
//!
//! Every resource kind the collector knows about is a `ResourceQuerySpec`:
//! which provider call to make, where the items live in the response and how
//! each item becomes a row. Adding a kind is a data change.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::projection::{ColumnSpec, Projection, ValueTransform};

/// Provider-side call for one resource kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderQuery {
    /// Service name as understood by the provider tool (`ec2`, `s3api`, ...)
    pub service: String,
    /// Operation name (`describe-vpcs`, ...)
    pub operation: String,
    /// Extra arguments passed verbatim
    #[serde(default)]
    pub args: Vec<String>,
}

/// Declarative description of one resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuerySpec {
    /// Stable key (`vpcs`, `ec2_instances`, ...)
    pub key: String,
    /// Section title in the report
    pub title: String,
    /// One-line description shown under the title
    #[serde(default)]
    pub description: String,
    /// Provider call
    pub query: ProviderQuery,
    /// Permission the read-only inventory role needs for the call
    pub iam_action: String,
    /// Response to rows mapping
    pub projection: Projection,
}

impl ResourceQuerySpec {
    /// Create a new spec
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            description: String::new(),
            query: ProviderQuery::default(),
            iam_action: String::new(),
            projection: Projection::default(),
        }
    }

    /// Set the description
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the provider call
    #[must_use]
    pub fn query(mut self, service: impl Into<String>, operation: impl Into<String>) -> Self {
        self.query.service = service.into();
        self.query.operation = operation.into();
        self
    }

    /// Append extra call arguments
    #[must_use]
    pub fn args(mut self, args: &[&str]) -> Self {
        self.query
            .args
            .extend(args.iter().map(|a| (*a).to_string()));
        self
    }

    /// Set the required permission
    #[must_use]
    pub fn iam_action(mut self, action: impl Into<String>) -> Self {
        self.iam_action = action.into();
        self
    }

    /// Set the items path
    #[must_use]
    pub fn items(mut self, path: impl Into<String>) -> Self {
        self.projection.items = path.into();
        self
    }

    /// Add a column with the raw value
    #[must_use]
    pub fn column(self, header: &str, path: &str) -> Self {
        self.column_with(header, path, ValueTransform::Raw)
    }

    /// Add a column with a transform
    #[must_use]
    pub fn column_with(mut self, header: &str, path: &str, transform: ValueTransform) -> Self {
        self.projection.columns.push(ColumnSpec {
            header: header.to_string(),
            path: path.to_string(),
            transform,
        });
        self
    }

    /// Check the spec is complete enough to be collected
    ///
    /// # Errors
    /// Returns `InvalidSpec` naming the first missing piece.
    pub fn validate(&self) -> Result<(), InventoryError> {
        let missing = if self.key.trim().is_empty() {
            Some("empty key")
        } else if self.title.trim().is_empty() {
            Some("empty title")
        } else if self.query.service.is_empty() || self.query.operation.is_empty() {
            Some("no provider query")
        } else if self.projection.columns.is_empty() {
            Some("no columns")
        } else {
            None
        };

        match missing {
            Some(reason) => Err(InventoryError::InvalidSpec {
                key: self.key.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Ordered set of resource kinds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    specs: Vec<ResourceQuerySpec>,
}

impl Catalog {
    /// Build a catalog from specs, in the given order
    ///
    /// # Errors
    /// Returns an error if a spec is invalid or two specs share a key.
    pub fn new(specs: Vec<ResourceQuerySpec>) -> Result<Self, InventoryError> {
        let mut seen = HashSet::new();
        for spec in &specs {
            spec.validate()?;
            if !seen.insert(spec.key.as_str()) {
                return Err(InventoryError::DuplicateKind(spec.key.clone()));
            }
        }
        Ok(Self { specs })
    }

    /// The built-in catalog
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            specs: builtin::specs(),
        }
    }

    /// Append extra specs after the existing ones
    ///
    /// # Errors
    /// Returns an error if an extra spec is invalid or reuses a key.
    pub fn extend(self, extra: Vec<ResourceQuerySpec>) -> Result<Self, InventoryError> {
        let mut specs = self.specs;
        specs.extend(extra);
        Self::new(specs)
    }

    /// Keep only the given keys, preserving catalog order
    ///
    /// An empty selection keeps everything.
    ///
    /// # Errors
    /// Returns `UnknownKind` for a key that is not in the catalog.
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> Result<Self, InventoryError> {
        if keys.is_empty() {
            return Ok(self.clone());
        }
        for key in keys {
            if self.get(key.as_ref()).is_none() {
                return Err(InventoryError::UnknownKind(key.as_ref().to_string()));
            }
        }
        Ok(Self {
            specs: self
                .specs
                .iter()
                .filter(|s| keys.iter().any(|k| k.as_ref() == s.key))
                .cloned()
                .collect(),
        })
    }

    /// Look up a spec by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ResourceQuerySpec> {
        self.specs.iter().find(|s| s.key == key)
    }

    /// Specs in order
    #[must_use]
    pub fn specs(&self) -> &[ResourceQuerySpec] {
        &self.specs
    }

    /// Iterate over specs in order
    pub fn iter(&self) -> std::slice::Iter<'_, ResourceQuerySpec> {
        self.specs.iter()
    }

    /// Number of kinds
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl From<Catalog> for Vec<ResourceQuerySpec> {
    fn from(catalog: Catalog) -> Self {
        catalog.specs
    }
}

/// Built-in resource kinds, in report order
mod builtin {
    use super::ResourceQuerySpec as Spec;
    use crate::projection::ValueTransform::{ArnSuffix, Length};

    #[allow(clippy::too_many_lines)]
    pub(super) fn specs() -> Vec<Spec> {
        vec![
            Spec::new("account_aliases", "Account Aliases")
                .describe("Friendly aliases registered for the account")
                .query("iam", "list-account-aliases")
                .iam_action("iam:ListAccountAliases")
                .items("AccountAliases[]")
                .column("Alias", ""),
            Spec::new("organization", "Organization")
                .describe("Organization the account belongs to")
                .query("organizations", "describe-organization")
                .iam_action("organizations:DescribeOrganization")
                .items("Organization")
                .column("Id", "Id")
                .column("ManagementAccount", "MasterAccountId")
                .column("FeatureSet", "FeatureSet"),
            Spec::new("landing_zones", "Control Tower Landing Zones")
                .describe("Control Tower landing zones governing the account")
                .query("controltower", "list-landing-zones")
                .iam_action("controltower:ListLandingZones")
                .items("landingZones[]")
                .column("Arn", "arn"),
            Spec::new("vpcs", "VPC Summary")
                .describe("Virtual private networks and their address ranges")
                .query("ec2", "describe-vpcs")
                .iam_action("ec2:DescribeVpcs")
                .items("Vpcs[]")
                .column("VpcId", "VpcId")
                .column("Cidr", "CidrBlock")
                .column("State", "State")
                .column("Default", "IsDefault"),
            Spec::new("subnets", "Subnets")
                .describe("Subnets carved out of each VPC")
                .query("ec2", "describe-subnets")
                .iam_action("ec2:DescribeSubnets")
                .items("Subnets[]")
                .column("SubnetId", "SubnetId")
                .column("VpcId", "VpcId")
                .column("Cidr", "CidrBlock")
                .column("AvailabilityZone", "AvailabilityZone")
                .column("FreeIps", "AvailableIpAddressCount"),
            Spec::new("vpc_peering", "VPC Peering Connections")
                .describe("Peering links between VPCs")
                .query("ec2", "describe-vpc-peering-connections")
                .iam_action("ec2:DescribeVpcPeeringConnections")
                .items("VpcPeeringConnections[]")
                .column("PeeringId", "VpcPeeringConnectionId")
                .column("RequesterVpc", "RequesterVpcInfo.VpcId")
                .column("AccepterVpc", "AccepterVpcInfo.VpcId")
                .column("Status", "Status.Code"),
            Spec::new("hosted_zones", "Route 53 Hosted Zones")
                .describe("DNS zones hosted for the account")
                .query("route53", "list-hosted-zones")
                .iam_action("route53:ListHostedZones")
                .items("HostedZones[]")
                .column("Name", "Name")
                .column("Id", "Id")
                .column("Records", "ResourceRecordSetCount")
                .column("Private", "Config.PrivateZone"),
            Spec::new("ec2_instances", "EC2 Instances")
                .describe("Virtual servers and their addresses")
                .query("ec2", "describe-instances")
                .iam_action("ec2:DescribeInstances")
                .items("Reservations[].Instances[]")
                .column("InstanceId", "InstanceId")
                .column("Type", "InstanceType")
                .column("State", "State.Name")
                .column("LaunchTime", "LaunchTime")
                .column("PrivateIp", "PrivateIpAddress")
                .column("PublicIp", "PublicIpAddress"),
            Spec::new("autoscaling_groups", "Auto Scaling Groups")
                .describe("Auto scaling groups and their capacity bounds")
                .query("autoscaling", "describe-auto-scaling-groups")
                .iam_action("autoscaling:DescribeAutoScalingGroups")
                .items("AutoScalingGroups[]")
                .column("Name", "AutoScalingGroupName")
                .column("Min", "MinSize")
                .column("Max", "MaxSize")
                .column("Desired", "DesiredCapacity")
                .column_with("Instances", "Instances", Length),
            Spec::new("rds_instances", "RDS Instances")
                .describe("Managed relational database instances")
                .query("rds", "describe-db-instances")
                .iam_action("rds:DescribeDBInstances")
                .items("DBInstances[]")
                .column("Identifier", "DBInstanceIdentifier")
                .column("Engine", "Engine")
                .column("Status", "DBInstanceStatus")
                .column("Endpoint", "Endpoint.Address")
                .column("Class", "DBInstanceClass"),
            Spec::new("s3_buckets", "S3 Buckets")
                .describe("Object storage buckets owned by the account")
                .query("s3api", "list-buckets")
                .iam_action("s3:ListAllMyBuckets")
                .items("Buckets[]")
                .column("Name", "Name")
                .column("Created", "CreationDate"),
            Spec::new("rest_apis", "API Gateway REST APIs")
                .describe("REST APIs published through API Gateway")
                .query("apigateway", "get-rest-apis")
                .iam_action("apigateway:GET")
                .items("items[]")
                .column("Id", "id")
                .column("Name", "name")
                .column("Created", "createdDate"),
            Spec::new("cloudfront_distributions", "CloudFront Distributions")
                .describe("CDN distributions and their domains")
                .query("cloudfront", "list-distributions")
                .iam_action("cloudfront:ListDistributions")
                .items("DistributionList.Items[]")
                .column("Id", "Id")
                .column("DomainName", "DomainName")
                .column("Status", "Status")
                .column("Enabled", "Enabled"),
            Spec::new("lambda_functions", "Lambda Functions")
                .describe("Serverless functions and their runtimes")
                .query("lambda", "list-functions")
                .iam_action("lambda:ListFunctions")
                .items("Functions[]")
                .column("Name", "FunctionName")
                .column("Runtime", "Runtime")
                .column("Handler", "Handler")
                .column("LastModified", "LastModified"),
            Spec::new("sns_topics", "SNS Topics")
                .describe("Notification topics")
                .query("sns", "list-topics")
                .iam_action("sns:ListTopics")
                .items("Topics[]")
                .column_with("Name", "TopicArn", ArnSuffix(':'))
                .column("Arn", "TopicArn"),
            Spec::new("eventbridge_rules", "EventBridge Rules")
                .describe("Event rules on the default bus")
                .query("events", "list-rules")
                .iam_action("events:ListRules")
                .items("Rules[]")
                .column("Name", "Name")
                .column("State", "State")
                .column("Schedule", "ScheduleExpression")
                .column("EventPattern", "EventPattern"),
            Spec::new("backup_plans", "Backup Plans")
                .describe("Backup plans and when they were created")
                .query("backup", "list-backup-plans")
                .iam_action("backup:ListBackupPlans")
                .items("BackupPlansList[]")
                .column("Id", "BackupPlanId")
                .column("Name", "BackupPlanName")
                .column("Created", "CreationDate"),
            Spec::new("backup_vaults", "Backup Vaults")
                .describe("Vaults holding recovery points")
                .query("backup", "list-backup-vaults")
                .iam_action("backup:ListBackupVaults")
                .items("BackupVaultList[]")
                .column("Name", "BackupVaultName")
                .column("RecoveryPoints", "NumberOfRecoveryPoints")
                .column("Created", "CreationDate"),
            Spec::new("load_balancers", "Load Balancers")
                .describe("Application and network load balancers")
                .query("elbv2", "describe-load-balancers")
                .iam_action("elasticloadbalancing:DescribeLoadBalancers")
                .items("LoadBalancers[]")
                .column("Name", "LoadBalancerName")
                .column("Type", "Type")
                .column("Scheme", "Scheme")
                .column("State", "State.Code")
                .column("DnsName", "DNSName"),
            Spec::new("ecs_clusters", "ECS Clusters")
                .describe("Container clusters")
                .query("ecs", "list-clusters")
                .iam_action("ecs:ListClusters")
                .items("clusterArns[]")
                .column_with("Name", "", ArnSuffix('/'))
                .column("Arn", ""),
            Spec::new("eks_clusters", "EKS Clusters")
                .describe("Kubernetes control planes")
                .query("eks", "list-clusters")
                .iam_action("eks:ListClusters")
                .items("clusters[]")
                .column("Name", ""),
            Spec::new("cloudwatch_alarms", "CloudWatch Alarms")
                .describe("Metric alarms and their current state")
                .query("cloudwatch", "describe-alarms")
                .iam_action("cloudwatch:DescribeAlarms")
                .items("MetricAlarms[]")
                .column("Name", "AlarmName")
                .column("Namespace", "Namespace")
                .column("Metric", "MetricName")
                .column("State", "StateValue"),
            Spec::new("log_groups", "CloudWatch Log Groups")
                .describe("Log groups and their retention")
                .query("logs", "describe-log-groups")
                .iam_action("logs:DescribeLogGroups")
                .items("logGroups[]")
                .column("Name", "logGroupName")
                .column("RetentionDays", "retentionInDays")
                .column("StoredBytes", "storedBytes"),
            Spec::new("ssm_parameters", "SSM Parameters")
                .describe("Parameter Store entries (names only, never values)")
                .query("ssm", "describe-parameters")
                .iam_action("ssm:DescribeParameters")
                .items("Parameters[]")
                .column("Name", "Name")
                .column("Type", "Type")
                .column("LastModified", "LastModifiedDate"),
            Spec::new("secrets", "Secrets Manager Secrets")
                .describe("Secrets (metadata only, never values)")
                .query("secretsmanager", "list-secrets")
                .iam_action("secretsmanager:ListSecrets")
                .items("SecretList[]")
                .column("Name", "Name")
                .column("LastChanged", "LastChangedDate")
                .column("RotationEnabled", "RotationEnabled"),
            Spec::new("cloudformation_stacks", "CloudFormation Stacks")
                .describe("Infrastructure stacks and their status")
                .query("cloudformation", "describe-stacks")
                .iam_action("cloudformation:DescribeStacks")
                .items("Stacks[]")
                .column("Name", "StackName")
                .column("Status", "StackStatus")
                .column("Created", "CreationTime"),
            Spec::new("iam_roles", "IAM Roles")
                .describe("Roles defined in the account")
                .query("iam", "list-roles")
                .iam_action("iam:ListRoles")
                .items("Roles[]")
                .column("Name", "RoleName")
                .column("Path", "Path")
                .column("Created", "CreateDate"),
            Spec::new("identity_center", "IAM Identity Center Instances")
                .describe("Single sign-on instances")
                .query("sso-admin", "list-instances")
                .iam_action("sso:ListInstances")
                .items("Instances[]")
                .column("InstanceArn", "InstanceArn")
                .column("IdentityStoreId", "IdentityStoreId"),
        ]
    }
}
