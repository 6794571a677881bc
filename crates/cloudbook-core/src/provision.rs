//! Policy documents for the cross-account inventory role
//!
//! The role itself is created by external infrastructure tooling. These
//! documents are what that tooling needs: who may assume the role, and the
//! read-only permissions the catalog relies on.

use std::collections::BTreeSet;

use cloudbook_inventory::ResourceQuerySpec;
use serde_json::{Value, json};

/// ARN of `role_name` in `account`
#[must_use]
pub fn role_arn(partition: &str, account: &str, role_name: &str) -> String {
    format!("arn:{partition}:iam::{account}:role/{role_name}")
}

/// Trust policy letting `trusted_principal` assume the role
#[must_use]
pub fn trust_policy(trusted_principal: &str, external_id: Option<&str>) -> Value {
    let mut statement = json!({
        "Effect": "Allow",
        "Principal": { "AWS": trusted_principal },
        "Action": "sts:AssumeRole",
    });

    if let Some(external_id) = external_id {
        statement["Condition"] = json!({
            "StringEquals": { "sts:ExternalId": external_id }
        });
    }

    json!({
        "Version": "2012-10-17",
        "Statement": [statement],
    })
}

/// Read-only permissions covering every spec
#[must_use]
pub fn inventory_policy(specs: &[ResourceQuerySpec]) -> Value {
    let actions: BTreeSet<&str> = specs
        .iter()
        .map(|s| s.iam_action.as_str())
        .filter(|a| !a.is_empty())
        .chain(["sts:GetCallerIdentity"])
        .collect();

    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "CloudbookReadOnlyInventory",
            "Effect": "Allow",
            "Action": actions,
            "Resource": "*",
        }],
    })
}
