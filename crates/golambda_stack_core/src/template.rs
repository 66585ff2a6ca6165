//! CloudFormation rendering for a single stack.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::function::FunctionDeploymentSpec;
use crate::stack::Stack;

pub const FUNCTION_RESOURCE_TYPE: &str = "AWS::Lambda::Function";
pub const ROLE_RESOURCE_TYPE: &str = "AWS::IAM::Role";
pub const ASSET_BUCKET: &str = "cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}";
pub const BASIC_EXECUTION_POLICY: &str = "service-role/AWSLambdaBasicExecutionRole";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub resources: BTreeMap<String, Value>,
}

/// Stable logical id for the construct at `path` (stack-relative).
///
/// Readable part is the path with `Resource` leaves dropped, followed by the
/// first 8 hex digits of SHA-256 over the full path.
pub fn logical_id(path: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.join("/"));
    let digest = format!("{:X}", hasher.finalize());

    let readable: String = path
        .iter()
        .filter(|component| **component != "Resource")
        .flat_map(|component| component.chars().filter(char::is_ascii_alphanumeric))
        .collect();

    format!("{readable}{}", &digest[..8])
}

pub fn function_logical_id(id: &str) -> String {
    logical_id(&[id, "Resource"])
}

pub fn role_logical_id(id: &str) -> String {
    logical_id(&[id, "ServiceRole", "Resource"])
}

/// Renders the stack. `asset_hashes` maps function ids to the fingerprint of
/// their staged code.
pub fn render_template(stack: &Stack, asset_hashes: &BTreeMap<String, String>) -> Template {
    let tags = render_tags(&stack.props().tags);
    let mut resources = BTreeMap::new();

    for (id, spec) in stack.functions() {
        let role_id = role_logical_id(id);
        let asset_hash = asset_hashes.get(id).map(String::as_str).unwrap_or_default();

        resources.insert(role_id.clone(), render_role(tags.as_ref()));
        resources.insert(
            function_logical_id(id),
            render_function(spec, &role_id, asset_hash, tags.as_ref()),
        );
    }

    Template {
        description: stack.props().description.clone(),
        resources,
    }
}

fn render_role(tags: Option<&Value>) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "AssumeRolePolicyDocument".to_string(),
        json!({
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": "lambda.amazonaws.com" }
            }],
            "Version": "2012-10-17"
        }),
    );
    properties.insert(
        "ManagedPolicyArns".to_string(),
        json!([{
            "Fn::Join": ["", ["arn:", { "Ref": "AWS::Partition" }, ":iam::aws:policy/", BASIC_EXECUTION_POLICY]]
        }]),
    );
    if let Some(tags) = tags {
        properties.insert("Tags".to_string(), tags.clone());
    }

    json!({
        "Type": ROLE_RESOURCE_TYPE,
        "Properties": properties,
    })
}

fn render_function(
    spec: &FunctionDeploymentSpec,
    role_id: &str,
    asset_hash: &str,
    tags: Option<&Value>,
) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "Code".to_string(),
        json!({
            "S3Bucket": { "Fn::Sub": ASSET_BUCKET },
            "S3Key": format!("{asset_hash}.zip"),
        }),
    );
    properties.insert("Handler".to_string(), json!(spec.entry_point));
    properties.insert("MemorySize".to_string(), json!(spec.memory_mb));
    properties.insert(
        "ReservedConcurrentExecutions".to_string(),
        json!(spec.reserved_concurrency),
    );
    properties.insert(
        "Role".to_string(),
        json!({ "Fn::GetAtt": [role_id, "Arn"] }),
    );
    properties.insert("Runtime".to_string(), json!(spec.runtime.identifier()));
    properties.insert("Timeout".to_string(), json!(spec.timeout_seconds));
    if let Some(environment) = &spec.environment {
        properties.insert(
            "Environment".to_string(),
            json!({ "Variables": environment }),
        );
    }
    if let Some(tags) = tags {
        properties.insert("Tags".to_string(), tags.clone());
    }

    json!({
        "Type": FUNCTION_RESOURCE_TYPE,
        "Properties": properties,
        "DependsOn": [role_id],
        "Metadata": {
            "aws:asset:path": format!("asset.{asset_hash}.zip"),
            "aws:asset:is-bundled": false,
            "aws:asset:property": "Code"
        }
    })
}

fn render_tags(tags: &BTreeMap<String, String>) -> Option<Value> {
    if tags.is_empty() {
        return None;
    }
    Some(Value::Array(
        tags.iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect(),
    ))
}
