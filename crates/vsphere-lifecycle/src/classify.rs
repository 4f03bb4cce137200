//! Mapping of control-plane failures onto the error taxonomy.
//!
//! Structured information wins: the transport error class and the vCenter fault type are
//! consulted first. Only when neither identifies the failure are the message rules applied
//! to the lowercased text, in order, first match wins.

use crate::catalog;
use vsphere_core::config::{ENV_HOST, ENV_PASSWORD, ENV_USERNAME};
use vsphere_core::{Error, ErrorKind, ErrorRecord, RelatedOperation};

struct NotFoundRule {
    keyword: &'static str,
    parameter: &'static str,
    noun: &'static str,
    related: Option<fn() -> RelatedOperation>,
}

const NOT_FOUND_RULES: &[NotFoundRule] = &[
    NotFoundRule {
        keyword: "template",
        parameter: "template_name",
        noun: "template",
        related: Some(catalog::describe_templates),
    },
    NotFoundRule {
        keyword: "host",
        parameter: "host_name",
        noun: "host",
        related: Some(catalog::describe_hosts),
    },
    NotFoundRule {
        keyword: "cluster",
        parameter: "cluster_name",
        noun: "cluster",
        related: Some(catalog::describe_clusters),
    },
    NotFoundRule {
        keyword: "image",
        parameter: "image_id",
        noun: "image",
        related: None,
    },
    NotFoundRule {
        keyword: "instance type",
        parameter: "instance_type",
        noun: "instance type",
        related: None,
    },
    NotFoundRule {
        keyword: "security group",
        parameter: "security_group_id",
        noun: "security group",
        related: None,
    },
    NotFoundRule {
        keyword: "vswitch",
        parameter: "vswitch_id",
        noun: "vSwitch",
        related: Some(catalog::describe_networks),
    },
];

/// Classify a control-plane failure raised while running `operation`.
#[must_use]
pub fn classify(error: &Error, operation: &str) -> ErrorRecord {
    classify_structured(error, operation)
        .unwrap_or_else(|| classify_message(&error.to_string(), operation))
}

/// Classify a failure to open the session.
///
/// Anything that prevents reaching or logging in to the endpoint is a connection error,
/// except missing configuration and a missing transport.
#[must_use]
pub fn connection_failure(error: &Error) -> ErrorRecord {
    match error {
        Error::ConfigError(_) => missing_configuration(error),
        Error::NotConnected(reason) => ErrorRecord::new(
            ErrorKind::DependencyMissing,
            format!("No remote-access transport is available: {reason}"),
        ),
        _ => connection_error(&error.to_string()),
    }
}

/// Apply the ordered message rules.
#[must_use]
pub fn classify_message(message: &str, operation: &str) -> ErrorRecord {
    let lower = message.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|needle| lower.contains(needle));

    if mentions(&["connection", "timeout"]) {
        connection_error(message)
    } else if mentions(&["permission", "access", "unauthorized"]) {
        permission_denied(message)
    } else if mentions(&["not found", "not exist"]) {
        not_found(message, operation)
    } else if mentions(&["insufficient", "quota", "capacity"]) {
        quota_exceeded(message)
    } else if mentions(&["duplicate", "conflict", "already exists"]) {
        duplicate_name()
    } else {
        ErrorRecord::new(
            ErrorKind::ApiError,
            format!("vSphere operation failed: {message}"),
        )
    }
}

fn classify_structured(error: &Error, operation: &str) -> Option<ErrorRecord> {
    match error {
        Error::Timeout(_) | Error::ServiceUnavailable(_) | Error::NotConnected(_) => {
            Some(connection_error(&error.to_string()))
        }
        Error::NotAuthenticated(_) => Some(permission_denied(&error.to_string())),
        Error::ConfigError(_) => Some(missing_configuration(error)),
        Error::Fault { code, message } => classify_fault(code, message, operation),
        _ => None,
    }
}

fn classify_fault(code: &str, message: &str, operation: &str) -> Option<ErrorRecord> {
    match code {
        "InvalidLogin" | "NoPermission" | "NotAuthenticated" => {
            Some(permission_denied(&format!("{code}: {message}")))
        }
        "DuplicateName" => Some(duplicate_name()),
        "ManagedObjectNotFound" => Some(not_found(message, operation)),
        "InvalidPowerState" => Some(
            ErrorRecord::new(
                ErrorKind::PreconditionFailed,
                format!("The VM is not in a power state that allows this operation: {message}"),
            )
            .with_suggestion("Power off the VM first; use getVMPowerState to check its state")
            .with_related(catalog::get_vm_power_state()),
        ),
        _ if code.starts_with("Insufficient") => {
            Some(quota_exceeded(&format!("{code}: {message}")))
        }
        _ => None,
    }
}

fn connection_error(message: &str) -> ErrorRecord {
    ErrorRecord::new(
        ErrorKind::ConnectionError,
        format!("Unable to connect to vSphere: {message}"),
    )
}

fn permission_denied(message: &str) -> ErrorRecord {
    ErrorRecord::new(
        ErrorKind::PermissionDenied,
        format!("Permission denied: {message}"),
    )
}

fn quota_exceeded(message: &str) -> ErrorRecord {
    ErrorRecord::new(
        ErrorKind::QuotaExceeded,
        format!("Insufficient resources: {message}"),
    )
}

fn duplicate_name() -> ErrorRecord {
    ErrorRecord::invalid_parameter("vm_name", "A virtual machine with this name already exists")
        .with_suggestion("Use a different VM name")
}

fn missing_configuration(error: &Error) -> ErrorRecord {
    ErrorRecord::new(
        ErrorKind::MissingParameter,
        format!("vSphere connection settings are incomplete: {}", error.message()),
    )
    .with_suggestion(format!(
        "Set the environment variables {ENV_HOST}, {ENV_USERNAME}, {ENV_PASSWORD}"
    ))
}

fn not_found(message: &str, operation: &str) -> ErrorRecord {
    let context = operation.to_lowercase().replace('_', " ");
    let lower = message.to_lowercase();
    let rule = NOT_FOUND_RULES
        .iter()
        .find(|rule| context.contains(rule.keyword))
        .or_else(|| {
            NOT_FOUND_RULES
                .iter()
                .find(|rule| mentions_word(&lower, rule.keyword))
        });

    let Some(rule) = rule else {
        return ErrorRecord::new(
            ErrorKind::ResourceNotFound,
            format!("Resource not found: {message}"),
        );
    };

    let record = ErrorRecord::not_found(
        rule.parameter,
        format!("The specified {} does not exist", rule.noun),
    );
    match rule.related {
        Some(related) => {
            let operation = related();
            record
                .with_suggestion(format!("Use {} to find available names", operation.name))
                .with_related(operation)
        }
        None => record,
    }
}

/// Whether `keyword` appears in `text` as a whole word, optionally pluralized with `s`.
fn mentions_word(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let rest = &text[start + keyword.len()..];
        let rest = rest.strip_prefix('s').unwrap_or(rest);
        !before.is_some_and(char::is_alphanumeric)
            && !rest.chars().next().is_some_and(char::is_alphanumeric)
    })
}
