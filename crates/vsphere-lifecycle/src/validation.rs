//! Pre-flight request checks.
//!
//! Validators are pure functions returning the first problem they find. A
//! [`ValidationPipeline`] runs them in the order they were added and stops at the first
//! failure. Nothing here talks to vCenter.

use crate::catalog;
use crate::models::{ReconfigureSpec, TargetSpec};
use std::net::Ipv4Addr;
use vsphere_core::{ErrorKind, ErrorRecord};

/// Minimum VM name length.
pub const VM_NAME_MIN_LEN: usize = 3;
/// Maximum VM name length.
pub const VM_NAME_MAX_LEN: usize = 80;
/// vCPU range accepted when cloning.
pub const CPU_RANGE: std::ops::RangeInclusive<i32> = 1..=128;
/// Memory range in MB accepted when cloning.
pub const MEMORY_MB_RANGE: std::ops::RangeInclusive<i64> = 512..=1_048_576;
/// Largest virtual disk vSphere supports, 62 TB, in GB.
pub const MAX_DISK_SIZE_GB: i64 = 62 * 1024;

type Check<'a> = Box<dyn Fn() -> Option<ErrorRecord> + Send + Sync + 'a>;

/// Ordered, short-circuiting list of checks.
#[derive(Default)]
pub struct ValidationPipeline<'a> {
    checks: Vec<Check<'a>>,
}

impl<'a> ValidationPipeline<'a> {
    /// An empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Append a check.
    #[must_use]
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> Option<ErrorRecord> + Send + Sync + 'a,
    {
        self.checks.push(Box::new(check));
        self
    }

    /// Run the checks in order.
    ///
    /// # Errors
    ///
    /// Returns the record of the first failing check.
    pub fn run(&self) -> Result<(), ErrorRecord> {
        match self.checks.iter().find_map(|check| check()) {
            Some(record) => Err(record),
            None => Ok(()),
        }
    }

    /// Number of checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether the pipeline has no checks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Checks applied before cloning.
#[must_use]
pub fn clone_pipeline(spec: &TargetSpec) -> ValidationPipeline<'_> {
    let guest = &spec.customization;
    ValidationPipeline::new()
        .check(|| validate_vm_name(&spec.vm_name))
        .check(|| validate_template_name(&spec.template_name))
        .check(|| validate_cluster_name(&spec.cluster_name))
        .check(|| validate_cpu_memory(spec.cpu, spec.memory_mb))
        .check(|| validate_ipv4("ip_address", guest.ip_address.as_deref()))
        .check(|| validate_ipv4("subnet_mask", guest.subnet_mask.as_deref()))
        .check(|| validate_ipv4("gateway", guest.gateway.as_deref()))
        .check(|| validate_dns_servers(&guest.dns_servers))
}

/// Checks applied before reconfiguring.
#[must_use]
pub fn reconfigure_pipeline(spec: &ReconfigureSpec) -> ValidationPipeline<'_> {
    ValidationPipeline::new()
        .check(|| validate_required("vm_name", &spec.vm_name, "the VM to reconfigure"))
        .check(|| validate_positive("cpu", spec.cpu.map(i64::from), "CPU count"))
        .check(|| validate_positive("memory_mb", spec.memory_mb, "Memory size"))
        .check(|| validate_positive("disk_size_gb", spec.disk_size_gb, "Disk size"))
        .check(|| validate_disk_size(spec.disk_size_gb))
        .check(|| validate_has_changes(spec))
}

/// Name presence, length and character set.
#[must_use]
pub fn validate_vm_name(vm_name: &str) -> Option<ErrorRecord> {
    if vm_name.is_empty() {
        return Some(
            ErrorRecord::missing_parameter("vm_name", "Missing required parameter: vm_name")
                .with_suggestion("Provide a VM name such as 'web-server-01'"),
        );
    }

    let len = vm_name.chars().count();
    if !(VM_NAME_MIN_LEN..=VM_NAME_MAX_LEN).contains(&len) {
        return Some(
            ErrorRecord::invalid_parameter(
                "vm_name",
                format!(
                    "VM name must be {VM_NAME_MIN_LEN}-{VM_NAME_MAX_LEN} characters long: '{vm_name}'"
                ),
            )
            .with_suggestion("Use a name of 3 to 80 characters"),
        );
    }

    let valid = vm_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Some(
            ErrorRecord::invalid_parameter(
                "vm_name",
                format!("VM name contains invalid characters: '{vm_name}'"),
            )
            .with_suggestion("Use letters, digits, underscores and hyphens only"),
        );
    }

    None
}

/// `template_name` must be present.
#[must_use]
pub fn validate_template_name(template_name: &str) -> Option<ErrorRecord> {
    template_name.is_empty().then(|| {
        ErrorRecord::missing_parameter("template_name", "Missing required parameter: template_name")
            .with_suggestion("Use describeTemplates to find available templates")
            .with_related(catalog::describe_templates())
    })
}

/// `cluster_name` must be present.
#[must_use]
pub fn validate_cluster_name(cluster_name: &str) -> Option<ErrorRecord> {
    cluster_name.is_empty().then(|| {
        ErrorRecord::missing_parameter("cluster_name", "Missing required parameter: cluster_name")
            .with_suggestion("Use describeClusters to find available clusters")
            .with_related(catalog::describe_clusters())
    })
}

/// A generic required string parameter.
#[must_use]
pub fn validate_required(parameter: &str, value: &str, what: &str) -> Option<ErrorRecord> {
    value.is_empty().then(|| {
        ErrorRecord::missing_parameter(
            parameter,
            format!("Missing required parameter: {parameter} ({what})"),
        )
    })
}

/// vCPU and memory ranges for new VMs.
#[must_use]
pub fn validate_cpu_memory(cpu: Option<i32>, memory_mb: Option<i64>) -> Option<ErrorRecord> {
    if let Some(cpu) = cpu.filter(|cpu| !CPU_RANGE.contains(cpu)) {
        return Some(
            ErrorRecord::invalid_parameter(
                "cpu",
                format!("CPU count must be between 1 and 128: {cpu}"),
            )
            .with_suggestion("Choose a CPU count in the valid range"),
        );
    }
    if let Some(memory) = memory_mb.filter(|memory| !MEMORY_MB_RANGE.contains(memory)) {
        return Some(
            ErrorRecord::invalid_parameter(
                "memory_mb",
                format!("Memory must be between 512MB and 1TB: {memory}MB"),
            )
            .with_suggestion("Choose a memory size in the valid range"),
        );
    }
    None
}

/// An optional number must be positive when given.
#[must_use]
pub fn validate_positive(parameter: &str, value: Option<i64>, what: &str) -> Option<ErrorRecord> {
    value.filter(|value| *value <= 0).map(|value| {
        ErrorRecord::invalid_parameter(parameter, format!("{what} must be positive: {value}"))
    })
}

/// An optional disk size must fit a vSphere virtual disk.
#[must_use]
pub fn validate_disk_size(size_gb: Option<i64>) -> Option<ErrorRecord> {
    size_gb.filter(|size| *size > MAX_DISK_SIZE_GB).map(|size| {
        ErrorRecord::invalid_parameter(
            "disk_size_gb",
            format!("Disk size must be at most {MAX_DISK_SIZE_GB} GB: {size}"),
        )
        .with_suggestion("vSphere virtual disks are limited to 62 TB")
    })
}

/// A reconfiguration must change something.
#[must_use]
pub fn validate_has_changes(spec: &ReconfigureSpec) -> Option<ErrorRecord> {
    (!spec.has_changes()).then(|| {
        ErrorRecord::new(ErrorKind::MissingParameter, "No configuration changes specified")
            .with_suggestion("Provide at least one of cpu, memory_mb, disk_size_gb or network_name")
    })
}

/// An optional IPv4 dotted quad.
#[must_use]
pub fn validate_ipv4(parameter: &str, value: Option<&str>) -> Option<ErrorRecord> {
    let value = value?;
    value.parse::<Ipv4Addr>().err().map(|_| {
        ErrorRecord::invalid_parameter(parameter, format!("Not a valid IPv4 address: '{value}'"))
            .with_suggestion("Use dotted-quad notation such as 192.168.1.10")
    })
}

/// Every DNS server must be an IPv4 address.
#[must_use]
pub fn validate_dns_servers(servers: &[String]) -> Option<ErrorRecord> {
    servers
        .iter()
        .find_map(|server| validate_ipv4("dns_servers", Some(server)))
}

/// A managed object id must carry the expected prefix, for example `vm-`.
#[must_use]
pub fn validate_id_prefix(parameter: &str, value: &str, prefix: &str) -> Option<ErrorRecord> {
    if value.is_empty() {
        return Some(ErrorRecord::missing_parameter(
            parameter,
            format!("Missing required parameter: {parameter}"),
        ));
    }
    let suffix_ok = value
        .strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty());
    (!suffix_ok).then(|| {
        ErrorRecord::invalid_parameter(
            parameter,
            format!("Invalid {parameter} '{value}': expected an id starting with '{prefix}'"),
        )
        .with_suggestion(format!("Use an id such as '{prefix}1042'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_name_rules() {
        assert_eq!(
            validate_vm_name("").map(|e| e.kind()),
            Some(ErrorKind::MissingParameter)
        );
        let short = validate_vm_name("ab").unwrap();
        assert_eq!(short.kind(), ErrorKind::InvalidParameter);
        assert_eq!(short.parameter(), Some("vm_name"));
        assert!(validate_vm_name(&"a".repeat(81)).is_some());
        assert!(validate_vm_name("web 01").is_some());
        assert!(validate_vm_name("web.01").is_some());
        assert!(validate_vm_name("wéb-01").is_some());
        assert!(validate_vm_name("web_server-01").is_none());
        assert!(validate_vm_name(&"a".repeat(80)).is_none());
    }

    #[test]
    fn required_names_point_at_listings() {
        let record = validate_template_name("").unwrap();
        assert_eq!(record.kind(), ErrorKind::MissingParameter);
        assert_eq!(record.related_operations()[0].name, "describeTemplates");
        let record = validate_cluster_name("").unwrap();
        assert_eq!(record.related_operations()[0].name, "describeClusters");
        assert!(validate_cluster_name("Cluster01").is_none());
    }

    #[test]
    fn cpu_memory_bounds() {
        assert!(validate_cpu_memory(Some(1), Some(512)).is_none());
        assert!(validate_cpu_memory(Some(128), Some(1_048_576)).is_none());
        assert!(validate_cpu_memory(None, None).is_none());
        assert_eq!(
            validate_cpu_memory(Some(0), None).and_then(|e| e.parameter().map(str::to_string)),
            Some("cpu".to_string())
        );
        assert!(validate_cpu_memory(Some(129), None).is_some());
        assert_eq!(
            validate_cpu_memory(Some(4), Some(256)).and_then(|e| e.parameter().map(str::to_string)),
            Some("memory_mb".to_string())
        );
    }

    #[test]
    fn pipeline_stops_at_first_failure() {
        let spec = TargetSpec::new("ab", "", "").with_cpu(0);
        let err = clone_pipeline(&spec).run().unwrap_err();
        assert_eq!(err.parameter(), Some("vm_name"));

        let spec = TargetSpec::new("web-01", "", "");
        let err = clone_pipeline(&spec).run().unwrap_err();
        assert_eq!(err.parameter(), Some("template_name"));

        let spec = TargetSpec::new("web-01", "ubuntu-tpl", "Cluster01");
        assert!(clone_pipeline(&spec).run().is_ok());
    }

    #[test]
    fn guest_networking_fields_are_ipv4() {
        let mut spec = TargetSpec::new("web-01", "ubuntu-tpl", "Cluster01");
        spec.customization.ip_address = Some("10.0.0.300".to_string());
        let err = clone_pipeline(&spec).run().unwrap_err();
        assert_eq!(err.parameter(), Some("ip_address"));

        spec.customization.ip_address = Some("10.0.0.30".to_string());
        spec.customization.dns_servers = vec!["10.0.0.2".to_string(), "dns".to_string()];
        let err = clone_pipeline(&spec).run().unwrap_err();
        assert_eq!(err.parameter(), Some("dns_servers"));
    }

    #[test]
    fn reconfigure_checks() {
        let err = reconfigure_pipeline(&ReconfigureSpec::new("db-01"))
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParameter);
        assert_eq!(err.message(), "No configuration changes specified");

        let err = reconfigure_pipeline(&ReconfigureSpec::new("db-01").with_memory_mb(-1))
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.parameter(), Some("memory_mb"));

        assert!(reconfigure_pipeline(&ReconfigureSpec::new("db-01").with_cpu(4))
            .run()
            .is_ok());
    }

    #[test]
    fn disk_size_is_bounded() {
        let huge = (1_i64 << 44) + 40;
        let err = reconfigure_pipeline(&ReconfigureSpec::new("db-01").with_disk_size_gb(huge))
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.parameter(), Some("disk_size_gb"));

        assert!(validate_disk_size(Some(MAX_DISK_SIZE_GB)).is_none());
        assert!(validate_disk_size(Some(MAX_DISK_SIZE_GB + 1)).is_some());
        assert!(validate_disk_size(None).is_none());
    }

    #[test]
    fn id_prefixes() {
        assert!(validate_id_prefix("vm_id", "vm-42", "vm-").is_none());
        assert!(validate_id_prefix("vm_id", "vm-", "vm-").is_some());
        assert!(validate_id_prefix("task_id", "vm-42", "task-").is_some());
        assert_eq!(
            validate_id_prefix("task_id", "", "task-").map(|e| e.kind()),
            Some(ErrorKind::MissingParameter)
        );
    }

    #[test]
    fn pipeline_len() {
        let pipeline = ValidationPipeline::new().check(|| None);
        assert_eq!(pipeline.len(), 1);
        assert!(ValidationPipeline::default().is_empty());
    }
}
