//! Cloud-config (`#cloud-config` YAML) validator.
//!
//! Findings come in three layers: key spelling (`-` written for `_`),
//! structure against [`ROOT`], and value rules for the handful of fields
//! that only take a fixed set of values.

use std::sync::LazyLock;

use regex::Regex;

use crate::format::yaml::parse_document;
use crate::report::FindingEntry;
use crate::schema::{Field, Shape, Violation, check};
use crate::tree::{Node, NodeValue, Position};

const REBOOT_STRATEGIES: &[&str] = &["best-effort", "etcd-lock", "reboot", "off"];

const UNIT_COMMANDS: &[&str] = &[
    "start",
    "stop",
    "restart",
    "reload",
    "try-restart",
    "reload-or-restart",
    "reload-or-try-restart",
];

const FILE_ENCODINGS: &[&str] = &[
    "",
    "b64",
    "base64",
    "gz",
    "gzip",
    "gz+base64",
    "gzip+base64",
    "gz+b64",
    "gzip+b64",
];

const ETC_HOSTS_MODES: &[&str] = &["", "localhost"];

static DISCOVERY_URL: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"^https?://[^\s/?#]+") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid discovery URL regex: {err}"),
    }
});

static ETCD: [Field; 29] = [
    Field::new("name", Shape::Scalar),
    Field::new("addr", Shape::Scalar),
    Field::new("bind_addr", Shape::Scalar),
    Field::new("discovery", Shape::Scalar),
    Field::new("peer_addr", Shape::Scalar),
    Field::new("peer_bind_addr", Shape::Scalar),
    Field::new("peers", Shape::Scalar),
    Field::new("data_dir", Shape::Scalar),
    Field::new("ca_file", Shape::Scalar),
    Field::new("cert_file", Shape::Scalar),
    Field::new("key_file", Shape::Scalar),
    Field::new("peer_ca_file", Shape::Scalar),
    Field::new("peer_cert_file", Shape::Scalar),
    Field::new("peer_key_file", Shape::Scalar),
    Field::new("snapshot", Shape::Bool),
    Field::new("snapshot_count", Shape::Integer),
    Field::new("verbose", Shape::Bool),
    Field::new("very_verbose", Shape::Bool),
    Field::new("cluster_active_size", Shape::Integer),
    Field::new("cluster_remove_delay", Shape::Scalar),
    Field::new("cluster_sync_interval", Shape::Scalar),
    Field::new("cors", Shape::Scalar),
    Field::new("http_read_timeout", Shape::Scalar),
    Field::new("http_write_timeout", Shape::Scalar),
    Field::new("peer_heartbeat_interval", Shape::Integer),
    Field::new("peer_election_timeout", Shape::Integer),
    Field::new("max_result_buffer", Shape::Integer),
    Field::new("retry_interval", Shape::Scalar),
    Field::new("graphite_host", Shape::Scalar),
];

static ETCD2: [Field; 34] = [
    Field::new("name", Shape::Scalar),
    Field::new("data_dir", Shape::Scalar),
    Field::new("wal_dir", Shape::Scalar),
    Field::new("snapshot_count", Shape::Integer),
    Field::new("heartbeat_interval", Shape::Integer),
    Field::new("election_timeout", Shape::Integer),
    Field::new("listen_peer_urls", Shape::Scalar),
    Field::new("listen_client_urls", Shape::Scalar),
    Field::new("max_snapshots", Shape::Integer),
    Field::new("max_wals", Shape::Integer),
    Field::new("cors", Shape::Scalar),
    Field::new("initial_advertise_peer_urls", Shape::Scalar),
    Field::new("initial_cluster", Shape::Scalar),
    Field::new("initial_cluster_state", Shape::Scalar),
    Field::new("initial_cluster_token", Shape::Scalar),
    Field::new("advertise_client_urls", Shape::Scalar),
    Field::new("discovery", Shape::Scalar),
    Field::new("discovery_srv", Shape::Scalar),
    Field::new("discovery_fallback", Shape::Scalar),
    Field::new("discovery_proxy", Shape::Scalar),
    Field::new("proxy", Shape::Scalar),
    Field::new("ca_file", Shape::Scalar),
    Field::new("cert_file", Shape::Scalar),
    Field::new("key_file", Shape::Scalar),
    Field::new("client_cert_auth", Shape::Bool),
    Field::new("trusted_ca_file", Shape::Scalar),
    Field::new("peer_ca_file", Shape::Scalar),
    Field::new("peer_cert_file", Shape::Scalar),
    Field::new("peer_key_file", Shape::Scalar),
    Field::new("peer_client_cert_auth", Shape::Bool),
    Field::new("peer_trusted_ca_file", Shape::Scalar),
    Field::new("debug", Shape::Bool),
    Field::new("log_package_levels", Shape::Scalar),
    Field::new("strict_reconfig_check", Shape::Bool),
];

static FLANNEL: [Field; 9] = [
    Field::new("etcd_endpoints", Shape::Scalar),
    Field::new("etcd_cafile", Shape::Scalar),
    Field::new("etcd_certfile", Shape::Scalar),
    Field::new("etcd_keyfile", Shape::Scalar),
    Field::new("etcd_prefix", Shape::Scalar),
    Field::new("ip_masq", Shape::Scalar),
    Field::new("subnet_file", Shape::Scalar),
    Field::new("interface", Shape::Scalar),
    Field::new("public_ip", Shape::Scalar),
];

static FLEET: [Field; 11] = [
    Field::new("agent_ttl", Shape::Scalar),
    Field::new("engine_reconcile_interval", Shape::Scalar),
    Field::new("etcd_cafile", Shape::Scalar),
    Field::new("etcd_certfile", Shape::Scalar),
    Field::new("etcd_keyfile", Shape::Scalar),
    Field::new("etcd_key_prefix", Shape::Scalar),
    Field::new("etcd_request_timeout", Shape::Scalar),
    Field::new("etcd_servers", Shape::Scalar),
    Field::new("metadata", Shape::Scalar),
    Field::new("public_ip", Shape::Scalar),
    Field::new("verbosity", Shape::Integer),
];

static LOCKSMITH: [Field; 7] = [
    Field::new("endpoint", Shape::Scalar),
    Field::new("etcd_cafile", Shape::Scalar),
    Field::new("etcd_certfile", Shape::Scalar),
    Field::new("etcd_keyfile", Shape::Scalar),
    Field::new("group", Shape::Scalar),
    Field::new("window_start", Shape::Scalar),
    Field::new("window_length", Shape::Scalar),
];

static OEM: [Field; 5] = [
    Field::new("id", Shape::Scalar),
    Field::new("name", Shape::Scalar),
    Field::new("version_id", Shape::Scalar),
    Field::new("home_url", Shape::Scalar),
    Field::new("bug_report_url", Shape::Scalar),
];

static UNIT: [Field; 7] = [
    Field::new("name", Shape::Scalar),
    Field::new("mask", Shape::Bool),
    Field::new("enable", Shape::Bool),
    Field::new("runtime", Shape::Bool),
    Field::new("content", Shape::Scalar),
    Field::new("command", Shape::Scalar),
    Field::new(
        "drop_ins",
        Shape::List(&Shape::Map(&[
            Field::new("name", Shape::Scalar),
            Field::new("content", Shape::Scalar),
        ])),
    ),
];

static WRITE_FILE: [Field; 5] = [
    Field::new("encoding", Shape::Scalar),
    Field::new("content", Shape::Scalar),
    Field::new("owner", Shape::Scalar),
    Field::new("path", Shape::Scalar),
    Field::new("permissions", Shape::Scalar),
];

static USER: [Field; 16] = [
    Field::new("name", Shape::Scalar),
    Field::new("passwd", Shape::Scalar),
    Field::new("groups", Shape::List(&Shape::Scalar)),
    Field::new("homedir", Shape::Scalar),
    Field::new("no_create_home", Shape::Bool),
    Field::new("primary_group", Shape::Scalar),
    Field::new("ssh_authorized_keys", Shape::List(&Shape::Scalar)),
    Field::new("coreos_ssh_import_github", Shape::Scalar),
    Field::new("coreos_ssh_import_github_users", Shape::List(&Shape::Scalar)),
    Field::new("coreos_ssh_import_url", Shape::Scalar),
    Field::new("system", Shape::Bool),
    Field::new("no_user_group", Shape::Bool),
    Field::new("shell", Shape::Scalar),
    Field::new("gecos", Shape::Scalar),
    Field::new("no_log_init", Shape::Bool),
    Field::new("lock_passwd", Shape::Bool),
];

static ROOT: Shape = Shape::Map(&[
    Field::new("ssh_authorized_keys", Shape::List(&Shape::Scalar)),
    Field::new(
        "coreos",
        Shape::Map(&[
            Field::new("etcd", Shape::Map(&ETCD)),
            Field::new("etcd2", Shape::Map(&ETCD2)),
            Field::new("flannel", Shape::Map(&FLANNEL)),
            Field::new("fleet", Shape::Map(&FLEET)),
            Field::new("locksmith", Shape::Map(&LOCKSMITH)),
            Field::new("oem", Shape::Map(&OEM)),
            Field::new(
                "update",
                Shape::Map(&[
                    Field::new("reboot_strategy", Shape::Scalar),
                    Field::new("group", Shape::Scalar),
                    Field::new("server", Shape::Scalar),
                ]),
            ),
            Field::new("units", Shape::List(&Shape::Map(&UNIT))),
            // Accepted here so the misplacement gets its own finding.
            Field::new("write_files", Shape::Any),
        ]),
    ),
    Field::new("write_files", Shape::List(&Shape::Map(&WRITE_FILE))),
    Field::new("hostname", Shape::Scalar),
    Field::new("users", Shape::List(&Shape::Map(&USER))),
    Field::new("manage_etc_hosts", Shape::Scalar),
]);

/// Validate a cloud-config body (including its `#cloud-config` header line).
pub fn validate(content: &str) -> Vec<FindingEntry> {
    let mut root = match parse_document(content) {
        Ok(Some(root)) => root,
        Ok(None) => return Vec::new(),
        Err(finding) => return vec![finding],
    };
    if root.members().is_none() {
        return vec![FindingEntry::error("expected a mapping at the top level").at(Some(1), None)];
    }

    let mut findings = Vec::new();
    normalize_keys(&mut root, &ROOT, &mut findings);

    let mut violations = Vec::new();
    check(&root, "", &ROOT, &mut violations);
    findings.extend(violations.iter().map(finding_for));

    check_values(&root, &mut findings);
    findings
}

/// Rename `some-key` to `some_key` wherever only the underscored form is
/// known, noting each rename.
fn normalize_keys(node: &mut Node, shape: &Shape, findings: &mut Vec<FindingEntry>) {
    match (shape, &mut node.value) {
        (Shape::Map(fields), NodeValue::Object(members)) => {
            for member in members {
                if member.key.contains('-') && find_field(fields, &member.key).is_none() {
                    let underscored = member.key.replace('-', "_");
                    if find_field(fields, &underscored).is_some() {
                        findings.push(positioned(
                            FindingEntry::info(format!(
                                "\"{}\" uses '-' instead of '_'",
                                member.key
                            )),
                            member.key_position,
                        ));
                        member.key = underscored;
                    }
                }
                if let Some(field) = find_field(fields, &member.key) {
                    normalize_keys(&mut member.value, &field.shape, findings);
                }
            }
        }
        (Shape::List(item_shape), NodeValue::Array(items)) => {
            for item in items {
                normalize_keys(item, item_shape, findings);
            }
        }
        _ => {}
    }
}

fn find_field<'a>(fields: &'a [Field], name: &str) -> Option<&'a Field> {
    fields.iter().find(|f| f.name == name)
}

fn finding_for(violation: &Violation<'_>) -> FindingEntry {
    match violation {
        Violation::UnrecognizedKey { key, position } => positioned(
            FindingEntry::warning(format!("unrecognized key \"{key}\"")),
            *position,
        ),
        Violation::DuplicateKey { key, position } => positioned(
            FindingEntry::warning(format!("duplicate key \"{key}\"")),
            *position,
        ),
        Violation::IncorrectType {
            key,
            want,
            position,
        } => positioned(
            FindingEntry::warning(format!("incorrect type for \"{key}\" (want {want})")),
            *position,
        ),
    }
}

fn positioned(entry: FindingEntry, position: Position) -> FindingEntry {
    entry.at(position.line, position.column)
}

fn check_values(root: &Node, findings: &mut Vec<FindingEntry>) {
    if let Some(coreos) = root.get("coreos") {
        if let Some(strategy) = coreos.get("update").and_then(|u| u.get("reboot_strategy"))
            // YAML 1.1 readers turn a bare `off` into false.
            && !matches!(strategy.value, NodeValue::Bool(false))
        {
            check_one_of(strategy, REBOOT_STRATEGIES, findings);
        }
        for unit in items_of(coreos.get("units")) {
            if let Some(command) = unit.get("command") {
                check_one_of(command, UNIT_COMMANDS, findings);
            }
        }
        for service in ["etcd", "etcd2"] {
            if let Some(discovery) = coreos.get(service).and_then(|s| s.get("discovery"))
                && discovery
                    .scalar_text()
                    .is_some_and(|url| !DISCOVERY_URL.is_match(&url))
            {
                findings.push(positioned(
                    FindingEntry::warning("discovery URL is not valid"),
                    discovery.position,
                ));
            }
        }
        if let Some(misplaced) = coreos.get("write_files") {
            findings.push(positioned(
                FindingEntry::info("write_files doesn't belong under coreos"),
                misplaced.position,
            ));
        }
    }

    for file in items_of(root.get("write_files")) {
        if let Some(encoding) = file.get("encoding") {
            check_one_of(encoding, FILE_ENCODINGS, findings);
        }
        if let Some(path) = file.get("path")
            && path
                .as_str()
                .is_some_and(|p| p == "/usr" || p.starts_with("/usr/"))
        {
            findings.push(positioned(
                FindingEntry::error("file cannot be written to a read-only filesystem"),
                path.position,
            ));
        }
    }

    if let Some(hosts) = root.get("manage_etc_hosts") {
        check_one_of(hosts, ETC_HOSTS_MODES, findings);
    }
}

fn check_one_of(node: &Node, allowed: &[&str], findings: &mut Vec<FindingEntry>) {
    if let Some(text) = node.scalar_text()
        && !allowed.contains(&text.as_str())
    {
        findings.push(positioned(
            FindingEntry::error(format!("invalid value {text}")),
            node.position,
        ));
    }
}

fn items_of(node: Option<&Node>) -> &[Node] {
    node.and_then(Node::items).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FindingKind;

    fn summary(findings: &[FindingEntry]) -> Vec<(FindingKind, &str, Option<usize>)> {
        findings
            .iter()
            .map(|f| (f.kind, f.message.as_str(), f.line))
            .collect()
    }

    #[test]
    fn test_well_formed_config_is_clean() {
        let content = "\
#cloud-config
hostname: core-01
ssh_authorized_keys:
  - ssh-rsa AAAAB3Nza core@example
coreos:
  etcd2:
    discovery: https://discovery.etcd.io/abc123
    advertise_client_urls: http://10.0.0.1:2379
  update:
    reboot_strategy: etcd-lock
  units:
    - name: etcd2.service
      command: start
    - name: docker.socket
      mask: true
      drop_ins:
        - name: 50-limits.conf
          content: |
            [Socket]
            ListenStream=2375
write_files:
  - path: /etc/motd
    permissions: 0644
    encoding: b64
    content: SGVsbG8K
users:
  - name: ops
    groups:
      - sudo
      - docker
manage_etc_hosts: localhost
";
        let findings = validate(content);
        assert!(findings.is_empty(), "unexpected findings: {findings:?}");
    }

    #[test]
    fn test_header_only_is_clean() {
        assert!(validate("#cloud-config\n").is_empty());
        assert!(validate("#cloud-config\n# just a comment\n").is_empty());
    }

    #[test]
    fn test_yaml_syntax_error_is_single_error() {
        let findings = validate("#cloud-config\nhostname: [core\n");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].is_error());
        assert!(findings[0].line.is_some());
    }

    #[test]
    fn test_top_level_must_be_a_mapping() {
        let findings = validate("#cloud-config\n- one\n- two\n");
        assert_eq!(
            summary(&findings),
            [(FindingKind::Error, "expected a mapping at the top level", Some(1))]
        );
    }

    #[test]
    fn test_dashed_key_is_normalized() {
        let findings = validate("#cloud-config\nssh-authorized-keys:\n  - ssh-rsa AAAA\n");
        assert_eq!(
            summary(&findings),
            [(
                FindingKind::Info,
                "\"ssh-authorized-keys\" uses '-' instead of '_'",
                Some(2)
            )]
        );
    }

    #[test]
    fn test_nested_dashed_key_is_normalized() {
        let findings = validate("#cloud-config\ncoreos:\n  update:\n    reboot-strategy: reboot\n");
        assert_eq!(
            summary(&findings),
            [(
                FindingKind::Info,
                "\"reboot-strategy\" uses '-' instead of '_'",
                Some(4)
            )]
        );
    }

    #[test]
    fn test_unrecognized_key_and_wrong_type() {
        let findings = validate("#cloud-config\nhostnam: core\nhostname:\n  - a\n");
        assert_eq!(
            summary(&findings),
            [
                (FindingKind::Warning, "unrecognized key \"hostnam\"", Some(2)),
                (
                    FindingKind::Warning,
                    "incorrect type for \"hostname\" (want string)",
                    Some(3)
                ),
            ]
        );
    }

    #[test]
    fn test_invalid_values() {
        let content = "\
#cloud-config
coreos:
  update:
    reboot_strategy: sometimes
  units:
    - name: a.service
      command: begin
write_files:
  - path: /etc/x
    encoding: rot13
manage_etc_hosts: remote
";
        let findings = validate(content);
        assert_eq!(
            summary(&findings),
            [
                (FindingKind::Error, "invalid value sometimes", Some(4)),
                (FindingKind::Error, "invalid value begin", Some(7)),
                (FindingKind::Error, "invalid value rot13", Some(10)),
                (FindingKind::Error, "invalid value remote", Some(11)),
            ]
        );
    }

    #[test]
    fn test_reboot_strategy_off_is_accepted() {
        let findings = validate("#cloud-config\ncoreos:\n  update:\n    reboot_strategy: off\n");
        assert!(findings.is_empty(), "unexpected findings: {findings:?}");
    }

    #[test]
    fn test_discovery_url_must_be_http() {
        let findings = validate("#cloud-config\ncoreos:\n  etcd:\n    discovery: etcd.io/abc\n");
        assert_eq!(
            summary(&findings),
            [(FindingKind::Warning, "discovery URL is not valid", Some(4))]
        );
    }

    #[test]
    fn test_write_files_rules() {
        let content = "\
#cloud-config
write_files:
  - path: /usr/bin/tool
    content: x
coreos:
  write_files:
    - path: /etc/y
";
        let findings = validate(content);
        assert_eq!(
            summary(&findings),
            [
                (
                    FindingKind::Info,
                    "write_files doesn't belong under coreos",
                    Some(6)
                ),
                (
                    FindingKind::Error,
                    "file cannot be written to a read-only filesystem",
                    Some(3)
                ),
            ]
        );
    }
}
