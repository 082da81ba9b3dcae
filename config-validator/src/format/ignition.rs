//! Declarative (Ignition-style) config parser.
//!
//! A declarative config is a JSON object whose `ignition.version` names a
//! supported config version. Parsing reports one of:
//! - the text is not a JSON document at all,
//! - the text is JSON-shaped but syntactically broken (one positioned error),
//! - the version is missing or unknown,
//! - structural findings for a document with a known version.

use serde_json::Value;

use crate::format::json::parse_tree;
use crate::report::FindingEntry;
use crate::schema::{Field, Shape, Violation, check};
use crate::tree::{Node, Position};

/// Config versions this parser validates.
pub const SUPPORTED_VERSIONS: &[&str] = &["2.0.0", "2.1.0", "2.2.0"];

const SYSTEMD_UNIT_EXTENSIONS: &[&str] = &[
    "service",
    "socket",
    "device",
    "mount",
    "automount",
    "swap",
    "target",
    "path",
    "timer",
    "snapshot",
    "slice",
    "scope",
];

const NETWORKD_UNIT_EXTENSIONS: &[&str] = &["link", "netdev", "network"];

const FILESYSTEM_FORMATS: &[&str] = &["ext4", "btrfs", "xfs", "vfat", "swap"];

const MAX_FILE_MODE: i64 = 0o7777;

static VERIFICATION: [Field; 1] = [Field::new("hash", Shape::Text)];

static CONFIG_REFERENCE: [Field; 2] = [
    Field::new("source", Shape::Text),
    Field::new("verification", Shape::Map(&VERIFICATION)),
];

/// `user` / `group` ownership of a file, directory or link.
static NODE_OWNER: [Field; 2] = [
    Field::new("id", Shape::Integer),
    Field::new("name", Shape::Text),
];

static IGNITION: [Field; 4] = [
    Field::new("version", Shape::Text),
    Field::new(
        "config",
        Shape::Map(&[
            Field::new("append", Shape::List(&Shape::Map(&CONFIG_REFERENCE))),
            Field::new("replace", Shape::Map(&CONFIG_REFERENCE)),
        ]),
    ),
    Field::new(
        "timeouts",
        Shape::Map(&[
            Field::new("httpResponseHeaders", Shape::Integer),
            Field::new("httpTotal", Shape::Integer),
        ]),
    ),
    Field::new(
        "security",
        Shape::Map(&[Field::new(
            "tls",
            Shape::Map(&[Field::new(
                "certificateAuthorities",
                Shape::List(&Shape::Map(&CONFIG_REFERENCE)),
            )]),
        )]),
    ),
];

static DISK: [Field; 3] = [
    Field::new("device", Shape::Text),
    Field::new("wipeTable", Shape::Bool),
    Field::new(
        "partitions",
        Shape::List(&Shape::Map(&[
            Field::new("label", Shape::Text),
            Field::new("number", Shape::Integer),
            Field::new("size", Shape::Integer),
            Field::new("start", Shape::Integer),
            Field::new("typeGuid", Shape::Text),
            Field::new("guid", Shape::Text),
        ])),
    ),
];

static RAID: [Field; 5] = [
    Field::new("name", Shape::Text),
    Field::new("level", Shape::Text),
    Field::new("devices", Shape::List(&Shape::Text)),
    Field::new("spares", Shape::Integer),
    Field::new("options", Shape::List(&Shape::Text)),
];

static MOUNT: [Field; 7] = [
    Field::new("device", Shape::Text),
    Field::new("format", Shape::Text),
    Field::new("wipeFilesystem", Shape::Bool),
    Field::new("label", Shape::Text),
    Field::new("uuid", Shape::Text),
    Field::new("options", Shape::List(&Shape::Text)),
    Field::new(
        "create",
        Shape::Map(&[
            Field::new("force", Shape::Bool),
            Field::new("options", Shape::List(&Shape::Text)),
        ]),
    ),
];

static FILESYSTEM: [Field; 3] = [
    Field::new("name", Shape::Text),
    Field::new("mount", Shape::Map(&MOUNT)),
    Field::new("path", Shape::Text),
];

static FILE: [Field; 8] = [
    Field::new("filesystem", Shape::Text),
    Field::new("path", Shape::Text),
    Field::new(
        "contents",
        Shape::Map(&[
            Field::new("source", Shape::Text),
            Field::new("compression", Shape::Text),
            Field::new("verification", Shape::Map(&VERIFICATION)),
        ]),
    ),
    Field::new("mode", Shape::Integer),
    Field::new("user", Shape::Map(&NODE_OWNER)),
    Field::new("group", Shape::Map(&NODE_OWNER)),
    Field::new("append", Shape::Bool),
    Field::new("overwrite", Shape::Bool),
];

static DIRECTORY: [Field; 6] = [
    Field::new("filesystem", Shape::Text),
    Field::new("path", Shape::Text),
    Field::new("mode", Shape::Integer),
    Field::new("user", Shape::Map(&NODE_OWNER)),
    Field::new("group", Shape::Map(&NODE_OWNER)),
    Field::new("overwrite", Shape::Bool),
];

static LINK: [Field; 7] = [
    Field::new("filesystem", Shape::Text),
    Field::new("path", Shape::Text),
    Field::new("target", Shape::Text),
    Field::new("hard", Shape::Bool),
    Field::new("user", Shape::Map(&NODE_OWNER)),
    Field::new("group", Shape::Map(&NODE_OWNER)),
    Field::new("overwrite", Shape::Bool),
];

static DROPIN: [Field; 2] = [
    Field::new("name", Shape::Text),
    Field::new("contents", Shape::Text),
];

static SYSTEMD_UNIT: [Field; 6] = [
    Field::new("name", Shape::Text),
    Field::new("enable", Shape::Bool),
    Field::new("enabled", Shape::Bool),
    Field::new("mask", Shape::Bool),
    Field::new("contents", Shape::Text),
    Field::new("dropins", Shape::List(&Shape::Map(&DROPIN))),
];

static NETWORKD_UNIT: [Field; 3] = [
    Field::new("name", Shape::Text),
    Field::new("contents", Shape::Text),
    Field::new("dropins", Shape::List(&Shape::Map(&DROPIN))),
];

static USER: [Field; 13] = [
    Field::new("name", Shape::Text),
    Field::new("passwordHash", Shape::Text),
    Field::new("sshAuthorizedKeys", Shape::List(&Shape::Text)),
    Field::new("uid", Shape::Integer),
    Field::new("gecos", Shape::Text),
    Field::new("homeDir", Shape::Text),
    Field::new("noCreateHome", Shape::Bool),
    Field::new("primaryGroup", Shape::Text),
    Field::new("groups", Shape::List(&Shape::Text)),
    Field::new("noUserGroup", Shape::Bool),
    Field::new("noLogInit", Shape::Bool),
    Field::new("shell", Shape::Text),
    Field::new("system", Shape::Bool),
];

static GROUP: [Field; 4] = [
    Field::new("name", Shape::Text),
    Field::new("gid", Shape::Integer),
    Field::new("passwordHash", Shape::Text),
    Field::new("system", Shape::Bool),
];

static ROOT: Shape = Shape::Map(&[
    Field::new("ignition", Shape::Map(&IGNITION)),
    Field::new(
        "storage",
        Shape::Map(&[
            Field::new("disks", Shape::List(&Shape::Map(&DISK))),
            Field::new("raid", Shape::List(&Shape::Map(&RAID))),
            Field::new("filesystems", Shape::List(&Shape::Map(&FILESYSTEM))),
            Field::new("files", Shape::List(&Shape::Map(&FILE))),
            Field::new("directories", Shape::List(&Shape::Map(&DIRECTORY))),
            Field::new("links", Shape::List(&Shape::Map(&LINK))),
        ]),
    ),
    Field::new(
        "systemd",
        Shape::Map(&[Field::new("units", Shape::List(&Shape::Map(&SYSTEMD_UNIT)))]),
    ),
    Field::new(
        "networkd",
        Shape::Map(&[Field::new("units", Shape::List(&Shape::Map(&NETWORKD_UNIT)))]),
    ),
    Field::new(
        "passwd",
        Shape::Map(&[
            Field::new("users", Shape::List(&Shape::Map(&USER))),
            Field::new("groups", Shape::List(&Shape::Map(&GROUP))),
        ]),
    ),
]);

/// What the declarative parser made of a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    /// Not JSON-shaped; cannot be a declarative config.
    NotJson,
    /// JSON-shaped but unparseable; carries the positioned syntax error.
    Malformed(FindingEntry),
    /// Valid JSON without a supported `ignition.version`.
    UnknownVersion,
    /// A supported version; structural findings in document order.
    Checked(Vec<FindingEntry>),
}

/// Parse normalized bytes as a declarative config.
pub fn parse(content: &[u8]) -> Document {
    if content.iter().find(|b| !b.is_ascii_whitespace()) != Some(&b'{') {
        return Document::NotJson;
    }

    if let Err(err) = serde_json::from_slice::<Value>(content) {
        return Document::Malformed(
            FindingEntry::error(syntax_message(&err)).at(Some(err.line()), Some(err.column())),
        );
    }

    // serde_json accepted the bytes, so they are UTF-8 JSON; the tree reader
    // failing here means the two disagree and the document is reported as such.
    let Some(tree) = std::str::from_utf8(content)
        .ok()
        .and_then(|text| parse_tree(text).ok())
    else {
        return Document::Malformed(
            FindingEntry::error("config could not be read as JSON").at(Some(1), Some(1)),
        );
    };

    // Same first-wins lookup the schema walk uses for duplicate keys.
    let version = tree
        .get("ignition")
        .and_then(|ignition| ignition.get("version"))
        .and_then(Node::as_str);
    if !version.is_some_and(|v| SUPPORTED_VERSIONS.contains(&v)) {
        return Document::UnknownVersion;
    }

    Document::Checked(validate_tree(&tree))
}

/// `serde_json` appends " at line L column C"; the finding carries those
/// separately.
fn syntax_message(err: &serde_json::Error) -> String {
    let message = err.to_string();
    let suffix = format!(" at line {} column {}", err.line(), err.column());
    message.strip_suffix(&suffix).unwrap_or(message.as_str()).to_owned()
}

fn validate_tree(tree: &Node) -> Vec<FindingEntry> {
    let mut violations = Vec::new();
    check(tree, "", &ROOT, &mut violations);

    let mut findings: Vec<FindingEntry> = violations.iter().map(finding_for).collect();

    if let Some(storage) = tree.get("storage") {
        check_storage(storage, &mut findings);
    }
    if let Some(units) = tree.get("systemd").and_then(|s| s.get("units")) {
        check_units(units, SYSTEMD_UNIT_EXTENSIONS, "systemd", &mut findings);
    }
    if let Some(units) = tree.get("networkd").and_then(|s| s.get("units")) {
        check_units(units, NETWORKD_UNIT_EXTENSIONS, "networkd", &mut findings);
    }
    if let Some(passwd) = tree.get("passwd") {
        check_accounts(passwd.get("users"), "user", &mut findings);
        check_accounts(passwd.get("groups"), "group", &mut findings);
    }
    findings
}

fn finding_for(violation: &Violation<'_>) -> FindingEntry {
    match violation {
        Violation::UnrecognizedKey { key, position } => positioned(
            FindingEntry::warning(format!("Config has unrecognized key: {key}")),
            *position,
        ),
        Violation::DuplicateKey { key, position } => positioned(
            FindingEntry::warning(format!("Config has duplicate key: {key}")),
            *position,
        ),
        Violation::IncorrectType {
            key,
            want,
            position,
        } => positioned(
            FindingEntry::error(format!("incorrect type for \"{key}\" (want {want})")),
            *position,
        ),
    }
}

fn positioned(entry: FindingEntry, position: Position) -> FindingEntry {
    entry.at(position.line, position.column)
}

fn error_at(message: impl Into<String>, node: &Node) -> FindingEntry {
    positioned(FindingEntry::error(message), node.position)
}

fn check_storage(storage: &Node, findings: &mut Vec<FindingEntry>) {
    for section in ["files", "directories", "links"] {
        for entry in items_of(storage.get(section)) {
            match entry.get("path") {
                Some(path) => {
                    if path.as_str().is_some_and(|p| !p.starts_with('/')) {
                        findings.push(error_at("path not absolute", path));
                    }
                }
                None if entry.members().is_some() => {
                    findings.push(error_at("missing required field \"path\"", entry));
                }
                None => {}
            }
            if let Some(mode) = entry.get("mode")
                && mode.as_i64().is_some_and(|m| !(0..=MAX_FILE_MODE).contains(&m))
            {
                findings.push(error_at("illegal file mode", mode));
            }
        }
    }

    for filesystem in items_of(storage.get("filesystems")) {
        if let Some(mount) = filesystem.get("mount")
            && mount.members().is_some()
        {
            if mount.get("device").is_none() {
                findings.push(error_at("missing required field \"device\"", mount));
            }
            match mount.get("format") {
                Some(format) => {
                    if format
                        .as_str()
                        .is_some_and(|f| !FILESYSTEM_FORMATS.contains(&f))
                    {
                        findings.push(error_at("invalid filesystem format", format));
                    }
                }
                None => findings.push(error_at("missing required field \"format\"", mount)),
            }
        }
    }
}

fn check_units(
    units: &Node,
    extensions: &[&str],
    kind: &str,
    findings: &mut Vec<FindingEntry>,
) {
    for unit in items_of(Some(units)) {
        if unit.members().is_none() {
            continue;
        }
        let Some(name) = unit.get("name") else {
            findings.push(error_at("missing required field \"name\"", unit));
            continue;
        };
        if let Some(name_str) = name.as_str() {
            let valid = name_str
                .rsplit_once('.')
                .is_some_and(|(stem, ext)| !stem.is_empty() && extensions.contains(&ext));
            if !valid {
                findings.push(error_at(format!("invalid {kind} unit extension"), name));
            }
        }
        for dropin in items_of(unit.get("dropins")) {
            if let Some(dropin_name) = dropin.get("name")
                && dropin_name.as_str().is_some_and(|n| !n.ends_with(".conf"))
            {
                findings.push(error_at("invalid dropin extension", dropin_name));
            }
        }
    }
}

fn check_accounts(list: Option<&Node>, kind: &str, findings: &mut Vec<FindingEntry>) {
    for account in items_of(list) {
        if account.members().is_none() {
            continue;
        }
        match account.get("name") {
            Some(name) if name.as_str() == Some("") => {
                findings.push(error_at(format!("{kind} name must not be empty"), name));
            }
            Some(_) => {}
            None => findings.push(error_at("missing required field \"name\"", account)),
        }
    }
}

fn items_of(node: Option<&Node>) -> &[Node] {
    node.and_then(Node::items).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(content: &str) -> Vec<FindingEntry> {
        match parse(content.as_bytes()) {
            Document::Checked(findings) => findings,
            other => panic!("expected a checked document, got {other:?}"),
        }
    }

    fn messages(findings: &[FindingEntry]) -> Vec<&str> {
        findings.iter().map(|f| f.message.as_str()).collect()
    }

    #[test]
    fn test_minimal_config_is_clean() {
        let findings = checked(r#"{"ignition": {"version": "2.2.0"}}"#);
        assert!(findings.is_empty(), "unexpected findings: {findings:?}");
    }

    #[test]
    fn test_not_json_shaped() {
        assert_eq!(parse(b"hello world"), Document::NotJson);
        assert_eq!(parse(b"[1, 2]"), Document::NotJson);
        assert_eq!(parse(b"   \n"), Document::NotJson);
    }

    #[test]
    fn test_syntax_error_is_positioned() {
        let Document::Malformed(finding) = parse(b"{\n  \"ignition\": {\n    \"version\": \n}") else {
            panic!("expected a malformed document");
        };
        assert!(finding.is_error());
        assert_eq!(finding.line, Some(4));
        assert!(!finding.message.contains("at line"), "{}", finding.message);
    }

    #[test]
    fn test_unknown_and_missing_versions() {
        assert_eq!(
            parse(br#"{"ignition": {"version": "9.9.9"}}"#),
            Document::UnknownVersion
        );
        assert_eq!(parse(br#"{"ignitionVersion": 1}"#), Document::UnknownVersion);
        assert_eq!(parse(br#"{"ignition": {"version": 2}}"#), Document::UnknownVersion);
        assert_eq!(parse(b"{}"), Document::UnknownVersion);
    }

    #[test]
    fn test_duplicate_ignition_section_uses_first_version() {
        assert_eq!(
            parse(br#"{"ignition": {"version": "9.9.9"}, "ignition": {"version": "2.2.0"}}"#),
            Document::UnknownVersion
        );
        let findings =
            checked(r#"{"ignition": {"version": "2.2.0"}, "ignition": {"version": "9.9.9"}}"#);
        assert_eq!(messages(&findings), ["Config has duplicate key: ignition"]);
    }

    #[test]
    fn test_every_supported_version_parses() {
        for version in SUPPORTED_VERSIONS {
            let content = format!(r#"{{"ignition": {{"version": "{version}"}}}}"#);
            assert!(checked(&content).is_empty(), "version {version}");
        }
    }

    #[test]
    fn test_duplicate_key_is_single_warning() {
        let findings = checked(
            "{\n  \"ignition\": {\"version\": \"2.2.0\"},\n  \"passwd\": {},\n  \"passwd\": {}\n}",
        );
        assert_eq!(messages(&findings), ["Config has duplicate key: passwd"]);
        assert_eq!(findings[0].kind, crate::FindingKind::Warning);
        assert_eq!(findings[0].line, Some(4));
        assert_eq!(findings[0].column, Some(3));
    }

    #[test]
    fn test_unrecognized_keys_anywhere() {
        let findings = checked(
            r#"{"ignition": {"version": "2.2.0", "verzion": 1}, "storage": {"filez": []}}"#,
        );
        assert_eq!(
            messages(&findings),
            [
                "Config has unrecognized key: verzion",
                "Config has unrecognized key: filez"
            ]
        );
    }

    #[test]
    fn test_type_mismatch() {
        let findings = checked(
            r#"{"ignition": {"version": "2.2.0", "timeouts": {"httpTotal": "10"}}, "systemd": {"units": {}}}"#,
        );
        assert_eq!(
            messages(&findings),
            [
                "incorrect type for \"httpTotal\" (want integer)",
                "incorrect type for \"units\" (want list)"
            ]
        );
        assert!(findings.iter().all(FindingEntry::is_error));
    }

    #[test]
    fn test_storage_rules() {
        let findings = checked(
            r#"{
  "ignition": {"version": "2.1.0"},
  "storage": {
    "files": [
      {"path": "etc/hostname", "mode": 420},
      {"path": "/etc/motd", "mode": 99999},
      {"mode": 420}
    ],
    "filesystems": [
      {"name": "root", "mount": {"device": "/dev/sda9", "format": "ntfs"}}
    ]
  }
}"#,
        );
        assert_eq!(
            messages(&findings),
            [
                "path not absolute",
                "illegal file mode",
                "missing required field \"path\"",
                "invalid filesystem format"
            ]
        );
        assert_eq!(findings[0].line, Some(5));
        assert_eq!(findings[1].line, Some(6));
    }

    #[test]
    fn test_unit_rules() {
        let findings = checked(
            r#"{
  "ignition": {"version": "2.2.0"},
  "systemd": {"units": [
    {"name": "etcd.service", "enable": true},
    {"name": "broken", "dropins": [{"name": "10-override"}]},
    {"contents": "[Unit]"}
  ]},
  "networkd": {"units": [{"name": "00-eth0.network"}, {"name": "eth0.service"}]}
}"#,
        );
        assert_eq!(
            messages(&findings),
            [
                "invalid systemd unit extension",
                "invalid dropin extension",
                "missing required field \"name\"",
                "invalid networkd unit extension"
            ]
        );
    }

    #[test]
    fn test_account_rules() {
        let findings = checked(
            r#"{"ignition": {"version": "2.0.0"}, "passwd": {"users": [{"name": ""}, {"uid": 1}], "groups": [{"name": ""}]}}"#,
        );
        assert_eq!(
            messages(&findings),
            [
                "user name must not be empty",
                "missing required field \"name\"",
                "group name must not be empty"
            ]
        );
    }
}
