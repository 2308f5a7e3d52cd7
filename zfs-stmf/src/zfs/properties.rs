//! Declarative dataset property registry.
//!
//! Each native property is declared once in the `properties!` table below.
//! The declaration produces the [`PROPERTIES`] registry, which drives
//! validation of every write and untyped reads, and the typed accessors of
//! the [`Properties`] trait.
//!
//! Values are exchanged with `zfs get -Hp`, so sizes arrive as plain byte
//! counts and dates as epoch seconds.

use std::fmt::{self, Display};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use super::error::{Result, ZfsError};
use super::name::DatasetName;

/// How a property's raw text is parsed and how writes are formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Size,
    Integer,
    Float,
    Boolean,
    /// on/off plus extra literals (e.g. `compression=lz4`)
    Switch,
    Enum,
    Date,
    Pathname,
    Text,
    /// Reference to a snapshot, `-` when unset
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    ReadOnly,
    Editable,
    /// Settable only as an option to `zfs create`
    CreateOnly,
}

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropertyDef {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub access: Access,
    pub inheritable: bool,
    /// Extra admissible literals, or the whole domain for enums
    pub values: &'static [&'static str],
}

/// Parsed value of a registry property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Size(u64),
    Integer(u64),
    Float(f64),
    Boolean(bool),
    Switch(Switch),
    Enum(String),
    Date(DateTime<Utc>),
    Path(PathBuf),
    Text(String),
    Snapshot(Option<DatasetName>),
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Size(v) | PropertyValue::Integer(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Boolean(v) => f.write_str(if *v { "on" } else { "off" }),
            PropertyValue::Switch(v) => write!(f, "{}", v),
            PropertyValue::Enum(v) | PropertyValue::Text(v) => f.write_str(v),
            PropertyValue::Date(v) => f.write_str(&v.to_rfc3339()),
            PropertyValue::Path(v) => write!(f, "{}", v.display()),
            PropertyValue::Snapshot(Some(v)) => write!(f, "{}", v),
            PropertyValue::Snapshot(None) => f.write_str("-"),
        }
    }
}

/// Value of an on/off property that also takes other literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Switch {
    On,
    Off,
    Value(String),
}

impl Switch {
    pub fn is_on(&self) -> bool {
        !matches!(self, Switch::Off)
    }
}

impl Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Switch::On => f.write_str("on"),
            Switch::Off => f.write_str("off"),
            Switch::Value(v) => f.write_str(v),
        }
    }
}

impl Serialize for Switch {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Per-kind parse rules
// ============================================================================

fn parse_count(raw: &str) -> std::result::Result<u64, String> {
    let raw = raw.trim();
    if raw == "-" {
        return Ok(0);
    }
    raw.parse::<u64>()
        .map_err(|_| format!("'{}' is not an unsigned integer", raw))
}

fn parse_float(raw: &str) -> std::result::Result<f64, String> {
    let raw = raw.trim();
    raw.strip_suffix('x')
        .unwrap_or(raw)
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", raw))
}

fn parse_bool(raw: &str) -> std::result::Result<bool, String> {
    match raw.trim() {
        "on" | "yes" | "true" => Ok(true),
        "off" | "no" | "false" => Ok(false),
        other => Err(format!("'{}' is not a boolean", other)),
    }
}

fn parse_switch(raw: &str) -> Switch {
    match raw.trim() {
        "on" => Switch::On,
        "off" => Switch::Off,
        other => Switch::Value(other.to_string()),
    }
}

fn parse_date(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let secs = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("'{}' is not an epoch timestamp", raw.trim()))?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("timestamp {} out of range", secs))
}

fn parse_snapshot(raw: &str) -> std::result::Result<Option<DatasetName>, String> {
    match raw.trim() {
        "" | "-" => Ok(None),
        other => DatasetName::parse(other)
            .map(Some)
            .map_err(|e| e.to_string()),
    }
}

impl PropertyKind {
    /// Parse raw `zfs get -Hp` text according to this kind.
    pub fn parse(self, raw: &str) -> std::result::Result<PropertyValue, String> {
        Ok(match self {
            PropertyKind::Size => PropertyValue::Size(parse_count(raw)?),
            PropertyKind::Integer => PropertyValue::Integer(parse_count(raw)?),
            PropertyKind::Float => PropertyValue::Float(parse_float(raw)?),
            PropertyKind::Boolean => PropertyValue::Boolean(parse_bool(raw)?),
            PropertyKind::Switch => PropertyValue::Switch(parse_switch(raw)),
            PropertyKind::Enum => PropertyValue::Enum(raw.trim().to_string()),
            PropertyKind::Date => PropertyValue::Date(parse_date(raw)?),
            PropertyKind::Pathname => PropertyValue::Path(PathBuf::from(raw.trim())),
            PropertyKind::Text => PropertyValue::Text(raw.to_string()),
            PropertyKind::Snapshot => PropertyValue::Snapshot(parse_snapshot(raw)?),
        })
    }

    /// Normalise a value for writing, or explain why it is not admissible.
    fn format(self, def: &PropertyDef, value: &str) -> std::result::Result<String, String> {
        if value.is_empty() {
            return Err("value cannot be empty".to_string());
        }
        if value.contains('\n') {
            return Err("value must be a single line".to_string());
        }

        match self {
            PropertyKind::Size => {
                if def.admits(value) || HUMAN_SIZE.is_match(value) {
                    Ok(value.to_string())
                } else {
                    Err("expected a byte count such as 1073741824 or 10G".to_string())
                }
            }
            PropertyKind::Integer => {
                if def.admits(value) {
                    return Ok(value.to_string());
                }
                if value.parse::<u64>().is_err() {
                    return Err("expected an unsigned integer".to_string());
                }
                let numeric_domain = def.values.iter().any(|v| v.parse::<u64>().is_ok());
                if numeric_domain {
                    Err(format!("expected one of {}", def.values.join(", ")))
                } else {
                    Ok(value.to_string())
                }
            }
            PropertyKind::Boolean => parse_bool(value)
                .map(|on| if on { "on" } else { "off" }.to_string())
                .map_err(|_| "expected on or off".to_string()),
            PropertyKind::Switch => match parse_bool(value) {
                Ok(on) => Ok(if on { "on" } else { "off" }.to_string()),
                Err(_) if def.values.is_empty() || def.admits(value) => Ok(value.to_string()),
                Err(_) => Err(format!("expected on, off, or one of {}", def.values.join(", "))),
            },
            PropertyKind::Enum => {
                let normalized = value.replace('_', "-");
                def.values
                    .iter()
                    .find(|v| v.replace('_', "-") == normalized)
                    .map(|v| v.to_string())
                    .ok_or_else(|| format!("expected one of {}", def.values.join(", ")))
            }
            PropertyKind::Float | PropertyKind::Text | PropertyKind::Pathname => {
                Ok(value.to_string())
            }
            PropertyKind::Date | PropertyKind::Snapshot => {
                Err("property is computed by zfs".to_string())
            }
        }
    }
}

static HUMAN_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)[0-9]+(\.[0-9]+)?[BKMGTPEZ]?B?$").expect("valid size pattern")
});

impl PropertyDef {
    pub fn admits(&self, literal: &str) -> bool {
        self.values.contains(&literal)
    }

    pub fn parse(&self, raw: &str) -> Result<PropertyValue> {
        let value = self
            .kind
            .parse(raw)
            .map_err(|reason| ZfsError::ParseError(format!("{}: {}", self.name, reason)))?;

        if let PropertyValue::Enum(ref v) = value
            && !self.values.is_empty()
            && !self.admits(v)
        {
            return Err(ZfsError::ParseError(format!(
                "{} has value '{}', which is not one of {}",
                self.name,
                v,
                self.values.join(", ")
            )));
        }

        Ok(value)
    }

    /// Check that the property may be assigned, at creation time or later.
    pub fn check_writable(&self, creating: bool) -> Result<()> {
        match self.access {
            Access::Editable => Ok(()),
            Access::CreateOnly if creating => Ok(()),
            Access::ReadOnly | Access::CreateOnly => {
                Err(ZfsError::PropertyReadOnly(self.name.to_string()))
            }
        }
    }

    pub fn format(&self, value: &str) -> Result<String> {
        self.kind
            .format(self, value)
            .map_err(|reason| ZfsError::InvalidValue {
                property: self.name.to_string(),
                value: value.to_string(),
                reason,
            })
    }
}

/// Registry entry for a native property.
pub fn lookup(name: &str) -> Option<&'static PropertyDef> {
    PROPERTIES.iter().find(|def| def.name == name)
}

/// User properties are namespaced with a colon and carry free-form text.
pub fn is_user_property(name: &str) -> bool {
    name.contains(':')
}

/// Validate `name=value` and return the text to hand to zfs.
pub fn validate_assignment(name: &str, value: &str, creating: bool) -> Result<String> {
    if is_user_property(name) {
        if value.contains('\n') {
            return Err(ZfsError::InvalidValue {
                property: name.to_string(),
                value: value.to_string(),
                reason: "value must be a single line".to_string(),
            });
        }
        return Ok(value.to_string());
    }

    let def = lookup(name).ok_or_else(|| ZfsError::UnknownProperty(name.to_string()))?;
    def.check_writable(creating)?;
    def.format(value)
}

// ============================================================================
// Typed conversions
// ============================================================================

/// Conversion from raw property text into a Rust value.
pub trait FromProperty: Sized {
    fn from_property(raw: &str) -> std::result::Result<Self, String>;
}

/// Conversion from a Rust value into property text.
pub trait ToProperty {
    fn to_property(&self) -> String;
}

impl FromProperty for u64 {
    fn from_property(raw: &str) -> std::result::Result<Self, String> {
        parse_count(raw)
    }
}

impl ToProperty for u64 {
    fn to_property(&self) -> String {
        self.to_string()
    }
}

impl FromProperty for f64 {
    fn from_property(raw: &str) -> std::result::Result<Self, String> {
        parse_float(raw)
    }
}

impl FromProperty for bool {
    fn from_property(raw: &str) -> std::result::Result<Self, String> {
        parse_bool(raw)
    }
}

impl ToProperty for bool {
    fn to_property(&self) -> String {
        if *self { "on" } else { "off" }.to_string()
    }
}

impl FromProperty for Switch {
    fn from_property(raw: &str) -> std::result::Result<Self, String> {
        Ok(parse_switch(raw))
    }
}

impl ToProperty for Switch {
    fn to_property(&self) -> String {
        self.to_string()
    }
}

impl FromProperty for DateTime<Utc> {
    fn from_property(raw: &str) -> std::result::Result<Self, String> {
        parse_date(raw)
    }
}

impl FromProperty for PathBuf {
    fn from_property(raw: &str) -> std::result::Result<Self, String> {
        Ok(PathBuf::from(raw.trim()))
    }
}

impl ToProperty for PathBuf {
    fn to_property(&self) -> String {
        self.display().to_string()
    }
}

impl FromProperty for String {
    fn from_property(raw: &str) -> std::result::Result<Self, String> {
        Ok(raw.to_string())
    }
}

impl ToProperty for String {
    fn to_property(&self) -> String {
        self.clone()
    }
}

impl FromProperty for Option<DatasetName> {
    fn from_property(raw: &str) -> std::result::Result<Self, String> {
        parse_snapshot(raw)
    }
}

macro_rules! property_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, String> {
                let normalized = s.trim().replace('_', "-");
                match normalized.as_str() {
                    $( $text => Ok($name::$variant), )+
                    _ => Err(format!(
                        "'{}' is not one of {}",
                        s.trim(),
                        Self::VALUES.join(", ")
                    )),
                }
            }
        }

        impl FromProperty for $name {
            fn from_property(raw: &str) -> std::result::Result<Self, String> {
                raw.parse()
            }
        }

        impl ToProperty for $name {
            fn to_property(&self) -> String {
                self.as_str().to_string()
            }
        }
    };
}

property_enum!(
    /// Value of the `type` property
    DatasetType {
        Filesystem => "filesystem",
        Snapshot => "snapshot",
        Volume => "volume",
    }
);

property_enum!(AclInherit {
    Discard => "discard",
    NoAllow => "noallow",
    Restricted => "restricted",
    Passthrough => "passthrough",
    PassthroughX => "passthrough-x",
});

property_enum!(LogBias {
    Latency => "latency",
    Throughput => "throughput",
});

property_enum!(
    /// `primarycache` / `secondarycache`
    CachePolicy {
        All => "all",
        Disabled => "none",
        Metadata => "metadata",
    }
);

property_enum!(SnapDir {
    Hidden => "hidden",
    Visible => "visible",
});

property_enum!(SyncPolicy {
    Standard => "standard",
    Always => "always",
    Disabled => "disabled",
});

property_enum!(CaseSensitivity {
    Sensitive => "sensitive",
    Insensitive => "insensitive",
    Mixed => "mixed",
});

property_enum!(Normalization {
    Disabled => "none",
    FormC => "formC",
    FormD => "formD",
    FormKC => "formKC",
    FormKD => "formKD",
});

// ============================================================================
// Registry
// ============================================================================

const NONE: &[&str] = &["none"];
const MOUNTPOINTS: &[&str] = &["none", "legacy"];
const CANMOUNT: &[&str] = &["noauto"];
const CHECKSUM: &[&str] = &["fletcher2", "fletcher4", "sha256"];
const COMPRESSION: &[&str] = &[
    "lzjb", "gzip", "gzip-1", "gzip-2", "gzip-3", "gzip-4", "gzip-5", "gzip-6", "gzip-7",
    "gzip-8", "gzip-9", "zle", "lz4",
];
const DEDUP: &[&str] = &["verify", "sha256", "sha256,verify"];
const COPIES: &[&str] = &["1", "2", "3"];
const RECORD_SIZES: &[&str] = &[
    "512", "1024", "2048", "4096", "8192", "16384", "32768", "65536", "131072", "262144",
    "524288", "1048576",
];
const VOLBLOCK_SIZES: &[&str] = &[
    "512", "1024", "2048", "4096", "8192", "16384", "32768", "65536", "131072",
];
const VERSIONS: &[&str] = &["1", "2", "3", "4", "5", "current"];
const FREE_FORM: &[&str] = &[];

fn read_typed<P, T>(source: &P, key: &str) -> Result<T>
where
    P: Properties + ?Sized,
    T: FromProperty,
{
    let raw = source.get_property(key)?;
    T::from_property(&raw).map_err(|reason| ZfsError::ParseError(format!("{}: {}", key, reason)))
}

macro_rules! properties {
    (@values) => { &[] };
    (@values $values:expr) => { $values };

    (
        read_only {
            $( $(#[$ro_meta:meta])* $ro_key:literal => $ro_get:ident : $ro_ty:ty = $ro_kind:ident $({ values: $ro_values:expr })?; )*
        }
        editable {
            $( $(#[$ed_meta:meta])* $ed_key:literal => $ed_get:ident / $ed_set:ident : $ed_ty:ty = $ed_kind:ident { inherit: $ed_inherit:literal, values: $ed_values:expr }; )*
        }
        create_only {
            $( $(#[$co_meta:meta])* $co_key:literal => $co_get:ident : $co_ty:ty = $co_kind:ident { values: $co_values:expr }; )*
        }
    ) => {
        /// Every native property known to this crate.
        pub static PROPERTIES: &[PropertyDef] = &[
            $(
                PropertyDef {
                    name: $ro_key,
                    kind: PropertyKind::$ro_kind,
                    access: Access::ReadOnly,
                    inheritable: false,
                    values: properties!(@values $($ro_values)?),
                },
            )*
            $(
                PropertyDef {
                    name: $ed_key,
                    kind: PropertyKind::$ed_kind,
                    access: Access::Editable,
                    inheritable: $ed_inherit,
                    values: $ed_values,
                },
            )*
            $(
                PropertyDef {
                    name: $co_key,
                    kind: PropertyKind::$co_kind,
                    access: Access::CreateOnly,
                    inheritable: false,
                    values: $co_values,
                },
            )*
        ];

        /// Key/value access to dataset properties plus typed accessors for
        /// every registry entry.
        ///
        /// Implementors supply the raw store; getters parse with the
        /// property's kind and setters go through registry validation in
        /// [`Properties::set_property`].
        pub trait Properties {
            /// Raw value as printed by `zfs get -Hp`.
            fn get_property(&self, key: &str) -> Result<String>;

            /// Assign a raw value. Implementations must validate with
            /// [`validate_assignment`].
            fn set_property(&self, key: &str, value: &str) -> Result<()>;

            /// Typed read of any registry property.
            fn value(&self, key: &str) -> Result<PropertyValue> {
                let def = lookup(key).ok_or_else(|| ZfsError::UnknownProperty(key.to_string()))?;
                def.parse(&self.get_property(key)?)
            }

            $(
                $(#[$ro_meta])*
                fn $ro_get(&self) -> Result<$ro_ty> {
                    read_typed(self, $ro_key)
                }
            )*

            $(
                $(#[$ed_meta])*
                fn $ed_get(&self) -> Result<$ed_ty> {
                    read_typed(self, $ed_key)
                }

                fn $ed_set(&self, value: $ed_ty) -> Result<()> {
                    self.set_property($ed_key, &value.to_property())
                }
            )*

            $(
                $(#[$co_meta])*
                fn $co_get(&self) -> Result<$co_ty> {
                    read_typed(self, $co_key)
                }
            )*
        }
    };
}

properties! {
    read_only {
        "available" => available: u64 = Size;
        "compressratio" => compressratio: f64 = Float;
        "creation" => creation: DateTime<Utc> = Date;
        "defer_destroy" => defer_destroy: bool = Boolean;
        "mounted" => mounted: bool = Boolean;
        /// Snapshot this dataset was cloned from, if any
        "origin" => origin: Option<DatasetName> = Snapshot;
        "refcompressratio" => refcompressratio: f64 = Float;
        "referenced" => referenced: u64 = Size;
        "type" => dataset_type: DatasetType = Enum { values: DatasetType::VALUES };
        "used" => used: u64 = Size;
        "usedbychildren" => usedbychildren: u64 = Size;
        "usedbydataset" => usedbydataset: u64 = Size;
        "usedbyrefreservation" => usedbyrefreservation: u64 = Size;
        "usedbysnapshots" => usedbysnapshots: u64 = Size;
        "userrefs" => userrefs: u64 = Integer;
    }
    editable {
        "aclinherit" => aclinherit / set_aclinherit: AclInherit = Enum { inherit: true, values: AclInherit::VALUES };
        "atime" => atime / set_atime: bool = Boolean { inherit: true, values: FREE_FORM };
        "canmount" => canmount / set_canmount: Switch = Switch { inherit: false, values: CANMOUNT };
        "checksum" => checksum / set_checksum: Switch = Switch { inherit: true, values: CHECKSUM };
        "compression" => compression / set_compression: Switch = Switch { inherit: true, values: COMPRESSION };
        "copies" => copies / set_copies: u64 = Integer { inherit: true, values: COPIES };
        "dedup" => dedup / set_dedup: Switch = Switch { inherit: true, values: DEDUP };
        "devices" => devices / set_devices: bool = Boolean { inherit: true, values: FREE_FORM };
        "exec" => exec / set_exec: bool = Boolean { inherit: true, values: FREE_FORM };
        "logbias" => logbias / set_logbias: LogBias = Enum { inherit: true, values: LogBias::VALUES };
        "mlslabel" => mlslabel / set_mlslabel: String = Text { inherit: true, values: FREE_FORM };
        /// Also `none` or `legacy`, returned as those literal paths
        "mountpoint" => mountpoint / set_mountpoint: PathBuf = Pathname { inherit: true, values: MOUNTPOINTS };
        "nbmand" => nbmand / set_nbmand: bool = Boolean { inherit: true, values: FREE_FORM };
        "primarycache" => primarycache / set_primarycache: CachePolicy = Enum { inherit: true, values: CachePolicy::VALUES };
        /// Zero means no quota
        "quota" => quota / set_quota: u64 = Size { inherit: false, values: NONE };
        "readonly" => readonly / set_readonly: bool = Boolean { inherit: true, values: FREE_FORM };
        "recordsize" => recordsize / set_recordsize: u64 = Integer { inherit: true, values: RECORD_SIZES };
        "refquota" => refquota / set_refquota: u64 = Size { inherit: false, values: NONE };
        "refreservation" => refreservation / set_refreservation: u64 = Size { inherit: false, values: NONE };
        "reservation" => reservation / set_reservation: u64 = Size { inherit: false, values: NONE };
        "secondarycache" => secondarycache / set_secondarycache: CachePolicy = Enum { inherit: true, values: CachePolicy::VALUES };
        "setuid" => setuid / set_setuid: bool = Boolean { inherit: true, values: FREE_FORM };
        /// `on`, `off`, or share(1M) options
        "sharenfs" => sharenfs / set_sharenfs: Switch = Switch { inherit: true, values: FREE_FORM };
        /// `on`, `off`, or sharemgr(1M) options
        "sharesmb" => sharesmb / set_sharesmb: Switch = Switch { inherit: true, values: FREE_FORM };
        "snapdir" => snapdir / set_snapdir: SnapDir = Enum { inherit: true, values: SnapDir::VALUES };
        "sync" => sync / set_sync: SyncPolicy = Enum { inherit: true, values: SyncPolicy::VALUES };
        "version" => version / set_version: u64 = Integer { inherit: false, values: VERSIONS };
        "vscan" => vscan / set_vscan: bool = Boolean { inherit: true, values: FREE_FORM };
        "xattr" => xattr / set_xattr: bool = Boolean { inherit: true, values: FREE_FORM };
        "zoned" => zoned / set_zoned: bool = Boolean { inherit: true, values: FREE_FORM };
        "jailed" => jailed / set_jailed: bool = Boolean { inherit: true, values: FREE_FORM };
        "volsize" => volsize / set_volsize: u64 = Size { inherit: false, values: FREE_FORM };
    }
    create_only {
        "casesensitivity" => casesensitivity: CaseSensitivity = Enum { values: CaseSensitivity::VALUES };
        "normalization" => normalization: Normalization = Enum { values: Normalization::VALUES };
        "utf8only" => utf8only: bool = Boolean { values: FREE_FORM };
        "volblocksize" => volblocksize: u64 = Integer { values: VOLBLOCK_SIZES };
    }
}
