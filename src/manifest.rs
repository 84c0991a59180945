//! Platform Manifest
//!
//! This is a rust implementation of the Osiris Build Manifest Format. The
//! manifest is a TOML document describing an application and the build
//! configuration of its Android embedding: SDK levels, language levels,
//! plugins, dependencies and the signing strategy.
//!
//! Parsing happens in two steps. First, the TOML table is checked against a
//! closed schema. Every key must be known and carry a value of the expected
//! type, otherwise the offending key is reported by its dotted path (e.g.,
//! `platform.android.target-sdk`). Second, the table is converted into the
//! `Raw` types via `serde` and verified for semantic correctness.

use crate::Error;

/// Raw Manifest Application Table
///
/// Sub-type of `Raw` representing the `Application` table. This contains all
/// configuration regarding the application itself.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawApplication {
    /// Identifier of the application. Used to register and identify the
    /// application. Must not change over the life of the application. Only
    /// alphanumeric and `-`, `_` allowed. Non-ASCII allowed but might break
    /// external tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable name of the application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Path to the application root relative from the manifest. Keystore
    /// paths are relative to the application root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RawApplication {
    /// Return `application.path` or its default `.`
    pub fn path(&self) -> String {
        self.path.clone().unwrap_or_else(|| ".".to_string())
    }
}

/// Raw Language Level
///
/// Java language levels can be written as integer (`11`) or as string
/// (`"1.8"`, `"VERSION_11"`). They are parsed by the compatibility resolver.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum RawLevel {
    Number(u32),
    Text(String),
}

/// Android Compile Options
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawCompileOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_compatibility: Option<RawLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_compatibility: Option<RawLevel>,
    /// Whether the core library desugaring transformation is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_library_desugaring: Option<bool>,
}

/// Kotlin Compile Options
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawKotlinOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jvm_target: Option<RawLevel>,
}

/// Flutter Embedding Options
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawFlutter {
    /// Path to the Flutter project relative to the platform integration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Release Signing Table
///
/// Describes how release builds are signed. Debug builds are always signed
/// with the debug identity of the build tools.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawSigning {
    /// Either `debug` or `release`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Reference to the keystore used for `release` signing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystore: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_alias: Option<String>,
}

/// Dependency Declaration
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawDependency {
    /// Gradle configuration the dependency is added to. Defaults to
    /// `implementation`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    /// Coordinate of the dependency in `group:artifact` notation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Android-Platform Table
///
/// Sub-type of `RawPlatform` defining all the Android platform integration
/// options and related definitions.
///
/// The options in this table are one-to-one mappings of their equivalents
/// in the Android Application SDK.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawPlatformAndroid {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_sdk: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_sdk: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_sdk: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndk_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_dex: Option<bool>,

    /// Plugins applied to the build, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_options: Option<RawCompileOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kotlin_options: Option<RawKotlinOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flutter: Option<RawFlutter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing: Option<RawSigning>,

    /// Dependency declarations, in order. Later declarations of the same
    /// coordinate replace earlier ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency: Vec<RawDependency>,
}

/// Raw Manifest Platform Table
///
/// Sub-type of `Raw` representing the `Platform` table. This contains all
/// configuration of the platform integration modules.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawPlatform {
    /// Custom ID of the platform integration.
    pub id: String,
    /// Path to the platform integration root relative from the manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Android specific configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<RawPlatformAndroid>,
}

/// Raw Manifest Content
///
/// This type contains the raw manifest content as parsed by `toml` and
/// converted into rust types via `serde`.
///
/// Note that content of the type is only verified against the schema (known
/// keys and value types). Semantic correctness needs to be verified by the
/// caller.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Raw {
    /// Version of the manifest format. Only version `1` is currently
    /// supported.
    pub version: i64,

    /// Application table specifying properties of the application itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<RawApplication>,
    /// Platform table specifying all properties of the platform integration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platform: Vec<RawPlatform>,
}

/// Manifest Abstraction
///
/// This type represents a valid and verified manifest. The manifest content
/// can be directly accessed via the `raw` field. The data is verified for
/// semantic correctness (unlike the `Raw` type).
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    /// Raw manifest content as parsed by the TOML module.
    pub raw: Raw,
}

// Schema value kinds
#[derive(Clone, Copy)]
enum Kind {
    Boolean,
    Integer,
    Unsigned,
    String,
    Level,
    StringArray,
    Table(&'static [Field]),
    TableArray(&'static [Field]),
}

// Schema entry
//
// `path` is the dotted path of the key from the manifest root. It is used
// verbatim in diagnostics.
struct Field {
    key: &'static str,
    path: &'static str,
    kind: Kind,
    required: bool,
}

impl Kind {
    fn describe(&self) -> &'static str {
        match self {
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Unsigned => "unsigned 32-bit integer",
            Kind::String => "string",
            Kind::Level => "language level (string or integer)",
            Kind::StringArray => "array of strings",
            Kind::Table(_) => "table",
            Kind::TableArray(_) => "array of tables",
        }
    }
}

impl Field {
    const fn optional(key: &'static str, path: &'static str, kind: Kind) -> Self {
        Self { key, path, kind, required: false }
    }

    const fn required(key: &'static str, path: &'static str, kind: Kind) -> Self {
        Self { key, path, kind, required: true }
    }
}

const SCHEMA_APPLICATION: &[Field] = &[
    Field::optional("id", "application.id", Kind::String),
    Field::optional("name", "application.name", Kind::String),
    Field::optional("path", "application.path", Kind::String),
];

const SCHEMA_COMPILE_OPTIONS: &[Field] = &[
    Field::optional(
        "source-compatibility",
        "platform.android.compile-options.source-compatibility",
        Kind::Level,
    ),
    Field::optional(
        "target-compatibility",
        "platform.android.compile-options.target-compatibility",
        Kind::Level,
    ),
    Field::optional(
        "core-library-desugaring",
        "platform.android.compile-options.core-library-desugaring",
        Kind::Boolean,
    ),
];

const SCHEMA_KOTLIN_OPTIONS: &[Field] = &[
    Field::optional("jvm-target", "platform.android.kotlin-options.jvm-target", Kind::Level),
];

const SCHEMA_FLUTTER: &[Field] = &[
    Field::optional("source", "platform.android.flutter.source", Kind::String),
];

const SCHEMA_SIGNING: &[Field] = &[
    Field::optional("strategy", "platform.android.signing.strategy", Kind::String),
    Field::optional("keystore", "platform.android.signing.keystore", Kind::String),
    Field::optional("key-alias", "platform.android.signing.key-alias", Kind::String),
];

const SCHEMA_DEPENDENCY: &[Field] = &[
    Field::optional("configuration", "platform.android.dependency.configuration", Kind::String),
    Field::optional("coordinate", "platform.android.dependency.coordinate", Kind::String),
    Field::optional("version", "platform.android.dependency.version", Kind::String),
];

const SCHEMA_ANDROID: &[Field] = &[
    Field::optional("application-id", "platform.android.application-id", Kind::String),
    Field::optional("namespace", "platform.android.namespace", Kind::String),
    Field::optional("compile-sdk", "platform.android.compile-sdk", Kind::Unsigned),
    Field::optional("min-sdk", "platform.android.min-sdk", Kind::Unsigned),
    Field::optional("target-sdk", "platform.android.target-sdk", Kind::Unsigned),
    Field::optional("version-code", "platform.android.version-code", Kind::Unsigned),
    Field::optional("version-name", "platform.android.version-name", Kind::String),
    Field::optional("ndk-version", "platform.android.ndk-version", Kind::String),
    Field::optional("sdk-path", "platform.android.sdk-path", Kind::String),
    Field::optional("multi-dex", "platform.android.multi-dex", Kind::Boolean),
    Field::optional("plugins", "platform.android.plugins", Kind::StringArray),
    Field::optional(
        "compile-options",
        "platform.android.compile-options",
        Kind::Table(SCHEMA_COMPILE_OPTIONS),
    ),
    Field::optional(
        "kotlin-options",
        "platform.android.kotlin-options",
        Kind::Table(SCHEMA_KOTLIN_OPTIONS),
    ),
    Field::optional("flutter", "platform.android.flutter", Kind::Table(SCHEMA_FLUTTER)),
    Field::optional("signing", "platform.android.signing", Kind::Table(SCHEMA_SIGNING)),
    Field::optional(
        "dependency",
        "platform.android.dependency",
        Kind::TableArray(SCHEMA_DEPENDENCY),
    ),
];

const SCHEMA_PLATFORM: &[Field] = &[
    Field::required("id", "platform.id", Kind::String),
    Field::optional("path", "platform.path", Kind::String),
    Field::optional("android", "platform.android", Kind::Table(SCHEMA_ANDROID)),
];

const SCHEMA: &[Field] = &[
    Field::required("version", "version", Kind::Integer),
    Field::optional("application", "application", Kind::Table(SCHEMA_APPLICATION)),
    Field::optional("platform", "platform", Kind::TableArray(SCHEMA_PLATFORM)),
];

// Check a table against its schema
//
// Every key of the table must be listed in `fields`, and every required field
// must be present. Sub-tables are checked recursively.
fn check_table(
    table: &toml::Table,
    fields: &'static [Field],
    prefix: &str,
) -> Result<(), Error> {
    for (key, value) in table.iter() {
        let field = fields.iter().find(|v| v.key == key).ok_or_else(|| {
            if prefix.is_empty() {
                Error::UnknownKey(key.clone())
            } else {
                Error::UnknownKey(format!("{}.{}", prefix, key))
            }
        })?;

        check_value(value, field)?;
    }

    for field in fields.iter().filter(|v| v.required) {
        if !table.contains_key(field.key) {
            return Err(Error::IncompleteConfiguration(field.path));
        }
    }

    Ok(())
}

// Check a single value against its schema entry.
fn check_value(value: &toml::Value, field: &Field) -> Result<(), Error> {
    let fits_u32 = |v: &i64| u32::try_from(*v).is_ok();

    match (field.kind, value) {
        (Kind::Boolean, toml::Value::Boolean(_)) => Ok(()),
        (Kind::Integer, toml::Value::Integer(_)) => Ok(()),
        (Kind::Unsigned, toml::Value::Integer(v)) if fits_u32(v) => Ok(()),
        (Kind::String, toml::Value::String(_)) => Ok(()),
        (Kind::Level, toml::Value::String(_)) => Ok(()),
        (Kind::Level, toml::Value::Integer(v)) if fits_u32(v) => Ok(()),
        (Kind::StringArray, toml::Value::Array(v)) if v.iter().all(|v| v.is_str()) => Ok(()),
        (Kind::Table(fields), toml::Value::Table(v)) => check_table(v, fields, field.path),
        (Kind::TableArray(fields), toml::Value::Array(v)) => {
            for entry in v.iter() {
                match entry {
                    toml::Value::Table(t) => check_table(t, fields, field.path)?,
                    _ => {
                        return Err(Error::TypeMismatch {
                            key: field.path.to_string(),
                            expected: field.kind.describe(),
                        });
                    },
                }
            }
            Ok(())
        },
        _ => Err(Error::TypeMismatch {
            key: field.path.to_string(),
            expected: field.kind.describe(),
        }),
    }
}

impl Raw {
    fn parse_toml(table: toml::Table) -> Result<Self, Error> {
        check_table(&table, SCHEMA, "")?;

        toml::Value::Table(table)
            .try_into::<Self>()
            .map_err(|v| Error::Parse(v.to_string()))
    }

    fn parse_str(content: &str) -> Result<Self, Error> {
        content.parse::<toml::Table>()
            .map_err(|v| Error::Parse(v.to_string()))
            .and_then(Self::parse_toml)
    }

    /// Serialize into TOML
    ///
    /// Produce the TOML representation of the raw content. Parsing the
    /// result yields an equal `Raw` value.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string(self).map_err(|v| Error::Serialize(v.to_string()))
    }

    /// Find matching platform entry
    ///
    /// Search the platform entries for the first entry matching the specified
    /// platform ID.
    pub fn platform_by_id(&self, id: &str) -> Option<&RawPlatform> {
        self.platform.iter().find(
            |v| v.id == id
        )
    }
}

impl RawPlatform {
    /// Return `platform.path` or its default
    ///
    /// Return the configured platform path, or its default value if missing.
    /// The default is `./platform/<id>` with `platform.id` as directory name.
    pub fn path(&self) -> String {
        if let Some(path) = self.path.as_ref() {
            path.clone()
        } else {
            format!("./platform/{}", self.id)
        }
    }
}

impl Manifest {
    // Check whether a string is a valid identifier
    //
    // This verifies that the given string consists of only alphanumeric
    // characters plus `-`, `_`. Empty identifiers are rejected.
    //
    // Any unicode alpha/numeric character is allowed.
    fn is_identifier(s: &str) -> bool {
        !s.is_empty() && s.chars().all(
            |v| v.is_alphanumeric() || v == '-' || v == '_'
        )
    }

    // Check whether a string contains no quotes or escapes
    //
    // This verifies that a string does not contain quotes or backslashes, nor
    // any control characters. Strings are interpolated verbatim into Gradle
    // build scripts and command-lines.
    pub(crate) fn is_quotable(s: &str) -> bool {
        s.chars().all(
            |v| !v.is_control()
                && v != '\\'
                && v != '\''
                && v != '"'
                && v != '$'
        )
    }

    // Check whether a string is a Java package name
    //
    // Android application IDs and namespaces need at least two segments,
    // separated by dots. Each segment starts with an ASCII letter followed
    // by ASCII alphanumerics or `_`.
    fn is_package_name(s: &str) -> bool {
        let mut segments = 0;

        for segment in s.split('.') {
            let mut chars = segment.chars();
            match chars.next() {
                Some(v) if v.is_ascii_alphabetic() => {},
                _ => return false,
            }
            if !chars.all(|v| v.is_ascii_alphanumeric() || v == '_') {
                return false;
            }
            segments += 1;
        }

        segments >= 2
    }

    fn check(
        value: Option<&String>,
        key: &'static str,
        valid: fn(&str) -> bool,
        reason: &'static str,
    ) -> Result<(), Error> {
        match value {
            Some(v) if !valid(v) => Err(Error::InvalidValue {
                key: key.to_string(),
                reason: reason,
            }),
            _ => Ok(()),
        }
    }

    fn verify_android(android: &RawPlatformAndroid) -> Result<(), Error> {
        const QUOTABLE: &str = "must not contain quotes, backslashes, `$` or control characters";
        const PACKAGE: &str = "must be a dotted Java package name with at least two segments";

        Self::check(
            android.application_id.as_ref(),
            "platform.android.application-id",
            Self::is_package_name,
            PACKAGE,
        )?;
        Self::check(
            android.namespace.as_ref(),
            "platform.android.namespace",
            Self::is_package_name,
            PACKAGE,
        )?;
        Self::check(
            android.version_name.as_ref(),
            "platform.android.version-name",
            Self::is_quotable,
            QUOTABLE,
        )?;
        Self::check(
            android.ndk_version.as_ref(),
            "platform.android.ndk-version",
            Self::is_quotable,
            QUOTABLE,
        )?;

        // The SDK path ends up in the environment of the build tools, so only
        // refuse control characters (including new-lines).
        Self::check(
            android.sdk_path.as_ref(),
            "platform.android.sdk-path",
            |s| s.chars().all(|v| !v.is_control()),
            "must not contain control characters",
        )?;

        for plugin in android.plugins.iter() {
            Self::check(Some(plugin), "platform.android.plugins", Self::is_quotable, QUOTABLE)?;
        }

        if let Some(flutter) = &android.flutter {
            Self::check(
                flutter.source.as_ref(),
                "platform.android.flutter.source",
                Self::is_quotable,
                QUOTABLE,
            )?;
        }

        if let Some(signing) = &android.signing {
            Self::check(
                signing.strategy.as_ref(),
                "platform.android.signing.strategy",
                |s| s == "debug" || s == "release",
                "expected `debug` or `release`",
            )?;
            Self::check(
                signing.keystore.as_ref(),
                "platform.android.signing.keystore",
                Self::is_quotable,
                QUOTABLE,
            )?;
            Self::check(
                signing.key_alias.as_ref(),
                "platform.android.signing.key-alias",
                Self::is_quotable,
                QUOTABLE,
            )?;
        }

        for dependency in android.dependency.iter() {
            Self::check(
                dependency.configuration.as_ref(),
                "platform.android.dependency.configuration",
                Self::is_identifier,
                "must be a non-empty identifier",
            )?;
        }

        Ok(())
    }

    /// Parse manifest from raw
    ///
    /// Take a raw representation of the manifest and perform post-parsing
    /// validation, ensuring the final manifest will not contain invalid
    /// entries.
    pub fn parse_raw(raw: Raw) -> Result<Self, Error> {
        // We only support version '1'. Any other version number is explicitly
        // defined to be incompatible, so fail parsing.
        //
        // Unlike earlier drafts of the format, unknown keys are refused by the
        // schema check. New keys require a new manifest version.
        if raw.version != 1 {
            return Err(Error::ManifestVersion(raw.version));
        }

        if let Some(application) = &raw.application {
            Self::check(
                application.id.as_ref(),
                "application.id",
                Self::is_identifier,
                "must be a non-empty identifier of alphanumerics, `-` and `_`",
            )?;
            Self::check(
                application.name.as_ref(),
                "application.name",
                Self::is_quotable,
                "must not contain quotes, backslashes, `$` or control characters",
            )?;
            Self::check(
                application.path.as_ref(),
                "application.path",
                |s| !s.is_empty() && s.chars().all(|v| !v.is_control()),
                "must be a non-empty path without control characters",
            )?;
        }

        for platform in raw.platform.iter() {
            Self::check(
                Some(&platform.id),
                "platform.id",
                Self::is_identifier,
                "must be a non-empty identifier of alphanumerics, `-` and `_`",
            )?;

            if let Some(android) = &platform.android {
                Self::verify_android(android)?;
            }
        }

        Ok(
            Self {
                raw: raw,
            }
        )
    }

    /// Parse manifest from a TOML table
    ///
    /// Check the table against the manifest schema, then convert and verify
    /// its content.
    pub fn parse_table(table: toml::Table) -> Result<Self, Error> {
        Raw::parse_toml(table).and_then(Self::parse_raw)
    }

    /// Parse manifest from string
    ///
    /// Parse the given string as a literal manifest in TOML representation.
    /// Content is verified and invalid manifests are refused.
    pub fn parse_str(content: &str) -> Result<Self, Error> {
        Raw::parse_str(content).and_then(Self::parse_raw)
    }

    /// Parse manifest from file-system
    ///
    /// Open the specified file and parse it as a manifest. The content is
    /// verified and invalid manifests are refused. The file is completely
    /// parsed into memory and then closed again before the function returns.
    pub fn parse_path(path: &std::path::Path) -> Result<Self, Error> {
        std::fs::read_to_string(path)
            .map_err(|v| Error::Io(path.to_path_buf(), v))
            .and_then(|v| Self::parse_str(&v))
    }
}
