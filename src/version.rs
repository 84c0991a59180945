//! Compatibility Resolution
//!
//! Derive the effective SDK levels and language levels of a build from what
//! the manifest declares, filling gaps from the injected toolchain defaults.
//! See `platform::android` for the rules enforced here.

use crate::manifest::RawLevel;
use crate::platform::android;
use crate::toolchain::Toolchain;
use crate::Error;

const KEY_MIN_SDK: &str = "platform.android.min-sdk";
const KEY_TARGET_SDK: &str = "platform.android.target-sdk";
const KEY_COMPILE_SDK: &str = "platform.android.compile-sdk";
const KEY_SOURCE_LEVEL: &str = "platform.android.compile-options.source-compatibility";
const KEY_TARGET_LEVEL: &str = "platform.android.compile-options.target-compatibility";
const KEY_DESUGARING: &str = "platform.android.compile-options.core-library-desugaring";
const KEY_JVM_TARGET: &str = "platform.android.kotlin-options.jvm-target";

/// SDK Levels as Declared
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeclaredSdk {
    pub min: Option<u32>,
    pub target: Option<u32>,
    pub compile: Option<u32>,
}

/// Resolved SDK Levels
///
/// Guaranteed to satisfy `min <= target <= compile`, with all levels at or
/// above the platform floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct VersionConstraint {
    min: u32,
    target: u32,
    compile: u32,
}

impl VersionConstraint {
    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn compile(&self) -> u32 {
        self.compile
    }
}

/// Java Language Level
///
/// Language levels are ordinal numbers, with the legacy `1.x` notation
/// folded into `x` (i.e., `1.8` is level 8). The display form follows the
/// Gradle `JavaVersion` notation (`1.8`, `11`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LanguageLevel(u32);

impl LanguageLevel {
    pub const fn new(level: u32) -> Self {
        Self(level)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Name of the matching Gradle `JavaVersion` constant. Gradle keeps the
    /// legacy `1.x` naming up to level 10.
    pub fn gradle_constant(&self) -> String {
        if self.0 <= 10 {
            format!("VERSION_1_{}", self.0)
        } else {
            format!("VERSION_{}", self.0)
        }
    }

    /// Parse a language level
    ///
    /// Accepts `8`, `"8"`, `"1.8"`, `"VERSION_1_8"`, and the same forms for
    /// newer levels without the `1.` prefix. `key` names the manifest key for
    /// diagnostics.
    pub fn parse(raw: &RawLevel, key: &'static str) -> Result<Self, Error> {
        let text = match raw {
            RawLevel::Number(v) => return Ok(Self(*v)),
            RawLevel::Text(v) => v,
        };

        let normalized = text.trim()
            .strip_prefix("VERSION_")
            .map(|v| v.replace('_', "."))
            .unwrap_or_else(|| text.trim().to_string());
        let digits = normalized.strip_prefix("1.").unwrap_or(&normalized);

        digits.parse::<u32>()
            .map(Self)
            .map_err(|_| Error::InvalidValue {
                key: key.to_string(),
                reason: "not a Java language level",
            })
    }
}

impl std::fmt::Display for LanguageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 <= 8 {
            write!(f, "1.{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl serde::Serialize for LanguageLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Language Levels as Declared
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeclaredLanguage {
    pub source: Option<RawLevel>,
    pub target: Option<RawLevel>,
    pub jvm_target: Option<RawLevel>,
    pub desugaring: bool,
}

/// Resolved Language Levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LanguageLevels {
    source: LanguageLevel,
    target: LanguageLevel,
    jvm_target: Option<LanguageLevel>,
    desugaring: bool,
}

impl LanguageLevels {
    pub fn source(&self) -> LanguageLevel {
        self.source
    }

    pub fn target(&self) -> LanguageLevel {
        self.target
    }

    /// Kotlin JVM target, if any was declared or set by a build step.
    pub fn jvm_target(&self) -> Option<LanguageLevel> {
        self.jvm_target
    }

    pub fn desugaring(&self) -> bool {
        self.desugaring
    }

    /// Return a copy with the Kotlin JVM target set to the target level,
    /// unless one is set already.
    pub fn with_default_jvm_target(self) -> Self {
        Self {
            jvm_target: Some(self.jvm_target.unwrap_or(self.target)),
            ..self
        }
    }
}

fn check_floor(key: &'static str, value: u32, floor: u32) -> Result<(), Error> {
    if value < floor {
        Err(Error::UnsupportedVersion { key, value, floor })
    } else {
        Ok(())
    }
}

/// Resolve SDK levels
///
/// The minimum level defaults to the toolchain. At least one of the target
/// and compile level must be declared; a missing one defaults to the other.
/// Floors are checked before the ordering, in key order.
pub fn resolve_sdk(
    declared: &DeclaredSdk,
    toolchain: &Toolchain,
) -> Result<VersionConstraint, Error> {
    let (target, compile) = match (declared.target, declared.compile) {
        (Some(t), Some(c)) => (t, c),
        (Some(t), None) => (t, t),
        (None, Some(c)) => (c, c),
        (None, None) => return Err(Error::IncompleteConfiguration(KEY_TARGET_SDK)),
    };
    let min = declared.min.unwrap_or(toolchain.min_sdk);

    check_floor(KEY_MIN_SDK, min, android::MIN_SDK_FLOOR)?;
    check_floor(KEY_TARGET_SDK, target, android::MIN_SDK_FLOOR)?;
    check_floor(KEY_COMPILE_SDK, compile, android::MIN_SDK_FLOOR)?;

    if min > target {
        return Err(Error::InvalidVersionOrdering {
            key: KEY_TARGET_SDK,
            value: target,
            relation: "below",
            bound_key: KEY_MIN_SDK,
            bound: min,
        });
    }

    if target > compile {
        return Err(Error::InvalidVersionOrdering {
            key: KEY_COMPILE_SDK,
            value: compile,
            relation: "below",
            bound_key: KEY_TARGET_SDK,
            bound: target,
        });
    }

    Ok(VersionConstraint { min, target, compile })
}

/// Resolve language levels
///
/// A level declared for only one of source and target is used for both.
/// Without any declaration, the toolchain default applies. The Kotlin JVM
/// target is left unset unless declared.
pub fn resolve_language(
    declared: &DeclaredLanguage,
    toolchain: &Toolchain,
) -> Result<LanguageLevels, Error> {
    let source = declared.source.as_ref()
        .map(|v| LanguageLevel::parse(v, KEY_SOURCE_LEVEL))
        .transpose()?;
    let target = declared.target.as_ref()
        .map(|v| LanguageLevel::parse(v, KEY_TARGET_LEVEL))
        .transpose()?;
    let jvm_target = declared.jvm_target.as_ref()
        .map(|v| LanguageLevel::parse(v, KEY_JVM_TARGET))
        .transpose()?;

    let target = target.or(source).unwrap_or(toolchain.language_level);
    let source = source.unwrap_or(target);

    check_floor(KEY_SOURCE_LEVEL, source.get(), android::LANGUAGE_LEVEL_FLOOR)?;
    check_floor(KEY_TARGET_LEVEL, target.get(), android::LANGUAGE_LEVEL_FLOOR)?;
    if let Some(v) = jvm_target {
        check_floor(KEY_JVM_TARGET, v.get(), android::LANGUAGE_LEVEL_FLOOR)?;
    }

    if source > target {
        return Err(Error::IncompatibleLanguageLevel {
            key: KEY_SOURCE_LEVEL,
            reason: format!("source level {} is newer than target level {}", source, target),
        });
    }

    if let Some(v) = jvm_target {
        if v != target {
            return Err(Error::IncompatibleLanguageLevel {
                key: KEY_JVM_TARGET,
                reason: format!("JVM target {} differs from Java target level {}", v, target),
            });
        }
    }

    if declared.desugaring && target.get() < android::DESUGARING_LANGUAGE_LEVEL {
        return Err(Error::IncompatibleLanguageLevel {
            key: KEY_DESUGARING,
            reason: format!(
                "desugaring requires language level {} or newer, found {}",
                LanguageLevel::new(android::DESUGARING_LANGUAGE_LEVEL),
                target,
            ),
        });
    }

    Ok(LanguageLevels {
        source,
        target,
        jvm_target,
        desugaring: declared.desugaring,
    })
}
