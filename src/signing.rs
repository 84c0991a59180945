//! Signing Strategy
//!
//! Select the identity release artifacts are signed with. The signing itself
//! is done by the external build tools; only the keystore reference is
//! carried in the plan.

use crate::manifest::RawSigning;

/// Build Type
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildType {
    Debug,
    Release,
}

impl BuildType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "debug",
            BuildType::Release => "release",
        }
    }
}

// Parse build types case-insensitively, mirroring `as_str()`.
impl std::str::FromStr for BuildType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("debug") {
            Ok(Self::Debug)
        } else if s.eq_ignore_ascii_case("release") {
            Ok(Self::Release)
        } else {
            Err(())
        }
    }
}

/// Keystore Reference
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeystoreRef {
    pub path: String,
    pub key_alias: Option<String>,
}

/// Signing Strategy
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case", tag = "strategy")]
pub enum SigningStrategy {
    /// Sign with the debug identity of the build tools.
    Debug,
    /// Sign with the referenced keystore.
    Release(KeystoreRef),
}

/// Select signing strategy
///
/// Debug builds are always debug-signed. Release builds use the declared
/// keystore if the manifest asks for `release` signing and references one.
/// Otherwise release builds fall back to debug signing and the second
/// element of the result is `true`, asking the caller to warn about it.
pub fn select(declared: Option<&RawSigning>, build_type: BuildType) -> (SigningStrategy, bool) {
    if build_type == BuildType::Debug {
        return (SigningStrategy::Debug, false);
    }

    let keystore = declared
        .filter(|v| v.strategy.as_deref() == Some("release"))
        .and_then(|v| {
            v.keystore.as_ref()
                .filter(|path| !path.trim().is_empty())
                .map(|path| KeystoreRef {
                    path: path.clone(),
                    key_alias: v.key_alias.clone(),
                })
        });

    match keystore {
        Some(v) => (SigningStrategy::Release(v), false),
        None => (SigningStrategy::Debug, true),
    }
}
