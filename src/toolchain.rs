//! Toolchain Defaults
//!
//! Cross-platform frameworks delegate some build settings to their own
//! toolchain (e.g., the minimum SDK level or the version of the application
//! taken from the framework project). These defaults are injected into the
//! resolution by the caller, rather than read from any global state.

use crate::manifest::Manifest;
use crate::version::LanguageLevel;
use crate::Error;

/// Injected Toolchain Defaults
///
/// Values used whenever the manifest does not declare the respective key.
#[derive(Clone, Debug, PartialEq)]
pub struct Toolchain {
    pub min_sdk: u32,
    pub version_code: u32,
    pub version_name: String,
    pub ndk_version: Option<String>,
    /// Used for both the source and target compatibility level.
    pub language_level: LanguageLevel,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            min_sdk: 21,
            version_code: 1,
            version_name: "1.0.0".to_string(),
            ndk_version: None,
            language_level: LanguageLevel::new(8),
        }
    }
}

impl Toolchain {
    /// Verify injected defaults
    ///
    /// Injected strings end up in the plan just like their manifest
    /// counterparts, and are thus held to the same rules. Errors name the
    /// default as `toolchain.<key>`.
    pub fn verify(&self) -> Result<(), Error> {
        let quotable = [
            ("toolchain.version-name", Some(&self.version_name)),
            ("toolchain.ndk-version", self.ndk_version.as_ref()),
        ];

        for (key, value) in quotable {
            if let Some(v) = value {
                if !Manifest::is_quotable(v) {
                    return Err(Error::InvalidValue {
                        key: key.to_string(),
                        reason: "must not contain quotes, backslashes, `$` or control characters",
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the built-in defaults pass verification.
    #[test]
    fn verify_default() {
        assert!(Toolchain::default().verify().is_ok());
    }

    // Verify injected strings that cannot be quoted are refused with the
    // default named.
    #[test]
    fn verify_unquotable() {
        let toolchain = Toolchain {
            version_name: "1.0\") ; evil(\"".to_string(),
            ..Toolchain::default()
        };
        match toolchain.verify() {
            Err(Error::InvalidValue { key, .. }) => assert_eq!(key, "toolchain.version-name"),
            v => panic!("unexpected result: {:?}", v),
        }

        let toolchain = Toolchain {
            ndk_version: Some("25.1\n".to_string()),
            ..Toolchain::default()
        };
        match toolchain.verify() {
            Err(Error::InvalidValue { key, .. }) => assert_eq!(key, "toolchain.ndk-version"),
            v => panic!("unexpected result: {:?}", v),
        }
    }
}
