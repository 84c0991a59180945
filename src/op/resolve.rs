//! Build Plan Resolution
//!
//! Resolve a validated manifest into a build plan. This runs the full
//! pipeline: the platform entry is selected, SDK and language levels are
//! resolved, dependencies declared, the signing strategy selected, and the
//! plan is emitted with all plugins applied. The first error halts the
//! pipeline. No partial plan is ever returned.

use crate::dependency;
use crate::manifest;
use crate::plan::{self, BuildPlan, BuildStep};
use crate::platform::android;
use crate::plugin;
use crate::signing::{self, BuildType};
use crate::toolchain::Toolchain;
use crate::version;
use crate::Error;

/// Resolution Request
#[derive(Clone, Copy, Debug)]
pub struct Request<'a> {
    /// Platform entry to resolve. Can be omitted if the manifest has exactly
    /// one platform entry.
    pub platform: Option<&'a str>,
    pub build_type: BuildType,
}

/// Resolution Warnings
///
/// Conditions that do not prevent emitting a plan, but must be shown to the
/// user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Warning {
    /// A release build is signed with the debug identity.
    InsecureSigning,
    /// Desugaring is enabled without a library to desugar against.
    DesugaringWithoutLibrary,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::InsecureSigning => {
                write!(f, "insecure signing configuration for release build")
            },
            Warning::DesugaringWithoutLibrary => {
                write!(
                    f,
                    "core library desugaring enabled without a `{}` dependency",
                    android::DESUGARING_CONFIGURATION,
                )
            },
        }
    }
}

/// Resolution Result
#[derive(Clone, Debug)]
pub struct Outcome {
    pub plan: BuildPlan,
    pub warnings: Vec<Warning>,
}

// Select the platform entry to resolve.
fn select_platform<'m>(
    manifest: &'m manifest::Manifest,
    id: Option<&str>,
) -> Result<&'m manifest::RawPlatform, Error> {
    match id {
        Some(id) => manifest.raw.platform_by_id(id).ok_or(Error::InvalidValue {
            key: "platform.id".to_string(),
            reason: "no platform entry with the requested id",
        }),
        None => match manifest.raw.platform.as_slice() {
            [v] => Ok(v),
            [] => Err(Error::IncompleteConfiguration("platform")),
            _ => Err(Error::InvalidValue {
                key: "platform.id".to_string(),
                reason: "several platform entries, one must be selected",
            }),
        },
    }
}

/// Resolve a build plan
///
/// Run the resolution pipeline for the requested platform entry and build
/// type. Plugin identifiers are looked up in `registry`. Defaults delegated
/// to the framework toolchain are taken from `toolchain`.
///
/// Warnings are logged and returned alongside the plan.
pub fn resolve(
    manifest: &manifest::Manifest,
    request: &Request<'_>,
    toolchain: &Toolchain,
    registry: &plugin::Registry,
) -> Result<Outcome, Error> {
    let mut warnings = Vec::new();

    toolchain.verify()?;

    let platform = select_platform(manifest, request.platform)?;
    let android = platform.android.as_ref()
        .ok_or(Error::IncompleteConfiguration("platform.android"))?;

    tracing::debug!(platform = %platform.id, build_type = request.build_type.as_str(), "resolving");

    let sdk = version::resolve_sdk(
        &version::DeclaredSdk {
            min: android.min_sdk,
            target: android.target_sdk,
            compile: android.compile_sdk,
        },
        toolchain,
    )?;

    let options = android.compile_options.clone().unwrap_or_default();
    let language = version::resolve_language(
        &version::DeclaredLanguage {
            source: options.source_compatibility,
            target: options.target_compatibility,
            jvm_target: android.kotlin_options.as_ref().and_then(|v| v.jvm_target.clone()),
            desugaring: options.core_library_desugaring.unwrap_or(false),
        },
        toolchain,
    )?;

    let dependencies = dependency::declare(android.dependency.iter())?;

    if language.desugaring()
        && !dependencies.iter().any(|v| v.configuration() == android::DESUGARING_CONFIGURATION)
    {
        warnings.push(Warning::DesugaringWithoutLibrary);
    }

    let (signing, insecure) = signing::select(android.signing.as_ref(), request.build_type);
    if insecure {
        warnings.push(Warning::InsecureSigning);
    }

    let steps = android.plugins.iter()
        .map(|id| registry.lookup(id).ok_or_else(|| Error::UnsupportedPlugin(id.clone())))
        .collect::<Result<Vec<&dyn BuildStep>, Error>>()?;

    tracing::debug!(min = sdk.min(), target = sdk.target(), compile = sdk.compile(), "resolved");

    let plan = plan::emit(
        plan::Resolved {
            manifest: manifest,
            platform: platform,
            android: android,
            build_type: request.build_type,
            sdk: sdk,
            language: language,
            version_code: android.version_code.unwrap_or(toolchain.version_code),
            version_name: android.version_name.clone()
                .unwrap_or_else(|| toolchain.version_name.clone()),
            ndk_version: android.ndk_version.clone()
                .or_else(|| toolchain.ndk_version.clone()),
            dependencies: dependencies,
            signing: signing,
        },
        &steps,
    )?;

    for warning in warnings.iter() {
        tracing::warn!("{}", warning);
    }

    Ok(Outcome {
        plan: plan,
        warnings: warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{KeystoreRef, SigningStrategy};
    use crate::version::LanguageLevel;

    const HEALTH: &str = "
        version = 1

        [application]
        id = \"health\"
        name = \"Health\"

        [[platform]]
        id = \"android\"

        [platform.android]
        application-id = \"com.example.health\"
        compile-sdk = 34
        target-sdk = 34
        multi-dex = true
        plugins = [\"com.android.application\", \"kotlin-android\", \"dev.flutter.flutter-gradle-plugin\"]

        [platform.android.compile-options]
        source-compatibility = \"11\"
        target-compatibility = \"11\"
        core-library-desugaring = true

        [platform.android.kotlin-options]
        jvm-target = \"11\"

        [platform.android.signing]
        strategy = \"debug\"

        [[platform.android.dependency]]
        configuration = \"coreLibraryDesugaring\"
        coordinate = \"com.android.tools:desugar_jdk_libs\"
        version = \"2.0.4\"
    ";

    fn run(content: &str, build_type: BuildType) -> Result<Outcome, Error> {
        let manifest = manifest::Manifest::parse_str(content)?;

        resolve(
            &manifest,
            &Request { platform: None, build_type },
            &Toolchain::default(),
            &plugin::Registry::default(),
        )
    }

    // Verify the full pipeline on a typical Flutter embedding.
    #[test]
    fn resolve_health() {
        let outcome = run(HEALTH, BuildType::Release).unwrap();
        let plan = &outcome.plan;

        assert_eq!(plan.application_id(), "com.example.health");
        assert_eq!(plan.application_name(), Some("Health"));
        assert_eq!(plan.namespace(), Some("com.example.health"));
        assert_eq!((plan.sdk().min(), plan.sdk().target(), plan.sdk().compile()), (21, 34, 34));
        assert_eq!(plan.language().target(), LanguageLevel::new(11));
        assert_eq!(plan.language().jvm_target(), Some(LanguageLevel::new(11)));
        assert!(plan.language().desugaring());
        assert_eq!(plan.version_code(), 1);
        assert_eq!(plan.version_name(), "1.0.0");
        assert!(plan.multi_dex());
        assert_eq!(plan.flutter_source(), Some("../.."));
        assert_eq!(plan.platform_path(), "./platform/android");
        assert_eq!(plan.dependencies().len(), 1);
        assert_eq!(plan.signing(), &SigningStrategy::Debug);

        assert_eq!(outcome.warnings, vec![Warning::InsecureSigning]);
        assert_eq!(
            outcome.warnings[0].to_string(),
            "insecure signing configuration for release build",
        );
    }

    // Verify the plan survives a round-trip through the manifest format.
    #[test]
    fn resolve_round_trip() {
        for build_type in [BuildType::Debug, BuildType::Release] {
            let first = run(HEALTH, build_type).unwrap().plan;
            let content = first.to_raw().to_toml().unwrap();
            let second = run(&content, build_type).unwrap().plan;

            assert_eq!(first, second);
        }

        let content = HEALTH.replace(
            "strategy = \"debug\"",
            "strategy = \"release\"\nkeystore = \"upload.jks\"\nkey-alias = \"upload\"",
        );
        let first = run(&content, BuildType::Release).unwrap();
        assert!(first.warnings.is_empty());
        assert_eq!(
            first.plan.signing(),
            &SigningStrategy::Release(KeystoreRef {
                path: "upload.jks".to_string(),
                key_alias: Some("upload".to_string()),
            }),
        );

        let second = run(&first.plan.to_raw().to_toml().unwrap(), BuildType::Release).unwrap();
        assert_eq!(first.plan, second.plan);
    }

    // Verify injected toolchain strings are held to the manifest rules, so
    // every resolved plan survives the round-trip.
    #[test]
    fn resolve_toolchain_strings() {
        let manifest = manifest::Manifest::parse_str(HEALTH).unwrap();
        let request = Request { platform: None, build_type: BuildType::Debug };
        let registry = plugin::Registry::default();

        let toolchain = Toolchain {
            version_name: "1.0\") ; evil(\"".to_string(),
            ..Toolchain::default()
        };
        match resolve(&manifest, &request, &toolchain, &registry) {
            Err(Error::InvalidValue { key, .. }) => assert_eq!(key, "toolchain.version-name"),
            v => panic!("unexpected result {:?}", v),
        }

        let toolchain = Toolchain {
            version_name: "2.1.0-beta".to_string(),
            ndk_version: Some("25.1.8937393".to_string()),
            ..Toolchain::default()
        };
        let first = resolve(&manifest, &request, &toolchain, &registry).unwrap().plan;
        assert_eq!(first.version_name(), "2.1.0-beta");
        assert_eq!(first.ndk_version(), Some("25.1.8937393"));

        let content = first.to_raw().to_toml().unwrap();
        let again = manifest::Manifest::parse_str(&content).unwrap();
        let second = resolve(&again, &request, &Toolchain::default(), &registry).unwrap().plan;
        assert_eq!(first, second);
    }

    // Verify the target level below the minimum halts the pipeline.
    #[test]
    fn resolve_invalid_ordering() {
        let content = HEALTH.replace("target-sdk = 34", "target-sdk = 19\nmin-sdk = 21");

        match run(&content, BuildType::Release) {
            Err(Error::InvalidVersionOrdering { key, .. }) => {
                assert_eq!(key, "platform.android.target-sdk");
            },
            v => panic!("unexpected result {:?}", v),
        }
    }

    // Verify release builds without any signing table fall back to debug
    // signing with a warning, while debug builds stay silent.
    #[test]
    fn resolve_signing_fallback() {
        let content = HEALTH.replace("[platform.android.signing]\n        strategy = \"debug\"", "");

        let outcome = run(&content, BuildType::Release).unwrap();
        assert_eq!(outcome.plan.signing(), &SigningStrategy::Debug);
        assert_eq!(outcome.warnings, vec![Warning::InsecureSigning]);

        let outcome = run(&content, BuildType::Debug).unwrap();
        assert!(outcome.warnings.is_empty());
    }

    // Verify desugaring without the library is reported.
    #[test]
    fn resolve_desugaring_without_library() {
        let content = "
            version = 1
            [[platform]]
            id = \"android\"
            [platform.android]
            application-id = \"com.example.health\"
            min-sdk = 21
            target-sdk = 34
            compile-sdk = 34
            [platform.android.compile-options]
            target-compatibility = 11
            core-library-desugaring = true
        ";

        let outcome = run(content, BuildType::Debug).unwrap();
        assert_eq!(outcome.warnings, vec![Warning::DesugaringWithoutLibrary]);
        assert_eq!(outcome.plan.namespace(), None);
        assert_eq!(outcome.plan.language().jvm_target(), None);
    }

    // Verify mandatory keys.
    #[test]
    fn resolve_incomplete() {
        let content = HEALTH.replace("application-id = \"com.example.health\"", "");
        assert!(matches!(
            run(&content, BuildType::Debug),
            Err(Error::IncompleteConfiguration("platform.android.application-id")),
        ));

        let content = HEALTH.replace("compile-sdk = 34", "").replace("target-sdk = 34", "");
        assert!(matches!(
            run(&content, BuildType::Debug),
            Err(Error::IncompleteConfiguration("platform.android.target-sdk")),
        ));

        assert!(matches!(
            run("version = 1", BuildType::Debug),
            Err(Error::IncompleteConfiguration("platform")),
        ));
    }

    // Verify unknown plugins are refused.
    #[test]
    fn resolve_unsupported_plugin() {
        let content = HEALTH.replace("\"kotlin-android\"", "\"com.google.gms.google-services\"");

        match run(&content, BuildType::Debug) {
            Err(Error::UnsupportedPlugin(v)) => assert_eq!(v, "com.google.gms.google-services"),
            v => panic!("unexpected result {:?}", v),
        }
    }

    // Verify platform selection by id.
    #[test]
    fn resolve_platform_selection() {
        let content = format!("{}\n[[platform]]\nid = \"other\"\n", HEALTH);
        let manifest = manifest::Manifest::parse_str(&content).unwrap();
        let toolchain = Toolchain::default();
        let registry = plugin::Registry::default();

        let request = Request { platform: None, build_type: BuildType::Debug };
        assert!(matches!(
            resolve(&manifest, &request, &toolchain, &registry),
            Err(Error::InvalidValue { .. }),
        ));

        let request = Request { platform: Some("android"), build_type: BuildType::Debug };
        resolve(&manifest, &request, &toolchain, &registry).unwrap();

        let request = Request { platform: Some("other"), build_type: BuildType::Debug };
        assert!(matches!(
            resolve(&manifest, &request, &toolchain, &registry),
            Err(Error::IncompleteConfiguration("platform.android")),
        ));
    }
}
