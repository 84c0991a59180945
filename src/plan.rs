//! Build Plan
//!
//! The build plan is the fully resolved, immutable description of what to
//! build and how. It is emitted once per invocation from the resolved
//! configuration, handed to the external build executor, and discarded.
//!
//! Plugins of the build take part via the `BuildStep` trait. Each step maps
//! a plan to a new plan before emission completes. Steps never see a
//! partially resolved configuration.

use crate::dependency::DependencyReference;
use crate::manifest;
use crate::signing::{BuildType, SigningStrategy};
use crate::version::{LanguageLevels, VersionConstraint};
use crate::Error;

/// Build Step
///
/// A capability applied to the plan during emission, usually contributed by
/// a plugin listed in the manifest.
pub trait BuildStep {
    /// Plugin identifier the step is registered under.
    fn id(&self) -> &str;

    /// Whether the step handles the given plugin identifier. Defaults to
    /// comparing against `id()`.
    fn accepts(&self, id: &str) -> bool {
        self.id() == id
    }

    /// Derive the new plan from the given one.
    fn apply(&self, plan: BuildPlan) -> BuildPlan;
}

/// Resolved Configuration
///
/// All parts of the configuration after validation and resolution, ready
/// to be composed into a plan.
pub struct Resolved<'a> {
    pub manifest: &'a manifest::Manifest,
    pub platform: &'a manifest::RawPlatform,
    pub android: &'a manifest::RawPlatformAndroid,
    pub build_type: BuildType,
    pub sdk: VersionConstraint,
    pub language: LanguageLevels,
    pub version_code: u32,
    pub version_name: String,
    pub ndk_version: Option<String>,
    pub dependencies: Vec<DependencyReference>,
    pub signing: SigningStrategy,
}

/// Build Plan
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildPlan {
    build_type: BuildType,
    platform_id: String,
    platform_path: String,
    application_key: Option<String>,
    application_name: Option<String>,
    application_path: String,
    application_id: String,
    namespace: Option<String>,
    sdk: VersionConstraint,
    language: LanguageLevels,
    version_code: u32,
    version_name: String,
    ndk_version: Option<String>,
    sdk_path: Option<String>,
    multi_dex: bool,
    plugins: Vec<String>,
    flutter_source: Option<String>,
    dependencies: Vec<DependencyReference>,
    signing: SigningStrategy,
}

/// Emit the build plan
///
/// Compose the resolved configuration into a plan and apply the build steps
/// in order. Fails if the application identity is missing.
pub fn emit(resolved: Resolved<'_>, steps: &[&dyn BuildStep]) -> Result<BuildPlan, Error> {
    let application_id = resolved.android.application_id.clone()
        .ok_or(Error::IncompleteConfiguration("platform.android.application-id"))?;

    let application = resolved.manifest.raw.application.clone().unwrap_or_default();

    let plan = BuildPlan {
        build_type: resolved.build_type,
        platform_id: resolved.platform.id.clone(),
        platform_path: resolved.platform.path(),
        application_key: application.id.clone(),
        application_name: application.name.clone(),
        application_path: application.path(),
        application_id: application_id,
        namespace: resolved.android.namespace.clone(),
        sdk: resolved.sdk,
        language: resolved.language,
        version_code: resolved.version_code,
        version_name: resolved.version_name,
        ndk_version: resolved.ndk_version,
        sdk_path: resolved.android.sdk_path.clone(),
        multi_dex: resolved.android.multi_dex.unwrap_or(false),
        plugins: resolved.android.plugins.clone(),
        flutter_source: resolved.android.flutter.as_ref()
            .and_then(|v| v.source.clone()),
        dependencies: resolved.dependencies,
        signing: resolved.signing,
    };

    Ok(steps.iter().fold(plan, |plan, step| {
        tracing::debug!(step = step.id(), "applying build step");
        step.apply(plan)
    }))
}

impl BuildPlan {
    pub fn build_type(&self) -> BuildType {
        self.build_type
    }

    pub fn platform_id(&self) -> &str {
        &self.platform_id
    }

    /// Path of the platform integration relative to the manifest.
    pub fn platform_path(&self) -> &str {
        &self.platform_path
    }

    /// Identifier of the application, as in `application.id`.
    pub fn application_key(&self) -> Option<&str> {
        self.application_key.as_deref()
    }

    pub fn application_name(&self) -> Option<&str> {
        self.application_name.as_deref()
    }

    /// Path of the application root relative to the manifest.
    pub fn application_path(&self) -> &str {
        &self.application_path
    }

    /// Name of the Gradle root project
    ///
    /// This is the application name, falling back to the application
    /// identifier and then the Android application ID.
    pub fn project_name(&self) -> &str {
        self.application_name.as_deref()
            .or(self.application_key.as_deref())
            .unwrap_or(&self.application_id)
    }

    /// Locate the release keystore
    ///
    /// Keystore paths are relative to the application root, which in turn
    /// is relative to the manifest directory `path_root`. Yields `None`
    /// unless the plan is release-signed.
    pub fn keystore_file(&self, path_root: &std::path::Path) -> Option<std::path::PathBuf> {
        match &self.signing {
            SigningStrategy::Debug => None,
            SigningStrategy::Release(v) => Some(
                path_root.join(&self.application_path).join(&v.path),
            ),
        }
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn sdk(&self) -> &VersionConstraint {
        &self.sdk
    }

    pub fn language(&self) -> &LanguageLevels {
        &self.language
    }

    pub fn version_code(&self) -> u32 {
        self.version_code
    }

    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    pub fn ndk_version(&self) -> Option<&str> {
        self.ndk_version.as_deref()
    }

    pub fn sdk_path(&self) -> Option<&str> {
        self.sdk_path.as_deref()
    }

    pub fn multi_dex(&self) -> bool {
        self.multi_dex
    }

    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    pub fn flutter_source(&self) -> Option<&str> {
        self.flutter_source.as_deref()
    }

    pub fn dependencies(&self) -> &[DependencyReference] {
        &self.dependencies
    }

    pub fn signing(&self) -> &SigningStrategy {
        &self.signing
    }

    pub fn with_namespace(self, namespace: String) -> Self {
        Self { namespace: Some(namespace), ..self }
    }

    pub fn with_language(self, language: LanguageLevels) -> Self {
        Self { language, ..self }
    }

    pub fn with_flutter_source(self, source: String) -> Self {
        Self { flutter_source: Some(source), ..self }
    }

    /// Serialize for the build executor
    ///
    /// Return the plan as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Convert back into a manifest
    ///
    /// Produce the raw manifest that declares every resolved value of this
    /// plan explicitly. Resolving it again for the same build type yields an
    /// equal plan.
    pub fn to_raw(&self) -> manifest::Raw {
        let signing = match &self.signing {
            SigningStrategy::Debug => manifest::RawSigning {
                strategy: Some("debug".to_string()),
                ..manifest::RawSigning::default()
            },
            SigningStrategy::Release(v) => manifest::RawSigning {
                strategy: Some("release".to_string()),
                keystore: Some(v.path.clone()),
                key_alias: v.key_alias.clone(),
            },
        };

        let android = manifest::RawPlatformAndroid {
            application_id: Some(self.application_id.clone()),
            namespace: self.namespace.clone(),
            compile_sdk: Some(self.sdk.compile()),
            min_sdk: Some(self.sdk.min()),
            target_sdk: Some(self.sdk.target()),
            version_code: Some(self.version_code),
            version_name: Some(self.version_name.clone()),
            ndk_version: self.ndk_version.clone(),
            sdk_path: self.sdk_path.clone(),
            multi_dex: Some(self.multi_dex),
            plugins: self.plugins.clone(),
            compile_options: Some(manifest::RawCompileOptions {
                source_compatibility: Some(manifest::RawLevel::Text(self.language.source().to_string())),
                target_compatibility: Some(manifest::RawLevel::Text(self.language.target().to_string())),
                core_library_desugaring: Some(self.language.desugaring()),
            }),
            kotlin_options: self.language.jvm_target().map(|v| manifest::RawKotlinOptions {
                jvm_target: Some(manifest::RawLevel::Text(v.to_string())),
            }),
            flutter: self.flutter_source.as_ref().map(|v| manifest::RawFlutter {
                source: Some(v.clone()),
            }),
            signing: Some(signing),
            dependency: self.dependencies.iter().map(|v| manifest::RawDependency {
                configuration: Some(v.configuration().to_string()),
                coordinate: Some(v.coordinate().to_string()),
                version: Some(v.version().to_string()),
            }).collect(),
        };

        manifest::Raw {
            version: 1,
            application: Some(manifest::RawApplication {
                id: self.application_key.clone(),
                name: self.application_name.clone(),
                path: Some(self.application_path.clone()),
            }),
            platform: vec![manifest::RawPlatform {
                id: self.platform_id.clone(),
                path: Some(self.platform_path.clone()),
                android: Some(android),
            }],
        }
    }
}
