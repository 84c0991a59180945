//! Persistent Platform Integration
//!
//! The `emerge` operation stores the Gradle declaration of a build plan
//! persistently on disk. Unlike passing the plan to Gradle at build time,
//! this allows adjusting the generated build scripts to specific needs and
//! retaining modifications across builds.

use crate::plan::BuildPlan;
use crate::signing::SigningStrategy;

/// Emerge Errors
///
/// This is the exhaustive list of possible errors raised by the emerge
/// operation. See each error for details.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Platform integration is already present and updating was not
    /// allowed by the caller.
    #[error("platform integration already present")]
    Already,
    /// Cannot access the specified platform directory.
    #[error("cannot access platform directory {0:?}")]
    PlatformDirectory(std::ffi::OsString),
    /// Creation of the directory at the specified path failed.
    #[error("cannot create directory {0:?}")]
    DirectoryCreation(std::ffi::OsString),
    /// Updating the file at the specified path failed with the given error.
    #[error("cannot update {0:?}: {1}")]
    FileUpdate(std::ffi::OsString, #[source] std::io::Error),
}

// Ensure directory exists
//
// Make sure the directory at the given path exists. Create the directory and
// its parent directories if necessary.
//
// This is a convenience helper around `std::fs::create_dir_all()`, but
// returning the local error `Error::DirectoryCreation` on failure.
fn ensure_dir(
    path: &std::path::Path,
) -> Result<(), Error> {
    std::fs::create_dir_all(path)
        .map_err(
            |_| Error::DirectoryCreation(path.as_os_str().to_os_string())
        )
}

// Update a file if required
//
// This writes the given content to the specified file, but only if the file
// content does not already match the new content. This avoids modifying a file
// unless necessary. Thus, the file timestamp is only modified if the content
// really changed.
//
// Note that this reads in the entire file content. Thus, use it only on
// trusted content.
fn update_file(
    path: &std::path::Path,
    content: &str,
) -> Result<(), Error> {
    let error = |v| Error::FileUpdate(path.as_os_str().to_os_string(), v);

    // Open the file read+write and create it if it does not exist, yet.
    let mut f = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(error)?;

    // Read the entire file content into memory.
    let mut old = String::new();
    <std::fs::File as std::io::Read>::read_to_string(&mut f, &mut old)
        .map_err(error)?;

    // If the file has to be updated, rewind the position, truncate the file
    // and write the new contents.
    if old != content {
        tracing::debug!(path = %path.display(), "updating file");

        <std::fs::File as std::io::Seek>::rewind(&mut f).map_err(error)?;
        f.set_len(0).map_err(error)?;
        <std::fs::File as std::io::Write>::write_all(&mut f, content.as_bytes())
            .map_err(error)?;
    }

    // Sync the file now to ensure errors are caught properly.
    f.sync_all().map_err(error)?;

    Ok(())
}

// Render `gradle.properties`
//
// `gradle.properties` is a key-value store read by Gradle before startup. It
// defines project-wide settings for Gradle. We use it to:
//
//  * Enable `AndroidX`, the new Android middle-layer that allows using new
//    Android APIs on old devices.
//
//  * Set JVM parameters during the Gradle build (4G memory and UTF-8 files).
fn render_gradle_properties() -> &'static str {
    concat!(
        "# Generated by osiris-buildplan\n",
        "org.gradle.jvmargs=-Xmx4G -Dfile.encoding=UTF-8\n",
        "android.useAndroidX=true\n",
        "android.nonTransitiveRClass=true\n",
    )
}

// Render `settings.gradle.kts`
//
// Configure module repositories and include the `app` module. The root
// project is named after the application, see `BuildPlan::project_name()`.
fn render_settings_gradle(plan: &BuildPlan) -> String {
    format!(
        concat!(
            "// Generated by osiris-buildplan\n",
            "pluginManagement {{\n",
            "    repositories {{\n",
            "        google()\n",
            "        mavenCentral()\n",
            "        gradlePluginPortal()\n",
            "    }}\n",
            "}}\n",
            "\n",
            "rootProject.name = \"{0}\"\n",
            "include(\":app\")\n",
        ),
        plan.project_name(),
    )
}

// Render `app/build.gradle.kts`
//
// This is the module build script declaring every part of the plan in the
// Gradle Kotlin DSL. All interpolated strings were verified to be quotable by
// the manifest parser or by `Toolchain::verify()`. Keystore passwords are
// never part of the plan and are read from Gradle properties instead. So is
// the keystore file, since its location depends on where the application
// root lies relative to this script.
fn render_build_gradle(plan: &BuildPlan) -> String {
    let mut s = String::new();
    let language = plan.language();
    let sdk = plan.sdk();

    s.push_str("// Generated by osiris-buildplan\n");

    s.push_str("plugins {\n");
    for plugin in plan.plugins() {
        s.push_str(&format!("    id(\"{}\")\n", plugin));
    }
    s.push_str("}\n\n");

    s.push_str("android {\n");
    if let Some(v) = plan.namespace() {
        s.push_str(&format!("    namespace = \"{}\"\n", v));
    }
    s.push_str(&format!("    compileSdk = {}\n", sdk.compile()));
    if let Some(v) = plan.ndk_version() {
        s.push_str(&format!("    ndkVersion = \"{}\"\n", v));
    }

    s.push_str("\n    compileOptions {\n");
    s.push_str(&format!(
        "        sourceCompatibility = JavaVersion.{}\n",
        language.source().gradle_constant(),
    ));
    s.push_str(&format!(
        "        targetCompatibility = JavaVersion.{}\n",
        language.target().gradle_constant(),
    ));
    s.push_str(&format!(
        "        isCoreLibraryDesugaringEnabled = {}\n",
        language.desugaring(),
    ));
    s.push_str("    }\n");

    if let Some(v) = language.jvm_target() {
        s.push_str("\n    kotlinOptions {\n");
        s.push_str(&format!("        jvmTarget = \"{}\"\n", v));
        s.push_str("    }\n");
    }

    s.push_str("\n    defaultConfig {\n");
    s.push_str(&format!("        applicationId = \"{}\"\n", plan.application_id()));
    s.push_str(&format!("        minSdk = {}\n", sdk.min()));
    s.push_str(&format!("        targetSdk = {}\n", sdk.target()));
    s.push_str(&format!("        versionCode = {}\n", plan.version_code()));
    s.push_str(&format!("        versionName = \"{}\"\n", plan.version_name()));
    if plan.multi_dex() {
        s.push_str("        multiDexEnabled = true\n");
    }
    s.push_str("    }\n");

    let signing_config = match plan.signing() {
        SigningStrategy::Debug => "debug",
        SigningStrategy::Release(keystore) => {
            s.push_str("\n    signingConfigs {\n");
            s.push_str("        create(\"release\") {\n");
            s.push_str("            storeFile = providers.gradleProperty(\"osiris.signing.storeFile\").map { file(it) }.orNull\n");
            s.push_str("            storePassword = providers.gradleProperty(\"osiris.signing.storePassword\").orNull\n");
            if let Some(alias) = &keystore.key_alias {
                s.push_str(&format!("            keyAlias = \"{}\"\n", alias));
            }
            s.push_str("            keyPassword = providers.gradleProperty(\"osiris.signing.keyPassword\").orNull\n");
            s.push_str("        }\n");
            s.push_str("    }\n");
            "release"
        },
    };

    s.push_str("\n    buildTypes {\n");
    s.push_str("        release {\n");
    s.push_str(&format!(
        "            signingConfig = signingConfigs.getByName(\"{}\")\n",
        signing_config,
    ));
    s.push_str("        }\n");
    s.push_str("    }\n");
    s.push_str("}\n");

    if let Some(v) = plan.flutter_source() {
        s.push_str("\nflutter {\n");
        s.push_str(&format!("    source = \"{}\"\n", v));
        s.push_str("}\n");
    }

    if !plan.dependencies().is_empty() {
        s.push_str("\ndependencies {\n");
        for dependency in plan.dependencies() {
            s.push_str(&format!(
                "    {}(\"{}\")\n",
                dependency.configuration(),
                dependency.notation(),
            ));
        }
        s.push_str("}\n");
    }

    s
}

/// Emerge persistent platform integration
///
/// Write the Gradle declaration of the plan to persistent storage, below the
/// given platform directory. The directory is created if it does not exist.
///
/// This function will fail if the platform directory already exists, unless
/// `update` is `true`. In this case the generated files are updated to match
/// the plan. Files are only rewritten if their content changed.
pub fn emerge(
    plan: &BuildPlan,
    dir: &std::path::Path,
    update: bool,
) -> Result<(), Error> {
    let mut path = std::path::PathBuf::new();

    // Check for the platform path to exist and being accessible. If the path
    // points to something other than a directory, we fail with an error. If
    // the path points to an existing directory and updates are not allowed,
    // we fail. Otherwise, we create the path and continue.
    path.push(dir);
    match std::fs::metadata(&path) {
        Ok(v) => {
            if !v.is_dir() {
                return Err(Error::PlatformDirectory(path.as_os_str().to_os_string()));
            } else if !update {
                return Err(Error::Already);
            }
        },
        Err(v) => {
            if v.kind() != std::io::ErrorKind::NotFound {
                return Err(Error::PlatformDirectory(path.as_os_str().to_os_string()));
            }
            ensure_dir(path.as_path())?;
        },
    };

    path.push("gradle.properties");
    update_file(path.as_path(), render_gradle_properties())?;
    path.pop();

    path.push("settings.gradle.kts");
    update_file(path.as_path(), &render_settings_gradle(plan))?;
    path.pop();

    path.push("app");
    {
        ensure_dir(path.as_path())?;

        path.push("build.gradle.kts");
        update_file(path.as_path(), &render_build_gradle(plan))?;
        path.pop();
    }
    path.pop();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::op::resolve;
    use crate::plugin::Registry;
    use crate::signing::BuildType;
    use crate::toolchain::Toolchain;

    fn plan(content: &str) -> BuildPlan {
        let manifest = Manifest::parse_str(content).unwrap();
        let request = resolve::Request { platform: None, build_type: BuildType::Release };

        resolve::resolve(&manifest, &request, &Toolchain::default(), &Registry::default())
            .unwrap()
            .plan
    }

    const HEALTH: &str = "
        version = 1
        [[platform]]
        id = \"android\"
        [platform.android]
        application-id = \"com.example.health\"
        compile-sdk = 34
        target-sdk = 34
        multi-dex = true
        plugins = [\"com.android.application\", \"kotlin-android\", \"dev.flutter.flutter-gradle-plugin\"]
        [platform.android.compile-options]
        target-compatibility = \"11\"
        core-library-desugaring = true
        [[platform.android.dependency]]
        configuration = \"coreLibraryDesugaring\"
        coordinate = \"com.android.tools:desugar_jdk_libs\"
        version = \"2.0.4\"
    ";

    // Verify the module build script declares the plan.
    #[test]
    fn render_health() {
        let s = render_build_gradle(&plan(HEALTH));

        assert!(s.contains("    id(\"kotlin-android\")\n"));
        assert!(s.contains("    namespace = \"com.example.health\"\n"));
        assert!(s.contains("    compileSdk = 34\n"));
        assert!(s.contains("sourceCompatibility = JavaVersion.VERSION_11\n"));
        assert!(s.contains("isCoreLibraryDesugaringEnabled = true\n"));
        assert!(s.contains("        jvmTarget = \"11\"\n"));
        assert!(s.contains("        minSdk = 21\n"));
        assert!(s.contains("        multiDexEnabled = true\n"));
        assert!(s.contains("signingConfig = signingConfigs.getByName(\"debug\")"));
        assert!(s.contains("    source = \"../..\"\n"));
        assert!(s.contains("    coreLibraryDesugaring(\"com.android.tools:desugar_jdk_libs:2.0.4\")\n"));
        assert!(!s.contains("signingConfigs {"));
    }

    // Verify Java 9 and 10 use the legacy `JavaVersion` constants.
    #[test]
    fn render_legacy_level() {
        let content = HEALTH.replace("target-compatibility = \"11\"", "target-compatibility = 10");
        let s = render_build_gradle(&plan(&content));

        assert!(s.contains("sourceCompatibility = JavaVersion.VERSION_1_10\n"));
        assert!(s.contains("targetCompatibility = JavaVersion.VERSION_1_10\n"));
    }

    // Verify the root project is named after the application name, then the
    // application identifier.
    #[test]
    fn render_project_name() {
        let content = format!("{}\n[application]\nid = \"health\"\n", HEALTH);
        assert!(render_settings_gradle(&plan(&content)).contains("rootProject.name = \"health\"\n"));

        let content = format!("{}\n[application]\nid = \"health\"\nname = \"Health\"\n", HEALTH);
        assert!(render_settings_gradle(&plan(&content)).contains("rootProject.name = \"Health\"\n"));
    }

    // Verify release keystores get their own signing config.
    #[test]
    fn render_release_signing() {
        let content = format!(
            "{}\n[platform.android.signing]\nstrategy = \"release\"\nkeystore = \"upload.jks\"\n",
            HEALTH,
        );
        let s = render_build_gradle(&plan(&content));

        assert!(s.contains("storeFile = providers.gradleProperty(\"osiris.signing.storeFile\")"));
        assert!(!s.contains("upload.jks"));
        assert!(s.contains("signingConfig = signingConfigs.getByName(\"release\")"));
        assert!(!s.contains("keyAlias"));
    }

    // Verify emerging into a fresh directory, refusing existing ones, and
    // updating when allowed.
    #[test]
    fn emerge_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("android");
        let plan = plan(HEALTH);

        emerge(&plan, &dir, false).unwrap();
        let script = std::fs::read_to_string(dir.join("app/build.gradle.kts")).unwrap();
        assert_eq!(script, render_build_gradle(&plan));
        assert!(std::fs::read_to_string(dir.join("settings.gradle.kts")).unwrap()
            .contains("rootProject.name = \"com.example.health\"\n"));
        assert!(dir.join("gradle.properties").is_file());

        assert!(matches!(emerge(&plan, &dir, false), Err(Error::Already)));

        std::fs::write(dir.join("app/build.gradle.kts"), "// stale\n").unwrap();
        emerge(&plan, &dir, true).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("app/build.gradle.kts")).unwrap(), script);

        let file = tmp.path().join("file");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(emerge(&plan, &file, true), Err(Error::PlatformDirectory(_))));
    }
}
