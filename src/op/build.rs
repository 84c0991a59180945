//! Build Platform Integration
//!
//! Hand a build plan to Gradle. This assembles the application artifacts of
//! the requested build type, ready for distribution. All plan values are
//! passed as `osiris.android.*` project properties, so persistent platform
//! integrations can consume them from their own build scripts.

use crate::plan::BuildPlan;
use crate::signing::BuildType;

/// Build Errors
///
/// This is the exhaustive list of possible errors raised by the build
/// operation. See each error for details.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cannot access the specified platform directory.
    #[error("cannot access platform directory {0:?}")]
    PlatformDirectory(std::ffi::OsString),
    /// Cannot create the specified build artifact directory.
    #[error("cannot create directory {0:?}")]
    DirectoryCreation(std::ffi::OsString),
    /// Emerging the ephemeral platform integration failed.
    #[error("cannot emerge ephemeral platform integration: {0}")]
    Emerge(#[from] crate::op::emerge::Error),
    /// Command execution could not commence.
    #[error("cannot execute {0:?}: {1}")]
    Exec(String, #[source] std::io::Error),
    /// Platform build tools failed.
    #[error("platform build tools failed")]
    Build,
}

// Add Gradle `KEY=VALUE` to command-line.
fn cmd_gradle_key_value(
    cmd: &mut std::process::Command,
    key: &str,
    value: &dyn std::convert::AsRef<std::ffi::OsStr>,
) {
    let mut arg = std::ffi::OsString::new();

    arg.push(key);
    arg.push("=");
    arg.push(value.as_ref());
    cmd.arg(arg);
}

// Add Gradle `--project-prop KEY=VALUE` to command-line.
fn cmd_gradle_project_prop(
    cmd: &mut std::process::Command,
    key: &str,
    value: &dyn std::convert::AsRef<std::ffi::OsStr>,
) {
    cmd.arg("--project-prop");
    cmd_gradle_key_value(cmd, key, value)
}

// Add Gradle `--system-prop KEY=VALUE` to command-line.
fn cmd_gradle_system_prop(
    cmd: &mut std::process::Command,
    key: &str,
    value: &dyn std::convert::AsRef<std::ffi::OsStr>,
) {
    cmd.arg("--system-prop");
    cmd_gradle_key_value(cmd, key, value)
}

/// Assemble Gradle invocation
///
/// Create the Gradle command building the plan in the platform integration
/// at `path_platform`. Gradle caches and build outputs are redirected below
/// `path_build` to avoid polluting the sources.
///
/// Release keystores are resolved against the application root below
/// `path_root` and passed as `osiris.signing.storeFile`, regardless of where
/// the platform integration is located. Their passwords are not part of the
/// plan and must be supplied via the environment of Gradle.
pub fn command(
    plan: &BuildPlan,
    path_root: &std::path::Path,
    path_platform: &std::path::Path,
    path_build: &std::path::Path,
) -> std::process::Command {
    let mut cmd = std::process::Command::new("gradle");
    let language = plan.language();
    let sdk = plan.sdk();

    // Set the SDK path via `ANDROID_HOME`. This is required by the Android SDK
    // Gradle build. Alternatively, this can be set via `local.properties`, but
    // that file is owned by the framework tools.
    if let Some(v) = plan.sdk_path() {
        cmd.env("ANDROID_HOME", v);
    }

    cmd.arg(match plan.build_type() {
        BuildType::Debug => "assembleDebug",
        BuildType::Release => "assembleRelease",
    });

    cmd.arg("--no-scan");
    cmd.arg("--no-watch-fs");
    cmd.arg("--parallel");
    cmd.arg("--quiet");

    // Tell Gradle the path to the platform integration.
    cmd.arg("--project-dir");
    cmd.arg(path_platform);

    // Redirect the Gradle cache and `buildDir` to the build directory.
    cmd.arg("--project-cache-dir");
    cmd.arg(path_build.join("gradle-cache"));
    cmd_gradle_project_prop(&mut cmd, "buildDir", &path_build.join("gradle-build"));

    // Write Gradle system-properties for early configuration. This is needed
    // for these to be available in `settings.gradle`.
    cmd_gradle_system_prop(
        &mut cmd,
        "osiris.system.name",
        &plan.project_name(),
    );

    //
    // Write `osiris.android.*` properties.
    //

    cmd_gradle_project_prop(&mut cmd, "osiris.android.applicationId", &plan.application_id());
    if let Some(v) = plan.namespace() {
        cmd_gradle_project_prop(&mut cmd, "osiris.android.namespace", &v);
    }

    cmd_gradle_project_prop(&mut cmd, "osiris.android.compileSdk", &sdk.compile().to_string());
    cmd_gradle_project_prop(&mut cmd, "osiris.android.minSdk", &sdk.min().to_string());
    cmd_gradle_project_prop(&mut cmd, "osiris.android.targetSdk", &sdk.target().to_string());

    cmd_gradle_project_prop(
        &mut cmd,
        "osiris.android.versionCode",
        &plan.version_code().to_string(),
    );
    cmd_gradle_project_prop(&mut cmd, "osiris.android.versionName", &plan.version_name());
    if let Some(v) = plan.ndk_version() {
        cmd_gradle_project_prop(&mut cmd, "osiris.android.ndkVersion", &v);
    }
    cmd_gradle_project_prop(
        &mut cmd,
        "osiris.android.multiDex",
        &plan.multi_dex().to_string(),
    );

    cmd_gradle_project_prop(
        &mut cmd,
        "osiris.android.sourceCompatibility",
        &language.source().to_string(),
    );
    cmd_gradle_project_prop(
        &mut cmd,
        "osiris.android.targetCompatibility",
        &language.target().to_string(),
    );
    if let Some(v) = language.jvm_target() {
        cmd_gradle_project_prop(&mut cmd, "osiris.android.jvmTarget", &v.to_string());
    }
    cmd_gradle_project_prop(
        &mut cmd,
        "osiris.android.coreLibraryDesugaring",
        &language.desugaring().to_string(),
    );

    // Dependencies are passed as `;`-separated `<configuration>:<notation>`.
    if !plan.dependencies().is_empty() {
        let dependencies = plan.dependencies().iter()
            .map(|v| format!("{}:{}", v.configuration(), v.notation()))
            .collect::<Vec<_>>()
            .join(";");
        cmd_gradle_project_prop(&mut cmd, "osiris.android.dependencies", &dependencies);
    }

    //
    // Write signing properties.
    //

    if let Some(v) = plan.keystore_file(path_root) {
        cmd_gradle_project_prop(&mut cmd, "osiris.signing.storeFile", &v);
    }

    cmd
}

/// Build platform integration
///
/// Perform a full build of the plan. The platform integration is taken from
/// the platform directory of the plan, relative to `path_root`. If no
/// persistent platform integration is located there, an ephemeral one is
/// emerged below `path_target` and built instead.
///
/// Any build artifacts are stored below `<path_target>/osiris/build/<id>/`.
pub fn build(
    plan: &BuildPlan,
    path_root: &std::path::Path,
    path_target: &std::path::Path,
) -> Result<(), Error> {
    let mut path_platform = path_root.join(plan.platform_path());
    let mut path_build = path_target.to_path_buf();

    // Check for the platform directory to exist and being accessible.
    let accessible = match std::fs::metadata(&path_platform) {
        Err(v) => {
            if v.kind() == std::io::ErrorKind::NotFound {
                false
            } else {
                return Err(Error::PlatformDirectory(path_platform.as_os_str().to_os_string()));
            }
        }
        Ok(m) => {
            if m.is_dir() {
                true
            } else {
                return Err(Error::PlatformDirectory(path_platform.as_os_str().to_os_string()));
            }
        }
    };

    // If the platform directory does not exist, emerge an ephemeral platform
    // integration at `<target>/osiris/platform/<id>/`.
    if !accessible {
        path_platform.clear();
        path_platform.push(path_target);
        path_platform.push("osiris");
        path_platform.push("platform");
        path_platform.push(plan.platform_id());

        tracing::debug!(path = %path_platform.display(), "emerging ephemeral platform integration");
        crate::op::emerge::emerge(plan, path_platform.as_path(), true)?;
    }

    // Create a build directory for all output artifacts of the build process.
    // Re-use the existing directory, if possible, to speed up builds.
    path_build.push("osiris");
    path_build.push("build");
    path_build.push(plan.platform_id());
    std::fs::create_dir_all(path_build.as_path()).map_err(
        |_| Error::DirectoryCreation(path_build.as_os_str().to_os_string())
    )?;

    let mut cmd = command(plan, path_root, &path_platform, &path_build);
    cmd.stderr(std::process::Stdio::inherit());
    cmd.stdout(std::process::Stdio::inherit());

    tracing::debug!(command = ?cmd, "invoking gradle");

    let output = cmd.output().map_err(|v| Error::Exec("gradle".to_string(), v))?;
    if !output.status.success() {
        return Err(Error::Build);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::op::resolve;
    use crate::plugin::Registry;
    use crate::toolchain::Toolchain;

    fn plan(content: &str, build_type: BuildType) -> BuildPlan {
        let manifest = Manifest::parse_str(content).unwrap();
        let request = resolve::Request { platform: None, build_type };

        resolve::resolve(&manifest, &request, &Toolchain::default(), &Registry::default())
            .unwrap()
            .plan
    }

    fn args(cmd: &std::process::Command) -> Vec<String> {
        cmd.get_args().map(|v| v.to_string_lossy().into_owned()).collect()
    }

    const HEALTH: &str = "
        version = 1
        [[platform]]
        id = \"android\"
        [platform.android]
        application-id = \"com.example.health\"
        compile-sdk = 34
        target-sdk = 33
        sdk-path = \"/opt/android-sdk\"
        plugins = [\"com.android.application\"]
        [platform.android.signing]
        strategy = \"release\"
        keystore = \"upload.jks\"
        key-alias = \"upload\"
        [[platform.android.dependency]]
        coordinate = \"androidx.core:core\"
        version = \"1.12.0\"
    ";

    // Verify plan values end up as project properties.
    #[test]
    fn command_release() {
        let plan = plan(HEALTH, BuildType::Release);
        let cmd = command(
            &plan,
            std::path::Path::new("/src"),
            std::path::Path::new("/src/platform/android"),
            std::path::Path::new("/target/osiris/build/android"),
        );
        let args = args(&cmd);

        assert_eq!(cmd.get_program(), "gradle");
        assert_eq!(args[0], "assembleRelease");
        assert!(args.contains(&"/src/platform/android".to_string()));
        assert!(args.contains(&"/target/osiris/build/android/gradle-cache".to_string()));
        assert!(args.contains(&"osiris.android.applicationId=com.example.health".to_string()));
        assert!(args.contains(&"osiris.android.namespace=com.example.health".to_string()));
        assert!(args.contains(&"osiris.android.compileSdk=34".to_string()));
        assert!(args.contains(&"osiris.android.minSdk=21".to_string()));
        assert!(args.contains(&"osiris.android.targetSdk=33".to_string()));
        assert!(args.contains(&"osiris.android.targetCompatibility=1.8".to_string()));
        assert!(args.contains(&"osiris.android.dependencies=implementation:androidx.core:core:1.12.0".to_string()));
        assert!(args.contains(&"osiris.signing.storeFile=/src/./upload.jks".to_string()));

        let home = cmd.get_envs().find(|(k, _)| *k == "ANDROID_HOME").and_then(|(_, v)| v);
        assert_eq!(home, Some(std::ffi::OsStr::new("/opt/android-sdk")));
    }

    // Verify debug builds carry no signing properties.
    #[test]
    fn command_debug() {
        let plan = plan(HEALTH, BuildType::Debug);
        let args = args(&command(
            &plan,
            std::path::Path::new("."),
            std::path::Path::new("platform"),
            std::path::Path::new("build"),
        ));

        assert_eq!(args[0], "assembleDebug");
        assert!(!args.iter().any(|v| v.starts_with("osiris.signing")));
    }

    // Verify keystores are located relative to the application root, no
    // matter which platform integration is built.
    #[test]
    fn command_keystore_root() {
        let content = format!("{}\n[application]\npath = \"app\"\n", HEALTH);
        let plan = plan(&content, BuildType::Release);
        let args = args(&command(
            &plan,
            std::path::Path::new("/src"),
            std::path::Path::new("/target/osiris/platform/android"),
            std::path::Path::new("/target/osiris/build/android"),
        ));

        assert!(args.contains(&"osiris.signing.storeFile=/src/app/upload.jks".to_string()));
        assert!(!args.iter().any(|v| v.contains("/target/osiris/platform/android/app")));
    }

    // Verify a platform path pointing to a file is refused before anything
    // is executed.
    #[test]
    fn build_platform_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("platform")).unwrap();
        std::fs::write(tmp.path().join("platform/android"), "").unwrap();

        let plan = plan(HEALTH, BuildType::Debug);
        assert!(matches!(
            build(&plan, tmp.path(), &tmp.path().join("target")),
            Err(Error::PlatformDirectory(_)),
        ));
    }
}
