//! Android Platform Integration
//!
//! This module documents how the build configuration of an Android
//! application is resolved, and which platform limits apply. Applications on
//! the Android platform are built with Gradle and the Android Gradle Plugin
//! (AGP). The build script declares the SDK levels of the application, the
//! Java/Kotlin language levels of the compiled code, the plugins that take
//! part in the build, external library dependencies, and how release
//! artifacts are signed.
//!
//! The Osiris build plan keeps all of these in the manifest instead of a
//! hand-written build script. The resolved plan is handed to Gradle either as
//! project properties on the command-line (see `op::build`), or as a
//! generated `build.gradle.kts` (see `op::emerge`).
//!
//! SDK Levels
//! ----------
//!
//! Android identifies API surfaces by integer SDK levels. Three of them are
//! relevant for a build:
//!
//!  * `min-sdk`: the oldest platform the application runs on. Cross-platform
//!    frameworks usually impose their own minimum, which is injected via the
//!    toolchain defaults rather than hard-coded.
//!  * `target-sdk`: the platform behavior the application was tested
//!    against.
//!  * `compile-sdk`: the API surface the application is compiled against.
//!
//! They must satisfy `min-sdk <= target-sdk <= compile-sdk`, and none of them
//! may be below [`MIN_SDK_FLOOR`].
//!
//! Language Levels and Desugaring
//! ------------------------------
//!
//! Java code is compiled for a source and target language level, and Kotlin
//! code for a JVM target that must match the Java target level. Newer Java
//! library APIs can be used on older runtimes via core library desugaring,
//! which requires at least [`DESUGARING_LANGUAGE_LEVEL`] and a library in the
//! [`DESUGARING_CONFIGURATION`] dependency configuration.

/// Lowest SDK level accepted for any of the SDK keys.
pub const MIN_SDK_FLOOR: u32 = 19;

/// Lowest Java language level accepted by the platform tools.
pub const LANGUAGE_LEVEL_FLOOR: u32 = 6;

/// Lowest Java language level that supports core library desugaring.
pub const DESUGARING_LANGUAGE_LEVEL: u32 = 8;

/// Gradle configuration carrying the desugaring library.
pub const DESUGARING_CONFIGURATION: &str = "coreLibraryDesugaring";

/// Default Gradle configuration of dependency declarations.
pub const DEFAULT_CONFIGURATION: &str = "implementation";

/// Default path of the Flutter project relative to the Android embedding.
pub const DEFAULT_FLUTTER_SOURCE: &str = "../..";
