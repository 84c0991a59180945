//! Osiris Build Plan Resolution
//!
//! The build plan module resolves the build configuration of the Android
//! embedding of a cross-platform application into a concrete, immutable build
//! plan. The configuration declares the SDK levels of the application, its
//! Java/Kotlin language levels and desugaring support, the plugins taking
//! part in the build, external library dependencies, the identity of the
//! application, and how release artifacts are signed.
//!
//! Model
//! -----
//!
//! The configuration is kept in the Osiris Build Manifest. The manifest is a
//! TOML-formatted file usually called `osiris-platform.toml` placed in the
//! application repository. The `osiris-buildplan` command-line tool parses
//! the manifest and resolves it into a build plan in four stages:
//!
//!  1. **Unvalidated**: The raw TOML document.
//!  2. **Validated**: The manifest after checking it against the manifest
//!     schema. Unknown keys and mistyped values are refused, naming the
//!     offending key. See [`manifest`].
//!  3. **Resolved**: SDK levels and language levels are resolved and checked
//!     for consistency ([`version`]), dependencies declared ([`dependency`])
//!     and the signing strategy selected ([`signing`]).
//!  4. **Emitted**: The resolved parts are composed into a [`plan::BuildPlan`]
//!     and the plugins of the build are applied as [`plan::BuildStep`]s.
//!
//! No stage can be skipped, and the first violated invariant halts the
//! pipeline with an [`Error`]. The whole resolution is a pure function of the
//! manifest, the requested build type, and the toolchain defaults injected by
//! the caller ([`toolchain`]).
//!
//! The emitted plan is not built by this module. It is handed to Gradle,
//! either as project properties on the command-line ([`op::build`]), or as
//! persisted Gradle build scripts ([`op::emerge`]).
//!
//! Supported Platforms
//! -------------------
//!
//!  * [Android](platform::android)

mod error;

pub mod dependency;
pub mod manifest;
pub mod plan;
pub mod plugin;
pub mod signing;
pub mod toolchain;
pub mod version;

pub use error::Error;

/// Platform Operations
///
/// The `op` module is a collection of all operations that can be performed via
/// the command-line interface. Each operation is implemented in a submodule
/// and can be used independently.
pub mod op {
    pub mod build;
    pub mod emerge;
    pub mod resolve;
}

/// Platform Integration
///
/// The `platform` module documents the rules and limits of each supported
/// platform.
pub mod platform {
    pub mod android;
}
