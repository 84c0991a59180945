//! Build Plugins
//!
//! Built-in build steps for the plugins commonly applied to the Android
//! embedding of a cross-platform application. The plugins themselves run
//! inside Gradle. The steps here only fill in the plan defaults those plugins
//! would otherwise apply implicitly, so the plan states them explicitly.

use crate::plan::{BuildPlan, BuildStep};
use crate::platform::android;

/// Android Application Plugin
///
/// The namespace of the generated `R` and `BuildConfig` classes defaults to
/// the application ID.
pub struct AndroidApplication;

impl BuildStep for AndroidApplication {
    fn id(&self) -> &str {
        "com.android.application"
    }

    fn apply(&self, plan: BuildPlan) -> BuildPlan {
        if plan.namespace().is_some() {
            plan
        } else {
            let namespace = plan.application_id().to_string();
            plan.with_namespace(namespace)
        }
    }
}

/// Kotlin Android Plugin
///
/// Kotlin compiles for the Java target level unless told otherwise.
pub struct KotlinAndroid;

impl BuildStep for KotlinAndroid {
    fn id(&self) -> &str {
        "kotlin-android"
    }

    fn accepts(&self, id: &str) -> bool {
        id == "kotlin-android" || id == "org.jetbrains.kotlin.android"
    }

    fn apply(&self, plan: BuildPlan) -> BuildPlan {
        let language = plan.language().with_default_jvm_target();
        plan.with_language(language)
    }
}

/// Flutter Gradle Plugin
///
/// The Flutter project is located two levels above the Android embedding
/// unless configured otherwise.
pub struct Flutter;

impl BuildStep for Flutter {
    fn id(&self) -> &str {
        "dev.flutter.flutter-gradle-plugin"
    }

    fn apply(&self, plan: BuildPlan) -> BuildPlan {
        if plan.flutter_source().is_some() {
            plan
        } else {
            plan.with_flutter_source(android::DEFAULT_FLUTTER_SOURCE.to_string())
        }
    }
}

/// Plugin Registry
///
/// Maps plugin identifiers of the manifest to build steps. The default
/// registry knows all built-in plugins. Callers can register their own.
pub struct Registry {
    steps: Vec<Box<dyn BuildStep>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
        }
    }

    /// Register a build step. Steps registered later take precedence for
    /// identifiers accepted by several steps.
    pub fn register(&mut self, step: Box<dyn BuildStep>) {
        self.steps.push(step);
    }

    /// Find the build step handling the given plugin identifier.
    pub fn lookup(&self, id: &str) -> Option<&dyn BuildStep> {
        self.steps.iter().rev()
            .find(|v| v.accepts(id))
            .map(|v| &**v)
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut r = Self::new();

        r.register(Box::new(AndroidApplication));
        r.register(Box::new(KotlinAndroid));
        r.register(Box::new(Flutter));

        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl BuildStep for Nop {
        fn id(&self) -> &str {
            "com.example.nop"
        }

        fn apply(&self, plan: BuildPlan) -> BuildPlan {
            plan
        }
    }

    // Verify built-in plugins and aliases are known.
    #[test]
    fn registry_default() {
        let r = Registry::default();

        assert_eq!(r.lookup("com.android.application").unwrap().id(), "com.android.application");
        assert_eq!(r.lookup("org.jetbrains.kotlin.android").unwrap().id(), "kotlin-android");
        assert_eq!(r.lookup("dev.flutter.flutter-gradle-plugin").unwrap().id(), "dev.flutter.flutter-gradle-plugin");
        assert!(r.lookup("com.android.library").is_none());
        assert!(Registry::new().lookup("kotlin-android").is_none());
    }

    // Verify custom steps can be registered next to the built-ins.
    #[test]
    fn registry_register() {
        let mut r = Registry::default();
        assert!(r.lookup("com.example.nop").is_none());

        r.register(Box::new(Nop));
        assert_eq!(r.lookup("com.example.nop").unwrap().id(), "com.example.nop");
        assert_eq!(r.lookup("kotlin-android").unwrap().id(), "kotlin-android");
    }
}
