//! Dependency Declarations
//!
//! Record the external libraries a build depends on. Dependencies are only
//! declared here, never resolved. Fetching the artifacts is left to the
//! dependency resolver of the external build tool.

use crate::manifest::RawDependency;
use crate::platform::android;
use crate::Error;

const KEY_DEPENDENCY: &str = "platform.android.dependency";

// Dotted path of a part of a dependency declaration, with the position of
// the declaration if known.
fn key(index: Option<usize>, part: &str) -> String {
    match index {
        Some(i) => format!("{}[{}].{}", KEY_DEPENDENCY, i, part),
        None => format!("{}.{}", KEY_DEPENDENCY, part),
    }
}

/// Dependency Reference
///
/// A library coordinate in `group:artifact` notation, the version to use,
/// and the Gradle configuration it is added to.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DependencyReference {
    configuration: String,
    coordinate: String,
    version: String,
}

impl DependencyReference {
    /// Create a dependency reference
    ///
    /// Verify the coordinate and version and create a new reference. The
    /// coordinate must be `group:artifact` with both parts non-empty and
    /// made of ASCII alphanumerics, `.`, `-` and `_`. The version must be a
    /// dot-separated numeric release, optionally followed by a `-qualifier`.
    pub fn new(configuration: &str, coordinate: &str, version: &str) -> Result<Self, Error> {
        Self::new_at(None, configuration, coordinate, version)
    }

    fn new_at(
        index: Option<usize>,
        configuration: &str,
        coordinate: &str,
        version: &str,
    ) -> Result<Self, Error> {
        if !Self::is_coordinate(coordinate) {
            return Err(Error::MalformedCoordinate {
                key: key(index, "coordinate"),
                reason: format!("`{}` is not of the form `group:artifact`", coordinate),
            });
        }
        if !Self::is_version(version) {
            return Err(Error::MalformedCoordinate {
                key: key(index, "version"),
                reason: format!("`{}` is not a numeric release with optional qualifier", version),
            });
        }
        if configuration.is_empty() {
            return Err(Error::MalformedCoordinate {
                key: key(index, "configuration"),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            configuration: configuration.to_string(),
            coordinate: coordinate.to_string(),
            version: version.to_string(),
        })
    }

    fn is_coordinate(s: &str) -> bool {
        let is_part = |v: &str| {
            !v.is_empty() && v.chars().all(
                |c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'
            )
        };

        match s.split_once(':') {
            Some((group, artifact)) => is_part(group) && is_part(artifact),
            None => false,
        }
    }

    fn is_version(s: &str) -> bool {
        let (release, qualifier) = match s.split_once('-') {
            Some((r, q)) => (r, Some(q)),
            None => (s, None),
        };

        let release_ok = release.split('.').all(
            |v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit())
        );
        let qualifier_ok = qualifier.map_or(true, |v| {
            !v.is_empty() && v.chars().all(
                |c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'
            )
        });

        release_ok && qualifier_ok
    }

    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    pub fn coordinate(&self) -> &str {
        &self.coordinate
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Gradle notation `group:artifact:version`.
    pub fn notation(&self) -> String {
        format!("{}:{}", self.coordinate, self.version)
    }
}

/// Declare dependencies
///
/// Turn an ordered sequence of declarations into references. A coordinate
/// declared more than once yields a single reference, keeping the position
/// of its first declaration but the version and configuration of its last.
pub fn declare<'a, I>(declarations: I) -> Result<Vec<DependencyReference>, Error>
where
    I: IntoIterator<Item = &'a RawDependency>,
{
    let mut refs: Vec<DependencyReference> = Vec::new();

    for (index, declaration) in declarations.into_iter().enumerate() {
        let missing = |part| Error::MalformedCoordinate {
            key: key(Some(index), part),
            reason: "is missing".to_string(),
        };

        let coordinate = declaration.coordinate.as_deref().ok_or_else(|| missing("coordinate"))?;
        let version = declaration.version.as_deref().ok_or_else(|| missing("version"))?;
        let configuration = declaration.configuration.as_deref()
            .unwrap_or(android::DEFAULT_CONFIGURATION);

        let reference = DependencyReference::new_at(Some(index), configuration, coordinate, version)?;

        match refs.iter_mut().find(|v| v.coordinate == reference.coordinate) {
            Some(v) => *v = reference,
            None => refs.push(reference),
        }
    }

    Ok(refs)
}
