use super::BuildError;
use super::integrity::{canonical_name, hash, versioned_name};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Script,
    Stylesheet,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Script => "js",
            ArtifactKind::Stylesheet => "css",
        }
    }
}

/// A transformed asset ready to be written. Its digest and versioned name are
/// derived from the bytes, never stored separately.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub content: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, kind: ArtifactKind, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind,
            content: content.into(),
        }
    }

    pub fn digest(&self) -> String {
        hash(&self.content)
    }

    pub fn canonical_filename(&self) -> String {
        canonical_name(&self.name, self.kind.extension())
    }

    pub fn versioned_filename(&self) -> String {
        versioned_name(&self.name, &self.digest(), self.kind.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenArtifact {
    pub digest: String,
    pub versioned_filename: String,
}

/// What one build run produced, keyed by artifact kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildResult(pub BTreeMap<ArtifactKind, WrittenArtifact>);

impl BuildResult {
    pub fn get(&self, kind: ArtifactKind) -> Option<&WrittenArtifact> {
        self.0.get(&kind)
    }

    pub fn digest(&self, kind: ArtifactKind) -> Option<&str> {
        self.get(kind).map(|w| w.digest.as_str())
    }
}

/// Write `<name>.min.<ext>` and `<name>.<hash16>.min.<ext>` with identical bytes.
pub async fn write_artifacts(
    content: &[u8],
    base: &str,
    ext: &str,
    out_dir: &Path,
) -> Result<WrittenArtifact, BuildError> {
    fs::create_dir_all(out_dir)
        .await
        .map_err(|source| BuildError::Write {
            path: out_dir.to_path_buf(),
            source,
        })?;

    let digest = hash(content);
    let versioned_filename = versioned_name(base, &digest, ext);
    for filename in [canonical_name(base, ext), versioned_filename.clone()] {
        let path = out_dir.join(&filename);
        fs::write(&path, content)
            .await
            .map_err(|source| BuildError::Write {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), bytes = content.len(), "wrote artifact");
    }

    Ok(WrittenArtifact {
        digest,
        versioned_filename,
    })
}

/// [`write_artifacts`] for a prepared [`Artifact`].
pub async fn write_artifact(
    artifact: &Artifact,
    out_dir: &Path,
) -> Result<WrittenArtifact, BuildError> {
    write_artifacts(
        &artifact.content,
        &artifact.name,
        artifact.kind.extension(),
        out_dir,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canonical_and_versioned_files_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist");
        let written = write_artifacts(b".a{color:red}", "widget", "css", &out)
            .await
            .unwrap();

        let canonical = std::fs::read(out.join("widget.min.css")).unwrap();
        let versioned = std::fs::read(out.join(&written.versioned_filename)).unwrap();
        assert_eq!(canonical, versioned);
        assert_eq!(canonical, b".a{color:red}");
        assert_eq!(written.digest, hash(&canonical));
        assert!(written.versioned_filename.starts_with("widget."));
        assert!(written.versioned_filename.ends_with(".min.css"));
    }

    #[tokio::test]
    async fn artifact_names_follow_content() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Artifact::new("widget", ArtifactKind::Script, "(()=>{})();");
        let written = write_artifact(&artifact, dir.path()).await.unwrap();
        assert_eq!(written.versioned_filename, artifact.versioned_filename());
        assert_eq!(artifact.canonical_filename(), "widget.min.js");
        assert_eq!(written.digest, artifact.digest());
    }

    #[tokio::test]
    async fn unwritable_output_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("dist");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = write_artifacts(b"x", "widget", "js", &blocker)
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Write { .. }));
    }
}
