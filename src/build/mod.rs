//! Turns the widget sources into minified, content-addressed CDN assets and
//! regenerates the integration docs that pin their SRI hashes.

pub mod artifacts;
pub mod css;
pub mod docs;
pub mod integrity;
pub mod script;

use crate::config::BuildConfig;
use artifacts::{Artifact, ArtifactKind, BuildResult, write_artifact};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

pub use css::transform_stylesheet;
pub use script::{TransformError, transform_script};

/// Base name shared by every widget artifact.
pub const ARTIFACT_NAME: &str = "widget";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read source {path:?}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) async fn read_source(path: &Path) -> Result<String, BuildError> {
    fs::read_to_string(path)
        .await
        .map_err(|source| BuildError::SourceRead {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) async fn write_output(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| BuildError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    fs::write(path, contents)
        .await
        .map_err(|source| BuildError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Run the whole pipeline: transform, hash, write `dist/`, then the docs.
///
/// Any read or write failure aborts the run; files already written stay.
pub async fn run(config: &BuildConfig) -> Result<BuildResult, BuildError> {
    info!(src = %config.src_dir.display(), dist = %config.dist_dir.display(), "starting build");

    let js_source = read_source(&config.src_dir.join(format!("{ARTIFACT_NAME}.js"))).await?;
    let css_source = read_source(&config.src_dir.join(format!("{ARTIFACT_NAME}.css"))).await?;

    let script = Artifact::new(
        ARTIFACT_NAME,
        ArtifactKind::Script,
        transform_script(&js_source),
    );
    let stylesheet = Artifact::new(
        ARTIFACT_NAME,
        ArtifactKind::Stylesheet,
        transform_stylesheet(&css_source),
    );

    let mut result = BuildResult::default();
    for artifact in [&script, &stylesheet] {
        let written = write_artifact(artifact, &config.dist_dir).await?;
        info!(
            kind = ?artifact.kind,
            file = %written.versioned_filename,
            "versioned artifact created"
        );
        result.0.insert(artifact.kind, written);
    }

    let js_digest = result.digest(ArtifactKind::Script).unwrap_or_default();
    let css_digest = result.digest(ArtifactKind::Stylesheet).unwrap_or_default();
    let site = docs::Site::from_config(config);
    docs::generate_examples(&site, js_digest, css_digest, &config.examples_dir).await?;
    docs::generate_readme(&site, js_digest, css_digest, &config.readme_path).await?;

    info!("build completed");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::integrity::hash;

    fn config_in(root: &Path) -> BuildConfig {
        BuildConfig {
            src_dir: root.join("assets"),
            dist_dir: root.join("dist"),
            examples_dir: root.join("examples"),
            readme_path: root.join("README.md"),
            ..BuildConfig::default()
        }
    }

    fn seed_sources(root: &Path, js: &str, css: &str) {
        let src = root.join("assets");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("widget.js"), js).unwrap();
        std::fs::write(src.join("widget.css"), css).unwrap();
    }

    #[tokio::test]
    async fn builds_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        seed_sources(
            dir.path(),
            include_str!("../../assets/widget.js"),
            include_str!("../../assets/widget.css"),
        );
        let config = config_in(dir.path());
        let result = run(&config).await.unwrap();

        for kind in [ArtifactKind::Script, ArtifactKind::Stylesheet] {
            let written = result.get(kind).unwrap();
            let ext = kind.extension();
            let canonical = std::fs::read(config.dist_dir.join(format!("widget.min.{ext}"))).unwrap();
            let versioned = std::fs::read(config.dist_dir.join(&written.versioned_filename)).unwrap();
            assert_eq!(canonical, versioned);
            assert_eq!(hash(&canonical), written.digest);
        }

        let basic = std::fs::read_to_string(config.examples_dir.join("basic.html")).unwrap();
        let js_digest = result.digest(ArtifactKind::Script).unwrap();
        assert!(basic.contains(&format!("sha384-{js_digest}")));
        assert!(config.examples_dir.join("csp-strict.html").exists());
        assert!(config.examples_dir.join("config.json").exists());
        let readme = std::fs::read_to_string(&config.readme_path).unwrap();
        let css_digest = result.digest(ArtifactKind::Stylesheet).unwrap();
        assert!(readme.contains(&format!("sha384-{css_digest}")));
    }

    #[tokio::test]
    async fn repeated_builds_produce_identical_names() {
        let dir = tempfile::tempdir().unwrap();
        seed_sources(dir.path(), "var a = 1;\n", "a { color: red; }\n");
        let config = config_in(dir.path());

        let first = run(&config).await.unwrap();
        let second = run(&config).await.unwrap();
        for kind in [ArtifactKind::Script, ArtifactKind::Stylesheet] {
            assert_eq!(
                first.get(kind).unwrap().versioned_filename,
                second.get(kind).unwrap().versioned_filename
            );
        }
    }

    #[tokio::test]
    async fn unminifiable_script_ships_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let js = "var s = 'unterminated;\n";
        seed_sources(dir.path(), js, "a{}");
        let config = config_in(dir.path());

        let result = run(&config).await.unwrap();
        let shipped = std::fs::read_to_string(config.dist_dir.join("widget.min.js")).unwrap();
        assert_eq!(shipped, js);
        assert_eq!(result.digest(ArtifactKind::Script).unwrap(), hash(js.as_bytes()));
    }

    #[tokio::test]
    async fn missing_source_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = run(&config).await.unwrap_err();
        match err {
            BuildError::SourceRead { path, .. } => assert!(path.ends_with("widget.js")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!config.dist_dir.exists());
    }
}
