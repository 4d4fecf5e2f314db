//! Integration tests for the mirror command

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper to run pkgmirror with its configuration isolated under `home`
fn pkgmirror(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pkgmirror"))
        .args(args)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_CACHE_HOME", home.join("cache"))
        .env_remove("PKGMIRROR_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute pkgmirror")
}

/// Write a directory feed holding the given `(id, version, dependencies)` packages
fn seed_feed(root: &Path, packages: &[(&str, &str, &[&str])]) {
    std::fs::create_dir_all(root).unwrap();

    let mut index = String::from("apiVersion: v1\nentries:\n");
    let mut ids: Vec<&str> = packages.iter().map(|(id, _, _)| *id).collect();
    ids.dedup();
    for id in ids {
        index.push_str(&format!("  {}:\n", id));
        for (_, version, dependencies) in packages.iter().filter(|(pid, _, _)| *pid == id) {
            let archive = format!("{}-{}.tgz", id, version);
            std::fs::write(root.join(&archive), format!("{} {}", id, version)).unwrap();

            index.push_str(&format!(
                "    - id: {}\n      version: \"{}\"\n      urls: [\"{}\"]\n",
                id, version, archive
            ));
            if !dependencies.is_empty() {
                index.push_str("      dependencies:\n");
                for dependency in dependencies.iter() {
                    index.push_str(&format!("        - id: {}\n", dependency));
                }
            }
        }
    }
    std::fs::write(root.join("index.yaml"), index).unwrap();
}

/// Versions published to a directory feed, as `id version`
fn published(root: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(root.join("index.yaml")) else {
        return Vec::new();
    };
    let index: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
    let mut found = Vec::new();
    if let Some(entries) = index["entries"].as_mapping() {
        for versions in entries.values() {
            for entry in versions.as_sequence().into_iter().flatten() {
                found.push(format!(
                    "{} {}",
                    entry["id"].as_str().unwrap(),
                    entry["version"].as_str().unwrap()
                ));
            }
        }
    }
    found.sort();
    found
}

struct Fixture {
    home: TempDir,
}

impl Fixture {
    fn new(packages: &[(&str, &str, &[&str])]) -> Self {
        let home = TempDir::new().unwrap();
        seed_feed(&home.path().join("source"), packages);
        std::fs::create_dir_all(home.path().join("dest")).unwrap();
        Self { home }
    }

    fn path(&self, name: &str) -> String {
        self.home.path().join(name).display().to_string()
    }

    fn mirror(&self, subject: &str, extra: &[&str]) -> Output {
        let source = self.path("source");
        let dest = self.path("dest");
        let mut args = vec![
            "mirror",
            subject,
            dest.as_str(),
            dest.as_str(),
            "--source",
            source.as_str(),
            "--no-cache",
        ];
        args.extend_from_slice(extra);
        pkgmirror(self.home.path(), &args)
    }

    fn published(&self) -> Vec<String> {
        published(&self.home.path().join("dest"))
    }
}

mod mirror_command {
    use super::*;

    #[test]
    fn test_mirror_then_already_present() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[]), ("Foo", "1.1.0-beta", &[])]);

        let first = fixture.mirror("Foo", &[]);
        assert!(first.status.success(), "stderr: {}", String::from_utf8_lossy(&first.stderr));
        let stdout = String::from_utf8_lossy(&first.stdout);
        assert!(stdout.contains("Foo 1.0.0 mirrored"), "stdout: {}", stdout);
        assert_eq!(fixture.published(), vec!["Foo 1.0.0"]);

        let second = fixture.mirror("Foo", &[]);
        assert!(second.status.success());
        let stdout = String::from_utf8_lossy(&second.stdout);
        assert!(stdout.contains("already present"));
        assert!(stdout.contains("No packages were mirrored"));
        assert_eq!(fixture.published(), vec!["Foo 1.0.0"]);
    }

    #[test]
    fn test_prerelease_flag() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[]), ("Foo", "1.1.0-beta", &[])]);

        let output = fixture.mirror("Foo", &["--prerelease"]);
        assert!(output.status.success());
        assert_eq!(fixture.published(), vec!["Foo 1.1.0-beta"]);
    }

    #[test]
    fn test_dependencies_mirrored() {
        let fixture = Fixture::new(&[("App", "2.0.0", &["Lib"]), ("Lib", "1.0.0", &[])]);

        let output = fixture.mirror("App", &[]);
        assert!(output.status.success());
        assert_eq!(fixture.published(), vec!["App 2.0.0", "Lib 1.0.0"]);
    }

    #[test]
    fn test_ignore_dependencies() {
        let fixture = Fixture::new(&[("App", "2.0.0", &["Lib"]), ("Lib", "1.0.0", &[])]);

        let output = fixture.mirror("App", &["--ignore-dependencies"]);
        assert!(output.status.success());
        assert_eq!(fixture.published(), vec!["App 2.0.0"]);
    }

    #[test]
    fn test_simulate_publishes_nothing() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[])]);

        let output = fixture.mirror("Foo", &["--simulate"]);
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("Would mirror 1 package(s)"));
        assert!(fixture.published().is_empty());

        let noop = fixture.mirror("Foo", &["--noop"]);
        assert!(noop.status.success());
        assert!(fixture.published().is_empty());
    }

    #[test]
    fn test_manifest_list() {
        let fixture = Fixture::new(&[
            ("Foo", "1.0.0", &[]),
            ("Bar", "2.0.0-beta", &[]),
            ("Baz", "1.2.0", &[]),
            ("Baz", "1.3.0", &[]),
        ]);
        let manifest = fixture.home.path().join("packages.yaml");
        std::fs::write(
            &manifest,
            "packages:\n  - id: Bar\n    version: 2.0.0-beta\n  - id: Baz\n    version: \"~1.2\"\n  - id: Foo\n",
        )
        .unwrap();

        let output = fixture.mirror(&manifest.display().to_string(), &[]);
        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
        assert_eq!(
            fixture.published(),
            vec!["Bar 2.0.0-beta", "Baz 1.2.0", "Foo 1.0.0"]
        );
    }

    #[test]
    fn test_unknown_package_warns_and_succeeds() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[])]);

        let output = fixture.mirror("Nope", &[]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("not found"));
        assert!(stdout.contains("No packages were mirrored"));
    }
}

mod failures {
    use super::*;

    #[test]
    fn test_version_with_manifest_is_usage_error() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[])]);

        let output = fixture.mirror("packages.yaml", &["--version", "1.0.0"]);
        assert_eq!(output.status.code(), Some(64));
        assert!(fixture.published().is_empty());
    }

    #[test]
    fn test_missing_manifest() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[])]);
        let manifest = fixture.path("missing.packages.yaml");

        let output = fixture.mirror(&manifest, &[]);
        assert_eq!(output.status.code(), Some(4));
    }

    #[test]
    fn test_missing_source_directory() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[])]);
        let dest = fixture.path("dest");
        let missing = fixture.path("nowhere");

        let output = pkgmirror(
            fixture.home.path(),
            &["mirror", "Foo", &dest, &dest, "-s", &missing, "--no-cache"],
        );
        assert_eq!(output.status.code(), Some(6));
    }

    #[test]
    fn test_unsupported_scheme() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[])]);
        let dest = fixture.path("dest");

        let output = pkgmirror(
            fixture.home.path(),
            &["mirror", "Foo", &dest, &dest, "-s", "ftp://feeds.example.com", "--no-cache"],
        );
        assert_eq!(output.status.code(), Some(6));
    }

    #[test]
    fn test_no_sources_configured() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[])]);
        let dest = fixture.path("dest");

        let output = pkgmirror(fixture.home.path(), &["mirror", "Foo", &dest, &dest, "--no-cache"]);
        assert_eq!(output.status.code(), Some(64));
    }
}

mod configuration {
    use super::*;

    #[test]
    fn test_configured_feed_name() {
        let fixture = Fixture::new(&[("Foo", "1.0.0", &[])]);
        let config = fixture.home.path().join("mirror.yaml");
        std::fs::write(
            &config,
            format!(
                "apiVersion: v1\nfeeds:\n  - name: internal\n    url: {}\n",
                fixture.path("source")
            ),
        )
        .unwrap();
        let dest = fixture.path("dest");
        let config = config.display().to_string();

        let named = pkgmirror(
            fixture.home.path(),
            &["mirror", "Foo", &dest, &dest, "-s", "internal", "--config", &config, "--no-cache"],
        );
        assert!(named.status.success(), "stderr: {}", String::from_utf8_lossy(&named.stderr));
        assert_eq!(fixture.published(), vec!["Foo 1.0.0"]);

        // Configured feeds are the default sources
        let defaulted = pkgmirror(
            fixture.home.path(),
            &["mirror", "Foo", &dest, &dest, "--config", &config, "--no-cache"],
        );
        assert!(defaulted.status.success());
        assert!(String::from_utf8_lossy(&defaulted.stdout).contains("already present"));
    }
}
