//! Integration tests for gorun

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A `go` stand-in: records each build and emits a shell script that
    /// prints its arguments.
    const FAKE_GO: &str = r#"#!/bin/sh
echo build >> "$GORUN_TEST_LOG"
out=""
prev=""
for a in "$@"; do
    if [ "$prev" = "-o" ]; then out="$a"; fi
    prev="$a"
done
printf '#!/bin/sh\nfor a in "$@"; do echo "arg:$a"; done\n' > "$out"
chmod 755 "$out"
"#;

    struct Sandbox {
        dir: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = dir.path();

            let bin = root.join("go").join("bin");
            fs::create_dir_all(&bin).unwrap();
            fs::write(bin.join("go"), FAKE_GO).unwrap();
            fs::set_permissions(bin.join("go"), fs::Permissions::from_mode(0o755)).unwrap();

            let tmp = root.join("tmp");
            fs::create_dir(&tmp).unwrap();
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o700)).unwrap();

            let config = format!(
                "[cache]\ntemp_dir = {:?}\n\n[toolchain]\ngo_root = {:?}\n\n[toolchain.env]\nGORUN_TEST_LOG = {:?}\n",
                tmp,
                root.join("go"),
                root.join("builds.log"),
            );
            fs::write(root.join("config.toml"), config).unwrap();

            Self { dir }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn source(&self, name: &str, content: &str) -> PathBuf {
            let path = self.path().join(name);
            fs::write(&path, content).unwrap();
            path
        }

        fn builds(&self) -> usize {
            fs::read_to_string(self.path().join("builds.log"))
                .map(|log| log.lines().count())
                .unwrap_or(0)
        }

        fn gorun(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("gorun");
            cmd.env("GORUN_CONFIG", self.path().join("config.toml"))
                .env_remove("GORUN_ARGS");
            cmd
        }
    }

    fn gorun() -> Command {
        let mut cmd = cargo_bin_cmd!("gorun");
        cmd.env_remove("GORUN_ARGS");
        cmd
    }

    #[test]
    fn help_displays() {
        gorun()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Script-like runner for Go source files"));
    }

    #[test]
    fn version_displays() {
        gorun()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("gorun"));
    }

    #[test]
    fn completions_print_script() {
        gorun()
            .args(["--completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("gorun"));
    }

    #[test]
    fn missing_source_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .gorun()
            .arg(sandbox.path().join("absent.go"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to resolve source file"));
    }

    #[test]
    fn no_run_without_action() {
        let sandbox = Sandbox::new();
        let src = sandbox.source("hello.go", "package main\n");
        sandbox
            .gorun()
            .arg("--no-run")
            .arg(&src)
            .assert()
            .success()
            .stderr(predicate::str::contains("nothing else specified"));
        assert_eq!(sandbox.builds(), 0);
    }

    #[test]
    fn runs_and_reuses_cached_binary() {
        let sandbox = Sandbox::new();
        let src = sandbox.source("hello", "#!/usr/bin/env gorun\npackage main\n");

        for _ in 0..2 {
            sandbox
                .gorun()
                .arg(&src)
                .args(["--flag", "-v", "two words"])
                .assert()
                .success()
                .stdout("arg:--flag\narg:-v\narg:two words\n");
        }

        assert_eq!(sandbox.builds(), 1);
    }

    #[test]
    fn touched_source_is_rebuilt() {
        let sandbox = Sandbox::new();
        let src = sandbox.source("hello.go", "package main\n");
        sandbox.gorun().arg(&src).assert().success();

        let later = filetime::FileTime::from_unix_time(4_000_000_000, 0);
        filetime::set_file_mtime(&src, later).unwrap();
        sandbox.gorun().arg(&src).assert().success();
        sandbox.gorun().arg(&src).assert().success();

        assert_eq!(sandbox.builds(), 2);
    }

    #[test]
    fn options_from_environment() {
        let sandbox = Sandbox::new();
        let src = sandbox.source("hello.go", "package main\n");
        sandbox
            .gorun()
            .env("GORUN_ARGS", "--no-run")
            .arg(&src)
            .assert()
            .success();
        assert_eq!(sandbox.builds(), 0);
    }

    #[test]
    fn failed_build_reports_error() {
        let sandbox = Sandbox::new();
        let go = sandbox.path().join("go").join("bin").join("go");
        fs::write(&go, "#!/bin/sh\necho 'hello.go:1: syntax error' >&2\nexit 1\n").unwrap();
        let src = sandbox.source("hello.go", "package main\n");

        sandbox
            .gorun()
            .arg(&src)
            .assert()
            .failure()
            .stderr(predicate::str::contains("syntax error"))
            .stderr(predicate::str::contains("Failed to run go"));
    }

    #[test]
    fn extract_and_diff() {
        let sandbox = Sandbox::new();
        let src = sandbox.source(
            "hello.go",
            "// go.mod >>>\n// module hello\n// <<< go.mod\npackage main\n",
        );

        sandbox
            .gorun()
            .args(["--diff", "--no-run"])
            .arg(&src)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Diffs found"));

        sandbox
            .gorun()
            .args(["--extract", "--no-run"])
            .arg(&src)
            .assert()
            .success();
        assert_eq!(
            fs::read_to_string(sandbox.path().join("go.mod")).unwrap(),
            "module hello\n"
        );

        sandbox
            .gorun()
            .args(["--diff", "--no-run"])
            .arg(&src)
            .assert()
            .success();
    }

    #[test]
    fn embed_writes_sections() {
        let sandbox = Sandbox::new();
        let src = sandbox.source("hello.go", "package main\n");
        fs::write(sandbox.path().join("go.mod"), "module hello\n").unwrap();

        sandbox
            .gorun()
            .args(["--embed", "--no-run", "--embed-ignore-regex", "^/nonexistent/"])
            .arg(&src)
            .assert()
            .success();

        let content = fs::read_to_string(&src).unwrap();
        assert!(content.starts_with("// go.mod >>>\n// module hello\n// <<< go.mod\n"));
    }

    #[test]
    fn untrusted_cache_root_is_skipped() {
        let sandbox = Sandbox::new();
        let src = sandbox.source("hello.go", "package main\n");
        sandbox.gorun().arg(&src).assert().success();

        // Loosen the trusted root; the next run must move elsewhere and rebuild
        let tmp = sandbox.path().join("tmp");
        let first: Vec<_> = fs::read_dir(&tmp).unwrap().flatten().collect();
        assert_eq!(first.len(), 1);
        let platform = fs::read_dir(first[0].path()).unwrap().flatten().next().unwrap();
        fs::set_permissions(platform.path(), fs::Permissions::from_mode(0o755)).unwrap();

        sandbox.gorun().arg(&src).assert().success();

        assert_eq!(fs::read_dir(&tmp).unwrap().count(), 2);
        assert_eq!(sandbox.builds(), 2);
    }
}
