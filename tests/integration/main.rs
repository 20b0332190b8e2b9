//! Integration tests for clibs

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use clibs::cache::ledger::{self, Purpose};
    use clibs::spec::LibSpec;
    use clibs::target::Target;
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const ZLIB_SPEC: &str = r#"
name = "zlib"
version = "1.3.1"
export = "echo CFLAGS=-I$CLIBS_BUILD_DIR/include; echo not-a-pair; echo LDFLAGS=-L$CLIBS_BUILD_DIR/lib -lz"

[git]
repo = "https://github.com/madler/zlib"
ref = "v1.3.1"

[build]
command = "exit 1"
"#;

    const MANIFEST: &str = r#"
[[lib]]
module = "github.com/goplus/clibs/zlib"
path = "libs/zlib"
"#;

    /// Isolated command: no user config, no host target overrides
    fn clibs(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("clibs");
        cmd.current_dir(dir)
            .env("CLIBS_CONFIG", dir.join("config.toml"))
            .env("CLIBS_CACHE_DIR", dir.join("cache"))
            .env_remove("CLIBS_TARGET_OS")
            .env_remove("CLIBS_TARGET_ARCH");
        cmd
    }

    fn project() -> TempDir {
        let root = TempDir::new().unwrap();
        let lib_dir = root.path().join("libs").join("zlib");
        fs::create_dir_all(&lib_dir).unwrap();
        fs::write(lib_dir.join("lib.toml"), ZLIB_SPEC).unwrap();
        fs::write(root.path().join("clibs.toml"), MANIFEST).unwrap();
        // No network in tests
        fs::write(
            root.path().join("config.toml"),
            "[prebuilt]\nrelease_url = \"\"\n[build]\nshell = \"sh\"\n",
        )
        .unwrap();
        root
    }

    /// Mark the linux/amd64 build of zlib as complete
    fn seed_build(root: &Path) -> std::path::PathBuf {
        let lib_dir = root.join("libs").join("zlib");
        let spec = LibSpec::from_dir(&lib_dir).unwrap();
        let build_dir = lib_dir
            .join("_build")
            .join(Target::new("linux", "amd64").triple);
        fs::create_dir_all(&build_dir).unwrap();
        ledger::save(&build_dir, &spec, Purpose::Build).unwrap();
        build_dir
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("fetch, build and cache native C libraries"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("clibs"));
    }

    #[test]
    fn target_plain() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path())
            .args(["target", "--platform", "linux", "--arch", "amd64", "--format", "plain"])
            .assert()
            .success()
            .stdout("x86_64-unknown-linux-gnu\n");
    }

    #[test]
    fn target_json_from_env() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path())
            .env("CLIBS_TARGET_OS", "darwin")
            .env("CLIBS_TARGET_ARCH", "arm64")
            .args(["target", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("arm64-apple-macosx11.0.0"))
            .stdout(predicate::str::contains("-D__APPLE__"));
    }

    #[test]
    fn list_project() {
        let root = project();
        clibs(root.path())
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout("github.com/goplus/clibs/zlib\n");

        clibs(root.path())
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"version\": \"1.3.1\""));
    }

    #[test]
    fn list_without_manifest() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path())
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout("[]\n");
    }

    #[test]
    fn build_reuses_valid_cache() {
        let root = project();
        let build_dir = seed_build(root.path());

        // The build command would fail, so success proves it never ran
        clibs(root.path())
            .args(["build", "--platform", "linux", "--arch", "amd64"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cached build"))
            .stdout(predicate::str::contains(build_dir.display().to_string()));
    }

    #[test]
    fn build_unknown_lib_fails() {
        let root = project();
        clibs(root.path())
            .args(["build", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Library not found: nope"));
    }

    #[test]
    fn build_without_manifest_hints() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path())
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Project manifest not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn export_parses_shell_output() {
        let root = project();
        let build_dir = seed_build(root.path());
        let dir = build_dir.display().to_string();

        clibs(root.path())
            .args(["export", "--platform", "linux", "--arch", "amd64"])
            .assert()
            .success()
            .stdout(format!("CFLAGS=-I{dir}/include\nLDFLAGS=-L{dir}/lib -lz\n"));
    }

    #[test]
    fn export_json() {
        let root = project();
        seed_build(root.path());

        clibs(root.path())
            .args(["export", "zlib", "--platform", "linux", "--arch", "amd64", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"key\": \"CFLAGS\""))
            .stdout(predicate::str::contains("not-a-pair").not());
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[prebuilt]"))
            .stdout(predicate::str::contains("cache"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path()).args(["config", "init"]).assert().success();
        let written = fs::read_to_string(dir.path().join("config.toml")).unwrap();
        assert!(written.contains("release_url"));
    }

    #[test]
    fn completions_bash() {
        let dir = TempDir::new().unwrap();
        clibs(dir.path())
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("clibs"));
    }
}
