//! Integration tests for the Miniconda bootstrap against a stand-in installer.
//!
//! The "installer" is a small shell script that lays down a `bin/conda`
//! answering `--version`, so the real `SystemExecutor` can drive the whole
//! bootstrap without network access.

#![cfg(unix)]

use conda_env_manager::{
    BootstrapConfig, BootstrapError, BootstrapOutcome, CondaRoot, InstallerFetcher,
    MinicondaBootstrapper, Platform, RuntimeBootstrap,
};
use std::cell::Cell;
use std::path::Path;
use tempfile::tempdir;
use texasbbq_process::fakes::RecordingExecutor;
use texasbbq_process::SystemExecutor;

const FAKE_INSTALLER: &str = r#"#!/bin/sh
# usage: miniconda.sh -b [-u] -p PREFIX
while [ $# -gt 0 ]; do
  case "$1" in
    -p) PREFIX="$2"; shift 2 ;;
    *) shift ;;
  esac
done
mkdir -p "$PREFIX/bin"
cat > "$PREFIX/bin/conda" <<'SCRIPT'
#!/bin/sh
echo "conda 24.1.2"
SCRIPT
chmod +x "$PREFIX/bin/conda"
"#;

struct ScriptFetcher {
    fetched: Cell<usize>,
}

impl InstallerFetcher for ScriptFetcher {
    fn fetch(&self, _url: &str, dest: &Path) -> Result<(), BootstrapError> {
        self.fetched.set(self.fetched.get() + 1);
        std::fs::write(dest, FAKE_INSTALLER)?;
        Ok(())
    }
}

/// Test: calling ensure twice installs exactly once
#[test]
fn test_ensure_twice_installs_once() {
    let dir = tempdir().unwrap();
    let root = CondaRoot::new(dir.path().join("miniconda3"));
    let exec = RecordingExecutor::new(SystemExecutor);
    let fetcher = ScriptFetcher {
        fetched: Cell::new(0),
    };
    let config = BootstrapConfig::new(dir.path().join("miniconda.sh"));
    let boot = MinicondaBootstrapper::new(&root, config, &exec, &fetcher)
        .with_platform(Platform::LinuxX86_64);

    let first = boot.ensure().expect("first ensure failed");
    assert_eq!(
        first,
        BootstrapOutcome::Installed {
            version: "conda 24.1.2".to_string()
        }
    );
    assert!(root.is_installed(), "conda executable should exist");
    let calls_after_first = exec.command_lines().len();
    assert_eq!(calls_after_first, 3, "install, version check, self-update");

    let second = boot.ensure().expect("second ensure failed");
    assert_eq!(second, BootstrapOutcome::AlreadyInstalled);
    assert_eq!(
        exec.command_lines().len(),
        calls_after_first,
        "second ensure must not run any subprocess"
    );
    assert_eq!(fetcher.fetched.get(), 1, "installer downloaded exactly once");
}

/// Test: a broken installer surfaces as a fatal bootstrap error
#[test]
fn test_broken_installer_fails() {
    let dir = tempdir().unwrap();
    let installer = dir.path().join("miniconda.sh");
    std::fs::write(&installer, "#!/bin/sh\necho 'corrupt payload' >&2\nexit 1\n").unwrap();

    let root = CondaRoot::new(dir.path().join("miniconda3"));
    let exec = RecordingExecutor::new(SystemExecutor);
    let fetcher = ScriptFetcher {
        fetched: Cell::new(0),
    };
    let boot = MinicondaBootstrapper::new(&root, BootstrapConfig::new(&installer), &exec, &fetcher);

    let err = boot.ensure().unwrap_err();
    match err {
        BootstrapError::Install(inner) => {
            assert!(inner.captured_output().contains("corrupt payload"));
        }
        other => panic!("expected install error, got {other}"),
    }
    assert!(!root.is_installed());
    assert_eq!(fetcher.fetched.get(), 0, "cached installer is reused");
}
