//! Command-line contract: exit codes, option validation, and end-to-end
//! rendering against a scripted `tmux` placed first on `PATH`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::tempdir;

fn tmux2html_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tmux2html"))
}

const FAKE_TMUX: &str = r#"#!/bin/sh
case "$1" in
  list-windows)
    echo '-,aaaa,80x24,0,0,9'
    echo '*,c0de,20x3,0,0{10x3,0,0,1,9x3,11,0,2}'
    ;;
  capture-pane)
    case "$4" in
      %1) printf '\033[31mleft\033[0m\nline two\n' ;;
      *) printf 'a&<b>\n' ;;
    esac
    ;;
  display-message)
    case "$5" in
      *pane_active*)
        if [ "$4" = "%2" ]; then echo 1,5,0; else echo 0,0,0; fi
        ;;
      *) echo "/3" ;;
    esac
    ;;
  *)
    exit 1
    ;;
esac
"#;

const BROKEN_TMUX: &str = "#!/bin/sh\necho 'no server running' >&2\nexit 3\n";

fn install_tmux(dir: &Path, script: &str) {
    let path = dir.join("tmux");
    fs::write(&path, script).expect("write fake tmux");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake tmux");
    }
}

fn path_with(dir: &Path) -> OsString {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        entries.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(entries).expect("join PATH")
}

fn run(args: &[&str], path: Option<OsString>) -> Output {
    let mut command = Command::new(tmux2html_bin());
    command.args(args).env_remove("TMUX2HTML_LOG");
    if let Some(path) = path {
        command.env("PATH", path);
    }
    command.output().expect("run tmux2html")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn help_lists_modes() {
    let output = run(&["--help"], None);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    for flag in ["--stream", "--interval", "--duration", "--full", "--light"] {
        assert!(text.contains(flag), "missing {flag} in help");
    }
}

#[test]
fn option_conflicts_fail_before_touching_tmux() {
    let empty = tempdir().expect("tempdir");
    let path = Some(empty.path().as_os_str().to_owned());

    let cases: [(&[&str], &str); 5] = [
        (&["--stream"], "--stream requires --output"),
        (&["--stream", "-o", "x.html", "--full"], "--stream cannot be combined with --full"),
        (&["--duration", "1", "--full"], "--duration cannot be combined with --full"),
        (&["--stream", "-o", "x.html", "--duration", "1"], "--stream cannot be combined with --duration"),
        (&["--interval", "0"], "--interval must be a positive number"),
    ];
    for (args, message) in cases {
        let output = run(args, path.clone());
        assert_eq!(output.status.code(), Some(1), "{args:?}");
        assert!(stderr(&output).contains(message), "{args:?}: {}", stderr(&output));
    }
}

#[test]
fn missing_tmux_is_reported() {
    let empty = tempdir().expect("tempdir");
    let output = run(&[], Some(empty.path().as_os_str().to_owned()));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("missing dependency command: tmux"));
}

#[cfg(unix)]
#[test]
fn tmux_failure_exit_code_propagates() {
    let tools = tempdir().expect("tempdir");
    install_tmux(tools.path(), BROKEN_TMUX);
    let output = run(&[], Some(path_with(tools.path())));
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("no server running"));
}

#[cfg(unix)]
#[test]
fn snapshot_of_active_window_to_stdout() {
    let tools = tempdir().expect("tempdir");
    install_tmux(tools.path(), FAKE_TMUX);
    let output = run(&[], Some(path_with(tools.path())));
    assert!(output.status.success(), "{}", stderr(&output));

    let page = String::from_utf8_lossy(&output.stdout);
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<div id=\"p1\" class=\"pane\" data-size=\"10,3\">"));
    assert!(page.contains("<div id=\"p2\" class=\"pane\" data-size=\"9,3\">"));
    assert_eq!(page.matches("class=\"sep sep-v\"").count(), 1);
    assert!(page.contains("<span class=\"f1\" data-seq=\"31\">left</span>"));
    assert!(page.contains("a&amp;&lt;b&gt;<span class=\"cur ns\"> </span>"));
    assert!(page.contains("span.f1{color:#800000;}"));
    assert_eq!(page.matches("class=\"cur ").count(), 1);
}

#[cfg(unix)]
#[test]
fn single_pane_to_file_with_mode() {
    use std::os::unix::fs::PermissionsExt;

    let tools = tempdir().expect("tempdir");
    install_tmux(tools.path(), FAKE_TMUX);
    let out_dir = tempdir().expect("tempdir");
    let target = out_dir.path().join("pane.html");
    let target_arg = target.display().to_string();

    let output = run(
        &["1.1", "-o", &target_arg, "-m", "600", "--light"],
        Some(path_with(tools.path())),
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Wrote HTML to:"));

    let page = fs::read_to_string(&target).expect("read output");
    assert!(page.contains("id=\"p2\""));
    assert!(!page.contains("id=\"p1\""));
    assert!(page.contains("body{margin:0;background-color:#fafafa;}"));
    let mode = fs::metadata(&target).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[cfg(unix)]
#[test]
fn out_of_range_pane_is_an_error() {
    let tools = tempdir().expect("tempdir");
    install_tmux(tools.path(), FAKE_TMUX);
    let output = run(&["1.7"], Some(path_with(tools.path())));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("pane index 7 out of range (2 panes)"));
}
