#![cfg(unix)]
//! Launcher and identity tests against a scripted stand-in for `wine64`.
//!
//! The fake runtime answers the `winedbg`, `winepath`, and `reg` invocations
//! with canned output, prints its environment for `env`, and writes mixed
//! valid and invalid UTF-8 to stderr for `noisy`.

use compatool_catalog::{DxvkVersion, GraphicsSettings, NvapiVersion, RuntimeSettings};
use compatool_runtime::{
    EnvironmentComposer, HostEnv, IdentityResolver, Invocation, LogSink, PathDirection,
    ProcessLauncher, RunOptions, RuntimeError, WineBinaries,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const FAKE_WINE64: &str = r#"#!/bin/sh
case "$1" in
  winedbg)
    case "$3" in
      "info proc")
        printf ' pid      threads  executable (all id:s are in hex)\n'
        printf " 00000020 12       'services.exe'\n"
        printf " 00000128 41       'ffxiv_dx11.exe'\n"
        ;;
      "info procmap")
        printf ' pid      unix pid\n'
        printf ' 00001a2b 00003344\n'
        ;;
    esac
    ;;
  winepath)
    if [ "$2" = "--windows" ]; then
      printf 'fixme:winepath:noise\nZ:\\games\\ffxiv\n'
    else
      printf '/games/ffxiv\n'
    fi
    ;;
  env)
    env
    ;;
  pwd)
    pwd
    ;;
  noisy)
    printf 'first line\n\377\376broken\nsecond line\n' >&2
    ;;
  fail)
    exit 3
    ;;
esac
"#;

const FAKE_WINESERVER: &str = r#"#!/bin/sh
echo "$WINEPREFIX $1" > "$(dirname "$0")/server.log"
"#;

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn fake_bin(dir: &Path) -> std::path::PathBuf {
    let bin = dir.join("bin");
    fs::create_dir_all(&bin).unwrap();
    write_script(&bin.join("wine64"), FAKE_WINE64);
    write_script(&bin.join("wineserver"), FAKE_WINESERVER);
    bin
}

fn launcher(dir: &Path) -> ProcessLauncher {
    let bin = fake_bin(dir);
    let runtime = RuntimeSettings::custom(&bin, dir.join("prefix"))
        .with_debug_flags("-all")
        .with_sync(true, false);
    let graphics = GraphicsSettings::new(DxvkVersion::Stable, NvapiVersion::Disabled);
    ProcessLauncher::new(
        WineBinaries::new(&bin),
        EnvironmentComposer::new(runtime, graphics),
    )
    .with_host_env(HostEnv::default())
}

fn env_lines(output: &str) -> Vec<&str> {
    output.lines().collect()
}

#[test]
fn child_sees_composed_environment() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(dir.path());
    let overrides = vec![("WINEFSYNC".to_owned(), "1".to_owned())];

    let mut handle = launcher
        .run(
            &Invocation::args(["env"]),
            None,
            &overrides,
            RunOptions::default().with_stdout(),
        )
        .unwrap();
    let out = handle.read_stdout().unwrap();
    assert!(handle.wait().unwrap().success());

    let lines = env_lines(&out);
    assert!(lines.contains(&"WINEESYNC=1"));
    assert!(lines.contains(&"WINEFSYNC=1"));
    assert!(lines.contains(&"XL_WINEONLINUX=true"));
    assert!(lines.contains(&"WINEDEBUG=-all"));
    let prefix = format!("WINEPREFIX={}", dir.path().join("prefix").display());
    assert!(lines.contains(&prefix.as_str()));
}

#[test]
fn working_directory_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(dir.path());
    let work = dir.path().join("game");
    fs::create_dir_all(&work).unwrap();

    let mut handle = launcher
        .run(
            &Invocation::args(["pwd"]),
            Some(&work),
            &[],
            RunOptions::default().with_stdout(),
        )
        .unwrap();
    let out = handle.read_stdout().unwrap();
    handle.wait().unwrap();
    assert_eq!(
        Path::new(out.trim()).canonicalize().unwrap(),
        work.canonicalize().unwrap()
    );
}

#[test]
fn stderr_is_relayed_and_bad_lines_counted() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("logs/wine.log");
    let launcher = launcher(dir.path()).with_log_sink(LogSink::file(&log).unwrap());

    let mut handle = launcher
        .run(
            &Invocation::args(["noisy"]),
            None,
            &[],
            RunOptions::default().with_stderr_log(),
        )
        .unwrap();
    handle.wait().unwrap();

    let stats = handle.relay_stats().unwrap();
    assert_eq!(stats.relayed, 2);
    assert_eq!(stats.dropped, 1);
    assert_eq!(
        fs::read_to_string(&log).unwrap(),
        "first line\nsecond line\n"
    );
}

#[test]
fn exit_status_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = launcher(dir.path())
        .run(&Invocation::args(["fail"]), None, &[], RunOptions::default())
        .unwrap();
    assert_eq!(handle.wait().unwrap().code(), Some(3));
}

#[test]
fn missing_server_blocks_launch() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_bin(dir.path());
    fs::remove_file(bin.join("wineserver")).unwrap();

    let err = launcher_for_bin(&bin, dir.path())
        .run(&Invocation::args(["env"]), None, &[], RunOptions::default())
        .unwrap_err();
    match err {
        RuntimeError::MissingBinary { binary, searched } => {
            assert_eq!(binary, "wineserver");
            assert_eq!(searched, bin);
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn launcher_for_bin(bin: &Path, dir: &Path) -> ProcessLauncher {
    let runtime = RuntimeSettings::custom(bin, dir.join("prefix"));
    ProcessLauncher::new(
        WineBinaries::new(bin),
        EnvironmentComposer::new(runtime, GraphicsSettings::default()),
    )
    .with_host_env(HostEnv::default())
}

#[test]
fn non_executable_entry_point_is_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_bin(dir.path());
    fs::set_permissions(bin.join("wine64"), fs::Permissions::from_mode(0o644)).unwrap();

    let err = launcher_for_bin(&bin, dir.path())
        .run(&Invocation::args(["env"]), None, &[], RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Spawn { .. }));
}

#[test]
fn identity_lists_processes_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(dir.path());
    let resolver = IdentityResolver::new(&launcher);
    assert_eq!(
        resolver.list_processes_by_name("ffxiv_dx11.exe").unwrap(),
        vec![0x128]
    );
    assert!(resolver.list_processes_by_name("notepad.exe").unwrap().is_empty());
}

#[test]
fn identity_resolves_host_pid() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(dir.path());
    let resolver = IdentityResolver::new(&launcher);
    assert_eq!(resolver.resolve_host_pid(0x1a2b).unwrap(), Some(0x3344));
    assert_eq!(resolver.resolve_host_pid(0x20).unwrap(), None);
}

#[test]
fn identity_translates_paths_both_ways() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(dir.path());
    let resolver = IdentityResolver::new(&launcher);
    assert_eq!(
        resolver
            .path_translate(Path::new("/games/ffxiv"), PathDirection::ToWindows)
            .unwrap()
            .as_deref(),
        Some(r"Z:\games\ffxiv")
    );
    assert_eq!(
        resolver
            .path_translate(Path::new(r"Z:\games\ffxiv"), PathDirection::ToUnix)
            .unwrap()
            .as_deref(),
        Some("/games/ffxiv")
    );
}

#[test]
fn server_gets_prefix_variable() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(dir.path());
    let mut handle = launcher.run_server(&["-k"]).unwrap();
    handle.wait().unwrap();
    let log = fs::read_to_string(dir.path().join("bin/server.log")).unwrap();
    assert_eq!(
        log.trim(),
        format!("{} -k", dir.path().join("prefix").display())
    );
}

#[tokio::test]
async fn wait_async_returns_status() {
    let dir = tempfile::tempdir().unwrap();
    let handle = launcher(dir.path())
        .run(&Invocation::args(["fail"]), None, &[], RunOptions::default())
        .unwrap();
    let (status, _handle) = handle.wait_async().await.unwrap();
    assert_eq!(status.code(), Some(3));
}
