use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

fn combined_output(output: &Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn statuslight_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_statuslight").expect("statuslight test binary not built")
}

fn empty_config_dir(label: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("statuslight_cli_{label}_{unique}"));
    fs::create_dir_all(&dir).expect("create config dir");
    dir
}

fn statuslight_with_config(label: &str) -> Command {
    let mut cmd = Command::new(statuslight_bin());
    cmd.env_remove("SL_LED")
        .env_remove("SL_NO_LED")
        .env_remove("SL_CONFIG_DIR")
        .env("SL_NO_LOGS", "1")
        .arg("--config-dir")
        .arg(empty_config_dir(label));
    cmd
}

fn statuslight(label: &str) -> Command {
    let mut cmd = statuslight_with_config(label);
    cmd.arg("--no-led");
    cmd
}

/// A `--led` command that appends each invocation's arguments to a file.
fn recording_led(label: &str) -> (String, PathBuf) {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("statuslight_cli_led_{label}_{unique}.txt"));
    let led = format!("sh -c 'echo \"$*\" >> {}' led", path.display());
    (led, path)
}

fn led_calls(path: &Path) -> Vec<String> {
    let calls = fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect();
    let _ = fs::remove_file(path);
    calls
}

#[test]
fn help_mentions_name() {
    let output = Command::new(statuslight_bin())
        .arg("--help")
        .output()
        .expect("run statuslight --help");
    assert!(output.status.success());
    assert!(combined_output(&output).contains("StatusLight"));
}

#[test]
fn exit_code_of_wrapped_command_is_returned() {
    let output = statuslight("exit")
        .args(["sh", "-c", "exit 3"])
        .output()
        .expect("run statuslight");
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn child_output_is_relayed() {
    let output = statuslight("relay")
        .args(["sh", "-c", "printf 'hello from child\\n'"])
        .output()
        .expect("run statuslight");
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("hello from child"));
}

#[test]
fn missing_command_exits_127() {
    let output = statuslight("missing")
        .arg("statuslight-definitely-missing-command")
        .output()
        .expect("run statuslight");
    assert_eq!(output.status.code(), Some(127));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to spawn"), "stderr: {stderr}");
}

#[test]
fn out_of_range_tick_is_a_usage_error() {
    let output = statuslight("tick")
        .args(["--tick-ms", "5", "true"])
        .output()
        .expect("run statuslight");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--tick-ms"));
}

#[test]
fn missing_command_argument_is_a_usage_error() {
    let output = Command::new(statuslight_bin())
        .arg("--no-led")
        .output()
        .expect("run statuslight");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn indicator_is_switched_off_when_spawn_fails() {
    let (led, path) = recording_led("spawn");
    let output = statuslight_with_config("led_spawn")
        .args(["--led", &led, "statuslight-definitely-missing-command"])
        .output()
        .expect("run statuslight");
    assert_eq!(output.status.code(), Some(127));
    let calls = led_calls(&path);
    assert_eq!(calls.last().map(String::as_str), Some("o"), "calls: {calls:?}");
}

#[test]
fn indicator_goes_off_after_child_exits_while_waiting() {
    let (led, path) = recording_led("waiting");
    let output = statuslight_with_config("led_waiting")
        .args(["--led", &led, "sh", "-c", "printf 'Continue? (y/n)'; sleep 0.5; exit 4"])
        .output()
        .expect("run statuslight");
    assert_eq!(output.status.code(), Some(4));
    let calls = led_calls(&path);
    assert!(calls.iter().any(|call| call == "a 255 0 0"), "calls: {calls:?}");
    assert_eq!(calls.last().map(String::as_str), Some("o"), "calls: {calls:?}");
}

#[test]
fn piped_stdin_eof_ends_the_child_input() {
    let mut child = statuslight("stdin_eof")
        .arg("cat")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn statuslight");
    {
        let mut stdin = child.stdin.take().expect("stdin");
        stdin.write_all(b"hi\n").expect("write stdin");
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().expect("poll statuslight") {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("statuslight did not exit after stdin closed");
        }
        thread::sleep(Duration::from_millis(20));
    };
    assert_eq!(status.code(), Some(0));
}
