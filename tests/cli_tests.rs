//! Runs the `hellodrkey` binary end to end.

use std::process::{Command, Output};

const HELLODRKEY: &str = env!("CARGO_BIN_EXE_hellodrkey");

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn invalid_src_prints_error_and_usage() {
    let output = Command::new(HELLODRKEY)
        .args(["--src", "bogus"])
        .env_remove("DRKEY_SCIOND_ADDR")
        .output()
        .expect("failed to run hellodrkey");

    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("no valid SCION address: \"bogus\""), "{stdout}");
    assert!(stdout.contains("--src"), "usage missing: {stdout}");
}

#[test]
fn invalid_dst_host_prints_error() {
    let output = Command::new(HELLODRKEY)
        .args(["--dst", "1-ff00:0:112,[not-a-host]"])
        .output()
        .expect("failed to run hellodrkey");

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).contains("invalid IP address string: not-a-host"));
}

#[test]
fn help_documents_double_dash_flags() {
    let output = Command::new(HELLODRKEY)
        .arg("--help")
        .output()
        .expect("failed to run hellodrkey");

    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("two dashes"), "{stdout}");
    for flag in ["--client", "--server", "--sciond", "--src", "--dst"] {
        assert!(stdout.contains(flag), "{flag} missing: {stdout}");
    }
}

#[test]
fn single_dash_flag_is_a_usage_error() {
    let output = Command::new(HELLODRKEY)
        .arg("-client")
        .output()
        .expect("failed to run hellodrkey");

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn unreachable_daemon_is_fatal() {
    let output = Command::new(HELLODRKEY)
        .args(["--client", "--sciond", "127.0.0.1:9"])
        .output()
        .expect("failed to run hellodrkey");

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).starts_with("Fatal error: "));
}

#[cfg(feature = "daemon")]
mod with_daemon {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::net::TcpListener;

    use drkey::daemon::{serve, AppState};
    use drkey::drkey::issuer::KeyIssuer;
    use drkey::drkey::EpochSchedule;

    use super::{stdout_of, HELLODRKEY};

    async fn spawn_test_daemon() -> String {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("failed to bind");
        let addr = listener.local_addr().unwrap();

        let schedule = EpochSchedule::new(Duration::from_secs(86_400)).unwrap();
        let state = AppState::new(KeyIssuer::new(vec![0x5e; 32], schedule));
        tokio::spawn(async move {
            serve(listener, state).await.expect("daemon failed");
        });

        addr.to_string()
    }

    async fn run_hellodrkey(args: &[&str]) -> std::process::Output {
        tokio::process::Command::new(HELLODRKEY)
            .args(args)
            .output()
            .await
            .expect("failed to run hellodrkey")
    }

    fn count_prefix(stdout: &str, prefix: &str) -> usize {
        stdout.lines().filter(|l| l.starts_with(prefix)).count()
    }

    fn key_of(stdout: &str, prefix: &str) -> String {
        let line = stdout
            .lines()
            .find(|l| l.starts_with(prefix))
            .expect("line missing");
        line[prefix.len()..]
            .split(',')
            .next()
            .unwrap()
            .to_string()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_role_flag_runs_both_roles_once() {
        let addr = spawn_test_daemon().await;
        let output = run_hellodrkey(&["--sciond", &addr]).await;

        let stdout = stdout_of(&output);
        assert!(output.status.success(), "{stdout}");
        assert_eq!(count_prefix(&stdout, "Client: key = "), 1, "{stdout}");
        assert_eq!(count_prefix(&stdout, "DS key = "), 1, "{stdout}");
        assert_eq!(count_prefix(&stdout, "Next DS key = "), 1, "{stdout}");
        assert_eq!(count_prefix(&stdout, "Prev DS key = "), 1, "{stdout}");
        assert_eq!(count_prefix(&stdout, "Server: key = "), 1, "{stdout}");

        let client = key_of(&stdout, "Client: key = ");
        assert_eq!(client.len(), 32);
        assert_eq!(client, key_of(&stdout, "Server: key = "));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_role_flag_runs_only_that_role() {
        let addr = spawn_test_daemon().await;

        let output = run_hellodrkey(&["--client", "--sciond", &addr]).await;
        let stdout = stdout_of(&output);
        assert!(output.status.success(), "{stdout}");
        assert_eq!(count_prefix(&stdout, "Client: key = "), 1);
        assert_eq!(count_prefix(&stdout, "Server: key = "), 0);

        let output = run_hellodrkey(&["--server", "--sciond", &addr]).await;
        let stdout = stdout_of(&output);
        assert!(output.status.success(), "{stdout}");
        assert_eq!(count_prefix(&stdout, "Client: key = "), 0);
        assert_eq!(count_prefix(&stdout, "Server: key = "), 1);
    }
}
