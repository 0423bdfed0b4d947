use assert_cmd::Command;
use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use speedracer::session::Session;
use speedracer::store::{load_context, save_context, AppContext, SqliteKv};

#[test]
fn export_writes_history_without_a_tty() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state.db");
    let out = dir.path().join("history.csv");

    let start = Utc.with_ymd_and_hms(2024, 3, 5, 9, 7, 0).unwrap();
    let session = Session::new(vec![vec![3, 4], vec![10, -2]], start)
        .record_answer(0, Some(7), 1500, start)
        .record_answer(1, Some(9), 900, start);
    {
        let mut kv = SqliteKv::open(&state).unwrap();
        save_context(
            &mut kv,
            &AppContext {
                sessions: vec![session],
                ..AppContext::default()
            },
        )
        .unwrap();
    }

    Command::cargo_bin("speedracer")
        .unwrap()
        .arg("--state-file")
        .arg(&state)
        .arg("--log-file")
        .arg(dir.path().join("speedracer.log"))
        .arg("--export")
        .arg(&out)
        .assert()
        .success();

    let csv = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",50,1,\"3,4\",7,7,1500"));
    assert!(lines[2].contains(",50,2,\"10,-2\",9,8,900"));
}

#[test]
fn command_line_settings_are_saved() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state.db");

    Command::cargo_bin("speedracer")
        .unwrap()
        .args(["-n", "12", "-d", "2", "--delay-ms", "300"])
        .arg("--state-file")
        .arg(&state)
        .arg("--log-file")
        .arg(dir.path().join("speedracer.log"))
        .arg("--export")
        .arg(dir.path().join("out.csv"))
        .assert()
        .success();

    let ctx = load_context(&SqliteKv::open(&state).unwrap());
    assert_eq!(ctx.config.total_sums, 12);
    assert_eq!(ctx.config.digits, 2);
    assert_eq!(ctx.config.delay_between_questions_ms, 300);
    assert_eq!(ctx.config.questions_each_sum, 4);
}

#[test]
fn invalid_settings_are_rejected() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("speedracer")
        .unwrap()
        .args(["--digits", "0"])
        .arg("--state-file")
        .arg(dir.path().join("state.db"))
        .arg("--log-file")
        .arg(dir.path().join("speedracer.log"))
        .assert()
        .failure();
}

#[test]
fn unreadable_state_file_is_not_fatal() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state.db");
    std::fs::write(&state, "not a database\n".repeat(64)).unwrap();
    let out = dir.path().join("out.csv");

    Command::cargo_bin("speedracer")
        .unwrap()
        .arg("--state-file")
        .arg(&state)
        .arg("--log-file")
        .arg(dir.path().join("speedracer.log"))
        .arg("--export")
        .arg(&out)
        .assert()
        .success();

    assert!(out.exists());
}
