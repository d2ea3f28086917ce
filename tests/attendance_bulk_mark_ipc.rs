use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

struct Fixture {
    slot_id: String,
    teacher_id: String,
    student_ids: Vec<String>,
}

fn setup(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
    student_count: usize,
) -> Fixture {
    let _ = request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let group = request_ok(stdin, reader, "s2", "groups.create", json!({ "name": "8D" }));
    let group_id = group
        .get("id")
        .and_then(|v| v.as_str())
        .expect("group id")
        .to_string();
    let teacher = request_ok(
        stdin,
        reader,
        "s3",
        "users.create",
        json!({ "firstName": "Grace", "lastName": "Hopper", "role": "teacher" }),
    );
    let teacher_id = teacher
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("teacher id")
        .to_string();

    let mut student_ids = Vec::new();
    for i in 0..student_count {
        let student = request_ok(
            stdin,
            reader,
            &format!("stu{}", i),
            "users.create",
            json!({
                "firstName": format!("Student{}", i),
                "lastName": format!("Surname{:02}", i),
                "role": "student",
                "groupId": group_id
            }),
        );
        student_ids.push(
            student
                .get("user")
                .and_then(|u| u.get("id"))
                .and_then(|v| v.as_str())
                .expect("student id")
                .to_string(),
        );
    }

    let created = request_ok(
        stdin,
        reader,
        "s4",
        "slots.create",
        json!({
            "subjectId": "sub-math",
            "groupId": group_id,
            "teacherId": teacher_id,
            "dayOfWeek": "mon",
            "startTime": "09:00",
            "endTime": "10:30",
            "classroom": "205",
            "weekParity": "all"
        }),
    );
    let slot_id = created
        .get("slot")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("slot id")
        .to_string();

    Fixture {
        slot_id,
        teacher_id,
        student_ids,
    }
}

#[test]
fn rate_is_eighty_for_six_present_two_late_one_absent_one_excused() {
    let workspace = temp_dir("attendanced-rate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup(&mut stdin, &mut reader, &workspace, 10);

    let mut entries = Vec::new();
    for (i, student_id) in fx.student_ids.iter().enumerate() {
        let status = match i {
            0..=5 => "present",
            6 | 7 => "late",
            8 => "absent",
            _ => "excused",
        };
        entries.push(json!({ "studentId": student_id, "status": status }));
    }

    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.bulkMark",
        json!({
            "recurringSlotId": fx.slot_id,
            "date": "2025-09-01",
            "markedBy": fx.teacher_id,
            "entries": entries
        }),
    );
    let session_id = marked
        .get("sessionId")
        .and_then(|v| v.as_str())
        .expect("session id")
        .to_string();
    let results = marked
        .get("results")
        .and_then(|v| v.as_array())
        .expect("results");
    assert_eq!(results.len(), 10);
    assert!(results
        .iter()
        .all(|r| r.get("ok").and_then(|v| v.as_bool()) == Some(true)));

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.sessionStats",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(stats.get("total").and_then(|v| v.as_u64()), Some(10));
    assert_eq!(stats.get("present").and_then(|v| v.as_u64()), Some(6));
    assert_eq!(stats.get("late").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(stats.get("absent").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(stats.get("excused").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(stats.get("rate").and_then(|v| v.as_f64()), Some(80.0));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn remarking_upserts_in_place_and_reports_unknown_students() {
    let workspace = temp_dir("attendanced-upsert");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let fx = setup(&mut stdin, &mut reader, &workspace, 1);
    let student_id = fx.student_ids[0].clone();

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.bulkMark",
        json!({
            "recurringSlotId": fx.slot_id,
            "date": "2025-09-01",
            "markedBy": fx.teacher_id,
            "entries": [
                { "studentId": student_id, "status": "absent" },
                { "studentId": "no-such-student", "status": "present" }
            ]
        }),
    );
    let session_id = first
        .get("sessionId")
        .and_then(|v| v.as_str())
        .expect("session id")
        .to_string();
    let results = first.get("results").and_then(|v| v.as_array()).expect("results");
    assert_eq!(results[0].get("ok").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(results[1].get("ok").and_then(|v| v.as_bool()), Some(false));
    assert!(results[1]
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .contains("not found"));

    // Marking again flips the status without creating a second mark.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.bulkMark",
        json!({
            "sessionId": session_id,
            "markedBy": fx.teacher_id,
            "entries": [{ "studentId": student_id, "status": "late" }]
        }),
    );

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.sessionStats",
        json!({ "sessionId": session_id }),
    );
    assert_eq!(stats.get("total").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(stats.get("late").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(stats.get("absent").and_then(|v| v.as_u64()), Some(0));

    let sheet = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.sheet",
        json!({ "sessionId": session_id }),
    );
    let rows = sheet.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("status").and_then(|v| v.as_str()), Some("late"));

    let student_stats = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.studentStats",
        json!({ "studentId": student_id }),
    );
    assert_eq!(student_stats.get("total").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(
        student_stats.get("rate").and_then(|v| v.as_f64()),
        Some(100.0)
    );

    let _ = std::fs::remove_dir_all(workspace);
}
