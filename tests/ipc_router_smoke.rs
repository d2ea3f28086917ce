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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn result_of(value: &serde_json::Value) -> serde_json::Value {
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "request failed: {}",
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("attendanced-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));

    // Everything but health needs a workspace first.
    let early = request(&mut stdin, &mut reader, "1b", "slots.list", json!({}));
    assert_eq!(
        early
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("no_workspace")
    );

    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    ));

    let group = result_of(&request(
        &mut stdin,
        &mut reader,
        "3",
        "groups.create",
        json!({ "name": "8D" }),
    ));
    let group_id = group.get("id").and_then(|v| v.as_str()).expect("group id");

    let subject = result_of(&request(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.create",
        json!({ "name": "Mathematics" }),
    ));
    let subject_id = subject.get("id").and_then(|v| v.as_str()).expect("subject id");

    let teacher = result_of(&request(
        &mut stdin,
        &mut reader,
        "5",
        "users.create",
        json!({ "firstName": "Grace", "lastName": "Hopper", "role": "teacher" }),
    ));
    let teacher_id = teacher
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("teacher id");

    let student = result_of(&request(
        &mut stdin,
        &mut reader,
        "6",
        "users.create",
        json!({
            "firstName": "Alan",
            "lastName": "Turing",
            "role": "student",
            "groupId": group_id
        }),
    ));
    let student_id = student
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("student id");

    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "7",
        "users.list",
        json!({ "role": "student", "groupId": group_id }),
    ));
    let _ = result_of(&request(&mut stdin, &mut reader, "7b", "groups.list", json!({})));
    let _ = result_of(&request(&mut stdin, &mut reader, "7c", "subjects.list", json!({})));

    let created = result_of(&request(
        &mut stdin,
        &mut reader,
        "8",
        "slots.create",
        json!({
            "subjectId": subject_id,
            "groupId": group_id,
            "teacherId": teacher_id,
            "dayOfWeek": "mon",
            "startTime": "09:00",
            "endTime": "10:30",
            "classroom": "205",
            "weekParity": "all"
        }),
    ));
    let slot_id = created
        .get("slot")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("slot id")
        .to_string();

    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "9",
        "slots.list",
        json!({ "teacherId": teacher_id }),
    ));
    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "10",
        "slots.get",
        json!({ "slotId": slot_id }),
    ));
    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "11",
        "slots.checkConflict",
        json!({
            "subjectId": subject_id,
            "groupId": group_id,
            "teacherId": teacher_id,
            "dayOfWeek": "tue",
            "startTime": "09:00",
            "endTime": "10:30",
            "classroom": "205"
        }),
    ));

    // 2025-09-01 is a Monday.
    let day = result_of(&request(
        &mut stdin,
        &mut reader,
        "12",
        "sessions.forDate",
        json!({ "groupId": group_id, "date": "2025-09-01" }),
    ));
    let sessions = day
        .get("sessions")
        .and_then(|v| v.as_array())
        .expect("sessions");
    assert_eq!(sessions.len(), 1);

    let updated = result_of(&request(
        &mut stdin,
        &mut reader,
        "13",
        "sessions.update",
        json!({
            "recurringSlotId": slot_id,
            "date": "2025-09-01",
            "topic": "Induction"
        }),
    ));
    let session_id = updated
        .get("session")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("session id")
        .to_string();

    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "14",
        "sessions.get",
        json!({ "sessionId": session_id }),
    ));

    let marked = result_of(&request(
        &mut stdin,
        &mut reader,
        "15",
        "attendance.bulkMark",
        json!({
            "sessionId": session_id,
            "markedBy": teacher_id,
            "entries": [{ "studentId": student_id, "status": "present" }]
        }),
    ));
    assert_eq!(
        marked
            .get("results")
            .and_then(|v| v.as_array())
            .map(|v| v.len()),
        Some(1)
    );

    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "16",
        "attendance.sessionStats",
        json!({ "sessionId": session_id }),
    ));
    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "17",
        "attendance.studentStats",
        json!({ "studentId": student_id, "from": "2025-09-01", "to": "2026-06-30" }),
    ));
    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "18",
        "attendance.sheet",
        json!({ "sessionId": session_id }),
    ));
    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "19",
        "sessions.complete",
        json!({ "sessionId": session_id }),
    ));
    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "20",
        "sessions.cancel",
        json!({ "sessionId": session_id, "canceled": false }),
    ));
    let _ = result_of(&request(
        &mut stdin,
        &mut reader,
        "21",
        "slots.delete",
        json!({ "slotId": slot_id }),
    ));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
