mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar};

#[test]
fn students_create_update_delete_with_enrollments() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let class = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "name": "Algebra I", "subject": "Mathematics", "period": 1 }),
    );
    let code = class["class"]["code"].as_str().expect("code").to_string();
    let class_id = class["class"]["id"].as_i64().expect("class id");
    assert_eq!(code, format!("class{}", class_id));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({
            "studentNumber": "STU001",
            "firstName": "Emma",
            "lastName": "Johnson",
            "email": "emma@school.edu",
            "gradeLevel": 10,
            "classIds": [code.clone()]
        }),
    );
    let student = &created["student"];
    let student_id = student["id"].as_i64().expect("student id");
    assert_eq!(student["classIds"], json!([code.clone()]));
    assert_eq!(student["currentGrade"], json!(0));
    assert_eq!(student["attendanceRate"], json!(100));

    let roster = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.roster",
        json!({ "classId": code.clone() }),
    );
    assert_eq!(roster["class"]["studentIds"], json!([student_id]));
    assert_eq!(roster["students"].as_array().map(|a| a.len()), Some(1));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.update",
        json!({ "id": student_id, "patch": { "gradeLevel": 11, "classIds": [] } }),
    );
    assert_eq!(updated["student"]["gradeLevel"], json!(11));
    assert_eq!(updated["student"]["firstName"], "Emma");
    assert_eq!(updated["student"]["classIds"], json!([]));

    let class_after = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.get",
        json!({ "code": code.clone() }),
    );
    assert_eq!(class_after["class"]["studentIds"], json!([]));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.delete",
        json!({ "id": student_id }),
    );
    assert_eq!(deleted["deleted"]["studentNumber"], "STU001");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "students.delete",
        json!({ "id": student_id }),
    );
    assert_eq!(error["code"], "not_found");

    // Ids are never handed out twice.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.create",
        json!({
            "studentNumber": "STU001",
            "firstName": "Emma",
            "lastName": "Johnson",
            "email": "emma@school.edu",
            "gradeLevel": 10
        }),
    );
    assert!(again["student"]["id"].as_i64().expect("id") > student_id);

    let _ = child.kill();
}

#[test]
fn student_validation_and_duplicate_numbers() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "firstName": "", "email": "nope", "gradeLevel": 13 }),
    );
    assert_eq!(error["code"], "validation_failed");
    let fields = &error["details"]["fields"];
    assert_eq!(fields["firstName"], "First name is required");
    assert_eq!(fields["email"], "Please enter a valid email");
    assert_eq!(fields["gradeLevel"], "Grade level must be between 9 and 12");
    assert!(fields.get("lastName").is_some());
    assert!(fields.get("studentNumber").is_some());

    let base = json!({
        "studentNumber": "STU001",
        "firstName": "Emma",
        "lastName": "Johnson",
        "email": "emma@school.edu",
        "gradeLevel": 10
    });
    let _ = request_ok(&mut stdin, &mut reader, "2", "students.create", base.clone());
    let error = request_err(&mut stdin, &mut reader, "3", "students.create", base);
    assert_eq!(error["code"], "validation_failed");
    assert_eq!(error["details"]["fields"]["studentNumber"], "Student ID already exists");

    let list = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(list["students"].as_array().map(|a| a.len()), Some(1));

    let error = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({
            "studentNumber": "STU002",
            "firstName": "Liam",
            "lastName": "Smith",
            "email": "liam@school.edu",
            "gradeLevel": 11,
            "classIds": ["NOPE"]
        }),
    );
    assert_eq!(error["code"], "not_found");

    let _ = child.kill();
}

#[test]
fn search_and_filter_use_derived_grades() {
    let seed = test_support::fixture_path("fixtures/seed/demo.json");
    let (mut child, mut stdin, mut reader) =
        test_support::spawn_sidecar_with(&["--seed", &seed.to_string_lossy()]);

    let found = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.search",
        json!({ "query": "SMITH" }),
    );
    let names: Vec<&str> = found["students"]
        .as_array()
        .expect("students")
        .iter()
        .filter_map(|s| s["firstName"].as_str())
        .collect();
    assert_eq!(names, vec!["Liam"]);

    let by_email = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.search",
        json!({ "query": "ava.wilson@" }),
    );
    assert_eq!(by_email["students"].as_array().map(|a| a.len()), Some(1));

    let tenth = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.filter",
        json!({ "gradeLevel": 10 }),
    );
    assert_eq!(tenth["students"].as_array().map(|a| a.len()), Some(2));

    let b_range = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.filter",
        json!({ "gradeRange": "80-89" }),
    );
    let numbers: Vec<&str> = b_range["students"]
        .as_array()
        .expect("students")
        .iter()
        .filter_map(|s| s["studentNumber"].as_str())
        .collect();
    assert_eq!(numbers, vec!["STU001", "STU003"]);

    let error = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "students.filter",
        json!({ "gradeRange": "high" }),
    );
    assert_eq!(error["code"], "bad_params");

    let in_math = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.byClass",
        json!({ "classId": "MATH101" }),
    );
    assert_eq!(in_math["students"].as_array().map(|a| a.len()), Some(3));

    let _ = child.kill();
}
