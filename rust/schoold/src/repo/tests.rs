use super::*;
use crate::model::AttendanceStatus;

fn repo() -> SqliteRepository {
    SqliteRepository::open_in_memory(StoreSettings::default()).expect("open repository")
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).expect("date")
}

fn new_class(repo: &SqliteRepository, name: &str) -> Class {
    repo.class_create(NewClass {
        code: None,
        name: name.to_string(),
        subject: "Mathematics".to_string(),
        period: Some(1),
        student_ids: Vec::new(),
    })
    .expect("create class")
}

fn new_student(repo: &SqliteRepository, number: &str, class_ids: &[&str]) -> Student {
    repo.student_create(NewStudent {
        student_number: number.to_string(),
        first_name: "Emma".to_string(),
        last_name: "Johnson".to_string(),
        email: format!("{}@school.edu", number.to_lowercase()),
        grade_level: Some(10),
        class_ids: class_ids.iter().map(|s| s.to_string()).collect(),
    })
    .expect("create student")
}

fn new_assignment(
    repo: &SqliteRepository,
    class: &str,
    category: &str,
    points: i64,
    weight: f64,
) -> Assignment {
    repo.assignment_create(
        NewAssignment {
            class_id: class.to_string(),
            name: format!("{} {}", category, points),
            category: category.to_string(),
            points,
            due_date: Some("2024-02-01".to_string()),
            weight: Some(weight),
        },
        today(),
    )
    .expect("create assignment")
}

#[test]
fn class_code_defaults_to_class_and_id() {
    let repo = repo();
    let first = new_class(&repo, "Algebra");
    let second = new_class(&repo, "Geometry");
    assert_eq!(first.code, format!("class{}", first.id));
    assert_eq!(second.code, format!("class{}", second.id));
    assert!(second.id > first.id);
}

#[test]
fn duplicate_student_number_is_rejected_without_mutation() {
    let repo = repo();
    new_student(&repo, "STU001", &[]);
    let err = repo
        .student_create(NewStudent {
            student_number: "STU001".to_string(),
            first_name: "Liam".to_string(),
            last_name: "Smith".to_string(),
            email: "liam@school.edu".to_string(),
            grade_level: Some(11),
            class_ids: Vec::new(),
        })
        .expect_err("duplicate must fail");
    assert_eq!(err.code(), "validation_failed");
    assert_eq!(repo.students_all().expect("all").len(), 1);
}

#[test]
fn student_validation_reports_every_field() {
    let repo = repo();
    let err = repo
        .student_create(NewStudent {
            email: "not-an-email".to_string(),
            grade_level: Some(8),
            ..NewStudent::default()
        })
        .expect_err("invalid");
    let details = err.details().expect("details");
    let fields = details.get("fields").expect("fields");
    for f in ["firstName", "lastName", "email", "studentNumber", "gradeLevel"] {
        assert!(fields.get(f).is_some(), "missing field error for {}", f);
    }
    assert_eq!(fields["email"], "Please enter a valid email");
}

#[test]
fn surrogate_ids_are_not_reused_after_delete() {
    let repo = repo();
    let a = new_student(&repo, "STU001", &[]);
    let b = new_student(&repo, "STU002", &[]);
    repo.student_delete(b.id).expect("delete");
    let c = new_student(&repo, "STU003", &[]);
    assert!(c.id > b.id);
    assert!(c.id > a.id);
}

#[test]
fn grade_upsert_updates_in_place() {
    let repo = repo();
    let class = new_class(&repo, "Algebra");
    let student = new_student(&repo, "STU001", &[&class.code]);
    let hw = new_assignment(&repo, &class.code, "Homework", 50, 0.2);

    let first = repo
        .grade_upsert(NewGrade {
            student_id: student.id,
            assignment_id: hw.id,
            score: 40.0,
            submitted: None,
        })
        .expect("first");
    assert!(first.created);
    assert!(first.record.submitted);

    let second = repo
        .grade_upsert(NewGrade {
            student_id: student.id,
            assignment_id: hw.id,
            score: 42.0,
            submitted: None,
        })
        .expect("second");
    assert!(!second.created);
    assert_eq!(second.record.id, first.record.id);
    assert_eq!(second.record.score, 42.0);
    assert_eq!(repo.grades_all().expect("all").len(), 1);
}

#[test]
fn grade_score_above_points_is_a_validation_error() {
    let repo = repo();
    let class = new_class(&repo, "Algebra");
    let student = new_student(&repo, "STU001", &[&class.code]);
    let hw = new_assignment(&repo, &class.code, "Homework", 50, 0.2);
    let err = repo
        .grade_upsert(NewGrade {
            student_id: student.id,
            assignment_id: hw.id,
            score: 51.0,
            submitted: None,
        })
        .expect_err("over max");
    assert_eq!(err.code(), "validation_failed");
    assert!(repo.grades_all().expect("all").is_empty());
}

#[test]
fn lowering_points_below_a_recorded_score_is_rejected() {
    let repo = repo();
    let class = new_class(&repo, "Algebra");
    let student = new_student(&repo, "STU001", &[&class.code]);
    let test = new_assignment(&repo, &class.code, "Tests", 100, 0.4);
    repo.grade_upsert(NewGrade {
        student_id: student.id,
        assignment_id: test.id,
        score: 90.0,
        submitted: None,
    })
    .expect("grade");

    let err = repo
        .assignment_update(
            test.id,
            AssignmentPatch {
                points: Some(50),
                ..Default::default()
            },
        )
        .expect_err("points below score");
    assert_eq!(err.code(), "validation_failed");
    assert!(matches!(
        err,
        StoreError::Validation { ref fields, .. } if fields.contains_key("points")
    ));
    assert_eq!(repo.assignment_by_id(test.id).expect("reload").points, 100);

    let lowered = repo
        .assignment_update(
            test.id,
            AssignmentPatch {
                points: Some(90),
                ..Default::default()
            },
        )
        .expect("points equal to top score");
    assert_eq!(lowered.points, 90);
}

#[test]
fn moving_an_assignment_drops_grades_of_unenrolled_students() {
    let repo = repo();
    let algebra = new_class(&repo, "Algebra");
    let geometry = new_class(&repo, "Geometry");
    let only_algebra = new_student(&repo, "STU001", &[&algebra.code]);
    let both = new_student(&repo, "STU002", &[&algebra.code, &geometry.code]);
    let hw = new_assignment(&repo, &algebra.code, "Homework", 10, 0.2);
    for student in [&only_algebra, &both] {
        repo.grade_upsert(NewGrade {
            student_id: student.id,
            assignment_id: hw.id,
            score: 8.0,
            submitted: None,
        })
        .expect("grade");
    }

    let moved = repo
        .assignment_update(
            hw.id,
            AssignmentPatch {
                class_id: Some(geometry.code.clone()),
                ..Default::default()
            },
        )
        .expect("move");
    assert_eq!(moved.class_id, geometry.code);

    let remaining = repo.grades_by_assignment(hw.id).expect("grades");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].student_id, both.id);
    assert_eq!(repo.grade_stats().expect("stats").total_grades, 1);
}

#[test]
fn update_by_id_and_by_key_fail_when_missing() {
    let repo = repo();
    let err = repo
        .grade_update_by_id(99, GradePatch::default())
        .expect_err("missing id");
    assert_eq!(err.code(), "not_found");
    let err = repo
        .grade_update_by_key(
            GradeKey {
                student_id: 1,
                assignment_id: 1,
            },
            GradePatch::default(),
        )
        .expect_err("missing key");
    assert_eq!(err.code(), "not_found");
}

#[test]
fn current_grade_is_weighted_across_categories() {
    let repo = repo();
    let class = new_class(&repo, "Algebra");
    let student = new_student(&repo, "STU001", &[&class.code]);
    let hw = new_assignment(&repo, &class.code, "Homework", 100, 0.2);
    let exam = new_assignment(&repo, &class.code, "Exam", 100, 0.8);
    for (assignment_id, score) in [(hw.id, 80.0), (exam.id, 90.0)] {
        repo.grade_upsert(NewGrade {
            student_id: student.id,
            assignment_id,
            score,
            submitted: None,
        })
        .expect("grade");
    }
    let loaded = repo.student_by_id(student.id).expect("load");
    assert_eq!(loaded.current_grade, 88);
    assert_eq!(loaded.class_ids, vec![class.code.clone()]);
}

#[test]
fn attendance_rate_defaults_and_rounds() {
    let repo = repo();
    let class = new_class(&repo, "Algebra");
    let student = new_student(&repo, "STU001", &[&class.code]);
    assert_eq!(student.attendance_rate, 100);

    let statuses = [
        ("2024-01-15", AttendanceStatus::Present),
        ("2024-01-16", AttendanceStatus::Present),
        ("2024-01-17", AttendanceStatus::Absent),
    ];
    for (date, status) in statuses {
        repo.attendance_upsert(NewAttendance {
            student_id: student.id,
            class_id: class.code.clone(),
            date: date.to_string(),
            status,
        })
        .expect("record");
    }
    let loaded = repo.student_by_id(student.id).expect("load");
    assert_eq!(loaded.attendance_rate, 67);

    let stats = repo
        .attendance_stats(&AttendanceScope::default())
        .expect("stats");
    assert_eq!(stats.total_records, 3);
    assert_eq!(stats.attendance_rate, 67);

    let empty = repo
        .attendance_stats(&AttendanceScope {
            class_id: None,
            date: Some("2030-01-01".to_string()),
        })
        .expect("empty stats");
    assert_eq!(empty.total_records, 0);
    assert_eq!(empty.attendance_rate, 100);
}

#[test]
fn cycle_walks_absent_present_tardy_absent() {
    let repo = repo();
    let class = new_class(&repo, "Algebra");
    let student = new_student(&repo, "STU001", &[&class.code]);
    let key = AttendanceKey {
        student_id: student.id,
        class_id: class.code.clone(),
        date: "2024-01-15".to_string(),
    };
    let seen: Vec<AttendanceStatus> = (0..3)
        .map(|_| repo.attendance_cycle(key.clone()).expect("cycle").status)
        .collect();
    assert_eq!(
        seen,
        vec![
            AttendanceStatus::Present,
            AttendanceStatus::Tardy,
            AttendanceStatus::Absent
        ]
    );
    assert_eq!(repo.attendance_all().expect("all").len(), 1);
}

#[test]
fn mark_all_present_skips_recorded_students_unless_overwriting() {
    let repo = repo();
    let class = new_class(&repo, "Algebra");
    let a = new_student(&repo, "STU001", &[&class.code]);
    let b = new_student(&repo, "STU002", &[&class.code]);
    repo.attendance_upsert(NewAttendance {
        student_id: a.id,
        class_id: class.code.clone(),
        date: "2024-01-15".to_string(),
        status: AttendanceStatus::Tardy,
    })
    .expect("record");

    let result = repo
        .attendance_mark_all_present(MarkAllPresent {
            class_id: class.code.clone(),
            date: "2024-01-15".to_string(),
            student_ids: None,
            overwrite: false,
        })
        .expect("mark");
    assert_eq!(result.skipped, vec![a.id]);
    assert_eq!(result.written.len(), 1);
    assert_eq!(result.written[0].student_id, b.id);

    let result = repo
        .attendance_mark_all_present(MarkAllPresent {
            class_id: class.code.clone(),
            date: "2024-01-15".to_string(),
            student_ids: None,
            overwrite: true,
        })
        .expect("overwrite");
    assert_eq!(result.written.len(), 2);
    assert_eq!(repo.attendance_all().expect("all").len(), 2);
}

#[test]
fn deleting_a_class_cascades() {
    let repo = repo();
    let class = new_class(&repo, "Algebra");
    let student = new_student(&repo, "STU001", &[&class.code]);
    let hw = new_assignment(&repo, &class.code, "Homework", 10, 0.2);
    repo.grade_upsert(NewGrade {
        student_id: student.id,
        assignment_id: hw.id,
        score: 9.0,
        submitted: None,
    })
    .expect("grade");
    repo.attendance_cycle(AttendanceKey {
        student_id: student.id,
        class_id: class.code.clone(),
        date: "2024-01-15".to_string(),
    })
    .expect("cycle");

    repo.class_delete(class.id).expect("delete class");
    assert!(repo.assignments_all().expect("assignments").is_empty());
    assert!(repo.grades_all().expect("grades").is_empty());
    assert!(repo.attendance_all().expect("attendance").is_empty());
    let reloaded = repo.student_by_id(student.id).expect("student");
    assert!(reloaded.class_ids.is_empty());
}

#[test]
fn assignment_defaults_weight_and_due_date() {
    let repo = repo();
    let class = new_class(&repo, "Algebra");
    let a = repo
        .assignment_create(
            NewAssignment {
                class_id: class.code.clone(),
                name: "Worksheet".to_string(),
                category: "Homework".to_string(),
                points: 20,
                due_date: None,
                weight: None,
            },
            today(),
        )
        .expect("create");
    assert_eq!(a.weight, 0.2);
    assert_eq!(a.due_date, "2024-01-15");

    let stats = repo.assignment_stats(today()).expect("stats");
    assert_eq!(stats.total_assignments, 1);
    assert_eq!(stats.upcoming_assignments, 0);
}

#[test]
fn search_matches_names_email_and_number() {
    let repo = repo();
    new_student(&repo, "STU001", &[]);
    new_student(&repo, "XYZ900", &[]);
    assert_eq!(repo.students_search("stu0").expect("search").len(), 1);
    assert_eq!(repo.students_search("JOHNSON").expect("search").len(), 2);
    assert_eq!(repo.students_search("  ").expect("search").len(), 2);
}
