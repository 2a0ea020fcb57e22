use chrono::{NaiveDate, NaiveDateTime};
use duty_roster_core::db::open_db_in_memory;
use duty_roster_core::{
    Duty, DutyChange, DutyRepository, DutyRequest, DutyService, DutyServiceError, DutyType,
    ErrorCategory, Member, MemberRepository, SqliteDutyRepository, SqliteMemberRepository,
};
use rusqlite::Connection;

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 8, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn seed_members(conn: &Connection, netids: &[&str]) {
    let repo = SqliteMemberRepository::new(conn);
    for netid in netids {
        let mut member = Member::new(*netid, format!("Member {netid}"));
        member.email = format!("{netid}@cornell.edu");
        repo.create_member(&member).unwrap();
    }
}

fn credit(conn: &Connection, netid: &str, kind: DutyType) -> f64 {
    SqliteMemberRepository::new(conn)
        .get_member(netid)
        .unwrap()
        .unwrap()
        .credit_for(kind)
}

fn created(change: DutyChange) -> Duty {
    match change {
        DutyChange::Created(duty) => duty,
        other => panic!("expected created change, got {other:?}"),
    }
}

/// Every member total equals the sum of that member's assignment credits.
fn assert_credit_invariant(conn: &Connection) {
    let mut stmt = conn
        .prepare(
            "SELECT c.netid, c.duty_type, c.total, COALESCE((
                SELECT SUM(a.credits)
                FROM duty_assignments a
                INNER JOIN duties d ON d.id = a.duty_id
                WHERE a.netid = c.netid AND d.type = c.duty_type
             ), 0)
             FROM member_credits c;",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })
        .unwrap();
    for row in rows {
        let (netid, kind, total, expected) = row.unwrap();
        assert!(
            (total - expected).abs() < 1e-9,
            "credit drift for {netid}/{kind}: total={total} expected={expected}"
        );
    }

    let dangling: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM member_duty_refs r
             WHERE NOT EXISTS (
                SELECT 1 FROM duty_assignments a
                WHERE a.duty_id = r.duty_id AND a.netid = r.netid
             );",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(dangling, 0, "back-reference without assignment");
}

#[test]
fn create_duty_credits_each_assignee_and_records_back_references() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1", "cd2"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));

    let duty = created(
        service
            .create_duty(
                DutyType::Waiter,
                &DutyRequest::new("Dinner", at(27, 18), ["ab1", "cd2"]),
            )
            .unwrap(),
    );

    assert_eq!(duty.date.day, "08-27-2022");
    assert_eq!(duty.assigned, vec!["ab1".to_string(), "cd2".to_string()]);
    assert_eq!(duty.assigned_names.get("ab1").unwrap(), "Member ab1");
    assert_eq!(credit(&conn, "ab1", DutyType::Waiter), 1.0);
    assert_eq!(credit(&conn, "ab1", DutyType::Cleaning), 0.0);

    let member = SqliteMemberRepository::new(&conn)
        .get_member("cd2")
        .unwrap()
        .unwrap();
    assert!(member.has_duty_on(DutyType::Waiter, "08-27-2022"));
    assert_credit_invariant(&conn);
}

#[test]
fn update_keeps_retained_credit_and_moves_changed_assignees() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["aa1", "bb2", "cc3"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));

    let duty = created(
        service
            .create_duty(
                DutyType::Cleaning,
                &DutyRequest::new("Kitchen", at(27, 10), ["aa1", "bb2"]),
            )
            .unwrap(),
    );
    service.adjust_credit(&duty.id, "aa1", 2.5).unwrap();
    service.adjust_credit(&duty.id, "bb2", 0.5).unwrap();

    let change = service
        .update_duty(
            &duty.id,
            &DutyRequest::new("Kitchen deep clean", at(28, 10), ["bb2", "cc3"]),
        )
        .unwrap();

    let DutyChange::Updated {
        before,
        after,
        diff,
    } = change
    else {
        panic!("expected updated change");
    };
    assert_eq!(before.name, "Kitchen");
    assert_eq!(after.name, "Kitchen deep clean");
    assert_eq!(diff.removed, vec!["aa1".to_string()]);
    assert_eq!(diff.added, vec!["cc3".to_string()]);
    assert_eq!(diff.retained, vec!["bb2".to_string()]);

    assert_eq!(credit(&conn, "aa1", DutyType::Cleaning), 0.0);
    assert_eq!(credit(&conn, "bb2", DutyType::Cleaning), 0.5);
    assert_eq!(credit(&conn, "cc3", DutyType::Cleaning), 1.0);

    let stored = SqliteDutyRepository::new(&conn)
        .get_duty(&duty.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.assigned, vec!["bb2".to_string(), "cc3".to_string()]);
    assert_eq!(stored.credit_for("bb2"), Some(0.5));
    assert!(stored.checked.contains("bb2"));
    assert!(!stored.checked.contains("cc3"));
    assert_eq!(stored.date.day, "08-28-2022");

    let members = SqliteMemberRepository::new(&conn);
    let bb2 = members.get_member("bb2").unwrap().unwrap();
    assert!(bb2.has_duty_on(DutyType::Cleaning, "08-28-2022"));
    let aa1 = members.get_member("aa1").unwrap().unwrap();
    assert!(aa1.duties.is_empty());
    assert_credit_invariant(&conn);
}

#[test]
fn delete_restores_pre_creation_totals() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1", "cd2"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));

    let kept = created(
        service
            .create_duty(DutyType::Social, &DutyRequest::new("Formal", at(26, 20), ["ab1"]))
            .unwrap(),
    );
    let before_ab1 = credit(&conn, "ab1", DutyType::Social);
    let before_cd2 = credit(&conn, "cd2", DutyType::Social);

    let doomed = created(
        service
            .create_duty(
                DutyType::Social,
                &DutyRequest::new("Mixer", at(27, 21), ["ab1", "cd2"]),
            )
            .unwrap(),
    );
    service.adjust_credit(&doomed.id, "cd2", 3.0).unwrap();

    let change = service.delete_duty(&doomed.id).unwrap();
    assert_eq!(change.duty_id(), &doomed.id);
    assert_eq!(credit(&conn, "ab1", DutyType::Social), before_ab1);
    assert_eq!(credit(&conn, "cd2", DutyType::Social), before_cd2);

    let repo = SqliteDutyRepository::new(&conn);
    assert!(repo.get_duty(&doomed.id).unwrap().is_none());
    assert!(repo.get_duty(&kept.id).unwrap().is_some());
    assert_credit_invariant(&conn);
}

#[test]
fn adjust_credit_applies_signed_delta_and_marks_checked() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));
    let duty = created(
        service
            .create_duty(DutyType::Waiter, &DutyRequest::new("Lunch", at(27, 12), ["ab1"]))
            .unwrap(),
    );

    let raised = service.adjust_credit(&duty.id, "ab1", 2.0).unwrap();
    assert_eq!(raised.old_value, 1.0);
    assert_eq!(raised.delta(), 1.0);
    assert_eq!(credit(&conn, "ab1", DutyType::Waiter), 2.0);

    let lowered = service.adjust_credit(&duty.id, "ab1", -0.5).unwrap();
    assert_eq!(lowered.delta(), -2.5);
    assert_eq!(credit(&conn, "ab1", DutyType::Waiter), -0.5);

    let stored = SqliteDutyRepository::new(&conn)
        .get_duty(&duty.id)
        .unwrap()
        .unwrap();
    assert!(stored.is_fully_checked());
    assert_credit_invariant(&conn);
}

#[test]
fn adjust_credit_rejects_non_finite_and_unassigned_members() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1", "cd2"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));
    let duty = created(
        service
            .create_duty(DutyType::Waiter, &DutyRequest::new("Lunch", at(27, 12), ["ab1"]))
            .unwrap(),
    );

    let err = service.adjust_credit(&duty.id, "ab1", f64::NAN).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);

    let err = service.adjust_credit(&duty.id, "cd2", 1.0).unwrap_err();
    assert!(matches!(err, DutyServiceError::NotAssigned { .. }));
    assert_eq!(credit(&conn, "ab1", DutyType::Waiter), 1.0);
}

#[test]
fn invalid_requests_are_rejected_before_any_write() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));

    let err = service
        .create_duty(DutyType::Waiter, &DutyRequest::new("", at(27, 12), ["ab1"]))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);

    let err = service
        .create_duty(
            DutyType::Waiter,
            &DutyRequest::new("Lunch", at(27, 12), ["ab1", "zz9"]),
        )
        .unwrap_err();
    assert!(matches!(err, DutyServiceError::MemberNotFound(ref netid) if netid == "zz9"));
    assert_eq!(err.category(), ErrorCategory::NotFound);

    let duties: i64 = conn
        .query_row("SELECT COUNT(*) FROM duties;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(duties, 0);
    assert_eq!(credit(&conn, "ab1", DutyType::Waiter), 0.0);
}

#[test]
fn failure_mid_batch_rolls_back_every_write() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1", "cd2"]);
    conn.execute(
        "DELETE FROM member_credits WHERE netid = 'cd2' AND duty_type = 'waiter';",
        [],
    )
    .unwrap();
    let service = DutyService::new(SqliteDutyRepository::new(&conn));

    let err = service
        .create_duty(
            DutyType::Waiter,
            &DutyRequest::new("Dinner", at(27, 18), ["ab1", "cd2"]),
        )
        .unwrap_err();
    assert!(matches!(err, DutyServiceError::MemberNotFound(_)));

    let duties: i64 = conn
        .query_row("SELECT COUNT(*) FROM duties;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(duties, 0);
    let refs: i64 = conn
        .query_row("SELECT COUNT(*) FROM member_duty_refs;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(refs, 0);
    assert_eq!(credit(&conn, "ab1", DutyType::Waiter), 0.0);
}

#[test]
fn failed_update_leaves_duty_credits_and_references_untouched() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1", "cd2", "ef3"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));
    let dinner = created(
        service
            .create_duty(
                DutyType::Waiter,
                &DutyRequest::new("Dinner", at(27, 18), ["ab1", "cd2"]),
            )
            .unwrap(),
    );
    // ef3 loses its credit row, so crediting the new assignee fails after
    // ab1 has already been debited inside the batch.
    conn.execute(
        "DELETE FROM member_credits WHERE netid = 'ef3' AND duty_type = 'waiter';",
        [],
    )
    .unwrap();

    let err = service
        .update_duty(
            &dinner.id,
            &DutyRequest::new("Late dinner", at(28, 20), ["cd2", "ef3"]),
        )
        .unwrap_err();
    assert!(matches!(err, DutyServiceError::MemberNotFound(ref netid) if netid == "ef3"));

    let stored = SqliteDutyRepository::new(&conn)
        .get_duty(&dinner.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "Dinner");
    assert_eq!(stored.date.day, "08-27-2022");
    assert_eq!(stored.assigned, vec!["ab1".to_string(), "cd2".to_string()]);
    assert_eq!(credit(&conn, "ab1", DutyType::Waiter), 1.0);
    assert_eq!(credit(&conn, "cd2", DutyType::Waiter), 1.0);

    let ab1 = SqliteMemberRepository::new(&conn)
        .get_member("ab1")
        .unwrap()
        .unwrap();
    assert!(ab1.has_duty_on(DutyType::Waiter, "08-27-2022"));
    assert_credit_invariant(&conn);
}

#[test]
fn update_with_unknown_added_member_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1", "cd2"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));
    let dinner = created(
        service
            .create_duty(
                DutyType::Waiter,
                &DutyRequest::new("Dinner", at(27, 18), ["ab1", "cd2"]),
            )
            .unwrap(),
    );

    let err = service
        .update_duty(
            &dinner.id,
            &DutyRequest::new("Dinner", at(27, 18), ["cd2", "zz9"]),
        )
        .unwrap_err();
    assert!(matches!(err, DutyServiceError::MemberNotFound(ref netid) if netid == "zz9"));
    assert_eq!(credit(&conn, "ab1", DutyType::Waiter), 1.0);
    assert_credit_invariant(&conn);
}

#[test]
fn missing_duty_is_not_found_for_update_and_delete() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));
    let ghost = duty_roster_core::DutyId::generate();

    let err = service.delete_duty(&ghost).unwrap_err();
    assert!(matches!(err, DutyServiceError::DutyNotFound(_)));

    let err = service
        .update_duty(&ghost, &DutyRequest::new("Lunch", at(27, 12), ["ab1"]))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[test]
fn conflicts_flag_same_type_same_day_holders() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["ab1", "cd2"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));
    let lunch = created(
        service
            .create_duty(DutyType::Waiter, &DutyRequest::new("Lunch", at(27, 12), ["ab1"]))
            .unwrap(),
    );
    service
        .create_duty(DutyType::Cleaning, &DutyRequest::new("Porch", at(27, 9), ["cd2"]))
        .unwrap();

    let day = NaiveDate::from_ymd_opt(2022, 8, 27).unwrap();
    let candidates = vec!["ab1".to_string(), "cd2".to_string()];
    let conflicts = service
        .assignment_conflicts(DutyType::Waiter, day, &candidates, None)
        .unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].netid, "ab1");
    assert_eq!(conflicts[0].duty_name, "Lunch");

    let repeated = vec!["ab1".to_string(), "cd2".to_string(), "ab1".to_string()];
    let conflicts = service
        .assignment_conflicts(DutyType::Waiter, day, &repeated, None)
        .unwrap();
    assert_eq!(conflicts.len(), 1, "repeated candidate reported once");

    let while_editing = service
        .assignment_conflicts(DutyType::Waiter, day, &candidates, Some(&lunch.id))
        .unwrap();
    assert!(while_editing.is_empty());

    let next_day = NaiveDate::from_ymd_opt(2022, 8, 28).unwrap();
    assert!(service
        .assignment_conflicts(DutyType::Waiter, next_day, &candidates, None)
        .unwrap()
        .is_empty());
}

#[test]
fn mixed_sequence_preserves_credit_invariant() {
    let conn = open_db_in_memory().unwrap();
    seed_members(&conn, &["aa1", "bb2", "cc3", "dd4"]);
    let service = DutyService::new(SqliteDutyRepository::new(&conn));

    let first = created(
        service
            .create_duty(
                DutyType::Waiter,
                &DutyRequest::new("Breakfast", at(27, 8), ["aa1", "bb2"]),
            )
            .unwrap(),
    );
    let second = created(
        service
            .create_duty(
                DutyType::Waiter,
                &DutyRequest::new("Dinner", at(27, 18), ["cc3", "dd4"]),
            )
            .unwrap(),
    );
    service.adjust_credit(&first.id, "bb2", 1.5).unwrap();
    service
        .update_duty(
            &first.id,
            &DutyRequest::new("Breakfast", at(27, 8), ["bb2", "dd4"]),
        )
        .unwrap();
    service.adjust_credit(&second.id, "dd4", 0.0).unwrap();
    service.delete_duty(&second.id).unwrap();
    assert_credit_invariant(&conn);

    assert_eq!(credit(&conn, "aa1", DutyType::Waiter), 0.0);
    assert_eq!(credit(&conn, "bb2", DutyType::Waiter), 1.5);
    assert_eq!(credit(&conn, "cc3", DutyType::Waiter), 0.0);
    assert_eq!(credit(&conn, "dd4", DutyType::Waiter), 1.0);
}
