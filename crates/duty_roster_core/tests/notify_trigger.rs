use chrono::NaiveDate;
use duty_roster_core::db::open_db_in_memory;
use duty_roster_core::{
    DispatchReport, DutyChange, DutyRequest, DutyService, DutyType, Member, MemberRepository,
    NotificationTrigger, RosterConfig, SmsError, SmsSender, SqliteDutyRepository,
    SqliteMemberRepository,
};
use rusqlite::Connection;
use std::cell::RefCell;

#[derive(Default)]
struct RecordingSender {
    fail_to: Option<String>,
    sent: RefCell<Vec<(String, String)>>,
}

impl SmsSender for RecordingSender {
    fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        if self.fail_to.as_deref() == Some(to) {
            return Err(SmsError::Rejected("unreachable handset".to_string()));
        }
        self.sent.borrow_mut().push((to.to_string(), body.to_string()));
        Ok(())
    }
}

fn seed(conn: &Connection, netid: &str, name: &str, phone: &str) {
    let mut member = Member::new(netid, name);
    member.email = format!("{netid}@cornell.edu");
    member.phone = phone.to_string();
    SqliteMemberRepository::new(conn)
        .create_member(&member)
        .unwrap();
}

fn dinner(assignees: &[&str], day: u32) -> DutyRequest {
    let at = NaiveDate::from_ymd_opt(2022, 8, day)
        .unwrap()
        .and_hms_opt(18, 0, 0)
        .unwrap();
    DutyRequest::new("Dinner", at, assignees.iter().copied())
}

#[test]
fn created_duty_messages_every_assignee() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, "ab1", "Alex Brown", "6075550101");
    seed(&conn, "cd2", "Casey Dunn", "6075550102");

    let service = DutyService::new(SqliteDutyRepository::new(&conn));
    let change = service
        .create_duty(DutyType::Waiter, &dinner(&["ab1", "cd2"], 27))
        .unwrap();

    let config = RosterConfig::default();
    let trigger = NotificationTrigger::new(RecordingSender::default(), &config);
    let report = trigger.dispatch(&change, &SqliteMemberRepository::new(&conn));
    assert_eq!(
        report,
        DispatchReport {
            sent: 2,
            skipped: 0,
            failed: 0
        }
    );

    let sent = trigger.sender().sent.borrow();
    assert_eq!(sent[0].0, "+16075550101");
    assert_eq!(
        sent[0].1,
        "Hi Alex, you have been assigned to \"Dinner\" on Saturday, August 27th"
    );
    assert_eq!(sent[1].0, "+16075550102");
}

#[test]
fn failed_and_unreachable_recipients_do_not_stop_dispatch() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, "ab1", "Alex Brown", "6075550101");
    seed(&conn, "cd2", "Casey Dunn", "");
    seed(&conn, "ef3", "Eden Fox", "6075550103");

    let service = DutyService::new(SqliteDutyRepository::new(&conn));
    let created = service
        .create_duty(DutyType::Waiter, &dinner(&["ab1", "cd2", "ef3"], 27))
        .unwrap();
    let change = service.delete_duty(created.duty_id()).unwrap();
    assert!(matches!(change, DutyChange::Deleted(_)));

    let config = RosterConfig::default();
    let sender = RecordingSender {
        fail_to: Some("+16075550101".to_string()),
        ..RecordingSender::default()
    };
    let trigger = NotificationTrigger::new(sender, &config);
    let report = trigger.dispatch(&change, &SqliteMemberRepository::new(&conn));
    assert_eq!(
        report,
        DispatchReport {
            sent: 1,
            skipped: 1,
            failed: 1
        }
    );

    let sent = trigger.sender().sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].1,
        "Hi Eden, you have been unassigned from \"Dinner\" on Saturday, August 27th"
    );

    let duties: i64 = conn
        .query_row("SELECT COUNT(*) FROM duties;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(duties, 0, "dispatch failures never undo the committed delete");
}

#[test]
fn update_messages_added_removed_and_moved_members() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, "ab1", "Alex Brown", "6075550101");
    seed(&conn, "cd2", "Casey Dunn", "6075550102");
    seed(&conn, "ef3", "Eden Fox", "6075550103");

    let service = DutyService::new(SqliteDutyRepository::new(&conn));
    let created = service
        .create_duty(DutyType::Waiter, &dinner(&["ab1", "cd2"], 27))
        .unwrap();
    let change = service
        .update_duty(created.duty_id(), &dinner(&["cd2", "ef3"], 28))
        .unwrap();

    let config = RosterConfig::default();
    let trigger = NotificationTrigger::new(RecordingSender::default(), &config);
    let report = trigger.dispatch(&change, &SqliteMemberRepository::new(&conn));
    assert_eq!(report.sent, 3);

    let bodies: Vec<String> = trigger
        .sender()
        .sent
        .borrow()
        .iter()
        .map(|(_, body)| body.clone())
        .collect();
    assert_eq!(
        bodies,
        vec![
            "Hi Eden, you have been assigned to \"Dinner\" on Sunday, August 28th".to_string(),
            "Hi Alex, you have been unassigned from \"Dinner\" on Saturday, August 27th"
                .to_string(),
            "Hi Casey, your duty \"Dinner\" has moved to Sunday, August 28th".to_string(),
        ]
    );
}
