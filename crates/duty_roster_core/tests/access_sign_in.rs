use duty_roster_core::db::open_db_in_memory;
use duty_roster_core::{
    resolve_gate, sign_in, AccessRequirement, Denial, DutyType, ErrorCategory, GateView, Member,
    MemberRepository, RosterConfig, SessionState, SignInError, SqliteMemberRepository,
};

fn seed(repo: &SqliteMemberRepository<'_>, netid: &str, position: Option<&str>) {
    let mut member = Member::new(netid, format!("Member {netid}"));
    member.email = format!("{netid}@cornell.edu");
    member.position = position.map(str::to_string);
    repo.create_member(&member).unwrap();
}

#[test]
fn sign_in_with_domain_email_loads_member() {
    let conn = open_db_in_memory().unwrap();
    let members = SqliteMemberRepository::new(&conn);
    seed(&members, "ab123", None);

    let config = RosterConfig::default();
    let session = sign_in(&config, &members, "AB123@cornell.edu").unwrap();
    assert_eq!(session.netid, "ab123");
    assert_eq!(session.member.name, "Member ab123");

    let state = SessionState::Authenticated(session);
    assert_eq!(state.session().map(|session| session.netid.as_str()), Some("ab123"));
}

#[test]
fn sign_in_outside_domain_yields_no_session() {
    let conn = open_db_in_memory().unwrap();
    let members = SqliteMemberRepository::new(&conn);
    seed(&members, "ab123", None);

    let config = RosterConfig::default();
    let err = sign_in(&config, &members, "ab123@gmail.com").unwrap_err();
    assert!(matches!(err, SignInError::DomainNotAllowed { .. }));
    assert_eq!(err.user_message(), "Must login with cornell.edu email.");
    assert_eq!(err.category(), ErrorCategory::Validation);

    let err = sign_in(&config, &members, "not-an-email").unwrap_err();
    assert!(matches!(err, SignInError::DomainNotAllowed { .. }));
}

#[test]
fn sign_in_rejects_address_with_second_at_sign() {
    let conn = open_db_in_memory().unwrap();
    let members = SqliteMemberRepository::new(&conn);
    seed(&members, "ab123", None);

    let config = RosterConfig::default();
    let err = sign_in(&config, &members, "ab123@gmail.com@cornell.edu").unwrap_err();
    assert!(matches!(err, SignInError::DomainNotAllowed { .. }));
    assert_eq!(err.category(), ErrorCategory::Validation);
}

#[test]
fn sign_in_without_member_record_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let members = SqliteMemberRepository::new(&conn);

    let config = RosterConfig::default();
    let err = sign_in(&config, &members, "zz9@cornell.edu").unwrap_err();
    assert!(matches!(err, SignInError::UnknownMember(ref netid) if netid == "zz9"));
    assert_eq!(err.user_message(), "No member exists with the given email.");
}

#[test]
fn gate_reflects_position_changes_after_sign_in() {
    let conn = open_db_in_memory().unwrap();
    let members = SqliteMemberRepository::new(&conn);
    seed(&members, "cm1", None);
    seed(&members, "ab123", None);

    let config = RosterConfig::default();
    let requirement = AccessRequirement::assigner(DutyType::Cleaning);

    let plain = SessionState::Authenticated(sign_in(&config, &members, "cm1@cornell.edu").unwrap());
    assert!(matches!(
        resolve_gate(&config, &plain, &requirement, |_| ()),
        GateView::Forbidden(Denial::WrongAssigner { actual: None, .. })
    ));

    members.set_position("cm1", Some("Cleaning Manager")).unwrap();
    let manager =
        SessionState::Authenticated(sign_in(&config, &members, "cm1@cornell.edu").unwrap());
    let view = resolve_gate(&config, &manager, &requirement, |session| {
        session.member.position.clone()
    });
    assert_eq!(view.ready(), Some(Some("Cleaning Manager".to_string())));

    let other_page = AccessRequirement::member("ab123");
    assert!(resolve_gate(&config, &manager, &other_page, |_| ()).is_ready());

    let Some(session) = manager.session().cloned() else {
        panic!("expected session");
    };
    assert_eq!(session.sign_out(), SessionState::Unauthenticated);
}
