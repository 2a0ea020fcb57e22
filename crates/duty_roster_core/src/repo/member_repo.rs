//! Member and cohort repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide member lookup, credit-ordered listing and cohort grouping.
//! - Keep exemption and position bookkeeping inside the persistence boundary.
//!
//! # Invariants
//! - Every stored member has one `member_credits` row per duty type.
//! - Credit-ordered listings are deterministic: `total ASC, name ASC,
//!   netid ASC`.
//! - Members are created with zero credits and no duty references; only
//!   the duty ledger moves those.

use super::{bool_to_int, parse_duty_id, parse_duty_type, parse_flag, RepoError, RepoResult};
use crate::model::cohort::{Cohort, FALL_SEMESTER};
use crate::model::duty::DutyType;
use crate::model::member::{DutyRef, Exemption, Member, MemberClass, Residency};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

const MEMBER_SELECT_SQL: &str = "SELECT
    members.netid AS netid,
    members.name AS name,
    members.email AS email,
    members.phone AS phone,
    members.class_name AS class_name,
    members.class_semester AS class_semester,
    members.residency AS residency,
    members.position AS position,
    members.exemption_reason AS exemption_reason
FROM members";

/// Repository interface for members and cohorts.
pub trait MemberRepository {
    /// Inserts one member with zeroed credit totals.
    fn create_member(&self, member: &Member) -> RepoResult<()>;
    /// Loads one member with credits, duty references and exemption.
    fn get_member(&self, netid: &str) -> RepoResult<Option<Member>>;
    /// Returns every netid in ascending order.
    fn list_netids(&self) -> RepoResult<Vec<String>>;
    /// Lists all members by ascending credit total for `kind`.
    fn list_members_by_credits(&self, kind: DutyType) -> RepoResult<Vec<Member>>;
    /// Inserts one cohort display group.
    fn create_cohort(&self, cohort: &Cohort) -> RepoResult<()>;
    /// Lists cohorts in display order.
    fn list_cohorts(&self) -> RepoResult<Vec<Cohort>>;
    /// Lists members matching one cohort's filter, by name.
    fn list_members_in_cohort(&self, cohort: &Cohort) -> RepoResult<Vec<Member>>;
    /// Sets or clears a member's leadership position.
    fn set_position(&self, netid: &str, position: Option<&str>) -> RepoResult<()>;
    /// Replaces a member's exemption record.
    fn set_exemption(&self, netid: &str, exemption: Option<&Exemption>) -> RepoResult<()>;
}

/// SQLite-backed member repository.
pub struct SqliteMemberRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MemberRepository for SqliteMemberRepository<'_> {
    fn create_member(&self, member: &Member) -> RepoResult<()> {
        member.validate()?;
        if !member.duties.is_empty() {
            return Err(RepoError::InvalidData(format!(
                "new member {} cannot carry duty references",
                member.netid
            )));
        }
        if member.credits.values().any(|total| *total != 0.0) {
            return Err(RepoError::InvalidData(format!(
                "new member {} must start with zero credits",
                member.netid
            )));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO members (
                netid,
                name,
                email,
                phone,
                class_name,
                class_semester,
                residency,
                position,
                exemption_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                member.netid.as_str(),
                member.name.as_str(),
                member.email.as_str(),
                member.phone.as_str(),
                member.class.name.as_str(),
                member.class.semester.as_str(),
                member.residency.as_str(),
                member.position.as_deref(),
                member.exemption.as_ref().map(|exemption| exemption.reason.as_str()),
            ],
        )?;

        for kind in DutyType::ALL {
            tx.execute(
                "INSERT INTO member_credits (netid, duty_type, total) VALUES (?1, ?2, 0);",
                params![member.netid.as_str(), kind.as_str()],
            )?;
        }

        if let Some(exemption) = member.exemption.as_ref() {
            insert_exemption_kinds(&tx, &member.netid, &exemption.kinds)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_member(&self, netid: &str) -> RepoResult<Option<Member>> {
        load_member(self.conn, netid)
    }

    fn list_netids(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT netid FROM members ORDER BY netid ASC;")?;
        let mut rows = stmt.query([])?;
        let mut netids = Vec::new();
        while let Some(row) = rows.next()? {
            netids.push(row.get(0)?);
        }
        Ok(netids)
    }

    fn list_members_by_credits(&self, kind: DutyType) -> RepoResult<Vec<Member>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             LEFT JOIN member_credits c
               ON c.netid = members.netid
              AND c.duty_type = ?1
             ORDER BY COALESCE(c.total, 0) ASC, members.name ASC, members.netid ASC;"
        ))?;
        let mut rows = stmt.query([kind.as_str()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(hydrate_member(self.conn, parse_member_row(row)?)?);
        }
        Ok(members)
    }

    fn create_cohort(&self, cohort: &Cohort) -> RepoResult<()> {
        if cohort.class.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "cohort class name must not be empty".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO classes (class, sort_index, fall_class) VALUES (?1, ?2, ?3);",
            params![
                cohort.class.as_str(),
                cohort.index,
                bool_to_int(cohort.fall_class)
            ],
        )?;
        Ok(())
    }

    fn list_cohorts(&self) -> RepoResult<Vec<Cohort>> {
        let mut stmt = self.conn.prepare(
            "SELECT class, sort_index, fall_class
             FROM classes
             ORDER BY sort_index ASC, class ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut cohorts = Vec::new();
        while let Some(row) = rows.next()? {
            cohorts.push(Cohort {
                class: row.get("class")?,
                index: row.get("sort_index")?,
                fall_class: parse_flag(row.get("fall_class")?, "classes.fall_class")?,
            });
        }
        Ok(cohorts)
    }

    fn list_members_in_cohort(&self, cohort: &Cohort) -> RepoResult<Vec<Member>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE class_name = ?1
               AND (?2 = 0 OR class_semester = ?3)
             ORDER BY name ASC, netid ASC;"
        ))?;
        let mut rows = stmt.query(params![
            cohort.class.as_str(),
            bool_to_int(cohort.fall_class),
            FALL_SEMESTER
        ])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(hydrate_member(self.conn, parse_member_row(row)?)?);
        }
        Ok(members)
    }

    fn set_position(&self, netid: &str, position: Option<&str>) -> RepoResult<()> {
        let position = position.map(str::trim).filter(|value| !value.is_empty());
        let changed = self.conn.execute(
            "UPDATE members SET position = ?2 WHERE netid = ?1;",
            params![netid, position],
        )?;
        if changed == 0 {
            return Err(RepoError::MemberNotFound(netid.to_string()));
        }
        Ok(())
    }

    fn set_exemption(&self, netid: &str, exemption: Option<&Exemption>) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE members SET exemption_reason = ?2 WHERE netid = ?1;",
            params![netid, exemption.map(|value| value.reason.as_str())],
        )?;
        if changed == 0 {
            return Err(RepoError::MemberNotFound(netid.to_string()));
        }

        tx.execute("DELETE FROM member_exemptions WHERE netid = ?1;", [netid])?;
        if let Some(exemption) = exemption {
            insert_exemption_kinds(&tx, netid, &exemption.kinds)?;
        }

        tx.commit()?;
        Ok(())
    }
}

/// Loads one fully hydrated member, if present.
pub(crate) fn load_member(conn: &Connection, netid: &str) -> RepoResult<Option<Member>> {
    let mut stmt = conn.prepare(&format!("{MEMBER_SELECT_SQL} WHERE members.netid = ?1;"))?;
    let mut rows = stmt.query([netid])?;
    match rows.next()? {
        Some(row) => Ok(Some(hydrate_member(conn, parse_member_row(row)?)?)),
        None => Ok(None),
    }
}

/// Exemption kinds are filled in by `hydrate_member`.
struct MemberRow {
    member: Member,
    exemption_reason: Option<String>,
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<MemberRow> {
    let residency_text: String = row.get("residency")?;
    let residency = Residency::parse(&residency_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid residency `{residency_text}` in members.residency"
        ))
    })?;

    let mut member = Member::new(
        row.get::<_, String>("netid")?,
        row.get::<_, String>("name")?,
    );
    member.email = row.get("email")?;
    member.phone = row.get("phone")?;
    member.class = MemberClass {
        name: row.get("class_name")?,
        semester: row.get("class_semester")?,
    };
    member.residency = residency;
    member.position = row.get("position")?;

    Ok(MemberRow {
        member,
        exemption_reason: row.get("exemption_reason")?,
    })
}

fn hydrate_member(conn: &Connection, row: MemberRow) -> RepoResult<Member> {
    let MemberRow {
        mut member,
        exemption_reason,
    } = row;

    let mut stmt =
        conn.prepare("SELECT duty_type, total FROM member_credits WHERE netid = ?1;")?;
    let mut rows = stmt.query([member.netid.as_str()])?;
    while let Some(row) = rows.next()? {
        let kind_text: String = row.get("duty_type")?;
        let kind = parse_duty_type(&kind_text, "member_credits.duty_type")?;
        member.credits.insert(kind, row.get("total")?);
    }

    let mut stmt = conn.prepare(
        "SELECT duty_id, type, day
         FROM member_duty_refs
         WHERE netid = ?1
         ORDER BY day ASC, duty_id ASC;",
    )?;
    let mut rows = stmt.query([member.netid.as_str()])?;
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("duty_id")?;
        let kind_text: String = row.get("type")?;
        member.duties.push(DutyRef {
            duty_id: parse_duty_id(&id_text, "member_duty_refs.duty_id")?,
            kind: parse_duty_type(&kind_text, "member_duty_refs.type")?,
            day: row.get("day")?,
        });
    }

    let mut stmt = conn.prepare("SELECT duty_type FROM member_exemptions WHERE netid = ?1;")?;
    let mut rows = stmt.query([member.netid.as_str()])?;
    let mut kinds = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let kind_text: String = row.get(0)?;
        kinds.insert(parse_duty_type(&kind_text, "member_exemptions.duty_type")?);
    }

    member.exemption = match exemption_reason {
        Some(reason) => Some(Exemption { reason, kinds }),
        None if kinds.is_empty() => None,
        None => {
            return Err(RepoError::InvalidData(format!(
                "member {} has exempt duty types without an exemption reason",
                member.netid
            )));
        }
    };

    Ok(member)
}

fn insert_exemption_kinds(
    tx: &Transaction<'_>,
    netid: &str,
    kinds: &BTreeSet<DutyType>,
) -> RepoResult<()> {
    for kind in kinds {
        tx.execute(
            "INSERT INTO member_exemptions (netid, duty_type) VALUES (?1, ?2);",
            params![netid, kind.as_str()],
        )?;
    }
    Ok(())
}
