//! Duty ledger repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide duty reads by day window, by type and by member.
//! - Own the ledger writes: create, update, delete and credit adjustment.
//!   Each one is a single immediate transaction spanning the duty rows,
//!   every affected credit total and every affected back-reference.
//!
//! # Invariants
//! - Assignment rows carry `assigned`, `assigned_names` and `credits` in
//!   one row per member, so the three key sets cannot diverge on disk.
//! - `member_credits.total` changes only by the signed credit of the
//!   assignment being added, removed or corrected.
//! - Day-window reads run in one read transaction and return exactly one
//!   list per requested day, in request order.

use super::{bool_to_int, parse_duty_id, parse_duty_type, parse_flag, RepoError, RepoResult};
use crate::model::change::{AssignmentConflict, AssignmentDiff, CreditAdjustment, DutyChange};
use crate::model::duty::{
    day_key, Duty, DutyDate, DutyId, DutyType, DutyValidationError, DEFAULT_ASSIGNMENT_CREDIT,
};
use chrono::NaiveDate;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::time::Instant;

/// Input for creating one duty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyDraft {
    pub kind: DutyType,
    pub name: String,
    pub date: DutyDate,
    /// Assignee netids in display order.
    pub assignees: Vec<String>,
}

/// Replacement name, date and assignee list for an existing duty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyEdit {
    pub name: String,
    pub date: DutyDate,
    pub assignees: Vec<String>,
}

/// Repository interface for duties and the credit ledger.
pub trait DutyRepository {
    /// Loads one duty by id.
    fn get_duty(&self, id: &DutyId) -> RepoResult<Option<Duty>>;
    /// Lists duties of `kind` for each day, one list per day, by name.
    fn list_duties_by_days(&self, kind: DutyType, days: &[NaiveDate])
        -> RepoResult<Vec<Vec<Duty>>>;
    /// Lists duties of `kind` by time; optionally only those with an
    /// unchecked assignee.
    fn list_duties_by_type(&self, kind: DutyType, only_unchecked: bool) -> RepoResult<Vec<Duty>>;
    /// Lists duties of `kind` held by one member, by time.
    fn list_duties_for_member(&self, netid: &str, kind: DutyType) -> RepoResult<Vec<Duty>>;
    /// Finds candidates already holding a duty of `kind` on `day`.
    fn find_conflicts(
        &self,
        kind: DutyType,
        day: &str,
        netids: &[String],
        exclude: Option<&DutyId>,
    ) -> RepoResult<Vec<AssignmentConflict>>;
    /// Creates one duty and credits every assignee.
    fn create_duty(&self, draft: &DutyDraft) -> RepoResult<Duty>;
    /// Rewrites name, date and assignees of one duty.
    fn update_duty(&self, id: &DutyId, edit: &DutyEdit) -> RepoResult<DutyChange>;
    /// Deletes one duty and reverses every credit it granted.
    fn delete_duty(&self, id: &DutyId) -> RepoResult<Duty>;
    /// Corrects one member's credit on one duty and marks it checked.
    fn adjust_credit(&self, id: &DutyId, netid: &str, value: f64)
        -> RepoResult<CreditAdjustment>;
}

/// SQLite-backed duty repository.
pub struct SqliteDutyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDutyRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn write_tx(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl DutyRepository for SqliteDutyRepository<'_> {
    fn get_duty(&self, id: &DutyId) -> RepoResult<Option<Duty>> {
        load_duty(self.conn, id)
    }

    fn list_duties_by_days(
        &self,
        kind: DutyType,
        days: &[NaiveDate],
    ) -> RepoResult<Vec<Vec<Duty>>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let mut per_day = Vec::with_capacity(days.len());
        for day in days {
            let ids = query_ids(
                &tx,
                "SELECT id FROM duties
                 WHERE type = ?1 AND day = ?2
                 ORDER BY name ASC, id ASC;",
                params![kind.as_str(), day_key(*day)],
            )?;
            per_day.push(load_duties(&tx, &ids)?);
        }
        tx.commit()?;
        Ok(per_day)
    }

    fn list_duties_by_type(&self, kind: DutyType, only_unchecked: bool) -> RepoResult<Vec<Duty>> {
        let ids = query_ids(
            self.conn,
            "SELECT id FROM duties
             WHERE type = ?1
               AND (?2 = 0 OR EXISTS (
                    SELECT 1
                    FROM duty_assignments a
                    WHERE a.duty_id = duties.id
                      AND a.checked = 0
               ))
             ORDER BY time ASC, name ASC, id ASC;",
            params![kind.as_str(), bool_to_int(only_unchecked)],
        )?;
        load_duties(self.conn, &ids)
    }

    fn list_duties_for_member(&self, netid: &str, kind: DutyType) -> RepoResult<Vec<Duty>> {
        let ids = query_ids(
            self.conn,
            "SELECT d.id FROM duties d
             INNER JOIN duty_assignments a ON a.duty_id = d.id
             WHERE a.netid = ?1 AND d.type = ?2
             ORDER BY d.time ASC, d.name ASC, d.id ASC;",
            params![netid, kind.as_str()],
        )?;
        load_duties(self.conn, &ids)
    }

    fn find_conflicts(
        &self,
        kind: DutyType,
        day: &str,
        netids: &[String],
        exclude: Option<&DutyId>,
    ) -> RepoResult<Vec<AssignmentConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.netid, r.duty_id, d.name, r.day
             FROM member_duty_refs r
             INNER JOIN duties d ON d.id = r.duty_id
             WHERE r.type = ?1
               AND r.day = ?2
               AND r.netid = ?3
               AND (?4 IS NULL OR r.duty_id <> ?4)
             ORDER BY d.name ASC, r.duty_id ASC;",
        )?;

        let mut seen = BTreeSet::new();
        let mut conflicts = Vec::new();
        for netid in netids {
            if !seen.insert(netid.as_str()) {
                continue;
            }
            let mut rows = stmt.query(params![
                kind.as_str(),
                day,
                netid.as_str(),
                exclude.map(DutyId::as_str)
            ])?;
            while let Some(row) = rows.next()? {
                let id_text: String = row.get(1)?;
                conflicts.push(AssignmentConflict {
                    netid: row.get(0)?,
                    duty_id: parse_duty_id(&id_text, "member_duty_refs.duty_id")?,
                    duty_name: row.get(2)?,
                    kind,
                    day: row.get(3)?,
                });
            }
        }
        Ok(conflicts)
    }

    fn create_duty(&self, draft: &DutyDraft) -> RepoResult<Duty> {
        let started_at = Instant::now();
        let result = (|| -> RepoResult<Duty> {
            let tx = self.write_tx()?;
            let mut duty = Duty::new(draft.kind, draft.name.trim(), draft.date.clone());
            for netid in &draft.assignees {
                if duty.is_assigned(netid) {
                    return Err(DutyValidationError::DuplicateAssignee(netid.clone()).into());
                }
                let name = member_name(&tx, netid)?;
                duty.assign(netid.as_str(), name, DEFAULT_ASSIGNMENT_CREDIT);
            }
            duty.validate()?;

            insert_duty_row(&tx, &duty)?;
            insert_assignments(&tx, &duty)?;
            for netid in &duty.assigned {
                increment_credit(&tx, netid, duty.kind, DEFAULT_ASSIGNMENT_CREDIT)?;
                insert_ref(&tx, netid, &duty)?;
            }

            tx.commit()?;
            Ok(duty)
        })();

        log_write("duty_create", started_at, &result, |duty| {
            format!(
                "duty_id={} type={} assignees={}",
                duty.id,
                duty.kind,
                duty.assigned.len()
            )
        });
        result
    }

    fn update_duty(&self, id: &DutyId, edit: &DutyEdit) -> RepoResult<DutyChange> {
        let started_at = Instant::now();
        let result = (|| -> RepoResult<DutyChange> {
            let tx = self.write_tx()?;
            let before =
                load_duty(&tx, id)?.ok_or_else(|| RepoError::DutyNotFound(id.clone()))?;
            let diff = AssignmentDiff::between(&before.assigned, &edit.assignees);

            let mut after = before.clone();
            after.name = edit.name.trim().to_string();
            after.date = edit.date.clone();
            for netid in &diff.removed {
                after.unassign(netid);
            }
            for netid in &diff.added {
                let name = member_name(&tx, netid)?;
                after.assign(netid.as_str(), name, DEFAULT_ASSIGNMENT_CREDIT);
            }
            after.assigned = edit.assignees.clone();
            after.validate()?;

            for netid in &diff.removed {
                let credit = before.credit_for(netid).unwrap_or(0.0);
                increment_credit(&tx, netid, before.kind, -credit)?;
                delete_ref(&tx, netid, &before.id)?;
            }
            for netid in &diff.added {
                increment_credit(&tx, netid, after.kind, DEFAULT_ASSIGNMENT_CREDIT)?;
            }

            tx.execute(
                "UPDATE duties
                 SET
                    name = ?2,
                    day = ?3,
                    time = ?4,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![
                    after.id.as_str(),
                    after.name.as_str(),
                    after.date.day.as_str(),
                    after.date.time
                ],
            )?;
            tx.execute(
                "DELETE FROM duty_assignments WHERE duty_id = ?1;",
                [after.id.as_str()],
            )?;
            insert_assignments(&tx, &after)?;
            tx.execute(
                "UPDATE member_duty_refs SET day = ?2 WHERE duty_id = ?1;",
                params![after.id.as_str(), after.date.day.as_str()],
            )?;
            for netid in &diff.added {
                insert_ref(&tx, netid, &after)?;
            }

            tx.commit()?;
            Ok(DutyChange::Updated {
                before,
                after,
                diff,
            })
        })();

        log_write("duty_update", started_at, &result, |change| match change {
            DutyChange::Updated { after, diff, .. } => format!(
                "duty_id={} type={} added={} removed={} retained={}",
                after.id,
                after.kind,
                diff.added.len(),
                diff.removed.len(),
                diff.retained.len()
            ),
            other => format!("duty_id={}", other.duty_id()),
        });
        result
    }

    fn delete_duty(&self, id: &DutyId) -> RepoResult<Duty> {
        let started_at = Instant::now();
        let result = (|| -> RepoResult<Duty> {
            let tx = self.write_tx()?;
            let duty = load_duty(&tx, id)?.ok_or_else(|| RepoError::DutyNotFound(id.clone()))?;

            for netid in &duty.assigned {
                let credit = duty.credit_for(netid).unwrap_or(0.0);
                increment_credit(&tx, netid, duty.kind, -credit)?;
                delete_ref(&tx, netid, &duty.id)?;
            }
            tx.execute(
                "DELETE FROM duty_assignments WHERE duty_id = ?1;",
                [duty.id.as_str()],
            )?;
            tx.execute("DELETE FROM duties WHERE id = ?1;", [duty.id.as_str()])?;

            tx.commit()?;
            Ok(duty)
        })();

        log_write("duty_delete", started_at, &result, |duty| {
            format!(
                "duty_id={} type={} assignees={}",
                duty.id,
                duty.kind,
                duty.assigned.len()
            )
        });
        result
    }

    fn adjust_credit(
        &self,
        id: &DutyId,
        netid: &str,
        value: f64,
    ) -> RepoResult<CreditAdjustment> {
        let started_at = Instant::now();
        let result = (|| -> RepoResult<CreditAdjustment> {
            if !value.is_finite() {
                return Err(DutyValidationError::NonFiniteCredit(netid.to_string()).into());
            }

            let tx = self.write_tx()?;
            let kind_text: String = tx
                .query_row("SELECT type FROM duties WHERE id = ?1;", [id.as_str()], |row| {
                    row.get(0)
                })
                .optional()?
                .ok_or_else(|| RepoError::DutyNotFound(id.clone()))?;
            let kind = parse_duty_type(&kind_text, "duties.type")?;

            let old_value: f64 = tx
                .query_row(
                    "SELECT credits FROM duty_assignments WHERE duty_id = ?1 AND netid = ?2;",
                    params![id.as_str(), netid],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| RepoError::NotAssigned {
                    duty_id: id.clone(),
                    netid: netid.to_string(),
                })?;

            tx.execute(
                "UPDATE duty_assignments
                 SET credits = ?3, checked = 1
                 WHERE duty_id = ?1 AND netid = ?2;",
                params![id.as_str(), netid, value],
            )?;
            let adjustment = CreditAdjustment {
                duty_id: id.clone(),
                kind,
                netid: netid.to_string(),
                old_value,
                new_value: value,
            };
            increment_credit(&tx, netid, kind, adjustment.delta())?;

            tx.commit()?;
            Ok(adjustment)
        })();

        log_write("credit_adjust", started_at, &result, |adjustment| {
            format!(
                "duty_id={} type={} delta={}",
                adjustment.duty_id,
                adjustment.kind,
                adjustment.delta()
            )
        });
        result
    }
}

fn log_write<T>(
    event: &str,
    started_at: Instant,
    result: &RepoResult<T>,
    describe: impl FnOnce(&T) -> String,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(value) => info!(
            "event={event} module=repo status=ok duration_ms={duration_ms} {}",
            describe(value)
        ),
        Err(err) => error!(
            "event={event} module=repo status=error duration_ms={duration_ms} error={err}"
        ),
    }
}

fn query_ids(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> RepoResult<Vec<DutyId>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get(0)?;
        ids.push(parse_duty_id(&id_text, "duties.id")?);
    }
    Ok(ids)
}

fn load_duties(conn: &Connection, ids: &[DutyId]) -> RepoResult<Vec<Duty>> {
    ids.iter()
        .map(|id| {
            load_duty(conn, id)?.ok_or_else(|| {
                RepoError::InvalidData(format!("duty {id} vanished during read"))
            })
        })
        .collect()
}

fn load_duty(conn: &Connection, id: &DutyId) -> RepoResult<Option<Duty>> {
    let row = conn
        .query_row(
            "SELECT type, name, day, time FROM duties WHERE id = ?1;",
            [id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((kind_text, name, day, time)) = row else {
        return Ok(None);
    };

    let kind = parse_duty_type(&kind_text, "duties.type")?;
    let mut duty = Duty::with_id(id.clone(), kind, name, DutyDate { day, time });

    let mut stmt = conn.prepare(
        "SELECT netid, assigned_name, credits, checked
         FROM duty_assignments
         WHERE duty_id = ?1
         ORDER BY slot ASC;",
    )?;
    let mut rows = stmt.query([id.as_str()])?;
    while let Some(row) = rows.next()? {
        let netid: String = row.get("netid")?;
        let name: String = row.get("assigned_name")?;
        duty.assign(netid.as_str(), name, row.get("credits")?);
        if parse_flag(row.get("checked")?, "duty_assignments.checked")? {
            duty.checked.insert(netid);
        }
    }

    duty.validate().map_err(|err| {
        RepoError::InvalidData(format!("stored duty {id} violates invariants: {err}"))
    })?;
    Ok(Some(duty))
}

fn member_name(tx: &Transaction<'_>, netid: &str) -> RepoResult<String> {
    tx.query_row("SELECT name FROM members WHERE netid = ?1;", [netid], |row| {
        row.get(0)
    })
    .optional()?
    .ok_or_else(|| RepoError::MemberNotFound(netid.to_string()))
}

fn insert_duty_row(tx: &Transaction<'_>, duty: &Duty) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO duties (id, type, name, day, time) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            duty.id.as_str(),
            duty.kind.as_str(),
            duty.name.as_str(),
            duty.date.day.as_str(),
            duty.date.time
        ],
    )?;
    Ok(())
}

fn insert_assignments(tx: &Transaction<'_>, duty: &Duty) -> RepoResult<()> {
    for (slot, netid) in duty.assigned.iter().enumerate() {
        let name = duty.assigned_names.get(netid).map(String::as_str).unwrap_or("");
        let credit = duty.credit_for(netid).unwrap_or(DEFAULT_ASSIGNMENT_CREDIT);
        tx.execute(
            "INSERT INTO duty_assignments (
                duty_id,
                netid,
                slot,
                assigned_name,
                credits,
                checked
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                duty.id.as_str(),
                netid.as_str(),
                slot as i64,
                name,
                credit,
                bool_to_int(duty.checked.contains(netid))
            ],
        )?;
    }
    Ok(())
}

fn increment_credit(
    tx: &Transaction<'_>,
    netid: &str,
    kind: DutyType,
    delta: f64,
) -> RepoResult<()> {
    let changed = tx.execute(
        "UPDATE member_credits
         SET total = total + ?3
         WHERE netid = ?1 AND duty_type = ?2;",
        params![netid, kind.as_str(), delta],
    )?;
    if changed == 0 {
        return Err(RepoError::MemberNotFound(netid.to_string()));
    }
    Ok(())
}

fn insert_ref(tx: &Transaction<'_>, netid: &str, duty: &Duty) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO member_duty_refs (netid, duty_id, type, day) VALUES (?1, ?2, ?3, ?4);",
        params![
            netid,
            duty.id.as_str(),
            duty.kind.as_str(),
            duty.date.day.as_str()
        ],
    )?;
    Ok(())
}

fn delete_ref(tx: &Transaction<'_>, netid: &str, duty_id: &DutyId) -> RepoResult<()> {
    tx.execute(
        "DELETE FROM member_duty_refs WHERE netid = ?1 AND duty_id = ?2;",
        params![netid, duty_id.as_str()],
    )?;
    Ok(())
}
