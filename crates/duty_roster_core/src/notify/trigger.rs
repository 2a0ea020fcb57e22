//! Duty change notification trigger.
//!
//! # Responsibility
//! - Plan one notice per affected member for each committed `DutyChange`.
//! - Render and send each notice, isolating failures per recipient.
//!
//! # Invariants
//! - Dispatch runs after the ledger batch committed and never undoes it.
//! - One failed or skipped recipient never stops the remaining sends.
//! - Logs carry netids and counts only, never phone numbers or bodies.

use crate::config::RosterConfig;
use crate::model::change::DutyChange;
use crate::model::duty::{Duty, DutyDate};
use crate::repo::member_repo::MemberRepository;
use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// SMS transport.
pub trait SmsSender {
    /// Sends one message to an E.164 phone number.
    fn send(&self, to: &str, body: &str) -> Result<(), SmsError>;
}

/// SMS transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsError {
    /// Provider refused the message.
    Rejected(String),
    /// Provider could not be reached.
    Transport(String),
}

impl Display for SmsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "sms rejected: {reason}"),
            Self::Transport(reason) => write!(f, "sms transport failed: {reason}"),
        }
    }
}

impl Error for SmsError {}

/// What happened to the recipient's assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Assigned,
    Unassigned,
    /// Still assigned, but the duty's name or date changed.
    Rescheduled,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Unassigned => "unassigned",
            Self::Rescheduled => "rescheduled",
        }
    }
}

/// One message owed to one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub netid: String,
    pub duty_name: String,
    pub date: DutyDate,
}

impl Notice {
    fn for_duty(kind: NoticeKind, netid: &str, duty: &Duty) -> Self {
        Self {
            kind,
            netid: netid.to_string(),
            duty_name: duty.name.clone(),
            date: duty.date.clone(),
        }
    }
}

/// Notices owed for one committed change, in assignee order.
pub fn plan_notices(change: &DutyChange) -> Vec<Notice> {
    match change {
        DutyChange::Created(duty) => duty
            .assigned
            .iter()
            .map(|netid| Notice::for_duty(NoticeKind::Assigned, netid, duty))
            .collect(),
        DutyChange::Deleted(duty) => duty
            .assigned
            .iter()
            .map(|netid| Notice::for_duty(NoticeKind::Unassigned, netid, duty))
            .collect(),
        DutyChange::Updated {
            before,
            after,
            diff,
        } => {
            let mut notices: Vec<Notice> = diff
                .added
                .iter()
                .map(|netid| Notice::for_duty(NoticeKind::Assigned, netid, after))
                .collect();
            notices.extend(
                diff.removed
                    .iter()
                    .map(|netid| Notice::for_duty(NoticeKind::Unassigned, netid, before)),
            );
            if before.name != after.name || before.date != after.date {
                notices.extend(
                    diff.retained
                        .iter()
                        .map(|netid| Notice::for_duty(NoticeKind::Rescheduled, netid, after)),
                );
            }
            notices
        }
    }
}

/// Formats a duty day as `Saturday, August 27th`.
pub fn format_duty_day(date: NaiveDate) -> String {
    format!(
        "{}, {} {}",
        date.format("%A"),
        date.format("%B"),
        ordinal(date.day())
    )
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}

/// Renders the SMS body for one notice.
pub fn render_message(first_name: &str, notice: &Notice) -> String {
    let day = notice
        .date
        .calendar_day()
        .map(format_duty_day)
        .unwrap_or_else(|| notice.date.day.clone());
    let duty = notice.duty_name.as_str();
    match notice.kind {
        NoticeKind::Assigned => {
            format!("Hi {first_name}, you have been assigned to \"{duty}\" on {day}")
        }
        NoticeKind::Unassigned => {
            format!("Hi {first_name}, you have been unassigned from \"{duty}\" on {day}")
        }
        NoticeKind::Rescheduled => {
            format!("Hi {first_name}, your duty \"{duty}\" has moved to {day}")
        }
    }
}

/// Per-dispatch delivery counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub sent: usize,
    /// Recipient missing or without a phone number.
    pub skipped: usize,
    pub failed: usize,
}

/// Sends notices for committed duty changes.
pub struct NotificationTrigger<S: SmsSender> {
    sender: S,
    country_code: String,
}

impl<S: SmsSender> NotificationTrigger<S> {
    pub fn new(sender: S, config: &RosterConfig) -> Self {
        Self {
            sender,
            country_code: config.sms_country_code.clone(),
        }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Messages every member affected by `change`.
    ///
    /// Failures are logged and counted per recipient; nothing is retried.
    pub fn dispatch<M: MemberRepository>(&self, change: &DutyChange, members: &M) -> DispatchReport {
        let event = change.event_name();
        let duty_id = change.duty_id();
        let mut report = DispatchReport::default();

        for notice in plan_notices(change) {
            let member = match members.get_member(&notice.netid) {
                Ok(Some(member)) => member,
                Ok(None) => {
                    warn!(
                        "event=notify_send module=notify status=skipped trigger={event} duty_id={duty_id} netid={} reason=unknown_member",
                        notice.netid
                    );
                    report.skipped += 1;
                    continue;
                }
                Err(err) => {
                    warn!(
                        "event=notify_send module=notify status=error trigger={event} duty_id={duty_id} netid={} error={err}",
                        notice.netid
                    );
                    report.failed += 1;
                    continue;
                }
            };

            if member.phone.is_empty() {
                warn!(
                    "event=notify_send module=notify status=skipped trigger={event} duty_id={duty_id} netid={} reason=no_phone",
                    notice.netid
                );
                report.skipped += 1;
                continue;
            }

            let to = format!("{}{}", self.country_code, member.phone);
            let body = render_message(member.first_name(), &notice);
            match self.sender.send(&to, &body) {
                Ok(()) => report.sent += 1,
                Err(err) => {
                    warn!(
                        "event=notify_send module=notify status=error trigger={event} duty_id={duty_id} netid={} kind={} error={err}",
                        notice.netid,
                        notice.kind.as_str()
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            "event=notify_dispatch module=notify status=ok trigger={event} duty_id={duty_id} sent={} skipped={} failed={}",
            report.sent, report.skipped, report.failed
        );
        report
    }
}

/// Sender that records a log line instead of contacting a provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSmsSender;

impl SmsSender for LogSmsSender {
    fn send(&self, _to: &str, body: &str) -> Result<(), SmsError> {
        info!(
            "event=sms_send module=notify status=ok transport=log body_chars={}",
            body.chars().count()
        );
        Ok(())
    }
}
