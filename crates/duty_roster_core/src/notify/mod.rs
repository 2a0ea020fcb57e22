//! Outbound member notifications.
//!
//! # Responsibility
//! - Turn committed duty changes into SMS notices for affected members.
//! - Keep the SMS transport behind the `SmsSender` seam.

pub mod trigger;

pub use trigger::{
    format_duty_day, plan_notices, render_message, DispatchReport, LogSmsSender, Notice,
    NoticeKind, NotificationTrigger, SmsError, SmsSender,
};
