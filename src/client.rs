//! Notification client: subscribe to a named trigger and print what arrives.

use crate::error::{Error, Result};
use crate::model::{Evaluation, Notification, Trigger};
use crate::selector::select_triggers;
use crate::service::{ChannelStatus, NotificationChannel, NotificationService};
use crate::timestamp;
use log::{debug, info};
use std::io::Write;

/// How a client run ended without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoMatchingTrigger,
    Interrupted,
    Closed,
}

pub fn subscribe_all<C, W>(channel: &mut C, triggers: &[&Trigger], out: &mut W) -> Result<usize>
where
    C: NotificationChannel,
    W: Write,
{
    let mut subscription_count = 0;
    for trigger in triggers {
        channel
            .subscribe(trigger.condition())
            .map_err(|source| Error::Subscribe {
                trigger: trigger.get_name().to_string(),
                source,
            })?;
        writeln!(
            out,
            "Subscribed to notifications of trigger \"{}\"",
            trigger.get_name()
        )?;
        subscription_count += 1;
    }
    Ok(subscription_count)
}

/// Writes the one-line description of `notification`.
pub fn print_notification<W: Write, E: Write>(
    notification: &Notification,
    out: &mut W,
    diag: &mut E,
) -> Result<()> {
    match notification.evaluation() {
        Evaluation::SessionConsumedSize => writeln!(out, "Received consumed size notification")?,
        Evaluation::BufferUsageLow | Evaluation::BufferUsageHigh => {
            writeln!(out, "Received buffer usage notification")?
        }
        Evaluation::SessionRotationOngoing => {
            writeln!(out, "Received session rotation ongoing notification")?
        }
        Evaluation::SessionRotationCompleted => {
            writeln!(out, "Received session rotation completed notification")?
        }
        evaluation @ Evaluation::EventRuleHit { .. } => {
            let trigger_name = evaluation.trigger_name()?;
            writeln!(
                out,
                "{} - Received notification of event rule trigger \"{}\"",
                timestamp::now(),
                trigger_name
            )?
        }
        Evaluation::Unknown(code) => writeln!(diag, "Unknown notification type ({code})")?,
    }
    Ok(())
}

/// Pulls and prints notifications until the channel is interrupted, closed,
/// or fails.
pub fn receive_loop<C, W, E>(channel: &mut C, out: &mut W, diag: &mut E) -> Result<Outcome>
where
    C: NotificationChannel,
    W: Write,
    E: Write,
{
    loop {
        match channel.next_notification() {
            ChannelStatus::Ok(notification) => {
                debug!(
                    "Notification for condition {}",
                    notification.condition().get_id()
                );
                print_notification(&notification, out, diag)?;
            }
            ChannelStatus::NotificationsDropped => writeln!(diag, "Dropped notification")?,
            ChannelStatus::Interrupted => return Ok(Outcome::Interrupted),
            ChannelStatus::Closed => {
                writeln!(diag, "Notification channel was closed by peer.")?;
                return Ok(Outcome::Closed);
            }
            ChannelStatus::Error(source) => return Err(Error::Communication { source }),
        }
        out.flush()?;
    }
}

/// Full client sequence against `service` for triggers named `trigger_name`.
pub fn run<S, W, E>(service: &mut S, trigger_name: &str, out: &mut W, diag: &mut E) -> Result<Outcome>
where
    S: NotificationService,
    W: Write,
    E: Write,
{
    let mut channel = service.create_channel()?;
    let triggers = service.list_triggers()?;
    info!("{} trigger(s) known to the service", triggers.len());

    let selected = select_triggers(&triggers, trigger_name, diag)?;
    let subscription_count = subscribe_all(&mut channel, &selected, out)?;
    if subscription_count == 0 {
        writeln!(out, "No matching trigger with a notify action found.")?;
        return Ok(Outcome::NoMatchingTrigger);
    }
    out.flush()?;

    receive_loop(&mut channel, out, diag)
}

/// Process exit status for a finished run: 0 for any clean outcome, 1 for a
/// fatal error.
pub fn exit_code(result: &Result<Outcome>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
