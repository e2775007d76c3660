//! Inbound commands from operator consoles.
//!
//! Raw input is validated here; the engine behind it assumes well-formed values.

use chrono::{DateTime, Utc};

use crate::{
    events::{DomainEvent, EventKind, FopId, Issuer},
    registry::FieldOfPlayRegistry,
    timer::{TimerController, TimerSnapshot},
};

fn controller_for(registry: &FieldOfPlayRegistry, fop_id: &str) -> Result<TimerController, String> {
    let fop_id = fop_id.trim();
    if fop_id.is_empty() {
        return Err("field of play is required".into());
    }
    Ok(registry.controller(&FopId::new(fop_id)))
}

fn issuer_from(issuer: &str) -> Result<Issuer, String> {
    let issuer = issuer.trim();
    if issuer.is_empty() {
        return Err("issuer is required".into());
    }
    Ok(Issuer::new(issuer))
}

fn check_duration(label: &str, ms: i64) -> Result<i64, String> {
    if ms < 0 {
        return Err(format!("{label} must not be negative (got {ms})"));
    }
    Ok(ms)
}

fn parse_end_time(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| format!("invalid end time '{value}': {err}"))
}

pub fn get_timer_state(registry: &FieldOfPlayRegistry, fop_id: &str) -> Result<TimerSnapshot, String> {
    Ok(controller_for(registry, fop_id)?.get_snapshot())
}

pub async fn start_timer(
    registry: &FieldOfPlayRegistry,
    fop_id: &str,
    issuer: &str,
) -> Result<TimerSnapshot, String> {
    let issuer = issuer_from(issuer)?;
    let controller = controller_for(registry, fop_id)?;
    controller
        .start(issuer)
        .await
        .map_err(|e| e.to_string())
}

pub async fn stop_timer(
    registry: &FieldOfPlayRegistry,
    fop_id: &str,
    issuer: &str,
) -> Result<TimerSnapshot, String> {
    let issuer = issuer_from(issuer)?;
    let controller = controller_for(registry, fop_id)?;
    controller
        .stop(issuer)
        .await
        .map_err(|e| e.to_string())
}

pub async fn set_indefinite(
    registry: &FieldOfPlayRegistry,
    fop_id: &str,
    issuer: &str,
) -> Result<TimerSnapshot, String> {
    let issuer = issuer_from(issuer)?;
    let controller = controller_for(registry, fop_id)?;
    controller
        .set_indefinite(issuer)
        .await
        .map_err(|e| e.to_string())
}

pub async fn set_duration(
    registry: &FieldOfPlayRegistry,
    fop_id: &str,
    issuer: &str,
    duration_ms: i64,
) -> Result<TimerSnapshot, String> {
    let issuer = issuer_from(issuer)?;
    let duration_ms = check_duration("duration", duration_ms)?;
    let controller = controller_for(registry, fop_id)?;
    controller
        .set_duration(issuer, duration_ms)
        .await
        .map_err(|e| e.to_string())
}

/// `end_time` is RFC 3339; `None` clears the target and keeps the live remaining time.
pub async fn set_target_end_time(
    registry: &FieldOfPlayRegistry,
    fop_id: &str,
    issuer: &str,
    end_time: Option<&str>,
) -> Result<TimerSnapshot, String> {
    let issuer = issuer_from(issuer)?;
    let end = end_time.map(parse_end_time).transpose()?;
    let controller = controller_for(registry, fop_id)?;
    controller
        .set_target_end_time(issuer, end)
        .await
        .map_err(|e| e.to_string())
}

pub async fn signal_time_over(
    registry: &FieldOfPlayRegistry,
    fop_id: &str,
    issuer: &str,
) -> Result<bool, String> {
    let issuer = issuer_from(issuer)?;
    let controller = controller_for(registry, fop_id)?;
    controller
        .signal_time_over(issuer)
        .await
        .map_err(|e| e.to_string())
}

pub async fn post_event(
    registry: &FieldOfPlayRegistry,
    fop_id: &str,
    event: DomainEvent,
) -> Result<TimerSnapshot, String> {
    issuer_from(event.origin().as_str())?;
    match event.kind() {
        EventKind::BreakStarted {
            duration_ms: Some(ms),
            ..
        } => {
            check_duration("break duration", *ms)?;
        }
        EventKind::ForceTime { allowed_ms } => {
            check_duration("allowed time", *allowed_ms)?;
        }
        _ => {}
    }
    let controller = controller_for(registry, fop_id)?;
    controller.apply(event).await.map_err(|e| e.to_string())
}
