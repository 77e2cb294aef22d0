//! Status command for showing the running timesheet.

use std::fmt::Display;
use std::io::Write;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use ft_core::{ActiveEntry, SideMapping, TimeEntryClient, TimesheetApi};

pub async fn run<W, A, Tz>(
    writer: &mut W,
    client: &TimeEntryClient<A>,
    sides: &SideMapping,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    A: TimesheetApi,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let active = client.fetch_active().await?;
    render(writer, active.as_ref(), sides, tz)
}

fn render<W, Tz>(
    writer: &mut W,
    active: Option<&ActiveEntry>,
    sides: &SideMapping,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(entry) = active else {
        writeln!(writer, "Not tracking.")?;
        return Ok(());
    };

    let elapsed = (Utc::now() - entry.begin).num_minutes().max(0);
    writeln!(writer, "Tracking {}", entry.label)?;
    writeln!(writer, "Entry:    {}", entry.id)?;
    writeln!(writer, "Activity: {}", entry.activity)?;
    writeln!(
        writer,
        "Since:    {} ({}h {:02}m)",
        entry.begin.with_timezone(tz).format("%Y-%m-%d %H:%M"),
        elapsed / 60,
        elapsed % 60
    )?;
    match sides.face_for(entry.activity) {
        Some(face) => writeln!(writer, "Side:     {face}")?,
        None => writeln!(writer, "Side:     none")?,
    }
    Ok(())
}
