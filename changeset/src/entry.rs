use std::{fmt::Write, time::SystemTime};

use changelist::{Changelist, LogEntry};

pub(crate) fn format(entry: &LogEntry) -> Result<String, std::fmt::Error> {
    // Build up a buffer and then write.
    let mut buf = String::new();
    match entry {
        LogEntry::Change(changelist) => format_change(&mut buf, changelist)?,
        LogEntry::Label(label) => writeln!(buf, "label {}", label)?,
    }
    writeln!(buf)?;

    Ok(buf)
}

fn format_change(buf: &mut String, changelist: &Changelist) -> std::fmt::Result {
    writeln!(buf, "change {}", changelist.id)?;
    writeln!(buf, "author {}", changelist.author)?;
    writeln!(buf, "client {}", changelist.client)?;
    writeln!(
        buf,
        "time {}",
        changelist
            .time
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|since| since.as_secs())
            .unwrap_or_default()
    )?;
    writeln!(
        buf,
        "data {}\n{}",
        changelist.description.len(),
        changelist.description
    )?;
    for file in changelist.files.iter() {
        match file.revision {
            Some(revision) => writeln!(
                buf,
                "file {} {} {}",
                file.action, revision, file.depot_path
            )?,
            None => writeln!(buf, "file {} - {}", file.action, file.depot_path)?,
        }
    }

    Ok(())
}
