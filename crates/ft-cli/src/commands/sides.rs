//! Sides command for listing the face-to-activity mapping.

use std::io::Write;

use anyhow::Result;
use ft_core::SideMapping;

pub fn run<W: Write>(writer: &mut W, sides: &SideMapping) -> Result<()> {
    for face in 1..=8 {
        match sides.activity_for(face) {
            Some(key) => writeln!(writer, "{face}: {key}")?,
            None => writeln!(writer, "{face}: -")?,
        }
    }
    Ok(())
}
