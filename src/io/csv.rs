use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::sim::data::{FlightDataBranch, FlightDataType};

/// Write one branch as CSV.
///
/// The header row names every recorded channel with its unit; each following
/// row is one sample. Flight events are interleaved as `# Event` comment
/// lines just before the first sample at or after the event time.
pub fn write_branch<W: Write>(writer: &mut W, branch: &FlightDataBranch) -> io::Result<()> {
    let types: Vec<FlightDataType> = branch.types().collect();
    let columns: Vec<&[f64]> = types.iter().filter_map(|&t| branch.get(t)).collect();

    writeln!(writer, "# {}", branch.name())?;
    let header: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    writeln!(writer, "{}", header.join(","))?;

    let times = branch.get(FlightDataType::Time).unwrap_or(&[]);
    let mut events = branch.events().iter().filter(|e| e.kind.is_logged()).peekable();

    for row in 0..branch.len() {
        let t = times.get(row).copied().unwrap_or(f64::NAN);
        while let Some(e) = events.next_if(|e| e.time <= t) {
            writeln!(writer, "# Event {} occurred at t={:.4} s", e.kind, e.time)?;
        }
        let cells: Vec<String> = columns.iter().map(|c| format_value(c[row])).collect();
        writeln!(writer, "{}", cells.join(","))?;
    }
    for e in events {
        writeln!(writer, "# Event {} occurred at t={:.4} s", e.kind, e.time)?;
    }
    Ok(())
}

/// Write every branch to one file, separated by a blank line.
pub fn write_branches_file(path: impl AsRef<Path>, branches: &[FlightDataBranch]) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    for (i, b) in branches.iter().enumerate() {
        if i > 0 {
            writeln!(file)?;
        }
        write_branch(&mut file, b)?;
    }
    file.flush()
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v:.6}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::event::{FlightEvent, FlightEventType};

    fn branch() -> FlightDataBranch {
        let mut b = FlightDataBranch::new("Sustainer");
        for (t, z) in [(0.0, 0.0), (0.5, 10.0), (1.0, 15.0)] {
            b.add_point();
            b.set_value(FlightDataType::Time, t);
            b.set_value(FlightDataType::Altitude, z);
        }
        b.set_value(FlightDataType::Thrust, 4.0);
        b.add_event(FlightEvent::new(0.0, FlightEventType::Launch));
        b.add_event(FlightEvent::new(0.7, FlightEventType::Burnout));
        b.add_event(FlightEvent::new(2.0, FlightEventType::SimulationEnd));
        b
    }

    #[test]
    fn header_rows_and_events() {
        let mut buf = Vec::new();
        write_branch(&mut buf, &branch()).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "# Sustainer");
        assert_eq!(lines[1], "Time (s),Altitude (m),Thrust (N)");
        assert_eq!(lines[2], "# Event LAUNCH occurred at t=0.0000 s");
        assert_eq!(lines[3], "0.000000,0.000000,NaN");
        assert_eq!(lines[4], "0.500000,10.000000,NaN");
        assert!(lines[5].starts_with("# Event BURNOUT"));
        assert_eq!(lines[6], "1.000000,15.000000,4.000000");
        assert!(lines[7].starts_with("# Event SIMULATION_END"));
        assert_eq!(lines.len(), 8);
    }
}
