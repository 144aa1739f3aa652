use super::columns;
use crate::error::{CoreError, CoreResult};
use std::path::Path;
use std::time::Duration;

/// `typeperf` invocation sampling the same counters as the sysinfo sampler.
/// `typeperf -si` takes whole seconds, so `interval` is rounded up with a floor of one.
pub fn typeperf_command(
    target_process: &str,
    interval: Duration,
    output: &Path,
) -> (&'static str, Vec<String>) {
    let interval_secs = interval.as_millis().div_ceil(1000).max(1);
    let args = vec![
        r"\Processor(_Total)\% Processor Time".to_string(),
        r"\Memory\Available MBytes".to_string(),
        r"\Memory\% Committed Bytes In Use".to_string(),
        r"\PhysicalDisk(_Total)\Disk Reads/sec".to_string(),
        r"\PhysicalDisk(_Total)\Disk Writes/sec".to_string(),
        r"\Network Interface(*)\Bytes Total/sec".to_string(),
        format!(r"\Process({target_process})\% Processor Time"),
        format!(r"\Process({target_process})\Working Set - Private"),
        "-si".to_string(),
        interval_secs.to_string(),
        "-o".to_string(),
        output.display().to_string(),
        "-y".to_string(),
    ];
    ("typeperf", args)
}

/// Decode a counter file written as UTF-8 or UTF-16 (with or without BOM).
pub fn decode_text(bytes: &[u8]) -> CoreResult<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec())
            .map_err(|_| CoreError::Encoding("UTF-8 input".to_string()));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }
    decode_utf16(bytes, u16::from_le_bytes)
        .or_else(|_| decode_utf16(bytes, u16::from_be_bytes))
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> CoreResult<String> {
    if bytes.len() % 2 != 0 {
        return Err(CoreError::Encoding("UTF-16 input of odd length".to_string()));
    }
    let units = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|_| CoreError::Encoding("UTF-16 input".to_string()))
}

/// Layout detected by [`clean_counter_csv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvLayout {
    /// `typeperf` output with a PDH header; rewritten with `n` network columns.
    Typeperf { network_interfaces: usize },
    /// Already canonical; copied as is.
    Canonical,
}

/// Rewrite a raw counter file into UTF-8 with canonical column names.
pub fn clean_counter_csv(input: &Path, output: &Path) -> CoreResult<CsvLayout> {
    let bytes = std::fs::read(input)?;
    let text = decode_text(&bytes)
        .map_err(|_| CoreError::Encoding(input.display().to_string()))?;

    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| CoreError::validation(format!("{} is empty", input.display())))?;

    let layout = if header.contains("PDH-CSV") || header.contains("Network Interface") {
        CsvLayout::Typeperf {
            network_interfaces: header.matches("Network Interface").count(),
        }
    } else {
        CsvLayout::Canonical
    };

    let mut cleaned = String::with_capacity(text.len());
    match layout {
        CsvLayout::Typeperf { network_interfaces } => {
            let mut names = vec![
                columns::TIMESTAMP.to_string(),
                columns::CPU_TOTAL.to_string(),
                columns::MEMORY_AVAILABLE_MB.to_string(),
                columns::MEMORY_USED_PERCENT.to_string(),
                columns::DISK_READS.to_string(),
                columns::DISK_WRITES.to_string(),
            ];
            names.extend((1..=network_interfaces).map(columns::network));
            names.push(columns::TARGET_CPU.to_string());
            names.push(columns::TARGET_MEMORY_BYTES.to_string());
            cleaned.push_str(&names.join(","));
            cleaned.push('\n');
        }
        CsvLayout::Canonical => {
            cleaned.push_str(header);
            cleaned.push('\n');
        }
    }
    for line in lines.filter(|l| !l.trim().is_empty()) {
        cleaned.push_str(line);
        cleaned.push('\n');
    }

    std::fs::write(output, cleaned)?;
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TYPEPERF: &str = "\"(PDH-CSV 4.0) (Coordinated Universal Time)(0)\",\"\\\\HOST\\Processor(_Total)\\% Processor Time\",\"\\\\HOST\\Memory\\Available MBytes\",\"\\\\HOST\\Memory\\% Committed Bytes In Use\",\"\\\\HOST\\PhysicalDisk(_Total)\\Disk Reads/sec\",\"\\\\HOST\\PhysicalDisk(_Total)\\Disk Writes/sec\",\"\\\\HOST\\Network Interface(eth0)\\Bytes Total/sec\",\"\\\\HOST\\Network Interface(wifi)\\Bytes Total/sec\",\"\\\\HOST\\Process(dotnet)\\% Processor Time\",\"\\\\HOST\\Process(dotnet)\\Working Set - Private\"\r\n\"01/15/2025 10:00:00.123\",\"12.5\",\"8000\",\"40\",\"1\",\"2\",\"100\",\"50\",\"3.5\",\"104857600\"\r\n";

    fn utf16le_with_bom(text: &str) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_decode_variants() {
        assert_eq!(decode_text(b"a,b\n").unwrap(), "a,b\n");
        assert_eq!(decode_text(&[0xEF, 0xBB, 0xBF, b'x']).unwrap(), "x");
        assert_eq!(decode_text(&utf16le_with_bom("Timestamp")).unwrap(), "Timestamp");

        let mut be = vec![0xFE, 0xFF];
        for unit in "ok".encode_utf16() {
            be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text(&be).unwrap(), "ok");
    }

    #[test]
    fn test_clean_typeperf_utf16() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw.csv");
        let clean = dir.path().join("clean.csv");
        std::fs::write(&raw, utf16le_with_bom(TYPEPERF)).unwrap();

        let layout = clean_counter_csv(&raw, &clean).unwrap();
        assert_eq!(layout, CsvLayout::Typeperf { network_interfaces: 2 });

        let text = std::fs::read_to_string(&clean).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Timestamp,CPU_Total_Percent,Memory_Available_MB,Memory_Used_Percent,\
             Disk_Reads_PerSec,Disk_Writes_PerSec,Network1_Bytes_PerSec,Network2_Bytes_PerSec,\
             Target_CPU_Percent,Target_Memory_Bytes"
        );
        assert!(lines.next().unwrap().starts_with("\"01/15/2025 10:00:00.123\""));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_clean_canonical_is_copied() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("raw.csv");
        let clean = dir.path().join("clean.csv");
        std::fs::write(&raw, "Timestamp,CPU_Total_Percent\n01/15/2025 10:00:00.000,5\n").unwrap();

        assert_eq!(clean_counter_csv(&raw, &clean).unwrap(), CsvLayout::Canonical);
        assert_eq!(
            std::fs::read_to_string(&clean).unwrap(),
            "Timestamp,CPU_Total_Percent\n01/15/2025 10:00:00.000,5\n"
        );
    }

    #[test]
    fn test_typeperf_command_targets_process() {
        let (program, args) =
            typeperf_command("java", Duration::from_secs(1), Path::new("perf.csv"));
        assert_eq!(program, "typeperf");
        assert!(args.contains(&r"\Process(java)\% Processor Time".to_string()));
        assert_eq!(args.iter().position(|a| a == "-o").map(|i| &args[i + 1]), Some(&"perf.csv".to_string()));
    }

    #[test]
    fn test_typeperf_interval_follows_settings() {
        let interval_arg = |ms| {
            let (_, args) = typeperf_command("java", Duration::from_millis(ms), Path::new("perf.csv"));
            let si = args.iter().position(|a| a == "-si").unwrap();
            args[si + 1].clone()
        };
        assert_eq!(interval_arg(0), "1");
        assert_eq!(interval_arg(500), "1");
        assert_eq!(interval_arg(1000), "1");
        assert_eq!(interval_arg(2500), "3");
        assert_eq!(interval_arg(5000), "5");
    }
}
