use exif::{In, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use time::macros::format_description;
use time::PrimitiveDateTime;

/// Best known capture time of a media file in Unix milliseconds.
///
/// EXIF `DateTimeOriginal`, then `DateTime`, then the filesystem modified
/// and created timestamps. Returns `None` only if none of them is readable.
pub fn capture_millis(path: &Path) -> Option<i64> {
    let file_meta = std::fs::metadata(path).ok();

    let exif = match File::open(path) {
        Ok(file) => {
            let mut reader = BufReader::new(file);
            match exif::Reader::new().read_from_container(&mut reader) {
                Ok(exif) => Some(exif),
                Err(e) => {
                    log::debug!("CaptureDate: no EXIF in {:?}: {}", path, e);
                    None
                }
            }
        }
        Err(e) => {
            log::warn!("CaptureDate: failed to open {:?}: {}", path, e);
            None
        }
    };

    let from_exif = exif.as_ref().and_then(|exif| {
        [Tag::DateTimeOriginal, Tag::DateTime]
            .iter()
            .filter_map(|tag| exif.get_field(*tag, In::PRIMARY))
            .find_map(|field| parse_exif_datetime(&field.display_value().to_string()))
    });

    from_exif
        .or_else(|| {
            file_meta
                .as_ref()
                .and_then(|m| m.modified().ok())
                .and_then(system_time_millis)
        })
        .or_else(|| {
            file_meta
                .as_ref()
                .and_then(|m| m.created().ok())
                .and_then(system_time_millis)
        })
}

/// Parse the `YYYY-MM-DD HH:MM:SS` form kamadak-exif displays, or the raw
/// `YYYY:MM:DD HH:MM:SS` EXIF form. EXIF has no zone, so UTC is assumed.
pub fn parse_exif_datetime(raw: &str) -> Option<i64> {
    let raw = raw.trim().trim_matches('"');
    let display = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let native = format_description!("[year]:[month]:[day] [hour]:[minute]:[second]");

    let parsed = PrimitiveDateTime::parse(raw, display)
        .or_else(|_| PrimitiveDateTime::parse(raw, native))
        .ok()?;
    let nanos = parsed.assume_utc().unix_timestamp_nanos();
    Some((nanos / 1_000_000) as i64)
}

fn system_time_millis(system_time: SystemTime) -> Option<i64> {
    let since = system_time.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since.as_millis()).ok()
}
