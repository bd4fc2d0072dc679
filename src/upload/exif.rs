use std::io::Cursor;

/// Identifier that opens every EXIF APP1 segment.
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Largest APP1 payload a JPEG marker length can describe.
const MAX_APP_SEGMENT_LEN: usize = 65533;

/// Extract the EXIF APP1 payload (`Exif\0\0` + TIFF block) from a JPEG.
///
/// Returns `None` if the file has no EXIF data. The bytes are returned
/// verbatim so they can be written back unchanged after re-encoding.
pub fn read_exif_segment(jpeg: &[u8]) -> Option<Vec<u8>> {
    let mut reader = Cursor::new(jpeg);
    let tiff = match exif::get_exif_attr_from_jpeg(&mut reader) {
        Ok(tiff) => tiff,
        Err(e) => {
            tracing::debug!("No EXIF data: {}", e);
            return None;
        }
    };

    let mut segment = Vec::with_capacity(EXIF_HEADER.len() + tiff.len());
    segment.extend_from_slice(EXIF_HEADER);
    segment.extend_from_slice(&tiff);

    if segment.len() > MAX_APP_SEGMENT_LEN {
        tracing::warn!(
            "EXIF block of {} bytes does not fit in one APP1 segment, dropping it",
            segment.len()
        );
        return None;
    }
    Some(segment)
}

/// Read the `DateTimeOriginal` EXIF tag from in-memory JPEG bytes.
///
/// Returns `None` if the data has no EXIF block or the tag is missing.
pub fn date_time_original(jpeg: &[u8]) -> Option<String> {
    let mut reader = Cursor::new(jpeg);
    let exif_data = exif::Reader::new().read_from_container(&mut reader).ok()?;
    exif_data
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .map(|field| field.display_value().to_string())
}
