//! Pre-parse JSON body cleanup.
//!
//! Payloads posted by shell pipelines and scraped sources occasionally
//! carry raw control characters that break strict JSON parsing. Rather
//! than rejecting those requests, the facade replaces every C0/C1 control
//! character with a space and trims the result before handing it to serde.

/// Replace control characters with spaces and trim the payload.
pub fn sanitize_json_payload(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}') {
                ' '
            } else {
                c
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}
