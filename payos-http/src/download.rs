//! Binary download responses.

use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use payos::Error;
use payos::proto::FileDownload;
use percent_encoding::percent_decode_str;

use crate::client::api_error;
use crate::constants::OCTET_STREAM;

/// Turns a raw download response into a [`FileDownload`].
///
/// Non-2xx statuses and 2xx responses carrying a JSON body are API errors.
pub(crate) fn into_file(
    status: StatusCode,
    headers: &HeaderMap,
    body: Vec<u8>,
) -> Result<FileDownload, Error> {
    let content_type = header_str(headers, CONTENT_TYPE.as_str())
        .filter(|v| !v.is_empty())
        .unwrap_or(OCTET_STREAM)
        .to_owned();

    if !status.is_success()
        || (is_json(&content_type) && serde_json::from_slice::<serde_json::Value>(&body).is_ok())
    {
        return Err(api_error(status, headers, &body).into());
    }

    Ok(FileDownload {
        filename: header_str(headers, CONTENT_DISPOSITION.as_str()).and_then(filename),
        size: header_str(headers, CONTENT_LENGTH.as_str()).and_then(|v| v.trim().parse().ok()),
        content_type,
        data: body,
    })
}

/// Extracts the file name from a `Content-Disposition` value.
///
/// `filename*` (RFC 5987) wins over `filename`.
#[must_use]
pub fn filename(disposition: &str) -> Option<String> {
    let mut plain = None;
    for part in disposition.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.eq_ignore_ascii_case("filename*") {
            let encoded = value.split_once("''").map_or(value, |(_, rest)| rest);
            let decoded = percent_decode_str(encoded.trim_matches('"'))
                .decode_utf8_lossy()
                .into_owned();
            if !decoded.is_empty() {
                return Some(decoded);
            }
        } else if key.eq_ignore_ascii_case("filename") {
            let unquoted = value.trim_matches('"');
            if !unquoted.is_empty() {
                plain = Some(unquoted.to_owned());
            }
        }
    }
    plain
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json")
        || essence.to_ascii_lowercase().ends_with("+json")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
