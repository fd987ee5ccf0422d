//! Rorze cancel code decoder
//! Converts 4-hex-digit cancel codes to human-readable messages

/// Decode a cancel code to a human-readable message
pub fn decode_cancel(code: u16) -> String {
    match code {
        0x0001 => "Command not designated".to_string(),
        0x0002 => "The designated target motion not equipped".to_string(),
        0x0003 => "Too many/too few parameters (number of elements)".to_string(),
        0x0004 => "Command not equipped".to_string(),
        0x0005 => "Too many/too few parameters".to_string(),
        0x0006 => "Abnormal range of the parameter".to_string(),
        0x0007 => "Abnormal mode".to_string(),
        0x0008 => "Abnormal data".to_string(),
        0x0009 => "System in preparation".to_string(),
        0x000A => "Origin search not completed".to_string(),
        0x000B => "Moving/Processing".to_string(),
        0x000C => "No motion".to_string(),
        0x000D => "Abnormal flash memory".to_string(),
        0x000E => "Insufficient memory".to_string(),
        0x000F => "Error-occurred state".to_string(),
        0x0010 => "Origin search is completed but the motion cannot be started due to interlock".to_string(),
        0x0011 => "The emergency stop signal is turned on.".to_string(),
        0x0012 => "The temporarily stop signal is turned on.".to_string(),
        0x0013 => "Abnormal interlock signal".to_string(),
        0x0014 => "Drive power is turned off.".to_string(),
        0x0015 => "Not excited".to_string(),
        0x0016 => "Abnormal current position".to_string(),
        0x0017 => "Abnormal target position".to_string(),
        0x0018 => "Command processing".to_string(),
        0x0019 => "Invalid work state".to_string(),
        _ => format!("Unknown cancel code: {:04X}", code),
    }
}

/// Parse the payload of a cancel frame (`"000B"`)
pub fn parse_cancel_code(payload: &str) -> Option<u16> {
    let code = payload.trim();
    if code.len() != 4 {
        return None;
    }
    u16::from_str_radix(code, 16).ok()
}

/// Decode a raw cancel payload, keeping the text when it is not a code
pub fn describe_cancel(payload: &str) -> String {
    match parse_cancel_code(payload) {
        Some(code) => decode_cancel(code),
        None => format!("Unrecognised cancel payload: {}", payload.trim()),
    }
}

/// Format cancel message with code and description
pub fn format_cancel(code: u16) -> String {
    format!("cancel:{:04X} - {}", code, decode_cancel(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_codes() {
        assert_eq!(decode_cancel(0x0001), "Command not designated");
        assert_eq!(decode_cancel(0x000B), "Moving/Processing");
        assert_eq!(decode_cancel(0x0019), "Invalid work state");
    }

    #[test]
    fn test_decode_unknown_code() {
        assert_eq!(decode_cancel(0x0042), "Unknown cancel code: 0042");
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_cancel_code("000A"), Some(0x000A));
        assert_eq!(parse_cancel_code("000a"), Some(0x000A));
        assert_eq!(parse_cancel_code("A"), None);
        assert_eq!(parse_cancel_code("ZZZZ"), None);
        assert_eq!(describe_cancel("0014"), "Drive power is turned off.");
        assert_eq!(describe_cancel("oops"), "Unrecognised cancel payload: oops");
    }

    #[test]
    fn test_format_cancel() {
        assert_eq!(format_cancel(0x0011), "cancel:0011 - The emergency stop signal is turned on.");
    }
}
