// PDF text extraction
//
// Minimal extractor for text-based PDFs: locates content streams, inflates
// FlateDecode data, and collects string operands inside BT/ET text objects.
// Scanned or exotic PDFs yield the no-text marker instead of an error so the
// pipeline keeps moving.

use flate2::read::ZlibDecoder;
use std::io::Read;

pub fn extract_pdf_text(data: &[u8]) -> String {
    let mut out = String::new();

    for (start, end) in find_streams(data) {
        let raw = &data[start..end];
        let decoded = inflate(raw).unwrap_or_else(|| raw.to_vec());
        collect_text(&decoded, &mut out);
    }

    let trimmed = out.trim();
    if trimmed.is_empty() {
        "[No extractable text found in PDF]".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Byte ranges of `stream ... endstream` bodies.
fn find_streams(data: &[u8]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut pos = 0;

    while let Some(idx) = find(data, b"stream", pos) {
        let mut body = idx + b"stream".len();
        // The keyword is followed by CRLF or LF before the body
        if data.get(body) == Some(&b'\r') {
            body += 1;
        }
        if data.get(body) == Some(&b'\n') {
            body += 1;
        }
        match find(data, b"endstream", body) {
            Some(end) => {
                ranges.push((body, end));
                pos = end + b"endstream".len();
            }
            None => break,
        }
    }
    ranges
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).ok()?;
    Some(out)
}

/// Walk a content stream and append string operands found inside text
/// objects (BT .. ET). Line-advance operators become newlines.
fn collect_text(stream: &[u8], out: &mut String) {
    let mut i = 0;
    let mut in_text = false;
    let mut wrote = false;

    while i < stream.len() {
        match stream[i] {
            b'(' if in_text => {
                let (text, next) = parse_literal(stream, i + 1);
                if !text.is_empty() {
                    if wrote {
                        out.push(' ');
                    }
                    out.push_str(&text);
                    wrote = true;
                }
                i = next;
            }
            b'<' if in_text && stream.get(i + 1) != Some(&b'<') => {
                let (text, next) = parse_hex(stream, i + 1);
                if !text.is_empty() {
                    if wrote {
                        out.push(' ');
                    }
                    out.push_str(&text);
                    wrote = true;
                }
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == b'*' => {
                let start = i;
                while i < stream.len()
                    && (stream[i].is_ascii_alphanumeric() || stream[i] == b'*')
                {
                    i += 1;
                }
                match &stream[start..i] {
                    b"BT" => in_text = true,
                    b"ET" => {
                        in_text = false;
                        if wrote {
                            out.push('\n');
                            wrote = false;
                        }
                    }
                    b"Td" | b"TD" | b"T*" => {
                        if wrote {
                            out.push('\n');
                            wrote = false;
                        }
                    }
                    _ => {}
                }
            }
            _ => i += 1,
        }
    }
}

/// Literal string body: handles nesting and backslash escapes. Returns the
/// decoded text and the index just past the closing paren.
fn parse_literal(stream: &[u8], mut i: usize) -> (String, usize) {
    let mut depth = 1usize;
    let mut text = String::new();

    while i < stream.len() {
        match stream[i] {
            b'\\' => {
                i += 1;
                match stream.get(i) {
                    Some(b'n') => text.push('\n'),
                    Some(b'r') | Some(b't') | Some(b'b') | Some(b'f') => text.push(' '),
                    Some(b'(') => text.push('('),
                    Some(b')') => text.push(')'),
                    Some(b'\\') => text.push('\\'),
                    Some(c) if c.is_ascii_digit() => {
                        // Octal escape: consume up to three digits
                        let mut value = 0u32;
                        let mut digits = 0;
                        while digits < 3 {
                            match stream.get(i) {
                                Some(d) if d.is_ascii_digit() => {
                                    value = value * 8 + (d - b'0') as u32;
                                    i += 1;
                                    digits += 1;
                                }
                                _ => break,
                            }
                        }
                        i -= 1;
                        if let Some(c) = char::from_u32(value) {
                            if !c.is_control() {
                                text.push(c);
                            }
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            b'(' => {
                depth += 1;
                text.push('(');
                i += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return (text, i + 1);
                }
                text.push(')');
                i += 1;
            }
            c => {
                if c == b'\n' || c == b'\r' {
                    text.push(' ');
                } else if !c.is_ascii_control() {
                    text.push(c as char);
                }
                i += 1;
            }
        }
    }
    (text, i)
}

/// Hex string body `<48656c6c6f>` decoded pairwise, non-printables dropped.
fn parse_hex(stream: &[u8], mut i: usize) -> (String, usize) {
    let mut digits = Vec::new();
    while i < stream.len() && stream[i] != b'>' {
        if stream[i].is_ascii_hexdigit() {
            digits.push(stream[i]);
        }
        i += 1;
    }
    // An odd digit count gets a trailing zero pad
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }

    let mut text = String::new();
    for pair in digits.chunks(2) {
        let hi = (pair[0] as char).to_digit(16).unwrap_or(0);
        let lo = (pair[1] as char).to_digit(16).unwrap_or(0);
        let byte = (hi * 16 + lo) as u8;
        if byte.is_ascii() && !byte.is_ascii_control() {
            text.push(byte as char);
        }
    }
    (text, i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn wrap_pdf(stream_body: &[u8]) -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n1 0 obj\n<< /Length 99 >>\nstream\n");
        pdf.extend_from_slice(stream_body);
        pdf.extend_from_slice(b"\nendstream\nendobj\n%%EOF");
        pdf
    }

    #[test]
    fn test_extracts_literal_strings() {
        let pdf = wrap_pdf(b"BT /F1 12 Tf (Regional poverty report) Tj (page one) Tj ET");
        let text = extract_pdf_text(&pdf);
        assert!(text.contains("Regional poverty report"));
        assert!(text.contains("page one"));
    }

    #[test]
    fn test_extracts_flate_compressed_stream() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(b"BT (Compressed allocation data) Tj ET")
            .unwrap();
        let compressed = encoder.finish().unwrap();

        let pdf = wrap_pdf(&compressed);
        let text = extract_pdf_text(&pdf);
        assert!(text.contains("Compressed allocation data"));
    }

    #[test]
    fn test_strings_outside_text_objects_ignored() {
        let pdf = wrap_pdf(b"(not shown) BT (shown) Tj ET");
        let text = extract_pdf_text(&pdf);
        assert!(text.contains("shown"));
        assert!(!text.contains("not shown"));
    }

    #[test]
    fn test_escapes_and_nesting() {
        let pdf = wrap_pdf(br"BT (line one\nwith \(nested\) parens) Tj ET");
        let text = extract_pdf_text(&pdf);
        assert!(text.contains("line one"));
        assert!(text.contains("(nested) parens"));
    }

    #[test]
    fn test_hex_strings() {
        // "Hex" = 48 65 78
        let pdf = wrap_pdf(b"BT <486578> Tj ET");
        let text = extract_pdf_text(&pdf);
        assert!(text.contains("Hex"));
    }

    #[test]
    fn test_no_text_marker() {
        let text = extract_pdf_text(b"%PDF-1.4 nothing useful here");
        assert!(text.contains("No extractable text"));
    }

    #[test]
    fn test_line_breaks_on_td() {
        let pdf = wrap_pdf(b"BT (first line) Tj 0 -14 Td (second line) Tj ET");
        let text = extract_pdf_text(&pdf);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0].trim(), "first line");
        assert_eq!(lines[1].trim(), "second line");
    }
}
