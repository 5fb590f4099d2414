//! FTP reply parsing
//!
//! Replies are a three digit code followed by text. Multi-line replies open
//! with `xyz-` and end with the first line starting `xyz `.

use std::net::{Ipv4Addr, SocketAddrV4};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub(crate) code: u16,
    pub(crate) lines: Vec<String>,
}

/// Whether a reply line continues (`-`) or terminates (` `) a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    Continued,
    Final,
}

/// Splits `"227 Entering Passive Mode"` into code, kind and text.
pub(crate) fn parse_reply_line(line: &str) -> Option<(u16, LineKind, &str)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let code: u16 = line[..3].parse().ok()?;
    if !(100..600).contains(&code) {
        return None;
    }
    match bytes.get(3) {
        None => Some((code, LineKind::Final, "")),
        Some(b' ') => Some((code, LineKind::Final, &line[4..])),
        Some(b'-') => Some((code, LineKind::Continued, &line[4..])),
        Some(_) => None,
    }
}

impl Reply {
    /// 1xx: more replies follow (data transfer opening)
    pub(crate) fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    pub(crate) fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub(crate) fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// 5xx: the command failed and will fail again as-is
    pub(crate) fn is_permanent_negative(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub(crate) fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Port announced by a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply.
    pub(crate) fn pasv_address(&self) -> Option<SocketAddrV4> {
        let text = self.lines.first()?;
        let start = text.find('(')?;
        let end = start + text[start..].find(')')?;
        let fields: Vec<u8> = text[start + 1..end]
            .split(',')
            .map(|f| f.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .ok()?;
        if fields.len() != 6 {
            return None;
        }
        let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
        let port = (u16::from(fields[4]) << 8) | u16::from(fields[5]);
        Some(SocketAddrV4::new(ip, port))
    }

    /// Port announced by a `229 Entering Extended Passive Mode (|||port|)` reply.
    pub(crate) fn epsv_port(&self) -> Option<u16> {
        let text = self.lines.first()?;
        let start = text.find('(')?;
        let end = start + text[start..].find(')')?;
        let inner = &text[start + 1..end];
        let mut chars = inner.chars();
        let delim = chars.next()?;
        let parts: Vec<&str> = inner.split(delim).collect();
        // "|||6446|" splits into ["", "", "", "6446", ""]
        if parts.len() != 5 {
            return None;
        }
        parts[3].parse().ok()
    }

    /// Directory named by a `257 "/path" is current directory` reply.
    pub(crate) fn quoted_path(&self) -> Option<String> {
        let text = self.lines.first()?;
        let start = text.find('"')?;
        let mut path = String::new();
        let mut chars = text[start + 1..].chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                // embedded quotes are doubled
                if chars.peek() == Some(&'"') {
                    chars.next();
                    path.push('"');
                    continue;
                }
                return Some(path);
            }
            path.push(c);
        }
        None
    }
}
