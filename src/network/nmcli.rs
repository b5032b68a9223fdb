//! Parsers for `nmcli --terse` output.
//!
//! Terse mode separates fields with `:` and escapes literal colons and
//! backslashes inside values with a backslash.

use super::AccessPoint;

/// Split one terse line into its fields, undoing `\:` and `\\` escapes.
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Wireless device names from `nmcli -t -f DEVICE,TYPE device`.
pub fn parse_wifi_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .map(split_terse)
        .filter(|f| f.len() >= 2 && f[1] == "wifi" && !f[0].is_empty())
        .map(|mut f| f.swap_remove(0))
        .collect()
}

/// Access points from `nmcli --terse --fields SSID,SIGNAL,SECURITY device wifi list`.
///
/// Hidden networks (empty SSID) are dropped, duplicates keep their strongest
/// entry, and the result is ordered strongest first.
pub fn parse_scan(output: &str) -> Vec<AccessPoint> {
    let mut aps: Vec<AccessPoint> = Vec::new();
    for fields in output.lines().map(split_terse) {
        if fields.len() < 3 || fields[0].is_empty() {
            continue;
        }
        let Ok(signal) = fields[1].trim().parse::<u8>() else {
            continue;
        };
        let security = fields[2].trim();
        let ap = AccessPoint {
            ssid: fields[0].clone(),
            signal,
            security: if security.is_empty() || security == "--" {
                String::new()
            } else {
                security.to_string()
            },
        };
        match aps.iter_mut().find(|a| a.ssid == ap.ssid) {
            Some(existing) if existing.signal < ap.signal => *existing = ap,
            Some(_) => {}
            None => aps.push(ap),
        }
    }
    aps.sort_by(|a, b| b.signal.cmp(&a.signal).then_with(|| a.ssid.cmp(&b.ssid)));
    aps
}
