//! Identity of the machine the agent runs on.
//!
//! Addresses are discovered by running the platform's network tools
//! (`hostname -I`, `ipconfig`, `ifconfig`, `getmac`) and parsing their output.
//! The parsers are plain functions over text so they can be tested anywhere.

use tracing::warn;

/// MAC reported when no usable interface is found
pub const UNKNOWN_MAC: &str = "00:00:00:00:00:00";
/// IP reported when no usable address is found
pub const FALLBACK_IP: &str = "127.0.0.1";

/// What the agent reports about itself at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineInfo {
    /// Host name
    pub hostname: String,
    /// Primary IPv4 address
    pub ip: String,
    /// MAC of the first active non-loopback interface
    pub mac_address: String,
    /// Agent version
    pub app_version: String,
}

impl MachineInfo {
    /// Collects hostname, IP, MAC and version of the current machine.
    #[must_use]
    pub fn detect(preferred_prefix: &str) -> Self {
        let ip = detect_ip(preferred_prefix).unwrap_or_else(|| {
            warn!("No IPv4 address found, falling back to loopback");
            FALLBACK_IP.to_string()
        });
        let mac_address = detect_mac().unwrap_or_else(|| {
            warn!("No MAC address found");
            UNKNOWN_MAC.to_string()
        });

        Self {
            hostname: hostname(),
            ip,
            mac_address,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Host name of the machine, or "Unknown".
#[must_use]
pub fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new(program).args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
}

/// First candidate starting with `preferred_prefix`, else the first one.
#[must_use]
pub fn pick_ip(candidates: &[String], preferred_prefix: &str) -> Option<String> {
    if !preferred_prefix.is_empty() {
        if let Some(ip) = candidates.iter().find(|ip| ip.starts_with(preferred_prefix)) {
            return Some(ip.clone());
        }
    }
    candidates.first().cloned()
}

fn is_usable_ipv4(candidate: &str) -> bool {
    candidate
        .parse::<std::net::Ipv4Addr>()
        .is_ok_and(|ip| !ip.is_loopback() && !ip.is_unspecified() && !ip.is_link_local())
}

/// IPv4 addresses from `hostname -I` output.
#[must_use]
pub fn parse_hostname_i(stdout: &str) -> Vec<String> {
    stdout
        .split_whitespace()
        .filter(|s| is_usable_ipv4(s))
        .map(ToString::to_string)
        .collect()
}

/// IPv4 addresses from `ipconfig` output.
#[must_use]
pub fn parse_ipconfig(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| line.contains("IPv4"))
        .filter_map(|line| line.split(':').nth(1))
        .map(|ip| ip.trim().trim_end_matches("(Preferred)").trim())
        .filter(|ip| is_usable_ipv4(ip))
        .map(ToString::to_string)
        .collect()
}

/// IPv4 addresses from `ifconfig` output (`inet 10.0.0.5 netmask ...`).
#[must_use]
pub fn parse_ifconfig_inet(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("inet "))
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|ip| ip.trim_start_matches("addr:"))
        .filter(|ip| is_usable_ipv4(ip))
        .map(ToString::to_string)
        .collect()
}

/// Primary IPv4 address, preferring `preferred_prefix`.
#[must_use]
pub fn detect_ip(preferred_prefix: &str) -> Option<String> {
    #[cfg(target_os = "linux")]
    let candidates = run("hostname", &["-I"])
        .map(|out| parse_hostname_i(&out))
        .unwrap_or_default();

    #[cfg(target_os = "windows")]
    let candidates = run("ipconfig", &[])
        .map(|out| parse_ipconfig(&out))
        .unwrap_or_default();

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    let candidates = run("ifconfig", &[])
        .map(|out| parse_ifconfig_inet(&out))
        .unwrap_or_default();

    pick_ip(&candidates, preferred_prefix)
}

fn is_usable_mac(mac: &str) -> bool {
    let hex: String = mac.chars().filter(char::is_ascii_hexdigit).collect();
    hex.len() == 12 && hex.chars().any(|c| c != '0')
}

/// MAC addresses from `getmac /fo csv /nh` output, in listed order.
#[must_use]
pub fn parse_getmac(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split(',').next())
        .map(|field| field.trim().trim_matches('"').replace('-', ":"))
        .filter(|mac| is_usable_mac(mac))
        .collect()
}

/// MAC addresses from `ifconfig` output (`ether aa:bb:...`).
#[must_use]
pub fn parse_ifconfig_ether(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ether "))
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|mac| is_usable_mac(mac))
        .map(str::to_uppercase)
        .collect()
}

#[cfg(target_os = "linux")]
fn linux_interfaces_mac() -> Option<String> {
    let mut entries: Vec<_> = std::fs::read_dir("/sys/class/net")
        .ok()?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_name() != "lo")
        .collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    entries.iter().find_map(|entry| {
        let path = entry.path();
        let up = std::fs::read_to_string(path.join("operstate"))
            .is_ok_and(|state| state.trim() == "up");
        let mac = std::fs::read_to_string(path.join("address")).ok()?;
        let mac = mac.trim();
        (up && is_usable_mac(mac)).then(|| mac.to_uppercase())
    })
}

/// MAC of the first active non-loopback interface.
#[must_use]
pub fn detect_mac() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        linux_interfaces_mac()
    }

    #[cfg(target_os = "windows")]
    {
        run("getmac", &["/fo", "csv", "/nh"])
            .and_then(|out| parse_getmac(&out).into_iter().next())
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        run("ifconfig", &[]).and_then(|out| parse_ifconfig_ether(&out).into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_ip_prefers_prefix() {
        let ips = vec!["192.168.0.7".to_string(), "10.224.3.14".to_string()];
        assert_eq!(pick_ip(&ips, "10.224").as_deref(), Some("10.224.3.14"));
        assert_eq!(pick_ip(&ips, "172.16").as_deref(), Some("192.168.0.7"));
        assert_eq!(pick_ip(&[], "10.224"), None);
    }

    #[test]
    fn test_parse_hostname_i_skips_ipv6_and_loopback() {
        let out = "10.224.3.14 127.0.0.1 fe80::1 192.168.0.7 \n";
        assert_eq!(parse_hostname_i(out), vec!["10.224.3.14", "192.168.0.7"]);
    }

    #[test]
    fn test_parse_ipconfig() {
        let out = "\
Ethernet adapter Ethernet:
   IPv4 Address. . . . . . . . . . . : 10.224.3.14(Preferred)
   Subnet Mask . . . . . . . . . . . : 255.255.255.0
Wireless LAN adapter Wi-Fi:
   IPv4 Address. . . . . . . . . . . : 192.168.0.7
";
        assert_eq!(parse_ipconfig(out), vec!["10.224.3.14", "192.168.0.7"]);
    }

    #[test]
    fn test_parse_ifconfig() {
        let out = "\
lo0: flags=8049<UP,LOOPBACK,RUNNING,MULTICAST> mtu 16384
\tinet 127.0.0.1 netmask 0xff000000
en0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
\tether a4:83:e7:12:34:56
\tinet 10.224.3.14 netmask 0xffffff00 broadcast 10.224.3.255
";
        assert_eq!(parse_ifconfig_inet(out), vec!["10.224.3.14"]);
        assert_eq!(parse_ifconfig_ether(out), vec!["A4:83:E7:12:34:56"]);
    }

    #[test]
    fn test_parse_getmac_skips_disabled_adapters() {
        let out = "\"00-00-00-00-00-00\",\"Media disconnected\"\n\"A4-83-E7-12-34-56\",\"\\Device\\Tcpip_{X}\"\n";
        assert_eq!(parse_getmac(out), vec!["A4:83:E7:12:34:56"]);
    }
}
