//! # Captive-Portal Protocol Handler
//!
//! Every HTTP request is classified before routing:
//!
//! 1. a `Host` that is not a literal IP address means the client asked for
//!    some other site (or is running a connectivity probe by domain name);
//!    it is redirected to the device itself;
//! 2. requests already addressed to an IP that hit `/` or a known probe path
//!    are answered with the landing page, never redirected again;
//! 3. everything else goes through the route table.
//!
//! Step 2 is what keeps clients that re-probe the device's own address out
//! of a redirect loop.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Connectivity-check paths used by Android, Windows and Apple clients.
pub const PROBE_PATHS: &[&str] = &[
    "/generate_204",
    "/gen_204",
    "/fwlink",
    "/hotspot-detect.html",
    "/ncsi.txt",
    "/connecttest.txt",
    "/success.txt",
    "/check_network_status.txt",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalDecision {
    /// Answer with a 302 to this location.
    Redirect(String),
    /// Serve the landing page.
    Landing,
    /// Continue to the route table.
    Route,
}

#[derive(Debug, Clone)]
pub struct CaptivePortal {
    device_ip: Ipv4Addr,
}

impl CaptivePortal {
    pub fn new(device_ip: Ipv4Addr) -> Self {
        Self { device_ip }
    }

    pub fn device_ip(&self) -> Ipv4Addr {
        self.device_ip
    }

    /// `http://<device ip>/`
    pub fn device_url(&self) -> String {
        format!("http://{}/", self.device_ip)
    }

    /// A missing or empty `Host` counts as addressed by IP.
    pub fn classify(&self, host: Option<&str>, path: &str) -> PortalDecision {
        let host = host.map(str::trim).unwrap_or_default();
        if !host.is_empty() && !is_literal_ip(host) {
            return PortalDecision::Redirect(self.device_url());
        }
        if path == "/" || is_probe_path(path) {
            PortalDecision::Landing
        } else {
            PortalDecision::Route
        }
    }
}

pub fn is_probe_path(path: &str) -> bool {
    PROBE_PATHS.iter().any(|probe| path.eq_ignore_ascii_case(probe))
}

/// Accepts `203.0.113.5`, `203.0.113.5:8080`, `[2001:db8::1]:80` and bare
/// IPv6 literals.
pub fn is_literal_ip(host: &str) -> bool {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((addr, port)) => {
                addr.parse::<Ipv6Addr>().is_ok() && (port.is_empty() || is_port_suffix(port))
            }
            None => false,
        };
    }
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    match host.rsplit_once(':') {
        Some((addr, port)) => addr.parse::<Ipv4Addr>().is_ok() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

fn is_port_suffix(s: &str) -> bool {
    s.strip_prefix(':').is_some_and(|p| p.parse::<u16>().is_ok())
}
