//! ICMP echo implementation with native sockets and a command fallback.
//!
//! Uses blocking sockets in spawn_blocking so reply timing is not skewed
//! by the async scheduler.

use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::process::Command;

use super::{PingOutcome, Probe};

/// Echo payload size in bytes, zero-filled. Protocol constant, not a tunable.
const PAYLOAD_LEN: usize = 32;

/// Time-to-live applied to every native probe. Protocol constant.
const TTL: u32 = 128;

/// ICMP capability state
#[derive(Debug, Clone, Copy, PartialEq)]
enum IcmpCapability {
    /// Native ICMP sockets are available
    Native,
    /// Only command fallback is available
    CommandOnly,
}

static ICMP_CAPABILITY: OnceLock<IcmpCapability> = OnceLock::new();

/// Echo sequence counter for unique identification
static ECHO_SEQUENCE: AtomicU16 = AtomicU16::new(0);

/// Generate a unique (identifier, sequence) pair for one echo request.
fn next_echo_id() -> (u16, u16) {
    let identifier: u16 = rand::random();
    let sequence = ECHO_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    (identifier, sequence)
}

/// Detect ICMP capability by attempting to create a socket.
fn detect_icmp_capability() -> IcmpCapability {
    // Try RAW first (requires CAP_NET_RAW or root)
    if Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).is_ok() {
        tracing::info!("ping: using native ICMP (RAW socket, privileged)");
        return IcmpCapability::Native;
    }

    // Then DGRAM (unprivileged on Linux with ping_group_range set, or macOS)
    if Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4)).is_ok() {
        tracing::info!("ping: using native ICMP (DGRAM socket, unprivileged)");
        return IcmpCapability::Native;
    }

    tracing::info!("ping: native ICMP unavailable, using command fallback");
    IcmpCapability::CommandOnly
}

/// The production prober: one ICMP echo request per [`Probe::probe`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pinger;

#[async_trait]
impl Probe for Pinger {
    async fn probe(&self, host: &str, timeout: Duration) -> PingOutcome {
        let capability = *ICMP_CAPABILITY.get_or_init(detect_icmp_capability);

        if capability == IcmpCapability::CommandOnly {
            return run_ping_command(host, timeout).await;
        }

        // Resolve before spawn_blocking (DNS is async)
        let ip = match resolve_address(host).await {
            Ok(ip) => ip,
            Err(e) => return PingOutcome::Error(format!("resolving {}: {}", host, e)),
        };

        let result = tokio::task::spawn_blocking(move || run_blocking_ping(ip, timeout)).await;

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) if e.kind() == io::ErrorKind::PermissionDenied => {
                tracing::warn!(
                    "native ping to {} denied, falling back to the ping command: {}",
                    host,
                    e
                );
                run_ping_command(host, timeout).await
            }
            Ok(Err(e)) => classify_io_error(&e),
            Err(e) => PingOutcome::Error(format!("probe task failed: {}", e)),
        }
    }
}

/// Resolve hostname to IP address.
async fn resolve_address(host: &str) -> io::Result<IpAddr> {
    // Try direct parse first
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = tokio::net::lookup_host(format!("{}:0", host)).await?;
    addrs
        .next()
        .map(|sa| sa.ip())
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses found"))
}

/// Map a socket error from the blocking path onto a probe outcome.
fn classify_io_error(e: &io::Error) -> PingOutcome {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => PingOutcome::Timeout,
        io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
            PingOutcome::Unreachable
        }
        _ => PingOutcome::Error(e.to_string()),
    }
}

/// Run one blocking ICMP exchange. Runs on a spawn_blocking thread.
///
/// Protocol-level outcomes (reply, timeout, unreachable) come back in `Ok`;
/// socket failures come back in `Err` for [`classify_io_error`].
fn run_blocking_ping(ip: IpAddr, timeout: Duration) -> io::Result<PingOutcome> {
    match ip {
        IpAddr::V4(v4) => ping_v4(v4, timeout),
        IpAddr::V6(v6) => ping_v6(v6, timeout),
    }
}

/// ICMP Echo Request for IPv4.
fn ping_v4(ip: Ipv4Addr, timeout: Duration) -> io::Result<PingOutcome> {
    // RAW first (privileged), then DGRAM (unprivileged). DGRAM sockets get
    // their echo identifier rewritten by the kernel, so replies are matched
    // on sequence alone there; the kernel already demultiplexes by id.
    let (socket, raw) = match Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)) {
        Ok(s) => (s, true),
        Err(_) => (
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4))?,
            false,
        ),
    };

    socket.set_ttl(TTL)?;
    socket.set_write_timeout(Some(timeout))?;
    socket.set_read_timeout(Some(timeout))?;

    let dest = SocketAddr::new(IpAddr::V4(ip), 0);
    socket.connect(&dest.into())?;

    let (identifier, sequence) = next_echo_id();
    let packet = build_echo_request(identifier, sequence);

    // Start timing just before send
    let start = Instant::now();
    socket.send(&packet)?;

    // Receive until we see our reply or the deadline passes
    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Ok(PingOutcome::Timeout);
        }
        socket.set_read_timeout(Some(remaining))?;

        let mut buf: [MaybeUninit<u8>; 1500] = unsafe { MaybeUninit::uninit().assume_init() };
        let len = socket.recv(&mut buf)?;
        // SAFETY: recv initialized `len` bytes
        let buf: &[u8] = unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, len) };

        // Stop timing immediately after receive
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(PingOutcome::Timeout);
        }

        // RAW sockets deliver the IP header, DGRAM sockets only the ICMP message
        let icmp_offset = if !buf.is_empty() && buf[0] >> 4 == 4 { 20 } else { 0 };
        if len < icmp_offset + 8 {
            continue;
        }

        match buf[icmp_offset] {
            // Echo Reply
            0 => {
                let reply_id = u16::from_be_bytes([buf[icmp_offset + 4], buf[icmp_offset + 5]]);
                let reply_seq = u16::from_be_bytes([buf[icmp_offset + 6], buf[icmp_offset + 7]]);
                if (!raw || reply_id == identifier) && reply_seq == sequence {
                    return Ok(PingOutcome::Success(elapsed.as_millis() as u64));
                }
            }
            // Destination Unreachable. The socket is connected, so anything
            // delivered here concerns our destination.
            3 => return Ok(PingOutcome::Unreachable),
            _ => {}
        }
        // Not our packet, keep waiting
    }
}

/// ICMP Echo Request for IPv6.
fn ping_v6(ip: Ipv6Addr, timeout: Duration) -> io::Result<PingOutcome> {
    let (socket, raw) = match Socket::new(Domain::IPV6, Type::RAW, Some(Protocol::ICMPV6)) {
        Ok(s) => (s, true),
        Err(_) => (
            Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::ICMPV6))?,
            false,
        ),
    };

    socket.set_unicast_hops_v6(TTL)?;
    socket.set_write_timeout(Some(timeout))?;
    socket.set_read_timeout(Some(timeout))?;

    let dest = SocketAddr::new(IpAddr::V6(ip), 0);
    socket.connect(&dest.into())?;

    let (identifier, sequence) = next_echo_id();
    let packet = build_echo_request_v6(identifier, sequence);

    let start = Instant::now();
    socket.send(&packet)?;

    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Ok(PingOutcome::Timeout);
        }
        socket.set_read_timeout(Some(remaining))?;

        let mut buf: [MaybeUninit<u8>; 1500] = unsafe { MaybeUninit::uninit().assume_init() };
        let len = socket.recv(&mut buf)?;
        // SAFETY: recv initialized `len` bytes
        let buf: &[u8] = unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, len) };

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(PingOutcome::Timeout);
        }

        // ICMPv6 sockets never deliver the IP header
        if len < 8 {
            continue;
        }

        match buf[0] {
            // Echo Reply
            129 => {
                let reply_id = u16::from_be_bytes([buf[4], buf[5]]);
                let reply_seq = u16::from_be_bytes([buf[6], buf[7]]);
                if (!raw || reply_id == identifier) && reply_seq == sequence {
                    return Ok(PingOutcome::Success(elapsed.as_millis() as u64));
                }
            }
            // Destination Unreachable
            1 => return Ok(PingOutcome::Unreachable),
            _ => {}
        }
    }
}

/// Build an ICMP Echo Request packet (type 8, code 0) with the fixed
/// zero-filled payload.
fn build_echo_request(identifier: u16, sequence: u16) -> Vec<u8> {
    let mut packet = vec![0u8; 8 + PAYLOAD_LEN];

    packet[0] = 8; // Type: Echo Request
    packet[1] = 0; // Code: 0
    // Checksum at [2..4], computed below
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());

    let checksum = icmp_checksum(&packet);
    packet[2..4].copy_from_slice(&checksum.to_be_bytes());

    packet
}

/// Build an ICMPv6 Echo Request packet (type 128, code 0).
fn build_echo_request_v6(identifier: u16, sequence: u16) -> Vec<u8> {
    let mut packet = vec![0u8; 8 + PAYLOAD_LEN];

    packet[0] = 128; // Type: Echo Request
    packet[1] = 0; // Code: 0
    // Checksum at [2..4] is filled in by the kernel for ICMPv6
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());

    packet
}

/// Compute ICMP checksum (RFC 1071).
fn icmp_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut i = 0;

    while i < data.len() - 1 {
        sum += u16::from_be_bytes([data[i], data[i + 1]]) as u32;
        i += 2;
    }

    // Handle odd byte
    if i < data.len() {
        sum += (data[i] as u32) << 8;
    }

    // Fold 32-bit sum to 16 bits
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

/// Run ping via command execution (fallback when no ICMP socket can be
/// created). Sends the same 32-byte payload; TTL stays at the system
/// default here, there is no portable flag for it.
async fn run_ping_command(address: &str, timeout: Duration) -> PingOutcome {
    let timeout_secs = timeout.as_secs().max(1).to_string();
    let payload_len = PAYLOAD_LEN.to_string();

    let output = match Command::new("ping")
        .args(["-c", "1", "-s", payload_len.as_str(), "-W", timeout_secs.as_str(), address])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
    {
        Ok(out) => out,
        Err(e) => return PingOutcome::Error(format!("failed to execute ping: {}", e)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        return classify_command_failure(&stdout, &stderr);
    }

    match parse_ping_output(&stdout) {
        Some(ms) => PingOutcome::Success(ms),
        None => PingOutcome::Error(format!("failed to parse ping output: {}", stdout)),
    }
}

/// Classify a failed ping command run from its output.
fn classify_command_failure(stdout: &str, stderr: &str) -> PingOutcome {
    if stdout.contains("nreachable") || stderr.contains("nreachable") {
        return PingOutcome::Unreachable;
    }
    if stderr.contains("timeout")
        || stdout.contains("100% packet loss")
        || stdout.contains("100.0% packet loss")
    {
        return PingOutcome::Timeout;
    }
    PingOutcome::Error(format!("ping failed: {}", stdout))
}

/// Parse ping command output for latency in whole milliseconds.
fn parse_ping_output(output: &str) -> Option<u64> {
    // Pattern 1: Per-packet response "time=X.XXX ms" (Linux, some macOS)
    static RE_TIME: OnceLock<Regex> = OnceLock::new();
    let re_time = RE_TIME.get_or_init(|| Regex::new(r"time[=<](?P<val>[0-9.]+)\s*ms").unwrap());

    if let Some(caps) = re_time.captures(output) {
        if let Ok(ms) = caps["val"].parse::<f64>() {
            return Some(ms.round() as u64);
        }
    }

    // Pattern 2: Summary line "round-trip min/avg/max/stddev = X/X/X/X ms" (macOS)
    static RE_MACOS: OnceLock<Regex> = OnceLock::new();
    let re_macos = RE_MACOS.get_or_init(|| {
        Regex::new(r"round-trip\s+min/avg/max/stddev\s*=\s*([0-9.]+)/([0-9.]+)/([0-9.]+)").unwrap()
    });

    if let Some(caps) = re_macos.captures(output) {
        if let Ok(ms) = caps[2].parse::<f64>() {
            return Some(ms.round() as u64);
        }
    }

    // Pattern 3: Summary line "rtt min/avg/max/mdev = X/X/X/X ms" (Linux)
    static RE_LINUX: OnceLock<Regex> = OnceLock::new();
    let re_linux = RE_LINUX.get_or_init(|| {
        Regex::new(r"rtt\s+min/avg/max/mdev\s*=\s*([0-9.]+)/([0-9.]+)/([0-9.]+)").unwrap()
    });

    if let Some(caps) = re_linux.captures(output) {
        if let Ok(ms) = caps[2].parse::<f64>() {
            return Some(ms.round() as u64);
        }
    }

    None
}
