use std::net::Ipv4Addr;
use std::time::Duration;

/// The router's own address on the link to `neighbor`
/// (same network, last octet 1). E.g. 192.168.0.2 -> 192.168.0.1
pub fn local_address(neighbor: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = neighbor.octets();
    Ipv4Addr::new(a, b, c, 1)
}

fn fit_with_remainder(dividend: u64, divisor: u64) -> (u64, u64) {
    let fit = dividend / divisor;
    let remainder = dividend % divisor;
    (fit, remainder)
}

/// Given a duration, format like "00:00:00"
pub fn format_elapsed_time(elapsed: Duration) -> String {
    let (hours, remainder) = fit_with_remainder(elapsed.as_secs(), 3600);
    let (minutes, seconds) = fit_with_remainder(remainder, 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
