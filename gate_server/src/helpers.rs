use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::OnceLock,
};

use actix_http::h1;
use actix_web::{dev::Payload, web, HttpRequest};
use log::*;
use regex::Regex;

use crate::config::ProxyConfig;

static FORWARDED_FOR: OnceLock<Option<Regex>> = OnceLock::new();

fn forwarded_for_pattern() -> Option<&'static Regex> {
    FORWARDED_FOR.get_or_init(|| Regex::new(r#"(?i)for=(?P<ip>[^;,]+)"#).ok()).as_ref()
}

/// Parses an address as it may appear in a proxy header: bare, quoted, bracketed, or with a port.
fn parse_ip(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');
    IpAddr::from_str(value.trim_start_matches('[').trim_end_matches(']'))
        .ok()
        .or_else(|| SocketAddr::from_str(value).ok().map(|a| a.ip()))
}

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The first entry of the `X-Forwarded-For` header, iif `use_x_forwarded_for` is set in the configuration.
/// 2. The `for=` field of the `Forwarded` header, iif `use_forwarded` is set in the configuration.
/// 3. The peer address of the connection.
pub fn get_remote_ip(req: &HttpRequest, proxy: ProxyConfig) -> Option<IpAddr> {
    let mut result = None;
    if proxy.use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(parse_ip);
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if proxy.use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .zip(forwarded_for_pattern())
            .and_then(|(v, re)| re.captures(v))
            .and_then(|caps| caps.name("ip"))
            .and_then(|m| parse_ip(m.as_str()));
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {peer_addr:?}");
        peer_addr
    })
}

/// Puts a body that has already been read back onto the request, so that downstream extractors can read it again.
pub fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
