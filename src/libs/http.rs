// Thin wrappers around `ureq` for the two things the provisioner needs from
// the network: "is this host reachable?" and "fetch this file".

use crate::log_debug;
use colored::Colorize;
use std::io::{self, Read, Write};
use std::time::Duration;

const USER_AGENT: &str = concat!("devbox-provision/", env!("CARGO_PKG_VERSION"));

fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .user_agent(USER_AGENT)
        .timeout_connect(timeout)
        .timeout(timeout)
        .build()
}

/// Whether `url` answers at all. Any HTTP status counts as reachable:
/// the question is connectivity, not whether the resource exists.
pub fn is_reachable(url: &str, timeout: Duration) -> bool {
    let result = agent(timeout).head(url).call();
    tracing::debug!(url, ok = result.is_ok(), "connectivity probe");
    match result {
        Ok(_) | Err(ureq::Error::Status(_, _)) => true,
        Err(ureq::Error::Transport(transport)) => {
            log_debug!("[HTTP] {} unreachable: {}", url.dimmed(), transport);
            false
        }
    }
}

/// Streams the body of `url` into `out`, returning the number of bytes written.
pub fn download_into(url: &str, out: &mut impl Write, timeout: Duration) -> Result<u64, String> {
    let response = agent(timeout)
        .get(url)
        .call()
        .map_err(|err| err.to_string())?;
    let mut reader = response.into_reader();
    let written = copy_stream(&mut reader, out).map_err(|err| err.to_string())?;
    log_debug!("[HTTP] Downloaded {} bytes from {}", written, url.dimmed());
    Ok(written)
}

fn copy_stream(reader: &mut impl Read, out: &mut impl Write) -> io::Result<u64> {
    let written = io::copy(reader, out)?;
    out.flush()?;
    Ok(written)
}
