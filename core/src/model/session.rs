//! Client session records, created on connect and destroyed on disconnect.

use std::net::IpAddr;
use std::time::Instant;

use crate::model::profile::AccessProfile;

/// An ephemeral, per-connection client session.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub id: u64,
    pub profile: AccessProfile,
    pub remote_ip: IpAddr,
    pub last_seen: Instant,
}

impl ClientSession {
    pub fn new(id: u64, profile: AccessProfile, remote_ip: IpAddr) -> Self {
        Self {
            id,
            profile,
            remote_ip,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}
