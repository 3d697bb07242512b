//! Network origin classification.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use http::HeaderMap;

/// Decides whether a client address belongs to a trusted network.
pub trait NetworkClassifier: Send + Sync {
    fn is_trusted_network(&self, ip: IpAddr) -> bool;
}

/// Built-in trusted ranges: loopback, RFC 1918, link-local, IPv6 ULA.
pub const DEFAULT_TRUSTED_RANGES: &[&str] = &[
    "127.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "169.254.0.0/16",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// An address block such as `192.168.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBlock {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrBlock {
    pub fn new(network: IpAddr, prefix_len: u8) -> anyhow::Result<Self> {
        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            anyhow::bail!("prefix length /{} is too long for {}", prefix_len, network);
        }
        Ok(Self {
            network,
            prefix_len,
        })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, normalize(ip)) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = mask_v4(self.prefix_len);
                u32::from(net) & mask == u32::from(addr) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = mask_v6(self.prefix_len);
                u128::from(net) & mask == u128::from(addr) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for CidrBlock {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix_len) = match s.split_once('/') {
            Some((addr, len)) => {
                let len: u8 = len
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid prefix length in `{}`", s))?;
                (addr, Some(len))
            }
            None => (s, None),
        };

        let network: IpAddr = addr
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid network address in `{}`", s))?;

        // A bare address is a single-host block.
        let prefix_len = prefix_len.unwrap_or(match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        });

        Self::new(network, prefix_len)
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

fn mask_v4(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    }
}

fn mask_v6(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix_len))
    }
}

/// IPv4-mapped IPv6 addresses are classified as their IPv4 form.
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// CIDR-list classifier.
#[derive(Debug, Clone)]
pub struct TrustedNetworks {
    blocks: Vec<CidrBlock>,
}

impl TrustedNetworks {
    /// The built-in private/local ranges only.
    pub fn private_ranges() -> Self {
        let blocks = DEFAULT_TRUSTED_RANGES
            .iter()
            .filter_map(|cidr| cidr.parse().ok())
            .collect();
        Self { blocks }
    }

    /// Built-in ranges plus extra CIDRs from configuration.
    pub fn with_extra<S: AsRef<str>>(extra: &[S]) -> anyhow::Result<Self> {
        let mut networks = Self::private_ranges();
        for cidr in extra {
            networks.blocks.push(cidr.as_ref().parse()?);
        }
        Ok(networks)
    }

    pub fn blocks(&self) -> &[CidrBlock] {
        &self.blocks
    }
}

impl Default for TrustedNetworks {
    fn default() -> Self {
        Self::private_ranges()
    }
}

impl NetworkClassifier for TrustedNetworks {
    fn is_trusted_network(&self, ip: IpAddr) -> bool {
        self.blocks.iter().any(|block| block.contains(ip))
    }
}

/// Determine the originating client address of a request.
///
/// Forwarding headers are only consulted when the gateway sits behind a
/// proxy it trusts; otherwise any client could claim a local address.
pub fn get_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> Option<IpAddr> {
    if trust_proxy_headers {
        let forwarded = headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());

        if let Some(ip) = forwarded {
            return Some(ip);
        }

        let real_ip = headers
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());

        if let Some(ip) = real_ip {
            return Some(ip);
        }
    }

    peer.map(|addr| addr.ip())
}
