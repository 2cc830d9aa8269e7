use std::net::{Ipv4Addr, SocketAddr};

use macaddr::MacAddr6;
use thiserror::Error;
use wake_on_lan::MagicPacket;

use crate::mac::HardwareAddress;

#[derive(Error, Debug)]
pub enum WakeError {
    #[error("Network error: {0}")]
    NetworkError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WakeError>;

/// Default destination for magic packets.
pub const BROADCAST_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::BROADCAST), 9);

/// Send a Wake-on-LAN magic packet to the specified hardware address
///
/// # Arguments
/// * `address` - Hardware address of the sleeping host
/// * `broadcast_addr` - Optional broadcast address (default: "255.255.255.255:9")
pub fn send_wol_packet(address: HardwareAddress, broadcast_addr: Option<SocketAddr>) -> Result<()> {
    let to = broadcast_addr.unwrap_or(BROADCAST_ADDR);
    let from = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    let mac = MacAddr6::from(address);
    MagicPacket::new(&mac.into_array()).send_to(to, from)?;
    Ok(())
}
