use std::net::SocketAddr;

use crate::config::StorageConfig;

pub mod warp;

#[hannibal::message]
#[derive(Debug)]
pub struct Listen {
    pub socket: SocketAddr,
    pub storage: StorageConfig,
}
