pub mod config;
pub mod controller;
pub mod ftp;
pub mod ftp_client;
pub mod http;
pub mod http_client;
pub mod job;
pub mod naming;
pub mod poll;
#[cfg(test)]
pub mod test_helpers;
pub mod transport;
