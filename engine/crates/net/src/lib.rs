pub mod channels;
pub mod protocol;
pub mod web_server;
