mod connection;
pub use connection::connect;

mod web_socket;
pub use web_socket::WebSocket;
