mod http_socket;
pub use http_socket::HttpSocket;
