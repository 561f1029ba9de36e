// Network surface:
// - protocol parses command lines and encodes responses.
// - connection runs the per-client read loop and orders pipelined responses.
// - service maps protocol operations onto the storage core.

pub mod connection;
pub mod io;
pub mod listener;
pub mod pipeline;
pub mod protocol;
pub mod service;
