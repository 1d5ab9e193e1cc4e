// Application layer: the capability ports that adapters (HTTP, CLI) program
// against. The transfer rules themselves live with the stores.

pub mod ports;

pub use ports::*;
