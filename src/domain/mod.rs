mod integrity;
mod money;
mod transaction;
mod wallet;

pub use integrity::*;
pub use money::*;
pub use transaction::*;
pub use wallet::*;
