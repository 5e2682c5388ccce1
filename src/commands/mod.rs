pub mod init;
pub mod scan;
pub mod session;

pub use init::*;
pub use scan::*;
pub use session::*;
