pub mod driver;
pub mod payment;
pub mod system;
pub mod trip;
pub mod user;

pub use driver::*;
pub use payment::*;
pub use system::*;
pub use trip::*;
pub use user::*;
