pub mod subscription;
pub mod user;
pub mod variation;
pub mod video;

pub use subscription::*;
pub use user::*;
pub use variation::*;
pub use video::*;
