mod enums;
mod news_event;
mod subscription;

pub use enums::*;
pub use news_event::*;
pub use subscription::*;
