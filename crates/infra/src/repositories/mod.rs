mod memory;
mod support;

pub mod buzzes;
pub mod conversations;
pub mod engagement;
pub mod follows;
pub mod users;

pub use buzzes::*;
pub use conversations::*;
pub use engagement::*;
pub use follows::*;
pub use memory::MemoryGateway;
pub use users::*;
