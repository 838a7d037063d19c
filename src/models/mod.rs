pub mod cart;
pub mod catalog;
pub mod common;
pub mod notification;
pub mod order;
pub mod pagination;
pub mod points;
pub mod seller;

pub use cart::*;
pub use catalog::*;
pub use common::*;
pub use notification::*;
pub use order::*;
pub use pagination::*;
pub use points::*;
pub use seller::*;
