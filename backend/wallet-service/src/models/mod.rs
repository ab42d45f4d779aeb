pub mod chain;
pub mod price;
pub mod token;
pub mod user;

pub use chain::Chain;
pub use price::PoolQuote;
pub use token::{LogoStatus, TokenKey, TokenMeta, TokenRecord};
pub use user::{ProfilePatch, Thumbnail, UserProfileSummary};
