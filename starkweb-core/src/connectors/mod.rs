pub mod injected;
pub mod mock;

pub use injected::{injected, InjectedProvider, InjectedTarget, WalletEvent, WalletRequest};
pub use mock::{mock, MockFeatures, MockParameters};
